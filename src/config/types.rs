//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体、默认值以及数值回退逻辑

use crate::error::{ConfigError, Result};
use crate::relay::target::build_targets;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// 原始配置来源：环境变量风格的键值对，键统一为大写
pub type ConfigSource = BTreeMap<String, String>;

/// 探测地址键
pub const KEY_TARGET_URL: &str = "TARGET_URL";
/// 旧版单一转发地址键
pub const KEY_FORWARD_URL: &str = "FORWARD_URL";
/// 逗号分隔的转发地址列表键
pub const KEY_FORWARD_URLS: &str = "FORWARD_URLS";
/// 转发令牌键
pub const KEY_FORWARD_TOKEN: &str = "FORWARD_TOKEN";
/// 心跳开关键
pub const KEY_AUTO_PING: &str = "AUTO_PING";
/// 最小心跳间隔键
pub const KEY_MIN_INTERVAL: &str = "MIN_INTERVAL";
/// 最大心跳间隔键
pub const KEY_MAX_INTERVAL: &str = "MAX_INTERVAL";
/// 目标间延迟键
pub const KEY_PER_TARGET_DELAY: &str = "PER_TARGET_DELAY";
/// 监听地址键
pub const KEY_BIND_ADDRESS: &str = "BIND_ADDRESS";
/// 监听端口键
pub const KEY_PORT: &str = "PORT";

/// 所有可识别的配置键
pub const KNOWN_KEYS: &[&str] = &[
    KEY_TARGET_URL,
    KEY_FORWARD_URL,
    KEY_FORWARD_URLS,
    KEY_FORWARD_TOKEN,
    KEY_AUTO_PING,
    KEY_MIN_INTERVAL,
    KEY_MAX_INTERVAL,
    KEY_PER_TARGET_DELAY,
    KEY_BIND_ADDRESS,
    KEY_PORT,
];

/// 默认探测地址
pub const DEFAULT_TARGET_URL: &str = "https://who-i-am-uzh6.onrender.com/pulse_receiver";
/// 未配置任何转发地址时使用的内置基础地址
pub const DEFAULT_FORWARD_BASES: &[&str] = &["https://who-i-am-uzh6.onrender.com"];
/// 默认最小心跳间隔（秒）
pub const DEFAULT_MIN_INTERVAL: f64 = 15.0;
/// 默认最大心跳间隔（秒）
pub const DEFAULT_MAX_INTERVAL: f64 = 49.0;
/// 默认目标间延迟（秒）
pub const DEFAULT_PER_TARGET_DELAY: f64 = 0.15;
/// 默认监听地址
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
/// 默认监听端口
pub const DEFAULT_PORT: u16 = 5001;

/// 进程级配置，启动时构建一次，之后只读
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayConfig {
    /// `/send_wave` 探测的地址
    pub target_url: String,
    /// 规范化、去重后的转发目标列表（非空）
    pub forward_urls: Vec<String>,
    /// 转发时携带的 X-PULSE-TOKEN
    #[serde(skip_serializing)]
    pub forward_token: Option<String>,
    /// 是否启用后台心跳
    pub auto_ping: bool,
    /// 最小心跳间隔（秒）
    pub min_interval: f64,
    /// 最大心跳间隔（秒）
    pub max_interval: f64,
    /// 目标间延迟（秒）
    pub per_target_delay: f64,
    /// 监听地址
    pub bind_address: String,
    /// 监听端口
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::from_source(&ConfigSource::new())
    }
}

impl RelayConfig {
    /// 从键值对来源构建配置
    ///
    /// 非法数值不会导致失败，而是回退到默认值并记录警告。
    ///
    /// # 参数
    /// * `source` - 环境变量风格的配置来源
    ///
    /// # 返回
    /// * `Self` - 配置实例
    pub fn from_source(source: &ConfigSource) -> Self {
        let explicit_target = lookup(source, KEY_TARGET_URL);
        let target_url = explicit_target.unwrap_or(DEFAULT_TARGET_URL).to_string();

        let forward_urls = build_targets(
            lookup(source, KEY_FORWARD_URLS),
            lookup(source, KEY_FORWARD_URL),
            explicit_target,
            DEFAULT_FORWARD_BASES,
        );

        let forward_token = lookup(source, KEY_FORWARD_TOKEN).map(str::to_string);

        let auto_ping = lookup(source, KEY_AUTO_PING)
            .map(parse_flag)
            .unwrap_or(true);

        let (min_interval, max_interval) = parse_intervals(source);
        let per_target_delay = parse_delay(source);

        let bind_address = parse_bind_address(source);
        let port = parse_port(source);

        Self {
            target_url,
            forward_urls,
            forward_token,
            auto_ping,
            min_interval,
            max_interval,
            per_target_delay,
            bind_address,
            port,
        }
    }

    /// 目标间延迟
    pub fn inter_target_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.per_target_delay)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_PER_TARGET_DELAY))
    }

    /// 获取监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip = self.bind_address.trim().parse::<IpAddr>().map_err(|e| {
            ConfigError::ParseError(format!("无效的监听地址 {}: {}", self.bind_address, e))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// 读取键值，空白值视为未设置
fn lookup<'a>(source: &'a ConfigSource, key: &str) -> Option<&'a str> {
    source
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn parse_seconds(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

/// 能否表示为 `Duration`（有限、非负且不溢出）
fn fits_duration(secs: f64) -> bool {
    Duration::try_from_secs_f64(secs).is_ok()
}

/// 解析心跳间隔
///
/// 任一值无法解析、非正数、超出 `Duration` 范围，或最小值大于最大值时，两者同时回退到默认值。
fn parse_intervals(source: &ConfigSource) -> (f64, f64) {
    let min = lookup(source, KEY_MIN_INTERVAL).map_or(Some(DEFAULT_MIN_INTERVAL), parse_seconds);
    let max = lookup(source, KEY_MAX_INTERVAL).map_or(Some(DEFAULT_MAX_INTERVAL), parse_seconds);

    match (min, max) {
        (Some(min), Some(max))
            if fits_duration(min) && fits_duration(max) && min > 0.0 && max > 0.0 && min <= max =>
        {
            (min, max)
        }
        _ => {
            log::warn!(
                "心跳间隔配置无效 (MIN_INTERVAL={:?}, MAX_INTERVAL={:?})，使用默认值 {}-{}s",
                source.get(KEY_MIN_INTERVAL),
                source.get(KEY_MAX_INTERVAL),
                DEFAULT_MIN_INTERVAL,
                DEFAULT_MAX_INTERVAL
            );
            (DEFAULT_MIN_INTERVAL, DEFAULT_MAX_INTERVAL)
        }
    }
}

fn parse_delay(source: &ConfigSource) -> f64 {
    let Some(raw) = lookup(source, KEY_PER_TARGET_DELAY) else {
        return DEFAULT_PER_TARGET_DELAY;
    };

    match parse_seconds(raw) {
        Some(delay) if delay >= 0.0 && fits_duration(delay) => delay,
        Some(delay) if delay < 0.0 => 0.0,
        _ => {
            log::warn!(
                "PER_TARGET_DELAY 无效: {}，使用默认值 {}s",
                raw,
                DEFAULT_PER_TARGET_DELAY
            );
            DEFAULT_PER_TARGET_DELAY
        }
    }
}

fn parse_bind_address(source: &ConfigSource) -> String {
    let Some(raw) = lookup(source, KEY_BIND_ADDRESS) else {
        return DEFAULT_BIND_ADDRESS.to_string();
    };

    match raw.trim().parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(_) => {
            log::warn!(
                "BIND_ADDRESS 无效: {}，使用默认地址 {}",
                raw,
                DEFAULT_BIND_ADDRESS
            );
            DEFAULT_BIND_ADDRESS.to_string()
        }
    }
}

fn parse_port(source: &ConfigSource) -> u16 {
    let Some(raw) = lookup(source, KEY_PORT) else {
        return DEFAULT_PORT;
    };

    match raw.trim().parse::<u16>() {
        Ok(port) if port != 0 => port,
        _ => {
            log::warn!("PORT 无效: {}，使用默认端口 {}", raw, DEFAULT_PORT);
            DEFAULT_PORT
        }
    }
}
