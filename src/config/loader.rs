//! 配置加载器实现
//!
//! 从环境变量和可选的 TOML 配置文件收集配置，支持 `${VAR}` 环境变量替换

use crate::config::types::{ConfigSource, RelayConfig, KNOWN_KEYS};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 收集原始键值配置
    ///
    /// # 返回
    /// * `Result<ConfigSource>` - 合并后的配置来源
    async fn load_source(&self) -> Result<ConfigSource>;

    /// 加载最终配置
    ///
    /// # 返回
    /// * `Result<RelayConfig>` - 构建好的配置
    async fn load(&self) -> Result<RelayConfig> {
        let source = self.load_source().await?;
        Ok(RelayConfig::from_source(&source))
    }
}

/// 环境变量配置加载器
///
/// 配置文件提供基础值，环境变量覆盖同名键。
#[derive(Debug, Clone)]
pub struct EnvConfigLoader {
    /// 可选的 TOML 配置文件
    file_path: Option<PathBuf>,
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
    /// 环境变量快照（仅包含可识别的键）
    env: ConfigSource,
}

impl EnvConfigLoader {
    /// 创建读取当前进程环境变量的加载器
    ///
    /// 只收集可识别的配置键，值不是有效 UTF-8 的变量被忽略。
    ///
    /// # 参数
    /// * `file_path` - 可选的配置文件路径
    pub fn new(file_path: Option<PathBuf>) -> Self {
        let env = std::env::vars_os()
            .filter_map(|(key, value)| {
                let key = key.to_str()?.to_ascii_uppercase();
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    return None;
                }
                match value.into_string() {
                    Ok(value) => Some((key, value)),
                    Err(_) => {
                        log::warn!("环境变量 {} 不是有效的 UTF-8，已忽略", key);
                        None
                    }
                }
            })
            .collect();
        Self::with_env(file_path, env)
    }

    /// 使用给定的环境变量快照创建加载器
    pub fn with_env(file_path: Option<PathBuf>, env: ConfigSource) -> Self {
        Self {
            file_path,
            enable_env_substitution: true,
            env,
        }
    }

    /// 设置是否启用环境变量替换
    pub fn env_substitution(mut self, enabled: bool) -> Self {
        self.enable_env_substitution = enabled;
        self
    }

    /// 替换字符串中的环境变量
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        // 匹配 ${VAR_NAME} 格式的环境变量
        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {}", e)))?;

        let mut result = content.to_string();

        for captures in env_var_regex.captures_iter(content) {
            let full_match = &captures[0];
            let var_name = &captures[1];

            match std::env::var(var_name) {
                Ok(value) => {
                    result = result.replace(full_match, &value);
                }
                Err(_) => {
                    return Err(ConfigError::EnvVarError {
                        var: var_name.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(result)
    }

    /// 解析TOML内容为键值配置
    ///
    /// 只接受顶层标量值，字符串数组按逗号拼接（对应 FORWARD_URLS）。
    pub fn parse_toml(&self, content: &str) -> Result<ConfigSource> {
        let processed_content = self.substitute_env_vars(content)?;

        let table: toml::Table = toml::from_str(&processed_content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {}", e)))?;

        let mut source = ConfigSource::new();
        for (key, value) in table {
            let key = key.to_ascii_uppercase();
            if !KNOWN_KEYS.contains(&key.as_str()) {
                log::warn!("忽略未知配置项: {}", key);
                continue;
            }

            let value = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        toml::Value::String(s) => Ok(s.clone()),
                        other => Err(ConfigError::ParseError(format!(
                            "配置项 {} 只接受字符串数组，发现: {}",
                            key, other
                        ))),
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?
                    .join(","),
                other => {
                    return Err(ConfigError::ParseError(format!(
                        "配置项 {} 的值类型不受支持: {}",
                        key, other
                    ))
                    .into())
                }
            };
            source.insert(key, value);
        }

        Ok(source)
    }

    /// 从文件读取配置来源
    async fn load_file(&self, path: &Path) -> Result<ConfigSource> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {}", e)))?;

        let source = self.parse_toml(&content)?;
        log::info!("成功加载配置文件: {}", path.display());
        Ok(source)
    }
}

#[async_trait]
impl ConfigLoader for EnvConfigLoader {
    async fn load_source(&self) -> Result<ConfigSource> {
        let mut source = match self.file_path {
            Some(ref path) => self.load_file(path).await?,
            None => ConfigSource::new(),
        };

        // 环境变量优先于配置文件
        for (key, value) in &self.env {
            source.insert(key.clone(), value.clone());
        }

        log::debug!("配置来源键: {:?}", source.keys().collect::<Vec<_>>());
        Ok(source)
    }
}
