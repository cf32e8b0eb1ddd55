//! 转发目标规范化
//!
//! 将原始配置字符串转换为以唯一 `/pulse_receiver` 结尾、去重且保持顺序的目标列表

use std::collections::HashSet;

/// 转发目标的规范路径后缀
pub const RELAY_PATH_SUFFIX: &str = "/pulse_receiver";

/// 目标规范化器
#[derive(Debug, Clone)]
pub struct TargetNormalizer {
    /// 规范后缀
    suffix: String,
}

impl Default for TargetNormalizer {
    fn default() -> Self {
        Self::new(RELAY_PATH_SUFFIX)
    }
}

impl TargetNormalizer {
    /// 使用指定后缀创建规范化器
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// 当前使用的后缀
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// 规范化单个候选地址
    ///
    /// 去除首尾空白后，反复剥离末尾的斜杠和后缀（忽略大小写），
    /// 最后追加一个规范后缀。空候选返回 `None`。
    ///
    /// # 参数
    /// * `candidate` - 原始地址
    ///
    /// # 返回
    /// * `Option<String>` - 规范化后的目标
    pub fn normalize(&self, candidate: &str) -> Option<String> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return None;
        }

        let mut base = candidate;
        loop {
            let trimmed = base.trim_end_matches('/');
            match strip_suffix_ignore_case(trimmed, &self.suffix) {
                Some(rest) => base = rest,
                None => {
                    base = trimmed;
                    break;
                }
            }
        }

        Some(format!("{}{}", base, self.suffix))
    }

    /// 规范化逗号分隔的地址列表，丢弃空项
    pub fn normalize_list(&self, raw: &str) -> Vec<String> {
        raw.split(',')
            .filter_map(|candidate| self.normalize(candidate))
            .collect()
    }
}

/// 忽略 ASCII 大小写剥离后缀
fn strip_suffix_ignore_case<'a>(value: &'a str, suffix: &str) -> Option<&'a str> {
    if suffix.is_empty() || value.len() < suffix.len() {
        return None;
    }
    let split = value.len() - suffix.len();
    if !value.is_char_boundary(split) {
        return None;
    }
    let (rest, tail) = value.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(rest)
}

/// 保持首次出现顺序去重
pub fn dedup_preserving_order(targets: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(targets.len());
    targets
        .into_iter()
        .filter(|target| seen.insert(target.clone()))
        .collect()
}

/// 构建完整的转发目标列表
///
/// 优先级：逗号分隔列表 > 旧版单一地址 > 显式配置的探测地址 > 内置默认地址。
/// 某一层规范化后为空时继续尝试下一层，结果保证非空（默认地址非空时）且无重复。
///
/// # 参数
/// * `forward_urls` - 逗号分隔的转发地址
/// * `forward_url` - 旧版单一转发地址
/// * `target_url` - 显式配置的探测地址
/// * `defaults` - 内置默认基础地址
pub fn build_targets(
    forward_urls: Option<&str>,
    forward_url: Option<&str>,
    target_url: Option<&str>,
    defaults: &[&str],
) -> Vec<String> {
    let normalizer = TargetNormalizer::default();

    let targets = [forward_urls, forward_url, target_url]
        .into_iter()
        .enumerate()
        .find_map(|(layer, raw)| {
            let raw = raw?;
            let targets = if layer == 0 {
                normalizer.normalize_list(raw)
            } else {
                normalizer.normalize(raw).into_iter().collect()
            };
            (!targets.is_empty()).then_some(targets)
        })
        .unwrap_or_else(|| {
            defaults
                .iter()
                .filter_map(|base| normalizer.normalize(base))
                .collect()
        });

    dedup_preserving_order(targets)
}
