//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, NotifyConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<NotifyConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<NotifyConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<NotifyConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SourceKind;

    #[test]
    fn test_parse_toml_sections() {
        let content = r#"
[retry]
max_retries = 3
first_delay_ms = 100
increment_delay_ms = 50

[transport]
response_timeout_ms = 1500

[[notifiers]]
name = "session"
kinds = ["publish", "synchronize"]

[[notifiers]]
name = "backup"
kinds = ["backup"]
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.increment_delay_ms, 50);
        assert_eq!(config.transport.response_timeout_ms, 1500);
        assert_eq!(config.timer.tick_ms, 100);
        assert_eq!(config.notifiers.len(), 2);
        assert_eq!(config.notifiers[1].kinds, vec![SourceKind::Backup]);
    }

    #[test]
    fn test_parse_json() {
        let content = r#"{
            "retry": { "max_retries": 2, "increment_delay_ms": -10 },
            "notifiers": [{ "name": "temp", "kinds": ["publish_temp"] }]
        }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.first_delay_ms, 3000);
        assert_eq!(config.retry.increment_delay_ms, -10);
        assert_eq!(config.notifiers[0].kinds, vec![SourceKind::PublishTemp]);
    }

    #[test]
    fn test_parse_unknown_kind() {
        let content = r#"
[[notifiers]]
name = "n"
kinds = ["teleport"]
"#;
        let err = parse(content, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
