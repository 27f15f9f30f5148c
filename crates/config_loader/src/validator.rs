//! 配置校验模块
//!
//! 校验规则：
//! - notifier 名称非空且唯一
//! - 每个 notifier 至少声明一种 SourceKind
//! - 时间轮 tick_ms / ticks_per_wheel / max_pending / worker_concurrency > 0
//! - response_timeout_ms > 0

use std::collections::HashSet;

use contracts::{ContractError, NotifyConfig};

/// 校验 NotifyConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &NotifyConfig) -> Result<(), ContractError> {
    validate_notifiers(config)?;
    validate_timer(config)?;
    validate_transport(config)?;
    Ok(())
}

/// 校验 notifier 名称与 kinds
fn validate_notifiers(config: &NotifyConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (index, notifier) in config.notifiers.iter().enumerate() {
        if notifier.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("notifiers[{index}].name"),
                "notifier name must not be empty",
            ));
        }
        if !seen.insert(notifier.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("notifiers[name={}]", notifier.name),
                "duplicate notifier name",
            ));
        }
        if notifier.kinds.is_empty() {
            return Err(ContractError::config_validation(
                format!("notifiers[{}].kinds", notifier.name),
                "at least one source kind is required",
            ));
        }
    }
    Ok(())
}

/// 校验时间轮配置
fn validate_timer(config: &NotifyConfig) -> Result<(), ContractError> {
    let timer = &config.timer;
    let checks = [
        ("timer.tick_ms", timer.tick_ms as u128),
        ("timer.ticks_per_wheel", timer.ticks_per_wheel as u128),
        ("timer.max_pending", timer.max_pending as u128),
        ("timer.worker_concurrency", timer.worker_concurrency as u128),
    ];
    for (field, value) in checks {
        if value == 0 {
            return Err(ContractError::config_validation(field, "must be > 0"));
        }
    }
    Ok(())
}

/// 校验传输配置
fn validate_transport(config: &NotifyConfig) -> Result<(), ContractError> {
    if config.transport.response_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "transport.response_timeout_ms",
            "must be > 0",
        ));
    }
    Ok(())
}
