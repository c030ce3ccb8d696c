//! 统一可观测性模块
//!
//! 提供 logging 与 metrics 描述的统一初始化。
//! 所有入口通过单一入口点配置可观测性，确保一致的日志格式和指标命名。

pub mod metrics;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;

use crate::config::ObservabilityConfig;

/// 可观测性资源守卫
///
/// 持有可观测性资源的生命周期，Drop 时输出关闭日志。
pub struct ObservabilityGuard {
    tracing_guard: Option<tracing::TracingGuard>,
}

impl ObservabilityGuard {
    /// 创建一个空的 Guard（用于测试或禁用可观测性时）
    pub fn empty() -> Self {
        Self {
            tracing_guard: None,
        }
    }
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        if self.tracing_guard.is_some() {
            info!("Shutting down observability...");
        }
    }
}

/// 统一初始化可观测性
///
/// 初始化顺序：
/// 1. Tracing（日志）
/// 2. Metrics（指标描述；导出器由宿主进程安装）
///
/// # Example
///
/// ```ignore
/// use rules_shared::config::AppConfig;
/// use rules_shared::observability;
///
/// fn main() -> anyhow::Result<()> {
///     let config = AppConfig::load("rule-engine")?;
///     let _guard = observability::init(&config.service_name, &config.observability)?;
///     Ok(())
/// }
/// ```
pub fn init(service_name: &str, config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    let tracing_guard = tracing::init(config)?;

    if config.metrics_enabled {
        metrics::describe();
    }

    info!(
        service = %service_name,
        log_level = %config.log_level,
        log_format = %config.log_format,
        metrics_enabled = config.metrics_enabled,
        "Observability initialized"
    );

    Ok(ObservabilityGuard {
        tracing_guard: Some(tracing_guard),
    })
}
