//! 日志初始化模块
//!
//! 基于 tracing-subscriber 构建日志输出，支持 pretty 与 JSON 两种格式。

use anyhow::Result;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::ObservabilityConfig;

/// Tracing 资源守卫
///
/// 目前仅标记订阅者已安装；保留为独立类型以便后续挂接需要刷新的输出层。
pub struct TracingGuard {
    _private: (),
}

/// 构建环境过滤器
///
/// RUST_LOG 优先，其次为配置的日志级别，均无效时回退到 info。
fn build_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 初始化 tracing（日志）
///
/// 全局订阅者只能安装一次，重复调用返回错误。
pub fn init(config: &ObservabilityConfig) -> Result<TracingGuard> {
    let env_filter = build_filter(config);

    let fmt_layer = if config.json_logs() {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(TracingGuard { _private: () })
}
