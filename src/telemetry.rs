use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::LoggingConfig,
    errors::{AiError, AiResult},
};

/// 初始化结构化日志系统
///
/// 配置tracing和tracing-subscriber，支持：
/// - JSON / pretty / compact 三种输出格式
/// - `RUST_LOG`环境变量优先，否则使用配置中的级别
///
/// 重复初始化时返回配置错误而不是panic
pub fn init_tracing(logging: &LoggingConfig) -> AiResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ai_facade={}", logging.level)));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match logging.format.as_str() {
        "pretty" => registry
            .with(fmt::layer().with_target(true).pretty())
            .try_init(),
        "compact" => registry
            .with(fmt::layer().with_target(false).compact())
            .try_init(),
        _ => registry
            .with(
                fmt::layer()
                    .with_target(true) // 显示模块路径
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .try_init(),
    };

    result.map_err(|e| AiError::Config(format!("Failed to initialize tracing: {}", e)))?;

    tracing::info!(format = %logging.format, level = %logging.level, "Structured logging initialized");
    Ok(())
}
