use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::{providers::ProviderKind, version::AIModelVersion};

/// 主配置结构体
///
/// 包含所有AI服务的配置信息，从配置文件和环境变量加载
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AiConfig {
    /// AI服务配置映射（服务名 -> 服务详情）
    pub services: HashMap<String, ServiceConfig>,
    /// 日志配置（可选，有默认值）
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 单个AI服务的配置（提供商、模型、凭证）
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServiceConfig {
    pub provider: ProviderKind,
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    /// 自定义端点（可选，默认使用提供商端点）
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// 能力覆盖（可选，默认使用提供商能力）
    #[serde(default)]
    pub capabilities: Option<Capabilities>,
}

/// 服务/模型组合支持的功能开关
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub file_upload: bool,
    #[serde(default)]
    pub structured_output: bool,
    /// 内容审核（原生审核接口或通过结构化输出模拟）
    #[serde(default)]
    pub moderation: bool,
    #[serde(default)]
    pub image_generation: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        streaming: false,
        file_upload: false,
        structured_output: false,
        moderation: false,
        image_generation: false,
    };
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_timeout() -> u64 { 60 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

pub const DEFAULT_CONFIG_FILE: &str = "ai-facade.toml";
pub const ENV_PREFIX: &str = "AI_FACADE_";

/// 加载配置文件和环境变量
///
/// ## 功能说明
/// 从`ai-facade.toml`文件和环境变量（前缀`AI_FACADE_`）加载配置，环境变量会覆盖配置文件中的相同设置
///
/// ## 内部实现逻辑
/// 1. 使用Figment库创建配置加载器
/// 2. 首先加载TOML文件中的配置
/// 3. 然后加载以`AI_FACADE_`开头的环境变量，覆盖文件配置
/// 4. 将配置反序列化为AiConfig结构体
/// 5. 调用validate()方法验证配置的有效性
///
/// ## 错误处理
/// - 配置文件格式错误时返回解析错误
/// - 配置验证失败时返回验证错误
pub fn load_config() -> Result<AiConfig> {
    load_config_from(DEFAULT_CONFIG_FILE)
}

/// 从指定路径加载配置，其余行为与[`load_config`]相同
pub fn load_config_from(path: impl AsRef<Path>) -> Result<AiConfig> {
    let path = path.as_ref();
    // 创建配置加载器，按优先级合并配置源
    let config: AiConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .with_context(|| format!("Failed to load configuration from {} or environment variables", path.display()))?;

    config.validate().context("Configuration validation failed")?;

    tracing::debug!(services = config.services.len(), "Configuration loaded");
    Ok(config)
}

impl AiConfig {
    /// 验证整个配置的有效性
    ///
    /// ## 内部实现逻辑
    /// 1. 检查至少配置了一个AI服务
    /// 2. 逐个验证每个服务的配置
    /// 3. 验证日志配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(anyhow::anyhow!("At least one service must be configured"));
        }

        for (name, service) in &self.services {
            service
                .validate()
                .with_context(|| format!("Service '{}' configuration validation failed", name))?;
        }

        self.logging
            .validate()
            .context("Logging configuration validation failed")?;

        Ok(())
    }

    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.get(name)
    }
}

impl ServiceConfig {
    pub fn new(provider: ProviderKind, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            api_key: api_key.into(),
            endpoint: None,
            timeout_seconds: default_timeout(),
            capabilities: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// 获取服务能力，未配置时使用提供商默认值
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
            .unwrap_or_else(|| self.provider.default_capabilities())
    }

    pub fn model_version(&self) -> AIModelVersion {
        AIModelVersion::parse(&self.model)
    }

    /// 获取端点URL，确保只有一个结尾斜杠
    pub fn base_url(&self) -> String {
        let base = self
            .endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint());
        format!("{}/", base.trim_end_matches('/'))
    }

    /// 验证AI服务配置参数
    ///
    /// ## 参数验证规则
    /// - `model`: 不能为空
    /// - `api_key`: 除Ollama外不能为空
    /// - `endpoint`: 如果提供，必须以http://或https://开头
    /// - `timeout_seconds`: 1-600秒之间
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow::anyhow!("Service model cannot be empty"));
        }

        if self.api_key.trim().is_empty() && self.provider != ProviderKind::Ollama {
            return Err(anyhow::anyhow!("Service API key cannot be empty"));
        }

        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(anyhow::anyhow!("Service endpoint must start with http:// or https://"));
            }
        }

        if self.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("Service timeout must be greater than 0"));
        }

        if self.timeout_seconds > 600 {
            return Err(anyhow::anyhow!("Service timeout cannot exceed 600 seconds"));
        }

        Ok(())
    }
}

impl LoggingConfig {
    /// 验证日志配置参数
    ///
    /// ## 参数验证规则
    /// - `level`: 必须是 "trace", "debug", "info", "warn", "error" 之一
    /// - `format`: 必须是 "json", "pretty", "compact" 之一
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level '{}': must be one of {:?}",
                self.level, valid_levels
            ));
        }

        let valid_formats = ["json", "pretty", "compact"];
        if !valid_formats.contains(&self.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format '{}': must be one of {:?}",
                self.format, valid_formats
            ));
        }

        Ok(())
    }
}
