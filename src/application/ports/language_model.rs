//! Language Model Port - 生成式模型抽象
//!
//! 章节结构发现与章节分析都通过该端口调用外部模型，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// 模型调用的原始失败（未分类）
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error (HTTP {status}): {message}")]
    Service {
        status: u16,
        message: String,
        /// 服务端建议的等待时间
        retry_after: Option<Duration>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    pub fn service(status: u16, message: impl Into<String>) -> Self {
        Self::Service {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Service { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// 模型请求
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    /// 主提示词
    pub prompt: String,
    /// 附加上下文（前一章总结等），按顺序放在提示词之前
    pub context_items: Vec<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl ModelRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, item: impl Into<String>) -> Self {
        self.context_items.push(item.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// 请求的总字符数（提示词 + 上下文）
    pub fn char_len(&self) -> usize {
        self.prompt.chars().count() + self.context_items.iter().map(|c| c.chars().count()).sum::<usize>()
    }
}

/// Language Model Port
#[async_trait]
pub trait LanguageModelPort: Send + Sync {
    /// 生成文本
    async fn generate(&self, request: &ModelRequest) -> Result<String, ModelError>;

    /// 模型标识（写入封面和日志）
    fn model_name(&self) -> &str;
}
