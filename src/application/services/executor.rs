//! Resilient Call Executor - 模型调用的失败分类与重试
//!
//! - QuotaExceeded / Transient: 有限次重试，优先使用服务端建议的等待时间
//! - ContextTooLarge: 不在此重试，交给持有预算的调用方缩小输入
//! - Fatal: 立即返回

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::application::ports::{LanguageModelPort, ModelError, ModelRequest};

/// 失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    QuotaExceeded,
    ContextTooLarge,
    Transient,
    Fatal,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QuotaExceeded | Self::Transient)
    }
}

const QUOTA_MARKERS: &[&str] = &["quota", "resource has been exhausted", "resource_exhausted", "rate limit"];
const OVERFLOW_MARKERS: &[&str] = &[
    "token count exceeds",
    "exceeds the maximum",
    "context length",
    "too many tokens",
];

/// 对原始失败分类
pub fn classify(error: &ModelError) -> FailureKind {
    match error {
        ModelError::Network(_) | ModelError::Timeout => FailureKind::Transient,
        ModelError::Service { status, message, .. } => {
            let lower = message.to_lowercase();
            if *status == 429 || QUOTA_MARKERS.iter().any(|m| lower.contains(m)) {
                FailureKind::QuotaExceeded
            } else if *status == 413 || OVERFLOW_MARKERS.iter().any(|m| lower.contains(m)) {
                FailureKind::ContextTooLarge
            } else if *status >= 500 || *status == 408 {
                FailureKind::Transient
            } else {
                FailureKind::Fatal
            }
        }
        ModelError::InvalidResponse(message) => {
            let lower = message.to_lowercase();
            if OVERFLOW_MARKERS.iter().any(|m| lower.contains(m)) {
                FailureKind::ContextTooLarge
            } else {
                FailureKind::Fatal
            }
        }
    }
}

/// 重试策略
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// 总尝试次数（含首次）
    pub max_attempts: u32,
    /// 第 n 次重试前的等待时间，超出部分沿用最后一项
    pub delays: Vec<Duration>,
    /// 服务端建议等待时间之外的额外余量
    pub suggested_wait_padding: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delays: [60, 90, 120, 150, 180].into_iter().map(Duration::from_secs).collect(),
            suggested_wait_padding: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    /// 第 `failed_attempt` 次（从 1 开始）失败后应等待的时间
    pub fn delay_for(&self, failed_attempt: u32, suggested: Option<Duration>) -> Duration {
        if let Some(wait) = suggested {
            return wait + self.suggested_wait_padding;
        }
        let i = (failed_attempt.max(1) - 1) as usize;
        self.delays
            .get(i)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or_default()
    }
}

/// 分类后的调用失败（重试耗尽或不可重试）
#[derive(Debug, Clone, Error)]
pub enum CallError {
    #[error("Quota exceeded after {attempts} attempts: {message}")]
    QuotaExceeded { attempts: u32, message: String },

    #[error("Context too large: {message}")]
    ContextTooLarge { message: String },

    #[error("Transient service error after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    #[error("Fatal model error: {message}")]
    Fatal { message: String },
}

impl CallError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::QuotaExceeded { .. } => FailureKind::QuotaExceeded,
            Self::ContextTooLarge { .. } => FailureKind::ContextTooLarge,
            Self::Transient { .. } => FailureKind::Transient,
            Self::Fatal { .. } => FailureKind::Fatal,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::QuotaExceeded { attempts, .. } | Self::Transient { attempts, .. } => *attempts,
            Self::ContextTooLarge { .. } | Self::Fatal { .. } => 1,
        }
    }
}

/// 单次调用的重试状态，调用结束即丢弃
#[derive(Debug, Default)]
struct RetryState {
    attempt: u32,
    last_kind: Option<FailureKind>,
    wait: Duration,
}

/// 模型调用执行器，所有模型调用都经过这里
pub struct CallExecutor {
    model: Arc<dyn LanguageModelPort>,
    policy: BackoffPolicy,
}

impl CallExecutor {
    pub fn new(model: Arc<dyn LanguageModelPort>, policy: BackoffPolicy) -> Self {
        Self { model, policy }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub async fn invoke(&self, request: &ModelRequest) -> Result<String, CallError> {
        let mut state = RetryState::default();

        loop {
            state.attempt += 1;

            let error = match self.model.generate(request).await {
                Ok(text) => {
                    if state.attempt > 1 {
                        tracing::info!(
                            attempt = state.attempt,
                            last_failure = ?state.last_kind,
                            "Model call succeeded after retry"
                        );
                    }
                    return Ok(text);
                }
                Err(e) => e,
            };

            let kind = classify(&error);
            state.last_kind = Some(kind);
            let message = error.to_string();

            match kind {
                FailureKind::Fatal => {
                    tracing::error!(attempt = state.attempt, error = %message, "Model call failed (not retryable)");
                    return Err(CallError::Fatal { message });
                }
                FailureKind::ContextTooLarge => {
                    tracing::warn!(
                        request_chars = request.char_len(),
                        error = %message,
                        "Model rejected request size"
                    );
                    return Err(CallError::ContextTooLarge { message });
                }
                FailureKind::QuotaExceeded | FailureKind::Transient => {}
            }

            if state.attempt >= self.policy.max_attempts {
                tracing::error!(
                    attempts = state.attempt,
                    kind = ?kind,
                    error = %message,
                    "Model call retries exhausted"
                );
                return Err(match kind {
                    FailureKind::QuotaExceeded => CallError::QuotaExceeded {
                        attempts: state.attempt,
                        message,
                    },
                    _ => CallError::Transient {
                        attempts: state.attempt,
                        message,
                    },
                });
            }

            state.wait = self.policy.delay_for(state.attempt, error.retry_after());
            tracing::warn!(
                attempt = state.attempt,
                max_attempts = self.policy.max_attempts,
                kind = ?kind,
                wait_secs = state.wait.as_secs_f64(),
                suggested = error.retry_after().is_some(),
                "Model call failed, backing off"
            );
            tokio::time::sleep(state.wait).await;
        }
    }
}
