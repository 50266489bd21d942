//! HTTP Model Client - 调用 Gemini 风格的 generateContent 接口
//!
//! 实现 LanguageModelPort trait
//!
//! POST {base_url}/v1beta/models/{model}:generateContent
//! Request:  {"contents": [{"role": "user", "parts": [{"text": "..."}]}], "generationConfig": {...}}
//! Response: {"candidates": [{"content": {"parts": [{"text": "..."}]}}]}
//! Error:    {"error": {"code": 429, "message": "...", "details": [{"retryDelay": "13s"}]}}

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

use crate::application::ports::{LanguageModelPort, ModelError, ModelRequest};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "GenerationConfig::is_empty")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.max_output_tokens.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

/// HTTP 模型客户端配置
#[derive(Debug, Clone)]
pub struct HttpModelClientConfig {
    /// 服务基础 URL
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpModelClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: String::new(),
            model: "gemini-2.5-pro".to_string(),
            timeout_secs: 600,
        }
    }
}

impl HttpModelClientConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP 模型客户端
pub struct HttpModelClient {
    client: Client,
    config: HttpModelClientConfig,
}

impl HttpModelClient {
    pub fn new(config: HttpModelClientConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl LanguageModelPort for HttpModelClient {
    async fn generate(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let mut parts: Vec<Part<'_>> = request
            .context_items
            .iter()
            .map(|item| Part { text: item.as_str() })
            .collect();
        parts.push(Part {
            text: request.prompt.as_str(),
        });

        let body = GenerateRequest {
            contents: vec![Content { role: "user", parts }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        };

        tracing::debug!(
            model = %self.config.model,
            request_chars = request.char_len(),
            context_items = request.context_items.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout
                } else if e.is_connect() {
                    ModelError::Network(format!("Cannot connect to model service: {}", e))
                } else {
                    ModelError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let header_wait = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(Duration::from_secs_f64);
            let error_text = response.text().await.unwrap_or_default();
            return Err(service_error(status.as_u16(), &error_text, header_wait));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("Failed to read body: {}", e)))?;
        let output = extract_text(&text)?;

        tracing::debug!(model = %self.config.model, response_chars = output.chars().count(), "Model response received");
        Ok(output)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// 从 generateContent 响应体提取文本
fn extract_text(body: &str) -> Result<String, ModelError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| ModelError::InvalidResponse(format!("Malformed response: {}", e)))?;

    let candidate = parsed.candidates.into_iter().next().ok_or_else(|| {
        let feedback = parsed
            .prompt_feedback
            .map(|f| f.to_string())
            .unwrap_or_else(|| "no candidates".to_string());
        ModelError::InvalidResponse(format!("Empty response: {}", feedback))
    })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ModelError::InvalidResponse(format!(
            "Candidate has no text (finishReason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}

fn retry_in_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)retry in ([\d.]+)\s*s").ok()).as_ref()
}

/// 构造服务错误，按 Retry-After 头、retryDelay 字段、"retry in Xs" 文本的顺序提取建议等待时间
fn service_error(status: u16, body: &str, header_wait: Option<Duration>) -> ModelError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = envelope
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());

    let detail_wait = envelope.as_ref().and_then(|e| {
        e.error.details.iter().find_map(|d| {
            d.get("retryDelay")
                .and_then(|v| v.as_str())
                .and_then(|s| s.trim_end_matches('s').parse::<f64>().ok())
                .map(Duration::from_secs_f64)
        })
    });

    let text_wait = retry_in_regex()
        .and_then(|re| re.captures(&message))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(Duration::from_secs_f64);

    ModelError::Service {
        status,
        message,
        retry_after: header_wait.or(detail_wait).or(text_wait),
    }
}
