//! Gemini generateContent 클라이언트
//!
//! ref: https://ai.google.dev/api/generate-content
//!
//! 모든 요청은 `KeyPool::call_with_rotation`으로 감싸져 있어서
//! 429(RESOURCE_EXHAUSTED)를 받으면 다음 키로 넘어갑니다.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::GeminiSettings;

use super::keys::{ApiKey, KeyPool};
use super::rate::RateLimiter;
use super::{LanguageModel, LlmError};

const PROVIDER: &str = "gemini";

/// Gemini 텍스트 생성 클라이언트
#[derive(Debug)]
pub struct GeminiClient {
    keys: KeyPool,
    model: String,
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
    rotation_cooldown: Duration,
    rate_limiter: Mutex<RateLimiter>,
}

impl GeminiClient {
    /// 새 클라이언트 생성
    ///
    /// # Arguments
    /// * `keys` - 로테이션 키 풀
    /// * `model` - 모델 이름 (예: gemini-2.5-flash)
    /// * `settings` - base URL, timeout, rate limit
    /// * `rotation_cooldown` - 키 전환 후 대기 시간
    pub fn new(
        keys: KeyPool,
        model: &str,
        settings: &GeminiSettings,
        rotation_cooldown: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        let rate_limiter = RateLimiter::per_minute(
            settings.requests_per_minute,
            Duration::from_millis(settings.min_delay_ms),
        );

        Ok(Self {
            keys,
            model: model.to_string(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs: settings.timeout_secs,
            rotation_cooldown,
            rate_limiter: Mutex::new(rate_limiter),
        })
    }

    /// 키 풀 접근
    pub fn keys(&self) -> &KeyPool {
        &self.keys
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// 단일 키로 한 번 요청
    async fn request(&self, key: ApiKey, body: &GenerateRequest) -> Result<String, LlmError> {
        {
            let mut limiter = self.rate_limiter.lock().await;
            limiter.acquire().await;
        }

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", key.secret())
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Parse(format!("Failed to read response body: {}", e)))?;

        if status.is_success() {
            let parsed: GenerateResponse = serde_json::from_str(&text)
                .map_err(|e| LlmError::Parse(format!("Failed to parse generateContent response: {}", e)))?;
            return parsed.into_text();
        }

        Err(classify_error(status.as_u16(), &text))
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = GenerateRequest::user_text(prompt);

        self.keys
            .call_with_rotation(self.rotation_cooldown, |key| self.request(key, &body))
            .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Wire Types
// ============================================================================

/// generateContent 요청 본문
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

impl GenerateRequest {
    fn user_text(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
}

/// generateContent 응답
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback", default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// 첫 후보의 텍스트 파트를 이어붙임
    fn into_text(self) -> Result<String, LlmError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::Blocked(reason));
        }

        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(text)
    }
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// HTTP 상태 + 본문으로 에러 분류
///
/// 429 또는 `RESOURCE_EXHAUSTED` 상태는 rate limit으로 분류합니다.
pub(crate) fn classify_error(status: u16, body: &str) -> LlmError {
    let detail = serde_json::from_str::<GeminiError>(body).ok().map(|e| e.error);

    let (api_status, message) = match detail {
        Some(d) => (d.status, d.message),
        None => (String::new(), body.to_string()),
    };

    if status == 429 || api_status == "RESOURCE_EXHAUSTED" {
        return LlmError::RateLimited {
            provider: PROVIDER.to_string(),
            message,
        };
    }

    let message = if api_status.is_empty() {
        message
    } else {
        format!("{}: {}", api_status, message)
    };

    LlmError::Api { status, message }
}

// ============================================================================
// Tests
// ============================================================================
