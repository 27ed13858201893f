//! LLM 모듈 - 호스팅 API(Gemini)와 로컬 런타임(Ollama) 클라이언트
//!
//! - `LanguageModel`: 프롬프트 → 텍스트 생성 인터페이스
//! - `KeyPool`: rate limit 시 API 키 로테이션
//! - `RateLimiter`: 최소 딜레이 + 분당 요청 수 제한

mod gemini;
mod keys;
mod ollama;
mod rate;

#[cfg(test)]
pub(crate) mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Settings;

pub(crate) use gemini::classify_error as classify_gemini_error;
pub use gemini::GeminiClient;
pub use keys::{ApiKey, KeyPool};
pub use ollama::{is_model_installed, OllamaClient};
pub use rate::RateLimiter;

// ============================================================================
// Errors
// ============================================================================

/// LLM 호출 에러
///
/// rate limit 여부를 구조적으로 구분합니다 (에러 메시지 문자열 검사 대신).
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Rate limit exceeded ({provider}): {message}")]
    RateLimited { provider: String, message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Cannot connect to {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Prompt blocked by provider: {0}")]
    Blocked(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("No API keys found. Set one of: {0}")]
    NoKeys(String),

    #[error("All API keys exhausted after {attempts} attempts")]
    KeysExhausted { attempts: usize },
}

impl LlmError {
    /// rate limit(429 / RESOURCE_EXHAUSTED) 여부
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. } | LlmError::KeysExhausted { .. })
    }

    /// reqwest 전송 에러 변환
    pub(crate) fn from_transport(err: reqwest::Error, base_url: &str, timeout_secs: u64) -> Self {
        if err.is_connect() {
            LlmError::Connection(base_url.to_string())
        } else if err.is_timeout() {
            LlmError::Timeout(timeout_secs)
        } else {
            LlmError::Connection(format!("{}: {}", base_url, err))
        }
    }
}

// ============================================================================
// LanguageModel Trait
// ============================================================================

/// 텍스트 생성 모델 트레이트
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 단일 프롬프트 생성
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// 모델 이름
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        (**self).generate(prompt).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

// ============================================================================
// Provider Factory
// ============================================================================

/// 모델 프로바이더
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Google Gemini (호스팅, 키 로테이션)
    Gemini,
    /// Ollama (로컬)
    Ollama,
}

/// Gemini 클라이언트 생성
///
/// # Arguments
/// * `model` - 모델 이름 (None이면 `settings.gemini.model`)
/// * `start_key` - 시작 키 인덱스 (봇과 judge가 서로 다른 계정을 쓰도록)
pub fn gemini_model(
    settings: &Settings,
    model: Option<&str>,
    start_key: usize,
) -> Result<GeminiClient, LlmError> {
    let keys = KeyPool::from_env(&settings.gemini.key_vars)?.starting_at(start_key);
    let model = model.unwrap_or(&settings.gemini.model);
    GeminiClient::new(
        keys,
        model,
        &settings.gemini,
        settings.pacing.key_rotation_cooldown(),
    )
}

/// Ollama 클라이언트 생성
pub fn ollama_model(settings: &Settings) -> Result<OllamaClient, LlmError> {
    OllamaClient::new(
        &settings.ollama.base_url,
        &settings.ollama.model,
        settings.ollama.timeout_secs,
    )
}

/// 프로바이더에 따라 공유 모델 생성
pub fn create_model(
    provider: ModelProvider,
    settings: &Settings,
    start_key: usize,
) -> Result<Arc<dyn LanguageModel>, LlmError> {
    let model: Arc<dyn LanguageModel> = match provider {
        ModelProvider::Gemini => Arc::new(gemini_model(settings, None, start_key)?),
        ModelProvider::Ollama => Arc::new(ollama_model(settings)?),
    };

    tracing::info!("Using {:?} model: {}", provider, model.model_name());
    Ok(model)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        let limited = LlmError::RateLimited {
            provider: "gemini".to_string(),
            message: "RESOURCE_EXHAUSTED".to_string(),
        };
        assert!(limited.is_rate_limit());
        assert!(LlmError::KeysExhausted { attempts: 2 }.is_rate_limit());

        let api = LlmError::Api {
            status: 400,
            message: "bad request".to_string(),
        };
        assert!(!api.is_rate_limit());
        assert!(!LlmError::EmptyResponse.is_rate_limit());
    }

    #[tokio::test]
    async fn test_arc_model_delegates() {
        let model: Arc<dyn LanguageModel> = Arc::new(mock::StaticModel::new("pong"));
        assert_eq!(model.generate("ping").await.unwrap(), "pong");
        assert_eq!(model.model_name(), "static");
    }
}
