//! Ollama HTTP 클라이언트 (로컬 LLM 런타임)
//!
//! ref: https://github.com/ollama/ollama/blob/main/docs/api.md
//!
//! - `/api/generate`: 텍스트 생성 (stream: false)
//! - `/api/embed`: 배치 임베딩
//! - `/api/tags`: 설치된 모델 목록

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{LanguageModel, LlmError};

/// Ollama 클라이언트
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    /// 새 클라이언트 생성
    ///
    /// # Arguments
    /// * `base_url` - Ollama 주소 (예: http://localhost:11434)
    /// * `model` - 기본 모델 이름 (예: llama3.2)
    /// * `timeout_secs` - 요청 타임아웃 (로컬 추론은 느릴 수 있음)
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    /// 모델만 바꾼 복제본 (임베딩 모델 분리용)
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 설치된 모델 목록
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, &self.base_url, self.timeout_secs))?;

        let parsed: TagsResponse = Self::read_json(response).await?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }


    /// 배치 임베딩 (`/api/embed`)
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}/api/embed", self.base_url);
        let body = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, &self.base_url, self.timeout_secs))?;

        let parsed: EmbedResponse = Self::read_json(response).await?;

        if parsed.embeddings.len() != texts.len() {
            return Err(LlmError::Parse(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        Ok(parsed.embeddings)
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, LlmError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, &self.base_url, self.timeout_secs))?;

        let parsed: GenerateResponse = Self::read_json(response).await?;
        Ok(parsed.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Wire Types
// ============================================================================

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Request body for Ollama /api/embed
#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response body from Ollama /api/embed
#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaErrorBody {
    error: String,
}

// ============================================================================
// Tests
// ============================================================================

/// 설치된 모델 목록에 `model` 이 있는지 (태그 생략 시 `:latest` 등 모든 태그 허용)
pub fn is_model_installed<S: AsRef<str>>(installed: &[S], model: &str) -> bool {
    installed.iter().any(|name| {
        let name = name.as_ref();
        name == model
            || (!model.contains(':')
                && name
                    .split_once(':')
                    .map_or(false, |(base, _)| base == model))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_installed_matches_tags() {
        let installed = vec!["llama3.2:latest".to_string(), "nomic-embed-text:v1.5".to_string()];
        assert!(is_model_installed(&installed, "llama3.2"));
        assert!(is_model_installed(&installed, "llama3.2:latest"));
        assert!(is_model_installed(&installed, "nomic-embed-text"));
        assert!(!is_model_installed(&installed, "llama3"));
        assert!(!is_model_installed(&installed, "llama3.2:1b"));
        assert!(!is_model_installed::<String>(&[], "llama3.2"));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = OllamaClient::new("http://localhost:11434/", "llama3.2", 5).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.model_name(), "llama3.2");
    }

    #[test]
    fn test_with_model_keeps_base_url() {
        let client = OllamaClient::new("http://gpu:11434", "llama3.2", 5).unwrap();
        let embed = client.with_model("nomic-embed-text");
        assert_eq!(embed.base_url(), "http://gpu:11434");
        assert_eq!(embed.model_name(), "nomic-embed-text");
    }

    #[test]
    fn test_generate_request_is_non_streaming() {
        let body = GenerateRequest {
            model: "llama3.2",
            prompt: "hi",
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["model"], "llama3.2");
    }

    #[test]
    fn test_embed_response_parsing() {
        let raw = r#"{"model": "llama3.2", "embeddings": [[0.1, 0.2], [0.3, 0.4]]}"#;
        let parsed: EmbedResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.embeddings.len(), 2);
        assert!((parsed.embeddings[1][0] - 0.3).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_embed_batch_skips_request() {
        // 연결할 수 없는 주소여도 빈 입력은 요청하지 않음
        let client = OllamaClient::new("http://127.0.0.1:9", "llama3.2", 1).unwrap();
        let result = client.embed_texts(&[]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connection_error() {
        let client = OllamaClient::new("http://127.0.0.1:9", "llama3.2", 2).unwrap();
        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::Connection(_) | LlmError::Timeout(_)));
    }
}
