//! 임베딩 모듈 - 텍스트 벡터화
//!
//! RAG 인덱싱과 answer relevancy 계산에 사용되는 임베딩 프로바이더입니다.
//!
//! - `OllamaEmbedding`: 로컬 Ollama `/api/embed` (기본값)
//! - `GeminiEmbedding`: Gemini `gemini-embedding-001` (키 로테이션 적용)
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder(EmbedderKind::Ollama, &settings)?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::Settings;
use crate::llm::{ApiKey, KeyPool, LlmError, OllamaClient, RateLimiter};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Ollama Embedding
// ============================================================================

/// Ollama 임베딩 구현체
pub struct OllamaEmbedding {
    client: OllamaClient,
}

impl OllamaEmbedding {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self
            .client
            .embed_texts(&[text.to_string()])
            .await
            .context("Ollama embedding failed")?;

        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Ollama returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // /api/embed는 배치 입력을 한 번에 처리
        self.client
            .embed_texts(texts)
            .await
            .context("Ollama batch embedding failed")
    }

    fn name(&self) -> &str {
        crate::llm::LanguageModel::model_name(&self.client)
    }
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// Gemini 임베딩 API 엔드포인트 (gemini-embedding-001 - MRL 지원)
/// source: https://ai.google.dev/gemini-api/docs/embeddings
const GEMINI_EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:embedContent";

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 768;

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    keys: KeyPool,
    client: reqwest::Client,
    dimension: usize,
    timeout_secs: u64,
    rotation_cooldown: Duration,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl GeminiEmbedding {
    /// 차원을 지정하여 생성
    ///
    /// # Arguments
    /// * `keys` - 로테이션 키 풀
    /// * `dimension` - 임베딩 차원 (768, 1536, 3072 중 선택)
    /// * `timeout_secs` - 요청 타임아웃
    /// * `rotation_cooldown` - 429 후 키 전환 대기 시간
    pub fn with_dimension(
        keys: KeyPool,
        dimension: usize,
        timeout_secs: u64,
        rotation_cooldown: Duration,
        rate_limiter: RateLimiter,
    ) -> Result<Self> {
        // 유효한 차원 확인
        if ![768, 1536, 3072].contains(&dimension) {
            anyhow::bail!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                dimension
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            keys,
            client,
            dimension,
            timeout_secs,
            rotation_cooldown,
            rate_limiter: Arc::new(Mutex::new(rate_limiter)),
        })
    }

    /// 설정에서 생성 (환경변수 키 풀)
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let keys = KeyPool::from_env(&settings.gemini.key_vars)?;
        Self::with_keys(keys, settings)
    }

    /// 주어진 키 풀과 설정으로 생성
    pub fn with_keys(keys: KeyPool, settings: &Settings) -> Result<Self> {
        let limiter = RateLimiter::per_minute(
            settings.gemini.requests_per_minute,
            Duration::from_millis(settings.gemini.min_delay_ms),
        );
        Self::with_dimension(
            keys,
            DEFAULT_DIMENSION,
            settings.gemini.timeout_secs,
            settings.pacing.key_rotation_cooldown(),
            limiter,
        )
    }

    /// 단일 키로 한 번 요청
    async fn request(&self, key: ApiKey, request: &EmbedRequest) -> Result<Vec<f32>, LlmError> {
        {
            let mut limiter = self.rate_limiter.lock().await;
            limiter.acquire().await;
        }

        // API 키는 URL이 아닌 헤더로 전송
        let response = self
            .client
            .post(GEMINI_EMBED_URL)
            .header("x-goog-api-key", key.secret())
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, GEMINI_EMBED_URL, self.timeout_secs))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Parse(format!("Failed to read response body: {}", e)))?;

        if status.is_success() {
            let embed_response: EmbedResponse = serde_json::from_str(&body)
                .map_err(|e| LlmError::Parse(format!("Failed to parse embedding response: {}", e)))?;
            return Ok(embed_response.embedding.values);
        }

        Err(crate::llm::classify_gemini_error(status.as_u16(), &body))
    }
}

/// Gemini API 요청 본문
/// source: https://ai.google.dev/gemini-api/docs/embeddings
#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // 빈 텍스트 처리
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let request = EmbedRequest {
            model: "models/gemini-embedding-001".to_string(),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: "RETRIEVAL_DOCUMENT".to_string(),
            output_dimensionality: Some(self.dimension),
        };

        let values = self
            .keys
            .call_with_rotation(self.rotation_cooldown, |key| self.request(key, &request))
            .await
            .context("Gemini embedding failed")?;

        Ok(values)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Gemini는 배치 API가 없으므로 순차 처리
        // Rate limiter가 자동으로 조절함
        let mut results = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding batch {}/{}", i + 1, texts.len());
            results.push(self.embed(text).await?);
        }

        Ok(results)
    }

    fn name(&self) -> &str {
        "gemini-embedding-001"
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 임베딩 프로바이더 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// 로컬 Ollama (기본)
    Ollama,
    /// Gemini API
    Gemini,
}

/// 임베딩 프로바이더 생성
pub fn create_embedder(kind: EmbedderKind, settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match kind {
        EmbedderKind::Ollama => {
            let client = OllamaClient::new(
                &settings.ollama.base_url,
                &settings.ollama.embed_model,
                settings.ollama.timeout_secs,
            )?;
            Arc::new(OllamaEmbedding::new(client))
        }
        EmbedderKind::Gemini => Arc::new(GeminiEmbedding::from_settings(settings)?),
    };

    tracing::info!("Using embedding provider: {}", embedder.name());
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================
