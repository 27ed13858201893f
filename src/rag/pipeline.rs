//! RAG 파이프라인 - 청킹 → 임베딩 → 인덱싱 → 검색 → 생성
//!
//! ## 흐름
//! 1. `build`: 컬렉션 리셋 후 문서 청킹, 배치 임베딩, 벡터 저장
//! 2. `retrieve`: 질문 임베딩 → top-k 청크
//! 3. `invoke`: 청크 텍스트를 프롬프트에 채워 LLM 호출

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::knowledge::{
    Chunk, ChunkConfig, Chunker, RecursiveChunker, SearchResult, SourceDocument, VectorEntry, VectorStore,
};
use crate::llm::LanguageModel;

use super::prompt::{self, format_context, PromptTemplate};

/// 임베딩 배치 크기
const EMBED_BATCH_SIZE: usize = 32;

/// 청크 + 임베딩 → 저장용 엔트리 (순번이 i32 범위를 넘으면 에러)
fn to_entry(chunk: &Chunk, embedding: Vec<f32>) -> Result<VectorEntry> {
    let chunk_index = i32::try_from(chunk.index).with_context(|| {
        format!("Chunk index {} of {} exceeds i32", chunk.index, chunk.source)
    })?;
    Ok(VectorEntry {
        source: chunk.source.clone(),
        chunk_index,
        chunk_text: chunk.text.clone(),
        embedding,
    })
}

// ============================================================================
// Config / Answer
// ============================================================================

/// RAG 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagConfig {
    pub chunk: ChunkConfig,
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk: ChunkConfig::default(),
            top_k: 3,
        }
    }
}

impl RagConfig {
    pub fn from_settings(settings: &crate::config::RagSettings) -> Self {
        Self {
            chunk: ChunkConfig::new(settings.chunk_size, settings.chunk_overlap),
            top_k: settings.top_k,
        }
    }
}

/// 답변 + 사용된 컨텍스트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    pub contexts: Vec<String>,
}

/// 질문에 답하는 시스템 (파이프라인 또는 테스트 대역)
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    async fn answer(&self, question: &str) -> Result<RagAnswer>;
}

// ============================================================================
// RagPipeline
// ============================================================================

/// 검색 증강 생성 파이프라인
pub struct RagPipeline {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModel>,
    prompt: PromptTemplate,
    top_k: usize,
    chunk_count: usize,
}

impl RagPipeline {
    /// 문서를 인덱싱하고 파이프라인 생성
    ///
    /// 컬렉션은 항상 비운 뒤 다시 채웁니다 (이전 실행의 청크가 섞이지 않도록).
    pub async fn build(
        docs: &[SourceDocument],
        config: RagConfig,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let chunker = RecursiveChunker::new(config.chunk.clone())?;
        let chunks = chunker.split_documents(docs);
        tracing::info!(
            "Split {} documents into {} chunks (size={}, overlap={})",
            docs.len(),
            chunks.len(),
            config.chunk.chunk_size,
            config.chunk.chunk_overlap
        );

        store.reset().await.context("Failed to reset vector collection")?;

        let mut indexed = 0usize;
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder
                .embed_batch(&texts)
                .await
                .context("Failed to embed chunks")?;

            if vectors.len() != batch.len() {
                anyhow::bail!(
                    "Embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
            }

            let entries = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, embedding)| to_entry(chunk, embedding))
                .collect::<Result<Vec<VectorEntry>>>()?;

            indexed += store.insert_batch(&entries).await?;
        }

        tracing::info!("Indexed {} chunks with {}", indexed, embedder.name());

        Ok(Self {
            store,
            embedder,
            llm,
            prompt: prompt::DEFAULT,
            top_k: config.top_k,
            chunk_count: chunks.len(),
        })
    }

    /// 프롬프트 교체
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    /// 프롬프트만 바꾼 파이프라인 (인덱스 공유)
    pub fn share_with_prompt(&self, prompt: PromptTemplate) -> Self {
        Self {
            store: Arc::clone(&self.store),
            embedder: Arc::clone(&self.embedder),
            llm: Arc::clone(&self.llm),
            prompt,
            top_k: self.top_k,
            chunk_count: self.chunk_count,
        }
    }

    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    /// 인덱싱된 청크 수
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// top-k 청크 검색
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>> {
        let query = self
            .embedder
            .embed(question)
            .await
            .context("Failed to embed question")?;
        self.store.search(&query, self.top_k).await
    }

    /// 질문 → 답변 문자열
    pub async fn invoke(&self, question: &str) -> Result<String> {
        Ok(self.answer_with_context(question).await?.answer)
    }

    async fn answer_with_context(&self, question: &str) -> Result<RagAnswer> {
        let chunks = self.retrieve(question).await?;
        let context = format_context(&chunks);
        let rendered = self.prompt.render(&context, question);

        tracing::debug!(
            "Asking {} with {} chunks ({})",
            self.llm.model_name(),
            chunks.len(),
            self.prompt.name
        );

        let answer = self.llm.generate(&rendered).await?;

        Ok(RagAnswer {
            answer,
            contexts: chunks.into_iter().map(|c| c.chunk_text).collect(),
        })
    }
}

#[async_trait]
impl QuestionAnswerer for RagPipeline {
    async fn answer(&self, question: &str) -> Result<RagAnswer> {
        self.answer_with_context(question).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{DistanceMetric, LanceVectorStore};
    use crate::llm::mock::{EchoModel, HashEmbedding, KeywordModel};
    use tempfile::TempDir;

    #[test]
    fn test_chunk_index_out_of_range_is_error() {
        let mut chunk = Chunk {
            text: "Refunds within 30 days.".to_string(),
            source: "refund.txt".to_string(),
            index: 7,
        };
        let entry = to_entry(&chunk, vec![0.1, 0.2]).unwrap();
        assert_eq!(entry.chunk_index, 7);
        assert_eq!(entry.source, "refund.txt");

        chunk.index = i32::MAX as usize + 1;
        let err = to_entry(&chunk, vec![0.1, 0.2]).unwrap_err();
        assert!(err.to_string().contains("exceeds i32"));
    }

    fn docs() -> Vec<SourceDocument> {
        vec![
            SourceDocument {
                content: "Customers can request a refund within 30 days of purchase. \
                          Digital products are non-refundable once downloaded."
                    .to_string(),
                source: "refund.txt".to_string(),
            },
            SourceDocument {
                content: "Full-time employees receive 20 days of annual leave per year."
                    .to_string(),
                source: "leave.txt".to_string(),
            },
        ]
    }

    async fn store(dir: &TempDir) -> Arc<dyn VectorStore> {
        Arc::new(
            LanceVectorStore::open(dir.path(), "rag_test", DistanceMetric::Cosine)
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_build_indexes_and_retrieves() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let pipeline = RagPipeline::build(
            &docs(),
            RagConfig {
                chunk: ChunkConfig::new(500, 50),
                top_k: 1,
            },
            Arc::clone(&store),
            Arc::new(HashEmbedding::new(64)),
            Arc::new(EchoModel),
        )
        .await
        .unwrap();

        assert_eq!(pipeline.chunk_count(), 2);
        assert_eq!(store.count().await.unwrap(), 2);

        let hits = pipeline.retrieve("annual leave employees").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "leave.txt");
    }

    #[tokio::test]
    async fn test_rebuild_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        for _ in 0..2 {
            RagPipeline::build(
                &docs(),
                RagConfig::default(),
                Arc::clone(&store),
                Arc::new(HashEmbedding::new(32)),
                Arc::new(EchoModel),
            )
            .await
            .unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_answer_uses_prompt_and_context() {
        let dir = TempDir::new().unwrap();
        let pipeline = RagPipeline::build(
            &docs(),
            RagConfig::default(),
            store(&dir).await,
            Arc::new(HashEmbedding::new(64)),
            Arc::new(EchoModel),
        )
        .await
        .unwrap()
        .with_prompt(prompt::STRONG_GUARDRAIL);

        let answer = pipeline.answer("What is the refund policy?").await.unwrap();
        assert!(answer.answer.contains("Never make up information."));
        assert!(answer.answer.contains("Question: What is the refund policy?"));
        assert_eq!(answer.contexts.len(), 2);
        assert!(answer.answer.contains(&answer.contexts[0]));
    }

    #[tokio::test]
    async fn test_invoke_returns_model_answer() {
        let dir = TempDir::new().unwrap();
        let llm = KeywordModel::new(
            &[("refund", "Customers can request a refund within 30 days.")],
            prompt::ABSTAIN_ANSWER,
        );
        let pipeline = RagPipeline::build(
            &docs(),
            RagConfig::default(),
            store(&dir).await,
            Arc::new(HashEmbedding::new(64)),
            Arc::new(llm),
        )
        .await
        .unwrap();

        let answer = pipeline.invoke("What is the refund policy?").await.unwrap();
        assert!(answer.contains("30 days"));

        let shared = pipeline.share_with_prompt(prompt::NO_GUARDRAIL);
        assert_eq!(shared.prompt().name, "NO_GUARDRAIL");
        assert_eq!(
            shared.invoke("What is the CEO's name?").await.unwrap(),
            prompt::ABSTAIN_ANSWER
        );
    }

    #[tokio::test]
    async fn test_invalid_chunk_config_rejected() {
        let dir = TempDir::new().unwrap();
        let result = RagPipeline::build(
            &docs(),
            RagConfig {
                chunk: ChunkConfig::new(10, 50),
                top_k: 3,
            },
            store(&dir).await,
            Arc::new(HashEmbedding::new(16)),
            Arc::new(EchoModel),
        )
        .await;
        assert!(result.is_err());
    }
}
