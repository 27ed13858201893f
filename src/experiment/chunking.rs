//! 청크 크기 실험 - 크기별로 새 컬렉션을 만들어 같은 질문을 던짐

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::eval::checks::is_abstention;
use crate::knowledge::{ChunkConfig, LanceVectorStore, SourceDocument};
use crate::llm::LanguageModel;
use crate::rag::{RagConfig, RagPipeline};

use super::{preview, QuestionAnswer};

/// 기본 청크 크기
pub const DEFAULT_CHUNK_SIZES: &[usize] = &[200, 500, 1000];

/// 실험 공통 오버랩
pub const EXPERIMENT_OVERLAP: usize = 50;

/// 청크 크기 1개에 대한 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingRun {
    pub chunk_size: usize,
    pub chunk_count: usize,
    pub answers: Vec<QuestionAnswer>,
}

impl ChunkingRun {
    /// 답이 있는 질문에 기권한 횟수 (검색 실패)
    pub fn retrieval_failures(&self) -> usize {
        self.answers.iter().filter(|a| is_abstention(&a.answer)).count()
    }

    pub fn successes(&self) -> usize {
        self.answers.len() - self.retrieval_failures()
    }

    pub fn success_rate(&self) -> f64 {
        super::ratio(self.successes(), self.answers.len())
    }
}

/// 청크 크기 실험
pub struct ChunkingExperiment {
    store: LanceVectorStore,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModel>,
    top_k: usize,
    overlap: usize,
}

impl ChunkingExperiment {
    /// # Arguments
    /// * `store` - 실험 DB (크기별 `chunks_<size>` 컬렉션을 이 DB에 생성)
    pub fn new(
        store: LanceVectorStore,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            top_k,
            overlap: EXPERIMENT_OVERLAP,
        }
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    /// 모든 크기에 대해 실행
    pub async fn run<S: AsRef<str>>(
        &self,
        docs: &[SourceDocument],
        sizes: &[usize],
        questions: &[S],
    ) -> Result<Vec<ChunkingRun>> {
        let mut runs = Vec::with_capacity(sizes.len());
        for &size in sizes {
            runs.push(self.run_size(docs, size, questions).await?);
        }
        Ok(runs)
    }

    async fn run_size<S: AsRef<str>>(
        &self,
        docs: &[SourceDocument],
        chunk_size: usize,
        questions: &[S],
    ) -> Result<ChunkingRun> {
        println!("\n{}", "=".repeat(60));
        println!("[*] 청크 크기 = {}", chunk_size);
        println!("{}", "=".repeat(60));

        let collection = format!("chunks_{}", chunk_size);
        let store = Arc::new(self.store.with_collection(&collection));
        let config = RagConfig {
            chunk: ChunkConfig::new(chunk_size, self.overlap),
            top_k: self.top_k,
        };

        let pipeline = RagPipeline::build(
            docs,
            config,
            store,
            Arc::clone(&self.embedder),
            Arc::clone(&self.llm),
        )
        .await
        .with_context(|| format!("Failed to build index for chunk size {}", chunk_size))?;

        println!("[OK] 문서를 {}개 청크로 분할", pipeline.chunk_count());

        let mut answers = Vec::with_capacity(questions.len());
        for question in questions {
            let question = question.as_ref();
            let answer = pipeline.invoke(question).await?;
            println!("\nQ: {}\nA: {}...", question, preview(&answer, 150));
            answers.push(QuestionAnswer {
                question: question.to_string(),
                answer,
            });
        }

        let run = ChunkingRun {
            chunk_size,
            chunk_count: pipeline.chunk_count(),
            answers,
        };
        tracing::info!(
            "Chunk size {}: {} chunks, {}/{} answered",
            chunk_size,
            run.chunk_count,
            run.successes(),
            run.answers.len()
        );
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{DistanceMetric, VectorStore};
    use crate::llm::mock::{HashEmbedding, KeywordModel};
    use crate::rag::ABSTAIN_ANSWER;
    use tempfile::TempDir;

    fn docs() -> Vec<SourceDocument> {
        let policy = "Customers can request a refund within 30 days of purchase. ".repeat(12);
        vec![SourceDocument {
            content: policy,
            source: "refund_policy.txt".to_string(),
        }]
    }

    #[test]
    fn test_success_rate_counts_abstentions_as_failures() {
        let run = ChunkingRun {
            chunk_size: 200,
            chunk_count: 9,
            answers: vec![
                QuestionAnswer {
                    question: "a".into(),
                    answer: "30 days.".into(),
                },
                QuestionAnswer {
                    question: "b".into(),
                    answer: ABSTAIN_ANSWER.into(),
                },
            ],
        };
        assert_eq!(run.retrieval_failures(), 1);
        assert!((run.success_rate() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_creates_collection_per_size() {
        let dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(dir.path(), "unused", DistanceMetric::Cosine)
            .await
            .unwrap();
        let llm = KeywordModel::new(&[("refund", "Within 30 days of purchase.")], ABSTAIN_ANSWER);

        let experiment = ChunkingExperiment::new(
            store.with_collection("unused"),
            Arc::new(HashEmbedding::new(32)),
            Arc::new(llm),
            3,
        );
        let runs = experiment
            .run(
                &docs(),
                &[200, 1000],
                &["What is the refund policy?", "How long is maternity leave?"],
            )
            .await
            .unwrap();

        assert_eq!(runs.len(), 2);
        assert!(runs[0].chunk_count > runs[1].chunk_count);
        assert_eq!(runs[0].retrieval_failures(), 1);

        let mut names = store.collections().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["chunks_1000", "chunks_200"]);
        assert_eq!(
            store.with_collection("chunks_200").count().await.unwrap(),
            runs[0].chunk_count
        );
    }
}
