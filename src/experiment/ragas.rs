//! RAGAS 방식 평가 - 골든 데이터셋에 faithfulness + answer relevancy
//!
//! answer relevancy: judge가 답변으로부터 질문 N개를 역생성하고,
//! 원래 질문과의 임베딩 코사인 유사도 평균을 점수로 사용합니다.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::Pacing;
use crate::dataset::GoldenDataset;
use crate::embedding::EmbeddingProvider;
use crate::eval::judge::{self, GeneratedQuestions};
use crate::eval::{FaithfulnessMetric, LlmTestCase, Metric};
use crate::knowledge::cosine_similarity;
use crate::llm::LanguageModel;
use crate::rag::QuestionAnswerer;

use super::preview;

/// 역생성 질문 수
pub const GENERATED_QUESTIONS: usize = 3;

// ============================================================================
// Answer Relevancy
// ============================================================================

/// 답변 관련도
pub struct AnswerRelevancy {
    judge: Arc<dyn LanguageModel>,
    embedder: Arc<dyn EmbeddingProvider>,
    questions: usize,
}

impl AnswerRelevancy {
    pub fn new(judge: Arc<dyn LanguageModel>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            judge,
            embedder,
            questions: GENERATED_QUESTIONS,
        }
    }

    /// 0.0 ~ 1.0 (역생성 질문이 없으면 0)
    pub async fn score(&self, question: &str, answer: &str) -> Result<f64> {
        let raw = self
            .judge
            .generate(&judge::question_generation_prompt(answer, self.questions))
            .await?;
        let generated: GeneratedQuestions = judge::parse_verdict(&raw)?;

        let candidates: Vec<String> = generated
            .questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if candidates.is_empty() {
            tracing::warn!("Judge generated no questions for: {}", preview(question, 60));
            return Ok(0.0);
        }

        let original = self.embedder.embed(question).await?;
        let vectors = self.embedder.embed_batch(&candidates).await?;

        let total: f64 = vectors
            .iter()
            .map(|v| cosine_similarity(&original, v) as f64)
            .sum();
        Ok((total / vectors.len() as f64).clamp(0.0, 1.0))
    }
}

// ============================================================================
// Report
// ============================================================================

/// 질문 1건 결과 (측정 실패 시 점수는 None)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagasRow {
    pub question: String,
    pub answer: String,
    pub contexts: Vec<String>,
    pub ground_truth: String,
    pub faithfulness: Option<f64>,
    pub answer_relevancy: Option<f64>,
}

/// 전체 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagasReport {
    pub rows: Vec<RagasRow>,
    pub faithfulness: Option<f64>,
    pub answer_relevancy: Option<f64>,
}

impl RagasReport {
    pub fn from_rows(rows: Vec<RagasRow>) -> Self {
        let faithfulness = mean(rows.iter().filter_map(|r| r.faithfulness));
        let answer_relevancy = mean(rows.iter().filter_map(|r| r.answer_relevancy));
        Self {
            rows,
            faithfulness,
            answer_relevancy,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "n/a".to_string(), |s| format!("{:.3}", s))
}

// ============================================================================
// Evaluation
// ============================================================================

/// RAGAS 방식 평가 실행기
pub struct RagasEvaluation {
    faithfulness: FaithfulnessMetric,
    relevancy: AnswerRelevancy,
    pacing: Pacing,
}

impl RagasEvaluation {
    pub fn new(
        judge: Arc<dyn LanguageModel>,
        embedder: Arc<dyn EmbeddingProvider>,
        threshold: f64,
        pacing: Pacing,
    ) -> Self {
        Self {
            faithfulness: FaithfulnessMetric::new(Arc::clone(&judge), threshold),
            relevancy: AnswerRelevancy::new(judge, embedder),
            pacing,
        }
    }

    /// 1) 모든 질문의 답변과 컨텍스트 수집 → 2) 질문별 점수 측정
    pub async fn run(&self, rag: &dyn QuestionAnswerer, dataset: &GoldenDataset) -> Result<RagasReport> {
        println!("[*] RAG 답변 수집 중...");
        let mut collected = Vec::with_capacity(dataset.len());
        for item in dataset.items() {
            println!("  처리 중: {}...", preview(&item.question, 60));
            let answer = rag.answer(&item.question).await?;
            collected.push((item, answer));
        }

        println!("[*] 점수 측정 중 (judge 호출)...");
        let mut rows = Vec::with_capacity(collected.len());
        for (i, (item, answer)) in collected.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing.metric_interval()).await;
            }

            let case = LlmTestCase::new(&item.question, &answer.answer)
                .with_expected(&item.ground_truth)
                .with_context(answer.contexts.clone());

            let faithfulness = match self.faithfulness.measure(&case).await {
                Ok(outcome) => Some(outcome.score),
                Err(e) => {
                    tracing::warn!("Faithfulness failed for '{}': {}", item.question, e);
                    None
                }
            };

            let answer_relevancy = match self.relevancy.score(&item.question, &answer.answer).await {
                Ok(score) => Some(score),
                Err(e) => {
                    tracing::warn!("Answer relevancy failed for '{}': {}", item.question, e);
                    None
                }
            };

            println!(
                "[OK] {} | faithfulness {} | relevancy {}",
                preview(&item.question, 50),
                format_score(faithfulness),
                format_score(answer_relevancy)
            );

            rows.push(RagasRow {
                question: item.question,
                answer: answer.answer,
                contexts: answer.contexts,
                ground_truth: item.ground_truth,
                faithfulness,
                answer_relevancy,
            });
        }

        Ok(RagasReport::from_rows(rows))
    }
}

/// 점수 요약 출력
pub fn print_report(report: &RagasReport) {
    println!("\n{}", "=".repeat(70));
    println!("RAGAS SCORES");
    println!("{}", "=".repeat(70));
    println!("Faithfulness:      {}", format_score(report.faithfulness));
    println!("Answer Relevancy:  {}", format_score(report.answer_relevancy));
    println!("{}", "=".repeat(70));
}
