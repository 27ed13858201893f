//! 품질 리포트 - 저장된 실험 결과에서 지표 계산

use std::fmt::Write as _;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::rag::GuardrailLevel;

use super::chunking::ChunkingRun;
use super::prompts::PromptRun;
use super::ratio;

/// EXCELLENT 판정 기준 (답변 품질)
pub const QUALITY_TARGET: f64 = 0.90;

/// 청크 크기별 성공률
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRate {
    pub chunk_size: usize,
    pub success: usize,
    pub total: usize,
}

impl ChunkRate {
    pub fn rate(&self) -> f64 {
        ratio(self.success, self.total)
    }

    pub fn is_optimal(&self) -> bool {
        self.total > 0 && self.success == self.total
    }

    pub fn label(&self) -> &'static str {
        if self.is_optimal() {
            "OPTIMAL"
        } else {
            "SUBOPTIMAL"
        }
    }
}

/// 품질 리포트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub abstained: usize,
    pub unanswerable_total: usize,
    pub answered: usize,
    pub answerable_total: usize,
    pub chunk_rates: Vec<ChunkRate>,
}

impl QualityReport {
    /// STRONG_GUARDRAIL 결과와 청크 실험 결과로 리포트 생성
    pub fn build(chunking: &[ChunkingRun], prompts: &[PromptRun]) -> Result<Self> {
        let strong = prompts
            .iter()
            .find(|r| r.level == GuardrailLevel::Strong)
            .ok_or_else(|| anyhow!("Prompt results contain no STRONG_GUARDRAIL run"))?;

        let mut chunk_rates: Vec<ChunkRate> = chunking
            .iter()
            .map(|run| ChunkRate {
                chunk_size: run.chunk_size,
                success: run.successes(),
                total: run.answers.len(),
            })
            .collect();
        chunk_rates.sort_by_key(|r| r.chunk_size);

        Ok(Self {
            abstained: strong.abstained(),
            unanswerable_total: strong.unanswerable.len(),
            answered: strong.answered(),
            answerable_total: strong.answerable.len(),
            chunk_rates,
        })
    }

    /// 환각 방지 (faithfulness 대용): 기권 ÷ 답변 불가 질문
    pub fn faithfulness_proxy(&self) -> f64 {
        ratio(self.abstained, self.unanswerable_total)
    }

    /// 답변 품질: 답변 ÷ 답변 가능 질문
    pub fn answer_quality(&self) -> f64 {
        ratio(self.answered, self.answerable_total)
    }

    /// 성공률 100%인 가장 작은 청크 크기
    pub fn optimal_chunk_size(&self) -> Option<usize> {
        self.chunk_rates
            .iter()
            .filter(|r| r.is_optimal())
            .map(|r| r.chunk_size)
            .min()
    }

    pub fn faithfulness_label(&self) -> &'static str {
        status_label(self.faithfulness_proxy() >= 1.0)
    }

    pub fn quality_label(&self) -> &'static str {
        status_label(self.answer_quality() >= QUALITY_TARGET)
    }

    /// 텍스트 리포트
    pub fn render(&self) -> String {
        let rule = "=".repeat(70);
        let mut out = String::new();

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "RAG PIPELINE QUALITY REPORT");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "\n{:<30} {:<10} Status", "Metric", "Score");
        let _ = writeln!(out, "{}", "-".repeat(70));

        let _ = writeln!(
            out,
            "{:<30} {:<10.3} {}",
            "Hallucination Prevention",
            self.faithfulness_proxy(),
            self.faithfulness_label()
        );
        let _ = writeln!(
            out,
            "  -> abstained on {}/{} unanswerable questions",
            self.abstained, self.unanswerable_total
        );
        let _ = writeln!(
            out,
            "{:<30} {:<10.3} {}",
            "Answer Quality",
            self.answer_quality(),
            self.quality_label()
        );
        let _ = writeln!(
            out,
            "  -> answered {}/{} answerable questions",
            self.answered, self.answerable_total
        );

        let _ = writeln!(out, "\n{}", rule);
        let _ = writeln!(out, "RETRIEVAL QUALITY (chunking experiment)");
        let _ = writeln!(out, "{}", rule);

        let optimal = self.optimal_chunk_size();
        for rate in &self.chunk_rates {
            let _ = writeln!(
                out,
                "{} chars: {:.1}% success rate  {}",
                rate.chunk_size,
                rate.rate() * 100.0,
                rate.label()
            );
            if Some(rate.chunk_size) == optimal {
                let _ = writeln!(out, "  -> SELECTED as optimal chunk size");
            }
        }
        if optimal.is_none() {
            let _ = writeln!(out, "No chunk size reached a 100% success rate");
        }

        out
    }
}

fn status_label(excellent: bool) -> &'static str {
    if excellent {
        "EXCELLENT"
    } else {
        "NEEDS WORK"
    }
}
