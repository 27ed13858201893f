//! 실험 모듈 - RAG 설정 비교와 품질 리포트
//!
//! - `chunking`: 청크 크기별 검색 실패 비교
//! - `prompts`: 가드레일 수준별 기권/환각 비교
//! - `quality`: 저장된 실험 결과로 품질 리포트 생성
//! - `ragas`: 골든 데이터셋에 faithfulness + answer relevancy

pub mod chunking;
pub mod prompts;
pub mod quality;
pub mod ragas;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use chunking::{ChunkingExperiment, ChunkingRun, DEFAULT_CHUNK_SIZES, EXPERIMENT_OVERLAP};
pub use prompts::{run_prompt_experiment, JudgedAnswer, PromptRun};
pub use quality::{ChunkRate, QualityReport};
pub use ragas::{print_report, AnswerRelevancy, RagasEvaluation, RagasReport, RagasRow};

/// 질문 + 답변
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
}

/// 저장된 실험 결과 로드
pub fn load_results<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read experiment results: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid experiment results: {}", path.display()))
}

/// 앞부분 미리보기 (문자 단위)
pub(crate) fn preview(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

/// 0으로 나누면 0
pub(crate) fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::write_pretty_json;
    use tempfile::TempDir;

    #[test]
    fn test_results_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("chunking.json");
        let runs = vec![ChunkingRun {
            chunk_size: 500,
            chunk_count: 4,
            answers: vec![QuestionAnswer {
                question: "How long is maternity leave?".into(),
                answer: "26 weeks paid.".into(),
            }],
        }];

        write_pretty_json(&path, &runs).unwrap();
        let loaded: Vec<ChunkingRun> = load_results(&path).unwrap();
        assert_eq!(loaded, runs);
    }

    #[test]
    fn test_preview_counts_chars() {
        assert_eq!(preview("환불 정책입니다", 2), "환불");
        assert_eq!(ratio(1, 0), 0.0);
    }
}
