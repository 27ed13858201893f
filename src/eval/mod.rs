//! 평가 모듈 - judge 메트릭, 결과 레코드, 답변 검사
//!
//! - `metrics`: Toxicity / Bias / Faithfulness / GEval (judge 모델 호출)
//! - `record`: PASS/FAIL 레코드 JSON 저장
//! - `checks`: 기권 · 환각 표지 · 프롬프트 유출 등 문자열 검사

mod case;
pub mod checks;
pub mod judge;
mod metrics;
mod record;

use thiserror::Error;

use crate::llm::LlmError;

pub use case::{LlmTestCase, TestCaseParam};
pub use metrics::{
    BiasMetric, FaithfulnessMetric, GEval, Metric, MetricOutcome, ToxicityMetric,
    DEFAULT_THRESHOLD,
};
pub use record::{
    load_records, now_timestamp, save_records, write_pretty_json, EvalRecord, EvalStatus,
};

/// 평가 에러
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Judge model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Malformed judge verdict: {0}")]
    MalformedVerdict(String),

    #[error("Test case is missing required field: {0}")]
    MissingField(&'static str),
}

impl EvalError {
    /// judge 호출이 rate limit으로 실패했는지
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, EvalError::Llm(e) if e.is_rate_limit())
    }
}
