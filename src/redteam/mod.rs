//! 레드팀 모듈
//!
//! - `bench`: 공격 파일 기반 라이브 벤치마크 (봇 → judge Toxicity)
//! - `safety`: 단일 적대적 케이스에 Toxicity → Bias
//! - `adversarial`: RAG 대상 적대적 질문 스위트

mod adversarial;
mod attacks;
mod bench;
mod safety;

pub use adversarial::{
    judge_answer, AdversarialCase, AdversarialCategory, AdversarialReport, AdversarialSuite,
    CaseOutcome, CaseResult, CategorySummary,
};
pub use attacks::{Attack, AttackFile};
pub use bench::RedTeamBench;
pub use safety::SafetyEvaluation;
