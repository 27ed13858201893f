//! RAG 모듈 - 프롬프트 템플릿과 검색 증강 생성 파이프라인

pub mod prompt;
mod pipeline;

pub use pipeline::{QuestionAnswerer, RagAnswer, RagConfig, RagPipeline};
pub use prompt::{format_context, GuardrailLevel, PromptTemplate, ABSTAIN_ANSWER};
