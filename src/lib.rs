//! palank-eval - LLM 레드팀 · RAG 품질 평가 도구
//!
//! 호스팅 Gemini API, 로컬 Ollama, LanceDB 벡터 저장소를 묶어
//! 적대적 프롬프트 평가, judge 메트릭, RAG 실험을 순차적으로 실행합니다.

pub mod cli;
pub mod config;
pub mod dataset;
pub mod embedding;
pub mod eval;
pub mod experiment;
pub mod iso;
pub mod knowledge;
pub mod llm;
pub mod rag;
pub mod redteam;

// Re-exports
pub use config::{get_data_dir, Pacing, Settings};
pub use embedding::{create_embedder, EmbedderKind, EmbeddingProvider};
pub use eval::{EvalError, EvalRecord, EvalStatus, LlmTestCase, Metric, MetricOutcome};
pub use knowledge::{
    ChunkConfig, Chunker, DistanceMetric, LanceVectorStore, RecursiveChunker, SearchResult,
    SourceDocument, VectorStore,
};
pub use llm::{create_model, KeyPool, LanguageModel, LlmError, ModelProvider};
pub use rag::{GuardrailLevel, PromptTemplate, QuestionAnswerer, RagAnswer, RagPipeline};
