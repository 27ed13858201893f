//! Knowledge 모듈 - RAG 문서 로딩 · 청킹 · 벡터 인덱스
//!
//! - Loader: 폴더의 `.txt` 문서 로드
//! - Chunker: 재귀 문자 분할 (크기/오버랩 문자 수 기준)
//! - LanceDB: 컬렉션 단위 벡터 검색 (cosine / l2 / dot)

mod chunker;
mod lance;
mod loader;
mod vector;

// Re-exports
pub use chunker::{Chunk, ChunkConfig, Chunker, RecursiveChunker, DEFAULT_SEPARATORS};
pub use lance::LanceVectorStore;
pub use loader::{load_documents, SourceDocument};
pub use vector::{cosine_similarity, DistanceMetric, SearchResult, VectorEntry, VectorStore};
