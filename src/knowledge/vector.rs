//! Vector Store - 벡터 검색 트레이트 및 유틸리티
//!
//! 컬렉션 단위로 청크 임베딩을 저장하고 유사도 검색을 수행합니다.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 원본 파일 이름
    pub source: String,
    /// 청크 인덱스 (0-based)
    pub chunk_index: i32,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// 원본 파일 이름
    pub source: String,
    /// 청크 인덱스
    pub chunk_index: i32,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 유사도 스코어 (높을수록 유사)
    pub similarity: f32,
}

// ============================================================================
// Distance Metric
// ============================================================================

/// 벡터 거리 메트릭
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// 코사인 거리 (기본)
    #[default]
    Cosine,
    /// 유클리드(L2) 거리
    L2,
    /// 내적
    Dot,
}

impl DistanceMetric {
    /// LanceDB 거리 타입으로 변환
    pub fn to_lance(self) -> lancedb::DistanceType {
        match self {
            DistanceMetric::Cosine => lancedb::DistanceType::Cosine,
            DistanceMetric::L2 => lancedb::DistanceType::L2,
            DistanceMetric::Dot => lancedb::DistanceType::Dot,
        }
    }

    /// 거리 → 유사도 변환
    ///
    /// cosine/dot 거리는 `1 - sim` 으로 정의되므로 역변환하고,
    /// L2 는 `1 / (1 + d)` 로 (0, 1] 범위에 사상합니다.
    pub fn similarity(self, distance: f32) -> f32 {
        match self {
            DistanceMetric::Cosine | DistanceMetric::Dot => 1.0 - distance,
            DistanceMetric::L2 => 1.0 / (1.0 + distance),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::L2 => "l2",
            DistanceMetric::Dot => "dot",
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다. 하나의 인스턴스는 하나의 컬렉션을 다룹니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 컬렉션 삭제 (이전 실행의 청크 제거)
    async fn reset(&self) -> Result<()>;

    /// 벡터 배치 삽입
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 벡터 검색 (유사도 내림차순)
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// 벡터 개수 조회
    async fn count(&self) -> Result<usize>;

    /// 특정 출처의 청크 존재 여부
    async fn has_source(&self, source: &str) -> Result<bool>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위이며, 길이가 다르거나 영벡터면 0.0 입니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_distance_to_similarity() {
        assert!((DistanceMetric::Cosine.similarity(0.25) - 0.75).abs() < 1e-6);
        assert!((DistanceMetric::Dot.similarity(0.0) - 1.0).abs() < 1e-6);
        assert!((DistanceMetric::L2.similarity(1.0) - 0.5).abs() < 1e-6);
        assert!((DistanceMetric::L2.similarity(0.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_metric_serde_lowercase() {
        let json = serde_json::to_string(&DistanceMetric::L2).unwrap();
        assert_eq!(json, "\"l2\"");
        let parsed: DistanceMetric = serde_json::from_str("\"dot\"").unwrap();
        assert_eq!(parsed, DistanceMetric::Dot);
        assert_eq!(DistanceMetric::default(), DistanceMetric::Cosine);
    }
}
