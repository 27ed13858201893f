//! Text Chunking Module
//!
//! 재귀 문자 분할(recursive character splitting)로 문서를
//! 고정 크기의 겹치는 청크로 나눕니다.
//!
//! 1. 구분자 우선순위: 문단(`\n\n`) → 줄(`\n`) → 공백(` `) → 문자 단위(`""`)
//! 2. 텍스트에 존재하는 첫 구분자로 분할 (구분자는 뒤 조각의 앞에 붙여 보존)
//! 3. `chunk_size`보다 작은 조각은 탐욕적으로 병합, 인접 청크 사이에
//!    최대 `chunk_overlap` 문자만큼 앞 청크의 끝 조각을 유지
//! 4. 너무 큰 조각은 다음 구분자로 재귀 분할
//!
//! 길이는 모두 문자(char) 수 기준입니다.

use anyhow::Result;

use super::loader::SourceDocument;

/// 기본 구분자 (우선순위 순)
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 오버랩 크기 (문자 수)
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than 0");
        }
        if self.chunk_overlap > self.chunk_size {
            anyhow::bail!(
                "chunk_overlap ({}) must not exceed chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        Ok(())
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// 출처 정보가 붙은 청크
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 청크 텍스트
    pub text: String,
    /// 원본 파일 이름
    pub source: String,
    /// 문서 내 청크 순번 (0-based)
    pub index: usize,
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;

    /// 문서 목록 분할 (출처 메타데이터 유지)
    fn split_documents(&self, docs: &[SourceDocument]) -> Vec<Chunk> {
        docs.iter()
            .flat_map(|doc| {
                self.chunk(&doc.content)
                    .into_iter()
                    .enumerate()
                    .map(|(index, text)| Chunk {
                        text,
                        source: doc.source.clone(),
                        index,
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

// ============================================================================
// RecursiveChunker
// ============================================================================

/// 재귀 문자 분할 청커
pub struct RecursiveChunker {
    config: ChunkConfig,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// 설정으로 생성 (설정 검증 포함)
    pub fn new(config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// 기본 설정 (500 / 50)
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkConfig::default(),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        // 텍스트에 존재하는 첫 구분자 선택 ("" 는 항상 매칭)
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let splits = split_keep_separator(text, separator);

        let mut good_splits: Vec<String> = Vec::new();
        for piece in splits {
            if char_len(&piece) < self.config.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                final_chunks.push(piece);
            } else {
                final_chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks
    }

    /// 작은 조각 병합 + 오버랩 유지
    ///
    /// 구분자는 이미 조각 앞에 붙어 있으므로 빈 문자열로 이어붙입니다.
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut docs = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_start = 0usize;
        let mut total = 0usize;

        for piece in splits {
            let len = char_len(piece);

            if total + len > size {
                if total > size {
                    tracing::warn!("Created a chunk of size {}, longer than {}", total, size);
                }

                if current.len() > current_start {
                    if let Some(doc) = join_trimmed(&current[current_start..]) {
                        docs.push(doc);
                    }

                    // 앞에서부터 조각을 버려 오버랩 이하로 축소
                    while current.len() > current_start
                        && (total > overlap || (total + len > size && total > 0))
                    {
                        total -= char_len(current[current_start]);
                        current_start += 1;
                    }
                }
            }

            current.push(piece);
            total += len;
        }

        if let Some(doc) = join_trimmed(&current[current_start..]) {
            docs.push(doc);
        }

        docs
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        let mut chunks = self.split_recursive(text, &self.separators);
        chunks.retain(|c| !c.trim().is_empty());
        chunks
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 구분자로 분할하되 구분자를 뒤 조각의 앞에 붙임 (빈 조각 제거)
///
/// 빈 구분자는 문자 단위 분할입니다.
fn split_keep_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(|c| c.to_string()).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;

    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(text[start..pos].to_string());
        }
        start = pos;
    }
    // 첫 조각 이후는 모두 구분자로 시작
    if start < text.len() {
        pieces.push(text[start..].to_string());
    }

    pieces.retain(|p| !p.is_empty());
    pieces
}

/// 조각을 이어붙이고 양끝 공백 제거 (비면 None)
fn join_trimmed(pieces: &[&str]) -> Option<String> {
    let joined: String = pieces.concat();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> RecursiveChunker {
        RecursiveChunker::new(ChunkConfig::new(size, overlap)).unwrap()
    }

    #[test]
    fn test_chunker_empty() {
        let chunker = RecursiveChunker::with_defaults();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("  \n\n ").is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunker = RecursiveChunker::with_defaults();
        let chunks = chunker.chunk("  Refunds are accepted within 30 days.  ");
        assert_eq!(chunks, vec!["Refunds are accepted within 30 days."]);
    }

    #[test]
    fn test_word_windows_with_overlap() {
        // 구분자가 조각 앞에 붙으므로 " e" 는 2문자
        let chunks = chunker(7, 3).chunk("a b c d e f g h i j");
        assert_eq!(chunks, vec!["a b c d", "d e f", "f g h", "h i j"]);
    }

    #[test]
    fn test_word_windows_without_overlap() {
        let chunks = chunker(7, 0).chunk("a b c d e f g h");
        assert_eq!(chunks, vec!["a b c d", "e f g", "h"]);
    }

    #[test]
    fn test_paragraphs_kept_together() {
        let text = "Refund policy.\n\nLeave policy.\n\nOnboarding.";
        let chunks = chunker(30, 0).chunk(text);
        assert_eq!(chunks, vec!["Refund policy.\n\nLeave policy.", "Onboarding."]);
    }

    #[test]
    fn test_long_word_split_by_chars() {
        let chunks = chunker(4, 0).chunk("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 4);
        }
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let text = "Customers can request a refund within 30 days of purchase. \
                    Refunds are processed within 5 business days of approval.\n\
                    Digital products are non-refundable once downloaded.\n\n\
                    Full-time employees receive 20 days of annual leave per year.";
        let chunks = chunker(60, 10).chunk(text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 60, "too long: {:?}", chunk);
            assert_eq!(chunk.trim(), chunk);
        }
    }

    #[test]
    fn test_unicode_counts_chars() {
        // 한글 한 글자 = 3바이트지만 1문자로 계산
        let chunks = chunker(5, 0).chunk("안녕 세계 만세");
        assert_eq!(chunks, vec!["안녕 세계", "만세"]);
    }

    #[test]
    fn test_invalid_config() {
        assert!(RecursiveChunker::new(ChunkConfig::new(10, 20)).is_err());
        assert!(RecursiveChunker::new(ChunkConfig::new(0, 0)).is_err());
        assert!(RecursiveChunker::new(ChunkConfig::new(10, 10)).is_ok());
    }

    #[test]
    fn test_split_keep_separator() {
        assert_eq!(
            split_keep_separator("a b  c", " "),
            vec!["a", " b", " ", " c"]
        );
        assert_eq!(split_keep_separator("ab", ""), vec!["a", "b"]);
        assert_eq!(split_keep_separator(" lead", " "), vec![" lead"]);
    }

    #[test]
    fn test_split_documents_keeps_source() {
        let docs = vec![
            SourceDocument {
                content: "a b c d e f g h".to_string(),
                source: "refund.txt".to_string(),
            },
            SourceDocument {
                content: "leave".to_string(),
                source: "leave.txt".to_string(),
            },
        ];

        let chunks = chunker(7, 0).split_documents(&docs);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].source, "refund.txt");
        assert_eq!(chunks[2].index, 2);
        assert_eq!(chunks[3].source, "leave.txt");
        assert_eq!(chunks[3].index, 0);
    }
}
