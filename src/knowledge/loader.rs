//! 문서 로더 - 폴더의 `.txt` 파일 읽기

use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// 로드된 원문 문서
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// 파일 내용
    pub content: String,
    /// 파일 이름 (출처 메타데이터)
    pub source: String,
}

/// 폴더 바로 아래의 `*.txt` 파일을 파일 이름 순으로 로드
///
/// 하위 디렉토리는 탐색하지 않습니다. 폴더가 없으면 에러입니다.
pub fn load_documents(folder: &Path) -> Result<Vec<SourceDocument>> {
    if !folder.is_dir() {
        anyhow::bail!("Documents folder not found: {}", folder.display());
    }

    let mut docs = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.context("Failed to read documents folder")?;
        let path = entry.path();

        if !entry.file_type().is_file() {
            continue;
        }
        let is_txt = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);
        if !is_txt {
            continue;
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let source = entry.file_name().to_string_lossy().to_string();

        tracing::debug!("Loaded {} ({} chars)", source, content.chars().count());
        docs.push(SourceDocument { content, source });
    }

    tracing::info!("Loaded {} documents from {}", docs.len(), folder.display());
    Ok(docs)
}
