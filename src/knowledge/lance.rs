//! LanceDB Vector Store - 컬렉션 단위 벡터 검색
//!
//! 컬렉션 하나가 LanceDB 테이블 하나입니다. 임베딩 차원은 처음 삽입되는
//! 벡터에서 결정됩니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::vector::{DistanceMetric, SearchResult, VectorEntry, VectorStore};

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
pub struct LanceVectorStore {
    db: Connection,
    collection: String,
    metric: DistanceMetric,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - 영속 디렉토리 경로
    /// * `collection` - 컬렉션(테이블) 이름
    /// * `metric` - 검색 거리 메트릭
    pub async fn open(path: &Path, collection: &str, metric: DistanceMetric) -> Result<Self> {
        if !path.exists() {
            tokio::fs::create_dir_all(path)
                .await
                .context("Failed to create LanceDB directory")?;
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            db,
            collection: collection.to_string(),
            metric,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// 같은 DB의 다른 컬렉션 핸들
    pub fn with_collection(&self, collection: &str) -> Self {
        Self {
            db: self.db.clone(),
            collection: collection.to_string(),
            metric: self.metric,
        }
    }

    /// DB에 존재하는 컬렉션 목록
    pub async fn collections(&self) -> Result<Vec<String>> {
        self.db
            .table_names()
            .execute()
            .await
            .context("Failed to list LanceDB tables")
    }

    /// 벡터 테이블 스키마 생성
    fn create_schema(dimension: i32) -> Schema {
        Schema::new(vec![
            Field::new("source", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("chunk_text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(entries: &[VectorEntry]) -> Result<RecordBatch> {
        let first = entries
            .first()
            .ok_or_else(|| anyhow::anyhow!("Cannot create batch from empty entries"))?;

        let dimension = first.embedding.len();
        if dimension == 0 {
            anyhow::bail!("Embedding vectors must not be empty");
        }
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimension) {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {} ({}#{})",
                dimension,
                bad.embedding.len(),
                bad.source,
                bad.chunk_index
            );
        }
        let dimension = i32::try_from(dimension).context("Embedding dimension too large")?;

        let sources: Vec<&str> = entries.iter().map(|e| e.source.as_str()).collect();
        let chunk_indices: Vec<i32> = entries.iter().map(|e| e.chunk_index).collect();
        let chunk_texts: Vec<&str> = entries.iter().map(|e| e.chunk_text.as_str()).collect();

        // 임베딩을 FixedSizeList로 변환
        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list =
            FixedSizeListArray::try_new(field, dimension, Arc::new(values) as Arc<dyn Array>, None)
                .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(Self::create_schema(dimension)),
            vec![
                Arc::new(StringArray::from(sources)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(chunk_texts)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> Result<bool> {
        Ok(self.collections().await?.contains(&self.collection))
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(&self.collection)
            .execute()
            .await
            .with_context(|| format!("Failed to open collection '{}'", self.collection))
    }
}

/// SQL 문자열 리터럴 이스케이프
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn reset(&self) -> Result<()> {
        if self.table_exists().await? {
            self.db
                .drop_table(&self.collection)
                .await
                .with_context(|| format!("Failed to drop collection '{}'", self.collection))?;
            tracing::info!("Dropped collection '{}'", self.collection);
        }
        Ok(())
    }

    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = Self::entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await? {
            let table = self.open_table().await?;
            table
                .add(batches)
                .execute()
                .await
                .context("Failed to add vectors to collection")?;
        } else {
            self.db
                .create_table(&self.collection, batches)
                .execute()
                .await
                .context("Failed to create collection")?;
        }

        tracing::debug!(
            "Inserted {} vectors into '{}'",
            entries.len(),
            self.collection
        );
        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if limit == 0 || !self.table_exists().await? {
            return Ok(vec![]);
        }

        let table = self.open_table().await?;

        let stream = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .distance_type(self.metric.to_lance())
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = stream.try_collect().await?;
        let mut results = Vec::new();

        for batch in batches {
            let sources = batch
                .column_by_name("source")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing source column"))?;

            let chunk_indices = batch
                .column_by_name("chunk_index")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing chunk_index column"))?;

            let chunk_texts = batch
                .column_by_name("chunk_text")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing chunk_text column"))?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                results.push(SearchResult {
                    source: sources.value(i).to_string(),
                    chunk_index: chunk_indices.value(i),
                    chunk_text: chunk_texts.value(i).to_string(),
                    similarity: self.metric.similarity(distances.value(i)),
                });
            }
        }

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }

    async fn has_source(&self, source: &str) -> Result<bool> {
        if !self.table_exists().await? {
            return Ok(false);
        }

        let table = self.open_table().await?;
        let filter = format!("source = {}", quote_literal(source));
        let count = table
            .count_rows(Some(filter))
            .await
            .context("Failed to count rows for source")?;

        Ok(count > 0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(source: &str, chunk_index: i32, embedding: Vec<f32>) -> VectorEntry {
        VectorEntry {
            source: source.to_string(),
            chunk_index,
            chunk_text: format!("chunk {} of {}", chunk_index, source),
            embedding,
        }
    }

    async fn open_store(dir: &TempDir, metric: DistanceMetric) -> LanceVectorStore {
        LanceVectorStore::open(&dir.path().join("db"), "test_docs", metric)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_lance_store_basic() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, DistanceMetric::Cosine).await;

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&[1.0, 0.0, 0.0], 3).await.unwrap().is_empty());

        let entries = vec![
            entry("refund.txt", 0, vec![1.0, 0.0, 0.0]),
            entry("refund.txt", 1, vec![0.9, 0.1, 0.0]),
            entry("leave.txt", 0, vec![0.0, 1.0, 0.0]),
        ];
        assert_eq!(store.insert_batch(&entries).await.unwrap(), 3);
        assert_eq!(store.count().await.unwrap(), 3);

        assert!(store.has_source("refund.txt").await.unwrap());
        assert!(!store.has_source("o'brien.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_lance_cosine_search_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, DistanceMetric::Cosine).await;

        store
            .insert_batch(&[
                entry("leave.txt", 0, vec![0.0, 1.0, 0.0]),
                entry("refund.txt", 0, vec![1.0, 0.0, 0.0]),
                entry("onboarding.txt", 0, vec![0.0, 0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.1, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "refund.txt");
        assert!(results[0].similarity > 0.9);
        assert!(results[0].similarity >= results[1].similarity);
    }

    /// 저장 후 `query` 로 검색한 결과의 source 순서
    async fn ranked(metric: DistanceMetric, entries: &[VectorEntry], query: &[f32]) -> Vec<SearchResult> {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, metric).await;
        store.insert_batch(entries).await.unwrap();
        store.search(query, entries.len()).await.unwrap()
    }

    #[tokio::test]
    async fn test_lance_l2_search_order() {
        // 코사인으로는 near / far 가 동점이지만 L2 로는 거리가 다름
        let results = ranked(
            DistanceMetric::L2,
            &[
                entry("far.txt", 0, vec![3.0, 0.0, 0.0]),
                entry("side.txt", 0, vec![0.0, 2.0, 0.0]),
                entry("near.txt", 0, vec![1.0, 0.0, 0.0]),
            ],
            &[1.0, 0.0, 0.0],
        )
        .await;

        let order: Vec<&str> = results.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(order, vec!["near.txt", "far.txt", "side.txt"]);
        assert!((results[0].similarity - 1.0).abs() < 1e-4);
        for pair in results.windows(2) {
            assert!(pair[0].similarity > pair[1].similarity);
        }
        assert!(results.iter().all(|r| r.similarity > 0.0 && r.similarity <= 1.0));
    }

    #[tokio::test]
    async fn test_lance_dot_search_order() {
        // 코사인으로는 long / short 가 동점이지만 내적은 크기를 반영
        let results = ranked(
            DistanceMetric::Dot,
            &[
                entry("short.txt", 0, vec![0.5, 0.0, 0.0]),
                entry("other.txt", 0, vec![0.0, 1.0, 0.0]),
                entry("long.txt", 0, vec![2.0, 0.0, 0.0]),
            ],
            &[1.0, 0.0, 0.0],
        )
        .await;

        let order: Vec<&str> = results.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(order, vec!["long.txt", "short.txt", "other.txt"]);
        for pair in results.windows(2) {
            assert!(pair[0].similarity > pair[1].similarity);
        }
    }

    #[tokio::test]
    async fn test_lance_reset_drops_collection() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, DistanceMetric::L2).await;

        store
            .insert_batch(&[entry("refund.txt", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        store.reset().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        // 리셋 후 다른 차원으로 다시 생성 가능
        store
            .insert_batch(&[entry("refund.txt", 0, vec![1.0, 0.0, 0.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, DistanceMetric::Cosine).await;
        let other = store.with_collection("chunks_200");

        store
            .insert_batch(&[entry("refund.txt", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(other.count().await.unwrap(), 0);
        assert_eq!(other.collection(), "chunks_200");
        assert!(store.collections().await.unwrap().contains(&"test_docs".to_string()));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let result = LanceVectorStore::entries_to_batch(&[
            entry("a.txt", 0, vec![1.0, 0.0]),
            entry("a.txt", 1, vec![1.0, 0.0, 0.0]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("o'brien.txt"), "'o''brien.txt'");
    }
}
