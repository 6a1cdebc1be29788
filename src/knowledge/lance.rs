//! LanceDB Vector Store - 매뉴얼 청크 벡터 인덱스
//!
//! 청크 텍스트와 출처 메타데이터(파일 이름, 청크 번호, 로봇 모델)를
//! 임베딩과 같은 행에 저장합니다. 검색은 코사인 거리를 사용합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::collections::{BTreeMap, BTreeSet};
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
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::DistanceType;

use super::vector::{SearchResult, VectorEntry, VectorStore};

/// 벡터 테이블 이름
const TABLE_NAME: &str = "manual_chunks";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
pub struct LanceVectorStore {
    db: Connection,
    dimension: i32,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `dimension` - 임베딩 차원 (임베딩 프로바이더와 일치해야 함)
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let dimension = i32::try_from(dimension).context("Embedding dimension too large")?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self { db, dimension })
    }

    fn create_schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("source_name", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("robot_model", DataType::Utf8, false),
            Field::new("chunk_text", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(&self, entries: &[VectorEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        if let Some(bad) = entries
            .iter()
            .find(|e| e.embedding.len() != self.dimension as usize)
        {
            anyhow::bail!(
                "Embedding dimension mismatch for {}#{}: expected {}, got {}",
                bad.source_name,
                bad.chunk_index,
                self.dimension,
                bad.embedding.len()
            );
        }

        let sources: Vec<&str> = entries.iter().map(|e| e.source_name.as_str()).collect();
        let chunk_indices: Vec<i32> = entries.iter().map(|e| e.chunk_index).collect();
        let models: Vec<&str> = entries.iter().map(|e| e.robot_model.as_str()).collect();
        let chunk_texts: Vec<&str> = entries.iter().map(|e| e.chunk_text.as_str()).collect();
        let metadata: Vec<String> = entries
            .iter()
            .map(|e| serde_json::to_string(&e.metadata))
            .collect::<Result<_, _>>()
            .context("Failed to serialize chunk metadata")?;

        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            self.dimension,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        RecordBatch::try_new(
            Arc::new(self.create_schema()),
            vec![
                Arc::new(StringArray::from(sources)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(models)),
                Arc::new(StringArray::from(chunk_texts)),
                Arc::new(StringArray::from(metadata)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.iter().any(|n| n == TABLE_NAME))
            .unwrap_or(false)
    }

    /// 테이블 열기 (없으면 None)
    async fn open_table(&self) -> Result<Option<lancedb::table::Table>> {
        if !self.table_exists().await {
            return Ok(None);
        }

        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table")?;
        Ok(Some(table))
    }
}

/// LanceDB 필터용 문자열 리터럴
fn sql_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn parse_metadata(raw: &str) -> Result<BTreeMap<String, String>> {
    serde_json::from_str(raw).context("Invalid chunk metadata JSON")
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = self.entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        match self.open_table().await? {
            Some(table) => {
                table
                    .add(batches)
                    .execute()
                    .await
                    .context("Failed to add vectors to table")?;
            }
            None => {
                self.db
                    .create_table(TABLE_NAME, batches)
                    .execute()
                    .await
                    .context("Failed to create table")?;
            }
        }

        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let Some(table) = self.open_table().await? else {
            return Ok(vec![]);
        };

        let stream = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = stream.try_collect().await?;
        let mut search_results = Vec::new();

        for batch in batches {
            let sources = string_column(&batch, "source_name")?;
            let models = string_column(&batch, "robot_model")?;
            let chunk_texts = string_column(&batch, "chunk_text")?;
            let metadata = string_column(&batch, "metadata")?;

            let chunk_indices = batch
                .column_by_name("chunk_index")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing chunk_index column"))?;

            // _distance 컬럼 (LanceDB가 자동 추가, 코사인 거리 = 1 - 유사도)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                search_results.push(SearchResult {
                    source_name: sources.value(i).to_string(),
                    chunk_index: chunk_indices.value(i),
                    robot_model: models.value(i).to_string(),
                    chunk_text: chunk_texts.value(i).to_string(),
                    metadata: parse_metadata(metadata.value(i))?,
                    similarity: 1.0 - distances.value(i),
                });
            }
        }

        Ok(search_results)
    }

    async fn delete_by_source(&self, source_name: &str) -> Result<usize> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        let filter = format!("source_name = {}", sql_string_literal(source_name));
        let before = table
            .count_rows(Some(filter.clone()))
            .await
            .context("Failed to count rows for source")?;

        if before > 0 {
            table
                .delete(&filter)
                .await
                .context("Failed to delete vectors")?;
        }

        Ok(before)
    }

    async fn count(&self) -> Result<usize> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        table.count_rows(None).await.context("Failed to count rows")
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        let Some(table) = self.open_table().await? else {
            return Ok(vec![]);
        };

        let stream = table
            .query()
            .select(Select::Columns(vec!["source_name".to_string()]))
            .execute()
            .await
            .context("Failed to scan sources")?;

        let batches: Vec<RecordBatch> = stream.try_collect().await?;
        let mut sources = BTreeSet::new();
        for batch in &batches {
            let column = string_column(batch, "source_name")?;
            for i in 0..batch.num_rows() {
                sources.insert(column.value(i).to_string());
            }
        }

        Ok(sources.into_iter().collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
