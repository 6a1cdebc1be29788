//! Vector Store - 매뉴얼 청크 벡터 검색 트레이트 및 유틸리티
//!
//! 각 벡터는 원본 매뉴얼 파일 이름, 청크 인덱스, 로봇 모델을 메타데이터로
//! 함께 저장합니다. QA 답변의 출처 표시에 이 메타데이터를 사용합니다.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 원본 파일 이름 (예: RS007N.pdf)
    pub source_name: String,
    /// 청크 인덱스 (0-based)
    pub chunk_index: i32,
    /// 로봇 모델 (예: RS007N)
    pub robot_model: String,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 매니페스트 행 + `source`/`chunk` 메타데이터
    pub metadata: BTreeMap<String, String>,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub source_name: String,
    pub chunk_index: i32,
    pub robot_model: String,
    pub chunk_text: String,
    pub metadata: BTreeMap<String, String>,
    /// 유사도 스코어 (높을수록 가까움)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 벡터 배치 삽입
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 벡터 검색 (유사도 내림차순)
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// 원본 파일 단위 삭제
    async fn delete_by_source(&self, source_name: &str) -> Result<usize>;

    /// 벡터 개수 조회
    async fn count(&self) -> Result<usize>;

    /// 색인된 원본 파일 목록 (정렬됨)
    async fn list_sources(&self) -> Result<Vec<String>>;
}

// ============================================================================
// MemoryVectorStore
// ============================================================================

/// 메모리 내 전수 비교 벡터 저장소
///
/// 소규모 코퍼스와 테스트용입니다.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    entries: RwLock<Vec<VectorEntry>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        self.entries.write().await.extend_from_slice(entries);
        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let entries = self.entries.read().await;
        let mut results: Vec<SearchResult> = entries
            .iter()
            .map(|e| SearchResult {
                source_name: e.source_name.clone(),
                chunk_index: e.chunk_index,
                robot_model: e.robot_model.clone(),
                chunk_text: e.chunk_text.clone(),
                metadata: e.metadata.clone(),
                similarity: cosine_similarity(query_embedding, &e.embedding),
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        Ok(results)
    }

    async fn delete_by_source(&self, source_name: &str) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.source_name != source_name);
        Ok(before - entries.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        let sources: BTreeSet<String> = entries.iter().map(|e| e.source_name.clone()).collect();
        Ok(sources.into_iter().collect())
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 0 벡터면 0.0입니다.
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

    fn entry(source: &str, chunk_index: i32, embedding: Vec<f32>) -> VectorEntry {
        VectorEntry {
            source_name: source.to_string(),
            chunk_index,
            robot_model: source.trim_end_matches(".pdf").to_string(),
            chunk_text: format!("{} chunk {}", source, chunk_index),
            metadata: BTreeMap::new(),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);
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
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn test_memory_store_search_and_delete() {
        let store = MemoryVectorStore::new();
        store
            .insert_batch(&[
                entry("RS007N.pdf", 0, vec![1.0, 0.0]),
                entry("RS007N.pdf", 1, vec![0.9, 0.1]),
                entry("BX200L.pdf", 0, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source_name, "RS007N.pdf");
        assert_eq!(results[0].chunk_index, 0);
        assert_eq!(results[1].chunk_index, 1);

        assert_eq!(
            store.list_sources().await.unwrap(),
            vec!["BX200L.pdf", "RS007N.pdf"]
        );
        assert_eq!(store.delete_by_source("RS007N.pdf").await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
