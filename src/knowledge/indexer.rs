//! 매뉴얼 색인기 - 추출 → 청킹 → 임베딩 → 벡터 저장
//!
//! 같은 원본 파일을 다시 색인하면 임베딩이 모두 끝난 뒤 기존 벡터를 교체합니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::collector::CollectedManual;
use crate::embedding::EmbeddingProvider;
use crate::extractor::extract_manual;
use crate::manifest::Manifest;

use super::chunker::{default_chunker, Chunker};
use super::vector::{VectorEntry, VectorStore};

/// 한 번에 임베딩할 청크 수
const EMBED_BATCH_SIZE: usize = 32;

/// 색인 통계
#[derive(Debug, Default, Clone)]
pub struct IndexStats {
    pub manuals: usize,
    pub chunks: usize,
    pub skipped: usize,
    pub failed: Vec<(String, String)>,
}

/// 매뉴얼 색인기
pub struct ManualIndexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Box<dyn Chunker>,
    manifest: Option<Manifest>,
}

impl ManualIndexer {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            chunker: default_chunker(),
            manifest: None,
        }
    }

    /// 매니페스트로 모델 메타데이터 보강
    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    /// 수집된 매뉴얼 전체 색인
    ///
    /// 파일 하나의 실패는 통계에 기록하고 계속 진행합니다.
    pub async fn index_all(&self, manuals: &[CollectedManual]) -> Result<IndexStats> {
        let mut stats = IndexStats::default();

        for manual in manuals {
            tracing::info!("Processing {}", manual.source_name);

            let result = match extract_manual(&manual.path).await {
                Ok(extracted) if extracted.is_empty() => {
                    tracing::warn!("No text in {}, skipping", manual.source_name);
                    stats.skipped += 1;
                    continue;
                }
                Ok(extracted) => {
                    self.index_text(&manual.source_name, &manual.model, &extracted.full_text())
                        .await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(count) => {
                    stats.manuals += 1;
                    stats.chunks += count;
                }
                Err(e) => {
                    tracing::warn!("Failed to index {}: {:#}", manual.source_name, e);
                    stats
                        .failed
                        .push((manual.source_name.clone(), format!("{:#}", e)));
                }
            }
        }

        tracing::info!(
            "Indexed {} manuals ({} chunks, {} skipped, {} failed)",
            stats.manuals,
            stats.chunks,
            stats.skipped,
            stats.failed.len()
        );
        Ok(stats)
    }

    /// 텍스트 한 건 색인, 저장된 청크 수 반환
    ///
    /// 모든 청크를 임베딩한 뒤에만 기존 벡터를 교체합니다.
    /// 임베딩이 실패하면 이전 색인이 그대로 남습니다.
    pub async fn index_text(&self, source_name: &str, model: &str, text: &str) -> Result<usize> {
        let row = self.manifest.as_ref().and_then(|m| m.lookup(model));
        let robot_model = row
            .map(|r| r.model.clone())
            .unwrap_or_else(|| model.to_string());

        let mut base_metadata = BTreeMap::new();
        if let Some(row) = row {
            base_metadata.extend(row.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
            base_metadata.insert("manual_url".to_string(), row.manual_url.clone());
        }
        base_metadata.insert("model".to_string(), robot_model.clone());
        base_metadata.insert("source".to_string(), source_name.to_string());

        let chunks = self.chunker.chunk(text);
        let mut entries = Vec::with_capacity(chunks.len());

        for (batch_no, batch) in chunks.chunks(EMBED_BATCH_SIZE).enumerate() {
            let embeddings = self
                .embedder
                .embed_batch(batch)
                .await
                .context("Failed to embed chunks")?;
            anyhow::ensure!(
                embeddings.len() == batch.len(),
                "Embedding count mismatch: expected {}, got {}",
                batch.len(),
                embeddings.len()
            );

            let offset = batch_no * EMBED_BATCH_SIZE;
            for (i, (chunk, embedding)) in batch.iter().zip(embeddings).enumerate() {
                let chunk_index = offset + i;
                let mut metadata = base_metadata.clone();
                metadata.insert("chunk".to_string(), chunk_index.to_string());

                entries.push(VectorEntry {
                    source_name: source_name.to_string(),
                    chunk_index: chunk_index as i32,
                    robot_model: robot_model.clone(),
                    chunk_text: chunk.clone(),
                    metadata,
                    embedding,
                });
            }
        }

        let removed = self
            .store
            .delete_by_source(source_name)
            .await
            .context("Failed to remove previous vectors")?;
        if removed > 0 {
            tracing::debug!("Removed {} stale vectors for {}", removed, source_name);
        }

        if entries.is_empty() {
            return Ok(0);
        }

        let inserted = self
            .store
            .insert_batch(&entries)
            .await
            .context("Failed to insert vectors")?;

        tracing::debug!("{}: {} chunks ({})", source_name, inserted, robot_model);
        Ok(inserted)
    }
}

// ============================================================================
// Tests
// ============================================================================
