//! 매뉴얼 파일 수집 모듈
//!
//! 매뉴얼 디렉토리에서 PDF 파일을 찾고, 파일 이름에서 로봇 모델을 추정합니다.
//! 파일 이름 규칙: `<MODEL>.pdf` 또는 `<MODEL>_<suffix>.pdf`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

// ============================================================================
// Collected Manual
// ============================================================================

/// 수집된 매뉴얼 파일
#[derive(Debug, Clone)]
pub struct CollectedManual {
    /// 파일 경로
    pub path: PathBuf,
    /// 파일 이름 (벡터 메타데이터의 source)
    pub source_name: String,
    /// 파일 이름에서 추정한 로봇 모델
    pub model: String,
    /// 파일 크기 (바이트)
    pub size: u64,
}

/// 파일 이름에서 로봇 모델 추정
///
/// stem을 대문자로 바꾸고 `_` 앞부분만 사용합니다.
pub fn model_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?.to_uppercase();
    let model = stem.split('_').next().unwrap_or_default().trim().to_string();
    if model.is_empty() {
        None
    } else {
        Some(model)
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

// ============================================================================
// Manual Collector
// ============================================================================

/// 매뉴얼 수집기
pub struct ManualCollector {
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    max_file_size: u64,
}

impl Default for ManualCollector {
    fn default() -> Self {
        Self {
            max_file_size: 200 * 1024 * 1024,
        }
    }
}

impl ManualCollector {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// 디렉토리의 PDF 매뉴얼 수집 (경로 순 정렬)
    pub fn collect(&self, dir: &Path) -> Result<Vec<CollectedManual>> {
        if !dir.is_dir() {
            anyhow::bail!("Manuals directory not found: {:?}", dir);
        }

        let mut manuals = Vec::new();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_pdf(entry.path()) {
                continue;
            }

            let path = entry.path().to_path_buf();
            let Some(model) = model_from_path(&path) else {
                tracing::warn!("Cannot infer robot model from {:?}", path);
                continue;
            };

            let size = entry
                .metadata()
                .with_context(|| format!("Failed to read metadata: {:?}", path))?
                .len();

            if self.max_file_size > 0 && size > self.max_file_size {
                tracing::debug!("Skipping large file: {:?} ({} bytes)", path, size);
                continue;
            }

            let source_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            manuals.push(CollectedManual {
                path,
                source_name,
                model,
                size,
            });
        }

        tracing::info!("Collected {} manuals from {:?}", manuals.len(), dir);
        Ok(manuals)
    }
}

// ============================================================================
// Tests
// ============================================================================
