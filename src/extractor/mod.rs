//! 콘텐츠 추출 모듈
//!
//! 매뉴얼 PDF에서 색인할 텍스트를 추출합니다.
//! PDF 파싱은 CPU 바운드이므로 blocking 스레드에서 실행합니다.

pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};

/// 추출된 매뉴얼 텍스트
#[derive(Debug, Clone)]
pub struct ExtractedManual {
    /// 페이지별 텍스트 (빈 페이지 제외)
    pub pages: Vec<String>,
}

impl ExtractedManual {
    /// 전체 텍스트 (페이지는 문단 경계로 연결)
    pub fn full_text(&self) -> String {
        self.pages.join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// PDF 매뉴얼 텍스트 추출
pub async fn extract_manual(path: &Path) -> Result<ExtractedManual> {
    let owned = path.to_path_buf();
    let pages = tokio::task::spawn_blocking(move || pdf::extract_pages(&owned))
        .await
        .context("PDF extraction task failed")??;

    tracing::debug!("Extracted {} pages from {:?}", pages.len(), path);
    Ok(ExtractedManual { pages })
}
