//! 매뉴얼 매니페스트 - 로봇 모델별 매뉴얼 URL과 메타데이터
//!
//! JSON 배열 형식:
//! ```json
//! [
//!   { "model": "RS007N", "manual_url": "https://...", "extra": { "Type": "Small" } }
//! ]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 매니페스트 한 행
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualSource {
    /// 로봇 모델 (예: RS007N)
    pub model: String,
    /// 매뉴얼 PDF 또는 제품 페이지 URL
    pub manual_url: String,
    /// 추가 메타데이터 (사양표 컬럼 등)
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// 매뉴얼 매니페스트
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    sources: Vec<ManualSource>,
}

impl Manifest {
    pub fn new(sources: Vec<ManualSource>) -> Self {
        Self { sources }
    }

    /// JSON 파일에서 로드
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {:?}", path))?;
        Self::from_json(&raw).with_context(|| format!("Invalid manifest: {:?}", path))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let sources: Vec<ManualSource> =
            serde_json::from_str(raw).context("Failed to parse manifest JSON")?;

        if let Some(bad) = sources
            .iter()
            .find(|s| s.model.trim().is_empty() || s.manual_url.trim().is_empty())
        {
            anyhow::bail!("Manifest row missing model or manual_url: {:?}", bad);
        }

        Ok(Self { sources })
    }

    pub fn sources(&self) -> &[ManualSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// 모델 메타데이터 조회
    ///
    /// 대문자로 바꾼 매니페스트 모델명에 `model`이 포함된 첫 행을 돌려줍니다.
    /// 예: `ZD130S` → `ZD130S / ZDE130S` 행.
    pub fn lookup(&self, model: &str) -> Option<&ManualSource> {
        let needle = model.trim().to_uppercase();
        if needle.is_empty() {
            return None;
        }
        self.sources
            .iter()
            .find(|s| s.model.to_uppercase().contains(&needle))
    }
}
