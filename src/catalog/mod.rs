//! 로봇 카탈로그 - 모델명, 설명문, 별칭 패턴
//!
//! 프로세스 시작 시 한 번 로드되고 이후 변경되지 않습니다.
//! 로드할 때 각 설명문의 임베딩을 계산해 보관하며, 임베딩 백엔드에
//! 접근할 수 없으면 로드 자체가 실패합니다 (부분 카탈로그 없음).
//!
//! 별칭 테이블은 선언 순서대로 평가됩니다. 두 패턴이 겹치면 먼저 선언된
//! 패턴이 이깁니다. 이 순서는 쿼리 확장 결과를 결정하므로 바꾸면 안 됩니다.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::embedding::EmbeddingProvider;

// ============================================================================
// Built-in Tables
// ============================================================================

/// 로봇 정의 (정적 테이블 행)
#[derive(Debug, Clone, Copy)]
pub struct RobotDefinition<'a> {
    pub canonical_name: &'a str,
    pub description_text: &'a str,
}

/// 별칭 정의 (정적 테이블 행)
#[derive(Debug, Clone, Copy)]
pub struct AliasDefinition<'a> {
    pub pattern: &'a str,
    pub canonical_name: &'a str,
}

/// 기본 로봇 목록
pub const BUILTIN_ROBOTS: &[RobotDefinition<'static>] = &[
    RobotDefinition {
        canonical_name: "RS007N",
        description_text: "RS007N payload, reach, description, axes, repeatability, manuals",
    },
    RobotDefinition {
        canonical_name: "BX200L",
        description_text: "BX200L payload, reach, description, axes, repeatability, manuals",
    },
    RobotDefinition {
        canonical_name: "ZD130S / ZDE130S",
        description_text: "ZD130S payload, reach, description, axes, repeatability, manuals",
    },
    RobotDefinition {
        canonical_name: "MX350L",
        description_text: "MX350L payload, reach, description, axes, repeatability, manuals",
    },
];

/// 기본 별칭 테이블 (선언 순서 = 치환 우선순위)
///
/// ZD130S 패턴은 이미 정규화된 `zd130s / zde130s`를 통째로 흡수하므로
/// 정규 이름을 다시 확장해도 바뀌지 않습니다.
/// 이 패턴은 `zde130s` 단독 표기도 잡으므로 `zde130s`만 언급한 질의도
/// HIGH 관련도가 됩니다 (이전 별칭 집합에서는 LOW).
pub const BUILTIN_ALIASES: &[AliasDefinition<'static>] = &[
    AliasDefinition { pattern: r"\brs007n\b", canonical_name: "RS007N" },
    AliasDefinition { pattern: r"\brs013n\b", canonical_name: "RS013N" },
    AliasDefinition { pattern: r"\brs015x\b", canonical_name: "RS015X" },
    AliasDefinition { pattern: r"\brs020n\b", canonical_name: "RS020N" },
    AliasDefinition { pattern: r"\brs080n\b", canonical_name: "RS080N" },
    AliasDefinition { pattern: r"\bbx100s\b", canonical_name: "BX100S" },
    AliasDefinition { pattern: r"\bbx100n\b", canonical_name: "BX100N" },
    AliasDefinition { pattern: r"\bbx200l\b", canonical_name: "BX200L" },
    AliasDefinition { pattern: r"\bbx200x\b", canonical_name: "BX200X" },
    AliasDefinition {
        pattern: r"\bzd130s\b(?:\s*/\s*zde130s\b)?|\bzde130s\b",
        canonical_name: "ZD130S / ZDE130S",
    },
    AliasDefinition { pattern: r"\bmx350l\b", canonical_name: "MX350L" },
];

// ============================================================================
// Types
// ============================================================================

/// 카탈로그 로드 에러 (치명적)
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("robot catalog has no entries")]
    Empty,
    #[error("invalid alias pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("failed to embed catalog descriptions: {0:#}")]
    Embedding(anyhow::Error),
    #[error("embedding backend returned {actual} vectors for {expected} descriptions")]
    CountMismatch { expected: usize, actual: usize },
    #[error("embedding for {name} has dimension {actual}, expected {expected}")]
    Dimension {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// 카탈로그 엔트리
#[derive(Debug, Clone)]
pub struct RobotEntry {
    pub canonical_name: String,
    pub description_text: String,
    pub embedding: Vec<f32>,
}

/// 별칭 패턴 (대소문자 무시, 단어 경계)
#[derive(Debug, Clone)]
pub struct AliasPattern {
    pub pattern: Regex,
    pub canonical_name: String,
}

impl AliasPattern {
    /// 패턴 컴파일
    pub fn new(pattern: &str, canonical_name: &str) -> Result<Self, CatalogError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| CatalogError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            pattern: regex,
            canonical_name: canonical_name.to_string(),
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

// ============================================================================
// RobotCatalog
// ============================================================================

/// 불변 로봇 카탈로그 핸들
///
/// 쿼리 인텔리전스 함수들은 모두 이 핸들을 참조로 받습니다.
/// 질의 임베딩에도 카탈로그를 만든 프로바이더를 그대로 사용합니다.
pub struct RobotCatalog {
    entries: Vec<RobotEntry>,
    aliases: Vec<AliasPattern>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for RobotCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobotCatalog")
            .field("entries", &self.names())
            .field("aliases", &self.aliases.len())
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

impl RobotCatalog {
    /// 기본 테이블로 카탈로그 로드
    pub async fn load_default(embedder: Arc<dyn EmbeddingProvider>) -> Result<Self, CatalogError> {
        Self::load(embedder, BUILTIN_ROBOTS, BUILTIN_ALIASES).await
    }

    /// 지정 테이블로 카탈로그 로드
    ///
    /// 별칭을 먼저 컴파일한 뒤 설명문을 한 번에 임베딩합니다.
    pub async fn load(
        embedder: Arc<dyn EmbeddingProvider>,
        robots: &[RobotDefinition<'_>],
        aliases: &[AliasDefinition<'_>],
    ) -> Result<Self, CatalogError> {
        if robots.is_empty() {
            return Err(CatalogError::Empty);
        }

        let aliases = aliases
            .iter()
            .map(|a| AliasPattern::new(a.pattern, a.canonical_name))
            .collect::<Result<Vec<_>, _>>()?;

        let texts: Vec<String> = robots
            .iter()
            .map(|r| r.description_text.to_string())
            .collect();

        let embeddings = embedder
            .embed_batch(&texts)
            .await
            .map_err(CatalogError::Embedding)?;

        if embeddings.len() != robots.len() {
            return Err(CatalogError::CountMismatch {
                expected: robots.len(),
                actual: embeddings.len(),
            });
        }

        let expected = embeddings[0].len();
        let mut entries = Vec::with_capacity(robots.len());
        for (robot, embedding) in robots.iter().zip(embeddings) {
            if embedding.is_empty() || embedding.len() != expected {
                return Err(CatalogError::Dimension {
                    name: robot.canonical_name.to_string(),
                    expected,
                    actual: embedding.len(),
                });
            }
            entries.push(RobotEntry {
                canonical_name: robot.canonical_name.to_string(),
                description_text: robot.description_text.to_string(),
                embedding,
            });
        }

        tracing::info!(
            "Robot catalog loaded ({} robots, {} aliases, embedder={})",
            entries.len(),
            aliases.len(),
            embedder.name()
        );

        Ok(Self {
            entries,
            aliases,
            embedder,
        })
    }

    /// 카탈로그 엔트리 (삽입 순서)
    pub fn entries(&self) -> &[RobotEntry] {
        &self.entries
    }

    /// 별칭 테이블 (선언 순서)
    pub fn alias_table(&self) -> &[AliasPattern] {
        &self.aliases
    }

    /// 정규 이름 목록
    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.canonical_name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 카탈로그를 만든 임베딩 프로바이더
    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingEmbedder, StubEmbedder, STUB_DIMENSION};

    #[tokio::test]
    async fn test_load_default_catalog() {
        let embedder = Arc::new(StubEmbedder::new());
        let catalog = RobotCatalog::load_default(embedder.clone()).await.unwrap();

        assert_eq!(
            catalog.names(),
            vec!["RS007N", "BX200L", "ZD130S / ZDE130S", "MX350L"]
        );
        assert_eq!(catalog.alias_table().len(), BUILTIN_ALIASES.len());
        assert!(catalog
            .entries()
            .iter()
            .all(|e| e.embedding.len() == STUB_DIMENSION));
        // 설명문마다 한 번씩
        assert_eq!(embedder.calls(), BUILTIN_ROBOTS.len());
    }

    #[tokio::test]
    async fn test_load_is_deterministic() {
        let a = RobotCatalog::load_default(Arc::new(StubEmbedder::new()))
            .await
            .unwrap();
        let b = RobotCatalog::load_default(Arc::new(StubEmbedder::new()))
            .await
            .unwrap();
        assert_eq!(a.names(), b.names());
        for (x, y) in a.entries().iter().zip(b.entries()) {
            assert_eq!(x.embedding, y.embedding);
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_is_fatal() {
        let result = RobotCatalog::load_default(Arc::new(FailingEmbedder)).await;
        assert!(matches!(result, Err(CatalogError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_empty_catalog_rejected() {
        let result = RobotCatalog::load(Arc::new(StubEmbedder::new()), &[], BUILTIN_ALIASES).await;
        assert!(matches!(result, Err(CatalogError::Empty)));
    }

    #[tokio::test]
    async fn test_invalid_pattern_rejected() {
        let aliases = [AliasDefinition {
            pattern: r"\b(rs007n",
            canonical_name: "RS007N",
        }];
        let embedder = Arc::new(StubEmbedder::new());
        let result = RobotCatalog::load(embedder.clone(), BUILTIN_ROBOTS, &aliases).await;
        assert!(matches!(result, Err(CatalogError::InvalidPattern { .. })));
        // 패턴 오류는 임베딩 호출 전에 잡힘
        assert_eq!(embedder.calls(), 0);
    }

    #[test]
    fn test_alias_pattern_word_boundary() {
        let alias = AliasPattern::new(r"\brs007n\b", "RS007N").unwrap();
        assert!(alias.is_match("tell me about rs007n payload"));
        assert!(alias.is_match("RS007N"));
        assert!(!alias.is_match("rs007nx"));
        assert!(!alias.is_match("xrs007n"));
    }

    #[test]
    fn test_zd130s_alias_absorbs_canonical() {
        let alias = AliasPattern::new(BUILTIN_ALIASES[9].pattern, "ZD130S / ZDE130S").unwrap();
        let m = alias.pattern.find("zd130s / zde130s").unwrap();
        assert_eq!(m.as_str(), "zd130s / zde130s");
        assert!(alias.is_match("zde130s manual"));
    }
}
