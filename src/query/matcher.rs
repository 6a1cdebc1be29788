//! 시맨틱 로봇 매칭 - 질의와 카탈로그 설명문의 코사인 유사도 top-k

use anyhow::{Context, Result};

use crate::catalog::RobotCatalog;
use crate::knowledge::cosine_similarity;

/// 기본 top-k
pub const DEFAULT_TOP_K: usize = 3;

/// 매칭 결과
#[derive(Debug, Clone, PartialEq)]
pub struct RobotMatch {
    pub canonical_name: String,
    pub similarity: f32,
}

/// 유사도 포함 top-k 매칭
///
/// 최소 유사도 기준이 없으므로 항상 `min(top_k, 카탈로그 크기)`개를
/// 돌려줍니다. "적당한 매칭 없음"이 필요하면 호출자가 `similarity`로 거릅니다.
/// 동점은 카탈로그 삽입 순서를 유지합니다 (안정 정렬).
pub async fn find_relevant_matches(
    catalog: &RobotCatalog,
    query: &str,
    top_k: usize,
) -> Result<Vec<RobotMatch>> {
    let query_embedding = catalog
        .embedder()
        .embed(query)
        .await
        .context("Failed to embed query for robot matching")?;

    let mut scored: Vec<RobotMatch> = catalog
        .entries()
        .iter()
        .map(|entry| RobotMatch {
            canonical_name: entry.canonical_name.clone(),
            similarity: cosine_similarity(&query_embedding, &entry.embedding),
        })
        .collect();

    // sort_by는 안정 정렬
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);

    Ok(scored)
}

/// 질의와 가장 비슷한 로봇 정규 이름 top-k (유사도 내림차순)
pub async fn find_relevant_robots(
    catalog: &RobotCatalog,
    query: &str,
    top_k: usize,
) -> Result<Vec<String>> {
    Ok(find_relevant_matches(catalog, query, top_k)
        .await?
        .into_iter()
        .map(|m| m.canonical_name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{RobotDefinition, BUILTIN_ALIASES};
    use crate::testing::StubEmbedder;
    use std::sync::Arc;

    async fn catalog() -> RobotCatalog {
        RobotCatalog::load_default(Arc::new(StubEmbedder::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_returns_exactly_top_k_catalog_names() {
        let catalog = catalog().await;
        let names = find_relevant_robots(&catalog, "RS007N payload and reach", 3)
            .await
            .unwrap();

        assert_eq!(names.len(), 3);
        for name in &names {
            assert!(catalog.names().contains(&name.as_str()));
        }
        assert_eq!(names[0], "RS007N");
    }

    #[tokio::test]
    async fn test_sorted_descending_and_stable() {
        let catalog = catalog().await;
        let first = find_relevant_matches(&catalog, "mx350l repeatability", 3)
            .await
            .unwrap();
        let second = find_relevant_matches(&catalog, "mx350l repeatability", 3)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0].canonical_name, "MX350L");
        assert!(first
            .windows(2)
            .all(|w| w[0].similarity >= w[1].similarity));
    }

    #[tokio::test]
    async fn test_poor_match_still_returns_results() {
        let catalog = catalog().await;
        let names = find_relevant_robots(&catalog, "zzz qqq", 3).await.unwrap();
        assert_eq!(names.len(), 3);
    }

    #[tokio::test]
    async fn test_ties_keep_catalog_order() {
        // 동일 설명문 → 동일 유사도
        let robots = [
            RobotDefinition { canonical_name: "A", description_text: "same text" },
            RobotDefinition { canonical_name: "B", description_text: "same text" },
            RobotDefinition { canonical_name: "C", description_text: "same text" },
        ];
        let catalog = RobotCatalog::load(Arc::new(StubEmbedder::new()), &robots, BUILTIN_ALIASES)
            .await
            .unwrap();

        let names = find_relevant_robots(&catalog, "same", 3).await.unwrap();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_top_k_larger_than_catalog() {
        let catalog = catalog().await;
        let names = find_relevant_robots(&catalog, "robot", 10).await.unwrap();
        assert_eq!(names.len(), catalog.len());
    }
}
