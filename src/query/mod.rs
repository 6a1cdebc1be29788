//! Query 모듈 - 쿼리 인텔리전스
//!
//! - relevance: 별칭 언급 여부로 관련도 점수 계산
//! - matcher: 카탈로그 설명문과의 코사인 유사도 top-k
//! - expand: 별칭 정규화 + 검색 힌트
//! - suggest: 관련도 구간별 추천 질문 생성
//!
//! 모든 함수는 불변 `RobotCatalog` 핸들을 참조로 받습니다.

mod expand;
mod matcher;
mod relevance;
mod suggest;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::catalog::RobotCatalog;
use crate::llm::CompletionService;

// Re-exports
pub use expand::{expand_query, RETRIEVAL_SUFFIX};
pub use matcher::{find_relevant_matches, find_relevant_robots, RobotMatch, DEFAULT_TOP_K};
pub use relevance::{
    relevance_score, RelevanceBand, RelevanceScore, HIGH_RELEVANCE, HIGH_THRESHOLD,
    LOW_RELEVANCE, MEDIUM_THRESHOLD,
};
pub use suggest::{
    general_prompt, parse_suggestions, technical_prompt, SuggestionError, SuggestionGenerator,
    CLARIFYING_QUESTIONS, DEFAULT_MAX_SUGGESTIONS, SUGGESTION_LIMIT, SUGGESTION_SYSTEM_PROMPT,
};

/// 쿼리 인텔리전스 묶음
///
/// QA 체인과 CLI가 공유하는 진입점입니다.
#[derive(Clone)]
pub struct QueryIntelligence {
    catalog: Arc<RobotCatalog>,
    suggestions: SuggestionGenerator,
}

impl QueryIntelligence {
    pub fn new(
        catalog: Arc<RobotCatalog>,
        completion: Arc<dyn CompletionService>,
        timeout: Duration,
    ) -> Self {
        let suggestions = SuggestionGenerator::new(catalog.clone(), completion).with_timeout(timeout);
        Self {
            catalog,
            suggestions,
        }
    }

    pub fn catalog(&self) -> &RobotCatalog {
        &self.catalog
    }

    pub fn expand_query(&self, query: &str) -> String {
        expand_query(&self.catalog, query)
    }

    pub fn relevance_score(&self, query: &str) -> RelevanceScore {
        relevance_score(&self.catalog, query)
    }

    pub async fn find_relevant_robots(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        find_relevant_robots(&self.catalog, query, top_k).await
    }

    pub async fn find_relevant_matches(&self, query: &str, top_k: usize) -> Result<Vec<RobotMatch>> {
        find_relevant_matches(&self.catalog, query, top_k).await
    }

    pub async fn suggest_queries(
        &self,
        query: &str,
        max_suggestions: usize,
    ) -> Result<Vec<String>, SuggestionError> {
        self.suggestions.suggest(query, max_suggestions).await
    }

    /// 실패 시 빈 목록
    pub async fn suggest_queries_or_empty(&self, query: &str, max_suggestions: usize) -> Vec<String> {
        self.suggestions
            .suggest_or_fallback(query, max_suggestions)
            .await
    }
}
