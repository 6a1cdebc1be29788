//! 추천 질문 생성 - 관련도 구간에 따라 세 가지 동작으로 분기
//!
//! - HIGH: 매칭된 로봇 모델을 언급하는 기술 질문 (LLM 1회 호출)
//! - MEDIUM: 모델을 언급하지 않는 일반 로보틱스 질문 (LLM 1회 호출)
//! - LOW: 고정된 되묻기 질문 (외부 호출 없음)
//!
//! 현재 점수기는 0.9 / 0.2만 만들기 때문에 MEDIUM 분기는 도달하지 않습니다.
//! 연속 점수기가 들어올 때를 위해 분기는 유지합니다.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::matcher::{find_relevant_robots, DEFAULT_TOP_K};
use super::relevance::{relevance_score, RelevanceBand};
use crate::catalog::RobotCatalog;
use crate::config::DEFAULT_COMPLETION_TIMEOUT_SECS;
use crate::llm::{complete_with_timeout, CompletionError, CompletionService};

/// 기본 추천 개수
pub const DEFAULT_MAX_SUGGESTIONS: usize = 2;

/// 반환 상한
pub const SUGGESTION_LIMIT: usize = 3;

pub const SUGGESTION_SYSTEM_PROMPT: &str = "You generate highly relevant follow-up questions.";

/// LOW 구간 고정 질문
pub const CLARIFYING_QUESTIONS: [&str; 2] = [
    "Which Kawasaki robot model are you asking about?",
    "Do you want specifications, manuals, or part numbers?",
];

/// 추천 생성 에러 (복구 가능)
#[derive(Error, Debug)]
pub enum SuggestionError {
    #[error("robot matching failed: {0:#}")]
    Matching(anyhow::Error),
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

// ============================================================================
// Prompts
// ============================================================================

/// HIGH 구간 프롬프트
pub fn technical_prompt(query: &str, robots: &[String], max_suggestions: usize) -> String {
    format!(
        "User query: \"{query}\"\n\
         Relevant robots: {robots}\n\
         \n\
         Generate {max_suggestions} extremely relevant follow-up questions.\n\
         Rules:\n\
         - They MUST relate to the robot(s) referenced.\n\
         - They MUST be technical (payload, reach, axes, manuals, repeatability, etc.)\n\
         - No generic questions.\n\
         - Output ONLY the questions, one per line.\n",
        robots = robots.join(", "),
    )
}

/// MEDIUM 구간 프롬프트
pub fn general_prompt(query: &str, max_suggestions: usize) -> String {
    format!(
        "User query: \"{query}\"\n\
         \n\
         Generate {max_suggestions} robotics-related follow-up questions.\n\
         Rules:\n\
         - Broader robotics topics allowed.\n\
         - Avoid referencing specific robot models.\n\
         - Output ONLY the questions, one per line.\n"
    )
}

/// 완성 응답을 줄 단위로 나눠 최대 3개
pub fn parse_suggestions(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(SUGGESTION_LIMIT)
        .map(str::to_string)
        .collect()
}

// ============================================================================
// SuggestionGenerator
// ============================================================================

/// 추천 질문 생성기
///
/// 호출 간 상태가 없습니다. 카탈로그와 완성 서비스만 공유합니다.
#[derive(Clone)]
pub struct SuggestionGenerator {
    catalog: Arc<RobotCatalog>,
    completion: Arc<dyn CompletionService>,
    timeout: Duration,
}

impl SuggestionGenerator {
    pub fn new(catalog: Arc<RobotCatalog>, completion: Arc<dyn CompletionService>) -> Self {
        Self {
            catalog,
            completion,
            timeout: Duration::from_secs(DEFAULT_COMPLETION_TIMEOUT_SECS),
        }
    }

    /// 완성 호출 타임아웃 변경
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 추천 질문 생성
    ///
    /// HIGH/MEDIUM은 완성 서비스를 한 번 호출하고, LOW는 고정 목록을 반환합니다.
    /// 완성 응답이 비어 있으면 빈 목록입니다.
    pub async fn suggest(
        &self,
        query: &str,
        max_suggestions: usize,
    ) -> Result<Vec<String>, SuggestionError> {
        let score = relevance_score(&self.catalog, query);

        let prompt = match score.band() {
            RelevanceBand::High => {
                let robots = find_relevant_robots(&self.catalog, query, DEFAULT_TOP_K)
                    .await
                    .map_err(SuggestionError::Matching)?;
                technical_prompt(query, &robots, max_suggestions)
            }
            RelevanceBand::Medium => general_prompt(query, max_suggestions),
            RelevanceBand::Low => {
                return Ok(CLARIFYING_QUESTIONS.iter().map(|q| q.to_string()).collect());
            }
        };

        tracing::debug!(
            "Generating suggestions (score={}, band={:?}, service={})",
            score,
            score.band(),
            self.completion.name()
        );

        let response = complete_with_timeout(
            self.completion.as_ref(),
            SUGGESTION_SYSTEM_PROMPT,
            &prompt,
            self.timeout,
        )
        .await?;

        Ok(parse_suggestions(&response))
    }

    /// 실패 시 빈 목록으로 대체
    pub async fn suggest_or_fallback(&self, query: &str, max_suggestions: usize) -> Vec<String> {
        match self.suggest(query, max_suggestions).await {
            Ok(suggestions) => suggestions,
            Err(e) => {
                tracing::warn!("Suggestion generation failed: {}", e);
                Vec::new()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubCompletion, StubEmbedder};

    async fn generator(completion: Arc<StubCompletion>) -> SuggestionGenerator {
        let catalog = RobotCatalog::load_default(Arc::new(StubEmbedder::new()))
            .await
            .unwrap();
        SuggestionGenerator::new(Arc::new(catalog), completion)
    }

    #[tokio::test]
    async fn test_low_relevance_returns_fixed_questions_without_call() {
        let completion = Arc::new(StubCompletion::replying("should not be used"));
        let generator = generator(completion.clone()).await;

        let suggestions = generator.suggest("hello", DEFAULT_MAX_SUGGESTIONS).await.unwrap();
        assert_eq!(suggestions, CLARIFYING_QUESTIONS.to_vec());
        assert_eq!(completion.call_count(), 0);
    }

    #[tokio::test]
    async fn test_high_relevance_parses_lines() {
        let completion = Arc::new(StubCompletion::replying(
            "  What is the RS007N payload?  \n\n What is the RS007N repeatability?\n\
             Which manual covers RS007N axes?\nExtra line\n",
        ));
        let generator = generator(completion.clone()).await;

        let suggestions = generator
            .suggest("RS007N payload and reach", DEFAULT_MAX_SUGGESTIONS)
            .await
            .unwrap();

        assert_eq!(
            suggestions,
            vec![
                "What is the RS007N payload?",
                "What is the RS007N repeatability?",
                "Which manual covers RS007N axes?",
            ]
        );
        assert_eq!(completion.call_count(), 1);

        let (system, user) = &completion.prompts()[0];
        assert_eq!(system, SUGGESTION_SYSTEM_PROMPT);
        assert!(user.contains("User query: \"RS007N payload and reach\""));
        assert!(user.contains("Relevant robots: RS007N"));
        assert!(user.contains("Generate 2 extremely relevant"));
    }

    #[tokio::test]
    async fn test_empty_completion_yields_empty_list() {
        let completion = Arc::new(StubCompletion::replying(""));
        let generator = generator(completion).await;

        let suggestions = generator
            .suggest("RS007N payload and reach", DEFAULT_MAX_SUGGESTIONS)
            .await
            .unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_completion_failure_is_recoverable() {
        let completion = Arc::new(StubCompletion::failing());
        let generator = generator(completion).await;

        let err = generator
            .suggest("bx200l reach", DEFAULT_MAX_SUGGESTIONS)
            .await
            .unwrap_err();
        assert!(matches!(err, SuggestionError::Completion(_)));

        let fallback = generator
            .suggest_or_fallback("bx200l reach", DEFAULT_MAX_SUGGESTIONS)
            .await;
        assert!(fallback.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_empty() {
        let completion =
            Arc::new(StubCompletion::replying("late").with_delay(Duration::from_millis(200)));
        let generator = generator(completion)
            .await
            .with_timeout(Duration::from_millis(10));

        let fallback = generator
            .suggest_or_fallback("mx350l axes", DEFAULT_MAX_SUGGESTIONS)
            .await;
        assert!(fallback.is_empty());
    }

    #[test]
    fn test_general_prompt_has_no_model_list() {
        let prompt = general_prompt("how do welding robots work", 2);
        assert!(prompt.contains("Generate 2 robotics-related follow-up questions."));
        assert!(!prompt.contains("Relevant robots"));
    }

    #[test]
    fn test_parse_suggestions_caps_at_three() {
        let parsed = parse_suggestions("a\nb\nc\nd");
        assert_eq!(parsed, vec!["a", "b", "c"]);
        assert!(parse_suggestions("\n  \n").is_empty());
    }
}
