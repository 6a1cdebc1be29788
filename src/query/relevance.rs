//! 관련도 점수 - 알려진 로봇 별칭 언급 여부

use crate::catalog::RobotCatalog;

/// 별칭이 언급된 경우의 점수
pub const HIGH_RELEVANCE: f32 = 0.9;
/// 별칭이 없는 경우의 점수
pub const LOW_RELEVANCE: f32 = 0.2;

/// HIGH 구간 하한
pub const HIGH_THRESHOLD: f32 = 0.7;
/// MEDIUM 구간 하한
pub const MEDIUM_THRESHOLD: f32 = 0.3;

/// 관련도 구간
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelevanceBand {
    /// >= 0.7
    High,
    /// [0.3, 0.7)
    Medium,
    /// < 0.3
    Low,
}

/// 관련도 점수
///
/// 연속적인 신뢰도가 아니라 이진 분류 결과를 float로 표현한 값입니다.
/// 현재 점수기는 0.9 / 0.2만 만들기 때문에 MEDIUM 구간에는 도달하지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct RelevanceScore(pub f32);

impl RelevanceScore {
    pub fn value(self) -> f32 {
        self.0
    }

    pub fn band(self) -> RelevanceBand {
        if self.0 >= HIGH_THRESHOLD {
            RelevanceBand::High
        } else if self.0 >= MEDIUM_THRESHOLD {
            RelevanceBand::Medium
        } else {
            RelevanceBand::Low
        }
    }
}

impl std::fmt::Display for RelevanceScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// 쿼리 관련도 계산
///
/// 소문자로 바꾼 뒤 별칭을 선언 순서대로 검사하고 첫 일치에서 멈춥니다.
/// 여러 별칭이 일치해도 가중치는 없습니다.
pub fn relevance_score(catalog: &RobotCatalog, query: &str) -> RelevanceScore {
    let query_lower = query.to_lowercase();
    match catalog
        .alias_table()
        .iter()
        .find(|alias| alias.is_match(&query_lower))
    {
        Some(alias) => {
            tracing::debug!("Query mentions {}", alias.canonical_name);
            RelevanceScore(HIGH_RELEVANCE)
        }
        None => RelevanceScore(LOW_RELEVANCE),
    }
}
