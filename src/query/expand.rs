//! 쿼리 확장 - 별칭을 정규 모델명으로 치환하고 검색 힌트 추가

use crate::catalog::RobotCatalog;

/// 확장된 쿼리 끝에 붙는 검색 힌트
pub const RETRIEVAL_SUFFIX: &str = " robot specifications";

/// 쿼리 확장
///
/// 1. 소문자 변환
/// 2. 별칭 테이블 선언 순서대로 모든 일치를 소문자 정규 이름으로 치환
/// 3. `" robot specifications"`를 한 번 붙임
///
/// 이미 확장된 쿼리를 다시 넣으면 접미사가 한 번 더 붙습니다.
pub fn expand_query(catalog: &RobotCatalog, query: &str) -> String {
    let mut expanded = query.to_lowercase();

    for alias in catalog.alias_table() {
        let canonical = alias.canonical_name.to_lowercase();
        // `$`가 그룹 참조로 해석되지 않도록 NoExpand
        expanded = alias
            .pattern
            .replace_all(&expanded, regex::NoExpand(&canonical))
            .into_owned();
    }

    expanded.push_str(RETRIEVAL_SUFFIX);
    expanded
}
