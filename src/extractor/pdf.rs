//! PDF 텍스트 추출
//!
//! pdf-extract로 전체 텍스트를 뽑은 뒤 폼피드(`\x0c`)로 페이지를 나누고,
//! 청킹 전에 줄바꿈/공백을 정리합니다.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

/// PDF 파일에서 페이지별 텍스트 추출 (빈 페이지 제외)
pub fn extract_pages(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![]);
    }

    Ok(split_pages(&text))
}

/// 폼피드로 페이지 분리 후 정리
pub fn split_pages(text: &str) -> Vec<String> {
    text.split('\x0c')
        .map(normalize_text)
        .filter(|page| !page.is_empty())
        .collect()
}

fn hyphen_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w)-\n(\w)").expect("valid regex"))
}

fn blank_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

fn inline_spaces() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("valid regex"))
}

/// 추출 텍스트 정리
///
/// - CRLF → LF
/// - 줄 끝 하이픈 연결 복원 (`repeat-\nability` → `repeatability`)
/// - 연속 공백/탭 축소, 줄 끝 공백 제거
/// - 3줄 이상 빈 줄은 문단 경계 하나로
pub fn normalize_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = hyphen_break().replace_all(&text, "$1$2");
    let text = inline_spaces().replace_all(&text, " ");
    let text: String = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    blank_lines().replace_all(&text, "\n\n").trim().to_string()
}

// ============================================================================
// Tests
// ============================================================================
