//! Text Chunking Module
//!
//! 매뉴얼 PDF에서 뽑은 텍스트를 재귀적 문자 분할로 청크화합니다.
//! 문단 → 줄 → 단어 → 문자 순으로 더 잘게 나누고, 나눈 조각을
//! 최대 크기까지 다시 합치면서 이전 청크 끝부분을 오버랩으로 남깁니다.

use std::collections::VecDeque;

use anyhow::Result;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정 (문자 수 기준)
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최대 청크 크기
    pub chunk_size: usize,
    /// 인접 청크 간 오버랩
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// 분할 구분자 (거친 것부터)
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveCharacterSplitter
// ============================================================================

/// 재귀적 문자 분할기
pub struct RecursiveCharacterSplitter {
    config: ChunkConfig,
    separators: Vec<String>,
}

impl RecursiveCharacterSplitter {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Result<Self> {
        anyhow::ensure!(config.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            config.chunk_overlap < config.chunk_size,
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            config.chunk_overlap,
            config.chunk_size
        );

        Ok(Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// 기본 설정 (1000 / 200)
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkConfig::default(),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // 텍스트에 존재하는 첫 구분자 선택 ("" 는 항상 선택 가능)
        let (index, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, s)| s.is_empty() || text.contains(s.as_str()))
            .map(|(i, s)| (i, s.as_str()))
            .unwrap_or((separators.len(), ""));
        let remaining = separators.get(index + 1..).unwrap_or(&[]);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(|c| c.to_string()).collect()
        } else {
            text.split(separator)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut good: Vec<String> = Vec::new();

        for piece in pieces {
            if char_len(&piece) < self.config.chunk_size {
                good.push(piece);
                continue;
            }

            if !good.is_empty() {
                chunks.extend(self.merge_splits(&good, separator));
                good.clear();
            }

            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !good.is_empty() {
            chunks.extend(self.merge_splits(&good, separator));
        }

        chunks
    }

    /// 작은 조각들을 chunk_size까지 합치고 오버랩 꼬리를 남김
    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(split);
            let joiner = if current.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.config.chunk_size && !current.is_empty() {
                push_joined(&mut docs, &current, separator);

                // 오버랩 크기 이하가 될 때까지 앞에서 제거
                while total > self.config.chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len }
                            > self.config.chunk_size)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + if current.is_empty() { 0 } else { sep_len };
                }
            }

            let joiner = if current.is_empty() { 0 } else { sep_len };
            current.push_back(split);
            total += len + joiner;
        }

        push_joined(&mut docs, &current, separator);
        docs
    }
}

impl Chunker for RecursiveCharacterSplitter {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        self.split_recursive(text, &self.separators)
    }

    fn name(&self) -> &'static str {
        "RecursiveCharacterSplitter"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_joined(docs: &mut Vec<String>, parts: &VecDeque<&str>, separator: &str) {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(RecursiveCharacterSplitter::with_defaults())
}

// ============================================================================
// Tests
// ============================================================================
