//! 테스트용 결정적 임베딩/완성 스텁

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::llm::{CompletionError, CompletionService};

pub const STUB_DIMENSION: usize = 64;

/// 토큰 해시 bag-of-words 임베더
#[derive(Debug, Default)]
pub struct StubEmbedder {
    calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; STUB_DIMENSION];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        vector[(hash % STUB_DIMENSION as u64) as usize] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(bag_of_words(text))
    }

    fn dimension(&self) -> usize {
        STUB_DIMENSION
    }

    fn name(&self) -> &str {
        "stub-bow"
    }
}

/// 항상 실패하는 임베더
#[derive(Debug, Default)]
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        anyhow::bail!("embedding backend unreachable")
    }

    fn dimension(&self) -> usize {
        STUB_DIMENSION
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// 고정 응답 완성 스텁 (호출 기록)
///
/// `failing_on` / `slow_on`은 지정한 시스템 프롬프트 호출에만 적용됩니다.
#[derive(Debug)]
pub struct StubCompletion {
    reply: Option<String>,
    delay: Duration,
    fail_on: Option<String>,
    slow_on: Option<(String, Duration)>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl StubCompletion {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            delay: Duration::ZERO,
            fail_on: None,
            slow_on: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: Duration::ZERO,
            fail_on: None,
            slow_on: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_on(mut self, system_prompt: &str) -> Self {
        self.fail_on = Some(system_prompt.to_string());
        self
    }

    pub fn slow_on(mut self, system_prompt: &str, delay: Duration) -> Self {
        self.slow_on = Some((system_prompt.to_string(), delay));
        self
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionService for StubCompletion {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, CompletionError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some((prompt, delay)) = &self.slow_on {
            if prompt == system_prompt {
                tokio::time::sleep(*delay).await;
            }
        }
        let failing = self.fail_on.as_deref() == Some(system_prompt);
        match &self.reply {
            Some(_) if failing => Err(CompletionError::Service {
                status: 503,
                message: "service unavailable".into(),
            }),
            Some(reply) => Ok(reply.clone()),
            None => Err(CompletionError::Service {
                status: 503,
                message: "service unavailable".into(),
            }),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}
