//! 임베딩 모듈 - Gemini API를 통한 텍스트 벡터화
//!
//! 로봇 카탈로그 설명문, 매뉴얼 청크, 사용자 질문을 같은 임베딩 공간으로
//! 변환합니다. 카탈로그 매칭과 매뉴얼 검색이 모두 이 모듈을 사용합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = GeminiEmbedding::new(api_key)?;
//! let embedding = embedder.embed("RS007N payload").await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 같은 모델 버전이면 같은 입력에 같은 벡터를 돌려준다고 가정합니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩 (문서/카탈로그용)
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 검색 질의 임베딩 (기본 구현: `embed`와 동일)
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// Gemini API base URL
/// source: https://ai.google.dev/gemini-api/docs/embeddings
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const GEMINI_MODEL: &str = "models/gemini-embedding-001";

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 768;

/// batchEmbedContents 한 번에 보낼 최대 텍스트 수
const MAX_BATCH_SIZE: usize = 100;

/// 호출 간 최소 딜레이 (무료 티어 60 RPM)
const MIN_DELAY_MS: u64 = 1000;
/// 429 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;

/// Gemini taskType
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskType {
    Document,
    Query,
}

impl TaskType {
    fn as_str(self) -> &'static str {
        match self {
            TaskType::Document => "RETRIEVAL_DOCUMENT",
            TaskType::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    dimension: usize,
    last_request: Arc<Mutex<Option<Instant>>>,
    min_delay: Duration,
}

impl GeminiEmbedding {
    /// 기본 차원(768)으로 생성
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_dimension(api_key, DEFAULT_DIMENSION)
    }

    /// 차원을 지정하여 생성 (768, 1536, 3072 중 선택)
    pub fn with_dimension(api_key: impl Into<String>, dimension: usize) -> Result<Self> {
        if ![768, 1536, 3072].contains(&dimension) {
            anyhow::bail!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                dimension
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            client,
            dimension,
            last_request: Arc::new(Mutex::new(None)),
            min_delay: Duration::from_millis(MIN_DELAY_MS),
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env() -> Result<Self> {
        let api_key = crate::config::get_api_key()?;
        Self::new(api_key)
    }

    /// API base URL 변경 (프록시, 테스트 서버)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// 호출 간 최소 딜레이 변경
    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// 최소 딜레이 적용 (버스트 방지)
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                tracing::debug!("Min delay: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// batchEmbedContents 호출 (429 시 지수 백오프)
    async fn request_batch(&self, texts: &[String], task: TaskType) -> Result<Vec<Vec<f32>>> {
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: GEMINI_MODEL,
                    content: EmbedContent {
                        parts: vec![EmbedPart { text }],
                    },
                    task_type: task.as_str(),
                    output_dimensionality: self.dimension,
                })
                .collect(),
        };

        let url = format!("{}/{}:batchEmbedContents", self.base_url, GEMINI_MODEL);
        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=MAX_RETRIES {
            self.throttle().await;

            // API 키는 URL이 아닌 헤더로 전송
            let response = match self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < MAX_RETRIES {
                        let backoff = backoff_for(attempt);
                        tracing::warn!(
                            "Embedding request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                let parsed: BatchEmbedResponse =
                    serde_json::from_str(&body).context("Failed to parse embedding response")?;
                if parsed.embeddings.len() != texts.len() {
                    anyhow::bail!(
                        "Embedding count mismatch: sent {}, received {}",
                        texts.len(),
                        parsed.embeddings.len()
                    );
                }
                return Ok(parsed.embeddings.into_iter().map(|e| e.values).collect());
            }

            if status.as_u16() == 429 {
                let backoff = backoff_for(attempt);
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));

                if attempt < MAX_RETRIES {
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                    anyhow::bail!(
                        "Gemini API error ({}): {}",
                        error.error.status,
                        error.error.message
                    );
                }
                anyhow::bail!("Gemini API error ({}): {}", status, body);
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }

    async fn embed_with(&self, texts: &[String], task: TaskType) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        // 빈 텍스트는 API 호출 없이 0 벡터
        let mut pending: Vec<(usize, String)> = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            results.push(Vec::new());
            if text.trim().is_empty() {
                results[i] = vec![0.0; self.dimension];
            } else {
                pending.push((i, text.clone()));
            }
        }

        for (n, batch) in pending.chunks(MAX_BATCH_SIZE).enumerate() {
            tracing::debug!(
                "Embedding batch {}/{}",
                n + 1,
                pending.len().div_ceil(MAX_BATCH_SIZE)
            );
            let inputs: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
            let vectors = self.request_batch(&inputs, task).await?;
            for ((i, _), vector) in batch.iter().zip(vectors) {
                results[*i] = vector;
            }
        }

        Ok(results)
    }
}

fn backoff_for(attempt: u32) -> Duration {
    Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt))
}

/// batchEmbedContents 요청 본문
/// source: https://ai.google.dev/api/embeddings#method:-models.batchembedcontents
#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'static str,
    content: EmbedContent<'a>,
    #[serde(rename = "taskType")]
    task_type: &'static str,
    #[serde(rename = "outputDimensionality")]
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct EmbedContent<'a> {
    parts: Vec<EmbedPart<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_with(&[text.to_string()], TaskType::Document).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_with(&[text.to_string()], TaskType::Query).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_with(texts, TaskType::Document).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "gemini-embedding-001"
    }
}

// ============================================================================
// Tests
// ============================================================================
