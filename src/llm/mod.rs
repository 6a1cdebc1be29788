//! LLM 모듈 - 텍스트 완성 서비스
//!
//! 추천 질문 생성, 후속 질문 재작성, 매뉴얼 기반 답변이 모두
//! `CompletionService` 하나를 통해 호스팅 LLM을 호출합니다.
//! 운영 구현체는 Groq의 OpenAI 호환 chat completions API입니다.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Settings, DEFAULT_GROQ_BASE_URL, DEFAULT_GROQ_MODEL};

// ============================================================================
// Error type
// ============================================================================

/// 완성 서비스 에러 (호출자 입장에서 복구 가능)
#[derive(Error, Debug)]
pub enum CompletionError {
    /// API 키 미설정
    #[error("completion API key not configured")]
    MissingApiKey,
    /// HTTP 요청 실패
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// 시간 초과
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
    /// 서비스가 에러 상태 코드를 반환
    #[error("completion service returned {status}: {message}")]
    Service { status: u16, message: String },
    /// 응답 형식 오류
    #[error("unexpected response format: {0}")]
    BadResponse(String),
}

// ============================================================================
// CompletionService Trait
// ============================================================================

/// 텍스트 완성 서비스 트레이트
///
/// 같은 입력이라도 호출마다 결과가 다를 수 있습니다.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// 시스템 프롬프트 + 사용자 프롬프트로 한 번 완성
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, CompletionError>;

    /// 서비스 이름 (로그용)
    fn name(&self) -> &str;
}

/// 타임아웃을 걸어 완성 호출
///
/// 만료되면 `CompletionError::Timeout`을 돌려줍니다.
pub async fn complete_with_timeout(
    service: &dyn CompletionService,
    system_prompt: &str,
    user_prompt: &str,
    timeout: Duration,
) -> Result<String, CompletionError> {
    match tokio::time::timeout(timeout, service.complete(system_prompt, user_prompt)).await {
        Ok(result) => result,
        Err(_) => Err(CompletionError::Timeout(timeout)),
    }
}

// ============================================================================
// Groq (OpenAI-compatible)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Groq chat completions 클라이언트
#[derive(Debug, Clone)]
pub struct GroqClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl GroqClient {
    /// 기본 모델(`llama-3.1-8b-instant`), temperature 0.0으로 생성
    pub fn new(api_key: impl Into<String>) -> Result<Self, CompletionError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("kawasaki-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_GROQ_BASE_URL.to_string(),
            model: DEFAULT_GROQ_MODEL.to_string(),
            temperature: 0.0,
        })
    }

    /// 설정에서 생성
    pub fn from_settings(settings: &Settings) -> Result<Self, CompletionError> {
        let api_key = settings
            .groq_api_key
            .clone()
            .ok_or(CompletionError::MissingApiKey)?;
        Ok(Self::new(api_key)?
            .with_base_url(&settings.groq_base_url)
            .with_model(&settings.groq_model))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionService for GroqClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
        };

        tracing::debug!("Completion request to {} (model={})", self.base_url, self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(CompletionError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError::BadResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| CompletionError::BadResponse("no choices in response".into()))
    }

    fn name(&self) -> &str {
        "groq"
    }
}

// ============================================================================
// Tests
// ============================================================================
