//! 설정 모듈 - 환경변수 기반 설정 로드
//!
//! `.env` 파일을 먼저 읽은 뒤 환경변수에서 API 키, 모델 이름,
//! 데이터 디렉토리 등을 가져옵니다.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Groq OpenAI 호환 엔드포인트
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// 기본 완성 모델
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";

/// 완성 호출 기본 타임아웃 (초)
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 20;

/// 기본 검색 청크 수
pub const DEFAULT_RETRIEVAL_K: usize = 5;

// ============================================================================
// Settings
// ============================================================================

/// 런타임 설정
#[derive(Debug, Clone)]
pub struct Settings {
    /// Gemini 임베딩 API 키
    pub gemini_api_key: Option<String>,
    /// Groq 완성 API 키
    pub groq_api_key: Option<String>,
    /// Groq 모델 이름
    pub groq_model: String,
    /// Groq API base URL
    pub groq_base_url: String,
    /// 데이터 디렉토리 (벡터 인덱스 등)
    pub data_dir: PathBuf,
    /// 추천 질문 생성 타임아웃
    pub completion_timeout: Duration,
    /// QA 검색 청크 수
    pub retrieval_k: usize,
}

impl Settings {
    /// `.env` + 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        // .env 파일은 선택 사항
        if let Err(e) = dotenv::dotenv() {
            tracing::debug!(".env not loaded: {}", e);
        }

        let timeout_secs = parse_env("KAWASAKI_RAG_COMPLETION_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_COMPLETION_TIMEOUT_SECS);
        let retrieval_k = parse_env("KAWASAKI_RAG_RETRIEVAL_K")?.unwrap_or(DEFAULT_RETRIEVAL_K);

        let data_dir = non_empty_env("KAWASAKI_RAG_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(get_data_dir);

        Ok(Self {
            gemini_api_key: get_api_key().ok(),
            groq_api_key: non_empty_env("GROQ_API_KEY"),
            groq_model: non_empty_env("GROQ_MODEL").unwrap_or_else(|| DEFAULT_GROQ_MODEL.into()),
            groq_base_url: non_empty_env("GROQ_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.into()),
            data_dir,
            completion_timeout: Duration::from_secs(timeout_secs),
            retrieval_k,
        })
    }

    /// 벡터 인덱스 경로
    pub fn vector_path(&self) -> PathBuf {
        self.data_dir.join("vectors.lance")
    }

    /// Gemini 키 (없으면 에러)
    pub fn require_gemini_key(&self) -> Result<&str> {
        self.gemini_api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "Embedding API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY.\n\
                 Get your API key at: https://aistudio.google.com/app/apikey"
            )
        })
    }

    /// Groq 키 (없으면 에러)
    pub fn require_groq_key(&self) -> Result<&str> {
        self.groq_api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "GROQ_API_KEY not set.\n\
                 Get your API key at: https://console.groq.com/keys"
            )
        })
    }
}

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.kawasaki-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kawasaki-rag")
}

// ============================================================================
// API Key Management
// ============================================================================

/// 임베딩 API 키 로드
///
/// 우선순위:
/// 1. `GEMINI_API_KEY`
/// 2. `GOOGLE_AI_API_KEY`
pub fn get_api_key() -> Result<String> {
    for var in ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"] {
        if let Some(key) = non_empty_env(var) {
            tracing::debug!("Using API key from {}", var);
            return Ok(key);
        }
    }

    anyhow::bail!("API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.")
}

/// 임베딩 API 키 존재 여부
pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty_env(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        None => Ok(None),
    }
}

// ============================================================================
// Tests
// ============================================================================
