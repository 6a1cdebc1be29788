//! QA 모듈 - 대화형 매뉴얼 검색 답변
//!
//! 1. 이전 대화가 있으면 후속 질문을 독립 질문으로 재작성
//! 2. 독립 질문을 쿼리 확장기로 확장해 top-k 청크 검색
//! 3. 검색된 청크를 컨텍스트로 답변 생성
//!
//! `handle_query`는 답변에 추천 질문과 관련도 점수를 붙여 돌려줍니다.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::{DEFAULT_COMPLETION_TIMEOUT_SECS, DEFAULT_RETRIEVAL_K};
use crate::embedding::EmbeddingProvider;
use crate::knowledge::{SearchResult, VectorStore};
use crate::llm::{complete_with_timeout, CompletionService};
use crate::query::{QueryIntelligence, RelevanceScore, DEFAULT_MAX_SUGGESTIONS};

// ============================================================================
// Prompts
// ============================================================================

pub const ANSWER_SYSTEM_PROMPT: &str = "You are a Kawasaki robot assistant.";

pub const CONDENSE_SYSTEM_PROMPT: &str =
    "You rewrite follow-up questions into standalone questions.";

/// 답변 프롬프트
pub fn answer_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the question using the provided context.\n\
         If the answer is not in the context, say \"I don't have the information\".\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n\
         Answer:"
    )
}

/// 후속 질문 재작성 프롬프트
pub fn condense_prompt(history: &str, question: &str) -> String {
    format!(
        "Given the following conversation and a follow up question, rephrase the follow up \
         question to be a standalone question, in its original language.\n\n\
         Chat History:\n{history}\n\
         Follow Up Input: {question}\n\
         Standalone question:"
    )
}

// ============================================================================
// Conversation Memory
// ============================================================================

/// 대화 한 턴
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// 대화 기록 (순서 유지)
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn {
            question: question.into(),
            answer: answer.into(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// 프롬프트용 기록 텍스트
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("Human: {}\nAssistant: {}", t.question, t.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// Answers
// ============================================================================

/// 답변 근거 청크
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source_name: String,
    pub chunk_index: i32,
    pub robot_model: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl From<SearchResult> for SourceDocument {
    fn from(result: SearchResult) -> Self {
        Self {
            source_name: result.source_name,
            chunk_index: result.chunk_index,
            robot_model: result.robot_model,
            text: result.chunk_text,
            metadata: result.metadata,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QaAnswer {
    pub answer: String,
    pub sources: Vec<SourceDocument>,
}

/// 사용자 질의 처리 결과
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub answer: String,
    pub suggestions: Vec<String>,
    pub relevance: RelevanceScore,
    pub sources: Vec<SourceDocument>,
}

// ============================================================================
// QA Chain
// ============================================================================

/// 대화형 검색 QA 체인
pub struct QaChain {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionService>,
    intelligence: QueryIntelligence,
    k: usize,
    timeout: Duration,
}

impl QaChain {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionService>,
        intelligence: QueryIntelligence,
    ) -> Self {
        Self {
            store,
            embedder,
            completion,
            intelligence,
            k: DEFAULT_RETRIEVAL_K,
            timeout: Duration::from_secs(DEFAULT_COMPLETION_TIMEOUT_SECS),
        }
    }

    /// 검색 청크 수
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn intelligence(&self) -> &QueryIntelligence {
        &self.intelligence
    }

    /// 후속 질문을 독립 질문으로 재작성
    ///
    /// 기록이 비어 있거나 재작성이 실패하면 원래 질문을 그대로 씁니다.
    pub async fn condense_question(&self, memory: &ConversationMemory, question: &str) -> String {
        if memory.is_empty() {
            return question.to_string();
        }

        let prompt = condense_prompt(&memory.transcript(), question);
        match complete_with_timeout(
            self.completion.as_ref(),
            CONDENSE_SYSTEM_PROMPT,
            &prompt,
            self.timeout,
        )
        .await
        {
            Ok(rewritten) if !rewritten.trim().is_empty() => rewritten.trim().to_string(),
            Ok(_) => question.to_string(),
            Err(e) => {
                tracing::warn!("Question condensing failed, using original: {}", e);
                question.to_string()
            }
        }
    }

    /// 확장된 질의로 청크 검색
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>> {
        let expanded = self.intelligence.expand_query(question);
        tracing::debug!("Retrieval query: {}", expanded);

        let embedding = self
            .embedder
            .embed_query(&expanded)
            .await
            .context("Failed to embed retrieval query")?;

        self.store
            .search(&embedding, self.k)
            .await
            .context("Vector search failed")
    }

    /// 질문에 답하고 기록에 추가
    pub async fn ask(&self, memory: &mut ConversationMemory, question: &str) -> Result<QaAnswer> {
        let standalone = self.condense_question(memory, question).await;
        let results = self.retrieve(&standalone).await?;

        let context = results
            .iter()
            .map(|r| r.chunk_text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let answer = complete_with_timeout(
            self.completion.as_ref(),
            ANSWER_SYSTEM_PROMPT,
            &answer_prompt(&context, &standalone),
            self.timeout,
        )
        .await
        .context("Answer generation failed")?
        .trim()
        .to_string();

        memory.push(question, answer.clone());

        Ok(QaAnswer {
            answer,
            sources: results.into_iter().map(SourceDocument::from).collect(),
        })
    }

    /// 답변 + 추천 질문 + 관련도
    ///
    /// 추천 생성 실패는 빈 목록으로 대체합니다.
    pub async fn handle_query(
        &self,
        memory: &mut ConversationMemory,
        question: &str,
    ) -> Result<QueryResponse> {
        let qa = self.ask(memory, question).await?;
        let suggestions = self
            .intelligence
            .suggest_queries_or_empty(question, DEFAULT_MAX_SUGGESTIONS)
            .await;
        let relevance = self.intelligence.relevance_score(question);

        Ok(QueryResponse {
            answer: qa.answer,
            suggestions,
            relevance,
            sources: qa.sources,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RobotCatalog;
    use crate::knowledge::{MemoryVectorStore, VectorEntry};
    use crate::query::{RelevanceBand, CLARIFYING_QUESTIONS, SUGGESTION_SYSTEM_PROMPT};
    use crate::testing::{bag_of_words, StubCompletion, StubEmbedder};

    async fn store() -> Arc<MemoryVectorStore> {
        let store = Arc::new(MemoryVectorStore::new());
        let chunks = [
            ("RS007N.pdf", "RS007N", "RS007N payload is 7 kg with 730 mm reach"),
            ("BX200L.pdf", "BX200L", "BX200L reach is 2597 mm for spot welding"),
            ("MX350L.pdf", "MX350L", "MX350L handles 350 kg loads"),
        ];
        let entries: Vec<VectorEntry> = chunks
            .iter()
            .map(|(source, model, text)| VectorEntry {
                source_name: source.to_string(),
                chunk_index: 0,
                robot_model: model.to_string(),
                chunk_text: text.to_string(),
                metadata: BTreeMap::from([("source".to_string(), source.to_string())]),
                embedding: bag_of_words(text),
            })
            .collect();
        store.insert_batch(&entries).await.unwrap();
        store
    }

    async fn chain(completion: Arc<StubCompletion>, k: usize) -> QaChain {
        chain_with_timeout(completion, k, Duration::from_secs(5)).await
    }

    async fn chain_with_timeout(
        completion: Arc<StubCompletion>,
        k: usize,
        suggestion_timeout: Duration,
    ) -> QaChain {
        let embedder = Arc::new(StubEmbedder::new());
        let catalog = Arc::new(RobotCatalog::load_default(embedder.clone()).await.unwrap());
        let intelligence =
            QueryIntelligence::new(catalog, completion.clone(), suggestion_timeout);
        QaChain::new(store().await, embedder, completion, intelligence).with_k(k)
    }

    #[test]
    fn test_memory_transcript() {
        let mut memory = ConversationMemory::new();
        memory.push("What is RS007N?", "A small robot.");
        memory.push("Payload?", "7 kg.");
        assert_eq!(
            memory.transcript(),
            "Human: What is RS007N?\nAssistant: A small robot.\nHuman: Payload?\nAssistant: 7 kg."
        );
        memory.clear();
        assert!(memory.is_empty());
    }

    #[test]
    fn test_answer_prompt_contains_fallback_phrase() {
        let prompt = answer_prompt("ctx", "q?");
        assert!(prompt.contains("I don't have the information"));
        assert!(prompt.contains("Context:\nctx"));
        assert!(prompt.ends_with("Question: q?\nAnswer:"));
        assert!(!prompt.contains(ANSWER_SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn test_ask_retrieves_expanded_question() {
        let completion = Arc::new(StubCompletion::replying("It carries 7 kg."));
        let chain = chain(completion.clone(), 1).await;
        let mut memory = ConversationMemory::new();

        let answer = chain
            .ask(&mut memory, "What is the payload of RS007N?")
            .await
            .unwrap();

        assert_eq!(answer.answer, "It carries 7 kg.");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].source_name, "RS007N.pdf");
        assert_eq!(answer.sources[0].metadata["source"], "RS007N.pdf");
        assert_eq!(memory.turns().len(), 1);

        // 첫 질문은 재작성 없이 답변 호출 한 번
        let prompts = completion.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, ANSWER_SYSTEM_PROMPT);
        assert!(prompts[0].1.contains("RS007N payload is 7 kg"));
    }

    #[tokio::test]
    async fn test_follow_up_is_condensed() {
        let completion = Arc::new(StubCompletion::replying("What is the reach of RS007N?"));
        let chain = chain(completion.clone(), 2).await;
        let mut memory = ConversationMemory::new();
        memory.push("Tell me about RS007N", "It is a small robot.");

        chain.ask(&mut memory, "And its reach?").await.unwrap();

        let prompts = completion.prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0].0, CONDENSE_SYSTEM_PROMPT);
        assert!(prompts[0].1.contains("Human: Tell me about RS007N"));
        assert!(prompts[0].1.contains("Follow Up Input: And its reach?"));
        assert!(prompts[1].1.contains("Question: What is the reach of RS007N?"));
        assert_eq!(memory.turns()[1].question, "And its reach?");
    }

    #[tokio::test]
    async fn test_answer_failure_is_error() {
        let completion = Arc::new(StubCompletion::failing());
        let chain = chain(completion, 1).await;
        let mut memory = ConversationMemory::new();

        assert!(chain.ask(&mut memory, "RS007N payload").await.is_err());
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_handle_query_low_relevance() {
        let completion = Arc::new(StubCompletion::replying("I don't have the information"));
        let chain = chain(completion.clone(), 1).await;
        let mut memory = ConversationMemory::new();

        let response = chain
            .handle_query(&mut memory, "How do I bake bread?")
            .await
            .unwrap();

        assert_eq!(response.relevance.band(), RelevanceBand::Low);
        assert_eq!(response.suggestions, CLARIFYING_QUESTIONS.to_vec());
        assert_eq!(completion.call_count(), 1);
    }

    #[tokio::test]
    async fn test_handle_query_high_relevance() {
        let completion = Arc::new(StubCompletion::replying("What is the RS007N reach?"));
        let chain = chain(completion.clone(), 1).await;
        let mut memory = ConversationMemory::new();

        let response = chain
            .handle_query(&mut memory, "RS007N payload")
            .await
            .unwrap();

        assert_eq!(response.relevance.band(), RelevanceBand::High);
        assert_eq!(response.suggestions, vec!["What is the RS007N reach?"]);
        assert_eq!(completion.call_count(), 2);
    }

    #[tokio::test]
    async fn test_suggestion_failure_keeps_answer() {
        let completion = Arc::new(
            StubCompletion::replying("It carries 7 kg.").failing_on(SUGGESTION_SYSTEM_PROMPT),
        );
        let chain = chain(completion.clone(), 1).await;
        let mut memory = ConversationMemory::new();

        let response = chain
            .handle_query(&mut memory, "RS007N payload")
            .await
            .unwrap();

        assert_eq!(response.answer, "It carries 7 kg.");
        assert!(response.suggestions.is_empty());
        assert_eq!(response.relevance.band(), RelevanceBand::High);
        assert_eq!(response.sources[0].source_name, "RS007N.pdf");
        // 답변 + 추천 시도
        assert_eq!(completion.call_count(), 2);
        assert_eq!(memory.turns().len(), 1);
    }

    #[tokio::test]
    async fn test_suggestion_timeout_keeps_answer() {
        let completion = Arc::new(
            StubCompletion::replying("It carries 7 kg.")
                .slow_on(SUGGESTION_SYSTEM_PROMPT, Duration::from_secs(2)),
        );
        let chain = chain_with_timeout(completion, 1, Duration::from_millis(50)).await;
        let mut memory = ConversationMemory::new();

        let response = chain
            .handle_query(&mut memory, "RS007N payload")
            .await
            .unwrap();

        assert_eq!(response.answer, "It carries 7 kg.");
        assert!(response.suggestions.is_empty());
        assert_eq!(response.relevance.band(), RelevanceBand::High);
    }
}
