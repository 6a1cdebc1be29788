//! kawasaki-rag - Kawasaki 로봇 매뉴얼 RAG 어시스턴트
//!
//! 매뉴얼 PDF를 LanceDB에 색인하고, 쿼리 인텔리전스(별칭 정규화, 관련도,
//! 의미 기반 로봇 매칭, 추천 질문)를 붙인 대화형 검색 QA를 제공합니다.

pub mod catalog;
pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod extractor;
pub mod knowledge;
pub mod llm;
pub mod manifest;
pub mod qa;
pub mod query;
pub mod scraper;

#[cfg(test)]
mod testing;

// Re-exports
pub use catalog::{CatalogError, RobotCatalog, RobotEntry, BUILTIN_ALIASES, BUILTIN_ROBOTS};
pub use config::{get_api_key, get_data_dir, has_api_key, Settings};
pub use embedding::{EmbeddingProvider, GeminiEmbedding};
pub use knowledge::{
    default_chunker, ChunkConfig, Chunker, LanceVectorStore, ManualIndexer, MemoryVectorStore,
    SearchResult, VectorEntry, VectorStore,
};
pub use llm::{CompletionError, CompletionService, GroqClient};
pub use qa::{ConversationMemory, QaAnswer, QaChain, QueryResponse, SourceDocument};
pub use query::{
    expand_query, find_relevant_robots, relevance_score, QueryIntelligence, RelevanceBand,
    RelevanceScore, SuggestionError, SuggestionGenerator,
};
