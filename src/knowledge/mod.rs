//! Knowledge 모듈 - 매뉴얼 벡터 지식 저장소
//!
//! - Vector: 저장소 트레이트 + 메모리 구현 + 코사인 유사도
//! - LanceDB: 디스크 벡터 검색 (코사인 거리)
//! - Chunker: 재귀적 문자 분할
//! - Indexer: PDF → 청크 → 임베딩 → 저장

mod chunker;
mod indexer;
mod lance;
mod vector;

// Re-exports
pub use chunker::{default_chunker, ChunkConfig, Chunker, RecursiveCharacterSplitter};
pub use indexer::{IndexStats, ManualIndexer};
pub use lance::LanceVectorStore;
pub use vector::{cosine_similarity, MemoryVectorStore, SearchResult, VectorEntry, VectorStore};
