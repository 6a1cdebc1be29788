//! CLI 모듈
//!
//! kawasaki-rag CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::catalog::RobotCatalog;
use crate::collector::ManualCollector;
use crate::config::Settings;
use crate::embedding::{EmbeddingProvider, GeminiEmbedding, DEFAULT_DIMENSION};
use crate::knowledge::{LanceVectorStore, ManualIndexer, VectorStore};
use crate::llm::{CompletionService, GroqClient};
use crate::manifest::Manifest;
use crate::qa::{ConversationMemory, QaChain, QueryResponse};
use crate::query::{QueryIntelligence, DEFAULT_MAX_SUGGESTIONS, DEFAULT_TOP_K};
use crate::scraper::ManualDownloader;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "kawasaki-rag")]
#[command(version, about = "Kawasaki 로봇 매뉴얼 RAG 어시스턴트", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 매니페스트의 매뉴얼 다운로드
    Download {
        /// 매니페스트 JSON
        #[arg(short, long)]
        manifest: PathBuf,

        /// 저장 디렉토리
        #[arg(short, long, default_value = "manuals")]
        out: PathBuf,
    },

    /// 매뉴얼 PDF 색인
    Index {
        /// PDF 디렉토리
        #[arg(long, default_value = "manuals")]
        manuals: PathBuf,

        /// 모델 메타데이터용 매니페스트
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// 한 번 질문
    Ask {
        question: String,
    },

    /// 대화형 모드 (/reset, /quit)
    Chat,

    /// 쿼리 확장 결과
    Expand {
        query: String,
    },

    /// 관련도 점수
    Score {
        query: String,
    },

    /// 추천 질문
    Suggest {
        query: String,

        #[arg(short, long, default_value_t = DEFAULT_MAX_SUGGESTIONS)]
        max: usize,
    },

    /// 관련 로봇 모델
    Robots {
        query: String,

        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Download { manifest, out } => cmd_download(&manifest, out).await,
        Commands::Index { manuals, manifest } => {
            cmd_index(&settings, &manuals, manifest.as_deref()).await
        }
        Commands::Ask { question } => cmd_ask(&settings, &question).await,
        Commands::Chat => cmd_chat(&settings).await,
        Commands::Expand { query } => cmd_expand(&settings, &query).await,
        Commands::Score { query } => cmd_score(&settings, &query).await,
        Commands::Suggest { query, max } => cmd_suggest(&settings, &query, max).await,
        Commands::Robots { query, top_k } => cmd_robots(&settings, &query, top_k).await,
        Commands::Status => cmd_status(&settings).await,
    }
}

// ============================================================================
// Component Wiring
// ============================================================================

fn embedder(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
    let key = settings.require_gemini_key()?;
    Ok(Arc::new(GeminiEmbedding::new(key)?))
}

fn completion(settings: &Settings) -> Result<Arc<dyn CompletionService>> {
    settings.require_groq_key()?;
    Ok(Arc::new(GroqClient::from_settings(settings)?))
}

async fn vector_store(settings: &Settings, dimension: usize) -> Result<Arc<dyn VectorStore>> {
    let store = LanceVectorStore::open(&settings.vector_path(), dimension)
        .await
        .context("벡터 저장소 열기 실패")?;
    Ok(Arc::new(store))
}

async fn catalog(embedder: Arc<dyn EmbeddingProvider>) -> Result<Arc<RobotCatalog>> {
    let catalog = RobotCatalog::load_default(embedder)
        .await
        .context("로봇 카탈로그 로드 실패")?;
    Ok(Arc::new(catalog))
}

async fn intelligence(settings: &Settings) -> Result<QueryIntelligence> {
    let catalog = catalog(embedder(settings)?).await?;
    Ok(QueryIntelligence::new(
        catalog,
        completion(settings)?,
        settings.completion_timeout,
    ))
}

async fn qa_chain(settings: &Settings) -> Result<QaChain> {
    let embedder = embedder(settings)?;
    let completion = completion(settings)?;
    let store = vector_store(settings, embedder.dimension()).await?;
    let catalog = catalog(embedder.clone()).await?;
    let intelligence =
        QueryIntelligence::new(catalog, completion.clone(), settings.completion_timeout);

    Ok(QaChain::new(store, embedder, completion, intelligence)
        .with_k(settings.retrieval_k)
        .with_timeout(settings.completion_timeout))
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 매뉴얼 다운로드 (download)
async fn cmd_download(manifest: &Path, out: PathBuf) -> Result<()> {
    let manifest = Manifest::load(manifest)?;
    println!("[*] 매뉴얼 {} 건 다운로드 중 -> {:?}", manifest.len(), out);

    let downloader = ManualDownloader::new(out)?;
    let report = downloader.download_all(&manifest).await?;

    println!();
    println!(
        "[OK] PDF {}, HTML 스냅샷 {}, 실패 {}",
        report.pdfs,
        report.html_snapshots,
        report.failures.len()
    );
    for (model, error) in &report.failures {
        println!("   - {}: {}", model, error);
    }
    Ok(())
}

/// 매뉴얼 색인 (index)
async fn cmd_index(settings: &Settings, manuals: &Path, manifest: Option<&Path>) -> Result<()> {
    let collected = ManualCollector::default().collect(manuals)?;
    if collected.is_empty() {
        println!("[!] 색인할 PDF가 없습니다: {:?}", manuals);
        return Ok(());
    }

    let total_size: u64 = collected.iter().map(|m| m.size).sum();
    println!(
        "[*] 색인 대상: {} 파일 ({})",
        collected.len(),
        format_bytes(total_size as usize)
    );

    let embedder = embedder(settings)?;
    let store = vector_store(settings, embedder.dimension()).await?;
    let mut indexer = ManualIndexer::new(store.clone(), embedder);
    if let Some(path) = manifest {
        indexer = indexer.with_manifest(Manifest::load(path)?);
    }

    let stats = indexer.index_all(&collected).await?;

    println!();
    println!(
        "[OK] 완료: 매뉴얼 {}, 청크 {}, 건너뜀 {}, 실패 {}",
        stats.manuals,
        stats.chunks,
        stats.skipped,
        stats.failed.len()
    );
    for (source, error) in &stats.failed {
        println!("   - {}: {}", source, error);
    }
    println!("     벡터 총 {} 개", store.count().await?);
    Ok(())
}

/// 한 번 질문 (ask)
async fn cmd_ask(settings: &Settings, question: &str) -> Result<()> {
    let chain = qa_chain(settings).await?;
    let mut memory = ConversationMemory::new();

    let response = chain.handle_query(&mut memory, question).await?;
    print_response(&response);
    Ok(())
}

/// 대화형 모드 (chat)
async fn cmd_chat(settings: &Settings) -> Result<()> {
    let chain = qa_chain(settings).await?;
    let mut memory = ConversationMemory::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Kawasaki Robot Chat Assistant (/reset: 대화 초기화, /quit: 종료)");

    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                memory.clear();
                println!("[OK] 대화 기록을 지웠습니다.");
                continue;
            }
            _ => {}
        }

        match chain.handle_query(&mut memory, input).await {
            Ok(response) => print_response(&response),
            Err(e) => println!("[!] 답변 실패: {:#}", e),
        }
    }

    Ok(())
}

/// 쿼리 확장 (expand)
async fn cmd_expand(settings: &Settings, query: &str) -> Result<()> {
    let catalog = catalog(embedder(settings)?).await?;
    println!("{}", crate::query::expand_query(&catalog, query));
    Ok(())
}

/// 관련도 점수 (score)
async fn cmd_score(settings: &Settings, query: &str) -> Result<()> {
    let catalog = catalog(embedder(settings)?).await?;
    let score = crate::query::relevance_score(&catalog, query);
    println!("{} ({:?})", score, score.band());
    Ok(())
}

/// 추천 질문 (suggest)
async fn cmd_suggest(settings: &Settings, query: &str, max: usize) -> Result<()> {
    let intelligence = intelligence(settings).await?;
    let suggestions = intelligence.suggest_queries(query, max).await?;

    if suggestions.is_empty() {
        println!("[!] 추천 질문이 없습니다.");
    }
    for suggestion in suggestions {
        println!("- {}", suggestion);
    }
    Ok(())
}

/// 관련 로봇 (robots)
async fn cmd_robots(settings: &Settings, query: &str, top_k: usize) -> Result<()> {
    let catalog = catalog(embedder(settings)?).await?;
    let matches = crate::query::find_relevant_matches(&catalog, query, top_k).await?;

    for (i, m) in matches.iter().enumerate() {
        println!("{}. {} [유사도: {:.4}]", i + 1, m.canonical_name, m.similarity);
    }
    Ok(())
}

/// 상태 확인 (status)
async fn cmd_status(settings: &Settings) -> Result<()> {
    println!("kawasaki-rag 상태");
    println!("=================");
    println!();
    println!("[*] 데이터 디렉토리: {:?}", settings.data_dir);

    if settings.gemini_api_key.is_some() {
        println!("[OK] 임베딩 API 키: 설정됨");
    } else {
        println!("[!] 임베딩 API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    if settings.groq_api_key.is_some() {
        println!("[OK] Groq API 키: 설정됨 (모델: {})", settings.groq_model);
    } else {
        println!("[!] Groq API 키: 미설정");
        println!("    설정: export GROQ_API_KEY=your-key");
    }

    if !settings.vector_path().exists() {
        println!("[!] 벡터 인덱스 없음 (먼저 `kawasaki-rag index` 실행)");
        return Ok(());
    }

    match vector_store(settings, DEFAULT_DIMENSION).await {
        Ok(store) => {
            match store.count().await {
                Ok(count) => println!("[OK] 벡터 인덱스: {} 청크", count),
                Err(e) => println!("[!] 벡터 통계 조회 실패: {}", e),
            }
            if let Ok(sources) = store.list_sources().await {
                println!("     색인된 매뉴얼: {} 건", sources.len());
                for source in sources {
                    println!("     - {}", source);
                }
            }
        }
        Err(e) => {
            tracing::debug!("벡터 저장소 열기 실패: {}", e);
            println!("[!] 벡터 저장소 열기 실패");
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn print_response(response: &QueryResponse) {
    println!();
    println!("{}", response.answer);
    println!();
    println!("[관련도: {} ({:?})]", response.relevance, response.relevance.band());

    if !response.sources.is_empty() {
        println!();
        println!("출처:");
        for source in &response.sources {
            println!(
                "  - {} #{} [{}] {}",
                source.source_name,
                source.chunk_index,
                source.robot_model,
                truncate_text(&source.text, 80)
            );
        }
    }

    if !response.suggestions.is_empty() {
        println!();
        println!("추천 질문:");
        for suggestion in &response.suggestions {
            println!("  - {}", suggestion);
        }
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("payload", 10), "payload");
        assert_eq!(truncate_text("payload 7 kg", 7), "payload...");
        assert_eq!(truncate_text("reach\n730 mm", 20), "reach 730 mm");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(3 * 1048576), "3.00 MB");
    }

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["kawasaki-rag", "suggest", "RS007N payload", "--max", "3"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Suggest { ref query, max: 3 } if query == "RS007N payload"));

        let cli = Cli::try_parse_from(["kawasaki-rag", "robots", "heavy palletizing"]).unwrap();
        assert!(matches!(cli.command, Commands::Robots { top_k: 3, .. }));

        let cli = Cli::try_parse_from(["kawasaki-rag", "index"]).unwrap();
        assert!(
            matches!(cli.command, Commands::Index { ref manuals, manifest: None } if manuals == Path::new("manuals"))
        );
    }
}
