//! 매뉴얼 다운로더 - 매니페스트의 URL에서 PDF 수집
//!
//! 행마다 순차 처리합니다:
//! 1. 응답이 PDF면 그대로 `<MODEL>.pdf`로 저장
//! 2. HTML이면 첫 번째 `.pdf` 링크를 찾아 내려받아 `<MODEL>.pdf`로 저장
//! 3. 링크가 없으면 HTML 스냅샷을 `<MODEL>.html`로 저장
//!
//! 한 행의 실패는 기록만 하고 다음 행으로 넘어갑니다.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use url::Url;

use crate::manifest::{Manifest, ManualSource};

/// 다운로드 결과 종류
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// URL이 PDF를 직접 반환
    Pdf(PathBuf),
    /// HTML 페이지의 링크에서 PDF 추출
    LinkedPdf { pdf_url: String, path: PathBuf },
    /// PDF가 없어 HTML 스냅샷 저장
    HtmlSnapshot(PathBuf),
}

/// 전체 다운로드 통계
#[derive(Debug, Default, Clone)]
pub struct DownloadReport {
    pub pdfs: usize,
    pub html_snapshots: usize,
    pub failures: Vec<(String, String)>,
}

/// 파일 이름용 모델명 정리 (영숫자, `_`, `-`만 유지)
pub fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// HTML에서 첫 `.pdf` 링크를 찾아 절대 URL로 변환
pub fn find_pdf_link(html: &str, base_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").ok()?;
    let base = Url::parse(base_url).ok()?;

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| href.trim().to_lowercase().ends_with(".pdf"))
        .and_then(|href| base.join(href.trim()).ok())
        .map(String::from)
}

/// 매뉴얼 다운로더
pub struct ManualDownloader {
    client: reqwest::Client,
    out_dir: PathBuf,
}

impl ManualDownloader {
    /// 새 다운로더 생성 (요청 타임아웃 20초)
    pub fn new(out_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("kawasaki-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(20))
            .build()
            .context("HTTP 클라이언트 생성 실패")?;

        Ok(Self {
            client,
            out_dir: out_dir.into(),
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// 매니페스트 전체 다운로드
    pub async fn download_all(&self, manifest: &Manifest) -> Result<DownloadReport> {
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .with_context(|| format!("Failed to create {:?}", self.out_dir))?;

        let mut report = DownloadReport::default();

        for source in manifest.sources() {
            match self.download(source).await {
                Ok(DownloadOutcome::HtmlSnapshot(path)) => {
                    tracing::info!("Saved HTML snapshot: {:?}", path);
                    report.html_snapshots += 1;
                }
                Ok(DownloadOutcome::Pdf(path)) => {
                    tracing::info!("Saved PDF: {:?}", path);
                    report.pdfs += 1;
                }
                Ok(DownloadOutcome::LinkedPdf { pdf_url, path }) => {
                    tracing::info!("Saved extracted PDF: {:?} (from {})", path, pdf_url);
                    report.pdfs += 1;
                }
                Err(e) => {
                    tracing::warn!("Download failed for {}: {:#}", source.model, e);
                    report.failures.push((source.model.clone(), format!("{:#}", e)));
                }
            }
        }

        Ok(report)
    }

    /// 한 행 다운로드
    pub async fn download(&self, source: &ManualSource) -> Result<DownloadOutcome> {
        let model = sanitize(&source.model.to_uppercase());
        if model.is_empty() {
            anyhow::bail!("Model name {:?} has no usable characters", source.model);
        }

        tracing::info!("Fetching: {}", source.manual_url);

        let response = self
            .client
            .get(&source.manual_url)
            .send()
            .await
            .context("HTTP 요청 실패")?
            .error_for_status()
            .context("HTTP 에러 응답")?;

        let is_pdf = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/pdf"))
            .unwrap_or(false);

        if is_pdf {
            let bytes = response.bytes().await.context("응답 본문 읽기 실패")?;
            let path = self.out_dir.join(format!("{}.pdf", model));
            tokio::fs::write(&path, &bytes).await?;
            return Ok(DownloadOutcome::Pdf(path));
        }

        let html = response.text().await.context("응답 본문 읽기 실패")?;

        if let Some(pdf_url) = find_pdf_link(&html, &source.manual_url) {
            tracing::info!("Found PDF link: {}", pdf_url);
            let bytes = self
                .client
                .get(&pdf_url)
                .send()
                .await
                .context("PDF 요청 실패")?
                .error_for_status()
                .context("PDF 에러 응답")?
                .bytes()
                .await
                .context("PDF 본문 읽기 실패")?;
            let path = self.out_dir.join(format!("{}.pdf", model));
            tokio::fs::write(&path, &bytes).await?;
            return Ok(DownloadOutcome::LinkedPdf { pdf_url, path });
        }

        let path = self.out_dir.join(format!("{}.html", model));
        tokio::fs::write(&path, html.as_bytes()).await?;
        Ok(DownloadOutcome::HtmlSnapshot(path))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(model: &str, url: String) -> ManualSource {
        ManualSource {
            model: model.to_string(),
            manual_url: url,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("ZD130S / ZDE130S"), "ZD130SZDE130S");
        assert_eq!(sanitize("rs-007_n.v2"), "rs-007_nv2");
    }

    #[test]
    fn test_find_pdf_link_resolves_relative() {
        let html = r#"
            <html><body>
                <a href="/products/rs007n">Product</a>
                <a href="docs/RS007N_Spec.PDF">Spec sheet</a>
                <a href="/other.pdf">Other</a>
            </body></html>
        "#;
        assert_eq!(
            find_pdf_link(html, "https://robotics.kawasaki.com/en/rs007n/").as_deref(),
            Some("https://robotics.kawasaki.com/en/rs007n/docs/RS007N_Spec.PDF")
        );
    }

    #[test]
    fn test_find_pdf_link_none() {
        let html = "<html><body><a href='/a'>A</a></body></html>";
        assert!(find_pdf_link(html, "https://example.com/").is_none());
    }

    #[tokio::test]
    async fn test_download_variants() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/direct"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.4 direct".to_vec()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(r#"<a href="/files/bx.pdf">manual</a>"#),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/bx.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 linked".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/plain"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html>no manual</html>"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let downloader = ManualDownloader::new(dir.path()).unwrap();
        let manifest = Manifest::new(vec![
            source("rs007n", format!("{}/direct", server.uri())),
            source("BX200L", format!("{}/page", server.uri())),
            source("MX350L", format!("{}/plain", server.uri())),
            source("RS013N", format!("{}/missing", server.uri())),
        ]);

        let report = downloader.download_all(&manifest).await.unwrap();
        assert_eq!(report.pdfs, 2);
        assert_eq!(report.html_snapshots, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "RS013N");

        assert_eq!(
            std::fs::read(dir.path().join("RS007N.pdf")).unwrap(),
            b"%PDF-1.4 direct"
        );
        assert_eq!(
            std::fs::read(dir.path().join("BX200L.pdf")).unwrap(),
            b"%PDF-1.4 linked"
        );
        assert!(dir.path().join("MX350L.html").exists());
    }
}
