//! End-to-end extraction: input -> fetch -> normalize -> extract -> record
//!
//! `Pipeline::process` is the public boundary. It never returns an `Err` and
//! never lets a panic escape; every failure becomes `PipelineOutput::Error`.

use anyhow::Result;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{AppConfig, HtmlMode};
use crate::competitors::CompetitorDetector;
use crate::deal_terms::extract_deal_terms;
use crate::entities::{build_recognizer, group_by_label, EntityRecognizer};
use crate::error::PipelineError;
use crate::fetcher::{validate_url, FetchResult, Fetcher};
use crate::org_normalizer::CompanyNormalizer;
use crate::patterns::{identify_therapeutic_areas, PatternExtractor};
use crate::ranker::UrlRanker;
use crate::record::{DealInfo, PipelineInfo, PipelineOutput, StructuredRecord};
use crate::search::{collect_candidate_urls, search_key, DuckDuckGoSearch, SearchProvider};
use crate::text_normalizer::{clean_html, normalize, preprocess_press_release};

/// Shortest company name accepted for a search
const MIN_COMPANY_NAME_CHARS: usize = 2;

/// How `process` interprets its input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    Url(String),
    CompanyName(String),
}

/// Decide whether `input` is a URL or a company name.
///
/// Text that looks like an attempted URL but does not parse as an absolute
/// http(s) URL with a host is rejected instead of being searched for.
pub fn classify_input(input: &str) -> Result<InputKind, PipelineError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::invalid_input("empty input"));
    }

    if let Ok(url) = Url::parse(trimmed) {
        if matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty()) {
            return Ok(InputKind::Url(trimmed.to_string()));
        }
    }

    if looks_like_url(trimmed) {
        // Always an error here; validate_url supplies the reason
        validate_url(trimmed)?;
        return Err(PipelineError::invalid_input(format!("not a usable URL: '{}'", trimmed)));
    }

    if trimmed.chars().count() < MIN_COMPANY_NAME_CHARS {
        return Err(PipelineError::invalid_input(format!(
            "company name '{}' is too short",
            trimmed
        )));
    }

    Ok(InputKind::CompanyName(trimmed.to_string()))
}

fn looks_like_url(text: &str) -> bool {
    if text.contains("://") || text.to_lowercase().starts_with("www.") {
        return true;
    }
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    text.contains('/') || looks_like_hostname(text)
}

/// "example.com", "news.acme.bio"; not "Inc." or "J.P"
fn looks_like_hostname(text: &str) -> bool {
    let labels: Vec<&str> = text.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return false;
    }
    let tld = labels[labels.len() - 1];
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
        && labels
            .iter()
            .all(|label| label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
}

/// Content types the text normalizer can work with
fn is_textual_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    mime.is_empty()
        || mime.starts_with("text/")
        || mime.contains("html")
        || mime.contains("xml")
        || mime.contains("json")
}

fn looks_like_html(content: &str) -> bool {
    let head: String = content.trim_start().chars().take(512).collect::<String>().to_lowercase();
    head.starts_with('<') || head.contains("<html") || head.contains("<body")
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// One extraction pipeline. Owns its fetcher session, so concurrent runs
/// each need their own `Pipeline`.
pub struct Pipeline {
    config: AppConfig,
    fetcher: Fetcher,
    extractor: PatternExtractor,
    recognizer: Option<Box<dyn EntityRecognizer>>,
    companies: CompanyNormalizer,
    ranker: UrlRanker,
    search: Option<Box<dyn SearchProvider>>,
}

impl Pipeline {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let search: Option<Box<dyn SearchProvider>> = if config.search.enabled {
            Some(Box::new(DuckDuckGoSearch::new(&config.search, &config.http)?))
        } else {
            None
        };

        Ok(Self {
            config: config.clone(),
            fetcher: Fetcher::new(&config.http)?,
            extractor: PatternExtractor::from_config(&config.extraction),
            recognizer: build_recognizer(&config.entities),
            companies: CompanyNormalizer::from_config(&config.organization, &config.competitors),
            ranker: UrlRanker::from_config(&config.ranking),
            search,
        })
    }

    /// Replace the entity recognizer backend
    pub fn with_recognizer(mut self, recognizer: Box<dyn EntityRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn without_recognizer(mut self) -> Self {
        self.recognizer = None;
        self
    }

    /// Replace the search backend used for company-name inputs
    pub fn with_search_provider(mut self, provider: Box<dyn SearchProvider>) -> Self {
        self.search = Some(provider);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the whole pipeline on a URL or company name
    pub async fn process(&mut self, input: &str) -> PipelineOutput {
        match self.try_process(input).await {
            Ok(record) => PipelineOutput::record(record),
            Err(e) => {
                warn!("Processing '{}' failed: {}", input, e);
                PipelineOutput::error(e.to_string())
            }
        }
    }

    pub async fn try_process(&mut self, input: &str) -> Result<StructuredRecord, PipelineError> {
        match classify_input(input)? {
            InputKind::Url(url) => {
                info!("Processing URL: {}", url);
                let page = self.fetcher.fetch(&url).await?;
                self.analyze_fetched(&page)
            }
            InputKind::CompanyName(name) => {
                info!("Processing company name: {}", name);
                self.process_company(&name).await
            }
        }
    }

    async fn process_company(&mut self, name: &str) -> Result<StructuredRecord, PipelineError> {
        let Some(provider) = self.search.as_deref() else {
            return Err(PipelineError::invalid_input(format!(
                "'{}' is not a URL and company search is disabled",
                name
            )));
        };

        let key = search_key(name);
        if key.chars().count() < MIN_COMPANY_NAME_CHARS {
            return Err(PipelineError::invalid_input(format!(
                "company name '{}' has no searchable text",
                name
            )));
        }
        debug!("Search key for '{}': '{}'", name, key);

        let urls = collect_candidate_urls(provider, &self.config.search, &key).await;
        let ranked = self.ranker.rank_all(&urls, &key);
        if ranked.is_empty() {
            return Err(PipelineError::fetch(name, format!("No URLs found for company: {}", name)));
        }

        let max_candidates = self.config.search.max_candidates.max(1);
        let mut last_error = None;

        for (url, score) in ranked.into_iter().take(max_candidates) {
            info!("Trying candidate {} (score {})", url, score);
            let outcome = match self.fetcher.fetch(&url).await {
                Ok(page) => self.analyze_fetched(&page),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(record) => return Ok(record),
                Err(e) => {
                    warn!("Candidate {} failed: {}", url, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| PipelineError::fetch(name, format!("No URLs found for company: {}", name))))
    }

    /// Turn a fetched page into a record
    pub fn analyze_fetched(&self, page: &FetchResult) -> Result<StructuredRecord, PipelineError> {
        if let Some(content_type) = &page.content_type {
            if !is_textual_content_type(content_type) {
                return Err(PipelineError::extraction(format!(
                    "unsupported content type '{}' from {}",
                    content_type, page.source_url
                )));
            }
        }
        self.analyze_html(&page.source_url, &page.text())
    }

    /// Analyze an HTML document that is already in memory
    pub fn analyze_html(&self, source_url: &str, html: &str) -> Result<StructuredRecord, PipelineError> {
        self.guarded(|| {
            let text = match self.config.extraction.html_mode {
                HtmlMode::Lines => normalize(html),
                HtmlMode::Clean => clean_html(html),
            };
            self.build_record(source_url, text)
        })
    }

    /// Analyze plain text; no markup stripping is done
    pub fn analyze_text(&self, source_url: &str, text: &str) -> Result<StructuredRecord, PipelineError> {
        self.guarded(|| self.build_record(source_url, text.to_string()))
    }

    /// Analyze a local document, treating it as HTML when it looks like markup
    pub fn analyze_document(&self, source: &str, content: &str) -> PipelineOutput {
        let result = if looks_like_html(content) {
            self.analyze_html(source, content)
        } else {
            self.analyze_text(source, content)
        };
        match result {
            Ok(record) => PipelineOutput::record(record),
            Err(e) => {
                warn!("Analyzing '{}' failed: {}", source, e);
                PipelineOutput::error(e.to_string())
            }
        }
    }

    fn guarded<F>(&self, build: F) -> Result<StructuredRecord, PipelineError>
    where
        F: FnOnce() -> StructuredRecord,
    {
        catch_unwind(AssertUnwindSafe(build)).map_err(|payload| {
            let message = panic_message(payload.as_ref());
            warn!("Extraction panicked: {}", message);
            PipelineError::extraction(message)
        })
    }

    fn build_record(&self, source_url: &str, text: String) -> StructuredRecord {
        let text = if self.config.extraction.press_release_mode {
            preprocess_press_release(&text, self.config.extraction.max_words)
        } else {
            text
        };
        debug!("Extracting from {} chars of text", text.len());

        let extraction = self.extractor.extract_structured(&text);

        let entities = match &self.recognizer {
            Some(recognizer) => {
                let found = recognizer.recognize(&text);
                debug!("{} found {} entities", recognizer.name(), found.len());
                found
            }
            None => Vec::new(),
        };

        let detector =
            CompetitorDetector::new(self.recognizer.as_deref(), &self.config.competitors.allow_list);
        let competitors = self.companies.clean(detector.detect(&extraction));

        let record = StructuredRecord {
            source_url: source_url.to_string(),
            pipeline_info: PipelineInfo {
                phases: extraction.phases,
                indications: extraction.indications,
            },
            deal_info: DealInfo::from_deals(extraction.deals),
            deal_terms: extract_deal_terms(&text),
            therapeutic_areas: identify_therapeutic_areas(&text),
            entities: group_by_label(&entities),
            competitors,
            raw_text: text,
        };

        info!(
            "Extracted {} phases, {} competitors from {}",
            record.pipeline_info.phases.len(),
            record.competitors.len(),
            source_url
        );
        record
    }
}
