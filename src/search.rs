//! Search-engine lookup used to resolve a company name into candidate URLs

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::Rng;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{HttpConfig, SearchConfig};
use crate::org_normalizer::clean_company_name;

/// Placeholder replaced by the company search key in query templates
pub const COMPANY_PLACEHOLDER: &str = "{company}";

/// Returns result URLs for a free-text query, best match first.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;
}

// The unwrap below is on a compile-time constant selector that is known to be valid.
static RESULT_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a.result__a").unwrap());

/// Scrapes the DuckDuckGo HTML results page.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(search: &SearchConfig, http: &HttpConfig) -> Result<Self> {
        let user_agent = http
            .user_agents
            .first()
            .map(String::as_str)
            .unwrap_or("Mozilla/5.0 (compatible; marketpulse)");

        let client = reqwest::Client::builder()
            .timeout(http.request_timeout())
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(http.max_redirects))
            .build()
            .context("Failed to build search HTTP client")?;

        Ok(Self {
            client,
            endpoint: search.endpoint.clone(),
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .with_context(|| format!("Search request failed for '{}'", query))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Search endpoint returned HTTP {}", status);
        }

        let body = response.text().await.context("Failed to read search response")?;
        let mut urls = parse_duckduckgo_results(&body);
        urls.truncate(limit);
        debug!("Search '{}' returned {} URLs", query, urls.len());
        Ok(urls)
    }
}

/// Result links from a DuckDuckGo HTML page, with redirect links unwrapped
pub fn parse_duckduckgo_results(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut urls: Vec<String> = Vec::new();

    for link in document.select(&RESULT_LINK_SELECTOR) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if let Some(url) = decode_result_href(href) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }

    urls
}

/// `//duckduckgo.com/l/?uddg=<encoded>` -> decoded target; plain links pass through
fn decode_result_href(href: &str) -> Option<String> {
    let base = Url::parse("https://duckduckgo.com/").ok()?;
    let parsed = base.join(href).ok()?;

    let target = match parsed.query_pairs().find(|(key, _)| key == "uddg") {
        Some((_, value)) => Url::parse(&value).ok()?,
        None => parsed,
    };

    match target.scheme() {
        "http" | "https" if target.host_str().is_some() => Some(target.to_string()),
        _ => None,
    }
}

/// Returns a fixed URL list for every query. Used for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSearch {
    results: Vec<String>,
}

impl StaticSearch {
    pub fn new<I, S>(results: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            results: results.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<String>> {
        Ok(self.results.iter().take(limit).cloned().collect())
    }
}

/// Company name reduced to what goes into a query: "Acme Bio, Inc." -> "Acme Bio"
pub fn search_key(company: &str) -> String {
    clean_company_name(company)
        .unwrap_or_default()
        .replace('&', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn build_queries(templates: &[String], company: &str) -> Vec<String> {
    templates
        .iter()
        .map(|template| template.replace(COMPANY_PLACEHOLDER, company))
        .collect()
}

/// Run every query template and merge the results in first-seen order.
///
/// A failing query is logged and skipped. A random delay from the configured
/// range is slept before each query.
pub async fn collect_candidate_urls(
    provider: &dyn SearchProvider,
    config: &SearchConfig,
    company: &str,
) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();

    for query in build_queries(&config.queries, company) {
        let delay = query_delay(config);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match provider.search(&query, config.results_per_query).await {
            Ok(results) => {
                for url in results {
                    if !urls.contains(&url) {
                        debug!("Found candidate URL: {}", url);
                        urls.push(url);
                    }
                }
            }
            Err(e) => warn!("Search query '{}' failed: {:#}", query, e),
        }
    }

    info!("Collected {} candidate URLs for '{}'", urls.len(), company);
    urls
}

fn query_delay(config: &SearchConfig) -> Duration {
    let (min, max) = (config.query_delay_min_ms, config.query_delay_max_ms);
    if max <= min {
        return Duration::from_millis(min);
    }
    Duration::from_millis(rand::rng().random_range(min..=max))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <html><body>
          <div class="result">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.biospace.com%2Fnews%2Facme&amp;rut=abc">Acme news</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://acme.com/press-release">Acme press</a>
          </div>
          <div class="result">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.biospace.com%2Fnews%2Facme&amp;rut=def">Duplicate</a>
          </div>
          <a class="result__a" href="javascript:void(0)">Broken</a>
          <a class="other" href="https://ignored.example.com/">Not a result</a>
        </body></html>
    "#;

    #[test]
    fn test_parse_duckduckgo_results() {
        let urls = parse_duckduckgo_results(RESULTS_PAGE);
        assert_eq!(
            urls,
            vec![
                "https://www.biospace.com/news/acme".to_string(),
                "https://acme.com/press-release".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_empty_page() {
        assert!(parse_duckduckgo_results("<html><body>No results</body></html>").is_empty());
    }

    #[test]
    fn test_search_key() {
        assert_eq!(search_key("Acme Bio, Inc."), "Acme Bio");
        assert_eq!(search_key("  Johnson & Johnson  "), "Johnson Johnson");
        assert_eq!(search_key("..."), "");
    }

    #[test]
    fn test_build_queries() {
        let templates = vec!["{company} press release".to_string(), "news about {company}".to_string()];
        assert_eq!(
            build_queries(&templates, "Acme"),
            vec!["Acme press release".to_string(), "news about Acme".to_string()]
        );
    }

    fn instant_config(queries: &[&str]) -> SearchConfig {
        SearchConfig {
            query_delay_min_ms: 0,
            query_delay_max_ms: 0,
            results_per_query: 2,
            queries: queries.iter().map(|q| q.to_string()).collect(),
            ..SearchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_static_search_respects_limit() {
        let provider = StaticSearch::new(["https://a.com/", "https://b.com/", "https://c.com/"]);
        let urls = provider.search("anything", 2).await.unwrap();
        assert_eq!(urls, vec!["https://a.com/".to_string(), "https://b.com/".to_string()]);
    }

    struct FailingSearch;

    #[async_trait]
    impl SearchProvider for FailingSearch {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<String>> {
            bail!("search backend unavailable")
        }
    }

    #[tokio::test]
    async fn test_collect_merges_without_duplicates() {
        let provider = StaticSearch::new(["https://a.com/", "https://b.com/"]);
        let config = instant_config(&["{company} one", "{company} two"]);
        let urls = collect_candidate_urls(&provider, &config, "Acme").await;
        assert_eq!(urls, vec!["https://a.com/".to_string(), "https://b.com/".to_string()]);
    }

    #[tokio::test]
    async fn test_collect_tolerates_failing_queries() {
        let config = instant_config(&["{company} one"]);
        let urls = collect_candidate_urls(&FailingSearch, &config, "Acme").await;
        assert!(urls.is_empty());
    }
}
