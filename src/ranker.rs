//! Scoring of search-result URLs for the company-name path

use tracing::debug;
use url::Url;

use crate::config::RankingConfig;
use crate::org_normalizer::clean_company_name;

/// Scores candidate URLs by how likely they are to hold a company press release.
#[derive(Debug, Clone)]
pub struct UrlRanker {
    config: RankingConfig,
}

impl Default for UrlRanker {
    fn default() -> Self {
        Self::from_config(&RankingConfig::default())
    }
}

impl UrlRanker {
    pub fn from_config(config: &RankingConfig) -> Self {
        Self {
            config: RankingConfig {
                news_domains: lowercase_all(&config.news_domains),
                press_keywords: lowercase_all(&config.press_keywords),
                pipeline_keywords: lowercase_all(&config.pipeline_keywords),
                biotech_tlds: lowercase_all(&config.biotech_tlds),
                ..config.clone()
            },
        }
    }

    /// Score a single URL. Unparseable URLs and URLs without a host score `None`.
    pub fn score(&self, url: &str, company: &str) -> Option<u32> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_lowercase();
        let mut location = parsed.path().to_lowercase();
        if let Some(query) = parsed.query() {
            location.push('?');
            location.push_str(&query.to_lowercase());
        }

        let cfg = &self.config;
        let mut score = 0u32;

        if cfg.news_domains.iter().any(|domain| host_matches(&host, domain)) {
            score += cfg.news_domain_weight;
        }

        if cfg.press_keywords.iter().any(|keyword| location.contains(keyword.as_str())) {
            score += cfg.press_release_weight;
        }

        let compact = compact_name(company);
        if !compact.is_empty() && host.contains(&compact) {
            score += cfg.company_domain_weight;
        }

        // One addition per keyword present
        let pipeline_hits = cfg
            .pipeline_keywords
            .iter()
            .filter(|keyword| location.contains(keyword.as_str()))
            .count() as u32;
        score += pipeline_hits * cfg.pipeline_keyword_weight;

        if cfg.biotech_tlds.iter().any(|tld| host.ends_with(tld.as_str())) {
            score += cfg.biotech_domain_weight;
        }

        Some(score)
    }

    /// All scoreable URLs, best first. Equal scores keep their input order.
    pub fn rank_all(&self, urls: &[String], company: &str) -> Vec<(String, u32)> {
        let mut scored: Vec<(String, u32)> = urls
            .iter()
            .filter_map(|url| match self.score(url, company) {
                Some(score) => Some((url.clone(), score)),
                None => {
                    debug!("Skipping unparseable candidate URL: {}", url);
                    None
                }
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored
    }

    /// The best URL, or `None` when there is nothing to rank
    pub fn rank(&self, urls: &[String], company: &str) -> Option<String> {
        self.rank_all(urls, company).into_iter().next().map(|(url, _)| url)
    }
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

/// True for the domain itself or any of its subdomains
fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// "Acme Bio, Inc." -> "acmebio"
fn compact_name(company: &str) -> String {
    clean_company_name(company)
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_news_domain_and_subdomains() {
        let ranker = UrlRanker::default();
        // news domain 5 + biotech tld 1
        assert_eq!(ranker.score("https://www.reuters.com/", "Acme"), Some(6));
        assert_eq!(ranker.score("https://reuters.com/", "Acme"), Some(6));
        // not a subdomain
        assert_eq!(ranker.score("https://notreuters.com/", "Acme"), Some(1));
    }

    #[test]
    fn test_press_and_pipeline_keywords_stack() {
        let ranker = UrlRanker::default();
        // press 4 + pipeline "news" 2 + biotech 1
        assert_eq!(ranker.score("https://example.com/news", "Zeta"), Some(7));
        // press 4 + pipeline "press-release", "clinical", "trial", "results" 8 + biotech 1
        assert_eq!(
            ranker.score("https://example.com/press-release/clinical-trial-results", "Zeta"),
            Some(13)
        );
    }

    #[test]
    fn test_company_domain() {
        let ranker = UrlRanker::default();
        // company 3 + biotech 1
        assert_eq!(ranker.score("https://acmebio.com/", "Acme Bio, Inc."), Some(4));
        assert_eq!(ranker.score("https://acmebio.org/", "Acme Bio"), Some(3));
        assert_eq!(ranker.score("https://other.org/", "Acme Bio"), Some(0));
    }

    #[test]
    fn test_query_string_counts() {
        let ranker = UrlRanker::default();
        assert_eq!(ranker.score("https://example.org/?section=pipeline", "Zeta"), Some(2));
    }

    #[test]
    fn test_unparseable_urls_are_skipped() {
        let ranker = UrlRanker::default();
        assert_eq!(ranker.score("not a url", "Acme"), None);
        assert_eq!(ranker.score("mailto:someone@example.com", "Acme"), None);

        let ranked = ranker.rank_all(&urls(&["not a url", "https://example.org/"]), "Acme");
        assert_eq!(ranked, vec![("https://example.org/".to_string(), 0)]);
    }

    #[test]
    fn test_rank_prefers_highest_score() {
        let ranker = UrlRanker::default();
        let candidates = urls(&[
            "https://example.org/about",
            "https://www.fiercebiotech.com/biotech/acme-partnership",
            "https://acme.com/news",
        ]);
        // 0, 5 + 2 + 1 and 4 + 3 + 2 + 1
        let ranked = ranker.rank_all(&candidates, "Acme");
        let scores: Vec<u32> = ranked.iter().map(|(_, s)| *s).collect();
        assert_eq!(scores, vec![10, 8, 0]);
        assert_eq!(
            ranker.rank(&candidates, "Acme"),
            Some("https://acme.com/news".to_string())
        );
    }

    #[test]
    fn test_ties_keep_input_order() {
        let ranker = UrlRanker::default();
        let candidates = urls(&["https://b.org/x", "https://a.org/y", "https://c.org/z"]);
        let ranked = ranker.rank_all(&candidates, "Zeta");
        let order: Vec<&str> = ranked.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(order, vec!["https://b.org/x", "https://a.org/y", "https://c.org/z"]);
    }

    #[test]
    fn test_empty_input() {
        let ranker = UrlRanker::default();
        assert_eq!(ranker.rank(&[], "Acme"), None);
    }

    #[test]
    fn test_custom_weights() {
        let config = RankingConfig {
            biotech_domain_weight: 10,
            biotech_tlds: vec![".BIO".to_string()],
            ..RankingConfig::default()
        };
        let ranker = UrlRanker::from_config(&config);
        assert_eq!(ranker.score("https://acme.bio/", "Zeta"), Some(10));
    }
}
