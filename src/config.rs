//! Configuration management for marketpulse
//!
//! Configuration is read from `./config/marketpulse.toml` unless another path is
//! given. Every section falls back to the values in the bundled template, so a
//! partial file only needs the keys it changes.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/marketpulse.toml";

/// Default configuration file content, written out by `init-config`
pub const DEFAULT_CONFIG: &str = include_str!("../config/marketpulse.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Invalid range in '{field}': minimum {min} exceeds maximum {max}")]
    InvalidRange { field: String, min: u64, max: u64 },

    #[error("Search query template '{template}' does not contain the {{company}} placeholder")]
    MissingPlaceholder { template: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub entities: EntityConfig,
    #[serde(default)]
    pub competitors: CompetitorConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub organization: OrganizationConfig,
}

/// Backoff strategy applied between transient fetch failures
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// base * 2^(attempt - 1)
    Exponential,
    /// base * attempt
    Linear,
    /// base on every retry
    Constant,
}

/// HTTP client and retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Total attempts per fetch, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_strategy")]
    pub backoff_strategy: BackoffStrategy,
    #[serde(default = "default_backoff_base_delay_ms")]
    pub backoff_base_delay_ms: u64,
    #[serde(default = "default_backoff_max_delay_ms")]
    pub backoff_max_delay_ms: u64,
    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_strategy() -> BackoffStrategy {
    BackoffStrategy::Exponential
}

fn default_backoff_base_delay_ms() -> u64 {
    1000
}

fn default_backoff_max_delay_ms() -> u64 {
    8000
}

fn default_jitter_min_ms() -> u64 {
    1000
}

fn default_jitter_max_ms() -> u64 {
    3000
}

fn default_max_body_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2.1 Safari/605.1.15",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_strategy: default_backoff_strategy(),
            backoff_base_delay_ms: default_backoff_base_delay_ms(),
            backoff_max_delay_ms: default_backoff_max_delay_ms(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
            max_body_bytes: default_max_body_bytes(),
            max_redirects: default_max_redirects(),
            user_agents: default_user_agents(),
        }
    }
}

impl HttpConfig {
    /// Delay to sleep after the given failed attempt (1-indexed).
    ///
    /// Attempt 0 never waits. With the default exponential strategy and a 1s
    /// base this yields 1s, 2s, 4s... capped at `backoff_max_delay_ms`.
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.backoff_base_delay_ms;
        let delay_ms = match self.backoff_strategy {
            BackoffStrategy::Exponential => {
                let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
                base.saturating_mul(factor)
            }
            BackoffStrategy::Linear => base.saturating_mul(attempt as u64),
            BackoffStrategy::Constant => base,
        };

        Duration::from_millis(delay_ms.min(self.backoff_max_delay_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Pattern extraction and text preprocessing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_context_window_chars")]
    pub context_window_chars: usize,
    #[serde(default)]
    pub press_release_mode: bool,
    #[serde(default = "default_max_words")]
    pub max_words: usize,
    #[serde(default)]
    pub html_mode: HtmlMode,
}

/// How fetched HTML is turned into text
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HtmlMode {
    /// One line per block element, page chrome removed
    #[default]
    Lines,
    /// A single line with navigation noise, asides and forms removed as well
    Clean,
}

fn default_context_window_chars() -> usize {
    200
}

fn default_max_words() -> usize {
    500
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            context_window_chars: default_context_window_chars(),
            press_release_mode: false,
            max_words: default_max_words(),
            html_mode: HtmlMode::default(),
        }
    }
}

/// Entity recognizer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EntityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Organizations recognized verbatim in addition to the built-in lexicon
    #[serde(default)]
    pub known_organizations: Vec<String>,
    /// Recognizers to run; more than one are merged
    #[serde(default = "default_backends")]
    pub backends: Vec<RecognizerBackend>,
}

/// Built-in entity recognizer backends
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerBackend {
    /// Regex and lexicon rules for every label
    RuleBased,
    /// Organization names from the lexicon only
    Lexicon,
}

fn default_true() -> bool {
    true
}

fn default_backends() -> Vec<RecognizerBackend> {
    vec![RecognizerBackend::RuleBased]
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            known_organizations: Vec::new(),
            backends: default_backends(),
        }
    }
}

/// How duplicate competitors are merged
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// The first occurrence of a name is kept untouched
    #[default]
    FirstSeen,
    /// A later duplicate with strictly higher confidence replaces the stored one
    HighestConfidence,
}

/// Competitor detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CompetitorConfig {
    #[serde(default)]
    pub merge_policy: MergePolicy,
    /// Companies recognized by name at the start of a pipeline context
    #[serde(default = "default_allow_list")]
    pub allow_list: Vec<String>,
}

fn default_allow_list() -> Vec<String> {
    vec!["Pfizer".to_string(), "Novartis".to_string(), "Roche".to_string()]
}

impl Default for CompetitorConfig {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            allow_list: default_allow_list(),
        }
    }
}

/// URL ranking weights and keyword tables
#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_news_domain_weight")]
    pub news_domain_weight: u32,
    #[serde(default = "default_press_release_weight")]
    pub press_release_weight: u32,
    #[serde(default = "default_company_domain_weight")]
    pub company_domain_weight: u32,
    #[serde(default = "default_pipeline_keyword_weight")]
    pub pipeline_keyword_weight: u32,
    #[serde(default = "default_biotech_domain_weight")]
    pub biotech_domain_weight: u32,
    #[serde(default = "default_news_domains")]
    pub news_domains: Vec<String>,
    #[serde(default = "default_press_keywords")]
    pub press_keywords: Vec<String>,
    #[serde(default = "default_pipeline_keywords")]
    pub pipeline_keywords: Vec<String>,
    #[serde(default = "default_biotech_tlds")]
    pub biotech_tlds: Vec<String>,
}

fn default_news_domain_weight() -> u32 {
    5
}

fn default_press_release_weight() -> u32 {
    4
}

fn default_company_domain_weight() -> u32 {
    3
}

fn default_pipeline_keyword_weight() -> u32 {
    2
}

fn default_biotech_domain_weight() -> u32 {
    1
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_news_domains() -> Vec<String> {
    to_strings(&[
        "reuters.com",
        "bloomberg.com",
        "biospace.com",
        "fiercebiotech.com",
        "biopharmadive.com",
        "endpts.com",
        "statnews.com",
        "genengnews.com",
        "pharmatimes.com",
        "pharmalive.com",
        "bioworld.com",
        "seekingalpha.com",
        "businesswire.com",
        "globenewswire.com",
        "prnewswire.com",
    ])
}

fn default_press_keywords() -> Vec<String> {
    to_strings(&["press-release", "news", "media"])
}

fn default_pipeline_keywords() -> Vec<String> {
    to_strings(&[
        "press-release",
        "news",
        "media",
        "announcement",
        "update",
        "pipeline",
        "clinical",
        "trial",
        "results",
        "partnership",
        "collaboration",
        "license",
        "acquisition",
    ])
}

fn default_biotech_tlds() -> Vec<String> {
    to_strings(&[".com", ".io", ".bio", ".pharma", ".healthcare"])
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            news_domain_weight: default_news_domain_weight(),
            press_release_weight: default_press_release_weight(),
            company_domain_weight: default_company_domain_weight(),
            pipeline_keyword_weight: default_pipeline_keyword_weight(),
            biotech_domain_weight: default_biotech_domain_weight(),
            news_domains: default_news_domains(),
            press_keywords: default_press_keywords(),
            pipeline_keywords: default_pipeline_keywords(),
            biotech_tlds: default_biotech_tlds(),
        }
    }
}

/// Company-name resolution through a search engine
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_query_delay_min_ms")]
    pub query_delay_min_ms: u64,
    #[serde(default = "default_query_delay_max_ms")]
    pub query_delay_max_ms: u64,
    #[serde(default = "default_queries")]
    pub queries: Vec<String>,
}

fn default_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/".to_string()
}

fn default_results_per_query() -> usize {
    10
}

fn default_max_candidates() -> usize {
    3
}

fn default_query_delay_min_ms() -> u64 {
    2000
}

fn default_query_delay_max_ms() -> u64 {
    4000
}

fn default_queries() -> Vec<String> {
    to_strings(&[
        "{company} press release",
        "{company} news update",
        "{company} announces",
        "{company} clinical trial results",
        "{company} partnership announcement",
        "{company} collaboration news",
        "{company} license agreement",
        "{company} acquisition news",
        "{company} recent developments",
        "{company} investor update",
    ])
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_search_endpoint(),
            results_per_query: default_results_per_query(),
            max_candidates: default_max_candidates(),
            query_delay_min_ms: default_query_delay_min_ms(),
            query_delay_max_ms: default_query_delay_max_ms(),
            queries: default_queries(),
        }
    }
}

/// Organization alias table (lower-case alias -> canonical name)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationConfig {
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default path, falling back to built-in defaults when the
    /// file does not exist. Parse and validation errors are still reported.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(CONFIG_PATH));
        match Self::load_from_path(path) {
            Err(ConfigError::FileNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.max_attempts == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.max_attempts".to_string(),
            });
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.request_timeout_secs".to_string(),
            });
        }
        if self.http.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agents".to_string(),
            });
        }
        if self.http.jitter_min_ms > self.http.jitter_max_ms {
            return Err(ConfigError::InvalidRange {
                field: "http.jitter_min_ms/jitter_max_ms".to_string(),
                min: self.http.jitter_min_ms,
                max: self.http.jitter_max_ms,
            });
        }

        if self.extraction.context_window_chars == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "extraction.context_window_chars".to_string(),
            });
        }
        if self.extraction.max_words == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "extraction.max_words".to_string(),
            });
        }

        if self.entities.enabled && self.entities.backends.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "entities.backends".to_string(),
            });
        }

        if self.search.enabled {
            if !self.search.endpoint.starts_with("http://") && !self.search.endpoint.starts_with("https://") {
                return Err(ConfigError::InvalidUrl {
                    field: "search.endpoint".to_string(),
                    url: self.search.endpoint.clone(),
                });
            }
            if self.search.queries.is_empty() {
                return Err(ConfigError::EmptyRequired {
                    field: "search.queries".to_string(),
                });
            }
            for template in &self.search.queries {
                if !template.contains("{company}") {
                    return Err(ConfigError::MissingPlaceholder {
                        template: template.clone(),
                    });
                }
            }
            if self.search.query_delay_min_ms > self.search.query_delay_max_ms {
                return Err(ConfigError::InvalidRange {
                    field: "search.query_delay_min_ms/query_delay_max_ms".to_string(),
                    min: self.search.query_delay_min_ms,
                    max: self.search.query_delay_max_ms,
                });
            }
        }

        for (alias, canonical) in &self.organization.aliases {
            if alias.trim().is_empty() || canonical.trim().is_empty() {
                return Err(ConfigError::EmptyRequired {
                    field: format!("organization.aliases.\"{}\"", alias),
                });
            }
        }

        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        Self::create_default_config_at(Path::new(CONFIG_PATH))
    }

    /// Write the default configuration template to `path`
    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }
}
