use marketpulse::config::AppConfig;
use std::path::PathBuf;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn load_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", relative))
}

/// Defaults with every sleep removed and search switched off
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.http.jitter_min_ms = 0;
    config.http.jitter_max_ms = 0;
    config.http.backoff_base_delay_ms = 0;
    config.http.request_timeout_secs = 5;
    config.search.enabled = false;
    config.search.query_delay_min_ms = 0;
    config.search.query_delay_max_ms = 0;
    config
}

/// `fast_config` as TOML, for driving the binary
pub const FAST_CONFIG_TOML: &str = r#"
[http]
jitter_min_ms = 0
jitter_max_ms = 0
backoff_base_delay_ms = 0
request_timeout_secs = 5

[search]
enabled = false
"#;
