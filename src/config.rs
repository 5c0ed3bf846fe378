use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the search / LLM backend
    pub search_base_url: String,
    /// Base URL of the auth + history backend
    pub account_base_url: String,
    /// Where the persisted auth session lives
    pub data_dir: PathBuf,
    /// Page size used for new searches
    pub page_size: u32,
    /// `top_k` sent with image searches
    pub image_top_k: u32,
    /// Typeahead debounce in milliseconds
    pub typeahead_debounce_ms: u64,
    /// Delay before an externally injected question is auto-sent
    pub external_question_delay_ms: u64,
    /// HTTP request timeout in seconds (capped at 300)
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_base_url: "http://localhost:8001".to_string(),
            account_base_url: "http://localhost:8080".to_string(),
            data_dir: PathBuf::from("./data"),
            page_size: 10,
            image_top_k: 10,
            typeahead_debounce_ms: 300,
            external_question_delay_ms: 300,
            request_timeout_secs: 120,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("VERDANT_SEARCH_URL") {
            config.search_base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(url) = std::env::var("VERDANT_ACCOUNT_URL") {
            config.account_base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(dir) = std::env::var("VERDANT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(val) = std::env::var("VERDANT_PAGE_SIZE") {
            if let Ok(v) = val.parse::<u32>() {
                config.page_size = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("VERDANT_IMAGE_TOP_K") {
            if let Ok(v) = val.parse::<u32>() {
                config.image_top_k = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("VERDANT_TYPEAHEAD_DEBOUNCE_MS") {
            if let Ok(v) = val.parse() {
                config.typeahead_debounce_ms = v;
            }
        }
        if let Ok(val) = std::env::var("VERDANT_EXTERNAL_QUESTION_DELAY_MS") {
            if let Ok(v) = val.parse() {
                config.external_question_delay_ms = v;
            }
        }
        if let Ok(val) = std::env::var("VERDANT_REQUEST_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.request_timeout_secs = v.min(300); // Cap at 5 minutes
            }
        }

        config
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    pub fn typeahead_debounce(&self) -> Duration {
        Duration::from_millis(self.typeahead_debounce_ms)
    }

    pub fn external_question_delay(&self) -> Duration {
        Duration::from_millis(self.external_question_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_point_at_local_backends() {
        let config = Config::default();
        assert_eq!(config.search_base_url, "http://localhost:8001");
        assert_eq!(config.account_base_url, "http://localhost:8080");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.typeahead_debounce(), Duration::from_millis(300));
    }

    #[test]
    fn test_session_path_under_data_dir() {
        let config = Config {
            data_dir: PathBuf::from("/tmp/verdant"),
            ..Config::default()
        };
        assert_eq!(config.session_path(), PathBuf::from("/tmp/verdant/session.json"));
    }
}
