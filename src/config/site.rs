//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides `content.access_token`
pub const ACCESS_TOKEN_ENV: &str = "CMS_ACCESS_TOKEN";

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub language: String,
    pub timezone: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub public_dir: String,
    pub i18n_dir: String,

    // Date format (Moment.js style)
    pub date_format: String,

    /// Run body fragments through the allow-list sanitizer
    pub sanitize: bool,

    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub reading: ReadingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Blog".to_string(),
            description: String::new(),
            language: "pt-BR".to_string(),
            timezone: String::new(),

            url: "http://example.com".to_string(),
            root: "/".to_string(),

            public_dir: "public".to_string(),
            i18n_dir: "languages".to_string(),

            date_format: "DD MMM YYYY".to_string(),

            sanitize: true,

            content: ContentConfig::default(),
            reading: ReadingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut config: SiteConfig = serde_yaml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.is_empty() {
                tracing::debug!("Using access token from {}", ACCESS_TOKEN_ENV);
                self.content.access_token = Some(token);
            }
        }
    }
}

/// Content service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// API endpoint, e.g. `https://my-repo.cdn.prismic.io/api/v2`
    pub endpoint: String,
    pub access_token: Option<String>,
    /// Document type queried for the listing
    pub document_type: String,
    /// Field projection for the listing query
    pub fetch: Vec<String>,
    pub page_size: usize,
    pub timeout_secs: u64,
    /// Read records from a local JSON file instead of the API
    pub fixture: Option<String>,
    /// How many listing pages to walk when collecting build-time identifiers
    pub prerender_pages: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: None,
            document_type: "post".to_string(),
            fetch: vec![
                "post.title".to_string(),
                "post.subtitle".to_string(),
                "post.author".to_string(),
            ],
            page_size: 20,
            timeout_secs: 10,
            fixture: None,
            prerender_pages: 1,
        }
    }
}

impl ContentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Reading time configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingConfig {
    pub words_per_minute: usize,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            words_per_minute: 200,
        }
    }
}

/// Preview server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub on_demand_timeout_secs: u64,
    /// Seconds between placeholder page refreshes
    pub placeholder_refresh_secs: u64,
    /// Refreshes before a placeholder gives up and shows the not-found page
    pub placeholder_max_attempts: u32,
    /// Identifiers the on-demand resolver remembers at once
    pub on_demand_max_entries: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            on_demand_timeout_secs: 15,
            placeholder_refresh_secs: 1,
            placeholder_max_attempts: 30,
            on_demand_max_entries: crate::detail::DEFAULT_MAX_ENTRIES,
        }
    }
}

impl ServerConfig {
    pub fn on_demand_timeout(&self) -> Duration {
        Duration::from_secs(self.on_demand_timeout_secs.max(1))
    }
}
