//! Crawl configuration, loaded from an optional CONL file

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "quotes.conl";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    /// SQLite file to open or create
    pub database_path: String,
    /// Site root every relative link is resolved against
    pub base_url: String,
    /// Quote tag whose listing pages are crawled
    pub tag: String,
    pub first_page: u32,
    pub last_page: u32,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// End the crawl at the first listing page without quotes
    pub stop_when_empty: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            database_path: "quotesDB.db".to_string(),
            base_url: "https://www.goodreads.com".to_string(),
            tag: "philosophy".to_string(),
            first_page: 1,
            last_page: 99,
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (compatible; QuotesScraper/0.1)".to_string(),
            stop_when_empty: false,
        }
    }
}

impl CrawlConfig {
    /// Load from `path`, or from `quotes.conl` if it exists, or fall back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from_path(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_conl::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.site_url()?;
        if url.host_str().is_none() {
            bail!("base_url '{}' has no host", self.base_url);
        }
        if self.first_page == 0 {
            bail!("first_page must be at least 1");
        }
        if self.first_page > self.last_page {
            bail!(
                "first_page ({}) is after last_page ({})",
                self.first_page,
                self.last_page
            );
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than 0");
        }
        Ok(())
    }

    pub fn site_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).with_context(|| format!("Invalid base_url: {}", self.base_url))
    }

    /// Listing page URL for `page`, e.g. `/quotes/tag/philosophy?page=3`
    pub fn listing_url(&self, page: u32) -> Result<Url> {
        let mut url = self
            .site_url()?
            .join(&format!("/quotes/tag/{}", self.tag))
            .with_context(|| format!("Invalid tag: {}", self.tag))?;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        Ok(url)
    }
}
