use anyhow::{Context, Result};
use std::time::{Duration, Instant};

use crate::config::CrawlConfig;

/// A fetched document: status, how long it took, and the raw body
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub elapsed: Duration,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Anything that can GET a URL
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<FetchResponse>;
}

/// Blocking HTTP client with a bounded per-request timeout
pub struct HttpClient {
    client: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetch for HttpClient {
    fn fetch(&self, url: &str) -> Result<FetchResponse> {
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Failed to fetch: {}", url))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .with_context(|| format!("Failed to read response: {}", url))?;

        Ok(FetchResponse {
            status,
            elapsed: start.elapsed(),
            body: body.to_vec(),
        })
    }
}
