//! Resource fetching for the dump and the policy feeds.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::time::Duration;

use crate::{Error, Result};

/// Fetch opens a streaming reader over the content behind a URL.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read + '_>>;
}

/// Blocking HTTP fetcher.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a 60 second request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(60))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read + '_>> {
        log::debug!("Fetching {}", url);

        let response = self.client.get(url).send().map_err(|e| Error::Fetch {
            url: url.to_string(),
            source: e,
        })?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(Box::new(response))
    }
}

/// In-memory fetcher keyed by URL.
///
/// Unknown URLs answer with a 404 status error.
#[derive(Debug, Default, Clone)]
pub struct MemoryFetcher {
    resources: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register content for a URL.
    pub fn insert(&mut self, url: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.resources.insert(url.into(), content.into());
    }

    /// Builder-style variant of [`MemoryFetcher::insert`].
    pub fn with(mut self, url: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(url, content);
        self
    }
}

impl Fetch for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read + '_>> {
        match self.resources.get(url) {
            Some(content) => Ok(Box::new(Cursor::new(content.as_slice()))),
            None => Err(Error::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
