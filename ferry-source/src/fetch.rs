use std::time::Duration;

use ferry_core::error::{FerryError, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

const USER_AGENT: &str = concat!("ferry/", env!("CARGO_PKG_VERSION"));

/// Source of JSON documents keyed by URL.
pub trait JsonFetcher {
    fn get_json(&self, url: &str) -> Result<Value>;
}

/// Blocking HTTP implementation backed by `reqwest`.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl JsonFetcher for HttpFetcher {
    fn get_json(&self, url: &str) -> Result<Value> {
        debug!(url = %url, "GET");
        let response = self.client.get(url).send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FerryError::Source(format!(
                "GET {} returned {}: {}",
                url,
                status,
                body.trim()
            )));
        }

        Ok(response.json()?)
    }
}

impl<F: JsonFetcher + ?Sized> JsonFetcher for &F {
    fn get_json(&self, url: &str) -> Result<Value> {
        (**self).get_json(url)
    }
}
