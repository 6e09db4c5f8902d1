use std::time::Duration;

use reqwest::blocking::Client;

use crate::{
    types::{FetchError, WarmError},
    utils::USER_AGENT,
};

/// Transport used for the sitemap and for every page request.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(insecure: bool, timeout: Duration) -> Result<Self, WarmError> {
        let mut builder = Client::builder().user_agent(USER_AGENT).timeout(timeout);
        if insecure {
            warn!("TLS certificate and hostname verification disabled");
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let client = builder
            .build()
            .map_err(|e| WarmError::Transport(e.to_string()))?;

        Ok(HttpFetcher { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let res = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError(e.to_string()))?;
        let body = res.bytes().map_err(|e| FetchError(e.to_string()))?;
        Ok(body.to_vec())
    }
}
