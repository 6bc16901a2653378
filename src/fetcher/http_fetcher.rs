use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use url::Url;

use crate::app::{ChirpError, Result};
use crate::config::Config;
use crate::fetcher::oauth::OAuthSigner;
use crate::fetcher::{FetchMode, FetchResponse, Fetcher};

const HOME_TIMELINE: &str = "statuses/home_timeline.json";

/// Home-timeline client for the v1.1 REST API.
pub struct TimelineClient {
    client: Client,
    signer: OAuthSigner,
    endpoint: String,
}

impl TimelineClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .brotli(true)
            .user_agent(concat!("chirpmail/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            signer: OAuthSigner::new(config.credentials.clone()),
            endpoint: format!("{}/{}", config.api_base, HOME_TIMELINE),
        })
    }

    fn query(mode: FetchMode) -> Vec<(&'static str, String)> {
        match mode {
            FetchMode::Since(id) => vec![("since_id", id.to_string())],
            FetchMode::Recent(count) => vec![("count", count.to_string())],
        }
    }
}

#[async_trait]
impl Fetcher for TimelineClient {
    async fn fetch(&self, mode: FetchMode) -> Result<FetchResponse> {
        let params = Self::query(mode);
        let mut url = Url::parse(&self.endpoint).map_err(|e| ChirpError::Fetch(e.to_string()))?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));

        let auth = self
            .signer
            .authorization_header("GET", &self.endpoint, &params);

        tracing::debug!(?mode, endpoint = %self.endpoint, "Requesting home timeline");
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, auth)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ChirpError::Fetch(format!("authentication rejected ({})", status)));
        }
        if status != StatusCode::OK {
            return Ok(FetchResponse {
                status: status.as_u16(),
                items: Vec::new(),
            });
        }

        let body = response.bytes().await?;
        let items: Vec<Value> = serde_json::from_slice(&body)
            .map_err(|e| ChirpError::Fetch(format!("unexpected timeline payload: {}", e)))?;

        Ok(FetchResponse {
            status: status.as_u16(),
            items,
        })
    }
}
