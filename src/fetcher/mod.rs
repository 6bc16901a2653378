pub mod http_fetcher;
pub mod oauth;

use async_trait::async_trait;
use serde_json::Value;

use crate::app::Result;

/// Which slice of the timeline to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Everything newer than the given post id
    Since(u64),
    /// The most recent `n` posts
    Recent(u32),
}

#[derive(Debug)]
pub struct FetchResponse {
    pub status: u16,
    /// Raw timeline records; empty unless `status` is 200
    pub items: Vec<Value>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

#[async_trait]
pub trait Fetcher {
    /// Transport and authentication failures are errors; any other HTTP
    /// status the server answered with is reported in the response.
    async fn fetch(&self, mode: FetchMode) -> Result<FetchResponse>;
}
