//! Client for pajbot-compatible banphrase test endpoints.
//!
//! Channels can point the bot at an external moderation service; before a
//! reply is sent there, it is submitted to `POST {base}/api/v1/banphrases/test`
//! and dropped or rewritten if the service flags it.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const TEST_ENDPOINT: &str = "api/v1/banphrases/test";

pub struct BanphraseApiClient {
    client: reqwest::Client,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Invalid banphrase API base url: {0}")]
    InvalidBaseUrl(String),
}

impl BanphraseApiClient {
    /// `request_timeout` bounds a single HTTP round trip; the caller is
    /// expected to enforce its own overall budget on top.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        Ok(BanphraseApiClient {
            client: reqwest::ClientBuilder::new()
                .timeout(request_timeout)
                .build()?,
        })
    }

    /// Submit a candidate message to the service rooted at `base_url`.
    pub async fn test(&self, base_url: &str, message: &str) -> Result<BanphraseTest> {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), TEST_ENDPOINT);
        let response = self
            .client
            .post(&url)
            .form(&[("message", message)])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<BanphraseTest>().await?)
    }
}

/// Verdict returned by the banphrase test endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BanphraseTest {
    pub banned: bool,
    /// Details of the matched phrase, present when `banned` is set
    #[serde(default)]
    pub banphrase_data: Option<BanphraseData>,
    #[serde(default)]
    pub input_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BanphraseData {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phrase: Option<String>,
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(default)]
    pub permanent: Option<bool>,
    #[serde(default)]
    pub case_sensitive: Option<bool>,
}
