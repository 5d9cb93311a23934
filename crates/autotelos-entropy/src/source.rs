//! External byte sources

use crate::error::{EntropyError, EntropyResult};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Largest request the QRNG endpoint accepts in one call.
const QRNG_MAX_LENGTH: usize = 1024;

#[async_trait::async_trait]
pub trait ByteSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch up to `n` random bytes.
    async fn fetch(&self, n: usize) -> EntropyResult<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
struct QrngResponse {
    #[serde(default)]
    data: Vec<u8>,
    #[serde(default)]
    success: bool,
}

/// Quantum random number service speaking the
/// `GET /API/jsonI.php?length=N&type=uint8` protocol.
pub struct QrngSource {
    client: Client,
    endpoint: String,
}

impl QrngSource {
    pub fn new(base_url: &str, timeout: Duration) -> EntropyResult<Self> {
        if base_url.trim().is_empty() {
            return Err(EntropyError::Config("qrng base_url is empty".into()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EntropyError::Config(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: format!("{}/API/jsonI.php", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl ByteSource for QrngSource {
    fn name(&self) -> &str {
        "qrng"
    }

    async fn fetch(&self, n: usize) -> EntropyResult<Vec<u8>> {
        let length = n.clamp(1, QRNG_MAX_LENGTH);
        debug!("fetching {} bytes from {}", length, self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("length", length.to_string()), ("type", "uint8".to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EntropyError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: QrngResponse = response.json().await?;
        if !parsed.success {
            return Err(EntropyError::Rejected);
        }
        if parsed.data.is_empty() {
            return Err(EntropyError::Empty);
        }
        Ok(parsed.data)
    }
}
