use std::time::Duration;

use reqwest::StatusCode;

use super::error::FetchError;

/// Upstream element-set source. A trait so tests inject scripted responses
/// instead of a live endpoint.
pub trait TleSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Real upstream client with a bounded request timeout, so a hung upstream
/// consumes one retry attempt instead of stalling the caller forever.
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl TleSource for HttpSource {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        // CelesTrak-style sources answer over-quota callers with 403; 429 is
        // the generic rate-limit signal. Both terminate the retry loop.
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::Throttled {
                status: status.as_u16(),
                stale_available: false,
            });
        }
        if !status.is_success() {
            return Err(FetchError::Upstream {
                status: status.as_u16(),
            });
        }

        response
            .text()
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}
