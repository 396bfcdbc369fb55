//! Outbound HTTP over reqwest

use crate::domain::callback::HttpClient;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post_json(&self, url: &str, body: Option<String>) -> Result<()> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(body.unwrap_or_default())
            .send()
            .await
            .map_err(|e| DomainError::Internal(format!("POST {} failed: {}", url, e)))?;

        let status = response.status();
        debug!("POST {} answered {}", url, status);
        if !status.is_success() {
            return Err(DomainError::Internal(format!("POST {} answered {}", url, status)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let client = ReqwestHttpClient::new(Duration::from_millis(500)).unwrap();
        let result = client.post_json("http://127.0.0.1:9/decline", None).await;
        assert!(matches!(result, Err(DomainError::Internal(_))));
    }
}
