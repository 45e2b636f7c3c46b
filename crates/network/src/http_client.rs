use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::Config;
use crate::error::{NetError, Result};
use crate::url_loader::{UrlLoader, UrlMethod, UrlRequest, UrlResponse};

/// Production [`UrlLoader`] backed by reqwest. Transport failures surface as
/// errors; any HTTP status comes back as a response for the caller to
/// classify.
pub struct HttpClient {
    client: Client,
    config: Config,
}

impl HttpClient {
    pub fn new(config: Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NetError::Config(format!("Failed to build client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait]
impl UrlLoader for HttpClient {
    async fn load(&self, request: UrlRequest) -> Result<UrlResponse> {
        let mut builder = match request.method {
            UrlMethod::Get => self.client.get(&request.url),
            UrlMethod::Post => self.client.post(&request.url),
            UrlMethod::Put => self.client.put(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(content_type) = &request.content_type {
            builder = builder.header("content-type", content_type);
        }
        if let Some(content) = request.content {
            builder = builder.body(content);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NetError::Http(format!("{} request failed: {}", request.method, e)))?;

        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| NetError::Http(format!("Failed to read response body: {}", e)))?;

        Ok(UrlResponse {
            status_code,
            body,
            headers,
        })
    }
}
