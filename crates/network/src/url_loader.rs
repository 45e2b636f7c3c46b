//! The request/response types and loader seam every outbound call goes
//! through. Production uses the reqwest-backed client; tests swap in a mock.

use async_trait::async_trait;

use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrlMethod {
    Get,
    Post,
    Put,
}

impl std::fmt::Display for UrlMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlMethod::Get => f.write_str("GET"),
            UrlMethod::Post => f.write_str("POST"),
            UrlMethod::Put => f.write_str("PUT"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UrlRequest {
    pub url: String,
    pub method: UrlMethod,
    pub headers: Vec<(String, String)>,
    pub content: Option<String>,
    pub content_type: Option<String>,
}

impl UrlRequest {
    pub fn new(method: UrlMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Vec::new(),
            content: None,
            content_type: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_json_body(mut self, body: String) -> Self {
        self.content = Some(body);
        self.content_type = Some("application/json".to_string());
        self
    }
}

#[derive(Clone, Debug)]
pub struct UrlResponse {
    pub status_code: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl UrlResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
            headers: Vec::new(),
        }
    }
}

#[async_trait]
pub trait UrlLoader: Send + Sync {
    async fn load(&self, request: UrlRequest) -> Result<UrlResponse>;
}
