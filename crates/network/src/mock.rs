//! Scriptable [`UrlLoader`] for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{NetError, Result};
use crate::url_loader::{UrlLoader, UrlMethod, UrlRequest, UrlResponse};

type Handler = Box<dyn Fn(&UrlRequest) -> UrlResponse + Send + Sync>;

struct Route {
    method: UrlMethod,
    path: String,
    handler: Handler,
}

/// Matches requests by method and URL substring, in registration order, and
/// records every request it sees. Handlers take the request, so a response
/// can be computed from the request body (for example, signing the blinded
/// tokens a caller actually sent).
#[derive(Default)]
pub struct MockUrlLoader {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<UrlRequest>>,
}

impl MockUrlLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, method: UrlMethod, path: &str, status_code: u16, body: &str) -> Self {
        let body = body.to_string();
        self.on_with(method, path, move |_| {
            UrlResponse::new(status_code, body.clone())
        })
    }

    pub fn on_with(
        self,
        method: UrlMethod,
        path: &str,
        handler: impl Fn(&UrlRequest) -> UrlResponse + Send + Sync + 'static,
    ) -> Self {
        self.routes.lock().unwrap().push(Route {
            method,
            path: path.to_string(),
            handler: Box::new(handler),
        });
        self
    }

    pub fn requests(&self) -> Vec<UrlRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl UrlLoader for MockUrlLoader {
    async fn load(&self, request: UrlRequest) -> Result<UrlResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let routes = self.routes.lock().unwrap();
        for route in routes.iter() {
            if route.method == request.method && request.url.contains(&route.path) {
                return Ok((route.handler)(&request));
            }
        }
        Err(NetError::Http(format!(
            "No mock registered for {} {}",
            request.method, request.url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn routes_match_by_method_and_substring() {
        let loader = MockUrlLoader::new()
            .on(UrlMethod::Get, "/v1/thing", 200, "ok")
            .on(UrlMethod::Post, "/v1/thing", 201, "created");

        let response = loader
            .load(UrlRequest::new(
                UrlMethod::Post,
                "https://example.com/v1/thing?nonce=abc",
            ))
            .await
            .unwrap();
        assert_eq!(response.status_code, 201);
        assert_eq!(loader.requests().len(), 1);
    }

    #[tokio::test]
    async fn unmatched_request_is_an_error() {
        let loader = MockUrlLoader::new();
        let result = loader
            .load(UrlRequest::new(UrlMethod::Get, "https://example.com/x"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn handler_sees_the_request_body() {
        let loader = MockUrlLoader::new().on_with(UrlMethod::Post, "/echo", |request| {
            UrlResponse::new(200, request.content.clone().unwrap_or_default())
        });

        let response = loader
            .load(
                UrlRequest::new(UrlMethod::Post, "https://example.com/echo")
                    .with_json_body("{\"k\":1}".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(response.body, "{\"k\":1}");
    }
}
