//! The HTTP exchange seam.
//!
//! Every outgoing exchange (description GET, SCPD GET, SOAP POST,
//! SUBSCRIBE/UNSUBSCRIBE) goes through [`HttpExchange`]; the engine never
//! touches a socket directly. [`ReqwestExchange`] is the production
//! implementation; tests substitute their own.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::{CtrlPointError, Result};
use crate::transport::local_address_towards;

/// An outgoing request. Methods beyond the standard set (SUBSCRIBE,
/// UNSUBSCRIBE, NOTIFY) are carried verbatim.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into(),
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A completed response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Local interface address the exchange went out on, when known
    pub local_addr: Option<IpAddr>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status / 100 == 2
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The transport collaborator: send one request, get one response.
#[async_trait]
pub trait HttpExchange: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Production exchange backed by `reqwest`.
pub struct ReqwestExchange {
    client: reqwest::Client,
}

impl ReqwestExchange {
    pub fn new(user_agent: &str) -> Result<Arc<dyn HttpExchange>> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| CtrlPointError::Transport(e.to_string()))?;
        Ok(Arc::new(Self { client }))
    }
}

#[async_trait]
impl HttpExchange for ReqwestExchange {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| CtrlPointError::InvalidResponse("unsupported method"))?;

        // The socket's local address is not observable through the client,
        // so derive the interface that routes to the peer.
        let local_addr = local_address_towards(&request.url);

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CtrlPointError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await.ok().filter(|text| !text.is_empty());

        Ok(HttpResponse {
            status,
            headers,
            body,
            local_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_success_and_header_lookup() {
        let response = HttpResponse {
            status: 206,
            headers: vec![("SID".into(), "uuid:sub1".into())],
            body: None,
            local_addr: None,
        };
        assert!(response.is_success());
        assert_eq!(response.header("sid"), Some("uuid:sub1"));
        assert_eq!(response.header("timeout"), None);

        let failed = HttpResponse {
            status: 404,
            headers: vec![],
            body: None,
            local_addr: None,
        };
        assert!(!failed.is_success());
    }

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::new("SUBSCRIBE", Url::parse("http://10.0.0.5/event").unwrap())
            .header("NT", "upnp:event")
            .body("x");
        assert_eq!(request.method, "SUBSCRIBE");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.body.as_deref(), Some("x"));
    }
}
