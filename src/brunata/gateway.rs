//! HTTP access to the provider through a caller-owned connection pool.
//!
//! The gateway only borrows a `reqwest::Client` handle. Everything it needs
//! per call (browser headers, bearer tokens, handshake cookies) travels on
//! the individual request, so other users of the same pool never see it.

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, LOCATION, USER_AGENT,
};
use reqwest::{redirect, Client as HttpClient, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Request body variants the provider accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Form(Vec<(String, String)>),
}

/// One outgoing request with all of its headers composed locally.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn post_form(url: Url, pairs: &[(&str, &str)]) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: HeaderMap::new(),
            body: Some(RequestBody::Form(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )),
        }
    }

    /// Adds every header from `headers`, replacing same-named ones.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Result<Self, TransportError> {
        let value = HeaderValue::from_str(value).map_err(|_| TransportError::InvalidHeader {
            name: name.to_string(),
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    /// Final URL, which differs from the request URL if the pool followed redirects
    pub url: Url,
    pub headers: HeaderMap,
    /// Cookies set by this response, in header order
    pub cookies: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION)?.to_str().ok()
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .rev()
            .find(|(cookie_name, _)| cookie_name == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Executes single requests. No retries, no redirects of its own.
///
/// This is the only capability provider code has on the shared pool:
/// it can send a request, it cannot change the pool's defaults.
#[async_trait]
pub trait HttpGateway: Send + Sync {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Gateway over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestGateway {
    http_client: HttpClient,
}

impl ReqwestGateway {
    /// Wraps a handle to a pool owned by someone else.
    pub fn new(http_client: HttpClient) -> Self {
        Self { http_client }
    }

    /// Builds a pool suited to the login handshake: bounded per-call
    /// timeout, no automatic redirects, no cookie store.
    pub fn shared_client(timeout: Duration) -> Result<HttpClient, TransportError> {
        Ok(HttpClient::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?)
    }
}

#[async_trait]
impl HttpGateway for ReqwestGateway {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;
        tracing::debug!(method = %method, url = %url.path(), "Sending request");

        let mut builder = self.http_client.request(method, url).headers(headers);
        builder = match body {
            Some(RequestBody::Form(pairs)) => builder.form(&pairs),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().clone();
        let headers = response.headers().clone();
        let cookies = response
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        let body = response.text().await?;

        tracing::debug!(status = status.as_u16(), url = %url.path(), "Received response");
        Ok(HttpResponse {
            status,
            url,
            headers,
            cookies,
            body,
        })
    }
}

/// Headers a desktop browser would send, composed fresh for each call.
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers
}
