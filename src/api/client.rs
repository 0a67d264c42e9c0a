// PodFetch - Podcast Episode Download Client
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! HTTP client for the download service
//!
//! Thin wrapper around `reqwest::Client` that joins every request path with the
//! configured application root and turns responses into typed results.
//!
//! # Response handling
//! - JSON endpoints: the `Content-Type` must be JSON, otherwise the response is
//!   malformed and the first 200 characters are logged. Non-2xx answers become
//!   application errors carrying the body's `error` field.
//! - Binary endpoints: [`ApiClient::request_stream`] hands back a
//!   [`ResponseStream`] whose body is consumed chunk by chunk.
//!
//! There is no retry logic. Every failure is returned to the caller as-is.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use bytes::Bytes;
use futures_util::Stream;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// Characters of a non-JSON body kept for diagnostics
const BODY_SNIPPET_CHARS: usize = 200;

/// A binary response whose body has not been read yet
#[derive(Debug)]
pub struct ResponseStream {
    response: Response,
    content_length: Option<u64>,
    content_disposition: Option<String>,
    content_type: Option<String>,
}

impl ResponseStream {
    /// Expected body size from `Content-Length`, `None` when absent or unusable
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Raw `Content-Disposition` header value
    pub fn content_disposition(&self) -> Option<&str> {
        self.content_disposition.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Consume into the chunked body
    pub fn into_body(self) -> impl Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send {
        self.response.bytes_stream()
    }
}

/// Client for the service API
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
}

impl ApiClient {
    /// Create a client for an already validated configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| ClientError::InvalidInput(format!("Invalid user agent: {}", e)))?,
        );

        let mut builder = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout);

        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build()?;

        debug!(
            server = %config.server_url,
            root = %config.application_root,
            "API client ready"
        );

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Absolute URL for a request path, application root included
    pub fn url(&self, path: &str) -> String {
        self.config.url_for(path)
    }

    /// GET returning JSON
    pub async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, path, None::<&()>).await
    }

    /// GET with query parameters returning JSON
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let builder = self.client.get(self.url(path)).query(query);
        self.execute_json(builder, path).await
    }

    /// POST with a JSON body returning JSON
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    /// POST without a body returning JSON
    pub async fn post_empty<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, None::<&()>).await
    }

    pub async fn delete<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request(Method::DELETE, path, None::<&()>).await
    }

    /// POST a multipart form returning JSON
    pub async fn post_multipart<T>(&self, path: &str, form: Form) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let builder = self.client.post(self.url(path)).multipart(form);
        self.execute_json(builder, path).await
    }

    async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(b) = body {
            // .json() sets Content-Type: application/json
            builder = builder.json(b);
        }
        self.execute_json(builder, path).await
    }

    /// Send a request and return the unread binary response
    pub async fn request_stream<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ResponseStream>
    where
        B: Serialize + ?Sized,
    {
        let mut builder = self.client.request(method.clone(), self.url(path));
        if let Some(b) = body {
            builder = builder.json(b);
        }

        debug!(method = %method, path = %path, "stream request");
        let response = builder.send().await.map_err(ClientError::from_transport)?;
        let status = response.status();

        if !status.is_success() {
            return Err(self.error_from_response(response, path).await);
        }

        let headers = response.headers();
        let content_length = parse_content_length(header_str(headers, CONTENT_LENGTH));
        let content_disposition = header_str(headers, CONTENT_DISPOSITION).map(str::to_string);
        let content_type = header_str(headers, CONTENT_TYPE).map(str::to_string);

        debug!(
            path = %path,
            status = status.as_u16(),
            content_length = ?content_length,
            "stream response"
        );

        Ok(ResponseStream {
            response,
            content_length,
            content_disposition,
            content_type,
        })
    }

    /// GET a stored file
    pub async fn get_stream(&self, path: &str) -> Result<ResponseStream> {
        self.request_stream(Method::GET, path, None::<&()>).await
    }

    async fn execute_json<T>(&self, builder: RequestBuilder, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let builder = builder.header(ACCEPT, "application/json");
        debug!(path = %path, "request");

        let response = builder.send().await.map_err(ClientError::from_transport)?;
        self.handle_json_response(response, path).await
    }

    async fn handle_json_response<T>(&self, response: Response, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let content_type = header_str(response.headers(), CONTENT_TYPE).map(str::to_string);
        let body = response.text().await.map_err(ClientError::from_transport)?;

        debug!(path = %path, status = status.as_u16(), bytes = body.len(), "response");

        if !is_json_content_type(content_type.as_deref()) {
            let snippet = body_snippet(&body);
            warn!(
                path = %path,
                status = status.as_u16(),
                content_type = ?content_type,
                body = %snippet,
                "expected JSON response"
            );
            return Err(ClientError::InvalidApiResponse {
                message: format!(
                    "Expected JSON from {} but got {}",
                    path,
                    content_type.as_deref().unwrap_or("no content type")
                ),
                status_code: Some(status.as_u16()),
                content_type,
                body_snippet: Some(snippet),
            });
        }

        if !status.is_success() {
            let message = extract_error_message(&body)
                .unwrap_or_else(|| default_status_message(status.as_u16()));
            return Err(ClientError::api_failed(
                message,
                Some(status.as_u16()),
                Some(path.to_string()),
            ));
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            let snippet = body_snippet(&body);
            warn!(path = %path, error = %e, body = %snippet, "response JSON did not parse");
            ClientError::InvalidApiResponse {
                message: format!("Parse error: {} at line {} col {}", e, e.line(), e.column()),
                status_code: Some(status.as_u16()),
                content_type,
                body_snippet: Some(snippet),
            }
        })
    }

    /// Application error for a non-2xx binary response
    async fn error_from_response(&self, response: Response, path: &str) -> ClientError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message =
            extract_error_message(&body).unwrap_or_else(|| default_status_message(status));
        warn!(path = %path, status, error = %message, "request failed");
        ClientError::api_failed(message, Some(status), Some(path.to_string()))
    }
}

/// Percent-encode a user-supplied path segment
pub fn path_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// `error` field of a JSON error body, if there is one
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::String(_) | serde_json::Value::Null | serde_json::Value::Bool(false) => None,
        other => Some(other.to_string()),
    }
}

/// Matches `application/json` and `+json` media types, any parameters
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(value) = content_type else {
        return false;
    };
    let media = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    media == "application/json" || media.ends_with("+json")
}

/// Numeric, non-zero `Content-Length` or unknown
pub fn parse_content_length(value: Option<&str>) -> Option<u64> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
}

fn default_status_message(status: u16) -> String {
    format!("Request failed with status {}", status)
}

fn header_str(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn body_snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}

// ===== TESTS =====
