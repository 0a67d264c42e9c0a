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


//! Client configuration
//!
//! The service can be mounted below a reverse-proxy path (for example
//! `/podcast`). That prefix is the application root and is prepended to every
//! request path, API and file downloads alike.
//!
//! # Environment
//! - `PODFETCH_SERVER_URL` - scheme, host and port of the service
//! - `APPLICATION_ROOT` - proxy path prefix, same variable the server reads
//! - `PODFETCH_DOWNLOAD_DIR` - where fetched files are saved

use crate::error::{ClientError, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Tasks page refresh period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Pause between consecutive file downloads in batch actions
pub const DEFAULT_BATCH_DOWNLOAD_DELAY: Duration = Duration::from_millis(500);

pub const ENV_SERVER_URL: &str = "PODFETCH_SERVER_URL";
pub const ENV_APPLICATION_ROOT: &str = "APPLICATION_ROOT";
pub const ENV_DOWNLOAD_DIR: &str = "PODFETCH_DOWNLOAD_DIR";

/// Configuration for ApiClient and the page controllers
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub server_url: String,
    /// Normalized: empty, or `/segment[/segment...]` without trailing slash
    pub application_root: String,
    pub download_dir: PathBuf,
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// `None` leaves requests unbounded, long conversions can take minutes
    pub request_timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub batch_download_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            application_root: String::new(),
            download_dir: PathBuf::from("."),
            user_agent: format!("podfetch/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_download_delay: DEFAULT_BATCH_DOWNLOAD_DELAY,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Read the configuration from the process environment, once
    pub fn from_env() -> Result<Self> {
        let mut builder = ClientConfigBuilder::new();
        if let Ok(server) = std::env::var(ENV_SERVER_URL) {
            builder = builder.server_url(server);
        }
        if let Ok(root) = std::env::var(ENV_APPLICATION_ROOT) {
            builder = builder.application_root(root);
        }
        if let Ok(dir) = std::env::var(ENV_DOWNLOAD_DIR) {
            builder = builder.download_dir(dir);
        }
        builder.build()
    }

    /// Join the application root and a request path
    ///
    /// A path without a leading slash gets one.
    pub fn api_path(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.application_root, path)
        } else {
            format!("{}/{}", self.application_root, path)
        }
    }

    /// Absolute URL for a request path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.server_url, self.api_path(path))
    }
}

/// Normalize a reverse-proxy prefix
///
/// `""`, `"/"` -> `""`; `"podcast/"` -> `"/podcast"`
pub fn normalize_root(root: &str) -> String {
    let trimmed = root.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Builder for ClientConfig
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn server_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.server_url = url.into();
        self
    }

    pub fn application_root<S: Into<String>>(mut self, root: S) -> Self {
        self.config.application_root = root.into();
        self
    }

    pub fn download_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.download_dir = dir.into();
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn batch_download_delay(mut self, delay: Duration) -> Self {
        self.config.batch_download_delay = delay;
        self
    }

    /// Validate and normalize
    pub fn build(mut self) -> Result<ClientConfig> {
        let parsed = Url::parse(self.config.server_url.trim())?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ClientError::InvalidConfiguration(format!(
                "server URL must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if parsed.host_str().is_none() {
            return Err(ClientError::InvalidConfiguration(
                "server URL has no host".to_string(),
            ));
        }
        self.config.server_url = parsed.as_str().trim_end_matches('/').to_string();
        self.config.application_root = normalize_root(&self.config.application_root);

        if self.config.poll_interval.is_zero() {
            return Err(ClientError::InvalidConfiguration(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        Ok(self.config)
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize_root(""), "");
        assert_eq!(normalize_root("/"), "");
        assert_eq!(normalize_root("podcast"), "/podcast");
        assert_eq!(normalize_root("/podcast/"), "/podcast");
        assert_eq!(normalize_root(" /apps/podcast "), "/apps/podcast");
    }

    #[test]
    fn test_api_path_adds_leading_slash() {
        let config = ClientConfig::builder()
            .application_root("/podcast")
            .build()
            .unwrap();
        assert_eq!(config.api_path("/api/tasks"), "/podcast/api/tasks");
        assert_eq!(config.api_path("api/tasks"), "/podcast/api/tasks");

        let bare = ClientConfig::builder().build().unwrap();
        assert_eq!(bare.api_path("api/users"), "/api/users");
    }

    #[test]
    fn test_url_for_strips_trailing_slash() {
        let config = ClientConfig::builder()
            .server_url("http://localhost:8080/")
            .application_root("podcast/")
            .build()
            .unwrap();
        assert_eq!(
            config.url_for("/downloads/abc"),
            "http://localhost:8080/podcast/downloads/abc"
        );
    }

    #[test]
    fn test_builder_rejects_bad_scheme() {
        let result = ClientConfig::builder().server_url("ftp://example.com").build();
        assert!(matches!(result, Err(ClientError::InvalidConfiguration(_))));

        let result = ClientConfig::builder().server_url("not a url").build();
        assert!(matches!(result, Err(ClientError::UrlError(_))));
    }

    #[test]
    fn test_builder_defaults() {
        let config = ClientConfig::builder().build().unwrap();
        assert_eq!(config.server_url, "http://127.0.0.1:5000");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.batch_download_delay, Duration::from_millis(500));
        assert!(config.request_timeout.is_none());
    }
}
