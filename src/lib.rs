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


//! PodFetch core
//!
//! Client library for the podcast episode download service:
//!
//! - [`api`]: typed requests against the server's JSON API
//! - [`download`]: streamed downloads with progress, filename resolution and saving
//! - [`render`]: element trees rendered as escaped HTML or plain text
//! - [`pages`]: page controllers driving a host [`pages::Surface`]
//!
//! ```no_run
//! use podfetch_core::{ApiClient, ClientConfig};
//!
//! # async fn run() -> podfetch_core::Result<()> {
//! let config = ClientConfig::builder()
//!     .server_url("http://127.0.0.1:5000")
//!     .application_root("/podcast")
//!     .build()?;
//! let api = ApiClient::new(config)?;
//! for task in api.tasks().await? {
//!     println!("{} {}", task.task_id, task.status.display_text());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod download;
pub mod error;
pub mod logging;
pub mod pages;
pub mod render;

pub use api::{ApiClient, ResponseStream};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{ClientError, Result};
pub use pages::{App, Page, Region, Surface};
