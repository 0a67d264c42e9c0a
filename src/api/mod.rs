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


//! Download service API client
//!
//! `client` holds the request plumbing. Each endpoint group adds its own
//! `impl ApiClient` block in a separate file.

pub mod client;
pub mod models;
pub mod episode;
pub mod users;
pub mod tasks;
pub mod downloads;

// Re-export commonly used types
pub use client::{ApiClient, ResponseStream};
pub use models::{DownloadRecord, Episode, EpisodeInfo, Subscription, Task, TaskKind, TaskStatus};
