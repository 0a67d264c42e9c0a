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


//! Binary downloads
//!
//! - `filename` - derive a safe name from `Content-Disposition`
//! - `stream` - read a response body with progress reporting
//! - `progress` - progress snapshots and their display text
//! - `save` - staged writes into the download directory

pub mod filename;
pub mod progress;
pub mod save;
pub mod stream;

// Re-export commonly used types
pub use filename::{resolve_filename, sanitize_base_name};
pub use progress::{DownloadProgress, DownloadState};
pub use save::SavedFile;
pub use stream::{download, download_to_dir, StreamedPayload};
