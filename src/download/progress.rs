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


//! Download progress reporting
//!
//! A [`DownloadProgress`] snapshot is handed to the surface after every chunk.
//! Percentages are only computed when the total is known. Without a total the
//! display falls back to absolute megabytes.

use serde::{Deserialize, Serialize};

/// Phase of a single-file download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadState {
    /// Resolving the download URL
    Preparing,
    /// Server is transcoding to mp3 before the first byte arrives
    Converting,
    Downloading,
    Completed,
    Failed,
}

/// Progress snapshot for one download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// What is being downloaded, usually the episode title
    pub label: String,

    pub bytes_downloaded: u64,

    /// From `Content-Length`; `None` when the server did not say
    pub total_bytes: Option<u64>,

    pub state: DownloadState,

    pub error_message: Option<String>,
}

impl DownloadProgress {
    pub fn new<S: Into<String>>(label: S) -> Self {
        Self {
            label: label.into(),
            bytes_downloaded: 0,
            total_bytes: None,
            state: DownloadState::Preparing,
            error_message: None,
        }
    }

    /// Record a chunk boundary
    pub fn update(&mut self, bytes_downloaded: u64, total_bytes: Option<u64>) {
        self.bytes_downloaded = bytes_downloaded;
        self.total_bytes = total_bytes.filter(|t| *t > 0);
        self.state = DownloadState::Downloading;
    }

    pub fn set_state(&mut self, state: DownloadState) {
        self.state = state;
    }

    pub fn set_error<S: Into<String>>(&mut self, message: S) {
        self.state = DownloadState::Failed;
        self.error_message = Some(message.into());
    }

    /// Rounded percentage, capped at 100; `None` without a usable total
    pub fn percent(&self) -> Option<u32> {
        let total = self.total_bytes.filter(|t| *t > 0)?;
        let pct = (self.bytes_downloaded as f64 / total as f64 * 100.0).round();
        Some((pct as u32).min(100))
    }

    /// Bytes as megabytes with two decimals, 1 MB = 1024 * 1024 bytes
    pub fn mb_string(bytes: u64) -> String {
        format!("{:.2}MB", bytes as f64 / 1024.0 / 1024.0)
    }

    pub fn display_string(&self) -> String {
        match self.state {
            DownloadState::Preparing => "Preparing download...".to_string(),
            DownloadState::Converting => "Converting to mp3, please wait...".to_string(),
            DownloadState::Downloading => match (self.percent(), self.total_bytes) {
                (Some(pct), Some(total)) => format!(
                    "Downloading: {}% ({} / {})",
                    pct,
                    Self::mb_string(self.bytes_downloaded),
                    Self::mb_string(total)
                ),
                _ => format!("Downloading: {}", Self::mb_string(self.bytes_downloaded)),
            },
            DownloadState::Completed => "All done".to_string(),
            DownloadState::Failed => format!(
                "Download failed: {}",
                self.error_message.as_deref().unwrap_or("Unknown error")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_known_total() {
        let mut progress = DownloadProgress::new("Episode");
        progress.update(1_289_748, Some(3_072_000));
        assert_eq!(progress.percent(), Some(42));
        assert_eq!(progress.display_string(), "Downloading: 42% (1.23MB / 2.93MB)");
    }

    #[test]
    fn test_unknown_total_has_no_percent() {
        let mut progress = DownloadProgress::new("Episode");
        progress.update(1_289_748, None);
        assert_eq!(progress.percent(), None);
        assert_eq!(progress.display_string(), "Downloading: 1.23MB");

        // zero is treated like unknown
        progress.update(10, Some(0));
        assert_eq!(progress.total_bytes, None);
        assert_eq!(progress.percent(), None);
    }

    #[test]
    fn test_percent_is_capped() {
        let mut progress = DownloadProgress::new("Episode");
        progress.update(200, Some(100));
        assert_eq!(progress.percent(), Some(100));
    }

    #[test]
    fn test_state_strings() {
        let mut progress = DownloadProgress::new("Episode");
        assert_eq!(progress.display_string(), "Preparing download...");

        progress.set_state(DownloadState::Converting);
        assert!(progress.display_string().starts_with("Converting"));

        progress.set_state(DownloadState::Completed);
        assert_eq!(progress.display_string(), "All done");

        progress.set_error("connection reset");
        assert_eq!(progress.state, DownloadState::Failed);
        assert_eq!(progress.display_string(), "Download failed: connection reset");
    }
}
