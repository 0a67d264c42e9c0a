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


//! Single episode endpoints
//!
//! # API Endpoints
//! - `POST /api/episode/info`
//! - `POST /api/episode/download-url`
//! - `POST /api/episode/download` (binary)

use crate::api::client::{ApiClient, ResponseStream};
use crate::api::models::{DownloadUrlResponse, EpisodeDownloadRequest, EpisodeInfo, EpisodeUrlRequest};
use crate::error::{ClientError, Result};
use reqwest::Method;

impl ApiClient {
    /// Scrape title, description and cover from an episode page
    pub async fn episode_info(&self, page_url: &str) -> Result<EpisodeInfo> {
        self.post("/api/episode/info", &EpisodeUrlRequest { url: page_url })
            .await
    }

    /// Resolve the direct audio URL of an episode page
    ///
    /// # Errors
    /// `MissingRequiredField` when the server answers without a URL
    pub async fn episode_download_url(&self, page_url: &str) -> Result<String> {
        let response: DownloadUrlResponse = self
            .post("/api/episode/download-url", &EpisodeUrlRequest { url: page_url })
            .await?;

        response
            .download_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ClientError::MissingRequiredField("download_url".to_string()))
    }

    /// Ask the server to fetch (and optionally transcode) an audio URL and stream it back
    ///
    /// The response carries `Content-Disposition` and usually `Content-Length`.
    pub async fn download_episode(
        &self,
        audio_url: &str,
        filename: &str,
        convert_to_mp3: bool,
    ) -> Result<ResponseStream> {
        let body = EpisodeDownloadRequest {
            url: audio_url,
            filename,
            convert_to_mp3,
        };
        self.request_stream(Method::POST, "/api/episode/download", Some(&body))
            .await
    }
}
