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


//! Stored file endpoints
//!
//! # API Endpoints
//! - `GET /api/downloads[?username=]`
//! - `GET /downloads/{file_id}` (binary, outside `/api`)
//! - `POST /api/audio/convert`, `POST /api/audio/batch/convert`
//! - `DELETE /api/downloads/{file_id}`, `POST /api/downloads/batch/delete`

use crate::api::client::{path_segment, ApiClient, ResponseStream};
use crate::api::models::{
    BatchConvertResponse, BatchDeleteResponse, ConvertRequest, ConvertResponse, DownloadsResponse,
    FileIdsRequest, MessageResponse,
};
use crate::error::{ClientError, Result};
use serde::Serialize;

#[derive(Serialize)]
struct DownloadsQuery<'a> {
    username: &'a str,
}

impl ApiClient {
    /// List stored files, all users or one
    pub async fn downloads(&self, username: Option<&str>) -> Result<DownloadsResponse> {
        match username.filter(|u| !u.is_empty()) {
            Some(username) => {
                self.get_with_query("/api/downloads", &DownloadsQuery { username })
                    .await
            }
            None => self.get("/api/downloads").await,
        }
    }

    /// Path of a stored file relative to the application root
    pub fn file_path(file_id: &str) -> String {
        format!("/downloads/{}", path_segment(file_id))
    }

    /// Stream a stored file
    pub async fn fetch_file(&self, file_id: &str) -> Result<ResponseStream> {
        self.get_stream(&Self::file_path(file_id)).await
    }

    /// Convert one stored m4a file to mp3
    pub async fn convert_file(&self, file_id: &str) -> Result<ConvertResponse> {
        self.post("/api/audio/convert", &ConvertRequest { file_id })
            .await
    }

    pub async fn batch_convert(&self, file_ids: &[String]) -> Result<BatchConvertResponse> {
        if file_ids.is_empty() {
            return Err(ClientError::EmptySelection("convert".to_string()));
        }
        self.post("/api/audio/batch/convert", &FileIdsRequest { file_ids })
            .await
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<MessageResponse> {
        self.delete(&format!("/api/downloads/{}", path_segment(file_id)))
            .await
    }

    /// Delete several stored files
    ///
    /// # Errors
    /// `EmptySelection` without sending anything when `file_ids` is empty
    pub async fn batch_delete(&self, file_ids: &[String]) -> Result<BatchDeleteResponse> {
        if file_ids.is_empty() {
            return Err(ClientError::EmptySelection("delete".to_string()));
        }
        self.post("/api/downloads/batch/delete", &FileIdsRequest { file_ids })
            .await
    }
}
