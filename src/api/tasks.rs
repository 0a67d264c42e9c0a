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


//! Task endpoints

use crate::api::client::{path_segment, ApiClient};
use crate::api::models::{FfmpegStatus, MessageResponse, Task, TasksResponse};
use crate::error::Result;

impl ApiClient {
    pub async fn tasks(&self) -> Result<Vec<Task>> {
        let response: TasksResponse = self.get("/api/tasks").await?;
        Ok(response.tasks)
    }

    pub async fn task(&self, task_id: &str) -> Result<Task> {
        self.get(&format!("/api/tasks/{}", path_segment(task_id)))
            .await
    }

    pub async fn cancel_task(&self, task_id: &str) -> Result<MessageResponse> {
        self.post_empty(&format!("/api/tasks/{}/cancel", path_segment(task_id)))
            .await
    }

    /// Whether the server can transcode to mp3
    pub async fn ffmpeg_status(&self) -> Result<FfmpegStatus> {
        self.get("/api/ffmpeg/check").await
    }
}
