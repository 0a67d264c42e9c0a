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


//! Wire types for the download service API
//!
//! Field names follow the server's JSON exactly. Everything the server may
//! omit is `#[serde(default)]` so a sparse record still deserializes.

use serde::{Deserialize, Serialize};

// ===== Episodes =====

/// `POST /api/episode/info` response
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EpisodeInfo {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Cover image URL
    #[serde(default)]
    pub cover: Option<String>,
}

/// Body for endpoints that take a single episode page URL
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeUrlRequest<'a> {
    pub url: &'a str,
}

/// `POST /api/episode/download-url` response
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadUrlResponse {
    #[serde(default)]
    pub download_url: Option<String>,
}

/// `POST /api/episode/download` body
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeDownloadRequest<'a> {
    /// Direct audio URL
    pub url: &'a str,
    /// Sanitized base name the server uses in Content-Disposition
    pub filename: &'a str,
    pub convert_to_mp3: bool,
}

/// One item of a subscription's feed
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Episode {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub cover: String,

    /// Empty when the feed item has no enclosure
    #[serde(default)]
    pub audio_url: String,

    #[serde(default)]
    pub published: String,

    #[serde(default)]
    pub link: String,
}

impl Episode {
    pub fn has_audio(&self) -> bool {
        !self.audio_url.trim().is_empty()
    }
}

// ===== Users & Subscriptions =====

/// Generic `{message}` acknowledgement
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// `POST /api/user/create` response
///
/// Creating an existing user loads it and returns its subscriptions.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserResponse {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateUserRequest<'a> {
    pub username: &'a str,
}

/// Entry of `GET /api/users`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UserSummary {
    pub username: String,

    #[serde(default)]
    pub created_at: String,

    #[serde(default)]
    pub subscriptions_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersResponse {
    #[serde(default)]
    pub users: Vec<UserSummary>,
}

/// One feed imported from OPML, addressed by its index in the user's list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub text: String,

    #[serde(rename = "xmlUrl", default)]
    pub xml_url: String,

    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// `POST /api/user/{u}/opml` response
#[derive(Debug, Clone, Deserialize)]
pub struct OpmlUploadResponse {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionsResponse {
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

/// `GET /api/user/{u}/subscriptions/{i}/episodes` response
#[derive(Debug, Clone, Deserialize)]
pub struct EpisodesResponse {
    #[serde(default)]
    pub subscription: Subscription,

    #[serde(default)]
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadLatestRequest {
    pub count: u32,
    pub convert_to_mp3: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartMonitorRequest {
    pub convert_to_mp3: bool,
}

/// Response of the two task-creating endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct TaskCreatedResponse {
    #[serde(default)]
    pub message: String,

    pub task_id: String,
}

// ===== Tasks =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Status word shown in the task list
    pub fn display_text(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    /// Only tasks that have not finished can be cancelled
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

/// Per-subscription counters of a download-latest task
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskProgress {
    #[serde(default)]
    pub completed: u32,

    #[serde(default)]
    pub total: u32,

    #[serde(default)]
    pub failed: u32,
}

impl TaskProgress {
    /// Rounded completion percentage, 0 when total is 0
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.completed as f64 / self.total as f64 * 100.0).round() as u32;
        pct.min(100)
    }

    pub fn succeeded(&self) -> u32 {
        self.completed.saturating_sub(self.failed)
    }
}

/// Type-specific part of a task, tagged by the `type` field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    DownloadLatest {
        #[serde(default)]
        progress: TaskProgress,

        #[serde(default)]
        count: Option<u32>,
    },
    Monitor {
        #[serde(default)]
        downloaded_count: u32,

        #[serde(default)]
        last_check: Option<String>,
    },
}

/// Server-tracked job, polled for status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub task_id: String,

    #[serde(default)]
    pub username: String,

    pub status: TaskStatus,

    #[serde(default)]
    pub created_at: String,

    #[serde(flatten)]
    pub kind: TaskKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TasksResponse {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

// ===== Downloads =====

/// Episode metadata stored alongside a downloaded file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoredEpisodeInfo {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub cover: Option<String>,

    #[serde(default)]
    pub podcast_title: Option<String>,
}

impl StoredEpisodeInfo {
    /// Whether there is anything to show in the expandable details
    pub fn has_details(&self) -> bool {
        let has_description = self
            .description
            .as_deref()
            .map(|d| !d.trim().is_empty())
            .unwrap_or(false);
        let has_cover = self.cover.as_deref().map(|c| !c.is_empty()).unwrap_or(false);
        has_description || has_cover
    }
}

/// A file stored by the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadRecord {
    pub file_id: String,

    pub filename: String,

    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub downloaded_at: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub episode_info: Option<StoredEpisodeInfo>,
}

impl DownloadRecord {
    /// Lowercased extension, empty when the name has none
    pub fn extension(&self) -> String {
        match self.filename.rsplit_once('.') {
            Some((_, ext)) => ext.to_lowercase(),
            None => String::new(),
        }
    }

    /// Only m4a files can be converted to mp3
    pub fn is_convertible(&self) -> bool {
        self.extension() == "m4a"
    }

    pub fn display_title(&self) -> &str {
        self.episode_info
            .as_ref()
            .and_then(|info| info.title.as_deref())
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.filename)
    }

    pub fn owner(&self) -> &str {
        self.username.as_deref().unwrap_or("unknown")
    }

    /// File name base without extension, used when the server sends no name
    pub fn stem(&self) -> &str {
        match self.filename.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.filename,
        }
    }
}

/// `GET /api/downloads` response
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadsResponse {
    #[serde(default)]
    pub downloads: Vec<DownloadRecord>,

    /// Every user that owns at least one stored file
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertRequest<'a> {
    pub file_id: &'a str,
}

/// `POST /api/audio/convert` response
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertResponse {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub file_id: Option<String>,

    #[serde(default)]
    pub filename: Option<String>,
}

/// Body of both batch endpoints
#[derive(Debug, Clone, Serialize)]
pub struct FileIdsRequest<'a> {
    pub file_ids: &'a [String],
}

/// Per-file outcome of a batch conversion
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ConvertResult {
    pub file_id: String,

    #[serde(default)]
    pub new_file_id: Option<String>,

    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub already_mp3: bool,
}

impl ConvertResult {
    /// Identifier to fetch after a successful conversion
    pub fn download_id(&self) -> &str {
        self.new_file_id.as_deref().unwrap_or(&self.file_id)
    }
}

/// `POST /api/audio/batch/convert` response
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConvertResponse {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub success_count: u32,

    #[serde(default)]
    pub total_count: u32,

    #[serde(default)]
    pub results: Vec<ConvertResult>,
}

/// `POST /api/downloads/batch/delete` response
#[derive(Debug, Clone, Deserialize)]
pub struct BatchDeleteResponse {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub success_count: u32,

    #[serde(default)]
    pub failed_count: u32,

    #[serde(default)]
    pub failed_ids: Vec<String>,
}

/// `GET /api/ffmpeg/check` response
#[derive(Debug, Clone, Deserialize)]
pub struct FfmpegStatus {
    #[serde(default)]
    pub available: bool,

    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_kinds_deserialize() {
        let json = r#"{
            "tasks": [
                {"task_id": "t1", "username": "alice", "type": "download_latest",
                 "status": "running", "created_at": "2025-01-02T03:04:05",
                 "count": 5, "progress": {"total": 4, "completed": 2, "failed": 1},
                 "results": [], "subscriptions": []},
                {"task_id": "t2", "username": "alice", "type": "monitor",
                 "status": "running", "created_at": "2025-01-02T03:04:05",
                 "last_check": "2025-01-02T04:00:00", "downloaded_count": 3}
            ]
        }"#;
        let parsed: TasksResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.tasks.len(), 2);

        match &parsed.tasks[0].kind {
            TaskKind::DownloadLatest { progress, count } => {
                assert_eq!(progress.percent(), 50);
                assert_eq!(progress.succeeded(), 1);
                assert_eq!(*count, Some(5));
            }
            other => panic!("unexpected kind: {:?}", other),
        }
        match &parsed.tasks[1].kind {
            TaskKind::Monitor { downloaded_count, .. } => assert_eq!(*downloaded_count, 3),
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_task_status() {
        let json = r#"{"task_id": "t", "type": "monitor", "status": "paused"}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.status, TaskStatus::Unknown);
        assert!(!task.status.is_cancellable());
    }

    #[test]
    fn test_task_progress_zero_total() {
        let progress = TaskProgress::default();
        assert_eq!(progress.percent(), 0);
    }

    #[test]
    fn test_download_record_helpers() {
        let record: DownloadRecord = serde_json::from_str(
            r#"{"file_id": "f1", "filename": "Episode.One.M4A", "size": 1048576,
                "downloaded_at": "2025-03-01T10:00:00", "username": null,
                "episode_info": {"title": ""}}"#,
        )
        .unwrap();
        assert_eq!(record.extension(), "m4a");
        assert!(record.is_convertible());
        assert_eq!(record.display_title(), "Episode.One.M4A");
        assert_eq!(record.owner(), "unknown");
        assert_eq!(record.stem(), "Episode.One");
    }

    #[test]
    fn test_subscription_field_names() {
        let sub: Subscription = serde_json::from_str(
            r#"{"title": "Feed", "text": "About", "xmlUrl": "https://example.com/rss", "type": "rss"}"#,
        )
        .unwrap();
        assert_eq!(sub.xml_url, "https://example.com/rss");
        assert_eq!(sub.kind.as_deref(), Some("rss"));
    }

    #[test]
    fn test_convert_result_download_id() {
        let converted: ConvertResult =
            serde_json::from_str(r#"{"file_id": "a", "success": true}"#).unwrap();
        assert_eq!(converted.download_id(), "a");

        let renamed: ConvertResult =
            serde_json::from_str(r#"{"file_id": "a", "new_file_id": "b", "success": true}"#).unwrap();
        assert_eq!(renamed.download_id(), "b");
    }
}
