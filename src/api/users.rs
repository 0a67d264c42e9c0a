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


//! Users, OPML subscriptions and the task-creating endpoints
//!
//! Subscriptions have no identifier of their own. They are addressed by
//! position in the per-user list, so an index is only meaningful together with
//! the username it was loaded for.

use crate::api::client::{path_segment, ApiClient};
use crate::api::models::{
    CreateUserRequest, CreateUserResponse, DownloadLatestRequest, EpisodesResponse,
    OpmlUploadResponse, StartMonitorRequest, Subscription, SubscriptionsResponse,
    TaskCreatedResponse, UserSummary, UsersResponse,
};
use crate::error::{ClientError, Result};
use reqwest::multipart::{Form, Part};

/// Multipart field the server reads the OPML document from
const OPML_FIELD: &str = "file";

fn user_path(username: &str, rest: &str) -> String {
    format!("/api/user/{}{}", path_segment(username), rest)
}

impl ApiClient {
    /// Create a user, or load it when it already exists
    pub async fn create_user(&self, username: &str) -> Result<CreateUserResponse> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ClientError::invalid_input("Enter a username"));
        }
        self.post("/api/user/create", &CreateUserRequest { username })
            .await
    }

    pub async fn users(&self) -> Result<Vec<UserSummary>> {
        let response: UsersResponse = self.get("/api/users").await?;
        Ok(response.users)
    }

    /// Upload an OPML document and replace the user's subscriptions
    pub async fn upload_opml(
        &self,
        username: &str,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<OpmlUploadResponse> {
        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("text/x-opml")?;
        let form = Form::new().part(OPML_FIELD, part);

        self.post_multipart(&user_path(username, "/opml"), form)
            .await
    }

    pub async fn subscriptions(&self, username: &str) -> Result<Vec<Subscription>> {
        let response: SubscriptionsResponse =
            self.get(&user_path(username, "/subscriptions")).await?;
        Ok(response.subscriptions)
    }

    /// Episodes of the subscription at `index`
    pub async fn subscription_episodes(
        &self,
        username: &str,
        index: usize,
    ) -> Result<EpisodesResponse> {
        self.get(&user_path(username, &format!("/subscriptions/{}/episodes", index)))
            .await
    }

    /// Start a task downloading the newest `count` episodes of every subscription
    pub async fn download_latest(
        &self,
        username: &str,
        count: u32,
        convert_to_mp3: bool,
    ) -> Result<TaskCreatedResponse> {
        let body = DownloadLatestRequest {
            count,
            convert_to_mp3,
        };
        self.post(&user_path(username, "/download/latest"), &body)
            .await
    }

    /// Start a task that keeps checking the user's feeds for new episodes
    pub async fn start_monitor(
        &self,
        username: &str,
        convert_to_mp3: bool,
    ) -> Result<TaskCreatedResponse> {
        self.post(
            &user_path(username, "/monitor/start"),
            &StartMonitorRequest { convert_to_mp3 },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_path_encodes_username() {
        assert_eq!(user_path("alice", "/opml"), "/api/user/alice/opml");
        assert_eq!(
            user_path("jo doe", "/subscriptions"),
            "/api/user/jo%20doe/subscriptions"
        );
    }
}
