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


//! Subscriptions page
//!
//! Users, their OPML imports, the episodes of each feed, and the two
//! task-creating actions. Everything except the user list requires a current
//! user, which is set by creating or selecting one.

use super::{format_timestamp, lock, status_message, ActionGuard, PageContext, Region, COVER_PLACEHOLDER};
use crate::api::models::{CreateUserResponse, Episode, Subscription, UserSummary};
use crate::download::filename::{sanitize_base_name, DEFAULT_BASE_NAME, DEFAULT_EXTENSION};
use crate::download::save::SavedFile;
use crate::error::{ClientError, Result};
use crate::render::{el, fragment, Node};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

/// Episodes fetched when `download_latest` is given 0
pub const DEFAULT_LATEST_COUNT: u32 = 5;

/// Episode list of one subscription
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedEpisodes {
    pub index: usize,
    pub subscription: Subscription,
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Default)]
struct SubscriptionsState {
    current_user: Option<String>,
    subscriptions: Vec<Subscription>,
    episodes: Option<LoadedEpisodes>,
}

pub struct SubscriptionsPage {
    ctx: PageContext,
    guard: ActionGuard,
    state: Mutex<SubscriptionsState>,
}

impl SubscriptionsPage {
    pub fn new(ctx: PageContext) -> Self {
        Self {
            ctx,
            guard: ActionGuard::new(),
            state: Mutex::new(SubscriptionsState::default()),
        }
    }

    pub fn current_user(&self) -> Option<String> {
        lock(&self.state).current_user.clone()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        lock(&self.state).subscriptions.clone()
    }

    pub fn loaded_episodes(&self) -> Option<LoadedEpisodes> {
        lock(&self.state).episodes.clone()
    }

    fn require_user(&self) -> Result<String> {
        self.current_user().ok_or(ClientError::NoCurrentUser)
    }

    // ===== Users =====

    /// Create a user, or load an existing one, and make it current
    pub async fn create_user(&self, username: &str) -> Result<CreateUserResponse> {
        let result = self.create_user_inner(username).await;
        match &result {
            Err(e)
                if matches!(e, ClientError::InvalidInput(_) | ClientError::ActionInProgress(_)) =>
            {
                self.ctx.report("Create user", e)
            }
            Err(e) => self
                .ctx
                .surface
                .render(Region::UserStatus, status_message(false, e.user_message())),
            Ok(_) => {}
        }
        result
    }

    async fn create_user_inner(&self, username: &str) -> Result<CreateUserResponse> {
        let _ticket = self.guard.try_begin("create-user")?;

        let username = username.trim();
        if username.is_empty() {
            return Err(ClientError::invalid_input("Enter a username"));
        }

        let response = self.ctx.api.create_user(username).await?;
        info!(username, message = %response.message, "current user set");

        {
            let mut state = lock(&self.state);
            state.current_user = Some(username.to_string());
            state.subscriptions = response.subscriptions.clone();
            state.episodes = None;
        }

        self.ctx.surface.render(
            Region::UserStatus,
            status_message(true, format!("{}: {}", response.message, username)),
        );

        // refresh from the server; a failure here does not undo the login
        if let Err(e) = self.load_subscriptions().await {
            warn!(error = %e, "subscriptions did not load after login");
        }
        Ok(response)
    }

    /// Pick an existing user from the list
    pub async fn select_user(&self, username: &str) -> Result<CreateUserResponse> {
        self.create_user(username).await
    }

    pub async fn load_users(&self) -> Result<Vec<UserSummary>> {
        match self.ctx.api.users().await {
            Ok(users) => {
                self.ctx.surface.render(Region::UsersList, render_users(&users));
                Ok(users)
            }
            Err(e) => {
                warn!(error = %e, "loading users failed");
                Err(e)
            }
        }
    }

    // ===== OPML =====

    /// Upload an OPML file from disk for the current user
    pub async fn upload_opml(&self, path: Option<&Path>) -> Result<usize> {
        let result = async {
            let path = path.ok_or_else(|| ClientError::invalid_input("Choose an OPML file"))?;
            self.require_user()?;
            let contents = tokio::fs::read(path).await?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "subscriptions.opml".to_string());
            Ok::<_, ClientError>((file_name, contents))
        }
        .await;

        match result {
            Ok((file_name, contents)) => self.upload_opml_bytes(&file_name, contents).await,
            Err(e) => {
                self.ctx.report("Upload OPML", &e);
                Err(e)
            }
        }
    }

    /// Upload an OPML document for the current user
    pub async fn upload_opml_bytes(&self, file_name: &str, contents: Vec<u8>) -> Result<usize> {
        let result = self.upload_inner(file_name, contents).await;
        match &result {
            Err(e) if e.is_application_error() || e.is_transport_error() || e.is_malformed_response() => self
                .ctx
                .surface
                .render(Region::OpmlStatus, status_message(false, e.user_message())),
            Err(e) => self.ctx.report("Upload OPML", e),
            Ok(_) => {}
        }
        result
    }

    async fn upload_inner(&self, file_name: &str, contents: Vec<u8>) -> Result<usize> {
        let _ticket = self.guard.try_begin("upload-opml")?;
        let username = self.require_user()?;

        let response = self
            .ctx
            .api
            .upload_opml(&username, file_name, contents)
            .await?;
        let count = response.subscriptions.len();
        info!(username = %username, count, "OPML imported");

        self.ctx.surface.render(
            Region::OpmlStatus,
            status_message(true, format!("OPML parsed, {} subscriptions", count)),
        );
        if let Err(e) = self.load_subscriptions().await {
            warn!(error = %e, "subscriptions did not refresh after upload");
        }
        Ok(count)
    }

    // ===== Subscriptions & episodes =====

    pub async fn load_subscriptions(&self) -> Result<Vec<Subscription>> {
        let username = self.require_user()?;
        let subscriptions = self.ctx.api.subscriptions(&username).await.map_err(|e| {
            warn!(error = %e, "loading subscriptions failed");
            e
        })?;

        {
            let mut state = lock(&self.state);
            state.subscriptions = subscriptions.clone();
            state.episodes = None;
        }
        self.ctx
            .surface
            .render(Region::SubscriptionsList, render_subscriptions(&subscriptions));
        Ok(subscriptions)
    }

    /// Show the episodes of the subscription at `index`
    pub async fn load_episodes(&self, index: usize) -> Result<LoadedEpisodes> {
        let username = self.require_user()?;
        let surface = &self.ctx.surface;

        surface.render(
            Region::SubscriptionsList,
            el("div").class("loading").child(el("p").text("Loading episodes, please wait...")).into(),
        );

        match self.ctx.api.subscription_episodes(&username, index).await {
            Ok(response) => {
                let loaded = LoadedEpisodes {
                    index,
                    subscription: response.subscription,
                    episodes: response.episodes,
                };
                surface.render(Region::SubscriptionsList, render_episodes(&loaded));
                lock(&self.state).episodes = Some(loaded.clone());
                Ok(loaded)
            }
            Err(e) => {
                surface.render(
                    Region::SubscriptionsList,
                    fragment(vec![
                        status_message(false, format!("Loading failed: {}", e.user_message())),
                        back_button(),
                    ]),
                );
                Err(e)
            }
        }
    }

    /// Download episode `index` of the loaded list through the server
    pub async fn download_episode_file(&self, index: usize, convert_to_mp3: bool) -> Result<SavedFile> {
        let result = self.download_episode_inner(index, convert_to_mp3).await;
        if let Err(e) = &result {
            self.ctx.report("Download failed", e);
        }
        result
    }

    async fn download_episode_inner(&self, index: usize, convert_to_mp3: bool) -> Result<SavedFile> {
        let episode = self
            .loaded_episodes()
            .and_then(|loaded| loaded.episodes.get(index).cloned())
            .ok_or_else(|| ClientError::invalid_input(format!("No episode at position {}", index)))?;

        if !episode.has_audio() {
            return Err(ClientError::invalid_input("No download link available"));
        }

        let _ticket = self.guard.try_begin(&format!("download-episode-{}", index))?;
        let key = format!("episode-{}", index);
        let label = display_title(&episode);
        let base = sanitize_base_name(&label);
        let base = if base.is_empty() {
            DEFAULT_BASE_NAME.to_string()
        } else {
            base
        };

        let response = self
            .ctx
            .api
            .download_episode(&episode.audio_url, &base, convert_to_mp3)
            .await?;

        self.ctx
            .save_with_progress(&key, &label, response, &base, DEFAULT_EXTENSION)
            .await
    }

    // ===== Tasks =====

    /// Start downloading the newest `count` episodes of every subscription
    ///
    /// Returns the created task id.
    pub async fn download_latest(&self, count: u32, convert_to_mp3: bool) -> Result<String> {
        let result = async {
            let username = self.require_user()?;
            let _ticket = self.guard.try_begin("download-latest")?;
            let count = if count == 0 { DEFAULT_LATEST_COUNT } else { count };
            self.ctx
                .api
                .download_latest(&username, count, convert_to_mp3)
                .await
        }
        .await;

        match result {
            Ok(created) => {
                info!(task_id = %created.task_id, "download-latest task created");
                self.ctx
                    .surface
                    .alert("Download task created, see the tasks page for progress");
                Ok(created.task_id)
            }
            Err(e) => {
                self.ctx.report("Creating the download task failed", &e);
                Err(e)
            }
        }
    }

    /// Start the monitor task after confirmation
    pub async fn start_monitor(&self, convert_to_mp3: bool) -> Result<String> {
        let result = async {
            let username = self.require_user()?;
            self.ctx.confirm(
                "Start a monitor task? Every newly published episode will be downloaded automatically.",
            )?;
            let _ticket = self.guard.try_begin("start-monitor")?;
            self.ctx.api.start_monitor(&username, convert_to_mp3).await
        }
        .await;

        match result {
            Ok(created) => {
                info!(task_id = %created.task_id, "monitor task created");
                self.ctx
                    .surface
                    .alert("Monitor task started, see the tasks page");
                Ok(created.task_id)
            }
            Err(e) => {
                self.ctx.report("Starting the monitor task failed", &e);
                Err(e)
            }
        }
    }
}

fn display_title(episode: &Episode) -> String {
    if episode.title.trim().is_empty() {
        "Unknown title".to_string()
    } else {
        episode.title.clone()
    }
}

fn back_button() -> Node {
    el("button")
        .class("back-btn")
        .attr("data-action", "subscriptions")
        .text("Back to subscriptions")
        .into()
}

pub fn render_users(users: &[UserSummary]) -> Node {
    if users.is_empty() {
        return el("p").text("No users yet").into();
    }
    el("div")
        .child(el("h4").text("Existing users"))
        .children(users.iter().map(|user| {
            el("div")
                .class("subscription-item")
                .attr("data-username", user.username.as_str())
                .child(el("h4").text(user.username.as_str()))
                .child(el("p").text(format!(
                    "Created: {} | Subscriptions: {}",
                    format_timestamp(&user.created_at),
                    user.subscriptions_count
                )))
        }))
        .into()
}

pub fn render_subscriptions(subscriptions: &[Subscription]) -> Node {
    if subscriptions.is_empty() {
        return el("p").text("No subscriptions, upload an OPML file").into();
    }
    fragment(subscriptions.iter().enumerate().map(|(index, sub)| {
        el("div")
            .class("subscription-item")
            .child(el("h4").text(sub.title.as_str()))
            .child(el("p").text(sub.text.as_str()))
            .child(
                el("button")
                    .attr("data-index", index.to_string())
                    .text(format!("View episodes (#{})", index)),
            )
    }))
}

/// Episode list; download control only for items with audio
pub fn render_episodes(loaded: &LoadedEpisodes) -> Node {
    let items = loaded.episodes.iter().enumerate().map(|(index, episode)| {
        let cover = if episode.cover.is_empty() {
            COVER_PLACEHOLDER
        } else {
            episode.cover.as_str()
        };

        let controls: Node = if episode.has_audio() {
            fragment(vec![
                el("label")
                    .class("convert-checkbox-container")
                    .child(
                        el("input")
                            .attr("type", "checkbox")
                            .id(format!("convert-sub-{}", index)),
                    )
                    .text("Convert m4a to mp3"),
                el("button")
                    .class("download-btn")
                    .attr("data-index", index.to_string())
                    .text(format!("Download (#{})", index)),
            ])
        } else {
            el("button")
                .class("no-download")
                .flag("disabled", true)
                .text("No download link")
                .into()
        };

        el("div")
            .class("episode-item")
            .child(el("img").attr("src", cover).attr("alt", "cover"))
            .child(
                el("div")
                    .class("episode-item-content")
                    .child(el("h5").text(display_title(episode)))
                    .child(el("p").text(episode.description.as_str()))
                    .child(controls),
            )
    });

    el("div")
        .child(back_button())
        .child(el("h4").text(format!("{} - Episodes", loaded.subscription.title)))
        .children(items)
        .into()
}
