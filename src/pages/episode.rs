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


//! Single episode page
//!
//! Look up an episode page URL, then download it in two steps: resolve the
//! direct audio URL, then have the server fetch (and optionally convert) it.

use super::{lock, status_message, ActionGuard, PageContext, Region, COVER_PLACEHOLDER};
use crate::api::models::EpisodeInfo;
use crate::download::filename::{sanitize_base_name, DEFAULT_BASE_NAME, DEFAULT_EXTENSION};
use crate::download::progress::{DownloadProgress, DownloadState};
use crate::download::save::SavedFile;
use crate::error::{ClientError, Result};
use crate::render::{el, Node};
use std::sync::Mutex;
use tracing::info;

/// Progress key of the single episode download
pub const PROGRESS_KEY: &str = "episode";

const UNKNOWN_TITLE: &str = "Unknown title";
const NO_DESCRIPTION: &str = "No description";

/// Episode shown on the page
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedEpisode {
    pub source_url: String,
    pub title: String,
    pub description: String,
    pub cover: Option<String>,
}

impl LoadedEpisode {
    fn from_info(source_url: &str, info: EpisodeInfo) -> Self {
        Self {
            source_url: source_url.to_string(),
            title: info
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            description: info
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            cover: info.cover.filter(|c| !c.is_empty()),
        }
    }

    /// Name sent to the server and used when no name comes back
    pub fn file_base(&self) -> String {
        let base = sanitize_base_name(&self.title);
        if base.is_empty() {
            DEFAULT_BASE_NAME.to_string()
        } else {
            base
        }
    }
}

pub struct EpisodePage {
    ctx: PageContext,
    guard: ActionGuard,
    loaded: Mutex<Option<LoadedEpisode>>,
}

impl EpisodePage {
    pub fn new(ctx: PageContext) -> Self {
        Self {
            ctx,
            guard: ActionGuard::new(),
            loaded: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Option<LoadedEpisode> {
        lock(&self.loaded).clone()
    }

    /// Look up title, description and cover of an episode page
    pub async fn fetch_info(&self, page_url: &str) -> Result<LoadedEpisode> {
        let result = self.fetch_info_inner(page_url).await;
        if let Err(e) = &result {
            self.ctx.report("Could not load episode info", e);
        }
        result
    }

    async fn fetch_info_inner(&self, page_url: &str) -> Result<LoadedEpisode> {
        let _ticket = self.guard.try_begin("fetch-info")?;

        let page_url = page_url.trim();
        if page_url.is_empty() {
            return Err(ClientError::invalid_input("Enter an episode link"));
        }

        let info = self.ctx.api.episode_info(page_url).await?;
        let episode = LoadedEpisode::from_info(page_url, info);

        self.ctx.surface.render(Region::EpisodeInfo, render_episode(&episode));
        *lock(&self.loaded) = Some(episode.clone());
        Ok(episode)
    }

    /// Download the loaded episode into the download directory
    pub async fn download(&self, convert_to_mp3: bool) -> Result<SavedFile> {
        let result = self.download_inner(convert_to_mp3).await;
        if let Err(e) = &result {
            if !e.is_user_abort() {
                self.ctx.surface.render(Region::EpisodeStatus, status_message(false, e.user_message()));
            }
            self.ctx.report("Download failed", e);
        }
        result
    }

    async fn download_inner(&self, convert_to_mp3: bool) -> Result<SavedFile> {
        let _ticket = self.guard.try_begin("download")?;

        let episode = self
            .current()
            .ok_or_else(|| ClientError::invalid_input("Look up an episode first"))?;
        let surface = &self.ctx.surface;

        let mut progress = DownloadProgress::new(&episode.title);
        surface.render(Region::EpisodeStatus, status_hint("Resolving download link..."));
        surface.progress(PROGRESS_KEY, &progress);

        let audio_url = self.ctx.api.episode_download_url(&episode.source_url).await?;
        let base = episode.file_base();

        if convert_to_mp3 {
            progress.set_state(DownloadState::Converting);
            surface.render(
                Region::EpisodeStatus,
                status_hint("Downloading the original audio and converting it, this can take a while..."),
            );
        } else {
            surface.render(Region::EpisodeStatus, status_hint("Downloading audio file..."));
        }
        surface.progress(PROGRESS_KEY, &progress);

        let response = self
            .ctx
            .api
            .download_episode(&audio_url, &base, convert_to_mp3)
            .await?;

        let hint = if convert_to_mp3 {
            "Conversion finished, downloading file..."
        } else {
            "Downloading file..."
        };
        surface.render(Region::EpisodeStatus, status_hint(hint));

        let saved = self
            .ctx
            .save_with_progress(PROGRESS_KEY, &episode.title, response, &base, DEFAULT_EXTENSION)
            .await?;

        info!(file = %saved.filename, bytes = saved.size, "episode downloaded");
        surface.render(
            Region::EpisodeStatus,
            status_message(true, format!("All done: saved {}", saved.filename)),
        );
        Ok(saved)
    }
}

fn status_hint(text: &str) -> Node {
    el("div").class("status-hint").text(text).into()
}

/// Episode details with the download controls
pub fn render_episode(episode: &LoadedEpisode) -> Node {
    el("div")
        .class("episode-info")
        .attr("data-url", episode.source_url.as_str())
        .child(
            el("img")
                .class("episode-cover")
                .attr("src", episode.cover.as_deref().unwrap_or(COVER_PLACEHOLDER))
                .attr("alt", "cover"),
        )
        .child(el("h3").class("episode-title").text(episode.title.as_str()))
        .child(el("p").class("episode-description").text(episode.description.as_str()))
        .child(
            el("label")
                .child(el("input").attr("type", "checkbox").id("convert-to-mp3"))
                .text("Convert m4a to mp3"),
        )
        .child(el("button").class("download-btn").text("Download"))
        .into()
}
