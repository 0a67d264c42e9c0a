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


//! Downloads management page
//!
//! Lists the files stored by the server, optionally filtered by user, and
//! runs single and batch actions on them.
//!
//! # Selection
//! The selection only ever contains identifiers of rendered records. Every
//! reload prunes identifiers that disappeared from the list, and entering the
//! page starts with an empty selection. Batch actions walk the selection in
//! list order.
//!
//! # Batch fetches
//! Files are fetched one after another with `batch_download_delay` in
//! between.

use super::{format_timestamp, lock, ActionGuard, PageContext, Region};
use crate::api::client::ApiClient;
use crate::api::models::{BatchConvertResponse, BatchDeleteResponse, ConvertResponse, DownloadRecord};
use crate::download::filename::DEFAULT_EXTENSION;
use crate::download::save::SavedFile;
use crate::error::{ClientError, Result};
use crate::render::{el, fragment, Element, Node};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{info, warn};

/// Failure reasons listed in the batch conversion summary
const MAX_LISTED_FAILURES: usize = 5;

#[derive(Debug, Default)]
struct DownloadsState {
    records: Vec<DownloadRecord>,
    users: Vec<String>,
    filter: Option<String>,
    selected: HashSet<String>,
    expanded: HashSet<String>,
}

impl DownloadsState {
    fn contains(&self, file_id: &str) -> bool {
        self.records.iter().any(|r| r.file_id == file_id)
    }

    fn selected_ids(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| self.selected.contains(&r.file_id))
            .map(|r| r.file_id.clone())
            .collect()
    }

    fn prune(&mut self) {
        let present: HashSet<&str> = self.records.iter().map(|r| r.file_id.as_str()).collect();
        self.selected.retain(|id| present.contains(id.as_str()));
        self.expanded.retain(|id| present.contains(id.as_str()));
    }
}

/// Result of a batch conversion and the follow-up fetches
#[derive(Debug, Clone)]
pub struct BatchConvertOutcome {
    pub response: BatchConvertResponse,
    pub saved: Vec<SavedFile>,
}

pub struct DownloadsPage {
    ctx: PageContext,
    guard: ActionGuard,
    state: Mutex<DownloadsState>,
}

impl DownloadsPage {
    pub fn new(ctx: PageContext) -> Self {
        Self {
            ctx,
            guard: ActionGuard::new(),
            state: Mutex::new(DownloadsState::default()),
        }
    }

    pub fn records(&self) -> Vec<DownloadRecord> {
        lock(&self.state).records.clone()
    }

    pub fn filter(&self) -> Option<String> {
        lock(&self.state).filter.clone()
    }

    /// Selected identifiers in list order
    pub fn selected_ids(&self) -> Vec<String> {
        lock(&self.state).selected_ids()
    }

    // ===== Listing =====

    /// Load the list for one user, or everyone with `None`
    pub async fn load(&self, filter: Option<&str>) -> Result<Vec<DownloadRecord>> {
        let filter = filter.map(str::trim).filter(|f| !f.is_empty());

        let response = match self.ctx.api.downloads(filter).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "loading downloads failed");
                return Err(e);
            }
        };

        let records = response.downloads.clone();
        {
            let mut state = lock(&self.state);
            state.filter = filter.map(str::to_string);
            state.records = response.downloads;
            state.users = response.users;
            state.prune();
        }
        self.rerender();
        Ok(records)
    }

    /// Reload with the current filter
    pub async fn reload(&self) -> Result<Vec<DownloadRecord>> {
        let filter = self.filter();
        self.load(filter.as_deref()).await
    }

    /// Empty string shows all users
    pub async fn filter_by_user(&self, username: &str) -> Result<Vec<DownloadRecord>> {
        self.load(Some(username)).await
    }

    fn rerender(&self) {
        let node = {
            let state = lock(&self.state);
            render_downloads(&state, &self.ctx.api)
        };
        self.ctx.surface.render(Region::DownloadsList, node);
    }

    // ===== Selection =====

    /// Flip selection of one file, returns whether it is now selected
    pub fn toggle_selection(&self, file_id: &str) -> Result<bool> {
        let selected = {
            let mut state = lock(&self.state);
            if !state.contains(file_id) {
                return Err(ClientError::invalid_input(format!("Unknown file '{}'", file_id)));
            }
            if state.selected.remove(file_id) {
                false
            } else {
                state.selected.insert(file_id.to_string());
                true
            }
        };
        self.rerender();
        Ok(selected)
    }

    pub fn select_all(&self) {
        {
            let mut state = lock(&self.state);
            let ids: Vec<String> = state.records.iter().map(|r| r.file_id.clone()).collect();
            state.selected.extend(ids);
        }
        self.rerender();
    }

    pub fn clear_selection(&self) {
        lock(&self.state).selected.clear();
        self.rerender();
    }

    /// Forget selection and expanded details, used when the page is entered
    pub fn reset_selection(&self) {
        let mut state = lock(&self.state);
        state.selected.clear();
        state.expanded.clear();
    }

    /// Expand or collapse the details of one file
    pub fn toggle_details(&self, file_id: &str) -> Result<bool> {
        let expanded = {
            let mut state = lock(&self.state);
            if !state.contains(file_id) {
                return Err(ClientError::invalid_input(format!("Unknown file '{}'", file_id)));
            }
            if state.expanded.remove(file_id) {
                false
            } else {
                state.expanded.insert(file_id.to_string());
                true
            }
        };
        self.rerender();
        Ok(expanded)
    }

    // ===== Single file actions =====

    /// Fetch one stored file into the download directory
    pub async fn download_file(&self, file_id: &str) -> Result<SavedFile> {
        let result = self.download_file_inner(file_id).await;
        if let Err(e) = &result {
            self.ctx.report("Download failed", e);
        }
        result
    }

    async fn download_file_inner(&self, file_id: &str) -> Result<SavedFile> {
        let _ticket = self.guard.try_begin(&format!("download-{}", file_id))?;
        self.fetch(file_id).await
    }

    async fn fetch(&self, file_id: &str) -> Result<SavedFile> {
        let record = lock(&self.state)
            .records
            .iter()
            .find(|r| r.file_id == file_id)
            .cloned();

        let (label, base, extension) = match &record {
            Some(r) => {
                let ext = r.extension();
                let ext = if ext.is_empty() { DEFAULT_EXTENSION.to_string() } else { ext };
                (r.display_title().to_string(), r.stem().to_string(), ext)
            }
            None => (file_id.to_string(), file_id.to_string(), DEFAULT_EXTENSION.to_string()),
        };

        let response = self.ctx.api.fetch_file(file_id).await?;
        self.ctx
            .save_with_progress(file_id, &label, response, &base, &extension)
            .await
    }

    /// Fetch several files in turn, pausing between them
    ///
    /// Failures are collected; the rest still run.
    async fn fetch_sequence(&self, file_ids: &[String]) -> (Vec<SavedFile>, Vec<(String, ClientError)>) {
        let delay = self.ctx.api.config().batch_download_delay;
        let mut saved = Vec::new();
        let mut failed = Vec::new();

        for (i, file_id) in file_ids.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.fetch(file_id).await {
                Ok(file) => saved.push(file),
                Err(e) => {
                    warn!(file_id = %file_id, error = %e, "batch fetch failed");
                    failed.push((file_id.clone(), e));
                }
            }
        }
        (saved, failed)
    }

    /// Convert one m4a file to mp3 after confirmation
    pub async fn convert(&self, file_id: &str) -> Result<ConvertResponse> {
        let result = async {
            self.ctx
                .confirm("Convert this m4a file to mp3? This can take a while.")?;
            let _ticket = self.guard.try_begin(&format!("convert-{}", file_id))?;
            self.ctx.api.convert_file(file_id).await
        }
        .await;

        match result {
            Ok(response) => {
                info!(file_id, "file converted");
                self.ctx
                    .surface
                    .alert("Converted. The mp3 file was added to the list.");
                let _ = self.reload().await;
                Ok(response)
            }
            Err(e) => {
                self.ctx.report("Conversion failed", &e);
                Err(e)
            }
        }
    }

    /// Delete one file after confirmation
    pub async fn delete(&self, file_id: &str) -> Result<()> {
        let result = async {
            self.ctx.confirm("Delete this file?")?;
            let _ticket = self.guard.try_begin(&format!("delete-{}", file_id))?;
            self.ctx.api.delete_file(file_id).await
        }
        .await;

        match result {
            Ok(_) => {
                info!(file_id, "file deleted");
                let _ = self.reload().await;
                Ok(())
            }
            Err(e) => {
                self.ctx.report("Delete failed", &e);
                Err(e)
            }
        }
    }

    // ===== Batch actions =====

    /// Fetch every selected file
    pub async fn batch_download(&self) -> Result<Vec<SavedFile>> {
        let result = async {
            let ids = self.selected_ids();
            if ids.is_empty() {
                return Err(ClientError::EmptySelection("download".to_string()));
            }
            let _ticket = self.guard.try_begin("batch-download")?;
            Ok(self.fetch_sequence(&ids).await)
        }
        .await;

        match result {
            Ok((saved, failed)) => {
                let mut message = format!("Downloaded {} files", saved.len());
                push_fetch_failures(&mut message, &failed);
                self.ctx.surface.alert(&message);
                Ok(saved)
            }
            Err(e) => {
                self.ctx.report("Batch download", &e);
                Err(e)
            }
        }
    }

    /// Convert the selection on the server, then fetch every converted file
    pub async fn batch_convert(&self) -> Result<BatchConvertOutcome> {
        let result = self.batch_convert_inner().await;
        if let Err(e) = &result {
            self.ctx.report("Batch conversion failed", e);
        }
        result
    }

    async fn batch_convert_inner(&self) -> Result<BatchConvertOutcome> {
        let ids = self.selected_ids();
        if ids.is_empty() {
            return Err(ClientError::EmptySelection("convert".to_string()));
        }
        self.ctx.confirm(&format!(
            "Process the {} selected files?\n\nmp3 files are downloaded as they are, m4a files are \
             converted to mp3 first and then downloaded.\nConversion can take a while.",
            ids.len()
        ))?;
        let _ticket = self.guard.try_begin("batch-convert")?;

        let response = self.ctx.api.batch_convert(&ids).await?;
        info!(
            total = response.total_count,
            success = response.success_count,
            "batch conversion finished"
        );

        let to_fetch: Vec<String> = response
            .results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.download_id().to_string())
            .collect();

        let mut message = batch_convert_summary(&response);
        if !to_fetch.is_empty() {
            message.push_str(&format!("\n\nDownloading {} mp3 files...", to_fetch.len()));
        }
        self.ctx.surface.alert(&message);

        let (saved, failed) = self.fetch_sequence(&to_fetch).await;
        if !failed.is_empty() {
            warn!(failed = failed.len(), "some converted files could not be fetched");
            let mut message = format!("Downloaded {} of {} files", saved.len(), to_fetch.len());
            push_fetch_failures(&mut message, &failed);
            self.ctx.surface.alert(&message);
        }

        // the list now holds the new mp3 records
        if let Err(e) = self.reload().await {
            warn!(error = %e, "reload after batch conversion failed");
        }
        self.clear_selection();

        Ok(BatchConvertOutcome { response, saved })
    }

    /// Delete the selection after confirmation
    ///
    /// An empty selection is rejected before anything is sent.
    pub async fn batch_delete(&self) -> Result<BatchDeleteResponse> {
        let result = self.batch_delete_inner().await;
        if let Err(e) = &result {
            self.ctx.report("Batch delete", e);
        }
        result
    }

    async fn batch_delete_inner(&self) -> Result<BatchDeleteResponse> {
        let ids = self.selected_ids();
        if ids.is_empty() {
            return Err(ClientError::EmptySelection("delete".to_string()));
        }
        self.ctx.confirm(&format!(
            "Delete the {} selected files? This cannot be undone.",
            ids.len()
        ))?;
        let _ticket = self.guard.try_begin("batch-delete")?;

        let response = self.ctx.api.batch_delete(&ids).await?;

        let mut message = response.message.clone();
        if response.failed_count > 0 {
            message.push_str(&format!("\n\nFailed: {} files", response.failed_count));
        }
        self.ctx.surface.alert(&message);

        self.clear_selection();
        if let Err(e) = self.reload().await {
            warn!(error = %e, "reload after batch delete failed");
        }
        Ok(response)
    }
}

fn push_fetch_failures(message: &mut String, failed: &[(String, ClientError)]) {
    if failed.is_empty() {
        return;
    }
    message.push_str(&format!("\n\nFailed: {}", failed.len()));
    for (file_id, e) in failed.iter().take(MAX_LISTED_FAILURES) {
        message.push_str(&format!("\n- {}: {}", file_id, e.user_message()));
    }
    if failed.len() > MAX_LISTED_FAILURES {
        message.push_str(&format!("\n... and {} more", failed.len() - MAX_LISTED_FAILURES));
    }
}

/// Alert text for a batch conversion
pub fn batch_convert_summary(response: &BatchConvertResponse) -> String {
    let failed_count = response.total_count.saturating_sub(response.success_count);
    let mut message = format!(
        "{}\n\nTotal: {} files\nSucceeded: {}\nFailed: {}",
        response.message, response.total_count, response.success_count, failed_count
    );

    let failures: Vec<&str> = response
        .results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.error.as_deref().unwrap_or("Unknown error"))
        .collect();

    if !failures.is_empty() {
        message.push_str("\n\nFailures:");
        for reason in failures.iter().take(MAX_LISTED_FAILURES) {
            message.push_str(&format!("\n- {}", reason));
        }
        if failures.len() > MAX_LISTED_FAILURES {
            message.push_str(&format!(
                "\n... and {} more",
                failures.len() - MAX_LISTED_FAILURES
            ));
        }
    }
    message
}

fn size_mb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / 1024.0 / 1024.0)
}

fn render_toolbar(state: &DownloadsState) -> Element {
    let current = state.filter.as_deref().unwrap_or("");

    let options = std::iter::once(
        el("option")
            .attr("value", "")
            .flag("selected", current.is_empty())
            .text("All users"),
    )
    .chain(state.users.iter().map(|user| {
        el("option")
            .attr("value", user.as_str())
            .flag("selected", user == current)
            .text(user.as_str())
    }));

    let mut toolbar = el("div").class("downloads-toolbar").child(
        el("div")
            .class("filter-group")
            .child(
                el("label")
                    .attr("for", "user-filter")
                    .text("User filter:")
                    .child(el("select").id("user-filter").children(options)),
            )
            .child(el("span").class("file-count").text(format!("{} files", state.records.len())))
            .child(el("button").class("select-all-btn").text("Select all")),
    );

    let selected = state.selected.len();
    if selected > 0 {
        toolbar = toolbar.child(
            el("div")
                .class("batch-actions")
                .child(el("span").id("selected-count").text(format!("{} selected", selected)))
                .child(el("button").class("batch-btn download-btn").text("Download selected"))
                .child(el("button").class("batch-btn monitor-btn").text("Convert to mp3 and download"))
                .child(el("button").class("batch-btn delete-btn").text("Delete selected"))
                .child(el("button").class("batch-btn").text("Clear selection")),
        );
    }
    toolbar
}

fn render_record(record: &DownloadRecord, state: &DownloadsState, api: &ApiClient) -> Element {
    let is_selected = state.selected.contains(&record.file_id);
    let is_expanded = state.expanded.contains(&record.file_id);
    let info = record.episode_info.clone().unwrap_or_default();

    let class = if is_selected {
        "download-item selected"
    } else {
        "download-item"
    };

    let mut details_block = el("div")
        .class("download-item-info")
        .child(
            el("h5")
                .text(record.display_title())
                .text(" ")
                .child(el("span").class("user-badge").text(format!("@{}", record.owner()))),
        );

    if let Some(channel) = info.podcast_title.as_deref().filter(|c| !c.is_empty()) {
        details_block = details_block.child(
            el("p")
                .class("podcast-channel")
                .text(format!("Channel: {}", channel)),
        );
    }

    details_block = details_block.child(el("p").class("file-meta").text(format!(
        "Size: {} MB | Format: {} | Downloaded: {}",
        size_mb(record.size),
        record.extension().to_uppercase(),
        format_timestamp(&record.downloaded_at)
    )));

    if info.has_details() {
        let summary = if is_expanded {
            "Hide details"
        } else {
            "Show details"
        };
        let mut content = el("div").class("details-content");
        if let Some(cover) = info.cover.as_deref().filter(|c| !c.is_empty()) {
            content = content.child(
                el("img")
                    .class("episode-detail-cover")
                    .attr("src", cover)
                    .attr("alt", "cover"),
            );
        }
        if let Some(description) = info.description.as_deref().filter(|d| !d.trim().is_empty()) {
            content = content.child(el("p").class("episode-description").text(description));
        }
        details_block = details_block.child(
            el("details")
                .class("details-container")
                .flag("open", is_expanded)
                .child(
                    el("summary")
                        .class("expand-btn")
                        .text(summary),
                )
                .child(content),
        );
    }

    let mut actions = el("div").class("download-item-actions").child(
        el("a")
            .class("download-btn")
            .attr("href", api.url(&ApiClient::file_path(&record.file_id)))
            .flag("download", true)
            .text("Download"),
    );
    if record.is_convertible() {
        actions = actions.child(el("button").class("convert-btn").text("Convert to mp3"));
    }
    actions = actions.child(el("button").class("delete-btn").text("Delete"));

    el("div")
        .class(class)
        .attr("data-file-id", record.file_id.as_str())
        .child(
            el("div").class("download-item-checkbox").child(
                el("input")
                    .attr("type", "checkbox")
                    .id(format!("check-{}", record.file_id))
                    .flag("checked", is_selected),
            ),
        )
        .child(details_block)
        .child(actions)
}

fn render_downloads(state: &DownloadsState, api: &ApiClient) -> Node {
    let toolbar = render_toolbar(state);
    if state.records.is_empty() {
        return fragment(vec![
            Node::from(toolbar),
            el("p").text("No downloaded files").into(),
        ]);
    }
    fragment(
        std::iter::once(toolbar).chain(state.records.iter().map(|r| render_record(r, state, api))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::ConvertResult;
    use crate::config::ClientConfig;

    fn record(id: &str, filename: &str) -> DownloadRecord {
        DownloadRecord {
            file_id: id.to_string(),
            filename: filename.to_string(),
            size: 2 * 1024 * 1024,
            downloaded_at: "2025-03-01T10:00:00".to_string(),
            username: Some("alice".to_string()),
            episode_info: None,
        }
    }

    fn api() -> ApiClient {
        ApiClient::new(ClientConfig::builder().application_root("/podcast").build().unwrap()).unwrap()
    }

    #[test]
    fn test_prune_drops_missing_ids() {
        let mut state = DownloadsState {
            records: vec![record("a", "a.mp3"), record("b", "b.m4a")],
            ..Default::default()
        };
        state.selected.extend(["a".to_string(), "b".to_string(), "gone".to_string()]);
        state.expanded.insert("gone".to_string());
        state.prune();
        assert_eq!(state.selected_ids(), vec!["a".to_string(), "b".to_string()]);
        assert!(state.expanded.is_empty());
    }

    #[test]
    fn test_record_rendering() {
        let mut state = DownloadsState {
            records: vec![record("a", "a.mp3"), record("b", "b.m4a")],
            users: vec!["alice".to_string(), "bob".to_string()],
            filter: Some("bob".to_string()),
            ..Default::default()
        };
        state.selected.insert("b".to_string());

        let node = render_downloads(&state, &api());
        // convert only offered for m4a
        assert_eq!(node.find_by_class("convert-btn").len(), 1);
        assert_eq!(node.find_by_class("selected").len(), 1);
        assert_eq!(node.find_by_class("batch-actions").len(), 1);

        let links = node.find_all(|e| e.tag() == "a");
        assert_eq!(links[0].get_attr("href"), Some("http://127.0.0.1:5000/podcast/downloads/a"));

        let text = node.to_text();
        assert!(text.contains("Size: 2.00 MB | Format: MP3"));
        assert!(text.contains("1 selected"));
        assert!(text.contains("*bob*"));
        assert!(text.contains("2 files"));
    }

    #[test]
    fn test_toolbar_hides_batch_actions_without_selection() {
        let state = DownloadsState::default();
        let node = render_downloads(&state, &api());
        assert!(node.find_by_class("batch-actions").is_empty());
        assert!(node.to_text().contains("No downloaded files"));
        assert!(node.to_text().contains("*All users*"));
    }

    #[test]
    fn test_batch_convert_summary_lists_five_failures() {
        let mut results = Vec::new();
        for i in 0..7 {
            results.push(ConvertResult {
                file_id: format!("f{}", i),
                new_file_id: None,
                success: false,
                filename: None,
                error: Some(format!("error {}", i)),
                already_mp3: false,
            });
        }
        results.push(ConvertResult {
            file_id: "ok".into(),
            new_file_id: Some("ok-mp3".into()),
            success: true,
            filename: None,
            error: None,
            already_mp3: false,
        });
        let response = BatchConvertResponse {
            message: "Batch done".into(),
            success_count: 1,
            total_count: 8,
            results,
        };

        let summary = batch_convert_summary(&response);
        assert!(summary.starts_with("Batch done\n\nTotal: 8 files\nSucceeded: 1\nFailed: 7"));
        assert!(summary.contains("- error 4"));
        assert!(!summary.contains("- error 5"));
        assert!(summary.ends_with("... and 2 more"));
    }
}
