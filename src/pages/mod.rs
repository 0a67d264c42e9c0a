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


//! Page controllers
//!
//! Each page owns its UI state and talks to the host through a [`Surface`]:
//! fragments are rendered into named [`Region`]s, problems are reported with
//! `alert`, destructive actions ask `confirm` first.
//!
//! Controllers take `&self` and may be called concurrently from the host. A
//! second invocation of an action that is still running is rejected by the
//! page's [`ActionGuard`] instead of racing the first.
//!
//! [`App`] switches between pages and owns the tasks poller, which only runs
//! while the tasks page is active.

pub mod downloads;
pub mod episode;
pub mod subscriptions;
pub mod tasks;

use crate::api::client::{ApiClient, ResponseStream};
use crate::download::progress::{DownloadProgress, DownloadState};
use crate::download::save::SavedFile;
use crate::download::stream::download_to_dir;
use crate::error::{ClientError, Result};
use crate::render::{el, Node};
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use downloads::DownloadsPage;
pub use episode::EpisodePage;
pub use subscriptions::SubscriptionsPage;
pub use tasks::TasksPage;

/// Named area of a page that a fragment replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    EpisodeInfo,
    EpisodeStatus,
    UserStatus,
    UsersList,
    OpmlStatus,
    SubscriptionsList,
    TasksList,
    DownloadsList,
}

impl Region {
    /// Element id of the region in the HTML host
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EpisodeInfo => "episode-info",
            Self::EpisodeStatus => "episode-status",
            Self::UserStatus => "user-status",
            Self::UsersList => "users-list",
            Self::OpmlStatus => "opml-status",
            Self::SubscriptionsList => "subscriptions-list",
            Self::TasksList => "tasks-list",
            Self::DownloadsList => "downloads-list",
        }
    }
}

/// Host the controllers render into
pub trait Surface: Send + Sync {
    /// Replace the contents of `region`
    fn render(&self, region: Region, node: Node);

    /// Blocking notification
    fn alert(&self, message: &str);

    /// Yes/no question; `false` aborts the action
    fn confirm(&self, message: &str) -> bool;

    /// Progress of the download identified by `key`
    fn progress(&self, key: &str, progress: &DownloadProgress);
}

/// Everything a controller needs to do its work
#[derive(Clone)]
pub struct PageContext {
    pub api: ApiClient,
    pub surface: Arc<dyn Surface>,
}

impl PageContext {
    pub fn new(api: ApiClient, surface: Arc<dyn Surface>) -> Self {
        Self { api, surface }
    }

    /// Alert with the error's user message, prefixed by what failed
    ///
    /// Declined confirmations stay silent.
    pub fn report(&self, context: &str, err: &ClientError) {
        if matches!(err, ClientError::Cancelled) {
            return;
        }
        warn!(action = context, error = %err, "action failed");
        self.surface
            .alert(&format!("{}: {}", context, err.user_message()));
    }

    /// Ask before a destructive action
    pub fn confirm(&self, message: &str) -> Result<()> {
        if self.surface.confirm(message) {
            Ok(())
        } else {
            Err(ClientError::Cancelled)
        }
    }

    /// Stream a response into the download directory, reporting progress under `key`
    pub async fn save_with_progress(
        &self,
        key: &str,
        label: &str,
        response: ResponseStream,
        fallback_base: &str,
        extension: &str,
    ) -> Result<SavedFile> {
        let surface = Arc::clone(&self.surface);
        let mut progress = DownloadProgress::new(label);
        progress.update(0, response.content_length());
        surface.progress(key, &progress);

        let dir = self.api.config().download_dir.clone();
        let result = download_to_dir(response, &dir, fallback_base, extension, |loaded, total| {
            progress.update(loaded, total);
            surface.progress(key, &progress);
        })
        .await;

        let mut done = DownloadProgress::new(label);
        match &result {
            Ok(saved) => {
                done.update(saved.size, Some(saved.size));
                done.set_state(DownloadState::Completed);
            }
            Err(e) => done.set_error(e.user_message()),
        }
        self.surface.progress(key, &done);
        result
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Grey square shown where a cover is missing
pub const COVER_PLACEHOLDER: &str = "data:image/svg+xml,<svg xmlns=\"http://www.w3.org/2000/svg\" \
     width=\"80\" height=\"80\"><rect width=\"80\" height=\"80\" fill=\"%23ddd\"/></svg>";

/// Inline success or error line
pub fn status_message<S: Into<String>>(ok: bool, message: S) -> Node {
    let class = if ok {
        "status-message success"
    } else {
        "status-message error"
    };
    el("div").class(class).text(message).into()
}

/// Timestamp as local time, unparseable values shown as-is
pub fn format_timestamp(value: &str) -> String {
    if value.is_empty() {
        return "-".to_string();
    }
    let parsed = chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Local).naive_local())
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"));
    match parsed {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => value.to_string(),
    }
}

// ===== Re-entrancy guard =====

/// Set of actions currently running on a page
#[derive(Debug, Clone, Default)]
pub struct ActionGuard {
    running: Arc<Mutex<HashSet<String>>>,
}

/// Held for the duration of an action; dropping it releases the action
#[derive(Debug)]
pub struct ActionTicket {
    running: Arc<Mutex<HashSet<String>>>,
    action: String,
}

impl ActionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `action`, or fail with `ActionInProgress` when it is already held
    pub fn try_begin(&self, action: &str) -> Result<ActionTicket> {
        let mut running = lock(&self.running);
        if !running.insert(action.to_string()) {
            debug!(action, "re-entrant invocation rejected");
            return Err(ClientError::ActionInProgress(action.to_string()));
        }
        Ok(ActionTicket {
            running: Arc::clone(&self.running),
            action: action.to_string(),
        })
    }

    pub fn is_running(&self, action: &str) -> bool {
        lock(&self.running).contains(action)
    }
}

impl Drop for ActionTicket {
    fn drop(&mut self) {
        lock(&self.running).remove(&self.action);
    }
}

// ===== Task poller =====

/// Periodic refresh that can be started and cancelled
#[derive(Debug)]
pub struct TaskPoller {
    interval: Duration,
    token: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

impl TaskPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            token: None,
            handle: None,
        }
    }

    /// Run `tick` every interval, first run one interval from now
    ///
    /// Restarts when already running. A tick in flight when the poller is
    /// stopped is abandoned.
    pub fn start<F, Fut>(&mut self, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop();

        let token = CancellationToken::new();
        let child = token.child_token();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = tick() => {}
                }
            }
            debug!("task poller stopped");
        });

        info!(interval_ms = period.as_millis() as u64, "task poller started");
        self.token = Some(token);
        self.handle = Some(handle);
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        self.handle.take();
    }

    pub fn is_running(&self) -> bool {
        self.token
            .as_ref()
            .map(|t| !t.is_cancelled())
            .unwrap_or(false)
    }
}

impl Drop for TaskPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

// ===== App =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Episode,
    Subscriptions,
    Tasks,
    Downloads,
}

impl Page {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Episode => "Single episode",
            Self::Subscriptions => "Subscriptions",
            Self::Tasks => "Tasks",
            Self::Downloads => "Downloads",
        }
    }
}

/// Page navigator
pub struct App {
    ctx: PageContext,
    pub episode: EpisodePage,
    pub subscriptions: SubscriptionsPage,
    pub tasks: Arc<TasksPage>,
    pub downloads: DownloadsPage,
    active: Page,
    poller: TaskPoller,
}

impl App {
    pub fn new(api: ApiClient, surface: Arc<dyn Surface>) -> Self {
        let ctx = PageContext::new(api, surface);
        let poll_interval = ctx.api.config().poll_interval;

        info!(
            server = %ctx.api.config().server_url,
            application_root = %ctx.api.config().application_root,
            "initialising app"
        );

        Self {
            episode: EpisodePage::new(ctx.clone()),
            subscriptions: SubscriptionsPage::new(ctx.clone()),
            tasks: Arc::new(TasksPage::new(ctx.clone())),
            downloads: DownloadsPage::new(ctx.clone()),
            ctx,
            active: Page::Episode,
            poller: TaskPoller::new(poll_interval),
        }
    }

    pub fn context(&self) -> &PageContext {
        &self.ctx
    }

    pub fn active(&self) -> Page {
        self.active
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// Make `page` the active one and load its data
    pub async fn navigate(&mut self, page: Page) -> Result<()> {
        debug!(from = ?self.active, to = ?page, "navigate");
        if self.active == Page::Tasks && page != Page::Tasks {
            self.poller.stop();
        }
        self.active = page;

        match page {
            Page::Tasks => {
                let result = self.tasks.load().await.map(|_| ());
                if !self.poller.is_running() {
                    let tasks = Arc::clone(&self.tasks);
                    self.poller.start(move || {
                        let tasks = Arc::clone(&tasks);
                        async move {
                            // failures already logged by the page
                            let _ = tasks.load().await;
                        }
                    });
                }
                result
            }
            Page::Downloads => {
                self.downloads.reset_selection();
                self.downloads.load(None).await.map(|_| ())
            }
            Page::Subscriptions => self.subscriptions.load_users().await.map(|_| ()),
            Page::Episode => Ok(()),
        }
    }

    /// Start a download-latest task, then show the tasks page
    pub async fn download_latest(&mut self, count: u32, convert_to_mp3: bool) -> Result<String> {
        let task_id = self.subscriptions.download_latest(count, convert_to_mp3).await?;
        self.navigate(Page::Tasks).await?;
        Ok(task_id)
    }

    /// Start a monitor task, then show the tasks page
    pub async fn start_monitor(&mut self, convert_to_mp3: bool) -> Result<String> {
        let task_id = self.subscriptions.start_monitor(convert_to_mp3).await?;
        self.navigate(Page::Tasks).await?;
        Ok(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_action_guard_rejects_reentry() {
        let guard = ActionGuard::new();
        let ticket = guard.try_begin("download").unwrap();
        assert!(guard.is_running("download"));

        let err = guard.try_begin("download").unwrap_err();
        assert!(matches!(err, ClientError::ActionInProgress(ref a) if a == "download"));

        // other actions are independent
        let _other = guard.try_begin("fetch-info").unwrap();

        drop(ticket);
        assert!(!guard.is_running("download"));
        assert!(guard.try_begin("download").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut poller = TaskPoller::new(Duration::from_secs(5));

        let counter = Arc::clone(&count);
        poller.start(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert!(poller.is_running());

        // nothing before the first period
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // ticks at 5s, 10s and 15s
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        poller.stop();
        assert!(!poller.is_running());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_cancelled_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let mut poller = TaskPoller::new(Duration::from_secs(1));
            let counter = Arc::clone(&count);
            poller.start(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
            tokio::time::sleep(Duration::from_millis(1500)).await;
        }
        let seen = count.load(Ordering::SeqCst);
        assert_eq!(seen, 1);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn test_format_timestamp() {
        // server writes naive ISO timestamps
        assert_eq!(format_timestamp("2025-03-01T10:20:30.123456"), "2025-03-01 10:20:30");
        assert_eq!(format_timestamp("2025-03-01T10:20:30"), "2025-03-01 10:20:30");
        assert_eq!(format_timestamp("yesterday"), "yesterday");
        assert_eq!(format_timestamp(""), "-");
    }

    #[test]
    fn test_status_message_classes() {
        let node = status_message(false, "User not found");
        assert_eq!(node.find_by_class("error").len(), 1);
        assert_eq!(node.to_text(), "User not found");
    }

    #[test]
    fn test_region_ids() {
        assert_eq!(Region::TasksList.as_str(), "tasks-list");
        assert_eq!(Region::DownloadsList.as_str(), "downloads-list");
    }
}
