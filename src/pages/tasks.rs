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


//! Tasks page
//!
//! Refreshed by the App's poller while active, so `load` never alerts.

use super::{format_timestamp, lock, ActionGuard, PageContext, Region};
use crate::api::models::{Task, TaskKind};
use crate::error::Result;
use crate::render::{el, fragment, Element, Node};
use std::sync::Mutex;
use tracing::{debug, info, warn};

pub struct TasksPage {
    ctx: PageContext,
    guard: ActionGuard,
    tasks: Mutex<Vec<Task>>,
}

impl TasksPage {
    pub fn new(ctx: PageContext) -> Self {
        Self {
            ctx,
            guard: ActionGuard::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Tasks from the last successful load
    pub fn tasks(&self) -> Vec<Task> {
        lock(&self.tasks).clone()
    }

    /// Fetch and render the task list
    pub async fn load(&self) -> Result<Vec<Task>> {
        let tasks = match self.ctx.api.tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %e, "loading tasks failed");
                return Err(e);
            }
        };

        debug!(count = tasks.len(), "tasks loaded");
        self.ctx.surface.render(Region::TasksList, render_tasks(&tasks));
        *lock(&self.tasks) = tasks.clone();
        Ok(tasks)
    }

    /// Cancel a pending or running task after confirmation
    pub async fn cancel(&self, task_id: &str) -> Result<()> {
        let result = async {
            self.ctx.confirm("Cancel this task?")?;
            let _ticket = self.guard.try_begin(&format!("cancel-{}", task_id))?;
            self.ctx.api.cancel_task(task_id).await
        }
        .await;

        match result {
            Ok(ack) => {
                info!(task_id, message = %ack.message, "task cancelled");
                self.load().await?;
                Ok(())
            }
            Err(e) => {
                self.ctx.report("Cancelling the task failed", &e);
                Err(e)
            }
        }
    }
}

fn type_label(kind: &TaskKind) -> &'static str {
    match kind {
        TaskKind::DownloadLatest { .. } => "Download latest episodes",
        TaskKind::Monitor { .. } => "Monitor",
    }
}

fn render_task(task: &Task) -> Element {
    let status = task.status.as_str();

    let details: Node = match &task.kind {
        TaskKind::DownloadLatest { progress, .. } => el("div")
            .class("task-progress")
            .child(el("p").text(format!(
                "Progress: {}/{} (ok: {}, failed: {})",
                progress.completed,
                progress.total,
                progress.succeeded(),
                progress.failed
            )))
            .child(
                el("progress")
                    .attr("value", progress.percent().to_string())
                    .attr("max", "100"),
            )
            .into(),
        TaskKind::Monitor {
            downloaded_count,
            last_check,
        } => fragment(vec![
            el("p").text(format!("Downloaded: {} episodes", downloaded_count)),
            el("p").text(format!(
                "Last check: {}",
                format_timestamp(last_check.as_deref().unwrap_or(""))
            )),
        ]),
    };

    let mut item = el("div")
        .class(format!("task-item {}", status))
        .attr("data-task-id", task.task_id.as_str())
        .child(
            el("div")
                .class("task-header")
                .child(el("h4").text(format!("{} - {}", type_label(&task.kind), task.username)))
                .child(
                    el("span")
                        .class(format!("task-status {}", status))
                        .text(task.status.display_text()),
                ),
        )
        .child(el("p").text(format!("Created: {}", format_timestamp(&task.created_at))))
        .child(details);

    if task.status.is_cancellable() {
        item = item.child(
            el("button")
                .class("delete-btn")
                .attr("data-task-id", task.task_id.as_str())
                .text(format!("Cancel task {}", task.task_id)),
        );
    }
    item
}

pub fn render_tasks(tasks: &[Task]) -> Node {
    if tasks.is_empty() {
        return el("p").text("No tasks").into();
    }
    fragment(tasks.iter().map(render_task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{TaskProgress, TaskStatus};

    fn task(id: &str, status: TaskStatus, kind: TaskKind) -> Task {
        Task {
            task_id: id.to_string(),
            username: "alice".to_string(),
            status,
            created_at: "2025-03-01T10:00:00".to_string(),
            kind,
        }
    }

    #[test]
    fn test_cancel_control_only_for_unfinished() {
        let latest = TaskKind::DownloadLatest {
            progress: TaskProgress {
                completed: 3,
                total: 4,
                failed: 1,
            },
            count: Some(5),
        };
        let tasks = vec![
            task("a", TaskStatus::Running, latest.clone()),
            task("b", TaskStatus::Pending, latest.clone()),
            task("c", TaskStatus::Completed, latest.clone()),
            task("d", TaskStatus::Cancelled, latest),
        ];
        let node = render_tasks(&tasks);
        assert_eq!(node.find_by_class("delete-btn").len(), 2);
        assert_eq!(node.find_by_class("task-item").len(), 4);
    }

    #[test]
    fn test_progress_and_monitor_text() {
        let tasks = vec![
            task(
                "a",
                TaskStatus::Running,
                TaskKind::DownloadLatest {
                    progress: TaskProgress {
                        completed: 3,
                        total: 4,
                        failed: 1,
                    },
                    count: None,
                },
            ),
            task(
                "m",
                TaskStatus::Running,
                TaskKind::Monitor {
                    downloaded_count: 7,
                    last_check: Some("2025-03-01T11:00:00".into()),
                },
            ),
        ];
        let text = render_tasks(&tasks).to_text();
        assert!(text.contains("Download latest episodes - alice"));
        assert!(text.contains("Running"));
        assert!(text.contains("Progress: 3/4 (ok: 2, failed: 1)"));
        assert!(text.contains("75%"));
        assert!(text.contains("Downloaded: 7 episodes"));
        assert!(text.contains("Last check: 2025-03-01 11:00:00"));
    }

    #[test]
    fn test_no_tasks() {
        assert_eq!(render_tasks(&[]).to_text(), "No tasks");
    }
}
