//! Task runner seam
//!
//! Pre-launch and post-debug tasks are executed by an external task system.
//! The orchestrator only resolves task references, starts runs, and watches
//! the state-change stream to decide whether a run can be tracked.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::common::Result;
use crate::config::WorkspaceFolder;

/// A resolved task, ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Stable identity within the task system
    pub id: String,
    /// Label shown in errors and dialogs
    pub label: String,
    /// Background tasks are considered done once they report `Inactive`
    pub is_background: bool,
}

/// Result summary of a completed task run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// Kinds of task state transitions the orchestrator observes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEventKind {
    /// The task process became active (foreground tasks)
    Active,
    /// A background task finished its current cycle
    Inactive,
}

/// One task state transition
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub task_id: String,
    pub kind: TaskEventKind,
}

/// Executes named build tasks
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Resolve a task reference within a root folder
    async fn get_task(&self, root: &WorkspaceFolder, task_id: &str) -> Result<Option<Task>>;

    /// Tasks currently running
    async fn get_active_tasks(&self) -> Vec<Task>;

    /// Run a task to completion. Background tasks may never resolve; the
    /// orchestrator watches the event stream instead.
    async fn run(&self, task: &Task) -> Result<Option<TaskSummary>>;

    /// Subscribe to task state transitions
    fn subscribe(&self) -> broadcast::Receiver<TaskEvent>;

    /// Count of outstanding problem-matcher error markers
    fn error_marker_count(&self) -> usize;
}
