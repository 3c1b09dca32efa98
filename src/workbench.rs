//! Workbench seam: dialogs, panels, editors, announcements
//!
//! Everything user-visible the orchestrator triggers goes through this
//! trait. Rendering is the host's concern; the orchestrator only states
//! what should happen.

use async_trait::async_trait;

use crate::common::Result;
use crate::config::WorkspaceFolder;
use crate::session::StackFrame;

/// Panels the orchestrator may ask the host to open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelId {
    /// The debug console / REPL
    Console,
    /// The debug viewlet (side panel)
    DebugViewlet,
    /// The file explorer viewlet
    Explorer,
    /// The problem-markers list
    Markers,
    /// The task configuration surface
    TaskConfiguration,
}

/// One remediation offered alongside an error dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemedyAction {
    pub label: String,
}

impl RemedyAction {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

/// Host-side UI and editor operations
#[async_trait]
pub trait Workbench: Send + Sync {
    /// Save all dirty editors/files
    async fn save_all(&self) -> Result<()>;

    /// Reload launch configuration for a root folder (or the workspace)
    async fn reload_configuration(&self, root: Option<&WorkspaceFolder>);

    /// Blocking error dialog with remediation choices.
    /// Returns the index of the chosen action, or `None` for cancel.
    async fn show_error_with_actions(
        &self,
        message: &str,
        actions: &[RemedyAction],
    ) -> Option<usize>;

    /// Open a panel without stealing focus
    fn open_panel(&self, panel: PanelId);

    /// Open the launch configuration file for editing
    async fn open_config_file(&self, root: Option<&WorkspaceFolder>, debug_type: Option<&str>);

    /// Reveal the source location of a stack frame
    fn open_source(&self, frame: &StackFrame);

    /// Non-modal status announcement (accessibility)
    fn status(&self, message: &str);

    /// Non-blocking error notification
    fn notify_error(&self, message: &str);
}
