//! User-facing orchestrator settings
//!
//! These mirror the host's settings file; the host deserializes them and
//! hands a snapshot to the service at construction.

use serde::{Deserialize, Serialize};

/// When to open a panel relative to session starts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PanelOpenBehavior {
    /// Never open automatically
    #[default]
    Never,
    /// Open whenever a session starts
    OpenOnSessionStart,
    /// Open only for the first session ever started
    OpenOnFirstSessionStart,
}

/// Orchestrator settings
#[derive(Debug, Clone, Deserialize)]
pub struct DebugSettings {
    /// When to open the debug viewlet on session start
    #[serde(default = "default_open_debug")]
    pub open_debug: PanelOpenBehavior,

    /// When to open the debug console on session start
    #[serde(default)]
    pub internal_console_options: PanelOpenBehavior,

    /// Reopen the explorer viewlet once the last session ends
    #[serde(default)]
    pub open_explorer_on_end: bool,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            open_debug: default_open_debug(),
            internal_console_options: PanelOpenBehavior::default(),
            open_explorer_on_end: false,
        }
    }
}

fn default_open_debug() -> PanelOpenBehavior {
    PanelOpenBehavior::OpenOnSessionStart
}
