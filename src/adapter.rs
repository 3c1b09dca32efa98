//! Per-session adapter seam
//!
//! A [`SessionAdapter`] is the handle to one out-of-process debugger. The
//! wire protocol behind it is not the orchestrator's concern; the trait
//! carries exactly the operations the pipelines need, and a one-shot event
//! receiver for adapter-reported lifecycle changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::common::Result;
use crate::config::{DebugConfig, DebuggerDescriptor};
use crate::model::breakpoints::{Breakpoint, ExceptionBreakpointFilter, FunctionBreakpoint};

/// Session lifecycle state, driven by adapter events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Adapter starting, launch/attach not yet complete
    Initializing,
    /// Program is running
    Running,
    /// Program has stopped (breakpoint, step, exception)
    Stopped,
    /// Adapter reported end-of-session
    Ended,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

/// Adapter capability set, populated by `initialize`
///
/// Only the capabilities the orchestrator gates on are spelled out;
/// everything else an adapter reports is preserved opaquely by the host.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Capabilities {
    pub supports_restart_request: bool,
    pub supports_function_breakpoints: bool,
    pub supports_conditional_breakpoints: bool,
    pub supports_hit_conditional_breakpoints: bool,
    pub supports_log_points: bool,
    pub supports_terminate_request: bool,
}

/// Payload of the adapter's end-of-session notification
#[derive(Debug, Clone, Default)]
pub struct AdapterEndEvent {
    /// Set when the adapter process died unexpectedly
    pub error: Option<String>,
    /// Whether the adapter ever reported a stop during the session
    pub emitted_stopped: bool,
    pub session_length_secs: u64,
}

/// Events reported by the adapter to the orchestrator
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    StateChanged(SessionState),
    Ended(AdapterEndEvent),
}

/// Handle to one out-of-process debugger
#[async_trait]
pub trait SessionAdapter: Send + Sync {
    /// Start the adapter and negotiate capabilities
    async fn initialize(&self, debugger: &dyn DebuggerDescriptor) -> Result<Capabilities>;

    /// Issue the launch or attach request for the resolved configuration
    async fn launch_or_attach(&self, config: &DebugConfig) -> Result<()>;

    /// Replace the source breakpoints for one uri
    async fn send_breakpoints(
        &self,
        uri: &str,
        breakpoints: &[Breakpoint],
        source_modified: bool,
    ) -> Result<()>;

    /// Replace all function breakpoints. Only called when the adapter
    /// declared `supports_function_breakpoints`.
    async fn send_function_breakpoints(&self, breakpoints: &[FunctionBreakpoint]) -> Result<()>;

    /// Replace the enabled exception filters
    async fn send_exception_breakpoints(
        &self,
        filters: &[ExceptionBreakpointFilter],
    ) -> Result<()>;

    /// In-place restart. Only called when the adapter declared
    /// `supports_restart_request`.
    async fn restart(&self) -> Result<()>;

    /// Disconnect from the debuggee, optionally signalling an impending
    /// relaunch
    async fn disconnect(&self, restart: bool) -> Result<()>;

    /// Terminate the debuggee, optionally signalling an impending relaunch
    async fn terminate(&self, restart: bool) -> Result<()>;

    /// Tear down the adapter process. Idempotent.
    async fn shutdown(&self);

    /// Take the adapter's event receiver. Yields `None` after the first
    /// call; the orchestrator takes it exactly once when it registers
    /// session listeners.
    fn events(&self) -> Option<mpsc::UnboundedReceiver<AdapterEvent>>;

    /// Whether the adapter emitted console output (used to decide whether
    /// to surface the console after a failed launch)
    fn has_console_output(&self) -> bool;
}
