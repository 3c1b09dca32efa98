//! Debug session handle
//!
//! One [`Session`] per orchestrated launch/attach. The session owns its
//! adapter handle plus the Model-side snapshots (configuration,
//! capabilities, state, threads) the orchestrator reads during focus
//! resolution and restarts.

use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::adapter::{AdapterEvent, Capabilities, SessionAdapter, SessionState};
use crate::common::Result;
use crate::config::{DebugConfig, DebuggerDescriptor, WorkspaceFolder};
use crate::model::breakpoints::{
    self, Breakpoint, ExceptionBreakpointFilter, FunctionBreakpoint,
};

/// Snapshot of a debuggee thread
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub id: i64,
    pub name: String,
    pub stopped: bool,
    pub call_stack: Vec<StackFrame>,
}

/// Snapshot of one stack frame
#[derive(Debug, Clone, PartialEq)]
pub struct StackFrame {
    pub id: i64,
    pub name: String,
    pub line: u32,
    pub source: Option<SourceRef>,
}

/// Where a frame's code lives, and whether we can show it
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub uri: String,
    pub name: String,
    pub available: bool,
}

struct SessionInner {
    resolved: DebugConfig,
    unresolved: DebugConfig,
    capabilities: Capabilities,
    state: SessionState,
    threads: Vec<Thread>,
}

/// One orchestrated instance of launching/attaching to a debug adapter
pub struct Session {
    id: String,
    root: Option<WorkspaceFolder>,
    adapter: Arc<dyn SessionAdapter>,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new(
        resolved: DebugConfig,
        unresolved: DebugConfig,
        root: Option<WorkspaceFolder>,
        adapter: Arc<dyn SessionAdapter>,
    ) -> Self {
        Self {
            id: breakpoints::generate_id(),
            root,
            adapter,
            inner: Mutex::new(SessionInner {
                resolved,
                unresolved,
                capabilities: Capabilities::default(),
                state: SessionState::Initializing,
                threads: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> Option<&WorkspaceFolder> {
        self.root.as_ref()
    }

    /// Configuration name, empty for anonymous configs
    pub fn name(&self) -> String {
        self.inner
            .lock()
            .unwrap()
            .resolved
            .display_name()
            .to_string()
    }

    pub fn configuration(&self) -> DebugConfig {
        self.inner.lock().unwrap().resolved.clone()
    }

    pub fn unresolved_configuration(&self) -> DebugConfig {
        self.inner.lock().unwrap().unresolved.clone()
    }

    pub fn set_configuration(&self, resolved: DebugConfig, unresolved: DebugConfig) {
        let mut inner = self.inner.lock().unwrap();
        inner.resolved = resolved;
        inner.unresolved = unresolved;
    }

    /// Attach adapter-supplied restart data to the configuration
    pub fn set_restart_data(&self, data: Option<Value>) {
        self.inner.lock().unwrap().resolved.restart_data = data;
    }

    /// Rewrite the configuration to attach to a host-announced port
    pub fn convert_to_attach(&self, port: u16) {
        let mut inner = self.inner.lock().unwrap();
        inner.resolved.request = Some("attach".to_string());
        inner.resolved.port = Some(port);
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.lock().unwrap().capabilities
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().unwrap().state
    }

    pub fn set_state(&self, state: SessionState) {
        self.inner.lock().unwrap().state = state;
    }

    pub fn threads(&self) -> Vec<Thread> {
        self.inner.lock().unwrap().threads.clone()
    }

    /// Replace the thread snapshots (fed by the host's event layer)
    pub fn set_threads(&self, threads: Vec<Thread>) {
        self.inner.lock().unwrap().threads = threads;
    }

    //---- adapter operations

    /// Start the adapter and record its capabilities
    pub async fn initialize(&self, debugger: &dyn DebuggerDescriptor) -> Result<()> {
        let capabilities = self.adapter.initialize(debugger).await?;
        self.inner.lock().unwrap().capabilities = capabilities;
        Ok(())
    }

    /// Issue launch or attach for the stored configuration.
    /// The session is `Running` once this resolves.
    pub async fn launch_or_attach(&self) -> Result<()> {
        let config = self.configuration();
        self.adapter.launch_or_attach(&config).await?;
        self.set_state(SessionState::Running);
        Ok(())
    }

    pub async fn send_breakpoints(
        &self,
        uri: &str,
        breakpoints: &[Breakpoint],
        source_modified: bool,
    ) -> Result<()> {
        self.adapter
            .send_breakpoints(uri, breakpoints, source_modified)
            .await
    }

    pub async fn send_function_breakpoints(
        &self,
        breakpoints: &[FunctionBreakpoint],
    ) -> Result<()> {
        self.adapter.send_function_breakpoints(breakpoints).await
    }

    pub async fn send_exception_breakpoints(
        &self,
        filters: &[ExceptionBreakpointFilter],
    ) -> Result<()> {
        self.adapter.send_exception_breakpoints(filters).await
    }

    pub async fn restart(&self) -> Result<()> {
        self.adapter.restart().await
    }

    pub async fn disconnect(&self, restart: bool) -> Result<()> {
        self.adapter.disconnect(restart).await
    }

    pub async fn terminate(&self, restart: bool) -> Result<()> {
        self.adapter.terminate(restart).await
    }

    /// Tear down the adapter. Idempotent; removal from the Model happens
    /// when the adapter reports end-of-session, never here.
    pub async fn shutdown(&self) {
        self.adapter.shutdown().await;
    }

    /// Take the adapter event receiver (once)
    pub fn events(&self) -> Option<tokio::sync::mpsc::UnboundedReceiver<AdapterEvent>> {
        self.adapter.events()
    }

    pub fn has_console_output(&self) -> bool {
        self.adapter.has_console_output()
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}
