//! The orchestrator
//!
//! [`DebugService`] is the long-lived coordinator: it resolves launch
//! configuration, fans out compound launches, gates sessions on build
//! tasks, propagates breakpoint state in the required order, and manages
//! restart/terminate/focus transitions. It is explicitly constructed and
//! passed by reference; all state lives behind its own locks, which are
//! never held across an await, so sequencing through awaits is the sole
//! correctness mechanism.

mod breakpoints;
mod launcher;
mod persistence;

pub use launcher::{ConfigOrName, TaskRunResult};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::adapter::{AdapterEndEvent, AdapterEvent, SessionState};
use crate::config::ConfigurationProvider;
use crate::events::Emitter;
use crate::host::{
    HostAttachPayload, HostChannel, HostMessage, HostTerminatePayload, HOST_ATTACH_CHANNEL,
    HOST_CLOSE_CHANNEL, HOST_TERMINATE_CHANNEL,
};
use crate::model::view::ViewModel;
use crate::model::DebugModel;
use crate::session::{Session, StackFrame, Thread};
use crate::settings::DebugSettings;
use crate::storage::Storage;
use crate::tasks::TaskRunner;
use crate::workbench::{PanelId, Workbench};

/// Debounce before re-resolving focus after a session resumes running.
/// Stepping should keep its session focused across short continued bursts.
const FOCUS_DEBOUNCE: Duration = Duration::from_millis(200);

/// Observable orchestrator state, derived from the focused session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Inactive,
    Initializing,
    Running,
    Stopped,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Focus change notification payload
#[derive(Debug, Clone)]
pub struct FocusEvent {
    pub session_id: Option<String>,
    pub thread_id: Option<i64>,
    pub frame_id: Option<i64>,
    /// Whether the user picked this focus explicitly
    pub explicit: bool,
}

/// The debug session orchestrator
pub struct DebugService {
    model: Mutex<DebugModel>,
    view_model: Mutex<ViewModel>,
    settings: DebugSettings,
    pub(crate) configuration_provider: Arc<dyn ConfigurationProvider>,
    pub(crate) task_runner: Arc<dyn TaskRunner>,
    storage: Arc<dyn Storage>,
    pub(crate) workbench: Arc<dyn Workbench>,
    pub(crate) host: Arc<dyn HostChannel>,
    initializing: AtomicBool,
    previous_state: Mutex<State>,
    pub(crate) breakpoints_to_send_on_resource_saved: Mutex<std::collections::HashSet<String>>,
    refocus_timers: Mutex<HashMap<String, JoinHandle<()>>>,
    on_did_change_state: Emitter<State>,
    on_will_new_session: Emitter<Arc<Session>>,
    on_did_new_session: Emitter<Arc<Session>>,
    on_did_end_session: Emitter<Arc<Session>>,
    on_did_change_focus: Emitter<FocusEvent>,
}

impl DebugService {
    /// Construct the orchestrator, loading persisted breakpoint state.
    /// Malformed persisted data yields empty collections, silently.
    pub fn new(
        configuration_provider: Arc<dyn ConfigurationProvider>,
        task_runner: Arc<dyn TaskRunner>,
        storage: Arc<dyn Storage>,
        workbench: Arc<dyn Workbench>,
        host: Arc<dyn HostChannel>,
        settings: DebugSettings,
    ) -> Arc<Self> {
        let model = DebugModel::new(
            persistence::load_breakpoints(storage.as_ref()),
            persistence::load_breakpoints_activated(storage.as_ref()),
            persistence::load_function_breakpoints(storage.as_ref()),
            persistence::load_exception_filters(storage.as_ref()),
            persistence::load_watch_expressions(storage.as_ref()),
        );

        let service = Arc::new(Self {
            model: Mutex::new(model),
            view_model: Mutex::new(ViewModel::new()),
            settings,
            configuration_provider,
            task_runner,
            storage,
            workbench,
            host,
            initializing: AtomicBool::new(false),
            previous_state: Mutex::new(State::Inactive),
            breakpoints_to_send_on_resource_saved: Mutex::new(Default::default()),
            refocus_timers: Mutex::new(HashMap::new()),
            on_did_change_state: Emitter::new(),
            on_will_new_session: Emitter::new(),
            on_did_new_session: Emitter::new(),
            on_did_end_session: Emitter::new(),
            on_did_change_focus: Emitter::new(),
        });
        service.spawn_host_listener();
        service
    }

    /// The canonical debug state
    pub fn model(&self) -> MutexGuard<'_, DebugModel> {
        self.model.lock().unwrap()
    }

    /// The current focus and multi-session flag
    pub fn view_model(&self) -> MutexGuard<'_, ViewModel> {
        self.view_model.lock().unwrap()
    }

    pub(crate) fn settings(&self) -> &DebugSettings {
        &self.settings
    }

    /// Persist breakpoint state. Hosts call this on their will-save hook.
    pub fn save_state(&self) {
        persistence::save_state(&self.model(), self.storage.as_ref());
    }

    //---- state management

    /// Derived state: the focused session's state, else initializing/inactive
    pub fn state(&self) -> State {
        if let Some(session) = self.view_model().focused_session() {
            return match session.state() {
                SessionState::Initializing => State::Initializing,
                SessionState::Running => State::Running,
                SessionState::Stopped => State::Stopped,
                SessionState::Ended => State::Inactive,
            };
        }
        if self.initializing.load(Ordering::SeqCst) {
            State::Initializing
        } else {
            State::Inactive
        }
    }

    pub(crate) fn start_initializing_state(&self) {
        if !self.initializing.swap(true, Ordering::SeqCst) {
            self.on_state_change();
        }
    }

    pub(crate) fn end_initializing_state(&self) {
        if self.initializing.swap(false, Ordering::SeqCst) {
            self.on_state_change();
        }
    }

    /// Fire the state observer on actual transitions only
    pub(crate) fn on_state_change(&self) {
        let state = self.state();
        let mut previous = self.previous_state.lock().unwrap();
        if *previous != state {
            *previous = state;
            drop(previous);
            self.on_did_change_state.emit(&state);
        }
    }

    //---- observers

    pub fn on_did_change_state(&self) -> &Emitter<State> {
        &self.on_did_change_state
    }

    /// Fired after the session is registered, before the adapter launches
    pub fn on_will_new_session(&self) -> &Emitter<Arc<Session>> {
        &self.on_will_new_session
    }

    pub fn on_did_new_session(&self) -> &Emitter<Arc<Session>> {
        &self.on_did_new_session
    }

    pub fn on_did_end_session(&self) -> &Emitter<Arc<Session>> {
        &self.on_did_end_session
    }

    pub fn on_did_change_focus(&self) -> &Emitter<FocusEvent> {
        &self.on_did_change_focus
    }

    pub(crate) fn emit_will_new_session(&self, session: &Arc<Session>) {
        self.on_will_new_session.emit(session);
    }

    pub(crate) fn emit_did_new_session(&self, session: &Arc<Session>) {
        self.on_did_new_session.emit(session);
    }

    //---- session listeners

    /// Register for adapter events. Must happen before the session is
    /// announced so no lifecycle event is lost.
    pub(crate) fn register_session_listeners(self: &Arc<Self>, session: &Arc<Session>) {
        let Some(mut events) = session.events() else {
            tracing::warn!(session = session.id(), "adapter event receiver already taken");
            return;
        };
        let weak = Arc::downgrade(self);
        let session = Arc::clone(session);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(service) = weak.upgrade() else { break };
                match event {
                    AdapterEvent::StateChanged(state) => {
                        service.on_session_state_changed(&session, state);
                    }
                    AdapterEvent::Ended(end) => {
                        service.on_adapter_ended(&session, end).await;
                        break;
                    }
                }
            }
        });
    }

    fn on_session_state_changed(self: &Arc<Self>, session: &Arc<Session>, state: SessionState) {
        session.set_state(state);
        let focused = self.view_model().focused_session();
        let is_focused = focused.as_ref().map(|s| s.id()) == Some(session.id());
        if state == SessionState::Running && is_focused {
            self.schedule_refocus(session);
        }
        if is_focused {
            self.on_state_change();
        }
    }

    /// Debounced refocus: a running focused session gives up focus only if
    /// it is still running when the timer fires
    fn schedule_refocus(self: &Arc<Self>, session: &Arc<Session>) {
        let weak = Arc::downgrade(self);
        let session = Arc::clone(session);
        let session_id = session.id().to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(FOCUS_DEBOUNCE).await;
            let Some(service) = weak.upgrade() else { return };
            let still_focused = service
                .view_model()
                .focused_session()
                .map(|s| s.id() == session.id())
                .unwrap_or(false);
            if session.state() == SessionState::Running && still_focused {
                service.focus_stack_frame(None, None, None, false);
            }
        });
        if let Some(previous) = self
            .refocus_timers
            .lock()
            .unwrap()
            .insert(session_id, handle)
        {
            previous.abort();
        }
    }

    /// End-of-session: notify, run the post-debug task, and remove the
    /// session from the model exactly once
    async fn on_adapter_ended(self: &Arc<Self>, session: &Arc<Session>, event: AdapterEndEvent) {
        let was_running = session.state() == SessionState::Running;
        session.set_state(SessionState::Ended);

        if let Some(timer) = self.refocus_timers.lock().unwrap().remove(session.id()) {
            timer.abort();
        }

        if let Some(error) = &event.error {
            self.workbench.notify_error(&format!(
                "Debug adapter process has terminated unexpectedly ({error})"
            ));
        }

        let configuration = session.configuration();

        // "run without debugging" of a hosted session: the host has to be
        // torn down along with the adapter
        if configuration.is_hosted() && was_running && configuration.no_debug {
            if let Some(host_id) = &configuration.host_id {
                self.host
                    .send(HOST_CLOSE_CHANNEL, json!({ "hostId": host_id }));
            }
        }

        if let Some(task) = configuration.post_debug_task.as_deref() {
            if let Err(err) = self.run_task(session.root(), Some(task)).await {
                self.workbench.notify_error(&err.to_string());
            }
        }

        session.shutdown().await;
        self.model().remove_session(session.id());
        self.on_did_end_session.emit(session);
        tracing::info!(
            session = session.id(),
            emitted_stopped = event.emitted_stopped,
            length_secs = event.session_length_secs,
            "debug session ended"
        );

        let was_focused = self
            .view_model()
            .focused_session()
            .map(|s| s.id() == session.id())
            .unwrap_or(false);
        if was_focused {
            self.focus_stack_frame(None, None, None, false);
        }

        if self.model().sessions().is_empty() {
            self.view_model().set_multi_session_view(false);
            if self.settings.open_explorer_on_end {
                self.workbench.open_panel(PanelId::Explorer);
            }
        }
        self.on_state_change();
    }

    //---- host control channel

    fn spawn_host_listener(self: &Arc<Self>) {
        let mut receiver = self.host.subscribe();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let message = match receiver.recv().await {
                    Ok(message) => message,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "host channel lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(service) = weak.upgrade() else { break };
                service.on_host_message(message).await;
            }
        });
    }

    async fn on_host_message(self: &Arc<Self>, message: HostMessage) {
        match message.channel.as_str() {
            HOST_ATTACH_CHANNEL => {
                // a host started in debug mode wants us to attach to it
                let Ok(payload) = serde_json::from_value::<HostAttachPayload>(message.payload)
                else {
                    return;
                };
                let Some(session) = self.model().session(&payload.debug_id) else {
                    return;
                };
                session.convert_to_attach(payload.port);
                if let Err(err) = self.launch_or_attach_to_session(&session, true).await {
                    self.workbench.notify_error(&err.to_string());
                }
            }
            HOST_TERMINATE_CHANNEL => {
                let Ok(payload) = serde_json::from_value::<HostTerminatePayload>(message.payload)
                else {
                    return;
                };
                let Some(session) = self.model().session(&payload.debug_id) else {
                    return;
                };
                if let Err(err) = session.disconnect(false).await {
                    tracing::warn!(session = session.id(), error = %err, "host-initiated disconnect failed");
                }
            }
            _ => {}
        }
    }

    //---- focus management

    /// Resolve and apply a focus triple.
    ///
    /// Missing pieces fall back in order: the frame's/thread's session, the
    /// first stopped session, the first session; the frame's thread, the
    /// first stopped thread, the first thread; the first frame with an
    /// available source.
    pub fn focus_stack_frame(
        &self,
        frame_id: Option<i64>,
        thread_id: Option<i64>,
        session: Option<Arc<Session>>,
        explicit: bool,
    ) {
        let sessions = self.model().sessions();

        let mut session = session;
        if session.is_none() {
            if let Some(frame_id) = frame_id {
                session = sessions
                    .iter()
                    .find(|s| {
                        s.threads()
                            .iter()
                            .any(|t| t.call_stack.iter().any(|f| f.id == frame_id))
                    })
                    .cloned();
            }
        }
        if session.is_none() {
            if let Some(thread_id) = thread_id {
                session = sessions
                    .iter()
                    .find(|s| s.threads().iter().any(|t| t.id == thread_id))
                    .cloned();
            }
        }
        if session.is_none() {
            session = sessions
                .iter()
                .find(|s| s.state() == SessionState::Stopped)
                .cloned()
                .or_else(|| sessions.first().cloned());
        }

        let mut thread: Option<Thread> = None;
        let mut frame: Option<StackFrame> = None;
        if let Some(session) = &session {
            let threads = session.threads();
            thread = thread_id
                .and_then(|id| threads.iter().find(|t| t.id == id).cloned())
                .or_else(|| {
                    frame_id.and_then(|frame_id| {
                        threads
                            .iter()
                            .find(|t| t.call_stack.iter().any(|f| f.id == frame_id))
                            .cloned()
                    })
                })
                .or_else(|| threads.iter().find(|t| t.stopped).cloned())
                .or_else(|| threads.first().cloned());

            if let Some(thread) = &thread {
                frame = frame_id
                    .and_then(|id| thread.call_stack.iter().find(|f| f.id == id).cloned())
                    .or_else(|| {
                        thread
                            .call_stack
                            .iter()
                            .find(|f| f.source.as_ref().map(|s| s.available).unwrap_or(false))
                            .cloned()
                    });
            }
        }

        if let Some(frame) = &frame {
            self.workbench.open_source(frame);
            let source_name = frame
                .source
                .as_ref()
                .map(|s| s.name.as_str())
                .unwrap_or("unknown source");
            self.workbench.status(&format!(
                "Debugging paused, {} line {}",
                source_name, frame.line
            ));
        }

        self.view_model()
            .set_focus(frame.clone(), thread.clone(), session.clone());
        self.on_did_change_focus.emit(&FocusEvent {
            session_id: session.map(|s| s.id().to_string()),
            thread_id: thread.map(|t| t.id),
            frame_id: frame.map(|f| f.id),
            explicit,
        });
        self.on_state_change();
    }
}
