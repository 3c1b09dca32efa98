//! Start, restart, and stop pipelines
//!
//! Every fallible step here resolves to a boolean instead of bubbling an
//! error past the entry point: configuration problems surface a dialog and
//! block only the affected (sub)launch, so compound members are always all
//! attempted.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;

use crate::common::{Error, Result};
use crate::config::{
    Compound, CompoundMember, DebugConfig, Launch, LaunchTarget, WorkspaceFolder,
};
use crate::host::HOST_RELOAD_CHANNEL;
use crate::session::Session;
use crate::settings::PanelOpenBehavior;
use crate::tasks::{TaskEventKind, TaskSummary};
use crate::workbench::{PanelId, RemedyAction};

use super::DebugService;

/// Settle delay between terminating a session and relaunching it
const RESTART_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// How long a task run may stay unobservable before it is reported as
/// untrackable. The run itself is deliberately left in flight.
const TASK_TRACKING_TIMEOUT: Duration = Duration::from_secs(10);

/// What a start request names: a concrete configuration or a name to be
/// looked up in the launch source
#[derive(Debug, Clone)]
pub enum ConfigOrName {
    Config(DebugConfig),
    Name(String),
}

/// Outcome of running a gating task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunResult {
    Failure,
    Success,
}

impl DebugService {
    /// Main entry point.
    ///
    /// Resolves names to configurations or compounds, guards against
    /// duplicate runs, fans out compound members concurrently, and manages
    /// the transient initializing state. Returns whether every launched
    /// configuration started successfully.
    pub async fn start_debugging(
        self: &Arc<Self>,
        launch: Option<Arc<Launch>>,
        config_or_name: Option<ConfigOrName>,
        no_debug: bool,
        unresolved_config: Option<DebugConfig>,
    ) -> Result<bool> {
        self.start_initializing_state();
        let result = self
            .do_start_debugging(launch, config_or_name, no_debug, unresolved_config)
            .await;
        // make sure to get out of the initializing state in every outcome
        self.end_initializing_state();
        result
    }

    async fn do_start_debugging(
        self: &Arc<Self>,
        launch: Option<Arc<Launch>>,
        config_or_name: Option<ConfigOrName>,
        no_debug: bool,
        unresolved_config: Option<DebugConfig>,
    ) -> Result<bool> {
        // make sure all files are saved and the configuration is up to date
        self.workbench.save_all().await?;
        let root = launch.as_ref().and_then(|l| l.root.clone());
        self.workbench.reload_configuration(root.as_ref()).await;

        let config_or_name = config_or_name.or_else(|| {
            self.configuration_provider
                .selected_configuration_name()
                .map(ConfigOrName::Name)
        });

        let mut config: Option<DebugConfig> = None;
        let mut compound: Option<Compound> = None;

        match &config_or_name {
            Some(ConfigOrName::Name(name)) => {
                if let Some(launch) = &launch {
                    match launch.target(name) {
                        Some(LaunchTarget::Compound(c)) => compound = Some(c),
                        Some(LaunchTarget::Single(c)) => config = Some(c),
                        None => {}
                    }

                    // reject before any task runs or session is created
                    let sessions = self.model().sessions();
                    let same_root = |s: &Arc<Session>| {
                        launch.root.is_none()
                            || s.root().is_none()
                            || s.root().map(|r| &r.uri) == launch.root.as_ref().map(|r| &r.uri)
                    };
                    if sessions.iter().any(|s| s.name() == *name && same_root(s)) {
                        return Ok(self
                            .surface_error(Error::ConfigurationAlreadyRunning(name.clone()))
                            .await);
                    }
                    if let Some(members) = compound.as_ref().and_then(|c| c.configurations.as_ref())
                    {
                        if sessions
                            .iter()
                            .any(|s| members.iter().any(|m| m.name() == s.name()))
                        {
                            return Ok(self
                                .surface_error(Error::ConfigurationAlreadyRunning(name.clone()))
                                .await);
                        }
                    }
                }
            }
            Some(ConfigOrName::Config(c)) => config = Some(c.clone()),
            None => {}
        }

        if let Some(compound) = compound {
            return self
                .start_compound(compound, launch, no_debug, unresolved_config)
                .await;
        }

        if let Some(ConfigOrName::Name(name)) = &config_or_name {
            if config.is_none() {
                let error = if launch.as_ref().map(|l| l.exists).unwrap_or(false) {
                    Error::ConfigurationMissing(name.clone())
                } else {
                    Error::LaunchFileMissing
                };
                return Ok(self.surface_error(error).await);
            }
        }

        self.create_session(launch, config, unresolved_config, no_debug)
            .await
    }

    /// Launch every compound member concurrently. Members resolve
    /// independently; the aggregate result is the logical AND over all of
    /// them, with no short-circuiting.
    async fn start_compound(
        self: &Arc<Self>,
        compound: Compound,
        launch: Option<Arc<Launch>>,
        no_debug: bool,
        unresolved_config: Option<DebugConfig>,
    ) -> Result<bool> {
        let Some(members) = compound.configurations.clone() else {
            return Ok(self.surface_error(Error::CompoundMissingConfigurations).await);
        };

        let launches = self.configuration_provider.launches();
        let futures = members.into_iter().map(|member| {
            let service = Arc::clone(self);
            let launch = launch.clone();
            let launches = launches.clone();
            let compound_name = compound.name.clone();
            let unresolved = unresolved_config.clone();
            async move {
                if member.name() == compound_name {
                    // a compound referencing itself is skipped, not an error
                    return true;
                }
                let launch_for_member = match resolve_compound_member(
                    &member,
                    launch.as_deref(),
                    &launches,
                    &compound_name,
                ) {
                    Ok(launch_for_member) => launch_for_member,
                    Err(error) => return service.surface_error(error).await,
                };
                let config = launch_for_member.configuration(member.name()).cloned();
                service
                    .create_session(Some(launch_for_member), config, unresolved, no_debug)
                    .await
                    .unwrap_or(false)
            }
        });

        let results = join_all(futures).await;
        Ok(results.into_iter().all(|started| started))
    }

    /// Gets the debugger for the type, resolves the configuration through
    /// providers, substitutes variables, and runs the pre-launch task.
    pub(crate) async fn create_session(
        self: &Arc<Self>,
        launch: Option<Arc<Launch>>,
        config: Option<DebugConfig>,
        unresolved_config: Option<DebugConfig>,
        no_debug: bool,
    ) -> Result<bool> {
        let mut config = config.unwrap_or_default();
        let unresolved = unresolved_config.unwrap_or_else(|| config.clone());

        if no_debug {
            config.no_debug = true;
        }

        let mut debug_type = config.debug_type.clone();
        if debug_type.is_none() {
            debug_type = self
                .configuration_provider
                .guess_debugger()
                .await
                .map(|d| d.debug_type().to_string());
        }

        let root = launch.as_ref().and_then(|l| l.root.clone());

        let resolved = match self
            .configuration_provider
            .resolve_configuration_by_providers(
                root.as_ref().map(|r| r.uri.as_str()),
                debug_type.as_deref(),
                config,
            )
            .await
        {
            Ok(resolved) => resolved,
            Err(err) => {
                self.show_error(&err.to_string(), &[]).await;
                return Ok(false);
            }
        };

        // a missing config indicates a deliberately aborted launch
        let Some(config) = resolved else {
            return Ok(false);
        };
        if config.debug_type.is_none() {
            return Ok(false);
        }

        let resolved_config = match self.substitute_variables(root.as_ref(), config).await {
            Some(resolved_config) => resolved_config,
            // user cancelled resolving of interactive variables, silently return
            None => return Ok(false),
        };

        let request_ok = matches!(
            resolved_config.request.as_deref(),
            Some("launch") | Some("attach")
        );
        let debugger_registered = resolved_config
            .debug_type
            .as_deref()
            .map(|t| self.configuration_provider.get_debugger(t).is_some())
            .unwrap_or(false);
        if !debugger_registered || !request_ok {
            let error = if !request_ok {
                match &resolved_config.request {
                    Some(request) => Error::RequestNotSupported(request.clone()),
                    None => Error::RequestMissing,
                }
            } else {
                match &resolved_config.debug_type {
                    Some(debug_type) => Error::DebugTypeNotSupported(debug_type.clone()),
                    None => Error::DebugTypeMissing,
                }
            };
            self.show_error(&error.to_string(), &[]).await;
            return Ok(false);
        }

        let task_result = self
            .run_task_and_check_errors(root.as_ref(), resolved_config.pre_launch_task.as_deref())
            .await;
        if task_result != TaskRunResult::Success {
            return Ok(false);
        }

        self.do_create_session(root, resolved_config, unresolved)
            .await
    }

    /// Instantiates the session, registers listeners, and launches the
    /// adapter
    async fn do_create_session(
        self: &Arc<Self>,
        root: Option<WorkspaceFolder>,
        resolved: DebugConfig,
        unresolved: DebugConfig,
    ) -> Result<bool> {
        // the caller validated type and request
        let debug_type = resolved.debug_type.clone().ok_or(Error::DebugTypeMissing)?;
        let debugger = self
            .configuration_provider
            .get_debugger(&debug_type)
            .ok_or(Error::DebugTypeNotSupported(debug_type))?;
        let adapter = debugger.create_adapter();
        let session = Arc::new(Session::new(resolved, unresolved, root, adapter));

        self.model().add_session(Arc::clone(&session));
        // register listeners as the very first thing!
        self.register_session_listeners(&session);
        self.emit_will_new_session(&session);

        match self.launch_or_attach_to_session(&session, true).await {
            Ok(()) => {
                self.emit_did_new_session(&session);
                let configuration = session.configuration();
                let first_session = self.view_model().first_session_start();

                let console = configuration
                    .internal_console_options
                    .unwrap_or(self.settings().internal_console_options);
                if console == PanelOpenBehavior::OpenOnSessionStart
                    || (first_session && console == PanelOpenBehavior::OpenOnFirstSessionStart)
                {
                    self.workbench.open_panel(PanelId::Console);
                }

                // do not open the debug viewlet for "run without debugging"
                let open_debug = self.settings().open_debug;
                if !configuration.no_debug
                    && (open_debug == PanelOpenBehavior::OpenOnSessionStart
                        || (first_session
                            && open_debug == PanelOpenBehavior::OpenOnFirstSessionStart))
                {
                    self.workbench.open_panel(PanelId::DebugViewlet);
                }

                self.view_model().set_first_session_start(false);
                if self.model().sessions().len() > 1 {
                    self.view_model().set_multi_session_view(true);
                }
                tracing::info!(
                    session = session.id(),
                    name = %session.name(),
                    "debug session started"
                );
                Ok(true)
            }
            Err(err) => {
                if err.is_cancelled() {
                    // don't show 'cancelled' messages to the user
                    return Ok(false);
                }

                // surface the console if the adapter already logged there
                if session.has_console_output() {
                    self.workbench.open_panel(PanelId::Console);
                }

                let configuration = session.configuration();
                if configuration.request.as_deref() == Some("attach") && configuration.auto_attach {
                    // attach timeouts are expected in auto-attach mode
                    return Ok(false);
                }

                tracing::error!(error = %err, "debug session misconfiguration");
                self.show_error(&err.to_string(), err.actions()).await;
                Ok(false)
            }
        }
    }

    /// Initialize the adapter and issue launch/attach, shutting the session
    /// down on failure
    pub(crate) async fn launch_or_attach_to_session(
        &self,
        session: &Arc<Session>,
        focus: bool,
    ) -> Result<()> {
        let configuration = session.configuration();
        let debug_type = configuration
            .debug_type
            .clone()
            .ok_or(Error::DebugTypeMissing)?;
        let debugger = self
            .configuration_provider
            .get_debugger(&debug_type)
            .ok_or(Error::DebugTypeNotSupported(debug_type))?;

        let result = async {
            session.initialize(debugger.as_ref()).await?;
            session.launch_or_attach().await
        }
        .await;

        match result {
            Ok(()) => {
                if focus {
                    self.focus_stack_frame(None, None, Some(Arc::clone(session)), false);
                }
                Ok(())
            }
            Err(err) => {
                session.shutdown().await;
                Err(err)
            }
        }
    }

    //---- restart / stop

    /// Restart a session: adapter-side when supported, via the host control
    /// channel for hosted sessions, otherwise terminate → settle → relaunch.
    pub async fn restart_session(
        self: &Arc<Self>,
        session: Arc<Session>,
        restart_data: Option<Value>,
    ) -> Result<()> {
        self.workbench.save_all().await?;
        // adapter-initiated restarts skip the pre-launch and post-debug tasks
        let is_auto_restart = restart_data.is_some();
        let configuration = session.configuration();

        if session.capabilities().supports_restart_request {
            if self.run_restart_tasks(&session, is_auto_restart).await? == TaskRunResult::Success {
                session.restart().await?;
            }
            return Ok(());
        }

        if configuration.is_hosted() && session.root().is_some() {
            if self.run_restart_tasks(&session, is_auto_restart).await? == TaskRunResult::Success {
                if let Some(host_id) = &configuration.host_id {
                    self.host
                        .send(HOST_RELOAD_CHANNEL, json!({ "hostId": host_id }));
                }
            }
            return Ok(());
        }

        let should_focus = self
            .view_model()
            .focused_session()
            .map(|s| s.id() == session.id())
            .unwrap_or(false);

        // automatic restarts disconnect, user-initiated restarts terminate
        let stop_result = if is_auto_restart {
            session.disconnect(true).await
        } else {
            session.terminate(true).await
        };
        if let Err(err) = stop_result {
            tracing::warn!(session = session.id(), error = %err, "stopping session for restart failed");
        }

        tokio::time::sleep(RESTART_SETTLE_DELAY).await;

        if self.run_restart_tasks(&session, is_auto_restart).await? != TaskRunResult::Success {
            return Ok(());
        }

        // read the configuration again if the launch definition changed on
        // disk, otherwise reuse the in-memory configuration
        let mut resolved = Some(session.configuration());
        let mut unresolved = session.unresolved_configuration();
        if let Some(root) = session.root() {
            if let Some(launch) = self.configuration_provider.launch_for_root(&root.uri) {
                if let Some(mut on_disk) = launch.configuration(&session.name()).cloned() {
                    if on_disk != unresolved {
                        // the debugger may have rewritten the type mid-session; keep it
                        on_disk.debug_type = session.configuration().debug_type;
                        on_disk.no_debug = session.configuration().no_debug;
                        unresolved = on_disk.clone();
                        resolved = match self
                            .configuration_provider
                            .resolve_configuration_by_providers(
                                Some(root.uri.as_str()),
                                on_disk.debug_type.clone().as_deref(),
                                on_disk,
                            )
                            .await
                        {
                            Ok(Some(config)) => {
                                self.substitute_variables(Some(root), config).await
                            }
                            Ok(None) => None,
                            Err(err) => {
                                self.show_error(&err.to_string(), &[]).await;
                                None
                            }
                        };
                    }
                }
            }
        }
        let Some(resolved) = resolved else {
            // resolution was aborted; leave the session stopped
            return Ok(());
        };

        session.set_configuration(resolved, unresolved);
        session.set_restart_data(restart_data);

        self.launch_or_attach_to_session(&session, should_focus)
            .await?;
        self.emit_did_new_session(&session);
        Ok(())
    }

    async fn run_restart_tasks(
        &self,
        session: &Arc<Session>,
        is_auto_restart: bool,
    ) -> Result<TaskRunResult> {
        if is_auto_restart {
            return Ok(TaskRunResult::Success);
        }
        let configuration = session.configuration();
        self.run_task(session.root(), configuration.post_debug_task.as_deref())
            .await?;
        Ok(self
            .run_task_and_check_errors(session.root(), configuration.pre_launch_task.as_deref())
            .await)
    }

    /// Terminate one session, or every session. Termination failures are
    /// logged, never propagated.
    pub async fn stop_session(&self, session: Option<Arc<Session>>) {
        if let Some(session) = session {
            if let Err(err) = session.terminate(false).await {
                tracing::warn!(session = session.id(), error = %err, "terminating session failed");
            }
            return;
        }

        let sessions = self.model().sessions();
        if sessions.is_empty() {
            self.end_initializing_state();
        }
        join_all(sessions.iter().map(|session| async move {
            if let Err(err) = session.terminate(false).await {
                tracing::warn!(session = session.id(), error = %err, "terminating session failed");
            }
        }))
        .await;
    }

    //---- task management

    /// Run a gating task and classify the outcome. Problems present a
    /// blocking choice; "Debug Anyway" is a first-class success path.
    pub(crate) async fn run_task_and_check_errors(
        &self,
        root: Option<&WorkspaceFolder>,
        task_id: Option<&str>,
    ) -> TaskRunResult {
        let debug_anyway = RemedyAction::new("Debug Anyway");
        match self.run_task(root, task_id).await {
            Ok(summary) => {
                let error_count = if task_id.is_some() {
                    self.task_runner.error_marker_count()
                } else {
                    0
                };
                let success_exit_code = matches!(summary, Some(TaskSummary { exit_code: Some(0) }));
                let failure_exit_code =
                    matches!(summary, Some(TaskSummary { exit_code: Some(code) }) if code != 0);
                if success_exit_code || (error_count == 0 && !failure_exit_code) {
                    return TaskRunResult::Success;
                }

                let label = task_id.unwrap_or_default();
                let message = match error_count {
                    0 => format!(
                        "The task '{}' terminated with exit code {}.",
                        label,
                        summary.and_then(|s| s.exit_code).unwrap_or_default()
                    ),
                    1 => format!("Error exists after running task '{label}'."),
                    _ => format!("Errors exist after running task '{label}'."),
                };

                let actions = [debug_anyway, RemedyAction::new("Show Errors")];
                match self.workbench.show_error_with_actions(&message, &actions).await {
                    Some(0) => TaskRunResult::Success,
                    Some(1) => {
                        self.workbench.open_panel(PanelId::Markers);
                        TaskRunResult::Failure
                    }
                    _ => TaskRunResult::Failure,
                }
            }
            Err(err) => {
                let actions = [debug_anyway, RemedyAction::new("Configure Tasks")];
                match self
                    .workbench
                    .show_error_with_actions(&err.to_string(), &actions)
                    .await
                {
                    Some(0) => TaskRunResult::Success,
                    Some(1) => {
                        self.workbench.open_panel(PanelId::TaskConfiguration);
                        TaskRunResult::Failure
                    }
                    _ => TaskRunResult::Failure,
                }
            }
        }
    }

    /// Run a task and wait for its summary.
    ///
    /// The run races a 10-second watchdog and the task-state stream: an
    /// Active/Inactive signal only marks the run as observable. If neither
    /// the run future settles nor a signal arrives within the window, the
    /// task is reported as untrackable; the in-flight run is NOT
    /// cancelled, and both outcomes may still be observed afterwards.
    pub(crate) async fn run_task(
        &self,
        root: Option<&WorkspaceFolder>,
        task_id: Option<&str>,
    ) -> Result<Option<TaskSummary>> {
        let Some(task_id) = task_id else {
            return Ok(None);
        };
        let Some(root) = root else {
            return Err(Error::InvalidTaskReference(task_id.to_string()));
        };

        let task = self
            .task_runner
            .get_task(root, task_id)
            .await?
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;

        // task is already running - nothing to do
        if self
            .task_runner
            .get_active_tasks()
            .await
            .iter()
            .any(|t| t.id == task.id)
        {
            return Ok(None);
        }

        let mut events = self.task_runner.subscribe();
        let runner = Arc::clone(&self.task_runner);
        let spawned_task = task.clone();
        // the run lives on its own tokio task so losing the race below does
        // not cancel it
        let mut run = tokio::spawn(async move { runner.run(&spawned_task).await });

        let watchdog = tokio::time::sleep(TASK_TRACKING_TIMEOUT);
        tokio::pin!(watchdog);
        let mut observed = false;
        let mut events_closed = false;

        loop {
            tokio::select! {
                result = &mut run => {
                    return result
                        .map_err(|e| Error::Internal(format!("task run panicked: {e}")))?;
                }
                event = events.recv(), if !events_closed => {
                    match event {
                        Ok(event) if event.task_id == task.id => match event.kind {
                            TaskEventKind::Active => observed = true,
                            TaskEventKind::Inactive => {
                                observed = true;
                                if task.is_background {
                                    // a background task is done once it settles
                                    return Ok(None);
                                }
                            }
                        },
                        Ok(_) => {}
                        Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => events_closed = true,
                    }
                }
                _ = &mut watchdog, if !observed => {
                    return Err(Error::TaskNotTracked(task_id.to_string()));
                }
            }
        }
    }

    //---- error surfacing

    /// Surface a launch-blocking error and resolve the (sub)launch to false
    pub(crate) async fn surface_error(&self, error: Error) -> bool {
        tracing::warn!(error = %error, "launch blocked");
        self.show_error(&error.to_string(), error.actions()).await;
        false
    }

    /// Show an error dialog, always offering the launch configuration as a
    /// remediation. Extra actions come from the adapter; the host reacts to
    /// their indices.
    pub(crate) async fn show_error(&self, message: &str, actions: &[String]) {
        let mut all: Vec<RemedyAction> = actions
            .iter()
            .map(|action| RemedyAction::new(action.as_str()))
            .collect();
        all.push(RemedyAction::new("Open launch configuration"));
        let configure_index = all.len() - 1;
        if self.workbench.show_error_with_actions(message, &all).await == Some(configure_index) {
            self.workbench.open_config_file(None, None).await;
        }
    }

    async fn substitute_variables(
        &self,
        folder: Option<&WorkspaceFolder>,
        config: DebugConfig,
    ) -> Option<DebugConfig> {
        let Some(debug_type) = config.debug_type.clone() else {
            return Some(config);
        };
        let Some(debugger) = self.configuration_provider.get_debugger(&debug_type) else {
            return Some(config);
        };
        match debugger.substitute_variables(folder, config).await {
            // None propagates a user cancellation
            Ok(result) => result,
            Err(err) => {
                self.show_error(&err.to_string(), &[]).await;
                None
            }
        }
    }
}

/// Disambiguate a compound member across all known launch sources
fn resolve_compound_member(
    member: &CompoundMember,
    originating: Option<&Launch>,
    launches: &[Arc<Launch>],
    compound_name: &str,
) -> Result<Arc<Launch>> {
    match member {
        CompoundMember::Name(name) => {
            let containing: Vec<&Arc<Launch>> = launches
                .iter()
                .filter(|l| l.configuration(name).is_some())
                .collect();
            match containing.len() {
                0 => Err(Error::ConfigurationNotFound(name.clone())),
                1 => Ok(Arc::clone(containing[0])),
                _ => {
                    // prefer the launch source the compound came from
                    if let Some(originating) = originating {
                        if let Some(own) = containing
                            .iter()
                            .find(|l| l.root == originating.root)
                        {
                            return Ok(Arc::clone(own));
                        }
                    }
                    Err(Error::ConfigurationAmbiguous(name.clone()))
                }
            }
        }
        CompoundMember::Qualified { name, folder } => {
            let matching: Vec<&Arc<Launch>> = launches
                .iter()
                .filter(|l| {
                    l.root.as_ref().map(|r| r.name.as_str()) == Some(folder.as_str())
                        && l.configuration(name).is_some()
                })
                .collect();
            if matching.len() == 1 {
                Ok(Arc::clone(matching[0]))
            } else {
                Err(Error::CompoundFolderNotFound {
                    folder: folder.clone(),
                    name: name.clone(),
                    compound: compound_name.to_string(),
                })
            }
        }
    }
}
