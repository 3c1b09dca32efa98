//! Breakpoint and watch expression operations
//!
//! All edits go through the Model first, then propagate to whichever
//! sessions are live. Within one full propagation, exception filters are
//! delivered strictly after source and function breakpoints; some
//! adapters rely on that order.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;

use crate::common::Result;
use crate::model::breakpoints::{
    Breakpoint, BreakpointSelector, BreakpointUpdate, FunctionBreakpoint, RawBreakpoint,
    WatchExpression,
};
use crate::session::Session;

use super::DebugService;

impl DebugService {
    //---- source breakpoints

    /// Add source breakpoints and propagate the uri to every session
    pub async fn add_breakpoints(
        &self,
        uri: &str,
        raw_breakpoints: &[RawBreakpoint],
    ) -> Result<Vec<Breakpoint>> {
        let added = self.model().add_breakpoints(uri, raw_breakpoints);
        for bp in &added {
            self.workbench
                .status(&format!("Added breakpoint, line {}, file {}", bp.line, uri));
        }
        self.send_breakpoints(uri, false, None).await?;
        Ok(added)
    }

    /// Remove one breakpoint by id, or all of them, then propagate every
    /// affected uri
    pub async fn remove_breakpoints(&self, id: Option<&str>) -> Result<()> {
        let to_remove: Vec<Breakpoint> = self
            .model()
            .breakpoints()
            .into_iter()
            .filter(|bp| id.map_or(true, |id| bp.id() == id))
            .collect();
        for bp in &to_remove {
            self.workbench.status(&format!(
                "Removed breakpoint, line {}, file {}",
                bp.line, bp.uri
            ));
        }

        let mut affected_uris: Vec<String> = Vec::new();
        for bp in &to_remove {
            if !affected_uris.contains(&bp.uri) {
                affected_uris.push(bp.uri.clone());
            }
        }
        let ids: Vec<String> = to_remove.iter().map(|bp| bp.id().to_string()).collect();
        self.model().remove_breakpoints(&ids);

        for uri in &affected_uris {
            self.send_breakpoints(uri, false, None).await?;
        }
        Ok(())
    }

    /// Apply adapter-acknowledged data to existing breakpoints. With
    /// `defer_send` the uri is flushed on its next save instead of now.
    pub async fn update_breakpoints(
        &self,
        uri: &str,
        data: &HashMap<String, BreakpointUpdate>,
        defer_send: bool,
    ) -> Result<()> {
        self.model().update_breakpoints(data);
        if defer_send {
            self.breakpoints_to_send_on_resource_saved
                .lock()
                .unwrap()
                .insert(uri.to_string());
            Ok(())
        } else {
            self.send_breakpoints(uri, false, None).await
        }
    }

    /// Toggle one breakpoint (propagating only its kind), or every
    /// breakpoint of every kind (full propagation)
    pub async fn enable_or_disable_breakpoints(
        &self,
        enable: bool,
        breakpoint: Option<&BreakpointSelector>,
    ) -> Result<()> {
        match breakpoint {
            Some(selector) => {
                let source_uri = self.model().set_enablement(selector, enable);
                match selector {
                    BreakpointSelector::Source(_) => match source_uri {
                        Some(uri) => self.send_breakpoints(&uri, false, None).await,
                        None => Ok(()),
                    },
                    BreakpointSelector::Function(_) => self.send_function_breakpoints(None).await,
                    BreakpointSelector::Exception(_) => self.send_exception_breakpoints(None).await,
                }
            }
            None => {
                self.model().enable_or_disable_all_breakpoints(enable);
                self.send_all_breakpoints(None).await
            }
        }
    }

    /// Globally activate or deactivate breakpoints
    pub async fn set_breakpoints_activated(&self, activated: bool) -> Result<()> {
        self.model().set_breakpoints_activated(activated);
        self.send_all_breakpoints(None).await
    }

    /// A resource was saved; flush any deferred breakpoint send for it
    pub async fn notify_resource_saved(&self, uri: &str) -> Result<()> {
        let deferred = self
            .breakpoints_to_send_on_resource_saved
            .lock()
            .unwrap()
            .remove(uri);
        if deferred {
            self.send_breakpoints(uri, true, None).await?;
        }
        Ok(())
    }

    /// Resources were deleted; their breakpoints go away without
    /// propagation
    pub fn notify_resources_deleted(&self, uris: &[String]) {
        self.model().remove_breakpoints_for_uris(uris);
    }

    //---- function breakpoints

    /// Add a function breakpoint placeholder. It is propagated once it is
    /// named via [`DebugService::rename_function_breakpoint`].
    pub fn add_function_breakpoint(&self, name: &str, id: Option<&str>) -> FunctionBreakpoint {
        self.model().add_function_breakpoint(name, id)
    }

    pub async fn rename_function_breakpoint(&self, id: &str, new_name: &str) -> Result<()> {
        self.model().rename_function_breakpoint(id, new_name);
        self.send_function_breakpoints(None).await
    }

    /// Remove one function breakpoint by id, or all of them
    pub async fn remove_function_breakpoints(&self, id: Option<&str>) -> Result<()> {
        self.model().remove_function_breakpoints(id);
        self.send_function_breakpoints(None).await
    }

    //---- watch expressions

    pub fn add_watch_expression(&self, name: &str) -> WatchExpression {
        self.model().add_watch_expression(name)
    }

    pub fn rename_watch_expression(&self, id: &str, new_name: &str) {
        self.model().rename_watch_expression(id, new_name);
    }

    pub fn move_watch_expression(&self, id: &str, position: usize) {
        self.model().move_watch_expression(id, position);
    }

    pub fn remove_watch_expressions(&self, id: Option<&str>) {
        self.model().remove_watch_expressions(id);
    }

    //---- propagation

    /// Propagate every breakpoint kind to one session or all of them.
    /// Exception filters go last since some adapters rely on the order.
    pub async fn send_all_breakpoints(&self, session: Option<&Arc<Session>>) -> Result<()> {
        for uri in self.model().breakpoint_uris() {
            self.send_breakpoints(&uri, false, session).await?;
        }
        self.send_function_breakpoints(session).await?;
        self.send_exception_breakpoints(session).await
    }

    /// Replace the enabled breakpoints for one uri on the target session(s)
    pub(crate) async fn send_breakpoints(
        &self,
        uri: &str,
        source_modified: bool,
        session: Option<&Arc<Session>>,
    ) -> Result<()> {
        let to_send = self.model().breakpoints_filtered(Some(uri), true);
        let targets = self.target_sessions(session);
        let results = join_all(
            targets
                .iter()
                .map(|s| s.send_breakpoints(uri, &to_send, source_modified)),
        )
        .await;
        results.into_iter().collect::<Result<Vec<()>>>().map(|_| ())
    }

    /// Replace the function breakpoints on every capable target session
    pub(crate) async fn send_function_breakpoints(
        &self,
        session: Option<&Arc<Session>>,
    ) -> Result<()> {
        let to_send: Vec<FunctionBreakpoint> = {
            let model = self.model();
            if model.breakpoints_activated() {
                model
                    .function_breakpoints()
                    .into_iter()
                    .filter(|fbp| fbp.enabled)
                    .collect()
            } else {
                Vec::new()
            }
        };
        let targets = self.target_sessions(session);
        let results = join_all(
            targets
                .iter()
                .filter(|s| s.capabilities().supports_function_breakpoints)
                .map(|s| s.send_function_breakpoints(&to_send)),
        )
        .await;
        results.into_iter().collect::<Result<Vec<()>>>().map(|_| ())
    }

    /// Replace the enabled exception filters on the target session(s)
    pub(crate) async fn send_exception_breakpoints(
        &self,
        session: Option<&Arc<Session>>,
    ) -> Result<()> {
        let enabled: Vec<_> = self
            .model()
            .exception_filters()
            .into_iter()
            .filter(|f| f.enabled)
            .collect();
        let targets = self.target_sessions(session);
        let results = join_all(
            targets
                .iter()
                .map(|s| s.send_exception_breakpoints(&enabled)),
        )
        .await;
        results.into_iter().collect::<Result<Vec<()>>>().map(|_| ())
    }

    fn target_sessions(&self, session: Option<&Arc<Session>>) -> Vec<Arc<Session>> {
        match session {
            Some(session) => vec![Arc::clone(session)],
            None => self.model().sessions(),
        }
    }
}
