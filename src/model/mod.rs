//! Canonical debug state
//!
//! [`DebugModel`] owns breakpoints, function breakpoints, exception
//! filters, watch expressions, and the active sessions. It is mutated only
//! through orchestrator-invoked operations; sessions may acknowledge
//! breakpoint data, which updates existing entries but never creates new
//! identities.

pub mod breakpoints;
pub mod view;

use std::collections::HashMap;
use std::sync::Arc;

use breakpoints::{
    Breakpoint, BreakpointSelector, BreakpointUpdate, ExceptionBreakpointFilter,
    FunctionBreakpoint, RawBreakpoint, WatchExpression,
};

use crate::session::Session;

/// The canonical collection of debug state
pub struct DebugModel {
    sessions: Vec<Arc<Session>>,
    breakpoints: Vec<Breakpoint>,
    function_breakpoints: Vec<FunctionBreakpoint>,
    exception_filters: Vec<ExceptionBreakpointFilter>,
    watch_expressions: Vec<WatchExpression>,
    breakpoints_activated: bool,
}

impl DebugModel {
    pub fn new(
        breakpoints: Vec<Breakpoint>,
        breakpoints_activated: bool,
        function_breakpoints: Vec<FunctionBreakpoint>,
        exception_filters: Vec<ExceptionBreakpointFilter>,
        watch_expressions: Vec<WatchExpression>,
    ) -> Self {
        Self {
            sessions: Vec::new(),
            breakpoints,
            function_breakpoints,
            exception_filters,
            watch_expressions,
            breakpoints_activated,
        }
    }

    //---- sessions

    /// Active sessions in launch order
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.clone()
    }

    pub fn session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.iter().find(|s| s.id() == id).cloned()
    }

    pub fn add_session(&mut self, session: Arc<Session>) {
        self.sessions.push(session);
    }

    /// Remove a session. Called exactly once per session, when its adapter
    /// reports end-of-session.
    pub fn remove_session(&mut self, id: &str) -> Option<Arc<Session>> {
        let index = self.sessions.iter().position(|s| s.id() == id)?;
        Some(self.sessions.remove(index))
    }

    //---- source breakpoints

    /// All source breakpoints
    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.clone()
    }

    /// Breakpoints filtered by uri and enablement. `enabled_only` also
    /// honors the global activation flag.
    pub fn breakpoints_filtered(&self, uri: Option<&str>, enabled_only: bool) -> Vec<Breakpoint> {
        self.breakpoints
            .iter()
            .filter(|bp| uri.map_or(true, |uri| bp.uri == uri))
            .filter(|bp| !enabled_only || (self.breakpoints_activated && bp.enabled))
            .cloned()
            .collect()
    }

    /// Distinct uris across all breakpoints, in first-seen order
    pub fn breakpoint_uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = Vec::new();
        for bp in &self.breakpoints {
            if !uris.contains(&bp.uri) {
                uris.push(bp.uri.clone());
            }
        }
        uris
    }

    pub fn add_breakpoints(&mut self, uri: &str, raw: &[RawBreakpoint]) -> Vec<Breakpoint> {
        let added: Vec<Breakpoint> = raw.iter().map(|r| Breakpoint::new(uri, r)).collect();
        self.breakpoints.extend(added.iter().cloned());
        added
    }

    pub fn remove_breakpoints(&mut self, ids: &[String]) {
        self.breakpoints.retain(|bp| !ids.contains(&bp.id().to_string()));
    }

    /// Remove every breakpoint on the given uris (deleted resources)
    pub fn remove_breakpoints_for_uris(&mut self, uris: &[String]) {
        self.breakpoints.retain(|bp| !uris.contains(&bp.uri));
    }

    /// Apply adapter-acknowledged data to existing entries.
    /// Unknown ids are ignored. Returns the updated breakpoints.
    pub fn update_breakpoints(
        &mut self,
        data: &HashMap<String, BreakpointUpdate>,
    ) -> Vec<Breakpoint> {
        let mut updated = Vec::new();
        for bp in &mut self.breakpoints {
            if let Some(update) = data.get(bp.id()) {
                if let Some(line) = update.line {
                    bp.line = line;
                }
                if update.column.is_some() {
                    bp.column = update.column;
                }
                if let Some(verified) = update.verified {
                    bp.verified = verified;
                }
                if update.message.is_some() {
                    bp.message = update.message.clone();
                }
                if update.adapter_data.is_some() {
                    bp.adapter_data = update.adapter_data.clone();
                }
                updated.push(bp.clone());
            }
        }
        updated
    }

    /// Toggle one breakpoint. For source breakpoints, returns its uri so
    /// the caller can propagate. Unknown selectors are no-ops.
    pub fn set_enablement(&mut self, selector: &BreakpointSelector, enable: bool) -> Option<String> {
        match selector {
            BreakpointSelector::Source(id) => {
                let bp = self.breakpoints.iter_mut().find(|bp| bp.id() == id)?;
                bp.enabled = enable;
                Some(bp.uri.clone())
            }
            BreakpointSelector::Function(id) => {
                let fbp = self
                    .function_breakpoints
                    .iter_mut()
                    .find(|fbp| fbp.id() == id)?;
                fbp.enabled = enable;
                None
            }
            BreakpointSelector::Exception(filter) => {
                let exf = self
                    .exception_filters
                    .iter_mut()
                    .find(|exf| exf.filter == *filter)?;
                exf.enabled = enable;
                None
            }
        }
    }

    /// Toggle every breakpoint of every kind
    pub fn enable_or_disable_all_breakpoints(&mut self, enable: bool) {
        for bp in &mut self.breakpoints {
            bp.enabled = enable;
        }
        for fbp in &mut self.function_breakpoints {
            fbp.enabled = enable;
        }
        for exf in &mut self.exception_filters {
            exf.enabled = enable;
        }
    }

    pub fn breakpoints_activated(&self) -> bool {
        self.breakpoints_activated
    }

    pub fn set_breakpoints_activated(&mut self, activated: bool) {
        self.breakpoints_activated = activated;
    }

    //---- function breakpoints

    pub fn function_breakpoints(&self) -> Vec<FunctionBreakpoint> {
        self.function_breakpoints.clone()
    }

    pub fn add_function_breakpoint(&mut self, name: &str, id: Option<&str>) -> FunctionBreakpoint {
        let fbp = FunctionBreakpoint::new(name, id);
        self.function_breakpoints.push(fbp.clone());
        fbp
    }

    pub fn rename_function_breakpoint(&mut self, id: &str, new_name: &str) {
        if let Some(fbp) = self.function_breakpoints.iter_mut().find(|f| f.id() == id) {
            fbp.name = new_name.to_string();
        }
    }

    /// Remove one function breakpoint by id, or all of them
    pub fn remove_function_breakpoints(&mut self, id: Option<&str>) {
        match id {
            Some(id) => self.function_breakpoints.retain(|f| f.id() != id),
            None => self.function_breakpoints.clear(),
        }
    }

    //---- exception filters

    pub fn exception_filters(&self) -> Vec<ExceptionBreakpointFilter> {
        self.exception_filters.clone()
    }

    /// Replace the filter set, carrying over the enabled state of filters
    /// that survive by key
    pub fn set_exception_filters(&mut self, filters: Vec<ExceptionBreakpointFilter>) {
        self.exception_filters = filters
            .into_iter()
            .map(|mut f| {
                if let Some(existing) = self
                    .exception_filters
                    .iter()
                    .find(|e| e.filter == f.filter)
                {
                    f.enabled = existing.enabled;
                }
                f
            })
            .collect();
    }

    //---- watch expressions

    pub fn watch_expressions(&self) -> Vec<WatchExpression> {
        self.watch_expressions.clone()
    }

    pub fn add_watch_expression(&mut self, name: &str) -> WatchExpression {
        let we = WatchExpression::new(name, None);
        self.watch_expressions.push(we.clone());
        we
    }

    pub fn rename_watch_expression(&mut self, id: &str, new_name: &str) {
        if let Some(we) = self.watch_expressions.iter_mut().find(|w| w.id() == id) {
            we.name = new_name.to_string();
        }
    }

    /// Move a watch expression to a new position in the user-defined order
    pub fn move_watch_expression(&mut self, id: &str, position: usize) {
        if let Some(index) = self.watch_expressions.iter().position(|w| w.id() == id) {
            let we = self.watch_expressions.remove(index);
            let position = position.min(self.watch_expressions.len());
            self.watch_expressions.insert(position, we);
        }
    }

    /// Remove one watch expression by id, or all of them
    pub fn remove_watch_expressions(&mut self, id: Option<&str>) {
        match id {
            Some(id) => self.watch_expressions.retain(|w| w.id() != id),
            None => self.watch_expressions.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> DebugModel {
        DebugModel::new(Vec::new(), true, Vec::new(), Vec::new(), Vec::new())
    }

    #[test]
    fn test_add_breakpoints_creates_enabled_entries() {
        let mut model = model();
        let added = model.add_breakpoints(
            "file:///file.js",
            &[RawBreakpoint {
                line: 10,
                ..Default::default()
            }],
        );

        assert_eq!(added.len(), 1);
        let all = model.breakpoints();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].line, 10);
        assert!(all[0].enabled);
    }

    #[test]
    fn test_deactivated_breakpoints_filtered_out() {
        let mut model = model();
        model.add_breakpoints(
            "file:///a.js",
            &[RawBreakpoint {
                line: 1,
                ..Default::default()
            }],
        );

        assert_eq!(model.breakpoints_filtered(None, true).len(), 1);
        model.set_breakpoints_activated(false);
        assert_eq!(model.breakpoints_filtered(None, true).len(), 0);
        // the entries themselves survive deactivation
        assert_eq!(model.breakpoints().len(), 1);
    }

    #[test]
    fn test_acknowledgment_updates_but_never_creates() {
        let mut model = model();
        let added = model.add_breakpoints(
            "file:///a.js",
            &[RawBreakpoint {
                line: 5,
                ..Default::default()
            }],
        );

        let mut data = HashMap::new();
        data.insert(
            added[0].id().to_string(),
            BreakpointUpdate {
                line: Some(6),
                verified: Some(true),
                ..Default::default()
            },
        );
        data.insert("no-such-id".to_string(), BreakpointUpdate::default());

        let updated = model.update_breakpoints(&data);
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].line, 6);
        assert!(updated[0].verified);
        assert_eq!(model.breakpoints().len(), 1);
    }

    #[test]
    fn test_enable_all_covers_every_kind() {
        let mut model = model();
        model.add_breakpoints(
            "file:///a.js",
            &[RawBreakpoint {
                line: 1,
                enabled: Some(false),
                ..Default::default()
            }],
        );
        model.add_function_breakpoint("main", None);
        model.set_exception_filters(vec![ExceptionBreakpointFilter {
            filter: "uncaught".to_string(),
            label: "Uncaught Exceptions".to_string(),
            enabled: false,
        }]);

        model.enable_or_disable_all_breakpoints(true);
        assert!(model.breakpoints()[0].enabled);
        assert!(model.function_breakpoints()[0].enabled);
        assert!(model.exception_filters()[0].enabled);
    }

    #[test]
    fn test_move_watch_expression_clamps_position() {
        let mut model = model();
        let a = model.add_watch_expression("a");
        model.add_watch_expression("b");
        model.add_watch_expression("c");

        model.move_watch_expression(a.id(), 99);
        let names: Vec<String> = model
            .watch_expressions()
            .iter()
            .map(|w| w.name.clone())
            .collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }
}
