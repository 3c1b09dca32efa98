//! Breakpoint, exception filter, and watch expression types

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mint a process-unique identity string
pub(crate) fn generate_id() -> String {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    NEXT_ID.fetch_add(1, Ordering::Relaxed).to_string()
}

/// Caller-supplied data for a new source breakpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBreakpoint {
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Defaults to enabled when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
}

/// A source breakpoint, grouped by uri for propagation
#[derive(Debug, Clone)]
pub struct Breakpoint {
    id: String,
    pub uri: String,
    pub line: u32,
    pub column: Option<u32>,
    pub enabled: bool,
    pub condition: Option<String>,
    pub hit_condition: Option<String>,
    pub log_message: Option<String>,
    /// Opaque data supplied by the adapter through acknowledgments
    pub adapter_data: Option<Value>,
    /// Whether the adapter verified this breakpoint
    pub verified: bool,
    /// Adapter-supplied message (for example why it is unverified)
    pub message: Option<String>,
}

impl Breakpoint {
    pub(crate) fn new(uri: &str, raw: &RawBreakpoint) -> Self {
        Self {
            id: generate_id(),
            uri: uri.to_string(),
            line: raw.line,
            column: raw.column,
            enabled: raw.enabled.unwrap_or(true),
            condition: raw.condition.clone(),
            hit_condition: raw.hit_condition.clone(),
            log_message: raw.log_message.clone(),
            adapter_data: None,
            verified: false,
            message: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Adapter-acknowledged breakpoint data, applied to an existing entry.
/// Acknowledgments update entries; they never create new identities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter_data: Option<Value>,
}

/// A breakpoint on a function name
#[derive(Debug, Clone)]
pub struct FunctionBreakpoint {
    id: String,
    pub name: String,
    pub enabled: bool,
    pub condition: Option<String>,
    pub hit_condition: Option<String>,
    pub log_message: Option<String>,
}

impl FunctionBreakpoint {
    pub(crate) fn new(name: &str, id: Option<&str>) -> Self {
        Self {
            id: id.map(str::to_string).unwrap_or_else(generate_id),
            name: name.to_string(),
            enabled: true,
            condition: None,
            hit_condition: None,
            log_message: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// An adapter-defined exception filter toggle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionBreakpointFilter {
    /// Filter key understood by the adapter
    pub filter: String,
    pub label: String,
    pub enabled: bool,
}

/// A watched expression, kept in user-defined order
#[derive(Debug, Clone)]
pub struct WatchExpression {
    id: String,
    pub name: String,
}

impl WatchExpression {
    pub(crate) fn new(name: &str, id: Option<&str>) -> Self {
        Self {
            id: id.map(str::to_string).unwrap_or_else(generate_id),
            name: name.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Selects one breakpoint of a specific kind for enable/disable
#[derive(Debug, Clone)]
pub enum BreakpointSelector {
    /// A source breakpoint, by id
    Source(String),
    /// A function breakpoint, by id
    Function(String),
    /// An exception filter, by filter key
    Exception(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_breakpoint_defaults_to_enabled() {
        let bp = Breakpoint::new(
            "file:///a.js",
            &RawBreakpoint {
                line: 10,
                ..Default::default()
            },
        );
        assert!(bp.enabled);
        assert!(!bp.verified);
        assert_eq!(bp.line, 10);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Breakpoint::new("file:///a.js", &RawBreakpoint::default());
        let b = Breakpoint::new("file:///a.js", &RawBreakpoint::default());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_function_breakpoint_keeps_supplied_id() {
        let fbp = FunctionBreakpoint::new("main", Some("42"));
        assert_eq!(fbp.id(), "42");
    }
}
