//! Breakpoint state persistence
//!
//! Breakpoints, function breakpoints, exception filters, and watch
//! expressions survive restarts through the scoped key/value store.
//! Malformed stored JSON yields an empty collection, silently. Empty
//! collections remove their key instead of storing an empty array.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::breakpoints::{
    Breakpoint, ExceptionBreakpointFilter, FunctionBreakpoint, RawBreakpoint, WatchExpression,
};
use crate::model::DebugModel;
use crate::storage::{Storage, StorageScope};

const DEBUG_BREAKPOINTS_KEY: &str = "debug.breakpoint";
const DEBUG_BREAKPOINTS_ACTIVATED_KEY: &str = "debug.breakpointactivated";
const DEBUG_FUNCTION_BREAKPOINTS_KEY: &str = "debug.functionbreakpoint";
const DEBUG_EXCEPTION_BREAKPOINTS_KEY: &str = "debug.exceptionbreakpoint";
const DEBUG_WATCH_EXPRESSIONS_KEY: &str = "debug.watchexpressions";

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedBreakpoint {
    uri: String,
    line_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    column: Option<u32>,
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hit_condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    adapter_data: Option<Value>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedFunctionBreakpoint {
    name: String,
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    hit_condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_message: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct PersistedWatchExpression {
    name: String,
    id: String,
}

pub(crate) fn load_breakpoints(storage: &dyn Storage) -> Vec<Breakpoint> {
    let raw = storage.get(DEBUG_BREAKPOINTS_KEY, StorageScope::Workspace, "[]");
    let persisted: Vec<PersistedBreakpoint> = serde_json::from_str(&raw).unwrap_or_default();
    persisted
        .into_iter()
        .map(|p| {
            let mut bp = Breakpoint::new(
                &p.uri,
                &RawBreakpoint {
                    line: p.line_number,
                    column: p.column,
                    enabled: Some(p.enabled),
                    condition: p.condition,
                    hit_condition: p.hit_condition,
                    log_message: p.log_message,
                },
            );
            bp.adapter_data = p.adapter_data;
            bp
        })
        .collect()
}

pub(crate) fn load_breakpoints_activated(storage: &dyn Storage) -> bool {
    storage.get(DEBUG_BREAKPOINTS_ACTIVATED_KEY, StorageScope::Workspace, "true") != "false"
}

pub(crate) fn load_function_breakpoints(storage: &dyn Storage) -> Vec<FunctionBreakpoint> {
    let raw = storage.get(DEBUG_FUNCTION_BREAKPOINTS_KEY, StorageScope::Workspace, "[]");
    let persisted: Vec<PersistedFunctionBreakpoint> =
        serde_json::from_str(&raw).unwrap_or_default();
    persisted
        .into_iter()
        .map(|p| {
            let mut fbp = FunctionBreakpoint::new(&p.name, None);
            fbp.enabled = p.enabled;
            fbp.hit_condition = p.hit_condition;
            fbp.condition = p.condition;
            fbp.log_message = p.log_message;
            fbp
        })
        .collect()
}

pub(crate) fn load_exception_filters(storage: &dyn Storage) -> Vec<ExceptionBreakpointFilter> {
    let raw = storage.get(DEBUG_EXCEPTION_BREAKPOINTS_KEY, StorageScope::Workspace, "[]");
    serde_json::from_str(&raw).unwrap_or_default()
}

pub(crate) fn load_watch_expressions(storage: &dyn Storage) -> Vec<WatchExpression> {
    let raw = storage.get(DEBUG_WATCH_EXPRESSIONS_KEY, StorageScope::Workspace, "[]");
    let persisted: Vec<PersistedWatchExpression> = serde_json::from_str(&raw).unwrap_or_default();
    persisted
        .into_iter()
        .map(|p| WatchExpression::new(&p.name, Some(&p.id)))
        .collect()
}

/// Store a collection, or remove its key when the collection is empty
fn store_or_remove<T: Serialize>(storage: &dyn Storage, key: &str, items: &[T]) {
    if items.is_empty() {
        storage.remove(key, StorageScope::Workspace);
    } else if let Ok(json) = serde_json::to_string(items) {
        storage.store(key, &json, StorageScope::Workspace);
    }
}

pub(crate) fn save_state(model: &DebugModel, storage: &dyn Storage) {
    let breakpoints: Vec<PersistedBreakpoint> = model
        .breakpoints()
        .into_iter()
        .map(|bp| PersistedBreakpoint {
            uri: bp.uri.clone(),
            line_number: bp.line,
            column: bp.column,
            enabled: bp.enabled,
            condition: bp.condition.clone(),
            hit_condition: bp.hit_condition.clone(),
            log_message: bp.log_message.clone(),
            adapter_data: bp.adapter_data.clone(),
        })
        .collect();
    store_or_remove(storage, DEBUG_BREAKPOINTS_KEY, &breakpoints);

    // activation defaults to true, so only the deactivated state is stored
    if !model.breakpoints_activated() {
        storage.store(DEBUG_BREAKPOINTS_ACTIVATED_KEY, "false", StorageScope::Workspace);
    } else {
        storage.remove(DEBUG_BREAKPOINTS_ACTIVATED_KEY, StorageScope::Workspace);
    }

    let function_breakpoints: Vec<PersistedFunctionBreakpoint> = model
        .function_breakpoints()
        .into_iter()
        .map(|fbp| PersistedFunctionBreakpoint {
            name: fbp.name.clone(),
            enabled: fbp.enabled,
            hit_condition: fbp.hit_condition.clone(),
            condition: fbp.condition.clone(),
            log_message: fbp.log_message.clone(),
        })
        .collect();
    store_or_remove(storage, DEBUG_FUNCTION_BREAKPOINTS_KEY, &function_breakpoints);

    let exception_filters = model.exception_filters();
    store_or_remove(storage, DEBUG_EXCEPTION_BREAKPOINTS_KEY, &exception_filters);

    let watch_expressions: Vec<PersistedWatchExpression> = model
        .watch_expressions()
        .into_iter()
        .map(|we| PersistedWatchExpression {
            name: we.name.clone(),
            id: we.id().to_string(),
        })
        .collect();
    store_or_remove(storage, DEBUG_WATCH_EXPRESSIONS_KEY, &watch_expressions);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemStorage {
        values: Mutex<HashMap<String, String>>,
    }

    impl Storage for MemStorage {
        fn get(&self, key: &str, _scope: StorageScope, default: &str) -> String {
            self.values
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        }

        fn store(&self, key: &str, value: &str, _scope: StorageScope) {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }

        fn remove(&self, key: &str, _scope: StorageScope) {
            self.values.lock().unwrap().remove(key);
        }
    }

    impl MemStorage {
        fn contains(&self, key: &str) -> bool {
            self.values.lock().unwrap().contains_key(key)
        }
    }

    #[test]
    fn test_breakpoint_round_trip() {
        let storage = MemStorage::default();
        storage.store(
            DEBUG_BREAKPOINTS_KEY,
            r#"[{"uri":"a.js","lineNumber":5,"column":1,"enabled":true}]"#,
            StorageScope::Workspace,
        );

        let loaded = load_breakpoints(&storage);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].uri, "a.js");
        assert_eq!(loaded[0].line, 5);
        assert_eq!(loaded[0].column, Some(1));
        assert!(loaded[0].enabled);

        let model = DebugModel::new(loaded, true, Vec::new(), Vec::new(), Vec::new());
        save_state(&model, &storage);
        let reloaded = load_breakpoints(&storage);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].line, 5);
    }

    #[test]
    fn test_empty_collections_remove_keys() {
        let storage = MemStorage::default();
        storage.store(DEBUG_BREAKPOINTS_KEY, "[]", StorageScope::Workspace);
        storage.store(DEBUG_WATCH_EXPRESSIONS_KEY, r#"[{"name":"x","id":"1"}]"#, StorageScope::Workspace);

        let model = DebugModel::new(Vec::new(), true, Vec::new(), Vec::new(), Vec::new());
        save_state(&model, &storage);

        assert!(!storage.contains(DEBUG_BREAKPOINTS_KEY));
        assert!(!storage.contains(DEBUG_WATCH_EXPRESSIONS_KEY));
        assert!(!storage.contains(DEBUG_BREAKPOINTS_ACTIVATED_KEY));
    }

    #[test]
    fn test_deactivated_flag_is_stored() {
        let storage = MemStorage::default();
        let model = DebugModel::new(Vec::new(), false, Vec::new(), Vec::new(), Vec::new());
        save_state(&model, &storage);

        assert_eq!(
            storage.get(DEBUG_BREAKPOINTS_ACTIVATED_KEY, StorageScope::Workspace, "true"),
            "false"
        );
        assert!(!load_breakpoints_activated(&storage));
    }

    #[test]
    fn test_malformed_storage_yields_empty_collections() {
        let storage = MemStorage::default();
        storage.store(DEBUG_BREAKPOINTS_KEY, "{not json", StorageScope::Workspace);
        storage.store(DEBUG_EXCEPTION_BREAKPOINTS_KEY, "42", StorageScope::Workspace);

        assert!(load_breakpoints(&storage).is_empty());
        assert!(load_exception_filters(&storage).is_empty());
    }
}
