//! Debug session orchestrator
//!
//! Drives the interactive debugging workflow: resolving launch
//! configuration, running pre/post-launch build tasks, creating and
//! coordinating concurrent debug sessions (including compound multi-target
//! launches), propagating breakpoint state in the required order, and
//! managing restart/terminate/focus transitions.
//!
//! The adapter wire protocol, the task system, configuration parsing,
//! storage, and all UI rendering live behind the traits in [`adapter`],
//! [`tasks`], [`config`], [`storage`], [`workbench`], and [`host`].

pub mod adapter;
pub mod common;
pub mod config;
pub mod events;
pub mod host;
pub mod model;
pub mod service;
pub mod session;
pub mod settings;
pub mod storage;
pub mod tasks;
pub mod workbench;

// Re-export commonly used types
pub use common::{Error, Result};
pub use service::{ConfigOrName, DebugService, FocusEvent, State, TaskRunResult};
pub use session::Session;
