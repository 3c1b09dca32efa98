//! Error types for the debug orchestrator
//!
//! Every fallible step in the start/restart pipeline resolves to a boolean
//! rather than bubbling an error to siblings, so compound launches can
//! evaluate every member regardless of earlier failures. The variants here
//! describe why a single (sub)launch was blocked.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the debug orchestrator
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("There is already a debug configuration \"{0}\" running")]
    ConfigurationAlreadyRunning(String),

    #[error("Compound must have \"configurations\" attribute set in order to start multiple configurations")]
    CompoundMissingConfigurations,

    #[error("Could not find launch configuration '{0}' in the workspace")]
    ConfigurationNotFound(String),

    #[error("There are multiple launch configurations '{0}' in the workspace. Use folder name to qualify the configuration")]
    ConfigurationAmbiguous(String),

    #[error("Can not find folder with name '{folder}' for configuration '{name}' in compound '{compound}'")]
    CompoundFolderNotFound {
        folder: String,
        name: String,
        compound: String,
    },

    #[error("Configuration '{0}' is missing in the launch configuration")]
    ConfigurationMissing(String),

    #[error("No launch configuration file exists")]
    LaunchFileMissing,

    #[error("Attribute 'request' has an unsupported value '{0}' in the chosen debug configuration")]
    RequestNotSupported(String),

    #[error("Attribute 'request' is missing from the chosen debug configuration")]
    RequestMissing,

    #[error("Configured debug type '{0}' is not supported")]
    DebugTypeNotSupported(String),

    #[error("Missing property 'type' for the chosen launch configuration")]
    DebugTypeMissing,

    // === Task Errors ===
    #[error("Task '{0}' can not be referenced from a launch configuration that is in a different workspace folder")]
    InvalidTaskReference(String),

    #[error("Could not find the task '{0}'")]
    TaskNotFound(String),

    #[error("The task '{0}' cannot be tracked")]
    TaskNotTracked(String),

    #[error("Task '{name}' failed: {message}")]
    TaskFailed { name: String, message: String },

    // === Session/Adapter Errors ===
    #[error("{message}")]
    LaunchFailed {
        message: String,
        /// Adapter-supplied remediation action labels, surfaced with the error
        actions: Vec<String>,
    },

    /// User dismissed a prompt mid-launch. Never surfaced as a dialog.
    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Debug adapter error: {0}")]
    Adapter(String),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a launch failure carrying adapter-supplied remediation actions
    pub fn launch_failed(message: impl Into<String>, actions: Vec<String>) -> Self {
        Self::LaunchFailed {
            message: message.into(),
            actions,
        }
    }

    /// Create a task failure error
    pub fn task_failed(name: &str, message: &str) -> Self {
        Self::TaskFailed {
            name: name.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether this error represents a user cancellation (silent, no dialog)
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Remediation action labels attached to this error, if any
    pub fn actions(&self) -> &[String] {
        match self {
            Self::LaunchFailed { actions, .. } => actions,
            _ => &[],
        }
    }
}
