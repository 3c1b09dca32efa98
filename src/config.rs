//! Launch configuration types and the configuration provider seam
//!
//! Parsing the configuration file and substituting variables happen outside
//! the orchestrator; what arrives here are already-parsed values. A launch
//! source groups the configurations and compounds defined by one root
//! folder (or the workspace file).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adapter::SessionAdapter;
use crate::common::Result;

/// A root folder that may own launch configurations and sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFolder {
    /// Folder uri, used as the identity for session ownership
    pub uri: String,
    /// Display name, used to qualify compound members
    pub name: String,
}

/// One debug configuration, resolved or raw
///
/// Adapter-specific attributes are carried opaquely in `rest`; the
/// orchestrator only interprets the fields spelled out here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub debug_type: Option<String>,

    /// "launch" or "attach"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_debug: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_launch_task: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_debug_task: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_console_options: Option<crate::settings::PanelOpenBehavior>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Identifier of the out-of-process host this session runs in, if any.
    /// Sessions with a host id restart by signalling the host control
    /// channel instead of relaunching the adapter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,

    /// Internal marker set when an attach was initiated automatically
    #[serde(
        rename = "__autoAttach",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub auto_attach: bool,

    /// Internal marker carrying adapter-supplied restart data
    #[serde(rename = "__restart", skip_serializing_if = "Option::is_none")]
    pub restart_data: Option<Value>,

    /// All remaining adapter-specific attributes
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl DebugConfig {
    /// The configuration name, or an empty string for anonymous configs
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Whether this session runs inside an out-of-process host
    pub fn is_hosted(&self) -> bool {
        self.host_id.is_some()
    }
}

/// A member of a compound configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompoundMember {
    /// A plain configuration name, disambiguated across launch sources
    Name(String),
    /// A name qualified with the owning folder's name
    Qualified { name: String, folder: String },
}

impl CompoundMember {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Qualified { name, .. } => name,
        }
    }
}

/// A named group of configurations launched together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compound {
    pub name: String,
    /// Absent (as opposed to empty) means a malformed compound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configurations: Option<Vec<CompoundMember>>,
}

/// What a start request resolved to
#[derive(Debug, Clone)]
pub enum LaunchTarget {
    Single(DebugConfig),
    Compound(Compound),
}

/// The launch configurations contributed by one source
#[derive(Debug, Clone, Default)]
pub struct Launch {
    /// Owning root folder; `None` for workspace-level sources
    pub root: Option<WorkspaceFolder>,
    pub configurations: Vec<DebugConfig>,
    pub compounds: Vec<Compound>,
    /// Whether a configuration file backs this source
    pub exists: bool,
}

impl Launch {
    /// Look up a configuration by name
    pub fn configuration(&self, name: &str) -> Option<&DebugConfig> {
        self.configurations
            .iter()
            .find(|c| c.name.as_deref() == Some(name))
    }

    /// Look up a compound by name
    pub fn compound(&self, name: &str) -> Option<&Compound> {
        self.compounds.iter().find(|c| c.name == name)
    }

    /// Resolve a name to a single config or a compound.
    /// A name matching both resolves to the compound.
    pub fn target(&self, name: &str) -> Option<LaunchTarget> {
        if let Some(compound) = self.compound(name) {
            return Some(LaunchTarget::Compound(compound.clone()));
        }
        self.configuration(name)
            .map(|c| LaunchTarget::Single(c.clone()))
    }
}

/// A registered debugger for one debug type
#[async_trait]
pub trait DebuggerDescriptor: Send + Sync {
    /// The debug type this debugger handles
    fn debug_type(&self) -> &str;

    /// Substitute variables in a configuration.
    /// `Ok(None)` means the user cancelled an interactive substitution.
    async fn substitute_variables(
        &self,
        folder: Option<&WorkspaceFolder>,
        config: DebugConfig,
    ) -> Result<Option<DebugConfig>>;

    /// Create the per-session adapter handle for this debugger
    fn create_adapter(&self) -> Arc<dyn SessionAdapter>;
}

/// Resolves raw launch configuration and registered debuggers
#[async_trait]
pub trait ConfigurationProvider: Send + Sync {
    /// All known launch sources
    fn launches(&self) -> Vec<Arc<Launch>>;

    /// The launch source owned by the given root folder uri
    fn launch_for_root(&self, root_uri: &str) -> Option<Arc<Launch>>;

    /// Name of the configuration currently selected in the UI
    fn selected_configuration_name(&self) -> Option<String>;

    /// Guess a debugger from the current editor context
    async fn guess_debugger(&self) -> Option<Arc<dyn DebuggerDescriptor>>;

    /// Run the configuration through registered resolution providers.
    /// `Ok(None)` means a provider deliberately aborted the launch.
    async fn resolve_configuration_by_providers(
        &self,
        folder_uri: Option<&str>,
        debug_type: Option<&str>,
        config: DebugConfig,
    ) -> Result<Option<DebugConfig>>;

    /// The registered debugger for a debug type
    fn get_debugger(&self, debug_type: &str) -> Option<Arc<dyn DebuggerDescriptor>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_takes_precedence_over_config() {
        let launch = Launch {
            root: None,
            configurations: vec![DebugConfig {
                name: Some("shared".to_string()),
                ..Default::default()
            }],
            compounds: vec![Compound {
                name: "shared".to_string(),
                configurations: Some(vec![]),
            }],
            exists: true,
        };

        match launch.target("shared") {
            Some(LaunchTarget::Compound(_)) => {}
            other => panic!("expected compound, got {:?}", other.is_some()),
        }
    }

    #[test]
    fn test_compound_member_shapes_deserialize() {
        let members: Vec<CompoundMember> =
            serde_json::from_str(r#"["api", {"name": "web", "folder": "frontend"}]"#).unwrap();
        assert_eq!(members[0], CompoundMember::Name("api".to_string()));
        assert_eq!(members[1].name(), "web");
    }

    #[test]
    fn test_config_round_trips_unknown_attributes() {
        let raw = r#"{"name":"run","type":"node","request":"launch","program":"main.js"}"#;
        let config: DebugConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.rest.get("program"), Some(&Value::from("main.js")));

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back.get("program"), Some(&Value::from("main.js")));
        assert_eq!(back.get("type"), Some(&Value::from("node")));
    }
}
