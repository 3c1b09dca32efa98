//! Out-of-process host control channel
//!
//! Some sessions debug code that runs inside another host process (for
//! example an extension host). Those hosts are controlled through an
//! addressable broadcast channel; the orchestrator only knows channel ids
//! and JSON payloads, never the transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Ask a host to reload in place (restart without relaunching the adapter)
pub const HOST_RELOAD_CHANNEL: &str = "host.reload";
/// Ask a host to shut down
pub const HOST_CLOSE_CHANNEL: &str = "host.close";
/// A host started in debug mode and wants the orchestrator to attach
pub const HOST_ATTACH_CHANNEL: &str = "host.attach";
/// A host-side debuggee terminated; the session should disconnect
pub const HOST_TERMINATE_CHANNEL: &str = "host.terminate";

/// One message on the host control channel
#[derive(Debug, Clone)]
pub struct HostMessage {
    pub channel: String,
    pub payload: Value,
}

/// Payload of [`HOST_ATTACH_CHANNEL`] messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostAttachPayload {
    /// Session the host belongs to
    pub debug_id: String,
    pub port: u16,
}

/// Payload of [`HOST_TERMINATE_CHANNEL`] messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostTerminatePayload {
    pub debug_id: String,
}

/// Addressable broadcast channel to out-of-process hosts
pub trait HostChannel: Send + Sync {
    /// Fire-and-forget send to every listener on a channel
    fn send(&self, channel: &str, payload: Value);

    /// Subscribe to inbound host messages
    fn subscribe(&self) -> broadcast::Receiver<HostMessage>;
}
