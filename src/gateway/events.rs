use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::GatewayError;
use crate::models::presence::{Activity, Presence, PresenceStatus};

/// Opcodes for gateway messages.
pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const PRESENCE_UPDATE: u8 = 3;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Gateway message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub op: u8,
    /// Always serialized; heartbeats carry an explicit `null`.
    #[serde(default)]
    pub d: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayMessage {
    pub fn new(op: u8, d: Value) -> Self {
        Self {
            op,
            d,
            s: None,
            t: None,
        }
    }

    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::new(opcode::HEARTBEAT, json!(last_sequence))
    }

    pub fn identify(token: &str, status: PresenceStatus) -> Self {
        let data = IdentifyData {
            token: token.to_string(),
            properties: ClientProperties::default(),
            presence: IdentifyPresence {
                status,
                afk: false,
            },
        };
        Self::new(opcode::IDENTIFY, json!(data))
    }

    pub fn presence_update(presence: &Presence) -> Self {
        let data = PresenceUpdateData {
            since: 0,
            activities: vec![Activity::custom_status(&presence.custom_text)],
            status: presence.status,
            afk: false,
        };
        Self::new(opcode::PRESENCE_UPDATE, json!(data))
    }

    /// Heartbeat interval carried by a hello message.
    pub fn hello_interval(&self) -> Result<Duration, GatewayError> {
        if self.op != opcode::HELLO {
            return Err(GatewayError::Protocol(format!(
                "expected hello (op {}), got op {}",
                opcode::HELLO,
                self.op
            )));
        }
        let hello: HelloData = serde_json::from_value(self.d.clone())
            .map_err(|e| GatewayError::Protocol(format!("malformed hello payload: {e}")))?;
        if hello.heartbeat_interval == 0 {
            return Err(GatewayError::Protocol(
                "hello carried a zero heartbeat interval".to_string(),
            ));
        }
        Ok(Duration::from_millis(hello.heartbeat_interval))
    }
}

/// HELLO (opcode 10) payload data.
#[derive(Debug, Deserialize)]
pub struct HelloData {
    pub heartbeat_interval: u64,
}

/// Static client descriptor sent with IDENTIFY.
#[derive(Debug, Clone, Serialize)]
pub struct ClientProperties {
    #[serde(rename = "$os")]
    pub os: &'static str,
    #[serde(rename = "$browser")]
    pub browser: &'static str,
    #[serde(rename = "$device")]
    pub device: &'static str,
}

impl Default for ClientProperties {
    fn default() -> Self {
        Self {
            os: "Windows 10",
            browser: "Google Chrome",
            device: "Windows",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IdentifyPresence {
    pub status: PresenceStatus,
    pub afk: bool,
}

/// IDENTIFY (opcode 2) payload data.
#[derive(Debug, Serialize)]
pub struct IdentifyData {
    pub token: String,
    pub properties: ClientProperties,
    pub presence: IdentifyPresence,
}

/// PRESENCE_UPDATE (opcode 3) payload data.
#[derive(Debug, Serialize)]
pub struct PresenceUpdateData {
    pub since: u64,
    pub activities: Vec<Activity>,
    pub status: PresenceStatus,
    pub afk: bool,
}
