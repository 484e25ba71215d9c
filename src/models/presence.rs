use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status broadcast alongside the custom activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Dnd,
    Idle,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Dnd => "dnd",
            PresenceStatus::Idle => "idle",
        }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresenceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(PresenceStatus::Online),
            "dnd" => Ok(PresenceStatus::Dnd),
            "idle" => Ok(PresenceStatus::Idle),
            other => Err(format!(
                "unknown presence status '{other}' (expected online, dnd or idle)"
            )),
        }
    }
}

/// Presence sent on every (re)identify. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub status: PresenceStatus,
    pub custom_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type")]
    pub activity_type: u8,
    pub state: String,
    pub id: String,
}

/// Activity type for a custom status.
pub const CUSTOM_ACTIVITY_TYPE: u8 = 4;

impl Activity {
    pub fn custom_status(text: &str) -> Self {
        Self {
            name: "Custom Status".to_string(),
            activity_type: CUSTOM_ACTIVITY_TYPE,
            state: text.to_string(),
            id: "custom".to_string(),
        }
    }
}
