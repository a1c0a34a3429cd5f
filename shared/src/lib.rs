//! Event model shared by the bridge server and feed clients.
//!
//! Every console log line of interest becomes one [`Event`]. Events are
//! serialized as flat JSON objects with a `type` discriminator, e.g.
//! `{"type":"chat","client_id":3,"team":0,"player":"Foo","message":"hi"}`.

use serde::{Deserialize, Serialize};

pub mod parser;

pub use parser::parse_line;

/// A player as referenced inside a kill record
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerRef {
    pub client_id: i64,
    pub team: i64,
    pub player: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Chat {
        client_id: i64,
        team: i64,
        player: String,
        message: String,
    },
    Join {
        client_id: i64,
        player: String,
        /// Only present when the line used the `A->B` team change form
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_team: Option<i64>,
        team: i64,
    },
    Leave {
        client_id: i64,
        player: String,
    },
    Kill {
        killer: PlayerRef,
        victim: PlayerRef,
        weapon: i64,
        special: i64,
    },
    Pickup {
        client_id: i64,
        player: String,
        item: i64,
    },
    StartMatch {
        game_type: String,
        teamplay: i64,
    },
    /// `client_id` stays raw text here, unlike every other variant.
    /// Downstream consumers rely on it being a string.
    Connect {
        client_id: String,
        address: String,
    },
}

impl Event {
    /// The `type` tag this event serializes with
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Chat { .. } => "chat",
            Event::Join { .. } => "join",
            Event::Leave { .. } => "leave",
            Event::Kill { .. } => "kill",
            Event::Pickup { .. } => "pickup",
            Event::StartMatch { .. } => "start_match",
            Event::Connect { .. } => "connect",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
