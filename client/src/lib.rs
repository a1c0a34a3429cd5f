//! # Event Feed Client Library
//!
//! Observer-side helpers for the bridge's WebSocket event feed: connecting,
//! decoding each text frame back into a [`shared::Event`], and rendering
//! events as one-line summaries for terminals and chat bots.
//!
//! Frames that do not decode are surfaced as [`FeedItem::Undecodable`]
//! instead of ending the stream, so a newer bridge emitting an unknown event
//! type does not break older observers.

use futures_util::StreamExt;
use log::debug;
use shared::Event;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type FeedStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug)]
pub enum FeedItem {
    Event { raw: String, event: Event },
    Undecodable { raw: String, error: String },
}

impl FeedItem {
    pub fn raw(&self) -> &str {
        match self {
            FeedItem::Event { raw, .. } | FeedItem::Undecodable { raw, .. } => raw,
        }
    }
}

pub fn decode_frame(text: &str) -> FeedItem {
    match Event::from_json(text) {
        Ok(event) => FeedItem::Event {
            raw: text.to_string(),
            event,
        },
        Err(e) => FeedItem::Undecodable {
            raw: text.to_string(),
            error: e.to_string(),
        },
    }
}

pub struct FeedClient {
    stream: FeedStream,
}

impl FeedClient {
    pub async fn connect(url: &str) -> Result<Self, WsError> {
        let (stream, _) = tokio_tungstenite::connect_async(url).await?;
        Ok(Self { stream })
    }

    /// Next event from the feed, or `None` once the bridge closes it
    pub async fn next_item(&mut self) -> Option<Result<FeedItem, WsError>> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(Ok(decode_frame(&text))),
                Ok(Message::Close(_)) => return None,
                Ok(other) => debug!("Ignoring non-text frame: {:?}", other),
                Err(WsError::ConnectionClosed) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// One-line human readable summary of an event
pub fn describe(event: &Event) -> String {
    match event {
        Event::Chat {
            player,
            team,
            message,
            ..
        } => format!("[chat] {} (team {}): {}", player, team, message),
        Event::Join {
            player,
            previous_team: Some(previous),
            team,
            ..
        } => format!("[join] {} moved from team {} to team {}", player, previous, team),
        Event::Join { player, team, .. } => format!("[join] {} joined team {}", player, team),
        Event::Leave { player, .. } => format!("[leave] {} left the game", player),
        Event::Kill {
            killer,
            victim,
            weapon,
            ..
        } if killer.client_id == victim.client_id => {
            format!("[kill] {} killed themselves (weapon {})", killer.player, weapon)
        }
        Event::Kill {
            killer,
            victim,
            weapon,
            special,
        } => format!(
            "[kill] {} killed {} (weapon {}, special {})",
            killer.player, victim.player, weapon, special
        ),
        Event::Pickup { player, item, .. } => format!("[pickup] {} picked up item {}", player, item),
        Event::StartMatch {
            game_type,
            teamplay,
        } => format!(
            "[start_match] {} match started{}",
            game_type,
            if *teamplay != 0 { " (teamplay)" } else { "" }
        ),
        Event::Connect { client_id, address } => {
            format!("[connect] client {} entered from {}", client_id, address)
        }
    }
}
