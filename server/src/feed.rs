//! WebSocket event feed
//!
//! Every accepted peer is one delivery session: it subscribes to the hub,
//! forwards each serialized event as a text frame and unsubscribes when the
//! peer goes away.

use crate::hub::EventHub;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

pub async fn serve(listener: TcpListener, hub: Arc<EventHub>) -> io::Result<()> {
    info!("Event feed listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        let hub = Arc::clone(&hub);

        tokio::spawn(async move {
            if let Err(e) = run_session(stream, peer, hub).await {
                warn!("Feed session for {} ended with error: {}", peer, e);
            }
        });
    }
}

/// Pushes events to one peer until it disconnects
pub async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    hub: Arc<EventHub>,
) -> Result<(), WsError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut incoming) = ws.split();

    let mut subscription = hub.subscribe().await;
    info!("Feed subscriber {} connected from {}", subscription.id(), peer);

    let result = loop {
        tokio::select! {
            message = subscription.recv() => match message {
                Some(message) => {
                    if let Err(e) = sink.send(Message::Text(message.to_string())).await {
                        break Err(e);
                    }
                }
                None => break Ok(()),
            },
            frame = incoming.next() => match frame {
                None | Some(Ok(Message::Close(_))) => break Ok(()),
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed)) => break Ok(()),
                Some(Err(e)) => break Err(e),
            },
        }
    };

    hub.unsubscribe(subscription.id()).await;
    info!("Feed subscriber {} disconnected", subscription.id());

    result
}
