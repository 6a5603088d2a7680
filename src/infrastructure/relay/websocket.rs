/// WebSocket relay transport
use super::{RelayConnector, RelayEnds, RelayLink};
use crate::domain::shared::SessionError;
use async_trait::async_trait;
use futures::{sink::SinkExt, stream::StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Connects to the relay over `ws://` or `wss://`
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketRelay;

impl WebSocketRelay {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RelayConnector for WebSocketRelay {
    async fn open(&self, url: &str) -> Result<RelayLink, SessionError> {
        info!("Connecting to relay at {}", url);

        let (socket, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| SessionError::RelayConnect(e.to_string()))?;

        info!("Relay channel open");

        let (mut sender, mut receiver) = socket.split();
        let (link, ends) = RelayLink::pair();
        let RelayEnds {
            mut outbound,
            inbound,
        } = ends;

        // Task to write session messages to the socket
        let mut send_task = tokio::spawn(async move {
            while let Some(text) = outbound.recv().await {
                if let Err(e) = sender.send(Message::Text(text)).await {
                    error!("Relay write failed: {}", e);
                    break;
                }
            }
            let _ = sender.close().await;
        });

        // Task to hand socket messages to the session
        let mut recv_task = tokio::spawn(async move {
            while let Some(result) = receiver.next().await {
                match result {
                    Ok(Message::Text(text)) => {
                        if inbound.send(text).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("Relay closed the channel");
                        break;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(_) => {
                        warn!("Ignoring non-text relay frame");
                    }
                    Err(e) => {
                        error!("Relay read failed: {}", e);
                        break;
                    }
                }
            }
        });

        tokio::spawn(async move {
            tokio::select! {
                _ = (&mut send_task) => recv_task.abort(),
                _ = (&mut recv_task) => send_task.abort(),
            }
            debug!("Relay transport tasks finished");
        });

        Ok(link)
    }
}
