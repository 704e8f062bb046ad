use crate::bot::Bot;
use crate::game::{ClientGameState, Phase};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{EventRequest, GameStatus, ServerMessage};
use thiserror::Error;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// How a client run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub id: Option<String>,
    pub phase: Phase,
    pub ticks_seen: u64,
    /// Snake length in the last snapshot we saw of ourselves
    pub final_size: Option<i32>,
}

/// Headless player: joins a match and steers with [`Bot`].
pub struct Client {
    server_url: String,
    state: ClientGameState,
    bot: Bot,
    /// Quit after this many snapshots
    max_ticks: Option<u64>,
}

impl Client {
    pub fn new(server: &str, seed: Option<u64>, max_ticks: Option<u64>) -> Self {
        let server_url = if server.starts_with("ws://") || server.starts_with("wss://") {
            server.to_string()
        } else {
            format!("ws://{}", server)
        };

        Self {
            server_url,
            state: ClientGameState::new(),
            bot: Bot::new(seed),
            max_ticks,
        }
    }

    pub fn state(&self) -> &ClientGameState {
        &self.state
    }

    /// Plays until the server closes the connection, we are eliminated or
    /// rejected, or `max_ticks` snapshots have been seen.
    pub async fn run(&mut self) -> Result<RunSummary, ClientError> {
        info!("Connecting to {}", self.server_url);
        let (ws_stream, _) = connect_async(self.server_url.as_str()).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let mut quit_sent = false;

        while let Some(frame) = ws_receiver.next().await {
            let text = match frame? {
                Message::Text(text) => text,
                Message::Close(_) => {
                    debug!("Server closed the connection");
                    break;
                }
                _ => continue,
            };

            let message = match ServerMessage::from_json(&text) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Ignoring unreadable frame: {}", e);
                    continue;
                }
            };
            let is_snapshot = message.status() == GameStatus::Ok && message.body().is_some();
            self.state.apply(message);

            if self.state.is_over() || quit_sent {
                debug!("Game over: {:?}", self.state.phase);
                continue;
            }

            if self.max_ticks.is_some_and(|max| self.state.ticks_seen >= max) {
                info!("Reached {} ticks, quitting", self.state.ticks_seen);
                let quit = serde_json::to_string(&EventRequest::quit())?;
                ws_sender.send(Message::Text(quit)).await?;
                quit_sent = true;
                continue;
            }

            if is_snapshot {
                self.steer(&mut ws_sender).await?;
            }
        }

        if let Err(e) = ws_sender.close().await {
            debug!("Close after disconnect failed: {}", e);
        }

        Ok(RunSummary {
            id: self.state.my_id.clone(),
            phase: self.state.phase.clone(),
            ticks_seen: self.state.ticks_seen,
            final_size: self.state.me().map(|me| me.size),
        })
    }

    async fn steer<S>(&mut self, sender: &mut S) -> Result<(), ClientError>
    where
        S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        let (Some(body), Some(me)) = (self.state.snapshot.as_ref(), self.state.me()) else {
            return Ok(());
        };

        let direction = self.bot.choose(body, me);
        if direction == me.direction {
            return Ok(());
        }

        debug!("Turning {:?} -> {:?}", me.direction, direction);
        let request = serde_json::to_string(&EventRequest::turn(direction))?;
        if let Err(e) = sender.send(Message::Text(request)).await {
            error!("Failed to send turn: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    #[test]
    fn test_url_gets_scheme() {
        let client = Client::new("127.0.0.1:8080", Some(1), None);
        assert_eq!(client.server_url, "ws://127.0.0.1:8080");

        let client = Client::new("ws://example.test:9000", Some(1), None);
        assert_eq!(client.server_url, "ws://example.test:9000");
    }

    #[test]
    fn test_new_client_starts_connecting() {
        let client = Client::new("127.0.0.1:8080", None, Some(10));
        assert_eq!(client.state().phase, Phase::Connecting);
        assert_eq!(client.state().ticks_seen, 0);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut client = Client::new(&addr.to_string(), None, Some(1));
        let error = assert_err!(client.run().await);
        assert!(matches!(error, ClientError::WebSocket(_)));
    }
}
