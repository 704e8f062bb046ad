//! WebSocket front end: accepts connections and bridges them to the session
//!
//! Every connection runs in its own task. It assigns the player identity,
//! forwards decoded commands to the simulator through the player's command
//! channel, and writes whatever the session or the simulator queues for it.
//! A single controller task owns the [`Session`] and consumes the events the
//! connection tasks and the running match produce.

use crate::client_manager::{ClientHandle, Outbound};
use crate::game::GameConfig;
use crate::orchestrator::{run_health_pings, Orchestrator, OrchestratorError};
use crate::player::CommandInbox;
use crate::session::{run_session, Session, SessionError, SessionEvent};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{decode_command, Command, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use uuid::Uuid;

/// How long a server-initiated close waits for the peer's close frame.
pub const CLOSE_GRACE: Duration = Duration::from_millis(300);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on, `host:port`
    pub addr: String,
    pub game: GameConfig,
    pub health_interval: Duration,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session failed: {0}")]
    Session(#[from] SessionError),
    #[error("orchestrator failed: {0}")]
    Orchestrator(#[from] OrchestratorError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Why a connection loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disconnect {
    /// Client sent quit
    Quit,
    /// Server asked to close, or every handle to the connection was dropped
    ServerClose,
    /// Peer closed or the transport failed
    PeerGone,
}

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    orchestrator: Arc<dyn Orchestrator>,
}

impl Server {
    pub async fn bind(
        config: ServerConfig,
        orchestrator: Arc<dyn Orchestrator>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            config,
            orchestrator,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the session or the health pinger fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            config,
            orchestrator,
        } = self;

        orchestrator.ready()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Session::new(config.game.clone(), orchestrator.clone(), events_tx.clone());
        let mut controller = tokio::spawn(run_session(session, events_rx));
        let mut health = tokio::spawn(run_health_pings(
            orchestrator.clone(),
            config.health_interval,
        ));

        info!(
            "Server ready: {}x{} board, {} players per match, {:?} ticks",
            config.game.width,
            config.game.height,
            config.game.match_size,
            config.game.tick_interval
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            tokio::spawn(handle_connection(stream, addr, events_tx.clone()));
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                },

                result = &mut controller => {
                    health.abort();
                    result??;
                    info!("Session controller stopped");
                    return Ok(());
                },

                result = &mut health => {
                    controller.abort();
                    result??;
                    return Ok(());
                },
            }
        }
    }
}

/// Runs one client connection from handshake to close.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let id = Uuid::new_v4().to_string();
    info!("Client {} connected from {}", id, addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (command_tx, inbox) = CommandInbox::channel();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

    let client = ClientHandle::new(id.clone(), addr, inbox, outbound_tx);
    // Queued ahead of anything the session sends, so the client learns its
    // identity first.
    client.send(ServerMessage::init(&id));
    if events.send(SessionEvent::ClientConnect(client)).is_err() {
        error!("Session is gone; dropping client {}", id);
        return;
    }

    let reason = loop {
        tokio::select! {
            frame = ws_receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match decode_command(&text) {
                        Ok(Command::Quit) => {
                            if command_tx.send(Command::Quit).is_err() {
                                debug!("Client {} quit outside a match", id);
                            }
                            break Disconnect::Quit;
                        }
                        Ok(command) => {
                            if command_tx.send(command).is_err() {
                                debug!("Client {} is not in a match; command dropped", id);
                            }
                        }
                        Err(e) => {
                            warn!("Dropping malformed frame from {}: {}", id, e);
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break Disconnect::PeerGone,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Transport error from {}: {}", id, e);
                        break Disconnect::PeerGone;
                    }
                }
            },

            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(Outbound::Message(message)) => {
                        if let Err(e) = send_message(&mut ws_sender, &message).await {
                            warn!("Failed to send to {}: {}", id, e);
                            break Disconnect::PeerGone;
                        }
                    }
                    Some(Outbound::Close) | None => break Disconnect::ServerClose,
                }
            },
        }
    };

    match reason {
        Disconnect::Quit | Disconnect::ServerClose => {
            close_gracefully(&mut ws_sender, &mut ws_receiver).await;
        }
        Disconnect::PeerGone => {
            // flushes the close reply if the peer started the handshake
            if let Err(e) = ws_sender.close().await {
                debug!("Close after peer left failed for {}: {}", id, e);
            }
        }
    }

    info!("Client {} disconnected ({:?})", id, reason);
    if events.send(SessionEvent::ClientFinish { id }).is_err() {
        debug!("Session gone before disconnect was reported");
    }
}

async fn send_message(
    sender: &mut WsSink,
    message: &ServerMessage,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let text = message.to_json()?;
    sender.send(Message::Text(text)).await?;
    Ok(())
}

/// Sends a close frame and waits briefly for the peer to answer.
async fn close_gracefully(sender: &mut WsSink, receiver: &mut WsSource) {
    if sender.send(Message::Close(None)).await.is_err() {
        return;
    }

    let acknowledged = timeout(CLOSE_GRACE, async {
        while let Some(Ok(frame)) = receiver.next().await {
            if frame.is_close() {
                break;
            }
        }
    })
    .await;

    if acknowledged.is_err() {
        debug!("Peer did not answer close within {:?}", CLOSE_GRACE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::NopOrchestrator;

    fn test_config() -> ServerConfig {
        ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            game: GameConfig::default(),
            health_interval: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = Server::bind(test_config(), Arc::new(NopOrchestrator))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_invalid_address_fails() {
        let mut config = test_config();
        config.addr = "not-an-address".to_string();

        let result = Server::bind(config, Arc::new(NopOrchestrator)).await;
        assert!(matches!(result, Err(ServerError::Io(_))));
    }

    #[tokio::test]
    async fn test_unanswered_close_times_out() {
        use crate::session::EventKind;
        use tokio_tungstenite::client_async;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let (stream, peer_addr) = listener.accept().await.unwrap();
            handle_connection(stream, peer_addr, events_tx).await;
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut peer, _) = client_async(format!("ws://{}", addr), stream).await.unwrap();
        assert!(matches!(peer.next().await, Some(Ok(Message::Text(_)))));

        let connect = events_rx.recv().await.unwrap();
        assert_eq!(connect.kind(), EventKind::ClientConnect);

        // the peer stops reading after its quit, so the server's close frame
        // is never answered
        let started = std::time::Instant::now();
        peer.send(Message::Text(r#"{"eventtype":1}"#.to_string()))
            .await
            .unwrap();

        let finish = timeout(CLOSE_GRACE + Duration::from_secs(2), events_rx.recv())
            .await
            .expect("connection task never reported the disconnect")
            .unwrap();
        let waited = started.elapsed();

        assert_eq!(finish.kind(), EventKind::ClientFinish);
        assert!(waited >= CLOSE_GRACE, "closed after only {:?}", waited);
        drop(peer);
    }

    #[tokio::test]
    async fn test_ready_failure_stops_server() {
        use crate::orchestrator::tests::RecordingOrchestrator;

        let server = Server::bind(
            test_config(),
            Arc::new(RecordingOrchestrator::failing("ready")),
        )
        .await
        .unwrap();

        let result = server.run().await;
        assert!(matches!(result, Err(ServerError::Orchestrator(_))));
    }

    #[tokio::test]
    async fn test_health_failure_stops_server() {
        use crate::orchestrator::tests::RecordingOrchestrator;

        let mut config = test_config();
        config.health_interval = Duration::from_millis(10);
        let server = Server::bind(config, Arc::new(RecordingOrchestrator::failing("health")))
            .await
            .unwrap();

        let result = timeout(Duration::from_secs(5), server.run()).await.unwrap();
        assert!(matches!(result, Err(ServerError::Orchestrator(_))));
    }
}
