//! Connected-client handles and the matchmaking roster
//!
//! This module holds the server-side view of a remote player before and while
//! it takes part in a match:
//! - [`ClientHandle`] bundles a connection's identity, its outbound frame
//!   queue and the inbox its steering commands arrive on
//! - [`ClientLink`] is the send-only half the simulator keeps per player
//! - [`ClientManager`] is the capacity-bounded lobby of clients waiting for
//!   a match to fill up
//!
//! Dropping every handle of a connection closes it: the connection task sees
//! its outbound queue end and performs a graceful close.

use crate::player::CommandInbox;
use log::{debug, info};
use shared::ServerMessage;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// Frames queued for one connection's writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message(ServerMessage),
    /// Close the transport after everything queued before it was written.
    Close,
}

/// Send-only link to a connection.
#[derive(Debug, Clone)]
pub struct ClientLink {
    pub id: String,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl ClientLink {
    pub fn new(id: impl Into<String>, outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: id.into(),
            outbound,
        }
    }

    /// Queues a frame. Returns false once the connection is gone.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.outbound.send(Outbound::Message(message)).is_ok()
    }

    pub fn close(&self) {
        if self.outbound.send(Outbound::Close).is_err() {
            debug!("Client {} already disconnected", self.id);
        }
    }
}

/// Everything the session needs to seat a connected client in a match.
#[derive(Debug)]
pub struct ClientHandle {
    pub link: ClientLink,
    pub addr: SocketAddr,
    /// When the client connected, for lobby wait reporting
    pub connected_at: Instant,
    pub commands: CommandInbox,
}

impl ClientHandle {
    pub fn new(
        id: impl Into<String>,
        addr: SocketAddr,
        commands: CommandInbox,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            link: ClientLink::new(id, outbound),
            addr,
            connected_at: Instant::now(),
            commands,
        }
    }

    pub fn id(&self) -> &str {
        &self.link.id
    }

    pub fn send(&self, message: ServerMessage) -> bool {
        self.link.send(message)
    }

    pub fn close(&self) {
        self.link.close();
    }

    pub fn into_parts(self) -> (ClientLink, CommandInbox) {
        (self.link, self.commands)
    }
}

/// Lobby of clients waiting for a match
///
/// Clients are kept in arrival order, which becomes the player order of the
/// match they end up in. The manager never holds more than `max_clients`.
pub struct ClientManager {
    /// Waiting clients in arrival order
    clients: Vec<ClientHandle>,
    /// Number of clients that fills a match
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: Vec::with_capacity(max_clients),
            max_clients,
        }
    }

    /// Admits a client to the lobby
    ///
    /// Hands the client back if the lobby is already full or if a client with
    /// the same identity is waiting.
    pub fn add_client(&mut self, client: ClientHandle) -> Result<usize, ClientHandle> {
        if self.is_full() || self.contains(client.id()) {
            return Err(client);
        }

        info!(
            "Client {} from {} joined the lobby ({}/{})",
            client.id(),
            client.addr,
            self.clients.len() + 1,
            self.max_clients
        );
        self.clients.push(client);
        Ok(self.clients.len())
    }

    /// Removes a waiting client, returning its handle if it was present
    pub fn remove_client(&mut self, client_id: &str) -> Option<ClientHandle> {
        let index = self
            .clients
            .iter()
            .position(|client| client.id() == client_id)?;
        let client = self.clients.remove(index);
        info!(
            "Client {} left the lobby after {:?}",
            client.id(),
            client.connected_at.elapsed()
        );
        Some(client)
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.iter().any(|client| client.id() == client_id)
    }

    pub fn get(&self, client_id: &str) -> Option<&ClientHandle> {
        self.clients.iter().find(|client| client.id() == client_id)
    }

    /// Empties the lobby, returning the clients in arrival order
    pub fn take_all(&mut self) -> Vec<ClientHandle> {
        std::mem::take(&mut self.clients)
    }

    pub fn ids(&self) -> Vec<String> {
        self.clients
            .iter()
            .map(|client| client.id().to_string())
            .collect()
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
