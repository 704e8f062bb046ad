//! # Snake Arena Server Library
//!
//! This library provides the authoritative server for a real-time multiplayer
//! snake game. Clients connect over WebSocket, wait in a lobby until a match
//! fills up, steer their snakes while the server simulates the arena at a fixed
//! tick rate, and receive a full snapshot of the board after every tick.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server owns the only copy of the board. Clients send nothing but
//! steering requests; movement, growth, apple placement and eliminations are
//! all decided here and broadcast as complete snapshots.
//!
//! ### Session Lifecycle
//! One game session runs per process and cycles through three phases:
//! - **Matchmaking**: connecting clients wait in a lobby and receive a
//!   waiting notice until the lobby reaches the match size
//! - **Ingame**: a match is simulated; further connections are rejected
//! - **Finished**: every player has left and the match task is winding down
//!
//! ### Orchestrator Hooks
//! A hosting platform is told when the server is ready, when it is allocated
//! to a match and when the match is over, and is pinged on a health interval.
//! Hook failures are fatal.
//!
//! ## Architecture Design
//!
//! ### Single Writer
//! Each match runs in its own task that exclusively owns the board and the
//! players. Connection tasks push commands into per-player channels which the
//! match drains at the start of each player's step, so no locking is needed
//! and every snapshot reflects a fully applied tick.
//!
//! ### Event-Driven Session
//! Connection tasks and the match report to a controller task through one
//! event channel. The controller owns the session state machine and is the
//! only place phase transitions happen.
//!
//! ## Module Organization
//!
//! ### Board Module (`board`)
//! The shared grid: cell ageing, apple placement and serialization.
//!
//! ### Player Module (`player`)
//! A snake's head state, spawning, initial body layout, steering and the
//! per-tick move with its collision rules. Also the per-player command inbox.
//!
//! ### Game Module (`game`)
//! The match simulator and its fixed-rate tick loop.
//!
//! ### Client Manager Module (`client_manager`)
//! Connection handles and the matchmaking lobby.
//!
//! ### Session Module (`session`)
//! The lifecycle state machine and its controller loop.
//!
//! ### Orchestrator Module (`orchestrator`)
//! Hosting-platform hooks and the health pinger.
//!
//! ### Network Module (`network`)
//! WebSocket accept loop and the per-connection bridge.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::GameConfig;
//! use server::network::{Server, ServerConfig};
//! use server::orchestrator::NopOrchestrator;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         addr: "127.0.0.1:8080".to_string(),
//!         game: GameConfig::default(),
//!         health_interval: Duration::from_secs(2),
//!     };
//!
//!     // Runs until a session or orchestrator failure
//!     let server = Server::bind(config, Arc::new(NopOrchestrator)).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod client_manager;
pub mod game;
pub mod network;
pub mod orchestrator;
pub mod player;
pub mod session;
