//! # Snake Arena Client Library
//!
//! A headless client for the snake arena server. It connects over WebSocket,
//! learns its player identity, waits in the lobby, and then steers its snake
//! with a simple bot until it is eliminated, rejected, or decides to quit.
//!
//! The server is authoritative and sends the whole board every tick, so the
//! client keeps no simulation of its own: the latest snapshot is the game.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Client-side view of the session:
//! - Assigned identity and lobby/match phase
//! - Latest snapshot and the player's own snake within it
//!
//! ### Bot Module (`bot`)
//! Steering policy that avoids walls and bodies and heads for the apple.
//!
//! ### Network Module (`network`)
//! WebSocket connection, frame decoding and the play loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080", None, Some(500));
//!     let summary = client.run().await?;
//!     println!("ended as {:?} after {} ticks", summary.phase, summary.ticks_seen);
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod game;
pub mod network;
