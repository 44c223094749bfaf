//! # Relay Server Library
//!
//! This library provides the room broadcaster that keeps every connected game
//! client in sync. The server is deliberately thin: it never simulates
//! movement or projectiles, it only stores and fans out what clients report.
//!
//! ## Core Responsibilities
//!
//! ### Endpoint Routing
//! Each client opens three WebSocket connections, one per channel kind:
//! - `/ws/game/position/` carries player snapshots
//! - `/ws/game/bullets/` carries projectile spawn announcements
//! - `/ws/game/state/` carries miscellaneous game-state messages
//!
//! Connections to any other path are closed right after the handshake.
//!
//! ### Roster Broadcasting
//! The position room keeps the last-known snapshot of every player, keyed by
//! the sanitized player id. Every inbound update overwrites that player's
//! entry and the **entire** roster is sent back to all members, the sender
//! included. When a connection closes its entry is removed and the remaining
//! members receive the roster with a `player_left` notice.
//!
//! ### Verbatim Relay
//! Projectile and state frames are forwarded unchanged to every member of
//! their room. The server does not parse them.
//!
//! ## Architecture Design
//!
//! ### Task Per Connection
//! Every accepted socket gets a reader loop and a writer task joined by a
//! bounded queue. Broadcasts use non-blocking sends, so one slow client can
//! lose frames but can never stall a room.
//!
//! ### Shared Room State
//! All rooms live in one `RoomRegistry` behind an async `RwLock`. A room is
//! created by the first connection for its kind and destroyed when the last
//! one leaves, so an empty server holds no stale roster.
//!
//! ## Module Organization
//!
//! ### Room Module (`room`)
//! - Player id sanitization
//! - `BroadcastRoom` membership, roster table and fan-out
//! - `RoomRegistry` lifecycle and connection cap
//!
//! ### Network Module (`network`)
//! - TCP listener and WebSocket handshake
//! - Path-based routing to rooms
//! - Per-connection reader/writer tasks and cooperative shutdown
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     let shutdown = server.shutdown_handle();
//!
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         let _ = shutdown.send(());
//!     });
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod room;
