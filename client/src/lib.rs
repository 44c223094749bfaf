//! # Game Client Library
//!
//! This library provides the client side of the multiplayer shooter: a
//! fixed-step local simulation, three WebSocket channels to the relay server,
//! and the presentation layer that draws and sounds the result.
//!
//! ## Architecture Overview
//!
//! ### Client Authority
//! The client owns its player outright. Movement, firing and respawning are
//! simulated locally every tick and the resulting snapshot is published to
//! the relay. There is no server reconciliation: remote players are replicas
//! that jump to each roster the server sends.
//!
//! ### Split Hit Detection
//! Our own projectiles are hit-tested against remote replicas, which only
//! drives local feedback. Projectiles announced by peers are hit-tested
//! against the local player, and that damage is what the roster later
//! reports. Each victim is therefore the authority on its own health.
//!
//! ### Two Threads
//! The render/simulation loop runs on the main thread. All socket I/O runs
//! on a dedicated network thread with its own single-threaded tokio runtime.
//! The two meet only at non-blocking channel handles and the shared roster.
//!
//! ## Module Organization
//!
//! ### Channel Module (`channel`)
//! - One reconnecting WebSocket per channel kind
//! - Exponential backoff between attempts
//! - Outbound rate limit with latest-value-wins queueing
//!
//! ### Roster Module (`roster`)
//! - Remote replicas keyed by player id
//! - Pending projectile spawns from peers
//! - Inbound message handlers per channel
//!
//! ### Network Module (`network`)
//! - Network thread lifecycle
//! - Encoding of outbound snapshots and bullet spawns
//!
//! ### Game Module (`game`)
//! - Per-tick ordering of respawn, movement, weapon and projectiles
//! - Sound cues and gameplay events for the presentation layer
//!
//! ### Input, Presentation and Rendering
//! - Keyboard/mouse sampling into `InputFrame`s
//! - Animation selection, frame clock, camera and sound contracts
//! - macroquad drawing of map, players, projectiles and HUD
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::{ClientGame, GameConfig};
//! use client::network::{NetworkClient, NetworkConfig};
//! use shared::{get_timestamp, InputFrame, StaticGeometry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut game = ClientGame::with_seed("1234", StaticGeometry::default_arena(), GameConfig::default(), 1)?;
//! let network = NetworkClient::start(NetworkConfig::new("ws://127.0.0.1:8000"), "1234")?;
//!
//! let output = game.tick(&InputFrame::default(), network.roster(), get_timestamp())?;
//! network.send_position(&output.position)?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod game;
pub mod input;
pub mod network;
pub mod presentation;
pub mod rendering;
pub mod roster;
