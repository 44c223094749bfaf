//! Network context hosting the three game channels
//!
//! `NetworkClient::start` spawns one OS thread running a single-threaded
//! tokio runtime that drives the position, projectile and state channels.
//! The simulation thread talks to it only through non-blocking channel
//! handles and reads remote players from the shared `RosterSync`.

use crate::channel::{channel, ChannelConfig, ChannelHandle, ChannelState, MessageHandler, SendStatus};
use crate::roster::{PositionHandler, ProjectileHandler, RosterSync, StateHandler};
use log::{info, warn};
use shared::protocol::encode;
use shared::{BulletMessage, ChannelKind, PlayerSnapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("failed to start network runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Per-kind channel settings for one client
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub position: ChannelConfig,
    pub projectile: ChannelConfig,
    pub state: ChannelConfig,
}

impl NetworkConfig {
    /// Default timings against a server base URL such as `ws://127.0.0.1:8000`
    pub fn new(base_url: &str) -> Self {
        Self {
            position: ChannelConfig::for_kind(base_url, ChannelKind::Position),
            projectile: ChannelConfig::for_kind(base_url, ChannelKind::Projectile),
            state: ChannelConfig::for_kind(base_url, ChannelKind::State),
        }
    }
}

pub struct NetworkClient {
    position: ChannelHandle,
    projectile: ChannelHandle,
    state: ChannelHandle,
    roster: RosterSync,
    stop: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl NetworkClient {
    /// Starts the network thread and begins connecting all three channels
    pub fn start(config: NetworkConfig, local_id: &str) -> Result<Self, NetworkError> {
        let roster = RosterSync::new(local_id);
        let stop = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, _) = broadcast::channel(1);

        let position_handler: Arc<dyn MessageHandler> = Arc::new(PositionHandler::new(roster.clone()));
        let projectile_handler: Arc<dyn MessageHandler> = Arc::new(ProjectileHandler::new(roster.clone()));
        let state_handler: Arc<dyn MessageHandler> = Arc::new(StateHandler);

        let (position, position_task) = channel(config.position, position_handler, Arc::clone(&stop));
        let (projectile, projectile_task) =
            channel(config.projectile, projectile_handler, Arc::clone(&stop));
        let (state, state_task) = channel(config.state, state_handler, Arc::clone(&stop));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let receivers = (
            shutdown_tx.subscribe(),
            shutdown_tx.subscribe(),
            shutdown_tx.subscribe(),
        );

        let thread = std::thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    tokio::join!(
                        position_task.run(receivers.0),
                        projectile_task.run(receivers.1),
                        state_task.run(receivers.2),
                    );
                });
            })?;

        info!("Network started for player {}", local_id);
        Ok(Self {
            position,
            projectile,
            state,
            roster,
            stop,
            shutdown_tx,
            thread: Some(thread),
        })
    }

    pub fn send_position(&self, snapshot: &PlayerSnapshot) -> Result<SendStatus, NetworkError> {
        Ok(self.position.send(encode(snapshot)?))
    }

    pub fn send_bullet(&self, message: &BulletMessage) -> Result<SendStatus, NetworkError> {
        Ok(self.projectile.send(encode(message)?))
    }

    /// Sends an arbitrary payload on the generic state channel
    pub fn send_state(&self, payload: String) -> SendStatus {
        self.state.send(payload)
    }

    pub fn roster(&self) -> &RosterSync {
        &self.roster
    }

    pub fn channel_state(&self, kind: ChannelKind) -> ChannelState {
        match kind {
            ChannelKind::Position => self.position.state(),
            ChannelKind::Projectile => self.projectile.state(),
            ChannelKind::State => self.state.state(),
        }
    }

    /// Cancels every channel, closes the sockets and joins the network thread
    ///
    /// In-flight sends are abandoned. Calling it again is a no-op.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.stop.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
        if thread.join().is_err() {
            warn!("Network thread panicked during shutdown");
        }
        info!("Network stopped");
    }
}

impl Drop for NetworkClient {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_config_targets_all_endpoints() {
        let config = NetworkConfig::new("ws://example.test:8000");
        assert_eq!(config.position.url, "ws://example.test:8000/ws/game/position/");
        assert_eq!(config.projectile.url, "ws://example.test:8000/ws/game/bullets/");
        assert_eq!(config.state.url, "ws://example.test:8000/ws/game/state/");
    }

    #[test]
    fn test_offline_client_stays_usable_and_stops() {
        let mut client = NetworkClient::start(NetworkConfig::new("ws://127.0.0.1:1"), "1234").unwrap();
        let snapshot = shared::PlayerState::new_local("1234", 0.0, 0.0).snapshot();

        for _ in 0..10 {
            assert_eq!(client.send_position(&snapshot).unwrap(), SendStatus::NotConnected);
        }
        assert!(client.roster().is_empty());

        let started = Instant::now();
        client.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
        for kind in ChannelKind::ALL {
            assert_eq!(client.channel_state(kind), ChannelState::Disconnected);
        }
        client.stop();
    }
}
