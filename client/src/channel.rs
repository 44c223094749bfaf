//! One independently reconnecting WebSocket channel
//!
//! A channel is split into a cheap, cloneable `ChannelHandle` used by the
//! simulation thread and a `ChannelTask` that lives on the network runtime.
//! They share only atomics, a notifier and a single-slot `watch` buffer, so
//! the tick loop never awaits anything.

use futures_util::{Sink, SinkExt, StreamExt};
use log::{debug, info, trace, warn};
use shared::ChannelKind;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch, Notify};
use tokio::time::{sleep, Instant};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
    #[error("send failed: {0}")]
    Send(#[source] tungstenite::Error),
    #[error("receive failed: {0}")]
    Receive(#[source] tungstenite::Error),
    #[error("connection closed by peer")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Closing = 3,
}

impl ChannelState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ChannelState::Connecting,
            2 => ChannelState::Connected,
            3 => ChannelState::Closing,
            _ => ChannelState::Disconnected,
        }
    }
}

/// Exponential reconnect delay with a floor and a ceiling
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    /// Delay to wait after a failure; the next failure waits twice as long
    pub fn fail(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.ceiling);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

/// Minimum spacing between outbound sends; early sends are skipped, not queued
#[derive(Debug)]
pub struct SendGate {
    interval: Duration,
    last_send: Option<Instant>,
}

impl SendGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_send: None,
        }
    }

    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.last_send {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_send = Some(now);
                true
            }
        }
    }
}

/// Settings for one channel
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub kind: ChannelKind,
    pub url: String,
    pub send_interval: Duration,
    pub backoff_floor: Duration,
    pub backoff_ceiling: Duration,
    pub min_attempt_interval: Duration,
}

impl ChannelConfig {
    /// Default timings for `kind`, with the endpoint path appended to `base_url`
    pub fn for_kind(base_url: &str, kind: ChannelKind) -> Self {
        Self {
            kind,
            url: format!("{}{}", base_url.trim_end_matches('/'), kind.path()),
            send_interval: kind.default_send_interval(),
            backoff_floor: Duration::from_millis(250),
            backoff_ceiling: Duration::from_secs(5),
            min_attempt_interval: Duration::from_secs(1),
        }
    }
}

/// Receives every inbound text frame of one channel
///
/// Called on the network runtime; implementations must not block.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, text: &str);
}

/// Result of `ChannelHandle::send`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Handed to the network task; replaces any payload not yet written
    Queued,
    /// Inside the channel's minimum send interval
    RateLimited,
    /// Channel is down; a reconnect was requested and the payload dropped
    NotConnected,
}

struct ChannelShared {
    kind: ChannelKind,
    state: AtomicU8,
    reconnect: Notify,
    outbound: watch::Sender<Option<String>>,
    gate: Mutex<SendGate>,
}

impl ChannelShared {
    fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ChannelState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Simulation-side endpoint of a channel
#[derive(Clone)]
pub struct ChannelHandle {
    shared: Arc<ChannelShared>,
}

impl ChannelHandle {
    /// Fire-and-forget send with latest-state-wins semantics
    pub fn send(&self, payload: String) -> SendStatus {
        if self.shared.state() != ChannelState::Connected {
            self.connect();
            trace!("{} channel down, dropping send", self.shared.kind);
            return SendStatus::NotConnected;
        }

        let admitted = match self.shared.gate.lock() {
            Ok(mut gate) => gate.try_acquire(Instant::now()),
            Err(_) => false,
        };
        if !admitted {
            return SendStatus::RateLimited;
        }

        self.shared.outbound.send_replace(Some(payload));
        SendStatus::Queued
    }

    /// Requests a connection attempt; a no-op unless the channel is idle
    ///
    /// Only wakes a channel resting after a lost session. A channel waiting
    /// out a failed attempt keeps its full backoff delay.
    pub fn connect(&self) {
        if self.shared.state() == ChannelState::Disconnected {
            self.shared.reconnect.notify_waiters();
        }
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    pub fn kind(&self) -> ChannelKind {
        self.shared.kind
    }
}

/// Network-side driver of a channel
pub struct ChannelTask {
    config: ChannelConfig,
    shared: Arc<ChannelShared>,
    outbound: watch::Receiver<Option<String>>,
    handler: Arc<dyn MessageHandler>,
    stop: Arc<AtomicBool>,
    backoff: Backoff,
    last_attempt: Option<Instant>,
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum SessionEnd {
    Stopped,
    Lost(TransportError),
}

/// Creates the two halves of a channel
///
/// `stop` is shared by all channels of one client; once set, every task
/// exits at its next check.
pub fn channel(
    config: ChannelConfig,
    handler: Arc<dyn MessageHandler>,
    stop: Arc<AtomicBool>,
) -> (ChannelHandle, ChannelTask) {
    let (outbound_tx, outbound_rx) = watch::channel(None);
    let shared = Arc::new(ChannelShared {
        kind: config.kind,
        state: AtomicU8::new(ChannelState::Disconnected as u8),
        reconnect: Notify::new(),
        outbound: outbound_tx,
        gate: Mutex::new(SendGate::new(config.send_interval)),
    });

    let backoff = Backoff::new(config.backoff_floor, config.backoff_ceiling);
    let task = ChannelTask {
        config,
        shared: Arc::clone(&shared),
        outbound: outbound_rx,
        handler,
        stop,
        backoff,
        last_attempt: None,
    };

    (ChannelHandle { shared }, task)
}

impl ChannelTask {
    /// Connects, pumps frames and reconnects until stopped
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let kind = self.config.kind;

        while !self.stopped() {
            self.shared.set_state(ChannelState::Connecting);
            self.respect_attempt_interval(&mut shutdown).await;
            if self.stopped() {
                break;
            }

            let attempt = tokio::select! {
                result = connect_async(self.config.url.as_str()) => result,
                _ = shutdown.recv() => break,
            };

            match attempt {
                Ok((socket, _)) => {
                    self.backoff.reset();
                    self.shared.set_state(ChannelState::Connected);
                    info!("{} channel connected to {}", kind, self.config.url);

                    match self.session(socket, &mut shutdown).await {
                        SessionEnd::Stopped => break,
                        SessionEnd::Lost(e) => {
                            self.shared.set_state(ChannelState::Disconnected);
                            warn!("{} channel lost: {}", kind, e);

                            tokio::select! {
                                _ = sleep(self.config.backoff_floor) => {}
                                _ = self.shared.reconnect.notified() => {}
                                _ = shutdown.recv() => break,
                            }
                        }
                    }
                }
                Err(source) => {
                    let error = TransportError::Connect {
                        url: self.config.url.clone(),
                        source,
                    };
                    self.shared.set_state(ChannelState::Disconnected);
                    let delay = self.backoff.fail();
                    warn!("{} channel: {}, retrying in {:?}", kind, error, delay);

                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = shutdown.recv() => break,
                    }
                }
            }
        }

        self.shared.set_state(ChannelState::Disconnected);
        debug!("{} channel task exited", kind);
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    async fn respect_attempt_interval(&mut self, shutdown: &mut broadcast::Receiver<()>) {
        if let Some(last) = self.last_attempt {
            let since = last.elapsed();
            if since < self.config.min_attempt_interval {
                tokio::select! {
                    _ = sleep(self.config.min_attempt_interval - since) => {}
                    _ = shutdown.recv() => {}
                }
            }
        }
        self.last_attempt = Some(Instant::now());
    }

    async fn session(&mut self, socket: Socket, shutdown: &mut broadcast::Receiver<()>) -> SessionEnd {
        let (mut sink, mut stream) = socket.split();
        // Anything queued while disconnected is stale by now
        self.outbound.borrow_and_update();

        loop {
            if self.stopped() {
                return self.close(&mut sink).await;
            }

            tokio::select! {
                changed = self.outbound.changed() => {
                    if changed.is_err() {
                        return self.close(&mut sink).await;
                    }
                    let payload = self.outbound.borrow_and_update().clone();
                    if let Some(text) = payload {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            return SessionEnd::Lost(TransportError::Send(e));
                        }
                    }
                }
                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handler.handle(&text),
                        Some(Ok(Message::Close(_))) | None => {
                            return SessionEnd::Lost(TransportError::Closed);
                        }
                        Some(Err(e)) => return SessionEnd::Lost(TransportError::Receive(e)),
                        Some(Ok(_)) => {}
                    }
                }
                _ = shutdown.recv() => {
                    return self.close(&mut sink).await;
                }
            }
        }
    }

    async fn close<S>(&self, sink: &mut S) -> SessionEnd
    where
        S: Sink<Message> + Unpin,
    {
        self.shared.set_state(ChannelState::Closing);
        let _ = sink.close().await;
        SessionEnd::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    struct Ignore;

    impl MessageHandler for Ignore {
        fn handle(&self, _text: &str) {}
    }

    #[test]
    fn test_backoff_doubles_to_ceiling_and_resets() {
        let mut backoff = Backoff::new(Duration::from_millis(250), Duration::from_secs(1));

        assert_eq!(backoff.fail(), Duration::from_millis(250));
        assert_eq!(backoff.fail(), Duration::from_millis(500));
        assert_eq!(backoff.fail(), Duration::from_millis(1000));
        assert_eq!(backoff.fail(), Duration::from_millis(1000));

        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_millis(250));
    }

    #[test]
    fn test_send_gate_skips_inside_interval() {
        let mut gate = SendGate::new(Duration::from_millis(30));
        let start = Instant::now();

        assert!(gate.try_acquire(start));
        assert!(!gate.try_acquire(start + Duration::from_millis(10)));
        assert!(!gate.try_acquire(start + Duration::from_millis(29)));
        assert!(gate.try_acquire(start + Duration::from_millis(30)));
    }

    #[test]
    fn test_config_for_kind_builds_endpoint_url() {
        let config = ChannelConfig::for_kind("ws://127.0.0.1:8000/", ChannelKind::Projectile);
        assert_eq!(config.url, "ws://127.0.0.1:8000/ws/game/bullets/");
        assert_eq!(config.send_interval, ChannelKind::Projectile.default_send_interval());
    }

    #[test]
    fn test_send_while_disconnected_is_dropped() {
        let config = ChannelConfig::for_kind("ws://127.0.0.1:1", ChannelKind::Position);
        let (handle, _task) = channel(config, Arc::new(Ignore), Arc::new(AtomicBool::new(false)));

        assert_eq!(handle.state(), ChannelState::Disconnected);
        assert_eq!(handle.send("{}".to_string()), SendStatus::NotConnected);
    }

    #[test]
    fn test_connected_send_is_rate_limited() {
        let config = ChannelConfig::for_kind("ws://127.0.0.1:1", ChannelKind::State);
        let (handle, task) = channel(config, Arc::new(Ignore), Arc::new(AtomicBool::new(false)));
        handle.shared.set_state(ChannelState::Connected);

        assert_eq!(handle.send("a".to_string()), SendStatus::Queued);
        assert_eq!(handle.send("b".to_string()), SendStatus::RateLimited);
        assert_eq!(task.outbound.borrow().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_sends_during_failures_keep_backoff_growing() {
        // Accepts TCP and hangs up at once, so every handshake fails
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&attempts);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                seen.lock().unwrap().push(Instant::now());
                drop(stream);
            }
        });

        let mut config = ChannelConfig::for_kind(&format!("ws://{}", addr), ChannelKind::Position);
        config.backoff_floor = Duration::from_millis(200);
        config.backoff_ceiling = Duration::from_secs(5);
        config.min_attempt_interval = Duration::from_millis(10);
        let stop = Arc::new(AtomicBool::new(false));
        let (handle, task) = channel(config, Arc::new(Ignore), Arc::clone(&stop));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let join = tokio::spawn(task.run(shutdown_rx));

        let deadline = Instant::now() + Duration::from_millis(1600);
        while Instant::now() < deadline {
            assert_ne!(handle.send("{}".to_string()), SendStatus::Queued);
            sleep(Duration::from_millis(16)).await;
        }

        stop.store(true, Ordering::Release);
        let _ = shutdown_tx.send(());
        assert_ok!(assert_ok!(tokio::time::timeout(Duration::from_secs(1), join).await));

        // Attempts near 0, 200, 600 and 1400 ms
        let attempts = attempts.lock().unwrap().clone();
        assert!(attempts.len() >= 2, "only {} attempts", attempts.len());
        assert!(attempts.len() <= 6, "{} attempts, backoff was bypassed", attempts.len());
        let gaps: Vec<Duration> = attempts.windows(2).map(|w| w[1] - w[0]).collect();
        assert!(gaps.last() > gaps.first() || gaps.len() == 1);
        assert!(gaps.iter().all(|gap| *gap >= Duration::from_millis(150)));
    }

    #[tokio::test]
    async fn test_unreachable_server_backs_off() {
        let mut config = ChannelConfig::for_kind("ws://127.0.0.1:1", ChannelKind::State);
        config.backoff_floor = Duration::from_millis(10);
        config.min_attempt_interval = Duration::from_millis(1);
        let stop = Arc::new(AtomicBool::new(false));
        let (handle, task) = channel(config, Arc::new(Ignore), Arc::clone(&stop));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let join = tokio::spawn(task.run(shutdown_rx));
        sleep(Duration::from_millis(100)).await;
        assert_ne!(handle.state(), ChannelState::Connected);

        stop.store(true, Ordering::Release);
        let _ = shutdown_tx.send(());
        assert_ok!(assert_ok!(tokio::time::timeout(Duration::from_secs(1), join).await));
        assert_eq!(handle.state(), ChannelState::Disconnected);
    }
}
