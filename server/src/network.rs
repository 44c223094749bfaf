//! Server network layer: WebSocket acceptor, endpoint routing and per-connection tasks

use crate::room::{ConnectionId, RoomRegistry};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::ChannelKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::accept_hdr_async;

/// Per-connection outbound queue depth
const OUTBOUND_QUEUE: usize = 64;

/// How long a closing connection may spend flushing queued frames
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("no channel is served at {0}")]
    UnknownEndpoint(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Listener settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_connections: 256,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Relay server accepting the three game endpoints on one port
pub struct Server {
    listener: TcpListener,
    rooms: Arc<RwLock<RoomRegistry>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = config.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;
        info!("Server listening on {}", listener.local_addr()?);

        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Server {
            listener,
            rooms: Arc::new(RwLock::new(RoomRegistry::new(config.max_connections))),
            shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn rooms(&self) -> Arc<RwLock<RoomRegistry>> {
        Arc::clone(&self.rooms)
    }

    /// Handle that stops the accept loop and every connection task
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Accepts connections until a shutdown signal arrives
    pub async fn run(self) -> Result<(), ServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("New connection from {}", addr);
                            let rooms = Arc::clone(&self.rooms);
                            let shutdown_rx = self.shutdown_tx.subscribe();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, addr, rooms, shutdown_rx).await {
                                    warn!("Connection {} ended with error: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Performs the handshake, routes by path and pumps frames until close
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    rooms: Arc<RwLock<RoomRegistry>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), ServerError> {
    let mut path = String::new();
    let record_path = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        path = request.uri().path().to_string();
        Ok(response)
    };
    let ws_stream = accept_hdr_async(stream, record_path).await?;

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let kind = match ChannelKind::from_path(&path) {
        Some(kind) => kind,
        None => {
            let _ = ws_sender
                .send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Policy,
                    reason: "unknown endpoint".into(),
                })))
                .await;
            return Err(ServerError::UnknownEndpoint(path));
        }
    };

    let (msg_tx, mut msg_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
    let joined = rooms.write().await.join(kind, addr, msg_tx);
    let connection: ConnectionId = match joined {
        Some(id) => id,
        None => {
            let _ = ws_sender
                .send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Again,
                    reason: "server full".into(),
                })))
                .await;
            return Ok(());
        }
    };
    info!("Connection {} from {} joined {} channel", connection, addr, kind);

    let mut sender_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let result = rooms.write().await.handle_text(kind, connection, &text);
                        if let Err(e) = result {
                            warn!("Dropping message from {}: {}", addr, e);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client {} disconnected from {} channel", addr, kind);
                        break;
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error for {}: {}", addr, e);
                        break;
                    }
                    // Ping/pong is answered by tungstenite; binary frames are not part of the protocol
                    Some(Ok(_)) => {}
                }
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    let departed = rooms.write().await.leave(kind, connection);
    if let Some(player_id) = departed {
        debug!("Removed player {} after connection {} closed", player_id, connection);
    }
    // Leaving dropped the room's sender, so the writer drains and sends its close frame
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut sender_task).await.is_err() {
        debug!("Writer for connection {} did not drain in time", connection);
        sender_task.abort();
    }
    info!("Connection {} from {} closed", connection, addr);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_default_config_address() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "127.0.0.1:8000");
        assert_eq!(config.max_connections, 256);
    }

    #[tokio::test]
    async fn test_bind_on_ephemeral_port() {
        let server = assert_ok!(
            Server::bind(ServerConfig {
                port: 0,
                ..Default::default()
            })
            .await
        );
        let addr = assert_ok!(server.local_addr());
        assert_ne!(addr.port(), 0);
        assert!(server.rooms().read().await.room(ChannelKind::Position).is_none());
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let first = Server::bind(ServerConfig {
            port: 0,
            ..Default::default()
        })
        .await
        .unwrap();
        let taken = first.local_addr().unwrap().port();

        let err = Server::bind(ServerConfig {
            port: taken,
            ..Default::default()
        })
        .await;
        assert!(matches!(err, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_shutdown_stops_accept_loop() {
        let server = Server::bind(ServerConfig {
            port: 0,
            ..Default::default()
        })
        .await
        .unwrap();
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(server.run());

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        shutdown.send(()).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }
}
