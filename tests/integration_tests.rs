//! Integration tests for the relay server and the client network stack
//!
//! Every test starts a real server on an ephemeral port and talks to it over
//! WebSockets, either with raw tokio-tungstenite sockets or with the client's
//! `NetworkClient`.

use client::channel::ChannelState;
use client::network::{NetworkClient, NetworkConfig};
use futures_util::{SinkExt, StreamExt};
use server::network::{Server, ServerConfig};
use shared::protocol::{decode, encode};
use shared::{BulletMessage, ChannelKind, PlayerSnapshot, RosterBroadcast};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout, Instant};
use tokio_test::assert_ok;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server_on(port: u16) -> (SocketAddr, broadcast::Sender<()>) {
    let server = Server::bind(ServerConfig {
        host: "127.0.0.1".to_string(),
        port,
        max_connections: 32,
    })
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_handle();
    tokio::spawn(server.run());
    (addr, shutdown)
}

async fn start_server() -> (SocketAddr, broadcast::Sender<()>) {
    start_server_on(0).await
}

async fn connect(addr: SocketAddr, path: &str) -> Socket {
    let url = format!("ws://{}{}", addr, path);
    let (socket, _) = assert_ok!(connect_async(url).await);
    // The server joins the room just after the handshake completes
    sleep(Duration::from_millis(50)).await;
    socket
}

/// Next text frame, skipping control frames
async fn next_text(socket: &mut Socket) -> String {
    timeout(Duration::from_secs(2), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(Message::Close(frame))) => panic!("socket closed: {:?}", frame),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("socket error: {}", e),
                None => panic!("socket ended"),
            }
        }
    })
    .await
    .expect("timed out waiting for a text frame")
}

async fn next_roster(socket: &mut Socket) -> RosterBroadcast {
    let text = next_text(socket).await;
    decode("roster", &text).unwrap()
}

fn snapshot(id: &str, x: f32, health: u32) -> PlayerSnapshot {
    PlayerSnapshot {
        player_id: id.to_string(),
        x,
        y: 50.0,
        health,
        is_flying: false,
        is_running: true,
        facing_left: false,
        is_dead: false,
    }
}

async fn send_json<T: serde::Serialize>(socket: &mut Socket, message: &T) {
    assert_ok!(socket.send(Message::Text(encode(message).unwrap())).await);
}

async fn wait_for(mut condition: impl FnMut() -> bool, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// POSITION ROOM TESTS
mod position_tests {
    use super::*;

    /// The sender receives the full roster back along with everyone else
    #[tokio::test]
    async fn roster_is_rebroadcast_to_all_members() {
        let (addr, shutdown) = start_server().await;
        let mut a = connect(addr, ChannelKind::Position.path()).await;
        let mut b = connect(addr, ChannelKind::Position.path()).await;

        send_json(&mut a, &snapshot("1111", 10.0, 100)).await;
        let roster_a = next_roster(&mut a).await;
        let roster_b = next_roster(&mut b).await;
        assert_eq!(roster_a, roster_b);
        assert_eq!(roster_a.players.len(), 1);
        assert_eq!(roster_a.players[0].player_id, "1111");

        send_json(&mut b, &snapshot("2222", 20.0, 100)).await;
        let roster = next_roster(&mut a).await;
        let mut ids: Vec<_> = roster.players.iter().map(|p| p.player_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["1111", "2222"]);

        let _ = shutdown.send(());
    }

    /// Ids are reduced to their last dotted segment before storage
    #[tokio::test]
    async fn player_ids_are_sanitized() {
        let (addr, shutdown) = start_server().await;
        let mut a = connect(addr, ChannelKind::Position.path()).await;

        send_json(&mut a, &snapshot("abc!123.456", 10.0, 100)).await;
        let roster = next_roster(&mut a).await;
        assert_eq!(roster.players.len(), 1);
        assert_eq!(roster.players[0].player_id, "456");

        let _ = shutdown.send(());
    }

    /// Two quick updates for one id: the later one is what the room holds
    #[tokio::test]
    async fn last_update_wins() {
        let (addr, shutdown) = start_server().await;
        let mut a = connect(addr, ChannelKind::Position.path()).await;
        let mut b = connect(addr, ChannelKind::Position.path()).await;

        send_json(&mut a, &snapshot("3333", 10.0, 80)).await;
        next_roster(&mut a).await;
        send_json(&mut b, &snapshot("3333", 10.0, 40)).await;
        let roster = next_roster(&mut a).await;
        assert_eq!(roster.players.len(), 1);
        assert_eq!(roster.players[0].health, 40);

        let _ = shutdown.send(());
    }

    /// Closing a connection removes its player and announces the departure
    #[tokio::test]
    async fn disconnect_announces_player_left() {
        let (addr, shutdown) = start_server().await;
        let mut a = connect(addr, ChannelKind::Position.path()).await;
        let mut b = connect(addr, ChannelKind::Position.path()).await;

        send_json(&mut a, &snapshot("1111", 10.0, 100)).await;
        next_roster(&mut a).await;
        next_roster(&mut b).await;
        send_json(&mut b, &snapshot("2222", 10.0, 100)).await;
        next_roster(&mut a).await;
        next_roster(&mut b).await;

        assert_ok!(a.close(None).await);
        let roster = next_roster(&mut b).await;
        assert_eq!(roster.player_left.as_deref(), Some("1111"));
        assert_eq!(roster.players.len(), 1);
        assert_eq!(roster.players[0].player_id, "2222");

        let _ = shutdown.send(());
    }

    /// A malformed frame is dropped without closing the connection
    #[tokio::test]
    async fn malformed_update_is_ignored() {
        let (addr, shutdown) = start_server().await;
        let mut a = connect(addr, ChannelKind::Position.path()).await;

        assert_ok!(a.send(Message::Text("not json".to_string())).await);
        send_json(&mut a, &snapshot("1111", 10.0, 100)).await;
        let roster = next_roster(&mut a).await;
        assert_eq!(roster.players.len(), 1);

        let _ = shutdown.send(());
    }
}

/// RELAY ROOM TESTS
mod relay_tests {
    use super::*;

    /// Bullet frames reach every member verbatim, sender included
    #[tokio::test]
    async fn bullet_frames_are_relayed_verbatim() {
        let (addr, shutdown) = start_server().await;
        let mut a = connect(addr, ChannelKind::Projectile.path()).await;
        let mut b = connect(addr, ChannelKind::Projectile.path()).await;

        let text = encode(&BulletMessage::BulletSpawn {
            player_id: "1111".to_string(),
            spawn_x: 15.5,
            spawn_y: 20.0,
            angle: 1.25,
            timestamp: 42,
        })
        .unwrap();
        assert_ok!(a.send(Message::Text(text.clone())).await);

        assert_eq!(next_text(&mut a).await, text);
        assert_eq!(next_text(&mut b).await, text);

        let _ = shutdown.send(());
    }

    /// The state room does not interpret payloads
    #[tokio::test]
    async fn state_frames_are_relayed_verbatim() {
        let (addr, shutdown) = start_server().await;
        let mut a = connect(addr, ChannelKind::State.path()).await;
        let mut b = connect(addr, ChannelKind::State.path()).await;

        assert_ok!(a.send(Message::Text("{\"round\":3}".to_string())).await);
        assert_eq!(next_text(&mut b).await, "{\"round\":3}");

        let _ = shutdown.send(());
    }

    /// Rooms are isolated from each other
    #[tokio::test]
    async fn rooms_do_not_leak() {
        let (addr, shutdown) = start_server().await;
        let mut position = connect(addr, ChannelKind::Position.path()).await;
        let mut state = connect(addr, ChannelKind::State.path()).await;

        assert_ok!(state.send(Message::Text("hello".to_string())).await);
        assert_eq!(next_text(&mut state).await, "hello");

        let nothing = timeout(Duration::from_millis(200), position.next()).await;
        assert!(nothing.is_err());

        let _ = shutdown.send(());
    }

    /// Unknown paths are closed right after the handshake
    #[tokio::test]
    async fn unknown_path_is_closed() {
        let (addr, shutdown) = start_server().await;
        let mut socket = connect(addr, "/ws/game/unknown/").await;

        let closed = timeout(Duration::from_secs(2), async {
            loop {
                match socket.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return true,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        assert!(matches!(closed, Ok(true)));

        let _ = shutdown.send(());
    }
}

/// SHUTDOWN TESTS
mod shutdown_tests {
    use super::*;

    /// Open connections see a proper close frame when the server stops
    #[tokio::test]
    async fn shutdown_sends_close_frame() {
        let (addr, shutdown) = start_server().await;
        let mut socket = connect(addr, ChannelKind::State.path()).await;

        let _ = shutdown.send(());
        let first = timeout(Duration::from_secs(2), async {
            loop {
                match socket.next().await {
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    other => return other,
                }
            }
        })
        .await
        .expect("timed out waiting for close");
        assert!(matches!(first, Some(Ok(Message::Close(_)))), "got {:?}", first);
    }
}

/// CLIENT NETWORK STACK TESTS
mod client_tests {
    use super::*;

    fn start_client(addr: SocketAddr, id: &str) -> NetworkClient {
        NetworkClient::start(NetworkConfig::new(&format!("ws://{}", addr)), id).unwrap()
    }

    /// A peer's snapshot shows up in the client's roster; our own never does
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn client_roster_tracks_peers() {
        let (addr, shutdown) = start_server().await;
        let mut client = start_client(addr, "1111");

        assert!(
            wait_for(
                || client.channel_state(ChannelKind::Position) == ChannelState::Connected,
                Duration::from_secs(3)
            )
            .await
        );

        let own = shared::PlayerState::new_local("1111", 5.0, 5.0).snapshot();
        assert_ok!(client.send_position(&own));

        let mut peer = connect(addr, ChannelKind::Position.path()).await;
        send_json(&mut peer, &snapshot("2222", 300.0, 70)).await;

        assert!(wait_for(|| client.roster().get("2222").is_some(), Duration::from_secs(3)).await);
        let replica = client.roster().get("2222").unwrap();
        assert_eq!(replica.health, 70);
        assert!(!replica.is_local);
        assert!(client.roster().get("1111").is_none());

        tokio::task::block_in_place(|| client.stop());
        let _ = shutdown.send(());
    }

    /// A dotted id comes back from the server as its trailing token only
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dotted_local_id_is_not_replicated_back() {
        let (addr, shutdown) = start_server().await;
        let mut client = start_client(addr, "alice.1111");
        let mut peer = connect(addr, ChannelKind::Position.path()).await;

        assert!(
            wait_for(
                || client.channel_state(ChannelKind::Position) == ChannelState::Connected,
                Duration::from_secs(3)
            )
            .await
        );

        let own = shared::PlayerState::new_local("alice.1111", 5.0, 5.0).snapshot();
        assert_ok!(client.send_position(&own));
        let roster = next_roster(&mut peer).await;
        assert_eq!(roster.players[0].player_id, "1111");

        send_json(&mut peer, &snapshot("2222", 300.0, 70)).await;
        assert!(wait_for(|| client.roster().get("2222").is_some(), Duration::from_secs(3)).await);
        assert!(client.roster().get("1111").is_none());
        assert_eq!(client.roster().len(), 1);

        tokio::task::block_in_place(|| client.stop());
        let _ = shutdown.send(());
    }

    /// A dead projectile endpoint leaves position traffic untouched
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failing_channel_does_not_block_others() {
        let (addr, shutdown) = start_server().await;
        let mut config = NetworkConfig::new(&format!("ws://{}", addr));
        config.projectile.url = "ws://127.0.0.1:1/ws/game/bullets/".to_string();
        let mut client = NetworkClient::start(config, "1111").unwrap();
        let mut peer = connect(addr, ChannelKind::Position.path()).await;

        assert!(
            wait_for(
                || client.channel_state(ChannelKind::Position) == ChannelState::Connected,
                Duration::from_secs(2)
            )
            .await
        );
        assert!(
            wait_for(
                || client.channel_state(ChannelKind::State) == ChannelState::Connected,
                Duration::from_secs(2)
            )
            .await
        );

        send_json(&mut peer, &snapshot("2222", 300.0, 70)).await;
        next_roster(&mut peer).await;
        assert!(wait_for(|| client.roster().get("2222").is_some(), Duration::from_secs(1)).await);

        let own = shared::PlayerState::new_local("1111", 5.0, 5.0).snapshot();
        assert_ok!(client.send_position(&own));
        let roster = next_roster(&mut peer).await;
        assert!(roster.players.iter().any(|p| p.player_id == "1111"));

        assert_ne!(client.channel_state(ChannelKind::Projectile), ChannelState::Connected);
        let bullet = BulletMessage::BulletSpawn {
            player_id: "1111".to_string(),
            spawn_x: 0.0,
            spawn_y: 0.0,
            angle: 0.0,
            timestamp: 0,
        };
        assert_eq!(
            client.send_bullet(&bullet).unwrap(),
            client::channel::SendStatus::NotConnected
        );

        tokio::task::block_in_place(|| client.stop());
        let _ = shutdown.send(());
    }

    /// Bullets sent by the client reach peers; the echo is not queued locally
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn client_bullets_reach_peers() {
        let (addr, shutdown) = start_server().await;
        let mut client = start_client(addr, "1111");
        let mut peer = connect(addr, ChannelKind::Projectile.path()).await;

        assert!(
            wait_for(
                || client.channel_state(ChannelKind::Projectile) == ChannelState::Connected,
                Duration::from_secs(3)
            )
            .await
        );

        let bullet = BulletMessage::BulletSpawn {
            player_id: "1111".to_string(),
            spawn_x: 1.0,
            spawn_y: 2.0,
            angle: 0.5,
            timestamp: 9,
        };
        assert_ok!(client.send_bullet(&bullet));

        let received: BulletMessage = decode("bullet", &next_text(&mut peer).await).unwrap();
        assert_eq!(received, bullet);

        sleep(Duration::from_millis(100)).await;
        assert!(client.roster().drain_spawns().is_empty());

        let spawn = BulletMessage::BulletSpawn {
            player_id: "2222".to_string(),
            spawn_x: 3.0,
            spawn_y: 4.0,
            angle: 0.0,
            timestamp: 10,
        };
        send_json(&mut peer, &spawn).await;
        assert!(
            wait_for(
                || !client.roster().drain_spawns().is_empty(),
                Duration::from_secs(2)
            )
            .await
        );

        tokio::task::block_in_place(|| client.stop());
        let _ = shutdown.send(());
    }

    /// Channels come back on their own after the server restarts
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn client_reconnects_after_server_restart() {
        let (addr, shutdown) = start_server().await;
        let mut client = start_client(addr, "1111");

        assert!(
            wait_for(
                || client.channel_state(ChannelKind::State) == ChannelState::Connected,
                Duration::from_secs(3)
            )
            .await
        );

        let _ = shutdown.send(());
        assert!(
            wait_for(
                || client.channel_state(ChannelKind::State) != ChannelState::Connected,
                Duration::from_secs(3)
            )
            .await
        );

        let (_, shutdown) = start_server_on(addr.port()).await;
        assert!(
            wait_for(
                || client.channel_state(ChannelKind::State) == ChannelState::Connected,
                Duration::from_secs(10)
            )
            .await
        );

        tokio::task::block_in_place(|| client.stop());
        let _ = shutdown.send(());
    }
}
