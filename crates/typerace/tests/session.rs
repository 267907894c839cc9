//! Session tests over an in-memory connection, so timing can be driven
//! without sockets.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use typerace::prelude::*;

// =========================================================================
// In-memory connection
// =========================================================================

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// What the session wrote to the "socket".
#[derive(Debug, PartialEq)]
enum Sent {
    Data(ServerMessage),
    Ping,
}

struct ChannelConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::Receiver<Vec<u8>>>,
    outbound: mpsc::Sender<Sent>,
    closed: watch::Sender<bool>,
}

/// The test's end of a [`ChannelConnection`].
struct Client {
    to_server: mpsc::Sender<Vec<u8>>,
    from_server: mpsc::Receiver<Sent>,
    closed: watch::Receiver<bool>,
}

/// `outbound_capacity` bounds how far the session can write ahead of the
/// test; a full channel makes `send` block like a stalled socket.
fn channel_pair(outbound_capacity: usize) -> (ChannelConnection, Client) {
    let (to_server, inbound) = mpsc::channel(64);
    let (outbound, from_server) = mpsc::channel(outbound_capacity);
    let closed = watch::Sender::new(false);
    let client = Client {
        to_server,
        from_server,
        closed: closed.subscribe(),
    };
    let conn = ChannelConnection {
        id: ConnectionId::new(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
        inbound: Mutex::new(inbound),
        outbound,
        closed,
    };
    (conn, client)
}

impl ChannelConnection {
    async fn push(&self, sent: Sent) -> Result<(), TransportError> {
        if *self.closed.borrow() {
            return Err(TransportError::ConnectionClosed("closed".into()));
        }
        self.outbound
            .send(sent)
            .await
            .map_err(|_| TransportError::ConnectionClosed("peer gone".into()))
    }
}

impl Connection for ChannelConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let msg = serde_json::from_slice(data).expect("session sends JSON");
        self.push(Sent::Data(msg)).await
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            _ = closed.changed() => Ok(None),
            data = inbound.recv() => Ok(data),
        }
    }

    async fn ping(&self) -> Result<(), TransportError> {
        self.push(Sent::Ping).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.send_replace(true);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Client {
    async fn send(&self, json: &str) {
        self.to_server
            .send(json.as_bytes().to_vec())
            .await
            .expect("session should be reading");
    }

    async fn join(&self, channel: &str, username: &str) {
        self.send(&format!(
            r#"{{"type":"JoinRoom","channelID":"{channel}","username":"{username}"}}"#
        ))
        .await;
    }

    async fn next(&mut self) -> Option<Sent> {
        tokio::time::timeout(Duration::from_secs(5), self.from_server.recv())
            .await
            .expect("session should write in time")
    }

    async fn next_data(&mut self) -> ServerMessage {
        loop {
            match self.next().await {
                Some(Sent::Data(msg)) => return msg,
                Some(Sent::Ping) => continue,
                None => panic!("session stopped writing"),
            }
        }
    }
}

fn handler(config: ServerConfig) -> SessionHandler {
    let registry = Arc::new(RoomRegistry::new(config.room.clone()));
    SessionHandler::new(registry, Arc::new(config))
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_join_timeout_ends_session() {
    let handler = handler(ServerConfig {
        join_timeout: Duration::from_millis(50),
        ..ServerConfig::default()
    });
    let (conn, client) = channel_pair(8);

    let result = handler.run(conn).await;

    assert!(matches!(result, Err(TyperaceError::JoinTimeout(_))));
    assert!(*client.closed.borrow());
    assert_eq!(handler.registry().room_count().await, 0);
}

#[tokio::test]
async fn test_client_hangup_before_join_is_clean() {
    let handler = handler(ServerConfig::default());
    let (conn, client) = channel_pair(8);
    drop(client);

    assert!(handler.run(conn).await.is_ok());
}

#[tokio::test]
async fn test_hangup_after_join_leaves_room() {
    let handler = handler(ServerConfig::default());
    let (conn, mut client) = channel_pair(8);
    let session = tokio::spawn({
        let handler = handler.clone();
        async move { handler.run(conn).await }
    });

    client.join("abc", "Alice").await;
    assert!(matches!(client.next_data().await, ServerMessage::Joined { .. }));
    assert!(handler.registry().contains(&RoomId::from("abc")).await);

    drop(client.to_server);
    let result = session.await.expect("session task");

    assert!(result.is_ok());
    assert!(!handler.registry().contains(&RoomId::from("abc")).await);
}

#[tokio::test]
async fn test_quiet_session_sends_keepalive_pings() {
    let handler = handler(ServerConfig {
        keepalive_interval: Duration::from_millis(30),
        ..ServerConfig::default()
    });
    let (conn, mut client) = channel_pair(8);
    tokio::spawn(async move { handler.run(conn).await });

    client.join("abc", "Alice").await;
    client.next_data().await;
    client.next_data().await;

    assert_eq!(client.next().await, Some(Sent::Ping));
    assert_eq!(client.next().await, Some(Sent::Ping));
}

#[tokio::test]
async fn test_stalled_writer_times_out_and_leaves_room() {
    // Room outbox is roomy; the socket itself accepts a single frame.
    let handler = handler(ServerConfig {
        write_timeout: Duration::from_millis(50),
        ..ServerConfig::default()
    });
    let (conn, client) = channel_pair(1);
    let session = tokio::spawn({
        let handler = handler.clone();
        async move { handler.run(conn).await }
    });

    client.join("abc", "Alice").await;
    let result = session.await.expect("session task");

    assert!(matches!(result, Err(TyperaceError::WriteTimeout(_))));
    assert!(!handler.registry().contains(&RoomId::from("abc")).await);
}

#[tokio::test]
async fn test_stuck_client_does_not_hold_up_room() {
    let handler = handler(ServerConfig {
        write_timeout: Duration::from_millis(200),
        room: RoomConfig {
            outbox_capacity: 3,
            ..RoomConfig::default()
        },
        ..ServerConfig::default()
    });
    let registry = Arc::clone(handler.registry());

    // The slow client's socket takes nothing after the first frame, so its
    // writer stalls. It goes either by eviction or by write timeout.
    let (slow_conn, slow) = channel_pair(1);
    let slow_session = tokio::spawn({
        let handler = handler.clone();
        async move { handler.run(slow_conn).await }
    });
    slow.join("abc", "Slow").await;

    let (fast_conn, mut fast) = channel_pair(64);
    tokio::spawn({
        let handler = handler.clone();
        async move { handler.run(fast_conn).await }
    });
    fast.join("abc", "Fast").await;
    assert!(matches!(fast.next_data().await, ServerMessage::Joined { .. }));
    fast.next_data().await;

    for i in 1..=10 {
        fast.send(&format!(r#"{{"type":"ProgressUpdate","currentIndex":{i}}}"#))
            .await;
    }

    // The fast client sees all ten updates, however the slow one fares.
    let mut last = 0;
    while last < 10 {
        if let ServerMessage::PlayerProgress { players } = fast.next_data().await {
            last = players
                .iter()
                .find(|p| p.username == "Fast")
                .map_or(0, |p| p.current_index);
        }
    }

    let result = slow_session.await.expect("slow session task");
    assert!(result.is_err(), "slow session should end");
    let room = registry.room(&RoomId::from("abc")).await.expect("room survives");
    let names: Vec<_> = room.snapshot().await.into_iter().map(|p| p.username).collect();
    assert_eq!(names, vec!["Fast".to_string()]);
    drop(slow);
}

#[tokio::test]
async fn test_progress_from_two_sessions_reaches_both() {
    let handler = handler(ServerConfig::default());
    let (a_conn, mut alice) = channel_pair(16);
    let (b_conn, mut bob) = channel_pair(16);
    for conn in [a_conn, b_conn] {
        let handler = handler.clone();
        tokio::spawn(async move { handler.run(conn).await });
    }

    alice.join("abc", "Alice").await;
    alice.next_data().await;
    alice.next_data().await;
    bob.join("abc", "Bob").await;
    bob.next_data().await;
    bob.next_data().await;
    alice.next_data().await;

    bob.send(r#"{"type":"ProgressUpdate","currentIndex":5,"mistakeCount":1}"#)
        .await;

    for client in [&mut alice, &mut bob] {
        match client.next_data().await {
            ServerMessage::PlayerProgress { players } => {
                let bob = players.iter().find(|p| p.username == "Bob").unwrap();
                assert_eq!((bob.current_index, bob.mistake_count), (5, 1));
            }
            other => panic!("expected PlayerProgress, got {other:?}"),
        }
    }
}
