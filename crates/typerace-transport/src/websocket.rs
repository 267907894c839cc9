//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, watch};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{Connection, ConnectionId, Incoming, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    idle_timeout: Option<Duration>,
    shut_down: AtomicBool,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            idle_timeout: None,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Sets the longest silence tolerated between two inbound frames on
    /// every connection accepted from now on. Pongs count as traffic.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Incoming = IncomingWebSocket;

    async fn accept(&mut self) -> Result<Self::Incoming, TransportError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }

        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::trace!(%id, %addr, "accepted TCP connection");

        Ok(IncomingWebSocket {
            id,
            addr,
            stream,
            idle_timeout: self.idle_timeout,
        })
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        self.shut_down.store(true, Ordering::Release);
        tracing::info!("WebSocket transport stopped accepting");
        Ok(())
    }
}

/// A TCP peer that has not sent its WebSocket upgrade request yet.
pub struct IncomingWebSocket {
    id: ConnectionId,
    addr: SocketAddr,
    stream: TcpStream,
    idle_timeout: Option<Duration>,
}

impl IncomingWebSocket {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Incoming for IncomingWebSocket {
    type Connection = WebSocketConnection;

    async fn upgrade(self) -> Result<Self::Connection, TransportError> {
        let Self {
            id,
            addr,
            stream,
            idle_timeout,
        } = self;
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        Ok(WebSocketConnection::new(id, ws, idle_timeout))
    }
}

/// A single WebSocket connection.
///
/// The socket is split into a sink and a stream with separate locks, so
/// the writer task can send while the reader task is parked in `recv`.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<WsSink>,
    stream: Mutex<WsSource>,
    idle_timeout: Option<Duration>,
    closed: watch::Sender<bool>,
}

impl WebSocketConnection {
    fn new(
        id: ConnectionId,
        ws: WsStream,
        idle_timeout: Option<Duration>,
    ) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            idle_timeout,
            closed: watch::Sender::new(false),
        }
    }

    async fn next_frame(
        &self,
        stream: &mut WsSource,
    ) -> Result<Option<Result<Message, tungstenite::Error>>, TransportError>
    {
        match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.next())
                .await
                .map_err(|_| TransportError::Timeout(limit)),
            None => Ok(stream.next().await),
        }
    }

    async fn write(&self, msg: Message) -> Result<(), TransportError> {
        if *self.closed.borrow() {
            return Err(TransportError::ConnectionClosed(format!(
                "{} closed locally",
                self.id
            )));
        }
        self.sink.lock().await.send(msg).await.map_err(send_failed)
    }
}

impl Connection for WebSocketConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        // Browsers expect JSON as text frames.
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(data.to_vec()),
        };
        self.write(msg).await
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }

        let mut stream = self.stream.lock().await;
        loop {
            let frame = tokio::select! {
                _ = closed.changed() => return Ok(None),
                frame = self.next_frame(&mut stream) => frame?,
            };
            match frame {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn ping(&self) -> Result<(), TransportError> {
        self.write(Message::Ping(Default::default())).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.send_replace(true) {
            return Ok(());
        }
        self.sink.lock().await.close().await.map_err(send_failed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

fn send_failed(e: tungstenite::Error) -> TransportError {
    TransportError::SendFailed(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        e,
    ))
}
