//! # WebSocket Channel Abstraction
//!
//! Provides the duplex message channel between the session and the verifier.
//!
//! ## Model
//!
//! Each connection attempt is one *channel*, identified by a generation number
//! handed out by the session. A channel runs in its own task and talks to the
//! session through two queues:
//! ```text
//! session --ChannelCommand--> [channel task] --text frames--> verifier
//! session <--ChannelEvent---- [channel task] <--text frames-- verifier
//! ```
//!
//! Every channel emits `Opened` at most once, then zero or more `Message`
//! events in network order, then exactly one `Closed`. Events carry the
//! generation so that stragglers from a replaced channel can be ignored.
//!
//! The outbound queue is bounded; a full queue is the backpressure signal the
//! frame sampler uses to skip ticks.

use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use std::sync::Once;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Lifecycle and data notifications produced by a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The handshake completed; the channel is ready to send.
    Opened,
    /// One inbound text frame, unparsed.
    Message(String),
    /// The channel is gone. `error` is `None` for a clean close.
    Closed { error: Option<String> },
}

/// A [`TransportEvent`] tagged with the generation of the channel that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub generation: u64,
    pub event: TransportEvent,
}

/// Instructions from the session to a channel task.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelCommand {
    /// Send one text frame.
    Send(String),
    /// Close the connection gracefully.
    Close,
}

/// Result of queueing an outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Queued,
    /// The outbound queue is full; the frame was dropped.
    Full,
    /// The channel task has exited; the frame was dropped.
    Closed,
}

/// Session-side handle to one channel.
///
/// Dropping the handle closes the channel.
#[derive(Debug)]
pub struct ChannelHandle {
    commands: mpsc::Sender<ChannelCommand>,
}

impl ChannelHandle {
    pub fn new(commands: mpsc::Sender<ChannelCommand>) -> Self {
        Self { commands }
    }

    /// Queue a text frame without waiting. Never blocks the event loop.
    pub fn try_send(&self, text: String) -> SendStatus {
        match self.commands.try_send(ChannelCommand::Send(text)) {
            Ok(()) => SendStatus::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => SendStatus::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => SendStatus::Closed,
        }
    }

    /// Ask the channel task to close. Falls back to dropping the queue when it is full.
    pub fn close(self) {
        if self.commands.try_send(ChannelCommand::Close).is_err() {
            debug!("Close command not queued; dropping channel handle instead");
        }
    }
}

/// Opens channels to an endpoint.
///
/// Implementations must return immediately and report progress through
/// `events`; the session never awaits a connection attempt.
pub trait Connector: Send {
    fn open(
        &mut self,
        endpoint: &str,
        generation: u64,
        queue_capacity: usize,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> ChannelHandle;
}

/// Default bound on the TCP connect plus WebSocket (and TLS) handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

static CRYPTO_PROVIDER: Once = Once::new();

/// Make ring the process-wide rustls provider for `wss://` endpoints.
fn install_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!("A rustls crypto provider was already installed");
        }
    });
}

/// Production connector backed by `tokio-tungstenite`.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Connector for WebSocketConnector {
    fn open(
        &mut self,
        endpoint: &str,
        generation: u64,
        queue_capacity: usize,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> ChannelHandle {
        install_crypto_provider();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        tokio::spawn(run_channel(
            endpoint.to_string(),
            generation,
            self.connect_timeout,
            rx,
            events,
        ));
        ChannelHandle::new(tx)
    }
}

/// Drive one WebSocket connection until it closes.
///
/// # Protocol
/// 1. Performs the client handshake against `endpoint`, giving up after `connect_timeout`
/// 2. Forwards queued commands to the socket and inbound text frames to `events`
/// 3. Emits exactly one `Closed` event, whichever side ends the connection
async fn run_channel(
    endpoint: String,
    generation: u64,
    connect_timeout: Duration,
    mut commands: mpsc::Receiver<ChannelCommand>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let emit = |event: TransportEvent| {
        // The session may already be gone during teardown.
        let _ = events.send(ChannelEvent { generation, event });
    };

    let connect = tokio_tungstenite::connect_async(endpoint.as_str());
    let socket = match tokio::time::timeout(connect_timeout, connect).await {
        Ok(Ok((socket, _response))) => socket,
        Ok(Err(e)) => {
            warn!("❌ Channel #{} could not connect to {}: {}", generation, endpoint, e);
            emit(TransportEvent::Closed {
                error: Some(e.to_string()),
            });
            return;
        }
        Err(_) => {
            let error = format!("connect timed out after {}ms", connect_timeout.as_millis());
            warn!("❌ Channel #{} to {}: {}", generation, endpoint, error);
            emit(TransportEvent::Closed { error: Some(error) });
            return;
        }
    };

    info!("🔗 Channel #{} connected to {}", generation, endpoint);
    emit(TransportEvent::Opened);

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ChannelCommand::Send(text)) => {
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        warn!("❌ Channel #{} send failed: {}", generation, e);
                        emit(TransportEvent::Closed { error: Some(e.to_string()) });
                        return;
                    }
                }
                Some(ChannelCommand::Close) | None => {
                    if let Err(e) = sink.close().await {
                        debug!("Channel #{} close handshake failed: {}", generation, e);
                    }
                    emit(TransportEvent::Closed { error: None });
                    return;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => emit(TransportEvent::Message(text)),
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Channel #{} closed by verifier", generation);
                    emit(TransportEvent::Closed { error: None });
                    return;
                }
                // Binary frames are not part of the protocol; pings are answered by tungstenite.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("❌ Channel #{} receive failed: {}", generation, e);
                    emit(TransportEvent::Closed { error: Some(e.to_string()) });
                    return;
                }
            },
        }
    }
}

/// Build the conventional verifier endpoint for a host, e.g. `ws://localhost:5000/ws`.
pub fn endpoint_for_host(host: &str, tls: bool) -> String {
    let scheme = if tls { "wss" } else { "ws" };
    format!("{}://{}/ws", scheme, host.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_for_host() {
        assert_eq!(endpoint_for_host("localhost:5000", false), "ws://localhost:5000/ws");
        assert_eq!(endpoint_for_host("verify.example.com/", true), "wss://verify.example.com/ws");
    }

    #[test]
    fn test_handle_reports_backpressure() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = ChannelHandle::new(tx);

        assert_eq!(handle.try_send("a".to_string()), SendStatus::Queued);
        assert_eq!(handle.try_send("b".to_string()), SendStatus::Full);

        assert_eq!(rx.try_recv().unwrap(), ChannelCommand::Send("a".to_string()));
        drop(rx);
        assert_eq!(handle.try_send("c".to_string()), SendStatus::Closed);
    }

    #[test]
    fn test_close_is_queued_behind_frames() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = ChannelHandle::new(tx);

        handle.try_send("frame".to_string());
        handle.close();

        assert_eq!(rx.try_recv().unwrap(), ChannelCommand::Send("frame".to_string()));
        assert_eq!(rx.try_recv().unwrap(), ChannelCommand::Close);
    }

    #[tokio::test]
    async fn test_invalid_endpoint_emits_single_error_close() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut connector = WebSocketConnector::default();

        let _handle = connector.open("http://127.0.0.1/ws", 7, 4, events_tx);

        let event = events_rx.recv().await.unwrap();
        assert_eq!(event.generation, 7);
        assert!(matches!(event.event, TransportEvent::Closed { error: Some(_) }));
        assert!(events_rx.recv().await.is_none());
    }

    fn close_error(event: ChannelEvent) -> String {
        match event.event {
            TransportEvent::Closed { error: Some(error) } => error,
            other => panic!("expected an error close, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_secure_endpoint_attempts_tls_handshake() {
        // Accepts TCP and hangs up, so the TLS handshake itself fails
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut connector = WebSocketConnector::default();
        let endpoint = endpoint_for_host(&addr.to_string(), true);
        let _handle = connector.open(&endpoint, 1, 4, events_tx);

        let error = close_error(events_rx.recv().await.unwrap());
        assert!(!error.contains("not compiled in"), "{}", error);
        assert!(!error.contains("timed out"), "{}", error);
    }

    #[tokio::test]
    async fn test_stalled_handshake_times_out() {
        // Completes TCP in the backlog but never answers the upgrade request
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut connector = WebSocketConnector::new(Duration::from_millis(200));
        let endpoint = endpoint_for_host(&addr.to_string(), false);
        let _handle = connector.open(&endpoint, 3, 4, events_tx);

        let event = events_rx.recv().await.unwrap();
        assert_eq!(event.generation, 3);
        assert_eq!(close_error(event), "connect timed out after 200ms");
        assert!(events_rx.recv().await.is_none());
        drop(listener);
    }
}
