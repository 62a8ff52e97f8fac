//! WebSocket connection to a session, run as a tokio task.
//!
//! Every connection carries an id; events from a connection that has since
//! been replaced can be recognised and dropped by the receiver.

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::error::SessionError;

/// What a connection reports back to the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened(u64),
    Frame(u64, String),
    Closed(u64),
}

impl TransportEvent {
    pub fn connection_id(&self) -> u64 {
        match self {
            TransportEvent::Opened(id) | TransportEvent::Closed(id) => *id,
            TransportEvent::Frame(id, _) => *id,
        }
    }
}

/// WebSocket URL of a campaign session on `server`.
///
/// `http` and `https` map to `ws` and `wss`.
pub fn session_url(server: &str, campaign_id: &str) -> Result<String, SessionError> {
    let server = server.trim().trim_end_matches('/');
    let base = if let Some(rest) = server.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = server.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if server.starts_with("ws://") || server.starts_with("wss://") {
        server.to_string()
    } else {
        return Err(SessionError::InvalidUrl(server.to_string()));
    };
    Ok(format!("{}/ws/session/{}", base, campaign_id))
}

/// Handle to one live connection. Dropping it closes the connection.
pub struct SessionTransport {
    id: u64,
    outbound: UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl SessionTransport {
    /// Spawn the connection task; progress arrives on `events`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn connect(id: u64, url: String, events: UnboundedSender<TransportEvent>) -> Self {
        let (outbound, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(id, url, rx, events));
        Self { id, outbound, task }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue a text frame for sending.
    pub fn send(&self, frame: String) -> Result<(), SessionError> {
        self.outbound
            .send(frame)
            .map_err(|_| SessionError::NotConnected)
    }
}

impl Drop for SessionTransport {
    fn drop(&mut self) {
        self.task.abort();
    }
}

type SessionStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn open_stream(url: &str) -> Result<SessionStream, SessionError> {
    let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await?;
    Ok(ws_stream)
}

async fn run_connection(
    id: u64,
    url: String,
    mut outbound: UnboundedReceiver<String>,
    events: UnboundedSender<TransportEvent>,
) {
    info!("connecting to {}", url);
    let ws_stream = match open_stream(&url).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!("connection to {} failed: {}", url, err);
            let _ = events.send(TransportEvent::Closed(id));
            return;
        }
    };
    let _ = events.send(TransportEvent::Opened(id));

    let (mut writer, mut reader) = ws_stream.split();
    loop {
        tokio::select! {
            inbound = reader.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if events.send(TransportEvent::Frame(id, text)).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("session closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!("session read failed: {}", SessionError::from(err));
                    break;
                }
            },
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    debug!("sending {} bytes", frame.len());
                    if let Err(err) = writer.send(Message::Text(frame)).await {
                        warn!("session write failed: {}", SessionError::from(err));
                        break;
                    }
                }
                None => {
                    let _ = writer.close().await;
                    break;
                }
            },
        }
    }
    let _ = events.send(TransportEvent::Closed(id));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_http_schemes_to_websocket() {
        assert_eq!(
            session_url("http://localhost:8000", "abc").unwrap(),
            "ws://localhost:8000/ws/session/abc"
        );
        assert_eq!(
            session_url("https://astral.example/", "abc").unwrap(),
            "wss://astral.example/ws/session/abc"
        );
        assert_eq!(
            session_url("ws://10.0.0.2:9000", "x").unwrap(),
            "ws://10.0.0.2:9000/ws/session/x"
        );
        assert!(session_url("localhost:8000", "abc").is_err());
    }

    #[tokio::test]
    async fn unreachable_server_reports_closed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = SessionTransport::connect(4, "ws://127.0.0.1:9/ws/session/x".to_string(), tx);
        assert_eq!(rx.recv().await, Some(TransportEvent::Closed(4)));
        assert_eq!(transport.id(), 4);
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let result = open_stream("ws://127.0.0.1:9/ws/session/x").await;
        assert!(matches!(result, Err(SessionError::Transport(_))));
    }
}
