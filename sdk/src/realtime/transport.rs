//! Transport links.
//!
//! A [`Link`] is one authenticated connection over a single transport. The
//! channel driver owns at most one link at a time and replaces it when the
//! link drops.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::{StatusCode, Url};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::config::{RealtimeConfig, Transport};
use super::error::RealtimeError;
use super::messages::{AuthPayload, ClientFrame, ServerFrame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Capacity of the incoming frame buffer per link.
const INCOMING_BUFFER: usize = 1000;

/// Pause between empty poll responses.
const POLL_IDLE_DELAY: Duration = Duration::from_millis(50);

enum Writer {
    WebSocket(WsSink),
    Polling { http: reqwest::Client, send_url: Url },
}

/// An authenticated connection over one transport.
pub(crate) struct Link {
    transport: Transport,
    sid: Option<String>,
    incoming: mpsc::Receiver<ServerFrame>,
    writer: Writer,
    reader: JoinHandle<()>,
}

impl Link {
    /// Opens and authenticates a link, bounded by the connect timeout.
    pub(crate) async fn open(
        config: &RealtimeConfig,
        transport: Transport,
        auth: &AuthPayload,
    ) -> Result<Self, RealtimeError> {
        let attempt = async {
            match transport {
                Transport::WebSocket => open_websocket(config, auth).await,
                Transport::Polling => open_polling(config, auth).await,
            }
        };

        tokio::time::timeout(config.connect_timeout, attempt)
            .await
            .map_err(|_| RealtimeError::Timeout)?
    }

    /// Returns the transport carrying this link.
    pub(crate) const fn transport(&self) -> Transport {
        self.transport
    }

    /// Returns the server-assigned session ID.
    pub(crate) fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    /// Receives the next server frame. `None` means the link dropped.
    pub(crate) async fn recv(&mut self) -> Option<ServerFrame> {
        self.incoming.recv().await
    }

    /// Sends a frame to the server.
    pub(crate) async fn send(&mut self, frame: &ClientFrame) -> Result<(), RealtimeError> {
        match &mut self.writer {
            Writer::WebSocket(sink) => {
                let json = serde_json::to_string(frame)
                    .map_err(|e| RealtimeError::Serialization(e.to_string()))?;
                sink.send(Message::Text(json.into()))
                    .await
                    .map_err(|e| RealtimeError::SendFailed(e.to_string()))
            }
            Writer::Polling { http, send_url } => {
                let resp = http
                    .post(send_url.clone())
                    .json(frame)
                    .send()
                    .await
                    .map_err(|e| RealtimeError::SendFailed(e.to_string()))?;
                check_auth_status(resp.status())?;
                if !resp.status().is_success() {
                    return Err(RealtimeError::SendFailed(format!(
                        "server returned {}",
                        resp.status()
                    )));
                }
                Ok(())
            }
        }
    }

    /// Closes the link gracefully.
    pub(crate) async fn close(mut self) {
        if let Writer::WebSocket(sink) = &mut self.writer {
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
            return;
        }
        let _ = self.send(&ClientFrame::Disconnect).await;
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn check_auth_status(status: StatusCode) -> Result<(), RealtimeError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RealtimeError::AuthRejected(format!(
            "server returned {}",
            status
        )));
    }
    Ok(())
}

async fn open_websocket(
    config: &RealtimeConfig,
    auth: &AuthPayload,
) -> Result<Link, RealtimeError> {
    let url = config.websocket_url();
    debug!("Opening WebSocket link to {}", url);

    let (ws_stream, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok(ok) => ok,
        Err(tungstenite::Error::Http(resp)) => {
            let status = resp.status();
            check_auth_status(status)?;
            return Err(RealtimeError::Connection(format!(
                "upgrade refused with {}",
                status
            )));
        }
        Err(e) => return Err(RealtimeError::Connection(e.to_string())),
    };

    let (mut sink, mut source) = ws_stream.split();

    let hello = serde_json::to_string(&ClientFrame::Auth(auth.clone()))
        .map_err(|e| RealtimeError::Serialization(e.to_string()))?;
    sink.send(Message::Text(hello.into()))
        .await
        .map_err(|e| RealtimeError::SendFailed(e.to_string()))?;

    let sid = await_handshake(&mut source).await?;

    let (tx, incoming) = mpsc::channel(INCOMING_BUFFER);
    let reader = tokio::spawn(read_websocket(source, tx));

    Ok(Link {
        transport: Transport::WebSocket,
        sid,
        incoming,
        writer: Writer::WebSocket(sink),
        reader,
    })
}

/// Waits for the server's answer to the auth frame.
async fn await_handshake(source: &mut WsSource) -> Result<Option<String>, RealtimeError> {
    while let Some(result) = source.next().await {
        match result? {
            Message::Text(text) => {
                let frame = serde_json::from_str::<ServerFrame>(&text)
                    .map_err(|e| RealtimeError::Deserialization(e.to_string()))?;
                match frame {
                    ServerFrame::Connected { sid } => return Ok(sid),
                    ServerFrame::ConnectError { message } => {
                        return Err(RealtimeError::AuthRejected(message))
                    }
                    other => debug!("Ignoring frame before handshake: {:?}", other),
                }
            }
            Message::Close(_) => return Err(RealtimeError::Closed),
            _ => {}
        }
    }
    Err(RealtimeError::Closed)
}

async fn read_websocket(mut source: WsSource, tx: mpsc::Sender<ServerFrame>) {
    while let Some(result) = source.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerFrame>(&text) {
                Ok(frame) => {
                    if tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Dropping malformed frame: {}", e),
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                debug!("WebSocket read failed: {}", e);
                break;
            }
            _ => {}
        }
    }
}

fn parse_url(raw: &str) -> Result<Url, RealtimeError> {
    Url::parse(raw).map_err(|e| RealtimeError::InvalidConfig(format!("{}: {}", raw, e)))
}

fn with_sid(mut url: Url, sid: &str) -> Url {
    url.query_pairs_mut().append_pair("sid", sid);
    url
}

async fn open_polling(config: &RealtimeConfig, auth: &AuthPayload) -> Result<Link, RealtimeError> {
    let handshake_url = parse_url(&config.polling_url("handshake"))?;
    debug!("Opening polling link via {}", handshake_url);

    let http = reqwest::Client::builder()
        .user_agent(format!("lexmarket-sdk/{}", env!("CARGO_PKG_VERSION")))
        .build()?;

    let resp = http.post(handshake_url).json(auth).send().await?;
    check_auth_status(resp.status())?;
    if !resp.status().is_success() {
        return Err(RealtimeError::Connection(format!(
            "handshake returned {}",
            resp.status()
        )));
    }

    let frame: ServerFrame = resp
        .json()
        .await
        .map_err(|e| RealtimeError::Deserialization(e.to_string()))?;
    let sid = match frame {
        ServerFrame::Connected { sid: Some(sid) } => sid,
        ServerFrame::Connected { sid: None } => {
            return Err(RealtimeError::Protocol(
                "polling handshake returned no sid".to_string(),
            ))
        }
        ServerFrame::ConnectError { message } => return Err(RealtimeError::AuthRejected(message)),
        other => {
            return Err(RealtimeError::Protocol(format!(
                "unexpected handshake frame: {:?}",
                other
            )))
        }
    };

    let poll_url = with_sid(parse_url(&config.polling_url("poll"))?, &sid);
    let send_url = with_sid(parse_url(&config.polling_url("send"))?, &sid);

    let (tx, incoming) = mpsc::channel(INCOMING_BUFFER);
    let reader = tokio::spawn(read_polling(http.clone(), poll_url, tx));

    Ok(Link {
        transport: Transport::Polling,
        sid: Some(sid),
        incoming,
        writer: Writer::Polling { http, send_url },
        reader,
    })
}

async fn read_polling(http: reqwest::Client, poll_url: Url, tx: mpsc::Sender<ServerFrame>) {
    loop {
        let resp = match http.get(poll_url.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!("Poll request failed: {}", e);
                break;
            }
        };

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let _ = tx
                .send(ServerFrame::ConnectError {
                    message: format!("server returned {}", status),
                })
                .await;
            break;
        }
        if !status.is_success() {
            debug!("Poll returned {}", status);
            break;
        }

        let frames: Vec<ServerFrame> = match resp.json().await {
            Ok(frames) => frames,
            Err(e) => {
                warn!("Dropping malformed poll response: {}", e);
                break;
            }
        };

        if frames.is_empty() {
            tokio::time::sleep(POLL_IDLE_DELAY).await;
            continue;
        }

        for frame in frames {
            if tx.send(frame).await.is_err() {
                return;
            }
        }
    }
}
