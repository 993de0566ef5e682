//! Async WebSocket transport for the order book stream.
//!
//! This module is organized by concern:
//! - [`connection`] - session lifecycle, reconnection and intent handling
//! - [`retry`] - reconnect delay policy

pub mod connection;
mod retry;

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::{debug, info};
use tungstenite::Message;
use tungstenite::http::HeaderValue;
use tungstenite::http::header::AUTHORIZATION;

use crate::Result;
use crate::error::MirrorError;
use crate::models::OutboundMessage;

pub use connection::{DisconnectReason, SessionController, SessionSettings};
pub use retry::RetryPolicy;

/// Write half of an order book WebSocket connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of an order book WebSocket connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Opens a mutually authenticated WebSocket connection.
///
/// `authorization` is sent verbatim as the `Authorization` header of the
/// upgrade request. No transport-level keepalive is configured; liveness
/// is handled with application `ping`/`pong` messages.
///
/// # Errors
///
/// Returns a [`MirrorError`] if the URL or header is invalid, or if the
/// TCP connect, TLS handshake or WebSocket upgrade fails.
pub async fn connect(
    url: &str,
    tls_config: Arc<rustls::ClientConfig>,
    authorization: &str,
) -> Result<(WsWriter, WsReader)> {
    let mut request = url.into_client_request()?;

    let mut header = HeaderValue::from_str(authorization)
        .map_err(|e| MirrorError::Config(format!("invalid authorization header: {e}")))?;
    header.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, header);

    let (ws_stream, response) = connect_async_tls_with_config(
        request,
        None,
        false,
        Some(Connector::Rustls(tls_config)),
    )
    .await?;
    info!(status = %response.status(), "WebSocket handshake completed");

    Ok(ws_stream.split())
}

/// Serializes and sends a client frame, such as the `pong` the sync
/// machine asks for.
///
/// # Errors
///
/// Returns a [`MirrorError`] if serialization or sending fails.
pub async fn send<W>(write: &mut W, message: &OutboundMessage) -> Result<()>
where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(message)?;
    write.send(Message::Text(json.into())).await?;
    debug!(msg_type = message.message_type(), "Sent message");

    Ok(())
}

/// Asks the server to push a fresh full snapshot.
///
/// # Errors
///
/// Returns a [`MirrorError`] if sending the message fails.
pub async fn request_snapshot<W>(write: &mut W) -> Result<()>
where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    send(write, &OutboundMessage::snapshot_request()).await?;
    info!("Sent orderbook-snapshot request");

    Ok(())
}
