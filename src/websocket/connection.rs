//! WebSocket session lifecycle management.
//!
//! [`SessionController`] connects, runs the [`SyncMachine`] against the
//! inbound stream, handles operator and timer intents between messages,
//! and reconnects after a fixed delay whenever a session ends. It only
//! stops when an [`Intent::Exit`] arrives.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use futures_util::{Sink, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tungstenite::Message;
use zeroize::Zeroizing;

use super::{RetryPolicy, connect, request_snapshot, send};
use crate::command::Intent;
use crate::models::InboundMessage;
use crate::persist::{self, SaveCause};
use crate::scheduler::{SessionTimers, TimerSettings};
use crate::sync::{SequenceGap, Step, SyncMachine, SyncState};

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Connect failed, or the connection errored or ended.
    ConnectionError,
    /// The server sent a close frame.
    Closed,
    /// A change arrived out of sequence.
    SequenceGap(SequenceGap),
    /// A frame could not be parsed.
    MalformedMessage,
    /// Exit was requested.
    Shutdown,
}

/// Everything a controller needs besides the TLS config.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub url: String,
    pub authorization: Zeroizing<String>,
    pub output_dir: PathBuf,
    pub timers: TimerSettings,
    pub retry: RetryPolicy,
}

/// Owns the transport session and the synchronized order book.
pub struct SessionController {
    settings: SessionSettings,
    tls_config: Arc<rustls::ClientConfig>,
    machine: SyncMachine,
    intent_tx: mpsc::UnboundedSender<Intent>,
    intent_rx: mpsc::UnboundedReceiver<Intent>,
    shutdown_tx: watch::Sender<bool>,
    /// A snapshot request made while disconnected, sent on the next connect.
    pending_request: bool,
}

impl SessionController {
    /// Creates a controller with its own intent channel.
    #[must_use]
    pub fn new(settings: SessionSettings, tls_config: Arc<rustls::ClientConfig>) -> Self {
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            settings,
            tls_config,
            machine: SyncMachine::new(),
            intent_tx,
            intent_rx,
            shutdown_tx,
            pending_request: false,
        }
    }

    /// Returns a sender for operator intents.
    #[must_use]
    pub fn intents(&self) -> mpsc::UnboundedSender<Intent> {
        self.intent_tx.clone()
    }

    /// Returns a receiver that flips to `true` once exit was requested.
    #[must_use]
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    #[must_use]
    pub fn machine(&self) -> &SyncMachine {
        &self.machine
    }

    /// Runs sessions until exit is requested.
    ///
    /// A sequence gap reconnects at once. Every other session failure
    /// (connect error, closed or broken connection, malformed frame) is
    /// followed by the retry policy's delay. There is no attempt limit.
    pub async fn run(mut self) -> SyncMachine {
        loop {
            self.machine.begin_session();

            info!(url = %self.settings.url, "Connecting to WebSocket");
            let reason = match connect(
                &self.settings.url,
                self.tls_config.clone(),
                &self.settings.authorization,
            )
            .await
            {
                Ok((write, read)) => {
                    let timers = SessionTimers::arm(
                        self.settings.timers,
                        &self.intent_tx,
                        &self.shutdown_tx.subscribe(),
                    );
                    debug!(timers = ?timers.names(), "Session timers armed");
                    self.run_session(write, read).await
                }
                Err(e) => {
                    error!("Connection failed: {e}");
                    DisconnectReason::ConnectionError
                }
            };

            let stats = self.machine.stats();
            info!(
                reason = ?reason,
                snapshots = stats.snapshots,
                applied = stats.changes_applied,
                dropped = stats.changes_dropped,
                "Session ended"
            );

            if reason == DisconnectReason::Shutdown {
                break;
            }
            if stats.snapshots > 0 {
                self.settings.retry.reset();
            }
            if matches!(reason, DisconnectReason::SequenceGap(_)) {
                // The connection was healthy; a new one brings a fresh snapshot.
                info!("Reconnecting immediately to resynchronize");
                continue;
            }

            let delay = self.settings.retry.next_delay();
            info!(delay_secs = delay.as_secs(), "Waiting before reconnecting");
            if !self.wait_before_reconnect(delay).await {
                break;
            }
        }

        info!("Session controller stopped");
        self.machine
    }

    /// Sleeps for `delay` while still honoring intents. Returns `false` if
    /// exit was requested.
    async fn wait_before_reconnect(&mut self, delay: std::time::Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = &mut sleep => return true,
                intent = self.intent_rx.recv() => match intent {
                    Some(Intent::Exit) | None => {
                        self.shutdown_tx.send_replace(true);
                        return false;
                    }
                    Some(Intent::Save(cause)) => {
                        self.save(cause);
                    }
                    Some(Intent::RequestSnapshot) => {
                        info!("Not connected, snapshot request deferred to next session");
                        self.pending_request = true;
                    }
                },
            }
        }
    }

    /// Runs one session over an established connection.
    ///
    /// Intents are handled before the next frame is read; frames are
    /// handled one at a time in arrival order.
    pub async fn run_session<W, R>(&mut self, mut write: W, mut read: R) -> DisconnectReason
    where
        W: Sink<Message, Error = tungstenite::Error> + Unpin,
        R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        if std::mem::take(&mut self.pending_request) {
            if let Some(reason) = self.handle_intent(Intent::RequestSnapshot, &mut write).await {
                return reason;
            }
        }

        loop {
            tokio::select! {
                biased;

                intent = self.intent_rx.recv() => {
                    let intent = intent.unwrap_or(Intent::Exit);
                    if let Some(reason) = self.handle_intent(intent, &mut write).await {
                        return reason;
                    }
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(reason) = self.on_text(text.as_str(), &mut write).await {
                                return reason;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!(frame = ?frame, "Server closed the connection");
                            return DisconnectReason::Closed;
                        }
                        Some(Ok(_)) => {} // Binary/Ping/Pong frames
                        Some(Err(e)) => {
                            warn!("WebSocket error: {e}");
                            return DisconnectReason::ConnectionError;
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return DisconnectReason::ConnectionError;
                        }
                    }
                }
            }
        }
    }

    async fn on_text<W>(&mut self, text: &str, write: &mut W) -> Option<DisconnectReason>
    where
        W: Sink<Message, Error = tungstenite::Error> + Unpin,
    {
        let message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(bytes = text.len(), "Failed to parse message: {e}");
                return Some(DisconnectReason::MalformedMessage);
            }
        };
        debug!(bytes = text.len(), "Message received");

        match self.machine.handle(message) {
            Step::Continue => None,
            Step::Reply(reply) => match send(write, &reply).await {
                Ok(()) => None,
                Err(e) => {
                    warn!("Failed to send {}: {e}", reply.message_type());
                    Some(DisconnectReason::ConnectionError)
                }
            },
            Step::Abandon(gap) => Some(DisconnectReason::SequenceGap(gap)),
        }
    }

    async fn handle_intent<W>(&mut self, intent: Intent, write: &mut W) -> Option<DisconnectReason>
    where
        W: Sink<Message, Error = tungstenite::Error> + Unpin,
    {
        match intent {
            Intent::RequestSnapshot => {
                // Stop applying changes before the request leaves.
                self.machine.request_resync();
                if let Err(e) = request_snapshot(write).await {
                    warn!("Failed to send snapshot request: {e}");
                    return Some(DisconnectReason::ConnectionError);
                }
                None
            }
            Intent::Save(cause) => {
                self.save(cause);
                None
            }
            Intent::Exit => {
                info!("Exit requested");
                self.shutdown_tx.send_replace(true);
                Some(DisconnectReason::Shutdown)
            }
        }
    }

    /// Writes a point-in-time copy of the book on a blocking thread.
    ///
    /// Returns `None` when there is nothing to save yet.
    pub fn save(&self, cause: SaveCause) -> Option<JoinHandle<()>> {
        let Some(snapshot) = self.machine.snapshot_copy() else {
            warn!(cause = cause.label(), "No snapshot received yet, nothing to save");
            return None;
        };
        if self.machine.state() != SyncState::Synced {
            debug!(state = ?self.machine.state(), "Saving last accepted book while not synchronized");
        }

        let dir = self.settings.output_dir.clone();
        Some(tokio::task::spawn_blocking(move || {
            match persist::save_snapshot(&dir, &snapshot, cause, Utc::now()) {
                Ok(path) => info!(path = %path.display(), seq_no = snapshot.seq_no, "Order book saved"),
                Err(e) => error!(cause = cause.label(), "Failed to save order book: {e}"),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::time::Duration;

    use futures_util::{SinkExt, stream};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    fn test_tls_config() -> Arc<rustls::ClientConfig> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(rustls::RootCertStore::empty())
            .with_no_client_auth();
        Arc::new(config)
    }

    fn controller(output_dir: PathBuf) -> SessionController {
        let settings = SessionSettings {
            url: "wss://localhost:1/ws".into(),
            authorization: Zeroizing::new("Basic dTpw".into()),
            output_dir,
            timers: TimerSettings::default(),
            retry: RetryPolicy::fixed(Duration::from_secs(5)),
        };
        SessionController::new(settings, test_tls_config())
    }

    fn text(value: serde_json::Value) -> Result<Message, tungstenite::Error> {
        Ok(Message::Text(value.to_string().into()))
    }

    fn snapshot_frame(seq_no: u64) -> Result<Message, tungstenite::Error> {
        text(json!({
            "type": "orderbook-snapshot",
            "payload": {
                "seqNo": seq_no,
                "timeDelta": 4,
                "data": [{
                    "period": {"start": "2024-05-01T10:00:00Z", "end": "2024-05-01T10:15:00Z"},
                    "buyList": [
                        {"price": 100, "quantity": 5, "ownQuantity": 0},
                        {"price": 99, "quantity": 3, "ownQuantity": 0}
                    ],
                    "sellList": []
                }]
            }
        }))
    }

    fn change_frame(seq_no: u64) -> Result<Message, tungstenite::Error> {
        text(json!({
            "type": "orderbook-change",
            "payload": {
                "seqNo": seq_no,
                "timeDelta": 2,
                "data": [{
                    "period": {"start": "2024-05-01T10:00:00Z", "end": "2024-05-01T10:15:00Z"},
                    "buyChanges": [{"index": 0, "action": "remove"}]
                }]
            }
        }))
    }

    fn sent_types(sent: &[Message]) -> Vec<String> {
        sent.iter()
            .filter_map(|m| match m {
                Message::Text(t) => {
                    let v: serde_json::Value = serde_json::from_str(t.as_str()).ok()?;
                    v["type"].as_str().map(String::from)
                }
                _ => None,
            })
            .collect()
    }

    async fn run(
        controller: &mut SessionController,
        frames: Vec<Result<Message, tungstenite::Error>>,
    ) -> (DisconnectReason, Vec<Message>) {
        let mut sent: Vec<Message> = Vec::new();
        let reason = {
            let write = (&mut sent).sink_map_err(|never: Infallible| -> tungstenite::Error {
                match never {}
            });
            controller.run_session(write, stream::iter(frames)).await
        };
        (reason, sent)
    }

    #[tokio::test]
    async fn applies_snapshot_and_changes_then_reports_stream_end() {
        let mut controller = controller(PathBuf::from("."));
        let (reason, sent) = run(
            &mut controller,
            vec![snapshot_frame(10), change_frame(11)],
        )
        .await;

        assert_eq!(reason, DisconnectReason::ConnectionError);
        assert!(sent.is_empty());
        assert_eq!(controller.machine().store().last_seq_no(), Some(11));
        assert_eq!(controller.machine().state(), SyncState::Synced);
    }

    #[tokio::test]
    async fn answers_ping_with_pong() {
        let mut controller = controller(PathBuf::from("."));
        let (_, sent) = run(&mut controller, vec![text(json!({"type": "ping"}))]).await;
        assert_eq!(sent_types(&sent), vec!["pong"]);
    }

    #[tokio::test]
    async fn sequence_gap_abandons_session_and_keeps_book() {
        let mut controller = controller(PathBuf::from("."));
        let (reason, _) = run(
            &mut controller,
            vec![snapshot_frame(10), change_frame(12), change_frame(11)],
        )
        .await;

        assert_eq!(
            reason,
            DisconnectReason::SequenceGap(SequenceGap {
                expected: Some(11),
                received: 12
            })
        );
        let book = controller.machine().store().current_state().unwrap();
        assert_eq!(book.seq_no, 10);
        assert_eq!(book.data[0].buy_list.len(), 2);
    }

    #[tokio::test]
    async fn malformed_frame_ends_session() {
        let mut controller = controller(PathBuf::from("."));
        let (reason, _) = run(
            &mut controller,
            vec![Ok(Message::Text("{not json".into())), snapshot_frame(1)],
        )
        .await;

        assert_eq!(reason, DisconnectReason::MalformedMessage);
        assert!(controller.machine().store().is_empty());
    }

    #[tokio::test]
    async fn close_frame_ends_session() {
        let mut controller = controller(PathBuf::from("."));
        let (reason, _) = run(&mut controller, vec![Ok(Message::Close(None))]).await;
        assert_eq!(reason, DisconnectReason::Closed);
    }

    #[tokio::test]
    async fn unknown_types_and_binary_frames_are_skipped() {
        let mut controller = controller(PathBuf::from("."));
        let (reason, _) = run(
            &mut controller,
            vec![
                snapshot_frame(10),
                text(json!({"type": "announcement", "payload": {}})),
                Ok(Message::Binary(vec![1, 2, 3].into())),
                change_frame(11),
            ],
        )
        .await;

        assert_eq!(reason, DisconnectReason::ConnectionError);
        assert_eq!(controller.machine().store().last_seq_no(), Some(11));
    }

    #[tokio::test]
    async fn snapshot_request_is_sent_and_suppresses_changes() {
        let mut controller = controller(PathBuf::from("."));
        run(&mut controller, vec![snapshot_frame(10)]).await;

        controller.intents().send(Intent::RequestSnapshot).unwrap();
        let (_, sent) = run(&mut controller, vec![change_frame(11), change_frame(12)]).await;

        assert_eq!(sent_types(&sent), vec!["orderbook-snapshot"]);
        assert_eq!(controller.machine().state(), SyncState::AwaitingResync);
        assert_eq!(controller.machine().store().last_seq_no(), Some(10));
        assert_eq!(controller.machine().stats().changes_dropped, 2);

        let (_, _) = run(&mut controller, vec![snapshot_frame(20), change_frame(21)]).await;
        assert_eq!(controller.machine().store().last_seq_no(), Some(21));
    }

    #[tokio::test]
    async fn exit_intent_stops_session_and_raises_shutdown() {
        let mut controller = controller(PathBuf::from("."));
        let shutdown = controller.shutdown_signal();
        controller.intents().send(Intent::Exit).unwrap();

        let (reason, _) = run(&mut controller, vec![snapshot_frame(10)]).await;

        assert_eq!(reason, DisconnectReason::Shutdown);
        assert!(*shutdown.borrow());
        assert!(controller.machine().store().is_empty());
    }

    #[tokio::test]
    async fn save_writes_point_in_time_copy() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(dir.path().to_path_buf());

        assert!(controller.save(SaveCause::Manual).is_none());

        run(&mut controller, vec![snapshot_frame(10), change_frame(11)]).await;
        controller.save(SaveCause::Autosave).unwrap().await.unwrap();

        let files: Vec<PathBuf> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("orderbook_snapshot-autosave_"), "{name}");

        let saved = persist::load_snapshot(&files[0]).unwrap();
        assert_eq!(Some(&saved), controller.machine().store().current_state());
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_wait_handles_intents() {
        let mut controller = controller(PathBuf::from("."));
        let tx = controller.intents();

        tx.send(Intent::RequestSnapshot).unwrap();
        assert!(controller.wait_before_reconnect(Duration::from_secs(5)).await);
        assert!(controller.pending_request);

        tx.send(Intent::Exit).unwrap();
        assert!(!controller.wait_before_reconnect(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn sequence_gap_reconnects_without_waiting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut controller = controller(PathBuf::from("."));
        controller.settings.url = format!("ws://{}", listener.local_addr().unwrap());
        controller.settings.retry = RetryPolicy::fixed(Duration::from_secs(60));
        let intents = controller.intents();

        let server = async {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut first = tokio_tungstenite::accept_async(tcp).await.unwrap();
            first.send(snapshot_frame(10).unwrap()).await.unwrap();
            first.send(change_frame(12).unwrap()).await.unwrap();

            let started = tokio::time::Instant::now();
            let accepted = tokio::time::timeout(Duration::from_secs(5), listener.accept()).await;
            let elapsed = started.elapsed();

            let second = match accepted {
                Ok(Ok((tcp, _))) => Some(tokio_tungstenite::accept_async(tcp).await.unwrap()),
                _ => None,
            };
            intents.send(Intent::Exit).unwrap();
            (second, elapsed, first)
        };

        let (machine, (second, elapsed, _first)) = tokio::join!(controller.run(), server);

        assert!(second.is_some(), "no reconnect within 5s of the gap");
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
        assert_eq!(machine.store().last_seq_no(), Some(10));
    }

    #[tokio::test]
    async fn deferred_request_is_sent_when_session_starts() {
        let mut controller = controller(PathBuf::from("."));
        controller.pending_request = true;

        let (_, sent) = run(&mut controller, vec![]).await;

        assert_eq!(sent_types(&sent), vec!["orderbook-snapshot"]);
        assert!(!controller.pending_request);
    }
}
