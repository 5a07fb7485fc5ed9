//! Low-level stream websocket client and outbound command sender.
//!
//! The client owns a single websocket transport per connection instance and
//! hides transport churn from callers: outbound messages are queued while the
//! link is down, flushed in FIFO order after reconnect, and a recovery request
//! replays events missed since the last seen event id.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::stream::backoff::{ReconnectDecision, ReconnectPolicy};
use crate::stream::heartbeat::{Heartbeat, DEFAULT_HEARTBEAT_INTERVAL};
use crate::stream::proto::{
    ControlFrame, Envelope, ErrorInfo, CODE_AUTHENTICATION_FAILED, CODE_RATE_LIMIT_EXCEEDED,
    ERROR_TYPE, HEARTBEAT_TYPE,
};

type WsSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Logical connection state as seen by callers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    /// A transport open is in flight.
    Connecting,
    /// The transport is open and live sends go straight to the socket.
    Connected,
    /// No transport; sends are queued and may trigger a connect.
    Disconnected,
    /// Retry budget exhausted; only a manual connect resumes.
    Failed,
}

/// Classification key for [`StreamEvent`] values.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EventKind {
    Connected,
    Disconnected,
    Message,
    Error,
    AuthError,
    RateLimited,
    Failed,
}

/// Typed event emitted by the connection worker.
///
/// Asynchronous failures are never thrown across the API boundary; they all
/// arrive here.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Transport opened; queued messages flush immediately after this event.
    Connected,
    /// Transport closed, either explicitly or abnormally.
    Disconnected,
    /// Application message that did not map to a control type.
    Message(Envelope),
    /// Transport, protocol, or unclassified server error.
    Error(ErrorInfo),
    /// Server rejected the credentials; auto-reconnect is suppressed.
    AuthError(ErrorInfo),
    /// Server throttled the session; the next reconnect honors `retryAfter`.
    RateLimited(ErrorInfo),
    /// Retry budget exhausted after the given number of reconnect attempts.
    Failed { attempts: u32 },
}

impl StreamEvent {
    /// Dispatch key used by the session-layer handler registry.
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::Connected => EventKind::Connected,
            StreamEvent::Disconnected => EventKind::Disconnected,
            StreamEvent::Message(_) => EventKind::Message,
            StreamEvent::Error(_) => EventKind::Error,
            StreamEvent::AuthError(_) => EventKind::AuthError,
            StreamEvent::RateLimited(_) => EventKind::RateLimited,
            StreamEvent::Failed { .. } => EventKind::Failed,
        }
    }
}

/// Tunables for one stream connection.
#[derive(Clone, Debug)]
pub struct StreamOptions {
    /// Backoff policy applied after abnormal closures.
    pub reconnect: ReconnectPolicy,
    /// Keepalive probe interval while the transport is open.
    pub heartbeat_interval: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

/// Entry point for creating stream connections.
#[derive(Clone)]
pub struct StreamClient {
    url: String,
    api_key: Option<SecretString>,
    options: StreamOptions,
}

impl StreamClient {
    /// Creates a client for the given websocket endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            url: url.trim_end().to_string(),
            api_key: None,
            options: StreamOptions::default(),
        }
    }

    /// Attaches an API key sent as the `x-api-key` handshake header.
    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Overrides reconnect and heartbeat tunables.
    pub fn with_options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }

    /// Configured endpoint url.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Spawns the background worker and returns the connection handle.
    ///
    /// The worker starts in `Disconnected` and does not dial until the caller
    /// invokes [`StreamConnection::connect`] or queues a first send.
    pub fn open(&self) -> StreamConnection {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let config = WorkerConfig {
            url: self.url.clone(),
            api_key: self.api_key.clone(),
            options: self.options.clone(),
        };
        let state = WorkerState::new(event_tx, state_tx);

        tokio::spawn(async move {
            stream_worker(config, command_rx, state).await;
        });

        StreamConnection {
            sender: StreamSender { tx: command_tx },
            events: event_rx,
            state: state_rx,
        }
    }
}

/// Handle to one logical stream connection.
///
/// Dropping the handle (and every cloned [`StreamSender`]) shuts the worker
/// down and closes the socket with a normal closure.
#[derive(Debug)]
pub struct StreamConnection {
    sender: StreamSender,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    state: watch::Receiver<ConnectionState>,
}

impl StreamConnection {
    /// Returns a cloneable sender for commands and outbound messages.
    pub fn sender(&self) -> StreamSender {
        self.sender.clone()
    }

    /// Current connection state snapshot.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Begins a connect attempt; a no-op while the transport is open.
    pub fn connect(&self) -> Result<(), StreamError> {
        self.sender.connect()
    }

    /// Clears the retry counter, then connects.
    ///
    /// This is the explicit recovery path out of [`ConnectionState::Failed`];
    /// a plain [`connect`](Self::connect) performs one manual attempt without
    /// restoring the retry budget.
    pub fn reset_and_connect(&self) -> Result<(), StreamError> {
        self.sender.reset_and_connect()
    }

    /// Transmits now when open, otherwise queues the message FIFO.
    ///
    /// A queued send while `Disconnected` also triggers a connect attempt.
    pub fn send<T>(&self, message: &T) -> Result<(), StreamError>
    where
        T: Serialize + ?Sized,
    {
        self.sender.send(message)
    }

    /// Closes with a normal closure and suppresses auto-reconnect.
    ///
    /// Any pending backoff timer and the heartbeat interval are cancelled.
    pub fn disconnect(&self) -> Result<(), StreamError> {
        self.sender.disconnect()
    }

    /// Receives the next event from the worker.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Splits into sender, event receiver, and state watch.
    pub fn split(
        self,
    ) -> (
        StreamSender,
        mpsc::UnboundedReceiver<StreamEvent>,
        watch::Receiver<ConnectionState>,
    ) {
        (self.sender, self.events, self.state)
    }
}

/// Cloneable sender for connection commands and outbound messages.
#[derive(Clone, Debug)]
pub struct StreamSender {
    tx: mpsc::UnboundedSender<Command>,
}

impl StreamSender {
    /// Begins a connect attempt; a no-op while the transport is open.
    pub fn connect(&self) -> Result<(), StreamError> {
        self.command(Command::Connect { reset: false })
    }

    /// Clears the retry counter, then connects.
    pub fn reset_and_connect(&self) -> Result<(), StreamError> {
        self.command(Command::Connect { reset: true })
    }

    /// Transmits now when open, otherwise queues the message FIFO.
    pub fn send<T>(&self, message: &T) -> Result<(), StreamError>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(message)?;
        self.command(Command::Send(value))
    }

    /// Closes with a normal closure and suppresses auto-reconnect.
    pub fn disconnect(&self) -> Result<(), StreamError> {
        self.command(Command::Disconnect)
    }

    fn command(&self, command: Command) -> Result<(), StreamError> {
        self.tx
            .send(command)
            .map_err(|_| StreamError::SendQueueClosed)
    }
}

/// Errors produced by stream transport and protocol handling.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Websocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// API key could not be converted to a valid HTTP header value.
    #[error("invalid api-key header: {0}")]
    InvalidApiKeyHeader(#[from] InvalidHeaderValue),

    /// Worker command queue has been closed.
    #[error("command queue is closed")]
    SendQueueClosed,
}

#[derive(Debug)]
enum Command {
    Connect { reset: bool },
    Send(Value),
    Disconnect,
}

struct WorkerConfig {
    url: String,
    api_key: Option<SecretString>,
    options: StreamOptions,
}

struct WorkerState {
    events: mpsc::UnboundedSender<StreamEvent>,
    state: watch::Sender<ConnectionState>,
    pending: VecDeque<Value>,
    cursor: Option<String>,
    attempts: u32,
    rate_limit_delay: Option<Duration>,
    auth_rejected: bool,
}

impl WorkerState {
    fn new(events: mpsc::UnboundedSender<StreamEvent>, state: watch::Sender<ConnectionState>) -> Self {
        Self {
            events,
            state,
            pending: VecDeque::new(),
            cursor: None,
            attempts: 0,
            rate_limit_delay: None,
            auth_rejected: false,
        }
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn emit(&self, event: StreamEvent) {
        // A caller with no receiver observes silent loss; that is the
        // documented risk surface, not an error.
        let _ = self.events.send(event);
    }
}

enum Trigger {
    Connect,
    Shutdown,
}

enum SessionEnd {
    /// Command channel closed; the socket was closed gracefully.
    Shutdown,
    /// `disconnect()` or a server-side normal closure; no auto retry.
    Explicit,
    /// Transport error or abnormal closure; retry per policy.
    Abnormal,
}

enum WaitOutcome {
    Elapsed,
    ConnectNow,
    Cancelled,
    Shutdown,
}

async fn stream_worker(
    config: WorkerConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut state: WorkerState,
) {
    'idle: loop {
        match wait_for_connect_trigger(&mut commands, &mut state).await {
            Trigger::Connect => {}
            Trigger::Shutdown => return,
        }

        loop {
            state.set_state(ConnectionState::Connecting);
            match run_session_once(&config, &mut commands, &mut state).await {
                SessionEnd::Shutdown => return,
                SessionEnd::Explicit => {
                    state.set_state(ConnectionState::Disconnected);
                    state.emit(StreamEvent::Disconnected);
                    continue 'idle;
                }
                SessionEnd::Abnormal => {
                    state.set_state(ConnectionState::Disconnected);
                    state.emit(StreamEvent::Disconnected);

                    if state.auth_rejected {
                        debug!(event = "reconnect_suppressed", reason = "auth_rejected");
                        continue 'idle;
                    }

                    // Server-directed throttling replaces one backoff decision
                    // and does not consume the retry budget.
                    let delay = if let Some(delay) = state.rate_limit_delay.take() {
                        delay
                    } else {
                        match config.options.reconnect.next_attempt(state.attempts) {
                            ReconnectDecision::Retry { delay } => {
                                state.attempts += 1;
                                delay
                            }
                            ReconnectDecision::GiveUp => {
                                warn!(event = "reconnect_exhausted", attempts = state.attempts);
                                state.set_state(ConnectionState::Failed);
                                state.emit(StreamEvent::Failed {
                                    attempts: state.attempts,
                                });
                                continue 'idle;
                            }
                        }
                    };

                    debug!(
                        event = "reconnect_scheduled",
                        attempt = state.attempts,
                        max_attempts = config.options.reconnect.max_attempts,
                        delay_ms = delay.as_millis() as u64
                    );

                    match wait_before_reconnect(delay, &mut commands, &mut state).await {
                        WaitOutcome::Elapsed | WaitOutcome::ConnectNow => continue,
                        WaitOutcome::Cancelled => continue 'idle,
                        WaitOutcome::Shutdown => return,
                    }
                }
            }
        }
    }
}

/// Idles until something warrants dialing the endpoint.
///
/// Sends queued while `Disconnected` trigger a connect; while `Failed` they
/// stay queued until a manual connect, which is the terminal-state contract.
async fn wait_for_connect_trigger(
    commands: &mut mpsc::UnboundedReceiver<Command>,
    state: &mut WorkerState,
) -> Trigger {
    loop {
        match commands.recv().await {
            Some(Command::Connect { reset }) => {
                if reset {
                    state.attempts = 0;
                }
                return Trigger::Connect;
            }
            Some(Command::Send(value)) => {
                state.pending.push_back(value);
                if state.current_state() == ConnectionState::Disconnected {
                    return Trigger::Connect;
                }
            }
            Some(Command::Disconnect) => {
                state.set_state(ConnectionState::Disconnected);
            }
            None => return Trigger::Shutdown,
        }
    }
}

async fn run_session_once(
    config: &WorkerConfig,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    state: &mut WorkerState,
) -> SessionEnd {
    state.auth_rejected = false;

    let request = match build_request(config) {
        Ok(request) => request,
        Err(err) => {
            state.emit(StreamEvent::Error(ErrorInfo::local(err.to_string())));
            return SessionEnd::Abnormal;
        }
    };

    let mut socket = match connect_async(request).await {
        Ok((socket, _)) => socket,
        Err(err) => {
            warn!(event = "stream_connect_failed", error = %err);
            state.emit(StreamEvent::Error(ErrorInfo::local(format!(
                "websocket error: {err}"
            ))));
            return SessionEnd::Abnormal;
        }
    };

    state.attempts = 0;
    state.rate_limit_delay = None;
    state.set_state(ConnectionState::Connected);
    state.emit(StreamEvent::Connected);

    // Flush queued messages in enqueue order before anything else goes out.
    while let Some(next) = state.pending.pop_front() {
        let text = match serde_json::to_string(&next) {
            Ok(text) => text,
            Err(err) => {
                state.emit(StreamEvent::Error(ErrorInfo::local(format!(
                    "failed to serialize queued message: {err}"
                ))));
                continue;
            }
        };
        if send_text(&mut socket, text).await.is_err() {
            state.pending.push_front(next);
            return SessionEnd::Abnormal;
        }
    }

    // Request replay of events missed since the last seen cursor.
    if let Some(last_event_id) = state.cursor.clone() {
        let frame = ControlFrame::Recover { last_event_id };
        match frame.to_text() {
            Ok(text) => {
                if send_text(&mut socket, text).await.is_err() {
                    return SessionEnd::Abnormal;
                }
            }
            Err(err) => {
                state.emit(StreamEvent::Error(ErrorInfo::local(format!(
                    "failed to serialize recover frame: {err}"
                ))));
            }
        }
    }

    let mut heartbeat = Heartbeat::new(config.options.heartbeat_interval);
    let mut keepalive = heartbeat.timer();

    loop {
        tokio::select! {
            maybe_command = commands.recv() => {
                match maybe_command {
                    Some(Command::Send(value)) => {
                        let text = match serde_json::to_string(&value) {
                            Ok(text) => text,
                            Err(err) => {
                                state.emit(StreamEvent::Error(ErrorInfo::local(format!(
                                    "failed to serialize message: {err}"
                                ))));
                                continue;
                            }
                        };
                        if send_text(&mut socket, text).await.is_err() {
                            state.pending.push_front(value);
                            return SessionEnd::Abnormal;
                        }
                    }
                    Some(Command::Connect { reset }) => {
                        // Already open: connect is a no-op by contract.
                        if reset {
                            state.attempts = 0;
                        }
                    }
                    Some(Command::Disconnect) => {
                        let _ = socket.close(None).await;
                        return SessionEnd::Explicit;
                    }
                    None => {
                        let _ = socket.close(None).await;
                        return SessionEnd::Shutdown;
                    }
                }
            }
            maybe_inbound = socket.next() => {
                match maybe_inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(&text, state, &mut heartbeat);
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            return SessionEnd::Abnormal;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(frame))) => return close_outcome(frame.as_ref()),
                    Some(Ok(_)) => {
                        state.emit(StreamEvent::Error(ErrorInfo::local(
                            "received unsupported non-text frame",
                        )));
                    }
                    Some(Err(err)) => {
                        state.emit(StreamEvent::Error(ErrorInfo::local(format!(
                            "websocket error: {err}"
                        ))));
                        return SessionEnd::Abnormal;
                    }
                    None => return SessionEnd::Abnormal,
                }
            }
            _ = keepalive.tick() => {
                let text = match Heartbeat::frame().to_text() {
                    Ok(text) => text,
                    Err(_) => continue,
                };
                if send_text(&mut socket, text).await.is_err() {
                    return SessionEnd::Abnormal;
                }
            }
        }
    }
}

/// Classifies one inbound text frame and updates worker state.
///
/// Protocol errors never change connection state; they surface as local
/// `Error` events and leave the recovery cursor untouched.
fn handle_text(text: &str, state: &mut WorkerState, heartbeat: &mut Heartbeat) {
    let envelope = match Envelope::from_text(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!(event = "stream_parse_failed", error = %err);
            state.emit(StreamEvent::Error(ErrorInfo::local(
                "failed to parse message",
            )));
            return;
        }
    };

    if let Some(event_id) = &envelope.event_id {
        state.cursor = Some(event_id.clone());
    }

    match envelope.kind.as_str() {
        HEARTBEAT_TYPE => {
            heartbeat.observe_reply();
        }
        ERROR_TYPE => {
            let info = ErrorInfo::from_envelope(&envelope);
            match info.code.as_deref() {
                Some(CODE_AUTHENTICATION_FAILED) => {
                    state.auth_rejected = true;
                    state.emit(StreamEvent::AuthError(info));
                }
                Some(CODE_RATE_LIMIT_EXCEEDED) => {
                    state.rate_limit_delay = Some(Duration::from_millis(info.retry_after_ms()));
                    state.emit(StreamEvent::RateLimited(info));
                }
                _ => state.emit(StreamEvent::Error(info)),
            }
        }
        _ => state.emit(StreamEvent::Message(envelope)),
    }
}

/// Waits out a reconnect delay while still draining commands.
///
/// `disconnect()` cancels the pending timer; a manual connect short-circuits
/// the remaining wait.
async fn wait_before_reconnect(
    delay: Duration,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    state: &mut WorkerState,
) -> WaitOutcome {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return WaitOutcome::Elapsed,
            maybe_command = commands.recv() => {
                match maybe_command {
                    Some(Command::Send(value)) => state.pending.push_back(value),
                    Some(Command::Connect { reset }) => {
                        if reset {
                            state.attempts = 0;
                        }
                        return WaitOutcome::ConnectNow;
                    }
                    Some(Command::Disconnect) => return WaitOutcome::Cancelled,
                    None => return WaitOutcome::Shutdown,
                }
            }
        }
    }
}

fn close_outcome(frame: Option<&CloseFrame<'_>>) -> SessionEnd {
    match frame {
        Some(frame) if frame.code == CloseCode::Normal => SessionEnd::Explicit,
        _ => SessionEnd::Abnormal,
    }
}

fn build_request(
    config: &WorkerConfig,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, StreamError> {
    let mut request = config.url.as_str().into_client_request()?;
    if let Some(api_key) = &config.api_key {
        let header = api_key.expose_secret().parse()?;
        request.headers_mut().insert("x-api-key", header);
    }
    Ok(request)
}

async fn send_text(socket: &mut WsSocket, text: String) -> Result<(), WsError> {
    socket.send(Message::Text(text)).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::{mpsc, watch};

    use super::{
        handle_text, ConnectionState, EventKind, Heartbeat, StreamClient, StreamEvent, StreamOptions,
        WorkerState,
    };

    fn worker_state() -> (WorkerState, mpsc::UnboundedReceiver<StreamEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Disconnected);
        (WorkerState::new(event_tx, state_tx), event_rx)
    }

    #[test]
    fn client_trims_trailing_whitespace_from_url() {
        let client = StreamClient::new("ws://stream.example/v1/ws   \n");
        assert_eq!(client.url(), "ws://stream.example/v1/ws");
    }

    #[test]
    fn default_options_match_documented_tunables() {
        let options = StreamOptions::default();
        assert_eq!(options.reconnect.max_attempts, 5);
        assert_eq!(options.reconnect.initial_backoff, Duration::from_secs(1));
        assert_eq!(options.reconnect.max_backoff, Duration::from_secs(30));
        assert_eq!(options.heartbeat_interval, Duration::from_secs(30));
    }

    #[test]
    fn inbound_event_id_becomes_recovery_cursor() {
        let (mut state, mut events) = worker_state();
        let mut heartbeat = Heartbeat::default();

        handle_text(
            r#"{"type":"update","eventId":"e42","content":"x"}"#,
            &mut state,
            &mut heartbeat,
        );

        assert_eq!(state.cursor.as_deref(), Some("e42"));
        match events.try_recv().expect("message event") {
            StreamEvent::Message(envelope) => assert_eq!(envelope.kind, "update"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn only_latest_cursor_is_retained() {
        let (mut state, _events) = worker_state();
        let mut heartbeat = Heartbeat::default();

        handle_text(r#"{"type":"a","eventId":"e1"}"#, &mut state, &mut heartbeat);
        handle_text(r#"{"type":"b","eventId":"e2"}"#, &mut state, &mut heartbeat);
        handle_text(r#"{"type":"c"}"#, &mut state, &mut heartbeat);

        assert_eq!(state.cursor.as_deref(), Some("e2"));
    }

    #[test]
    fn inbound_heartbeat_is_swallowed() {
        let (mut state, mut events) = worker_state();
        let mut heartbeat = Heartbeat::default();

        handle_text(r#"{"type":"heartbeat"}"#, &mut state, &mut heartbeat);

        assert!(events.try_recv().is_err());
        assert!(heartbeat.last_reply().is_some());
    }

    #[test]
    fn unparseable_payload_raises_local_error_and_keeps_cursor() {
        let (mut state, mut events) = worker_state();
        let mut heartbeat = Heartbeat::default();
        state.cursor = Some("e7".to_string());

        handle_text("not json", &mut state, &mut heartbeat);

        assert_eq!(state.cursor.as_deref(), Some("e7"));
        match events.try_recv().expect("error event") {
            StreamEvent::Error(info) => {
                assert_eq!(info.message.as_deref(), Some("failed to parse message"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn auth_failure_suppresses_reconnect() {
        let (mut state, mut events) = worker_state();
        let mut heartbeat = Heartbeat::default();

        handle_text(
            r#"{"type":"error","code":"AUTHENTICATION_FAILED","message":"bad key"}"#,
            &mut state,
            &mut heartbeat,
        );

        assert!(state.auth_rejected);
        assert!(matches!(
            events.try_recv().expect("auth event"),
            StreamEvent::AuthError(_)
        ));
    }

    #[test]
    fn rate_limit_records_server_suggested_delay() {
        let (mut state, mut events) = worker_state();
        let mut heartbeat = Heartbeat::default();

        handle_text(
            r#"{"type":"error","code":"RATE_LIMIT_EXCEEDED","retryAfter":250}"#,
            &mut state,
            &mut heartbeat,
        );

        assert_eq!(state.rate_limit_delay, Some(Duration::from_millis(250)));
        assert!(matches!(
            events.try_recv().expect("rate limit event"),
            StreamEvent::RateLimited(_)
        ));
    }

    #[test]
    fn unclassified_error_codes_fall_through_to_generic_error() {
        let (mut state, mut events) = worker_state();
        let mut heartbeat = Heartbeat::default();

        handle_text(
            r#"{"type":"error","code":"INVALID_MESSAGE"}"#,
            &mut state,
            &mut heartbeat,
        );

        assert!(!state.auth_rejected);
        assert_eq!(state.rate_limit_delay, None);
        match events.try_recv().expect("error event") {
            StreamEvent::Error(info) => assert_eq!(info.code.as_deref(), Some("INVALID_MESSAGE")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn event_kinds_map_one_to_one() {
        assert_eq!(StreamEvent::Connected.kind(), EventKind::Connected);
        assert_eq!(StreamEvent::Disconnected.kind(), EventKind::Disconnected);
        assert_eq!(
            StreamEvent::Failed { attempts: 3 }.kind(),
            EventKind::Failed
        );
    }
}
