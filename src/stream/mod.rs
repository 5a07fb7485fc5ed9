//! Realtime stream modules.
//!
//! - `client`: websocket transport, send queue, and reconnect handling.
//! - `proto`: wire envelope and control frames shared with the stream service.
//! - `backoff`: bounded exponential reconnect policy.
//! - `heartbeat`: periodic keepalive monitor.
//! - `session`: handler registry and event dispatch on top of a connection.

/// Reconnect backoff policy.
pub mod backoff;
/// Websocket connection, worker state machine, and command sender.
pub mod client;
/// Keepalive interval monitor.
pub mod heartbeat;
/// Wire envelope and control frames.
pub mod proto;
/// Handler registry and event dispatch helpers.
pub mod session;
