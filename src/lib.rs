//! Client SDK for resilient realtime stream connections.
//!
//! The crate maintains a logical, always-retrying websocket connection to a
//! single agent/task endpoint. Outbound messages are queued while the link is
//! down and flushed in order after reconnect; missed events are replayed via a
//! last-event recovery cursor.

/// Realtime stream client, protocol types, and session helpers.
pub mod stream;
