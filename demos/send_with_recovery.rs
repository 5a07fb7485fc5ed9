//! Offline queueing and replay example.
//!
//! Sends messages before the link is up to show FIFO queue flushing, then
//! consumes events; after any reconnect the worker replays missed events via
//! the last seen event id.

use std::error::Error;
use std::time::Duration;

use agentstream_sdk::stream::backoff::ReconnectPolicy;
use agentstream_sdk::stream::client::{StreamClient, StreamEvent, StreamOptions};
use serde_json::json;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let endpoint = "wss://REPLACE_WITH_STREAM_ENDPOINT/v1/ws".to_string();

    let options = StreamOptions {
        reconnect: ReconnectPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            jitter: Duration::from_millis(100),
        },
        heartbeat_interval: Duration::from_secs(30),
    };

    let mut connection = StreamClient::new(endpoint).with_options(options).open();

    // Queued while disconnected; the first send also triggers the connect.
    connection.send(&json!({ "type": "subscribe", "channel": "tasks" }))?;
    connection.send(&json!({ "type": "note", "body": "queued before connect" }))?;

    while let Some(event) = connection.recv().await {
        match event {
            StreamEvent::Connected => println!("connected, queue flushed"),
            StreamEvent::Message(envelope) => {
                println!("message type={} event_id={:?}", envelope.kind, envelope.event_id);
            }
            StreamEvent::Disconnected => println!("disconnected, retrying"),
            StreamEvent::Failed { attempts } => {
                eprintln!("gave up after {attempts} attempts");
                break;
            }
            other => println!("event: {other:?}"),
        }
    }

    Ok(())
}
