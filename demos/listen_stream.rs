//! Stream listener example.
//!
//! Connects to a stream endpoint, registers handlers for messages and
//! failures, and pumps events until the worker shuts down.
//!
//! Before running, replace the endpoint and API key placeholders below.

use std::error::Error;

use agentstream_sdk::stream::client::{EventKind, StreamClient, StreamEvent};
use agentstream_sdk::stream::session::StreamSession;
use secrecy::SecretString;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let endpoint = "wss://REPLACE_WITH_STREAM_ENDPOINT/v1/ws".to_string();
    let api_key = "REPLACE_WITH_API_KEY".to_string();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let connection = StreamClient::new(endpoint)
            .with_api_key(SecretString::new(api_key))
            .open();

        let mut session = StreamSession::new(connection);

        session.on(EventKind::Connected, |_| {
            println!("connected");
        });
        session.on(EventKind::Message, |event| {
            if let StreamEvent::Message(envelope) = event {
                println!("message type={} event_id={:?}", envelope.kind, envelope.event_id);
            }
        });
        session.on(EventKind::Failed, |event| {
            if let StreamEvent::Failed { attempts } = event {
                eprintln!("gave up after {attempts} reconnect attempts");
            }
        });

        session.connect()?;
        session.run().await;

        Ok::<(), Box<dyn Error>>(())
    })
}
