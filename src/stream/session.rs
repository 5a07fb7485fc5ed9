//! Higher-level stream session wrapper with handler dispatch.
//!
//! `EventRouter` keeps an ordered callback registry per event kind;
//! `StreamSession` pumps events from a connection through the router so
//! callers can consume the stream with `on`/`off` registrations instead of
//! matching on the raw event channel.

use std::collections::HashMap;

use serde::Serialize;

use crate::stream::client::{
    ConnectionState, EventKind, StreamConnection, StreamError, StreamEvent, StreamSender,
};

/// Token identifying one handler registration.
///
/// The same closure registered twice yields two distinct ids and fires twice;
/// `off` removes exactly the registration named by the id.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct HandlerId(u64);

type Handler = Box<dyn FnMut(&StreamEvent) + Send>;

/// Ordered callback registry keyed by event kind.
///
/// Handlers for a kind run synchronously, in registration order, within the
/// same dispatch turn.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<EventKind, Vec<(HandlerId, Handler)>>,
    next_id: u64,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for the given event kind.
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> HandlerId
    where
        F: FnMut(&StreamEvent) + Send + 'static,
    {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Removes the registration named by `id`.
    ///
    /// Returns `false` when no such registration exists under `kind`.
    pub fn off(&mut self, kind: EventKind, id: HandlerId) -> bool {
        let Some(handlers) = self.handlers.get_mut(&kind) else {
            return false;
        };
        let Some(index) = handlers.iter().position(|(handler_id, _)| *handler_id == id) else {
            return false;
        };
        drop(handlers.remove(index));
        true
    }

    /// Number of live registrations for a kind.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Invokes every handler registered for the event's kind.
    pub fn dispatch(&mut self, event: &StreamEvent) {
        let Some(handlers) = self.handlers.get_mut(&event.kind()) else {
            return;
        };
        for (_, handler) in handlers.iter_mut() {
            handler(event);
        }
    }
}

/// Stream connection paired with a handler registry.
pub struct StreamSession {
    connection: StreamConnection,
    router: EventRouter,
}

impl StreamSession {
    /// Wraps an existing connection with an empty registry.
    pub fn new(connection: StreamConnection) -> Self {
        Self {
            connection,
            router: EventRouter::new(),
        }
    }

    /// Registers a handler for the given event kind.
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> HandlerId
    where
        F: FnMut(&StreamEvent) + Send + 'static,
    {
        self.router.on(kind, handler)
    }

    /// Removes the registration named by `id`.
    pub fn off(&mut self, kind: EventKind, id: HandlerId) -> bool {
        self.router.off(kind, id)
    }

    /// Returns a cloneable sender for commands and outbound messages.
    pub fn sender(&self) -> StreamSender {
        self.connection.sender()
    }

    /// Current connection state snapshot.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Begins a connect attempt; a no-op while the transport is open.
    pub fn connect(&self) -> Result<(), StreamError> {
        self.connection.connect()
    }

    /// Transmits now when open, otherwise queues the message FIFO.
    pub fn send<T>(&self, message: &T) -> Result<(), StreamError>
    where
        T: Serialize + ?Sized,
    {
        self.connection.send(message)
    }

    /// Closes with a normal closure and suppresses auto-reconnect.
    pub fn disconnect(&self) -> Result<(), StreamError> {
        self.connection.disconnect()
    }

    /// Receives the next event, dispatches it, and returns it.
    ///
    /// Returns `None` once the worker has shut down.
    pub async fn dispatch_next(&mut self) -> Option<StreamEvent> {
        let event = self.connection.recv().await?;
        self.router.dispatch(&event);
        Some(event)
    }

    /// Pumps events until the worker shuts down.
    pub async fn run(mut self) {
        while self.dispatch_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{EventRouter, StreamEvent};
    use crate::stream::client::EventKind;
    use crate::stream::proto::{Envelope, ErrorInfo};

    fn message_event(kind: &str) -> StreamEvent {
        StreamEvent::Message(Envelope {
            kind: kind.to_string(),
            event_id: None,
            fields: Default::default(),
        })
    }

    fn shared_log() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) + Clone) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let push = {
            let log = Arc::clone(&log);
            move |entry| log.lock().expect("log lock").push(entry)
        };
        (log, push)
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let (log, push) = shared_log();
        let mut router = EventRouter::new();

        let push_first = push.clone();
        router.on(EventKind::Message, move |_| push_first("first"));
        let push_second = push;
        router.on(EventKind::Message, move |_| push_second("second"));

        router.dispatch(&message_event("update"));

        assert_eq!(*log.lock().expect("log lock"), vec!["first", "second"]);
    }

    #[test]
    fn duplicate_registration_fires_once_per_registration() {
        let (log, push) = shared_log();
        let mut router = EventRouter::new();

        let push_a = push.clone();
        router.on(EventKind::Connected, move |_| push_a("hit"));
        let push_b = push;
        router.on(EventKind::Connected, move |_| push_b("hit"));

        router.dispatch(&StreamEvent::Connected);

        assert_eq!(log.lock().expect("log lock").len(), 2);
    }

    #[test]
    fn off_removes_only_the_named_registration() {
        let (log, push) = shared_log();
        let mut router = EventRouter::new();

        let push_keep = push.clone();
        let keep = router.on(EventKind::Message, move |_| push_keep("keep"));
        let push_drop = push;
        let drop_id = router.on(EventKind::Message, move |_| push_drop("drop"));

        assert!(router.off(EventKind::Message, drop_id));
        assert_eq!(router.handler_count(EventKind::Message), 1);
        router.dispatch(&message_event("update"));

        assert_eq!(*log.lock().expect("log lock"), vec!["keep"]);
        assert!(router.off(EventKind::Message, keep));
        assert!(!router.off(EventKind::Message, keep));
    }

    #[test]
    fn off_under_wrong_kind_is_rejected() {
        let mut router = EventRouter::new();
        let id = router.on(EventKind::Error, |_| {});
        assert!(!router.off(EventKind::Message, id));
        assert_eq!(router.handler_count(EventKind::Error), 1);
    }

    #[test]
    fn dispatch_routes_by_event_kind() {
        let (log, push) = shared_log();
        let mut router = EventRouter::new();

        let push_error = push.clone();
        router.on(EventKind::Error, move |_| push_error("error"));
        let push_message = push;
        router.on(EventKind::Message, move |_| push_message("message"));

        router.dispatch(&StreamEvent::Error(ErrorInfo::local("boom")));

        assert_eq!(*log.lock().expect("log lock"), vec!["error"]);
    }

    #[test]
    fn dispatch_without_handlers_is_silent() {
        let mut router = EventRouter::new();
        router.dispatch(&StreamEvent::Failed { attempts: 5 });
    }

    #[test]
    fn handler_can_mutate_captured_state() {
        let mut router = EventRouter::new();
        let mut count = 0u32;
        let counter = Arc::new(Mutex::new(0u32));
        let shared = Arc::clone(&counter);
        router.on(EventKind::Disconnected, move |_| {
            count += 1;
            *shared.lock().expect("counter lock") = count;
        });

        router.dispatch(&StreamEvent::Disconnected);
        router.dispatch(&StreamEvent::Disconnected);

        assert_eq!(*counter.lock().expect("counter lock"), 2);
    }
}
