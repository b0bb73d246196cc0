//! Single-consumer event queue decoupling producers from the per-frame
//! dispatch loop.
//!
//! Producers (UI callbacks, the script player, remote listeners) hold a
//! cloneable sender and may enqueue from any thread; the queue is
//! drained exactly once per frame from the main thread, in enqueue
//! order. A kind with no registered handler is dropped silently; some
//! builds simply omit handlers. Registration happens at init and is
//! removed only at teardown; there is no rebinding mid-run.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

/// Payload-carrying events crossing from producers to collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ScriptLoad { path: PathBuf },
    Command { line: String },
    FlagSet { name: String, value: bool },
    FaderChange { target: String, value: f64 },
    FaderInterlude { duration: f64 },
    SaveScreen { action: String },
    FpsTick { fps: f64 },
    AfterOneSecond,
    AltitudeChange { altitude: f64 },
    ObserverChange { body: String },
    VideoControl { action: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    ScriptLoad,
    Command,
    FlagSet,
    FaderChange,
    FaderInterlude,
    SaveScreen,
    FpsTick,
    AfterOneSecond,
    AltitudeChange,
    ObserverChange,
    VideoControl,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ScriptLoad { .. } => EventKind::ScriptLoad,
            Event::Command { .. } => EventKind::Command,
            Event::FlagSet { .. } => EventKind::FlagSet,
            Event::FaderChange { .. } => EventKind::FaderChange,
            Event::FaderInterlude { .. } => EventKind::FaderInterlude,
            Event::SaveScreen { .. } => EventKind::SaveScreen,
            Event::FpsTick { .. } => EventKind::FpsTick,
            Event::AfterOneSecond => EventKind::AfterOneSecond,
            Event::AltitudeChange { .. } => EventKind::AltitudeChange,
            Event::ObserverChange { .. } => EventKind::ObserverChange,
            Event::VideoControl { .. } => EventKind::VideoControl,
        }
    }
}

/// Cheap handle producers keep; clones share the queue.
#[derive(Clone)]
pub struct EventProducer {
    tx: Sender<Event>,
}

impl EventProducer {
    /// Enqueue an event; ownership transfers to the queue. A closed
    /// queue (host shutting down) drops the event.
    pub fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            log::debug!("event dropped; queue consumer is gone");
        }
    }
}

/// The single shared FIFO.
pub struct EventQueue {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        EventQueue { tx, rx }
    }

    pub fn producer(&self) -> EventProducer {
        EventProducer {
            tx: self.tx.clone(),
        }
    }

    /// Drain everything currently queued, in enqueue order. Called
    /// once per frame from the consuming thread only.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }
}

type Handler<T> = Box<dyn FnMut(&mut T, Event)>;

/// Kind → at-most-one-handler map, fixed at init/teardown.
pub struct HandlerRegistry<T> {
    handlers: BTreeMap<EventKind, Handler<T>>,
}

impl<T> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandlerRegistry<T> {
    pub fn new() -> Self {
        HandlerRegistry {
            handlers: BTreeMap::new(),
        }
    }

    /// Register the handler for a kind. A duplicate registration
    /// replaces the previous handler with a warning; bindings are meant
    /// to be fixed for the lifetime of the run.
    pub fn register(&mut self, kind: EventKind, handler: impl FnMut(&mut T, Event) + 'static) {
        if self.handlers.insert(kind, Box::new(handler)).is_some() {
            log::warn!("handler for {kind:?} replaced");
        }
    }

    pub fn remove(&mut self, kind: EventKind) {
        self.handlers.remove(&kind);
    }

    /// Route one event; unhandled kinds are dropped silently.
    pub fn dispatch(&mut self, target: &mut T, event: Event) {
        match self.handlers.get_mut(&event.kind()) {
            Some(handler) => handler(target, event),
            None => log::trace!("no handler for {:?}; event dropped", event.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::{Event, EventKind, EventQueue, HandlerRegistry};

    #[test]
    fn drain_preserves_enqueue_order() {
        let mut queue = EventQueue::new();
        let producer = queue.producer();
        producer.send(Event::Command {
            line: "one".to_string(),
        });
        producer.send(Event::AfterOneSecond);
        producer.send(Event::Command {
            line: "two".to_string(),
        });

        let drained = queue.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].kind(), EventKind::Command);
        assert_eq!(drained[1], Event::AfterOneSecond);
        assert_eq!(
            drained[2],
            Event::Command {
                line: "two".to_string()
            }
        );
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn producers_may_enqueue_from_other_threads() {
        let mut queue = EventQueue::new();
        let producer = queue.producer();
        let worker = thread::spawn(move || {
            for altitude in 0..4 {
                producer.send(Event::AltitudeChange {
                    altitude: f64::from(altitude),
                });
            }
        });
        worker.join().expect("producer thread");

        let drained = queue.drain();
        assert_eq!(drained.len(), 4);
        assert_eq!(
            drained[0],
            Event::AltitudeChange { altitude: 0.0 }
        );
        assert_eq!(
            drained[3],
            Event::AltitudeChange { altitude: 3.0 }
        );
    }

    #[test]
    fn unhandled_kinds_are_dropped_silently() {
        let mut registry: HandlerRegistry<Vec<String>> = HandlerRegistry::new();
        registry.register(EventKind::Command, |seen, event| {
            if let Event::Command { line } = event {
                seen.push(line);
            }
        });

        let mut seen = Vec::new();
        registry.dispatch(&mut seen, Event::AfterOneSecond);
        registry.dispatch(
            &mut seen,
            Event::Command {
                line: "flag fog on".to_string(),
            },
        );
        assert_eq!(seen, vec!["flag fog on"]);
    }

    #[test]
    fn removal_returns_a_kind_to_silent_drop() {
        let mut registry: HandlerRegistry<usize> = HandlerRegistry::new();
        registry.register(EventKind::AfterOneSecond, |count, _| *count += 1);
        let mut count = 0;
        registry.dispatch(&mut count, Event::AfterOneSecond);
        registry.remove(EventKind::AfterOneSecond);
        registry.dispatch(&mut count, Event::AfterOneSecond);
        assert_eq!(count, 1);
    }
}
