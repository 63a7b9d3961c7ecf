//! Action-trace capture.
//!
//! The browser original patched `EventTarget.prototype.addEventListener` so
//! every handler on the page was traced retroactively. Here instrumentation
//! is explicit and opt-in: wrap individual handlers with
//! [`Instrumentor::wrap`], or register them on an [`EventBus`] which wraps
//! at registration. No shared runtime state is mutated behind the
//! application's back.
//!
//! Tracing never interferes with the application: a failed buffer write is
//! logged and the original handler still runs.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::warn;

use crate::report::{ActionRecord, ActionTarget};
use crate::store::TraceBuffer;

/// One interaction as the instrumentor sees it.
#[derive(Debug, Clone)]
pub struct UiEvent {
    /// DOM-style event type, e.g. `"click"`.
    pub event_type: String,
    pub target: ActionTarget,
}

impl UiEvent {
    pub fn new(event_type: impl Into<String>, target: ActionTarget) -> Self {
        Self {
            event_type: event_type.into(),
            target,
        }
    }

    fn to_record(&self) -> ActionRecord {
        ActionRecord {
            target: self.target.clone(),
            event_type: self.event_type.clone(),
        }
    }
}

/// A registered event handler.
pub type Handler = Box<dyn FnMut(&UiEvent) + Send>;

// ─── Instrumentor ─────────────────────────────────────────────────────────────

/// Wraps handlers so each handled event is appended to the trace buffer
/// before the handler itself runs.
#[derive(Clone)]
pub struct Instrumentor {
    buffer: TraceBuffer,
}

impl Instrumentor {
    pub fn new(buffer: TraceBuffer) -> Self {
        Self { buffer }
    }

    /// Wrap `handler`: record the event, then invoke it.
    pub fn wrap<F>(&self, mut handler: F) -> Handler
    where
        F: FnMut(&UiEvent) + Send + 'static,
    {
        let buffer = self.buffer.clone();
        Box::new(move |event: &UiEvent| {
            if let Err(e) = buffer.append(event.to_record()) {
                warn!(err = %e, event_type = %event.event_type, "action trace write failed");
            }
            handler(event);
        })
    }
}

// ─── EventBus ─────────────────────────────────────────────────────────────────

/// Capability-scoped listener registry the application opts into.
///
/// Every listener added through [`add_listener`](Self::add_listener) is
/// wrapped by the bus's [`Instrumentor`], so dispatching an event both
/// records it and runs the listeners, in registration order. Only listeners
/// registered on the bus are traced; the bus does not reach into any other
/// registration mechanism.
pub struct EventBus {
    instrumentor: Instrumentor,
    listeners: Mutex<HashMap<String, Vec<Handler>>>,
}

impl EventBus {
    pub fn new(instrumentor: Instrumentor) -> Self {
        Self {
            instrumentor,
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Register a handler for `event_type`, wrapped for tracing.
    pub fn add_listener<F>(&self, event_type: impl Into<String>, handler: F)
    where
        F: FnMut(&UiEvent) + Send + 'static,
    {
        let wrapped = self.instrumentor.wrap(handler);
        match self.listeners.lock() {
            Ok(mut listeners) => listeners.entry(event_type.into()).or_default().push(wrapped),
            Err(e) => warn!(err = %e, "listener registry poisoned — handler dropped"),
        }
    }

    /// Invoke every listener registered for the event's type. Events with
    /// no listeners are not traced — tracing rides on the handlers, exactly
    /// as it did on the page.
    ///
    /// The registry lock is NOT held while handlers run: the handlers for
    /// the event type are taken out of the map first, so a handler is free
    /// to call `add_listener` (or dispatch a different event type) on the
    /// same bus. Listeners registered mid-dispatch take effect from the
    /// next dispatch and are kept after the existing ones.
    pub fn dispatch(&self, event: &UiEvent) {
        let mut running = match self.listeners.lock() {
            Ok(mut listeners) => match listeners.get_mut(&event.event_type) {
                Some(handlers) => std::mem::take(handlers),
                None => return,
            },
            Err(e) => {
                warn!(err = %e, "listener registry poisoned — event dropped");
                return;
            }
        };

        for handler in running.iter_mut() {
            handler(event);
        }

        // Splice back, preserving registration order: the handlers that just
        // ran, then anything a handler registered for this type meanwhile.
        match self.listeners.lock() {
            Ok(mut listeners) => {
                let slot = listeners.entry(event.event_type.clone()).or_default();
                running.append(slot);
                *slot = running;
            }
            Err(e) => warn!(err = %e, "listener registry poisoned — handlers dropped"),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn buffer() -> TraceBuffer {
        TraceBuffer::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn click_on_btn_is_recorded_and_handler_still_runs() {
        let buffer = buffer();
        let bus = EventBus::new(Instrumentor::new(buffer.clone()));

        let hits = Arc::new(AtomicU32::new(0));
        let hits2 = hits.clone();
        bus.add_listener("click", move |_| {
            hits2.fetch_add(1, Ordering::Relaxed);
        });

        bus.dispatch(&UiEvent::new(
            "click",
            ActionTarget::new("button", "btn", "primary"),
        ));

        let trail = buffer.peek().unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].event_type, "click");
        assert_eq!(trail[0].target.id, "btn");
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn trace_records_before_the_handler_observes_the_event() {
        let buffer = buffer();
        let instrumentor = Instrumentor::new(buffer.clone());

        let seen = Arc::new(AtomicU32::new(0));
        let seen2 = seen.clone();
        let probe = buffer.clone();
        let mut wrapped = instrumentor.wrap(move |_| {
            // The record for THIS event is already in the buffer.
            seen2.store(probe.peek().unwrap().len() as u32, Ordering::Relaxed);
        });

        wrapped(&UiEvent::new("input", ActionTarget::new("input", "q", "")));
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let bus = EventBus::new(Instrumentor::new(buffer()));
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            bus.add_listener("click", move |_| order.lock().unwrap().push(tag));
        }
        bus.dispatch(&UiEvent::new("click", ActionTarget::default()));

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn events_without_listeners_are_not_traced() {
        let buffer = buffer();
        let bus = EventBus::new(Instrumentor::new(buffer.clone()));
        bus.add_listener("click", |_| {});

        bus.dispatch(&UiEvent::new("scroll", ActionTarget::default()));
        assert!(buffer.peek().unwrap().is_empty());
    }

    #[test]
    fn handlers_may_register_listeners_on_the_same_bus() {
        let bus = Arc::new(EventBus::new(Instrumentor::new(buffer())));
        let hits = Arc::new(AtomicU32::new(0));

        let bus2 = bus.clone();
        let hits2 = hits.clone();
        bus.add_listener("click", move |_| {
            // Follow-up registration from inside a handler must not
            // deadlock on the registry.
            let hits3 = hits2.clone();
            bus2.add_listener("keydown", move |_| {
                hits3.fetch_add(1, Ordering::Relaxed);
            });
        });

        bus.dispatch(&UiEvent::new(
            "click",
            ActionTarget::new("button", "btn", ""),
        ));
        bus.dispatch(&UiEvent::new("keydown", ActionTarget::default()));

        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn listeners_added_mid_dispatch_are_kept_for_the_next_dispatch() {
        let bus = Arc::new(EventBus::new(Instrumentor::new(buffer())));
        let clicks = Arc::new(AtomicU32::new(0));

        let bus2 = bus.clone();
        let clicks2 = clicks.clone();
        bus.add_listener("click", move |_| {
            let clicks3 = clicks2.clone();
            bus2.add_listener("click", move |_| {
                clicks3.fetch_add(1, Ordering::Relaxed);
            });
        });

        // First dispatch: only the registering handler runs.
        bus.dispatch(&UiEvent::new("click", ActionTarget::default()));
        assert_eq!(clicks.load(Ordering::Relaxed), 0);

        // Second dispatch: the original handler plus the one it added.
        bus.dispatch(&UiEvent::new("click", ActionTarget::default()));
        assert_eq!(clicks.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn each_dispatch_appends_one_record() {
        let buffer = buffer();
        let bus = EventBus::new(Instrumentor::new(buffer.clone()));
        bus.add_listener("click", |_| {});

        for _ in 0..3 {
            bus.dispatch(&UiEvent::new("click", ActionTarget::new("a", "link", "")));
        }
        assert_eq!(buffer.peek().unwrap().len(), 3);
    }
}
