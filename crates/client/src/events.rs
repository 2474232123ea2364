//! Listener registry for client events.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{trace, warn};

use crate::types::{ClientEvent, EventKind};

/// Callback invoked for every event of the kind it was registered for.
pub type Handler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

struct Entry {
    id: u64,
    handler: Handler,
}

/// Event name to ordered handler list.
///
/// Handlers run in registration order, each isolated from the others: a
/// panicking handler is logged and skipped. No lock is held while a handler
/// runs, so handlers may subscribe or unsubscribe freely.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventKind, Vec<Entry>>>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<Entry>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(self: &Arc<Self>, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().entry(kind).or_default().push(Entry {
            id,
            handler: Arc::new(handler),
        });
        trace!(event = %kind, id, "handler subscribed");
        Subscription {
            inner: Some(SubscriptionInner {
                bus: Arc::downgrade(self),
                kind,
                id,
            }),
        }
    }

    fn remove(&self, kind: EventKind, id: u64) -> bool {
        let mut handlers = self.lock();
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|e| e.id != id);
        before != list.len()
    }

    fn is_registered(&self, kind: EventKind, id: u64) -> bool {
        self.lock()
            .get(&kind)
            .is_some_and(|list| list.iter().any(|e| e.id == id))
    }

    /// Delivers `event` to every handler registered for its kind.
    ///
    /// The handler list is captured up front; handlers added during dispatch
    /// wait for the next event and handlers removed during dispatch are skipped.
    pub fn publish(&self, event: &ClientEvent) {
        let kind = event.kind();
        let snapshot: Vec<(u64, Handler)> = match self.lock().get(&kind) {
            Some(list) => list.iter().map(|e| (e.id, e.handler.clone())).collect(),
            None => return,
        };

        for (id, handler) in snapshot {
            if !self.is_registered(kind, id) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!(event = %kind, id, "event handler panicked");
            }
        }
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }
}

#[derive(Clone)]
struct SubscriptionInner {
    bus: Weak<EventBus>,
    kind: EventKind,
    id: u64,
}

/// Handle returned by a subscription. Dropping it does nothing; call
/// [`unsubscribe`](Self::unsubscribe) to remove the handler.
#[derive(Clone)]
pub struct Subscription {
    inner: Option<SubscriptionInner>,
}

impl Subscription {
    /// A handle that is not attached to any handler.
    pub(crate) fn detached() -> Self {
        Self { inner: None }
    }

    /// Removes the handler. Returns `false` if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        let Some(inner) = &self.inner else {
            return false;
        };
        match inner.bus.upgrade() {
            Some(bus) => bus.remove(inner.kind, inner.id),
            None => false,
        }
    }

    pub fn is_detached(&self) -> bool {
        self.inner.is_none()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("Subscription")
                .field("kind", &inner.kind)
                .field("id", &inner.id)
                .finish(),
            None => f.write_str("Subscription(detached)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&ClientEvent) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        let make = move |tag: &str| {
            let l = l.clone();
            let tag = tag.to_string();
            Box::new(move |_: &ClientEvent| l.lock().unwrap().push(tag.clone()))
                as Box<dyn Fn(&ClientEvent) + Send + Sync>
        };
        (log, make)
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.subscribe(EventKind::Open, make("a"));
        bus.subscribe(EventKind::Open, make("b"));
        bus.subscribe(EventKind::Close, make("other"));

        bus.publish(&ClientEvent::Open);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let sub = bus.subscribe(EventKind::Open, make("a"));

        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        bus.publish(&ClientEvent::Open);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bus.handler_count(EventKind::Open), 0);
    }

    #[test]
    fn panicking_handler_does_not_stop_siblings() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.subscribe(EventKind::Error, |_| panic!("handler failure"));
        bus.subscribe(EventKind::Error, make("after"));

        bus.publish(&ClientEvent::Error(ClientError::HostUnresolved));
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn handler_can_unsubscribe_itself() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let s = slot.clone();
        let l = log.clone();
        let sub = bus.subscribe(EventKind::Open, move |_| {
            l.lock().unwrap().push("once".into());
            if let Some(sub) = s.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);
        bus.subscribe(EventKind::Open, make("always"));

        bus.publish(&ClientEvent::Open);
        bus.publish(&ClientEvent::Open);
        assert_eq!(*log.lock().unwrap(), vec!["once", "always", "always"]);
    }

    #[test]
    fn handler_removed_mid_dispatch_is_skipped() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let s = slot.clone();
        bus.subscribe(EventKind::Open, move |_| {
            if let Some(sub) = s.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        let victim = bus.subscribe(EventKind::Open, make("victim"));
        *slot.lock().unwrap() = Some(victim);

        bus.publish(&ClientEvent::Open);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn handler_added_mid_dispatch_waits_for_next_event() {
        let bus = EventBus::new();
        let (log, _) = recorder();
        let weak = Arc::downgrade(&bus);
        let l = log.clone();
        bus.subscribe(EventKind::Open, move |_| {
            if let Some(bus) = weak.upgrade() {
                let l = l.clone();
                bus.subscribe(EventKind::Open, move |_| l.lock().unwrap().push("late".into()));
            }
        });

        bus.publish(&ClientEvent::Open);
        assert!(log.lock().unwrap().is_empty());
        bus.publish(&ClientEvent::Open);
        assert_eq!(*log.lock().unwrap(), vec!["late"]);
    }

    #[test]
    fn detached_subscription_is_noop() {
        let sub = Subscription::detached();
        assert!(sub.is_detached());
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn subscription_outliving_bus() {
        let bus = EventBus::new();
        let sub = bus.subscribe(EventKind::Open, |_| {});
        drop(bus);
        assert!(!sub.unsubscribe());
    }
}
