//! SignalBus - Task Runner → Coordinator のシグナル配送
//!
//! Each tab has at most one live subscription. A signal is delivered only to
//! the subscription registered for its origin tab; anything else is a stray
//! and is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::{DomainEvent, RunnerSignal, SignalEnvelope, TabId};
use crate::ports::EventSink;

type Routes = HashMap<TabId, (u64, mpsc::UnboundedSender<RunnerSignal>)>;

pub struct SignalBus {
    routes: Arc<Mutex<Routes>>,
    next_id: AtomicU64,
    events: Arc<dyn EventSink>,
}

impl SignalBus {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            routes: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            events,
        }
    }

    /// Register for signals originating from `tab`.
    ///
    /// A newer subscription for the same tab replaces the older one; the
    /// older one then only sees `None`.
    pub fn subscribe(&self, tab: &TabId) -> SignalSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.lock().insert(tab.clone(), (id, tx));
        debug!(tab_id = %tab, "signal subscription registered");
        SignalSubscription {
            tab: tab.clone(),
            id,
            rx,
            routes: Arc::clone(&self.routes),
        }
    }

    /// Deliver `envelope` to its origin tab's subscription.
    ///
    /// Returns `false` when nobody is listening for that tab.
    pub fn publish(&self, envelope: SignalEnvelope) -> bool {
        let delivered = {
            let routes = self.routes.lock();
            match routes.get(&envelope.origin) {
                Some((_, tx)) => tx.send(envelope.signal.clone()).is_ok(),
                None => false,
            }
        };

        if !delivered {
            warn!(
                origin = %envelope.origin,
                signal = ?envelope.signal,
                "ignoring signal from unexpected tab"
            );
            self.events.emit(DomainEvent::StraySignalIgnored {
                origin: envelope.origin,
            });
        }
        delivered
    }

    pub fn is_subscribed(&self, tab: &TabId) -> bool {
        self.routes.lock().contains_key(tab)
    }
}

/// One tab's signal stream. Dropping it deregisters the route.
pub struct SignalSubscription {
    tab: TabId,
    id: u64,
    rx: mpsc::UnboundedReceiver<RunnerSignal>,
    routes: Arc<Mutex<Routes>>,
}

impl SignalSubscription {
    pub fn tab(&self) -> &TabId {
        &self.tab
    }

    /// Next signal from the tab. `None` once the route is gone.
    pub async fn recv(&mut self) -> Option<RunnerSignal> {
        self.rx.recv().await
    }
}

impl Drop for SignalSubscription {
    fn drop(&mut self) {
        let mut routes = self.routes.lock();
        if routes.get(&self.tab).is_some_and(|(id, _)| *id == self.id) {
            routes.remove(&self.tab);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::RecordingEventSink;

    fn bus() -> (SignalBus, Arc<RecordingEventSink>) {
        let events = Arc::new(RecordingEventSink::new());
        (SignalBus::new(events.clone()), events)
    }

    #[tokio::test]
    async fn delivers_to_matching_tab() {
        let (bus, events) = bus();
        let tab = TabId::new("1");
        let mut sub = bus.subscribe(&tab);

        assert!(bus.publish(SignalEnvelope::new(tab, RunnerSignal::SequenceComplete)));

        assert_eq!(sub.recv().await, Some(RunnerSignal::SequenceComplete));
        assert!(events.events().is_empty());
    }

    #[tokio::test]
    async fn stray_signal_is_ignored() {
        let (bus, events) = bus();
        let mut sub = bus.subscribe(&TabId::new("1"));

        let delivered = bus.publish(SignalEnvelope::new(
            TabId::new("2"),
            RunnerSignal::SequenceComplete,
        ));

        assert!(!delivered);
        assert_eq!(
            events.events(),
            vec![DomainEvent::StraySignalIgnored {
                origin: TabId::new("2")
            }]
        );
        assert!(sub.rx.try_recv().is_err());
    }

    #[test]
    fn drop_releases_route() {
        let (bus, _) = bus();
        let tab = TabId::new("1");
        {
            let _sub = bus.subscribe(&tab);
            assert!(bus.is_subscribed(&tab));
        }
        assert!(!bus.is_subscribed(&tab));
        assert!(!bus.publish(SignalEnvelope::new(tab, RunnerSignal::SequenceComplete)));
    }

    #[test]
    fn stale_subscription_drop_keeps_newer_route() {
        let (bus, _) = bus();
        let tab = TabId::new("1");
        let old = bus.subscribe(&tab);
        let _new = bus.subscribe(&tab);

        drop(old);

        assert!(bus.is_subscribed(&tab));
    }
}
