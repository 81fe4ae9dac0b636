use crate::{
    alert::Alert,
    cache::{ORDERS_RESOURCE, QueryCache, QueryKey},
};
use tokio::sync::mpsc;
use tracing::debug;
use whaleflow_data::RealtimeEvent;

/// Routes inbound realtime events to their consumer-side effects: cache
/// invalidation with selective refetch, and whale-order alerts.
///
/// The actual refetch is performed by an external collaborator (the REST
/// order-list endpoint); the refetch channel is its boundary. Closed
/// receivers never fail the router.
pub struct InvalidationRouter<V> {
    cache: QueryCache<V>,
    alert_tx: mpsc::UnboundedSender<Alert>,
    refetch_tx: mpsc::UnboundedSender<QueryKey>,
}

impl<V> InvalidationRouter<V> {
    pub fn new(
        cache: QueryCache<V>,
        alert_tx: mpsc::UnboundedSender<Alert>,
        refetch_tx: mpsc::UnboundedSender<QueryKey>,
    ) -> Self {
        Self {
            cache,
            alert_tx,
            refetch_tx,
        }
    }

    pub fn cache(&self) -> &QueryCache<V> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut QueryCache<V> {
        &mut self.cache
    }

    /// Apply the effects of one inbound event.
    ///
    /// Alert emission and cache invalidation are independent effects of the
    /// same event; both occur when applicable.
    pub fn route(&mut self, event: &RealtimeEvent) {
        if let RealtimeEvent::NewOrder { order: Some(order) } = event {
            if let Some(alert) = Alert::for_order(order) {
                let _ = self.alert_tx.send(alert);
            }
        }

        // Every event type marks the order-list result sets stale; only
        // actively observed queries are refetched.
        let active = self.cache.invalidate_resource(ORDERS_RESOURCE);
        debug!(
            refetch = active.len(),
            "invalidated order-list queries after {:?} event",
            event
        );
        for key in active {
            let _ = self.refetch_tx.send(key);
        }
    }
}
