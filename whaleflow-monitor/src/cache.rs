use fnv::FnvHashMap;

/// Leading key segment designating the order-list resource.
pub const ORDERS_RESOURCE: &str = "orders";

/// Structured cache key: a stable leading resource segment followed by
/// filter parameters.
///
/// Invalidation matches on the leading segment only, so all filter variants
/// of one resource are invalidated together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    segments: Vec<String>,
}

impl QueryKey {
    /// Key for an unfiltered resource query.
    pub fn resource(resource: impl Into<String>) -> Self {
        Self {
            segments: vec![resource.into()],
        }
    }

    /// Append a filter parameter. Parameters are ignored for invalidation
    /// matching.
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.segments.push(param.into());
        self
    }

    pub fn resource_name(&self) -> &str {
        &self.segments[0]
    }

    pub fn params(&self) -> &[String] {
        &self.segments[1..]
    }
}

#[derive(Debug, Clone)]
struct CacheSlot<V> {
    value: Option<V>,
    stale: bool,
    observers: usize,
}

impl<V> Default for CacheSlot<V> {
    fn default() -> Self {
        Self {
            value: None,
            stale: false,
            observers: 0,
        }
    }
}

/// Query cache with per-entry staleness and active-observer counting.
///
/// Entries without observers are left stale on invalidation but never
/// eagerly refetched.
#[derive(Debug, Clone, Default)]
pub struct QueryCache<V> {
    slots: FnvHashMap<QueryKey, CacheSlot<V>>,
}

impl<V> QueryCache<V> {
    pub fn new() -> Self {
        Self {
            slots: FnvHashMap::default(),
        }
    }

    /// Store a fresh value, clearing any staleness. Observer counts survive
    /// re-insertion.
    pub fn insert(&mut self, key: QueryKey, value: V) {
        let slot = self.slots.entry(key).or_default();
        slot.value = Some(value);
        slot.stale = false;
    }

    pub fn get(&self, key: &QueryKey) -> Option<&V> {
        self.slots.get(key).and_then(|slot| slot.value.as_ref())
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.slots.get(key).is_some_and(|slot| slot.stale)
    }

    /// Register an active observer for a query, creating the slot if it does
    /// not exist yet.
    pub fn observe(&mut self, key: QueryKey) {
        self.slots.entry(key).or_default().observers += 1;
    }

    /// Drop one active observer for a query.
    pub fn unobserve(&mut self, key: &QueryKey) {
        if let Some(slot) = self.slots.get_mut(key) {
            slot.observers = slot.observers.saturating_sub(1);
        }
    }

    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.slots.get(key).map_or(0, |slot| slot.observers)
    }

    /// Mark every entry whose leading segment matches `resource` stale.
    ///
    /// Returns only the keys with at least one active observer; those are
    /// the refetch set. Unobserved entries stay stale until next observed.
    pub fn invalidate_resource(&mut self, resource: &str) -> Vec<QueryKey> {
        let mut active = Vec::new();

        for (key, slot) in &mut self.slots {
            if key.resource_name() != resource {
                continue;
            }
            slot.stale = true;
            if slot.observers > 0 {
                active.push(key.clone());
            }
        }

        active
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_orders() -> QueryKey {
        QueryKey::resource(ORDERS_RESOURCE)
    }

    fn filtered_orders() -> QueryKey {
        QueryKey::resource(ORDERS_RESOURCE)
            .with_param("exchange=binance")
            .with_param("side=long")
    }

    #[test]
    fn test_key_segments() {
        let key = filtered_orders();
        assert_eq!(key.resource_name(), "orders");
        assert_eq!(key.params(), ["exchange=binance", "side=long"]);
        assert_ne!(key, all_orders());
    }

    #[test]
    fn test_insert_clears_staleness() {
        let mut cache = QueryCache::new();
        cache.observe(all_orders());
        cache.insert(all_orders(), 1);

        cache.invalidate_resource(ORDERS_RESOURCE);
        assert!(cache.is_stale(&all_orders()));

        cache.insert(all_orders(), 2);
        assert!(!cache.is_stale(&all_orders()));
        assert_eq!(cache.get(&all_orders()), Some(&2));
    }

    #[test]
    fn test_invalidation_hits_all_filter_variants() {
        let mut cache = QueryCache::new();
        cache.insert(all_orders(), 1);
        cache.insert(filtered_orders(), 2);
        cache.observe(all_orders());
        cache.observe(filtered_orders());

        let active = cache.invalidate_resource(ORDERS_RESOURCE);

        assert_eq!(active.len(), 2);
        assert!(active.contains(&all_orders()));
        assert!(active.contains(&filtered_orders()));
        assert!(cache.is_stale(&all_orders()));
        assert!(cache.is_stale(&filtered_orders()));
    }

    #[test]
    fn test_unobserved_entries_go_stale_without_refetch() {
        let mut cache = QueryCache::new();
        cache.insert(all_orders(), 1);
        cache.insert(filtered_orders(), 2);
        cache.observe(all_orders());

        let active = cache.invalidate_resource(ORDERS_RESOURCE);

        assert_eq!(active, vec![all_orders()]);
        // stale but not in the refetch set
        assert!(cache.is_stale(&filtered_orders()));
    }

    #[test]
    fn test_other_resources_untouched() {
        let mut cache = QueryCache::new();
        cache.insert(QueryKey::resource("stats"), 7);
        cache.observe(QueryKey::resource("stats"));

        let active = cache.invalidate_resource(ORDERS_RESOURCE);

        assert!(active.is_empty());
        assert!(!cache.is_stale(&QueryKey::resource("stats")));
    }

    #[test]
    fn test_observer_counting() {
        let mut cache: QueryCache<i32> = QueryCache::new();
        cache.observe(all_orders());
        cache.observe(all_orders());
        assert_eq!(cache.observer_count(&all_orders()), 2);

        cache.unobserve(&all_orders());
        assert_eq!(cache.observer_count(&all_orders()), 1);

        cache.unobserve(&all_orders());
        cache.unobserve(&all_orders());
        assert_eq!(cache.observer_count(&all_orders()), 0);

        assert!(cache.invalidate_resource(ORDERS_RESOURCE).is_empty());
    }
}
