//! Request-path reads: alias to destination, tag to relay list.
//!
//! Each call is a single indexed lookup on a pooled connection. Nothing is
//! cached here; callers that want caching layer it on top.

use std::sync::Arc;

use tracing::debug;

use crate::context::OpContext;
use crate::errors::Result;
use crate::store::RelayStore;
use crate::types::{Relay, RelayId};

/// Read-only view of a [`RelayStore`] for the redirect hot path.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<RelayStore>,
}

impl Resolver {
    /// Wrap a shared store.
    pub fn new(store: Arc<RelayStore>) -> Self {
        Self { store }
    }

    /// Destination URL for `alias` within `station_id`. Matching is exact
    /// and case-sensitive.
    pub fn resolve_alias(
        &self,
        ctx: &OpContext,
        station_id: &str,
        alias: &str,
    ) -> Result<String> {
        let relay = self.store.get_relay_by_alias(ctx, station_id, alias)?;
        debug!(station_id, alias, relay_id = %relay.id, "alias resolved");
        Ok(relay.destination)
    }

    /// Destination URL for a relay id.
    pub fn resolve_id(&self, ctx: &OpContext, id: RelayId) -> Result<String> {
        Ok(self.store.get_relay_by_id(ctx, id)?.destination)
    }

    /// Relays of `station_id` tagged `label`, ordered by id.
    pub fn relays_by_tag(
        &self,
        ctx: &OpContext,
        label: &str,
        station_id: &str,
    ) -> Result<Vec<Relay>> {
        self.store.get_relays_by_tag(ctx, label, station_id)
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::errors::{Entity, StoreError};
    use crate::types::NewRelay;

    fn resolver() -> (Resolver, OpContext, RelayId) {
        let store = RelayStore::in_memory().unwrap();
        let ctx = OpContext::background();
        let user = store.create_user(&ctx, "alice", "Alice", "pw").unwrap();
        store.create_station(&ctx, "s1", &user).unwrap();
        let id = store
            .create_relay(
                &ctx,
                &NewRelay {
                    title: "Example".into(),
                    alias: "ex".into(),
                    destination: "https://example.com/a".into(),
                    note: String::new(),
                    station_id: "s1".into(),
                },
            )
            .unwrap();
        let tag = store.create_tag(&ctx, "news", "s1").unwrap();
        store.tag_relay(&ctx, id, tag).unwrap();
        (Resolver::new(Arc::new(store)), ctx, id)
    }

    #[test]
    fn resolves_alias_and_id_to_destination() {
        let (resolver, ctx, id) = resolver();
        assert_eq!(resolver.resolve_alias(&ctx, "s1", "ex").unwrap(), "https://example.com/a");
        assert_eq!(resolver.resolve_id(&ctx, id).unwrap(), "https://example.com/a");
    }

    #[test]
    fn unknown_alias_is_not_found() {
        let (resolver, ctx, _) = resolver();
        assert_matches!(
            resolver.resolve_alias(&ctx, "s1", "EX"),
            Err(StoreError::NotFound { entity: Entity::Relay, .. })
        );
        assert!(resolver.resolve_alias(&ctx, "s2", "ex").unwrap_err().is_not_found());
    }

    #[test]
    fn lists_tagged_relays() {
        let (resolver, ctx, id) = resolver();
        let relays = resolver.relays_by_tag(&ctx, "news", "s1").unwrap();
        assert_eq!(relays.len(), 1);
        assert_eq!(relays[0].id, id);
        assert!(resolver.relays_by_tag(&ctx, "news", "s2").unwrap().is_empty());
    }
}
