//! Pending dependency table.
//!
//! Each property pair has a single slot. A slot belongs to one consumer
//! request until the producer publishes or the dependency is removed;
//! reusing it for another request before that is an error, since the
//! later request could otherwise be satisfied by the wrong data.

use crate::error::StatsError;
use crate::types::{PropertyPair, RequestId};
use std::collections::BTreeMap;
use tracing::debug;

/// Dependency waiting for its producer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDependency {
    pub consumer_request: RequestId,
    pub producer_request: RequestId,
}

#[derive(Debug, Default)]
pub struct DependencyTracker {
    slots: BTreeMap<PropertyPair, PendingDependency>,
    /// Latest request published per pair since the last flush
    published: BTreeMap<PropertyPair, RequestId>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `producer_request` of `pair` has already been published
    pub fn is_published(&self, pair: &PropertyPair, producer_request: RequestId) -> bool {
        self.published
            .get(pair)
            .is_some_and(|latest| *latest >= producer_request)
    }

    /// Register a dependency.
    ///
    /// Returns `true` if the dependency is now pending, `false` if the
    /// producer already published it.
    pub fn add_dependency(
        &mut self,
        pair: PropertyPair,
        consumer_request: RequestId,
        producer_request: RequestId,
    ) -> Result<bool, StatsError> {
        if let Some(held) = self.slots.get(&pair) {
            if held.consumer_request != consumer_request {
                return Err(StatsError::SlotInUse {
                    pair,
                    held_by: held.consumer_request,
                    requested_by: consumer_request,
                });
            }
        }

        if self.is_published(&pair, producer_request) {
            self.slots.remove(&pair);
            return Ok(false);
        }

        self.slots.insert(
            pair,
            PendingDependency {
                consumer_request,
                producer_request,
            },
        );
        Ok(true)
    }

    /// Record a publication; frees the slot of `pair` if it was waiting
    /// for this request or an earlier one
    pub fn on_property_published(&mut self, pair: PropertyPair, producer_request: RequestId) -> bool {
        let latest = self.published.entry(pair).or_insert(producer_request);
        *latest = (*latest).max(producer_request);

        match self.slots.get(&pair) {
            Some(pending) if pending.producer_request <= producer_request => {
                debug!(
                    "{:?} request {} satisfies consumer {}",
                    pair, producer_request, pending.consumer_request
                );
                self.slots.remove(&pair);
                true
            }
            _ => false,
        }
    }

    /// Release the slot of `pair` if `consumer_request` holds it
    pub fn remove_dependency(&mut self, pair: &PropertyPair, consumer_request: RequestId) -> bool {
        match self.slots.get(pair) {
            Some(pending) if pending.consumer_request == consumer_request => {
                self.slots.remove(pair);
                true
            }
            _ => false,
        }
    }

    pub fn pending(&self, pair: &PropertyPair) -> Option<&PendingDependency> {
        self.slots.get(pair)
    }

    /// Pending dependencies held by `consumer_request`
    pub fn pending_for(&self, consumer_request: RequestId) -> impl Iterator<Item = (&PropertyPair, &PendingDependency)> {
        self.slots
            .iter()
            .filter(move |(_, pending)| pending.consumer_request == consumer_request)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Copy of the slot table for `rollback`
    pub(crate) fn checkpoint(&self) -> BTreeMap<PropertyPair, PendingDependency> {
        self.slots.clone()
    }

    /// Put the slot table back to a `checkpoint`; publications are kept
    pub(crate) fn rollback(&mut self, slots: BTreeMap<PropertyPair, PendingDependency>) {
        self.slots = slots;
    }

    /// Drop every slot and publication record
    pub fn flush(&mut self) {
        self.slots.clear();
        self.published.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StatsProperty;

    fn aec_peer() -> PropertyPair {
        PropertyPair::peer(StatsProperty::AecFrameControl, 1)
    }

    #[test]
    fn test_slot_reuse_by_other_request_rejected() {
        let mut tracker = DependencyTracker::new();
        assert!(tracker.add_dependency(aec_peer(), 10, 12).unwrap());
        assert!(matches!(
            tracker.add_dependency(aec_peer(), 11, 13),
            Err(StatsError::SlotInUse { held_by: 10, requested_by: 11, .. })
        ));
        assert!(tracker.add_dependency(aec_peer(), 10, 12).unwrap());
    }

    #[test]
    fn test_publication_frees_only_matching_slot() {
        let mut tracker = DependencyTracker::new();
        let awb_peer = PropertyPair::peer(StatsProperty::AwbFrameControl, 1);
        tracker.add_dependency(aec_peer(), 10, 12).unwrap();
        tracker.add_dependency(awb_peer, 10, 12).unwrap();

        assert!(!tracker.on_property_published(aec_peer(), 11));
        assert!(tracker.on_property_published(aec_peer(), 12));
        assert!(tracker.pending(&aec_peer()).is_none());
        assert!(tracker.pending(&awb_peer).is_some());
    }

    #[test]
    fn test_already_published_is_not_pending() {
        let mut tracker = DependencyTracker::new();
        tracker.on_property_published(aec_peer(), 20);
        assert!(!tracker.add_dependency(aec_peer(), 18, 19).unwrap());
        assert!(tracker.is_empty());

        tracker.flush();
        assert!(tracker.add_dependency(aec_peer(), 18, 19).unwrap());
    }

    #[test]
    fn test_remove_requires_owner() {
        let mut tracker = DependencyTracker::new();
        tracker.add_dependency(aec_peer(), 10, 12).unwrap();
        assert!(!tracker.remove_dependency(&aec_peer(), 11));
        assert!(tracker.remove_dependency(&aec_peer(), 10));
        assert!(tracker.is_empty());
        assert!(tracker.add_dependency(aec_peer(), 11, 13).unwrap());
    }

    #[test]
    fn test_rollback_restores_slots_but_keeps_publications() {
        let mut tracker = DependencyTracker::new();
        tracker.add_dependency(aec_peer(), 10, 12).unwrap();
        let checkpoint = tracker.checkpoint();

        tracker.remove_dependency(&aec_peer(), 10);
        tracker.add_dependency(aec_peer(), 11, 13).unwrap();
        tracker.on_property_published(aec_peer(), 9);
        tracker.rollback(checkpoint);

        assert_eq!(tracker.pending(&aec_peer()).map(|p| p.consumer_request), Some(10));
        assert!(tracker.is_published(&aec_peer(), 9));
    }
}
