//! Master/slave synchronized pair

use crate::error::StatsError;
use crate::operator::{MultiStatsOperator, OperatorCore};
use crate::types::{
    ExecuteProcessRequestData, MultiStatsData, PropertyPair, RequestId, StatsAlgoAction,
    StatsAlgoRole, StatsDependency, StatsProcessRequestData, StatsProperty,
};
use tracing::debug;

/// Peer properties a slave waits for
const SLAVE_PEER_PROPERTIES: [StatsProperty; 2] =
    [StatsProperty::AecFrameControl, StatsProperty::AwbFrameControl];

/// The slave pipeline follows the master's AEC and AWB decisions when
/// algorithm sync is enabled and the master is streaming.
#[derive(Debug, Default)]
pub struct QtiMultiStatsOperator {
    core: OperatorCore,
}

impl QtiMultiStatsOperator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of dependency slots currently held
    pub fn pending_count(&self) -> usize {
        self.core.tracker.len()
    }
}

impl MultiStatsOperator for QtiMultiStatsOperator {
    fn initialize(&mut self, data: MultiStatsData) -> Result<(), StatsError> {
        self.core.initialize(data)
    }

    fn update_stats_dependencies(
        &mut self,
        execute: &ExecuteProcessRequestData,
        stats: &mut StatsProcessRequestData,
        request_id_offset_from_last_flush: u64,
    ) -> Result<(), StatsError> {
        let binding = self.core.require_binding()?;
        let follows_peer = binding.role == StatsAlgoRole::Slave && binding.algo_sync_enabled;
        let request_id = execute.request_id;

        self.core.begin_request(request_id);
        stats.request_id = request_id;
        stats.dependencies.clear();

        self.core.register_atomically(stats, |core, stats| {
            let peer = core.parse_multi_request_info(execute)?;
            core.add_local_dependency(request_id, request_id_offset_from_last_flush, stats)?;

            match peer {
                Some(peer) if follows_peer => core.add_peer_dependencies(
                    request_id,
                    peer,
                    &SLAVE_PEER_PROPERTIES,
                    request_id_offset_from_last_flush,
                    stats,
                ),
                _ => {
                    debug!("Request {}: no peer dependency", request_id);
                    Ok(())
                }
            }
        })?;

        stats.algo_action = self.get_stats_algo_action();
        Ok(())
    }

    fn get_stats_algo_action(&self) -> StatsAlgoAction {
        self.core.peer_action()
    }

    fn on_property_published(&mut self, pair: PropertyPair, request_id: RequestId) -> bool {
        self.core.tracker.on_property_published(pair, request_id)
    }

    fn remove_dependency(&mut self, dependency: &StatsDependency, request_id: RequestId) -> bool {
        self.core.remove_dependency(dependency, request_id)
    }

    fn flush(&mut self) {
        self.core.flush();
    }

    fn binding(&self) -> Option<&MultiStatsData> {
        self.core.binding()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MultiRequestSync;
    use crate::MAX_PEER_LEAD;
    use isp_iq::HwContext;

    fn slave() -> QtiMultiStatsOperator {
        let mut operator = QtiMultiStatsOperator::new();
        operator
            .initialize(MultiStatsData {
                role: StatsAlgoRole::Slave,
                pipeline_id: 1,
                peer_pipeline_id: Some(0),
                hw_context: HwContext::default(),
                algo_sync_enabled: true,
            })
            .unwrap();
        operator
    }

    fn request(request_id: RequestId, peer_request_id: RequestId) -> ExecuteProcessRequestData {
        ExecuteProcessRequestData {
            request_id,
            pipeline_id: 1,
            multi_request: Some(MultiRequestSync {
                peer_pipeline_id: 0,
                peer_request_id,
                peer_active: true,
            }),
        }
    }

    #[test]
    fn test_slave_defers_until_peer_publishes() {
        let mut operator = slave();
        let mut stats = StatsProcessRequestData::new(10);
        operator
            .update_stats_dependencies(&request(10, 10), &mut stats, 10)
            .unwrap();

        assert_eq!(stats.peer_dependencies().count(), 2);
        assert_eq!(stats.algo_action, StatsAlgoAction::Defer);

        operator.on_property_published(PropertyPair::peer(StatsProperty::AecFrameControl, 0), 10);
        assert_eq!(operator.get_stats_algo_action(), StatsAlgoAction::Defer);
        operator.on_property_published(PropertyPair::peer(StatsProperty::AwbFrameControl, 0), 10);
        assert_eq!(operator.get_stats_algo_action(), StatsAlgoAction::Skip);
    }

    #[test]
    fn test_peer_ahead_sets_negative_offset() {
        let mut operator = slave();
        let mut stats = StatsProcessRequestData::new(10);
        operator
            .update_stats_dependencies(&request(10, 13), &mut stats, 10)
            .unwrap();

        let dependency = stats.peer_dependencies().next().copied().unwrap();
        assert!(dependency.negative);
        assert_eq!(dependency.offset, 3);
        assert_eq!(dependency.resolve(10), Some(13));
    }

    #[test]
    fn test_peer_lead_beyond_window_fails() {
        let mut operator = slave();
        let mut stats = StatsProcessRequestData::new(10);
        let err = operator
            .update_stats_dependencies(&request(10, 10 + MAX_PEER_LEAD + 1), &mut stats, 10)
            .unwrap_err();
        assert!(matches!(err, StatsError::OffsetOutOfWindow { offset: 9, .. }));
    }

    #[test]
    fn test_peer_lag_before_flush_dropped() {
        let mut operator = slave();
        let mut stats = StatsProcessRequestData::new(10);
        operator
            .update_stats_dependencies(&request(10, 6), &mut stats, 4)
            .unwrap();
        assert_eq!(stats.peer_dependencies().count(), 0);
        assert_eq!(stats.algo_action, StatsAlgoAction::Run);
    }

    #[test]
    fn test_first_request_after_flush_has_no_local_dependency() {
        let mut operator = slave();
        let mut stats = StatsProcessRequestData::new(10);
        let execute = ExecuteProcessRequestData {
            request_id: 10,
            pipeline_id: 1,
            multi_request: None,
        };
        operator.update_stats_dependencies(&execute, &mut stats, 1).unwrap();
        assert!(stats.dependencies.is_empty());

        let execute = ExecuteProcessRequestData {
            request_id: 11,
            ..execute
        };
        operator.update_stats_dependencies(&execute, &mut stats, 2).unwrap();
        assert_eq!(stats.dependencies.len(), 1);
        assert_eq!(stats.dependencies[0].pair, PropertyPair::local(StatsProperty::AecFrameControl));
        assert_eq!(stats.dependencies[0].resolve(11), Some(10));
    }

    #[test]
    fn test_remove_dependency_leaves_no_residue() {
        let mut operator = slave();
        let mut stats = StatsProcessRequestData::new(10);
        operator
            .update_stats_dependencies(&request(10, 10), &mut stats, 1)
            .unwrap();
        for dependency in stats.dependencies.clone() {
            assert!(operator.remove_dependency(&dependency, 10));
        }
        assert_eq!(operator.pending_count(), 0);
        assert_eq!(operator.get_stats_algo_action(), StatsAlgoAction::Run);

        // A later request reuses the slots and must not see request 10's entry.
        let mut next = StatsProcessRequestData::new(20);
        operator
            .update_stats_dependencies(&request(20, 20), &mut next, 2)
            .unwrap();
        assert_eq!(next.algo_action, StatsAlgoAction::Defer);
        assert!(!operator.on_property_published(PropertyPair::peer(StatsProperty::AecFrameControl, 0), 10));
        assert_eq!(operator.get_stats_algo_action(), StatsAlgoAction::Defer);
    }

    #[test]
    fn test_unresolved_slot_blocks_next_request() {
        let mut operator = slave();
        let mut stats = StatsProcessRequestData::new(10);
        operator
            .update_stats_dependencies(&request(10, 10), &mut stats, 1)
            .unwrap();
        let mut next = StatsProcessRequestData::new(11);
        assert!(matches!(
            operator.update_stats_dependencies(&request(11, 11), &mut next, 2),
            Err(StatsError::SlotInUse { held_by: 10, .. })
        ));
    }

    #[test]
    fn test_master_and_sync_disabled_run() {
        let mut master = QtiMultiStatsOperator::new();
        master
            .initialize(MultiStatsData {
                role: StatsAlgoRole::Master,
                pipeline_id: 0,
                peer_pipeline_id: Some(1),
                hw_context: HwContext::default(),
                algo_sync_enabled: true,
            })
            .unwrap();
        let mut stats = StatsProcessRequestData::new(5);
        let execute = ExecuteProcessRequestData {
            request_id: 5,
            pipeline_id: 0,
            multi_request: Some(MultiRequestSync {
                peer_pipeline_id: 1,
                peer_request_id: 5,
                peer_active: true,
            }),
        };
        master.update_stats_dependencies(&execute, &mut stats, 1).unwrap();
        assert_eq!(stats.algo_action, StatsAlgoAction::Run);
    }

    #[test]
    fn test_initialize_is_construct_once() {
        let mut operator = QtiMultiStatsOperator::new();
        let mut stats = StatsProcessRequestData::new(1);
        assert!(matches!(
            operator.update_stats_dependencies(&request(1, 1), &mut stats, 1),
            Err(StatsError::NotInitialized)
        ));

        let data = MultiStatsData {
            role: StatsAlgoRole::Slave,
            pipeline_id: 1,
            peer_pipeline_id: Some(0),
            hw_context: HwContext::default(),
            algo_sync_enabled: true,
        };
        operator.initialize(data.clone()).unwrap();
        assert!(matches!(operator.initialize(data), Err(StatsError::AlreadyInitialized(1))));
    }

    #[test]
    fn test_failed_update_releases_its_slots() {
        let mut operator = slave();
        let aec = PropertyPair::peer(StatsProperty::AecFrameControl, 0);
        let mut stats = StatsProcessRequestData::new(10);
        operator
            .update_stats_dependencies(&request(10, 10), &mut stats, 1)
            .unwrap();
        operator.on_property_published(aec, 10);
        assert_eq!(operator.pending_count(), 1);

        let mut next = StatsProcessRequestData::new(11);
        assert!(matches!(
            operator.update_stats_dependencies(&request(11, 11), &mut next, 1),
            Err(StatsError::SlotInUse { held_by: 10, .. })
        ));
        assert_eq!(operator.pending_count(), 1);
        assert!(operator.core.tracker.pending(&aec).is_none());
        assert!(next.dependencies.is_empty());
    }
}
