//! One algorithm instance shared by several pipelines

use crate::error::StatsError;
use crate::operator::{MultiStatsOperator, OperatorCore};
use crate::types::{
    ExecuteProcessRequestData, MultiStatsData, PropertyPair, RequestId, StatsAlgoAction,
    StatsAlgoRole, StatsDependency, StatsProcessRequestData, StatsProperty,
};
use tracing::debug;

/// Results the shared instance publishes for its followers
const OWNER_PROPERTIES: [StatsProperty; 3] = [
    StatsProperty::AecFrameControl,
    StatsProperty::AwbFrameControl,
    StatsProperty::AfFrameControl,
];

/// The master-role pipeline owns the shared instance and runs it; every
/// other pipeline waits for the owner's results and skips its own run.
#[derive(Debug, Default)]
pub struct SingletonStatsOperator {
    core: OperatorCore,
}

impl SingletonStatsOperator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_owner(&self) -> bool {
        self.core
            .binding()
            .is_some_and(|binding| binding.role == StatsAlgoRole::Master)
    }
}

impl MultiStatsOperator for SingletonStatsOperator {
    fn initialize(&mut self, data: MultiStatsData) -> Result<(), StatsError> {
        self.core.initialize(data)
    }

    fn update_stats_dependencies(
        &mut self,
        execute: &ExecuteProcessRequestData,
        stats: &mut StatsProcessRequestData,
        request_id_offset_from_last_flush: u64,
    ) -> Result<(), StatsError> {
        self.core.require_binding()?;
        let owner = self.is_owner();
        let request_id = execute.request_id;

        self.core.begin_request(request_id);
        stats.request_id = request_id;
        stats.dependencies.clear();

        self.core.register_atomically(stats, |core, stats| {
            let peer = core.parse_multi_request_info(execute)?;
            core.add_local_dependency(request_id, request_id_offset_from_last_flush, stats)?;

            match peer {
                Some(peer) if !owner => core.add_peer_dependencies(
                    request_id,
                    peer,
                    &OWNER_PROPERTIES,
                    request_id_offset_from_last_flush,
                    stats,
                ),
                None if !owner => {
                    debug!("Request {}: shared instance owner not streaming", request_id);
                    Ok(())
                }
                _ => Ok(()),
            }
        })?;

        stats.algo_action = self.get_stats_algo_action();
        Ok(())
    }

    fn get_stats_algo_action(&self) -> StatsAlgoAction {
        if self.is_owner() {
            return StatsAlgoAction::Run;
        }
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
    use isp_iq::HwContext;

    fn operator(role: StatsAlgoRole, pipeline_id: u32, peer: u32) -> SingletonStatsOperator {
        let mut operator = SingletonStatsOperator::new();
        operator
            .initialize(MultiStatsData {
                role,
                pipeline_id,
                peer_pipeline_id: Some(peer),
                hw_context: HwContext::default(),
                algo_sync_enabled: false,
            })
            .unwrap();
        operator
    }

    fn request(request_id: RequestId, pipeline_id: u32, peer: u32) -> ExecuteProcessRequestData {
        ExecuteProcessRequestData {
            request_id,
            pipeline_id,
            multi_request: Some(MultiRequestSync {
                peer_pipeline_id: peer,
                peer_request_id: request_id,
                peer_active: true,
            }),
        }
    }

    #[test]
    fn test_owner_runs_follower_waits_then_skips() {
        let mut owner = operator(StatsAlgoRole::Master, 0, 1);
        let mut follower = operator(StatsAlgoRole::Singleton, 1, 0);

        let mut owner_stats = StatsProcessRequestData::new(3);
        owner.update_stats_dependencies(&request(3, 0, 1), &mut owner_stats, 1).unwrap();
        assert_eq!(owner_stats.algo_action, StatsAlgoAction::Run);
        assert_eq!(owner_stats.peer_dependencies().count(), 0);

        let mut stats = StatsProcessRequestData::new(3);
        follower.update_stats_dependencies(&request(3, 1, 0), &mut stats, 1).unwrap();
        assert_eq!(stats.peer_dependencies().count(), 3);
        assert_eq!(stats.algo_action, StatsAlgoAction::Defer);

        for property in OWNER_PROPERTIES {
            follower.on_property_published(PropertyPair::peer(property, 0), 3);
        }
        assert_eq!(follower.get_stats_algo_action(), StatsAlgoAction::Skip);
    }

    #[test]
    fn test_follower_without_owner_runs() {
        let mut follower = operator(StatsAlgoRole::Singleton, 1, 0);
        let mut stats = StatsProcessRequestData::new(3);
        let execute = ExecuteProcessRequestData {
            request_id: 3,
            pipeline_id: 1,
            multi_request: None,
        };
        follower.update_stats_dependencies(&execute, &mut stats, 1).unwrap();
        assert_eq!(stats.algo_action, StatsAlgoAction::Run);
    }
}
