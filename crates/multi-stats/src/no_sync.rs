//! Independent pipelines

use crate::error::StatsError;
use crate::operator::{MultiStatsOperator, OperatorCore};
use crate::types::{
    ExecuteProcessRequestData, MultiStatsData, PropertyPair, RequestId, StatsAlgoAction,
    StatsDependency, StatsProcessRequestData,
};

/// Every pipeline runs its own algorithm; only the local previous-request
/// dependency is tracked.
#[derive(Debug, Default)]
pub struct NoSyncStatsOperator {
    core: OperatorCore,
}

impl NoSyncStatsOperator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MultiStatsOperator for NoSyncStatsOperator {
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
        let request_id = execute.request_id;
        self.core.begin_request(request_id);
        stats.request_id = request_id;
        stats.dependencies.clear();

        self.core.register_atomically(stats, |core, stats| {
            // Peer metadata is checked for consistency but never followed.
            core.parse_multi_request_info(execute)?;
            core.add_local_dependency(request_id, request_id_offset_from_last_flush, stats)
        })?;
        stats.algo_action = StatsAlgoAction::Run;
        Ok(())
    }

    fn get_stats_algo_action(&self) -> StatsAlgoAction {
        StatsAlgoAction::Run
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
