//! Operator interface and state shared by every variant

use crate::error::StatsError;
use crate::no_sync::NoSyncStatsOperator;
use crate::qti::QtiMultiStatsOperator;
use crate::singleton::SingletonStatsOperator;
use crate::tracker::DependencyTracker;
use crate::types::{
    ExecuteProcessRequestData, MultiRequestSync, MultiStatsData, PipelineId, PropertyPair,
    RequestId, StatsAlgoAction, StatsDependency, StatsProcessRequestData, StatsProperty,
};
use crate::MAX_PEER_LEAD;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Coordination strategy for a multi-camera usecase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MultiStatsStrategy {
    /// Master/slave synchronized pair
    Qti,
    /// One algorithm instance shared by all pipelines
    Singleton,
    /// Independent pipelines
    #[default]
    NoSync,
}

/// Per-pipeline stats coordination
pub trait MultiStatsOperator: Send + Sync {
    /// Bind role and pipeline identity. Only allowed once.
    fn initialize(&mut self, data: MultiStatsData) -> Result<(), StatsError>;

    /// Register the dependencies of one request and record the algorithm
    /// action in `stats`
    fn update_stats_dependencies(
        &mut self,
        execute: &ExecuteProcessRequestData,
        stats: &mut StatsProcessRequestData,
        request_id_offset_from_last_flush: u64,
    ) -> Result<(), StatsError>;

    /// Action for the request most recently passed to
    /// `update_stats_dependencies`
    fn get_stats_algo_action(&self) -> StatsAlgoAction;

    /// A property was published; returns whether a pending slot was freed
    fn on_property_published(&mut self, pair: PropertyPair, request_id: RequestId) -> bool;

    /// Release a dependency that is satisfied elsewhere or abandoned
    fn remove_dependency(&mut self, dependency: &StatsDependency, request_id: RequestId) -> bool;

    /// Drop all pending dependencies after a pipeline flush
    fn flush(&mut self);

    fn binding(&self) -> Option<&MultiStatsData>;
}

/// Build the operator for `strategy`
pub fn create_operator(strategy: MultiStatsStrategy) -> Box<dyn MultiStatsOperator> {
    match strategy {
        MultiStatsStrategy::Qti => Box::new(QtiMultiStatsOperator::new()),
        MultiStatsStrategy::Singleton => Box::new(SingletonStatsOperator::new()),
        MultiStatsStrategy::NoSync => Box::new(NoSyncStatsOperator::new()),
    }
}

/// Peer request this request is paired with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PeerRequest {
    pub pipeline_id: PipelineId,
    pub request_id: RequestId,
}

/// Binding, tracker and per-request bookkeeping
#[derive(Debug, Default)]
pub(crate) struct OperatorCore {
    binding: Option<MultiStatsData>,
    pub tracker: DependencyTracker,
    current_request: Option<RequestId>,
    /// Peer pairs registered for the current request
    peer_pairs: Vec<PropertyPair>,
}

impl OperatorCore {
    pub fn initialize(&mut self, data: MultiStatsData) -> Result<(), StatsError> {
        if let Some(existing) = &self.binding {
            return Err(StatsError::AlreadyInitialized(existing.pipeline_id));
        }
        info!(
            "Stats operator bound: pipeline {} role {:?} peer {:?}",
            data.pipeline_id, data.role, data.peer_pipeline_id
        );
        self.binding = Some(data);
        Ok(())
    }

    pub fn binding(&self) -> Option<&MultiStatsData> {
        self.binding.as_ref()
    }

    pub fn require_binding(&self) -> Result<&MultiStatsData, StatsError> {
        self.binding.as_ref().ok_or(StatsError::NotInitialized)
    }

    /// Start bookkeeping for a new request
    pub fn begin_request(&mut self, request_id: RequestId) {
        self.current_request = Some(request_id);
        self.peer_pairs.clear();
    }

    /// Extract the peer pairing from request metadata.
    ///
    /// The peer can come and go between requests, so this is evaluated for
    /// every request rather than cached from initialization.
    pub fn parse_multi_request_info(
        &mut self,
        execute: &ExecuteProcessRequestData,
    ) -> Result<Option<PeerRequest>, StatsError> {
        let binding = self.binding.as_mut().ok_or(StatsError::NotInitialized)?;
        let Some(MultiRequestSync {
            peer_pipeline_id,
            peer_request_id,
            peer_active,
        }) = execute.multi_request
        else {
            return Ok(None);
        };

        if peer_pipeline_id == binding.pipeline_id {
            return Err(StatsError::InvalidPeer(peer_pipeline_id));
        }
        if !peer_active {
            debug!("Pipeline {}: peer {} inactive", binding.pipeline_id, peer_pipeline_id);
            return Ok(None);
        }
        if binding.peer_pipeline_id != Some(peer_pipeline_id) {
            info!(
                "Pipeline {}: peer changed {:?} -> {}",
                binding.pipeline_id, binding.peer_pipeline_id, peer_pipeline_id
            );
            binding.peer_pipeline_id = Some(peer_pipeline_id);
        }
        Ok(Some(PeerRequest {
            pipeline_id: peer_pipeline_id,
            request_id: peer_request_id,
        }))
    }

    /// Run `register_all` against this request's bookkeeping, undoing every
    /// slot it took when it fails part way
    pub fn register_atomically<F>(
        &mut self,
        stats: &mut StatsProcessRequestData,
        register_all: F,
    ) -> Result<(), StatsError>
    where
        F: FnOnce(&mut Self, &mut StatsProcessRequestData) -> Result<(), StatsError>,
    {
        let slots = self.tracker.checkpoint();
        let result = register_all(self, stats);
        if let Err(err) = &result {
            warn!("Request {}: dependency update rolled back: {}", stats.request_id, err);
            self.tracker.rollback(slots);
            self.peer_pairs.clear();
            stats.dependencies.clear();
        }
        result
    }

    fn register(
        &mut self,
        dependency: StatsDependency,
        request_id: RequestId,
        stats: &mut StatsProcessRequestData,
    ) -> Result<(), StatsError> {
        let Some(producer) = dependency.resolve(request_id) else {
            return Ok(());
        };
        self.tracker
            .add_dependency(dependency.pair, request_id, producer)?;
        if dependency.pair.is_peer() {
            self.peer_pairs.push(dependency.pair);
        }
        stats.dependencies.push(dependency);
        Ok(())
    }

    /// Own previous request's AEC result, unless the request follows a flush
    pub fn add_local_dependency(
        &mut self,
        request_id: RequestId,
        request_id_offset_from_last_flush: u64,
        stats: &mut StatsProcessRequestData,
    ) -> Result<(), StatsError> {
        if request_id_offset_from_last_flush <= 1 {
            return Ok(());
        }
        let dependency = StatsDependency {
            pair: PropertyPair::local(StatsProperty::AecFrameControl),
            offset: 1,
            negative: false,
        };
        self.register(dependency, request_id, stats)
    }

    /// Depend on `properties` of the peer request paired with `request_id`.
    ///
    /// A peer lagging beyond the flush window has nothing valid to offer and
    /// is ignored; a peer leading by more than [`MAX_PEER_LEAD`] is an error.
    pub fn add_peer_dependencies(
        &mut self,
        request_id: RequestId,
        peer: PeerRequest,
        properties: &[StatsProperty],
        request_id_offset_from_last_flush: u64,
        stats: &mut StatsProcessRequestData,
    ) -> Result<(), StatsError> {
        let negative = peer.request_id > request_id;
        let offset = request_id.abs_diff(peer.request_id);

        if negative && offset > MAX_PEER_LEAD {
            return Err(StatsError::OffsetOutOfWindow {
                offset,
                window: MAX_PEER_LEAD,
            });
        }
        if !negative && offset >= request_id_offset_from_last_flush {
            debug!(
                "Request {}: peer request {} precedes last flush, no dependency",
                request_id, peer.request_id
            );
            return Ok(());
        }

        for property in properties {
            let dependency = StatsDependency {
                pair: PropertyPair::peer(*property, peer.pipeline_id),
                offset,
                negative,
            };
            self.register(dependency, request_id, stats)?;
        }
        Ok(())
    }

    /// Run when no peer dependency was registered, defer while any is
    /// pending, skip once all are satisfied
    pub fn peer_action(&self) -> StatsAlgoAction {
        let Some(request_id) = self.current_request else {
            return StatsAlgoAction::Run;
        };
        if self.peer_pairs.is_empty() {
            return StatsAlgoAction::Run;
        }
        let pending = self.peer_pairs.iter().any(|pair| {
            self.tracker
                .pending(pair)
                .is_some_and(|p| p.consumer_request == request_id)
        });
        if pending {
            StatsAlgoAction::Defer
        } else {
            StatsAlgoAction::Skip
        }
    }

    pub fn remove_dependency(&mut self, dependency: &StatsDependency, request_id: RequestId) -> bool {
        let removed = self.tracker.remove_dependency(&dependency.pair, request_id);
        if removed && self.current_request == Some(request_id) {
            self.peer_pairs.retain(|pair| *pair != dependency.pair);
        }
        removed
    }

    pub fn flush(&mut self) {
        self.tracker.flush();
        self.current_request = None;
        self.peer_pairs.clear();
    }
}
