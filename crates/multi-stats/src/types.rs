//! Request metadata and dependency descriptors

use isp_iq::HwContext;
use serde::{Deserialize, Serialize};

pub type PipelineId = u32;
pub type RequestId = u64;

/// Role of this pipeline's stats algorithm instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatsAlgoRole {
    /// Standalone camera
    #[default]
    Default,
    /// Drives the decision in a synchronized pair
    Master,
    /// Follows the master's decision
    Slave,
    /// Shares one algorithm instance with other pipelines
    Singleton,
}

/// Binding supplied once at operator construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiStatsData {
    pub role: StatsAlgoRole,
    pub pipeline_id: PipelineId,
    /// Peer pipeline, when one is configured
    pub peer_pipeline_id: Option<PipelineId>,
    pub hw_context: HwContext,
    /// Peer synchronization requested by the usecase
    pub algo_sync_enabled: bool,
}

/// Properties a stats algorithm publishes per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatsProperty {
    AecFrameControl,
    AecFrameInfo,
    AwbFrameControl,
    AwbInternal,
    AfFrameControl,
}

/// Where a property is published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropertySource {
    /// This pipeline
    Local,
    /// Another pipeline
    Peer(PipelineId),
}

/// One property of one pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyPair {
    pub property: StatsProperty,
    pub source: PropertySource,
}

impl PropertyPair {
    pub fn local(property: StatsProperty) -> Self {
        Self {
            property,
            source: PropertySource::Local,
        }
    }

    pub fn peer(property: StatsProperty, pipeline_id: PipelineId) -> Self {
        Self {
            property,
            source: PropertySource::Peer(pipeline_id),
        }
    }

    pub fn is_peer(&self) -> bool {
        matches!(self.source, PropertySource::Peer(_))
    }
}

/// A property required by a request, addressed relative to that request.
///
/// The producer request is `request - offset`, or `request + offset` when
/// `negative` is set (the producer runs ahead).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsDependency {
    pub pair: PropertyPair,
    pub offset: u64,
    pub negative: bool,
}

impl StatsDependency {
    /// Producer request id for consumer `request_id`
    pub fn resolve(&self, request_id: RequestId) -> Option<RequestId> {
        if self.negative {
            request_id.checked_add(self.offset)
        } else {
            request_id.checked_sub(self.offset)
        }
    }
}

/// Peer relationship carried by a multi-camera request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiRequestSync {
    pub peer_pipeline_id: PipelineId,
    /// Peer request captured together with this one
    pub peer_request_id: RequestId,
    /// Peer pipeline is streaming this request
    pub peer_active: bool,
}

/// Scheduler view of one request entering a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteProcessRequestData {
    pub request_id: RequestId,
    pub pipeline_id: PipelineId,
    pub multi_request: Option<MultiRequestSync>,
}

/// What the stats algorithm should do with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatsAlgoAction {
    /// Run the local algorithm
    #[default]
    Run,
    /// Peer data this request depends on is not published yet
    Defer,
    /// Peer result is available; reuse it instead of running
    Skip,
}

/// Stats node output for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsProcessRequestData {
    pub request_id: RequestId,
    pub dependencies: Vec<StatsDependency>,
    pub algo_action: StatsAlgoAction,
}

impl StatsProcessRequestData {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            ..Default::default()
        }
    }

    /// Dependencies on properties published by other pipelines
    pub fn peer_dependencies(&self) -> impl Iterator<Item = &StatsDependency> {
        self.dependencies.iter().filter(|d| d.pair.is_peer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_both_directions() {
        let behind = StatsDependency {
            pair: PropertyPair::local(StatsProperty::AecFrameControl),
            offset: 1,
            negative: false,
        };
        assert_eq!(behind.resolve(10), Some(9));
        assert_eq!(behind.resolve(0), None);

        let ahead = StatsDependency {
            pair: PropertyPair::peer(StatsProperty::AwbFrameControl, 1),
            offset: 3,
            negative: true,
        };
        assert_eq!(ahead.resolve(10), Some(13));
    }
}
