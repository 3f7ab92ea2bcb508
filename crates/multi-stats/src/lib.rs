//! Multi-Camera Stats Coordination
//!
//! When two pipelines stream from cameras that must agree on exposure and
//! white balance, their stats algorithms cannot run independently. The
//! operators here decide, per request, which properties published by the
//! peer pipeline a request depends on and whether the local algorithm
//! should run, wait, or reuse the peer's result.

mod error;
mod no_sync;
mod operator;
mod qti;
mod singleton;
mod tracker;
mod types;

pub use error::StatsError;
pub use no_sync::NoSyncStatsOperator;
pub use operator::{create_operator, MultiStatsOperator, MultiStatsStrategy};
pub use qti::QtiMultiStatsOperator;
pub use singleton::SingletonStatsOperator;
pub use tracker::{DependencyTracker, PendingDependency};
pub use types::{
    ExecuteProcessRequestData, MultiRequestSync, MultiStatsData, PipelineId, PropertyPair,
    PropertySource, RequestId, StatsAlgoAction, StatsAlgoRole, StatsDependency,
    StatsProcessRequestData, StatsProperty,
};

/// How far ahead of the local request a peer may run before its data is
/// considered out of window
pub const MAX_PEER_LEAD: u64 = 8;
