//! Multi-Stats Error Types

use crate::types::{PipelineId, PropertyPair, RequestId};
use thiserror::Error;

/// Errors raised while coordinating stats dependencies
#[derive(Debug, Error)]
pub enum StatsError {
    /// Operator used before `initialize`
    #[error("Stats operator not initialized")]
    NotInitialized,

    /// `initialize` called on an operator that is already bound
    #[error("Stats operator already initialized for pipeline {0}")]
    AlreadyInitialized(PipelineId),

    /// Dependency slot still held by an unresolved earlier request
    #[error("Dependency slot {pair:?} held by request {held_by}, requested by {requested_by}")]
    SlotInUse {
        pair: PropertyPair,
        held_by: RequestId,
        requested_by: RequestId,
    },

    /// Peer is further ahead than the request window allows
    #[error("Peer request offset -{offset} outside window of {window}")]
    OffsetOutOfWindow { offset: u64, window: u64 },

    /// Request metadata names a peer that cannot be used
    #[error("Invalid peer pipeline {0}")]
    InvalidPeer(PipelineId),
}
