//! Face ROI Utilities
//!
//! Converts face detection results to and from the stabilization buffer,
//! damps frame-to-frame jitter of detected faces, and orders faces by
//! size so the largest faces drive 3A weighting.

mod roi;
mod stabilizer;

pub use roi::{
    convert_from_stabilization_data, convert_to_stabilization_data, sort_faces, FaceResults,
    FaceRoi, StabilizationData, StabilizationEntry,
};
pub use stabilizer::{StabilizationConfig, Stabilizer, StabilizerError};
