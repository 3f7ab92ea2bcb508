//! Face ROI types and conversions

use serde::{Deserialize, Serialize};

/// One detected face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRoi {
    /// Tracking id assigned by the detector
    pub id: u32,
    /// Center in sensor coordinates
    pub center: (i32, i32),
    /// Width and height
    pub size: (u32, u32),
    /// Detection confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl FaceRoi {
    pub fn area(&self) -> u64 {
        self.size.0 as u64 * self.size.1 as u64
    }
}

/// Faces reported for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceResults {
    pub faces: Vec<FaceRoi>,
}

/// Stabilizer view of one face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilizationEntry {
    pub id: u32,
    pub center: (i32, i32),
    pub size: (u32, u32),
    pub confidence: f32,
}

/// Per-frame buffer consumed and produced by the stabilizer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StabilizationData {
    pub entries: Vec<StabilizationEntry>,
}

pub fn convert_to_stabilization_data(results: &FaceResults) -> StabilizationData {
    StabilizationData {
        entries: results
            .faces
            .iter()
            .map(|face| StabilizationEntry {
                id: face.id,
                center: face.center,
                size: face.size,
                confidence: face.confidence,
            })
            .collect(),
    }
}

pub fn convert_from_stabilization_data(data: &StabilizationData) -> FaceResults {
    FaceResults {
        faces: data
            .entries
            .iter()
            .map(|entry| FaceRoi {
                id: entry.id,
                center: entry.center,
                size: entry.size,
                confidence: entry.confidence,
            })
            .collect(),
    }
}

/// Order faces largest first
pub fn sort_faces(faces: &mut [FaceRoi]) {
    faces.sort_unstable_by(|a, b| b.area().cmp(&a.area()));
}
