//! Boundaries for the stages that follow detection.
//!
//! Landmark localization and identity-feature extraction are provided by
//! other engines; implement these traits to plug them in.

use crate::common::{FaceInfo, FacialLandmark, ImageData};

/// Locates five facial points inside a detected face: the two eye centres,
/// the nose tip and the two mouth corners.
pub trait LandmarkLocator: Send + Sync {
    /// `image` is the grayscale image `face` was detected in.
    fn locate(&self, image: &ImageData, face: &FaceInfo) -> Option<[FacialLandmark; 5]>;
}

/// Turns an aligned face into a fixed-length identity vector.
pub trait FeatureExtractor: Send + Sync {
    fn feature_dim(&self) -> usize;

    /// Returns `None` when the face cannot be cropped from `image`.
    fn extract(&self, image: &ImageData, landmarks: &[FacialLandmark; 5]) -> Option<Vec<f32>>;
}

/// Cosine of the angle between two feature vectors; 0 when the lengths differ
/// or either vector is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}
