mod lab;
mod surf;

pub use self::lab::{LabFeatureMap, LAB_PATCH_SIZE};
pub use self::surf::{SurfFeature, SurfFeatureMap, SurfFeaturePool};

use crate::classifier::ClassifierKind;
use crate::common::Rect;

/// A feature map of either family, as required by the classifier it serves.
#[derive(Debug, Clone)]
pub enum FeatureMap {
    Lab(LabFeatureMap),
    Surf(SurfFeatureMap),
}

impl FeatureMap {
    pub fn new(kind: ClassifierKind) -> FeatureMap {
        match kind {
            ClassifierKind::LabBoosted => FeatureMap::Lab(LabFeatureMap::new()),
            ClassifierKind::SurfMlp => FeatureMap::Surf(SurfFeatureMap::new()),
        }
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            FeatureMap::Lab(_) => ClassifierKind::LabBoosted,
            FeatureMap::Surf(_) => ClassifierKind::SurfMlp,
        }
    }

    /// Pre-processes a whole `width x height` grayscale buffer.
    pub fn compute(&mut self, input: &[u8], width: u32, height: u32) {
        match self {
            FeatureMap::Lab(map) => map.compute(input, width, height),
            FeatureMap::Surf(map) => map.compute(input, width, height),
        }
    }

    pub fn set_roi(&mut self, roi: Rect) {
        match self {
            FeatureMap::Lab(map) => map.set_roi(roi),
            FeatureMap::Surf(map) => map.set_roi(roi),
        }
    }
}

/// One lazily created feature map per classifier family.
///
/// Stages of the same family share a map, so a level or window is
/// pre-processed once however many classifiers read it.
#[derive(Debug, Default)]
pub struct FeatureMaps {
    lab: Option<FeatureMap>,
    surf: Option<FeatureMap>,
}

impl FeatureMaps {
    pub fn new() -> FeatureMaps {
        FeatureMaps::default()
    }

    pub fn get_mut(&mut self, kind: ClassifierKind) -> &mut FeatureMap {
        let slot = match kind {
            ClassifierKind::LabBoosted => &mut self.lab,
            ClassifierKind::SurfMlp => &mut self.surf,
        };
        slot.get_or_insert_with(|| FeatureMap::new(kind))
    }
}
