use super::Score;
use crate::error::{Error, Result};
use crate::feat::LabFeatureMap;

/// Base classifiers are checked against the running threshold in groups.
const FEAT_GROUP_SIZE: usize = 10;
/// Windows flatter than this are rejected outright.
const STD_DEV_THRESH: f64 = 10.0;

/// Position of a LAB code relative to the window's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabFeature {
    pub x: i32,
    pub y: i32,
}

/// Maps a LAB code to a vote.
#[derive(Debug, Clone)]
pub struct LabBaseClassifier {
    weights: Vec<f32>,
    thresh: f32,
}

impl LabBaseClassifier {
    pub fn num_bin(&self) -> usize {
        self.weights.len() - 1
    }

    #[inline]
    pub fn weight(&self, val: u8) -> f32 {
        self.weights[val as usize]
    }

    pub fn threshold(&self) -> f32 {
        self.thresh
    }
}

/// A strong classifier boosted from [`LabBaseClassifier`]s.
#[derive(Debug, Clone)]
pub struct LabBoostedClassifier {
    features: Vec<LabFeature>,
    base_classifiers: Vec<LabBaseClassifier>,
    use_std_dev: bool,
}

impl Default for LabBoostedClassifier {
    fn default() -> Self {
        LabBoostedClassifier::new()
    }
}

impl LabBoostedClassifier {
    pub fn new() -> LabBoostedClassifier {
        LabBoostedClassifier {
            features: Vec::new(),
            base_classifiers: Vec::new(),
            use_std_dev: true,
        }
    }

    pub fn add_feature(&mut self, x: i32, y: i32) {
        self.features.push(LabFeature { x, y });
    }

    /// `weights` holds one vote per LAB code, so it needs at least 256 entries.
    pub fn add_base_classifier(&mut self, weights: Vec<f32>, thresh: f32) -> Result<()> {
        if weights.len() <= u8::MAX as usize {
            return Err(Error::InvalidModel(format!(
                "LAB vote table needs {} entries, got {}",
                u8::MAX as usize + 1,
                weights.len()
            )));
        }
        self.base_classifiers.push(LabBaseClassifier { weights, thresh });
        Ok(())
    }

    pub fn set_use_std_dev(&mut self, use_std_dev: bool) {
        self.use_std_dev = use_std_dev;
    }

    pub fn features(&self) -> &[LabFeature] {
        &self.features
    }

    pub fn base_classifiers(&self) -> &[LabBaseClassifier] {
        &self.base_classifiers
    }

    pub fn classify(&self, feat_map: &LabFeatureMap) -> Score {
        let mut positive = true;
        let mut score = 0.0f32;

        let groups = self
            .features
            .chunks(FEAT_GROUP_SIZE)
            .zip(self.base_classifiers.chunks(FEAT_GROUP_SIZE));
        for (features, classifiers) in groups {
            for (feat, classifier) in features.iter().zip(classifiers) {
                score += classifier.weight(feat_map.feature_value(feat.x, feat.y));
            }
            if let Some(last) = classifiers.last() {
                if score < last.threshold() {
                    positive = false;
                    break;
                }
            }
        }
        positive = positive && (!self.use_std_dev || feat_map.std_dev() > STD_DEV_THRESH);

        Score::new(positive, score)
    }
}
