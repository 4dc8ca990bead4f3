use super::{Score, Workspace};
use crate::classifier::mlp::{Activation, Mlp, MlpLayer, WorkerPool};
use crate::error::{Error, Result};
use crate::feat::{SurfFeatureMap, SurfFeaturePool};

/// A SURF feature vector fed through a small MLP.
///
/// Output 0 is the face score; remaining outputs, when present, are box
/// regression terms read by the detector.
#[derive(Debug, Clone)]
pub struct SurfMlpClassifier {
    feat_ids: Vec<usize>,
    feat_dim: usize,
    model: Mlp,
    thresh: f32,
}

impl SurfMlpClassifier {
    pub fn new(workers: WorkerPool) -> SurfMlpClassifier {
        SurfMlpClassifier {
            feat_ids: Vec::new(),
            feat_dim: 0,
            model: Mlp::new(workers),
            thresh: 0.0,
        }
    }

    /// Registers a 1-based id from the shared SURF feature pool.
    pub fn add_feature_by_id(&mut self, feat_id: i32) -> Result<()> {
        let pool = SurfFeaturePool::shared();
        let feat = usize::try_from(feat_id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|idx| pool.get(idx).map(|f| (idx, f.dim())));
        match feat {
            Some((idx, dim)) => {
                self.feat_ids.push(idx);
                self.feat_dim += dim;
                Ok(())
            }
            None => Err(Error::InvalidModel(format!(
                "SURF feature id {feat_id} outside pool of {}",
                pool.len()
            ))),
        }
    }

    pub fn add_layer(
        &mut self,
        input_dim: usize,
        output_dim: usize,
        weights: Vec<f32>,
        bias: Vec<f32>,
        is_output: bool,
    ) -> Result<()> {
        let activation = if is_output { Activation::Sigmoid } else { Activation::Relu };
        let layer = MlpLayer::new(input_dim, output_dim, weights, bias, activation)?;
        self.model.add_layer(layer)
    }

    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    pub fn threshold(&self) -> f32 {
        self.thresh
    }

    /// Length of the concatenated feature vector.
    pub fn feature_dim(&self) -> usize {
        self.feat_dim
    }

    pub fn num_features(&self) -> usize {
        self.feat_ids.len()
    }

    pub fn model(&self) -> &Mlp {
        &self.model
    }

    pub fn classify(&self, feat_map: &mut SurfFeatureMap, ws: &mut Workspace) -> Score {
        ws.input.clear();
        for &idx in &self.feat_ids {
            ws.input.extend_from_slice(feat_map.feature_vector(idx));
        }
        if ws.input.len() != self.model.input_dim() {
            log::warn!(
                "SURF-MLP input has {} values, network expects {}",
                ws.input.len(),
                self.model.input_dim()
            );
            ws.outputs.clear();
            return Score::new(false, 0.0);
        }

        self.model.compute(&ws.input, &mut ws.outputs, &mut ws.layer_buf);
        let score = ws.outputs.first().copied().unwrap_or(0.0);
        Score::new(score > self.thresh, score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Rect;

    fn ramp() -> Vec<u8> {
        (0..40 * 40).map(|i| ((i % 40) * 3 + (i / 40)) as u8).collect()
    }

    #[test]
    fn feature_ids_are_one_based_and_bounded() {
        let mut classifier = SurfMlpClassifier::new(WorkerPool::sequential());
        assert!(classifier.add_feature_by_id(0).is_err());
        assert!(classifier.add_feature_by_id(-3).is_err());
        let pool_len = SurfFeaturePool::shared().len() as i32;
        assert!(classifier.add_feature_by_id(pool_len + 1).is_err());
        classifier.add_feature_by_id(1).unwrap();
        classifier.add_feature_by_id(pool_len).unwrap();
        assert_eq!(classifier.num_features(), 2);
        assert_eq!(classifier.feature_dim(), 64);
    }

    #[test]
    fn score_is_first_output_against_threshold() {
        let mut classifier = SurfMlpClassifier::new(WorkerPool::sequential());
        classifier.add_feature_by_id(1).unwrap();
        // bias-only network: every output is sigmoid(bias)
        classifier
            .add_layer(32, 4, vec![0.0; 128], vec![2.0, 0.0, 0.0, 0.0], true)
            .unwrap();
        classifier.set_threshold(0.5);

        let mut map = SurfFeatureMap::new();
        map.compute(&ramp(), 40, 40);
        map.set_roi(Rect::new(0, 0, 40, 40));

        let mut ws = Workspace::new();
        let score = classifier.classify(&mut map, &mut ws);
        let expected = 1.0 / (1.0 + (-2.0f32).exp());
        assert!(score.is_positive());
        assert!((score.score() - expected).abs() < 1e-6);
        assert_eq!(ws.outputs().len(), 4);
        assert!((ws.outputs()[1] - 0.5).abs() < 1e-6);

        classifier.set_threshold(0.95);
        let score = classifier.classify(&mut map, &mut ws);
        assert!(!score.is_positive());
        assert!((score.score() - expected).abs() < 1e-6);
    }

    #[test]
    fn input_size_mismatch_fails_closed() {
        let mut classifier = SurfMlpClassifier::new(WorkerPool::sequential());
        classifier.add_feature_by_id(1).unwrap();
        classifier.add_feature_by_id(2).unwrap();
        classifier.add_layer(32, 1, vec![0.0; 32], vec![5.0], true).unwrap();

        let mut map = SurfFeatureMap::new();
        map.compute(&ramp(), 40, 40);
        map.set_roi(Rect::new(0, 0, 40, 40));
        let score = classifier.classify(&mut map, &mut Workspace::new());
        assert!(!score.is_positive());
    }
}
