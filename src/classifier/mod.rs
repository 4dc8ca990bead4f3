//! Window classifiers used as cascade stages.

mod lab_boosted;
pub mod mlp;
mod surf_mlp;

pub use self::lab_boosted::{LabBaseClassifier, LabBoostedClassifier, LabFeature};
pub use self::surf_mlp::SurfMlpClassifier;

use crate::feat::FeatureMap;

/// Classifier family, as tagged in the model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassifierKind {
    LabBoosted,
    SurfMlp,
}

impl ClassifierKind {
    pub fn from_id(id: i32) -> Option<ClassifierKind> {
        match id {
            0 => Some(ClassifierKind::LabBoosted),
            1 => Some(ClassifierKind::SurfMlp),
            _ => None,
        }
    }

    pub fn id(self) -> i32 {
        match self {
            ClassifierKind::LabBoosted => 0,
            ClassifierKind::SurfMlp => 1,
        }
    }
}

/// Verdict of one classifier on one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    positive: bool,
    score: f32,
}

impl Score {
    pub fn new(positive: bool, score: f32) -> Score {
        Score { positive, score }
    }

    pub fn is_positive(&self) -> bool {
        self.positive
    }

    pub fn score(&self) -> f32 {
        self.score
    }
}

/// Scratch buffers reused across classifications within one detection.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub(crate) input: Vec<f32>,
    pub(crate) layer_buf: [Vec<f32>; 2],
    pub(crate) outputs: Vec<f32>,
}

impl Workspace {
    pub fn new() -> Workspace {
        Workspace::default()
    }

    /// Raw outputs of the last classifier run; `[score]` for LAB stages,
    /// the network's output layer for SURF-MLP stages.
    pub fn outputs(&self) -> &[f32] {
        &self.outputs
    }
}

#[derive(Debug, Clone)]
pub enum Classifier {
    LabBoosted(LabBoostedClassifier),
    SurfMlp(SurfMlpClassifier),
}

impl Classifier {
    pub fn kind(&self) -> ClassifierKind {
        match self {
            Classifier::LabBoosted(_) => ClassifierKind::LabBoosted,
            Classifier::SurfMlp(_) => ClassifierKind::SurfMlp,
        }
    }

    /// Scores the window currently selected as `feat_map`'s ROI.
    pub fn classify(&self, feat_map: &mut FeatureMap, ws: &mut Workspace) -> Score {
        match (self, feat_map) {
            (Classifier::LabBoosted(c), FeatureMap::Lab(map)) => {
                let score = c.classify(map);
                ws.outputs.clear();
                ws.outputs.push(score.score());
                score
            }
            (Classifier::SurfMlp(c), FeatureMap::Surf(map)) => c.classify(map, ws),
            (classifier, map) => {
                log::warn!(
                    "{:?} classifier given a {:?} feature map",
                    classifier.kind(),
                    map.kind()
                );
                ws.outputs.clear();
                Score::new(false, 0.0)
            }
        }
    }
}

impl From<LabBoostedClassifier> for Classifier {
    fn from(c: LabBoostedClassifier) -> Classifier {
        Classifier::LabBoosted(c)
    }
}

impl From<SurfMlpClassifier> for Classifier {
    fn from(c: SurfMlpClassifier) -> Classifier {
        Classifier::SurfMlp(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::mlp::WorkerPool;
    use crate::common::Rect;

    #[test]
    fn kind_ids() {
        assert_eq!(ClassifierKind::from_id(0), Some(ClassifierKind::LabBoosted));
        assert_eq!(ClassifierKind::from_id(1), Some(ClassifierKind::SurfMlp));
        assert_eq!(ClassifierKind::from_id(2), None);
        assert_eq!(ClassifierKind::from_id(-1), None);
        assert_eq!(ClassifierKind::SurfMlp.id(), 1);
    }

    #[test]
    fn lab_stage_reports_score_as_single_output() {
        let input: Vec<u8> = (0..40 * 40).map(|i| (i * 37 % 251) as u8).collect();
        let mut map = FeatureMap::new(ClassifierKind::LabBoosted);
        map.compute(&input, 40, 40);
        map.set_roi(Rect::new(0, 0, 40, 40));

        let mut lab = LabBoostedClassifier::new();
        lab.add_feature(2, 5);
        lab.add_base_classifier(vec![0.75; 256], -1.0).unwrap();
        let classifier = Classifier::from(lab);

        let mut ws = Workspace::new();
        let score = classifier.classify(&mut map, &mut ws);
        assert_eq!(score.score(), 0.75);
        assert_eq!(ws.outputs(), &[0.75]);
    }

    #[test]
    fn mismatched_feature_map_is_negative() {
        let classifier = Classifier::from(SurfMlpClassifier::new(WorkerPool::sequential()));
        let mut map = FeatureMap::new(ClassifierKind::LabBoosted);
        let score = classifier.classify(&mut map, &mut Workspace::new());
        assert!(!score.is_positive());
    }
}
