use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use super::{read_count, read_f32s, read_i32s};
use crate::classifier::mlp::WorkerPool;
use crate::classifier::SurfMlpClassifier;
use crate::error::{invalid_model, Result};

/// Reads a SURF-MLP classifier:
///
/// ```text
/// num_layer: i32            (counts the input layer)
/// num_feat: i32, num_feat x feat_id: i32
/// thresh: f32
/// input_dim: i32
/// (num_layer - 1) x { output_dim: i32,
///                     input_dim x output_dim weights: f32,
///                     output_dim bias: f32 }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SurfMlpModelReader {
    workers: WorkerPool,
}

impl SurfMlpModelReader {
    pub fn new(workers: WorkerPool) -> SurfMlpModelReader {
        SurfMlpModelReader { workers }
    }

    pub fn read<R: Read + ?Sized>(&self, reader: &mut R) -> Result<SurfMlpClassifier> {
        let num_layer = read_count(reader, "number of MLP layers")?;
        if num_layer < 2 {
            return invalid_model("SURF-MLP needs at least one layer after the input");
        }
        let num_feat = read_count(reader, "number of SURF features")?;

        let mut classifier = SurfMlpClassifier::new(self.workers.clone());
        for id in read_i32s(reader, num_feat)? {
            classifier.add_feature_by_id(id)?;
        }
        classifier.set_threshold(reader.read_f32::<LittleEndian>()?);

        let mut input_dim = read_count(reader, "MLP input dimension")?;
        if input_dim != classifier.feature_dim() {
            return invalid_model(format!(
                "MLP input dimension {input_dim} does not match {} feature values",
                classifier.feature_dim()
            ));
        }

        for i in 1..num_layer {
            let output_dim = read_count(reader, "MLP layer output dimension")?;
            let weights = read_f32s(reader, input_dim * output_dim)?;
            let bias = read_f32s(reader, output_dim)?;
            classifier.add_layer(input_dim, output_dim, weights, bias, i == num_layer - 1)?;
            input_dim = output_dim;
        }

        Ok(classifier)
    }
}
