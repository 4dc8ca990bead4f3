use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use super::{read_count, read_f32s};
use crate::classifier::LabBoostedClassifier;
use crate::error::{invalid_model, Result};

/// Reads a LAB-boosted classifier:
///
/// ```text
/// num_base: i32, num_bin: i32,
/// num_base x (x: i32, y: i32),
/// num_base x thresh: f32,
/// num_base x (num_bin + 1) x weight: f32
/// ```
#[derive(Debug, Clone, Default)]
pub struct LabBoostModelReader;

impl LabBoostModelReader {
    pub fn new() -> LabBoostModelReader {
        LabBoostModelReader
    }

    pub fn read<R: Read + ?Sized>(&self, reader: &mut R) -> Result<LabBoostedClassifier> {
        let num_base = read_count(reader, "number of base classifiers")?;
        let num_bin = read_count(reader, "number of LAB bins")?;
        if num_bin < u8::MAX as usize {
            return invalid_model(format!(
                "LAB classifier has {num_bin} bins, every 8-bit code needs one"
            ));
        }

        let mut classifier = LabBoostedClassifier::new();
        for _ in 0..num_base {
            let x = reader.read_i32::<LittleEndian>()?;
            let y = reader.read_i32::<LittleEndian>()?;
            if x < 0 || y < 0 {
                return invalid_model(format!("negative LAB feature offset ({x}, {y})"));
            }
            classifier.add_feature(x, y);
        }

        let thresh = read_f32s(reader, num_base)?;
        for t in thresh {
            let weights = read_f32s(reader, num_bin + 1)?;
            classifier.add_base_classifier(weights, t)?;
        }

        Ok(classifier)
    }
}
