//! Deserialization of the binary cascade model.
//!
//! Every value in a model file is a little-endian `i32` or `f32`.

mod lab_boost_reader;
mod model;
mod surf_mlp_reader;

pub use self::lab_boost_reader::LabBoostModelReader;
pub use self::model::{Branch, Model, MIN_WINDOW_SIZE, SAMPLE_SIZE};
pub use self::surf_mlp_reader::SurfMlpModelReader;

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::classifier::mlp::WorkerPool;
use crate::classifier::{Classifier, ClassifierKind};
use crate::error::{invalid_model, Result};

/// Reads one classifier payload of a known kind.
#[derive(Debug, Clone)]
pub enum ModelReader {
    LabBoosted(LabBoostModelReader),
    SurfMlp(SurfMlpModelReader),
}

impl ModelReader {
    /// SURF-MLP classifiers built by the reader evaluate on `workers`.
    pub fn new(kind: ClassifierKind, workers: &WorkerPool) -> ModelReader {
        match kind {
            ClassifierKind::LabBoosted => ModelReader::LabBoosted(LabBoostModelReader::new()),
            ClassifierKind::SurfMlp => {
                ModelReader::SurfMlp(SurfMlpModelReader::new(workers.clone()))
            }
        }
    }

    pub fn read<R: Read + ?Sized>(&self, reader: &mut R) -> Result<Classifier> {
        match self {
            ModelReader::LabBoosted(r) => r.read(reader).map(Classifier::from),
            ModelReader::SurfMlp(r) => r.read(reader).map(Classifier::from),
        }
    }
}

/// Reads an `i32` that must be strictly positive.
pub(crate) fn read_count<R: Read + ?Sized>(reader: &mut R, what: &str) -> Result<usize> {
    let n = reader.read_i32::<LittleEndian>()?;
    if n <= 0 {
        return invalid_model(format!("{what} must be positive, got {n}"));
    }
    Ok(n as usize)
}

pub(crate) fn read_i32s<R: Read + ?Sized>(reader: &mut R, len: usize) -> Result<Vec<i32>> {
    let values = (0..len)
        .map(|_| reader.read_i32::<LittleEndian>())
        .collect::<std::io::Result<_>>()?;
    Ok(values)
}

pub(crate) fn read_f32s<R: Read + ?Sized>(reader: &mut R, len: usize) -> Result<Vec<f32>> {
    let values = (0..len)
        .map(|_| reader.read_f32::<LittleEndian>())
        .collect::<std::io::Result<_>>()?;
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn counts_must_be_positive() {
        let mut data: &[u8] = &[3, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff];
        assert_eq!(read_count(&mut data, "n").unwrap(), 3);
        assert!(matches!(read_count(&mut data, "n"), Err(Error::InvalidModel(_))));
        assert!(matches!(read_count(&mut data, "n"), Err(Error::InvalidModel(_))));
        assert!(matches!(read_count(&mut data, "n"), Err(Error::Io(_))));
    }

    #[test]
    fn short_arrays_are_io_errors() {
        let mut data: &[u8] = &[0, 0, 0x80, 0x3f, 0, 0];
        assert!(matches!(read_f32s(&mut data, 2), Err(Error::Io(_))));

        let mut data: &[u8] = &[0, 0, 0x80, 0x3f];
        assert_eq!(read_f32s(&mut data, 1).unwrap(), vec![1.0]);
    }
}
