use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use super::{read_count, read_i32s, ModelReader};
use crate::classifier::mlp::WorkerPool;
use crate::classifier::{Classifier, ClassifierKind};
use crate::error::{invalid_model, Error, Result};
use crate::feat::LAB_PATCH_SIZE;

/// Side of the square sample every classifier was trained on.
pub const SAMPLE_SIZE: u32 = 40;
/// Smallest sliding window the detector accepts.
pub const MIN_WINDOW_SIZE: u32 = 20;

/// One cascade of the funnel.
#[derive(Debug, Clone)]
pub struct Branch {
    stages: Vec<Classifier>,
    wnd_src: Vec<usize>,
}

impl Branch {
    pub fn stages(&self) -> &[Classifier] {
        &self.stages
    }

    /// Branches of the previous hierarchy whose survivors this branch
    /// consumes. Empty in the first hierarchy.
    pub fn wnd_src(&self) -> &[usize] {
        &self.wnd_src
    }
}

/// A complete funnel-structured cascade, as stored in a model file.
///
/// ```text
/// num_hierarchy: i32
/// num_hierarchy x {
///     num_branch: i32
///     num_branch x {
///         num_stage: i32
///         num_stage x { type_id: i32, classifier payload }
///         num_wnd_src: i32, num_wnd_src x branch index: i32
///     }
/// }
/// ```
///
/// The first hierarchy holds single-stage branches that scan the image
/// pyramid; every later branch refines the windows of earlier ones.
#[derive(Debug, Clone)]
pub struct Model {
    hierarchies: Vec<Vec<Branch>>,
    min_window_size: u32,
}

impl Model {
    pub fn load<P: AsRef<Path>>(path: P, workers: &WorkerPool) -> Result<Model> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let model = Model::read(BufReader::new(file), workers)?;
        log::debug!(
            "loaded {} hierarchies from {}",
            model.num_hierarchies(),
            path.display()
        );
        Ok(model)
    }

    pub fn read<R: Read>(mut reader: R, workers: &WorkerPool) -> Result<Model> {
        let reader = &mut reader;
        let num_hierarchy = read_count(reader, "number of hierarchies")?;

        let mut hierarchies: Vec<Vec<Branch>> = Vec::new();
        for h in 0..num_hierarchy {
            let num_branch = read_count(reader, "hierarchy size")?;
            let prev_len = hierarchies.last().map_or(0, Vec::len);

            let mut branches = Vec::new();
            for _ in 0..num_branch {
                let branch = read_branch(reader, workers)?;
                if h > 0 {
                    if branch.wnd_src.is_empty() {
                        return invalid_model(format!("branch of hierarchy {h} has no sources"));
                    }
                    if let Some(&id) = branch.wnd_src.iter().find(|&&id| id >= prev_len) {
                        return invalid_model(format!(
                            "window source {id} not among {prev_len} upstream branches"
                        ));
                    }
                }
                branches.push(branch);
            }
            hierarchies.push(branches);
        }

        let mut model = Model {
            hierarchies,
            min_window_size: MIN_WINDOW_SIZE,
        };
        model.validate()?;
        model.min_window_size = model.required_window_size();
        Ok(model)
    }

    pub fn num_hierarchies(&self) -> usize {
        self.hierarchies.len()
    }

    pub fn hierarchies(&self) -> &[Vec<Branch>] {
        &self.hierarchies
    }

    /// The sliding-window stage of every first-hierarchy branch.
    pub fn first_hierarchy(&self) -> impl Iterator<Item = &Classifier> {
        self.hierarchies
            .first()
            .into_iter()
            .flatten()
            .filter_map(|branch| branch.stages.first())
    }

    /// Feature family of the sliding-window hierarchy.
    pub fn first_kind(&self) -> Option<ClassifierKind> {
        self.first_hierarchy().next().map(Classifier::kind)
    }

    /// Smallest window every stage of this model can be evaluated on.
    pub fn min_window_size(&self) -> u32 {
        self.min_window_size
    }

    fn validate(&self) -> Result<()> {
        let Some(first) = self.hierarchies.first() else {
            return invalid_model("model has no hierarchy");
        };
        if first.iter().any(|b| b.stages.len() != 1) {
            return invalid_model("sliding-window branches must hold exactly one stage");
        }
        let kind = first[0].stages[0].kind();
        if first.iter().any(|b| b.stages[0].kind() != kind) {
            return invalid_model("sliding-window branches must share one classifier type");
        }

        let limit = SAMPLE_SIZE as i32 - LAB_PATCH_SIZE as i32;
        for stage in self.hierarchies.iter().flatten().flat_map(|b| &b.stages) {
            if let Classifier::LabBoosted(lab) = stage {
                if let Some(f) = lab.features().iter().find(|f| f.x > limit || f.y > limit) {
                    return invalid_model(format!(
                        "LAB feature offset ({}, {}) outside the {SAMPLE_SIZE}-pixel window",
                        f.x, f.y
                    ));
                }
            }
        }
        Ok(())
    }

    fn required_window_size(&self) -> u32 {
        let mut size = MIN_WINDOW_SIZE;
        for stage in self.hierarchies.iter().flatten().flat_map(|b| &b.stages) {
            let needed = match stage {
                Classifier::LabBoosted(lab) => lab
                    .features()
                    .iter()
                    .map(|f| f.x.max(f.y) as u32 + LAB_PATCH_SIZE as u32)
                    .max()
                    .unwrap_or(0),
                Classifier::SurfMlp(_) => SAMPLE_SIZE,
            };
            size = size.max(needed);
        }
        size
    }
}

fn read_branch<R: Read>(reader: &mut R, workers: &WorkerPool) -> Result<Branch> {
    let num_stage = read_count(reader, "number of stages")?;
    let mut stages = Vec::with_capacity(num_stage.min(64));
    for _ in 0..num_stage {
        let type_id = reader.read_i32::<LittleEndian>()?;
        let kind = ClassifierKind::from_id(type_id).ok_or(Error::UnknownClassifier(type_id))?;
        stages.push(ModelReader::new(kind, workers).read(reader)?);
    }

    let num_wnd_src = reader.read_i32::<LittleEndian>()?;
    if num_wnd_src < 0 {
        return invalid_model(format!("negative window source count {num_wnd_src}"));
    }
    let mut wnd_src = Vec::new();
    for id in read_i32s(reader, num_wnd_src as usize)? {
        match usize::try_from(id) {
            Ok(id) => wnd_src.push(id),
            Err(_) => return invalid_model(format!("negative window source {id}")),
        }
    }

    Ok(Branch { stages, wnd_src })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Writer(Vec<u8>);

    impl Writer {
        fn i32(&mut self, v: i32) -> &mut Self {
            self.0.extend_from_slice(&v.to_le_bytes());
            self
        }

        fn f32(&mut self, v: f32) -> &mut Self {
            self.0.extend_from_slice(&v.to_le_bytes());
            self
        }

        fn lab_stage(&mut self, offset: (i32, i32)) -> &mut Self {
            self.i32(0).i32(1).i32(255).i32(offset.0).i32(offset.1).f32(0.0);
            for _ in 0..256 {
                self.f32(1.0);
            }
            self
        }

        fn surf_stage(&mut self) -> &mut Self {
            self.i32(1).i32(2).i32(1).i32(1).f32(0.5).i32(32).i32(4);
            for _ in 0..32 * 4 + 4 {
                self.f32(0.0);
            }
            self
        }
    }

    fn read(w: &Writer) -> Result<Model> {
        Model::read(&w.0[..], &WorkerPool::sequential())
    }

    fn two_hierarchies(wnd_src: i32) -> Writer {
        let mut w = Writer::default();
        w.i32(2);
        w.i32(2);
        w.i32(1).lab_stage((0, 0)).i32(0);
        w.i32(1).lab_stage((10, 3)).i32(0);
        w.i32(1);
        w.i32(2).surf_stage().surf_stage().i32(2).i32(0).i32(wnd_src);
        w
    }

    #[test]
    fn reads_funnel_structure() {
        let model = read(&two_hierarchies(1)).unwrap();
        assert_eq!(model.num_hierarchies(), 2);
        assert_eq!(model.hierarchies()[0].len(), 2);
        assert_eq!(model.first_hierarchy().count(), 2);
        assert_eq!(model.first_kind(), Some(ClassifierKind::LabBoosted));

        let funnel = &model.hierarchies()[1][0];
        assert_eq!(funnel.stages().len(), 2);
        assert_eq!(funnel.wnd_src(), &[0, 1]);
        assert!(funnel.stages().iter().all(|s| s.kind() == ClassifierKind::SurfMlp));
        assert_eq!(model.min_window_size(), SAMPLE_SIZE);
    }

    #[test]
    fn window_size_follows_lab_offsets() {
        let mut w = Writer::default();
        w.i32(1).i32(1).i32(1).lab_stage((12, 4)).i32(0);
        let model = read(&w).unwrap();
        assert_eq!(model.min_window_size(), 21);
    }

    #[test]
    fn rejects_out_of_range_window_source() {
        assert!(matches!(read(&two_hierarchies(2)), Err(Error::InvalidModel(_))));
        assert!(matches!(read(&two_hierarchies(-1)), Err(Error::InvalidModel(_))));
    }

    #[test]
    fn rejects_unknown_classifier_type() {
        let mut w = Writer::default();
        w.i32(1).i32(1).i32(1).i32(7);
        assert!(matches!(read(&w), Err(Error::UnknownClassifier(7))));
    }

    #[test]
    fn rejects_multi_stage_sliding_window_branch() {
        let mut w = Writer::default();
        w.i32(1).i32(1).i32(2).lab_stage((0, 0)).lab_stage((0, 0)).i32(0);
        assert!(matches!(read(&w), Err(Error::InvalidModel(_))));
    }

    #[test]
    fn rejects_lab_offset_outside_window() {
        let mut w = Writer::default();
        w.i32(1).i32(1).i32(1).lab_stage((32, 0)).i32(0);
        assert!(matches!(read(&w), Err(Error::InvalidModel(_))));
    }

    #[test]
    fn rejects_empty_and_truncated_models() {
        let mut w = Writer::default();
        w.i32(0);
        assert!(matches!(read(&w), Err(Error::InvalidModel(_))));

        let mut w = two_hierarchies(1);
        w.0.truncate(w.0.len() - 1);
        assert!(matches!(read(&w), Err(Error::Io(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = Model::load("/nonexistent/model.bin", &WorkerPool::sequential());
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
