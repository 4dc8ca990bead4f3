//! Frontal face detection with a funnel-structured cascade.
//!
//! A pretrained binary model drives a coarse-to-fine pipeline: LAB-boosted
//! stages slide a window over an image pyramid, then SURF-MLP stages
//! re-examine and refine the surviving windows. Overlapping detections are
//! merged by non-maximum suppression.
//!
//! ```no_run
//! use face_detection::{FaceDetection, ImageData};
//!
//! # fn main() -> face_detection::Result<()> {
//! let mut detector = FaceDetection::from_path("model/seeta_fd_frontal_v1.0.bin")?;
//! detector.set_min_face_size(40);
//!
//! let (width, height) = (640, 480);
//! let gray = vec![0u8; width as usize * height as usize];
//! for face in detector.detect(&ImageData::new(&gray, width, height)) {
//!     println!("{:?} {}", face.bbox(), face.score());
//! }
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod collab;
mod common;
mod config;
mod error;
pub mod feat;
mod fust;
mod image_pyramid;
pub mod io;
mod math;
mod nms;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

pub use crate::classifier::mlp::WorkerPool;
pub use crate::common::{FaceInfo, FacialLandmark, ImageData, Rect};
pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::fust::FuStDetector;
pub use crate::image_pyramid::{resize_image, ImagePyramid, Scales};
pub use crate::io::Model;
pub use crate::nms::non_maximum_suppression;

/// Side of the sliding window, in pixels of the scaled image.
const WINDOW_SIZE: u32 = 40;

/// The face detection front end.
///
/// Holds at most one loaded model. Detection never mutates the detector, so a
/// `FaceDetection` can be shared between threads once configured.
#[derive(Debug, Clone)]
pub struct FaceDetection {
    detector: Option<FuStDetector>,
    workers: WorkerPool,

    min_face_size: u32,
    max_face_size: u32,
    scale_factor: f32,
    slide_wnd_step_x: u32,
    slide_wnd_step_y: u32,
    score_thresh: f64,
}

impl Default for FaceDetection {
    fn default() -> Self {
        FaceDetection::new()
    }
}

impl FaceDetection {
    /// A detector without a model; [`FaceDetection::detect`] finds nothing
    /// until one is loaded.
    pub fn new() -> FaceDetection {
        let workers = WorkerPool::new(WorkerPool::DEFAULT_WORKERS).unwrap_or_else(|e| {
            log::warn!("{e}, falling back to sequential MLP evaluation");
            WorkerPool::sequential()
        });
        FaceDetection::with_workers(workers)
    }

    fn with_workers(workers: WorkerPool) -> FaceDetection {
        FaceDetection {
            detector: None,
            workers,
            min_face_size: 20,
            max_face_size: 0,
            scale_factor: 0.8,
            slide_wnd_step_x: 4,
            slide_wnd_step_y: 4,
            score_thresh: 3.85,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<FaceDetection> {
        let mut detection = FaceDetection::new();
        detection.load_model(path)?;
        Ok(detection)
    }

    /// Shares an already loaded model.
    pub fn with_model(model: Arc<Model>) -> FaceDetection {
        let mut detection = FaceDetection::new();
        detection.install(model);
        detection
    }

    pub fn with_config(model: Arc<Model>, config: &Config) -> FaceDetection {
        let mut detection = FaceDetection::with_model(model);
        detection.apply_config(config);
        detection
    }

    /// Loads `config.model_path` with `config.num_threads` MLP workers and
    /// applies the remaining settings.
    pub fn from_config(config: &Config) -> Result<FaceDetection> {
        let mut detection = FaceDetection::with_workers(WorkerPool::new(config.num_threads)?);
        detection.load_model(&config.model_path)?;
        detection.apply_config(config);
        Ok(detection)
    }

    fn apply_config(&mut self, config: &Config) {
        self.set_min_face_size(config.min_face_size);
        self.set_max_face_size(config.max_face_size);
        self.set_image_pyramid_scale_factor(config.pyramid_scale_factor);
        self.set_window_step(config.slide_window_step_x, config.slide_window_step_y);
        self.set_score_thresh(config.score_thresh);
    }

    /// Replaces the current model. On failure the previous model, if any,
    /// stays in place.
    pub fn load_model<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let model = Model::load(path, &self.workers)?;
        self.install(Arc::new(model));
        Ok(())
    }

    pub fn load_model_from_reader<R: Read>(&mut self, reader: R) -> Result<()> {
        let model = Model::read(reader, &self.workers)?;
        self.install(Arc::new(model));
        Ok(())
    }

    fn install(&mut self, model: Arc<Model>) {
        let mut detector = FuStDetector::new(model);
        detector.set_window_size(WINDOW_SIZE);
        detector.set_slide_window_step(self.slide_wnd_step_x, self.slide_wnd_step_y);
        self.detector = Some(detector);
    }

    pub fn model(&self) -> Option<&Arc<Model>> {
        self.detector.as_ref().map(FuStDetector::model)
    }

    /// Detects faces in a single-channel image.
    ///
    /// Returns the faces scoring at least the score threshold. Invalid images
    /// and a missing model yield an empty list.
    pub fn detect(&self, image: &ImageData) -> Vec<FaceInfo> {
        if !image.is_legal() {
            log::debug!(
                "rejecting {}x{}x{} image",
                image.width(),
                image.height(),
                image.num_channels()
            );
            return Vec::new();
        }
        let Some(detector) = &self.detector else {
            log::debug!("no model loaded");
            return Vec::new();
        };

        let mut min_img_size = image.width().min(image.height());
        if self.max_face_size > 0 {
            min_img_size = min_img_size.min(self.max_face_size);
        }

        let mut pyramid = ImagePyramid::new();
        pyramid.set_image_1x(image);
        pyramid.set_scale_step(self.scale_factor);
        pyramid.set_max_scale(WINDOW_SIZE as f32 / self.min_face_size as f32);
        pyramid.set_min_scale(WINDOW_SIZE as f32 / min_img_size as f32);

        let mut faces = detector.detect(&mut pyramid);
        faces.retain(|face| face.score() >= self.score_thresh);
        log::debug!("detected {} faces", faces.len());
        faces
    }

    /// Ignored below 20 pixels.
    pub fn set_min_face_size(&mut self, size: u32) {
        if size >= 20 {
            self.min_face_size = size;
        } else {
            log::debug!("minimum face size {size} ignored");
        }
    }

    /// 0 removes the bound.
    pub fn set_max_face_size(&mut self, size: u32) {
        self.max_face_size = size;
    }

    /// Ignored outside `[0.01, 0.99]`.
    pub fn set_image_pyramid_scale_factor(&mut self, factor: f32) {
        if (0.01..=0.99).contains(&factor) {
            self.scale_factor = factor;
        } else {
            log::debug!("pyramid scale factor {factor} ignored");
        }
    }

    /// Each axis is updated only when its step is positive.
    pub fn set_window_step(&mut self, step_x: u32, step_y: u32) {
        if step_x > 0 {
            self.slide_wnd_step_x = step_x;
        }
        if step_y > 0 {
            self.slide_wnd_step_y = step_y;
        }
        if step_x == 0 || step_y == 0 {
            log::debug!("zero window step ignored");
        }
        if let Some(detector) = &mut self.detector {
            detector.set_slide_window_step(step_x, step_y);
        }
    }

    /// Ignored when negative.
    pub fn set_score_thresh(&mut self, thresh: f64) {
        if thresh >= 0.0 {
            self.score_thresh = thresh;
        } else {
            log::debug!("score threshold {thresh} ignored");
        }
    }

    pub fn min_face_size(&self) -> u32 {
        self.min_face_size
    }

    pub fn max_face_size(&self) -> u32 {
        self.max_face_size
    }

    pub fn image_pyramid_scale_factor(&self) -> f32 {
        self.scale_factor
    }

    pub fn window_step(&self) -> (u32, u32) {
        (self.slide_wnd_step_x, self.slide_wnd_step_y)
    }

    pub fn score_thresh(&self) -> f64 {
        self.score_thresh
    }
}
