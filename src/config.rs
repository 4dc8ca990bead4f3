/// Configuration options for the face detector.
///
/// Values are applied through the validating setters of
/// [`crate::FaceDetection`], so out-of-range entries fall back to the
/// detector defaults instead of failing.
#[derive(Clone, Debug)]
pub struct Config {
    /// Path to the binary cascade model.
    pub model_path: String,

    /// Smallest face, in pixels, the pyramid is built for. At least 20.
    pub min_face_size: u32,

    /// Largest face, in pixels; 0 leaves the size bounded only by the image.
    pub max_face_size: u32,

    /// Detections scoring below this value are dropped.
    pub score_thresh: f64,

    /// Ratio between adjacent pyramid scales, in `[0.01, 0.99]`.
    pub pyramid_scale_factor: f32,

    /// Horizontal step of the sliding window.
    pub slide_window_step_x: u32,

    /// Vertical step of the sliding window.
    pub slide_window_step_y: u32,

    /// Workers used by the MLP stages; 1 evaluates on the calling thread.
    pub num_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: "./model/seeta_fd_frontal_v1.0.bin".to_string(),
            min_face_size: 20,
            max_face_size: 0,
            score_thresh: 3.85,
            pyramid_scale_factor: 0.8,
            slide_window_step_x: 4,
            slide_window_step_y: 4,
            num_threads: 4,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_model_path(mut self, path: impl Into<String>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn set_min_face_size(mut self, size: u32) -> Self {
        self.min_face_size = size;
        self
    }

    pub fn set_max_face_size(mut self, size: u32) -> Self {
        self.max_face_size = size;
        self
    }

    pub fn set_score_thresh(mut self, thresh: f64) -> Self {
        self.score_thresh = thresh;
        self
    }

    pub fn set_pyramid_scale_factor(mut self, factor: f32) -> Self {
        self.pyramid_scale_factor = factor;
        self
    }

    pub fn set_slide_window_step(mut self, x: u32, y: u32) -> Self {
        self.slide_window_step_x = x;
        self.slide_window_step_y = y;
        self
    }

    pub fn set_num_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = Config::new()
            .set_min_face_size(60)
            .set_slide_window_step(2, 3)
            .set_num_threads(1);
        assert_eq!(config.min_face_size, 60);
        assert_eq!(config.slide_window_step_x, 2);
        assert_eq!(config.slide_window_step_y, 3);
        assert_eq!(config.num_threads, 1);
        assert_eq!(config.score_thresh, 3.85);
    }
}
