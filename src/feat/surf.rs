use std::sync::OnceLock;

use crate::common::Rect;
use crate::math;

const NUM_INT_CHANNEL: usize = 8;

const SAMPLE_WIDTH: i32 = 40;
const SAMPLE_HEIGHT: i32 = 40;
const PATCH_MOVE_STEP_X: i32 = 16;
const PATCH_MOVE_STEP_Y: i32 = 16;
const PATCH_SIZE_INC_STEP: i32 = 1;
const PATCH_MIN_WIDTH: i32 = 16;
const PATCH_MIN_HEIGHT: i32 = 16;

/// A rectangular pooling region of the 40x40 sample, split into cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfFeature {
    pub patch: Rect,
    pub num_cell_per_row: i32,
    pub num_cell_per_col: i32,
}

impl SurfFeature {
    pub fn dim(&self) -> usize {
        (self.num_cell_per_row * self.num_cell_per_col) as usize * NUM_INT_CHANNEL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PatchFormat {
    /// aspect ratio, with gcd(width, height) == 1
    width: i32,
    height: i32,

    num_cell_per_row: i32,
    num_cell_per_col: i32,
}

/// Every SURF feature the detector knows about. Models refer to entries by
/// 1-based id.
#[derive(Debug, Clone)]
pub struct SurfFeaturePool {
    pool: Vec<SurfFeature>,
}

impl SurfFeaturePool {
    /// The pool shared by all feature maps and model readers.
    pub fn shared() -> &'static SurfFeaturePool {
        static POOL: OnceLock<SurfFeaturePool> = OnceLock::new();
        POOL.get_or_init(SurfFeaturePool::create)
    }

    fn create() -> SurfFeaturePool {
        let mut formats: Vec<PatchFormat> = Vec::new();
        for &(width, height) in &[(1, 1), (1, 2), (2, 1), (2, 3), (3, 2)] {
            let format = PatchFormat {
                width,
                height,
                num_cell_per_row: 2,
                num_cell_per_col: 2,
            };
            if !formats.contains(&format) {
                formats.push(format);
            }
        }

        let mut pool = Vec::new();
        if SAMPLE_HEIGHT - PATCH_MIN_HEIGHT <= SAMPLE_WIDTH - PATCH_MIN_WIDTH {
            for format in &formats {
                let mut h = PATCH_MIN_HEIGHT;
                while h <= SAMPLE_HEIGHT {
                    let w = h / format.height * format.width;
                    if h % format.num_cell_per_col == 0
                        && h % format.height == 0
                        && w % format.num_cell_per_row == 0
                        && w >= PATCH_MIN_WIDTH
                        && w <= SAMPLE_WIDTH
                    {
                        add_all_features(&mut pool, w, h, format);
                    }
                    h += PATCH_SIZE_INC_STEP;
                }
            }
        } else {
            for format in &formats {
                let mut w = PATCH_MIN_WIDTH;
                while w <= SAMPLE_WIDTH {
                    let h = w / format.width * format.height;
                    if w % format.num_cell_per_row == 0
                        && w % format.width == 0
                        && h % format.num_cell_per_col == 0
                        && h >= PATCH_MIN_HEIGHT
                        && h <= SAMPLE_HEIGHT
                    {
                        add_all_features(&mut pool, w, h, format);
                    }
                    w += PATCH_SIZE_INC_STEP;
                }
            }
        }

        SurfFeaturePool { pool }
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Feature at 0-based index `idx`.
    pub fn get(&self, idx: usize) -> Option<&SurfFeature> {
        self.pool.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SurfFeature> {
        self.pool.iter()
    }
}

fn add_all_features(pool: &mut Vec<SurfFeature>, width: i32, height: i32, format: &PatchFormat) {
    let mut y = 0;
    while y <= SAMPLE_HEIGHT - height {
        let mut x = 0;
        while x <= SAMPLE_WIDTH - width {
            pool.push(SurfFeature {
                patch: Rect::new(x, y, width, height),
                num_cell_per_row: format.num_cell_per_row,
                num_cell_per_col: format.num_cell_per_col,
            });
            x += PATCH_MOVE_STEP_X;
        }
        y += PATCH_MOVE_STEP_Y;
    }
}

/// Gradient-histogram feature map in the spirit of SURF.
///
/// Holds an 8-channel integral image: `dx` and `|dx|` split by the sign of
/// `dy` (channels 0-3), `dy` and `|dy|` split by the sign of `dx` (channels
/// 4-7). Pooled vectors are cached per ROI.
#[derive(Debug, Clone)]
pub struct SurfFeatureMap {
    width: usize,
    height: usize,
    roi: Rect,

    grad_x: Vec<i32>,
    grad_y: Vec<i32>,
    int_img: Vec<i64>,
    feat_vec_normed: Vec<Vec<f32>>,
    buf_valid: Vec<bool>,
    buf_valid_reset: bool,

    pool: &'static SurfFeaturePool,
}

impl Default for SurfFeatureMap {
    fn default() -> Self {
        SurfFeatureMap::new()
    }
}

impl SurfFeatureMap {
    pub fn new() -> SurfFeatureMap {
        let pool = SurfFeaturePool::shared();
        SurfFeatureMap {
            width: 0,
            height: 0,
            roi: Rect::default(),
            grad_x: Vec::new(),
            grad_y: Vec::new(),
            int_img: Vec::new(),
            feat_vec_normed: pool.iter().map(|f| vec![0.0; f.dim()]).collect(),
            buf_valid: vec![false; pool.len()],
            buf_valid_reset: false,
            pool,
        }
    }

    pub fn compute(&mut self, input: &[u8], width: u32, height: u32) {
        let (width, height) = (width as usize, height as usize);
        if width < 2 || height < 2 || input.len() < width * height {
            log::debug!("SURF feature map skipped for {}x{} input", width, height);
            return;
        }

        self.reshape(width, height);
        self.compute_gradient_images(input);
        self.compute_integral_images();
        self.invalidate();
    }

    pub fn set_roi(&mut self, roi: Rect) {
        self.roi = roi;
        self.invalidate();
    }

    pub fn roi(&self) -> &Rect {
        &self.roi
    }

    /// L2-normalised pooled vector of 0-based feature index `idx` for the
    /// current ROI.
    pub fn feature_vector(&mut self, idx: usize) -> &[f32] {
        if !self.buf_valid[idx] {
            let feat = self.pool.pool[idx];
            let raw = self.compute_feature_vector(&feat);
            normalize_l2(&raw, &mut self.feat_vec_normed[idx]);
            self.buf_valid[idx] = true;
            self.buf_valid_reset = true;
        }
        &self.feat_vec_normed[idx]
    }

    fn invalidate(&mut self) {
        if self.buf_valid_reset {
            self.buf_valid.iter_mut().for_each(|v| *v = false);
            self.buf_valid_reset = false;
        }
    }

    fn reshape(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;

        let len = width * height;
        self.grad_x.resize(len, 0);
        self.grad_y.resize(len, 0);
        self.int_img.clear();
        self.int_img.resize((width + 1) * (height + 1) * NUM_INT_CHANNEL, 0);
    }

    fn compute_gradient_images(&mut self, input: &[u8]) {
        let (w, h) = (self.width, self.height);
        let px = |x: usize, y: usize| input[y * w + x] as i32;

        for y in 0..h {
            let dx = &mut self.grad_x[y * w..(y + 1) * w];
            dx[0] = (px(1, y) - px(0, y)) << 1;
            for x in 1..w - 1 {
                dx[x] = px(x + 1, y) - px(x - 1, y);
            }
            dx[w - 1] = (px(w - 1, y) - px(w - 2, y)) << 1;
        }

        for x in 0..w {
            self.grad_y[x] = (px(x, 1) - px(x, 0)) << 1;
            for y in 1..h - 1 {
                self.grad_y[y * w + x] = px(x, y + 1) - px(x, y - 1);
            }
            self.grad_y[(h - 1) * w + x] = (px(x, h - 1) - px(x, h - 2)) << 1;
        }
    }

    fn compute_integral_images(&mut self) {
        let (w, h) = (self.width, self.height);
        for y in 0..h {
            for x in 0..w {
                let dx = self.grad_x[y * w + x] as i64;
                let dy = self.grad_y[y * w + x] as i64;
                let base = ((y + 1) * (w + 1) + x + 1) * NUM_INT_CHANNEL;
                let channels = &mut self.int_img[base..base + NUM_INT_CHANNEL];

                let dx_offset = if dy < 0 { 2 } else { 0 };
                channels[dx_offset] = dx;
                channels[dx_offset + 1] = dx.abs();
                let dy_offset = if dx < 0 { 6 } else { 4 };
                channels[dy_offset] = dy;
                channels[dy_offset + 1] = dy.abs();
            }
        }
        math::integral_in_place(&mut self.int_img, w, h, NUM_INT_CHANNEL);
    }

    fn compute_feature_vector(&self, feat: &SurfFeature) -> Vec<i64> {
        let init_cell_x = (self.roi.x() + feat.patch.x()) as usize;
        let init_cell_y = (self.roi.y() + feat.patch.y()) as usize;
        let cell_width = (feat.patch.width() / feat.num_cell_per_row) as usize;
        let cell_height = (feat.patch.height() / feat.num_cell_per_col) as usize;

        let mut feat_vec = Vec::with_capacity(feat.dim());
        for cy in 0..feat.num_cell_per_col as usize {
            for cx in 0..feat.num_cell_per_row as usize {
                let x = init_cell_x + cx * cell_width;
                let y = init_cell_y + cy * cell_height;
                for ch in 0..NUM_INT_CHANNEL {
                    feat_vec.push(math::rect_sum(
                        &self.int_img,
                        self.width,
                        NUM_INT_CHANNEL,
                        ch,
                        x,
                        y,
                        cell_width,
                        cell_height,
                    ));
                }
            }
        }
        feat_vec
    }
}

fn normalize_l2(feat_vec: &[i64], feat_vec_normed: &mut [f32]) {
    let prod: f64 = feat_vec.iter().map(|&v| (v as f64) * (v as f64)).sum();
    if prod != 0.0 {
        let norm_l2 = prod.sqrt() as f32;
        for (dest, &v) in feat_vec_normed.iter_mut().zip(feat_vec) {
            *dest = v as f32 / norm_l2;
        }
    } else {
        feat_vec_normed.iter_mut().for_each(|v| *v = 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_layout() {
        let pool = SurfFeaturePool::shared();
        assert!(!pool.is_empty());
        for feat in pool.iter() {
            let p = feat.patch;
            assert!(p.x() >= 0 && p.y() >= 0);
            assert!(p.x() + p.width() <= SAMPLE_WIDTH);
            assert!(p.y() + p.height() <= SAMPLE_HEIGHT);
            assert!(p.width() >= PATCH_MIN_WIDTH && p.height() >= PATCH_MIN_HEIGHT);
            assert_eq!(feat.dim(), 32);
        }
        // first entry: 16x16 square at the origin
        assert_eq!(pool.get(0).unwrap().patch, Rect::new(0, 0, 16, 16));
        assert_eq!(pool.get(1).unwrap().patch, Rect::new(16, 0, 16, 16));
    }

    #[test]
    fn flat_window_gives_zero_vector() {
        let input = vec![77u8; 40 * 40];
        let mut map = SurfFeatureMap::new();
        map.compute(&input, 40, 40);
        map.set_roi(Rect::new(0, 0, 40, 40));
        assert!(map.feature_vector(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn horizontal_ramp_fills_positive_dx_channels() {
        let mut input = vec![0u8; 40 * 40];
        for y in 0..40 {
            for x in 0..40 {
                input[y * 40 + x] = (x * 3) as u8;
            }
        }
        let mut map = SurfFeatureMap::new();
        map.compute(&input, 40, 40);
        map.set_roi(Rect::new(0, 0, 40, 40));

        let v = map.feature_vector(0).to_vec();
        assert_eq!(v.len(), 32);
        let norm: f32 = v.iter().map(|x| x * x).sum();
        assert!((norm - 1.0).abs() < 1e-5);
        for cell in v.chunks(NUM_INT_CHANNEL) {
            // dy == 0 everywhere: dx lands in channels 0/1, dy channels stay zero
            assert!(cell[0] > 0.0);
            assert_eq!(cell[0], cell[1]);
            assert!(cell[2..].iter().all(|&c| c == 0.0));
        }
    }

    #[test]
    fn cache_is_refreshed_when_roi_moves() {
        let mut input = vec![0u8; 60 * 40];
        for y in 0..40 {
            for x in 20..60 {
                input[y * 60 + x] = ((y * 5) % 256) as u8;
            }
        }
        let mut map = SurfFeatureMap::new();
        map.compute(&input, 60, 40);

        map.set_roi(Rect::new(0, 0, 40, 40));
        let left = map.feature_vector(0).to_vec();
        map.set_roi(Rect::new(20, 0, 40, 40));
        let right = map.feature_vector(0).to_vec();
        assert_ne!(left, right);
        map.set_roi(Rect::new(0, 0, 40, 40));
        assert_eq!(map.feature_vector(0), &left[..]);
    }
}
