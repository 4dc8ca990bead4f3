use crate::common::Rect;
use crate::math;

const RECT_WIDTH: usize = 3;
const RECT_HEIGHT: usize = 3;
const NUM_RECT: usize = 3;

/// Side of the square region one LAB code covers.
pub const LAB_PATCH_SIZE: usize = RECT_WIDTH * NUM_RECT;

/// Locally Assembled Binary (LAB) feature map.
///
/// Each position holds an 8-bit code comparing the sum of a 3x3 centre
/// rectangle with the sums of its eight 3x3 neighbours. A bit is set when the
/// centre is not darker than the neighbour:
///
/// ```text
///  0x80 0x40 0x20
///  0x10  --  0x08
///  0x04 0x02 0x01
/// ```
#[derive(Debug, Clone, Default)]
pub struct LabFeatureMap {
    width: usize,
    height: usize,
    roi: Rect,

    feat_map: Vec<u8>,
    rect_sum: Vec<i32>,
    int_img: Vec<i64>,
    square_int_img: Vec<i64>,
}

impl LabFeatureMap {
    pub fn new() -> LabFeatureMap {
        LabFeatureMap::default()
    }

    pub fn compute(&mut self, input: &[u8], width: u32, height: u32) {
        let (width, height) = (width as usize, height as usize);
        if width == 0 || height == 0 || input.len() < width * height {
            log::debug!("LAB feature map skipped for {}x{} input", width, height);
            return;
        }

        self.reshape(width, height);
        self.compute_integral_images(input);
        self.compute_rect_sum();
        self.compute_feature_map();
    }

    pub fn set_roi(&mut self, roi: Rect) {
        self.roi = roi;
    }

    pub fn roi(&self) -> &Rect {
        &self.roi
    }

    /// LAB code at `(offset_x, offset_y)` relative to the ROI's top-left corner.
    #[inline]
    pub fn feature_value(&self, offset_x: i32, offset_y: i32) -> u8 {
        let x = (self.roi.x() + offset_x) as usize;
        let y = (self.roi.y() + offset_y) as usize;
        self.feat_map[y * self.width + x]
    }

    /// Standard deviation of the pixel intensities inside the ROI.
    pub fn std_dev(&self) -> f64 {
        let area = self.roi.area() as f64;
        if area == 0.0 {
            return 0.0;
        }

        let (x, y) = (self.roi.x() as usize, self.roi.y() as usize);
        let (w, h) = (self.roi.width() as usize, self.roi.height() as usize);
        let sum = math::rect_sum(&self.int_img, self.width, 1, 0, x, y, w, h);
        let square_sum = math::rect_sum(&self.square_int_img, self.width, 1, 0, x, y, w, h);

        let mean = sum as f64 / area;
        let m2 = square_sum as f64 / area;
        (m2 - mean * mean).max(0.0).sqrt()
    }

    fn reshape(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;

        let len = width * height;
        let padded = (width + 1) * (height + 1);
        self.feat_map.clear();
        self.feat_map.resize(len, 0);
        self.rect_sum.clear();
        self.rect_sum.resize(len, 0);
        self.int_img.clear();
        self.int_img.resize(padded, 0);
        self.square_int_img.clear();
        self.square_int_img.resize(padded, 0);
    }

    fn compute_integral_images(&mut self, input: &[u8]) {
        let stride = self.width + 1;
        for y in 0..self.height {
            let src = &input[y * self.width..(y + 1) * self.width];
            for (x, &v) in src.iter().enumerate() {
                let v = v as i64;
                let idx = (y + 1) * stride + x + 1;
                self.int_img[idx] = v;
                self.square_int_img[idx] = v * v;
            }
        }
        math::integral_in_place(&mut self.int_img, self.width, self.height, 1);
        math::integral_in_place(&mut self.square_int_img, self.width, self.height, 1);
    }

    fn compute_rect_sum(&mut self) {
        if self.width < RECT_WIDTH || self.height < RECT_HEIGHT {
            return;
        }
        for r in 0..=(self.height - RECT_HEIGHT) {
            for c in 0..=(self.width - RECT_WIDTH) {
                self.rect_sum[r * self.width + c] =
                    math::rect_sum(&self.int_img, self.width, 1, 0, c, r, RECT_WIDTH, RECT_HEIGHT)
                        as i32;
            }
        }
    }

    fn compute_feature_map(&mut self) {
        if self.width < LAB_PATCH_SIZE || self.height < LAB_PATCH_SIZE {
            return;
        }

        let w = self.width;
        let rect_sum = &self.rect_sum;
        let at = |r: usize, c: usize| rect_sum[r * w + c];

        for r in 0..=(self.height - LAB_PATCH_SIZE) {
            for c in 0..=(w - LAB_PATCH_SIZE) {
                let (r1, r2) = (r + RECT_HEIGHT, r + 2 * RECT_HEIGHT);
                let (c1, c2) = (c + RECT_WIDTH, c + 2 * RECT_WIDTH);
                let white_rect_sum = at(r1, c1);

                let neighbours = [
                    (at(r, c), 0x80u8),
                    (at(r, c1), 0x40),
                    (at(r, c2), 0x20),
                    (at(r1, c2), 0x08),
                    (at(r2, c2), 0x01),
                    (at(r2, c1), 0x02),
                    (at(r2, c), 0x04),
                    (at(r1, c), 0x10),
                ];

                let mut code = 0u8;
                for &(black_rect_sum, bit) in &neighbours {
                    if white_rect_sum >= black_rect_sum {
                        code |= bit;
                    }
                }
                self.feat_map[r * w + c] = code;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_image_sets_every_bit() {
        let input = vec![90u8; 20 * 20];
        let mut map = LabFeatureMap::new();
        map.compute(&input, 20, 20);
        map.set_roi(Rect::new(0, 0, 20, 20));
        assert_eq!(map.feature_value(0, 0), 0xFF);
        assert_eq!(map.feature_value(11, 11), 0xFF);
        assert_eq!(map.std_dev(), 0.0);
    }

    #[test]
    fn bright_centre_beats_dark_ring() {
        let mut input = vec![0u8; 9 * 9];
        for y in 3..6 {
            for x in 3..6 {
                input[y * 9 + x] = 200;
            }
        }
        let mut map = LabFeatureMap::new();
        map.compute(&input, 9, 9);
        map.set_roi(Rect::new(0, 0, 9, 9));
        assert_eq!(map.feature_value(0, 0), 0xFF);

        // a dark centre loses against a single bright neighbour on the right
        let mut input = vec![0u8; 9 * 9];
        for y in 3..6 {
            for x in 6..9 {
                input[y * 9 + x] = 200;
            }
        }
        map.compute(&input, 9, 9);
        assert_eq!(map.feature_value(0, 0), 0xFF & !0x08);
    }

    #[test]
    fn std_dev_over_roi() {
        // left half 0, right half 100
        let mut input = vec![0u8; 10 * 10];
        for y in 0..10 {
            for x in 5..10 {
                input[y * 10 + x] = 100;
            }
        }
        let mut map = LabFeatureMap::new();
        map.compute(&input, 10, 10);

        map.set_roi(Rect::new(0, 0, 10, 10));
        assert!((map.std_dev() - 50.0).abs() < 1e-9);

        map.set_roi(Rect::new(5, 2, 5, 5));
        assert_eq!(map.std_dev(), 0.0);
    }
}
