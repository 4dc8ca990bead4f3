use crate::common::ImageData;

/// Resamples `src` into `dest` (`dest_width x dest_height`, row-major) with
/// bilinear interpolation. Samples falling past the last row or column reuse
/// the edge pixel.
pub fn resize_image(src: &ImageData, dest: &mut [u8], dest_width: u32, dest_height: u32) {
    let src_width = src.width() as usize;
    let src_height = src.height() as usize;
    let dest_width = dest_width as usize;
    let dest_height = dest_height as usize;
    let src_data = src.data();
    debug_assert!(dest.len() >= dest_width * dest_height);

    if src_width == dest_width && src_height == dest_height {
        let len = src_width * src_height;
        dest[..len].copy_from_slice(&src_data[..len]);
        return;
    }
    if dest_width == 0 || dest_height == 0 {
        return;
    }

    let lf_x_scl = src_width as f64 / dest_width as f64;
    let lf_y_scl = src_height as f64 / dest_height as f64;

    for y in 0..dest_height {
        let lf_y_s = lf_y_scl * y as f64;
        let n_y_s = (lf_y_s as usize).min(src_height - 1);
        let n_y_s1 = (n_y_s + 1).min(src_height - 1);
        let lf_weight_y = (lf_y_s - n_y_s as f64).clamp(0.0, 1.0);

        let row0 = &src_data[n_y_s * src_width..(n_y_s + 1) * src_width];
        let row1 = &src_data[n_y_s1 * src_width..(n_y_s1 + 1) * src_width];
        let dest_row = &mut dest[y * dest_width..(y + 1) * dest_width];

        for (x, out) in dest_row.iter_mut().enumerate() {
            let lf_x_s = lf_x_scl * x as f64;
            let n_x_s = (lf_x_s as usize).min(src_width - 1);
            let n_x_s1 = (n_x_s + 1).min(src_width - 1);
            let lf_weight_x = (lf_x_s - n_x_s as f64).clamp(0.0, 1.0);

            let dest_val = (1.0 - lf_weight_y)
                * ((1.0 - lf_weight_x) * row0[n_x_s] as f64 + lf_weight_x * row0[n_x_s1] as f64)
                + lf_weight_y
                    * ((1.0 - lf_weight_x) * row1[n_x_s] as f64
                        + lf_weight_x * row1[n_x_s1] as f64);

            *out = dest_val as u8;
        }
    }
}

#[inline]
fn scaled_len(len: u32, scale: f32) -> u32 {
    (len as f32 * scale + 0.5) as u32
}

/// Multi-scale copies of one grayscale image.
///
/// Levels run from `max_scale` down to `min_scale`, each `scale_step` times
/// the previous one. The pyramid keeps a private copy of the 1x image and a
/// single reusable buffer for the current level.
#[derive(Debug, Clone)]
pub struct ImagePyramid {
    max_scale: f32,
    min_scale: f32,
    scale_step: f32,

    width1x: u32,
    height1x: u32,
    buf_img: Vec<u8>,
    buf_img_scaled: Vec<u8>,
}

impl Default for ImagePyramid {
    fn default() -> Self {
        ImagePyramid::new()
    }
}

impl ImagePyramid {
    pub fn new() -> ImagePyramid {
        ImagePyramid {
            max_scale: 1.0,
            min_scale: 1.0,
            scale_step: 0.8,
            width1x: 0,
            height1x: 0,
            buf_img: Vec::new(),
            buf_img_scaled: Vec::new(),
        }
    }

    /// Ignores values outside `(0, 1]`.
    pub fn set_scale_step(&mut self, step: f32) {
        if step > 0.0 && step <= 1.0 {
            self.scale_step = step;
        }
    }

    pub fn set_min_scale(&mut self, min_scale: f32) {
        if min_scale > 0.0 && min_scale.is_finite() {
            self.min_scale = min_scale;
        }
    }

    pub fn set_max_scale(&mut self, max_scale: f32) {
        if max_scale > 0.0 && max_scale.is_finite() {
            self.max_scale = max_scale;
        }
    }

    pub fn min_scale(&self) -> f32 {
        self.min_scale
    }

    pub fn max_scale(&self) -> f32 {
        self.max_scale
    }

    pub fn scale_step(&self) -> f32 {
        self.scale_step
    }

    /// Copies the single-channel pixels of `image` in as the 1x level.
    pub fn set_image_1x(&mut self, image: &ImageData) {
        let len = image.width() as usize * image.height() as usize;
        self.width1x = image.width();
        self.height1x = image.height();
        self.buf_img.clear();
        self.buf_img.extend_from_slice(&image.data()[..len]);
    }

    pub fn image_1x(&self) -> ImageData<'_> {
        ImageData::new(&self.buf_img, self.width1x, self.height1x)
    }

    /// The scale factors of every level, largest first.
    pub fn scales(&self) -> Scales {
        Scales {
            next: self.max_scale,
            min_scale: self.min_scale,
            step: self.scale_step,
            width: self.width1x,
            height: self.height1x,
            done: false,
        }
    }

    /// Resamples the 1x image at `scale` into the level buffer.
    pub fn scaled_image(&mut self, scale: f32) -> ImageData<'_> {
        let width = scaled_len(self.width1x, scale);
        let height = scaled_len(self.height1x, scale);
        self.buf_img_scaled.resize(width as usize * height as usize, 0);
        let src = ImageData::new(&self.buf_img, self.width1x, self.height1x);
        resize_image(&src, &mut self.buf_img_scaled, width, height);
        ImageData::new(&self.buf_img_scaled, width, height)
    }
}

/// Iterator over pyramid scale factors, see [`ImagePyramid::scales`].
#[derive(Debug, Clone)]
pub struct Scales {
    next: f32,
    min_scale: f32,
    step: f32,
    width: u32,
    height: u32,
    done: bool,
}

impl Iterator for Scales {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.done || self.next < self.min_scale || self.next <= 0.0 {
            return None;
        }
        if scaled_len(self.width, self.next) == 0 || scaled_len(self.height, self.next) == 0 {
            return None;
        }

        let scale = self.next;
        self.next *= self.step;
        // a unit step would repeat the same level forever
        self.done = self.step >= 1.0;
        Some(scale)
    }
}
