/// An axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Rect {
        Rect { x, y, width, height }
    }

    #[inline]
    pub fn x(&self) -> i32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> i32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Area in pixels; degenerate rectangles have area 0.
    pub fn area(&self) -> i64 {
        if self.width <= 0 || self.height <= 0 {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// Intersection-over-union with inclusive pixel extents.
    pub fn iou(&self, other: &Rect) -> f32 {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let w = (self.x + self.width - 1).min(other.x + other.width - 1) - x + 1;
        let h = (self.y + self.height - 1).min(other.y + other.height - 1) - y + 1;
        if w <= 0 || h <= 0 {
            return 0.0;
        }

        let area_intersect = w as f32 * h as f32;
        let area_union = self.area() as f32 + other.area() as f32 - area_intersect;
        if area_union <= 0.0 {
            return 0.0;
        }
        area_intersect / area_union
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceInfo {
    bbox: Rect,
    roll: f64,
    pitch: f64,
    yaw: f64,

    /// Larger score means higher confidence.
    score: f64,
}

impl FaceInfo {
    pub fn new(bbox: Rect, score: f64) -> FaceInfo {
        FaceInfo {
            bbox,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            score,
        }
    }

    #[inline]
    pub fn bbox(&self) -> &Rect {
        &self.bbox
    }

    #[inline]
    pub fn bbox_mut(&mut self) -> &mut Rect {
        &mut self.bbox
    }

    /// Euler angles are not estimated by the detector and stay at zero.
    pub fn roll(&self) -> f64 {
        self.roll
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    #[inline]
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn set_score(&mut self, score: f64) {
        self.score = score;
    }
}

/// A facial keypoint, as produced by a landmark locator.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FacialLandmark {
    pub x: f64,
    pub y: f64,
}

/// A borrowed, row-major 8-bit image.
#[derive(Clone, Copy, Debug)]
pub struct ImageData<'buf> {
    data: &'buf [u8],
    width: u32,
    height: u32,
    num_channels: u32,
}

impl<'buf> ImageData<'buf> {
    /// Wraps a single-channel (grayscale) buffer.
    pub fn new(data: &'buf [u8], width: u32, height: u32) -> ImageData<'buf> {
        ImageData::with_channels(data, width, height, 1)
    }

    pub fn with_channels(
        data: &'buf [u8],
        width: u32,
        height: u32,
        num_channels: u32,
    ) -> ImageData<'buf> {
        ImageData {
            data,
            width,
            height,
            num_channels,
        }
    }

    #[inline]
    pub fn data(&self) -> &'buf [u8] {
        self.data
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_channels(&self) -> u32 {
        self.num_channels
    }

    /// True for a non-empty single-channel image whose buffer covers every pixel.
    pub fn is_legal(&self) -> bool {
        let needed = self.width as usize * self.height as usize * self.num_channels as usize;
        self.num_channels == 1
            && self.width > 0
            && self.height > 0
            && !self.data.is_empty()
            && self.data.len() >= needed
    }
}

#[cfg(feature = "image")]
impl<'buf> From<&'buf image::GrayImage> for ImageData<'buf> {
    fn from(img: &'buf image::GrayImage) -> ImageData<'buf> {
        ImageData::new(img.as_raw(), img.width(), img.height())
    }
}
