use std::sync::Arc;

use crate::classifier::Workspace;
use crate::common::{FaceInfo, ImageData, Rect};
use crate::feat::FeatureMaps;
use crate::image_pyramid::{resize_image, ImagePyramid};
use crate::io::{Model, MIN_WINDOW_SIZE, SAMPLE_SIZE};
use crate::nms::non_maximum_suppression;

const NMS_IOU_THRESH: f32 = 0.8;
const FINAL_NMS_IOU_THRESH: f32 = 0.3;

/// Funnel-structured cascade detector.
///
/// The first hierarchy slides a window over every pyramid level. Each later
/// branch re-examines the merged survivors of its upstream branches on
/// windows cropped from the 1x image, refining their boxes as it goes.
#[derive(Debug, Clone)]
pub struct FuStDetector {
    model: Arc<Model>,
    wnd_size: u32,
    slide_wnd_step_x: u32,
    slide_wnd_step_y: u32,
}

impl FuStDetector {
    pub fn new(model: Arc<Model>) -> FuStDetector {
        FuStDetector {
            model,
            wnd_size: SAMPLE_SIZE,
            slide_wnd_step_x: 4,
            slide_wnd_step_y: 4,
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Ignored below 20 pixels or below what the model's features need.
    pub fn set_window_size(&mut self, size: u32) {
        if size >= MIN_WINDOW_SIZE && size >= self.model.min_window_size() {
            self.wnd_size = size;
        } else {
            log::debug!("window size {size} ignored, keeping {}", self.wnd_size);
        }
    }

    pub fn window_size(&self) -> u32 {
        self.wnd_size
    }

    /// Each axis is updated only when its step is positive.
    pub fn set_slide_window_step(&mut self, step_x: u32, step_y: u32) {
        if step_x > 0 {
            self.slide_wnd_step_x = step_x;
        }
        if step_y > 0 {
            self.slide_wnd_step_y = step_y;
        }
    }

    pub fn slide_window_step(&self) -> (u32, u32) {
        (self.slide_wnd_step_x, self.slide_wnd_step_y)
    }

    /// Runs the whole funnel over `pyramid` and returns the survivors of the
    /// first branch of the last hierarchy, in 1x image coordinates.
    pub fn detect(&self, pyramid: &mut ImagePyramid) -> Vec<FaceInfo> {
        let mut feat_maps = FeatureMaps::new();
        let mut ws = Workspace::new();

        let mut current = self.slide_windows(pyramid, &mut feat_maps, &mut ws);
        log::debug!(
            "sliding window kept {} candidates",
            current.iter().map(Vec::len).sum::<usize>()
        );

        let img = pyramid.image_1x();
        let wnd = self.wnd_size;
        let roi = Rect::new(0, 0, wnd as i32, wnd as i32);
        let mut crop = Vec::new();
        let mut wnd_data = vec![0u8; wnd as usize * wnd as usize];

        let num_hierarchy = self.model.num_hierarchies();
        for (h, branches) in self.model.hierarchies().iter().enumerate().skip(1) {
            let is_last_hierarchy = h + 1 == num_hierarchy;
            let mut next = Vec::with_capacity(branches.len());

            for branch in branches {
                let mut bboxes: Vec<FaceInfo> = branch
                    .wnd_src()
                    .iter()
                    .flat_map(|&src| current[src].iter().cloned())
                    .collect();

                let num_stage = branch.stages().len();
                for (k, stage) in branch.stages().iter().enumerate() {
                    let feat_map = feat_maps.get_mut(stage.kind());
                    let mut survivors = Vec::with_capacity(bboxes.len());

                    for mut face in bboxes {
                        let bbox = *face.bbox();
                        if bbox.x() + bbox.width() <= 0
                            || bbox.y() + bbox.height() <= 0
                            || bbox.area() == 0
                        {
                            continue;
                        }

                        window_data(&img, &bbox, &mut crop);
                        let (crop_w, crop_h) = (bbox.width() as u32, bbox.height() as u32);
                        let crop_img = ImageData::new(&crop, crop_w, crop_h);
                        resize_image(&crop_img, &mut wnd_data, wnd, wnd);
                        feat_map.compute(&wnd_data, wnd, wnd);
                        feat_map.set_roi(roi);

                        let score = stage.classify(feat_map, &mut ws);
                        if !score.is_positive() {
                            continue;
                        }
                        if let [_, dx, dy, ds, ..] = *ws.outputs() {
                            let refined = regress(&bbox, dx, dy, ds);
                            if refined.width() <= 0 || refined.height() <= 0 {
                                continue;
                            }
                            *face.bbox_mut() = refined;
                        }
                        face.set_score(score.score() as f64);
                        survivors.push(face);
                    }

                    bboxes = if k + 1 < num_stage {
                        non_maximum_suppression(survivors, NMS_IOU_THRESH)
                    } else if is_last_hierarchy {
                        non_maximum_suppression(survivors, FINAL_NMS_IOU_THRESH)
                    } else {
                        survivors
                    };
                }
                next.push(bboxes);
            }

            log::trace!(
                "hierarchy {h} kept {} candidates",
                next.iter().map(Vec::len).sum::<usize>()
            );
            current = next;
        }

        current.into_iter().next().unwrap_or_default()
    }

    /// First hierarchy: every branch votes on every window of every level.
    fn slide_windows(
        &self,
        pyramid: &mut ImagePyramid,
        feat_maps: &mut FeatureMaps,
        ws: &mut Workspace,
    ) -> Vec<Vec<FaceInfo>> {
        let classifiers: Vec<_> = self.model.first_hierarchy().collect();
        let Some(kind) = self.model.first_kind() else {
            return Vec::new();
        };
        let feat_map = feat_maps.get_mut(kind);

        let wnd = self.wnd_size;
        let mut proposals = vec![Vec::new(); classifiers.len()];
        for scale in pyramid.scales() {
            let img = pyramid.scaled_image(scale);
            if img.width() < wnd || img.height() < wnd {
                continue;
            }
            feat_map.compute(img.data(), img.width(), img.height());

            let size = (wnd as f32 / scale + 0.5) as i32;
            let max_x = img.width() - wnd;
            let max_y = img.height() - wnd;
            for y in (0..=max_y).step_by(self.slide_wnd_step_y as usize) {
                for x in (0..=max_x).step_by(self.slide_wnd_step_x as usize) {
                    feat_map.set_roi(Rect::new(x as i32, y as i32, wnd as i32, wnd as i32));
                    let bbox = Rect::new(
                        (x as f32 / scale + 0.5) as i32,
                        (y as f32 / scale + 0.5) as i32,
                        size,
                        size,
                    );

                    for (classifier, found) in classifiers.iter().zip(&mut proposals) {
                        let score = classifier.classify(feat_map, ws);
                        if score.is_positive() {
                            found.push(FaceInfo::new(bbox, score.score() as f64));
                        }
                    }
                }
            }
        }

        proposals
            .into_iter()
            .map(|found| non_maximum_suppression(found, NMS_IOU_THRESH))
            .collect()
    }
}

/// Copies `wnd` out of `img` into `crop`, zero-filling whatever lies outside
/// the image.
fn window_data(img: &ImageData, wnd: &Rect, crop: &mut Vec<u8>) {
    let (w, h) = (wnd.width() as i64, wnd.height() as i64);
    crop.clear();
    crop.resize((w * h) as usize, 0);

    let (img_w, img_h) = (img.width() as i64, img.height() as i64);
    let (wx, wy) = (wnd.x() as i64, wnd.y() as i64);
    let x0 = wx.max(0);
    let x1 = (wx + w).min(img_w);
    let y0 = wy.max(0);
    let y1 = (wy + h).min(img_h);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let data = img.data();
    for y in y0..y1 {
        let src = &data[(y * img_w + x0) as usize..(y * img_w + x1) as usize];
        let dest = ((y - wy) * w + (x0 - wx)) as usize;
        crop[dest..dest + src.len()].copy_from_slice(src);
    }
}

/// Applies the `(dx, dy, ds)` regression outputs of a SURF-MLP stage. The
/// refined box is square.
fn regress(bbox: &Rect, dx: f32, dy: f32, ds: f32) -> Rect {
    let x = bbox.x() as f32;
    let y = bbox.y() as f32;
    let w = bbox.width() as f32;
    let h = bbox.height() as f32;

    let size = ((ds * 2.0 - 1.0) * w + w + 0.5) as i32;
    let new_x = ((dx * 2.0 - 1.0) * w + x + (w - size as f32) * 0.5 + 0.5) as i32;
    let new_y = ((dy * 2.0 - 1.0) * h + y + (h - size as f32) * 0.5 + 0.5) as i32;
    Rect::new(new_x, new_y, size, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_inside_image_is_copied() {
        let data: Vec<u8> = (0..25).collect();
        let img = ImageData::new(&data, 5, 5);
        let mut crop = Vec::new();
        window_data(&img, &Rect::new(1, 2, 3, 2), &mut crop);
        assert_eq!(crop, vec![11, 12, 13, 16, 17, 18]);
    }

    #[test]
    fn window_outside_image_is_zero_padded() {
        let data: Vec<u8> = (1..=9).collect();
        let img = ImageData::new(&data, 3, 3);
        let mut crop = Vec::new();
        window_data(&img, &Rect::new(-1, -1, 3, 3), &mut crop);
        assert_eq!(crop, vec![0, 0, 0, 0, 1, 2, 0, 4, 5]);

        window_data(&img, &Rect::new(2, 1, 3, 3), &mut crop);
        assert_eq!(crop, vec![6, 0, 0, 9, 0, 0, 0, 0, 0]);

        window_data(&img, &Rect::new(10, 10, 2, 2), &mut crop);
        assert_eq!(crop, vec![0; 4]);
    }

    #[test]
    fn neutral_regression_keeps_box() {
        let bbox = Rect::new(10, 20, 40, 40);
        assert_eq!(regress(&bbox, 0.5, 0.5, 0.5), bbox);
    }

    #[test]
    fn regression_shifts_and_scales() {
        let bbox = Rect::new(10, 20, 40, 40);
        // ds = 0.75 grows the box by half its width, centred
        let out = regress(&bbox, 0.5, 0.5, 0.75);
        assert_eq!(out, Rect::new(0, 10, 60, 60));
        // dx = 0.625 moves right by a quarter of the width
        let out = regress(&bbox, 0.625, 0.5, 0.5);
        assert_eq!(out, Rect::new(20, 20, 40, 40));
    }
}
