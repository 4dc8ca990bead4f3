use ordered_float::OrderedFloat;

use crate::common::FaceInfo;

/// Collapses overlapping boxes into the highest-scoring box of each cluster.
///
/// Every box whose IoU with a kept box exceeds `iou_thresh` is dropped and its
/// score added to the kept one. Boxes with equal scores keep their input order.
pub fn non_maximum_suppression(mut bboxes: Vec<FaceInfo>, iou_thresh: f32) -> Vec<FaceInfo> {
    bboxes.sort_by_key(|fi| std::cmp::Reverse(OrderedFloat(fi.score())));

    let num_bbox = bboxes.len();
    let mut mask_merged = vec![false; num_bbox];
    let mut bboxes_nms = Vec::new();

    for select_idx in 0..num_bbox {
        if mask_merged[select_idx] {
            continue;
        }
        mask_merged[select_idx] = true;

        let mut selected = bboxes[select_idx].clone();
        for i in select_idx + 1..num_bbox {
            if mask_merged[i] {
                continue;
            }
            if selected.bbox().iou(bboxes[i].bbox()) > iou_thresh {
                mask_merged[i] = true;
                selected.set_score(selected.score() + bboxes[i].score());
            }
        }
        bboxes_nms.push(selected);
    }

    bboxes_nms
}
