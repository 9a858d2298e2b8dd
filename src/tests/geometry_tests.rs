use crate::geometry::{deduplicate, Detection, Rect};

#[test]
fn overlap_requires_positive_area() {
    let a = Rect::new(10, 10, 20, 20);
    let b = Rect::new(20, 20, 20, 20);
    assert!(a.overlaps(&b));

    // Sharing only an edge does not overlap.
    let touching = Rect::new(30, 10, 20, 20);
    assert!(!a.overlaps(&touching));

    let disjoint = Rect::new(100, 100, 5, 5);
    assert!(!a.overlaps(&disjoint));
}

#[test]
fn expand_clamps_at_image_origin() {
    let near_origin = Rect::new(2, 3, 10, 10);
    let padded = near_origin.expand(6);
    assert_eq!(padded.x, 0);
    assert_eq!(padded.y, 0);
    // Right/bottom edges still move out by the full padding.
    assert_eq!(padded.right(), 18);
    assert_eq!(padded.bottom(), 19);
}

#[test]
fn deduplicate_keeps_largest_contour_of_an_overlapping_pair() {
    let big = Detection {
        rect: Rect::new(10, 10, 30, 30),
        contour_area: 900.0,
    };
    let small = Detection {
        rect: Rect::new(15, 15, 10, 10),
        contour_area: 100.0,
    };
    let kept = deduplicate(vec![small, big], 0);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].rect, big.rect);
}

#[test]
fn deduplicate_padding_merges_adjacent_boxes() {
    let left = Detection {
        rect: Rect::new(10, 10, 20, 20),
        contour_area: 400.0,
    };
    let right = Detection {
        rect: Rect::new(32, 10, 20, 20),
        contour_area: 200.0,
    };
    // 2px apart: independent without padding, merged with padding 6.
    assert_eq!(deduplicate(vec![left, right], 0).len(), 2);
    let kept = deduplicate(vec![left, right], 6);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].rect, left.rect);
}

#[test]
fn deduplicate_is_stable_for_equal_areas() {
    let first = Detection {
        rect: Rect::new(10, 10, 20, 20),
        contour_area: 400.0,
    };
    let second = Detection {
        rect: Rect::new(15, 15, 20, 20),
        contour_area: 400.0,
    };
    let kept = deduplicate(vec![first, second], 0);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].rect, first.rect);
}

#[test]
fn non_overlapping_detections_all_survive() {
    let detections: Vec<Detection> = (0..4)
        .map(|i| Detection {
            rect: Rect::new(i * 100, 0, 20, 20),
            contour_area: (i as f64 + 1.0) * 10.0,
        })
        .collect();
    assert_eq!(deduplicate(detections, 6).len(), 4);
}
