use crate::config::DetectorConfig;
use crate::detector::CandidateDetector;
use crate::errors::ResolutionError;
use crate::geometry::Rect;
use crate::knowledge::ElementKind;
use crate::providers::OcrToken;
use crate::tests::{init_tracing, support};
use image::Rgb;
use std::sync::Arc;

#[tokio::test]
async fn finds_icon_sized_shapes_on_a_plain_background() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let tile = dir.path().join("tile.png");
    support::write_image_with_squares(&tile, 400, 300, 40, &[(50, 50), (200, 100)]);

    let detector = CandidateDetector::new(DetectorConfig::default(), None);
    let candidates = detector.detect(&tile, &dir.path().join("crops")).await.unwrap();

    let icons: Vec<_> = candidates
        .iter()
        .filter(|c| c.kind == ElementKind::Icon)
        .collect();
    assert_eq!(icons.len(), 2, "expected both squares: {candidates:?}");
    for icon in &icons {
        assert!(icon.image_path.is_file(), "crop not written to disk");
        assert!(icon.rect.width >= 16 && icon.rect.width <= 150);
        assert!(icon.ocr_text.is_none());
    }
}

#[tokio::test]
async fn blank_tile_yields_no_candidates() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let tile = dir.path().join("tile.png");
    support::write_image(&tile, 400, 300, Rgb([255, 255, 255]));

    let detector = CandidateDetector::new(DetectorConfig::default(), None);
    let candidates = detector.detect(&tile, &dir.path().join("crops")).await.unwrap();
    assert!(candidates.is_empty());
}

#[tokio::test]
async fn confident_ocr_tokens_become_text_candidates() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let tile = dir.path().join("tile.png");
    support::write_image(&tile, 400, 300, Rgb([255, 255, 255]));

    let ocr = support::FakeOcr::new(vec![
        OcrToken {
            text: "Inicio".into(),
            confidence: 88.0,
            rect: Rect::new(20, 20, 60, 16),
        },
        OcrToken {
            text: "~=".into(),
            confidence: 12.0,
            rect: Rect::new(100, 20, 30, 16),
        },
        OcrToken {
            text: "   ".into(),
            confidence: 95.0,
            rect: Rect::new(200, 20, 30, 16),
        },
    ]);
    let detector = CandidateDetector::new(DetectorConfig::default(), Some(ocr));
    let candidates = detector.detect(&tile, &dir.path().join("crops")).await.unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].kind, ElementKind::Text);
    assert_eq!(candidates[0].ocr_text.as_deref(), Some("Inicio"));
    assert!(candidates[0].image_path.is_file());
}

#[tokio::test]
async fn ocr_failure_degrades_to_icons_only() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let tile = dir.path().join("tile.png");
    support::write_image_with_squares(&tile, 400, 300, 40, &[(50, 50)]);

    let detector =
        CandidateDetector::new(DetectorConfig::default(), Some(Arc::new(support::FailingOcr)));
    let candidates = detector.detect(&tile, &dir.path().join("crops")).await.unwrap();

    assert!(!candidates.is_empty(), "icon path must still contribute");
    assert!(candidates.iter().all(|c| c.kind == ElementKind::Icon));
}

#[tokio::test]
async fn wide_short_dark_regions_become_tab_candidates() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let tile = dir.path().join("tile.png");

    // One tab-shaped bar (wide and short) against a light background.
    let mut image = image::RgbImage::from_pixel(400, 300, Rgb([255, 255, 255]));
    for y in 10..40 {
        for x in 30..180 {
            image.put_pixel(x, y, Rgb([60, 60, 60]));
        }
    }
    image.save(&tile).unwrap();

    let detector = CandidateDetector::new(DetectorConfig::default(), None);
    let candidates = detector.detect(&tile, &dir.path().join("crops")).await.unwrap();

    let tabs: Vec<_> = candidates
        .iter()
        .filter(|c| c.kind == ElementKind::TabCandidate)
        .collect();
    assert_eq!(tabs.len(), 1, "expected the bar as a tab: {candidates:?}");
    assert!(tabs[0].rect.width > 50);
    assert!(tabs[0].rect.height < 60);
}

#[tokio::test]
async fn missing_tile_is_a_load_error() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let detector = CandidateDetector::new(DetectorConfig::default(), None);
    let result = detector
        .detect(&dir.path().join("missing.png"), &dir.path().join("crops"))
        .await;
    assert!(matches!(result, Err(ResolutionError::ImageLoad(_))));
}
