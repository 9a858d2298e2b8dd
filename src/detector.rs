//! Candidate extraction from a quadrant tile.
//!
//! Three independent detection paths run over the same tile: edge-based
//! icon detection, OCR text regions, and tab-shaped contour detection.
//! Each path that fails logs a warning and contributes nothing; only a tile
//! that cannot be loaded at all aborts the analysis.

use crate::config::DetectorConfig;
use crate::errors::ResolutionError;
use crate::geometry::{deduplicate, Detection, Rect};
use crate::knowledge::ElementKind;
use crate::providers::OcrEngine;
use image::DynamicImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, dilate};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// One cropped region of the tile, written to disk and ready to be shown
/// to the vision model.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub rect: Rect,
    pub image_path: PathBuf,
    pub kind: ElementKind,
    /// Recognized text, present only for OCR-path candidates.
    pub ocr_text: Option<String>,
}

/// Extracts clickable-element candidates from a tile image.
pub struct CandidateDetector {
    config: DetectorConfig,
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl CandidateDetector {
    pub fn new(config: DetectorConfig, ocr: Option<Arc<dyn OcrEngine>>) -> Self {
        Self { config, ocr }
    }

    /// Run all three detection paths over `image_path`, writing crops under
    /// `out_dir`. Candidate order is deterministic: icons, then text, then
    /// tabs, each in its path's own detection order.
    #[instrument(skip(self))]
    pub async fn detect(
        &self,
        image_path: &Path,
        out_dir: &Path,
    ) -> Result<Vec<Candidate>, ResolutionError> {
        let image = image::open(image_path).map_err(|e| {
            ResolutionError::ImageLoad(format!("cannot load {}: {e}", image_path.display()))
        })?;
        fs::create_dir_all(out_dir)?;

        let mut candidates = Vec::new();

        match self.detect_icons(&image, out_dir) {
            Ok(mut icons) => candidates.append(&mut icons),
            Err(e) => warn!(error = %e, "icon detection failed, continuing without icons"),
        }

        if let Some(ocr) = &self.ocr {
            match self.detect_text(ocr.as_ref(), &image, image_path, out_dir).await {
                Ok(mut texts) => candidates.append(&mut texts),
                Err(e) => warn!(error = %e, "text detection failed, continuing without text"),
            }
        }

        match self.detect_tabs(&image, out_dir) {
            Ok(mut tabs) => candidates.append(&mut tabs),
            Err(e) => warn!(error = %e, "tab detection failed, continuing without tabs"),
        }

        info!(candidates = candidates.len(), "tile analysis complete");
        Ok(candidates)
    }

    /// Edge-based icon detection: blur, Canny, close small gaps, then keep
    /// contour boxes of icon-like size whose contour fills enough of the box.
    fn detect_icons(
        &self,
        image: &DynamicImage,
        out_dir: &Path,
    ) -> Result<Vec<Candidate>, ResolutionError> {
        let gray = image.to_luma8();
        let blurred = gaussian_blur_f32(&gray, 1.0);
        let edges = canny(&blurred, self.config.canny_low, self.config.canny_high);
        let closed = close(&edges, Norm::LInf, 1);
        let dilated = dilate(&closed, Norm::LInf, 1);

        let mut detections = Vec::new();
        for contour in find_contours::<i32>(&dilated) {
            if contour.border_type != BorderType::Outer {
                continue;
            }
            let Some(rect) = bounding_box(&contour) else {
                continue;
            };
            let side_ok = |side: u32| (self.config.min_size..=self.config.max_size).contains(&side);
            if !side_ok(rect.width) || !side_ok(rect.height) {
                continue;
            }
            let area = contour_area(&contour);
            if area <= self.config.min_fill_ratio * rect.area() as f64 {
                continue;
            }
            detections.push(Detection {
                rect,
                contour_area: area,
            });
        }

        let kept = deduplicate(detections, self.config.padding);
        debug!(icons = kept.len(), "icon contours kept");

        let mut candidates = Vec::with_capacity(kept.len());
        for (i, detection) in kept.iter().enumerate() {
            let path = out_dir.join(format!("icon_{i:03}.png"));
            self.save_crop(image, detection.rect, &path)?;
            candidates.push(Candidate {
                rect: detection.rect,
                image_path: path,
                kind: ElementKind::Icon,
                ocr_text: None,
            });
        }
        Ok(candidates)
    }

    /// OCR path: every confident non-empty token becomes a text candidate.
    async fn detect_text(
        &self,
        ocr: &dyn OcrEngine,
        image: &DynamicImage,
        image_path: &Path,
        out_dir: &Path,
    ) -> Result<Vec<Candidate>, ResolutionError> {
        let tokens = ocr
            .recognize(image_path)
            .await
            .map_err(|e| ResolutionError::Provider(e.to_string()))?;

        let mut candidates = Vec::new();
        for token in tokens {
            if token.confidence <= self.config.ocr_confidence || token.text.trim().is_empty() {
                continue;
            }
            let path = out_dir.join(format!("text_{:03}.png", candidates.len()));
            self.save_crop(image, token.rect, &path)?;
            candidates.push(Candidate {
                rect: token.rect,
                image_path: path,
                kind: ElementKind::Text,
                ocr_text: Some(token.text.trim().to_string()),
            });
        }
        debug!(texts = candidates.len(), "ocr tokens kept");
        Ok(candidates)
    }

    /// Tab detection: binarize against a light background, then keep wide
    /// short contours.
    fn detect_tabs(
        &self,
        image: &DynamicImage,
        out_dir: &Path,
    ) -> Result<Vec<Candidate>, ResolutionError> {
        let gray = image.to_luma8();
        let binary = threshold(&gray, self.config.tab_luminance, ThresholdType::BinaryInverted);

        let mut candidates = Vec::new();
        for contour in find_contours::<i32>(&binary) {
            if contour.border_type != BorderType::Outer {
                continue;
            }
            let Some(rect) = bounding_box(&contour) else {
                continue;
            };
            if rect.width <= self.config.tab_min_width
                || rect.height <= self.config.tab_min_height
                || rect.height >= self.config.tab_max_height
            {
                continue;
            }
            let path = out_dir.join(format!("tab_{:03}.png", candidates.len()));
            self.save_crop(image, rect, &path)?;
            candidates.push(Candidate {
                rect,
                image_path: path,
                kind: ElementKind::TabCandidate,
                ocr_text: None,
            });
        }
        debug!(tabs = candidates.len(), "tab contours kept");
        Ok(candidates)
    }

    /// Crop `rect` (grown by the configured padding, clamped to the image)
    /// and write it as PNG.
    fn save_crop(
        &self,
        image: &DynamicImage,
        rect: Rect,
        path: &Path,
    ) -> Result<(), ResolutionError> {
        let padded = rect.expand(self.config.padding);
        let width = padded.width.min(image.width().saturating_sub(padded.x));
        let height = padded.height.min(image.height().saturating_sub(padded.y));
        if width == 0 || height == 0 {
            return Err(ResolutionError::InvalidInput(format!(
                "crop {rect:?} lies outside a {}x{} image",
                image.width(),
                image.height()
            )));
        }
        let crop = image.crop_imm(padded.x, padded.y, width, height);
        crop.save(path).map_err(|e| {
            ResolutionError::ImageWrite(format!("cannot write {}: {e}", path.display()))
        })
    }
}

/// Bounding box of a contour's points, clamped to non-negative coordinates.
/// `None` for degenerate contours.
fn bounding_box(contour: &Contour<i32>) -> Option<Rect> {
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;
    for point in &contour.points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    if min_x > max_x || min_y > max_y {
        return None;
    }
    let min_x = min_x.max(0) as u32;
    let min_y = min_y.max(0) as u32;
    let width = (max_x.max(0) as u32).saturating_sub(min_x) + 1;
    let height = (max_y.max(0) as u32).saturating_sub(min_y) + 1;
    Some(Rect::new(min_x, min_y, width, height))
}

/// Shoelace area of the contour polygon.
fn contour_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let mut doubled = 0i64;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        doubled += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    (doubled.abs() as f64) / 2.0
}
