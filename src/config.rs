//! Pipeline tunables.
//!
//! Every threshold and dimension that varied across revisions of the source
//! system is configuration here, with the values that worked in practice as
//! defaults.

use std::path::PathBuf;

/// Fixed grid used to bound the area the vision model reasons over per call.
#[derive(Debug, Clone, Copy)]
pub struct GridConfig {
    pub rows: u32,
    pub cols: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { rows: 3, cols: 4 }
    }
}

/// Candidate detector thresholds.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Minimum icon bounding-box side, in pixels.
    pub min_size: u32,
    /// Maximum icon bounding-box side, in pixels.
    pub max_size: u32,
    /// Padding applied when cropping and when testing boxes for overlap,
    /// so visually-adjacent icons merge instead of double-counting.
    pub padding: u32,
    /// Canny hysteresis thresholds.
    pub canny_low: f32,
    pub canny_high: f32,
    /// A contour must fill at least this fraction of its bounding box;
    /// rejects sparse contours such as stray edges.
    pub min_fill_ratio: f64,
    /// OCR tokens below this confidence are dropped (observed useful range
    /// 40-60).
    pub ocr_confidence: f32,
    /// Luminance cutoff for the tab binarization.
    pub tab_luminance: u8,
    /// Tab-shaped contour bounds: wide and short.
    pub tab_min_width: u32,
    pub tab_min_height: u32,
    pub tab_max_height: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_size: 16,
            max_size: 150,
            padding: 6,
            canny_low: 50.0,
            canny_high: 150.0,
            min_fill_ratio: 0.3,
            ocr_confidence: 40.0,
            tab_luminance: 180,
            tab_min_width: 50,
            tab_min_height: 10,
            tab_max_height: 60,
        }
    }
}

/// Visual selector behavior.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Images per model request in the tournament's first stage.
    pub batch_size: usize,
    /// Ask once more when the model abstains. Off by default: the first
    /// response is final.
    pub retry_on_abstain: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            retry_on_abstain: false,
        }
    }
}

/// Resolution orchestrator configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub grid: GridConfig,
    pub detector: DetectorConfig,
    pub selector: SelectorConfig,
    /// Minimum similarity for a cached UI element to count as a hit. Kept
    /// high on purpose: a false hit clicks the wrong control, a false miss
    /// only costs a re-analysis.
    pub score_threshold: f32,
    /// Scratch directory for quadrant tiles and candidate crops.
    pub work_dir: PathBuf,
    /// Permanent home for reference images, named by record id.
    pub reference_dir: PathBuf,
    /// Fixed location the action executor reads the current target from.
    pub target_image_path: PathBuf,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            detector: DetectorConfig::default(),
            selector: SelectorConfig::default(),
            score_threshold: 0.65,
            work_dir: PathBuf::from("work"),
            reference_dir: PathBuf::from("reference_images"),
            target_image_path: PathBuf::from("capture/image.png"),
        }
    }
}

/// Task runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Minimum similarity for reusing a stored task flow. Looser than the
    /// element threshold: a near-match flow is merely a starting point.
    pub task_flow_threshold: f32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            task_flow_threshold: 0.5,
        }
    }
}
