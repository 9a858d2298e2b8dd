//! Element resolution: cache lookup first, full visual analysis second.
//!
//! A resolution ends in exactly one of three ways: a reference image at the
//! fixed target path (cached or freshly analyzed), a structured not-found
//! outcome, or an error for genuinely fatal conditions such as a failed
//! screen capture. Persistence problems never change the outcome of a
//! resolution that already has its image.

use crate::config::ResolverConfig;
use crate::detector::CandidateDetector;
use crate::errors::ResolutionError;
use crate::knowledge::{ElementKind, KnowledgeStore, UiElementPatch};
use crate::providers::ScreenCapture;
use crate::quadrant::partition;
use crate::selector::VisualSelector;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Why a resolution ended without an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The model saw no quadrant containing the element.
    QuadrantNotIdentified,
    /// The chosen quadrant yielded no candidate crops.
    NoCandidates,
    /// The tournament produced no winner.
    SelectionAbstained,
}

/// Outcome of a resolution request.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The reference image is in place at the configured target path.
    Resolved {
        image_path: std::path::PathBuf,
        from_cache: bool,
    },
    /// The element could not be found on the current screen. Not an error;
    /// the screen may simply not show it.
    NotFound { reason: UnresolvedReason },
}

/// Orchestrates cache lookup, screen analysis and persistence.
pub struct ElementResolver {
    store: Arc<KnowledgeStore>,
    selector: VisualSelector,
    detector: CandidateDetector,
    capture: Arc<dyn ScreenCapture>,
    config: ResolverConfig,
}

impl ElementResolver {
    pub fn new(
        store: Arc<KnowledgeStore>,
        selector: VisualSelector,
        detector: CandidateDetector,
        capture: Arc<dyn ScreenCapture>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            store,
            selector,
            detector,
            capture,
            config,
        }
    }

    /// Resolve `description` to a reference image at the target path.
    ///
    /// The cache is consulted first; a hit whose stored image still exists
    /// short-circuits the whole analysis. A hit with a missing or unset
    /// image path falls through to full analysis exactly like a miss.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        description: &str,
        element_type: Option<&ElementKind>,
    ) -> Result<Resolution, ResolutionError> {
        let hits = self
            .store
            .search_ui_elements(description, 1, self.config.score_threshold, element_type)
            .await;

        if let Some(hit) = hits.first() {
            match &hit.record.reference_image_path {
                Some(path) if path.is_file() => {
                    info!(
                        id = %hit.record.id,
                        score = hit.score,
                        "cache hit, reusing stored reference image"
                    );
                    self.place_target(path)?;
                    return Ok(Resolution::Resolved {
                        image_path: self.config.target_image_path.clone(),
                        from_cache: true,
                    });
                }
                Some(path) => {
                    warn!(
                        id = %hit.record.id,
                        path = %path.display(),
                        "cached reference image missing on disk, re-analyzing"
                    );
                }
                None => {
                    warn!(id = %hit.record.id, "cache hit has no reference image, re-analyzing");
                }
            }
        } else {
            debug!("no cache hit above threshold");
        }

        self.full_analysis(description, element_type).await
    }

    /// The full pipeline: capture, partition, quadrant selection, candidate
    /// detection, tournament, description, persistence.
    async fn full_analysis(
        &self,
        description: &str,
        element_type: Option<&ElementKind>,
    ) -> Result<Resolution, ResolutionError> {
        let screenshot = self
            .capture
            .capture()
            .await
            .map_err(|e| ResolutionError::Capture(e.to_string()))?;

        let tiles_dir = self.config.work_dir.join("quadrants");
        let tiles = partition(&screenshot, &self.config.grid, &tiles_dir)?;

        let Some(tile_path) = self.selector.select_quadrant(&tiles, description).await else {
            info!("no quadrant identified for element");
            return Ok(Resolution::NotFound {
                reason: UnresolvedReason::QuadrantNotIdentified,
            });
        };

        let crops_dir = self.config.work_dir.join("candidates");
        let candidates = self.detector.detect(&tile_path, &crops_dir).await?;
        if candidates.is_empty() {
            info!("quadrant yielded no candidates");
            return Ok(Resolution::NotFound {
                reason: UnresolvedReason::NoCandidates,
            });
        }

        let Some(winner) = self.selector.select_element(&candidates, description).await else {
            info!("selection tournament produced no winner");
            return Ok(Resolution::NotFound {
                reason: UnresolvedReason::SelectionAbstained,
            });
        };

        // The description stored as the cache key is the model's account of
        // what the crop shows, not the user's query, so later paraphrased
        // queries can still match it. Query text is the fallback.
        let stored_description = self
            .selector
            .describe_element(&winner.image_path)
            .await
            .unwrap_or_else(|| description.to_string());

        self.place_target(&winner.image_path)?;

        let kind = element_type.cloned().unwrap_or(winner.kind.clone());
        self.persist(&winner.image_path, &stored_description, kind, winner.ocr_text.clone())
            .await;

        Ok(Resolution::Resolved {
            image_path: self.config.target_image_path.clone(),
            from_cache: false,
        })
    }

    /// Two-phase persistence. The record is inserted first to obtain its
    /// id, the crop is copied to its permanent id-named home, and the
    /// record is then patched with that path. Any failure along the way
    /// only costs the cache entry, never the resolution.
    async fn persist(
        &self,
        crop_path: &Path,
        description: &str,
        kind: ElementKind,
        ocr_text: Option<String>,
    ) {
        let Some(id) = self
            .store
            .insert_ui_element(description, kind, None, ocr_text, None)
            .await
        else {
            warn!("could not store element record, resolution not cached");
            return;
        };

        let extension = crop_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png");
        let permanent = self.config.reference_dir.join(format!("{id}.{extension}"));
        if let Err(e) = fs::create_dir_all(&self.config.reference_dir)
            .and_then(|()| fs::copy(crop_path, &permanent).map(|_| ()))
        {
            warn!(%id, error = %e, "could not archive reference image, record stays pathless");
            return;
        }

        if !self.store.update_ui_element(
            id.as_str(),
            UiElementPatch {
                reference_image_path: Some(permanent.clone()),
                ..UiElementPatch::default()
            },
        ) {
            warn!(%id, "could not attach reference image path to record");
            return;
        }
        info!(%id, path = %permanent.display(), "element cached for reuse");
    }

    /// Copy `source` to the fixed target path the executor reads from.
    fn place_target(&self, source: &Path) -> Result<(), ResolutionError> {
        if let Some(parent) = self.config.target_image_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &self.config.target_image_path).map_err(|e| {
            ResolutionError::ImageWrite(format!(
                "cannot place target image at {}: {e}",
                self.config.target_image_path.display()
            ))
        })?;
        debug!(target = %self.config.target_image_path.display(), "target image placed");
        Ok(())
    }
}
