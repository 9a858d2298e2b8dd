//! Vision-model tournament over candidate images.
//!
//! The model is only ever asked multiple-choice questions: "which of these
//! N images is X, answer with its number or 0". Free-text answers are
//! reduced to the first run of digits; anything that does not parse to a
//! number in range counts as an abstention, and an abstention is final
//! unless retry is explicitly enabled.

use crate::config::SelectorConfig;
use crate::detector::Candidate;
use crate::providers::{ProviderError, VisionLanguageModel};
use crate::quadrant::QuadrantTile;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Runs the two-stage selection tournament.
pub struct VisualSelector {
    model: Arc<dyn VisionLanguageModel>,
    config: SelectorConfig,
}

impl VisualSelector {
    pub fn new(model: Arc<dyn VisionLanguageModel>, config: SelectorConfig) -> Self {
        Self { model, config }
    }

    /// Pick the quadrant tile that contains the described element, or
    /// `None` when the model abstains.
    #[instrument(skip(self, tiles))]
    pub async fn select_quadrant(
        &self,
        tiles: &[QuadrantTile],
        description: &str,
    ) -> Option<PathBuf> {
        if tiles.is_empty() {
            return None;
        }
        let prompt = format!(
            "You are looking at {count} numbered screenshots of regions of a desktop screen, \
             in the order given. Which region contains {description}? \
             Reply with ONLY the region number (1 to {count}), or 0 if none of them contains it.",
            count = tiles.len(),
        );
        let images: Vec<PathBuf> = tiles.iter().map(|tile| tile.path.clone()).collect();
        let choice = self.ask(&prompt, &images, tiles.len()).await?;
        let tile = &tiles[choice - 1];
        info!(quadrant = tile.index, "quadrant selected");
        Some(tile.path.clone())
    }

    /// Run the element tournament: batches of `batch_size` in the first
    /// stage, then one final round among the batch winners. A stage-one
    /// batch the model abstains on simply fields no finalist.
    #[instrument(skip(self, candidates))]
    pub async fn select_element(
        &self,
        candidates: &[Candidate],
        description: &str,
    ) -> Option<Candidate> {
        if candidates.is_empty() {
            return None;
        }

        let mut finalists: Vec<Candidate> = Vec::new();
        for batch in candidates.chunks(self.config.batch_size.max(1)) {
            if let Some(winner) = self.pick_from(batch, description, "first").await {
                finalists.push(winner);
            }
        }
        debug!(finalists = finalists.len(), "first stage complete");

        match finalists.len() {
            0 => None,
            1 => {
                let winner = finalists.remove(0);
                info!(path = %winner.image_path.display(), "element selected");
                Some(winner)
            }
            _ => {
                let winner = self.pick_from(&finalists, description, "final").await?;
                info!(path = %winner.image_path.display(), "element selected");
                Some(winner)
            }
        }
    }

    /// Produce a reusable textual description of the winning crop, or
    /// `None` when the model cannot. The caller falls back to the query
    /// text; a description failure never fails the resolution.
    #[instrument(skip(self))]
    pub async fn describe_element(&self, image_path: &Path) -> Option<String> {
        let prompt = "Describe the UI element in this image in one short sentence, \
                      naming what it is and what it is for. Reply with the description only.";
        let images = [image_path.to_path_buf()];
        match self.model.complete(prompt, &images).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "description request failed");
                None
            }
        }
    }

    async fn pick_from(
        &self,
        batch: &[Candidate],
        description: &str,
        stage: &str,
    ) -> Option<Candidate> {
        let prompt = format!(
            "You are looking at {count} numbered cropped images of UI elements, in the order \
             given. Which image shows {description}? \
             Reply with ONLY the image number (1 to {count}), or 0 if none of them matches.",
            count = batch.len(),
        );
        let images: Vec<PathBuf> = batch
            .iter()
            .map(|candidate| candidate.image_path.clone())
            .collect();
        match self.ask(&prompt, &images, batch.len()).await {
            Some(index) => Some(batch[index - 1].clone()),
            None => {
                debug!(stage, batch = batch.len(), "batch abstained");
                None
            }
        }
    }

    /// One model round, retried at most once when configured. Returns the
    /// 1-based choice, or `None` on abstention; out-of-range answers,
    /// unparseable answers and request failures all count as abstentions.
    async fn ask(&self, prompt: &str, images: &[PathBuf], max: usize) -> Option<usize> {
        match self.ask_once(prompt, images, max).await {
            Some(choice) => Some(choice),
            None if self.config.retry_on_abstain => {
                debug!("retrying after abstention");
                self.ask_once(prompt, images, max).await
            }
            None => None,
        }
    }

    async fn ask_once(&self, prompt: &str, images: &[PathBuf], max: usize) -> Option<usize> {
        match self.model.complete(prompt, images).await {
            Ok(response) => parse_choice(&response, max),
            Err(e) => {
                log_model_failure(&e);
                None
            }
        }
    }
}

fn log_model_failure(error: &ProviderError) {
    warn!(error = %error, "vision model request failed, treating as abstention");
}

/// Extract the model's choice: the first run of digits in the response,
/// accepted only when it parses to 1..=max. Everything else (0, prose with
/// no digits, out-of-range numbers) is an abstention.
fn parse_choice(response: &str, max: usize) -> Option<usize> {
    let digits: String = response
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<usize>() {
        Ok(n) if (1..=max).contains(&n) => Some(n),
        _ => None,
    }
}
