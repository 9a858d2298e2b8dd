//! Collaborator interfaces consumed by the pipeline.
//!
//! Everything external (the vision-language model, the embedding model,
//! OCR, screen capture, the action executor, the instruction planner and
//! speech-to-text) sits behind one of these traits. The pipeline owns
//! explicitly-constructed handles (`Arc<dyn …>`); there is no ambient
//! global client, so tests substitute fakes freely.

use crate::action::{Action, PlannedStep};
use crate::geometry::Rect;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod capture;
pub mod executor;
pub mod ocr;
pub mod openai;

/// Failure of an external collaborator call. Callers decide whether the
/// failing step degrades, abstains, or aborts the resolution.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A vision-capable model endpoint: one text prompt plus zero-or-more
/// images in, free text out. One call per invocation; no retry here.
#[async_trait]
pub trait VisionLanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, images: &[PathBuf]) -> Result<String, ProviderError>;
}

/// Text to fixed-length vector. The same text must always yield the same
/// vector (subject to model version pinning).
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// One recognized OCR token with its confidence and location.
#[derive(Debug, Clone)]
pub struct OcrToken {
    pub text: String,
    pub confidence: f32,
    pub rect: Rect,
}

/// Optical character recognition over an image file.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image_path: &Path) -> Result<Vec<OcrToken>, ProviderError>;
}

/// Produces a full-screen raster image and returns where it was written.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture(&self) -> Result<PathBuf, ProviderError>;
}

/// Performs a physical input action. The target of click actions is the
/// reference image previously placed at the fixed location by the
/// resolver; success is reported by the implementation's exit contract.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &Action) -> Result<(), ProviderError>;
}

/// Turns a free-text instruction into an ordered step list.
#[async_trait]
pub trait StepPlanner: Send + Sync {
    async fn plan(&self, instruction: &str) -> Result<Vec<PlannedStep>, ProviderError>;
}

/// Transcribes a recorded audio clip. Only the producer of instruction
/// text; nothing in this crate implements it beyond the interface.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, ProviderError>;
}
