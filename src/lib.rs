//! Voice- and text-driven GUI automation for screens without accessibility
//! APIs.
//!
//! The crate resolves natural-language element descriptions ("the browser
//! icon") to on-screen reference images. A knowledge store answers repeat
//! requests from cache; misses run a visual pipeline that captures the
//! screen, partitions it into a fixed grid, extracts candidate crops with
//! classic image processing, and lets a vision-language model pick the
//! winner in a two-stage tournament. Winners are described and stored so
//! the next similar request skips the pipeline entirely.
//!
//! # Quick overview
//!
//! - [`resolver::ElementResolver`] is the entry point for resolving one
//!   element description.
//! - [`runner::TaskRunner`] executes a whole instruction, reusing stored
//!   task flows when a similar one exists.
//! - [`knowledge::KnowledgeStore`] is the embedded similarity cache behind
//!   both.
//! - External collaborators (vision model, embeddings, OCR, capture,
//!   input) are traits in [`providers`], with production implementations
//!   alongside them.

pub mod action;
pub mod config;
pub mod detector;
pub mod errors;
pub mod geometry;
pub mod knowledge;
pub mod providers;
pub mod quadrant;
pub mod resolver;
pub mod runner;
pub mod selector;

pub use action::{Action, PlannedStep};
pub use config::{DetectorConfig, GridConfig, ResolverConfig, RunnerConfig, SelectorConfig};
pub use detector::{Candidate, CandidateDetector};
pub use errors::ResolutionError;
pub use geometry::Rect;
pub use knowledge::{ElementKind, KnowledgeStore, UiElementRecord};
pub use resolver::{ElementResolver, Resolution, UnresolvedReason};
pub use runner::{StepOutcome, StepStatus, TaskRunner};
pub use selector::VisualSelector;

#[cfg(test)]
mod tests;
