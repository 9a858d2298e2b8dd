//! The persistent knowledge base backing cache decisions.
//!
//! Two collections, UI elements and task flows, each held in an embedded
//! cosine-similarity index and snapshotted to JSON under the store's data
//! directory. Every backend failure is swallowed at this boundary: a search
//! that cannot run returns no hits, an insert that cannot complete stores
//! nothing, and the caller treats either as an ordinary miss.

use crate::action::PlannedStep;
use crate::providers::EmbeddingModel;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// What kind of UI element a record (or candidate) describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Icon,
    Button,
    Tab,
    InputField,
    Text,
    TabCandidate,
    Unknown,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ElementKind::Icon => "icon",
            ElementKind::Button => "button",
            ElementKind::Tab => "tab",
            ElementKind::InputField => "input_field",
            ElementKind::Text => "text",
            ElementKind::TabCandidate => "tab_candidate",
            ElementKind::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// A cached, reusable description of one UI element.
///
/// The record only becomes cache-usable once `reference_image_path` is set
/// AND the file still exists on disk; verifying that is the caller's job
/// (a stale path is a miss, not an error).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiElementRecord {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub element_type: ElementKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Caller-supplied context (OS variant, color, shape, …).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A cached multi-step procedure, immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFlowRecord {
    pub id: String,
    pub task_description: String,
    pub steps: Vec<PlannedStep>,
    pub created_at: DateTime<Utc>,
}

/// Fields that may be merged into an existing UI element record without
/// touching its embedding. Exists for the two-phase image-path write: the
/// permanent file name derives from the store-assigned id, so the record is
/// inserted first and patched with its path second.
#[derive(Debug, Clone, Default)]
pub struct UiElementPatch {
    pub reference_image_path: Option<PathBuf>,
    pub ocr_text: Option<String>,
    pub extra: Option<serde_json::Map<String, serde_json::Value>>,
}

/// One search hit, most-similar first in result order.
#[derive(Debug, Clone)]
pub struct Scored<R> {
    pub score: f32,
    pub record: R,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredPoint<P> {
    vector: Vec<f32>,
    payload: P,
}

/// One on-disk collection: a vector per record, snapshotted as JSON.
struct Collection<P> {
    path: PathBuf,
    points: Vec<StoredPoint<P>>,
}

impl<P: Serialize + DeserializeOwned + Clone> Collection<P> {
    /// Load a snapshot; an unreadable or corrupt file logs a warning and
    /// starts empty (store unavailability must read as "always miss").
    fn open(path: PathBuf) -> Self {
        let points = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(points) => points,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "collection snapshot corrupt, starting empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self { path, points }
    }

    /// Persist the snapshot. Returns false (after logging) on any failure;
    /// the in-memory point is rolled back by the caller when that matters.
    fn save(&self) -> bool {
        let json = match serde_json::to_vec_pretty(&self.points) {
            Ok(json) => json,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot serialize collection");
                return false;
            }
        };
        if let Err(e) = fs::write(&self.path, json) {
            warn!(path = %self.path.display(), error = %e, "cannot write collection snapshot");
            return false;
        }
        true
    }

    fn search<F>(&self, query: &[f32], limit: usize, threshold: f32, filter: F) -> Vec<Scored<P>>
    where
        F: Fn(&P) -> bool,
    {
        let mut hits: Vec<Scored<P>> = self
            .points
            .iter()
            .filter(|point| filter(&point.payload))
            .map(|point| Scored {
                score: cosine_similarity(query, &point.vector),
                record: point.payload.clone(),
            })
            .filter(|scored| scored.score >= threshold)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(limit);
        hits
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

struct Collections {
    elements: Collection<UiElementRecord>,
    flows: Collection<TaskFlowRecord>,
}

/// The cache. Single logical writer; record ids are never reused, so the
/// insert-then-patch sequence of one resolution never races another.
pub struct KnowledgeStore {
    embedder: Arc<dyn EmbeddingModel>,
    inner: Mutex<Collections>,
}

impl KnowledgeStore {
    /// Open (or create) the store under `data_dir`.
    pub fn open(data_dir: &Path, embedder: Arc<dyn EmbeddingModel>) -> Self {
        if let Err(e) = fs::create_dir_all(data_dir) {
            warn!(dir = %data_dir.display(), error = %e, "cannot create store directory");
        }
        let inner = Collections {
            elements: Collection::open(data_dir.join("ui_elements.json")),
            flows: Collection::open(data_dir.join("task_flows.json")),
        };
        Self {
            embedder,
            inner: Mutex::new(inner),
        }
    }

    /// Embed `text`, logging and mapping any failure to `None`. A record is
    /// never stored with a missing or zero vector.
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        match self.embedder.embed(text).await {
            Ok(vector) if !vector.is_empty() => Some(vector),
            Ok(_) => {
                warn!(text, "embedding model returned an empty vector");
                None
            }
            Err(e) => {
                warn!(text, error = %e, "embedding failed");
                None
            }
        }
    }

    /// Insert a UI element record. Returns the new record's id, or `None`
    /// when embedding or persistence failed (nothing is stored).
    #[instrument(skip(self, extra))]
    pub async fn insert_ui_element(
        &self,
        description: &str,
        element_type: ElementKind,
        reference_image_path: Option<PathBuf>,
        ocr_text: Option<String>,
        extra: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Option<String> {
        let vector = self.embed(description).await?;
        let record = UiElementRecord {
            id: Uuid::new_v4().simple().to_string(),
            description: description.to_string(),
            element_type,
            reference_image_path,
            ocr_text,
            created_at: Utc::now(),
            extra: extra.unwrap_or_default(),
        };
        let id = record.id.clone();

        let mut inner = self.inner.lock().ok()?;
        inner.elements.points.push(StoredPoint {
            vector,
            payload: record,
        });
        if !inner.elements.save() {
            inner.elements.points.pop();
            return None;
        }
        info!(%id, "ui element stored");
        Some(id)
    }

    /// Nearest-neighbor search over UI element records, optionally
    /// restricted to one element type. Empty on any failure.
    #[instrument(skip(self))]
    pub async fn search_ui_elements(
        &self,
        query: &str,
        limit: usize,
        score_threshold: f32,
        element_type: Option<&ElementKind>,
    ) -> Vec<Scored<UiElementRecord>> {
        let Some(vector) = self.embed(query).await else {
            return Vec::new();
        };
        let Ok(inner) = self.inner.lock() else {
            return Vec::new();
        };
        let hits = inner
            .elements
            .search(&vector, limit, score_threshold, |record| {
                element_type.is_none_or(|kind| &record.element_type == kind)
            });
        debug!(hits = hits.len(), "ui element search complete");
        hits
    }

    /// Merge `patch` into an existing record without recomputing its
    /// embedding. Returns whether the update was applied and persisted; on
    /// a failed snapshot write the in-memory record is restored, so
    /// searches never see a payload the snapshot does not hold.
    #[instrument(skip(self, patch))]
    pub fn update_ui_element(&self, id: &str, patch: UiElementPatch) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        let Some(index) = inner
            .elements
            .points
            .iter()
            .position(|point| point.payload.id == id)
        else {
            warn!(id, "update requested for unknown record");
            return false;
        };
        let prior = inner.elements.points[index].payload.clone();

        let payload = &mut inner.elements.points[index].payload;
        if let Some(path) = patch.reference_image_path {
            payload.reference_image_path = Some(path);
        }
        if let Some(text) = patch.ocr_text {
            payload.ocr_text = Some(text);
        }
        if let Some(extra) = patch.extra {
            payload.extra.extend(extra);
        }

        if inner.elements.save() {
            info!(id, "ui element payload updated");
            true
        } else {
            inner.elements.points[index].payload = prior;
            false
        }
    }

    /// Store a task flow. Returns the new record's id, or `None` when
    /// nothing was stored.
    #[instrument(skip(self, steps))]
    pub async fn insert_task_flow(
        &self,
        task_description: &str,
        steps: Vec<PlannedStep>,
    ) -> Option<String> {
        let vector = self.embed(task_description).await?;
        let record = TaskFlowRecord {
            id: Uuid::new_v4().simple().to_string(),
            task_description: task_description.to_string(),
            steps,
            created_at: Utc::now(),
        };
        let id = record.id.clone();

        let mut inner = self.inner.lock().ok()?;
        inner.flows.points.push(StoredPoint {
            vector,
            payload: record,
        });
        if !inner.flows.save() {
            inner.flows.points.pop();
            return None;
        }
        info!(%id, "task flow stored");
        Some(id)
    }

    /// Nearest-neighbor search over task flows. Empty on any failure.
    #[instrument(skip(self))]
    pub async fn search_task_flows(
        &self,
        query: &str,
        limit: usize,
        score_threshold: f32,
    ) -> Vec<Scored<TaskFlowRecord>> {
        let Some(vector) = self.embed(query).await else {
            return Vec::new();
        };
        let Ok(inner) = self.inner.lock() else {
            return Vec::new();
        };
        inner.flows.search(&vector, limit, score_threshold, |_| true)
    }
}
