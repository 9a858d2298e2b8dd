//! Shared fakes and fixtures for the pipeline tests.

use crate::action::{Action, PlannedStep};
use crate::config::ResolverConfig;
use crate::detector::CandidateDetector;
use crate::knowledge::KnowledgeStore;
use crate::providers::{
    ActionExecutor, EmbeddingModel, OcrEngine, OcrToken, ProviderError, ScreenCapture,
    StepPlanner, VisionLanguageModel,
};
use crate::resolver::ElementResolver;
use crate::selector::VisualSelector;
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Vision model that replays a fixed sequence of responses, one per call.
/// Running off the end of the script fails the request, which callers
/// treat as an abstention.
pub struct ScriptedVision {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedVision {
    pub fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionLanguageModel for ScriptedVision {
    async fn complete(&self, prompt: &str, _images: &[PathBuf]) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::Request("script exhausted".into()))
    }
}

/// Deterministic embedder. Texts primed with explicit vectors get exactly
/// those; anything else gets a text-derived pseudo-random unit vector, so
/// identical texts always land at similarity 1.0. Tests asserting LOW
/// similarity must prime both texts.
pub struct FakeEmbedder {
    primed: Mutex<HashMap<String, Vec<f32>>>,
    fail: AtomicBool,
}

impl FakeEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            primed: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn prime(&self, text: &str, vector: Vec<f32>) {
        self.primed
            .lock()
            .unwrap()
            .insert(text.to_string(), unit(vector));
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingModel for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("embedder down".into()));
        }
        if let Some(vector) = self.primed.lock().unwrap().get(text) {
            return Ok(vector.clone());
        }
        Ok(pseudo_vector(text))
    }
}

/// Normalize to unit length.
pub fn unit(vector: Vec<f32>) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector;
    }
    vector.into_iter().map(|x| x / norm).collect()
}

fn pseudo_vector(text: &str) -> Vec<f32> {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    let mut state = hasher.finish() | 1;
    let mut vector = Vec::with_capacity(8);
    for _ in 0..8 {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        vector.push(((state >> 33) as f32 / (1u64 << 31) as f32) - 1.0);
    }
    unit(vector)
}

/// Capture that hands back a pre-rendered screenshot file.
pub struct FakeCapture {
    path: PathBuf,
}

impl FakeCapture {
    pub fn new(path: PathBuf) -> Arc<Self> {
        Arc::new(Self { path })
    }
}

#[async_trait]
impl ScreenCapture for FakeCapture {
    async fn capture(&self) -> Result<PathBuf, ProviderError> {
        Ok(self.path.clone())
    }
}

/// Capture that always fails; used where a test must prove the screen was
/// never touched.
pub struct FailingCapture;

#[async_trait]
impl ScreenCapture for FailingCapture {
    async fn capture(&self) -> Result<PathBuf, ProviderError> {
        Err(ProviderError::Unavailable("no screen in tests".into()))
    }
}

/// OCR that returns a fixed token list.
pub struct FakeOcr {
    tokens: Vec<OcrToken>,
}

impl FakeOcr {
    pub fn new(tokens: Vec<OcrToken>) -> Arc<Self> {
        Arc::new(Self { tokens })
    }
}

#[async_trait]
impl OcrEngine for FakeOcr {
    async fn recognize(&self, _image_path: &Path) -> Result<Vec<OcrToken>, ProviderError> {
        Ok(self.tokens.clone())
    }
}

/// OCR that always fails.
pub struct FailingOcr;

#[async_trait]
impl OcrEngine for FailingOcr {
    async fn recognize(&self, _image_path: &Path) -> Result<Vec<OcrToken>, ProviderError> {
        Err(ProviderError::Unavailable("no ocr in tests".into()))
    }
}

/// Planner returning a canned step list and counting invocations.
pub struct FakePlanner {
    steps: Vec<PlannedStep>,
    calls: AtomicUsize,
}

impl FakePlanner {
    pub fn new(steps: Vec<PlannedStep>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StepPlanner for FakePlanner {
    async fn plan(&self, _instruction: &str) -> Result<Vec<PlannedStep>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.steps.clone())
    }
}

/// Executor recording every action it is asked to perform.
pub struct FakeExecutor {
    actions: Mutex<Vec<Action>>,
    fail: AtomicBool,
}

impl FakeExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            actions: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionExecutor for FakeExecutor {
    async fn execute(&self, action: &Action) -> Result<(), ProviderError> {
        self.actions.lock().unwrap().push(action.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Request("executor failure".into()));
        }
        Ok(())
    }
}

/// Write a solid-color image to `path`.
pub fn write_image(path: &Path, width: u32, height: u32, color: Rgb<u8>) {
    let image = RgbImage::from_pixel(width, height, color);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image.save(path).unwrap();
}

/// Write a white image with filled dark squares at the given top-left
/// corners; square side is `side` pixels.
pub fn write_image_with_squares(
    path: &Path,
    width: u32,
    height: u32,
    side: u32,
    corners: &[(u32, u32)],
) {
    let mut image = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    for &(cx, cy) in corners {
        for y in cy..(cy + side).min(height) {
            for x in cx..(cx + side).min(width) {
                image.put_pixel(x, y, Rgb([30, 30, 30]));
            }
        }
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image.save(path).unwrap();
}

/// Resolver config with every path rooted inside `dir`.
pub fn resolver_config(dir: &Path) -> ResolverConfig {
    ResolverConfig {
        work_dir: dir.join("work"),
        reference_dir: dir.join("reference_images"),
        target_image_path: dir.join("capture/image.png"),
        ..ResolverConfig::default()
    }
}

/// A full resolver wired from fakes, with no OCR path.
pub fn build_resolver(
    store: Arc<KnowledgeStore>,
    vision: Arc<dyn VisionLanguageModel>,
    capture: Arc<dyn ScreenCapture>,
    config: ResolverConfig,
) -> ElementResolver {
    let selector = VisualSelector::new(vision, config.selector.clone());
    let detector = CandidateDetector::new(config.detector.clone(), None);
    ElementResolver::new(store, selector, detector, capture, config)
}
