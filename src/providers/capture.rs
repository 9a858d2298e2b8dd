//! Screen capture through `xcap`.

use crate::providers::{ProviderError, ScreenCapture};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, instrument};
use xcap::Monitor;

/// Captures the first monitor to a fixed PNG path.
pub struct XcapCapture {
    output_path: PathBuf,
}

impl XcapCapture {
    pub fn new(output_path: PathBuf) -> Self {
        Self { output_path }
    }
}

#[async_trait]
impl ScreenCapture for XcapCapture {
    #[instrument(skip(self))]
    async fn capture(&self) -> Result<PathBuf, ProviderError> {
        let output_path = self.output_path.clone();
        // Monitor enumeration and capture block on platform APIs.
        let path = tokio::task::spawn_blocking(move || -> Result<PathBuf, ProviderError> {
            let monitors = Monitor::all()
                .map_err(|e| ProviderError::Unavailable(format!("monitor enumeration: {e}")))?;
            let monitor = monitors
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::Unavailable("no monitor found".into()))?;
            let image = monitor
                .capture_image()
                .map_err(|e| ProviderError::Request(format!("capture: {e}")))?;
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            image
                .save(&output_path)
                .map_err(|e| ProviderError::Request(format!("saving capture: {e}")))?;
            Ok(output_path)
        })
        .await
        .map_err(|e| ProviderError::Unavailable(format!("capture task: {e}")))??;

        debug!(path = %path.display(), "screen captured");
        Ok(path)
    }
}
