//! OCR through the Tesseract command-line tool.
//!
//! Runs `tesseract <image> stdout -l <lang> --psm 11 tsv` and parses the
//! TSV output. PSM 11 (sparse text) fits UI screenshots, where words are
//! scattered rather than laid out as paragraphs.

use crate::geometry::Rect;
use crate::providers::{OcrEngine, OcrToken, ProviderError};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Adapter over the `tesseract` binary.
pub struct TesseractCli {
    binary: String,
    lang: String,
}

impl TesseractCli {
    pub fn new(lang: impl Into<String>) -> Self {
        Self {
            binary: "tesseract".to_string(),
            lang: lang.into(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    #[instrument(skip(self))]
    async fn recognize(&self, image_path: &Path) -> Result<Vec<OcrToken>, ProviderError> {
        let output = Command::new(&self.binary)
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.lang, "--psm", "11", "tsv"])
            .output()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("cannot run {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::Request(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let tokens = parse_tsv(&stdout);
        debug!(tokens = tokens.len(), "ocr complete");
        Ok(tokens)
    }
}

/// Parse Tesseract's TSV format, keeping only word-level rows (level 5).
/// Malformed rows are skipped rather than failing the whole run.
fn parse_tsv(tsv: &str) -> Vec<OcrToken> {
    let mut tokens = Vec::new();
    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }
        if fields[0] != "5" {
            continue;
        }
        let (Ok(left), Ok(top), Ok(width), Ok(height), Ok(confidence)) = (
            fields[6].parse::<u32>(),
            fields[7].parse::<u32>(),
            fields[8].parse::<u32>(),
            fields[9].parse::<u32>(),
            fields[10].parse::<f32>(),
        ) else {
            continue;
        };
        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }
        tokens.push(OcrToken {
            text: text.to_string(),
            confidence,
            rect: Rect::new(left, top, width, height),
        });
    }
    tokens
}
