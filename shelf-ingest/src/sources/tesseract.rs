// Tesseract OCR Adapter
//
// Runs the tesseract CLI on the cover image and reads title/author/ISBN/
// publisher out of the text with the cover-text heuristics.

use crate::fusion::Candidate;
use crate::sources::cover_text::parse_cover_text;
use crate::sources::{SourceAdapter, SourceOutcome};
use anyhow::{Context, Result};
use async_trait::async_trait;
use shelf_common::config::OcrConfig;
use shelf_common::BookRecord;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Raw confidence for OCR-derived candidates
pub const OCR_CONFIDENCE: f64 = 0.6;

pub struct TesseractAdapter {
    command: String,
    language: String,
    page_segmentation_mode: u8,
}

impl TesseractAdapter {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            command: config.command.clone(),
            language: config.language.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
        }
    }

    /// Run tesseract and return the recognized text
    pub async fn extract_text(&self, image_path: &Path) -> Result<String> {
        let output = Command::new(&self.command)
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.language])
            .args(["--psm", &self.page_segmentation_mode.to_string()])
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run '{}'", self.command))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Candidate from raw OCR text, or `None` when nothing was recognized
pub fn candidate_from_text(text: &str) -> Option<Candidate> {
    if text.trim().is_empty() {
        return None;
    }

    let parsed = parse_cover_text(text);
    let candidate = Candidate::new("OCR", OCR_CONFIDENCE)
        .with_title(parsed.title)
        .with_author(parsed.author)
        .with_isbn(parsed.isbn)
        .with_publisher(parsed.publisher)
        .with_raw_text(text);

    Some(candidate)
}

#[async_trait]
impl SourceAdapter for TesseractAdapter {
    fn name(&self) -> &'static str {
        "OCR"
    }

    async fn query(&self, record: &BookRecord) -> Result<SourceOutcome> {
        if record.image_path.is_empty() {
            return Ok(SourceOutcome::NoEvidence);
        }

        let text = self.extract_text(Path::new(&record.image_path)).await?;
        debug!(image = %record.image_path, chars = text.len(), "OCR text extracted");

        Ok(SourceOutcome::from_candidates(
            candidate_from_text(&text).into_iter().collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(command: &str) -> TesseractAdapter {
        TesseractAdapter::new(&OcrConfig {
            command: command.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_candidate_from_text() {
        let candidate = candidate_from_text("EMMA\nby Jane Austen\nISBN 0141439587").unwrap();
        assert_eq!(candidate.source, "OCR");
        assert_eq!(candidate.raw_confidence, OCR_CONFIDENCE);
        assert_eq!(candidate.fields.title.as_deref(), Some("EMMA"));
        assert_eq!(candidate.fields.author.as_deref(), Some("Jane Austen"));
        assert_eq!(candidate.fields.isbn.as_deref(), Some("0141439587"));
        assert!(candidate.fields.raw_text.is_some());
    }

    #[test]
    fn test_blank_text_is_no_candidate() {
        assert!(candidate_from_text(" \n ").is_none());
    }

    #[tokio::test]
    async fn test_no_image_is_no_evidence() {
        let outcome = adapter("tesseract").query(&BookRecord::new("Emma", "")).await.unwrap();
        assert_eq!(outcome, SourceOutcome::NoEvidence);
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let record = BookRecord::from_image("/nonexistent/cover.jpg");
        let result = adapter("shelf-test-no-such-ocr-binary").query(&record).await;
        assert!(result.is_err());
    }
}
