mod settings;

pub mod gemini;
pub mod sanitize;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use thiserror::Error;

use crate::report::AnimalReport;

pub use gemini::GeminiVisionClient;
pub use settings::{VisionOverrides, VisionSettings};

/// Failure taxonomy for one report request.
///
/// Every variant is logged by the workflow and degraded to an absent report
/// there; nothing in this module throws past the session boundary.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("failed to reach vision endpoint: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("vision endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("response envelope contained no candidate text")]
    MissingContent,
    #[error("candidate text was not valid report JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Client abstraction for turning one encoded image into a structured report.
#[async_trait]
pub trait VisionClient: Send + Sync {
    /// Request a report for a single base64-encoded JPEG image.
    async fn describe(&self, image_base64: &str) -> Result<AnimalReport, VisionError>;
}

/// Provider used when no vision credential is configured.
#[derive(Debug, Default, Clone)]
pub struct NoopVisionClient;

#[async_trait]
impl VisionClient for NoopVisionClient {
    async fn describe(&self, _image_base64: &str) -> Result<AnimalReport, VisionError> {
        Ok(AnimalReport {
            remarks: vec!["Vision provider not configured; returning empty report.".into()],
            ..AnimalReport::default()
        })
    }
}

/// Build the provider selected by settings.
pub fn client_from_settings(settings: &VisionSettings) -> Result<Arc<dyn VisionClient>> {
    match settings.provider.to_lowercase().as_str() {
        "gemini" => Ok(Arc::new(GeminiVisionClient::new(settings)?)),
        "noop" => Ok(Arc::new(NoopVisionClient)),
        other => bail!("unsupported vision provider `{other}`"),
    }
}
