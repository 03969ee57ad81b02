use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::capture::{encode_jpeg_base64, CapturedImage, ImageSource};
use crate::report::AnimalReport;
use crate::vision::VisionClient;

/// Stage of the capture overlay; governs what the presentation layer shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Preview,
    Processing,
    Completed,
}

/// Whether the report request has resolved yet, and with what.
///
/// An explicit tag instead of time-based guessing: the report view is shown
/// exactly when the outcome is `Ready`, regardless of how the cosmetic stage
/// delays line up with the network call.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Awaiting,
    Ready(Option<AnimalReport>),
}

/// The single active capture-to-report workflow instance.
///
/// Written only by the workflow, read by the presentation layer. Reset
/// replaces the whole value rather than mutating fields in place.
#[derive(Debug, Clone)]
pub struct ScanSession {
    state: ScanState,
    captured: Option<CapturedImage>,
    outcome: ScanOutcome,
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            state: ScanState::Idle,
            captured: None,
            outcome: ScanOutcome::Awaiting,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn captured(&self) -> Option<&CapturedImage> {
        self.captured.as_ref()
    }

    pub fn outcome(&self) -> &ScanOutcome {
        &self.outcome
    }

    /// The resolved report, if the request succeeded with parseable data.
    pub fn report(&self) -> Option<&AnimalReport> {
        match &self.outcome {
            ScanOutcome::Ready(Some(report)) => Some(report),
            _ => None,
        }
    }

    /// True once the request has resolved, successfully or not.
    pub fn report_ready(&self) -> bool {
        matches!(self.outcome, ScanOutcome::Ready(_))
    }

    /// Capture is only permitted while idle; one capture per session.
    pub fn capture_enabled(&self) -> bool {
        self.state == ScanState::Idle
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Durations of the cosmetic preview and processing stages. The delays gate
/// no work; they only pace the overlay sequence.
#[derive(Debug, Clone, Copy)]
pub struct StageTimings {
    pub preview: Duration,
    pub processing: Duration,
}

impl Default for StageTimings {
    fn default() -> Self {
        Self {
            preview: Duration::from_millis(5000),
            processing: Duration::from_millis(2000),
        }
    }
}

impl StageTimings {
    /// Zero-length stages, for non-interactive runs and tests.
    pub fn immediate() -> Self {
        Self {
            preview: Duration::ZERO,
            processing: Duration::ZERO,
        }
    }
}

/// Errors surfaced by workflow operations. Request and encoding failures are
/// deliberately not here: those resolve the session to an empty report and
/// are only visible in logs.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("a capture is already in progress")]
    CaptureInFlight,
    #[error("no captured image to process")]
    NothingCaptured,
    #[error(transparent)]
    Capture(#[from] anyhow::Error),
}

/// Drives one session through `Idle → Preview → Processing → Completed`.
pub struct ScanWorkflow<S: ImageSource> {
    source: Arc<S>,
    client: Arc<dyn VisionClient>,
    timings: StageTimings,
    session: ScanSession,
}

impl<S: ImageSource> ScanWorkflow<S> {
    pub fn new(source: Arc<S>, client: Arc<dyn VisionClient>) -> Self {
        Self {
            source,
            client,
            timings: StageTimings::default(),
            session: ScanSession::new(),
        }
    }

    pub fn with_timings(mut self, timings: StageTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    /// Acquire an image and enter `Preview`. Only legal while idle; a second
    /// trigger while a scan is in flight is a typed error, matching the
    /// disabled capture control.
    pub async fn capture(&mut self) -> Result<(), ScanError> {
        if !self.session.capture_enabled() {
            return Err(ScanError::CaptureInFlight);
        }
        match self.source.capture().await {
            Ok(image) => {
                info!(uri = %image.uri().display(), "image captured; entering preview");
                self.session.captured = Some(image);
                self.session.state = ScanState::Preview;
                Ok(())
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "capture failed; session stays idle");
                Err(ScanError::Capture(err))
            }
        }
    }

    /// Advance through the timed stages, then encode the capture and request
    /// the report exactly once. The session ends in `Completed` with a
    /// `Ready` outcome either way; request failures are logged, not raised.
    #[instrument(name = "scan_session", skip(self))]
    pub async fn run_to_completion(&mut self) -> Result<&ScanSession, ScanError> {
        if self.session.state != ScanState::Preview {
            return Err(ScanError::NothingCaptured);
        }
        let image = self
            .session
            .captured
            .clone()
            .ok_or(ScanError::NothingCaptured)?;

        tokio::time::sleep(self.timings.preview).await;
        self.session.state = ScanState::Processing;
        info!("entering processing");

        tokio::time::sleep(self.timings.processing).await;
        self.session.state = ScanState::Completed;
        info!("entering completed; dispatching report request");

        self.session.outcome = ScanOutcome::Awaiting;
        let report = self.resolve_report(&image).await;
        self.session.outcome = ScanOutcome::Ready(report);
        Ok(&self.session)
    }

    async fn resolve_report(&self, image: &CapturedImage) -> Option<AnimalReport> {
        let encoded = match encode_jpeg_base64(image).await {
            Ok(data) => data,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "image encoding failed; report unavailable");
                return None;
            }
        };
        match self.client.describe(&encoded).await {
            Ok(report) => {
                debug!("vision report received");
                Some(report)
            }
            Err(err) => {
                warn!(error = %err, "vision request failed; report unavailable");
                None
            }
        }
    }

    /// Dismiss the shown report: fresh idle session, capture re-enabled,
    /// captured image and report both dropped.
    pub fn dismiss(&mut self) {
        self.session = ScanSession::new();
        info!("report dismissed; session reset");
    }
}
