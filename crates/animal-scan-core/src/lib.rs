pub mod capture;
pub mod report;
pub mod session;
pub mod vision;

pub use capture::{encode_jpeg_base64, CapturedImage, FileImageSource, ImageSource};
pub use report::{
    render_report, AnimalReport, HealthStatus, Indicators, Nutrition, OutputFormat,
};
pub use session::{
    ScanError, ScanOutcome, ScanSession, ScanState, ScanWorkflow, StageTimings,
};
pub use vision::{
    client_from_settings, GeminiVisionClient, NoopVisionClient, VisionClient, VisionError,
    VisionOverrides, VisionSettings,
};
