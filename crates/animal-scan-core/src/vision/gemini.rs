use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::sanitize::strip_code_fences;
use super::{VisionClient, VisionError, VisionSettings};
use crate::report::AnimalReport;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Vision provider backed by the Gemini `generateContent` API.
#[derive(Debug, Clone)]
pub struct GeminiVisionClient {
    http: Client,
    url: String,
    api_key: String,
}

impl GeminiVisionClient {
    pub fn new(settings: &VisionSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            bail!("Gemini API key must be provided via ANIMAL_SCAN_API_KEY");
        }
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let model = settings
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            base.trim_end_matches('/'),
            model
        );
        let mut builder = Client::builder().user_agent("animal-scan/0.1");
        // No timeout unless configured; the request stays in flight however
        // long the endpoint takes.
        if let Some(secs) = settings.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl VisionClient for GeminiVisionClient {
    async fn describe(&self, image_base64: &str) -> Result<AnimalReport, VisionError> {
        let payload = GeminiRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::text(INSTRUCTION_PROMPT),
                    RequestPart::inline_jpeg(image_base64),
                ],
            }],
        };

        let response = self
            .http
            .post(&self.url)
            .query(&[("key", &self.api_key)])
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::Status { status, body });
        }

        let envelope: GeminiResponse = response.json().await?;
        let text = first_candidate_text(envelope).ok_or(VisionError::MissingContent)?;
        debug!(chars = text.len(), "candidate text received");
        parse_report_text(&text)
    }
}

/// Extract the first candidate text from the response envelope.
fn first_candidate_text(envelope: GeminiResponse) -> Option<String> {
    envelope
        .candidates
        .into_iter()
        .flat_map(|candidate| candidate.content.parts)
        .filter_map(|part| part.text)
        .next()
}

/// Normalize candidate text and parse it strictly into a report.
fn parse_report_text(text: &str) -> Result<AnimalReport, VisionError> {
    let normalized = strip_code_fences(text);
    Ok(serde_json::from_str(&normalized)?)
}

const INSTRUCTION_PROMPT: &str = r#"You are an animal scan assistant. Given an image of an animal, return structured data in JSON format with the following fields:

{
  "name": "string",
  "category": "string",
  "vitality_score": 9.5,
  "status": "Healthy | Unhealthy",
  "indicators": {
    "coat_condition": "string (max 4 words)",
    "eyes": "string (max 4 words)",
    "activity_level": "None | Minimal | Moderate | High"
  },
  "nutrition": {
    "calories": "string (e.g., '143 kcal')",
    "protein": "string (e.g., '27 g')",
    "fat": "string (e.g., '3 g')",
    "iron": "string (e.g., '3.7 mg')",
    "water": "string (e.g., '69%')"
  },
  "remarks": [
    "string",
    "string"
  ]
}

Important:
- vitality_score must be a number (not a string)
- Keep coat_condition and eyes descriptions short
- Respond ONLY with the JSON object, no extra words."#;

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<RequestContent>,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl RequestPart {
    fn text(value: impl Into<String>) -> Self {
        Self {
            text: Some(value.into()),
            inline_data: None,
        }
    }

    fn inline_jpeg(data: &str) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: "image/jpeg".into(),
                data: data.into(),
            }),
        }
    }
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiResponseContent,
}

#[derive(Deserialize, Default)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::HealthStatus;
    use httpmock::prelude::*;
    use serde_json::json;

    const SAMPLE_JSON: &str = r#"{"name":"Boer Goat","category":"Mammal","vitality_score":9.1,"status":"Healthy","indicators":{"coat_condition":"Clean","eyes":"Clear","activity_level":"Minimal"},"nutrition":{"calories":"143 kcal","protein":"27 g","fat":"3 g","iron":"3.7 mg","water":"69%"},"remarks":["Good condition."]}"#;

    fn base_settings(url: String) -> VisionSettings {
        VisionSettings {
            provider: "gemini".into(),
            api_key: "test-key".into(),
            endpoint: Some(url),
            model: Some("gemini-test".into()),
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let mut settings = base_settings("http://localhost".into());
        settings.api_key = "  ".into();
        let err = GeminiVisionClient::new(&settings).unwrap_err();
        assert!(err.to_string().contains("ANIMAL_SCAN_API_KEY"));
    }

    #[test]
    fn parse_accepts_bare_and_fenced_text_identically() {
        let bare = parse_report_text(SAMPLE_JSON).unwrap();
        let fenced = parse_report_text(&format!("```json\n{SAMPLE_JSON}\n```")).unwrap();
        assert_eq!(bare, fenced);
        assert_eq!(bare.name.as_deref(), Some("Boer Goat"));
        assert_eq!(bare.vitality_score, Some(9.1));
        assert_eq!(bare.status, Some(HealthStatus::Healthy));
    }

    #[test]
    fn parse_rejects_malformed_json() {
        let err = parse_report_text(r#"{"name": "Goat",}"#).unwrap_err();
        assert!(matches!(err, VisionError::Parse(_)));
        let err = parse_report_text("not json at all").unwrap_err();
        assert!(matches!(err, VisionError::Parse(_)));
    }

    #[test]
    fn missing_candidates_yield_no_text() {
        assert!(first_candidate_text(GeminiResponse { candidates: vec![] }).is_none());
        let envelope: GeminiResponse =
            serde_json::from_value(json!({"candidates": [{"content": {"parts": []}}]})).unwrap();
        assert!(first_candidate_text(envelope).is_none());
    }

    #[test]
    fn request_body_matches_wire_contract() {
        let payload = GeminiRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart::text("prompt"), RequestPart::inline_jpeg("QUJD")],
            }],
        };
        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "prompt");
        assert_eq!(
            body["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["data"], "QUJD");
        assert!(body["contents"][0]["parts"][0]
            .as_object()
            .unwrap()
            .get("inlineData")
            .is_none());
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn describe_parses_fenced_response() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-test:generateContent")
                .query_param("key", "test-key")
                .body_contains("\"mimeType\":\"image/jpeg\"");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "candidates": [
                        {
                            "content": {
                                "parts": [
                                    {"text": format!("```json\n{SAMPLE_JSON}\n```")}
                                ]
                            }
                        }
                    ]
                }));
        });

        let client = GeminiVisionClient::new(&base_settings(server.base_url())).unwrap();
        let report = client.describe("QUJD").await.unwrap();
        assert_eq!(report.name.as_deref(), Some("Boer Goat"));
        assert_eq!(report.remarks, vec!["Good condition.".to_string()]);
        mock.assert();
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn describe_reports_empty_candidate_list() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-test:generateContent");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"candidates": []}));
        });

        let client = GeminiVisionClient::new(&base_settings(server.base_url())).unwrap();
        let err = client.describe("QUJD").await.unwrap_err();
        assert!(matches!(err, VisionError::MissingContent));
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn describe_surfaces_http_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-test:generateContent");
            then.status(500).body("boom");
        });

        let client = GeminiVisionClient::new(&base_settings(server.base_url())).unwrap();
        let err = client.describe("QUJD").await.unwrap_err();
        match err {
            VisionError::Status { status, body } => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
