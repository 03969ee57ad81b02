use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// Environment-driven configuration required for vision providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionSettings {
    pub provider: String,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Values layered over the environment, e.g. from a config file or CLI flags.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisionOverrides {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl VisionSettings {
    const PROVIDER_ENV: &'static str = "ANIMAL_SCAN_PROVIDER";
    const API_KEY_ENV: &'static str = "ANIMAL_SCAN_API_KEY";
    const ENDPOINT_ENV: &'static str = "ANIMAL_SCAN_ENDPOINT";
    const MODEL_ENV: &'static str = "ANIMAL_SCAN_MODEL";
    const TIMEOUT_ENV: &'static str = "ANIMAL_SCAN_TIMEOUT_SECS";

    /// Load settings from environment variables.
    ///
    /// * `ANIMAL_SCAN_PROVIDER` — Provider identifier (default: `gemini`).
    /// * `ANIMAL_SCAN_API_KEY`  — API key/token (required unless `noop`).
    /// * `ANIMAL_SCAN_ENDPOINT` — Optional custom endpoint/base URL.
    /// * `ANIMAL_SCAN_MODEL`    — Optional model name override.
    /// * `ANIMAL_SCAN_TIMEOUT_SECS` — Optional request timeout; absent means
    ///   no timeout is enforced on the inference call.
    pub fn from_env() -> Result<Self> {
        Self::from_map(std::env::vars().collect(), VisionOverrides::default())
    }

    /// Load settings from the environment with explicit overrides layered on top.
    pub fn from_env_with(overrides: VisionOverrides) -> Result<Self> {
        Self::from_map(std::env::vars().collect(), overrides)
    }

    fn from_map(vars: HashMap<String, String>, overrides: VisionOverrides) -> Result<Self> {
        let provider = overrides
            .provider
            .or_else(|| vars.get(Self::PROVIDER_ENV).cloned())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "gemini".to_string())
            .trim()
            .to_string();
        let provider_lower = provider.to_lowercase();
        let api_key = overrides
            .api_key
            .or_else(|| vars.get(Self::API_KEY_ENV).cloned())
            .filter(|v| !v.trim().is_empty());
        let api_key = match provider_lower.as_str() {
            "noop" => api_key.unwrap_or_default(),
            _ => api_key.with_context(|| {
                format!(
                    "environment variable {} must be set for provider `{provider}`",
                    Self::API_KEY_ENV
                )
            })?,
        };
        let endpoint = overrides
            .endpoint
            .or_else(|| vars.get(Self::ENDPOINT_ENV).cloned())
            .filter(|v| !v.trim().is_empty());
        let model = overrides
            .model
            .or_else(|| vars.get(Self::MODEL_ENV).cloned())
            .filter(|v| !v.trim().is_empty());
        let timeout_secs = overrides.timeout_secs.or_else(|| {
            vars.get(Self::TIMEOUT_ENV)
                .and_then(|v| v.trim().parse::<u64>().ok())
        });

        Ok(Self {
            provider,
            api_key,
            endpoint,
            model,
            timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_to_gemini_provider() {
        let settings = VisionSettings::from_map(
            vars(&[(VisionSettings::API_KEY_ENV, "secret")]),
            VisionOverrides::default(),
        )
        .expect("should load settings");
        assert_eq!(settings.provider, "gemini");
        assert_eq!(settings.api_key, "secret");
        assert!(settings.endpoint.is_none());
        assert!(settings.model.is_none());
        assert!(settings.timeout_secs.is_none());
    }

    #[test]
    fn errors_when_api_key_missing() {
        let err = VisionSettings::from_map(HashMap::new(), VisionOverrides::default())
            .expect_err("missing API key should error");
        assert!(err.to_string().contains(VisionSettings::API_KEY_ENV));
    }

    #[test]
    fn noop_provider_allows_missing_key() {
        let settings = VisionSettings::from_map(
            vars(&[(VisionSettings::PROVIDER_ENV, "noop")]),
            VisionOverrides::default(),
        )
        .expect("noop should not require key");
        assert_eq!(settings.provider, "noop");
        assert!(settings.api_key.is_empty());
    }

    #[test]
    fn parses_timeout_and_model() {
        let settings = VisionSettings::from_map(
            vars(&[
                (VisionSettings::API_KEY_ENV, "secret"),
                (VisionSettings::MODEL_ENV, "gemini-test"),
                (VisionSettings::TIMEOUT_ENV, "45"),
            ]),
            VisionOverrides::default(),
        )
        .expect("should parse timeout");
        assert_eq!(settings.model.as_deref(), Some("gemini-test"));
        assert_eq!(settings.timeout_secs, Some(45));
    }

    #[test]
    fn overrides_take_precedence_over_environment() {
        let settings = VisionSettings::from_map(
            vars(&[
                (VisionSettings::PROVIDER_ENV, "gemini"),
                (VisionSettings::API_KEY_ENV, "env-key"),
                (VisionSettings::MODEL_ENV, "env-model"),
            ]),
            VisionOverrides {
                model: Some("file-model".into()),
                api_key: Some("file-key".into()),
                ..VisionOverrides::default()
            },
        )
        .expect("should load settings");
        assert_eq!(settings.model.as_deref(), Some("file-model"));
        assert_eq!(settings.api_key, "file-key");
    }

    #[test]
    fn override_provider_noop_relaxes_key_requirement() {
        let settings = VisionSettings::from_map(
            HashMap::new(),
            VisionOverrides {
                provider: Some("noop".into()),
                ..VisionOverrides::default()
            },
        )
        .expect("noop override should not require key");
        assert_eq!(settings.provider, "noop");
    }
}
