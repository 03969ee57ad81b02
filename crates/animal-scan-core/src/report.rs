use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

/// Structured result of one completed scan.
///
/// Every field is optional: the remote model may return a partial object, and
/// a failed request flows through the presentation layer as a default report.
/// A report is replaced wholesale on each scan completion, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimalReport {
    pub name: Option<String>,
    pub category: Option<String>,
    pub vitality_score: Option<f64>,
    pub status: Option<HealthStatus>,
    pub indicators: Option<Indicators>,
    pub nutrition: Option<Nutrition>,
    #[serde(default)]
    pub remarks: Vec<String>,
}

/// Overall health classification reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    /// Any status string outside the documented vocabulary.
    Unknown,
}

// Lenient by hand: an off-vocabulary status string degrades to `Unknown`
// instead of failing the whole report parse.
impl<'de> Deserialize<'de> for HealthStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "Healthy" => Self::Healthy,
            "Unhealthy" => Self::Unhealthy,
            _ => Self::Unknown,
        })
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Healthy => "Healthy",
            Self::Unhealthy => "Unhealthy",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Qualitative health signals observed in the image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    pub coat_condition: Option<String>,
    pub eyes: Option<String>,
    pub activity_level: Option<String>,
}

/// Per-100g nutrition estimates, each pre-formatted by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: Option<String>,
    pub protein: Option<String>,
    pub fat: Option<String>,
    pub iron: Option<String>,
    pub water: Option<String>,
}

/// Format styles supported in default reporter implementations.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Human,
    Json,
}

const MISSING: &str = "unspecified";

/// Produce a report string from an `AnimalReport` using the desired format.
///
/// The human rendering is a pure projection: absent fields fall back to a
/// fixed placeholder so a sparse report and a failed scan look the same.
pub fn render_report(report: &AnimalReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(report),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

fn render_human(report: &AnimalReport) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "Scan Report")?;
    writeln!(out)?;
    writeln!(out, "Name: {}", text_or_missing(&report.name))?;
    writeln!(out, "Category: {}", text_or_missing(&report.category))?;
    writeln!(out)?;

    writeln!(out, "Health Analysis")?;
    match report.vitality_score {
        Some(score) => writeln!(out, "  Vitality Score: {score:.1}")?,
        None => writeln!(out, "  Vitality Score: {MISSING}")?,
    }
    match report.status {
        Some(status) => writeln!(out, "  Status: {status}")?,
        None => writeln!(out, "  Status: {MISSING}")?,
    }
    let indicators = report.indicators.clone().unwrap_or_default();
    writeln!(out, "  Indicators:")?;
    writeln!(
        out,
        "    Coat Condition: {}",
        text_or_missing(&indicators.coat_condition)
    )?;
    writeln!(out, "    Eyes: {}", text_or_missing(&indicators.eyes))?;
    writeln!(
        out,
        "    Activity Level: {}",
        text_or_missing(&indicators.activity_level)
    )?;
    writeln!(out)?;

    let nutrition = report.nutrition.clone().unwrap_or_default();
    writeln!(out, "Nutrition (Per 100g meat)")?;
    writeln!(out, "  Calories: {}", text_or_missing(&nutrition.calories))?;
    writeln!(out, "  Protein: {}", text_or_missing(&nutrition.protein))?;
    writeln!(out, "  Fat: {}", text_or_missing(&nutrition.fat))?;
    writeln!(out, "  Iron: {}", text_or_missing(&nutrition.iron))?;
    writeln!(out, "  Water: {}", text_or_missing(&nutrition.water))?;
    writeln!(out)?;

    writeln!(out, "Remarks")?;
    if report.remarks.is_empty() {
        writeln!(out, "  No remarks.")?;
    } else {
        for remark in &report.remarks {
            writeln!(out, "  - {remark}")?;
        }
    }

    Ok(out)
}

fn text_or_missing(value: &Option<String>) -> &str {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(MISSING)
}
