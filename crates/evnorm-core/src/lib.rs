//! Core domain model for evnorm: raw records, the canonical activity schema and
//! the mapping/validation provenance types shared by every other crate.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const CRATE_NAME: &str = "evnorm-core";

/// Namespace for deterministic activity ids.
pub const ACTIVITY_NAMESPACE: Uuid = Uuid::from_u128(0x6a1c_4f0e_93b2_4d7a_8e55_0c2f_d1b4_7e90);

/// Unnormalized, source-specific record handed over by an extraction process.
///
/// The wrapped value is never mutated by conversion. All accessors are lenient:
/// a missing key or a value of the wrong type reads as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RawRecord(JsonValue);

impl RawRecord {
    pub fn new(value: JsonValue) -> Self {
        Self(value)
    }

    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text).map(Self)
    }

    pub fn as_value(&self) -> &JsonValue {
        &self.0
    }

    /// Looks up a dotted path (`location.name`) through nested maps.
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        value_at(&self.0, path)
    }

    /// Text at `path`, see [`value_text`].
    pub fn text(&self, path: &str) -> Option<String> {
        self.get(path).and_then(value_text)
    }

    /// Top-level keys in document order. Empty when the record is not a map.
    pub fn keys(&self) -> Vec<&str> {
        match &self.0 {
            JsonValue::Object(map) => map.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// SHA-256 of the compact JSON rendering, used as the input identity in diagnostics.
    pub fn content_hash(&self) -> String {
        let bytes = serde_json::to_vec(&self.0).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }

    /// Compact JSON cut to at most `max_chars` characters.
    pub fn sample(&self, max_chars: usize) -> String {
        truncate_chars(&self.0.to_string(), max_chars)
    }
}

impl From<JsonValue> for RawRecord {
    fn from(value: JsonValue) -> Self {
        Self(value)
    }
}

pub fn value_at<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut cur = value;
    for segment in path.split('.') {
        cur = cur.as_object()?.get(segment)?;
    }
    Some(cur)
}

/// Renders scalar text: trimmed non-empty strings, numbers, or the first
/// non-empty string of a sequence. Maps, bools and nulls are absent.
pub fn value_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => text_or_none(s),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Array(items) => items.iter().find_map(|item| match item {
            JsonValue::String(s) => text_or_none(s),
            _ => None,
        }),
        _ => None,
    }
}

pub fn text_or_none(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Class,
    Camp,
    Workshop,
    Performance,
    Event,
    Other,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Camp => "camp",
            Self::Workshop => "workshop",
            Self::Performance => "performance",
            Self::Event => "event",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Arts,
    Music,
    Sports,
    Education,
    Science,
    Nature,
    Community,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arts => "arts",
            Self::Music => "music",
            Self::Sports => "sports",
            Self::Education => "education",
            Self::Science => "science",
            Self::Nature => "nature",
            Self::Community => "community",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    Free,
    Paid,
    Varies,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schedule {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub recurrence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Location {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.address.is_none() && self.city.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Pricing {
    pub price_type: PriceType,
    pub cost: Option<f64>,
    pub raw_text: Option<String>,
}

impl Pricing {
    pub fn is_known(&self) -> bool {
        self.price_type != PriceType::Unknown || self.cost.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Registration {
    pub required: bool,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_url: Option<String>,
    pub domain: Option<String>,
    pub extracted_at: Option<DateTime<Utc>>,
    pub converted_at: DateTime<Utc>,
}

/// Canonical activity produced by one successful conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub activity_type: Option<ActivityType>,
    pub category: Option<Category>,
    pub schedule: Schedule,
    pub location: Location,
    pub pricing: Pricing,
    pub age_groups: Vec<String>,
    pub registration: Registration,
    pub provenance: Provenance,
}

impl Activity {
    /// Deterministic id over the attributes that identify an activity at its source.
    pub fn derive_id(source_url: Option<&str>, title: &str, start_date: Option<NaiveDate>) -> Uuid {
        let key = format!(
            "{}|{}|{}",
            source_url.unwrap_or("<unknown-source>"),
            title.trim().to_ascii_lowercase(),
            start_date.map(|d| d.to_string()).unwrap_or_default()
        );
        Uuid::new_v5(&ACTIVITY_NAMESPACE, key.as_bytes())
    }

    pub fn quality_metrics(&self, weights: &QualityWeights) -> QualityMetrics {
        let mut metrics = QualityMetrics {
            has_title: !self.title.trim().is_empty(),
            has_description: self.description.is_some(),
            has_date: self.schedule.start_date.is_some(),
            has_time: self.schedule.start_time.is_some(),
            has_location: !self.location.is_empty(),
            has_price: self.pricing.is_known(),
            score: 0.0,
        };
        metrics.score = weights.score(&metrics);
        metrics
    }
}

/// Per-activity completeness flags plus the weighted quality score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct QualityMetrics {
    pub has_title: bool,
    pub has_description: bool,
    pub has_date: bool,
    pub has_time: bool,
    pub has_location: bool,
    pub has_price: bool,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub title: f64,
    pub description: f64,
    pub date: f64,
    pub time: f64,
    pub location: f64,
    pub price: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            title: 20.0,
            description: 15.0,
            date: 20.0,
            time: 15.0,
            location: 15.0,
            price: 15.0,
        }
    }
}

impl QualityWeights {
    pub fn max_score(&self) -> f64 {
        self.title + self.description + self.date + self.time + self.location + self.price
    }

    pub fn score(&self, metrics: &QualityMetrics) -> f64 {
        [
            (metrics.has_title, self.title),
            (metrics.has_description, self.description),
            (metrics.has_date, self.date),
            (metrics.has_time, self.time),
            (metrics.has_location, self.location),
            (metrics.has_price, self.price),
        ]
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, weight)| weight)
        .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStrategy {
    Direct,
    Fallback,
    Inferred,
}

impl MappingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Fallback => "fallback",
            Self::Inferred => "inferred",
        }
    }
}

/// Provenance of one canonical field: which raw key fed it and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub target_field: String,
    pub source_field: String,
    pub strategy: MappingStrategy,
    pub confidence: f64,
}

/// Verdict of one field validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub confidence: f64,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_value: Option<String>,
}

impl ValidationResult {
    pub fn valid(confidence: f64) -> Self {
        Self {
            is_valid: true,
            confidence: clamp_unit(confidence),
            issues: Vec::new(),
            suggestions: Vec::new(),
            normalized_value: None,
        }
    }

    pub fn invalid(issue: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            confidence: 0.0,
            issues: vec![issue.into()],
            suggestions: Vec::new(),
            normalized_value: None,
        }
    }

    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.issues.push(issue.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_normalized(mut self, value: impl Into<String>) -> Self {
        self.normalized_value = Some(value.into());
        self
    }
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

/// One problem found while converting a record. Never raised as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionIssue {
    pub field: String,
    pub severity: Severity,
    pub message: String,
    pub suggestion: Option<String>,
}

impl fmt::Display for ConversionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity.as_str(), self.field, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (suggestion: {suggestion})")?;
        }
        Ok(())
    }
}

/// One extraction try against one source, as reported by the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub activity_count: usize,
    #[serde(default)]
    pub details: JsonValue,
    #[serde(default)]
    pub issues: Vec<String>,
}
