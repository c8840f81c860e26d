//! Last-operation traces for extraction and conversion.
//!
//! The recorder keeps exactly one slot per operation kind. Each slot is
//! replaced wholesale under its own write lock, so readers never observe a
//! half-written trace.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use evnorm_core::{truncate_chars, ConversionIssue, ExtractionAttempt, FieldMapping, ValidationResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-event slice of a conversion trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTrace {
    pub index: usize,
    pub title: Option<String>,
    pub confidence_score: f64,
    pub field_mappings: BTreeMap<String, FieldMapping>,
    pub validation_results: BTreeMap<String, ValidationResult>,
    pub issues: Vec<ConversionIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionDiagnostics {
    pub conversion_id: Uuid,
    /// SHA-256 of the compact JSON input.
    pub input_hash: String,
    pub source_url: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub event_count: usize,
    /// Mean score over converted events, 0 when nothing converted.
    pub confidence_score: f64,
    pub events: Vec<EventTrace>,
    pub raw_sample: String,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionDiagnostics {
    pub source_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub attempts: Vec<ExtractionAttempt>,
    pub raw_sample: Option<String>,
    pub issues: Vec<String>,
    pub success: bool,
}

/// Builder for an [`ExtractionDiagnostics`], timed from `start`.
#[derive(Debug)]
pub struct ExtractionTrace {
    source_url: String,
    started_at: DateTime<Utc>,
    clock: Instant,
    attempts: Vec<ExtractionAttempt>,
    raw_sample: Option<String>,
    issues: Vec<String>,
}

impl ExtractionTrace {
    pub fn start(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            started_at: Utc::now(),
            clock: Instant::now(),
            attempts: Vec::new(),
            raw_sample: None,
            issues: Vec::new(),
        }
    }

    pub fn attempt(&mut self, attempt: ExtractionAttempt) -> &mut Self {
        self.issues.extend(attempt.issues.iter().cloned());
        self.attempts.push(attempt);
        self
    }

    pub fn issue(&mut self, issue: impl Into<String>) -> &mut Self {
        self.issues.push(issue.into());
        self
    }

    pub fn raw_sample(&mut self, raw: &str, max_chars: usize) -> &mut Self {
        self.raw_sample = Some(truncate_chars(raw, max_chars));
        self
    }

    /// Succeeds when any attempt succeeded.
    pub fn finish(self) -> ExtractionDiagnostics {
        let success = self.attempts.iter().any(|a| a.success);
        ExtractionDiagnostics {
            source_url: self.source_url,
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration_ms: self.clock.elapsed().as_millis() as u64,
            attempts: self.attempts,
            raw_sample: self.raw_sample,
            issues: self.issues,
            success,
        }
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticsRecorder {
    last_conversion: RwLock<Option<ConversionDiagnostics>>,
    last_extraction: RwLock<Option<ExtractionDiagnostics>>,
}

impl DiagnosticsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_conversion(&self, diagnostics: ConversionDiagnostics) {
        *self.last_conversion.write() = Some(diagnostics);
    }

    pub fn record_extraction(&self, diagnostics: ExtractionDiagnostics) {
        *self.last_extraction.write() = Some(diagnostics);
    }

    pub fn last_conversion(&self) -> Option<ConversionDiagnostics> {
        self.last_conversion.read().clone()
    }

    pub fn last_extraction(&self) -> Option<ExtractionDiagnostics> {
        self.last_extraction.read().clone()
    }

    pub fn clear(&self) {
        *self.last_conversion.write() = None;
        *self.last_extraction.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attempt(method: &str, success: bool, count: usize) -> ExtractionAttempt {
        ExtractionAttempt {
            method: method.to_string(),
            timestamp: Utc::now(),
            success,
            activity_count: count,
            details: json!({"selector": ".event"}),
            issues: if success { vec![] } else { vec![format!("{method} found nothing")] },
        }
    }

    #[test]
    fn extraction_trace_collects_attempts_and_issues() {
        let mut trace = ExtractionTrace::start("https://example.org/calendar");
        trace
            .attempt(attempt("json_ld", false, 0))
            .attempt(attempt("css_selectors", true, 4))
            .issue("pagination not followed")
            .raw_sample("<html><body>calendar</body></html>", 10);
        let diagnostics = trace.finish();

        assert!(diagnostics.success);
        assert_eq!(diagnostics.attempts.len(), 2);
        assert_eq!(
            diagnostics.issues,
            vec!["json_ld found nothing".to_string(), "pagination not followed".to_string()]
        );
        assert_eq!(diagnostics.raw_sample.as_deref(), Some("<html><bod…"));
        assert!(diagnostics.finished_at >= diagnostics.started_at);
    }

    #[test]
    fn extraction_without_successful_attempt_fails() {
        let mut trace = ExtractionTrace::start("https://example.org/calendar");
        trace.attempt(attempt("json_ld", false, 0));
        assert!(!trace.finish().success);
    }

    #[test]
    fn recorder_keeps_only_the_latest_trace() {
        let recorder = DiagnosticsRecorder::new();
        assert!(recorder.last_extraction().is_none());

        recorder.record_extraction(ExtractionTrace::start("https://a.example").finish());
        recorder.record_extraction(ExtractionTrace::start("https://b.example").finish());
        assert_eq!(recorder.last_extraction().unwrap().source_url, "https://b.example");

        recorder.clear();
        assert!(recorder.last_extraction().is_none());
        assert!(recorder.last_conversion().is_none());
    }
}
