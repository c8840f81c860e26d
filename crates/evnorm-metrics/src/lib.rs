//! In-memory extraction/conversion counters, per-source rolling statistics and
//! the alert rules evaluated over them.

pub mod alerts;

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use evnorm_core::QualityMetrics;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use alerts::{evaluate_alerts, Alert, AlertSeverity, AlertThresholds, AlertType};

pub const CRATE_NAME: &str = "evnorm-metrics";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Totals {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

impl Totals {
    fn record(&mut self, success: bool) {
        self.attempts += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
    }

    pub fn success_rate(&self) -> f64 {
        ratio(self.successes, self.attempts)
    }
}

/// Rolling statistics for one source URL. Means are updated incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SourceMetric {
    pub source_url: String,
    pub attempts: u64,
    pub successes: u64,
    pub success_rate: f64,
    pub avg_activities_per_attempt: f64,
    pub avg_quality_score: f64,
    pub total_duration_ms: u64,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
}

impl SourceMetric {
    fn new(source_url: &str) -> Self {
        Self {
            source_url: source_url.to_string(),
            ..Self::default()
        }
    }

    fn record(&mut self, success: bool, activity_count: usize, duration: Duration, quality_score: f64, at: DateTime<Utc>) {
        self.attempts += 1;
        if success {
            self.successes += 1;
            self.last_success = Some(at);
        }
        self.last_attempt = Some(at);
        let n = self.attempts as f64;
        self.success_rate = self.successes as f64 / n;
        self.avg_activities_per_attempt += (activity_count as f64 - self.avg_activities_per_attempt) / n;
        self.avg_quality_score += (quality_score - self.avg_quality_score) / n;
        self.total_duration_ms += duration.as_millis() as u64;
    }
}

/// How many successful conversions produced each field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QualityCounters {
    pub with_title: u64,
    pub with_description: u64,
    pub with_date: u64,
    pub with_time: u64,
    pub with_location: u64,
    pub with_price: u64,
}

/// [`QualityCounters`] as fractions of successful conversions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct FieldCoverage {
    pub title: f64,
    pub description: f64,
    pub date: f64,
    pub time: f64,
    pub location: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricsSnapshot {
    pub window_started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub extraction: Totals,
    pub extraction_success_rate: f64,
    pub activities_extracted: u64,
    pub avg_extraction_ms: f64,
    pub conversion: Totals,
    pub conversion_success_rate: f64,
    pub quality: QualityCounters,
    pub coverage: FieldCoverage,
    pub avg_quality_score: f64,
    pub sources: Vec<SourceMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub metrics: MetricsSnapshot,
    pub alerts: Vec<Alert>,
}

#[derive(Debug)]
struct MetricsState {
    window_started_at: DateTime<Utc>,
    extraction: Totals,
    activities_extracted: u64,
    extraction_duration_ms: u64,
    conversion: Totals,
    quality: QualityCounters,
    quality_score_sum: f64,
    sources: BTreeMap<String, SourceMetric>,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            window_started_at: Utc::now(),
            extraction: Totals::default(),
            activities_extracted: 0,
            extraction_duration_ms: 0,
            conversion: Totals::default(),
            quality: QualityCounters::default(),
            quality_score_sum: 0.0,
            sources: BTreeMap::new(),
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let converted = self.conversion.successes;
        let share = |count: u64| ratio(count, converted);
        MetricsSnapshot {
            window_started_at: self.window_started_at,
            generated_at: Utc::now(),
            extraction: self.extraction,
            extraction_success_rate: self.extraction.success_rate(),
            activities_extracted: self.activities_extracted,
            avg_extraction_ms: if self.extraction.attempts == 0 {
                0.0
            } else {
                self.extraction_duration_ms as f64 / self.extraction.attempts as f64
            },
            conversion: self.conversion,
            conversion_success_rate: self.conversion.success_rate(),
            quality: self.quality,
            coverage: FieldCoverage {
                title: share(self.quality.with_title),
                description: share(self.quality.with_description),
                date: share(self.quality.with_date),
                time: share(self.quality.with_time),
                location: share(self.quality.with_location),
                price: share(self.quality.with_price),
            },
            avg_quality_score: if converted == 0 {
                0.0
            } else {
                self.quality_score_sum / converted as f64
            },
            sources: self.sources.values().cloned().collect(),
        }
    }
}

/// Shared counter store. Every update is a single write-locked critical section.
#[derive(Debug)]
pub struct MetricsAggregator {
    state: RwLock<MetricsState>,
    thresholds: AlertThresholds,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new(AlertThresholds::default())
    }
}

impl MetricsAggregator {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            state: RwLock::new(MetricsState::new()),
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    pub fn record_extraction_attempt(
        &self,
        source_url: &str,
        success: bool,
        activity_count: usize,
        duration: Duration,
        quality_score: f64,
    ) {
        let now = Utc::now();
        let mut state = self.state.write();
        state.extraction.record(success);
        state.activities_extracted += activity_count as u64;
        state.extraction_duration_ms += duration.as_millis() as u64;
        state
            .sources
            .entry(source_url.to_string())
            .or_insert_with(|| SourceMetric::new(source_url))
            .record(success, activity_count, duration, quality_score, now);
        debug!(source_url, success, activity_count, "extraction attempt recorded");
    }

    /// Quality counters only move for successful conversions.
    pub fn record_conversion_attempt(&self, success: bool, quality: &QualityMetrics) {
        let mut state = self.state.write();
        state.conversion.record(success);
        if !success {
            return;
        }
        let counters = &mut state.quality;
        for (present, counter) in [
            (quality.has_title, &mut counters.with_title),
            (quality.has_description, &mut counters.with_description),
            (quality.has_date, &mut counters.with_date),
            (quality.has_time, &mut counters.with_time),
            (quality.has_location, &mut counters.with_location),
            (quality.has_price, &mut counters.with_price),
        ] {
            if present {
                *counter += 1;
            }
        }
        state.quality_score_sum += quality.score;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state.read().snapshot()
    }

    pub fn check_alerts(&self) -> Vec<Alert> {
        evaluate_alerts(&self.snapshot(), &self.thresholds)
    }

    pub fn dashboard_snapshot(&self) -> DashboardSnapshot {
        let metrics = self.snapshot();
        let alerts = evaluate_alerts(&metrics, &self.thresholds);
        DashboardSnapshot { metrics, alerts }
    }

    pub fn source_metric(&self, source_url: &str) -> Option<SourceMetric> {
        self.state.read().sources.get(source_url).cloned()
    }

    /// Starts a fresh measurement window.
    pub fn reset(&self) {
        *self.state.write() = MetricsState::new();
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const SOURCE: &str = "https://parks.example.gov/calendar";

    fn full_quality() -> QualityMetrics {
        QualityMetrics {
            has_title: true,
            has_description: true,
            has_date: true,
            has_time: false,
            has_location: true,
            has_price: false,
            score: 70.0,
        }
    }

    #[test]
    fn extraction_attempts_update_source_metric() {
        let metrics = MetricsAggregator::default();
        metrics.record_extraction_attempt(SOURCE, true, 4, Duration::from_millis(120), 80.0);
        metrics.record_extraction_attempt(SOURCE, false, 0, Duration::from_millis(80), 0.0);

        let source = metrics.source_metric(SOURCE).unwrap();
        assert_eq!(source.attempts, 2);
        assert_eq!(source.successes, 1);
        assert_eq!(source.success_rate, 0.5);
        assert_eq!(source.avg_activities_per_attempt, 2.0);
        assert_eq!(source.avg_quality_score, 40.0);
        assert_eq!(source.total_duration_ms, 200);
        assert!(source.last_success.is_some());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.extraction.attempts, 2);
        assert_eq!(snapshot.extraction.failures, 1);
        assert_eq!(snapshot.activities_extracted, 4);
        assert_eq!(snapshot.avg_extraction_ms, 100.0);
    }

    #[test]
    fn six_failures_raise_a_source_alert() {
        let metrics = MetricsAggregator::default();
        for _ in 0..4 {
            metrics.record_extraction_attempt(SOURCE, false, 0, Duration::ZERO, 0.0);
        }
        assert!(metrics.check_alerts().is_empty());

        // Exactly the minimum sample size already qualifies.
        metrics.record_extraction_attempt(SOURCE, false, 0, Duration::ZERO, 0.0);
        assert_eq!(metrics.source_metric(SOURCE).unwrap().attempts, 5);
        assert_eq!(metrics.check_alerts().len(), 1);

        metrics.record_extraction_attempt(SOURCE, false, 0, Duration::ZERO, 0.0);
        let alerts = metrics.check_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::SuccessRate);
        assert_eq!(alerts[0].source_url.as_deref(), Some(SOURCE));
        assert!(alerts[0].message.contains(SOURCE));
    }

    #[test]
    fn conversion_attempts_accumulate_quality_counters() {
        let metrics = MetricsAggregator::default();
        metrics.record_conversion_attempt(true, &full_quality());
        metrics.record_conversion_attempt(true, &QualityMetrics::default());
        metrics.record_conversion_attempt(false, &full_quality());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.conversion.attempts, 3);
        assert_eq!(snapshot.conversion.successes, 2);
        assert_eq!(snapshot.quality.with_date, 1);
        assert_eq!(snapshot.quality.with_time, 0);
        assert_eq!(snapshot.coverage.location, 0.5);
        assert_eq!(snapshot.avg_quality_score, 35.0);
    }

    #[test]
    fn reset_clears_counters_and_sources() {
        let metrics = MetricsAggregator::default();
        metrics.record_extraction_attempt(SOURCE, true, 3, Duration::from_millis(10), 50.0);
        metrics.record_conversion_attempt(true, &full_quality());
        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.extraction, Totals::default());
        assert_eq!(snapshot.conversion, Totals::default());
        assert_eq!(snapshot.quality, QualityCounters::default());
        assert_eq!(snapshot.activities_extracted, 0);
        assert!(snapshot.sources.is_empty());
        assert!(metrics.dashboard_snapshot().alerts.is_empty());
    }

    #[test]
    fn concurrent_updates_are_not_torn() {
        let metrics = Arc::new(MetricsAggregator::default());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for i in 0..250 {
                        metrics.record_extraction_attempt(SOURCE, (worker + i) % 2 == 0, 2, Duration::ZERO, 50.0);
                        metrics.record_conversion_attempt(true, &full_quality());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let source = metrics.source_metric(SOURCE).unwrap();
        assert_eq!(source.attempts, 2000);
        assert_eq!(source.successes, 1000);
        assert_eq!(source.success_rate, 0.5);
        assert!((source.avg_activities_per_attempt - 2.0).abs() < 1e-9);
        assert_eq!(metrics.snapshot().conversion.successes, 2000);
    }
}
