//! Threshold rules over a [`MetricsSnapshot`]. Alerts are recomputed on every
//! call and never stored.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, MetricsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    SuccessRate,
    GlobalSuccessRate,
    ConversionFailureRate,
    QualityCoverage,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuccessRate => "success_rate",
            Self::GlobalSuccessRate => "global_success_rate",
            Self::ConversionFailureRate => "conversion_failure_rate",
            Self::QualityCoverage => "quality_coverage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub source_url: Option<String>,
    pub message: String,
    pub severity: AlertSeverity,
    /// Observed ratio that tripped the rule.
    pub value: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub min_source_attempts: u64,
    pub source_success_rate: f64,
    /// Below this a source alert is critical.
    pub source_critical_rate: f64,
    pub min_global_attempts: u64,
    pub global_success_rate: f64,
    pub min_conversions: u64,
    pub conversion_success_rate: f64,
    pub min_coverage_samples: u64,
    pub coverage_floor: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            min_source_attempts: 5,
            source_success_rate: 0.5,
            source_critical_rate: 0.2,
            min_global_attempts: 10,
            global_success_rate: 0.7,
            min_conversions: 10,
            conversion_success_rate: 0.8,
            min_coverage_samples: 10,
            coverage_floor: 0.5,
        }
    }
}

impl AlertThresholds {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }
}

pub fn evaluate_alerts(snapshot: &MetricsSnapshot, thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for source in &snapshot.sources {
        if source.attempts < thresholds.min_source_attempts || source.success_rate >= thresholds.source_success_rate {
            continue;
        }
        let severity = if source.success_rate < thresholds.source_critical_rate {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };
        alerts.push(Alert {
            alert_type: AlertType::SuccessRate,
            source_url: Some(source.source_url.clone()),
            message: format!(
                "extraction success rate for {} is {:.0}% over {} attempts (floor {:.0}%)",
                source.source_url,
                source.success_rate * 100.0,
                source.attempts,
                thresholds.source_success_rate * 100.0
            ),
            severity,
            value: source.success_rate,
            threshold: thresholds.source_success_rate,
        });
    }

    let extraction = &snapshot.extraction;
    if extraction.attempts >= thresholds.min_global_attempts
        && snapshot.extraction_success_rate < thresholds.global_success_rate
    {
        alerts.push(Alert {
            alert_type: AlertType::GlobalSuccessRate,
            source_url: None,
            message: format!(
                "overall extraction success rate is {:.0}% across {} sources",
                snapshot.extraction_success_rate * 100.0,
                snapshot.sources.len()
            ),
            severity: AlertSeverity::Warning,
            value: snapshot.extraction_success_rate,
            threshold: thresholds.global_success_rate,
        });
    }

    let conversion = &snapshot.conversion;
    if conversion.attempts >= thresholds.min_conversions
        && snapshot.conversion_success_rate < thresholds.conversion_success_rate
    {
        alerts.push(Alert {
            alert_type: AlertType::ConversionFailureRate,
            source_url: None,
            message: format!(
                "{} of {} conversions failed",
                conversion.failures, conversion.attempts
            ),
            severity: AlertSeverity::Warning,
            value: snapshot.conversion_success_rate,
            threshold: thresholds.conversion_success_rate,
        });
    }

    if conversion.successes >= thresholds.min_coverage_samples {
        for (label, ratio) in [("date", snapshot.coverage.date), ("location", snapshot.coverage.location)] {
            if ratio < thresholds.coverage_floor {
                alerts.push(Alert {
                    alert_type: AlertType::QualityCoverage,
                    source_url: None,
                    message: format!("only {:.0}% of converted activities have a {label}", ratio * 100.0),
                    severity: AlertSeverity::Warning,
                    value: ratio,
                    threshold: thresholds.coverage_floor,
                });
            }
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldCoverage, SourceMetric, Totals};

    fn snapshot_with(sources: Vec<SourceMetric>) -> MetricsSnapshot {
        MetricsSnapshot {
            sources,
            ..MetricsSnapshot::default()
        }
    }

    fn source(url: &str, attempts: u64, successes: u64) -> SourceMetric {
        SourceMetric {
            source_url: url.to_string(),
            attempts,
            successes,
            success_rate: successes as f64 / attempts as f64,
            ..SourceMetric::default()
        }
    }

    #[test]
    fn source_rule_respects_sample_size_and_severity() {
        let thresholds = AlertThresholds::default();
        let alerts = evaluate_alerts(
            &snapshot_with(vec![
                source("https://few.example", 4, 0),
                source("https://flaky.example", 10, 3),
                source("https://down.example", 6, 0),
                source("https://fine.example", 10, 5),
            ]),
            &thresholds,
        );
        let urls: Vec<_> = alerts.iter().filter_map(|a| a.source_url.as_deref()).collect();
        assert_eq!(urls, vec!["https://flaky.example", "https://down.example"]);
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
        assert_eq!(alerts[1].severity, AlertSeverity::Critical);
    }

    #[test]
    fn global_conversion_and_coverage_rules() {
        let snapshot = MetricsSnapshot {
            extraction: Totals {
                attempts: 20,
                successes: 10,
                ..Totals::default()
            },
            extraction_success_rate: 0.5,
            conversion: Totals {
                attempts: 20,
                successes: 12,
                ..Totals::default()
            },
            conversion_success_rate: 0.6,
            coverage: FieldCoverage {
                date: 0.25,
                location: 0.9,
                ..FieldCoverage::default()
            },
            ..MetricsSnapshot::default()
        };
        let kinds: Vec<_> = evaluate_alerts(&snapshot, &AlertThresholds::default())
            .into_iter()
            .map(|a| a.alert_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                AlertType::GlobalSuccessRate,
                AlertType::ConversionFailureRate,
                AlertType::QualityCoverage
            ]
        );
    }

    #[test]
    fn thresholds_load_from_yaml() {
        let thresholds = AlertThresholds::from_yaml_str("min_source_attempts: 3\ncoverage_floor: 0.3\n").unwrap();
        assert_eq!(thresholds.min_source_attempts, 3);
        assert_eq!(thresholds.coverage_floor, 0.3);
        assert_eq!(thresholds.source_success_rate, 0.5);
    }
}
