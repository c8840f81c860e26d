//! Batch conversion runs over an inbox of extraction envelopes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evnorm_convert::{ConversionEngine, DiagnosticsRecorder, EngineConfig, ExtractionTrace, MappingTable};
use evnorm_core::{ExtractionAttempt, QualityMetrics, RawRecord};
use evnorm_metrics::{Alert, AlertThresholds, MetricsAggregator};
use evnorm_storage::{ArtifactStore, BackoffPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::fs;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "evnorm-pipeline";

pub const ACTIVITIES_PREFIX: &str = "activities";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub inbox_dir: PathBuf,
    pub store_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub config_dir: PathBuf,
    pub backoff: BackoffPolicy,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let dir = |name: &str, default: &str| {
            std::env::var(name)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(default))
        };
        Self {
            inbox_dir: dir("EVNORM_INBOX_DIR", "./inbox"),
            store_dir: dir("EVNORM_STORE_DIR", "./store"),
            reports_dir: dir("EVNORM_REPORTS_DIR", "./reports"),
            config_dir: dir("EVNORM_CONFIG_DIR", "./config"),
            backoff: BackoffPolicy::default(),
        }
    }

    /// All directories under one root, as used by tests and local runs.
    pub fn rooted(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            inbox_dir: root.join("inbox"),
            store_dir: root.join("store"),
            reports_dir: root.join("reports"),
            config_dir: root.join("config"),
            backoff: BackoffPolicy::default(),
        }
    }

    fn config_file(&self, name: &str) -> Option<PathBuf> {
        let path = self.config_dir.join(name);
        path.is_file().then_some(path)
    }

    /// `engine.yaml` in the config dir, or defaults when absent.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        match self.config_file("engine.yaml") {
            Some(path) => EngineConfig::from_yaml_file(&path).with_context(|| format!("loading {}", path.display())),
            None => Ok(EngineConfig::default()),
        }
    }

    pub fn mapping_table(&self) -> Result<MappingTable> {
        match self.config_file("mapping.yaml") {
            Some(path) => MappingTable::from_yaml_file(&path).with_context(|| format!("loading {}", path.display())),
            None => Ok(MappingTable::default()),
        }
    }

    pub fn alert_thresholds(&self) -> Result<AlertThresholds> {
        match self.config_file("alerts.yaml") {
            Some(path) => AlertThresholds::from_yaml_file(&path).with_context(|| format!("loading {}", path.display())),
            None => Ok(AlertThresholds::default()),
        }
    }

    pub fn build_engine(&self, recorder: Arc<DiagnosticsRecorder>) -> Result<ConversionEngine> {
        Ok(ConversionEngine::new(self.engine_config()?, self.mapping_table()?, recorder))
    }

    pub fn build_metrics(&self) -> Result<MetricsAggregator> {
        Ok(MetricsAggregator::new(self.alert_thresholds()?))
    }
}

/// One extraction result as dropped into the inbox by an extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionEnvelope {
    pub source_url: String,
    #[serde(default = "default_method")]
    pub method: String,
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub details: JsonValue,
    #[serde(default)]
    pub payload: JsonValue,
}

fn default_method() -> String {
    "unknown".to_string()
}

fn default_success() -> bool {
    true
}

impl ExtractionEnvelope {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// The payload as a conversion record carrying this envelope's source and
    /// fetch time. Non-object payloads are wrapped under `events`.
    pub fn record_payload(&self) -> JsonValue {
        let mut map = match &self.payload {
            JsonValue::Object(map) => map.clone(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("events".to_string(), other.clone());
                map
            }
        };
        map.entry("source_url")
            .or_insert_with(|| JsonValue::String(self.source_url.clone()));
        map.entry("extracted_at")
            .or_insert_with(|| JsonValue::String(self.fetched_at.to_rfc3339()));
        JsonValue::Object(map)
    }

    fn attempt(&self, success: bool, activity_count: usize, extra_issues: Vec<String>) -> ExtractionAttempt {
        let mut issues = self.issues.clone();
        issues.extend(extra_issues);
        ExtractionAttempt {
            method: self.method.clone(),
            timestamp: self.fetched_at,
            success,
            activity_count,
            details: self.details.clone(),
            issues,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InboxItem {
    pub name: String,
    pub raw_text: String,
    pub envelope: ExtractionEnvelope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedFile {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct InboxBatch {
    pub items: Vec<InboxItem>,
    pub rejected: Vec<RejectedFile>,
}

#[async_trait]
pub trait EnvelopeSource: Send + Sync {
    fn name(&self) -> &str;

    async fn collect(&self) -> Result<InboxBatch>;
}

/// Reads every `*.json` file of a directory in name order.
#[derive(Debug, Clone)]
pub struct DirectoryInbox {
    dir: PathBuf,
}

impl DirectoryInbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl EnvelopeSource for DirectoryInbox {
    fn name(&self) -> &str {
        "directory"
    }

    async fn collect(&self) -> Result<InboxBatch> {
        let mut batch = InboxBatch::default();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(dir = %self.dir.display(), "inbox directory does not exist");
                return Ok(batch);
            }
            Err(err) => return Err(err).with_context(|| format!("reading {}", self.dir.display())),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.context("listing inbox")? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let raw_text = fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            match serde_json::from_str::<ExtractionEnvelope>(&raw_text) {
                Ok(envelope) => batch.items.push(InboxItem {
                    name,
                    raw_text,
                    envelope,
                }),
                Err(err) => {
                    warn!(file = %name, error = %err, "rejecting malformed envelope");
                    batch.rejected.push(RejectedFile {
                        name,
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(batch)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRunReport {
    pub file: String,
    pub source_url: String,
    pub extraction_success: bool,
    pub events_converted: usize,
    pub mean_confidence: f64,
    pub mean_quality: f64,
    pub error_issues: usize,
    pub warning_issues: usize,
    pub conversion_error: Option<String>,
    pub storage_failures: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub envelopes: usize,
    pub rejected_files: usize,
    pub events_converted: usize,
    pub activities_stored: usize,
    pub conversion_failures: usize,
    pub storage_failures: usize,
    pub alerts: usize,
    pub reports_dir: String,
}

pub struct ConversionPipeline {
    config: PipelineConfig,
    engine: Arc<ConversionEngine>,
    metrics: Arc<MetricsAggregator>,
    store: ArtifactStore,
    source: Box<dyn EnvelopeSource>,
}

impl ConversionPipeline {
    pub fn new(config: PipelineConfig, engine: Arc<ConversionEngine>, metrics: Arc<MetricsAggregator>) -> Self {
        let store = ArtifactStore::new(config.store_dir.clone());
        let source = Box::new(DirectoryInbox::new(config.inbox_dir.clone()));
        Self {
            config,
            engine,
            metrics,
            store,
            source,
        }
    }

    pub fn with_source(mut self, source: Box<dyn EnvelopeSource>) -> Self {
        self.source = source;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub async fn run_once(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("conversion_run", %run_id, source = self.source.name());
        self.run(run_id).instrument(span).await
    }

    async fn run(&self, run_id: Uuid) -> Result<RunSummary> {
        let started_at = Utc::now();
        let batch = self.source.collect().await?;
        info!(envelopes = batch.items.len(), rejected = batch.rejected.len(), "inbox collected");

        let mut reports = Vec::with_capacity(batch.items.len());
        let mut activities_stored = 0usize;
        let mut conversion_failures = 0usize;
        for item in &batch.items {
            let (report, stored) = self.process(item).await?;
            activities_stored += stored;
            if report.conversion_error.is_some() {
                conversion_failures += 1;
            }
            reports.push(report);
        }

        let alerts = self.metrics.check_alerts();
        for alert in &alerts {
            warn!(alert = alert.alert_type.as_str(), source_url = ?alert.source_url, "{}", alert.message);
        }

        let finished_at = Utc::now();
        let reports_dir = self.config.reports_dir.join(run_id.to_string());
        let summary = RunSummary {
            run_id,
            started_at,
            finished_at,
            envelopes: batch.items.len(),
            rejected_files: batch.rejected.len(),
            events_converted: reports.iter().map(|r| r.events_converted).sum(),
            activities_stored,
            conversion_failures,
            storage_failures: reports.iter().map(|r| r.storage_failures).sum(),
            alerts: alerts.len(),
            reports_dir: reports_dir.display().to_string(),
        };
        self.write_reports(&summary, &reports, &batch.rejected, &alerts).await?;
        info!(
            events = summary.events_converted,
            stored = summary.activities_stored,
            failures = summary.conversion_failures,
            "conversion run finished"
        );
        Ok(summary)
    }

    /// Converts one envelope, stores its activities and feeds both metric
    /// streams. Returns the per-source report and the number of stored activities.
    async fn process(&self, item: &InboxItem) -> Result<(SourceRunReport, usize)> {
        let envelope = &item.envelope;
        let mut trace = ExtractionTrace::start(&envelope.source_url);
        trace.raw_sample(&item.raw_text, self.engine.config().raw_sample_chars);
        let mut report = SourceRunReport {
            file: item.name.clone(),
            source_url: envelope.source_url.clone(),
            extraction_success: envelope.success,
            events_converted: 0,
            mean_confidence: 0.0,
            mean_quality: 0.0,
            error_issues: 0,
            warning_issues: 0,
            conversion_error: None,
            storage_failures: 0,
        };

        if !envelope.success {
            trace.attempt(envelope.attempt(false, 0, Vec::new()));
            self.engine.recorder().record_extraction(trace.finish());
            self.metrics
                .record_extraction_attempt(&envelope.source_url, false, 0, envelope.duration(), 0.0);
            return Ok((report, 0));
        }

        let record = RawRecord::new(envelope.record_payload());

        let results = match self.engine.convert_all(&record) {
            Ok(results) => results,
            Err(err) => {
                warn!(file = %item.name, error = %err, "envelope has no convertible events");
                self.metrics.record_conversion_attempt(false, &QualityMetrics::default());
                trace.attempt(envelope.attempt(false, 0, vec![err.to_string()]));
                self.engine.recorder().record_extraction(trace.finish());
                self.metrics
                    .record_extraction_attempt(&envelope.source_url, false, 0, envelope.duration(), 0.0);
                report.extraction_success = false;
                report.conversion_error = Some(err.to_string());
                return Ok((report, 0));
            }
        };

        let mut stored = 0usize;
        for result in &results {
            self.metrics.record_conversion_attempt(true, &result.quality);
            let key = result.activity.id.to_string();
            match self
                .store
                .put_json_with_retry(ACTIVITIES_PREFIX, &key, &result.activity, &self.config.backoff)
                .await
            {
                Ok(_) => stored += 1,
                Err(err) => {
                    warn!(file = %item.name, activity = %key, error = %err, "failed to store activity");
                    trace.issue(format!("storing activity {key} failed: {err}"));
                    report.storage_failures += 1;
                }
            }
            for issue in &result.issue_details {
                match issue.severity {
                    evnorm_core::Severity::Error => report.error_issues += 1,
                    evnorm_core::Severity::Warning => report.warning_issues += 1,
                }
            }
        }

        let count = results.len();
        report.events_converted = count;
        report.mean_confidence = mean(results.iter().map(|r| r.confidence_score));
        report.mean_quality = mean(results.iter().map(|r| r.quality.score));

        trace.attempt(envelope.attempt(count > 0, count, Vec::new()));
        self.engine.recorder().record_extraction(trace.finish());
        self.metrics.record_extraction_attempt(
            &envelope.source_url,
            count > 0,
            count,
            envelope.duration(),
            report.mean_quality,
        );
        Ok((report, stored))
    }

    async fn write_reports(
        &self,
        summary: &RunSummary,
        sources: &[SourceRunReport],
        rejected: &[RejectedFile],
        alerts: &[Alert],
    ) -> Result<()> {
        let reports = ArtifactStore::new(self.config.reports_dir.clone());
        let run_dir = PathBuf::from(summary.run_id.to_string());

        let report_json = serde_json::to_vec_pretty(&serde_json::json!({
            "summary": summary,
            "sources": sources,
            "rejected": rejected,
            "alerts": alerts,
            "metrics": self.metrics.snapshot(),
        }))
        .context("serializing run report")?;
        reports
            .put_bytes(&run_dir.join("run_report.json"), &report_json)
            .await
            .context("writing run_report.json")?;

        reports
            .put_bytes(&run_dir.join("run_brief.md"), run_brief(summary, sources, alerts).as_bytes())
            .await
            .context("writing run_brief.md")?;
        Ok(())
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

pub fn run_brief(summary: &RunSummary, sources: &[SourceRunReport], alerts: &[Alert]) -> String {
    let mut per_source: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for report in sources {
        let entry = per_source.entry(report.source_url.as_str()).or_default();
        entry.0 += report.events_converted;
        entry.1 = entry.1.max(report.mean_confidence);
    }
    let source_lines = per_source
        .iter()
        .map(|(url, (events, confidence))| format!("- {url}: {events} events (best mean confidence {confidence:.1})"))
        .collect::<Vec<_>>()
        .join("\n");
    let alert_lines = if alerts.is_empty() {
        "- none".to_string()
    } else {
        alerts
            .iter()
            .map(|a| format!("- [{}] {}", a.alert_type.as_str(), a.message))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "# Event Normalizer Run Brief\n\n- Run ID: `{}`\n- Started: {}\n- Finished: {}\n- Envelopes: {} ({} rejected)\n- Events converted: {}\n- Conversion failures: {}\n- Storage failures: {}\n\n## Sources\n{}\n\n## Alerts\n{}\n",
        summary.run_id,
        summary.started_at,
        summary.finished_at,
        summary.envelopes,
        summary.rejected_files,
        summary.events_converted,
        summary.conversion_failures,
        summary.storage_failures,
        source_lines,
        alert_lines
    )
}

pub async fn run_once_from_env() -> Result<RunSummary> {
    let config = PipelineConfig::from_env();
    let engine = Arc::new(config.build_engine(Arc::new(DiagnosticsRecorder::new()))?);
    let metrics = Arc::new(config.build_metrics()?);
    ConversionPipeline::new(config, engine, metrics).run_once().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use evnorm_core::Activity;
    use serde_json::json;
    use tempfile::tempdir;

    fn envelope(source_url: &str, success: bool, payload: JsonValue) -> JsonValue {
        json!({
            "source_url": source_url,
            "method": "json_ld",
            "fetched_at": "2024-11-01T12:00:00Z",
            "duration_ms": 350,
            "success": success,
            "issues": if success { json!([]) } else { json!(["timeout waiting for calendar widget"]) },
            "payload": payload
        })
    }

    async fn write_inbox(root: &Path) {
        let inbox = root.join("inbox");
        fs::create_dir_all(&inbox).await.unwrap();
        let files = [
            (
                "01-parks.json",
                envelope(
                    "https://parks.example.gov/calendar",
                    true,
                    json!({"events": [
                        {"title": "Watercolor Painting for Kids", "start_date": "2024-12-14", "location": "Eastside Recreation Center"},
                        {"name": "Winter Soccer Clinic", "date": "12/21/2024", "cost": "Free"}
                    ]}),
                ),
            ),
            ("02-museum.json", envelope("https://museum.example.org/events", false, JsonValue::Null)),
            ("03-board.json", envelope("https://board.example.net/posts", true, json!({"events": []}))),
        ];
        for (name, value) in files {
            fs::write(inbox.join(name), serde_json::to_vec(&value).unwrap()).await.unwrap();
        }
        fs::write(inbox.join("04-broken.json"), b"{not json").await.unwrap();
        fs::write(inbox.join("notes.txt"), b"ignored").await.unwrap();
    }

    fn pipeline(root: &Path) -> (ConversionPipeline, Arc<ConversionEngine>, Arc<MetricsAggregator>) {
        let config = PipelineConfig::rooted(root);
        let engine = Arc::new(config.build_engine(Arc::new(DiagnosticsRecorder::new())).unwrap());
        let metrics = Arc::new(config.build_metrics().unwrap());
        let pipeline = ConversionPipeline::new(config, Arc::clone(&engine), Arc::clone(&metrics));
        (pipeline, engine, metrics)
    }

    #[tokio::test]
    async fn run_once_converts_stores_and_reports() {
        let dir = tempdir().unwrap();
        write_inbox(dir.path()).await;
        let (pipeline, engine, metrics) = pipeline(dir.path());

        let summary = pipeline.run_once().await.unwrap();
        assert_eq!(summary.envelopes, 3);
        assert_eq!(summary.rejected_files, 1);
        assert_eq!(summary.events_converted, 2);
        assert_eq!(summary.activities_stored, 2);
        assert_eq!(summary.conversion_failures, 1);

        let keys = pipeline.store().list_keys(ACTIVITIES_PREFIX).await.unwrap();
        assert_eq!(keys.len(), 2);
        let activity: Activity = pipeline.store().get_json(ACTIVITIES_PREFIX, &keys[0]).await.unwrap();
        assert_eq!(activity.provenance.domain.as_deref(), Some("parks.example.gov"));
        assert!(activity.provenance.extracted_at.is_some());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.extraction.attempts, 3);
        assert_eq!(snapshot.extraction.successes, 1);
        assert_eq!(snapshot.conversion.attempts, 3);
        assert_eq!(snapshot.conversion.failures, 1);
        let parks = metrics.source_metric("https://parks.example.gov/calendar").unwrap();
        assert_eq!(parks.avg_activities_per_attempt, 2.0);

        let last = engine.recorder().last_extraction().unwrap();
        assert_eq!(last.source_url, "https://board.example.net/posts");
        assert!(!last.success);
        assert!(last.issues.iter().any(|i| i.contains("holds no event objects")));

        let run_dir = Path::new(&summary.reports_dir);
        let report: JsonValue =
            serde_json::from_slice(&std::fs::read(run_dir.join("run_report.json")).unwrap()).unwrap();
        assert_eq!(report["sources"].as_array().unwrap().len(), 3);
        assert_eq!(report["rejected"][0]["name"], "04-broken.json");
        let brief = std::fs::read_to_string(run_dir.join("run_brief.md")).unwrap();
        assert!(brief.contains("https://parks.example.gov/calendar: 2 events"));
    }

    #[tokio::test]
    async fn root_array_payloads_keep_their_source() {
        let dir = tempdir().unwrap();
        let inbox = dir.path().join("inbox");
        fs::create_dir_all(&inbox).await.unwrap();
        let events = json!([{"title": "Toddler Story Time", "date": "2024-12-02"}]);
        for (name, url) in [("a.json", "https://a.example.org/events"), ("b.json", "https://b.example.net/events")] {
            let value = envelope(url, true, events.clone());
            fs::write(inbox.join(name), serde_json::to_vec(&value).unwrap()).await.unwrap();
        }
        let (pipeline, _, _) = pipeline(dir.path());

        let summary = pipeline.run_once().await.unwrap();
        assert_eq!(summary.activities_stored, 2);
        let keys = pipeline.store().list_keys(ACTIVITIES_PREFIX).await.unwrap();
        assert_eq!(keys.len(), 2);

        let mut sources = Vec::new();
        for key in &keys {
            let activity: Activity = pipeline.store().get_json(ACTIVITIES_PREFIX, key).await.unwrap();
            assert!(activity.provenance.extracted_at.is_some());
            sources.push(activity.provenance.source_url.unwrap());
        }
        sources.sort();
        assert_eq!(sources, vec!["https://a.example.org/events", "https://b.example.net/events"]);
    }

    #[tokio::test]
    async fn storage_failure_is_reported_and_the_run_completes() {
        let dir = tempdir().unwrap();
        write_inbox(dir.path()).await;
        fs::write(dir.path().join("store"), b"not a directory").await.unwrap();
        let (pipeline, _, metrics) = pipeline(dir.path());

        let summary = pipeline.run_once().await.unwrap();
        assert_eq!(summary.events_converted, 2);
        assert_eq!(summary.activities_stored, 0);
        assert_eq!(summary.storage_failures, 2);
        assert_eq!(metrics.snapshot().extraction.attempts, 3);

        let parks = metrics.source_metric("https://parks.example.gov/calendar").unwrap();
        assert_eq!(parks.attempts, 1);

        let run_dir = Path::new(&summary.reports_dir);
        let report: JsonValue =
            serde_json::from_slice(&std::fs::read(run_dir.join("run_report.json")).unwrap()).unwrap();
        assert_eq!(report["sources"][0]["storage_failures"], 2);
        let brief = std::fs::read_to_string(run_dir.join("run_brief.md")).unwrap();
        assert!(brief.contains("- Storage failures: 2"));
    }

    #[tokio::test]
    async fn missing_inbox_is_an_empty_run() {
        let dir = tempdir().unwrap();
        let (pipeline, _, _) = pipeline(dir.path());
        let summary = pipeline.run_once().await.unwrap();
        assert_eq!(summary.envelopes, 0);
        assert_eq!(summary.events_converted, 0);
        assert!(Path::new(&summary.reports_dir).join("run_brief.md").exists());
    }

    #[tokio::test]
    async fn config_dir_overrides_defaults() {
        let dir = tempdir().unwrap();
        let config_dir = dir.path().join("config");
        fs::create_dir_all(&config_dir).await.unwrap();
        fs::write(config_dir.join("alerts.yaml"), "min_source_attempts: 1\n").await.unwrap();
        fs::write(config_dir.join("mapping.yaml"), "extra_candidates:\n  title: [program_name]\n")
            .await
            .unwrap();

        let config = PipelineConfig::rooted(dir.path());
        assert_eq!(config.alert_thresholds().unwrap().min_source_attempts, 1);
        assert_eq!(config.engine_config().unwrap(), EngineConfig::default());

        let engine = config.build_engine(Arc::new(DiagnosticsRecorder::new())).unwrap();
        let result = engine
            .convert_to_activity(&RawRecord::new(json!({"events": [{"program_name": "Junior Chess Club"}]})))
            .unwrap();
        assert_eq!(result.activity.title, "Junior Chess Club");
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let config = PipelineConfig {
            config_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config"),
            ..PipelineConfig::rooted("unused")
        };
        assert_eq!(config.engine_config().unwrap(), EngineConfig::default());
        assert_eq!(config.alert_thresholds().unwrap(), AlertThresholds::default());
        let table = config.mapping_table().unwrap();
        assert!(table.is_known_key("program_name"));
    }
}
