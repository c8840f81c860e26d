//! Conversion engine: locates events in a raw record, maps every canonical
//! field, assembles the [`Activity`] and scores it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use evnorm_core::{
    value_text, Activity, ActivityType, Category, ConversionIssue, FieldMapping, Location, MappingStrategy, Pricing,
    Provenance, QualityMetrics, RawRecord, Registration, Schedule, ValidationResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::diagnostics::{ConversionDiagnostics, DiagnosticsRecorder, EventTrace};
use crate::mapping::{classify_activity_type, classify_category, CanonicalField, FieldMapper, FieldResolution, MappingTable};
use crate::validators::parse_price;
use crate::ConversionError;

/// Keys checked, in order, for the nested event list.
pub const EVENT_CONTAINER_KEYS: [&str; 7] = ["events", "activities", "event", "activity", "items", "results", "data.events"];

const SOURCE_URL_KEYS: [&str; 4] = ["source_url", "url", "source", "page_url"];
const EXTRACTED_AT_KEYS: [&str; 3] = ["extracted_at", "scraped_at", "fetched_at"];

/// Everything learned while converting one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub activity: Activity,
    /// Weighted field confidence scaled to 0..=100.
    pub confidence_score: f64,
    pub issues: Vec<String>,
    pub issue_details: Vec<ConversionIssue>,
    /// Canonical field name to the raw key that fed it.
    pub field_mappings: BTreeMap<String, String>,
    pub detailed_mappings: BTreeMap<String, FieldMapping>,
    pub validation_results: BTreeMap<String, ValidationResult>,
    pub quality: QualityMetrics,
}

impl ConversionResult {
    pub fn has_errors(&self) -> bool {
        self.issue_details
            .iter()
            .any(|issue| issue.severity == evnorm_core::Severity::Error)
    }
}

/// Batch-level attributes shared by every event in one record.
#[derive(Debug, Clone, Default)]
struct SourceContext {
    source_url: Option<String>,
    extracted_at: Option<DateTime<Utc>>,
}

impl SourceContext {
    fn from_value(value: &JsonValue) -> Self {
        let record = RawRecord::new(value.clone());
        Self::from_record(&record)
    }

    fn from_record(record: &RawRecord) -> Self {
        let source_url = SOURCE_URL_KEYS.iter().find_map(|key| record.text(key));
        let extracted_at = EXTRACTED_AT_KEYS
            .iter()
            .filter_map(|key| record.text(key))
            .find_map(|text| DateTime::parse_from_rfc3339(&text).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Self {
            source_url,
            extracted_at,
        }
    }

    /// Event-level values win over the batch-level ones.
    fn overlay(&self, event: &RawRecord) -> Self {
        let own = Self::from_record(event);
        Self {
            source_url: event.text("source_url").or_else(|| self.source_url.clone()).or(own.source_url),
            extracted_at: own.extracted_at.or(self.extracted_at),
        }
    }
}

pub struct ConversionEngine {
    config: EngineConfig,
    table: MappingTable,
    recorder: Arc<DiagnosticsRecorder>,
    reference_date: Option<NaiveDate>,
}

impl ConversionEngine {
    pub fn new(config: EngineConfig, table: MappingTable, recorder: Arc<DiagnosticsRecorder>) -> Self {
        Self {
            config,
            table,
            recorder,
            reference_date: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(
            EngineConfig::default(),
            MappingTable::default(),
            Arc::new(DiagnosticsRecorder::new()),
        )
    }

    /// Pins the date that year-less dates are resolved against. Defaults to today (UTC).
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    pub fn recorder(&self) -> &Arc<DiagnosticsRecorder> {
        &self.recorder
    }

    /// Converts the first event found in `record`.
    pub fn convert_to_activity(&self, record: &RawRecord) -> Result<ConversionResult, ConversionError> {
        let mut results = self.convert_batch(record, Some(1))?;
        results.pop().ok_or(ConversionError::NoEventContent)
    }

    /// Converts every event in the record's container.
    pub fn convert_all(&self, record: &RawRecord) -> Result<Vec<ConversionResult>, ConversionError> {
        self.convert_batch(record, None)
    }

    pub fn last_conversion_diagnostics(&self) -> Option<ConversionDiagnostics> {
        self.recorder.last_conversion()
    }

    fn convert_batch(&self, record: &RawRecord, limit: Option<usize>) -> Result<Vec<ConversionResult>, ConversionError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let reference = self.reference_date.unwrap_or_else(|| started_at.date_naive());
        let context = SourceContext::from_value(record.as_value());

        let mut diagnostics = ConversionDiagnostics {
            conversion_id: Uuid::new_v4(),
            input_hash: record.content_hash(),
            source_url: context.source_url.clone(),
            started_at,
            finished_at: started_at,
            duration_ms: 0,
            event_count: 0,
            confidence_score: 0.0,
            events: Vec::new(),
            raw_sample: record.sample(self.config.raw_sample_chars),
            success: false,
            error: None,
        };

        let events = match locate_events(record, &self.table) {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, source_url = ?context.source_url, "conversion aborted");
                diagnostics.error = Some(err.to_string());
                diagnostics.finished_at = Utc::now();
                diagnostics.duration_ms = clock.elapsed().as_millis() as u64;
                self.recorder.record_conversion(diagnostics);
                return Err(err);
            }
        };

        let take = limit.unwrap_or(events.len());
        let mut results = Vec::with_capacity(take.min(events.len()));
        for (index, event) in events.into_iter().take(take).enumerate() {
            let result = self.convert_event(event, &context, reference, started_at);
            diagnostics.events.push(EventTrace {
                index,
                title: Some(result.activity.title.clone()).filter(|t| !t.is_empty()),
                confidence_score: result.confidence_score,
                field_mappings: result.detailed_mappings.clone(),
                validation_results: result.validation_results.clone(),
                issues: result.issue_details.clone(),
            });
            results.push(result);
        }

        diagnostics.event_count = results.len();
        diagnostics.confidence_score = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.confidence_score).sum::<f64>() / results.len() as f64
        };
        diagnostics.success = true;
        diagnostics.finished_at = Utc::now();
        diagnostics.duration_ms = clock.elapsed().as_millis() as u64;
        debug!(
            events = diagnostics.event_count,
            confidence = diagnostics.confidence_score,
            "conversion finished"
        );
        self.recorder.record_conversion(diagnostics);
        Ok(results)
    }

    fn convert_event(
        &self,
        event: &JsonValue,
        batch: &SourceContext,
        reference: NaiveDate,
        converted_at: DateTime<Utc>,
    ) -> ConversionResult {
        let record = RawRecord::new(event.clone());
        let context = batch.overlay(&record);
        let mapper = FieldMapper::new(&self.table, &self.config, reference);
        let mut resolved: BTreeMap<CanonicalField, FieldResolution> = CanonicalField::ALL
            .into_iter()
            .map(|field| (field, mapper.resolve(&record, field)))
            .collect();

        let text = |field: CanonicalField| resolved.get(&field).and_then(|r| r.value.clone());
        let normalized = |field: CanonicalField| {
            resolved
                .get(&field)
                .filter(|r| r.mapping.is_some())
                .and_then(|r| r.validation.as_ref())
                .and_then(|v| v.normalized_value.clone())
        };

        let title = text(CanonicalField::Title).unwrap_or_default();
        let start_date = normalized(CanonicalField::StartDate).and_then(|d| parse_iso_date(&d));
        let end_date = normalized(CanonicalField::EndDate).and_then(|d| parse_iso_date(&d));
        let (start_time, range_end) = normalized(CanonicalField::StartTime)
            .map(|t| split_time_range(&t))
            .unwrap_or((None, None));
        let explicit_end = normalized(CanonicalField::EndTime).map(|t| split_time_range(&t));
        let end_time = match explicit_end {
            Some((start, end)) => end.or(start),
            None => range_end,
        };

        let pricing = match text(CanonicalField::Price) {
            Some(raw) => {
                let parsed = parse_price(&raw);
                Pricing {
                    price_type: parsed.price_type,
                    cost: parsed.cost,
                    raw_text: Some(raw),
                }
            }
            None => Pricing::default(),
        };

        let registration_url = text(CanonicalField::RegistrationUrl);
        let registration = Registration {
            required: record
                .get("registration_required")
                .and_then(JsonValue::as_bool)
                .unwrap_or(registration_url.is_some()),
            url: registration_url,
        };

        let age_groups = resolved
            .get(&CanonicalField::AgeGroups)
            .and_then(|r| r.mapping.as_ref())
            .and_then(|m| record.get(&m.source_field))
            .map(age_groups_of)
            .unwrap_or_default();

        let activity = Activity {
            id: Activity::derive_id(context.source_url.as_deref(), &title, start_date),
            title,
            description: text(CanonicalField::Description),
            activity_type: text(CanonicalField::ActivityType).map(|v| activity_type_of(&v)),
            category: text(CanonicalField::Category).map(|v| category_of(&v)),
            schedule: Schedule {
                start_date,
                end_date,
                start_time,
                end_time,
                recurrence: text(CanonicalField::Recurrence),
            },
            location: Location {
                name: text(CanonicalField::LocationName),
                address: text(CanonicalField::LocationAddress),
                city: text(CanonicalField::City),
            },
            pricing,
            age_groups,
            registration,
            provenance: Provenance {
                domain: context.source_url.as_deref().and_then(domain_of),
                source_url: context.source_url.clone(),
                extracted_at: context.extracted_at,
                converted_at,
            },
        };

        // An end time carried by the start-time range maps the end-time field
        // with the start time's source and confidence.
        let range_source = resolved
            .get(&CanonicalField::StartTime)
            .and_then(|r| r.mapping.clone());
        if let (Some(end), Some(start_mapping)) = (end_time, range_source) {
            if let Some(res) = resolved.get_mut(&CanonicalField::EndTime) {
                if res.mapping.is_none() {
                    res.issues.clear();
                    res.value = Some(end.format("%H:%M").to_string());
                    res.mapping = Some(FieldMapping {
                        target_field: CanonicalField::EndTime.name().to_string(),
                        source_field: start_mapping.source_field,
                        strategy: MappingStrategy::Inferred,
                        confidence: start_mapping.confidence,
                    });
                }
            }
        }

        let weights = &self.config.weights;
        let total_weight = weights.total();
        let weighted: f64 = resolved
            .values()
            .map(|r| r.confidence() * weights.weight(r.field))
            .sum();
        let confidence_score = if total_weight > 0.0 {
            (weighted / total_weight * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        let mut field_mappings = BTreeMap::new();
        let mut detailed_mappings = BTreeMap::new();
        let mut validation_results = BTreeMap::new();
        let mut issue_details = Vec::new();
        for (field, resolution) in std::mem::take(&mut resolved) {
            let name = field.name().to_string();
            if let Some(mapping) = resolution.mapping {
                field_mappings.insert(name.clone(), mapping.source_field.clone());
                detailed_mappings.insert(name.clone(), mapping);
            }
            if let Some(validation) = resolution.validation {
                validation_results.insert(name, validation);
            }
            issue_details.extend(resolution.issues);
        }

        let quality = activity.quality_metrics(&self.config.quality);
        ConversionResult {
            activity,
            confidence_score,
            issues: issue_details.iter().map(ToString::to_string).collect(),
            issue_details,
            field_mappings,
            detailed_mappings,
            validation_results,
            quality,
        }
    }
}

/// Finds the event objects inside `record`: a container key holding an object
/// or a list, a bare top-level list, or the record itself when it carries
/// event-like keys. Entries that are not objects are skipped.
pub fn locate_events<'a>(record: &'a RawRecord, table: &MappingTable) -> Result<Vec<&'a JsonValue>, ConversionError> {
    if let JsonValue::Array(items) = record.as_value() {
        return events_in(items, "<root>");
    }
    for key in EVENT_CONTAINER_KEYS {
        match record.get(key) {
            Some(JsonValue::Array(items)) => return events_in(items, key),
            Some(event @ JsonValue::Object(_)) => return Ok(vec![event]),
            _ => {}
        }
    }
    if looks_like_event(record, table) {
        return Ok(vec![record.as_value()]);
    }
    Err(ConversionError::NoEventContent)
}

fn events_in<'a>(items: &'a [JsonValue], key: &str) -> Result<Vec<&'a JsonValue>, ConversionError> {
    let events: Vec<&JsonValue> = items.iter().filter(|item| item.is_object()).collect();
    if events.is_empty() {
        return Err(ConversionError::EmptyEventList(key.to_string()));
    }
    Ok(events)
}

fn looks_like_event(record: &RawRecord, table: &MappingTable) -> bool {
    [CanonicalField::Title, CanonicalField::Description, CanonicalField::StartDate]
        .into_iter()
        .filter_map(|field| table.rule(field))
        .flat_map(|rule| rule.candidates.iter())
        .any(|key| record.text(key).is_some())
}

fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// Splits a normalized `HH:MM` or `HH:MM-HH:MM` value.
fn split_time_range(text: &str) -> (Option<NaiveTime>, Option<NaiveTime>) {
    let parse = |t: &str| NaiveTime::parse_from_str(t.trim(), "%H:%M").ok();
    match text.split_once('-') {
        Some((start, end)) => (parse(start), parse(end)),
        None => (parse(text), None),
    }
}

fn activity_type_of(value: &str) -> ActivityType {
    let lower = value.trim().to_ascii_lowercase();
    [
        ActivityType::Class,
        ActivityType::Camp,
        ActivityType::Workshop,
        ActivityType::Performance,
        ActivityType::Event,
        ActivityType::Other,
    ]
    .into_iter()
    .find(|kind| kind.as_str() == lower)
    .or_else(|| classify_activity_type(&lower))
    .unwrap_or(ActivityType::Other)
}

fn category_of(value: &str) -> Category {
    let lower = value.trim().to_ascii_lowercase();
    [
        Category::Arts,
        Category::Music,
        Category::Sports,
        Category::Education,
        Category::Science,
        Category::Nature,
        Category::Community,
        Category::Other,
    ]
    .into_iter()
    .find(|category| category.as_str() == lower)
    .or_else(|| classify_category(&lower))
    .unwrap_or(Category::Other)
}

fn age_groups_of(value: &JsonValue) -> Vec<String> {
    let mut groups: Vec<String> = match value {
        JsonValue::Array(items) => items.iter().filter_map(value_text).collect(),
        other => value_text(other)
            .map(|text| {
                text.split([',', ';', '|'])
                    .filter_map(evnorm_core::text_or_none)
                    .collect()
            })
            .unwrap_or_default(),
    };
    groups.dedup();
    groups
}

/// Host part of a URL, lowercased.
pub fn domain_of(url: &str) -> Option<String> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?.split(':').next()?.to_ascii_lowercase();
    (!host.is_empty() && host.contains('.')).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use evnorm_core::{MappingStrategy, PriceType, Severity};
    use serde_json::json;
    use std::thread;

    fn engine() -> ConversionEngine {
        ConversionEngine::with_defaults().with_reference_date(NaiveDate::from_ymd_opt(2024, 11, 1).unwrap())
    }

    fn full_record() -> RawRecord {
        RawRecord::new(json!({
            "source_url": "https://parks.example.gov/calendar",
            "extracted_at": "2024-11-01T12:00:00Z",
            "events": [{
                "title": "Watercolor Painting for Kids",
                "description": "A relaxed afternoon of painting with watercolors for ages 6-10.",
                "type": "Workshop",
                "category": "Arts",
                "start_date": "2024-12-14",
                "time": "2:00 PM - 4:00 PM",
                "location": "Eastside Recreation Center",
                "address": "123 Main St, Austin",
                "price": "$15",
                "age_range": "6-10, families",
                "registration_url": "https://parks.example.gov/register/42"
            }]
        }))
    }

    #[test]
    fn title_falls_back_to_name() {
        let record = RawRecord::new(json!({"events": [{"name": "Family Pottery Night", "date": "2024-12-15"}]}));
        let result = engine().convert_to_activity(&record).unwrap();

        assert_eq!(result.activity.title, "Family Pottery Night");
        assert_eq!(result.field_mappings.get("title").map(String::as_str), Some("name"));
        let mapping = &result.detailed_mappings["title"];
        assert_eq!(mapping.strategy, MappingStrategy::Fallback);
        assert_eq!(result.field_mappings.get("schedule.start_date").map(String::as_str), Some("date"));
        assert_eq!(result.activity.schedule.start_date, NaiveDate::from_ymd_opt(2024, 12, 15));
    }

    #[test]
    fn full_event_assembles_every_section() {
        let result = engine().convert_to_activity(&full_record()).unwrap();
        let activity = &result.activity;

        assert_eq!(activity.activity_type, Some(ActivityType::Workshop));
        assert_eq!(activity.category, Some(Category::Arts));
        assert_eq!(activity.schedule.start_time, NaiveTime::from_hms_opt(14, 0, 0));
        assert_eq!(activity.schedule.end_time, NaiveTime::from_hms_opt(16, 0, 0));
        assert_eq!(activity.location.address.as_deref(), Some("123 Main St, Austin"));
        assert_eq!(activity.pricing.price_type, PriceType::Paid);
        assert_eq!(activity.pricing.cost, Some(15.0));
        assert_eq!(activity.age_groups, vec!["6-10".to_string(), "families".to_string()]);
        assert!(activity.registration.required);
        assert_eq!(activity.provenance.domain.as_deref(), Some("parks.example.gov"));
        assert!(activity.provenance.extracted_at.is_some());

        assert!(!result.has_errors(), "{:?}", result.issues);
        assert!(!result.issue_details.iter().any(|i| i.field == "schedule.end_time"));
        assert!(result.confidence_score > 70.0 && result.confidence_score <= 100.0);
        assert_eq!(result.quality.score, engine().config().quality.max_score());
    }

    #[test]
    fn time_range_maps_end_time_from_start_time() {
        let ranged = engine()
            .convert_to_activity(&RawRecord::new(json!({"events": [
                {"title": "Watercolor Painting for Kids", "start_time": "2:00 PM - 4:00 PM"}
            ]})))
            .unwrap();
        let split = engine()
            .convert_to_activity(&RawRecord::new(json!({"events": [
                {"title": "Watercolor Painting for Kids", "start_time": "2:00 PM", "end_time": "4:00 PM"}
            ]})))
            .unwrap();

        let end = &ranged.detailed_mappings["schedule.end_time"];
        assert_eq!(end.strategy, MappingStrategy::Inferred);
        assert_eq!(end.source_field, "start_time");
        assert_eq!(end.confidence, ranged.detailed_mappings["schedule.start_time"].confidence);
        assert_eq!(ranged.activity.schedule.end_time, split.activity.schedule.end_time);
        assert!(!ranged.issue_details.iter().any(|i| i.field == "schedule.end_time"));
        // Only the range's slightly lower validator confidence separates the two.
        assert!((split.confidence_score - ranged.confidence_score).abs() < 1.0);
    }

    #[test]
    fn title_only_event_scores_title_weight() {
        let record = RawRecord::new(json!({"events": [{"title": "Community Garden Volunteer Day"}]}));
        let result = engine().convert_to_activity(&record).unwrap();
        assert!(result.quality.has_title);
        assert!(!result.quality.has_date);
        assert_eq!(result.quality.score, 20.0);
    }

    #[test]
    fn sparse_records_still_produce_scored_activities() {
        for record in [
            json!({"events": [{"when": "Dec 7", "venue": "TBD"}]}),
            json!({"events": [{"title": "", "price": "call"}]}),
            json!({"event": {"heading": "Jazz Night"}}),
            json!({"events": [{"title": 42, "date": ["not", "a", "date"], "location": {"lat": 1}}]}),
        ] {
            let result = engine().convert_to_activity(&RawRecord::new(record.clone())).unwrap();
            assert!((0.0..=100.0).contains(&result.confidence_score), "{record}");
        }
    }

    #[test]
    fn missing_title_is_an_error_issue_not_a_failure() {
        let record = RawRecord::new(json!({"events": [{"date": "2024-12-15", "venue": "Central Library"}]}));
        let result = engine().convert_to_activity(&record).unwrap();
        assert_eq!(result.activity.title, "");
        let issue = result.issue_details.iter().find(|i| i.field == "title").unwrap();
        assert_eq!(issue.severity, Severity::Error);
        assert!(result.issues.iter().any(|s| s.starts_with("[error] title:")));
    }

    #[test]
    fn structural_failures_are_errors_and_recorded() {
        let engine = engine();
        let err = engine.convert_to_activity(&RawRecord::new(json!({"foo": 1}))).unwrap_err();
        assert_eq!(err, ConversionError::NoEventContent);
        let diagnostics = engine.last_conversion_diagnostics().unwrap();
        assert!(!diagnostics.success);
        assert!(diagnostics.error.unwrap().contains("no event content"));

        let err = engine.convert_all(&RawRecord::new(json!({"events": []}))).unwrap_err();
        assert_eq!(err, ConversionError::EmptyEventList("events".into()));
        let err = engine.convert_all(&RawRecord::new(json!({"items": [1, "two", null]}))).unwrap_err();
        assert_eq!(err, ConversionError::EmptyEventList("items".into()));
    }

    #[test]
    fn event_containers_are_located_in_several_shapes() {
        let engine = engine();
        let flat = RawRecord::new(json!({"title": "Open Mic Night", "url": "https://cafe.example.com/events/7"}));
        let result = engine.convert_to_activity(&flat).unwrap();
        assert_eq!(result.activity.provenance.domain.as_deref(), Some("cafe.example.com"));

        let nested = RawRecord::new(json!({"data": {"events": [{"title": "A"}, {"title": "B"}]}}));
        assert_eq!(engine.convert_all(&nested).unwrap().len(), 2);

        let root_list = RawRecord::new(json!([{"title": "A"}, 7, {"title": "B"}]));
        assert_eq!(engine.convert_all(&root_list).unwrap().len(), 2);
    }

    #[test]
    fn convert_all_records_one_trace_per_call() {
        let engine = engine();
        let record = RawRecord::new(json!({
            "source_url": "https://library.example.org/kids",
            "events": [
                {"title": "Toddler Story Time", "date": "2024-12-02"},
                {"title": "Lego Robotics Club", "date": "12/09/2024"},
                {"title": "Teen Book Club Meetup"}
            ]
        }));
        let results = engine.convert_all(&record).unwrap();
        assert_eq!(results.len(), 3);

        let diagnostics = engine.last_conversion_diagnostics().unwrap();
        assert!(diagnostics.success);
        assert_eq!(diagnostics.event_count, 3);
        assert_eq!(diagnostics.events.len(), 3);
        assert_eq!(diagnostics.input_hash, record.content_hash());
        assert_eq!(diagnostics.source_url.as_deref(), Some("https://library.example.org/kids"));
        assert_eq!(diagnostics.events[1].title.as_deref(), Some("Lego Robotics Club"));
        let mean = results.iter().map(|r| r.confidence_score).sum::<f64>() / 3.0;
        assert!((diagnostics.confidence_score - mean).abs() < 1e-9);
    }

    #[test]
    fn activity_ids_are_stable_across_runs() {
        let a = engine().convert_to_activity(&full_record()).unwrap();
        let b = engine().convert_to_activity(&full_record()).unwrap();
        assert_eq!(a.activity.id, b.activity.id);
    }

    #[test]
    fn concurrent_conversions_leave_a_consistent_trace() {
        let engine = Arc::new(engine());
        let handles: Vec<_> = (1..=8)
            .map(|n| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let events: Vec<_> = (0..n).map(|i| json!({"title": format!("Session number {i}")})).collect();
                    engine.convert_all(&RawRecord::new(json!({"events": events}))).unwrap().len()
                })
            })
            .collect();
        for (n, handle) in (1..=8).zip(handles) {
            assert_eq!(handle.join().unwrap(), n);
        }
        let diagnostics = engine.last_conversion_diagnostics().unwrap();
        assert!((1..=8).contains(&diagnostics.event_count));
        assert_eq!(diagnostics.events.len(), diagnostics.event_count);
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(domain_of("https://User@Events.Example.com:8443/x?y").as_deref(), Some("events.example.com"));
        assert_eq!(domain_of("example.org/path").as_deref(), Some("example.org"));
        assert_eq!(domain_of("not a url"), None);
    }
}
