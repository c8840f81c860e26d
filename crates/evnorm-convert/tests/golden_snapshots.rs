use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use evnorm_convert::{ConversionEngine, ConversionResult};
use evnorm_core::{ActivityType, Category, PriceType, RawRecord, Severity};
use serde::Deserialize;

#[derive(Debug, PartialEq, Deserialize)]
struct GoldenActivity {
    title: String,
    title_source: Option<String>,
    activity_type: Option<ActivityType>,
    category: Option<Category>,
    start_date: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    location: Option<String>,
    price_type: PriceType,
    cost: Option<f64>,
    error_fields: Vec<String>,
}

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture_dir(source_id: &str) -> PathBuf {
    workspace_root().join("fixtures").join(source_id).join("sample")
}

fn load_raw(source_id: &str) -> RawRecord {
    let text = fs::read_to_string(fixture_dir(source_id).join("raw.json")).expect("read raw fixture");
    RawRecord::from_json_str(&text).expect("parse raw fixture")
}

fn read_snapshot(source_id: &str) -> Vec<GoldenActivity> {
    let text = fs::read_to_string(fixture_dir(source_id).join("snapshot.json")).expect("read snapshot");
    serde_json::from_str(&text).expect("parse snapshot")
}

fn engine() -> ConversionEngine {
    ConversionEngine::with_defaults().with_reference_date(NaiveDate::from_ymd_opt(2024, 11, 1).unwrap())
}

fn to_golden(result: &ConversionResult) -> GoldenActivity {
    let activity = &result.activity;
    let mut error_fields: Vec<String> = Vec::new();
    for issue in result.issue_details.iter().filter(|i| i.severity == Severity::Error) {
        if !error_fields.contains(&issue.field) {
            error_fields.push(issue.field.clone());
        }
    }
    GoldenActivity {
        title: activity.title.clone(),
        title_source: result.field_mappings.get("title").cloned(),
        activity_type: activity.activity_type,
        category: activity.category,
        start_date: activity.schedule.start_date.map(|d| d.to_string()),
        start_time: activity.schedule.start_time.map(|t| t.format("%H:%M").to_string()),
        end_time: activity.schedule.end_time.map(|t| t.format("%H:%M").to_string()),
        location: activity.location.name.clone(),
        price_type: activity.pricing.price_type,
        cost: activity.pricing.cost,
        error_fields,
    }
}

fn assert_snapshot(source_id: &str) -> Vec<ConversionResult> {
    let results = engine().convert_all(&load_raw(source_id)).unwrap();
    let actual: Vec<GoldenActivity> = results.iter().map(to_golden).collect();
    assert_eq!(actual, read_snapshot(source_id), "{source_id}");
    for result in &results {
        assert!((0.0..=100.0).contains(&result.confidence_score));
        for mapping in result.detailed_mappings.values() {
            assert!((0.0..=1.0).contains(&mapping.confidence));
        }
    }
    results
}

#[test]
fn golden_snapshot_city_parks() {
    let results = assert_snapshot("city-parks");
    assert_eq!(
        results[0].activity.provenance.source_url.as_deref(),
        Some("https://parks.example.gov/calendar")
    );
    assert!(results[0].confidence_score > results[1].confidence_score);
}

#[test]
fn golden_snapshot_public_library() {
    let results = assert_snapshot("public-library");
    assert_eq!(results[0].activity.age_groups, vec!["2-3".to_string(), "4-5".to_string()]);
    let inferred = &results[1].validation_results["schedule.start_date"];
    assert!(inferred.issues[0].contains("inferred"));
}

#[test]
fn golden_snapshot_community_board() {
    let results = assert_snapshot("community-board");
    let result = &results[0];
    let title_issue = result.issue_details.iter().find(|i| i.field == "title").unwrap();
    assert!(title_issue.suggestion.as_deref().unwrap().contains("evnt_name"));

    let date = &result.validation_results["schedule.start_date"];
    assert!(!date.is_valid);
    assert_eq!(date.suggestions, vec!["rewrite as 2024-12-25 (YYYY-MM-DD)".to_string()]);
}
