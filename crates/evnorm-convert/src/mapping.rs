//! Ordered candidate tables and the field mapper that walks them.
//!
//! Upstream sources name the same concept differently (`date` vs `when`,
//! `price` vs `cost`). Each canonical field owns a priority-ordered list of raw
//! keys; the first usable one wins and its provenance is kept.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use evnorm_core::{
    ActivityType, Category, ConversionIssue, FieldMapping, MappingStrategy, RawRecord, Severity,
    ValidationResult,
};
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

use crate::config::EngineConfig;
use crate::validators::{validate_field, FieldFamily};
use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalField {
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "description")]
    Description,
    #[serde(rename = "type")]
    ActivityType,
    #[serde(rename = "category")]
    Category,
    #[serde(rename = "schedule.start_date")]
    StartDate,
    #[serde(rename = "schedule.end_date")]
    EndDate,
    #[serde(rename = "schedule.start_time")]
    StartTime,
    #[serde(rename = "schedule.end_time")]
    EndTime,
    #[serde(rename = "schedule.recurrence")]
    Recurrence,
    #[serde(rename = "location.name")]
    LocationName,
    #[serde(rename = "location.address")]
    LocationAddress,
    #[serde(rename = "location.city")]
    City,
    #[serde(rename = "pricing.cost")]
    Price,
    #[serde(rename = "age_groups")]
    AgeGroups,
    #[serde(rename = "registration.url")]
    RegistrationUrl,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 15] = [
        Self::Title,
        Self::Description,
        Self::ActivityType,
        Self::Category,
        Self::StartDate,
        Self::EndDate,
        Self::StartTime,
        Self::EndTime,
        Self::Recurrence,
        Self::LocationName,
        Self::LocationAddress,
        Self::City,
        Self::Price,
        Self::AgeGroups,
        Self::RegistrationUrl,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::ActivityType => "type",
            Self::Category => "category",
            Self::StartDate => "schedule.start_date",
            Self::EndDate => "schedule.end_date",
            Self::StartTime => "schedule.start_time",
            Self::EndTime => "schedule.end_time",
            Self::Recurrence => "schedule.recurrence",
            Self::LocationName => "location.name",
            Self::LocationAddress => "location.address",
            Self::City => "location.city",
            Self::Price => "pricing.cost",
            Self::AgeGroups => "age_groups",
            Self::RegistrationUrl => "registration.url",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// Static mapping rule for one canonical field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: CanonicalField,
    pub candidates: &'static [&'static str],
    pub family: Option<FieldFamily>,
    pub required: bool,
}

pub static FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        field: CanonicalField::Title,
        candidates: &["title", "name", "event_name", "activity_name", "event_title", "eventName", "heading", "summary"],
        family: Some(FieldFamily::Title),
        required: true,
    },
    FieldRule {
        field: CanonicalField::Description,
        candidates: &["description", "desc", "details", "event_description", "about", "body", "summary_text"],
        family: Some(FieldFamily::Description),
        required: false,
    },
    FieldRule {
        field: CanonicalField::ActivityType,
        candidates: &["type", "activity_type", "event_type", "kind", "format"],
        family: None,
        required: true,
    },
    FieldRule {
        field: CanonicalField::Category,
        candidates: &["category", "categories", "genre", "topic", "tags"],
        family: None,
        required: true,
    },
    FieldRule {
        field: CanonicalField::StartDate,
        candidates: &[
            "start_date",
            "date",
            "event_date",
            "when",
            "startDate",
            "day",
            "schedule.start_date",
            "schedule.date",
        ],
        family: Some(FieldFamily::Date),
        required: false,
    },
    FieldRule {
        field: CanonicalField::EndDate,
        candidates: &["end_date", "endDate", "until", "schedule.end_date"],
        family: Some(FieldFamily::Date),
        required: false,
    },
    FieldRule {
        field: CanonicalField::StartTime,
        candidates: &[
            "start_time",
            "time",
            "startTime",
            "event_time",
            "hours",
            "schedule.start_time",
            "schedule.time",
        ],
        family: Some(FieldFamily::Time),
        required: false,
    },
    FieldRule {
        field: CanonicalField::EndTime,
        candidates: &["end_time", "endTime", "schedule.end_time"],
        family: Some(FieldFamily::Time),
        required: false,
    },
    FieldRule {
        field: CanonicalField::Recurrence,
        candidates: &["recurrence", "frequency", "repeats", "schedule.recurrence"],
        family: None,
        required: false,
    },
    FieldRule {
        field: CanonicalField::LocationName,
        candidates: &["location", "venue", "venue_name", "location_name", "place", "location.name", "venue.name"],
        family: Some(FieldFamily::Location),
        required: false,
    },
    FieldRule {
        field: CanonicalField::LocationAddress,
        candidates: &["address", "street_address", "location.address", "venue.address"],
        family: Some(FieldFamily::Location),
        required: false,
    },
    FieldRule {
        field: CanonicalField::City,
        candidates: &["city", "town", "location.city", "venue.city"],
        family: None,
        required: false,
    },
    FieldRule {
        field: CanonicalField::Price,
        candidates: &["price", "cost", "fee", "admission", "ticket_price", "pricing", "pricing.cost", "pricing.price"],
        family: Some(FieldFamily::Price),
        required: false,
    },
    FieldRule {
        field: CanonicalField::AgeGroups,
        candidates: &["age_range", "ages", "age_group", "age_groups", "audience", "age"],
        family: None,
        required: false,
    },
    FieldRule {
        field: CanonicalField::RegistrationUrl,
        candidates: &["registration_url", "registration_link", "signup_url", "register_url", "ticket_url", "registration.url"],
        family: None,
        required: false,
    },
];

const TYPE_KEYWORDS: &[(ActivityType, &[&str])] = &[
    (ActivityType::Camp, &["camp"]),
    (ActivityType::Workshop, &["workshop"]),
    (ActivityType::Class, &["class", "lesson", "course", "clinic", "session"]),
    (
        ActivityType::Performance,
        &["concert", "performance", "show", "theater", "theatre", "recital", "play"],
    ),
    (
        ActivityType::Event,
        &["event", "festival", "fair", "story time", "storytime", "party", "celebration", "meetup"],
    ),
];

const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Music, &["music", "concert", "band", "choir", "piano", "guitar", "sing"]),
    (Category::Arts, &["art", "paint", "pottery", "craft", "draw", "theater", "theatre", "dance", "dancing"]),
    (
        Category::Sports,
        &["sport", "soccer", "basketball", "swim", "yoga", "fitness", "tennis", "gymnastic", "martial"],
    ),
    (Category::Science, &["science", "stem", "robot", "coding", "engineer", "lego"]),
    (Category::Nature, &["nature", "hike", "hiking", "garden", "outdoor", "animal", "zoo", "bird"]),
    (Category::Education, &["education", "reading", "story", "stories", "library", "lecture", "learn", "tutor", "book"]),
    (Category::Community, &["community", "volunteer", "festival", "fair", "market", "meetup", "parade"]),
];

/// Endings a keyword may carry and still count as the same word.
const KEYWORD_ENDINGS: &[&str] = &["", "s", "es", "ed", "er", "ers", "ing", "ming", "ics", "ist", "ists"];

/// Whole-word match, allowing the inflections in [`KEYWORD_ENDINGS`]
/// (`paint` hits "painting" but `play` does not hit "playground").
fn keyword_hit(text: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        return text.contains(keyword);
    }
    text.split(|c: char| !c.is_ascii_alphanumeric()).any(|word| {
        word.strip_prefix(keyword)
            .is_some_and(|rest| KEYWORD_ENDINGS.contains(&rest))
    })
}

pub fn classify_activity_type(text: &str) -> Option<ActivityType> {
    let lower = text.to_ascii_lowercase();
    TYPE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| keyword_hit(&lower, k)))
        .map(|(kind, _)| *kind)
}

pub fn classify_category(text: &str) -> Option<Category> {
    let lower = text.to_ascii_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| keyword_hit(&lower, k)))
        .map(|(category, _)| *category)
}

/// Owned, extensible copy of [`FIELD_RULES`].
#[derive(Debug, Clone)]
pub struct MappingTable {
    rules: Vec<MappingRule>,
}

#[derive(Debug, Clone)]
pub struct MappingRule {
    pub field: CanonicalField,
    pub candidates: Vec<String>,
    pub family: Option<FieldFamily>,
    pub required: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MappingOverrides {
    #[serde(default)]
    extra_candidates: BTreeMap<String, Vec<String>>,
}

impl Default for MappingTable {
    fn default() -> Self {
        Self {
            rules: FIELD_RULES
                .iter()
                .map(|rule| MappingRule {
                    field: rule.field,
                    candidates: rule.candidates.iter().map(ToString::to_string).collect(),
                    family: rule.family,
                    required: rule.required,
                })
                .collect(),
        }
    }
}

impl MappingTable {
    /// Default table with extra candidates appended, e.g.
    /// `extra_candidates: { title: [program_name] }`.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let overrides: MappingOverrides = serde_yaml::from_str(text)?;
        let mut table = Self::default();
        for (name, keys) in overrides.extra_candidates {
            let field = CanonicalField::from_name(&name).ok_or_else(|| ConfigError::UnknownField(name.clone()))?;
            table.extend(field, keys);
        }
        Ok(table)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn extend(&mut self, field: CanonicalField, keys: impl IntoIterator<Item = String>) {
        if let Some(rule) = self.rules.iter_mut().find(|r| r.field == field) {
            for key in keys {
                if !rule.candidates.contains(&key) {
                    rule.candidates.push(key);
                }
            }
        }
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    pub fn rule(&self, field: CanonicalField) -> Option<&MappingRule> {
        self.rules.iter().find(|r| r.field == field)
    }

    pub fn is_known_key(&self, key: &str) -> bool {
        self.rules
            .iter()
            .any(|r| r.candidates.iter().any(|c| c == key || c.split('.').next() == Some(key)))
    }
}

/// Outcome of resolving one canonical field against one raw event.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldResolution {
    pub field: CanonicalField,
    pub value: Option<String>,
    pub mapping: Option<FieldMapping>,
    pub validation: Option<ValidationResult>,
    pub issues: Vec<ConversionIssue>,
}

impl FieldResolution {
    pub fn confidence(&self) -> f64 {
        self.mapping.as_ref().map(|m| m.confidence).unwrap_or(0.0)
    }
}

pub struct FieldMapper<'a> {
    table: &'a MappingTable,
    config: &'a EngineConfig,
    reference_date: NaiveDate,
}

impl<'a> FieldMapper<'a> {
    pub fn new(table: &'a MappingTable, config: &'a EngineConfig, reference_date: NaiveDate) -> Self {
        Self {
            table,
            config,
            reference_date,
        }
    }

    pub fn resolve(&self, record: &RawRecord, field: CanonicalField) -> FieldResolution {
        let mut resolution = FieldResolution {
            field,
            value: None,
            mapping: None,
            validation: None,
            issues: Vec::new(),
        };
        let Some(rule) = self.table.rule(field) else {
            return resolution;
        };
        let target = field.name();
        let severity = if rule.required { Severity::Error } else { Severity::Warning };
        let mut first_rejection: Option<ValidationResult> = None;

        for (idx, candidate) in rule.candidates.iter().enumerate() {
            let Some(value) = record.text(candidate) else {
                continue;
            };
            let (validation, confidence) = match rule.family {
                Some(family) => {
                    let validation = validate_field(family, &value, self.reference_date);
                    let confidence = validation.confidence;
                    (Some(validation), confidence)
                }
                None => (None, self.config.unvalidated_confidence),
            };

            if let Some(rejected) = validation.as_ref().filter(|v| !v.is_valid) {
                for issue in &rejected.issues {
                    resolution.issues.push(ConversionIssue {
                        field: target.to_string(),
                        severity,
                        message: format!("value from `{candidate}` rejected: {issue}"),
                        suggestion: rejected.suggestions.first().cloned(),
                    });
                }
                if first_rejection.is_none() {
                    first_rejection = Some(rejected.clone());
                }
                continue;
            }

            let strategy = if idx == 0 {
                MappingStrategy::Direct
            } else {
                MappingStrategy::Fallback
            };
            if let Some(v) = &validation {
                for (i, issue) in v.issues.iter().enumerate() {
                    resolution.issues.push(ConversionIssue {
                        field: target.to_string(),
                        severity: Severity::Warning,
                        message: issue.clone(),
                        suggestion: v.suggestions.get(i).or(v.suggestions.first()).cloned(),
                    });
                }
            }
            if confidence < self.config.low_confidence_threshold {
                resolution.issues.push(ConversionIssue {
                    field: target.to_string(),
                    severity: Severity::Warning,
                    message: format!("low confidence ({confidence:.2}) for value from `{candidate}`"),
                    suggestion: None,
                });
            }
            resolution.value = Some(value);
            resolution.validation = validation;
            resolution.mapping = Some(FieldMapping {
                target_field: target.to_string(),
                source_field: candidate.clone(),
                strategy,
                confidence,
            });
            return resolution;
        }

        if matches!(field, CanonicalField::ActivityType | CanonicalField::Category) {
            if let Some((source, label)) = self.infer(record, field) {
                resolution.issues.push(ConversionIssue {
                    field: target.to_string(),
                    severity: Severity::Warning,
                    message: format!("inferred `{label}` from `{source}`"),
                    suggestion: rule.candidates.first().map(|key| format!("map an explicit `{key}` key at the source")),
                });
                resolution.value = Some(label.to_string());
                resolution.mapping = Some(FieldMapping {
                    target_field: target.to_string(),
                    source_field: source,
                    strategy: MappingStrategy::Inferred,
                    confidence: self.config.inferred_confidence,
                });
                return resolution;
            }
        }

        if first_rejection.is_some() {
            resolution.validation = first_rejection;
            return resolution;
        }

        let message = if rule.required {
            "required field is missing".to_string()
        } else {
            "field is missing".to_string()
        };
        let suggestion = match self.closest_unknown_key(record, &rule.candidates) {
            Some((key, candidate)) => Some(format!("raw key `{key}` resembles `{candidate}`; add it to the mapping table")),
            None if rule.required => Some(format!("provide one of: {}", rule.candidates.join(", "))),
            None => None,
        };
        resolution.issues.push(ConversionIssue {
            field: target.to_string(),
            severity,
            message,
            suggestion,
        });
        resolution
    }

    /// Keyword inference over the title and description text.
    fn infer(&self, record: &RawRecord, field: CanonicalField) -> Option<(String, &'static str)> {
        let sources = [CanonicalField::Title, CanonicalField::Description];
        for source_field in sources {
            let Some(rule) = self.table.rule(source_field) else {
                continue;
            };
            let Some((key, text)) = rule
                .candidates
                .iter()
                .find_map(|c| record.text(c).map(|t| (c.clone(), t)))
            else {
                continue;
            };
            let label = match field {
                CanonicalField::ActivityType => classify_activity_type(&text).map(|t| t.as_str()),
                CanonicalField::Category => classify_category(&text).map(|c| c.as_str()),
                _ => None,
            };
            if let Some(label) = label {
                return Some((key, label));
            }
        }
        None
    }

    fn closest_unknown_key(&self, record: &RawRecord, candidates: &[String]) -> Option<(String, String)> {
        let mut best: Option<(f64, String, String)> = None;
        for key in record.keys() {
            if self.table.is_known_key(key) {
                continue;
            }
            let lower = key.to_ascii_lowercase();
            for candidate in candidates {
                let score = jaro_winkler(&lower, &candidate.to_ascii_lowercase());
                if score >= self.config.fuzzy_key_threshold && best.as_ref().map_or(true, |(s, _, _)| score > *s) {
                    best = Some((score, key.to_string(), candidate.clone()));
                }
            }
        }
        best.map(|(_, key, candidate)| (key, candidate))
    }
}
