//! Stateless per-family field validators.
//!
//! Every validator takes the raw text of one field and returns a
//! [`ValidationResult`]. Validators never fail the conversion; a rejected
//! value is reported through `is_valid = false` plus issues and suggestions.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use evnorm_core::{PriceType, ValidationResult};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const SHORT_TITLE_CHARS: usize = 10;
pub const LONG_TITLE_CHARS: usize = 200;
pub const SHORT_DESCRIPTION_CHARS: usize = 20;
pub const LONG_DESCRIPTION_CHARS: usize = 5000;
pub const SHORT_LOCATION_CHARS: usize = 3;
/// A month/day without a year further than this in the past rolls into next year.
pub const INFERRED_YEAR_GRACE_DAYS: i64 = 30;

const SUPPORTED_DATE_PATTERNS: &str = "MM/DD/YYYY, MM-DD-YYYY, YYYY-MM-DD, Month DD, YYYY, Mon DD";

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap());
static ISO_DATETIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})[T ]\d{2}:\d{2}").unwrap());
static US_SLASH_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());
static US_DASH_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{4})$").unwrap());
static MONTH_NAME_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})$").unwrap()
});
static MONTH_DAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([a-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?$").unwrap());
static WEEKDAY_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+").unwrap()
});
static NUMERIC_GROUPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,4})\D(\d{1,2})\D(\d{1,4})$").unwrap());

static TIME_24_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})(?::\d{2})?$").unwrap());
static TIME_12_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2})(?::(\d{2}))?\s*([ap])\.?\s*m\.?$").unwrap()
});
static BARE_HOUR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,2})$").unwrap());
static TIME_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+?)\s*(?:-|–|—|\bto\b)\s*(.+)$").unwrap());

/// The canonical field families that have a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFamily {
    Title,
    Description,
    Date,
    Time,
    Location,
    Price,
}

/// Dispatches to the validator for `family`. Dates without a year are
/// resolved against `reference`.
pub fn validate_field(family: FieldFamily, value: &str, reference: NaiveDate) -> ValidationResult {
    match family {
        FieldFamily::Title => validate_title(value),
        FieldFamily::Description => validate_description(value),
        FieldFamily::Date => validate_date_at(value, reference),
        FieldFamily::Time => validate_time(value),
        FieldFamily::Location => validate_location(value),
        FieldFamily::Price => validate_price(value),
    }
}

pub fn validate_title(value: &str) -> ValidationResult {
    let title = value.trim();
    if title.is_empty() {
        return ValidationResult::invalid("title is empty")
            .with_suggestion("provide the event name as shown on the source page");
    }

    let len = title.chars().count();
    let lower = title.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || (title.contains('<') && title.contains('>')) {
        return ValidationResult::valid(0.4)
            .with_issue("title looks like a URL or markup")
            .with_suggestion("extract the visible event name instead of the link or tag");
    }
    if len < SHORT_TITLE_CHARS {
        return ValidationResult::valid(0.5)
            .with_issue(format!("title is very short ({len} characters)"))
            .with_suggestion(format!(
                "use a descriptive title of at least {SHORT_TITLE_CHARS} characters"
            ));
    }
    if len > LONG_TITLE_CHARS {
        return ValidationResult::valid(0.7)
            .with_issue(format!("title is unusually long ({len} characters)"))
            .with_suggestion("move details into the description");
    }
    let letters: Vec<char> = title.chars().filter(|c| c.is_alphabetic()).collect();
    if !letters.is_empty() && letters.iter().all(|c| c.is_uppercase()) {
        return ValidationResult::valid(0.8)
            .with_issue("title is all caps")
            .with_suggestion("convert the title to title case");
    }
    if title.split_whitespace().count() < 2 {
        return ValidationResult::valid(0.85);
    }
    ValidationResult::valid(0.95)
}

pub fn validate_description(value: &str) -> ValidationResult {
    let description = value.trim();
    if description.is_empty() {
        return ValidationResult::valid(0.3)
            .with_issue("description is empty")
            .with_suggestion("include a short summary of the activity");
    }
    let len = description.chars().count();
    if len < SHORT_DESCRIPTION_CHARS {
        return ValidationResult::valid(0.6).with_issue(format!("description is short ({len} characters)"));
    }
    if len > LONG_DESCRIPTION_CHARS {
        return ValidationResult::valid(0.7)
            .with_issue(format!("description is unusually long ({len} characters)"))
            .with_suggestion("strip page boilerplate from the description");
    }
    ValidationResult::valid(0.9)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    Iso,
    IsoDateTime,
    UsSlash,
    UsDash,
    MonthName,
    MonthDay,
}

impl DateFormat {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Iso => "YYYY-MM-DD",
            Self::IsoDateTime => "YYYY-MM-DDTHH:MM",
            Self::UsSlash => "MM/DD/YYYY",
            Self::UsDash => "MM-DD-YYYY",
            Self::MonthName => "Month DD, YYYY",
            Self::MonthDay => "Mon DD",
        }
    }

    fn confidence(&self) -> f64 {
        match self {
            Self::Iso => 1.0,
            Self::IsoDateTime => 0.95,
            Self::UsSlash | Self::UsDash => 0.9,
            Self::MonthName => 0.95,
            Self::MonthDay => 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub date: NaiveDate,
    pub format: DateFormat,
    pub year_inferred: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub issue: String,
    pub suggestion: Option<String>,
}

impl Rejection {
    fn new(issue: impl Into<String>, suggestion: Option<String>) -> Self {
        Self {
            issue: issue.into(),
            suggestion,
        }
    }

    fn into_result(self) -> ValidationResult {
        let result = ValidationResult::invalid(self.issue);
        match self.suggestion {
            Some(s) => result.with_suggestion(s),
            None => result,
        }
    }
}

pub fn validate_date_at(value: &str, reference: NaiveDate) -> ValidationResult {
    match parse_date(value, reference) {
        Ok(parsed) => {
            let iso = parsed.date.format("%Y-%m-%d").to_string();
            let mut result = ValidationResult::valid(parsed.format.confidence()).with_normalized(iso.clone());
            if parsed.year_inferred {
                result = result
                    .with_issue(format!("year was inferred as {}", parsed.date.year()))
                    .with_suggestion(format!("include the year, e.g. {iso}"));
            }
            result
        }
        Err(rejection) => rejection.into_result(),
    }
}

/// Parses every supported literal date format. `reference` resolves `Mon DD`.
pub fn parse_date(value: &str, reference: NaiveDate) -> Result<ParsedDate, Rejection> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err(Rejection::new(
            "date is empty",
            Some("provide the event date as YYYY-MM-DD".to_string()),
        ));
    }
    let text = WEEKDAY_PREFIX_RE.replace(raw, "");
    let text = text.trim();

    if let Some(caps) = ISO_DATE_RE.captures(text) {
        return build_date(raw, DateFormat::Iso, num(&caps[1]), num(&caps[2]), num(&caps[3]));
    }
    if let Some(caps) = ISO_DATETIME_RE.captures(text) {
        return build_date(raw, DateFormat::IsoDateTime, num(&caps[1]), num(&caps[2]), num(&caps[3]));
    }
    if let Some(caps) = US_SLASH_DATE_RE.captures(text) {
        return build_date(raw, DateFormat::UsSlash, num(&caps[3]), num(&caps[1]), num(&caps[2]));
    }
    if let Some(caps) = US_DASH_DATE_RE.captures(text) {
        return build_date(raw, DateFormat::UsDash, num(&caps[3]), num(&caps[1]), num(&caps[2]));
    }
    if let Some(caps) = MONTH_NAME_DATE_RE.captures(text) {
        let month = month_from_name(&caps[1]).ok_or_else(|| unknown_month(raw, &caps[1]))?;
        return build_date(raw, DateFormat::MonthName, num(&caps[3]), month, num(&caps[2]));
    }
    if let Some(caps) = MONTH_DAY_RE.captures(text) {
        let month = month_from_name(&caps[1]).ok_or_else(|| unknown_month(raw, &caps[1]))?;
        let day = num(&caps[2]);
        // First year from the reference on where the date exists and is not
        // past the grace window; four years always reach a leap year.
        let cutoff = reference - Duration::days(INFERRED_YEAR_GRACE_DAYS);
        let Some(date) = (reference.year()..=reference.year() + 4)
            .filter_map(|year| NaiveDate::from_ymd_opt(year, month, day))
            .find(|date| *date >= cutoff)
        else {
            build_date(raw, DateFormat::MonthDay, reference.year() as u32, month, day)?;
            return Err(Rejection::new(format!("`{raw}` is not a calendar date"), None));
        };
        return Ok(ParsedDate {
            date,
            format: DateFormat::MonthDay,
            year_inferred: true,
        });
    }

    Err(Rejection::new(
        format!("`{raw}` does not match any supported date pattern ({SUPPORTED_DATE_PATTERNS})"),
        Some(rewrite_suggestion(text)),
    ))
}

fn num(text: &str) -> u32 {
    text.parse().unwrap_or(0)
}

fn build_date(raw: &str, format: DateFormat, year: u32, month: u32, day: u32) -> Result<ParsedDate, Rejection> {
    let label = format.label();
    if !(1..=12).contains(&month) {
        let suggestion = if matches!(format, DateFormat::UsSlash | DateFormat::UsDash) && (1..=12).contains(&day) {
            Some(format!(
                "value looks like DD/MM/YYYY; rewrite as {year:04}-{day:02}-{month:02}"
            ))
        } else {
            Some("use YYYY-MM-DD, e.g. 2024-12-25".to_string())
        };
        return Err(Rejection::new(
            format!("month {month} is out of range in {label} value `{raw}`"),
            suggestion,
        ));
    }
    if !(1..=31).contains(&day) {
        return Err(Rejection::new(
            format!("day {day} is out of range in {label} value `{raw}`"),
            Some("use YYYY-MM-DD, e.g. 2024-12-25".to_string()),
        ));
    }
    let date = NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(|| {
        Rejection::new(
            format!("`{raw}` is not a calendar date (day {day} does not exist in month {month})"),
            None,
        )
    })?;
    Ok(ParsedDate {
        date,
        format,
        year_inferred: false,
    })
}

fn unknown_month(raw: &str, name: &str) -> Rejection {
    Rejection::new(
        format!("`{name}` in `{raw}` is not a month name"),
        Some("spell the month out, e.g. December 25, 2024".to_string()),
    )
}

fn month_from_name(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september", "october",
        "november", "december",
    ];
    let lower = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|full| *full == lower || (lower.len() == 3 && full.starts_with(&lower)) || (lower == "sept" && *full == "september"))
        .map(|idx| idx as u32 + 1)
}

/// Proposes a `YYYY-MM-DD` rewrite for three numeric groups with a four-digit year.
fn rewrite_suggestion(text: &str) -> String {
    let fallback = "use YYYY-MM-DD, e.g. 2024-12-25".to_string();
    let Some(caps) = NUMERIC_GROUPS_RE.captures(text) else {
        return fallback;
    };
    let groups = [&caps[1], &caps[2], &caps[3]];
    let Some(year_idx) = groups.iter().position(|g| g.len() == 4) else {
        return fallback;
    };
    let rest: Vec<u32> = groups
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != year_idx)
        .map(|(_, g)| num(g))
        .collect();
    let year = num(groups[year_idx]);
    let (a, b) = (rest[0], rest[1]);
    let candidate = if (1..=12).contains(&a) && (1..=31).contains(&b) {
        NaiveDate::from_ymd_opt(year as i32, a, b)
    } else if (1..=12).contains(&b) && (1..=31).contains(&a) {
        NaiveDate::from_ymd_opt(year as i32, b, a)
    } else {
        None
    };
    match candidate {
        Some(date) => format!("rewrite as {} (YYYY-MM-DD)", date.format("%Y-%m-%d")),
        None => fallback,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    TwentyFourHour,
    TwelveHour,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTime {
    pub start: NaiveTime,
    pub end: Option<NaiveTime>,
    pub format: TimeFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

pub fn validate_time(value: &str) -> ValidationResult {
    match parse_time(value) {
        Ok(parsed) => {
            let confidence = match parsed.format {
                TimeFormat::TwentyFourHour | TimeFormat::TwelveHour => 0.95,
                TimeFormat::Range => 0.9,
            };
            let normalized = match parsed.end {
                Some(end) => format!("{}-{}", parsed.start.format("%H:%M"), end.format("%H:%M")),
                None => parsed.start.format("%H:%M").to_string(),
            };
            ValidationResult::valid(confidence).with_normalized(normalized)
        }
        Err(rejections) => {
            let mut result = ValidationResult {
                is_valid: false,
                confidence: 0.0,
                issues: Vec::new(),
                suggestions: Vec::new(),
                normalized_value: None,
            };
            for rejection in rejections {
                result.issues.push(rejection.issue);
                if let Some(s) = rejection.suggestion {
                    if !result.suggestions.contains(&s) {
                        result.suggestions.push(s);
                    }
                }
            }
            result
        }
    }
}

/// Parses `HH:MM`, `H[:MM] AM/PM` and `start - end` ranges.
pub fn parse_time(value: &str) -> Result<ParsedTime, Vec<Rejection>> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err(vec![Rejection::new(
            "time is empty",
            Some("provide the start time as HH:MM or H:MM AM/PM".to_string()),
        )]);
    }

    let single = match parse_clock(raw, None) {
        Ok((start, meridiem)) => {
            let format = if meridiem.is_some() && TIME_12_RE.is_match(raw) {
                TimeFormat::TwelveHour
            } else {
                TimeFormat::TwentyFourHour
            };
            return Ok(ParsedTime { start, end: None, format });
        }
        Err(rejections) => rejections,
    };

    if let Some(caps) = TIME_RANGE_RE.captures(raw) {
        let (left, right) = (caps[1].trim(), caps[2].trim());
        if let Ok((end, right_meridiem)) = parse_clock(right, None) {
            let inherited = meridiem_of(left).is_none().then_some(right_meridiem).flatten();
            let start = match inherited {
                Some(meridiem) => parse_inherited(left, meridiem, end),
                None => parse_clock(left, None).map(|(t, _)| t),
            };
            if let Ok(start) = start {
                return Ok(ParsedTime {
                    start,
                    end: Some(end),
                    format: TimeFormat::Range,
                });
            }
        }
    }

    Err(single)
}

fn meridiem_of(text: &str) -> Option<Meridiem> {
    TIME_12_RE.captures(text.trim()).map(|caps| {
        if caps[3].eq_ignore_ascii_case("p") {
            Meridiem::Pm
        } else {
            Meridiem::Am
        }
    })
}

fn parse_clock(text: &str, inherited: Option<Meridiem>) -> Result<(NaiveTime, Option<Meridiem>), Vec<Rejection>> {
    let lower = text.to_ascii_lowercase();
    match lower.as_str() {
        "noon" => return Ok((NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default(), Some(Meridiem::Pm))),
        "midnight" => return Ok((NaiveTime::MIN, Some(Meridiem::Am))),
        _ => {}
    }

    if let Some(caps) = TIME_12_RE.captures(text) {
        let hour = num(&caps[1]);
        let minute = caps.get(2).map(|m| num(m.as_str())).unwrap_or(0);
        let meridiem = if caps[3].eq_ignore_ascii_case("p") {
            Meridiem::Pm
        } else {
            Meridiem::Am
        };
        return twelve_hour(text, hour, minute, meridiem).map(|t| (t, Some(meridiem)));
    }
    if let Some(caps) = TIME_24_RE.captures(text) {
        let hour = num(&caps[1]);
        let minute = num(&caps[2]);
        if let Some(meridiem) = inherited {
            return twelve_hour(text, hour, minute, meridiem).map(|t| (t, Some(meridiem)));
        }
        let mut rejections = Vec::new();
        if hour > 23 {
            rejections.push(Rejection::new(
                format!("hour {hour} is out of range for a 24-hour time in `{text}`"),
                Some("use HH:MM with hours 00-23".to_string()),
            ));
        }
        if minute > 59 {
            rejections.push(Rejection::new(
                format!("minute {minute} is out of range in `{text}`"),
                Some("minutes must be 00-59".to_string()),
            ));
        }
        if !rejections.is_empty() {
            return Err(rejections);
        }
        return NaiveTime::from_hms_opt(hour, minute, 0)
            .map(|t| (t, None))
            .ok_or_else(|| vec![Rejection::new(format!("`{text}` is not a valid time"), None)]);
    }
    if let (Some(caps), Some(meridiem)) = (BARE_HOUR_RE.captures(text), inherited) {
        return twelve_hour(text, num(&caps[1]), 0, meridiem).map(|t| (t, Some(meridiem)));
    }

    Err(vec![Rejection::new(
        format!("`{text}` does not match HH:MM, H:MM AM/PM or a time range"),
        Some("use HH:MM (24-hour) or H:MM AM/PM".to_string()),
    )])
}

/// Left side of a range without its own meridiem: borrow the right side's,
/// flipping PM to AM when that would put the start after the end.
fn parse_inherited(left: &str, meridiem: Meridiem, end: NaiveTime) -> Result<NaiveTime, Vec<Rejection>> {
    let (start, _) = parse_clock(left, Some(meridiem))?;
    if meridiem == Meridiem::Pm && start > end {
        let (morning, _) = parse_clock(left, Some(Meridiem::Am))?;
        return Ok(morning);
    }
    Ok(start)
}

fn twelve_hour(text: &str, hour: u32, minute: u32, meridiem: Meridiem) -> Result<NaiveTime, Vec<Rejection>> {
    let mut rejections = Vec::new();
    if hour == 0 || hour > 12 {
        rejections.push(Rejection::new(
            format!("hour {hour} is out of range for a 12-hour time in `{text}`"),
            Some("12-hour times use hours 1-12 with AM/PM".to_string()),
        ));
    }
    if minute > 59 {
        rejections.push(Rejection::new(
            format!("minute {minute} is out of range in `{text}`"),
            Some("minutes must be 00-59".to_string()),
        ));
    }
    if !rejections.is_empty() {
        return Err(rejections);
    }
    let hour24 = match (meridiem, hour) {
        (Meridiem::Am, 12) => 0,
        (Meridiem::Am, h) => h,
        (Meridiem::Pm, 12) => 12,
        (Meridiem::Pm, h) => h + 12,
    };
    NaiveTime::from_hms_opt(hour24, minute, 0)
        .ok_or_else(|| vec![Rejection::new(format!("`{text}` is not a valid time"), None)])
}

pub fn validate_location(value: &str) -> ValidationResult {
    const PLACEHOLDERS: [&str; 7] = [
        "tbd",
        "tba",
        "to be announced",
        "to be determined",
        "online",
        "virtual",
        "various locations",
    ];
    const STREET_WORDS: [&str; 14] = [
        " st", " street", " ave", " avenue", " rd", " road", " blvd", " boulevard", " dr", " drive", " ln",
        " lane", " way", " pkwy",
    ];

    let location = value.trim();
    if location.is_empty() {
        return ValidationResult::invalid("location is empty")
            .with_suggestion("provide the venue name or street address");
    }
    let lower = location.to_ascii_lowercase();
    if PLACEHOLDERS.contains(&lower.trim_end_matches('.')) {
        return ValidationResult::valid(0.4)
            .with_issue(format!("location `{location}` is a placeholder"))
            .with_suggestion("look for the venue on the event detail page");
    }
    if location.chars().count() < SHORT_LOCATION_CHARS {
        return ValidationResult::valid(0.4).with_issue("location is very short");
    }
    let has_digit = location.chars().any(|c| c.is_ascii_digit());
    if has_digit && (location.contains(',') || STREET_WORDS.iter().any(|w| lower.contains(w))) {
        return ValidationResult::valid(0.9);
    }
    ValidationResult::valid(0.75)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedPrice {
    pub price_type: PriceType,
    pub cost: Option<f64>,
    pub max_cost: Option<f64>,
}

pub fn parse_price(value: &str) -> ParsedPrice {
    const FREE_WORDS: [&str; 4] = ["free", "no cost", "no charge", "complimentary"];
    const OPEN_WORDS: [&str; 9] = [
        "varies",
        "vary",
        "call",
        "contact",
        "donation",
        "sliding scale",
        "tbd",
        "see website",
        "pricing",
    ];

    let lower = value.trim().to_ascii_lowercase();
    let numbers = extract_numbers(&lower);
    let all_zero = numbers.iter().all(|n| *n == 0.0);

    if (FREE_WORDS.iter().any(|w| lower.contains(w)) && all_zero) || (!numbers.is_empty() && all_zero) {
        return ParsedPrice {
            price_type: PriceType::Free,
            cost: Some(0.0),
            max_cost: None,
        };
    }
    if numbers.is_empty() {
        let price_type = if OPEN_WORDS.iter().any(|w| lower.contains(w)) {
            PriceType::Varies
        } else {
            PriceType::Unknown
        };
        return ParsedPrice {
            price_type,
            cost: None,
            max_cost: None,
        };
    }
    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    ParsedPrice {
        price_type: PriceType::Paid,
        cost: Some(min),
        max_cost: (numbers.len() > 1 && max > min).then_some(max),
    }
}

pub fn validate_price(value: &str) -> ValidationResult {
    let price = value.trim();
    if price.is_empty() {
        return ValidationResult::invalid("price is empty")
            .with_suggestion("use `Free` or an amount such as `$15`");
    }
    let parsed = parse_price(price);
    let lower = price.to_ascii_lowercase();
    let has_currency = ["$", "usd", "€", "eur", "£", "gbp", "dollar"]
        .iter()
        .any(|marker| lower.contains(marker));

    match parsed.price_type {
        PriceType::Free => ValidationResult::valid(0.95).with_normalized("free"),
        PriceType::Paid => {
            let cost = parsed.cost.unwrap_or_default();
            match (parsed.max_cost, has_currency) {
                (Some(max), _) => ValidationResult::valid(0.85).with_normalized(format!("{cost:.2}-{max:.2}")),
                (None, true) => ValidationResult::valid(0.9).with_normalized(format!("{cost:.2}")),
                (None, false) => ValidationResult::valid(0.8)
                    .with_normalized(format!("{cost:.2}"))
                    .with_issue("price has no currency marker")
                    .with_suggestion(format!("write the amount with a currency, e.g. ${cost:.2}")),
            }
        }
        PriceType::Varies => ValidationResult::valid(0.4)
            .with_issue(format!("price `{price}` is open-ended"))
            .with_suggestion("record the typical or minimum price when the source lists one"),
        PriceType::Unknown => ValidationResult::valid(0.3)
            .with_issue(format!("could not recognize a price in `{price}`"))
            .with_suggestion("use `Free` or an amount such as `$15`"),
    }
}

/// Numbers in free text; thousands separators are skipped.
pub fn extract_numbers(text: &str) -> Vec<f64> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut seen_dot = false;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch.is_ascii_digit() {
            current.push(ch);
            continue;
        }
        let next_is_digit = chars.peek().is_some_and(|c| c.is_ascii_digit());
        if ch == ',' && !current.is_empty() && next_is_digit {
            continue;
        }
        if ch == '.' && !seen_dot && !current.is_empty() && next_is_digit {
            current.push(ch);
            seen_dot = true;
            continue;
        }
        if !current.is_empty() {
            if let Ok(v) = current.parse::<f64>() {
                out.push(v);
            }
            current.clear();
            seen_dot = false;
        }
    }
    if let Ok(v) = current.parse::<f64>() {
        out.push(v);
    }
    out
}
