use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{Category, EmailAnalysis, TaskDraft, TriagePriority};

pub const SUMMARY_MIN: usize = 5;
pub const SUMMARY_MAX: usize = 100;
pub const CONTACT_MIN: usize = 2;
pub const CONTACT_MAX: usize = 80;
pub const TASK_DESCRIPTION_MIN: usize = 10;
pub const TASK_DESCRIPTION_MAX: usize = 150;
pub const MAX_TAGS: usize = 3;
pub const TAG_MAX_LEN: usize = 32;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());

pub fn is_email_address(s: &str) -> bool {
    EMAIL_RE.is_match(s)
}

/// One problem found while validating untrusted model output. `position`
/// is the element's index in the returned array when the problem is tied
/// to a single element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub position: Option<usize>,
    pub email_id: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    fn batch(message: String) -> Self {
        Self {
            position: None,
            email_id: None,
            message,
        }
    }
}

#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub analyses: Vec<EmailAnalysis>,
    pub issues: Vec<ValidationIssue>,
}

/// Parse and validate raw model output. Never panics on bad input: every
/// malformed element becomes an issue and every valid element survives.
/// A wrong element count is recorded but does not abort validation.
pub fn parse_and_validate(raw: &str, expected_count: usize) -> ParsedBatch {
    let mut out = ParsedBatch::default();

    let Some(span) = extract_json_array(raw) else {
        out.issues
            .push(ValidationIssue::batch("no JSON array found in model output".to_string()));
        return out;
    };

    let parsed: Value = match serde_json::from_str(span) {
        Ok(v) => v,
        Err(e) => {
            out.issues.push(ValidationIssue::batch(format!(
                "model output is not valid JSON: {}",
                e
            )));
            return out;
        }
    };

    let Some(elements) = parsed.as_array() else {
        out.issues
            .push(ValidationIssue::batch("model output is not a JSON array".to_string()));
        return out;
    };

    if elements.len() != expected_count {
        out.issues.push(ValidationIssue::batch(format!(
            "expected {} analyses, model returned {}",
            expected_count,
            elements.len()
        )));
    }

    for (idx, element) in elements.iter().enumerate() {
        match validate_element(element) {
            Ok(analysis) => out.analyses.push(analysis),
            Err(message) => out.issues.push(ValidationIssue {
                position: Some(idx),
                email_id: element
                    .get("email_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                message: format!("element {}: {}", idx, message),
            }),
        }
    }

    out
}

/// Locate the first `[` and its matching `]`, skipping brackets inside JSON
/// strings. The model is told to return only an array, but prose wrappers
/// are common enough to tolerate.
pub fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in raw.as_bytes().iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn require_str<'a>(element: &'a Value, field: &str) -> Result<&'a str, String> {
    let value = element
        .get(field)
        .ok_or_else(|| format!("missing field '{}'", field))?
        .as_str()
        .ok_or_else(|| format!("field '{}' must be a string", field))?;
    if value.is_empty() {
        return Err(format!("field '{}' must not be empty", field));
    }
    Ok(value)
}

fn validate_element(element: &Value) -> Result<EmailAnalysis, String> {
    if !element.is_object() {
        return Err("element is not a JSON object".to_string());
    }

    let email_id = require_str(element, "email_id")?.to_string();

    let category = require_str(element, "category")?
        .parse::<Category>()
        .map_err(|_| "category must be one of client, lead, internal, spam".to_string())?;

    let priority = require_str(element, "priority")?
        .parse::<TriagePriority>()
        .map_err(|_| "priority must be one of high, medium, low".to_string())?;

    let summary = require_str(element, "summary")?.to_string();
    let summary_len = summary.chars().count();
    if !(SUMMARY_MIN..=SUMMARY_MAX).contains(&summary_len) {
        return Err(format!(
            "summary must be {}-{} characters, got {}",
            SUMMARY_MIN, SUMMARY_MAX, summary_len
        ));
    }
    if summary.contains('\n') {
        return Err("summary must be a single line".to_string());
    }

    let contact_name = require_str(element, "contact_name")?.to_string();
    let contact_len = contact_name.chars().count();
    if !(CONTACT_MIN..=CONTACT_MAX).contains(&contact_len) {
        return Err(format!(
            "contact_name must be {}-{} characters, got {}",
            CONTACT_MIN, CONTACT_MAX, contact_len
        ));
    }

    let tasks = match element.get("tasks") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(raw_tasks)) => {
            let mut tasks = Vec::with_capacity(raw_tasks.len());
            for (idx, raw_task) in raw_tasks.iter().enumerate() {
                tasks.push(
                    validate_task(raw_task).map_err(|message| format!("task {}: {}", idx, message))?,
                );
            }
            tasks
        }
        Some(_) => return Err("tasks must be an array".to_string()),
    };

    Ok(EmailAnalysis {
        email_id,
        category,
        priority,
        summary,
        contact_name,
        tasks,
    })
}

fn validate_task(task: &Value) -> Result<TaskDraft, String> {
    if !task.is_object() {
        return Err("task is not a JSON object".to_string());
    }

    let description = require_str(task, "description")?.to_string();
    let description_len = description.chars().count();
    if !(TASK_DESCRIPTION_MIN..=TASK_DESCRIPTION_MAX).contains(&description_len) {
        return Err(format!(
            "description must be {}-{} characters, got {}",
            TASK_DESCRIPTION_MIN, TASK_DESCRIPTION_MAX, description_len
        ));
    }

    let due_date = match task.get("due_date") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(parse_utc_due_date(s)?),
        Some(_) => return Err("due_date must be a string or null".to_string()),
    };

    let tags = match task.get("tags") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(raw_tags)) => {
            let mut tags: Vec<String> = Vec::new();
            for raw_tag in raw_tags {
                let tag = raw_tag
                    .as_str()
                    .ok_or_else(|| "tags must be strings".to_string())?;
                let slug = normalize_tag(tag);
                if !slug.is_empty() && !tags.contains(&slug) {
                    tags.push(slug);
                }
            }
            tags.truncate(MAX_TAGS);
            tags
        }
        Some(_) => return Err("tags must be an array".to_string()),
    };

    let participants = match task.get("participants") {
        Some(Value::Array(raw_participants)) if !raw_participants.is_empty() => {
            let mut participants = Vec::with_capacity(raw_participants.len());
            for raw_participant in raw_participants {
                let address = raw_participant
                    .as_str()
                    .ok_or_else(|| "participants must be strings".to_string())?;
                if !is_email_address(address) {
                    return Err(format!("participant '{}' is not an email address", address));
                }
                participants.push(address.to_string());
            }
            participants
        }
        _ => return Err("at least one participant email address is required".to_string()),
    };

    Ok(TaskDraft {
        description,
        due_date,
        tags,
        participants,
    })
}

/// `due_date` must be a full ISO-8601 datetime with a UTC designator. A
/// bare date or a non-UTC offset is rejected rather than reinterpreted.
fn parse_utc_due_date(s: &str) -> Result<DateTime<Utc>, String> {
    let parsed = DateTime::parse_from_rfc3339(s)
        .map_err(|_| format!("due_date '{}' is not a full ISO-8601 datetime", s))?;
    if !(s.ends_with('Z') || s.ends_with("+00:00")) {
        return Err(format!("due_date '{}' must carry a UTC designator", s));
    }
    Ok(parsed.with_timezone(&Utc))
}

/// Normalize a free-form tag into a slug: trim, lowercase, fold common
/// diacritics, map whitespace to hyphens, drop everything else, cap length.
pub fn normalize_tag(tag: &str) -> String {
    let mut slug = String::new();
    let mut last_hyphen = true;
    for ch in tag.trim().to_lowercase().chars().map(fold_diacritic) {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            if !last_hyphen {
                slug.push('-');
                last_hyphen = true;
            }
        } else if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_hyphen = false;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug.chars().take(TAG_MAX_LEN).collect()
}

fn fold_diacritic(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        _ => ch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_element(email_id: &str) -> Value {
        json!({
            "email_id": email_id,
            "category": "client",
            "priority": "medium",
            "summary": "Client asks about the Q4 invoice",
            "contact_name": "Anna",
            "tasks": [{
                "description": "Send the corrected Q4 invoice to Anna",
                "due_date": "2025-11-03T12:00:00Z",
                "tags": ["Invoice", "billing"],
                "participants": ["anna@acme.com"]
            }]
        })
    }

    #[test]
    fn test_extracts_array_from_prose() {
        let raw = "Sure! Here is the result:\n[{\"a\": 1}]\nLet me know if you need more.";
        assert_eq!(extract_json_array(raw), Some("[{\"a\": 1}]"));
    }

    #[test]
    fn test_extraction_skips_brackets_inside_strings() {
        let raw = r#"noise [{"note": "see [1] and \"[2]\""}] trailing"#;
        assert_eq!(
            extract_json_array(raw),
            Some(r#"[{"note": "see [1] and \"[2]\""}]"#)
        );
    }

    #[test]
    fn test_no_array_reports_batch_issue() {
        let parsed = parse_and_validate("I could not comply.", 2);
        assert!(parsed.analyses.is_empty());
        assert_eq!(parsed.issues.len(), 1);
        assert!(parsed.issues[0].message.contains("no JSON array"));
    }

    #[test]
    fn test_valid_batch_parses_fully() {
        let raw = serde_json::to_string(&json!([valid_element("eml_1"), valid_element("eml_2")]))
            .unwrap();
        let parsed = parse_and_validate(&raw, 2);
        assert!(parsed.issues.is_empty());
        assert_eq!(parsed.analyses.len(), 2);
        assert_eq!(parsed.analyses[0].email_id, "eml_1");
        assert_eq!(parsed.analyses[0].category, Category::Client);
        assert_eq!(parsed.analyses[0].tasks.len(), 1);
        assert_eq!(parsed.analyses[0].tasks[0].tags, vec!["invoice", "billing"]);
    }

    #[test]
    fn test_partial_validity_one_bad_due_date() {
        let mut bad = valid_element("eml_2");
        bad["tasks"][0]["due_date"] = json!("2025-11-03");
        let raw =
            serde_json::to_string(&json!([valid_element("eml_1"), bad, valid_element("eml_3")]))
                .unwrap();

        let parsed = parse_and_validate(&raw, 3);
        assert_eq!(parsed.analyses.len(), 2);
        assert_eq!(parsed.issues.len(), 1);
        let issue = &parsed.issues[0];
        assert_eq!(issue.position, Some(1));
        assert_eq!(issue.email_id.as_deref(), Some("eml_2"));
        assert!(issue.message.contains("due_date"));
    }

    #[test]
    fn test_non_utc_offset_rejected() {
        let mut element = valid_element("eml_1");
        element["tasks"][0]["due_date"] = json!("2025-11-03T12:00:00+02:00");
        let raw = serde_json::to_string(&json!([element])).unwrap();
        let parsed = parse_and_validate(&raw, 1);
        assert!(parsed.analyses.is_empty());
        assert!(parsed.issues[0].message.contains("UTC designator"));
    }

    #[test]
    fn test_count_mismatch_is_reported_but_not_fatal() {
        let raw = serde_json::to_string(&json!([valid_element("eml_1")])).unwrap();
        let parsed = parse_and_validate(&raw, 3);
        assert_eq!(parsed.analyses.len(), 1);
        assert_eq!(parsed.issues.len(), 1);
        assert!(parsed.issues[0].message.contains("expected 3"));
        assert_eq!(parsed.issues[0].position, None);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let mut element = valid_element("eml_1");
        element["category"] = json!("newsletter");
        let raw = serde_json::to_string(&json!([element])).unwrap();
        let parsed = parse_and_validate(&raw, 1);
        assert!(parsed.analyses.is_empty());
        assert!(parsed.issues[0].message.contains("category"));
    }

    #[test]
    fn test_summary_bounds_enforced() {
        let mut element = valid_element("eml_1");
        element["summary"] = json!("hey");
        let raw = serde_json::to_string(&json!([element])).unwrap();
        let parsed = parse_and_validate(&raw, 1);
        assert!(parsed.issues[0].message.contains("summary"));

        let mut element = valid_element("eml_1");
        element["summary"] = json!("line one\nline two of the summary");
        let raw = serde_json::to_string(&json!([element])).unwrap();
        let parsed = parse_and_validate(&raw, 1);
        assert!(parsed.issues[0].message.contains("single line"));
    }

    #[test]
    fn test_participants_must_be_email_shaped() {
        let mut element = valid_element("eml_1");
        element["tasks"][0]["participants"] = json!(["not-an-address"]);
        let raw = serde_json::to_string(&json!([element])).unwrap();
        let parsed = parse_and_validate(&raw, 1);
        assert!(parsed.issues[0].message.contains("not an email address"));

        let mut element = valid_element("eml_1");
        element["tasks"][0]["participants"] = json!([]);
        let raw = serde_json::to_string(&json!([element])).unwrap();
        let parsed = parse_and_validate(&raw, 1);
        assert!(parsed.issues[0].message.contains("at least one participant"));
    }

    #[test]
    fn test_tags_are_normalized_and_capped() {
        let mut element = valid_element("eml_1");
        element["tasks"][0]["tags"] = json!(["  Café Menu ", "FOLLOW_UP", "a", "b", "c"]);
        let raw = serde_json::to_string(&json!([element])).unwrap();
        let parsed = parse_and_validate(&raw, 1);
        assert_eq!(parsed.analyses.len(), 1);
        assert_eq!(
            parsed.analyses[0].tasks[0].tags,
            vec!["cafe-menu", "follow-up", "a"]
        );
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("  Café  Menu "), "cafe-menu");
        assert_eq!(normalize_tag("déjà vu!"), "deja-vu");
        assert_eq!(normalize_tag("---"), "");
        let long = "x".repeat(80);
        assert_eq!(normalize_tag(&long).len(), TAG_MAX_LEN);
    }

    #[test]
    fn test_missing_fields_reported_per_element() {
        let raw = r#"[{"email_id": "eml_1"}]"#;
        let parsed = parse_and_validate(raw, 1);
        assert!(parsed.analyses.is_empty());
        assert_eq!(parsed.issues.len(), 1);
        assert!(parsed.issues[0].message.contains("missing field 'category'"));
        assert_eq!(parsed.issues[0].email_id.as_deref(), Some("eml_1"));
    }
}
