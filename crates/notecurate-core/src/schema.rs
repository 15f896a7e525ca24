//! Target schemas for structured extraction.
//!
//! A [`TargetSchema`] is an ordered, statically declared list of
//! [`FieldDescriptor`]s. The same descriptor list drives both the schema
//! description embedded in prompts ([`TargetSchema::describe`]) and the
//! validation of model output ([`TargetSchema::validate`]).

use std::fmt;

use chrono::{NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};

/// Primitive type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    StringArray,
    /// ISO 8601 / RFC 3339 timestamp carried as a string.
    DateTime,
}

impl FieldKind {
    /// JSON type name used in schema descriptions and error messages.
    pub fn json_type(&self) -> &'static str {
        match self {
            FieldKind::String | FieldKind::DateTime => "string",
            FieldKind::Number => "number",
            FieldKind::StringArray => "array",
        }
    }
}

/// One declared field of a target schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub optional: bool,
    pub description: Option<String>,
    /// Minimum character count for string fields.
    pub min_len: Option<usize>,
    /// Missing or null arrays validate as `[]`.
    pub default_empty: bool,
}

impl FieldDescriptor {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            description: None,
            min_len: None,
            default_empty: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn string_array(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::StringArray)
    }

    pub fn date_time(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    /// Mark the field optional: missing or null values validate as `null`.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Attach a human-readable description for the prompt.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn min_len(mut self, min: usize) -> Self {
        self.min_len = Some(min);
        self
    }

    pub fn default_empty(mut self) -> Self {
        self.default_empty = true;
        self
    }

    fn property(&self) -> JsonValue {
        let mut prop = Map::new();
        prop.insert("type".to_string(), json!(self.kind.json_type()));
        if self.optional {
            prop.insert("optional".to_string(), json!(true));
        }
        let description = match (self.kind, &self.description) {
            (FieldKind::DateTime, Some(d)) => Some(format!("{}. Format as ISO 8601 string.", d)),
            (FieldKind::DateTime, None) => Some("Format as ISO 8601 string.".to_string()),
            (_, d) => d.clone(),
        };
        if let Some(d) = description {
            prop.insert("description".to_string(), json!(d));
        }
        match self.kind {
            FieldKind::StringArray => {
                prop.insert("items".to_string(), json!({ "type": "string" }));
            }
            FieldKind::DateTime => {
                prop.insert("format".to_string(), json!("date-time"));
            }
            _ => {}
        }
        JsonValue::Object(prop)
    }
}

/// A field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Dotted path of the offending value; empty for the root.
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Fixed field set an extraction must produce.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSchema {
    fields: Vec<FieldDescriptor>,
}

impl TargetSchema {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// JSON description of the schema, as embedded in prompts.
    pub fn describe_value(&self) -> JsonValue {
        let properties: Map<String, JsonValue> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.property()))
            .collect();
        json!({ "type": "object", "properties": properties })
    }

    /// Pretty-printed schema description.
    pub fn describe(&self) -> String {
        serde_json::to_string_pretty(&self.describe_value()).unwrap_or_default()
    }

    /// Validate a candidate record.
    ///
    /// On success returns the normalized record: declared fields only, in
    /// declaration order, with defaults applied and missing optionals as
    /// `null`. On failure returns every field-level issue found.
    pub fn validate(&self, candidate: &JsonValue) -> Result<JsonValue, Vec<ValidationIssue>> {
        let Some(object) = candidate.as_object() else {
            return Err(vec![ValidationIssue::new(
                "",
                format!("Expected object, received {}", json_type_name(candidate)),
            )]);
        };

        let mut issues = Vec::new();
        let mut normalized = Map::new();

        for field in &self.fields {
            let value = object.get(&field.name).unwrap_or(&JsonValue::Null);
            match validate_field(field, value) {
                Ok(v) => {
                    normalized.insert(field.name.clone(), v);
                }
                Err(mut field_issues) => issues.append(&mut field_issues),
            }
        }

        if issues.is_empty() {
            Ok(JsonValue::Object(normalized))
        } else {
            Err(issues)
        }
    }
}

fn validate_field(
    field: &FieldDescriptor,
    value: &JsonValue,
) -> Result<JsonValue, Vec<ValidationIssue>> {
    let path = field.name.as_str();

    if value.is_null() {
        if field.kind == FieldKind::StringArray && field.default_empty {
            return Ok(json!([]));
        }
        if field.optional {
            return Ok(JsonValue::Null);
        }
        return Err(vec![ValidationIssue::new(path, "Required")]);
    }

    let mismatch = || {
        vec![ValidationIssue::new(
            path,
            format!(
                "Expected {}, received {}",
                field.kind.json_type(),
                json_type_name(value)
            ),
        )]
    };

    match field.kind {
        FieldKind::String => {
            let s = value.as_str().ok_or_else(mismatch)?;
            if let Some(min) = field.min_len {
                if s.chars().count() < min {
                    return Err(vec![ValidationIssue::new(
                        path,
                        format!("String must contain at least {} character(s)", min),
                    )]);
                }
            }
            Ok(value.clone())
        }
        FieldKind::Number => {
            if value.is_number() {
                Ok(value.clone())
            } else {
                Err(mismatch())
            }
        }
        FieldKind::StringArray => {
            let items = value.as_array().ok_or_else(mismatch)?;
            let issues: Vec<ValidationIssue> = items
                .iter()
                .enumerate()
                .filter(|(_, item)| !item.is_string())
                .map(|(i, item)| {
                    ValidationIssue::new(
                        format!("{}.{}", path, i),
                        format!("Expected string, received {}", json_type_name(item)),
                    )
                })
                .collect();
            if issues.is_empty() {
                Ok(value.clone())
            } else {
                Err(issues)
            }
        }
        FieldKind::DateTime => {
            let s = value.as_str().ok_or_else(mismatch)?;
            if is_utc_datetime(s) {
                Ok(value.clone())
            } else {
                Err(vec![ValidationIssue::new(path, "Invalid ISO 8601 datetime")])
            }
        }
    }
}

/// `YYYY-MM-DDTHH:MM[:SS[.fff]]Z`. Offsets other than `Z` are rejected.
fn is_utc_datetime(s: &str) -> bool {
    let Some(local) = s.strip_suffix('Z') else {
        return false;
    };
    if local.as_bytes().get(10) != Some(&b'T') {
        return false;
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(local, format).is_ok())
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

// =============================================================================
// BUILT-IN SCHEMAS
// =============================================================================

/// Article schema used by the ad-hoc extraction endpoint.
pub fn article_schema() -> TargetSchema {
    TargetSchema::new(vec![
        FieldDescriptor::string("description").min_len(1),
        FieldDescriptor::string("location"),
        FieldDescriptor::string_array("tags").default_empty(),
        FieldDescriptor::date_time("timestamp"),
    ])
}

/// Example record grounding the article schema's output format.
pub fn article_example() -> JsonValue {
    json!({
        "description": "סנוור בלייזר בכביש 450 דיר עמאר",
        "location": "בכביש 450 דיר עמאר",
        "tags": ["סנוור בלייזר"],
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Schema of a structured note, used by batch enrichment.
pub fn enriched_note_schema() -> TargetSchema {
    TargetSchema::new(vec![
        FieldDescriptor::string("sector").optional(),
        FieldDescriptor::string("location").optional(),
        FieldDescriptor::number("lat").optional(),
        FieldDescriptor::number("lng").optional(),
        FieldDescriptor::string("date")
            .optional()
            .describe("Date of the event, formatted YYYY-MM-DD"),
        FieldDescriptor::string("time")
            .optional()
            .describe("Time of the event, formatted HH:MM"),
        FieldDescriptor::string("description"),
        FieldDescriptor::string("eventType").optional(),
    ])
}

/// Example record grounding the enriched-note schema's output format.
pub fn enriched_note_example() -> JsonValue {
    json!({
        "sector": "גזרת בנימין",
        "location": "בכביש 465",
        "lat": null,
        "lng": null,
        "date": "2024-07-09",
        "time": "14:00",
        "description": "ז\"א בכביש 465 מכיוון הכפר דיר אבו משעל חייל שהיה באחד הרכבים ירה ופגע במחבל",
        "eventType": "ז\"א",
    })
}
