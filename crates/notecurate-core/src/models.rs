//! Core data models for notecurate.
//!
//! These types are shared across crates and mirror the three persisted
//! tables: raw notes, structured notes, and the link between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// RAW NOTES
// =============================================================================

/// Unstructured text as imported by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNote {
    pub id: i64,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Raw note listing entry with its enrichment state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNoteSummary {
    pub id: i64,
    pub value: String,
    pub created_at: DateTime<Utc>,
    /// True once at least one structured note is linked to this raw note.
    pub enriched: bool,
}

/// Payload for saving a raw note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRawNote {
    pub value: String,
}

// =============================================================================
// STRUCTURED NOTES
// =============================================================================

/// Structured note produced by enrichment or entered manually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub sector: Option<String>,
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub description: String,
    #[serde(rename = "eventType")]
    pub event_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Writable fields of a structured note.
///
/// Field names match the enriched-note extraction schema, so a validated
/// extraction record deserializes straight into this type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteInput {
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    pub description: String,
    #[serde(default, rename = "eventType", alias = "event_type")]
    pub event_type: Option<String>,
}

impl NoteInput {
    /// Reject inputs that cannot be stored.
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Description cannot be empty".to_string(),
            ));
        }
        for (name, value) in [("lat", self.lat), ("lng", self.lng)] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(Error::InvalidInput(format!("{} must be a finite number", name)));
                }
            }
        }
        Ok(())
    }
}

/// An unconfirmed structured note paired with the raw note it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnconfirmedNote {
    #[serde(rename = "rawNote")]
    pub raw_note: RawNote,
    pub note: Note,
}

/// Cursor-paged slice of the review queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnconfirmedPage {
    pub items: Vec<UnconfirmedNote>,
    /// Cursor for the next page, `None` on the last page.
    pub next_cursor: Option<i64>,
    pub has_more: bool,
}

// =============================================================================
// MODELS
// =============================================================================

/// A model installed on the inference server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_size: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_input_from_extraction_record() {
        let record = serde_json::json!({
            "sector": "north",
            "location": "road 465",
            "lat": null,
            "lng": null,
            "date": "2024-07-09",
            "time": "14:00",
            "description": "incident report",
            "eventType": "shooting"
        });
        let input: NoteInput = serde_json::from_value(record).unwrap();
        assert_eq!(input.sector.as_deref(), Some("north"));
        assert_eq!(input.lat, None);
        assert_eq!(input.event_type.as_deref(), Some("shooting"));
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_note_input_accepts_snake_case_event_type() {
        let input: NoteInput = serde_json::from_value(serde_json::json!({
            "description": "x",
            "event_type": "patrol"
        }))
        .unwrap();
        assert_eq!(input.event_type.as_deref(), Some("patrol"));
    }

    #[test]
    fn test_note_input_rejects_blank_description() {
        let input = NoteInput {
            description: "   ".to_string(),
            ..Default::default()
        };
        assert!(matches!(input.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_note_input_rejects_non_finite_coordinates() {
        let input = NoteInput {
            description: "x".to_string(),
            lat: Some(f64::NAN),
            ..Default::default()
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_model_info_skips_missing_fields() {
        let info = ModelInfo {
            name: "gemma3:latest".to_string(),
            size: None,
            family: None,
            parameter_size: None,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"name":"gemma3:latest"}"#);
    }
}
