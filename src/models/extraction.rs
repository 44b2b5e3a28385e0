//! Confidence-annotated extraction model
//!
//! Every value produced by the AI collaborator is wrapped in an
//! [`ExtractedField`] carrying a [`ConfidenceLevel`]. A field counts as
//! extracted only when its value is present (see [`Presence`]).

use super::document::timestamp;
use super::validation::ValidationFlags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Coarse confidence rating attached to an extracted field.
///
/// Ordered `Uncertain < Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    /// Below 50%
    #[default]
    Uncertain,
    /// 50-69%
    Low,
    /// 70-89%
    Medium,
    /// 90-100%
    High,
}

/// Outcome of parsing a confidence string from collaborator output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfidenceParse {
    Known(ConfidenceLevel),
    /// Unrecognised input, kept verbatim. Treated as [`ConfidenceLevel::Uncertain`].
    Unknown(String),
}

impl ConfidenceParse {
    /// Effective level
    pub fn level(&self) -> ConfidenceLevel {
        match self {
            ConfidenceParse::Known(level) => *level,
            ConfidenceParse::Unknown(_) => ConfidenceLevel::Uncertain,
        }
    }
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Uncertain => "uncertain",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }

    /// Parse a confidence string, case-insensitively
    pub fn parse(raw: &str) -> ConfidenceParse {
        match raw.trim().to_lowercase().as_str() {
            "high" => ConfidenceParse::Known(ConfidenceLevel::High),
            "medium" => ConfidenceParse::Known(ConfidenceLevel::Medium),
            "low" => ConfidenceParse::Known(ConfidenceLevel::Low),
            "uncertain" => ConfidenceParse::Known(ConfidenceLevel::Uncertain),
            _ => ConfidenceParse::Unknown(raw.to_string()),
        }
    }

    /// True for `Low` and `Uncertain`
    pub fn is_low(&self) -> bool {
        *self <= ConfidenceLevel::Low
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presence predicate shared by the validator and serialization
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl Presence for String {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

/// Loosely-typed extracted value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Numeric interpretation of the value
    pub fn as_number(&self) -> Result<f64, String> {
        match self {
            FieldValue::Number(n) => Ok(*n),
            FieldValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| format!("'{}' is not a number", s)),
            FieldValue::List(_) => Err("a list is not a number".to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl Presence for FieldValue {
    fn is_present(&self) -> bool {
        match self {
            FieldValue::Number(_) => true,
            FieldValue::Text(s) => !s.trim().is_empty(),
            FieldValue::List(items) => items.iter().any(|item| !item.trim().is_empty()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

/// A value with its extraction confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractedField<T = FieldValue> {
    /// `None` means "not found"
    pub value: Option<T>,

    pub confidence: ConfidenceLevel,

    /// Document text the value was read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,

    /// Alternative interpretations, best first
    #[serde(default)]
    pub alternatives: Vec<String>,
}

impl<T> ExtractedField<T> {
    pub fn new(value: impl Into<T>, confidence: ConfidenceLevel) -> Self {
        Self {
            value: Some(value.into()),
            confidence,
            source_text: None,
            alternatives: Vec::new(),
        }
    }

    /// A field the collaborator reported but could not fill
    pub fn missing(confidence: ConfidenceLevel) -> Self {
        Self {
            value: None,
            confidence,
            source_text: None,
            alternatives: Vec::new(),
        }
    }
}

impl<T: Presence> ExtractedField<T> {
    pub fn is_present(&self) -> bool {
        self.value.as_ref().is_some_and(Presence::is_present)
    }

    /// The value, only if present
    pub fn present_value(&self) -> Option<&T> {
        self.value.as_ref().filter(|v| v.is_present())
    }
}

/// Presence of an optional field
pub fn field_present<T: Presence>(field: &Option<ExtractedField<T>>) -> bool {
    field.as_ref().is_some_and(ExtractedField::is_present)
}

/// Grant timeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Timeline {
    pub application_date: Option<ExtractedField>,
    pub award_date: Option<ExtractedField>,
    pub project_start_date: Option<ExtractedField>,
    pub project_end_date: Option<ExtractedField>,
    pub duration_months: Option<ExtractedField>,
}

/// A named person on the grant. Name and role are both required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeamMember {
    pub name: ExtractedField,
    pub role: ExtractedField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<ExtractedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<ExtractedField>,
}

/// Free-form project description fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProjectInfo {
    pub title: Option<ExtractedField>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<ExtractedField>,
    pub objectives: Vec<ExtractedField>,
    pub keywords: Vec<ExtractedField>,
    pub technical_approach: Option<ExtractedField>,
}

/// Budget breakdown. Every line is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Budget {
    pub personnel: Option<ExtractedField>,
    pub equipment: Option<ExtractedField>,
    pub travel: Option<ExtractedField>,
    pub supplies: Option<ExtractedField>,
    pub indirect_costs: Option<ExtractedField>,
    pub other: Option<ExtractedField>,
    pub total: Option<ExtractedField>,
}

impl Budget {
    /// Component lines summed against the total
    pub fn components(&self) -> [(&'static str, Option<&ExtractedField>); 6] {
        [
            ("personnel", self.personnel.as_ref()),
            ("equipment", self.equipment.as_ref()),
            ("travel", self.travel.as_ref()),
            ("supplies", self.supplies.as_ref()),
            ("indirect_costs", self.indirect_costs.as_ref()),
            ("other", self.other.as_ref()),
        ]
    }
}

fn default_extraction_version() -> String {
    "1.0".to_string()
}

/// How and from what an extraction was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionMetadata {
    pub source_document: String,
    #[serde(with = "timestamp")]
    pub extraction_timestamp: DateTime<Utc>,
    pub ai_model_used: String,
    pub processing_time_seconds: f64,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub file_size_bytes: Option<u64>,
    #[serde(default = "default_extraction_version")]
    pub extraction_version: String,
}

/// Structured output of one extraction run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExtractionResult {
    pub grant_id: Option<ExtractedField>,
    pub grant_name: Option<ExtractedField>,
    pub funding_agency: Option<ExtractedField>,
    pub award_amount: Option<ExtractedField>,
    pub grant_type: Option<ExtractedField>,

    pub timeline: Timeline,

    pub principal_investigator: Option<TeamMember>,
    pub co_investigators: Vec<TeamMember>,
    pub other_personnel: Vec<TeamMember>,

    pub project: ProjectInfo,
    pub budget: Budget,

    pub current_status: Option<ExtractedField>,
    pub progress_notes: Option<ExtractedField>,

    /// Paths or links to the documents behind the grant
    pub proposal_document: Option<String>,
    pub award_letter: Option<String>,
    pub related_documents: Vec<String>,

    pub extraction_metadata: Option<ExtractionMetadata>,
    pub validation_flags: ValidationFlags,

    /// Fields outside the fixed schema, by name
    pub custom_fields: BTreeMap<String, ExtractedField>,
}

impl ExtractionResult {
    /// Top-level single-value fields, in schema order
    pub fn top_level_fields(&self) -> [(&'static str, Option<&ExtractedField>); 7] {
        [
            ("grant_id", self.grant_id.as_ref()),
            ("grant_name", self.grant_name.as_ref()),
            ("funding_agency", self.funding_agency.as_ref()),
            ("award_amount", self.award_amount.as_ref()),
            ("grant_type", self.grant_type.as_ref()),
            ("current_status", self.current_status.as_ref()),
            ("progress_notes", self.progress_notes.as_ref()),
        ]
    }

    /// Whether the principal investigator has a usable name
    pub fn has_principal_investigator(&self) -> bool {
        self.principal_investigator
            .as_ref()
            .is_some_and(|pi| pi.name.is_present())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_ordering() {
        assert!(ConfidenceLevel::Uncertain < ConfidenceLevel::Low);
        assert!(ConfidenceLevel::Low < ConfidenceLevel::Medium);
        assert!(ConfidenceLevel::Medium < ConfidenceLevel::High);
        assert!(ConfidenceLevel::Low.is_low());
        assert!(ConfidenceLevel::Uncertain.is_low());
        assert!(!ConfidenceLevel::Medium.is_low());
    }

    #[test]
    fn test_confidence_parse_is_tagged() {
        assert_eq!(
            ConfidenceLevel::parse(" HIGH "),
            ConfidenceParse::Known(ConfidenceLevel::High)
        );
        let unknown = ConfidenceLevel::parse("very sure");
        assert_eq!(unknown, ConfidenceParse::Unknown("very sure".to_string()));
        assert_eq!(unknown.level(), ConfidenceLevel::Uncertain);
    }

    #[test]
    fn test_presence_trims_strings() {
        let blank: ExtractedField = ExtractedField::new("   ", ConfidenceLevel::High);
        let filled: ExtractedField = ExtractedField::new("NSF-1", ConfidenceLevel::Low);
        let missing: ExtractedField = ExtractedField::missing(ConfidenceLevel::High);
        let zero: ExtractedField = ExtractedField::new(0.0, ConfidenceLevel::High);

        assert!(!blank.is_present());
        assert!(filled.is_present());
        assert!(!missing.is_present());
        assert!(zero.is_present());
        assert!(!field_present(&None::<ExtractedField>));
    }

    #[test]
    fn test_field_value_numbers() {
        assert_eq!(FieldValue::from(" 1500.5 ").as_number().unwrap(), 1500.5);
        assert_eq!(FieldValue::Number(42.0).as_number().unwrap(), 42.0);
        assert!(FieldValue::from("$1,000").as_number().is_err());
        assert!(FieldValue::from("NaN").as_number().is_err());
    }

    #[test]
    fn test_untagged_values_deserialize() {
        let field: ExtractedField =
            serde_json::from_str(r#"{"value": 100000, "confidence": "medium"}"#).unwrap();
        assert_eq!(field.value, Some(FieldValue::Number(100000.0)));

        let field: ExtractedField =
            serde_json::from_str(r#"{"value": ["a", "b"], "confidence": "low"}"#).unwrap();
        assert_eq!(field.value, Some(FieldValue::List(vec!["a".into(), "b".into()])));

        let field: ExtractedField =
            serde_json::from_str(r#"{"value": null, "confidence": "high"}"#).unwrap();
        assert!(!field.is_present());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = serde_json::from_str::<ExtractionResult>(r#"{"grant_title": {}}"#);
        assert!(result.is_err());
    }
}
