//! Extraction response parsing
//!
//! Turns the collaborator's raw JSON into an [`ExtractionResult`]. Parsing
//! never fails: anything that cannot be used is dropped and reported as a
//! [`ResponseIssue`], so a bad response degrades to an emptier result.

use crate::models::{
    Budget, ConfidenceLevel, ConfidenceParse, ExtractedField, ExtractionResult, FieldValue,
    ProjectInfo, TeamMember, Timeline,
};
use jsonschema::Validator;
use serde::Deserialize;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;

/// Role given to a principal investigator reported without one
pub const DEFAULT_PI_ROLE: &str = "Principal Investigator";

const DEFAULT_CO_INVESTIGATOR_ROLE: &str = "Co-Investigator";

const DEFAULT_PERSONNEL_ROLE: &str = "Personnel";

/// Something in the response that was dropped, defaulted or ignored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseIssue {
    /// JSON pointer into the response, empty for the whole document
    pub path: String,
    pub message: String,
}

impl fmt::Display for ResponseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Decoded response plus everything that did not make it in
#[derive(Debug, Clone, Default)]
pub struct ParsedResponse {
    pub result: ExtractionResult,
    pub issues: Vec<ResponseIssue>,
}

/// Parse a raw collaborator response. Validation flags and metadata are left
/// for the caller to fill in.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let mut decoder = ResponseDecoder::default();

    let value: JsonValue = match serde_json::from_str(raw.trim()) {
        Ok(value) => value,
        Err(e) => {
            decoder.issue("", format!("response is not valid JSON: {}", e));
            return decoder.finish(ExtractionResult::default());
        }
    };

    let Some(object) = value.as_object() else {
        decoder.issue("", "response is not a JSON object");
        return decoder.finish(ExtractionResult::default());
    };

    decoder.check_schema(&value);
    let result = decoder.result(object);
    decoder.finish(result)
}

/// Schema the collaborator is asked to follow
pub fn response_schema() -> JsonValue {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "definitions": {
            "field": {
                "type": ["object", "null"],
                "properties": {
                    "value": {
                        "type": ["string", "number", "array", "null"],
                        "items": {"type": "string"}
                    },
                    "confidence": {"type": "string"},
                    "source_text": {"type": ["string", "null"]},
                    "alternatives": {"type": "array", "items": {"type": "string"}}
                }
            },
            "fields": {
                "anyOf": [
                    {"$ref": "#/definitions/field"},
                    {"type": "array", "items": {"$ref": "#/definitions/field"}}
                ]
            },
            "member": {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": {"$ref": "#/definitions/field"},
                    "role": {"$ref": "#/definitions/field"},
                    "institution": {"$ref": "#/definitions/field"},
                    "email": {"$ref": "#/definitions/field"}
                }
            }
        },
        "properties": {
            "grant_id": {"$ref": "#/definitions/field"},
            "grant_name": {"$ref": "#/definitions/field"},
            "funding_agency": {"$ref": "#/definitions/field"},
            "award_amount": {"$ref": "#/definitions/field"},
            "grant_type": {"$ref": "#/definitions/field"},
            "current_status": {"$ref": "#/definitions/field"},
            "progress_notes": {"$ref": "#/definitions/field"},
            "timeline": {
                "type": "object",
                "properties": {
                    "application_date": {"$ref": "#/definitions/field"},
                    "award_date": {"$ref": "#/definitions/field"},
                    "project_start_date": {"$ref": "#/definitions/field"},
                    "project_end_date": {"$ref": "#/definitions/field"},
                    "duration_months": {"$ref": "#/definitions/field"}
                }
            },
            "principal_investigator": {"$ref": "#/definitions/member"},
            "co_investigators": {"type": "array", "items": {"$ref": "#/definitions/member"}},
            "other_personnel": {"type": "array", "items": {"$ref": "#/definitions/member"}},
            "proposal_document": {"type": ["string", "null"]},
            "award_letter": {"type": ["string", "null"]},
            "related_documents": {"type": "array", "items": {"type": "string"}},
            "custom_fields": {
                "type": "object",
                "additionalProperties": {"$ref": "#/definitions/field"}
            },
            "project": {
                "type": "object",
                "properties": {
                    "title": {"$ref": "#/definitions/field"},
                    "abstract": {"$ref": "#/definitions/field"},
                    "objectives": {"$ref": "#/definitions/fields"},
                    "keywords": {"$ref": "#/definitions/fields"},
                    "technical_approach": {"$ref": "#/definitions/field"}
                }
            },
            "budget": {
                "type": "object",
                "properties": {
                    "personnel": {"$ref": "#/definitions/field"},
                    "equipment": {"$ref": "#/definitions/field"},
                    "travel": {"$ref": "#/definitions/field"},
                    "supplies": {"$ref": "#/definitions/field"},
                    "indirect_costs": {"$ref": "#/definitions/field"},
                    "other": {"$ref": "#/definitions/field"},
                    "total": {"$ref": "#/definitions/field"}
                }
            }
        }
    })
}

/// Field as the collaborator writes it, before confidence and value checks
#[derive(Debug, Deserialize)]
struct RawField {
    #[serde(default)]
    value: JsonValue,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    source_text: Option<String>,
    #[serde(default)]
    alternatives: Vec<String>,
    #[serde(flatten)]
    extra: Map<String, JsonValue>,
}

#[derive(Debug, Default)]
struct ResponseDecoder {
    issues: Vec<ResponseIssue>,
}

impl ResponseDecoder {
    fn issue(&mut self, path: impl Into<String>, message: impl Into<String>) {
        let issue = ResponseIssue {
            path: path.into(),
            message: message.into(),
        };
        tracing::debug!(issue = %issue, "extraction response issue");
        self.issues.push(issue);
    }

    fn finish(self, result: ExtractionResult) -> ParsedResponse {
        if !self.issues.is_empty() {
            tracing::warn!(count = self.issues.len(), "extraction response had issues");
        }
        ParsedResponse {
            result,
            issues: self.issues,
        }
    }

    fn check_schema(&mut self, value: &JsonValue) {
        let validator = match Validator::new(&response_schema()) {
            Ok(validator) => validator,
            Err(e) => {
                tracing::error!(error = %e, "response schema failed to compile, skipping check");
                return;
            }
        };

        let violations: Vec<(String, String)> = validator
            .iter_errors(value)
            .map(|error| (error.instance_path.to_string(), error.to_string()))
            .collect();
        for (path, message) in violations {
            self.issue(path, message);
        }
    }

    // =========================================================================
    // Sections
    // =========================================================================

    fn result(&mut self, object: &Map<String, JsonValue>) -> ExtractionResult {
        let mut result = ExtractionResult::default();

        for (key, value) in object {
            let path = format!("/{}", key);
            match key.as_str() {
                "grant_id" => result.grant_id = self.field(&path, value),
                "grant_name" => result.grant_name = self.field(&path, value),
                "funding_agency" => result.funding_agency = self.field(&path, value),
                "award_amount" => result.award_amount = self.field(&path, value),
                "grant_type" => result.grant_type = self.field(&path, value),
                "current_status" => result.current_status = self.field(&path, value),
                "progress_notes" => result.progress_notes = self.field(&path, value),
                "timeline" => result.timeline = self.timeline(&path, value),
                "principal_investigator" => {
                    result.principal_investigator = self.member(&path, value, DEFAULT_PI_ROLE)
                }
                "co_investigators" => {
                    result.co_investigators =
                        self.members(&path, value, DEFAULT_CO_INVESTIGATOR_ROLE)
                }
                "other_personnel" => {
                    result.other_personnel = self.members(&path, value, DEFAULT_PERSONNEL_ROLE)
                }
                "proposal_document" => result.proposal_document = self.link(&path, value),
                "award_letter" => result.award_letter = self.link(&path, value),
                "related_documents" => result.related_documents = self.links(&path, value),
                "custom_fields" => result.custom_fields = self.custom_fields(&path, value),
                "project" => result.project = self.project(&path, value),
                "budget" => result.budget = self.budget(&path, value),
                "extraction_metadata" | "validation_flags" => {
                    self.issue(path, "computed locally, ignored")
                }
                _ => self.issue(path, "unknown key ignored"),
            }
        }

        result
    }

    fn section<'a>(
        &mut self,
        path: &str,
        value: &'a JsonValue,
    ) -> Option<&'a Map<String, JsonValue>> {
        match value {
            JsonValue::Object(map) => Some(map),
            JsonValue::Null => None,
            _ => {
                self.issue(path, "section is not an object, dropped");
                None
            }
        }
    }

    fn timeline(&mut self, path: &str, value: &JsonValue) -> Timeline {
        let mut timeline = Timeline::default();
        let Some(map) = self.section(path, value) else {
            return timeline;
        };

        for (key, value) in map {
            let path = format!("{}/{}", path, key);
            match key.as_str() {
                "application_date" => timeline.application_date = self.field(&path, value),
                "award_date" => timeline.award_date = self.field(&path, value),
                "project_start_date" => timeline.project_start_date = self.field(&path, value),
                "project_end_date" => timeline.project_end_date = self.field(&path, value),
                "duration_months" => timeline.duration_months = self.field(&path, value),
                _ => self.issue(path, "unknown key ignored"),
            }
        }
        timeline
    }

    fn project(&mut self, path: &str, value: &JsonValue) -> ProjectInfo {
        let mut project = ProjectInfo::default();
        let Some(map) = self.section(path, value) else {
            return project;
        };

        for (key, value) in map {
            let path = format!("{}/{}", path, key);
            match key.as_str() {
                "title" => project.title = self.field(&path, value),
                "abstract" => project.abstract_text = self.field(&path, value),
                "objectives" => project.objectives = self.field_list(&path, value),
                "keywords" => project.keywords = self.field_list(&path, value),
                "technical_approach" => project.technical_approach = self.field(&path, value),
                _ => self.issue(path, "unknown key ignored"),
            }
        }
        project
    }

    fn budget(&mut self, path: &str, value: &JsonValue) -> Budget {
        let mut budget = Budget::default();
        let Some(map) = self.section(path, value) else {
            return budget;
        };

        for (key, value) in map {
            let path = format!("{}/{}", path, key);
            let slot = match key.as_str() {
                "personnel" => &mut budget.personnel,
                "equipment" => &mut budget.equipment,
                "travel" => &mut budget.travel,
                "supplies" => &mut budget.supplies,
                "indirect_costs" => &mut budget.indirect_costs,
                "other" => &mut budget.other,
                "total" => &mut budget.total,
                _ => {
                    self.issue(path, "unknown key ignored");
                    continue;
                }
            };
            *slot = self.field(&path, value);
        }
        budget
    }

    fn members(&mut self, path: &str, value: &JsonValue, default_role: &str) -> Vec<TeamMember> {
        match value {
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| self.member(&format!("{}/{}", path, i), item, default_role))
                .collect(),
            JsonValue::Null => Vec::new(),
            _ => {
                self.issue(path, "expected a list of team members, dropped");
                Vec::new()
            }
        }
    }

    fn custom_fields(&mut self, path: &str, value: &JsonValue) -> BTreeMap<String, ExtractedField> {
        let Some(map) = self.section(path, value) else {
            return BTreeMap::new();
        };

        map.iter()
            .filter_map(|(key, value)| {
                let field = self.field(&format!("{}/{}", path, key), value)?;
                Some((key.clone(), field))
            })
            .collect()
    }

    // =========================================================================
    // Document links
    // =========================================================================

    fn link(&mut self, path: &str, value: &JsonValue) -> Option<String> {
        match value {
            JsonValue::String(s) if !s.trim().is_empty() => Some(s.clone()),
            JsonValue::String(_) | JsonValue::Null => None,
            _ => {
                self.issue(path, "document link is not a string, dropped");
                None
            }
        }
    }

    fn links(&mut self, path: &str, value: &JsonValue) -> Vec<String> {
        match value {
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| self.link(&format!("{}/{}", path, i), item))
                .collect(),
            other => self.link(path, other).into_iter().collect(),
        }
    }

    // =========================================================================
    // Members and fields
    // =========================================================================

    fn member(&mut self, path: &str, value: &JsonValue, default_role: &str) -> Option<TeamMember> {
        let map = self.section(path, value)?;

        let mut name = None;
        let mut role = None;
        let mut institution = None;
        let mut email = None;
        for (key, value) in map {
            let path = format!("{}/{}", path, key);
            match key.as_str() {
                "name" => name = self.field(&path, value),
                "role" => role = self.field(&path, value),
                "institution" => institution = self.field(&path, value),
                "email" => email = self.field(&path, value),
                _ => self.issue(path, "unknown key ignored"),
            }
        }

        let Some(name) = name else {
            self.issue(path, "team member has no name, dropped");
            return None;
        };
        let role = role.unwrap_or_else(|| {
            self.issue(
                format!("{}/role", path),
                format!("missing, defaulted to '{}'", default_role),
            );
            ExtractedField::new(default_role, ConfidenceLevel::High)
        });

        Some(TeamMember {
            name,
            role,
            institution,
            email,
        })
    }

    fn field_list(&mut self, path: &str, value: &JsonValue) -> Vec<ExtractedField> {
        match value {
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| self.field(&format!("{}/{}", path, i), item))
                .collect(),
            other => self.field(path, other).into_iter().collect(),
        }
    }

    /// Decode one `{value, confidence}` object. A null value means the
    /// collaborator found nothing, so no field is kept.
    fn field(&mut self, path: &str, value: &JsonValue) -> Option<ExtractedField> {
        if value.is_null() {
            return None;
        }
        if !value.is_object() {
            self.issue(path, "field is not an object, dropped");
            return None;
        }

        let raw: RawField = match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                self.issue(path, format!("field dropped: {}", e));
                return None;
            }
        };

        for key in raw.extra.keys() {
            self.issue(format!("{}/{}", path, key), "unknown key ignored");
        }

        let confidence = match raw.confidence.as_deref().map(ConfidenceLevel::parse) {
            Some(ConfidenceParse::Known(level)) => level,
            Some(ConfidenceParse::Unknown(original)) => {
                self.issue(
                    format!("{}/confidence", path),
                    format!("unknown confidence '{}', treated as uncertain", original),
                );
                ConfidenceLevel::Uncertain
            }
            None => {
                self.issue(
                    format!("{}/confidence", path),
                    "missing, treated as uncertain",
                );
                ConfidenceLevel::Uncertain
            }
        };

        let value = match raw.value {
            JsonValue::Null => return None,
            JsonValue::Number(n) => match n.as_f64() {
                Some(n) => FieldValue::Number(n),
                None => {
                    self.issue(format!("{}/value", path), "number out of range, dropped");
                    return None;
                }
            },
            JsonValue::String(s) => FieldValue::Text(s),
            JsonValue::Array(items) => {
                let strings: Option<Vec<String>> = items
                    .into_iter()
                    .map(|item| match item {
                        JsonValue::String(s) => Some(s),
                        _ => None,
                    })
                    .collect();
                match strings {
                    Some(strings) => FieldValue::List(strings),
                    None => {
                        self.issue(format!("{}/value", path), "list of non-strings, dropped");
                        return None;
                    }
                }
            }
            JsonValue::Bool(_) | JsonValue::Object(_) => {
                self.issue(format!("{}/value", path), "unsupported value type, dropped");
                return None;
            }
        };

        Some(ExtractedField {
            value: Some(value),
            confidence,
            source_text: raw.source_text,
            alternatives: raw.alternatives,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{FieldExtractor, SimulatedExtractor};

    fn has_issue(parsed: &ParsedResponse, path: &str) -> bool {
        parsed.issues.iter().any(|i| i.path == path)
    }

    #[test]
    fn test_simulated_response_parses_cleanly() {
        let raw = SimulatedExtractor::new().extract_fields("text").unwrap();
        let parsed = parse_response(&raw);

        assert!(parsed.issues.is_empty(), "issues: {:?}", parsed.issues);
        let result = parsed.result;
        assert_eq!(
            result.grant_id.as_ref().unwrap().value,
            Some(FieldValue::from("SIMULATED-2024-001"))
        );
        assert_eq!(
            result.award_amount.as_ref().unwrap().value,
            Some(FieldValue::Number(100000.0))
        );
        assert_eq!(
            result.timeline.project_start_date.as_ref().unwrap().confidence,
            ConfidenceLevel::Low
        );
        assert!(result.project.abstract_text.is_some());
        assert!(result.budget.total.is_some());
        assert!(result.has_principal_investigator());
    }

    #[test]
    fn test_non_json_degrades_to_empty() {
        let parsed = parse_response("Sorry, I cannot help with that.");
        assert_eq!(parsed.result, ExtractionResult::default());
        assert_eq!(parsed.issues.len(), 1);
        assert!(parsed.issues[0].message.contains("not valid JSON"));

        let parsed = parse_response("[1, 2, 3]");
        assert_eq!(parsed.result, ExtractionResult::default());
        assert_eq!(parsed.issues.len(), 1);
    }

    #[test]
    fn test_pi_role_defaults() {
        let parsed = parse_response(
            r#"{"principal_investigator": {"name": {"value": "Dr. Ada", "confidence": "high"}}}"#,
        );

        assert!(has_issue(&parsed, "/principal_investigator/role"));
        let pi = parsed.result.principal_investigator.unwrap();
        assert_eq!(pi.role.value, Some(FieldValue::from(DEFAULT_PI_ROLE)));
        assert_eq!(pi.role.confidence, ConfidenceLevel::High);
    }

    #[test]
    fn test_pi_without_name_dropped() {
        let parsed = parse_response(
            r#"{"principal_investigator": {"role": {"value": "PI", "confidence": "high"}}}"#,
        );
        assert!(parsed.result.principal_investigator.is_none());
        assert!(has_issue(&parsed, "/principal_investigator"));
    }

    #[test]
    fn test_unknown_confidence_reported() {
        let parsed =
            parse_response(r#"{"grant_id": {"value": "NSF-1", "confidence": "very sure"}}"#);

        assert_eq!(
            parsed.result.grant_id.unwrap().confidence,
            ConfidenceLevel::Uncertain
        );
        let issue = parsed
            .issues
            .iter()
            .find(|i| i.path == "/grant_id/confidence")
            .unwrap();
        assert!(issue.message.contains("very sure"));
    }

    #[test]
    fn test_unknown_keys_reported() {
        let parsed = parse_response(
            r#"{
                "grant_title": {"value": "x", "confidence": "high"},
                "budget": {"salaries": {"value": 1, "confidence": "high"}},
                "grant_id": {"value": "A", "confidence": "high", "page": 3}
            }"#,
        );

        assert!(has_issue(&parsed, "/grant_title"));
        assert!(has_issue(&parsed, "/budget/salaries"));
        assert!(has_issue(&parsed, "/grant_id/page"));
        assert!(parsed.result.grant_id.is_some());
    }

    #[test]
    fn test_invalid_section_dropped_others_kept() {
        let parsed = parse_response(
            r#"{
                "timeline": "2024 to 2026",
                "grant_name": {"value": "Kept", "confidence": "medium"},
                "award_amount": {"value": true, "confidence": "high"}
            }"#,
        );

        assert_eq!(parsed.result.timeline, Timeline::default());
        assert!(parsed.result.award_amount.is_none());
        assert!(parsed.result.grant_name.is_some());
        assert!(has_issue(&parsed, "/timeline"));
        assert!(has_issue(&parsed, "/award_amount/value"));
    }

    #[test]
    fn test_null_value_means_not_found() {
        let parsed =
            parse_response(r#"{"funding_agency": {"value": null, "confidence": "uncertain"}}"#);
        assert!(parsed.result.funding_agency.is_none());
        assert!(parsed.issues.is_empty());
    }

    #[test]
    fn test_lists_and_co_investigators() {
        let parsed = parse_response(
            r#"{
                "project": {
                    "objectives": [
                        {"value": "Build models", "confidence": "high"},
                        {"value": "Publish", "confidence": "medium"}
                    ],
                    "keywords": {"value": ["ai", "grants"], "confidence": "low"}
                },
                "co_investigators": [
                    {"name": {"value": "Dr. Bo", "confidence": "medium"}},
                    {"institution": {"value": "MIT", "confidence": "high"}}
                ]
            }"#,
        );

        let result = parsed.result;
        assert_eq!(result.project.objectives.len(), 2);
        assert_eq!(
            result.project.keywords[0].value,
            Some(FieldValue::List(vec!["ai".into(), "grants".into()]))
        );
        assert_eq!(result.co_investigators.len(), 1);
        assert_eq!(
            result.co_investigators[0].role.value,
            Some(FieldValue::from("Co-Investigator"))
        );
    }

    #[test]
    fn test_personnel_links_and_custom_fields() {
        let parsed = parse_response(
            r#"{
                "timeline": {"duration_months": {"value": 36, "confidence": "medium"}},
                "other_personnel": [{"name": {"value": "J. Doe", "confidence": "high"}}],
                "award_letter": "letters/nsf-1.pdf",
                "related_documents": ["budget.xlsx", 7],
                "custom_fields": {
                    "cfda_number": {"value": "47.070", "confidence": "high"},
                    "program_officer": "Dr. Kim"
                }
            }"#,
        );

        let result = parsed.result;
        assert_eq!(
            result.timeline.duration_months.unwrap().value,
            Some(FieldValue::Number(36.0))
        );
        assert_eq!(
            result.other_personnel[0].role.value,
            Some(FieldValue::from(DEFAULT_PERSONNEL_ROLE))
        );
        assert_eq!(result.award_letter.as_deref(), Some("letters/nsf-1.pdf"));
        assert_eq!(result.related_documents, vec!["budget.xlsx"]);
        assert_eq!(result.custom_fields.len(), 1);
        assert!(result.custom_fields.contains_key("cfda_number"));

        assert!(parsed.issues.iter().any(|i| i.path == "/related_documents/1"));
        assert!(parsed
            .issues
            .iter()
            .any(|i| i.path == "/custom_fields/program_officer"));
    }

    #[test]
    fn test_schema_compiles() {
        assert!(Validator::new(&response_schema()).is_ok());
    }
}
