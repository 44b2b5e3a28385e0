//! Extraction Consistency Validator
//!
//! Checks an extraction result for internal consistency:
//! - Required identifying fields are present
//! - Project start date precedes end date
//! - Budget components add up to the stated total
//! - Award amount is in a plausible range
//! - Top-level fields extracted with low confidence
//!
//! Every rule runs; none short-circuits another. Unparseable values become
//! flags, never errors.

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::extraction::field_present;
use crate::models::{ExtractedField, ExtractionResult, FieldValue, ValidationFlags};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Allowed gap between the stated budget total and the sum of its lines
pub const BUDGET_TOLERANCE: f64 = 1000.0;

/// Award amounts above this are flagged as unusually high
pub const AWARD_CEILING: f64 = 50_000_000.0;

/// Validate an extraction result. Pure and deterministic.
pub fn validate(result: &ExtractionResult) -> ValidationFlags {
    let mut flags = ValidationFlags::default();

    check_required_fields(result, &mut flags);
    check_dates(result, &mut flags);
    check_budget(result, &mut flags);
    check_award_amount(result, &mut flags);
    check_confidence(result, &mut flags);

    flags.finalize()
}

/// Validate and attach the flags, returning the finished result
pub fn validated(mut result: ExtractionResult) -> ExtractionResult {
    result.validation_flags = validate(&result);
    result
}

// =============================================================================
// Required fields
// =============================================================================

fn check_required_fields(result: &ExtractionResult, flags: &mut ValidationFlags) {
    let required = [
        ("grant_id", field_present(&result.grant_id)),
        ("grant_name", field_present(&result.grant_name)),
        ("funding_agency", field_present(&result.funding_agency)),
        ("award_amount", field_present(&result.award_amount)),
        ("principal_investigator", result.has_principal_investigator()),
    ];

    for (name, present) in required {
        if !present {
            flags.missing_required_fields.push(name.to_string());
        }
    }
}

// =============================================================================
// Dates
// =============================================================================

fn check_dates(result: &ExtractionResult, flags: &mut ValidationFlags) {
    let timeline = &result.timeline;
    let (Some(start), Some(end)) = (
        present(&timeline.project_start_date),
        present(&timeline.project_end_date),
    ) else {
        return;
    };

    let start_date = parse_calendar_date("project_start_date", start);
    let end_date = parse_calendar_date("project_end_date", end);

    match (start_date, end_date) {
        (Ok(start_date), Ok(end_date)) => {
            if start_date >= end_date {
                flags.inconsistent_dates.push(format!(
                    "Project start date ({}) is not before end date ({})",
                    start, end
                ));
            }
        }
        (start_date, end_date) => {
            let reasons: Vec<String> = [start_date.err(), end_date.err()]
                .into_iter()
                .flatten()
                .map(|e| e.to_string())
                .collect();
            flags
                .inconsistent_dates
                .push(format!("Invalid date format: {}", reasons.join("; ")));
        }
    }
}

/// Parse an ISO calendar date or date-time
fn parse_calendar_date(field: &str, value: &FieldValue) -> WorkflowResult<NaiveDateTime> {
    let Some(raw) = value.as_text().map(str::trim) else {
        return Err(WorkflowError::degraded(
            field,
            format!("'{}' is not an ISO date", value),
        ));
    };

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(datetime);
        }
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Ok(datetime.naive_utc());
    }

    Err(WorkflowError::degraded(
        field,
        format!("'{}' is not an ISO date", raw),
    ))
}

// =============================================================================
// Budget
// =============================================================================

fn check_budget(result: &ExtractionResult, flags: &mut ValidationFlags) {
    let budget = &result.budget;
    let Some(total_value) = present(&budget.total) else {
        return;
    };

    let total = match number("budget.total", total_value) {
        Ok(total) => total,
        Err(e) => {
            flags
                .budget_calculation_errors
                .push(format!("Invalid budget total format: {}", e));
            return;
        }
    };

    let mut calculated = 0.0;
    for (name, field) in budget.components() {
        let Some(value) = field.and_then(ExtractedField::present_value) else {
            continue;
        };
        match number(name, value) {
            Ok(amount) => calculated += amount,
            Err(e) => tracing::debug!(error = %e, "skipping non-numeric budget line"),
        }
    }

    if (total - calculated).abs() > BUDGET_TOLERANCE {
        flags.budget_calculation_errors.push(format!(
            "Budget total ({}) doesn't match sum of components ({})",
            total, calculated
        ));
    }
}

// =============================================================================
// Award amount
// =============================================================================

fn check_award_amount(result: &ExtractionResult, flags: &mut ValidationFlags) {
    let Some(value) = present(&result.award_amount) else {
        return;
    };

    match number("award_amount", value) {
        Ok(amount) if amount <= 0.0 => flags
            .suspicious_values
            .push("Award amount is zero or negative".to_string()),
        Ok(amount) if amount > AWARD_CEILING => flags
            .suspicious_values
            .push(format!("Award amount seems unusually high ({})", amount)),
        Ok(_) => {}
        Err(_) => flags
            .suspicious_values
            .push(format!("Award amount is not a valid number ({})", value)),
    }
}

// =============================================================================
// Confidence
// =============================================================================

fn check_confidence(result: &ExtractionResult, flags: &mut ValidationFlags) {
    let low: Vec<&str> = result
        .top_level_fields()
        .into_iter()
        .filter_map(|(name, field)| field.map(|f| (name, f)))
        .filter(|(_, field)| field.is_present() && field.confidence.is_low())
        .map(|(name, _)| name)
        .collect();

    if !low.is_empty() {
        flags
            .suspicious_values
            .push(format!("Low confidence extraction for: {}", low.join(", ")));
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn present(field: &Option<ExtractedField>) -> Option<&FieldValue> {
    field.as_ref().and_then(ExtractedField::present_value)
}

fn number(field: &str, value: &FieldValue) -> WorkflowResult<f64> {
    value
        .as_number()
        .map_err(|reason| WorkflowError::degraded(field, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceLevel, TeamMember};

    fn field(value: impl Into<FieldValue>) -> Option<ExtractedField> {
        Some(ExtractedField::new(value, ConfidenceLevel::High))
    }

    fn complete_result() -> ExtractionResult {
        let mut result = ExtractionResult {
            grant_id: field("NSF-2024-001"),
            grant_name: field("AI Research Initiative"),
            funding_agency: field("National Science Foundation"),
            award_amount: field(500000.0),
            principal_investigator: Some(TeamMember {
                name: ExtractedField::new("Dr. Jane Smith", ConfidenceLevel::High),
                role: ExtractedField::new("Principal Investigator", ConfidenceLevel::High),
                institution: None,
                email: None,
            }),
            ..Default::default()
        };
        result.timeline.project_start_date = field("2024-01-01");
        result.timeline.project_end_date = field("2026-12-31");
        result
    }

    #[test]
    fn test_complete_result_is_clean() {
        let flags = validate(&complete_result());
        assert!(flags.is_clean(), "unexpected flags: {:?}", flags);
        assert!(!flags.needs_human_review());
    }

    #[test]
    fn test_missing_required_fields_in_order() {
        let flags = validate(&ExtractionResult::default());
        assert_eq!(
            flags.missing_required_fields(),
            &[
                "grant_id",
                "grant_name",
                "funding_agency",
                "award_amount",
                "principal_investigator"
            ]
        );
        assert!(flags.needs_human_review());
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let mut result = complete_result();
        result.grant_name = field("   ");
        result.principal_investigator.as_mut().unwrap().name =
            ExtractedField::missing(ConfidenceLevel::High);

        let flags = validate(&result);
        assert_eq!(
            flags.missing_required_fields(),
            &["grant_name", "principal_investigator"]
        );
    }

    #[test]
    fn test_start_after_end_is_inconsistent() {
        let mut result = complete_result();
        result.timeline.project_start_date = field("2026-01-01");
        result.timeline.project_end_date = field("2024-01-01");

        let flags = validate(&result);
        assert_eq!(flags.inconsistent_dates().len(), 1);
        assert!(flags.inconsistent_dates()[0].contains("2026-01-01"));
        assert!(flags.needs_human_review());
    }

    #[test]
    fn test_equal_dates_are_inconsistent() {
        let mut result = complete_result();
        result.timeline.project_start_date = field("2025-06-30");
        result.timeline.project_end_date = field("2025-06-30");

        assert_eq!(validate(&result).inconsistent_dates().len(), 1);
    }

    #[test]
    fn test_datetime_values_accepted() {
        let mut result = complete_result();
        result.timeline.project_start_date = field("2024-01-01T09:00:00");
        result.timeline.project_end_date = field("2024-01-01T17:00:00");

        assert!(validate(&result).inconsistent_dates().is_empty());
    }

    #[test]
    fn test_unparseable_date_gets_distinct_message() {
        let mut result = complete_result();
        result.timeline.project_end_date = field("end of 2026");

        let flags = validate(&result);
        assert_eq!(flags.inconsistent_dates().len(), 1);
        let message = &flags.inconsistent_dates()[0];
        assert!(message.starts_with("Invalid date format"));
        assert!(message.contains("project_end_date"));
        assert!(!message.contains("project_start_date"));
    }

    #[test]
    fn test_single_date_not_checked() {
        let mut result = complete_result();
        result.timeline.project_end_date = None;
        result.timeline.project_start_date = field("garbage");

        assert!(validate(&result).inconsistent_dates().is_empty());
    }

    #[test]
    fn test_budget_within_tolerance() {
        let mut result = complete_result();
        result.budget.total = field(10000.0);
        result.budget.personnel = field(6000.0);
        result.budget.travel = field("3001");

        assert!(validate(&result).budget_calculation_errors().is_empty());

        result.budget.travel = field(4999.0);
        assert!(validate(&result).budget_calculation_errors().is_empty());
    }

    #[test]
    fn test_budget_mismatch_reports_both_figures() {
        let mut result = complete_result();
        result.budget.total = field(10000.0);
        result.budget.personnel = field(5000.0);
        result.budget.equipment = field(2000.0);
        result.budget.indirect_costs = field(1000.0);

        let flags = validate(&result);
        assert_eq!(flags.budget_calculation_errors().len(), 1);
        let message = &flags.budget_calculation_errors()[0];
        assert!(message.contains("10000"));
        assert!(message.contains("8000"));
        assert!(flags.needs_human_review());
    }

    #[test]
    fn test_budget_non_numeric_total() {
        let mut result = complete_result();
        result.budget.total = field("about ten thousand");
        result.budget.personnel = field(5.0);

        let flags = validate(&result);
        assert_eq!(flags.budget_calculation_errors().len(), 1);
        assert!(flags.budget_calculation_errors()[0].starts_with("Invalid budget total format"));
    }

    #[test]
    fn test_budget_skips_non_numeric_components() {
        let mut result = complete_result();
        result.budget.total = field(5000.0);
        result.budget.personnel = field(5000.0);
        result.budget.other = field("n/a");

        assert!(validate(&result).budget_calculation_errors().is_empty());
    }

    #[test]
    fn test_negative_award() {
        let mut result = complete_result();
        result.award_amount = field(-5.0);

        let flags = validate(&result);
        assert_eq!(flags.suspicious_values(), &["Award amount is zero or negative"]);
    }

    #[test]
    fn test_zero_award_is_present_and_flagged() {
        let mut result = complete_result();
        result.award_amount = field(0.0);

        let flags = validate(&result);
        assert!(flags.missing_required_fields().is_empty());
        assert_eq!(flags.suspicious_values(), &["Award amount is zero or negative"]);
    }

    #[test]
    fn test_unusually_high_award() {
        let mut result = complete_result();
        result.award_amount = field(60000000.0);

        let flags = validate(&result);
        assert_eq!(flags.suspicious_values().len(), 1);
        assert!(flags.suspicious_values()[0].starts_with("Award amount seems unusually high"));
    }

    #[test]
    fn test_non_numeric_award() {
        let mut result = complete_result();
        result.award_amount = field("$1.2M");

        let flags = validate(&result);
        assert_eq!(flags.suspicious_values().len(), 1);
        assert!(flags.suspicious_values()[0].starts_with("Award amount is not a valid number"));
        assert!(!flags.needs_human_review());
    }

    #[test]
    fn test_low_confidence_fields_combined() {
        let mut result = complete_result();
        result.grant_id.as_mut().unwrap().confidence = ConfidenceLevel::Low;
        result.funding_agency.as_mut().unwrap().confidence = ConfidenceLevel::Uncertain;
        result.grant_type = Some(ExtractedField::missing(ConfidenceLevel::Uncertain));

        let flags = validate(&result);
        assert_eq!(
            flags.suspicious_values(),
            &["Low confidence extraction for: grant_id, funding_agency"]
        );
    }

    #[test]
    fn test_two_suspicious_entries_do_not_force_review() {
        let mut result = complete_result();
        result.award_amount = Some(ExtractedField::new(-1.0, ConfidenceLevel::Low));
        result.grant_id.as_mut().unwrap().confidence = ConfidenceLevel::Low;

        // zero/negative + one combined low-confidence entry
        let flags = validate(&result);
        assert_eq!(flags.suspicious_values().len(), 2);
        assert!(!flags.needs_human_review());
    }

    #[test]
    fn test_validate_is_deterministic_and_pure() {
        let result = complete_result();
        let before = result.clone();

        let first = validate(&result);
        let second = validate(&result);
        assert_eq!(first, second);
        assert_eq!(result, before);
    }

    #[test]
    fn test_validated_recomputes_stale_flags() {
        let mut stale = ExtractionResult::default();
        stale.validation_flags = validate(&complete_result());
        assert!(!stale.validation_flags.needs_human_review());

        let result = validated(stale);
        assert!(result.validation_flags.needs_human_review());
    }
}
