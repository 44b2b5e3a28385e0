use serde::{Deserialize, Serialize};

/// Data-quality flags for an extraction result.
///
/// Only the validator builds these; everything else reads them. The review
/// verdict is derived from the other lists when the flags are finalised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ValidationFlags {
    pub(crate) missing_required_fields: Vec<String>,
    pub(crate) inconsistent_dates: Vec<String>,
    pub(crate) budget_calculation_errors: Vec<String>,
    pub(crate) suspicious_values: Vec<String>,
    pub(crate) needs_human_review: bool,
}

/// Suspicious-value entries tolerated before review is forced
pub const SUSPICIOUS_REVIEW_THRESHOLD: usize = 2;

impl ValidationFlags {
    pub fn missing_required_fields(&self) -> &[String] {
        &self.missing_required_fields
    }

    pub fn inconsistent_dates(&self) -> &[String] {
        &self.inconsistent_dates
    }

    pub fn budget_calculation_errors(&self) -> &[String] {
        &self.budget_calculation_errors
    }

    pub fn suspicious_values(&self) -> &[String] {
        &self.suspicious_values
    }

    pub fn needs_human_review(&self) -> bool {
        self.needs_human_review
    }

    /// No flag of any kind was raised
    pub fn is_clean(&self) -> bool {
        self.missing_required_fields.is_empty()
            && self.inconsistent_dates.is_empty()
            && self.budget_calculation_errors.is_empty()
            && self.suspicious_values.is_empty()
    }

    /// Recompute the review verdict from the flag lists
    pub(crate) fn finalize(mut self) -> Self {
        self.needs_human_review = !self.missing_required_fields.is_empty()
            || !self.inconsistent_dates.is_empty()
            || !self.budget_calculation_errors.is_empty()
            || self.suspicious_values.len() > SUSPICIOUS_REVIEW_THRESHOLD;
        self
    }

    /// Flag messages grouped by category, for display
    pub fn grouped(&self) -> Vec<(&'static str, Vec<String>)> {
        vec![
            (
                "Missing required fields",
                self.missing_required_fields.clone(),
            ),
            ("Inconsistent dates", self.inconsistent_dates.clone()),
            (
                "Budget calculation errors",
                self.budget_calculation_errors.clone(),
            ),
            ("Suspicious values", self.suspicious_values.clone()),
        ]
    }
}
