pub mod extraction;

pub use extraction::{validate, validated, AWARD_CEILING, BUDGET_TOLERANCE};
