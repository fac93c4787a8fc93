//! Typed evaluation of numeric eligibility thresholds.
//!
//! A raw condition fragment like `"platelets >= 100,000/ul"` is reduced to
//! an enumerated operator plus an f64 threshold, then compared against the
//! lab value as plain arithmetic. Nothing here ever executes text.

use regex::Regex;

use crate::models::{ComparisonOp, EligibilityCondition};

/// Lab value the upstream record systems emit when a measurement is missing
/// or invalid. Inherited behavior: a lab value equal to this sentinel always
/// passes, regardless of the operator.
pub const MISSING_LAB_SENTINEL: f64 = 0.0;

/// Extract one comparison operator and numeric threshold from a fragment.
///
/// Thousands separators in the threshold are stripped before parsing, so
/// `">= 100,000/ul"` yields `(Ge, 100000.0)`. Returns `None` when the
/// fragment carries no recognizable comparison.
pub fn parse_comparison(fragment: &str) -> Option<(ComparisonOp, f64)> {
    let pattern = Regex::new(r"([><]=?|=)\s*(\d[\d,]*\.?\d*)").unwrap();
    let caps = pattern.captures(fragment)?;

    let operator = match &caps[1] {
        ">" => ComparisonOp::Gt,
        ">=" => ComparisonOp::Ge,
        "<" => ComparisonOp::Lt,
        "<=" => ComparisonOp::Le,
        "=" => ComparisonOp::Eq,
        _ => return None,
    };

    let threshold: f64 = caps[2].replace(',', "").parse().ok()?;
    Some((operator, threshold))
}

/// Evaluate a lab value against a raw condition fragment.
///
/// No recognizable comparison means no constraint — the condition passes.
/// The zero sentinel also passes unconditionally.
pub fn evaluate(lab_value: f64, fragment: &str) -> bool {
    let Some((operator, threshold)) = parse_comparison(fragment) else {
        return true;
    };
    if lab_value == MISSING_LAB_SENTINEL {
        return true;
    }
    operator.holds(lab_value, threshold)
}

/// Evaluate a lab value against an extracted condition.
///
/// Complete conditions are evaluated from their typed operator/threshold;
/// unparsed ones fall back to scanning their raw text.
pub fn evaluate_condition(lab_value: f64, condition: &EligibilityCondition) -> bool {
    match (condition.operator, condition.threshold) {
        (Some(operator), Some(threshold)) => {
            if lab_value == MISSING_LAB_SENTINEL {
                return true;
            }
            operator.holds(lab_value, threshold)
        }
        _ => evaluate(lab_value, &condition.raw_text),
    }
}
