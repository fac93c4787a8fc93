use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::lab::CellType;

/// Comparison operator extracted from an eligibility threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "=")]
    Eq,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Eq => "=",
        }
    }

    /// Typed comparison of a lab value against a threshold.
    pub fn holds(&self, lab_value: f64, threshold: f64) -> bool {
        match self {
            ComparisonOp::Gt => lab_value > threshold,
            ComparisonOp::Ge => lab_value >= threshold,
            ComparisonOp::Lt => lab_value < threshold,
            ComparisonOp::Le => lab_value <= threshold,
            ComparisonOp::Eq => lab_value == threshold,
        }
    }
}

/// One eligibility criterion extracted from trial text.
///
/// A condition is "complete" when both operator and threshold were parsed.
/// Fallback extraction yields unparsed conditions that carry only the cell
/// type and the free text the detection service returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityCondition {
    pub cell_type: CellType,
    pub raw_text: String,
    pub operator: Option<ComparisonOp>,
    pub threshold: Option<f64>,
    pub unit_text: Option<String>,
}

impl EligibilityCondition {
    pub fn parsed(
        cell_type: CellType,
        raw_text: impl Into<String>,
        operator: ComparisonOp,
        threshold: f64,
        unit_text: Option<String>,
    ) -> Self {
        Self {
            cell_type,
            raw_text: raw_text.into(),
            operator: Some(operator),
            threshold: Some(threshold),
            unit_text,
        }
    }

    pub fn unparsed(cell_type: CellType, raw_text: impl Into<String>) -> Self {
        Self {
            cell_type,
            raw_text: raw_text.into(),
            operator: None,
            threshold: None,
            unit_text: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.operator.is_some() && self.threshold.is_some()
    }
}

/// Outcome of evaluating one condition against the patient's labs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionDecision {
    pub condition: EligibilityCondition,
    pub passed: bool,
}

/// One trial from the registry corpus.
///
/// `ncit_codes` holds the intersection of the requested disease codes with
/// the codes the registry reported for the trial. `inclusion_criteria` are
/// the raw unstructured inclusion text entries; conditions and decisions are
/// attached during filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trial {
    pub id: String,
    pub ncit_codes: BTreeSet<String>,
    pub inclusion_criteria: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<EligibilityCondition>,
    #[serde(default)]
    pub decisions: Vec<ConditionDecision>,
}

impl Trial {
    pub fn new(id: impl Into<String>, ncit_codes: BTreeSet<String>) -> Self {
        Self {
            id: id.into(),
            ncit_codes,
            inclusion_criteria: Vec::new(),
            conditions: Vec::new(),
            decisions: Vec::new(),
        }
    }
}

/// Trials grouped under one disease code, ready for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodePartition {
    pub ncit_code: String,
    pub trials: Vec<Trial>,
}

/// The two partitions the matcher produces: trials whose thresholds the
/// patient satisfies, and trials excluded by at least one failed condition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub filtered: Vec<CodePartition>,
    pub excluded: Vec<CodePartition>,
}
