pub mod crosswalk;
pub mod lab;
pub mod trial;

pub use crosswalk::{CodeMatch, SourceCoding};
pub use lab::{CellType, LabResult, LabValues};
pub use trial::{
    CodePartition, ComparisonOp, ConditionDecision, EligibilityCondition, MatchOutcome, Trial,
};
