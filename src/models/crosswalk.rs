use serde::{Deserialize, Serialize};

/// A diagnosis code as it arrives from the patient record: the vocabulary
/// it belongs to plus its human-readable description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCoding {
    pub codeset: String,
    pub description: String,
}

/// A resolved NCIt concept for one source vocabulary code.
///
/// The resolver yields `Option<CodeMatch>` per source code; `None` means no
/// acceptable crosswalk candidate existed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMatch {
    pub target_code: String,
    pub description: String,
}
