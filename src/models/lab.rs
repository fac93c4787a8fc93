use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three blood-count markers eligibility screening tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Hemoglobin,
    Leukocytes,
    Platelets,
}

impl CellType {
    pub const ALL: [CellType; 3] = [
        CellType::Hemoglobin,
        CellType::Leukocytes,
        CellType::Platelets,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Hemoglobin => "hemoglobin",
            CellType::Leukocytes => "leukocytes",
            CellType::Platelets => "platelets",
        }
    }

    /// Case-insensitive lookup of a tracked marker name.
    pub fn parse(name: &str) -> Option<CellType> {
        let lower = name.trim().to_lowercase();
        CellType::ALL.into_iter().find(|c| c.as_str() == lower)
    }
}

/// A single quantitative lab observation for one cell type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabResult {
    pub cell_type: CellType,
    pub value: f64,
    pub unit: String,
    pub observed_at: DateTime<Utc>,
}

/// Current lab values per cell type: one slot per marker, the
/// later-dated observation supersedes an earlier one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabValues {
    results: HashMap<CellType, LabResult>,
}

impl LabValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation, keeping only the most recent per cell type.
    pub fn record(&mut self, result: LabResult) {
        match self.results.get(&result.cell_type) {
            Some(current) if current.observed_at >= result.observed_at => {}
            _ => {
                self.results.insert(result.cell_type, result);
            }
        }
    }

    pub fn get(&self, cell_type: CellType) -> Option<&LabResult> {
        self.results.get(&cell_type)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
