//! Eligibility-condition extraction from unstructured trial text.
//!
//! Two-stage design: a single regex pass over the inclusion text handles the
//! common well-formed case ("platelets >= 100,000/ul"); whenever that pass
//! cannot account for all three tracked cell types, the full original text
//! is handed to the entity-detection service instead. The fallback is
//! authoritative over the whole text, not just the unmatched remainder.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use crate::models::{CellType, ComparisonOp, EligibilityCondition};
use crate::services::detection::DETECTION_PAYLOAD_LIMIT;
use crate::services::EntityDetector;

pub struct EligibilityExtractor<D: EntityDetector> {
    detector: Arc<D>,
    criteria_pattern: Regex,
}

impl<D: EntityDetector> EligibilityExtractor<D> {
    pub fn new(detector: Arc<D>) -> Self {
        // Text is lowercased before matching, so no (?i) needed.
        let criteria_pattern = Regex::new(
            r"\[?(hemoglobin|platelets|leukocytes)\]?\s?([><]=?|=)\s?(\d[\d,]*\.?\d*)\s?([\w^/%]+(?:\s?[\w^/%]+)?)?",
        )
        .unwrap();

        Self {
            detector,
            criteria_pattern,
        }
    }

    /// Extract one condition per tracked cell type from a trial's inclusion
    /// text entries. Empty map means no criteria were found (default pass).
    pub async fn extract(&self, entries: &[String]) -> HashMap<CellType, EligibilityCondition> {
        let survivors: Vec<String> = entries
            .iter()
            .map(|e| normalize_entry(e))
            .filter(|e| CellType::ALL.iter().any(|c| e.contains(c.as_str())))
            .collect();
        let joined = survivors.join(" ");
        if joined.is_empty() {
            return HashMap::new();
        }

        let mut conditions = HashMap::new();
        for caps in self.criteria_pattern.captures_iter(&joined) {
            let Some(cell_type) = CellType::parse(&caps[1]) else {
                continue;
            };
            let raw_text = caps[0].to_string();
            let operator = match &caps[2] {
                ">" => Some(ComparisonOp::Gt),
                ">=" => Some(ComparisonOp::Ge),
                "<" => Some(ComparisonOp::Lt),
                "<=" => Some(ComparisonOp::Le),
                "=" => Some(ComparisonOp::Eq),
                _ => None,
            };
            let threshold: Option<f64> = caps[3].replace(',', "").parse().ok();
            let unit_text = caps.get(4).map(|m| m.as_str().to_string());

            let condition = match (operator, threshold) {
                (Some(op), Some(t)) => {
                    EligibilityCondition::parsed(cell_type, raw_text, op, t, unit_text)
                }
                _ => EligibilityCondition::unparsed(cell_type, raw_text),
            };
            conditions.insert(cell_type, condition);
        }

        // Fast path only when every tracked marker was matched unambiguously.
        if conditions.len() == CellType::ALL.len() {
            tracing::debug!(count = conditions.len(), "Regex pass complete, skipping fallback");
            return conditions;
        }

        self.detect_conditions(entries).await
    }

    /// Detection fallback over the complete original text, chunked under the
    /// service payload ceiling. A failed chunk is logged and skipped.
    async fn detect_conditions(
        &self,
        entries: &[String],
    ) -> HashMap<CellType, EligibilityCondition> {
        let mut conditions = HashMap::new();

        for chunk in chunk_for_detection(entries, DETECTION_PAYLOAD_LIMIT) {
            let entities = match self.detector.detect_entities(&chunk).await {
                Ok(entities) => entities,
                Err(e) => {
                    tracing::warn!(error = %e, "Entity detection failed for chunk, skipping");
                    continue;
                }
            };

            for entity in entities {
                let Some(cell_type) = CellType::parse(&entity.text) else {
                    continue;
                };
                // Only entities with a qualifier attribute carry a usable
                // constraint fragment.
                let Some(attribute) = entity.attributes.first() else {
                    continue;
                };
                conditions.insert(
                    cell_type,
                    EligibilityCondition::unparsed(
                        cell_type,
                        format!("{}{}", entity.text, attribute.text),
                    ),
                );
            }
        }

        conditions
    }
}

fn normalize_entry(entry: &str) -> String {
    entry.replace("\r\n", " ").to_lowercase()
}

/// Batch text entries into detection payloads of at most `limit` characters.
///
/// Entries accumulate into one buffer until the next would overflow it; a
/// single entry longer than the limit is split at character boundaries.
/// Commas are stripped so thresholds survive the detection round trip.
pub fn chunk_for_detection(entries: &[String], limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;

    for entry in entries {
        let text = normalize_entry(entry).replace(',', "");
        let text_chars = text.chars().count();

        if text_chars > limit {
            chunks.extend(split_oversized(&text, limit));
        } else if buffer_chars + text_chars > limit {
            chunks.push(std::mem::take(&mut buffer));
            buffer_chars = text_chars;
            buffer = text;
        } else {
            buffer_chars += text_chars;
            buffer.push_str(&text);
        }
    }

    if !buffer.is_empty() {
        chunks.push(buffer);
    }
    chunks
}

fn split_oversized(text: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit)
        .map(|piece| piece.iter().collect())
        .collect()
}
