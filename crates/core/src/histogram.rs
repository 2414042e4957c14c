use std::collections::BTreeMap;

use serde::Serialize;

use crate::record::KpiRecord;

const BINS_PER_UNIT: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceBucket {
    /// Lower edge of the 0.1-wide bin.
    pub level: f64,
    pub count: usize,
}

/// Integer bin of a confidence score: `floor(confidence * 10)`.
pub fn bin_index(confidence: f64) -> u32 {
    (confidence * BINS_PER_UNIT).floor().max(0.0) as u32
}

pub fn bin_level(index: u32) -> f64 {
    index as f64 / BINS_PER_UNIT
}

/// Counts records per confidence bin, ascending by level. Bins with no records
/// are not emitted.
pub fn confidence_histogram(records: &[KpiRecord]) -> Vec<ConfidenceBucket> {
    let mut bins: BTreeMap<u32, usize> = BTreeMap::new();
    for record in records {
        *bins.entry(bin_index(record.confidence)).or_insert(0) += 1;
    }
    bins.into_iter()
        .map(|(index, count)| ConfidenceBucket {
            level: bin_level(index),
            count,
        })
        .collect()
}
