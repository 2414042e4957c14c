use std::cmp::Ordering;

use itertools::Itertools;
use tracing::debug;

use crate::error::Result;
use crate::filter::check_threshold;
use crate::record::KpiRecord;

/// Keeps the most confident occurrence of each KPI per source, dropping
/// everything below `min_confidence`. Exact repeats of a KPI collapse along
/// the way. Output is ordered by source, then by confidence descending.
pub fn deduplicate(records: &[KpiRecord], min_confidence: f64) -> Result<Vec<KpiRecord>> {
    let min_confidence = check_threshold(min_confidence)?;
    let kept = records
        .iter()
        .filter(|r| r.confidence >= min_confidence)
        .sorted_by(|a, b| by_confidence_desc(a, b))
        .unique_by(|&r| (r.source_id.as_str(), r.kpi_name.as_str()))
        .sorted_by(|a, b| {
            a.source_id
                .cmp(&b.source_id)
                .then_with(|| by_confidence_desc(a, b))
                .then_with(|| a.kpi_name.cmp(&b.kpi_name))
        })
        .cloned()
        .collect::<Vec<_>>();
    debug!(
        input = records.len(),
        kept = kept.len(),
        "deduplicated kpi records"
    );
    Ok(kept)
}

fn by_confidence_desc(a: &KpiRecord, b: &KpiRecord) -> Ordering {
    b.confidence
        .partial_cmp(&a.confidence)
        .unwrap_or(Ordering::Equal)
}
