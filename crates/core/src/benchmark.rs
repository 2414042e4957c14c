use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::filter::check_threshold;
use crate::record::KpiRecord;
use crate::stats::describe;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkRow {
    pub source_id: String,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub std: f64,
    pub count: usize,
}

/// Descriptive value statistics per source over the records whose confidence
/// reaches `min_confidence`. Rows are ordered by source id; sources with no
/// surviving record are left out.
pub fn compute_benchmark(
    records: &[KpiRecord],
    min_confidence: f64,
) -> Result<Vec<BenchmarkRow>> {
    let min_confidence = check_threshold(min_confidence)?;
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.confidence >= min_confidence) {
        groups
            .entry(record.source_id.as_str())
            .or_default()
            .push(record.value);
    }
    debug!(
        sources = groups.len(),
        min_confidence, "computing benchmark"
    );
    Ok(groups
        .into_iter()
        .filter_map(|(source_id, values)| {
            describe(&values).map(|d| BenchmarkRow {
                source_id: source_id.to_string(),
                mean: d.mean,
                median: d.median,
                min: d.min,
                max: d.max,
                std: d.std,
                count: d.count,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::record::{validate, RawKpi};

    fn record(source: &str, value: f64, confidence: f64) -> KpiRecord {
        validate(&RawKpi::new("kpi", value, confidence).source(source)).unwrap()
    }

    #[test]
    fn one_row_per_source() {
        let records = vec![
            record("Globex", 5.0, 0.9),
            record("Acme", 10.0, 0.9),
            record("Acme", 30.0, 0.9),
            record("Acme", 20.0, 0.9),
        ];
        let rows = compute_benchmark(&records, 0.0).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source_id, "Acme");
        assert_eq!(rows[0].median, 20.0);
        assert_eq!(rows[1].source_id, "Globex");
        assert_eq!(rows[1].std, 0.0);
    }

    #[test]
    fn sources_filtered_out_entirely_are_omitted() {
        let records = vec![record("Acme", 10.0, 0.9), record("Globex", 5.0, 0.2)];
        let rows = compute_benchmark(&records, 0.5).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source_id, "Acme");
    }

    #[test]
    fn threshold_is_inclusive() {
        let records = vec![record("Acme", 10.0, 0.5)];
        assert_eq!(compute_benchmark(&records, 0.5).unwrap().len(), 1);
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let records = vec![record("Acme", 10.0, 0.5)];
        for threshold in [f64::NAN, 1.5, -0.1, f64::INFINITY] {
            assert!(matches!(
                compute_benchmark(&records, threshold),
                Err(EngineError::InvalidThreshold(_))
            ));
        }
    }

    #[test]
    fn rows_near_the_float_limit_are_finite() {
        let records = vec![
            record("Acme", f64::MAX, 0.9),
            record("Acme", f64::MAX / 2.0, 0.9),
            record("Globex", 1e200, 0.9),
            record("Globex", -1e200, 0.9),
        ];
        let rows = compute_benchmark(&records, 0.0).unwrap();
        assert_eq!(rows[0].mean, 1.348_269_851_146_736_7e308);
        assert!(rows[0].std.is_finite());
        assert!(rows[0].min <= rows[0].mean && rows[0].mean <= rows[0].max);
        assert_eq!(rows[1].mean, 0.0);
        assert_eq!(rows[1].std, 1e200);
    }
}
