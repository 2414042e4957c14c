use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::benchmark::{compute_benchmark, BenchmarkRow};
use crate::error::Result;
use crate::filter::{above_threshold, check_threshold};
use crate::histogram::{confidence_histogram, ConfidenceBucket};
use crate::record::KpiRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub total_kpis: usize,
    pub companies: usize,
    pub unique_topics: usize,
    pub last_extraction: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dashboard {
    pub min_confidence: f64,
    pub metrics: DashboardMetrics,
    pub benchmark: Vec<BenchmarkRow>,
    pub confidence_distribution: Vec<ConfidenceBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedFile {
    pub filename: String,
    pub kpi_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorpusStatistics {
    pub total_kpis: usize,
    pub companies: usize,
    pub unique_topics: usize,
    pub last_extraction: Option<String>,
    pub processed_files: Vec<ProcessedFile>,
}

pub fn dashboard(records: &[KpiRecord], min_confidence: f64) -> Result<Dashboard> {
    let min_confidence = check_threshold(min_confidence)?;
    let filtered = above_threshold(records, min_confidence)
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();
    Ok(Dashboard {
        min_confidence,
        metrics: metrics(&filtered),
        benchmark: compute_benchmark(&filtered, min_confidence)?,
        confidence_distribution: confidence_histogram(&filtered),
    })
}

pub fn statistics(records: &[KpiRecord]) -> CorpusStatistics {
    let mut per_file: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *per_file.entry(record.source_id.as_str()).or_insert(0) += 1;
    }
    let metrics = metrics(records);
    CorpusStatistics {
        total_kpis: metrics.total_kpis,
        companies: metrics.companies,
        unique_topics: metrics.unique_topics,
        last_extraction: metrics.last_extraction,
        processed_files: per_file
            .into_iter()
            .map(|(filename, kpi_count)| ProcessedFile {
                filename: filename.to_string(),
                kpi_count,
            })
            .collect(),
    }
}

/// Distinct source ids, sorted.
pub fn companies(records: &[KpiRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.source_id.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn metrics(records: &[KpiRecord]) -> DashboardMetrics {
    DashboardMetrics {
        total_kpis: records.len(),
        companies: records
            .iter()
            .map(|r| r.source_id.as_str())
            .collect::<BTreeSet<_>>()
            .len(),
        unique_topics: records
            .iter()
            .map(|r| r.topic.as_str())
            .collect::<BTreeSet<_>>()
            .len(),
        // ISO-8601 timestamps order lexicographically.
        last_extraction: records.iter().filter_map(|r| r.extracted_at.clone()).max(),
    }
}
