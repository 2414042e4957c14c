use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;

use crate::histogram::{confidence_histogram, ConfidenceBucket};
use crate::record::KpiRecord;
use crate::stats::mean_or_zero;
use crate::topics::{topic_stats, TopicStat};

pub const HIGH_CONFIDENCE: f64 = 0.8;
pub const MEDIUM_CONFIDENCE: f64 = 0.5;
const TOP_VALUES: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn of(confidence: f64) -> Self {
        if confidence >= HIGH_CONFIDENCE {
            ConfidenceBand::High
        } else if confidence >= MEDIUM_CONFIDENCE {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileSummary {
    pub total_kpis: usize,
    pub unique_topics: usize,
    pub avg_confidence: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub avg_value: f64,
    pub high_confidence_kpis: usize,
    pub medium_confidence_kpis: usize,
    pub low_confidence_kpis: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileAnalysis {
    pub topic_stats: Vec<TopicStat>,
    pub confidence_histogram: Vec<ConfidenceBucket>,
    pub summary: FileSummary,
    pub top_values: Vec<KpiRecord>,
}

/// Everything the single-file view shows for one extraction result.
pub fn analyze_file(records: &[KpiRecord]) -> FileAnalysis {
    FileAnalysis {
        topic_stats: topic_stats(records),
        confidence_histogram: confidence_histogram(records),
        summary: summarize(records),
        top_values: top_values(records, TOP_VALUES),
    }
}

pub fn summarize(records: &[KpiRecord]) -> FileSummary {
    if records.is_empty() {
        return FileSummary::default();
    }
    let n = records.len() as f64;
    let mut summary = FileSummary {
        total_kpis: records.len(),
        unique_topics: records
            .iter()
            .map(|r| r.topic.as_str())
            .collect::<BTreeSet<_>>()
            .len(),
        avg_confidence: records.iter().map(|r| r.confidence).sum::<f64>() / n,
        min_value: f64::INFINITY,
        max_value: f64::NEG_INFINITY,
        avg_value: mean_or_zero(&records.iter().map(|r| r.value).collect::<Vec<_>>()),
        ..Default::default()
    };
    for record in records {
        summary.min_value = summary.min_value.min(record.value);
        summary.max_value = summary.max_value.max(record.value);
        match ConfidenceBand::of(record.confidence) {
            ConfidenceBand::High => summary.high_confidence_kpis += 1,
            ConfidenceBand::Medium => summary.medium_confidence_kpis += 1,
            ConfidenceBand::Low => summary.low_confidence_kpis += 1,
        }
    }
    summary
}

/// The `limit` largest values, ties ordered by KPI name.
pub fn top_values(records: &[KpiRecord], limit: usize) -> Vec<KpiRecord> {
    let mut ranked = records.iter().collect::<Vec<_>>();
    ranked.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.kpi_name.cmp(&b.kpi_name))
    });
    ranked.into_iter().take(limit).cloned().collect()
}
