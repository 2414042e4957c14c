use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::record::KpiRecord;

pub const MAX_SELECTIONS: usize = 6;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    #[serde(alias = "topic_fr")]
    Topic,
    KpiName,
}

impl GroupBy {
    pub fn key<'a>(&self, record: &'a KpiRecord) -> &'a str {
        match self {
            GroupBy::Topic => &record.topic,
            GroupBy::KpiName => &record.kpi_name,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Topic => "topic",
            GroupBy::KpiName => "kpi_name",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "topic" | "topic_fr" => Some(GroupBy::Topic),
            "kpi_name" | "kpi" | "name" => Some(GroupBy::KpiName),
            _ => None,
        }
    }
}

/// Which per-record quantity a radar axis averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadarMetric {
    #[default]
    Value,
    Confidence,
}

impl RadarMetric {
    pub fn sample(&self, record: &KpiRecord) -> f64 {
        match self {
            RadarMetric::Value => record.value,
            RadarMetric::Confidence => record.confidence,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RadarMetric::Value => "value",
            RadarMetric::Confidence => "confidence",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "value" => Some(RadarMetric::Value),
            "confidence" => Some(RadarMetric::Confidence),
            _ => None,
        }
    }
}

/// Parameters every view is recomputed against. The engine keeps no state
/// between calls; a changed context means a full recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterContext {
    pub min_confidence: f64,
    #[serde(default)]
    pub selected_companies: BTreeSet<String>,
    #[serde(default)]
    pub group_by: GroupBy,
    #[serde(default)]
    pub metric: RadarMetric,
}

impl Default for FilterContext {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            selected_companies: BTreeSet::new(),
            group_by: GroupBy::default(),
            metric: RadarMetric::default(),
        }
    }
}

impl FilterContext {
    pub fn new(min_confidence: f64) -> Self {
        Self {
            min_confidence,
            ..Default::default()
        }
    }

    pub fn with_companies<I, S>(mut self, companies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_companies = companies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn with_metric(mut self, metric: RadarMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn accepts(&self, record: &KpiRecord) -> bool {
        record.confidence >= self.min_confidence
    }
}

pub fn check_threshold(min_confidence: f64) -> Result<f64> {
    if min_confidence.is_finite() && (0.0..=1.0).contains(&min_confidence) {
        Ok(min_confidence)
    } else {
        Err(EngineError::InvalidThreshold(min_confidence))
    }
}

pub fn above_threshold(records: &[KpiRecord], min_confidence: f64) -> Vec<&KpiRecord> {
    records
        .iter()
        .filter(|record| record.confidence >= min_confidence)
        .collect()
}
