use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::Result;
use crate::filter::{above_threshold, check_threshold};
use crate::record::KpiRecord;
use crate::topics::{topic_stats, TopicStat};

const TOP_KPIS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyMetrics {
    pub kpi_count: usize,
    pub avg_confidence: f64,
    /// Share of all filtered topics this company reports on, in `[0, 1]`.
    pub topic_coverage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValuePoint {
    pub value: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyProfile {
    pub company: String,
    pub metrics: CompanyMetrics,
    pub topics: Vec<TopicStat>,
    pub top_kpis: Vec<KpiRecord>,
    pub value_vs_confidence: Vec<ValuePoint>,
}

/// `None` when the company has no record at or above `min_confidence`.
pub fn company_profile(
    records: &[KpiRecord],
    company: &str,
    min_confidence: f64,
) -> Result<Option<CompanyProfile>> {
    let min_confidence = check_threshold(min_confidence)?;
    let filtered = above_threshold(records, min_confidence);
    let own = filtered
        .iter()
        .filter(|r| r.source_id == company)
        .map(|r| (*r).clone())
        .collect::<Vec<_>>();
    if own.is_empty() {
        return Ok(None);
    }
    let all_topics = filtered
        .iter()
        .map(|r| r.topic.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    let own_topics = own
        .iter()
        .map(|r| r.topic.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    let metrics = CompanyMetrics {
        kpi_count: own.len(),
        avg_confidence: own.iter().map(|r| r.confidence).sum::<f64>() / own.len() as f64,
        topic_coverage: own_topics as f64 / all_topics.max(1) as f64,
    };
    let mut top_kpis = own.clone();
    top_kpis.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.kpi_name.cmp(&b.kpi_name))
    });
    top_kpis.truncate(TOP_KPIS);
    Ok(Some(CompanyProfile {
        company: company.to_string(),
        metrics,
        topics: topic_stats(&own),
        top_kpis,
        value_vs_confidence: own
            .iter()
            .map(|r| ValuePoint {
                value: r.value,
                confidence: r.confidence,
            })
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::record::{validate, RawKpi};

    fn sample() -> Vec<KpiRecord> {
        let mut raws = vec![
            RawKpi::new("water use", 5.0, 0.4).source("globex").topic("Water"),
            RawKpi::new("waste", 2.0, 0.9).source("globex").topic("Waste"),
        ];
        for i in 0..12 {
            raws.push(
                RawKpi::new(format!("energy {i:02}"), i as f64, 0.5 + i as f64 / 40.0)
                    .source("acme")
                    .topic("Energy"),
            );
        }
        raws.iter().map(|raw| validate(raw).unwrap()).collect()
    }

    #[test]
    fn unknown_or_filtered_company_is_none() {
        assert!(company_profile(&sample(), "initech", 0.0).unwrap().is_none());
        assert!(company_profile(&sample(), "acme", 0.95).unwrap().is_none());
    }

    #[test]
    fn invalid_threshold_is_an_error_not_an_empty_profile() {
        assert!(matches!(
            company_profile(&sample(), "acme", f64::NAN),
            Err(EngineError::InvalidThreshold(_))
        ));
        assert!(company_profile(&sample(), "acme", -0.5).is_err());
    }

    #[test]
    fn coverage_is_relative_to_filtered_topics() {
        let profile = company_profile(&sample(), "acme", 0.45).unwrap().unwrap();
        assert_eq!(profile.metrics.kpi_count, 12);
        // Water drops below the threshold, leaving Energy and Waste.
        assert_eq!(profile.metrics.topic_coverage, 0.5);
        assert_eq!(profile.value_vs_confidence.len(), 12);
    }

    #[test]
    fn top_kpis_are_highest_confidence_first() {
        let profile = company_profile(&sample(), "acme", 0.0).unwrap().unwrap();
        assert_eq!(profile.top_kpis.len(), 10);
        assert_eq!(profile.top_kpis[0].kpi_name, "energy 11");
        assert!(profile
            .top_kpis
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));
    }
}
