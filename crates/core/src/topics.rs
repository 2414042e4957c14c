use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::record::KpiRecord;
use crate::stats::mean_or_zero;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicStat {
    pub topic: String,
    pub count: usize,
    pub avg_confidence: f64,
    pub avg_value: f64,
    /// Percentage of the input records that fall under this topic.
    pub share: f64,
}

#[derive(Default)]
struct TopicAccumulator {
    count: usize,
    confidence_sum: f64,
    values: Vec<f64>,
}

/// Per-topic counts and averages, largest topics first; equal counts are
/// ordered by topic name.
pub fn topic_stats(records: &[KpiRecord]) -> Vec<TopicStat> {
    let mut groups: FxHashMap<&str, TopicAccumulator> = FxHashMap::default();
    for record in records {
        let acc = groups.entry(record.topic.as_str()).or_default();
        acc.count += 1;
        acc.confidence_sum += record.confidence;
        acc.values.push(record.value);
    }
    let total = records.len() as f64;
    let mut stats = groups
        .into_iter()
        .map(|(topic, acc)| TopicStat {
            topic: topic.to_string(),
            count: acc.count,
            avg_confidence: acc.confidence_sum / acc.count as f64,
            avg_value: mean_or_zero(&acc.values),
            share: acc.count as f64 / total * 100.0,
        })
        .collect::<Vec<_>>();
    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.topic.cmp(&b.topic)));
    stats
}
