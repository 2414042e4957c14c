use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ValidationError;

pub const UNKNOWN_TOPIC: &str = "Unknown";
pub const UNKNOWN_SOURCE: &str = "unknown";

/// A KPI exactly as the extraction backend emits it. Every field is optional
/// because the backend's JSON and CSV outputs are not consistent about them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawKpi {
    #[serde(default)]
    pub kpi_name: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub topic_fr: Option<String>,
    #[serde(default, alias = "source_id", alias = "company")]
    pub source_file: Option<String>,
    #[serde(default, alias = "extracted_at")]
    pub extraction_date: Option<String>,
}

impl RawKpi {
    pub fn new(kpi_name: impl Into<String>, value: f64, confidence: f64) -> Self {
        Self {
            kpi_name: kpi_name.into(),
            value: Some(value),
            confidence: Some(confidence),
            ..Default::default()
        }
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn topic_fr(mut self, topic: impl Into<String>) -> Self {
        self.topic_fr = Some(topic.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source_file = Some(source.into());
        self
    }

    pub fn extracted_at(mut self, date: impl Into<String>) -> Self {
        self.extraction_date = Some(date.into());
        self
    }

    /// Fills the source only when the record does not name one itself.
    pub fn with_default_source(mut self, source: &str) -> Self {
        if non_empty(self.source_file.as_deref()).is_none() {
            self.source_file = Some(source.to_string());
        }
        self
    }
}

/// The canonical, validated form of one extracted indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRecord {
    pub kpi_name: String,
    pub value: f64,
    pub unit: String,
    pub confidence: f64,
    pub topic: String,
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<String>,
}

pub fn validate(raw: &RawKpi) -> Result<KpiRecord, ValidationError> {
    let confidence = match raw.confidence {
        Some(c) if c.is_finite() && (0.0..=1.0).contains(&c) => c,
        other => return Err(ValidationError::InvalidConfidence(other)),
    };
    let value = match raw.value {
        Some(v) if v.is_finite() => v,
        other => return Err(ValidationError::InvalidValue(other)),
    };
    let kpi_name = raw.kpi_name.trim();
    if kpi_name.is_empty() {
        return Err(ValidationError::MissingName);
    }
    let topic = non_empty(raw.topic_fr.as_deref())
        .or_else(|| non_empty(raw.topic.as_deref()))
        .unwrap_or(UNKNOWN_TOPIC);
    let source_id = non_empty(raw.source_file.as_deref()).unwrap_or(UNKNOWN_SOURCE);
    Ok(KpiRecord {
        kpi_name: kpi_name.to_string(),
        value,
        unit: raw.unit.as_deref().map(str::trim).unwrap_or("").to_string(),
        confidence,
        topic: topic.to_string(),
        source_id: source_id.to_string(),
        extracted_at: non_empty(raw.extraction_date.as_deref()).map(str::to_string),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    pub index: usize,
    pub kpi_name: String,
    pub source_id: Option<String>,
    #[serde(serialize_with = "serialize_display")]
    pub error: ValidationError,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidatedBatch {
    pub records: Vec<KpiRecord>,
    pub rejected: Vec<RejectedRecord>,
}

impl ValidatedBatch {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    pub fn extend(&mut self, other: ValidatedBatch) {
        let offset = self.records.len() + self.rejected.len();
        self.records.extend(other.records);
        self.rejected
            .extend(other.rejected.into_iter().map(|mut rejected| {
                rejected.index += offset;
                rejected
            }));
    }
}

/// Validates every record, keeping the good ones and reporting the rest.
/// A malformed record never aborts the batch.
pub fn validate_batch(raws: &[RawKpi]) -> ValidatedBatch {
    let mut batch = ValidatedBatch::default();
    for (index, raw) in raws.iter().enumerate() {
        match validate(raw) {
            Ok(record) => batch.records.push(record),
            Err(error) => {
                warn!(index, kpi = %raw.kpi_name, %error, "rejecting kpi record");
                batch.rejected.push(RejectedRecord {
                    index,
                    kpi_name: raw.kpi_name.clone(),
                    source_id: raw.source_file.clone(),
                    error,
                });
            }
        }
    }
    batch
}

fn serialize_display<S: serde::Serializer>(
    error: &ValidationError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localized_topic_wins_over_plain_topic() {
        let raw = RawKpi::new("CO2", 12.0, 0.8)
            .topic("Emissions")
            .topic_fr("Émissions");
        assert_eq!(validate(&raw).unwrap().topic, "Émissions");
    }

    #[test]
    fn blank_localized_topic_falls_back() {
        let raw = RawKpi::new("CO2", 12.0, 0.8).topic("Emissions").topic_fr("  ");
        assert_eq!(validate(&raw).unwrap().topic, "Emissions");
        let bare = RawKpi::new("CO2", 12.0, 0.8);
        assert_eq!(validate(&bare).unwrap().topic, UNKNOWN_TOPIC);
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let raw = RawKpi::new("CO2", 1.0, 1.2);
        assert_eq!(
            validate(&raw),
            Err(ValidationError::InvalidConfidence(Some(1.2)))
        );
        let nan = RawKpi::new("CO2", 1.0, f64::NAN);
        assert!(matches!(
            validate(&nan),
            Err(ValidationError::InvalidConfidence(_))
        ));
    }

    #[test]
    fn rejects_non_finite_or_missing_value() {
        let raw = RawKpi::new("CO2", f64::INFINITY, 0.5);
        assert!(matches!(validate(&raw), Err(ValidationError::InvalidValue(_))));
        let missing = RawKpi {
            kpi_name: "CO2".into(),
            confidence: Some(0.5),
            ..Default::default()
        };
        assert_eq!(validate(&missing), Err(ValidationError::InvalidValue(None)));
    }

    #[test]
    fn rejects_blank_name() {
        let raw = RawKpi::new("   ", 1.0, 0.5);
        assert_eq!(validate(&raw), Err(ValidationError::MissingName));
    }

    #[test]
    fn accepts_boundary_confidence() {
        assert!(validate(&RawKpi::new("a", 0.0, 0.0)).is_ok());
        assert!(validate(&RawKpi::new("a", -3.5, 1.0)).is_ok());
    }

    #[test]
    fn batch_skips_and_reports_bad_records() {
        let raws = vec![
            RawKpi::new("good", 1.0, 0.9).source("acme"),
            RawKpi::new("bad", 1.0, 2.0).source("acme"),
            RawKpi::new("also good", 2.0, 0.1),
        ];
        let batch = validate_batch(&raws);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].index, 1);
        assert_eq!(batch.rejected[0].kpi_name, "bad");
        assert_eq!(batch.records[1].source_id, UNKNOWN_SOURCE);
    }

    #[test]
    fn default_source_does_not_override_explicit_one() {
        let raw = RawKpi::new("a", 1.0, 0.5).source("acme");
        assert_eq!(
            raw.with_default_source("report").source_file.as_deref(),
            Some("acme")
        );
        let bare = RawKpi::new("a", 1.0, 0.5).with_default_source("report");
        assert_eq!(bare.source_file.as_deref(), Some("report"));
    }
}
