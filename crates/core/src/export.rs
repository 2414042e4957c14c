use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::record::KpiRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportSelection {
    All,
    Company(String),
}

impl ExportSelection {
    pub fn includes(&self, record: &KpiRecord) -> bool {
        match self {
            ExportSelection::All => true,
            ExportSelection::Company(name) => record.source_id == *name,
        }
    }

    pub fn file_name(&self) -> String {
        match self {
            ExportSelection::All => "esg_kpis_export.csv".to_string(),
            ExportSelection::Company(name) => format!("{name}_kpis.csv"),
        }
    }
}

pub fn select_for_export<'a>(
    records: &'a [KpiRecord],
    selection: &ExportSelection,
) -> Vec<&'a KpiRecord> {
    records.iter().filter(|r| selection.includes(r)).collect()
}

/// Column layout matches the extraction backend's results file.
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    kpi_name: &'a str,
    value: f64,
    unit: &'a str,
    confidence: f64,
    topic: &'a str,
    source_file: &'a str,
    extraction_date: Option<&'a str>,
}

impl<'a> From<&'a KpiRecord> for ExportRow<'a> {
    fn from(record: &'a KpiRecord) -> Self {
        Self {
            kpi_name: &record.kpi_name,
            value: record.value,
            unit: &record.unit,
            confidence: record.confidence,
            topic: &record.topic,
            source_file: &record.source_id,
            extraction_date: record.extracted_at.as_deref(),
        }
    }
}

pub fn write_csv<W: Write>(writer: W, records: &[&KpiRecord]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for record in records {
        csv.serialize(ExportRow::from(*record))?;
    }
    csv.flush()?;
    Ok(())
}
