use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{EngineError, Result};
use crate::record::{validate_batch, RawKpi, ValidatedBatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Json,
    Jsonl,
    Csv,
}

impl RecordFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Some("json") => Some(RecordFormat::Json),
            Some("jsonl") | Some("ndjson") => Some(RecordFormat::Jsonl),
            Some("csv") => Some(RecordFormat::Csv),
            _ => None,
        }
    }
}

/// The backend answers a processed PDF with `{ "results": [...] }`; saved
/// exports are plain arrays.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonPayload {
    List(Vec<RawKpi>),
    Wrapped { results: Vec<RawKpi> },
}

pub fn read_json<R: Read>(reader: R) -> Result<Vec<RawKpi>> {
    let payload: JsonPayload = serde_json::from_reader(reader)?;
    Ok(match payload {
        JsonPayload::List(items) => items,
        JsonPayload::Wrapped { results } => results,
    })
}

pub fn read_jsonl<R: BufRead>(reader: R) -> Result<Vec<RawKpi>> {
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        out.push(serde_json::from_str(trimmed)?);
    }
    Ok(out)
}

pub fn read_csv<R: Read>(reader: R) -> Result<Vec<RawKpi>> {
    let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut out = Vec::new();
    for row in csv.deserialize() {
        out.push(row?);
    }
    Ok(out)
}

/// Reads one file. Records that do not name their source inherit the file
/// stem, which is how the backend keys results by report.
pub fn read_file(path: &Path) -> Result<Vec<RawKpi>> {
    let format =
        RecordFormat::from_path(path).ok_or_else(|| EngineError::UnsupportedInput(path.into()))?;
    let file = File::open(path)?;
    let raws = match format {
        RecordFormat::Json => read_json(BufReader::new(file))?,
        RecordFormat::Jsonl => read_jsonl(BufReader::new(file))?,
        RecordFormat::Csv => read_csv(BufReader::new(file))?,
    };
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    debug!(path = %path.display(), records = raws.len(), "read kpi file");
    Ok(raws
        .into_iter()
        .map(|raw| raw.with_default_source(&stem))
        .collect())
}

/// Loads and validates a file, or every supported file under a directory.
pub fn load_records(path: &Path) -> Result<ValidatedBatch> {
    let mut batch = ValidatedBatch::default();
    if path.is_dir() {
        let mut files = WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| RecordFormat::from_path(p).is_some())
            .collect::<Vec<_>>();
        files.sort();
        for file in files {
            batch.extend(validate_batch(&read_file(&file)?));
        }
    } else {
        batch = validate_batch(&read_file(path)?);
    }
    info!(
        path = %path.display(),
        records = batch.records.len(),
        rejected = batch.rejected.len(),
        "loaded kpi records"
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn json_accepts_array_and_wrapped_results() {
        let array = r#"[{"kpi_name":"CO2","value":1.5,"confidence":0.9,"topic_fr":"Climat"}]"#;
        let wrapped = r#"{"results":[{"kpi_name":"CO2","value":1.5,"confidence":0.9}],"filename":"x.pdf"}"#;
        assert_eq!(read_json(array.as_bytes()).unwrap().len(), 1);
        assert_eq!(read_json(wrapped.as_bytes()).unwrap().len(), 1);
    }

    #[test]
    fn csv_tolerates_missing_cells_and_extra_columns() {
        let data = "kpi_name,value,unit,confidence,topic,topic_fr,source_file,page\n\
                    CO2,12,t,0.8,Emissions,,acme,3\n\
                    Water,,m3,0.5,Water,Eau,acme,4\n";
        let raws = read_csv(data.as_bytes()).unwrap();
        assert_eq!(raws.len(), 2);
        assert_eq!(raws[0].value, Some(12.0));
        assert_eq!(raws[0].topic_fr, None);
        assert_eq!(raws[1].value, None);
        assert_eq!(raws[1].topic_fr.as_deref(), Some("Eau"));
    }

    #[test]
    fn directory_load_uses_file_stem_as_source() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("acme_2024.jsonl"),
            "{\"kpi_name\":\"CO2\",\"value\":1.0,\"confidence\":0.9}\n\n\
             {\"kpi_name\":\"Bad\",\"value\":1.0,\"confidence\":3.0}\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("globex.csv"),
            "kpi_name,value,confidence,company\nCO2,2.0,0.7,Globex Corp\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let batch = load_records(dir.path()).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].source_id, "acme_2024");
        assert_eq!(batch.records[1].source_id, "Globex Corp");
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].kpi_name, "Bad");
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let err = read_file(Path::new("report.pdf")).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedInput(_)));
    }
}
