use std::future::Future;

use anyhow::Result;
use esg_kpi_core::{
    analyze_file, compare, dashboard, validate_batch, Comparison, Dashboard, FileAnalysis,
    FilterContext, KpiRecord, RawKpi, RequestSequencer,
};
use tracing::{debug, warn};

use crate::BackendClient;

/// Anything that can hand back the current raw KPI table.
pub trait RecordSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<Vec<RawKpi>>> + Send;
}

impl RecordSource for BackendClient {
    async fn fetch(&self) -> Result<Vec<RawKpi>> {
        self.export_records().await
    }
}

/// Re-fetches the corpus for every view request. Results of a request that
/// was overtaken by a newer one come back as `None`.
pub struct AnalyticsSession<S> {
    source: S,
    sequencer: RequestSequencer,
}

impl<S: RecordSource> AnalyticsSession<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            sequencer: RequestSequencer::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn dashboard(&self, min_confidence: f64) -> Result<Option<Dashboard>> {
        self.run(|records| Ok(dashboard(records, min_confidence)?))
            .await
    }

    pub async fn compare(&self, ctx: &FilterContext) -> Result<Option<Comparison>> {
        self.run(|records| Ok(compare(records, ctx)?)).await
    }

    pub async fn analyze(&self) -> Result<Option<FileAnalysis>> {
        self.run(|records| Ok(analyze_file(records))).await
    }

    async fn run<T, F>(&self, view: F) -> Result<Option<T>>
    where
        F: FnOnce(&[KpiRecord]) -> Result<T>,
    {
        let token = self.sequencer.issue();
        let raws = self.source.fetch().await?;
        if !self.sequencer.is_current(token) {
            debug!(token = token.id(), "discarding stale fetch");
            return Ok(None);
        }
        let batch = validate_batch(&raws);
        if !batch.is_clean() {
            warn!(rejected = batch.rejected.len(), "skipped invalid records");
        }
        let value = view(&batch.records)?;
        Ok(self.sequencer.accept(token, value))
    }
}
