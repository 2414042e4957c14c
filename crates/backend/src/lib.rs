mod session;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use esg_kpi_core::{
    bin_index, bin_level, BackendSection, BenchmarkRow, ConfidenceBucket,
    Dashboard, DashboardMetrics, RawKpi, DEFAULT_BACKEND_URL,
};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::runtime::Runtime;
use tracing::debug;

pub use session::{AnalyticsSession, RecordSource};

/// HTTP client for the extraction backend that owns the KPI results table.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackendHealth {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl BackendHealth {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &BackendSection) -> Result<Self> {
        Self::new(cfg.url.clone(), Duration::from_secs(cfg.timeout_secs.max(1)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<BackendHealth> {
        self.get_json("health", &[]).await
    }

    /// Distinct source ids known to the backend, in backend order.
    pub async fn companies(&self) -> Result<Vec<String>> {
        self.get_json("companies", &[]).await
    }

    /// The backend's own dashboard aggregates at `min_confidence`.
    pub async fn dashboard(&self, min_confidence: f64) -> Result<RemoteDashboard> {
        self.get_json("dashboard", &[("min_confidence", min_confidence.to_string())])
            .await
    }

    /// Full results table as served by the CSV export endpoint. A 404 means the
    /// backend has nothing stored yet.
    pub async fn export_records(&self) -> Result<Vec<RawKpi>> {
        let url = self.url("export/csv");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(url = %url, "backend has no stored results");
            return Ok(Vec::new());
        }
        let body = response
            .error_for_status()
            .context("backend returned an error")?
            .bytes()
            .await
            .context("failed to read export body")?;
        let raws = esg_kpi_core::read_csv(body.as_ref()).context("failed to parse kpi export")?;
        debug!(url = %url, records = raws.len(), "fetched kpi export");
        Ok(raws)
    }

    pub fn export_records_blocking(&self) -> Result<Vec<RawKpi>> {
        let rt = Runtime::new().context("failed to create tokio runtime")?;
        rt.block_on(self.export_records())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path);
        self.http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .context("backend returned an error")?
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode response from {url}"))
    }
}

impl Default for BackendClient {
    fn default() -> Self {
        Self {
            http: Client::new(),
            base_url: DEFAULT_BACKEND_URL.to_string(),
        }
    }
}

/// Dashboard payload as the backend serves it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteDashboard {
    pub metrics: RemoteMetrics,
    #[serde(default)]
    pub benchmark: Vec<RemoteBenchmarkRow>,
    #[serde(default)]
    pub chart_data: RemoteChartData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteMetrics {
    #[serde(default)]
    pub total_kpis: usize,
    #[serde(default)]
    pub companies: usize,
    #[serde(default)]
    pub unique_topics: usize,
    #[serde(default)]
    pub last_extraction: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteBenchmarkRow {
    pub company: String,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub std: f64,
    pub count: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteChartData {
    /// Confidence rounded to two decimals, as a string key, to count.
    #[serde(default)]
    pub confidence_distribution: BTreeMap<String, usize>,
}

impl RemoteDashboard {
    /// Maps the backend payload onto the local dashboard shape. The backend
    /// buckets confidence at two decimals; counts are folded into 0.1 bins.
    /// The backend's benchmark std is the sample estimator, kept as served.
    pub fn into_dashboard(self, min_confidence: f64) -> Dashboard {
        let mut bins: BTreeMap<u32, usize> = BTreeMap::new();
        for (level, count) in &self.chart_data.confidence_distribution {
            match level.trim().parse::<f64>() {
                Ok(confidence) => *bins.entry(bin_index(confidence)).or_insert(0) += count,
                Err(_) => debug!(level = %level, "skipping unparsable confidence bucket"),
            }
        }
        let last_extraction = self
            .metrics
            .last_extraction
            .filter(|ts| !ts.is_empty() && ts != "Unknown");
        let mut benchmark = self
            .benchmark
            .into_iter()
            .map(|row| BenchmarkRow {
                source_id: row.company,
                mean: row.mean,
                median: row.median,
                min: row.min,
                max: row.max,
                std: row.std,
                count: row.count.max(0.0) as usize,
            })
            .collect::<Vec<_>>();
        benchmark.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        Dashboard {
            min_confidence,
            metrics: DashboardMetrics {
                total_kpis: self.metrics.total_kpis,
                companies: self.metrics.companies,
                unique_topics: self.metrics.unique_topics,
                last_extraction,
            },
            benchmark,
            confidence_distribution: bins
                .into_iter()
                .map(|(index, count)| ConfidenceBucket {
                    level: bin_level(index),
                    count,
                })
                .collect(),
        }
    }
}
