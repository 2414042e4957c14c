use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::filter::{
    check_threshold, FilterContext, GroupBy, RadarMetric, DEFAULT_MIN_CONFIDENCE,
};

pub const DEFAULT_CONFIG: &str = "esgkpi.toml";
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000/api";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyticsSection {
    pub min_confidence: f64,
    pub group_by: GroupBy,
    pub metric: RadarMetric,
}

impl Default for AnalyticsSection {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            group_by: GroupBy::default(),
            metric: RadarMetric::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub bind_addr: Option<String>,
    pub results: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub analytics: AnalyticsSection,
    pub backend: BackendSection,
    pub service: ServiceSection,
}

impl AnalyticsConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: AnalyticsConfig = toml::from_str(raw)?;
        check_threshold(cfg.analytics.min_confidence)?;
        Ok(cfg)
    }

    /// Reads `path`, or `ESGKPI_CONFIG`, or `esgkpi.toml`; a missing file means
    /// defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| {
            env::var("ESGKPI_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG))
        });
        let mut cfg = if path.exists() {
            debug!(path = %path.display(), "reading config");
            Self::from_toml_str(&fs::read_to_string(&path)?)?
        } else {
            Self::default()
        };
        cfg.apply_env(|key| env::var(key).ok());
        check_threshold(cfg.analytics.min_confidence)?;
        Ok(cfg)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("ESGKPI_MIN_CONFIDENCE") {
            match raw.trim().parse() {
                Ok(value) => self.analytics.min_confidence = value,
                Err(_) => warn!(value = %raw, "ignoring ESGKPI_MIN_CONFIDENCE"),
            }
        }
        if let Some(raw) = lookup("ESGKPI_GROUP_BY") {
            match GroupBy::from_str(&raw) {
                Some(group_by) => self.analytics.group_by = group_by,
                None => warn!(value = %raw, "ignoring ESGKPI_GROUP_BY"),
            }
        }
        if let Some(raw) = lookup("ESGKPI_METRIC") {
            match RadarMetric::from_str(&raw) {
                Some(metric) => self.analytics.metric = metric,
                None => warn!(value = %raw, "ignoring ESGKPI_METRIC"),
            }
        }
        if let Some(url) = lookup("ESGKPI_BACKEND_URL") {
            self.backend.url = url;
        }
        if let Some(results) = lookup("ESGKPI_RESULTS") {
            self.service.results = Some(PathBuf::from(results));
        }
        if let Some(addr) = lookup("BIND_ADDR") {
            self.service.bind_addr = Some(addr);
        }
    }

    pub fn filter_context(&self) -> FilterContext {
        FilterContext::new(self.analytics.min_confidence)
            .with_group_by(self.analytics.group_by)
            .with_metric(self.analytics.metric)
    }
}
