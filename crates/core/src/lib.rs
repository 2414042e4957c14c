mod analysis;
mod benchmark;
mod company;
mod comparison;
mod config;
mod dashboard;
mod dedup;
mod error;
mod export;
mod filter;
mod histogram;
mod ingest;
mod record;
mod sequence;
mod stats;
mod topics;

pub use analysis::{
    analyze_file, summarize, top_values, ConfidenceBand, FileAnalysis, FileSummary,
    HIGH_CONFIDENCE, MEDIUM_CONFIDENCE,
};
pub use benchmark::{compute_benchmark, BenchmarkRow};
pub use company::{company_profile, CompanyMetrics, CompanyProfile, ValuePoint};
pub use comparison::{
    compare, cosine_similarity, radar_profile, similarity_matrix, CompanyScore, Comparison,
    RadarProfile, SimilarityLevel, SimilarityMatrix,
};
pub use config::{
    AnalyticsConfig, AnalyticsSection, BackendSection, ServiceSection, DEFAULT_BACKEND_URL,
    DEFAULT_CONFIG,
};
pub use dashboard::{
    companies, dashboard, statistics, CorpusStatistics, Dashboard, DashboardMetrics,
    ProcessedFile,
};
pub use dedup::deduplicate;
pub use error::{EngineError, Result, ValidationError};
pub use export::{select_for_export, write_csv, ExportSelection};
pub use filter::{
    above_threshold, check_threshold, FilterContext, GroupBy, RadarMetric,
    DEFAULT_MIN_CONFIDENCE, MAX_SELECTIONS,
};
pub use histogram::{bin_index, bin_level, confidence_histogram, ConfidenceBucket};
pub use ingest::{load_records, read_csv, read_file, read_json, read_jsonl, RecordFormat};
pub use record::{
    validate, validate_batch, KpiRecord, RawKpi, RejectedRecord, ValidatedBatch, UNKNOWN_SOURCE,
    UNKNOWN_TOPIC,
};
pub use sequence::{RequestSequencer, RequestToken};
pub use stats::{describe, mean_or_zero, median, Describe};
pub use topics::{topic_stats, TopicStat};
