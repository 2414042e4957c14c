use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::filter::{check_threshold, FilterContext, GroupBy, RadarMetric, MAX_SELECTIONS};
use crate::record::KpiRecord;
use crate::stats::{exact_scale, mean_or_zero};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RadarProfile {
    pub categories: Vec<String>,
    /// One entry per company, aligned with `categories`.
    pub vectors: BTreeMap<String, Vec<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimilarityMatrix {
    pub companies: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
    pub average_similarity: f64,
}

impl SimilarityMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.companies.iter().position(|c| c == a)?;
        let j = self.companies.iter().position(|c| c == b)?;
        Some(self.matrix[i][j])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyScore {
    pub company: String,
    /// Mean of the company's radar vector.
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub group_by: GroupBy,
    pub metric: RadarMetric,
    pub radar: RadarProfile,
    pub similarity: SimilarityMatrix,
    pub scores: Vec<CompanyScore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityLevel {
    VerySimilar,
    Similar,
    Moderate,
    Different,
}

impl SimilarityLevel {
    pub fn classify(similarity: f64) -> Self {
        if similarity >= 0.8 {
            SimilarityLevel::VerySimilar
        } else if similarity >= 0.6 {
            SimilarityLevel::Similar
        } else if similarity >= 0.4 {
            SimilarityLevel::Moderate
        } else {
            SimilarityLevel::Different
        }
    }
}

/// Radar profiles and pairwise cosine similarity for the companies selected
/// in `ctx`. An empty selection gives an empty comparison; more than
/// [`MAX_SELECTIONS`] companies is rejected without a partial result.
pub fn compare(records: &[KpiRecord], ctx: &FilterContext) -> Result<Comparison> {
    let selected = &ctx.selected_companies;
    if selected.len() > MAX_SELECTIONS {
        return Err(EngineError::TooManySelections {
            requested: selected.len(),
            max: MAX_SELECTIONS,
        });
    }
    check_threshold(ctx.min_confidence)?;
    let radar = radar_profile(records, ctx);
    let similarity = similarity_matrix(&radar);
    let scores = radar
        .vectors
        .iter()
        .map(|(company, vector)| CompanyScore {
            company: company.clone(),
            score: mean_or_zero(vector),
        })
        .collect();
    debug!(
        companies = selected.len(),
        categories = radar.categories.len(),
        group_by = ctx.group_by.as_str(),
        metric = ctx.metric.as_str(),
        "built comparison"
    );
    Ok(Comparison {
        group_by: ctx.group_by,
        metric: ctx.metric,
        radar,
        similarity,
        scores,
    })
}

/// Every selected company gets a vector, even one with no matching record;
/// cells without records read `0`.
pub fn radar_profile(records: &[KpiRecord], ctx: &FilterContext) -> RadarProfile {
    let selected = &ctx.selected_companies;
    if selected.is_empty() {
        return RadarProfile::default();
    }
    let mut cells: BTreeMap<(&str, &str), Vec<f64>> = BTreeMap::new();
    let mut categories: BTreeSet<&str> = BTreeSet::new();
    for record in records
        .iter()
        .filter(|r| ctx.accepts(r) && selected.contains(&r.source_id))
    {
        let category = ctx.group_by.key(record);
        categories.insert(category);
        cells
            .entry((record.source_id.as_str(), category))
            .or_default()
            .push(ctx.metric.sample(record));
    }
    let vectors = selected
        .iter()
        .map(|company| {
            let vector = categories
                .iter()
                .map(|category| {
                    cells
                        .get(&(company.as_str(), *category))
                        .map_or(0.0, |samples| mean_or_zero(samples))
                })
                .collect();
            (company.clone(), vector)
        })
        .collect();
    RadarProfile {
        categories: categories.into_iter().map(str::to_string).collect(),
        vectors,
    }
}

/// The diagonal is set to exactly `1` for every company, including companies
/// whose vector is all zeros.
pub fn similarity_matrix(radar: &RadarProfile) -> SimilarityMatrix {
    let companies = radar.vectors.keys().cloned().collect::<Vec<_>>();
    let vectors = radar.vectors.values().collect::<Vec<_>>();
    let n = companies.len();
    let mut matrix = vec![vec![0.0; n]; n];
    let mut off_diagonal_sum = 0.0;
    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let sim = cosine_similarity(vectors[i], vectors[j]);
            matrix[i][j] = sim;
            matrix[j][i] = sim;
            off_diagonal_sum += 2.0 * sim;
        }
    }
    let pairs = n * n.saturating_sub(1);
    let average_similarity = if pairs == 0 {
        0.0
    } else {
        off_diagonal_sum / pairs as f64
    };
    SimilarityMatrix {
        companies,
        matrix,
        average_similarity,
    }
}

/// Cosine similarity, `0` when either vector has zero norm. Each vector is
/// rescaled by a power of two first so the dot product stays finite.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let scale_a = exact_scale(a.iter().copied());
    let scale_b = exact_scale(b.iter().copied());
    let a = a.iter().map(|x| x / scale_a).collect::<Vec<_>>();
    let b = b.iter().map(|y| y / scale_b).collect::<Vec<_>>();
    let dot = a.iter().zip(&b).map(|(x, y)| x * y).sum::<f64>();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|y| y * y).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
