use std::cmp::Ordering;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Describe {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
    pub count: usize,
}

/// Descriptive statistics over finite values. `None` for an empty slice so
/// callers never see a NaN row.
pub fn describe(values: &[f64]) -> Option<Describe> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted_ascending(values);
    let (mean, std) = moments(&sorted);
    Some(Describe {
        mean,
        median: median_of_sorted(&sorted),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        std,
        count: sorted.len(),
    })
}

pub fn mean_or_zero(values: &[f64]) -> f64 {
    moments(values).0
}

/// Power of two near the largest magnitude in `values`. Dividing by it is
/// exact and brings squares and sums of the scaled values back in range.
pub(crate) fn exact_scale<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let peak = values.into_iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if peak == 0.0 || !peak.is_finite() {
        return 1.0;
    }
    2f64.powi(peak.log2().floor().clamp(-1000.0, 1000.0) as i32)
}

/// Running (Welford) mean and population standard deviation over values
/// scaled by [`exact_scale`], so neither overflows for finite input. The
/// running mean never leaves `[min, max]`.
fn moments(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let scale = exact_scale(values.iter().copied());
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for (k, value) in values.iter().enumerate() {
        let x = value / scale;
        let delta = x - mean;
        mean += delta / (k + 1) as f64;
        m2 += delta * (x - mean);
    }
    let std = (m2 / values.len() as f64).max(0.0).sqrt();
    (mean * scale, std * scale)
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    median_of_sorted(&sorted_ascending(values))
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        midpoint(sorted[mid - 1], sorted[mid])
    } else {
        sorted[mid]
    }
}

/// Midpoint of `a <= b` that stays inside `[a, b]` and never overflows.
fn midpoint(a: f64, b: f64) -> f64 {
    if (a < 0.0) == (b < 0.0) {
        a + (b - a) / 2.0
    } else {
        (a + b) / 2.0
    }
}

fn sorted_ascending(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_empty_is_none() {
        assert!(describe(&[]).is_none());
    }

    #[test]
    fn describe_odd_count() {
        let d = describe(&[30.0, 10.0, 20.0]).unwrap();
        assert_eq!(d.mean, 20.0);
        assert_eq!(d.median, 20.0);
        assert_eq!(d.min, 10.0);
        assert_eq!(d.max, 30.0);
        assert_eq!(d.count, 3);
        assert!((d.std - (200.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn median_even_count_averages_middles() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn mean_stays_inside_range_for_repeated_values() {
        let d = describe(&[0.1, 0.1, 0.1]).unwrap();
        assert_eq!(d.mean, 0.1);
        assert_eq!(d.std, 0.0);
    }

    #[test]
    fn extreme_magnitudes_do_not_overflow() {
        let d = describe(&[f64::MAX, f64::MAX / 2.0]).unwrap();
        assert_eq!(d.mean, f64::MAX * 0.75);
        assert_eq!(d.median, f64::MAX * 0.75);
        assert!((d.std / (f64::MAX * 0.25) - 1.0).abs() < 1e-12);

        let d = describe(&[-f64::MAX, f64::MAX]).unwrap();
        assert_eq!(d.mean, 0.0);
        assert_eq!(d.median, 0.0);
        assert_eq!(d.std, f64::MAX);

        assert_eq!(mean_or_zero(&[1e300, 1e300, 1e300]), 1e300);
    }

    #[test]
    fn median_of_smallest_normals_stays_in_range() {
        let a = f64::MIN_POSITIVE * (1.0 + f64::EPSILON);
        assert_eq!(median(&[a, a]), a);
        assert_eq!(median(&[-1.0, 3.0]), 1.0);
    }

    #[test]
    fn exact_scale_is_a_power_of_two() {
        assert_eq!(exact_scale([0.0, 0.0]), 1.0);
        assert_eq!(exact_scale([3.0, -5.0]), 4.0);
        assert_eq!(exact_scale([f64::MAX]), 2f64.powi(1000));
        assert_eq!(exact_scale([0.75]), 0.5);
    }
}
