//! Linear interpolation percentile

use std::cmp::Ordering;

/// Calculate the `p`-th percentile (0-100) using linear interpolation
/// between closest ranks.
///
/// Matches the default "linear" method of common numeric libraries.
/// Returns 0.0 for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    percentile_of_sorted(&sorted, p)
}

/// Same as [`percentile`] for input already sorted ascending
pub(crate) fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let k = (sorted.len() - 1) as f64 * (p / 100.0);
    let f = k.floor() as usize;
    let c = f + 1;

    if c >= sorted.len() {
        sorted[f.min(sorted.len() - 1)]
    } else {
        sorted[f] + (k - f as f64) * (sorted[c] - sorted[f])
    }
}
