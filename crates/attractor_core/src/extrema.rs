//! Order-k local extremum extraction for bifurcation analysis.
//!
//! Boundary policy: an index is reported only when a full window of `order`
//! in-bounds neighbors exists on both sides, i.e. indices in
//! `[order, len - 1 - order]`. Samples closer to either edge are never
//! extrema. Comparisons are strict, so plateaus are not extrema.

use anyhow::{bail, Result};

/// Indices of samples strictly greater than every neighbor within `order`
/// positions on both sides.
pub fn local_maxima(values: &[f64], order: usize) -> Result<Vec<usize>> {
    extrema(values, order, |candidate, neighbor| candidate > neighbor)
}

/// Indices of samples strictly less than every neighbor within `order`
/// positions on both sides.
pub fn local_minima(values: &[f64], order: usize) -> Result<Vec<usize>> {
    extrema(values, order, |candidate, neighbor| candidate < neighbor)
}

fn extrema(values: &[f64], order: usize, beats: impl Fn(f64, f64) -> bool) -> Result<Vec<usize>> {
    if order == 0 {
        bail!("order must be at least 1");
    }
    if values.is_empty() {
        bail!("series must contain at least one sample");
    }
    // A window wider than the series leaves no admissible index.
    if values.len() < 2 * order + 1 {
        return Ok(Vec::new());
    }

    let mut indices = Vec::new();
    for i in order..values.len() - order {
        let candidate = values[i];
        let dominates = (1..=order)
            .all(|offset| beats(candidate, values[i - offset]) && beats(candidate, values[i + offset]));
        if dominates {
            indices.push(i);
        }
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::{local_maxima, local_minima};

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn alternating_series_with_order_one() {
        let series = [0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        let maxima = local_maxima(&series, 1).expect("maxima should extract");
        let minima = local_minima(&series, 1).expect("minima should extract");
        assert_eq!(maxima, vec![1, 3, 5]);
        // Indices 0 and 6 lack a full window and are excluded by policy.
        assert_eq!(minima, vec![2, 4]);
    }

    #[test]
    fn order_two_requires_dominating_the_wider_window() {
        let series = [0.0, 2.0, 1.0, 3.0, 1.0, 2.0, 0.0];
        // Index 1 beats its immediate neighbors but not values[3] = 3.
        assert_eq!(local_maxima(&series, 2).unwrap(), vec![3]);
        assert_eq!(local_minima(&series, 2).unwrap(), vec![]);
    }

    #[test]
    fn plateaus_are_not_extrema() {
        let series = [0.0, 1.0, 1.0, 0.0];
        assert_eq!(local_maxima(&series, 1).unwrap(), vec![]);
    }

    #[test]
    fn window_wider_than_series_yields_no_indices() {
        let series = [0.0, 1.0, 0.0];
        assert_eq!(local_maxima(&series, 5).unwrap(), vec![]);
    }

    #[test]
    fn rejects_zero_order() {
        assert_err_contains(local_maxima(&[1.0, 2.0, 1.0], 0), "order");
    }

    #[test]
    fn rejects_empty_series() {
        assert_err_contains(local_minima(&[], 1), "at least one sample");
    }

    #[test]
    fn monotone_series_has_no_interior_extrema() {
        let series = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(local_maxima(&series, 1).unwrap(), vec![]);
        assert_eq!(local_minima(&series, 1).unwrap(), vec![]);
    }
}
