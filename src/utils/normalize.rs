use ndarray::{Array, Dimension};
use numpy::{PyArrayDyn, PyReadonlyArrayDyn, ToPyArray};
use pyo3::prelude::*;
use rayon::prelude::*;

/// Decision threshold in the normalized score space. Raw thresholds are
/// mapped onto this constant, and degenerate value ranges collapse to it.
pub const NORMALIZED_THRESHOLD: f64 = 0.5;

/// Min-max normalize a raw score, anchoring `threshold` at 0.5.
///
/// Scores at or below the threshold are scaled over `[min, threshold]`
/// into `[0, 0.5]`, scores above it over `[threshold, max]` into
/// `[0.5, 1]`. The result is clamped to `[0, 1]`. A degenerate span
/// (`min == threshold` or `threshold == max`, which covers
/// `min == max`) yields [`NORMALIZED_THRESHOLD`] instead of dividing
/// by zero.
pub fn normalize_value(value: f64, threshold: f64, min: f64, max: f64) -> f64 {
    let normalized = if value <= threshold {
        let span = threshold - min;
        if span <= 0.0 {
            return NORMALIZED_THRESHOLD;
        }
        NORMALIZED_THRESHOLD * (value - min) / span
    } else {
        let span = max - threshold;
        if span <= 0.0 {
            return NORMALIZED_THRESHOLD;
        }
        NORMALIZED_THRESHOLD + NORMALIZED_THRESHOLD * (value - threshold) / span
    };
    normalized.clamp(0.0, 1.0)
}

/// In-place batch form of [`normalize_value`]. Anomaly maps carry one
/// value per pixel, so the work is split across the rayon pool.
pub fn normalize_into(values: &mut [f64], threshold: f64, min: f64, max: f64) {
    values
        .par_iter_mut()
        .for_each(|value| *value = normalize_value(*value, threshold, min, max));
}

/// Normalize an ndarray of any dimension in place.
pub fn normalize_array<D>(values: &mut Array<f64, D>, threshold: f64, min: f64, max: f64)
where
    D: Dimension,
{
    match values.as_slice_mut() {
        Some(slice) => normalize_into(slice, threshold, min, max),
        None => values.mapv_inplace(|value| normalize_value(value, threshold, min, max)),
    }
}

#[pyfunction]
/// Min-max normalize an array of raw scores against frozen statistics.
///
/// Returns a new float64 array of the same shape with every value in
/// `[0, 1]` and `threshold` mapped to 0.5.
pub fn normalize<'py>(
    py: Python<'py>,
    values: PyReadonlyArrayDyn<f64>,
    threshold: f64,
    min: f64,
    max: f64,
) -> &'py PyArrayDyn<f64> {
    let mut normalized = values.as_array().to_owned();
    normalize_array(&mut normalized, threshold, min, max);
    normalized.to_pyarray(py)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_maps_to_half() {
        assert_eq!(normalize_value(0.4, 0.4, 0.1, 0.9), 0.5);
        assert_eq!(normalize_value(0.7, 0.7, 0.0, 1.0), 0.5);
    }

    #[test]
    fn extrema_map_to_bounds() {
        assert_eq!(normalize_value(0.1, 0.4, 0.1, 0.9), 0.0);
        assert_eq!(normalize_value(0.9, 0.4, 0.1, 0.9), 1.0);
    }

    #[test]
    fn scales_linearly_within_each_side() {
        // Midpoint of [0.1, 0.4] lands halfway into [0, 0.5].
        assert!((normalize_value(0.25, 0.4, 0.1, 0.9) - 0.25).abs() < 1e-12);
        // Midpoint of [0.4, 0.9] lands halfway into [0.5, 1].
        assert!((normalize_value(0.65, 0.4, 0.1, 0.9) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn is_monotonic_over_observed_range() {
        let (threshold, min, max) = (0.4, 0.1, 0.9);
        let mut previous = f64::NEG_INFINITY;
        for step in 0..=100 {
            let value = min + (max - min) * step as f64 / 100.0;
            let normalized = normalize_value(value, threshold, min, max);
            assert!(
                normalized >= previous,
                "normalize({value}) = {normalized} dropped below {previous}"
            );
            previous = normalized;
        }
    }

    #[test]
    fn clamps_out_of_range_inputs() {
        assert_eq!(normalize_value(-3.0, 0.4, 0.1, 0.9), 0.0);
        assert_eq!(normalize_value(7.0, 0.4, 0.1, 0.9), 1.0);
    }

    #[test]
    fn degenerate_spans_return_the_constant() {
        // All observed values identical.
        let normalized = normalize_value(0.3, 0.5, 0.5, 0.5);
        assert_eq!(normalized, NORMALIZED_THRESHOLD);
        assert!(normalized.is_finite());

        // Threshold sits on one of the extrema.
        assert_eq!(normalize_value(0.1, 0.1, 0.1, 0.9), NORMALIZED_THRESHOLD);
        assert_eq!(normalize_value(0.95, 0.9, 0.1, 0.9), NORMALIZED_THRESHOLD);
    }

    #[test]
    fn normalizes_slices_in_place() {
        let mut values = vec![0.4, 0.1, 0.9, 0.25];
        normalize_into(&mut values, 0.4, 0.1, 0.9);

        let expected = [0.5, 0.0, 1.0, 0.25];
        for (got, want) in values.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "got {got}, want {want}");
        }
    }
}
