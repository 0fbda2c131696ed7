use numpy::PyReadonlyArrayDyn;
use pyo3::prelude::*;

use crate::error::NormalizationError;

/// Frozen view of the accumulator, read during the normalizing phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMaxSnapshot {
    pub min: f64,
    pub max: f64,
}

/// Running minimum/maximum over a stream of score batches.
///
/// The extrema start out as infinities and are only exposed once at
/// least one value has been folded in; reading an empty accumulator is
/// an error rather than a pair of sentinels.
pub struct RunningMinMax {
    min: f64,
    max: f64,
    num_observed: usize,
}

impl RunningMinMax {
    pub fn new() -> Self {
        RunningMinMax {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            num_observed: 0,
        }
    }

    /// Fold a batch of raw scores into the extrema. NaN values are
    /// skipped so they never poison the statistics.
    pub fn update<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = f64>,
    {
        for value in values {
            if value.is_nan() {
                continue;
            }
            if value < self.min {
                self.min = value;
            }
            if value > self.max {
                self.max = value;
            }
            self.num_observed += 1;
        }
    }

    /// Forget everything observed so far.
    pub fn reset(&mut self) {
        *self = RunningMinMax::new();
    }

    pub fn count(&self) -> usize {
        self.num_observed
    }

    pub fn min(&self) -> Result<f64, NormalizationError> {
        if self.num_observed == 0 {
            return Err(NormalizationError::NoObservations);
        }
        Ok(self.min)
    }

    pub fn max(&self) -> Result<f64, NormalizationError> {
        if self.num_observed == 0 {
            return Err(NormalizationError::NoObservations);
        }
        Ok(self.max)
    }

    /// Copy out the current extrema for read-only use.
    pub fn snapshot(&self) -> Result<MinMaxSnapshot, NormalizationError> {
        Ok(MinMaxSnapshot {
            min: self.min()?,
            max: self.max()?,
        })
    }
}

impl Default for RunningMinMax {
    fn default() -> Self {
        RunningMinMax::new()
    }
}

/// Python-exposed wrapper around [`RunningMinMax`], for drivers that
/// track statistics themselves or pre-seed them.
#[pyclass]
pub struct MinMaxStatistic {
    inner: RunningMinMax,
}

#[pymethods]
impl MinMaxStatistic {
    #[new]
    fn new() -> Self {
        MinMaxStatistic {
            inner: RunningMinMax::new(),
        }
    }

    #[pyo3(name = "update")]
    /// Update with a batch of values of any shape.
    fn update(&mut self, values: PyReadonlyArrayDyn<f64>) {
        self.inner.update(values.as_array().iter().copied());
    }

    #[pyo3(name = "get_min")]
    /// Get the minimum observed value.
    fn get_min(&self) -> PyResult<f64> {
        Ok(self.inner.min()?)
    }

    #[pyo3(name = "get_max")]
    /// Get the maximum observed value.
    fn get_max(&self) -> PyResult<f64> {
        Ok(self.inner.max()?)
    }

    #[pyo3(name = "get_count")]
    /// Get the total number of values observed.
    fn get_count(&self) -> usize {
        self.inner.count()
    }

    #[pyo3(name = "reset")]
    /// Forget everything observed so far.
    fn reset(&mut self) {
        self.inner.reset();
    }
}
