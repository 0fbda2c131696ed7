use log::debug;
use numpy::{PyReadonlyArray1, PyReadonlyArrayDyn, ToPyArray};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::callbacks::base_callback::{BatchOutput, PhaseCallback};
use crate::error::NormalizationError;
use crate::utils::min_max::{MinMaxSnapshot, RunningMinMax};
use crate::utils::normalize::{normalize_array, NORMALIZED_THRESHOLD};

#[derive(Clone, Copy, PartialEq)]
enum Phase {
    Collecting,
    Normalizing,
}

/// Min-max normalization over a validation/test lifecycle.
///
/// During validation the injected [`RunningMinMax`] accumulates the raw
/// score range; during test and predict the accumulated extrema are
/// frozen and every batch is rescaled into `[0, 1]` with the raw
/// decision thresholds anchored at 0.5.
pub struct MinMaxNormalizerImpl {
    min_max: RunningMinMax,
    image_threshold: f64,
    pixel_threshold: f64,
    phase: Phase,
    snapshot: Option<MinMaxSnapshot>,
}

impl MinMaxNormalizerImpl {
    pub fn new(min_max: RunningMinMax, image_threshold: f64, pixel_threshold: f64) -> Self {
        MinMaxNormalizerImpl {
            min_max,
            image_threshold,
            pixel_threshold,
            phase: Phase::Collecting,
            snapshot: None,
        }
    }

    pub fn image_threshold(&self) -> f64 {
        self.image_threshold
    }

    pub fn set_image_threshold(&mut self, threshold: f64) {
        self.image_threshold = threshold;
    }

    pub fn pixel_threshold(&self) -> f64 {
        self.pixel_threshold
    }

    pub fn set_pixel_threshold(&mut self, threshold: f64) {
        self.pixel_threshold = threshold;
    }

    pub fn min_max(&self) -> &RunningMinMax {
        &self.min_max
    }

    /// Observe one batch of raw values during collection. New
    /// validation data after a normalizing phase reopens collection and
    /// drops the stale snapshot.
    pub fn observe<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = f64>,
    {
        if self.phase == Phase::Normalizing {
            debug!("validation data after a normalizing phase, reopening collection");
            self.snapshot = None;
            self.phase = Phase::Collecting;
        }
        self.min_max.update(values);
    }

    /// The snapshot is taken at the first normalization of a phase and
    /// reused until new validation data arrives.
    fn frozen_stats(&mut self) -> Result<MinMaxSnapshot, NormalizationError> {
        if let Some(snapshot) = self.snapshot {
            return Ok(snapshot);
        }
        let snapshot = self.min_max.snapshot()?;
        self.snapshot = Some(snapshot);
        self.phase = Phase::Normalizing;
        Ok(snapshot)
    }

    /// Rescale image scores and, when present, the anomaly map.
    fn normalize_batch(&mut self, outputs: &mut BatchOutput) -> Result<(), NormalizationError> {
        let stats = self.frozen_stats()?;
        normalize_array(
            &mut outputs.pred_scores,
            self.image_threshold,
            stats.min,
            stats.max,
        );
        if let Some(maps) = outputs.anomaly_maps.as_mut() {
            normalize_array(maps, self.pixel_threshold, stats.min, stats.max);
        }
        Ok(())
    }
}

impl PhaseCallback for MinMaxNormalizerImpl {
    fn on_validation_start(&mut self) {
        debug!("validation phase starting, resetting min/max statistics");
        self.min_max.reset();
        self.snapshot = None;
        self.phase = Phase::Collecting;
    }

    fn on_validation_batch_end(&mut self, outputs: &mut BatchOutput) {
        // Pixel-level maps cover the image-level scores when present.
        match outputs.anomaly_maps.as_ref() {
            Some(maps) => self.observe(maps.iter().copied()),
            None => self.observe(outputs.pred_scores.iter().copied()),
        }
    }

    fn on_test_start(&mut self) {
        debug!("test phase starting, freezing min/max statistics");
        self.snapshot = None;
        self.phase = Phase::Normalizing;
    }

    fn on_test_batch_end(
        &mut self,
        outputs: &mut BatchOutput,
    ) -> Result<(), NormalizationError> {
        self.normalize_batch(outputs)
    }

    fn on_predict_batch_end(
        &mut self,
        outputs: &mut BatchOutput,
    ) -> Result<(), NormalizationError> {
        self.normalize_batch(outputs)
    }
}

/// Pull `pred_scores` and an optional `anomaly_maps` out of a batch
/// dict produced by the model's inference step.
fn extract_batch(outputs: &PyDict) -> PyResult<BatchOutput> {
    let scores = outputs
        .get_item("pred_scores")
        .ok_or(NormalizationError::MissingScores)?;
    let scores: PyReadonlyArray1<f64> = scores
        .extract()
        .map_err(|_| NormalizationError::ScoreDtype { key: "pred_scores" })?;

    let anomaly_maps = match outputs.get_item("anomaly_maps") {
        Some(maps) => {
            let maps: PyReadonlyArrayDyn<f64> = maps.extract().map_err(|_| {
                NormalizationError::ScoreDtype {
                    key: "anomaly_maps",
                }
            })?;
            Some(maps.as_array().to_owned())
        }
        None => None,
    };

    Ok(BatchOutput {
        pred_scores: scores.as_array().to_owned(),
        anomaly_maps,
    })
}

/// Write normalized scores back into the batch dict. A batch without
/// `anomaly_maps` keeps that key absent.
fn write_batch(py: Python, outputs: &PyDict, batch: &BatchOutput) -> PyResult<()> {
    outputs.set_item("pred_scores", batch.pred_scores.to_pyarray(py))?;
    if let Some(maps) = batch.anomaly_maps.as_ref() {
        outputs.set_item("anomaly_maps", maps.to_pyarray(py))?;
    }
    Ok(())
}

/// Python-exposed wrapper around [`MinMaxNormalizerImpl`].
///
/// A training loop calls the lifecycle hooks directly with its batch
/// output dicts. The optional `image_metrics` / `pixel_metrics` handles
/// only need a `set_threshold` method; it is invoked with 0.5 when the
/// test phase starts, since that is where the raw thresholds land after
/// normalization.
#[pyclass]
pub struct MinMaxNormalizer {
    inner: MinMaxNormalizerImpl,
    image_metrics: Option<PyObject>,
    pixel_metrics: Option<PyObject>,
}

#[pymethods]
impl MinMaxNormalizer {
    #[new]
    fn new(
        image_threshold: f64,
        pixel_threshold: f64,
        image_metrics: Option<PyObject>,
        pixel_metrics: Option<PyObject>,
    ) -> Self {
        MinMaxNormalizer {
            inner: MinMaxNormalizerImpl::new(
                RunningMinMax::new(),
                image_threshold,
                pixel_threshold,
            ),
            image_metrics,
            pixel_metrics,
        }
    }

    #[getter]
    fn image_threshold(&self) -> f64 {
        self.inner.image_threshold()
    }

    #[setter]
    fn set_image_threshold(&mut self, threshold: f64) {
        self.inner.set_image_threshold(threshold);
    }

    #[getter]
    fn pixel_threshold(&self) -> f64 {
        self.inner.pixel_threshold()
    }

    #[setter]
    fn set_pixel_threshold(&mut self, threshold: f64) {
        self.inner.set_pixel_threshold(threshold);
    }

    #[pyo3(name = "on_validation_start")]
    /// Called when a validation epoch begins, resets the statistics.
    fn on_validation_start(&mut self) {
        PhaseCallback::on_validation_start(&mut self.inner);
    }

    #[pyo3(name = "on_validation_batch_end")]
    /// Called when a validation batch ends, updates the observed range.
    fn on_validation_batch_end(&mut self, outputs: &PyDict) -> PyResult<()> {
        if outputs.get_item("pred_scores").is_none() {
            return Err(NormalizationError::MissingScores.into());
        }
        match outputs.get_item("anomaly_maps") {
            Some(maps) => {
                let maps: PyReadonlyArrayDyn<f64> = maps.extract().map_err(|_| {
                    NormalizationError::ScoreDtype {
                        key: "anomaly_maps",
                    }
                })?;
                self.inner.observe(maps.as_array().iter().copied());
            }
            None => {
                let scores = outputs
                    .get_item("pred_scores")
                    .ok_or(NormalizationError::MissingScores)?;
                let scores: PyReadonlyArray1<f64> = scores.extract().map_err(|_| {
                    NormalizationError::ScoreDtype { key: "pred_scores" }
                })?;
                self.inner.observe(scores.as_array().iter().copied());
            }
        }
        Ok(())
    }

    #[pyo3(name = "on_test_start")]
    /// Called when the test phase begins, moves the metric thresholds
    /// into the normalized space.
    fn on_test_start(&mut self, py: Python) -> PyResult<()> {
        PhaseCallback::on_test_start(&mut self.inner);
        if let Some(metrics) = self.image_metrics.as_ref() {
            metrics.call_method1(py, "set_threshold", (NORMALIZED_THRESHOLD,))?;
        }
        if let Some(metrics) = self.pixel_metrics.as_ref() {
            metrics.call_method1(py, "set_threshold", (NORMALIZED_THRESHOLD,))?;
        }
        Ok(())
    }

    #[pyo3(name = "on_test_batch_end")]
    /// Called when a test batch ends, normalizes its scores in place.
    fn on_test_batch_end(&mut self, py: Python, outputs: &PyDict) -> PyResult<()> {
        let mut batch = extract_batch(outputs)?;
        PhaseCallback::on_test_batch_end(&mut self.inner, &mut batch)?;
        write_batch(py, outputs, &batch)
    }

    #[pyo3(name = "on_predict_batch_end")]
    /// Called when a predict batch ends, normalizes its scores in place.
    fn on_predict_batch_end(&mut self, py: Python, outputs: &PyDict) -> PyResult<()> {
        let mut batch = extract_batch(outputs)?;
        PhaseCallback::on_predict_batch_end(&mut self.inner, &mut batch)?;
        write_batch(py, outputs, &batch)
    }

    #[pyo3(name = "get_min")]
    /// Get the minimum score observed during validation.
    fn get_min(&self) -> PyResult<f64> {
        Ok(self.inner.min_max().min()?)
    }

    #[pyo3(name = "get_max")]
    /// Get the maximum score observed during validation.
    fn get_max(&self) -> PyResult<f64> {
        Ok(self.inner.min_max().max()?)
    }

    #[pyo3(name = "get_count")]
    /// Get the total number of values observed during validation.
    fn get_count(&self) -> usize {
        self.inner.min_max().count()
    }
}
