use ndarray::{Array1, ArrayD};

use crate::error::NormalizationError;

/// Model outputs for one batch: a per-sample anomaly score, and for
/// segmentation models a per-pixel anomaly map.
pub struct BatchOutput {
    pub pred_scores: Array1<f64>,
    pub anomaly_maps: Option<ArrayD<f64>>,
}

/// Lifecycle contract between a training-loop driver and a
/// post-processing callback.
///
/// The driver invokes the hooks directly, in phase order: validation
/// batches first, then test and/or predict batches. Batch outputs are
/// rewritten in place.
pub trait PhaseCallback {
    /// A new validation phase begins; collected state starts over.
    fn on_validation_start(&mut self) {}

    /// A validation batch finished; observe its raw outputs.
    fn on_validation_batch_end(&mut self, outputs: &mut BatchOutput);

    /// The test phase begins; collected state is frozen from here on.
    fn on_test_start(&mut self) {}

    /// A test batch finished; rewrite its outputs in place.
    fn on_test_batch_end(&mut self, outputs: &mut BatchOutput)
        -> Result<(), NormalizationError>;

    /// A predict batch finished; same contract as the test hook.
    fn on_predict_batch_end(&mut self, outputs: &mut BatchOutput)
        -> Result<(), NormalizationError>;
}
