use pyo3::prelude::*;

mod callbacks;
mod error;
mod utils;

pub use callbacks::base_callback::{BatchOutput, PhaseCallback};
pub use callbacks::min_max_normalization::{MinMaxNormalizer, MinMaxNormalizerImpl};
pub use error::NormalizationError;
pub use utils::min_max::{MinMaxSnapshot, MinMaxStatistic, RunningMinMax};
pub use utils::normalize::{
    normalize_array, normalize_into, normalize_value, NORMALIZED_THRESHOLD,
};

use utils::normalize::normalize;

/// A Python module implemented in Rust.
#[pymodule]
fn anomaly_norm_rust(_py: Python, m: &PyModule) -> PyResult<()> {
    // MinMaxNormalizer:
    m.add_class::<MinMaxNormalizer>()?;

    // MinMaxStatistic:
    m.add_class::<MinMaxStatistic>()?;

    // normalize:
    m.add_function(wrap_pyfunction!(normalize, m)?)?;

    Ok(())
}
