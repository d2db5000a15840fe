//! Forecasting models.
//!
//! Both estimators follow the same shape: an [`Estimator`] holds the
//! configuration and a [`Trainer`], and training yields a [`Predictor`] that
//! draws sample paths for new series.

mod traits;

pub mod deepar;
pub mod feedforward;
pub mod nn;

pub use deepar::{DeepArEstimator, DeepArPredictor};
pub use feedforward::{FeedForwardEstimator, FeedForwardPredictor};
pub use traits::{make_rng, Estimator, Predictor, Trainer};

/// Sample paths drawn per series when the caller does not choose.
pub const DEFAULT_NUM_SAMPLES: usize = 100;
