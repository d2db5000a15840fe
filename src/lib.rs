//! # tec-forecast
//!
//! Forecasting of ionospheric Total Electron Content (TEC).
//!
//! Provides a feed-forward and a DeepAR estimator with sampled probabilistic
//! forecasts, a benchmark dataset repository, timestamp-keyed alignment of
//! forecast outputs, and static charts comparing them with observations and
//! the IRI 2016 reference model.

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]

pub mod align;
pub mod core;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod models;
pub mod pipeline;
pub mod plot;
pub mod table;
pub mod transform;
pub mod utils;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::align::{ComparisonTable, ReshapeOrder};
    pub use crate::core::{Forecast, Frequency, SampleForecast, TimeSeries};
    pub use crate::dataset::{DataEntry, ListDataset};
    pub use crate::error::{ForecastError, Result};
    pub use crate::evaluation::make_evaluation_predictions;
    pub use crate::models::{DeepArEstimator, Estimator, FeedForwardEstimator, Predictor, Trainer};
}
