//! Data transformations applied before model training and prediction.

pub mod scale;

pub use scale::{mean_abs_scale, ScaleResult, MIN_SCALE};
