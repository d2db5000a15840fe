//! Utility functions shared by estimators and forecasts.

pub mod stats;

pub use stats::{mean, mean_abs, median, quantile, quantile_sorted, sigmoid, softplus};
