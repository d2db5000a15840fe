//! Estimator and predictor traits, plus the shared training configuration.

use crate::core::{Frequency, SampleForecast};
use crate::dataset::{DataEntry, ListDataset};
use crate::error::{ForecastError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A trained model that turns input series into sampled forecasts.
///
/// This trait is object-safe and can be used with `Box<dyn Predictor>`.
pub trait Predictor {
    /// Number of steps forecast past the end of each input series.
    fn prediction_length(&self) -> usize;

    /// Frequency the model was trained at.
    fn frequency(&self) -> Frequency;

    /// Get the model name.
    fn name(&self) -> &str;

    /// Seed used for sampling, if fixed.
    fn seed(&self) -> Option<u64>;

    /// Forecast the `prediction_length` steps following `entry`.
    fn predict_entry(
        &self,
        entry: &DataEntry,
        num_samples: usize,
        rng: &mut StdRng,
    ) -> Result<SampleForecast>;

    /// Forecast every entry of a dataset.
    fn predict(&self, dataset: &ListDataset, num_samples: usize) -> Result<Vec<SampleForecast>> {
        if dataset.frequency() != self.frequency() {
            return Err(ForecastError::InvalidParameter(format!(
                "dataset frequency {} does not match predictor frequency {}",
                dataset.frequency(),
                self.frequency()
            )));
        }
        if num_samples == 0 {
            return Err(ForecastError::InvalidParameter(
                "num_samples must be positive".to_string(),
            ));
        }
        let mut rng = make_rng(self.seed());
        dataset
            .iter()
            .map(|entry| self.predict_entry(entry, num_samples, &mut rng))
            .collect()
    }
}

/// A model configuration that yields a [`Predictor`] once trained.
pub trait Estimator {
    type Predictor: Predictor;

    /// Train on every entry of `data`.
    fn train(&self, data: &ListDataset) -> Result<Self::Predictor>;
}

/// Optimization settings shared by the estimators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trainer {
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub num_batches_per_epoch: usize,
    /// Global gradient norm cap.
    pub clip_gradient: f64,
    pub seed: Option<u64>,
}

impl Default for Trainer {
    fn default() -> Self {
        Self {
            epochs: 100,
            learning_rate: 1e-3,
            batch_size: 32,
            num_batches_per_epoch: 50,
            clip_gradient: 10.0,
            seed: None,
        }
    }
}

impl Trainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_num_batches_per_epoch(mut self, num_batches: usize) -> Self {
        self.num_batches_per_epoch = num_batches;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 || self.batch_size == 0 || self.num_batches_per_epoch == 0 {
            return Err(ForecastError::InvalidParameter(
                "epochs, batch_size and num_batches_per_epoch must be positive".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.clip_gradient <= 0.0 {
            return Err(ForecastError::InvalidParameter(
                "clip_gradient must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Run the epoch/batch loop, returning the mean loss of each epoch.
    ///
    /// `step` performs one optimizer update and returns its batch loss.
    pub fn run<F>(&self, model: &str, rng: &mut StdRng, mut step: F) -> Result<Vec<f64>>
    where
        F: FnMut(&mut StdRng) -> Result<f64>,
    {
        self.validate()?;
        let mut history = Vec::with_capacity(self.epochs);
        for epoch in 0..self.epochs {
            let mut total = 0.0;
            for batch in 0..self.num_batches_per_epoch {
                let loss = step(rng)?;
                if !loss.is_finite() {
                    return Err(ForecastError::ComputationError(format!(
                        "{} loss diverged at epoch {} batch {}",
                        model, epoch, batch
                    )));
                }
                debug!(model, epoch, batch, loss, "batch done");
                total += loss;
            }
            let avg = total / self.num_batches_per_epoch as f64;
            info!(model, epoch, avg_loss = avg, "epoch done");
            history.push(avg);
        }
        Ok(history)
    }
}

/// Seeded RNG when a seed is given, entropy-seeded otherwise.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
