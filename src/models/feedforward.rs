//! Simple feed-forward estimator.
//!
//! An MLP reads the last `context_length` scaled values of a series and emits
//! a Gaussian (mean, raw scale) pair for every step of the horizon. Sample
//! paths are drawn independently per step.

use crate::core::{Frequency, SampleForecast};
use crate::dataset::{DataEntry, ListDataset};
use crate::error::{ForecastError, Result};
use crate::models::nn::{clip_factor, gaussian_nll, sigma_from, Adam, Mlp};
use crate::models::traits::{make_rng, Estimator, Predictor, Trainer};
use crate::transform::mean_abs_scale;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::info;

/// Configuration of the feed-forward network.
#[derive(Debug, Clone)]
pub struct FeedForwardEstimator {
    frequency: Frequency,
    prediction_length: usize,
    context_length: Option<usize>,
    hidden_dims: Vec<usize>,
    trainer: Trainer,
}

impl FeedForwardEstimator {
    /// Two hidden layers of 40 units; context equal to the horizon.
    pub fn new(frequency: Frequency, prediction_length: usize, trainer: Trainer) -> Self {
        Self {
            frequency,
            prediction_length,
            context_length: None,
            hidden_dims: vec![40, 40],
            trainer,
        }
    }

    pub fn with_context_length(mut self, context_length: usize) -> Self {
        self.context_length = Some(context_length);
        self
    }

    pub fn with_hidden_dims(mut self, hidden_dims: Vec<usize>) -> Self {
        self.hidden_dims = hidden_dims;
        self
    }

    pub fn context_length(&self) -> usize {
        self.context_length.unwrap_or(self.prediction_length)
    }

    pub fn trainer(&self) -> &Trainer {
        &self.trainer
    }

    fn validate(&self, data: &ListDataset) -> Result<()> {
        if self.prediction_length == 0 || self.context_length() == 0 {
            return Err(ForecastError::InvalidParameter(
                "prediction_length and context_length must be positive".to_string(),
            ));
        }
        if self.hidden_dims.iter().any(|&d| d == 0) {
            return Err(ForecastError::InvalidParameter(
                "hidden layer sizes must be positive".to_string(),
            ));
        }
        if data.frequency() != self.frequency {
            return Err(ForecastError::InvalidParameter(format!(
                "dataset frequency {} does not match estimator frequency {}",
                data.frequency(),
                self.frequency
            )));
        }
        let window = self.context_length() + self.prediction_length;
        if data.is_empty() {
            return Err(ForecastError::EmptyData);
        }
        if let Some(short) = data.iter().find(|e| e.len() < window) {
            return Err(ForecastError::InsufficientData {
                needed: window,
                got: short.len(),
            });
        }
        self.trainer.validate()
    }
}

impl Estimator for FeedForwardEstimator {
    type Predictor = FeedForwardPredictor;

    fn train(&self, data: &ListDataset) -> Result<FeedForwardPredictor> {
        self.validate(data)?;
        let context = self.context_length();
        let horizon = self.prediction_length;

        let mut rng = make_rng(self.trainer.seed);
        let mut sizes = vec![context];
        sizes.extend(&self.hidden_dims);
        sizes.push(2 * horizon);
        let mut mlp = Mlp::new(&sizes, &mut rng);
        let mut adam = Adam::new(self.trainer.learning_rate);

        info!(
            context_length = context,
            prediction_length = horizon,
            series = data.len(),
            "training feed-forward network"
        );

        let batch_size = self.trainer.batch_size;
        let clip = self.trainer.clip_gradient;
        let entries = data.entries();
        self.trainer.run("feedforward", &mut rng, |rng| {
            let mut x = Array2::zeros((batch_size, context));
            let mut y = Array2::zeros((batch_size, horizon));
            for b in 0..batch_size {
                let target = &entries[rng.gen_range(0..entries.len())].target;
                // split point: context before it, horizon from it on
                let t = rng.gen_range(context..=target.len() - horizon);
                let scaled = mean_abs_scale(&target[t - context..t]);
                for (j, v) in scaled.data.iter().enumerate() {
                    x[[b, j]] = *v;
                }
                for j in 0..horizon {
                    y[[b, j]] = target[t + j] / scaled.scale;
                }
            }

            let (out, cache) = mlp.forward_train(&x);
            let mut dout = Array2::zeros(out.raw_dim());
            let n = (batch_size * horizon) as f64;
            let mut loss = 0.0;
            for b in 0..batch_size {
                for j in 0..horizon {
                    let (l, dmu, dpre) = gaussian_nll(y[[b, j]], out[[b, j]], out[[b, horizon + j]]);
                    loss += l;
                    dout[[b, j]] = dmu / n;
                    dout[[b, horizon + j]] = dpre / n;
                }
            }

            mlp.zero_grad();
            mlp.backward(&cache, &dout);
            mlp.scale_grad(clip_factor(mlp.grad_sq_norm(), clip));
            adam.tick();
            mlp.apply(&adam);
            Ok(loss / n)
        })?;

        Ok(FeedForwardPredictor {
            mlp,
            frequency: self.frequency,
            prediction_length: horizon,
            context_length: context,
            seed: self.trainer.seed,
        })
    }
}

/// Trained feed-forward network.
#[derive(Debug, Clone)]
pub struct FeedForwardPredictor {
    mlp: Mlp,
    frequency: Frequency,
    prediction_length: usize,
    context_length: usize,
    seed: Option<u64>,
}

impl FeedForwardPredictor {
    pub fn context_length(&self) -> usize {
        self.context_length
    }
}

impl Predictor for FeedForwardPredictor {
    fn prediction_length(&self) -> usize {
        self.prediction_length
    }

    fn frequency(&self) -> Frequency {
        self.frequency
    }

    fn name(&self) -> &str {
        "SimpleFeedForward"
    }

    fn seed(&self) -> Option<u64> {
        self.seed
    }

    fn predict_entry(
        &self,
        entry: &DataEntry,
        num_samples: usize,
        rng: &mut StdRng,
    ) -> Result<SampleForecast> {
        if entry.is_empty() {
            return Err(ForecastError::EmptyData);
        }
        let c = self.context_length;
        let p = self.prediction_length;

        // shorter histories are left-padded with zeros
        let available = entry.len().min(c);
        let tail = &entry.target[entry.len() - available..];
        let scaled = mean_abs_scale(tail);
        let mut x = Array2::zeros((1, c));
        for (j, v) in scaled.data.iter().enumerate() {
            x[[0, c - available + j]] = *v;
        }

        let out = self.mlp.forward(&x);
        let mut samples = Array2::zeros((num_samples, p));
        for j in 0..p {
            let mu = out[[0, j]];
            let sigma = sigma_from(out[[0, p + j]]);
            for s in 0..num_samples {
                let eps: f64 = rng.sample(StandardNormal);
                samples[[s, j]] = scaled.restore(mu + sigma * eps);
            }
        }

        Ok(
            SampleForecast::new(samples, entry.forecast_start(self.frequency), self.frequency)?
                .with_item_id(entry.item_id.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn daily_cycle(len: usize) -> ListDataset {
        let start = Utc.with_ymd_and_hms(2018, 1, 10, 0, 0, 0).unwrap();
        let target = (0..len)
            .map(|i| 20.0 + 10.0 * (i as f64 * std::f64::consts::TAU / 24.0).sin())
            .collect();
        ListDataset::new(vec![DataEntry::new(start, target)], Frequency::hourly()).unwrap()
    }

    fn small_trainer() -> Trainer {
        Trainer::new()
            .with_epochs(2)
            .with_num_batches_per_epoch(5)
            .with_batch_size(8)
            .with_seed(Some(42))
    }

    #[test]
    fn forecasts_the_horizon_after_the_series() {
        let data = daily_cycle(384);
        let predictor = FeedForwardEstimator::new(Frequency::hourly(), 24, small_trainer())
            .train(&data)
            .unwrap();
        let forecasts = predictor.predict(&data, 20).unwrap();

        assert_eq!(forecasts.len(), 1);
        let f = &forecasts[0];
        assert_eq!(f.num_samples(), 20);
        assert_eq!(f.horizon(), 24);
        assert_eq!(f.start(), Utc.with_ymd_and_hms(2018, 1, 26, 0, 0, 0).unwrap());
        assert!(f.samples().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn seeded_training_is_reproducible() {
        let data = daily_cycle(100);
        let est = FeedForwardEstimator::new(Frequency::hourly(), 6, small_trainer());
        let a = est.train(&data).unwrap().predict(&data, 5).unwrap();
        let b = est.train(&data).unwrap().predict(&data, 5).unwrap();
        assert_eq!(a[0].samples(), b[0].samples());
    }

    #[test]
    fn short_history_is_padded_at_prediction() {
        let data = daily_cycle(100);
        let predictor = FeedForwardEstimator::new(Frequency::hourly(), 6, small_trainer())
            .with_context_length(12)
            .train(&data)
            .unwrap();
        let short = DataEntry::new(Utc.with_ymd_and_hms(2018, 1, 10, 0, 0, 0).unwrap(), vec![1.0, 2.0]);
        let mut rng = make_rng(Some(0));
        let f = predictor.predict_entry(&short, 3, &mut rng).unwrap();
        assert_eq!(f.horizon(), 6);
    }

    #[test]
    fn rejects_series_shorter_than_a_window() {
        let data = daily_cycle(30);
        let result = FeedForwardEstimator::new(Frequency::hourly(), 24, small_trainer()).train(&data);
        assert!(matches!(
            result,
            Err(ForecastError::InsufficientData { needed: 48, got: 30 })
        ));
    }

    #[test]
    fn rejects_frequency_mismatch() {
        let data = daily_cycle(100);
        let result =
            FeedForwardEstimator::new(Frequency::business_daily(), 6, small_trainer()).train(&data);
        assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
    }
}
