//! DeepAR: an autoregressive recurrent network with a Gaussian likelihood.
//!
//! At every step the LSTM reads lagged values of the scaled target, calendar
//! features of the step's timestamp and the log of the series scale. A dense
//! head maps the hidden state to the mean and scale of the next value.
//! Training unrolls over `context_length + prediction_length` steps with
//! teacher forcing; prediction warms the state up over the context, then
//! feeds each sampled value back in as the next step's lag.

use crate::core::{Frequency, SampleForecast};
use crate::dataset::{DataEntry, ListDataset};
use crate::error::{ForecastError, Result};
use crate::models::nn::{clip_factor, gaussian_nll, sigma_from, Adam, Dense, Lstm, LstmState};
use crate::models::traits::{make_rng, Estimator, Predictor, Trainer};
use crate::transform::mean_abs_scale;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::info;

/// Configuration of a DeepAR model.
#[derive(Debug, Clone)]
pub struct DeepArEstimator {
    frequency: Frequency,
    prediction_length: usize,
    context_length: Option<usize>,
    hidden_size: usize,
    trainer: Trainer,
}

impl DeepArEstimator {
    /// One LSTM layer of 40 cells; context equal to the horizon.
    pub fn new(frequency: Frequency, prediction_length: usize, trainer: Trainer) -> Self {
        Self {
            frequency,
            prediction_length,
            context_length: None,
            hidden_size: 40,
            trainer,
        }
    }

    pub fn with_context_length(mut self, context_length: usize) -> Self {
        self.context_length = Some(context_length);
        self
    }

    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = hidden_size;
        self
    }

    pub fn context_length(&self) -> usize {
        self.context_length.unwrap_or(self.prediction_length)
    }

    pub fn trainer(&self) -> &Trainer {
        &self.trainer
    }

    fn validate(&self, data: &ListDataset) -> Result<()> {
        if self.prediction_length == 0 || self.context_length() == 0 || self.hidden_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "prediction_length, context_length and hidden_size must be positive".to_string(),
            ));
        }
        if data.frequency() != self.frequency {
            return Err(ForecastError::InvalidParameter(format!(
                "dataset frequency {} does not match estimator frequency {}",
                data.frequency(),
                self.frequency
            )));
        }
        if data.is_empty() {
            return Err(ForecastError::EmptyData);
        }
        let window = self.context_length() + self.prediction_length;
        if let Some(short) = data.iter().find(|e| e.len() < window) {
            return Err(ForecastError::InsufficientData {
                needed: window,
                got: short.len(),
            });
        }
        self.trainer.validate()
    }
}

/// Network weights plus the feature layout they were trained with.
#[derive(Debug, Clone)]
struct Network {
    lstm: Lstm,
    head: Dense,
    lags: Vec<usize>,
    frequency: Frequency,
}

impl Network {
    fn input_size(lags: usize, frequency: Frequency) -> usize {
        lags + frequency.num_time_features() + 1
    }

    /// Write the inputs of step `t` for batch row `row`.
    ///
    /// `value` returns the scaled target at an earlier step, or `None` before
    /// the start of the series.
    fn fill_input<F>(
        &self,
        x: &mut Array2<f64>,
        row: usize,
        t: usize,
        features: &[f64],
        log_scale: f64,
        value: F,
    ) where
        F: Fn(usize) -> Option<f64>,
    {
        let mut col = 0;
        for &lag in &self.lags {
            x[[row, col]] = if t >= lag { value(t - lag).unwrap_or(0.0) } else { 0.0 };
            col += 1;
        }
        for &f in features {
            x[[row, col]] = f;
            col += 1;
        }
        x[[row, col]] = log_scale;
    }

    fn num_inputs(&self) -> usize {
        Self::input_size(self.lags.len(), self.frequency)
    }
}

fn time_features(frequency: Frequency, start: DateTime<Utc>, len: usize) -> Vec<Vec<f64>> {
    frequency
        .periods(start, len)
        .iter()
        .map(|ts| frequency.time_features(ts))
        .collect()
}

impl Estimator for DeepArEstimator {
    type Predictor = DeepArPredictor;

    fn train(&self, data: &ListDataset) -> Result<DeepArPredictor> {
        self.validate(data)?;
        let context = self.context_length();
        let horizon = self.prediction_length;
        let window = context + horizon;

        let mut rng = make_rng(self.trainer.seed);
        let lags = self.frequency.lags();
        let input_size = Network::input_size(lags.len(), self.frequency);
        let mut net = Network {
            lstm: Lstm::new(input_size, self.hidden_size, &mut rng),
            head: Dense::new(self.hidden_size, 2, &mut rng),
            lags,
            frequency: self.frequency,
        };
        let mut adam = Adam::new(self.trainer.learning_rate);

        let features: Vec<Vec<Vec<f64>>> = data
            .iter()
            .map(|e| time_features(self.frequency, e.start, e.len()))
            .collect();

        info!(
            context_length = context,
            prediction_length = horizon,
            lags = ?net.lags,
            series = data.len(),
            "training DeepAR"
        );

        let batch_size = self.trainer.batch_size;
        let clip = self.trainer.clip_gradient;
        let entries = data.entries();
        self.trainer.run("deepar", &mut rng, |rng| {
            // (entry, window start, scale) per batch row
            let mut rows = Vec::with_capacity(batch_size);
            for _ in 0..batch_size {
                let e = rng.gen_range(0..entries.len());
                let s = rng.gen_range(0..=entries[e].len() - window);
                let scale = mean_abs_scale(&entries[e].target[s..s + context]).scale;
                rows.push((e, s, scale));
            }

            let n = (batch_size * window) as f64;
            let mut state = net.lstm.zero_state(batch_size);
            let mut caches = Vec::with_capacity(window);
            let mut hidden = Vec::with_capacity(window);
            let mut douts = Vec::with_capacity(window);
            let mut loss = 0.0;

            for k in 0..window {
                let mut x = Array2::zeros((batch_size, net.num_inputs()));
                let mut z = vec![0.0; batch_size];
                for (b, &(e, s, scale)) in rows.iter().enumerate() {
                    let target = &entries[e].target;
                    let t = s + k;
                    net.fill_input(&mut x, b, t, &features[e][t], scale.ln(), |i| {
                        Some(target[i] / scale)
                    });
                    z[b] = target[t] / scale;
                }
                let (next, cache) = net.lstm.step(&x, &state);
                let out = net.head.forward(&next.h);
                let mut dout = Array2::zeros((batch_size, 2));
                for b in 0..batch_size {
                    let (l, dmu, dpre) = gaussian_nll(z[b], out[[b, 0]], out[[b, 1]]);
                    loss += l;
                    dout[[b, 0]] = dmu / n;
                    dout[[b, 1]] = dpre / n;
                }
                hidden.push(next.h.clone());
                caches.push(cache);
                douts.push(dout);
                state = next;
            }

            net.lstm.zero_grad();
            net.head.zero_grad();
            let mut dh_next = Array2::zeros((batch_size, self.hidden_size));
            let mut dc_next = Array2::zeros((batch_size, self.hidden_size));
            for k in (0..window).rev() {
                let dh = net.head.backward(&hidden[k], &douts[k]) + &dh_next;
                let (dh_prev, dc_prev) = net.lstm.backward_step(&caches[k], &dh, &dc_next);
                dh_next = dh_prev;
                dc_next = dc_prev;
            }

            let factor = clip_factor(net.lstm.grad_sq_norm() + net.head.grad_sq_norm(), clip);
            net.lstm.scale_grad(factor);
            net.head.scale_grad(factor);
            adam.tick();
            net.lstm.apply(&adam);
            net.head.apply(&adam);
            Ok(loss / n)
        })?;

        Ok(DeepArPredictor {
            net,
            prediction_length: horizon,
            context_length: context,
            seed: self.trainer.seed,
        })
    }
}

/// Trained DeepAR network.
#[derive(Debug, Clone)]
pub struct DeepArPredictor {
    net: Network,
    prediction_length: usize,
    context_length: usize,
    seed: Option<u64>,
}

impl DeepArPredictor {
    pub fn context_length(&self) -> usize {
        self.context_length
    }

    pub fn lags(&self) -> &[usize] {
        &self.net.lags
    }
}

impl Predictor for DeepArPredictor {
    fn prediction_length(&self) -> usize {
        self.prediction_length
    }

    fn frequency(&self) -> Frequency {
        self.net.frequency
    }

    fn name(&self) -> &str {
        "DeepAR"
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
        let net = &self.net;
        let len = entry.len();
        let p = self.prediction_length;
        let warm_start = len.saturating_sub(self.context_length);
        let scale = mean_abs_scale(&entry.target[warm_start..]).scale;
        let log_scale = scale.ln();
        let features = time_features(net.frequency, entry.start, len + p);
        let observed = |i: usize| Some(entry.target[i] / scale);

        let mut state = net.lstm.zero_state(num_samples);
        for t in warm_start..len {
            let mut x = Array2::zeros((num_samples, net.num_inputs()));
            for row in 0..num_samples {
                net.fill_input(&mut x, row, t, &features[t], log_scale, observed);
            }
            state = net.lstm.step(&x, &state).0;
        }

        // scaled sample paths; column k holds step len + k
        let mut paths = Array2::<f64>::zeros((num_samples, p));
        for k in 0..p {
            let t = len + k;
            let mut x = Array2::zeros((num_samples, net.num_inputs()));
            for row in 0..num_samples {
                net.fill_input(&mut x, row, t, &features[t], log_scale, |i| {
                    if i < len {
                        observed(i)
                    } else {
                        Some(paths[[row, i - len]])
                    }
                });
            }
            let next: LstmState = net.lstm.step(&x, &state).0;
            let out = net.head.forward(&next.h);
            for row in 0..num_samples {
                let eps: f64 = rng.sample(StandardNormal);
                paths[[row, k]] = out[[row, 0]] + sigma_from(out[[row, 1]]) * eps;
            }
            state = next;
        }

        paths.mapv_inplace(|v| v * scale);
        Ok(
            SampleForecast::new(paths, entry.forecast_start(net.frequency), net.frequency)?
                .with_item_id(entry.item_id.clone()),
        )
    }
}
