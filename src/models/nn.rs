//! Neural network building blocks: parameters, Adam, dense and LSTM layers,
//! and the Gaussian output head shared by both estimators.
//!
//! All layers work on batches laid out as `[batch, features]`.

use crate::utils::{sigmoid, softplus};
use ndarray::{s, Array, Array1, Array2, Axis, Dimension, Ix1, Ix2, Zip};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

/// Floor added to every predicted standard deviation.
pub const MIN_SIGMA: f64 = 1e-6;

const HALF_LN_2PI: f64 = 0.918_938_533_204_672_8;

/// A trainable tensor with its gradient and Adam moment buffers.
#[derive(Debug, Clone)]
pub struct Param<D: Dimension> {
    pub value: Array<f64, D>,
    pub grad: Array<f64, D>,
    m: Array<f64, D>,
    v: Array<f64, D>,
}

impl<D: Dimension> Param<D> {
    pub fn new(value: Array<f64, D>) -> Self {
        let zeros = Array::zeros(value.raw_dim());
        Self {
            grad: zeros.clone(),
            m: zeros.clone(),
            v: zeros,
            value,
        }
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    pub fn grad_sq_norm(&self) -> f64 {
        self.grad.iter().map(|g| g * g).sum()
    }

    pub fn scale_grad(&mut self, factor: f64) {
        self.grad.mapv_inplace(|g| g * factor);
    }
}

/// Adam (Adaptive Moment Estimation).
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    t: i32,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
        }
    }

    /// Advance the timestep; call once per batch before any `update`.
    pub fn tick(&mut self) {
        self.t += 1;
    }

    pub fn update<D: Dimension>(&self, p: &mut Param<D>) {
        let (b1, b2, eps, lr) = (self.beta1, self.beta2, self.epsilon, self.learning_rate);
        let t = self.t.max(1);
        let c1 = 1.0 - b1.powi(t);
        let c2 = 1.0 - b2.powi(t);
        Zip::from(&mut p.value)
            .and(&p.grad)
            .and(&mut p.m)
            .and(&mut p.v)
            .for_each(|w, &g, m, v| {
                *m = b1 * *m + (1.0 - b1) * g;
                *v = b2 * *v + (1.0 - b2) * g * g;
                *w -= lr * (*m / c1) / ((*v / c2).sqrt() + eps);
            });
    }
}

/// Factor that brings a gradient of squared norm `sq_norm` under `max_norm`.
pub fn clip_factor(sq_norm: f64, max_norm: f64) -> f64 {
    let norm = sq_norm.sqrt();
    if norm > max_norm && norm.is_finite() {
        max_norm / norm
    } else {
        1.0
    }
}

fn glorot<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Array2<f64> {
    let limit = (6.0 / (rows + cols) as f64).sqrt();
    Array2::random_using((rows, cols), Uniform::new(-limit, limit), rng)
}

/// Fully connected layer `y = x W^T + b`.
#[derive(Debug, Clone)]
pub struct Dense {
    pub weight: Param<Ix2>,
    pub bias: Param<Ix1>,
}

impl Dense {
    pub fn new<R: Rng + ?Sized>(input: usize, output: usize, rng: &mut R) -> Self {
        Self {
            weight: Param::new(glorot(output, input, rng)),
            bias: Param::new(Array1::zeros(output)),
        }
    }

    pub fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.weight.value.t()) + &self.bias.value
    }

    /// Accumulate gradients for `dy` and return the gradient w.r.t. `x`.
    pub fn backward(&mut self, x: &Array2<f64>, dy: &Array2<f64>) -> Array2<f64> {
        self.weight.grad += &dy.t().dot(x);
        self.bias.grad += &dy.sum_axis(Axis(0));
        dy.dot(&self.weight.value)
    }

    pub fn zero_grad(&mut self) {
        self.weight.zero_grad();
        self.bias.zero_grad();
    }

    pub fn grad_sq_norm(&self) -> f64 {
        self.weight.grad_sq_norm() + self.bias.grad_sq_norm()
    }

    pub fn scale_grad(&mut self, factor: f64) {
        self.weight.scale_grad(factor);
        self.bias.scale_grad(factor);
    }

    pub fn apply(&mut self, adam: &Adam) {
        adam.update(&mut self.weight);
        adam.update(&mut self.bias);
    }
}

/// Multi-layer perceptron: ReLU on hidden layers, linear output.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Dense>,
}

/// Inputs and pre-activations saved by [`Mlp::forward_train`].
pub struct MlpCache {
    inputs: Vec<Array2<f64>>,
    pre: Vec<Array2<f64>>,
}

impl Mlp {
    /// `sizes` lists every width from input to output, e.g. `[24, 40, 40, 48]`.
    pub fn new<R: Rng + ?Sized>(sizes: &[usize], rng: &mut R) -> Self {
        let layers = sizes
            .windows(2)
            .map(|w| Dense::new(w[0], w[1], rng))
            .collect();
        Self { layers }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        let last = self.layers.len().saturating_sub(1);
        let mut a = x.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            a = layer.forward(&a);
            if i < last {
                a.mapv_inplace(|v| v.max(0.0));
            }
        }
        a
    }

    pub fn forward_train(&self, x: &Array2<f64>) -> (Array2<f64>, MlpCache) {
        let last = self.layers.len().saturating_sub(1);
        let mut cache = MlpCache {
            inputs: Vec::with_capacity(self.layers.len()),
            pre: Vec::with_capacity(self.layers.len()),
        };
        let mut a = x.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(&a);
            cache.inputs.push(a);
            a = if i < last { z.mapv(|v| v.max(0.0)) } else { z.clone() };
            cache.pre.push(z);
        }
        (a, cache)
    }

    pub fn backward(&mut self, cache: &MlpCache, dout: &Array2<f64>) {
        let mut grad = dout.clone();
        for i in (0..self.layers.len()).rev() {
            if i + 1 < self.layers.len() {
                Zip::from(&mut grad)
                    .and(&cache.pre[i])
                    .for_each(|g, &z| {
                        if z <= 0.0 {
                            *g = 0.0;
                        }
                    });
            }
            grad = self.layers[i].backward(&cache.inputs[i], &grad);
        }
    }

    pub fn zero_grad(&mut self) {
        self.layers.iter_mut().for_each(Dense::zero_grad);
    }

    pub fn grad_sq_norm(&self) -> f64 {
        self.layers.iter().map(Dense::grad_sq_norm).sum()
    }

    pub fn scale_grad(&mut self, factor: f64) {
        self.layers.iter_mut().for_each(|l| l.scale_grad(factor));
    }

    pub fn apply(&mut self, adam: &Adam) {
        self.layers.iter_mut().for_each(|l| l.apply(adam));
    }
}

/// Hidden and cell state of an LSTM, one row per batch member.
#[derive(Debug, Clone)]
pub struct LstmState {
    pub h: Array2<f64>,
    pub c: Array2<f64>,
}

/// Activations saved by one [`Lstm::step`] for backpropagation.
pub struct LstmCache {
    x: Array2<f64>,
    h_prev: Array2<f64>,
    c_prev: Array2<f64>,
    i: Array2<f64>,
    f: Array2<f64>,
    g: Array2<f64>,
    o: Array2<f64>,
    tanh_c: Array2<f64>,
}

/// Single-layer LSTM. Gates are stacked `[input, forget, cell, output]`.
#[derive(Debug, Clone)]
pub struct Lstm {
    hidden_size: usize,
    w_x: Param<Ix2>,
    w_h: Param<Ix2>,
    bias: Param<Ix1>,
}

impl Lstm {
    pub fn new<R: Rng + ?Sized>(input_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        let mut bias = Array1::zeros(4 * hidden_size);
        bias.slice_mut(s![hidden_size..2 * hidden_size]).fill(1.0);
        Self {
            hidden_size,
            w_x: Param::new(glorot(4 * hidden_size, input_size, rng)),
            w_h: Param::new(glorot(4 * hidden_size, hidden_size, rng)),
            bias: Param::new(bias),
        }
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn zero_state(&self, batch: usize) -> LstmState {
        LstmState {
            h: Array2::zeros((batch, self.hidden_size)),
            c: Array2::zeros((batch, self.hidden_size)),
        }
    }

    pub fn step(&self, x: &Array2<f64>, state: &LstmState) -> (LstmState, LstmCache) {
        let hs = self.hidden_size;
        let z = x.dot(&self.w_x.value.t()) + state.h.dot(&self.w_h.value.t()) + &self.bias.value;
        let i = z.slice(s![.., 0..hs]).mapv(sigmoid);
        let f = z.slice(s![.., hs..2 * hs]).mapv(sigmoid);
        let g = z.slice(s![.., 2 * hs..3 * hs]).mapv(f64::tanh);
        let o = z.slice(s![.., 3 * hs..4 * hs]).mapv(sigmoid);

        let c = &f * &state.c + &i * &g;
        let tanh_c = c.mapv(f64::tanh);
        let h = &o * &tanh_c;

        let cache = LstmCache {
            x: x.clone(),
            h_prev: state.h.clone(),
            c_prev: state.c.clone(),
            i,
            f,
            g,
            o,
            tanh_c,
        };
        (LstmState { h, c }, cache)
    }

    /// Backpropagate one step. `dh` already includes the gradient flowing
    /// from the next step; returns `(dh_prev, dc_prev)`.
    pub fn backward_step(
        &mut self,
        cache: &LstmCache,
        dh: &Array2<f64>,
        dc_next: &Array2<f64>,
    ) -> (Array2<f64>, Array2<f64>) {
        let hs = self.hidden_size;
        let d_o = dh * &cache.tanh_c;
        let dc = dh * &cache.o * &cache.tanh_c.mapv(|t| 1.0 - t * t) + dc_next;

        let da_i = &dc * &cache.g * &cache.i.mapv(|v| v * (1.0 - v));
        let da_f = &dc * &cache.c_prev * &cache.f.mapv(|v| v * (1.0 - v));
        let da_g = &dc * &cache.i * &cache.g.mapv(|v| 1.0 - v * v);
        let da_o = d_o * &cache.o.mapv(|v| v * (1.0 - v));
        let dc_prev = &dc * &cache.f;

        let mut da = Array2::zeros((dh.nrows(), 4 * hs));
        da.slice_mut(s![.., 0..hs]).assign(&da_i);
        da.slice_mut(s![.., hs..2 * hs]).assign(&da_f);
        da.slice_mut(s![.., 2 * hs..3 * hs]).assign(&da_g);
        da.slice_mut(s![.., 3 * hs..4 * hs]).assign(&da_o);

        self.w_x.grad += &da.t().dot(&cache.x);
        self.w_h.grad += &da.t().dot(&cache.h_prev);
        self.bias.grad += &da.sum_axis(Axis(0));

        (da.dot(&self.w_h.value), dc_prev)
    }

    pub fn zero_grad(&mut self) {
        self.w_x.zero_grad();
        self.w_h.zero_grad();
        self.bias.zero_grad();
    }

    pub fn grad_sq_norm(&self) -> f64 {
        self.w_x.grad_sq_norm() + self.w_h.grad_sq_norm() + self.bias.grad_sq_norm()
    }

    pub fn scale_grad(&mut self, factor: f64) {
        self.w_x.scale_grad(factor);
        self.w_h.scale_grad(factor);
        self.bias.scale_grad(factor);
    }

    pub fn apply(&mut self, adam: &Adam) {
        adam.update(&mut self.w_x);
        adam.update(&mut self.w_h);
        adam.update(&mut self.bias);
    }
}

/// Gaussian negative log-likelihood of `z` under `N(mu, softplus(pre) + MIN_SIGMA)`.
///
/// Returns `(loss, dloss/dmu, dloss/dpre)`.
pub fn gaussian_nll(z: f64, mu: f64, pre: f64) -> (f64, f64, f64) {
    let sigma = softplus(pre) + MIN_SIGMA;
    let r = (z - mu) / sigma;
    let loss = sigma.ln() + 0.5 * r * r + HALF_LN_2PI;
    let dmu = -r / sigma;
    let dsigma = (1.0 - r * r) / sigma;
    (loss, dmu, dsigma * sigmoid(pre))
}

/// Standard deviation encoded by a raw head output.
pub fn sigma_from(pre: f64) -> f64 {
    softplus(pre) + MIN_SIGMA
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use statrs::distribution::{Continuous, Normal};

    #[test]
    fn gaussian_nll_matches_log_density() {
        let (loss, _, _) = gaussian_nll(1.3, 0.5, 0.2);
        let normal = Normal::new(0.5, sigma_from(0.2)).unwrap();
        assert_relative_eq!(loss, -normal.ln_pdf(1.3), epsilon = 1e-10);
    }

    #[test]
    fn gaussian_nll_gradients_match_finite_differences() {
        let (z, mu, pre) = (0.7, -0.2, 0.4);
        let h = 1e-6;
        let (_, dmu, dpre) = gaussian_nll(z, mu, pre);
        let num_mu = (gaussian_nll(z, mu + h, pre).0 - gaussian_nll(z, mu - h, pre).0) / (2.0 * h);
        let num_pre = (gaussian_nll(z, mu, pre + h).0 - gaussian_nll(z, mu, pre - h).0) / (2.0 * h);
        assert_relative_eq!(dmu, num_mu, epsilon = 1e-5);
        assert_relative_eq!(dpre, num_pre, epsilon = 1e-5);
    }

    #[test]
    fn adam_moves_against_gradient() {
        let mut p = Param::new(array![1.0, -1.0]);
        p.grad = array![0.5, -0.5];
        let mut adam = Adam::new(0.1);
        adam.tick();
        adam.update(&mut p);
        // first bias-corrected step has magnitude ~lr
        assert_relative_eq!(p.value[0], 0.9, epsilon = 1e-6);
        assert_relative_eq!(p.value[1], -0.9, epsilon = 1e-6);
    }

    #[test]
    fn clip_factor_caps_norm() {
        assert_eq!(clip_factor(4.0, 10.0), 1.0);
        assert_relative_eq!(clip_factor(400.0, 10.0), 0.5, epsilon = 1e-12);
        assert_eq!(clip_factor(f64::INFINITY, 10.0), 1.0);
    }

    #[test]
    fn mlp_gradient_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut mlp = Mlp::new(&[3, 4, 2], &mut rng);
        let x = array![[0.3, -0.1, 0.8], [0.5, 0.2, -0.4]];
        // loss = sum(out)
        let (out, cache) = mlp.forward_train(&x);
        mlp.zero_grad();
        mlp.backward(&cache, &Array2::ones(out.raw_dim()));
        let analytic = mlp.layers[0].weight.grad[[1, 2]];

        let h = 1e-6;
        let mut plus = mlp.clone();
        plus.layers[0].weight.value[[1, 2]] += h;
        let mut minus = mlp.clone();
        minus.layers[0].weight.value[[1, 2]] -= h;
        let numeric = (plus.forward(&x).sum() - minus.forward(&x).sum()) / (2.0 * h);
        assert_relative_eq!(analytic, numeric, epsilon = 1e-5);
    }

    #[test]
    fn lstm_gradient_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut lstm = Lstm::new(2, 3, &mut rng);
        let xs = [array![[0.5, -0.3]], array![[0.1, 0.9]], array![[-0.7, 0.2]]];

        let loss = |lstm: &Lstm| {
            let mut state = lstm.zero_state(1);
            let mut total = 0.0;
            for x in &xs {
                state = lstm.step(x, &state).0;
                total += state.h.sum();
            }
            total
        };

        let mut state = lstm.zero_state(1);
        let mut caches = Vec::new();
        for x in &xs {
            let (next, cache) = lstm.step(x, &state);
            caches.push(cache);
            state = next;
        }
        lstm.zero_grad();
        let mut dh_next = Array2::zeros((1, 3));
        let mut dc_next = Array2::zeros((1, 3));
        for cache in caches.iter().rev() {
            let dh = Array2::<f64>::ones((1, 3)) + &dh_next;
            let (dh_prev, dc_prev) = lstm.backward_step(cache, &dh, &dc_next);
            dh_next = dh_prev;
            dc_next = dc_prev;
        }

        let h = 1e-6;
        for &(r, c) in &[(0usize, 0usize), (5, 1), (11, 0)] {
            let mut plus = lstm.clone();
            plus.w_x.value[[r, c]] += h;
            let mut minus = lstm.clone();
            minus.w_x.value[[r, c]] -= h;
            let numeric = (loss(&plus) - loss(&minus)) / (2.0 * h);
            assert_relative_eq!(lstm.w_x.grad[[r, c]], numeric, epsilon = 1e-5);
        }
        let mut plus = lstm.clone();
        plus.w_h.value[[2, 1]] += h;
        let mut minus = lstm.clone();
        minus.w_h.value[[2, 1]] -= h;
        let numeric = (loss(&plus) - loss(&minus)) / (2.0 * h);
        assert_relative_eq!(lstm.w_h.grad[[2, 1]], numeric, epsilon = 1e-5);
    }
}
