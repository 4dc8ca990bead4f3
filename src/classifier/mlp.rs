use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Error, Result};
use crate::math;

/// Fewest output neurons handed to one worker at a time.
const MIN_OUTPUTS_PER_TASK: usize = 8;

/// Workers that evaluate the neurons of one MLP layer.
///
/// Every output element is computed from the same immutable inputs by
/// exactly one worker, so results do not depend on the worker count.
#[derive(Clone)]
pub struct WorkerPool {
    pool: Option<Arc<ThreadPool>>,
    num_workers: usize,
}

impl WorkerPool {
    pub const DEFAULT_WORKERS: usize = 4;

    /// A pool of `num_workers` threads; 0 or 1 evaluates on the calling thread.
    pub fn new(num_workers: usize) -> Result<WorkerPool> {
        if num_workers <= 1 {
            return Ok(WorkerPool::sequential());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("fd-mlp-{i}"))
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;
        Ok(WorkerPool {
            pool: Some(Arc::new(pool)),
            num_workers,
        })
    }

    pub fn sequential() -> WorkerPool {
        WorkerPool {
            pool: None,
            num_workers: 1,
        }
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    fn fill<F>(&self, output: &mut [f32], f: F)
    where
        F: Fn(usize) -> f32 + Sync + Send,
    {
        match &self.pool {
            Some(pool) if output.len() > MIN_OUTPUTS_PER_TASK => pool.install(|| {
                output
                    .par_iter_mut()
                    .with_min_len(MIN_OUTPUTS_PER_TASK)
                    .enumerate()
                    .for_each(|(i, out)| *out = f(i));
            }),
            _ => {
                for (i, out) in output.iter_mut().enumerate() {
                    *out = f(i);
                }
            }
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        WorkerPool::sequential()
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_workers", &self.num_workers)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// `max(0, x)`, used by hidden layers.
    Relu,
    /// Logistic output, `1 / (1 + exp(-x))`.
    Sigmoid,
}

impl Activation {
    #[inline]
    fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Relu => {
                if x > 0.0 {
                    x
                } else {
                    0.0
                }
            }
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }
}

/// A fully connected layer; `weights` is `output_dim x input_dim`, row-major.
#[derive(Debug, Clone)]
pub struct MlpLayer {
    input_dim: usize,
    output_dim: usize,
    weights: Vec<f32>,
    bias: Vec<f32>,
    activation: Activation,
}

impl MlpLayer {
    pub fn new(
        input_dim: usize,
        output_dim: usize,
        weights: Vec<f32>,
        bias: Vec<f32>,
        activation: Activation,
    ) -> Result<MlpLayer> {
        if input_dim == 0 || output_dim == 0 {
            return Err(Error::InvalidModel(format!(
                "layer dimensions must be positive, got {input_dim}x{output_dim}"
            )));
        }
        if weights.len() != input_dim * output_dim {
            return Err(Error::InvalidModel(format!(
                "layer {input_dim}x{output_dim} expects {} weights, got {}",
                input_dim * output_dim,
                weights.len()
            )));
        }
        if bias.len() != output_dim {
            return Err(Error::InvalidModel(format!(
                "layer with {output_dim} outputs got {} biases",
                bias.len()
            )));
        }

        Ok(MlpLayer {
            input_dim,
            output_dim,
            weights,
            bias,
            activation,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn compute(&self, input: &[f32], output: &mut [f32], workers: &WorkerPool) {
        debug_assert_eq!(input.len(), self.input_dim);
        debug_assert_eq!(output.len(), self.output_dim);

        workers.fill(output, |i| {
            let row = &self.weights[i * self.input_dim..(i + 1) * self.input_dim];
            let z = math::vector_inner_product(input, row) + self.bias[i];
            self.activation.apply(z)
        });
    }
}

/// Feed-forward network of [`MlpLayer`]s.
#[derive(Debug, Clone, Default)]
pub struct Mlp {
    layers: Vec<MlpLayer>,
    workers: WorkerPool,
}

impl Mlp {
    pub fn new(workers: WorkerPool) -> Mlp {
        Mlp {
            layers: Vec::new(),
            workers,
        }
    }

    /// Appends a layer; its input must match the previous layer's output.
    pub fn add_layer(&mut self, layer: MlpLayer) -> Result<()> {
        if let Some(last) = self.layers.last() {
            if last.output_dim() != layer.input_dim() {
                return Err(Error::LayerMismatch {
                    expected: last.output_dim(),
                    found: layer.input_dim(),
                });
            }
        }
        self.layers.push(layer);
        Ok(())
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map_or(0, MlpLayer::input_dim)
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map_or(0, MlpLayer::output_dim)
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[MlpLayer] {
        &self.layers
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    /// Runs the network, chaining hidden layers through the two ping-pong
    /// buffers in `layer_buf`.
    pub fn compute(&self, input: &[f32], output: &mut Vec<f32>, layer_buf: &mut [Vec<f32>; 2]) {
        let Some((last, hidden)) = self.layers.split_last() else {
            output.clear();
            return;
        };

        let [buf0, buf1] = layer_buf;
        for (i, layer) in hidden.iter().enumerate() {
            let (src, dest): (&[f32], &mut Vec<f32>) = if i % 2 == 0 {
                (if i == 0 { input } else { &buf1[..] }, &mut *buf0)
            } else {
                (&buf0[..], &mut *buf1)
            };
            dest.resize(layer.output_dim(), 0.0);
            layer.compute(src, dest, &self.workers);
        }

        let src: &[f32] = match hidden.len() {
            0 => input,
            n if (n - 1) % 2 == 0 => &buf0[..],
            _ => &buf1[..],
        };
        output.resize(last.output_dim(), 0.0);
        last.compute(src, output, &self.workers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn layer(input_dim: usize, output_dim: usize, activation: Activation) -> MlpLayer {
        let weights = (0..input_dim * output_dim)
            .map(|i| ((i * 7 % 11) as f32 - 5.0) * 0.1)
            .collect();
        let bias = (0..output_dim).map(|i| (i as f32 - 1.0) * 0.05).collect();
        MlpLayer::new(input_dim, output_dim, weights, bias, activation).unwrap()
    }

    fn run(mlp: &Mlp, input: &[f32]) -> Vec<f32> {
        let mut output = Vec::new();
        let mut bufs = [Vec::new(), Vec::new()];
        mlp.compute(input, &mut output, &mut bufs);
        output
    }

    #[test]
    fn single_relu_layer_matches_direct_arithmetic() {
        let weights = vec![1.0, -2.0, 0.5, 0.25, 3.0, -1.0];
        let bias = vec![0.5, -10.0];
        let l = MlpLayer::new(3, 2, weights, bias, Activation::Relu).unwrap();
        let mut mlp = Mlp::new(WorkerPool::sequential());
        mlp.add_layer(l).unwrap();

        let out = run(&mlp, &[2.0, 1.0, 4.0]);
        // row 0: 2 - 2 + 2 + 0.5 = 2.5; row 1: 0.5 + 3 - 4 - 10 < 0
        assert_eq!(out.len(), 2);
        assert_abs_diff_eq!(out[0], 2.5, epsilon = 1e-5);
        assert_abs_diff_eq!(out[1], 0.0, epsilon = 1e-5);
    }

    #[test]
    fn sigmoid_output_layer() {
        let l = MlpLayer::new(1, 1, vec![2.0], vec![-1.0], Activation::Sigmoid).unwrap();
        let mut mlp = Mlp::new(WorkerPool::sequential());
        mlp.add_layer(l).unwrap();

        let out = run(&mlp, &[0.5]);
        assert_abs_diff_eq!(out[0], 0.5, epsilon = 1e-6);
        let out = run(&mlp, &[3.0]);
        assert_abs_diff_eq!(out[0], 1.0 / (1.0 + (-5.0f32).exp()), epsilon = 1e-6);
    }

    #[test]
    fn deep_network_matches_layer_by_layer_evaluation() {
        let dims = [6, 5, 4, 3, 2];
        let mut mlp = Mlp::new(WorkerPool::sequential());
        let mut layers = Vec::new();
        for (i, pair) in dims.windows(2).enumerate() {
            let act = if i == dims.len() - 2 { Activation::Sigmoid } else { Activation::Relu };
            let l = layer(pair[0], pair[1], act);
            layers.push(l.clone());
            mlp.add_layer(l).unwrap();
        }
        assert_eq!(mlp.input_dim(), 6);
        assert_eq!(mlp.output_dim(), 2);
        assert_eq!(mlp.num_layers(), 4);

        let input = [0.3, -0.2, 0.9, 0.1, 0.0, 0.7];
        let mut expected = input.to_vec();
        for l in &layers {
            let mut next = vec![0.0; l.output_dim()];
            l.compute(&expected, &mut next, &WorkerPool::sequential());
            expected = next;
        }
        assert_eq!(run(&mlp, &input), expected);
    }

    #[test]
    fn worker_count_does_not_change_results() {
        let build = |workers: WorkerPool| {
            let mut mlp = Mlp::new(workers);
            mlp.add_layer(layer(64, 48, Activation::Relu)).unwrap();
            mlp.add_layer(layer(48, 4, Activation::Sigmoid)).unwrap();
            mlp
        };
        let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.37).sin()).collect();

        let sequential = run(&build(WorkerPool::sequential()), &input);
        let pool = WorkerPool::new(4).unwrap();
        assert_eq!(pool.num_workers(), 4);
        let parallel = run(&build(pool), &input);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn mismatched_layer_is_rejected() {
        let mut mlp = Mlp::new(WorkerPool::sequential());
        mlp.add_layer(layer(4, 3, Activation::Relu)).unwrap();
        let err = mlp.add_layer(layer(5, 1, Activation::Sigmoid)).unwrap_err();
        assert!(matches!(err, Error::LayerMismatch { expected: 3, found: 5 }));
        assert_eq!(mlp.num_layers(), 1);
    }

    #[test]
    fn layer_sizes_are_validated() {
        assert!(MlpLayer::new(2, 2, vec![0.0; 3], vec![0.0; 2], Activation::Relu).is_err());
        assert!(MlpLayer::new(2, 2, vec![0.0; 4], vec![0.0; 1], Activation::Relu).is_err());
        assert!(MlpLayer::new(0, 2, vec![], vec![0.0; 2], Activation::Relu).is_err());
    }

    #[test]
    fn empty_network_yields_no_output() {
        let mlp = Mlp::default();
        assert!(run(&mlp, &[1.0]).is_empty());
    }
}
