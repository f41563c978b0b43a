//! Dense neural network (CPU-only) with manual backpropagation.
//!
//! Small MLPs serialized as JSON, used as the action-value approximator. Gradients are
//! computed by hand, so there is no computation graph: anything computed with
//! [`DenseNetwork::forward`] is a plain value and never receives gradient.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GreenwaveError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
    Tanh,
    Sigmoid,
}

impl Default for Activation {
    fn default() -> Self {
        Self::Linear
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Weights shape: [out_dim][in_dim]
    pub weights: Vec<Vec<f64>>,
    /// Bias shape: [out_dim]
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    /// He-uniform initialisation, zero bias
    pub fn random<R: Rng + ?Sized>(
        in_dim: usize,
        out_dim: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let limit = (6.0 / in_dim.max(1) as f64).sqrt();
        let weights = (0..out_dim)
            .map(|_| (0..in_dim).map(|_| rng.gen_range(-limit..limit)).collect())
            .collect();
        Self {
            weights,
            bias: vec![0.0; out_dim],
            activation,
        }
    }

    fn in_dim(&self) -> usize {
        self.weights.first().map(|r| r.len()).unwrap_or(0)
    }

    fn out_dim(&self) -> usize {
        self.weights.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseNetwork {
    /// Expected input dimension.
    pub input_dim: usize,
    pub layers: Vec<DenseLayer>,
}

/// Per-layer values recorded during a forward pass
#[derive(Debug, Clone)]
pub struct ForwardCache {
    /// inputs[i] is the input to layer i
    inputs: Vec<Vec<f64>>,
    /// Activated outputs of each layer
    outputs: Vec<Vec<f64>>,
}

impl ForwardCache {
    pub fn output(&self) -> &[f64] {
        self.outputs.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Gradients with the same shape as a network's parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub weights: Vec<Vec<Vec<f64>>>,
    pub bias: Vec<Vec<f64>>,
}

impl Gradients {
    pub fn zeros_like(network: &DenseNetwork) -> Self {
        Self {
            weights: network
                .layers
                .iter()
                .map(|l| vec![vec![0.0; l.in_dim()]; l.out_dim()])
                .collect(),
            bias: network
                .layers
                .iter()
                .map(|l| vec![0.0; l.out_dim()])
                .collect(),
        }
    }
}

impl DenseNetwork {
    /// MLP with `hidden` ReLU layers and a linear output layer.
    pub fn mlp<R: Rng + ?Sized>(
        input_dim: usize,
        hidden: &[usize],
        output_dim: usize,
        rng: &mut R,
    ) -> Self {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut in_dim = input_dim;
        for &width in hidden {
            layers.push(DenseLayer::random(in_dim, width, Activation::Relu, rng));
            in_dim = width;
        }
        layers.push(DenseLayer::random(in_dim, output_dim, Activation::Linear, rng));
        Self { input_dim, layers }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(content)?;
        model.validate().map_err(GreenwaveError::Validation)?;
        Ok(model)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.input_dim == 0 {
            return Err("input_dim must be > 0".to_string());
        }
        if self.layers.is_empty() {
            return Err("layers must not be empty".to_string());
        }

        let mut expected_in = self.input_dim;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.out_dim() == 0 {
                return Err(format!("layer[{idx}] out_dim must be > 0"));
            }
            if layer.bias.len() != layer.out_dim() {
                return Err(format!(
                    "layer[{idx}] bias len {} != out_dim {}",
                    layer.bias.len(),
                    layer.out_dim()
                ));
            }
            for (r, row) in layer.weights.iter().enumerate() {
                if row.len() != expected_in {
                    return Err(format!(
                        "layer[{idx}] weights row {r} len {} != expected in_dim {expected_in}",
                        row.len()
                    ));
                }
                if row.iter().any(|v| !v.is_finite()) {
                    return Err(format!("layer[{idx}] weights contain non-finite values"));
                }
            }
            if layer.bias.iter().any(|v| !v.is_finite()) {
                return Err(format!("layer[{idx}] bias contain non-finite values"));
            }
            expected_in = layer.out_dim();
        }
        Ok(())
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map(|l| l.out_dim()).unwrap_or(0)
    }

    pub fn forward(&self, input: &[f64]) -> Result<Vec<f64>> {
        Ok(self.forward_with_cache(input)?.outputs.pop().unwrap_or_default())
    }

    pub fn forward_with_cache(&self, input: &[f64]) -> Result<ForwardCache> {
        if input.len() != self.input_dim {
            return Err(GreenwaveError::Validation(format!(
                "DenseNetwork input dim mismatch: got {}, expected {}",
                input.len(),
                self.input_dim
            )));
        }

        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut outputs = Vec::with_capacity(self.layers.len());
        let mut x: Vec<f64> = input.to_vec();

        for layer in &self.layers {
            let y: Vec<f64> = layer
                .weights
                .iter()
                .zip(&layer.bias)
                .map(|(row, b)| {
                    let sum = row.iter().zip(&x).fold(*b, |acc, (w, xi)| acc + w * xi);
                    apply_activation(sum, layer.activation)
                })
                .collect();
            inputs.push(std::mem::replace(&mut x, y.clone()));
            outputs.push(y);
        }

        Ok(ForwardCache { inputs, outputs })
    }

    /// Accumulate dLoss/dθ into `grads` given dLoss/d(output) for one sample.
    pub fn backward(&self, cache: &ForwardCache, output_grad: &[f64], grads: &mut Gradients) {
        debug_assert_eq!(output_grad.len(), self.output_dim());
        let mut delta: Vec<f64> = output_grad.to_vec();

        for (idx, layer) in self.layers.iter().enumerate().rev() {
            let out = &cache.outputs[idx];
            let input = &cache.inputs[idx];

            // Through the activation
            for (d, y) in delta.iter_mut().zip(out) {
                *d *= activation_derivative(*y, layer.activation);
            }

            for (o, d) in delta.iter().enumerate() {
                grads.bias[idx][o] += d;
                for (i, xi) in input.iter().enumerate() {
                    grads.weights[idx][o][i] += d * xi;
                }
            }

            if idx > 0 {
                let mut prev = vec![0.0; layer.in_dim()];
                for (o, d) in delta.iter().enumerate() {
                    for (i, w) in layer.weights[o].iter().enumerate() {
                        prev[i] += d * w;
                    }
                }
                delta = prev;
            }
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.out_dim() * l.in_dim() + l.out_dim())
            .sum()
    }
}

fn apply_activation(x: f64, act: Activation) -> f64 {
    match act {
        Activation::Linear => x,
        Activation::Relu => x.max(0.0),
        Activation::Tanh => x.tanh(),
        Activation::Sigmoid => sigmoid(x),
    }
}

/// Derivative expressed in terms of the activated output `y`
fn activation_derivative(y: f64, act: Activation) -> f64 {
    match act {
        Activation::Linear => 1.0,
        Activation::Relu => {
            if y > 0.0 {
                1.0
            } else {
                0.0
            }
        }
        Activation::Tanh => 1.0 - y * y,
        Activation::Sigmoid => y * (1.0 - y),
    }
}

fn sigmoid(x: f64) -> f64 {
    // Numerically-stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn linear_net() -> DenseNetwork {
        DenseNetwork {
            input_dim: 2,
            layers: vec![DenseLayer {
                weights: vec![vec![1.0, 2.0], vec![-1.0, 0.5]],
                bias: vec![0.5, 0.0],
                activation: Activation::Linear,
            }],
        }
    }

    #[test]
    fn forward_linear() {
        let out = linear_net().forward(&[1.0, 1.0]).unwrap();
        assert_eq!(out, vec![3.5, -0.5]);
    }

    #[test]
    fn validates_shapes() {
        let bad = DenseNetwork {
            input_dim: 3,
            layers: vec![DenseLayer {
                weights: vec![vec![1.0, 2.0]], // in_dim mismatch
                bias: vec![0.0],
                activation: Activation::Linear,
            }],
        };
        assert!(bad.validate().is_err());
        assert!(bad.forward(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn backward_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(11);
        let net = DenseNetwork::mlp(3, &[5], 2, &mut rng);
        let x = [0.3, -1.2, 2.0];

        // Loss = 0.5 * (out[1] - 1)^2
        let loss = |n: &DenseNetwork| {
            let y = n.forward(&x).unwrap();
            0.5 * (y[1] - 1.0).powi(2)
        };

        let cache = net.forward_with_cache(&x).unwrap();
        let y = cache.output().to_vec();
        let mut grads = Gradients::zeros_like(&net);
        net.backward(&cache, &[0.0, y[1] - 1.0], &mut grads);

        let eps = 1e-6;
        for (l, o, i) in [(0, 2, 1), (1, 1, 3), (1, 0, 0)] {
            let mut plus = net.clone();
            plus.layers[l].weights[o][i] += eps;
            let mut minus = net.clone();
            minus.layers[l].weights[o][i] -= eps;
            let numeric = (loss(&plus) - loss(&minus)) / (2.0 * eps);
            assert!(
                (numeric - grads.weights[l][o][i]).abs() < 1e-5,
                "layer {l} w[{o}][{i}]: numeric {numeric} vs analytic {}",
                grads.weights[l][o][i]
            );
        }
        // Output 0 carries no gradient into its own row
        assert!(grads.weights[1][0].iter().all(|g| *g == 0.0));
    }

    #[test]
    fn loads_from_json() {
        let mut rng = StdRng::seed_from_u64(5);
        let net = DenseNetwork::mlp(4, &[24, 24], 2, &mut rng);
        let json = serde_json::to_string(&net).unwrap();
        let loaded = DenseNetwork::from_json(&json).unwrap();

        let x = [3.0, 0.0, 1.0, 7.0];
        let a = net.forward(&x).unwrap();
        let b = loaded.forward(&x).unwrap();
        assert!(a.iter().zip(&b).all(|(p, q)| (p - q).abs() < 1e-9));
        assert_eq!(net.parameter_count(), 4 * 24 + 24 + 24 * 24 + 24 + 24 * 2 + 2);
    }
}
