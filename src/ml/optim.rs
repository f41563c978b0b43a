//! Adam optimizer for [`DenseNetwork`] parameters.

use serde::{Deserialize, Serialize};

use super::dense::{DenseNetwork, Gradients};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl AdamConfig {
    pub fn with_learning_rate(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            ..Self::default()
        }
    }
}

/// First/second moment estimates, shaped like the network
#[derive(Debug, Clone)]
pub struct Adam {
    config: AdamConfig,
    step: u64,
    m: Gradients,
    v: Gradients,
}

impl Adam {
    pub fn new(config: AdamConfig, network: &DenseNetwork) -> Self {
        Self {
            config,
            step: 0,
            m: Gradients::zeros_like(network),
            v: Gradients::zeros_like(network),
        }
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    /// Apply one descent step along `grads`.
    pub fn step(&mut self, network: &mut DenseNetwork, grads: &Gradients) {
        self.step += 1;
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.config;
        let t = self.step as i32;
        let bias1 = 1.0 - beta1.powi(t);
        let bias2 = 1.0 - beta2.powi(t);

        let update = |param: &mut f64, g: f64, m: &mut f64, v: &mut f64| {
            *m = beta1 * *m + (1.0 - beta1) * g;
            *v = beta2 * *v + (1.0 - beta2) * g * g;
            let m_hat = *m / bias1;
            let v_hat = *v / bias2;
            *param -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
        };

        for (l, layer) in network.layers.iter_mut().enumerate() {
            for (o, row) in layer.weights.iter_mut().enumerate() {
                for (i, w) in row.iter_mut().enumerate() {
                    update(
                        w,
                        grads.weights[l][o][i],
                        &mut self.m.weights[l][o][i],
                        &mut self.v.weights[l][o][i],
                    );
                }
            }
            for (o, b) in layer.bias.iter_mut().enumerate() {
                update(
                    b,
                    grads.bias[l][o],
                    &mut self.m.bias[l][o],
                    &mut self.v.bias[l][o],
                );
            }
        }
    }
}
