//! Lightweight ML utilities.
//!
//! JSON-serializable MLP with hand-written gradients, plus an Adam optimizer.

pub mod dense;
pub mod optim;

pub use dense::{Activation, DenseLayer, DenseNetwork, ForwardCache, Gradients};
pub use optim::{Adam, AdamConfig};
