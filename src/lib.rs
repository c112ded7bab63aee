#![warn(missing_docs)]
#![recursion_limit = "256"]

//! Digit classifiers built on [burn](https://burn.dev).
//!
//! The crate builds three classifiers (logistic regression, a two-layer perceptron and a small
//! convolutional network) from [placeholders](placeholder::Placeholder) describing the shape of
//! the data they will be fed, and runs single optimization steps on them through a
//! [session](session::Session).

#[macro_use]
extern crate derive_new;

/// Raw minibatches, one-hot encoding and synthetic digit data.
pub mod data;

/// The error type shared by the builders and the executor.
pub mod error;

/// Classifier builders.
pub mod model;

/// Layer primitives used by the classifiers.
pub mod nn;

/// Static shape descriptors bound to data at execution time.
pub mod placeholder;

/// The training-step executor.
pub mod session;

/// A reference training loop wiring everything together.
pub mod training;

pub use error::GraphError;
pub use model::{
    convnet, onelayer, twolayer, ConvNet, ConvNetConfig, ConvNetOutput, OneLayer, OneLayerConfig,
    Padding, Signature, TwoLayer, TwoLayerConfig,
};
pub use nn::ClassifierOutput;
pub use placeholder::{image_placeholder, input_placeholder, target_placeholder, Feed, Placeholder};
pub use session::{eval_step, train_step, Session};

/// Backend for test cases
#[cfg(test)]
pub type TestBackend = burn::backend::NdArray<f32>;

/// Backend for autodiff test cases
#[cfg(test)]
pub type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;
