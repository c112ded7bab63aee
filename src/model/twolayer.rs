use burn::config::Config;
use burn::module::Module;
use burn::nn::Relu;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use burn::train::{TrainOutput, TrainStep, ValidStep};

use super::{check_targets, check_width, Signature};
use crate::error::GraphError;
use crate::nn::{ClassifierOutput, Dense, DenseConfig};
use crate::placeholder::{Feed, Placeholder};

/// Configuration to create a [two-layer perceptron](TwoLayer).
#[derive(Config, Debug)]
pub struct TwoLayerConfig {
    /// Number of hidden units.
    #[config(default = 30)]
    pub hiddensize: usize,
    /// Number of output units, one per class.
    #[config(default = 10)]
    pub outputsize: usize,
}

/// A perceptron with one ReLU hidden layer.
///
/// Both layers are He-initialized with their own fan-in, `sqrt(2 / features)` for the hidden
/// layer and `sqrt(2 / hiddensize)` for the output layer.
#[derive(Module, Debug)]
pub struct TwoLayer<B: Backend> {
    hidden: Dense<B>,
    activation: Relu,
    output: Dense<B>,
}

/// Build a [two-layer perceptron](TwoLayer) for inputs shaped like `x` and targets shaped like
/// `y`.
pub fn twolayer<B: Backend>(
    x: &Placeholder,
    y: &Placeholder,
    hiddensize: usize,
    outputsize: usize,
    device: &B::Device,
) -> Result<TwoLayer<B>, GraphError> {
    TwoLayerConfig::new()
        .with_hiddensize(hiddensize)
        .with_outputsize(outputsize)
        .init(x, y, device)
}

impl TwoLayerConfig {
    /// Initialize the classifier with fresh parameters.
    pub fn init<B: Backend>(
        &self,
        x: &Placeholder,
        y: &Placeholder,
        device: &B::Device,
    ) -> Result<TwoLayer<B>, GraphError> {
        x.expect_rank(2)?;
        let features = x.static_dim(1)?;
        check_width("hiddensize", self.hiddensize)?;
        check_width("outputsize", self.outputsize)?;
        check_targets(y, self.outputsize)?;

        let model = TwoLayer {
            hidden: DenseConfig::new(features, self.hiddensize).init(device),
            activation: Relu::new(),
            output: DenseConfig::new(self.hiddensize, self.outputsize).init(device),
        };
        log::debug!(
            "Built a two-layer classifier {} -> {} -> {} with {} parameters",
            x,
            self.hiddensize,
            self.outputsize,
            model.num_params()
        );

        Ok(model)
    }
}

impl<B: Backend> TwoLayer<B> {
    /// Hidden layer weights, `[features, hiddensize]`.
    pub fn w1(&self) -> Tensor<B, 2> {
        self.hidden.weight.val()
    }

    /// Hidden layer biases, `[hiddensize]`.
    pub fn b1(&self) -> Tensor<B, 1> {
        self.hidden.bias.val()
    }

    /// Output layer weights, `[hiddensize, outputsize]`.
    pub fn w2(&self) -> Tensor<B, 2> {
        self.output.weight.val()
    }

    /// Output layer biases, `[outputsize]`.
    pub fn b2(&self) -> Tensor<B, 1> {
        self.output.bias.val()
    }

    /// Compute the logits.
    ///
    /// # Shapes
    ///
    /// - inputs: `[batch_size, features]`
    /// - output: `[batch_size, outputsize]`
    pub fn forward(&self, inputs: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.hidden.forward(inputs);
        let x = self.activation.forward(x);

        self.output.forward(x)
    }

    /// Compute logits, predictions and losses against one-hot `targets`.
    pub fn classify(&self, inputs: Tensor<B, 2>, targets: Tensor<B, 2>) -> ClassifierOutput<B> {
        ClassifierOutput::from_logits(self.forward(inputs), targets)
    }
}

impl<B: Backend> Signature for TwoLayer<B> {
    fn input_shape(&self) -> Vec<usize> {
        vec![self.w1().dims()[0]]
    }

    fn num_classes(&self) -> usize {
        self.b2().dims()[0]
    }
}

impl<B: AutodiffBackend> TrainStep<Feed<B, 2>, ClassifierOutput<B>> for TwoLayer<B> {
    fn step(&self, item: Feed<B, 2>) -> TrainOutput<ClassifierOutput<B>> {
        let item = self.classify(item.inputs, item.targets);

        TrainOutput::new(self, item.batch_loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<Feed<B, 2>, ClassifierOutput<B>> for TwoLayer<B> {
    fn step(&self, item: Feed<B, 2>) -> ClassifierOutput<B> {
        self.classify(item.inputs, item.targets)
    }
}
