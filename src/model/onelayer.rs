use burn::config::Config;
use burn::module::Module;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use burn::train::{TrainOutput, TrainStep, ValidStep};

use super::{check_targets, check_width, Signature};
use crate::error::GraphError;
use crate::nn::{ClassifierOutput, Dense, DenseConfig};
use crate::placeholder::{Feed, Placeholder};

/// Configuration to create a [logistic regression](OneLayer) classifier.
#[derive(Config, Debug)]
pub struct OneLayerConfig {
    /// Number of output units, one per class.
    #[config(default = 10)]
    pub layersize: usize,
}

/// Logistic regression: a single dense layer followed by a softmax.
#[derive(Module, Debug)]
pub struct OneLayer<B: Backend> {
    output: Dense<B>,
}

/// Build a [logistic regression](OneLayer) classifier for inputs shaped like `x` and targets
/// shaped like `y`.
pub fn onelayer<B: Backend>(
    x: &Placeholder,
    y: &Placeholder,
    layersize: usize,
    device: &B::Device,
) -> Result<OneLayer<B>, GraphError> {
    OneLayerConfig::new()
        .with_layersize(layersize)
        .init(x, y, device)
}

impl OneLayerConfig {
    /// Initialize the classifier with fresh parameters.
    ///
    /// The number of input features is read from the second dimension of `x`, which must be
    /// statically known.
    pub fn init<B: Backend>(
        &self,
        x: &Placeholder,
        y: &Placeholder,
        device: &B::Device,
    ) -> Result<OneLayer<B>, GraphError> {
        x.expect_rank(2)?;
        let features = x.static_dim(1)?;
        check_width("layersize", self.layersize)?;
        check_targets(y, self.layersize)?;

        let model = OneLayer {
            output: DenseConfig::new(features, self.layersize).init(device),
        };
        log::debug!(
            "Built a one-layer classifier {} -> {} with {} parameters",
            x,
            self.layersize,
            model.num_params()
        );

        Ok(model)
    }
}

impl<B: Backend> OneLayer<B> {
    /// Connection weights, `[features, layersize]`.
    pub fn weights(&self) -> Tensor<B, 2> {
        self.output.weight.val()
    }

    /// Biases, `[layersize]`.
    pub fn biases(&self) -> Tensor<B, 1> {
        self.output.bias.val()
    }

    /// Compute the logits.
    ///
    /// # Shapes
    ///
    /// - inputs: `[batch_size, features]`
    /// - output: `[batch_size, layersize]`
    pub fn forward(&self, inputs: Tensor<B, 2>) -> Tensor<B, 2> {
        self.output.forward(inputs)
    }

    /// Compute logits, predictions and losses against one-hot `targets`.
    pub fn classify(&self, inputs: Tensor<B, 2>, targets: Tensor<B, 2>) -> ClassifierOutput<B> {
        ClassifierOutput::from_logits(self.forward(inputs), targets)
    }
}

impl<B: Backend> Signature for OneLayer<B> {
    fn input_shape(&self) -> Vec<usize> {
        vec![self.weights().dims()[0]]
    }

    fn num_classes(&self) -> usize {
        self.biases().dims()[0]
    }
}

impl<B: AutodiffBackend> TrainStep<Feed<B, 2>, ClassifierOutput<B>> for OneLayer<B> {
    fn step(&self, item: Feed<B, 2>) -> TrainOutput<ClassifierOutput<B>> {
        let item = self.classify(item.inputs, item.targets);

        TrainOutput::new(self, item.batch_loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<Feed<B, 2>, ClassifierOutput<B>> for OneLayer<B> {
    fn step(&self, item: Feed<B, 2>) -> ClassifierOutput<B> {
        self.classify(item.inputs, item.targets)
    }
}
