use burn::config::Config;
use burn::module::{Module, Param};
use burn::nn::Initializer;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Configuration to create a [dense layer](Dense) using the [init function](DenseConfig::init).
#[derive(Config, Debug)]
pub struct DenseConfig {
    /// The size of the input features.
    pub d_input: usize,
    /// The size of the output features.
    pub d_output: usize,
}

/// An affine layer `y = x·W + b` with He-initialized weights and zero biases.
///
/// Should be created with [DenseConfig].
#[derive(Module, Debug)]
pub struct Dense<B: Backend> {
    /// Matrix of shape `[d_input, d_output]`, drawn from `N(0, sqrt(2 / d_input))`.
    pub weight: Param<Tensor<B, 2>>,
    /// Vector of shape `[d_output]`, initialized to zeros.
    pub bias: Param<Tensor<B, 1>>,
}

/// Standard deviation of He initialization for the given fan-in.
pub fn he_std(fan_in: usize) -> f64 {
    (2.0 / fan_in as f64).sqrt()
}

impl DenseConfig {
    /// Initialize a new [dense](Dense) layer.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Dense<B> {
        let initializer = Initializer::KaimingNormal {
            gain: core::f64::consts::SQRT_2,
            fan_out_only: false,
        };

        Dense {
            weight: initializer.init_with(
                [self.d_input, self.d_output],
                Some(self.d_input),
                Some(self.d_output),
                device,
            ),
            bias: Initializer::Zeros.init([self.d_output], device),
        }
    }
}

impl<B: Backend> Dense<B> {
    /// Applies the forward pass on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, d_input]`
    /// - output: `[batch_size, d_output]`
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        input.matmul(self.weight.val()) + self.bias.val().unsqueeze()
    }
}
