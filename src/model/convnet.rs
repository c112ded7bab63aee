use core::str::FromStr;

use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{Initializer, PaddingConfig2d, Relu};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use burn::train::{TrainOutput, TrainStep, ValidStep};
use serde::{Deserialize, Serialize};

use super::{check_width, OneLayer, OneLayerConfig, Signature};
use crate::error::GraphError;
use crate::nn::ClassifierOutput;
use crate::placeholder::{Feed, Placeholder};

/// Padding applied by the convolution layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Padding {
    /// Pad so that the output has the spatial size of the input. Filter sizes must be odd.
    #[default]
    Same,
    /// No padding, each layer shrinks the spatial size by `filter - 1`.
    Valid,
}

impl Padding {
    fn output_size(&self, size: usize, filter: usize) -> Option<usize> {
        match self {
            Padding::Same => Some(size),
            Padding::Valid => size.checked_sub(filter - 1).filter(|size| *size > 0),
        }
    }
}

impl From<Padding> for PaddingConfig2d {
    fn from(padding: Padding) -> Self {
        match padding {
            Padding::Same => PaddingConfig2d::Same,
            Padding::Valid => PaddingConfig2d::Valid,
        }
    }
}

impl FromStr for Padding {
    type Err = GraphError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "same" => Ok(Padding::Same),
            "valid" => Ok(Padding::Valid),
            _ => Err(GraphError::InvalidConfig(format!(
                "Unknown padding '{value}', expected 'same' or 'valid'"
            ))),
        }
    }
}

/// Configuration to create a [convolutional classifier](ConvNet).
#[derive(Config, Debug)]
pub struct ConvNetConfig {
    /// Number of filters of the first and second convolution.
    #[config(default = "[10, 10]")]
    pub convlayer_sizes: [usize; 2],
    /// Height and width of the convolution filters.
    #[config(default = "[3, 3]")]
    pub filter_shape: [usize; 2],
    /// Number of output units, one per class.
    #[config(default = 10)]
    pub outputsize: usize,
    /// Padding of both convolutions.
    #[config(default = "Padding::Same")]
    pub padding: Padding,
}

/// Two convolution + ReLU layers followed by a [logistic regression](OneLayer) head on the
/// flattened feature maps.
///
/// Images are laid out as `[batch, height, width, channels]`, feature maps are returned in the
/// same layout.
#[derive(Module, Debug)]
pub struct ConvNet<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    activation: Relu,
    head: OneLayer<B>,
    image_shape: [usize; 3],
}

/// Everything a [convolutional classifier](ConvNet) computes for one bound minibatch.
#[derive(Debug, Clone)]
pub struct ConvNetOutput<B: Backend> {
    /// First feature map, `[batch_size, height_1, width_1, convlayer_sizes[0]]`.
    pub conv1: Tensor<B, 4>,
    /// Second feature map, `[batch_size, height_2, width_2, convlayer_sizes[1]]`.
    pub conv2: Tensor<B, 4>,
    /// Output of the classification head.
    pub output: ClassifierOutput<B>,
}

/// Build a [convolutional classifier](ConvNet) for images shaped like `x` and targets shaped like
/// `y`.
pub fn convnet<B: Backend>(
    x: &Placeholder,
    y: &Placeholder,
    config: &ConvNetConfig,
    device: &B::Device,
) -> Result<ConvNet<B>, GraphError> {
    config.init(x, y, device)
}

impl ConvNetConfig {
    /// Initialize the classifier with fresh parameters.
    ///
    /// `x` must have rank 4 with known height, width and channels.
    pub fn init<B: Backend>(
        &self,
        x: &Placeholder,
        y: &Placeholder,
        device: &B::Device,
    ) -> Result<ConvNet<B>, GraphError> {
        x.expect_rank(4)?;
        let height = x.static_dim(1)?;
        let width = x.static_dim(2)?;
        let channels = x.static_dim(3)?;

        let [filters_1, filters_2] = self.convlayer_sizes;
        check_width("convlayer_sizes[0]", filters_1)?;
        check_width("convlayer_sizes[1]", filters_2)?;
        let [filter_height, filter_width] = self.filter_shape;
        check_width("filter height", filter_height)?;
        check_width("filter width", filter_width)?;

        if self.padding == Padding::Same && (filter_height % 2 == 0 || filter_width % 2 == 0) {
            return Err(GraphError::InvalidConfig(format!(
                "Same padding needs odd filter sizes, got {:?}",
                self.filter_shape
            )));
        }

        let out_height = self
            .padding
            .output_size(height, filter_height)
            .and_then(|size| self.padding.output_size(size, filter_height));
        let out_width = self
            .padding
            .output_size(width, filter_width)
            .and_then(|size| self.padding.output_size(size, filter_width));
        let (Some(out_height), Some(out_width)) = (out_height, out_width) else {
            return Err(GraphError::InvalidConfig(format!(
                "Filters {:?} leave no output for {height}x{width} images",
                self.filter_shape
            )));
        };

        let features = Placeholder::new(
            "conv2_vector",
            [None, Some(out_height * out_width * filters_2)],
        );
        let head = OneLayerConfig::new()
            .with_layersize(self.outputsize)
            .init(&features, y, device)?;

        let model = ConvNet {
            conv1: self.conv([channels, filters_1], device),
            conv2: self.conv([filters_1, filters_2], device),
            activation: Relu::new(),
            head,
            image_shape: [height, width, channels],
        };
        log::debug!(
            "Built a convolutional classifier on {} with feature maps {}x{}x{} and {} parameters",
            x,
            out_height,
            out_width,
            filters_2,
            model.num_params()
        );

        Ok(model)
    }

    fn conv<B: Backend>(&self, channels: [usize; 2], device: &B::Device) -> Conv2d<B> {
        let mut conv = Conv2dConfig::new(channels, self.filter_shape)
            .with_padding(self.padding.into())
            .init(device);
        conv.bias = Some(Initializer::Zeros.init([channels[1]], device));

        conv
    }
}

impl<B: Backend> ConvNet<B> {
    /// Final layer weights, `[flattened features, outputsize]`.
    pub fn weights(&self) -> Tensor<B, 2> {
        self.head.weights()
    }

    /// Final layer biases, `[outputsize]`.
    pub fn biases(&self) -> Tensor<B, 1> {
        self.head.biases()
    }

    /// Run both convolutions and the classification head.
    ///
    /// # Shapes
    ///
    /// - images: `[batch_size, height, width, channels]`
    /// - targets: `[batch_size, outputsize]`
    pub fn forward(&self, images: Tensor<B, 4>, targets: Tensor<B, 2>) -> ConvNetOutput<B> {
        let x = images.permute([0, 3, 1, 2]);
        let conv1 = self.activation.forward(self.conv1.forward(x));
        let conv2 = self.activation.forward(self.conv2.forward(conv1.clone()));

        let conv1 = conv1.permute([0, 2, 3, 1]);
        let conv2 = conv2.permute([0, 2, 3, 1]);
        let [batch_size, height, width, channels] = conv2.dims();
        let features = conv2.clone().reshape([batch_size, height * width * channels]);

        ConvNetOutput {
            conv1,
            conv2,
            output: self.head.classify(features, targets),
        }
    }

    /// Compute logits, predictions and losses against one-hot `targets`.
    pub fn classify(&self, images: Tensor<B, 4>, targets: Tensor<B, 2>) -> ClassifierOutput<B> {
        self.forward(images, targets).output
    }
}

impl<B: Backend> Signature for ConvNet<B> {
    fn input_shape(&self) -> Vec<usize> {
        self.image_shape.to_vec()
    }

    fn num_classes(&self) -> usize {
        self.head.num_classes()
    }
}

impl<B: AutodiffBackend> TrainStep<Feed<B, 4>, ClassifierOutput<B>> for ConvNet<B> {
    fn step(&self, item: Feed<B, 4>) -> TrainOutput<ClassifierOutput<B>> {
        let item = self.classify(item.inputs, item.targets);

        TrainOutput::new(self, item.batch_loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<Feed<B, 4>, ClassifierOutput<B>> for ConvNet<B> {
    fn step(&self, item: Feed<B, 4>) -> ClassifierOutput<B> {
        self.classify(item.inputs, item.targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholder::{image_placeholder, input_placeholder, target_placeholder};
    use crate::TestBackend;
    use burn::tensor::Distribution;

    fn small_images() -> Placeholder {
        Placeholder::new("images", [None, Some(8), Some(8), Some(1)])
    }

    fn run(
        config: &ConvNetConfig,
        x: &Placeholder,
        batch_size: usize,
    ) -> ConvNetOutput<TestBackend> {
        let device = Default::default();
        let model = convnet::<TestBackend>(x, &target_placeholder(), config, &device).unwrap();
        let dims = [
            batch_size,
            x.dim(1).unwrap(),
            x.dim(2).unwrap(),
            x.dim(3).unwrap(),
        ];
        let images = Tensor::random(dims, Distribution::Uniform(0.0, 1.0), &device);
        let targets = Tensor::zeros([batch_size, 10], &device);

        model.forward(images, targets)
    }

    #[test]
    fn defaults() {
        let config = ConvNetConfig::new();

        assert_eq!(config.convlayer_sizes, [10, 10]);
        assert_eq!(config.filter_shape, [3, 3]);
        assert_eq!(config.outputsize, 10);
        assert_eq!(config.padding, Padding::Same);
    }

    #[test]
    fn same_padding_preserves_spatial_size() {
        let output = run(&ConvNetConfig::new(), &small_images(), 2);

        assert_eq!(output.conv1.dims(), [2, 8, 8, 10]);
        assert_eq!(output.conv2.dims(), [2, 8, 8, 10]);
        assert_eq!(output.output.logits.dims(), [2, 10]);
        assert_eq!(output.output.batch_xentropy.dims(), [2]);
    }

    #[test]
    fn mnist_sized_images() {
        let device = Default::default();
        let model = convnet::<TestBackend>(
            &image_placeholder(),
            &target_placeholder(),
            &ConvNetConfig::new(),
            &device,
        )
        .unwrap();

        assert_eq!(model.weights().dims(), [28 * 28 * 10, 10]);
        assert_eq!(model.biases().dims(), [10]);
    }

    #[test]
    fn valid_padding_shrinks_feature_maps() {
        let config = ConvNetConfig::new()
            .with_convlayer_sizes([4, 6])
            .with_padding(Padding::Valid);

        let output = run(&config, &small_images(), 3);

        assert_eq!(output.conv1.dims(), [3, 6, 6, 4]);
        assert_eq!(output.conv2.dims(), [3, 4, 4, 6]);
        assert_eq!(output.output.logits.dims(), [3, 10]);
    }

    #[test]
    fn feature_maps_are_rectified() {
        let output = run(&ConvNetConfig::new(), &small_images(), 2);

        for map in [output.conv1, output.conv2] {
            let values = map.into_data().to_vec::<f32>().unwrap();
            assert!(values.iter().all(|v| *v >= 0.0));
        }
    }

    #[test]
    fn convolution_biases_start_at_zero() {
        let config = ConvNetConfig::new().with_convlayer_sizes([4, 6]);
        let model = convnet::<TestBackend>(
            &small_images(),
            &target_placeholder(),
            &config,
            &Default::default(),
        )
        .unwrap();

        for (conv, filters) in [(&model.conv1, 4), (&model.conv2, 6)] {
            let bias = conv.bias.as_ref().map(|bias| bias.val()).unwrap();
            assert_eq!(bias.dims(), [filters]);
            let values = bias.into_data().to_vec::<f32>().unwrap();
            assert!(values.iter().all(|v| *v == 0.0));
        }
    }

    #[test]
    fn model_remembers_its_image_shape() {
        let model = convnet::<TestBackend>(
            &small_images(),
            &target_placeholder(),
            &ConvNetConfig::new(),
            &Default::default(),
        )
        .unwrap();

        assert_eq!(model.input_shape(), vec![8, 8, 1]);
        assert_eq!(model.num_classes(), 10);
    }

    #[test]
    fn flat_inputs_are_rejected() {
        let result = convnet::<TestBackend>(
            &input_placeholder(),
            &target_placeholder(),
            &ConvNetConfig::new(),
            &Default::default(),
        );

        assert_eq!(
            result.unwrap_err(),
            GraphError::RankMismatch {
                name: "image_input".to_string(),
                expected: 4,
                found: 2,
            }
        );
    }

    #[test]
    fn even_filters_need_valid_padding() {
        let config = ConvNetConfig::new().with_filter_shape([2, 2]);

        let result = convnet::<TestBackend>(
            &small_images(),
            &target_placeholder(),
            &config,
            &Default::default(),
        );

        assert!(matches!(result, Err(GraphError::InvalidConfig(_))));
    }

    #[test]
    fn filters_larger_than_images_are_rejected() {
        let config = ConvNetConfig::new()
            .with_filter_shape([5, 5])
            .with_padding(Padding::Valid);
        let x = Placeholder::new("images", [None, Some(6), Some(6), Some(1)]);

        let result =
            convnet::<TestBackend>(&x, &target_placeholder(), &config, &Default::default());

        assert!(matches!(result, Err(GraphError::InvalidConfig(_))));
    }

    #[test]
    fn padding_parses_from_names() {
        assert_eq!("same".parse::<Padding>(), Ok(Padding::Same));
        assert_eq!("VALID".parse::<Padding>(), Ok(Padding::Valid));
        assert!("full".parse::<Padding>().is_err());
    }
}
