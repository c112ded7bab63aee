use burn::tensor::{backend::Backend, Tensor, TensorData};

use crate::data::Minibatch;
use crate::error::GraphError;
use crate::model::Signature;

/// Number of features in a flattened digit image.
pub const IMAGE_FEATURES: usize = 784;
/// Number of digit classes.
pub const NUM_CLASSES: usize = 10;
/// Side length of a digit image.
pub const IMAGE_SIDE: usize = 28;

/// A symbolic input slot: a named shape where `None` marks a dimension only known once data is
/// fed, typically the batch dimension.
///
/// Placeholders carry no data. Builders read their static dimensions to size parameters, and
/// [feed](Placeholder::feed) checks raw arrays against them before turning them into tensors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    name: String,
    dims: Vec<Option<usize>>,
    source: Option<Vec<Option<usize>>>,
}

/// Placeholder for flattened images, `[batch, 784]`.
pub fn input_placeholder() -> Placeholder {
    Placeholder::new("image_input", [None, Some(IMAGE_FEATURES)])
}

/// Placeholder for one-hot targets, `[batch, 10]`.
pub fn target_placeholder() -> Placeholder {
    Placeholder::new("image_target_onehot", [None, Some(NUM_CLASSES)])
}

/// Placeholder for images laid out as `[batch, 28, 28, 1]`.
///
/// It is a [reshaped view](Placeholder::reshape) of [input_placeholder], so flattened rows can be
/// fed to it directly.
pub fn image_placeholder() -> Placeholder {
    Placeholder {
        name: "image_input_2d".to_string(),
        dims: vec![None, Some(IMAGE_SIDE), Some(IMAGE_SIDE), Some(1)],
        source: Some(input_placeholder().dims),
    }
}

impl Placeholder {
    /// Create a placeholder with the given dimensions.
    pub fn new(name: impl Into<String>, dims: impl Into<Vec<Option<usize>>>) -> Self {
        Self {
            name: name.into(),
            dims: dims.into(),
            source: None,
        }
    }

    /// The placeholder name, used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All dimensions, `None` for free ones.
    pub fn dims(&self) -> &[Option<usize>] {
        &self.dims
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// The dimension at `axis`, `None` when free or out of range.
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied().flatten()
    }

    /// The dimension at `axis`, which must be statically known.
    pub fn static_dim(&self, axis: usize) -> Result<usize, GraphError> {
        self.dim(axis).ok_or_else(|| GraphError::UnknownDimension {
            name: self.name.clone(),
            axis,
        })
    }

    /// Fails with [GraphError::RankMismatch] unless the placeholder has rank `expected`.
    pub fn expect_rank(&self, expected: usize) -> Result<(), GraphError> {
        if self.rank() != expected {
            return Err(GraphError::RankMismatch {
                name: self.name.clone(),
                expected,
                found: self.rank(),
            });
        }

        Ok(())
    }

    /// Whether data of the given shape can be fed as is.
    ///
    /// The leading (batch) dimension must be positive.
    pub fn accepts(&self, shape: &[usize]) -> bool {
        shape_matches(&self.dims, shape)
    }

    /// Create a view of this placeholder with another shape.
    ///
    /// The view accepts data shaped like either placeholder; rows shaped like the source are
    /// reshaped to the view. The batch dimension must stay free and every other dimension of both
    /// placeholders must be known, with the same number of elements per row.
    pub fn reshape(
        &self,
        name: impl Into<String>,
        dims: impl Into<Vec<Option<usize>>>,
    ) -> Result<Placeholder, GraphError> {
        let name = name.into();
        let dims = dims.into();

        if dims.first().copied().flatten().is_some() {
            return Err(GraphError::InvalidConfig(format!(
                "The batch dimension of '{name}' must stay free"
            )));
        }

        let from = row_size(&self.name, &self.dims)?;
        let to = row_size(&name, &dims)?;

        if from != to {
            return Err(GraphError::InvalidConfig(format!(
                "Cannot reshape '{}' ({from} elements per row) to '{name}' ({to} elements per row)",
                self.name
            )));
        }

        Ok(Placeholder {
            name,
            dims,
            source: Some(self.dims.clone()),
        })
    }

    /// Bind raw data to a tensor of rank `D`.
    ///
    /// Any positive batch size is accepted. The data is converted to `f32`.
    pub fn feed<B: Backend, const D: usize>(
        &self,
        data: TensorData,
        device: &B::Device,
    ) -> Result<Tensor<B, D>, GraphError> {
        if self.rank() != D {
            return Err(GraphError::RankMismatch {
                name: self.name.clone(),
                expected: self.rank(),
                found: D,
            });
        }

        let data = data.convert::<f32>();
        let data = if self.accepts(&data.shape) {
            data
        } else if self
            .source
            .as_ref()
            .is_some_and(|source| shape_matches(source, &data.shape))
        {
            self.reshape_rows(data)?
        } else {
            return Err(self.mismatch(&data.shape));
        };

        Ok(Tensor::from_data(data, device))
    }

    fn reshape_rows(&self, data: TensorData) -> Result<TensorData, GraphError> {
        let batch_size = data.shape[0];
        let mut shape = Vec::with_capacity(self.rank());
        shape.push(batch_size);
        shape.extend(self.dims[1..].iter().map(|dim| dim.unwrap_or_default()));

        let values = data
            .to_vec::<f32>()
            .map_err(|err| GraphError::Data(format!("{err:?}")))?;

        Ok(TensorData::new(values, shape))
    }

    pub(crate) fn mismatch(&self, found: &[usize]) -> GraphError {
        GraphError::ShapeMismatch {
            name: self.name.clone(),
            expected: format_dims(&self.dims),
            found: found.to_vec(),
        }
    }
}

impl core::fmt::Display for Placeholder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}{}", self.name, format_dims(&self.dims))
    }
}

/// A minibatch bound to its placeholders.
#[derive(new, Debug, Clone)]
pub struct Feed<B: Backend, const D: usize> {
    /// Inputs bound to the input placeholder.
    pub inputs: Tensor<B, D>,
    /// One-hot targets bound to the target placeholder, `[batch_size, num_classes]`.
    pub targets: Tensor<B, 2>,
}

impl<B: Backend, const D: usize> Feed<B, D> {
    /// Bind the images of `batch` to `x` and its targets to `y`.
    ///
    /// Both arrays must describe the same number of examples.
    pub fn bind(
        batch: &Minibatch,
        x: &Placeholder,
        y: &Placeholder,
        device: &B::Device,
    ) -> Result<Self, GraphError> {
        let inputs = x.feed::<B, D>(batch.images.clone(), device)?;
        let targets = y.feed::<B, 2>(batch.targets.clone(), device)?;

        let batch_size = inputs.dims()[0];
        let [num_targets, num_classes] = targets.dims();
        if batch_size != num_targets {
            return Err(y.mismatch(&[num_targets, num_classes]));
        }

        Ok(Self::new(inputs, targets))
    }

    /// Check the bound tensors against the shapes `model` was built for.
    ///
    /// Inputs are reported against `x` and targets against `y`.
    pub fn check<M: Signature>(
        &self,
        model: &M,
        x: &Placeholder,
        y: &Placeholder,
    ) -> Result<(), GraphError> {
        let inputs = self.inputs.dims();
        let input_shape = model.input_shape();
        if inputs[1..] != input_shape[..] {
            return Err(GraphError::ShapeMismatch {
                name: x.name.clone(),
                expected: format_rows(&input_shape),
                found: inputs.to_vec(),
            });
        }

        let targets = self.targets.dims();
        if targets[1] != model.num_classes() {
            return Err(GraphError::ShapeMismatch {
                name: y.name.clone(),
                expected: format_rows(&[model.num_classes()]),
                found: targets.to_vec(),
            });
        }

        Ok(())
    }

    /// Number of examples in the feed.
    pub fn batch_size(&self) -> usize {
        self.targets.dims()[0]
    }
}

fn shape_matches(dims: &[Option<usize>], shape: &[usize]) -> bool {
    dims.len() == shape.len()
        && shape.first().is_some_and(|batch_size| *batch_size > 0)
        && dims
            .iter()
            .zip(shape)
            .all(|(dim, size)| dim.map_or(true, |dim| dim == *size))
}

fn row_size(name: &str, dims: &[Option<usize>]) -> Result<usize, GraphError> {
    dims.iter()
        .enumerate()
        .skip(1)
        .map(|(axis, dim)| {
            dim.ok_or_else(|| GraphError::UnknownDimension {
                name: name.to_string(),
                axis,
            })
        })
        .product()
}

fn format_rows(shape: &[usize]) -> String {
    let dims = core::iter::once(None)
        .chain(shape.iter().copied().map(Some))
        .collect::<Vec<_>>();

    format_dims(&dims)
}

fn format_dims(dims: &[Option<usize>]) -> String {
    let dims = dims
        .iter()
        .map(|dim| dim.map_or_else(|| "?".to_string(), |dim| dim.to_string()))
        .collect::<Vec<_>>();

    format!("[{}]", dims.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestBackend;

    #[test]
    fn input_placeholder_accepts_any_batch_size() {
        let x = input_placeholder();
        let device = Default::default();

        for batch_size in [1, 2, 17, 64] {
            let data = TensorData::new(vec![0.5f32; batch_size * 784], [batch_size, 784]);
            let tensor = x.feed::<TestBackend, 2>(data, &device).unwrap();

            assert_eq!(tensor.dims(), [batch_size, 784]);
        }
    }

    #[test]
    fn target_placeholder_accepts_any_batch_size() {
        let y = target_placeholder();
        let device = Default::default();

        for batch_size in [1, 3, 10] {
            let data = TensorData::new(vec![0.0f32; batch_size * 10], [batch_size, 10]);
            let tensor = y.feed::<TestBackend, 2>(data, &device).unwrap();

            assert_eq!(tensor.dims(), [batch_size, 10]);
        }
    }

    #[test]
    fn feed_rejects_wrong_feature_count() {
        let x = input_placeholder();
        let data = TensorData::new(vec![0.0f32; 2 * 783], [2, 783]);

        let result = x.feed::<TestBackend, 2>(data, &Default::default());

        assert_eq!(
            result.unwrap_err(),
            GraphError::ShapeMismatch {
                name: "image_input".to_string(),
                expected: "[?, 784]".to_string(),
                found: vec![2, 783],
            }
        );
    }

    #[test]
    fn feed_rejects_empty_batch() {
        let y = target_placeholder();
        let data = TensorData::new(Vec::<f32>::new(), [0, 10]);

        let result = y.feed::<TestBackend, 2>(data, &Default::default());

        assert!(matches!(result, Err(GraphError::ShapeMismatch { .. })));
    }

    #[test]
    fn feed_rejects_wrong_rank() {
        let x = input_placeholder();
        let data = TensorData::new(vec![0.0f32; 784], [1, 784]);

        let result = x.feed::<TestBackend, 4>(data, &Default::default());

        assert_eq!(
            result.unwrap_err(),
            GraphError::RankMismatch {
                name: "image_input".to_string(),
                expected: 2,
                found: 4,
            }
        );
    }

    #[test]
    fn feed_converts_other_element_types() {
        let y = target_placeholder();
        let data = TensorData::new(vec![1.0f64; 10], [1, 10]);

        let tensor = y.feed::<TestBackend, 2>(data, &Default::default()).unwrap();

        assert_eq!(tensor.sum().into_scalar(), 10.0);
    }

    #[test]
    fn image_placeholder_reshapes_flat_rows() {
        let x = image_placeholder();
        let values = (0..2 * 784).map(|i| i as f32).collect::<Vec<_>>();
        let data = TensorData::new(values, [2, 784]);

        let tensor = x.feed::<TestBackend, 4>(data, &Default::default()).unwrap();

        assert_eq!(tensor.dims(), [2, 28, 28, 1]);
        let row = tensor.clone().slice([1..2, 0..1, 0..1, 0..1]).into_scalar();
        assert_eq!(row, 784.0);
        let last = tensor.slice([1..2, 27..28, 27..28, 0..1]).into_scalar();
        assert_eq!(last, 2.0 * 784.0 - 1.0);
    }

    #[test]
    fn image_placeholder_accepts_images() {
        let x = image_placeholder();
        let data = TensorData::new(vec![0.0f32; 3 * 784], [3, 28, 28, 1]);

        let tensor = x.feed::<TestBackend, 4>(data, &Default::default()).unwrap();

        assert_eq!(tensor.dims(), [3, 28, 28, 1]);
    }

    #[test]
    fn reshape_requires_matching_row_size() {
        let result = input_placeholder().reshape("bad", [None, Some(27), Some(28), Some(1)]);

        assert!(matches!(result, Err(GraphError::InvalidConfig(_))));
    }

    #[test]
    fn reshape_requires_free_batch_dimension() {
        let result = input_placeholder().reshape("bad", [Some(1), Some(28), Some(28), Some(1)]);

        assert!(matches!(result, Err(GraphError::InvalidConfig(_))));
    }

    struct BuiltFor {
        input_shape: Vec<usize>,
        num_classes: usize,
    }

    impl Signature for BuiltFor {
        fn input_shape(&self) -> Vec<usize> {
            self.input_shape.clone()
        }

        fn num_classes(&self) -> usize {
            self.num_classes
        }
    }

    fn loose_feed(
        features: usize,
        classes: usize,
    ) -> (Placeholder, Placeholder, Feed<TestBackend, 2>) {
        let x = Placeholder::new("x", [None, None]);
        let y = Placeholder::new("y", [None, None]);
        let batch = Minibatch::new(
            TensorData::new(vec![0.0f32; 2 * features], [2, features]),
            TensorData::new(vec![0.0f32; 2 * classes], [2, classes]),
        );
        let feed = Feed::bind(&batch, &x, &y, &Default::default()).unwrap();

        (x, y, feed)
    }

    #[test]
    fn check_accepts_matching_feeds() {
        let model = BuiltFor {
            input_shape: vec![784],
            num_classes: 10,
        };
        let (x, y, feed) = loose_feed(784, 10);

        assert_eq!(feed.check(&model, &x, &y), Ok(()));
    }

    #[test]
    fn check_rejects_inputs_the_model_was_not_built_for() {
        let model = BuiltFor {
            input_shape: vec![784],
            num_classes: 10,
        };
        let (x, y, feed) = loose_feed(100, 10);

        assert_eq!(
            feed.check(&model, &x, &y),
            Err(GraphError::ShapeMismatch {
                name: "x".to_string(),
                expected: "[?, 784]".to_string(),
                found: vec![2, 100],
            })
        );
    }

    #[test]
    fn check_rejects_targets_the_model_was_not_built_for() {
        let model = BuiltFor {
            input_shape: vec![784],
            num_classes: 10,
        };
        let (x, y, feed) = loose_feed(784, 5);

        assert_eq!(
            feed.check(&model, &x, &y),
            Err(GraphError::ShapeMismatch {
                name: "y".to_string(),
                expected: "[?, 10]".to_string(),
                found: vec![2, 5],
            })
        );
    }

    #[test]
    fn static_dim_reports_free_axis() {
        let x = input_placeholder();

        assert_eq!(x.static_dim(1), Ok(784));
        assert_eq!(
            x.static_dim(0),
            Err(GraphError::UnknownDimension {
                name: "image_input".to_string(),
                axis: 0,
            })
        );
        assert_eq!(x.to_string(), "image_input[?, 784]");
    }
}
