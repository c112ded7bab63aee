use burn::tensor::activation::{log_softmax, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Everything a classifier computes for one bound minibatch.
#[derive(Debug, Clone)]
pub struct ClassifierOutput<B: Backend> {
    /// Pre-activation scores, `[batch_size, num_classes]`.
    pub logits: Tensor<B, 2>,
    /// Softmax probabilities over the classes, `[batch_size, num_classes]`.
    pub preds: Tensor<B, 2>,
    /// Cross-entropy of each example, `[batch_size]`.
    pub batch_xentropy: Tensor<B, 1>,
    /// Mean of `batch_xentropy`, `[1]`.
    pub batch_loss: Tensor<B, 1>,
    /// The one-hot targets the loss was computed against, `[batch_size, num_classes]`.
    pub targets: Tensor<B, 2>,
}

impl<B: Backend> ClassifierOutput<B> {
    /// Compute predictions and the softmax cross-entropy loss of `logits` against one-hot
    /// `targets`.
    pub fn from_logits(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Self {
        let batch_xentropy = softmax_cross_entropy(logits.clone(), targets.clone());
        let batch_loss = batch_xentropy.clone().mean();
        let preds = softmax(logits.clone(), 1);

        Self {
            logits,
            preds,
            batch_xentropy,
            batch_loss,
            targets,
        }
    }
}

/// Per-example cross-entropy between the softmax of `logits` and one-hot `targets`.
///
/// # Shapes
///
/// - logits: `[batch_size, num_classes]`
/// - targets: `[batch_size, num_classes]`
/// - output: `[batch_size]`
pub fn softmax_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits, 1);

    (log_probs * targets).sum_dim(1).squeeze::<1>(1).neg()
}
