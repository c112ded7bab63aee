use core::fmt::Display;

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::ElementConversion;
use serde::{Deserialize, Serialize};

use crate::nn::ClassifierOutput;

/// An operation updating the model from the gradients of one forward pass.
pub trait UpdateOp<B: AutodiffBackend, M: AutodiffModule<B>> {
    /// What the update reports back.
    type Output;

    /// Apply the update and return the new model.
    fn apply(&mut self, model: M, grads: GradientsParams) -> (M, Self::Output);
}

/// Reads a value out of the output of one forward pass.
pub trait Fetch<B: Backend> {
    /// The value read.
    type Value;

    /// Read the value.
    fn fetch(&self, output: &ClassifierOutput<B>) -> Self::Value;
}

/// Gradient descent with a fixed learning rate, driven by any burn [optimizer](Optimizer).
#[derive(new)]
pub struct GradientDescent<O> {
    optim: O,
    learning_rate: f64,
    #[new(default)]
    steps: usize,
}

/// Result of a [gradient descent](GradientDescent) update.
#[derive(new, Debug, Clone, Copy, PartialEq)]
pub struct UpdateReport {
    /// Number of updates applied by the operation, this one included.
    pub step: usize,
    /// The learning rate used.
    pub learning_rate: f64,
}

impl<O> GradientDescent<O> {
    /// The learning rate.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

impl<B, M, O> UpdateOp<B, M> for GradientDescent<O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    type Output = UpdateReport;

    fn apply(&mut self, model: M, grads: GradientsParams) -> (M, Self::Output) {
        let model = self.optim.step(self.learning_rate, model, grads);
        self.steps += 1;

        (model, UpdateReport::new(self.steps, self.learning_rate))
    }
}

/// An update leaving the model untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOp;

impl<B: AutodiffBackend, M: AutodiffModule<B>> UpdateOp<B, M> for NoOp {
    type Output = ();

    fn apply(&mut self, model: M, _grads: GradientsParams) -> (M, Self::Output) {
        (model, ())
    }
}

/// Fetches the mean cross-entropy of the batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanLoss;

impl<B: Backend> Fetch<B> for MeanLoss {
    type Value = f32;

    fn fetch(&self, output: &ClassifierOutput<B>) -> f32 {
        output.batch_loss.clone().into_scalar().elem::<f32>()
    }
}

/// Fetches the monitoring [summary](Summary) of a batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct Summaries;

/// Monitoring data of one minibatch.
#[derive(new, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Mean cross-entropy.
    pub loss: f32,
    /// Fraction of examples whose most likely class is the target class.
    pub accuracy: f32,
    /// Mean probability of the most likely class.
    pub mean_confidence: f32,
    /// Number of examples.
    pub batch_size: usize,
}

impl<B: Backend> Fetch<B> for Summaries {
    type Value = Summary;

    fn fetch(&self, output: &ClassifierOutput<B>) -> Summary {
        let [batch_size, _] = output.preds.dims();

        let predicted = output.preds.clone().argmax(1);
        let expected = output.targets.clone().argmax(1);
        let correct = predicted
            .equal(expected)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
        let mean_confidence = output
            .preds
            .clone()
            .max_dim(1)
            .mean()
            .into_scalar()
            .elem::<f32>();

        Summary::new(
            MeanLoss.fetch(output),
            correct as f32 / batch_size as f32,
            mean_confidence,
            batch_size,
        )
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "loss {:.4} - accuracy {:.2}% - confidence {:.3} - {} examples",
            self.loss,
            self.accuracy * 100.0,
            self.mean_confidence,
            self.batch_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestBackend;
    use burn::tensor::Tensor;

    fn output() -> ClassifierOutput<TestBackend> {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats(
            [[4.0, 0.0, 0.0], [0.0, 0.0, 4.0], [0.0, 4.0, 0.0], [1.0, 0.0, 0.0]],
            &device,
        );
        let targets = Tensor::<TestBackend, 2>::from_floats(
            [[1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            &device,
        );

        ClassifierOutput::from_logits(logits, targets)
    }

    #[test]
    fn mean_loss_reads_batch_loss() {
        let output = output();

        let expected = output.batch_loss.clone().into_scalar();
        assert_eq!(MeanLoss.fetch(&output), expected);
    }

    #[test]
    fn summaries_count_correct_predictions() {
        let summary = Summaries.fetch(&output());

        assert_eq!(summary.batch_size, 4);
        assert!((summary.accuracy - 0.5).abs() < 1e-6);
        assert!(summary.mean_confidence > 1.0 / 3.0 && summary.mean_confidence < 1.0);
        assert!(summary.loss > 0.0);
    }

    #[test]
    fn summary_display() {
        let summary = Summary::new(0.5, 0.25, 0.75, 8);

        assert_eq!(
            summary.to_string(),
            "loss 0.5000 - accuracy 25.00% - confidence 0.750 - 8 examples"
        );
    }
}
