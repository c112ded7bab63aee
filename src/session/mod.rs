mod ops;
mod step;

pub use ops::*;
pub use step::*;

use burn::module::AutodiffModule;
use burn::optim::GradientsParams;
use burn::tensor::backend::AutodiffBackend;

/// The execution context of a classifier: the model being trained, the device its data lives on
/// and the number of updates applied so far.
///
/// Parameters only change through an [update operation](UpdateOp) run by
/// [train_step](train_step).
pub struct Session<B: AutodiffBackend, M> {
    model: M,
    device: B::Device,
    global_step: usize,
}

impl<B: AutodiffBackend, M: AutodiffModule<B>> Session<B, M> {
    /// Create a session for `model`, feeding data to `device`.
    pub fn new(model: M, device: B::Device) -> Self {
        Self {
            model,
            device,
            global_step: 0,
        }
    }

    /// The current model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Consume the session and return the trained model.
    pub fn into_model(self) -> M {
        self.model
    }

    /// The device minibatches are bound to.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Number of training steps run so far.
    pub fn global_step(&self) -> usize {
        self.global_step
    }

    fn update<U: UpdateOp<B, M>>(&mut self, op: &mut U, grads: GradientsParams) -> U::Output {
        let (model, output) = op.apply(self.model.clone(), grads);
        self.model = model;
        self.global_step += 1;

        output
    }
}
