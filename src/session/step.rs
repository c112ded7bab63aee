use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use burn::train::{TrainOutput, TrainStep, ValidStep};

use super::{Fetch, Session, UpdateOp};
use crate::data::Minibatch;
use crate::error::GraphError;
use crate::model::Signature;
use crate::nn::ClassifierOutput;
use crate::placeholder::{Feed, Placeholder};

/// Run one step of training.
///
/// Binds the images of `batch` to `x` and its targets to `y`, runs a single forward pass, reads
/// the loss with `loss_op` and the monitoring data with `summaries_op`, then applies `train_op`
/// to the gradients of that same pass.
///
/// Returns the results of `train_op`, `loss_op` and `summaries_op`, in that order. Binding errors,
/// and data the model was not built for, are returned before anything runs.
pub fn train_step<B, M, U, L, S, const D: usize>(
    session: &mut Session<B, M>,
    batch: &Minibatch,
    x: &Placeholder,
    y: &Placeholder,
    train_op: &mut U,
    loss_op: &L,
    summaries_op: &S,
) -> Result<(U::Output, f32, S::Value), GraphError>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Signature + TrainStep<Feed<B, D>, ClassifierOutput<B>>,
    U: UpdateOp<B, M>,
    L: Fetch<B, Value = f32>,
    S: Fetch<B>,
{
    let feed = Feed::<B, D>::bind(batch, x, y, session.device())?;
    feed.check(session.model(), x, y)?;

    let TrainOutput { grads, item } =
        <M as TrainStep<Feed<B, D>, ClassifierOutput<B>>>::step(session.model(), feed);
    let loss = loss_op.fetch(&item);
    let summary = summaries_op.fetch(&item);
    let result = session.update(train_op, grads);

    log::trace!("Step {} - loss {:.4}", session.global_step(), loss);

    Ok((result, loss, summary))
}

/// Evaluate one minibatch without tracking gradients or updating the model.
pub fn eval_step<B, M, S, const D: usize>(
    session: &Session<B, M>,
    batch: &Minibatch,
    x: &Placeholder,
    y: &Placeholder,
    fetch: &S,
) -> Result<S::Value, GraphError>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Signature,
    M::InnerModule: ValidStep<Feed<B::InnerBackend, D>, ClassifierOutput<B::InnerBackend>>,
    S: Fetch<B::InnerBackend>,
{
    let feed = Feed::<B::InnerBackend, D>::bind(batch, x, y, session.device())?;
    feed.check(session.model(), x, y)?;

    let model = session.model().valid();
    let output = <M::InnerModule as ValidStep<_, _>>::step(&model, feed);

    Ok(fetch.fetch(&output))
}
