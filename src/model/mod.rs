mod convnet;
mod onelayer;
mod twolayer;

pub use convnet::*;
pub use onelayer::*;
pub use twolayer::*;

use crate::error::GraphError;
use crate::placeholder::Placeholder;

/// The per-example shapes a built classifier was sized for.
///
/// Placeholders used at execution time may be looser than the ones a model was built from, so
/// bound data is checked against the model itself before it runs.
pub trait Signature {
    /// Shape of one input example, batch dimension excluded.
    fn input_shape(&self) -> Vec<usize>;

    /// Number of classes of the output layer.
    fn num_classes(&self) -> usize;
}

fn check_width(what: &str, size: usize) -> Result<(), GraphError> {
    if size == 0 {
        return Err(GraphError::InvalidConfig(format!(
            "{what} must be greater than zero"
        )));
    }

    Ok(())
}

/// The target placeholder must be `[batch, classes]` with `classes` equal to the output width
/// whenever it is known.
fn check_targets(y: &Placeholder, outputsize: usize) -> Result<(), GraphError> {
    y.expect_rank(2)?;

    match y.dim(1) {
        Some(classes) if classes != outputsize => Err(GraphError::InvalidConfig(format!(
            "'{}' has {classes} classes but the output layer has {outputsize} units",
            y.name()
        ))),
        _ => Ok(()),
    }
}
