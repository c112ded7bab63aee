/// Errors raised while building a classifier or binding data to it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A builder needs a dimension that the placeholder leaves open.
    #[error("Dimension {axis} of '{name}' must be statically known")]
    UnknownDimension {
        /// Name of the offending placeholder or tensor.
        name: String,
        /// The axis that is not known.
        axis: usize,
    },

    /// A tensor or placeholder does not have the rank the operation expects.
    #[error("'{name}' has rank {found}, expected rank {expected}")]
    RankMismatch {
        /// Name of the offending placeholder or tensor.
        name: String,
        /// The rank the operation expects.
        expected: usize,
        /// The rank that was provided.
        found: usize,
    },

    /// Fed data is not compatible with the placeholder it is bound to.
    #[error("Cannot feed shape {found:?} to '{name}' with shape {expected}")]
    ShapeMismatch {
        /// Name of the placeholder.
        name: String,
        /// The placeholder shape, `?` marking free dimensions.
        expected: String,
        /// The shape of the data.
        found: Vec<usize>,
    },

    /// Hyper-parameters that cannot produce a classifier.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raw data could not be converted.
    #[error("Data error: {0}")]
    Data(String),
}
