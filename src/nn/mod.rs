mod dense;
mod loss;

pub use dense::*;
pub use loss::*;
