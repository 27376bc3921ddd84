pub mod avatar;
pub mod dataset;
pub mod error;
pub mod harness;
pub mod matrix;
pub mod morpheus;
pub mod regression;
pub mod sparse;
mod utils;

pub use avatar::{Avatar, NdarrayAvatar};
pub use error::{MatrixError, Representation, Result};
pub use matrix::{FactorizedBuilder, NormalizedMatrix, Operand};
pub use regression::{LinearRegressionBuilder, NormalizedLinearRegression};
pub use utils::Direction;
