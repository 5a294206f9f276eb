//! Mathematical utilities: the logistic model, linear and nonlinear least
//! squares, and the normal quantile function.

pub mod lm;
pub mod logistic;
pub mod normal;
pub mod ols;

pub use lm::*;
pub use logistic::*;
pub use normal::*;
pub use ols::*;
