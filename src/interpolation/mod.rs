//! Nodal interpolation between GLL point sets.

pub mod gll;
pub mod operator;

pub use operator::{InterpolationMatrix, InterpolationOperator, TensorInterpolator};
