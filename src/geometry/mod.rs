//! Geometric sanity checks for mirror elements.

pub mod jacobian;
