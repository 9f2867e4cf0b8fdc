//! Collective communication used by the coupling layer.

pub mod communicator;
pub mod wire;
