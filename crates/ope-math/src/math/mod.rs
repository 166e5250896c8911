//! Numerical primitives shared by the estimation engine.

pub mod percentile;
pub mod summation;
pub mod weights;
