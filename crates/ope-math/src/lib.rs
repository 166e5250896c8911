//! Open Bandit Replay math utilities.

pub mod math;

pub use math::percentile::*;
pub use math::summation::*;
pub use math::weights::*;
