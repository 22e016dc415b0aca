mod histogram;
mod percentile;

pub use histogram::*;
pub use percentile::*;
