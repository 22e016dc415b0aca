mod distribution;
mod perf;

pub use distribution::*;
pub use perf::*;

pub const DISTRIBUTIONS: &str = "distributions";
