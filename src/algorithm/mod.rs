mod binarysearch;
mod math;

pub use binarysearch::*;
pub use math::*;
