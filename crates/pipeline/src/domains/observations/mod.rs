mod fetch_observations;
mod normalize;

pub use fetch_observations::*;
pub use normalize::*;
