//! Schema module - Genome, parameter and statistics types.

mod genome;
mod params;
mod stats;

pub use genome::*;
pub use params::*;
pub use stats::*;
