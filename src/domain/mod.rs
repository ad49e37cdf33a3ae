pub mod benchmark_types;
pub mod errors;

pub use benchmark_types::*;
pub use errors::*;
