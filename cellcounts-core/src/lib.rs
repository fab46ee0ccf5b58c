pub mod baseline;
pub mod comparison;
pub mod error;
pub mod frequency;
pub mod model;
pub mod stats;

pub use error::DerivationError;
