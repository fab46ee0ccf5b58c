use serde::Serialize;

use crate::stats::MIN_GROUP_SIZE;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum DerivationError {
    #[error(
        "insufficient data: groups have {n_a} and {n_b} observations, at least {min} each are required",
        min = MIN_GROUP_SIZE
    )]
    InsufficientData { n_a: usize, n_b: usize },
    #[error("insufficient data: both groups have zero variance")]
    ZeroVariance,
    #[error("{message}")]
    Distribution { message: String },
}

pub type Result<T> = std::result::Result<T, DerivationError>;
