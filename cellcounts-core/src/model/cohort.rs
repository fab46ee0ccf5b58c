use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A fixed condition × treatment × sample type slice of the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cohort {
    pub condition: String,
    pub treatment: String,
    pub sample_type: String,
}

impl Cohort {
    #[must_use]
    pub fn new(condition: &str, treatment: &str, sample_type: &str) -> Self {
        Self {
            condition: condition.to_string(),
            treatment: treatment.to_string(),
            sample_type: sample_type.to_string(),
        }
    }
}

impl Default for Cohort {
    fn default() -> Self {
        Self::new("melanoma", "miraclib", "PBMC")
    }
}

impl Display for Cohort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            condition,
            treatment,
            sample_type,
        } = self;

        write!(f, "{condition} / {treatment} / {sample_type}")
    }
}
