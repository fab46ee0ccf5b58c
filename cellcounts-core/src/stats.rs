use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{DerivationError, Result};

pub const MIN_GROUP_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TTest {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: f64,
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[allow(clippy::cast_precision_loss)]
fn sample_variance(values: &[f64], mean: f64) -> f64 {
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();

    squares / (values.len() - 1) as f64
}

/// Welch's unequal-variance two-sample t-test (two-sided).
///
/// # Errors
/// Returns [`DerivationError::InsufficientData`] when either group has fewer
/// than [`MIN_GROUP_SIZE`] observations and [`DerivationError::ZeroVariance`]
/// when the standard error of the difference is zero.
#[allow(clippy::cast_precision_loss)]
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<TTest> {
    let (n_a, n_b) = (a.len(), b.len());
    if n_a < MIN_GROUP_SIZE || n_b < MIN_GROUP_SIZE {
        return Err(DerivationError::InsufficientData { n_a, n_b });
    }

    let (Some(mean_a), Some(mean_b)) = (mean(a), mean(b)) else {
        return Err(DerivationError::InsufficientData { n_a, n_b });
    };

    let se_a = sample_variance(a, mean_a) / n_a as f64;
    let se_b = sample_variance(b, mean_b) / n_b as f64;
    let se = se_a + se_b;

    if !se.is_finite() || se <= 0.0 {
        return Err(DerivationError::ZeroVariance);
    }

    let statistic = (mean_a - mean_b) / se.sqrt();
    let degrees_of_freedom =
        se.powi(2) / (se_a.powi(2) / (n_a - 1) as f64 + se_b.powi(2) / (n_b - 1) as f64);

    let distribution = StudentsT::new(0.0, 1.0, degrees_of_freedom).map_err(|err| {
        DerivationError::Distribution {
            message: format!("{err}"),
        }
    })?;
    let p_value = (2.0 * distribution.sf(statistic.abs())).clamp(0.0, 1.0);

    Ok(TTest {
        statistic,
        p_value,
        degrees_of_freedom,
    })
}
