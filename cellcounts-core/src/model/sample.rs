use serde::{Deserialize, Serialize};

use super::Population;

/// Raw counts of each immune population in one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCounts {
    pub b_cell: i64,
    pub cd8_t_cell: i64,
    pub cd4_t_cell: i64,
    pub nk_cell: i64,
    pub monocyte: i64,
}

impl CellCounts {
    #[must_use]
    pub fn get(&self, population: Population) -> i64 {
        match population {
            Population::BCell => self.b_cell,
            Population::Cd8TCell => self.cd8_t_cell,
            Population::Cd4TCell => self.cd4_t_cell,
            Population::NkCell => self.nk_cell,
            Population::Monocyte => self.monocyte,
        }
    }

    /// Sum of every population, or `None` when it does not fit in an `i64`.
    #[must_use]
    pub fn total(&self) -> Option<i64> {
        self.iter()
            .try_fold(0_i64, |total, (_, count)| total.checked_add(count))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Population, i64)> + '_ {
        use strum::VariantArray;

        Population::VARIANTS.iter().map(|p| (*p, self.get(*p)))
    }

    /// Share of `population` in the sample as a percentage, or `None` when the
    /// sample has no counted cells.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self, population: Population) -> Option<f64> {
        let total = self.total().filter(|total| *total > 0)?;

        Some(self.get(population) as f64 / total as f64 * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub sample_id: String,
    pub subject_id: String,
    pub sample_type: String,
    pub time_from_treatment_start: i32,
    #[serde(flatten)]
    pub counts: CellCounts,
}
