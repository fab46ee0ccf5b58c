use serde::{Deserialize, Serialize};
use strum::VariantArray;

use crate::{
    model::{CellCounts, Cohort, Population, Response},
    stats::{self, welch_t_test},
};

pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Counts of one cohort sample whose subject has a known response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCounts {
    pub sample_id: String,
    pub response: Response,
    #[serde(flatten)]
    pub counts: CellCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonPoint {
    pub sample_id: String,
    pub response: Response,
    pub population: Population,
    pub percentage: f64,
}

/// Responders against non-responders for one population. Statistic and
/// p-value are missing when the test is undefined for the cohort, in which
/// case `note` says why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub population: Population,
    pub responders_n: usize,
    pub non_responders_n: usize,
    pub responders_mean: Option<f64>,
    pub non_responders_mean: Option<f64>,
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub significant: Option<bool>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub cohort: Cohort,
    pub rows: Vec<ComparisonRow>,
    pub points: Vec<ComparisonPoint>,
    pub empty_samples: Vec<String>,
}

impl Comparison {
    #[must_use]
    pub fn row(&self, population: Population) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.population == population)
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.rows
            .first()
            .map_or(0, |r| r.responders_n + r.non_responders_n)
    }
}

/// Compares the relative frequency of every population between responders
/// and non-responders of `cohort` with Welch's t-test.
#[must_use]
pub fn compare_responders(cohort: Cohort, samples: &[ResponseCounts]) -> Comparison {
    let mut points = Vec::with_capacity(samples.len() * Population::VARIANTS.len());
    let mut empty_samples = Vec::new();

    for sample in samples {
        if sample.counts.total().is_none_or(|total| total <= 0) {
            empty_samples.push(sample.sample_id.clone());
            continue;
        }

        points.extend(Population::VARIANTS.iter().filter_map(|&population| {
            Some(ComparisonPoint {
                sample_id: sample.sample_id.clone(),
                response: sample.response,
                population,
                percentage: sample.counts.percentage(population)?,
            })
        }));
    }

    let rows = Population::VARIANTS
        .iter()
        .map(|&population| compare_population(population, &points))
        .collect();

    Comparison {
        cohort,
        rows,
        points,
        empty_samples,
    }
}

fn compare_population(population: Population, points: &[ComparisonPoint]) -> ComparisonRow {
    let group = |response: Response| -> Vec<f64> {
        points
            .iter()
            .filter(|p| p.population == population && p.response == response)
            .map(|p| p.percentage)
            .collect()
    };

    let responders = group(Response::Yes);
    let non_responders = group(Response::No);

    let (statistic, p_value, note) = match welch_t_test(&responders, &non_responders) {
        Ok(test) => (Some(test.statistic), Some(test.p_value), None),
        Err(err) => (None, None, Some(err.to_string())),
    };

    ComparisonRow {
        population,
        responders_n: responders.len(),
        non_responders_n: non_responders.len(),
        responders_mean: stats::mean(&responders),
        non_responders_mean: stats::mean(&non_responders),
        statistic,
        p_value,
        significant: p_value.map(|p| p < SIGNIFICANCE_LEVEL),
        note,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    use super::*;

    fn counts(b_cell: i64, monocyte: i64) -> CellCounts {
        CellCounts {
            b_cell,
            cd8_t_cell: 100,
            cd4_t_cell: 100,
            nk_cell: 100,
            monocyte,
        }
    }

    fn sample(id: &str, response: Response, counts: CellCounts) -> ResponseCounts {
        ResponseCounts {
            sample_id: id.to_string(),
            response,
            counts,
        }
    }

    #[test]
    fn separated_groups_are_significant() {
        let samples = [
            sample("r1", Response::Yes, counts(400, 100)),
            sample("r2", Response::Yes, counts(420, 90)),
            sample("r3", Response::Yes, counts(390, 110)),
            sample("n1", Response::No, counts(100, 400)),
            sample("n2", Response::No, counts(110, 420)),
            sample("n3", Response::No, counts(95, 390)),
        ];

        let comparison = compare_responders(Cohort::default(), &samples);

        assert_eq!(comparison.rows.len(), 5);
        assert_eq!(comparison.points.len(), 30);
        assert_eq!(comparison.n_samples(), 6);

        let b_cell = comparison.row(Population::BCell).unwrap();
        assert_eq!((b_cell.responders_n, b_cell.non_responders_n), (3, 3));
        assert!(b_cell.statistic.unwrap() > 0.0);
        assert_eq!(b_cell.significant, Some(true));
        assert_eq!(b_cell.note, None);

        let monocyte = comparison.row(Population::Monocyte).unwrap();
        assert!(monocyte.statistic.unwrap() < 0.0);
        assert!(monocyte.responders_mean.unwrap() < monocyte.non_responders_mean.unwrap());
    }

    #[test]
    fn empty_group_leaves_every_result_missing() {
        let samples = [
            sample("r1", Response::Yes, counts(400, 100)),
            sample("r2", Response::Yes, counts(420, 90)),
        ];

        let comparison = compare_responders(Cohort::default(), &samples);

        assert_eq!(comparison.rows.len(), 5);
        for row in &comparison.rows {
            assert_eq!(row.non_responders_n, 0);
            assert_eq!(row.statistic, None);
            assert_eq!(row.p_value, None);
            assert_eq!(row.significant, None);
            assert_eq!(row.non_responders_mean, None);
            assert!(row.note.as_deref().unwrap().starts_with("insufficient data"));
        }
    }

    #[test]
    fn empty_samples_are_left_out() {
        let samples = [
            sample("r1", Response::Yes, counts(400, 100)),
            sample("r2", Response::Yes, CellCounts::default()),
        ];

        let comparison = compare_responders(Cohort::default(), &samples);

        assert_eq!(comparison.empty_samples, ["r2"]);
        assert_eq!(comparison.row(Population::BCell).unwrap().responders_n, 1);
        assert_abs_diff_eq!(
            comparison.row(Population::BCell).unwrap().responders_mean.unwrap(),
            50.0
        );
    }
}
