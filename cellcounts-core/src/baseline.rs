use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::model::subject::is_treated;

pub const BASELINE_TIMEPOINT: i32 = 0;

/// A sample at the baseline timepoint together with its subject's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub sample_id: String,
    pub subject_id: String,
    pub project_id: String,
    pub condition: String,
    pub sex: String,
    pub treatment: Option<String>,
    pub response: Option<String>,
    pub sample_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub keys: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BaselineSummary {
    pub n_samples: usize,
    pub n_subjects: usize,
    pub samples_by_project: Vec<GroupCount>,
    pub subjects_by_condition: Vec<GroupCount>,
    pub subjects_by_condition_and_sex: Vec<GroupCount>,
    /// Only subjects that were treated and have a recorded response.
    pub subjects_by_condition_and_response: Vec<GroupCount>,
    pub subjects_by_response: Vec<GroupCount>,
    pub subjects_by_sex: Vec<GroupCount>,
}

fn count_by<'a, I, F, const N: usize>(records: I, key: F) -> Vec<GroupCount>
where
    I: IntoIterator<Item = &'a BaselineRecord>,
    F: Fn(&'a BaselineRecord) -> Option<[&'a str; N]>,
{
    let mut counts: BTreeMap<[&str; N], usize> = BTreeMap::new();
    for record in records {
        if let Some(k) = key(record) {
            *counts.entry(k).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .map(|(keys, count)| GroupCount {
            keys: keys.iter().map(ToString::to_string).collect(),
            count,
        })
        .collect()
}

impl BaselineSummary {
    /// Subjects are counted once, using the first sample seen for them.
    #[must_use]
    pub fn from_records(records: &[BaselineRecord]) -> Self {
        let subjects: Vec<&BaselineRecord> = records
            .iter()
            .unique_by(|r| r.subject_id.clone())
            .collect();

        let treated_with_response = |r: &'_ BaselineRecord| {
            is_treated(r.treatment.as_deref()) && r.response.is_some()
        };

        Self {
            n_samples: records.len(),
            n_subjects: subjects.len(),
            samples_by_project: count_by(records, |r| Some([r.project_id.as_str()])),
            subjects_by_condition: count_by(subjects.iter().copied(), |r| {
                Some([r.condition.as_str()])
            }),
            subjects_by_condition_and_sex: count_by(subjects.iter().copied(), |r| {
                Some([r.condition.as_str(), r.sex.as_str()])
            }),
            subjects_by_condition_and_response: count_by(subjects.iter().copied(), |r| {
                treated_with_response(r)
                    .then(|| r.response.as_deref().map(|resp| [r.condition.as_str(), resp]))
                    .flatten()
            }),
            subjects_by_response: count_by(subjects.iter().copied(), |r| {
                r.response.as_deref().map(|resp| [resp])
            }),
            subjects_by_sex: count_by(subjects.iter().copied(), |r| Some([r.sex.as_str()])),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;

    fn record(
        sample_id: &str,
        subject_id: &str,
        project_id: &str,
        condition: &str,
        sex: &str,
        treatment: &str,
        response: Option<&str>,
    ) -> BaselineRecord {
        BaselineRecord {
            sample_id: sample_id.to_string(),
            subject_id: subject_id.to_string(),
            project_id: project_id.to_string(),
            condition: condition.to_string(),
            sex: sex.to_string(),
            treatment: Some(treatment.to_string()),
            response: response.map(str::to_string),
            sample_type: "PBMC".to_string(),
        }
    }

    fn group(keys: &[&str], count: usize) -> GroupCount {
        GroupCount {
            keys: keys.iter().map(ToString::to_string).collect(),
            count,
        }
    }

    #[fixture]
    fn summary() -> BaselineSummary {
        let records = [
            record("s1", "sbj1", "prj1", "melanoma", "M", "miraclib", Some("yes")),
            record("s2", "sbj1", "prj1", "melanoma", "M", "miraclib", Some("yes")),
            record("s3", "sbj2", "prj1", "melanoma", "F", "miraclib", Some("no")),
            record("s4", "sbj3", "prj2", "carcinoma", "F", "phauximab", Some("no")),
            record("s5", "sbj4", "prj2", "healthy", "M", "none", None),
            record("s6", "sbj5", "prj3", "melanoma", "F", "none", Some("no")),
        ];

        BaselineSummary::from_records(&records)
    }

    #[rstest]
    fn totals(summary: BaselineSummary) {
        assert_eq!(summary.n_samples, 6);
        assert_eq!(summary.n_subjects, 5);
    }

    #[rstest]
    fn samples_are_counted_per_project(summary: BaselineSummary) {
        assert_eq!(
            summary.samples_by_project,
            [group(&["prj1"], 3), group(&["prj2"], 2), group(&["prj3"], 1)]
        );
    }

    #[rstest]
    fn subjects_are_counted_once(summary: BaselineSummary) {
        assert_eq!(
            summary.subjects_by_condition,
            [
                group(&["carcinoma"], 1),
                group(&["healthy"], 1),
                group(&["melanoma"], 3)
            ]
        );
        assert_eq!(
            summary.subjects_by_condition_and_sex,
            [
                group(&["carcinoma", "F"], 1),
                group(&["healthy", "M"], 1),
                group(&["melanoma", "F"], 2),
                group(&["melanoma", "M"], 1)
            ]
        );
        assert_eq!(
            summary.subjects_by_sex,
            [group(&["F"], 3), group(&["M"], 2)]
        );
    }

    #[rstest]
    fn responses_only_count_treated_subjects(summary: BaselineSummary) {
        assert_eq!(
            summary.subjects_by_condition_and_response,
            [
                group(&["carcinoma", "no"], 1),
                group(&["melanoma", "no"], 1),
                group(&["melanoma", "yes"], 1)
            ]
        );
        assert_eq!(
            summary.subjects_by_response,
            [group(&["no"], 3), group(&["yes"], 1)]
        );
    }

    #[test]
    fn nothing_at_baseline() {
        assert_eq!(BaselineSummary::from_records(&[]), BaselineSummary::default());
    }
}
