use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, de};
use strum::VariantArray;

use crate::model::{CellCounts, Population};

/// One sample joined to its subject, as read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCounts {
    pub sample_id: String,
    pub subject_id: String,
    pub project_id: String,
    pub condition: String,
    pub treatment: Option<String>,
    pub response: Option<String>,
    pub sample_type: String,
    pub time_from_treatment_start: i32,
    #[serde(flatten)]
    pub counts: CellCounts,
}

/// Relative frequency of one population in one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyRecord {
    pub sample_id: String,
    pub subject_id: String,
    pub project_id: String,
    pub condition: String,
    pub treatment: Option<String>,
    pub response: Option<String>,
    pub sample_type: String,
    pub time_from_treatment_start: i32,
    pub population: Population,
    pub total_count: i64,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrequencyTable {
    records: Vec<FrequencyRecord>,
    empty_samples: Vec<String>,
}

impl FrequencyTable {
    /// Melts every sample into one record per population. Samples without any
    /// counted cells, or whose total overflows, are listed in
    /// [`FrequencyTable::empty_samples`] instead.
    #[must_use]
    pub fn from_samples(samples: &[SampleCounts]) -> Self {
        let mut records = Vec::with_capacity(samples.len() * Population::VARIANTS.len());
        let mut empty_samples = Vec::new();

        for sample in samples {
            let Some(total_count) = sample.counts.total().filter(|total| *total > 0) else {
                empty_samples.push(sample.sample_id.clone());
                continue;
            };

            for &population in Population::VARIANTS {
                let Some(percentage) = sample.counts.percentage(population) else {
                    continue;
                };

                records.push(FrequencyRecord {
                    sample_id: sample.sample_id.clone(),
                    subject_id: sample.subject_id.clone(),
                    project_id: sample.project_id.clone(),
                    condition: sample.condition.clone(),
                    treatment: sample.treatment.clone(),
                    response: sample.response.clone(),
                    sample_type: sample.sample_type.clone(),
                    time_from_treatment_start: sample.time_from_treatment_start,
                    population,
                    total_count,
                    count: sample.counts.get(population),
                    percentage,
                });
            }
        }

        Self {
            records,
            empty_samples,
        }
    }

    #[must_use]
    pub fn records(&self) -> &[FrequencyRecord] {
        &self.records
    }

    #[must_use]
    pub fn empty_samples(&self) -> &[String] {
        &self.empty_samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;

    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(de::Error::custom),
    }
}

/// The dashboard's dropdown selection. `None` selects every value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSelection {
    #[serde(deserialize_with = "empty_as_none")]
    pub project: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub condition: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub treatment: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub sample_type: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub time_from_treatment_start: Option<i32>,
    #[serde(deserialize_with = "empty_as_none")]
    pub population: Option<Population>,
}

impl FilterSelection {
    #[must_use]
    pub fn matches(&self, record: &FrequencyRecord) -> bool {
        fn accepts<T: PartialEq + ?Sized>(selected: Option<&T>, value: &T) -> bool {
            selected.is_none_or(|s| s == value)
        }

        let Self {
            project,
            condition,
            treatment,
            sample_type,
            time_from_treatment_start,
            population,
        } = self;

        accepts(project.as_deref(), record.project_id.as_str())
            && accepts(condition.as_deref(), record.condition.as_str())
            && treatment
                .as_deref()
                .is_none_or(|t| record.treatment.as_deref() == Some(t))
            && accepts(sample_type.as_deref(), record.sample_type.as_str())
            && accepts(
                time_from_treatment_start.as_ref(),
                &record.time_from_treatment_start,
            )
            && accepts(population.as_ref(), &record.population)
    }

    #[must_use]
    pub fn apply<'a>(&self, table: &'a FrequencyTable) -> Vec<&'a FrequencyRecord> {
        table.records().iter().filter(|r| self.matches(r)).collect()
    }
}

/// Distinct values offered by each dropdown, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub projects: Vec<String>,
    pub conditions: Vec<String>,
    pub treatments: Vec<String>,
    pub sample_types: Vec<String>,
    pub timepoints: Vec<i32>,
    pub populations: Vec<Population>,
}

impl FilterOptions {
    #[must_use]
    pub fn from_table(table: &FrequencyTable) -> Self {
        fn distinct<T: Ord + Clone>(values: impl Iterator<Item = T>) -> Vec<T> {
            values.collect::<BTreeSet<_>>().into_iter().collect()
        }

        let records = table.records();

        Self {
            projects: distinct(records.iter().map(|r| r.project_id.clone())),
            conditions: distinct(records.iter().map(|r| r.condition.clone())),
            treatments: distinct(records.iter().filter_map(|r| r.treatment.clone())),
            sample_types: distinct(records.iter().map(|r| r.sample_type.clone())),
            timepoints: distinct(records.iter().map(|r| r.time_from_treatment_start)),
            populations: Population::VARIANTS.to_vec(),
        }
    }
}
