use std::{collections::HashMap, fs::File, str::FromStr};

use camino::Utf8Path;
use cellcounts_core::model::{CellCounts, Response, Sample, Subject};
use diesel::{prelude::*, sqlite::Sqlite};
use garde::Validate;
use serde::{Deserialize, Serialize};

use super::{
    error::LoadError,
    schema::{samples, subjects},
};

const INSERT_CHUNK_SIZE: usize = 500;

/// Every column the source must provide, with the alternative header name used
/// by the published dataset.
const REQUIRED_COLUMNS: [(&str, Option<&str>); 15] = [
    ("subject_id", Some("subject")),
    ("project_id", Some("project")),
    ("condition", None),
    ("age", None),
    ("sex", None),
    ("treatment", None),
    ("response", None),
    ("sample_id", Some("sample")),
    ("sample_type", None),
    ("time_from_treatment_start", None),
    ("b_cell", None),
    ("cd8_t_cell", None),
    ("cd4_t_cell", None),
    ("nk_cell", None),
    ("monocyte", None),
];

fn valid_response(value: &Option<String>, _context: &()) -> garde::Result {
    match value.as_deref() {
        None => Ok(()),
        Some(response) => Response::from_str(response).map(|_| ()).map_err(|_| {
            garde::Error::new(format!("expected `yes`, `no` or nothing, found `{response}`"))
        }),
    }
}

#[derive(Debug, Deserialize, Validate)]
#[garde(allow_unvalidated)]
struct SourceRow {
    #[serde(alias = "subject")]
    #[garde(length(min = 1))]
    subject_id: String,
    #[serde(alias = "project")]
    #[garde(length(min = 1))]
    project_id: String,
    #[garde(length(min = 1))]
    condition: String,
    #[garde(range(min = 0))]
    age: i32,
    #[garde(length(min = 1))]
    sex: String,
    treatment: Option<String>,
    #[garde(custom(valid_response))]
    response: Option<String>,
    #[serde(alias = "sample")]
    #[garde(length(min = 1))]
    sample_id: String,
    #[garde(length(min = 1))]
    sample_type: String,
    time_from_treatment_start: i32,
    #[garde(range(min = 0))]
    b_cell: i64,
    #[garde(range(min = 0))]
    cd8_t_cell: i64,
    #[garde(range(min = 0))]
    cd4_t_cell: i64,
    #[garde(range(min = 0))]
    nk_cell: i64,
    #[garde(range(min = 0))]
    monocyte: i64,
}

impl SourceRow {
    fn counts(&self) -> CellCounts {
        CellCounts {
            b_cell: self.b_cell,
            cd8_t_cell: self.cd8_t_cell,
            cd4_t_cell: self.cd4_t_cell,
            nk_cell: self.nk_cell,
            monocyte: self.monocyte,
        }
    }

    fn split(self) -> (NewSubject, NewSample) {
        let Self {
            subject_id,
            project_id,
            condition,
            age,
            sex,
            treatment,
            response,
            sample_id,
            sample_type,
            time_from_treatment_start,
            b_cell,
            cd8_t_cell,
            cd4_t_cell,
            nk_cell,
            monocyte,
        } = self;

        // Normalized so stored responses always read back as `yes`/`no`
        let response = response
            .as_deref()
            .and_then(|r| Response::from_str(r).ok())
            .map(|r| r.to_string());

        let sample = NewSample {
            sample_id,
            subject_id: subject_id.clone(),
            sample_type,
            time_from_treatment_start,
            b_cell,
            cd8_t_cell,
            cd4_t_cell,
            nk_cell,
            monocyte,
        };

        let subject = NewSubject {
            subject_id,
            project_id,
            condition,
            age,
            sex,
            treatment,
            response,
        };

        (subject, sample)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable, Queryable, Selectable)]
#[diesel(table_name = subjects, check_for_backend(Sqlite))]
pub struct NewSubject {
    pub subject_id: String,
    pub project_id: String,
    pub condition: String,
    pub age: i32,
    pub sex: String,
    pub treatment: Option<String>,
    pub response: Option<String>,
}

impl NewSubject {
    fn disagreements(&self, other: &Self) -> Vec<(&'static str, String, String)> {
        fn show(value: Option<&String>) -> String {
            value.cloned().unwrap_or_default()
        }

        let mut fields = Vec::new();
        let mut compare = |field, first: String, other: String| {
            if first != other {
                fields.push((field, first, other));
            }
        };

        compare("project_id", self.project_id.clone(), other.project_id.clone());
        compare("condition", self.condition.clone(), other.condition.clone());
        compare("age", self.age.to_string(), other.age.to_string());
        compare("sex", self.sex.clone(), other.sex.clone());
        compare(
            "treatment",
            show(self.treatment.as_ref()),
            show(other.treatment.as_ref()),
        );
        compare(
            "response",
            show(self.response.as_ref()),
            show(other.response.as_ref()),
        );

        fields
    }
}

impl From<NewSubject> for Subject {
    fn from(subject: NewSubject) -> Self {
        let NewSubject {
            subject_id,
            project_id,
            condition,
            age,
            sex,
            treatment,
            response,
        } = subject;

        Self {
            subject_id,
            project_id,
            condition,
            age,
            sex,
            treatment,
            response,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable, Queryable, Selectable)]
#[diesel(table_name = samples, check_for_backend(Sqlite))]
pub struct NewSample {
    pub sample_id: String,
    pub subject_id: String,
    pub sample_type: String,
    pub time_from_treatment_start: i32,
    pub b_cell: i64,
    pub cd8_t_cell: i64,
    pub cd4_t_cell: i64,
    pub nk_cell: i64,
    pub monocyte: i64,
}

impl From<NewSample> for Sample {
    fn from(sample: NewSample) -> Self {
        let NewSample {
            sample_id,
            subject_id,
            sample_type,
            time_from_treatment_start,
            b_cell,
            cd8_t_cell,
            cd4_t_cell,
            nk_cell,
            monocyte,
        } = sample;

        Self {
            sample_id,
            subject_id,
            sample_type,
            time_from_treatment_start,
            counts: CellCounts {
                b_cell,
                cd8_t_cell,
                cd4_t_cell,
                nk_cell,
                monocyte,
            },
        }
    }
}

/// A later row for an already-seen subject whose attributes differ from the
/// first one. The first row's value is the one stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectConflict {
    pub subject_id: String,
    pub field: &'static str,
    pub first: String,
    pub other: String,
    pub line: u64,
}

#[derive(Debug, Default)]
pub struct Dataset {
    pub subjects: Vec<NewSubject>,
    pub samples: Vec<NewSample>,
    pub conflicts: Vec<SubjectConflict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub n_subjects: usize,
    pub n_samples: usize,
    pub conflicts: Vec<SubjectConflict>,
}

fn check_columns(path: &Utf8Path, headers: &csv::StringRecord) -> Result<(), LoadError> {
    let has = |name: &str| headers.iter().any(|h| h == name);

    for (column, alias) in REQUIRED_COLUMNS {
        if !has(column) && !alias.is_some_and(has) {
            return Err(LoadError::MissingColumn {
                path: path.to_owned(),
                column: column.to_string(),
            });
        }
    }

    Ok(())
}

/// Parses and validates the whole source, deduplicating subjects so that the
/// first row seen for each subject wins.
///
/// # Errors
pub fn read_source(path: &Utf8Path) -> Result<Dataset, LoadError> {
    let io_err = |err: &dyn std::error::Error| LoadError::Io {
        path: path.to_owned(),
        message: err.to_string(),
    };

    let file = File::open(path).map_err(|err| io_err(&err))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader.headers().map_err(|err| io_err(&err))?.clone();
    check_columns(path, &headers)?;

    let mut dataset = Dataset::default();
    let mut subject_index: HashMap<String, usize> = HashMap::new();
    let mut sample_lines: HashMap<String, u64> = HashMap::new();

    for record in reader.records() {
        let record = record.map_err(|err| LoadError::Csv {
            line: err.position().map_or(0, csv::Position::line),
            message: err.to_string(),
        })?;
        let line = record.position().map_or(0, csv::Position::line);

        let row: SourceRow = record
            .deserialize(Some(&headers))
            .map_err(|err| LoadError::Csv {
                line,
                message: err.to_string(),
            })?;
        row.validate().map_err(|report| LoadError::InvalidRow {
            line,
            reason: format!("{report}"),
        })?;
        if row.counts().total().is_none() {
            return Err(LoadError::InvalidRow {
                line,
                reason: "cell counts add up to more than a sample can hold".to_string(),
            });
        }

        let (subject, sample) = row.split();

        if let Some(&first_line) = sample_lines.get(&sample.sample_id) {
            return Err(LoadError::DuplicateSample {
                sample_id: sample.sample_id,
                line,
                first_line,
            });
        }
        sample_lines.insert(sample.sample_id.clone(), line);

        match subject_index.get(&subject.subject_id) {
            Some(&i) => {
                let first = &dataset.subjects[i];
                dataset.conflicts.extend(first.disagreements(&subject).into_iter().map(
                    |(field, first, other)| SubjectConflict {
                        subject_id: subject.subject_id.clone(),
                        field,
                        first,
                        other,
                        line,
                    },
                ));
            }
            None => {
                subject_index.insert(subject.subject_id.clone(), dataset.subjects.len());
                dataset.subjects.push(subject);
            }
        }

        dataset.samples.push(sample);
    }

    Ok(dataset)
}

/// Replaces the whole store with the contents of the CSV at `path`.
///
/// The source is parsed and validated before the store is touched, and the
/// schema reset plus all inserts run in one immediate transaction, so a failed
/// load leaves the previous contents in place.
///
/// # Errors
pub fn load(conn: &mut SqliteConnection, path: &Utf8Path) -> Result<LoadReport, LoadError> {
    let Dataset {
        subjects,
        samples,
        conflicts,
    } = read_source(path)?;

    for conflict in &conflicts {
        tracing::warn!(
            subject_id = %conflict.subject_id,
            field = conflict.field,
            first = %conflict.first,
            other = %conflict.other,
            line = conflict.line,
            "subject row disagrees with the first row for this subject; keeping the first"
        );
    }

    conn.immediate_transaction(|conn| {
        super::reset_schema(conn).map_err(LoadError::Schema)?;

        for chunk in subjects.chunks(INSERT_CHUNK_SIZE) {
            diesel::insert_into(subjects::table)
                .values(chunk)
                .execute(conn)?;
        }

        for chunk in samples.chunks(INSERT_CHUNK_SIZE) {
            diesel::insert_into(samples::table)
                .values(chunk)
                .execute(conn)?;
        }

        Ok::<_, LoadError>(())
    })?;

    tracing::debug!(
        n_subjects = subjects.len(),
        n_samples = samples.len(),
        "inserted subjects and samples"
    );

    Ok(LoadReport {
        n_subjects: subjects.len(),
        n_samples: samples.len(),
        conflicts,
    })
}
