use std::str::FromStr;

use cellcounts_core::{
    baseline::BaselineRecord,
    comparison::ResponseCounts,
    frequency::{FrequencyTable, SampleCounts},
    model::{CellCounts, Cohort, Response, Sample, Subject},
};
use diesel::{
    prelude::*,
    sql_types::{BigInt, Text},
    sqlite::Sqlite,
};

use super::{
    error::QueryError,
    load::{NewSample, NewSubject},
    schema::{samples, subjects},
};

type Result<T> = std::result::Result<T, QueryError>;

const TABLES: [&str; 2] = ["subjects", "samples"];

#[derive(QueryableByName)]
struct TableCount {
    #[diesel(sql_type = BigInt)]
    n: i64,
}

/// Fails with [`QueryError::SchemaMissing`] unless both tables exist.
fn ensure_schema(conn: &mut SqliteConnection) -> Result<()> {
    for table in TABLES {
        let found: TableCount = diesel::sql_query(
            "SELECT count(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind::<Text, _>(table)
        .get_result(conn)?;

        if found.n == 0 {
            return Err(QueryError::SchemaMissing {
                table: table.to_string(),
            });
        }
    }

    Ok(())
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = samples, check_for_backend(Sqlite))]
struct Counts {
    b_cell: i64,
    cd8_t_cell: i64,
    cd4_t_cell: i64,
    nk_cell: i64,
    monocyte: i64,
}

impl From<Counts> for CellCounts {
    fn from(
        Counts {
            b_cell,
            cd8_t_cell,
            cd4_t_cell,
            nk_cell,
            monocyte,
        }: Counts,
    ) -> Self {
        Self {
            b_cell,
            cd8_t_cell,
            cd4_t_cell,
            nk_cell,
            monocyte,
        }
    }
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = samples, check_for_backend(Sqlite))]
struct SampleCountsRow {
    #[diesel(select_expression = samples::sample_id)]
    sample_id: String,
    #[diesel(select_expression = subjects::subject_id)]
    subject_id: String,
    #[diesel(select_expression = subjects::project_id)]
    project_id: String,
    #[diesel(select_expression = subjects::condition)]
    condition: String,
    #[diesel(select_expression = subjects::treatment)]
    treatment: Option<String>,
    #[diesel(select_expression = subjects::response)]
    response: Option<String>,
    #[diesel(select_expression = samples::sample_type)]
    sample_type: String,
    #[diesel(select_expression = samples::time_from_treatment_start)]
    time_from_treatment_start: i32,
    #[diesel(embed)]
    counts: Counts,
}

impl From<SampleCountsRow> for SampleCounts {
    fn from(row: SampleCountsRow) -> Self {
        Self {
            sample_id: row.sample_id,
            subject_id: row.subject_id,
            project_id: row.project_id,
            condition: row.condition,
            treatment: row.treatment,
            response: row.response,
            sample_type: row.sample_type,
            time_from_treatment_start: row.time_from_treatment_start,
            counts: row.counts.into(),
        }
    }
}

/// Every sample joined to its subject, ordered by sample id.
///
/// # Errors
pub fn fetch_frequency_table(conn: &mut SqliteConnection) -> Result<Vec<SampleCounts>> {
    ensure_schema(conn)?;

    let rows = samples::table
        .inner_join(subjects::table)
        .select(SampleCountsRow::as_select())
        .order_by(samples::sample_id)
        .load(conn)?;

    Ok(rows.into_iter().map(SampleCounts::from).collect())
}

/// # Errors
pub fn frequency_table(conn: &mut SqliteConnection) -> Result<FrequencyTable> {
    let samples = fetch_frequency_table(conn)?;

    Ok(FrequencyTable::from_samples(&samples))
}

/// Samples of `cohort` whose subject has a recorded response.
///
/// # Errors
pub fn fetch_comparison_table(
    conn: &mut SqliteConnection,
    cohort: &Cohort,
) -> Result<Vec<ResponseCounts>> {
    ensure_schema(conn)?;

    let rows: Vec<(String, Option<String>, Counts)> = samples::table
        .inner_join(subjects::table)
        .filter(subjects::condition.eq(&cohort.condition))
        .filter(subjects::treatment.eq(&cohort.treatment))
        .filter(samples::sample_type.eq(&cohort.sample_type))
        .filter(subjects::response.is_not_null())
        .select((
            samples::sample_id,
            subjects::response,
            Counts::as_select(),
        ))
        .order_by(samples::sample_id)
        .load(conn)?;

    let counts = rows
        .into_iter()
        .filter_map(|(sample_id, response, counts)| {
            let response = response.as_deref().and_then(|r| Response::from_str(r).ok());
            if response.is_none() {
                tracing::warn!(sample_id = %sample_id, "skipping sample with unrecognized response");
            }

            Some(ResponseCounts {
                sample_id,
                response: response?,
                counts: counts.into(),
            })
        })
        .collect();

    Ok(counts)
}

/// Samples taken at `time_from_treatment_start`, optionally restricted to one
/// cohort, with their subject's attributes.
///
/// # Errors
pub fn fetch_baseline_table(
    conn: &mut SqliteConnection,
    time_from_treatment_start: i32,
    cohort: Option<&Cohort>,
) -> Result<Vec<BaselineRecord>> {
    ensure_schema(conn)?;

    let mut query = samples::table
        .inner_join(subjects::table)
        .filter(samples::time_from_treatment_start.eq(time_from_treatment_start))
        .select((
            samples::sample_id,
            subjects::subject_id,
            subjects::project_id,
            subjects::condition,
            subjects::sex,
            subjects::treatment,
            subjects::response,
            samples::sample_type,
        ))
        .order_by(samples::sample_id)
        .into_boxed();

    if let Some(Cohort {
        condition,
        treatment,
        sample_type,
    }) = cohort
    {
        query = query
            .filter(subjects::condition.eq(condition))
            .filter(subjects::treatment.eq(treatment))
            .filter(samples::sample_type.eq(sample_type));
    }

    let rows: Vec<(
        String,
        String,
        String,
        String,
        String,
        Option<String>,
        Option<String>,
        String,
    )> = query.load(conn)?;

    let records = rows
        .into_iter()
        .map(
            |(sample_id, subject_id, project_id, condition, sex, treatment, response, sample_type)| {
                BaselineRecord {
                    sample_id,
                    subject_id,
                    project_id,
                    condition,
                    sex,
                    treatment,
                    response,
                    sample_type,
                }
            },
        )
        .collect();

    Ok(records)
}

/// # Errors
pub fn fetch_subjects(conn: &mut SqliteConnection) -> Result<Vec<Subject>> {
    ensure_schema(conn)?;

    let subjects = subjects::table
        .select(NewSubject::as_select())
        .order_by(subjects::subject_id)
        .load(conn)?;

    Ok(subjects.into_iter().map(Subject::from).collect())
}

/// # Errors
pub fn fetch_samples(conn: &mut SqliteConnection) -> Result<Vec<Sample>> {
    ensure_schema(conn)?;

    let samples = samples::table
        .select(NewSample::as_select())
        .order_by(samples::sample_id)
        .load(conn)?;

    Ok(samples.into_iter().map(Sample::from).collect())
}
