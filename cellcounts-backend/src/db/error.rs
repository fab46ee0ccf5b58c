use std::sync::LazyLock;

use camino::Utf8PathBuf;
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind};
use regex::Regex;
use serde::Serialize;

static CONSTRAINT_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"constraint failed: (\w+)\.(\w+)").expect("constraint regex should compile")
});
static MISSING_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"no such table: (\w+)").expect("table regex should compile"));

/// Failures reported by the SQLite store itself.
#[derive(thiserror::Error, Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StoreError {
    #[error("{entity} with this {} already exists", field.clone().unwrap_or_default())]
    DuplicateRecord {
        entity: String,
        field: Option<String>,
    },
    #[error("a record references a {referenced_entity} that does not exist")]
    ReferenceNotFound { referenced_entity: String },
    #[error("{message}")]
    ConstraintViolation { message: String },
    #[error("table `{table}` does not exist")]
    MissingTable { table: String },
    #[error("record not found")]
    RecordNotFound,
    #[error("failed to connect to database: {message}")]
    Connection { message: String },
    #[error("{message}")]
    Other { message: String },
}

impl StoreError {
    fn from_other_error(err: impl std::error::Error) -> Self {
        Self::Other {
            message: format!("{err}"),
        }
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::Error::{DatabaseError, NotFound};
        match err {
            DatabaseError(kind, info) => Self::from((kind, info)),
            NotFound => Self::RecordNotFound,
            _ => Self::from_other_error(err),
        }
    }
}

impl From<diesel::ConnectionError> for StoreError {
    fn from(err: diesel::ConnectionError) -> Self {
        Self::Connection {
            message: format!("{err}"),
        }
    }
}

impl
    From<(
        DatabaseErrorKind,
        Box<dyn DatabaseErrorInformation + Send + Sync>,
    )> for StoreError
{
    fn from(
        (kind, info): (
            DatabaseErrorKind,
            Box<dyn DatabaseErrorInformation + Send + Sync>,
        ),
    ) -> Self {
        use DatabaseErrorKind::{CheckViolation, ForeignKeyViolation, NotNullViolation, UniqueViolation};

        let message = info.message();
        let target = CONSTRAINT_TARGET
            .captures(message)
            .map(|cap| (cap[1].to_string(), cap[2].to_string()));

        match kind {
            UniqueViolation => {
                let (entity, field) = target.map_or_else(
                    || (info.table_name().unwrap_or_default().to_string(), None),
                    |(entity, field)| (entity, Some(field)),
                );

                Self::DuplicateRecord { entity, field }
            }
            // SQLite does not say which reference failed; `samples` only references `subjects`
            ForeignKeyViolation => Self::ReferenceNotFound {
                referenced_entity: "subject".to_string(),
            },
            CheckViolation | NotNullViolation => Self::ConstraintViolation {
                message: message.to_string(),
            },
            _ => {
                if let Some(cap) = MISSING_TABLE.captures(message) {
                    return Self::MissingTable {
                        table: cap[1].to_string(),
                    };
                }

                Self::from_other_error(diesel::result::Error::DatabaseError(kind, info))
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {message}")]
    Io { path: Utf8PathBuf, message: String },
    #[error("{path} is missing required column `{column}`")]
    MissingColumn { path: Utf8PathBuf, column: String },
    #[error("line {line}: {message}")]
    Csv { line: u64, message: String },
    #[error("line {line}: {reason}")]
    InvalidRow { line: u64, reason: String },
    #[error("line {line}: sample `{sample_id}` was already defined on line {first_line}")]
    DuplicateSample {
        sample_id: String,
        line: u64,
        first_line: u64,
    },
    #[error("failed to create schema: {0}")]
    Schema(StoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<diesel::result::Error> for LoadError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Store(StoreError::from(err))
    }
}

#[derive(thiserror::Error, Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum QueryError {
    #[error("no data has been loaded yet (table `{table}` does not exist)")]
    SchemaMissing { table: String },
    #[error("no data has been loaded yet ({path} does not exist)")]
    StoreMissing { path: Utf8PathBuf },
    #[error("failed to get a database connection: {message}")]
    Pool { message: String },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingTable { table } => Self::SchemaMissing { table },
            other => Self::Store(other),
        }
    }
}

impl From<diesel::result::Error> for QueryError {
    fn from(err: diesel::result::Error) -> Self {
        Self::from(StoreError::from(err))
    }
}

impl From<diesel::r2d2::PoolError> for QueryError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        Self::Pool {
            message: format!("{err}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{QueryError, StoreError};

    struct Info(&'static str);

    impl DatabaseErrorInformation for Info {
        fn message(&self) -> &str {
            self.0
        }

        fn details(&self) -> Option<&str> {
            None
        }

        fn hint(&self) -> Option<&str> {
            None
        }

        fn table_name(&self) -> Option<&str> {
            None
        }

        fn column_name(&self) -> Option<&str> {
            None
        }

        fn constraint_name(&self) -> Option<&str> {
            None
        }

        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn store_error(kind: DatabaseErrorKind, message: &'static str) -> StoreError {
        StoreError::from(diesel::result::Error::DatabaseError(
            kind,
            Box::new(Info(message)),
        ))
    }

    #[rstest]
    #[case(
        DatabaseErrorKind::UniqueViolation,
        "UNIQUE constraint failed: samples.sample_id",
        StoreError::DuplicateRecord { entity: "samples".to_string(), field: Some("sample_id".to_string()) }
    )]
    #[case(
        DatabaseErrorKind::ForeignKeyViolation,
        "FOREIGN KEY constraint failed",
        StoreError::ReferenceNotFound { referenced_entity: "subject".to_string() }
    )]
    #[case(
        DatabaseErrorKind::CheckViolation,
        "CHECK constraint failed: b_cell >= 0",
        StoreError::ConstraintViolation { message: "CHECK constraint failed: b_cell >= 0".to_string() }
    )]
    #[case(
        DatabaseErrorKind::Unknown,
        "no such table: samples",
        StoreError::MissingTable { table: "samples".to_string() }
    )]
    fn sqlite_messages_are_classified(
        #[case] kind: DatabaseErrorKind,
        #[case] message: &'static str,
        #[case] expected: StoreError,
    ) {
        assert_eq!(store_error(kind, message), expected);
    }

    #[test]
    fn missing_table_means_missing_schema() {
        let err = QueryError::from(store_error(
            DatabaseErrorKind::Unknown,
            "no such table: subjects",
        ));

        assert_eq!(
            err,
            QueryError::SchemaMissing {
                table: "subjects".to_string()
            }
        );
    }
}
