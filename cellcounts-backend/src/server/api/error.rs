use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::db::error::QueryError;

#[derive(thiserror::Error, Serialize, Debug, Clone)]
#[serde(rename_all = "snake_case", tag = "type", content = "detail")]
pub enum Error {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("malformed request")]
    MalformedRequest {
        #[serde(skip)]
        status: StatusCode,
        message: String,
    },
    #[error("background task failed: {message}")]
    Task { message: String },
}

impl Error {
    pub(super) fn status_code(&self) -> StatusCode {
        match self {
            Self::Query(
                QueryError::SchemaMissing { .. }
                | QueryError::StoreMissing { .. }
                | QueryError::Pool { .. },
            ) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Query(QueryError::Store(_)) | Self::Task { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::MalformedRequest { status, .. } => *status,
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task {
            message: format!("{err}"),
        }
    }
}

impl From<QueryRejection> for Error {
    fn from(err: QueryRejection) -> Self {
        Self::MalformedRequest {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            status: u16,
            error: Option<Error>,
        }

        let status = self.status_code();
        tracing::error!(error = %self, status = status.as_u16());

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return (
                status,
                axum::Json(ErrorResponse {
                    status: status.as_u16(),
                    error: None,
                }),
            )
                .into_response();
        }

        (
            status,
            axum::Json(ErrorResponse {
                status: status.as_u16(),
                error: Some(self),
            }),
        )
            .into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::Error;
    use crate::db::error::{QueryError, StoreError};

    #[rstest]
    #[case(QueryError::SchemaMissing { table: "samples".to_string() }, StatusCode::SERVICE_UNAVAILABLE)]
    #[case(QueryError::StoreMissing { path: "cell_data.db".into() }, StatusCode::SERVICE_UNAVAILABLE)]
    #[case(QueryError::Pool { message: "timed out".to_string() }, StatusCode::SERVICE_UNAVAILABLE)]
    #[case(QueryError::Store(StoreError::RecordNotFound), StatusCode::INTERNAL_SERVER_ERROR)]
    fn query_error_status(#[case] err: QueryError, #[case] expected: StatusCode) {
        assert_eq!(Error::from(err).status_code(), expected);
    }

    #[test]
    fn missing_store_is_reported_to_clients() {
        let err = Error::from(QueryError::SchemaMissing {
            table: "samples".to_string(),
        });

        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({
                "type": "query",
                "detail": { "type": "schema_missing", "table": "samples" }
            })
        );
    }
}
