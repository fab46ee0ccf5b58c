use axum::{Router, routing::get};

use super::AppState;
use handler::{baseline, comparison, dashboard, frequencies};

pub(super) mod error;
mod handler;

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/frequencies", get(frequencies))
        .route("/api/comparison", get(comparison))
        .route("/api/baseline", get(baseline))
}
