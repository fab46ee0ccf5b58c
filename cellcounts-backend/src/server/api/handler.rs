use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::Html,
};
use cellcounts_core::{
    baseline::BaselineSummary,
    comparison::Comparison,
    frequency::{FilterSelection, FrequencyRecord},
    model::Cohort,
};
use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use crate::{
    db::query,
    server::{
        AppState,
        dashboard::{FrequencyView, Tab, View},
    },
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ViewParams {
    tab: Tab,
    page: usize,
}

pub(super) async fn dashboard(
    State(app_state): State<AppState>,
    params: std::result::Result<Query<ViewParams>, QueryRejection>,
    filters: std::result::Result<Query<FilterSelection>, QueryRejection>,
) -> (StatusCode, Html<String>) {
    let AppState {
        precomputed,
        dashboard,
        ..
    } = &app_state;

    let (params, filters) = match (params, filters) {
        (Ok(Query(params)), Ok(Query(filters))) => (params, filters),
        (Err(rejection), _) | (_, Err(rejection)) => {
            let err = Error::from(rejection);
            let filters = FilterSelection::default();
            let view = View::error(Tab::default(), &filters, precomputed, &err);

            return (err.status_code(), Html(dashboard.render(&view)));
        }
    };
    tracing::debug!(tab = %params.tab, page = params.page, ?filters, "rendering dashboard");

    let ViewParams { tab, page } = params;

    if tab != Tab::Frequency {
        let view = View::new(tab, &filters, precomputed);
        return (StatusCode::OK, Html(dashboard.render(&view)));
    }

    let table = match app_state.with_conn(query::frequency_table).await {
        Ok(table) => table,
        Err(err) => {
            let view = View::error(tab, &filters, precomputed, &err);
            return (err.status_code(), Html(dashboard.render(&view)));
        }
    };

    let records = filters.apply(&table);
    let view = View {
        page,
        frequencies: Some(FrequencyView {
            records: &records,
            empty_samples: table.empty_samples(),
        }),
        ..View::new(tab, &filters, precomputed)
    };

    (StatusCode::OK, Html(dashboard.render(&view)))
}

#[derive(Serialize)]
pub(super) struct Frequencies {
    records: Vec<FrequencyRecord>,
    empty_samples: Vec<String>,
}

pub(super) async fn frequencies(
    State(app_state): State<AppState>,
    filters: std::result::Result<Query<FilterSelection>, QueryRejection>,
) -> Result<Json<Frequencies>> {
    let Query(filters) = filters?;
    tracing::debug!(?filters, "filtering frequencies");

    let table = app_state.with_conn(query::frequency_table).await?;

    Ok(Json(Frequencies {
        records: filters.apply(&table).into_iter().cloned().collect(),
        empty_samples: table.empty_samples().to_vec(),
    }))
}

pub(super) async fn comparison(State(app_state): State<AppState>) -> Json<Comparison> {
    Json(app_state.precomputed.comparison.clone())
}

#[derive(Serialize)]
pub(super) struct Baseline {
    cohort: Cohort,
    all: BaselineSummary,
    cohort_subset: BaselineSummary,
}

pub(super) async fn baseline(State(app_state): State<AppState>) -> Json<Baseline> {
    let precomputed = &app_state.precomputed;

    Json(Baseline {
        cohort: precomputed.comparison.cohort.clone(),
        all: precomputed.baseline.clone(),
        cohort_subset: precomputed.cohort_baseline.clone(),
    })
}
