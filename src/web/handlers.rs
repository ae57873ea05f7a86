//! Request handlers for the query API
//!
//! Handlers only read from the shared catalog. Each one logs its route, the
//! number of rows returned and the time taken.

use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::Uri,
    Json,
};
use chrono::Utc;
use tracing::info;

use super::responses::{ApiError, HealthResponse};
use super::AppState;
use crate::errors::AppError;
use crate::models::PlaylistChannel;
use crate::services::{CategoryView, ProgramView};

fn log_request(route: &str, rows: usize, started: Instant) {
    info!(
        "GET {} -> {} rows in {:.1}ms",
        route,
        rows,
        started.elapsed().as_secs_f64() * 1000.0
    );
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        channels: state.catalog.channel_count(),
        programs: state.catalog.program_count(),
    })
}

pub async fn list_categories(State(state): State<AppState>) -> Json<Vec<CategoryView>> {
    let started = Instant::now();
    let categories = state.catalog.categories();
    log_request("/categories", categories.len(), started);
    Json(categories)
}

pub async fn list_category_channels(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Json<Vec<PlaylistChannel>> {
    let started = Instant::now();
    let channels = state.catalog.channels_in_category(&category);
    log_request(
        &format!("/categories/{}/channels", category),
        channels.len(),
        started,
    );
    Json(channels)
}

pub async fn list_channel_programs(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Json<Vec<ProgramView>> {
    let started = Instant::now();
    let programs = state.catalog.upcoming_programs(&channel, Utc::now());
    log_request(
        &format!("/channels/{}/programs", channel),
        programs.len(),
        started,
    );
    Json(programs)
}

pub async fn not_found(uri: Uri) -> ApiError {
    AppError::not_found("route", uri.path()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Catalog;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState {
            catalog: Arc::new(Catalog::new(
                vec![PlaylistChannel {
                    url: "http://stream/a".to_string(),
                    category: Some("NEWS".to_string()),
                    ..PlaylistChannel::default()
                }],
                Vec::new(),
                chrono_tz::UTC,
            )),
        }
    }

    #[test]
    fn test_health_check_counts() {
        let Json(health) = tokio_test::block_on(health_check(State(state())));
        assert_eq!(health.status, "healthy");
        assert_eq!(health.channels, 1);
        assert_eq!(health.programs, 0);
    }

    #[test]
    fn test_unknown_channel_has_no_programs() {
        let Json(programs) = tokio_test::block_on(list_channel_programs(
            State(state()),
            Path("missing".to_string()),
        ));
        assert!(programs.is_empty());
    }
}
