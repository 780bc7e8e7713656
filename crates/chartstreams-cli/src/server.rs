//! HTTP transport for a [`ChartProvider`]

use axum::extract::{Path, Request, State};
use axum::http::{HeaderName, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chartstreams_repo::{ChartProvider, RepoError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Route prefix for chart downloads, also used as the index URL prefix
pub const CHART_ROUTE_PREFIX: &str = "/chart";

/// Response header carrying the archive digest
pub const DIGEST_HEADER: &str = "x-chart-digest";

type SharedProvider = Arc<dyn ChartProvider>;

/// Build the chart repository routes
pub fn router(provider: SharedProvider) -> Router {
    Router::new()
        .route("/index.yaml", get(index_yaml))
        .route("/chart/{name}/{version}", get(chart_archive))
        .layer(middleware::from_fn(trace_request))
        .with_state(provider)
}

async fn index_yaml(State(provider): State<SharedProvider>) -> Response {
    match provider.index_file().and_then(|catalog| catalog.to_yaml()) {
        Ok(yaml) => ([(header::CONTENT_TYPE, "application/x-yaml")], yaml).into_response(),
        Err(err) => error_response(err),
    }
}

async fn chart_archive(
    State(provider): State<SharedProvider>,
    Path((name, version)): Path<(String, String)>,
) -> Response {
    match provider.get_chart(&name, &version).await {
        Ok(chart) => {
            let disposition = format!("attachment; filename=\"{}\"", chart.file_name());
            (
                [
                    (header::CONTENT_TYPE, "application/gzip".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                    (HeaderName::from_static(DIGEST_HEADER), chart.digest),
                ],
                chart.archive,
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

fn status_for(err: &RepoError) -> StatusCode {
    match err {
        RepoError::VersionNotFound { .. } => StatusCode::NOT_FOUND,
        RepoError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
        RepoError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: RepoError) -> Response {
    let status = status_for(&err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "request failed");
    }
    (status, err.to_string()).into_response()
}

async fn trace_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}
