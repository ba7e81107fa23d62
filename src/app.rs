use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::catalog;
use crate::chart;
use crate::error::FunnelError;
use crate::funnel::{self, SegmentSeries, ShareTable};
use crate::row::SheetSnapshot;

/// Read-only application state: the sheet snapshot is fully
/// materialized at startup and never mutated, so handlers share it
/// without locking.
pub struct AppState {
    snapshot: SheetSnapshot,
}

#[derive(Deserialize)]
struct FunnelQuery {
    segment_type: String,
    date: NaiveDate,
}

#[derive(Deserialize)]
struct SegmentChartQuery {
    segment_type: String,
    date: NaiveDate,
    label: String,
}

#[derive(Serialize)]
struct SegmentTypeMeta {
    name: &'static str,
    labels: Vec<&'static str>,
}

#[derive(Serialize)]
struct MetaResponse {
    dates: Vec<NaiveDate>,
    min_date: Option<NaiveDate>,
    max_date: Option<NaiveDate>,
    segment_types: Vec<SegmentTypeMeta>,
}

#[derive(Serialize)]
struct ShareResponse {
    status: &'static str,
    table: Option<ShareTable>,
}

#[derive(Serialize)]
struct SeriesResponse {
    status: &'static str,
    series: Option<Vec<SegmentSeries>>,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
}

pub async fn run(snapshot: SheetSnapshot, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app_state = Arc::new(AppState { snapshot });

    let app = Router::new()
        .route("/", get(serve_dashboard))
        .route("/api/meta", get(get_meta))
        .route("/api/share", get(get_share_table))
        .route("/api/series", get(get_conversion_series))
        .route("/api/chart/stacked.png", get(get_stacked_chart))
        .route("/api/chart/segment.png", get(get_segment_chart))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(app_state);

    let listener = TcpListener::bind(addr).await?;
    log::info!("listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(include_str!("../static/dashboard.html"))
}

/// Dates and segment types for the UI selectors.
async fn get_meta(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (min_date, max_date) = match state.snapshot.date_range() {
        Some((min, max)) => (Some(min), Some(max)),
        None => (None, None),
    };

    let segment_types = catalog::segment_types()
        .into_iter()
        .map(|name| SegmentTypeMeta {
            name,
            labels: catalog::labels_for(name)
                .map(|labels| labels.to_vec())
                .unwrap_or_default(),
        })
        .collect();

    Json(MetaResponse {
        dates: state.snapshot.dates(),
        min_date,
        max_date,
        segment_types,
    })
}

async fn get_share_table(
    Query(params): Query<FunnelQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match funnel::segment_share_table(&state.snapshot, &params.segment_type, params.date) {
        Ok(Some(table)) => Json(ShareResponse {
            status: "ok",
            table: Some(table),
        })
        .into_response(),
        Ok(None) => Json(ShareResponse {
            status: "no_data",
            table: None,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_conversion_series(
    Query(params): Query<FunnelQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match funnel::conversion_series(&state.snapshot, &params.segment_type, params.date) {
        Ok(Some(series)) => Json(SeriesResponse {
            status: "ok",
            series: Some(series),
        })
        .into_response(),
        Ok(None) => Json(SeriesResponse {
            status: "no_data",
            series: None,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// Comparative stacked chart for a (segment type, date) query.
async fn get_stacked_chart(
    Query(params): Query<FunnelQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let table =
        match funnel::segment_share_table(&state.snapshot, &params.segment_type, params.date) {
            Ok(Some(table)) => table,
            Ok(None) => return no_data_response(),
            Err(e) => return error_response(e),
        };

    let rendered = chart::stacked_chart_params(&table, &params.segment_type)
        .map_err(|e| e.to_string())
        .and_then(|p| chart::render_stacked_chart(&p).map_err(|e| e.to_string()));

    match rendered {
        Ok(png) => png_response(png),
        Err(message) => render_failure_response(message),
    }
}

/// Single-segment funnel chart with conversion-rate annotations.
async fn get_segment_chart(
    Query(params): Query<SegmentChartQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let series =
        match funnel::conversion_series(&state.snapshot, &params.segment_type, params.date) {
            Ok(Some(series)) => series,
            Ok(None) => return no_data_response(),
            Err(e) => return error_response(e),
        };

    let Some(segment) = series.iter().find(|s| s.label == params.label) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                status: "error",
                message: format!(
                    "label {} is not part of segment type {}",
                    params.label, params.segment_type
                ),
            }),
        )
            .into_response();
    };

    let rendered = chart::segment_chart_params(segment, &params.segment_type)
        .map_err(|e| e.to_string())
        .and_then(|p| chart::render_segment_chart(&p).map_err(|e| e.to_string()));

    match rendered {
        Ok(png) => png_response(png),
        Err(message) => render_failure_response(message),
    }
}

fn png_response(png: Vec<u8>) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .body(axum::body::Body::from(png))
        .unwrap()
}

/// Empty state: the chart endpoints answer 404 so the page can swap in
/// its placeholder, mirroring the JSON endpoints' "no_data" status.
fn no_data_response() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "status": "no_data",
            "message": "no row exists for the requested date",
        })),
    )
        .into_response()
}

fn render_failure_response(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "status": "error",
            "message": message,
        })),
    )
        .into_response()
}

/// Maps the core taxonomy onto HTTP statuses: an unknown segment type
/// is the caller's mistake, a missing column is a broken export.
fn error_response(e: FunnelError) -> Response {
    let status = match e {
        FunnelError::UnknownSegmentType(_) => StatusCode::BAD_REQUEST,
        FunnelError::MissingColumn { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            status: "error",
            message: e.to_string(),
        }),
    )
        .into_response()
}
