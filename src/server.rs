//! HTTP surface: status, configuration, counter reset and the live feed.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Form, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::capture::{ActiveCamera, CameraSource};
use crate::state::InspectionState;
use crate::stream::{self, StreamPublisher};

const NOT_AVAILABLE: &str = "N/A";

#[derive(Clone)]
pub struct AppState {
    pub state: Arc<InspectionState>,
    pub camera: Arc<ActiveCamera>,
    pub publisher: Arc<StreamPublisher>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub last_shape: String,
    pub last_area: f64,
    pub last_result: String,
    pub count_total: u64,
    pub count_good: u64,
    pub count_bad: u64,
    pub expected_shape: String,
    pub expected_area: f64,
    pub tolerance: f64,
    pub camera_index: u32,
    pub camera_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_detection_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_detection_id: Option<String>,
}

impl StatusResponse {
    pub fn collect(state: &InspectionState, camera: &ActiveCamera) -> Self {
        let snapshot = state.get_snapshot();
        let source = camera.current_source();
        let last = snapshot.last;
        Self {
            last_shape: last
                .shape
                .map_or_else(|| NOT_AVAILABLE.to_string(), |s| s.to_string()),
            last_area: last.area,
            last_result: last
                .result
                .map_or_else(|| NOT_AVAILABLE.to_string(), |r| r.to_string()),
            count_total: snapshot.counters.total,
            count_good: snapshot.counters.good,
            count_bad: snapshot.counters.bad,
            expected_shape: snapshot.expected.shape.to_string(),
            expected_area: snapshot.expected.area,
            tolerance: snapshot.expected.tolerance,
            camera_index: source.display_index(),
            camera_source: source.to_string(),
            last_detection_at: last.detected_at.and_then(|at| at.format(&Rfc3339).ok()),
            last_detection_id: last.id.map(|id| id.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    #[serde(flatten)]
    pub status: StatusResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_switched: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Form posted by the operator panel. Missing fields take their defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigForm {
    pub action: Option<String>,
    pub expected_shape: Option<String>,
    pub expected_area: Option<String>,
    pub tolerance: Option<String>,
    pub camera_index: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/config", post(config))
        .route("/reset", post(reset))
        .route("/video_feed", get(video_feed))
        .with_state(state)
}

async fn status(State(app): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse::collect(&app.state, &app.camera))
}

async fn config(
    State(app): State<AppState>,
    Form(form): Form<ConfigForm>,
) -> Result<Json<ConfigResponse>, StatusCode> {
    let action = form.action.as_deref().unwrap_or("save_params");

    if action == "switch_camera" {
        let raw = form.camera_index.as_deref().unwrap_or("").trim().to_string();
        if raw.is_empty() {
            return Ok(Json(ConfigResponse {
                status: StatusResponse::collect(&app.state, &app.camera),
                camera_switched: Some(false),
                error: Some("camera_index is empty".to_string()),
            }));
        }

        // opening a device blocks, keep it off the async workers
        let source: CameraSource = raw.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
        let camera = app.camera.clone();
        let outcome = tokio::task::spawn_blocking(move || camera.switch_to(source))
            .await
            .map_err(|err| {
                warn!("camera switch task failed: {err}");
                StatusCode::INTERNAL_SERVER_ERROR
            })?;

        return Ok(Json(ConfigResponse {
            status: StatusResponse::collect(&app.state, &app.camera),
            camera_switched: Some(outcome.is_ok()),
            error: outcome.err().map(|err| err.to_string()),
        }));
    }

    app.state.set_expected_from_input(
        form.expected_shape.as_deref().unwrap_or("Rectangle"),
        form.expected_area.as_deref().unwrap_or("1000"),
        form.tolerance.as_deref().unwrap_or("300"),
    );
    Ok(Json(ConfigResponse {
        status: StatusResponse::collect(&app.state, &app.camera),
        camera_switched: None,
        error: None,
    }))
}

async fn reset(State(app): State<AppState>) -> Json<StatusResponse> {
    app.state.reset_counters();
    Json(StatusResponse::collect(&app.state, &app.camera))
}

async fn video_feed(State(app): State<AppState>) -> Response {
    let parts = app.publisher.frames().map(Ok::<_, Infallible>);
    (
        [
            (header::CONTENT_TYPE, stream::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}
