use std::time::Duration;

use hyper::Body;
use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::{Filter, Reply};

use crate::config::{ConfigError, ConsoleConfig};
use crate::engine::{Command, HttpEngine, UserAction};
use crate::export::{artifact_digest, ExportEncoder, ExportFormat};
use crate::metrics::{init_metrics, record_api_request, Timer, REGISTRY};
use crate::model::DisplayModel;
use crate::session::{ConsoleView, Session, SessionError, SessionHandle};
use crate::sync::SyncError;

#[derive(Debug, Deserialize)]
pub struct CommandBody {
    pub action: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportBody {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

fn status_for(err: &SessionError) -> StatusCode {
    match err {
        SessionError::Sync(SyncError::EngineRejected(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::Sync(_) => StatusCode::BAD_GATEWAY,
        SessionError::Export(_) | SessionError::Closed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn json_reply<T: Serialize>(body: &ApiResponse<T>, status: StatusCode) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

pub fn routes(
    session: SessionHandle,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST"]);

    let command = warp::path("command")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_session(session.clone()))
        .and_then(command_handler)
        .recover(|err: warp::Rejection| invalid_body("/command", err))
        .unify();

    let state = warp::path("state")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_session(session.clone()))
        .and_then(state_handler);

    let export = warp::path!("export" / String)
        .and(warp::post())
        .and(warp::body::json())
        .and(with_session(session))
        .and_then(export_handler)
        .recover(|err: warp::Rejection| invalid_body("/export", err))
        .unify();

    let metrics = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(metrics_handler);

    command
        .or(state)
        .unify()
        .or(export)
        .unify()
        .or(metrics)
        .unify()
        .with(cors)
}

pub async fn run_server(config: ConsoleConfig) -> Result<(), ConfigError> {
    init_metrics();

    let engine = HttpEngine::new(config.engine_uri()?, config.engine_timeout());
    let session = Session::spawn(
        engine,
        DisplayModel::new(),
        ExportEncoder::new(config.report_title.clone()),
        config.queue_depth,
    );

    tracing::info!(
        listen = %config.listen,
        engine = %config.engine_url,
        timeout_ms = ?config.engine_timeout_ms,
        "8086 simulator console starting"
    );
    tracing::info!("  POST /command        - load, reset, step or run");
    tracing::info!("  GET  /state          - current registers, flags, trace and memory");
    tracing::info!("  POST /export/json    - download the report as JSON");
    tracing::info!("  POST /export/pdf     - download the report as PDF");
    tracing::info!("  GET  /metrics        - Prometheus metrics endpoint");

    warp::serve(routes(session)).run(config.listen).await;
    Ok(())
}

fn with_session(
    session: SessionHandle,
) -> impl Filter<Extract = (SessionHandle,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || session.clone())
}

async fn command_handler(
    body: CommandBody,
    session: SessionHandle,
) -> Result<warp::reply::Response, warp::Rejection> {
    let timer = Timer::new();

    let Some(action) = UserAction::from_name(&body.action) else {
        let response: ApiResponse<ConsoleView> =
            ApiResponse::error(format!("Unknown action: {}", body.action));
        record_api_request("POST", "/command", 400, timer.elapsed());
        return Ok(json_reply(&response, StatusCode::BAD_REQUEST));
    };

    let reply = match session.dispatch(Command::for_action(action, &body.code)).await {
        Ok(view) => json_reply(&ApiResponse::success(view), StatusCode::OK),
        Err(err) => {
            let response: ApiResponse<ConsoleView> = ApiResponse::error(err.to_string());
            json_reply(&response, status_for(&err))
        }
    };

    record_api_request("POST", "/command", reply.status().as_u16(), timer.elapsed());
    Ok(reply)
}

async fn state_handler(session: SessionHandle) -> Result<warp::reply::Response, warp::Rejection> {
    let timer = Timer::new();

    let reply = json_reply(&ApiResponse::success(session.view()), StatusCode::OK);

    record_api_request("GET", "/state", reply.status().as_u16(), timer.elapsed());
    Ok(reply)
}

async fn export_handler(
    format: String,
    body: ExportBody,
    session: SessionHandle,
) -> Result<warp::reply::Response, warp::Rejection> {
    let timer = Timer::new();

    let Some(format) = ExportFormat::from_name(&format) else {
        return Err(warp::reject::not_found());
    };
    let endpoint = match format {
        ExportFormat::Json => "/export/json",
        ExportFormat::Pdf => "/export/pdf",
    };

    let reply = match session.export(&body.code, format) {
        Ok(artifact) => {
            let etag = format!("\"{}\"", artifact_digest(&artifact.bytes));
            let disposition = format!("attachment; filename=\"{}\"", format.file_name());
            let mut response = warp::reply::Response::new(Body::from(artifact.bytes));
            let headers = response.headers_mut();
            headers.insert("content-type", header_value(format.content_type()));
            headers.insert("content-disposition", header_value(&disposition));
            headers.insert("etag", header_value(&etag));
            response
        }
        Err(err) => {
            let response: ApiResponse<()> = ApiResponse::error(err.to_string());
            json_reply(&response, status_for(&err))
        }
    };

    record_api_request("POST", endpoint, reply.status().as_u16(), timer.elapsed());
    Ok(reply)
}

// Bodies that are not JSON or miss required fields get the usual envelope.
// Every other rejection passes through so the next route can try.
async fn invalid_body(
    endpoint: &'static str,
    err: warp::Rejection,
) -> Result<warp::reply::Response, warp::Rejection> {
    let Some(cause) = err.find::<warp::filters::body::BodyDeserializeError>() else {
        return Err(err);
    };
    let response: ApiResponse<()> = ApiResponse::error(format!("Invalid request body: {}", cause));
    record_api_request("POST", endpoint, 400, Duration::ZERO);
    Ok(json_reply(&response, StatusCode::BAD_REQUEST))
}

// Header values built here are ASCII file names, MIME types and hex digests.
fn header_value(value: &str) -> warp::http::HeaderValue {
    warp::http::HeaderValue::from_str(value)
        .unwrap_or_else(|_| warp::http::HeaderValue::from_static("invalid"))
}

async fn metrics_handler() -> Result<warp::reply::Response, warp::Rejection> {
    let timer = Timer::new();
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_text) => {
            record_api_request("GET", "/metrics", 200, timer.elapsed());
            Ok(warp::reply::with_header(
                metrics_text,
                "content-type",
                "text/plain; version=0.0.4",
            )
            .into_response())
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to encode metrics");
            record_api_request("GET", "/metrics", 500, timer.elapsed());
            Ok(warp::reply::with_status(
                "Error encoding metrics".to_string(),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .into_response())
        }
    }
}
