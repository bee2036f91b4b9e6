//! HTTP Server for the brokerload API.
//!
//! # API Endpoints
//!
//! | Method | Path                     | Description                              |
//! |--------|--------------------------|------------------------------------------|
//! | GET    | `/health`                | Health check                             |
//! | GET    | `/api/brokers`           | Supported brokers and their layouts      |
//! | GET    | `/api/schemas/{broker}`  | Effective layout of one broker           |
//! | POST   | `/api/repair`            | Repair one export (`file`, `broker`)     |
//! | POST   | `/api/unify`             | Unify several exports (`file`...)        |
//! | GET    | `/api/logs`              | SSE stream for real-time logs            |

use axum::{
    extract::{Multipart, Path},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, LOG_BROADCASTER};
use super::types::{error_response, RepairResponse, UnifyResponse};
use crate::cache::SchemaRegistry;
use crate::error::{PipelineError, ServerError};
use crate::pipeline::{repair_bytes, unify_bytes, PipelineOptions};
use crate::schema::Broker;

type ApiError = (StatusCode, Json<Value>);

/// Build the router. Separate from [`start_server`] so it can be mounted
/// elsewhere.
pub fn router() -> Router {
    // Permissive CORS for local front ends
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/brokers", get(list_brokers))
        .route("/api/schemas/{broker}", get(show_schema))
        .route("/api/repair", post(repair_upload))
        .route("/api/unify", post(unify_upload))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Brokerload server running on http://localhost:{}", port);
    println!("   POST /api/repair  - Repair one broker export");
    println!("   POST /api/unify   - Unify several exports");
    println!("   GET  /api/brokers - Supported brokers");
    println!("   GET  /api/logs    - SSE log stream");
    println!("   GET  /health      - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "brokerload",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "repair": "POST /api/repair",
            "unify": "POST /api/unify",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn list_brokers() -> Json<Value> {
    let registry = SchemaRegistry::new();
    let brokers: Vec<Value> = Broker::all()
        .iter()
        .map(|&broker| {
            let (schema, origin) = registry.resolve(broker);
            json!({
                "id": broker.id(),
                "name": broker.display_name(),
                "version": schema.version,
                "width": schema.width,
                "zones": schema.zones.iter().map(|z| z.name.as_str()).collect::<Vec<_>>(),
                "origin": origin,
            })
        })
        .collect();
    Json(json!({ "brokers": brokers }))
}

async fn show_schema(Path(broker): Path<String>) -> Result<Json<Value>, ApiError> {
    let broker: Broker = broker
        .parse()
        .map_err(|e: crate::error::SchemaError| bad_request(e.to_string()))?;
    let (schema, origin) = SchemaRegistry::new().resolve(broker);
    Ok(Json(json!({ "origin": origin, "schema": schema })))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Fields of a repair or unify upload
#[derive(Default)]
struct Upload {
    files: Vec<(String, Vec<u8>)>,
    broker: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("upload_{}.csv", upload.files.len() + 1));
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Read error: {}", e)))?;
                upload.files.push((file_name, bytes.to_vec()));
            }
            "broker" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Read error: {}", e)))?;
                if !text.trim().is_empty() {
                    upload.broker = Some(text);
                }
            }
            _ => {}
        }
    }

    Ok(upload)
}

fn parse_broker(value: &str) -> Result<Broker, ApiError> {
    value
        .parse()
        .map_err(|e: crate::error::SchemaError| bad_request(e.to_string()))
}

/// Repair one uploaded export
async fn repair_upload(multipart: Multipart) -> Result<Json<RepairResponse>, ApiError> {
    let upload = read_upload(multipart).await?;

    let broker = upload
        .broker
        .as_deref()
        .ok_or_else(|| bad_request("No broker provided"))
        .and_then(parse_broker)?;
    let (name, bytes) = upload
        .files
        .into_iter()
        .next()
        .ok_or_else(|| bad_request("No file provided"))?;

    println!("\n{}", "=".repeat(70));
    println!("📄 REPAIR: {} ({} bytes, {})", name, bytes.len(), broker.display_name());
    println!("{}\n", "=".repeat(70));

    let result = tokio::task::spawn_blocking(move || {
        repair_bytes(&bytes, &name, broker, &PipelineOptions::default())
    })
    .await
    .map_err(|e| internal(ServerError::Internal(e.to_string())))?
    .map_err(pipeline_error)?;

    Ok(Json(RepairResponse::from(result)))
}

/// Unify several uploaded exports, repairing them first when a broker is given
async fn unify_upload(multipart: Multipart) -> Result<Json<UnifyResponse>, ApiError> {
    let upload = read_upload(multipart).await?;

    let broker = upload.broker.as_deref().map(parse_broker).transpose()?;
    if upload.files.is_empty() {
        return Err(bad_request("No file provided"));
    }

    println!("\n{}", "=".repeat(70));
    println!("🧩 UNIFY: {} files", upload.files.len());
    println!("{}\n", "=".repeat(70));

    let files = upload.files;
    let dataset = tokio::task::spawn_blocking(move || {
        unify_bytes(&files, broker, &PipelineOptions::default())
    })
    .await
    .map_err(|e| internal(ServerError::Internal(e.to_string())))?
    .map_err(pipeline_error)?;

    Ok(Json(UnifyResponse::from(dataset)))
}

fn bad_request(message: impl Into<String>) -> ApiError {
    let err = ServerError::BadRequest(message.into());
    (StatusCode::BAD_REQUEST, Json(error_response(&err.to_string())))
}

fn internal(err: ServerError) -> ApiError {
    log_error(err.to_string());
    (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response(&err.to_string())))
}

/// Structural input problems are the client's; everything else is ours.
fn pipeline_error(err: PipelineError) -> ApiError {
    let status = match err {
        PipelineError::Csv(_)
        | PipelineError::Repair(_)
        | PipelineError::Unify(_)
        | PipelineError::EmptyInput => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let err = ServerError::Pipeline(err);
    log_error(err.to_string());
    (status, Json(error_response(&err.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_status() {
        let (status, Json(body)) = pipeline_error(PipelineError::EmptyInput);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], "error");

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let (status, _) = pipeline_error(PipelineError::Io(io));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_parse_broker() {
        assert_eq!(parse_broker("Kuehne+Nagel").unwrap(), Broker::KuehneNagel);
        let (status, _) = parse_broker("ups").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body["service"], "brokerload");
    }
}
