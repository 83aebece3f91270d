//! In-process stand-in for the Floom pipeline API.
//!
//! Serves `POST /v1/Pipelines/Run` with a fixed set of scripted pipelines so
//! the client can be exercised over real HTTP:
//!
//! | pipelineId   | reply                                                       |
//! |--------------|-------------------------------------------------------------|
//! | `echo`       | type 1 (String), the prompt echoed back                      |
//! | `image`      | type 2 (Image), a base64 PNG header                          |
//! | `audio`      | type 3 (Audio), a base64 MP3 header                          |
//! | `json`       | type 4 (JsonObject), `responseType` filled from `variables`  |
//! | `bare-json`  | type 4 with a bare object instead of an array               |
//! | `refuse`     | 200 with `success: false` and problem details               |
//! | `crash`      | 500 with a plain-text body                                  |
//! | empty        | 400 problem details                                         |
//! | anything else| 404 problem details                                         |
//!
//! When an API key is configured, requests with a different `Api-Key` header
//! get a 401 problem body before any pipeline runs.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const RUN_PATH: &str = "/v1/Pipelines/Run";

/// Body the server accepts on the run endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub pipeline_id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default)]
    pub response_type: Option<Value>,
}

/// RFC 7807-style problem body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub status: u16,
    pub title: String,
    pub detail: String,
}

/// A request as the server saw it.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRun {
    pub api_key: Option<String>,
    pub request: RunRequest,
}

/// Shared server state: the accepted API key and every request received.
#[derive(Debug, Default)]
pub struct MockState {
    api_key: Option<String>,
    runs: RwLock<Vec<RecordedRun>>,
}

pub type Shared = Arc<MockState>;

impl MockState {
    pub fn new(api_key: Option<&str>) -> Shared {
        Arc::new(Self {
            api_key: api_key.map(str::to_string),
            runs: RwLock::new(Vec::new()),
        })
    }

    pub async fn runs(&self) -> Vec<RecordedRun> {
        self.runs.read().await.clone()
    }

    /// Snapshot of recorded runs for callers outside the runtime.
    pub fn runs_blocking(&self) -> Vec<RecordedRun> {
        self.runs.blocking_read().clone()
    }
}

/// Router with no API key check.
pub fn app() -> Router {
    router(MockState::new(None))
}

pub fn router(state: Shared) -> Router {
    Router::new()
        .route(RUN_PATH, post(run_pipeline))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: Shared) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state)).await
}

async fn run_pipeline(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(request): Json<RunRequest>,
) -> Response {
    let api_key = headers
        .get("api-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    tracing::info!(pipeline_id = %request.pipeline_id, "run requested");

    state.runs.write().await.push(RecordedRun {
        api_key: api_key.clone(),
        request: request.clone(),
    });

    if let Some(expected) = &state.api_key {
        if api_key.as_deref() != Some(expected.as_str()) {
            return problem(StatusCode::UNAUTHORIZED, "Unauthorized", "The provided API key is invalid.");
        }
    }

    match request.pipeline_id.as_str() {
        "" => problem(StatusCode::BAD_REQUEST, "Bad Request", "pipelineId is required."),
        "echo" => success(1, "text", Value::String(request.prompt)),
        "image" => success(2, "png", json!("iVBORw0KGgo=")),
        "audio" => success(3, "mp3", json!("SUQzBAAAAAAA")),
        "json" => {
            let records = match request.response_type {
                Some(Value::Array(items)) => Value::Array(
                    items
                        .into_iter()
                        .map(|item| fill_example(item, &request.variables))
                        .collect(),
                ),
                Some(example) => json!([fill_example(example, &request.variables)]),
                None => json!([{ "text": request.prompt }]),
            };
            success(4, "json", records)
        }
        "bare-json" => success(4, "json", json!({ "text": request.prompt })),
        "refuse" => (
            StatusCode::OK,
            Json(json!({
                "success": false,
                "status": 422,
                "title": "Unprocessable Entity",
                "detail": "The pipeline refused the prompt."
            })),
        )
            .into_response(),
        "crash" => (StatusCode::INTERNAL_SERVER_ERROR, "pipeline worker crashed").into_response(),
        other => problem(
            StatusCode::NOT_FOUND,
            "Not Found",
            &format!("Pipeline '{other}' was not found."),
        ),
    }
}

/// Replace `"<field>.example"` placeholders with matching variables.
fn fill_example(example: Value, variables: &HashMap<String, String>) -> Value {
    match example {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(name, value)| {
                    let filled = match variables.get(&name) {
                        Some(text) if value.is_string() => Value::String(text.clone()),
                        _ => value,
                    };
                    (name, filled)
                })
                .collect(),
        ),
        other => other,
    }
}

fn success(data_type: u8, format: &str, value: Value) -> Response {
    Json(json!({
        "success": true,
        "value": { "type": data_type, "format": format, "value": value }
    }))
    .into_response()
}

fn problem(status: StatusCode, title: &str, detail: &str) -> Response {
    let body = Problem {
        status: status.as_u16(),
        title: title.to_string(),
        detail: detail.to_string(),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_request_defaults_optional_fields() {
        let request: RunRequest = serde_json::from_str(r#"{"pipelineId":"echo"}"#).unwrap();
        assert_eq!(request.pipeline_id, "echo");
        assert!(request.prompt.is_empty());
        assert!(request.variables.is_empty());
        assert!(request.response_type.is_none());
    }

    #[test]
    fn run_request_rejects_missing_pipeline_id() {
        let result: Result<RunRequest, _> = serde_json::from_str(r#"{"prompt":"hi"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn run_request_reads_response_type() {
        let request: RunRequest =
            serde_json::from_str(r#"{"pipelineId":"json","responseType":[{"a":"a.example"}]}"#).unwrap();
        assert_eq!(request.response_type, Some(json!([{"a": "a.example"}])));
    }

    #[test]
    fn fill_example_uses_matching_variables() {
        let variables = HashMap::from([("title".to_string(), "Ode".to_string())]);
        let filled = fill_example(json!({"title": "title.example", "lines": 0}), &variables);
        assert_eq!(filled, json!({"title": "Ode", "lines": 0}));
    }

    #[test]
    fn fill_example_leaves_numbers_alone() {
        let variables = HashMap::from([("lines".to_string(), "12".to_string())]);
        let filled = fill_example(json!({"lines": 0}), &variables);
        assert_eq!(filled, json!({"lines": 0}));
    }

    #[test]
    fn problem_serializes_all_fields() {
        let json = serde_json::to_value(Problem {
            status: 404,
            title: "Not Found".to_string(),
            detail: "gone".to_string(),
        })
        .unwrap();
        assert_eq!(json, json!({"status": 404, "title": "Not Found", "detail": "gone"}));
    }
}
