//! Decoded pipeline responses.
//!
//! # Design
//! `FloomResponse<T>` is what `FloomClient::run` always returns. Failures are
//! data, not `Err`: a failed run has `success == false`, no values, and an
//! `error` describing what went wrong. `T` is the caller's record type for
//! JsonObject pipelines and defaults to `serde_json::Value`.
//!
//! `FloomResponse::from_body` is the generic structural decoder used when a
//! body is not a recognised success envelope.

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::RunError;
use crate::shape::Instance;

/// Discriminator carried in `value.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String = 1,
    Image = 2,
    Audio = 3,
    JsonObject = 4,
}

impl DataType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(DataType::String),
            2 => Some(DataType::Image),
            3 => Some(DataType::Audio),
            4 => Some(DataType::JsonObject),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }
}

/// Contents of a `ResponseValue`, determined by its `DataType`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<T> {
    /// String, image or audio data as sent by the server.
    Text(String),
    /// A JSON structure that was not instantiated into records.
    Json(Value),
    /// JsonObject output instantiated into the caller's record type.
    Records(Vec<Instance<T>>),
}

/// One typed output value of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseValue<T = Value> {
    pub data_type: DataType,
    pub format: String,
    pub value: Payload<T>,
}

impl<T> ResponseValue<T> {
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Instantiated records, skipping elements the server sent as non-objects.
    pub fn records(&self) -> impl Iterator<Item = &T> {
        let instances: &[Instance<T>] = match &self.value {
            Payload::Records(instances) => instances.as_slice(),
            _ => &[],
        };
        instances.iter().filter_map(Instance::as_record)
    }

    /// Decode a raw `{type, format, value}` entry without instantiating
    /// records. A JsonObject value that arrives as a JSON string is parsed.
    pub(crate) fn from_json(entry: &Value) -> Result<Self, RunError> {
        let data_type = data_type_of(entry)?;
        let format = required_str(entry, "format")?.to_string();
        let raw = entry
            .get("value")
            .ok_or_else(|| RunError::MalformedBody("response value has no `value` field".to_string()))?;

        let value = match (data_type, raw) {
            (DataType::JsonObject, Value::String(text)) => Payload::Json(
                serde_json::from_str(text)
                    .map_err(|e| RunError::MalformedBody(format!("JsonObject value is not JSON: {e}")))?,
            ),
            (DataType::JsonObject, other) => Payload::Json(other.clone()),
            (_, Value::String(text)) => Payload::Text(text.clone()),
            (_, other) => Payload::Json(other.clone()),
        };

        Ok(Self {
            data_type,
            format,
            value,
        })
    }
}

/// Read and validate `type` from a response value object.
pub(crate) fn data_type_of(entry: &Value) -> Result<DataType, RunError> {
    let code = entry
        .get("type")
        .and_then(Value::as_i64)
        .ok_or_else(|| RunError::MalformedBody("response value has no numeric `type`".to_string()))?;
    DataType::from_code(code)
        .ok_or_else(|| RunError::MalformedBody(format!("unknown response value type {code}")))
}

pub(crate) fn required_str<'a>(entry: &'a Value, key: &str) -> Result<&'a str, RunError> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| RunError::MalformedBody(format!("response value has no string `{key}`")))
}

/// Structured error attached to a failed `FloomResponse`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FloomError {
    pub status: Option<i64>,
    pub title: Option<String>,
    pub detail: Option<String>,
}

impl FloomError {
    pub fn new(status: i64, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            title: Some(title.into()),
            detail: Some(detail.into()),
        }
    }

    /// Build from a non-2xx response. A JSON problem body supplies title and
    /// detail; otherwise both fall back to generic text.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let fallback_detail = RunError::HttpStatus {
            status,
            body: body.to_string(),
        }
        .to_string();

        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(problem)) => Self {
                status: Some(status.into()),
                title: Some(string_field(&problem, "title").unwrap_or_else(|| "HTTP Error".to_string())),
                detail: Some(string_field(&problem, "detail").unwrap_or(fallback_detail)),
            },
            _ => Self::new(status.into(), "HTTP Error", fallback_detail),
        }
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

impl fmt::Display for FloomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(status) = self.status {
            write!(f, "{status} ")?;
        }
        f.write_str(self.title.as_deref().unwrap_or("Error"))?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FloomError {}

impl From<RunError> for FloomError {
    fn from(err: RunError) -> Self {
        let detail = err.to_string();
        match err {
            RunError::MissingApiKey { .. } => FloomError::new(401, "Unauthorized", detail),
            RunError::Connection(_) => FloomError::new(503, "Service Unavailable", detail),
            RunError::HttpStatus { status, body } => FloomError::from_http_status(status, &body),
            RunError::Transport(_)
            | RunError::Serialization(_)
            | RunError::MalformedBody(_)
            | RunError::Shape(_)
            | RunError::Io(_) => FloomError::new(500, "Internal Server Error", detail),
        }
    }
}

/// Outcome of a pipeline run.
///
/// Check `success` (or `error`) before reading `values`: a failed run has no
/// values.
#[derive(Debug, Clone, PartialEq)]
pub struct FloomResponse<T = Value> {
    pub success: bool,
    pub values: Vec<ResponseValue<T>>,
    pub error: Option<FloomError>,
    /// Legacy status code some server versions still send.
    pub code: Option<i64>,
    /// Legacy status message some server versions still send.
    pub message: Option<String>,
}

impl<T> FloomResponse<T> {
    pub fn failure(error: FloomError) -> Self {
        Self {
            success: false,
            values: Vec::new(),
            error: Some(error),
            code: None,
            message: None,
        }
    }

    pub(crate) fn with_value(value: ResponseValue<T>) -> Self {
        Self {
            success: true,
            values: vec![value],
            error: None,
            code: None,
            message: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success && self.error.is_none()
    }

    pub fn first_value(&self) -> Option<&ResponseValue<T>> {
        self.values.first()
    }

    /// Generic structural decoding of a response body.
    ///
    /// Reads `success`, the legacy `code`/`message` pair, `value` (an array
    /// of entries or a single entry), and an error when `status`, `title` and
    /// `detail` are all present at the top level.
    pub fn from_body(body: &Value) -> Result<Self, RunError> {
        let object = body
            .as_object()
            .ok_or_else(|| RunError::MalformedBody("response body is not a JSON object".to_string()))?;

        let error = ["status", "title", "detail"]
            .iter()
            .all(|key| object.contains_key(*key))
            .then(|| FloomError {
                status: object.get("status").and_then(Value::as_i64),
                title: string_field(object, "title"),
                detail: string_field(object, "detail"),
            });

        let values = match object.get("value") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries
                .iter()
                .map(ResponseValue::from_json)
                .collect::<Result<_, _>>()?,
            Some(entry) => vec![ResponseValue::from_json(entry)?],
        };

        Ok(Self {
            success: object.get("success").and_then(Value::as_bool).unwrap_or(false),
            values,
            error,
            code: object.get("code").and_then(Value::as_i64),
            message: string_field(object, "message"),
        })
    }
}
