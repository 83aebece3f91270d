//! Floom pipeline client.
//!
//! # Design
//! `FloomClient` holds only immutable configuration and a transport, so one
//! client can serve any number of callers. A run is split the same way as the
//! wire exchange:
//!
//! - `build_run` turns a `PipelineInvocation` into an `HttpRequest`.
//! - `parse_run` turns the `HttpResponse` into a `FloomResponse`.
//! - `run` checks the API-key precondition, then composes the two around
//!   exactly one `Transport::execute` call.
//!
//! Every failure becomes a `FloomResponse` with `success == false` and a
//! populated `error`; nothing in `run` returns `Err` or panics on bad input.
//!
//! Response dispatch reads `value.type`. JsonObject payloads are always
//! treated as an array of records, whether or not the requested shape is a
//! list, and each element is instantiated into `T`. String, image and audio
//! payloads are wrapped unchanged. Anything else goes through the generic
//! `FloomResponse::from_body` decoder.

use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ConfigError, RunError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::request::PipelineInvocation;
use crate::response::{data_type_of, required_str, DataType, FloomResponse, Payload, ResponseValue};
use crate::shape::{instantiate_list, ShapeDescriptor};

pub const API_VERSION: &str = "v1";
pub const RUN_PIPELINE_ENDPOINT: &str = "/Pipelines/Run";

/// Record name reported in shape errors when the caller gave no shape.
const UNSHAPED_RECORD: &str = "JsonObject";

/// Synchronous client for the Floom pipeline API.
#[derive(Clone)]
pub struct FloomClient<X = UreqTransport> {
    config: ClientConfig,
    transport: X,
}

impl FloomClient<UreqTransport> {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self::with_transport(ClientConfig::new(base_url, api_key), UreqTransport::new())
    }

    /// Build a client from `FLOOM_URL`, `FLOOM_API_KEY` and `FLOOM_VERBOSE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::with_transport(ClientConfig::from_env()?, UreqTransport::new()))
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Read a saved JSON response from disk.
    pub fn load_response_from_file(path: impl AsRef<Path>) -> Result<Value, RunError> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| RunError::MalformedBody(e.to_string()))
    }
}

impl<X: Transport> FloomClient<X> {
    pub fn with_transport(config: ClientConfig, transport: X) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &X {
        &self.transport
    }

    /// Full URL of the run endpoint.
    pub fn run_url(&self) -> String {
        format!("{}/{API_VERSION}{RUN_PIPELINE_ENDPOINT}", self.config.base_url())
    }

    /// Run a pipeline, keeping JsonObject records as raw JSON.
    pub fn run(&self, invocation: &PipelineInvocation) -> FloomResponse {
        self.run_as(invocation)
    }

    /// Run a pipeline, instantiating JsonObject records into `T`.
    pub fn run_as<T: DeserializeOwned>(&self, invocation: &PipelineInvocation) -> FloomResponse<T> {
        if self.config.verbose_debugging() {
            debug!(
                pipeline_id = invocation.pipeline_id(),
                prompt = invocation.prompt_text(),
                "running pipeline"
            );
        }
        let result = self
            .check_api_key()
            .and_then(|()| self.build_run(invocation))
            .and_then(|request| self.exchange(&request))
            .and_then(|response| self.try_parse_run(response, invocation.shape()));
        self.finish(result)
    }

    /// Build the HTTP request for `invocation` without sending it.
    pub fn build_run(&self, invocation: &PipelineInvocation) -> Result<HttpRequest, RunError> {
        let body = serde_json::to_string(&invocation.to_request()).map_err(RunError::Serialization)?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: self.run_url(),
            headers: vec![
                ("Api-Key".to_string(), self.config.api_key().to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: Some(body),
        })
    }

    /// Interpret a response obtained by executing a `build_run` request.
    pub fn parse_run<T: DeserializeOwned>(
        &self,
        response: HttpResponse,
        shape: Option<&ShapeDescriptor>,
    ) -> FloomResponse<T> {
        self.finish(self.try_parse_run(response, shape))
    }

    /// Run the response dispatch over an already-decoded body, for example one
    /// loaded with `load_response_from_file`.
    pub fn process_body<T: DeserializeOwned>(
        &self,
        body: Value,
        shape: Option<&ShapeDescriptor>,
    ) -> FloomResponse<T> {
        self.finish(dispatch(body, shape))
    }

    fn check_api_key(&self) -> Result<(), RunError> {
        if self.config.missing_required_api_key() {
            return Err(RunError::MissingApiKey {
                url: self.config.base_url().to_string(),
            });
        }
        Ok(())
    }

    fn exchange(&self, request: &HttpRequest) -> Result<HttpResponse, RunError> {
        Ok(self.transport.execute(request)?)
    }

    fn try_parse_run<T: DeserializeOwned>(
        &self,
        response: HttpResponse,
        shape: Option<&ShapeDescriptor>,
    ) -> Result<FloomResponse<T>, RunError> {
        if !response.is_success() {
            return Err(RunError::HttpStatus {
                status: response.status,
                body: response.body,
            });
        }
        let body: Value =
            serde_json::from_str(&response.body).map_err(|e| RunError::MalformedBody(e.to_string()))?;
        if self.config.verbose_debugging() {
            debug!(status = response.status, "received response from Floom API");
        }
        dispatch(body, shape)
    }

    fn finish<T>(&self, result: Result<FloomResponse<T>, RunError>) -> FloomResponse<T> {
        match result {
            Ok(response) => response,
            Err(err) => {
                if self.config.verbose_debugging() {
                    warn!(error = %err, "pipeline run failed");
                }
                FloomResponse::failure(err.into())
            }
        }
    }
}

impl<X> fmt::Debug for FloomClient<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FloomClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Route a decoded body by its `value.type` discriminator.
fn dispatch<T: DeserializeOwned>(
    body: Value,
    shape: Option<&ShapeDescriptor>,
) -> Result<FloomResponse<T>, RunError> {
    let success = body.get("success").and_then(Value::as_bool).unwrap_or(false);
    let Value::Object(mut object) = body else {
        return Err(RunError::MalformedBody("response body is not a JSON object".to_string()));
    };

    if success {
        if let Some(entry) = object.get_mut("value").filter(|entry| entry.is_object()) {
            let data_type = data_type_of(entry)?;
            let format = required_str(entry, "format")?.to_string();
            let raw = entry
                .get_mut("value")
                .map(Value::take)
                .ok_or_else(|| RunError::MalformedBody("response value has no `value` field".to_string()))?;

            let value = match data_type {
                DataType::JsonObject => {
                    let record = shape.map_or(UNSHAPED_RECORD, |shape| shape.schema().name());
                    Payload::Records(instantiate_list(record, parse_stringified(raw)?)?)
                }
                DataType::String | DataType::Image | DataType::Audio => match raw {
                    Value::String(text) => Payload::Text(text),
                    other => Payload::Json(other),
                },
            };
            return Ok(FloomResponse::with_value(ResponseValue {
                data_type,
                format,
                value,
            }));
        }
    }

    FloomResponse::from_body(&Value::Object(object))
}

/// Some servers send JsonObject output as JSON text.
fn parse_stringified(raw: Value) -> Result<Value, RunError> {
    match raw {
        Value::String(text) => serde_json::from_str(&text)
            .map_err(|e| RunError::MalformedBody(format!("JsonObject value is not JSON: {e}"))),
        other => Ok(other),
    }
}

/// Builder for a `FloomClient`.
#[derive(Debug)]
pub struct ClientBuilder<X = UreqTransport> {
    base_url: Option<String>,
    api_key: String,
    verbose_debugging: bool,
    transport: X,
}

impl ClientBuilder<UreqTransport> {
    pub fn new() -> Self {
        Self {
            base_url: None,
            api_key: String::new(),
            verbose_debugging: false,
            transport: UreqTransport::new(),
        }
    }
}

impl Default for ClientBuilder<UreqTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<X: Transport> ClientBuilder<X> {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn verbose_debugging(mut self, verbose: bool) -> Self {
        self.verbose_debugging = verbose;
        self
    }

    /// Replace the transport used to execute requests.
    pub fn transport<Y: Transport>(self, transport: Y) -> ClientBuilder<Y> {
        ClientBuilder {
            base_url: self.base_url,
            api_key: self.api_key,
            verbose_debugging: self.verbose_debugging,
            transport,
        }
    }

    pub fn build(self) -> Result<FloomClient<X>, ConfigError> {
        let base_url = self.base_url.ok_or(ConfigError::MissingBaseUrl)?;
        let config =
            ClientConfig::new(&base_url, &self.api_key).with_verbose_debugging(self.verbose_debugging);
        Ok(FloomClient::with_transport(config, self.transport))
    }
}
