//! Synchronous client SDK for the Floom pipeline API.
//!
//! # Overview
//! A run is one `POST /v1/Pipelines/Run`: the client builds the JSON payload
//! from a `PipelineInvocation`, sends it through a `Transport`, and decodes
//! the reply into a `FloomResponse`. Pipelines that produce JSON objects can
//! be given a `ShapeDescriptor`. An example of that shape is sent to the
//! server as a hint, and the returned objects are instantiated into the
//! caller's `Record` type.
//!
//! # Design
//! - `FloomClient` holds immutable configuration only and is safe to share.
//! - `run` never returns `Err`: failures come back as a `FloomResponse` with
//!   `success == false` and a `FloomError`.
//! - `build_run` / `parse_run` expose the I/O boundary for hosts that want
//!   to execute the HTTP exchange themselves.
//! - Logging goes through `tracing` and only when `verbose_debugging` is on.
//!
//! ```no_run
//! use floom_core::{FloomClient, PipelineInvocation};
//!
//! let client = FloomClient::new("http://localhost:4050", "my-api-key");
//! let response = client.run(&PipelineInvocation::new("docs-pipeline").prompt("How do I reset the oil alert?"));
//! match &response.error {
//!     Some(error) => eprintln!("run failed: {error}"),
//!     None => println!("{:?}", response.first_value().and_then(|value| value.as_text())),
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod response;
pub mod shape;

pub use client::{ClientBuilder, FloomClient};
pub use config::ClientConfig;
pub use error::{ConfigError, RunError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError, UreqTransport};
pub use request::{PipelineInvocation, RunRequest};
pub use response::{DataType, FloomError, FloomResponse, Payload, ResponseValue};
pub use shape::{
    example_for, instantiate, FieldKind, Instance, Instantiated, Record, RecordSchema, ReflectError,
    ShapeDescriptor,
};
