//! Pipeline runs against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port in a background thread
//! and drives `FloomClient` with its default ureq transport, so request
//! building, the HTTP exchange and response dispatch are all exercised
//! end-to-end.

use floom_core::{
    DataType, FloomClient, FloomError, Payload, PipelineInvocation, Record, RecordSchema, ShapeDescriptor,
};
use floom_mock_server::{MockState, Shared};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct Poem {
    title: String,
    lines: u32,
}

impl Record for Poem {
    fn schema() -> RecordSchema {
        RecordSchema::new("Poem").string("title").integer("lines")
    }
}

/// Start the mock server and return its base URL plus its shared state.
fn spawn_server(api_key: Option<&str>) -> (String, Shared) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let state = MockState::new(api_key);
    let server_state = state.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            floom_mock_server::serve(listener, server_state).await
        })
        .unwrap();
    });

    (format!("http://{addr}"), state)
}

#[test]
fn echo_pipeline_returns_text() {
    let (url, state) = spawn_server(Some("secret"));
    let client = FloomClient::new(&url, "secret");

    let response = client.run(
        &PipelineInvocation::new("echo")
            .prompt("How do I reset the oil alert?")
            .variable("model", "small"),
    );

    assert!(response.is_success(), "unexpected error: {:?}", response.error);
    let value = response.first_value().unwrap();
    assert_eq!(value.data_type, DataType::String);
    assert_eq!(value.format, "text");
    assert_eq!(value.as_text(), Some("How do I reset the oil alert?"));

    let runs = state.runs_blocking();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].api_key.as_deref(), Some("secret"));
    assert_eq!(runs[0].request.pipeline_id, "echo");
    assert_eq!(runs[0].request.variables.get("model").map(String::as_str), Some("small"));
    assert!(runs[0].request.response_type.is_none());
}

#[test]
fn image_pipeline_returns_encoded_payload() {
    let (url, state) = spawn_server(None);
    let response = FloomClient::new(&url, "").run(&PipelineInvocation::new("image"));

    let value = response.first_value().unwrap();
    assert_eq!(value.data_type, DataType::Image);
    assert_eq!(value.format, "png");
    assert_eq!(value.as_text(), Some("iVBORw0KGgo="));

    // An empty key is still sent as a header.
    assert_eq!(state.runs_blocking()[0].api_key.as_deref(), Some(""));
}

#[test]
fn json_pipeline_instantiates_list_shape() {
    let (url, state) = spawn_server(None);
    let client = FloomClient::new(&url, "");

    let response = client.run_as::<Poem>(
        &PipelineInvocation::new("json")
            .variable("title", "Ode to Rust")
            .response_shape(ShapeDescriptor::list_of::<Poem>()),
    );

    assert!(response.is_success(), "unexpected error: {:?}", response.error);
    let poems: Vec<&Poem> = response.values[0].records().collect();
    assert_eq!(
        poems,
        vec![&Poem {
            title: "Ode to Rust".to_string(),
            lines: 0
        }]
    );

    let sent = state.runs_blocking()[0].request.response_type.clone().unwrap();
    assert_eq!(sent, serde_json::json!([{"title": "title.example", "lines": 0}]));
}

#[test]
fn json_pipeline_single_shape_arrives_as_one_element_array() {
    let (url, _state) = spawn_server(None);
    let response = FloomClient::new(&url, "")
        .run_as::<Poem>(&PipelineInvocation::new("json").response_shape(ShapeDescriptor::of::<Poem>()));

    match &response.values[0].value {
        Payload::Records(records) => assert_eq!(records.len(), 1),
        other => panic!("expected records, got {other:?}"),
    }
}

#[test]
fn bare_object_reply_is_reported_as_error() {
    let (url, _state) = spawn_server(None);
    let response = FloomClient::new(&url, "")
        .run_as::<Poem>(&PipelineInvocation::new("bare-json").response_shape(ShapeDescriptor::of::<Poem>()));

    assert!(!response.success);
    assert_eq!(response.error.unwrap().status, Some(500));
}

#[test]
fn wrong_api_key_returns_problem_details() {
    let (url, _state) = spawn_server(Some("secret"));
    let response = FloomClient::new(&url, "guess").run(&PipelineInvocation::new("echo"));

    assert!(!response.success);
    assert!(response.values.is_empty());
    assert_eq!(
        response.error,
        Some(FloomError::new(401, "Unauthorized", "The provided API key is invalid."))
    );
}

#[test]
fn unknown_pipeline_returns_404() {
    let (url, _state) = spawn_server(None);
    let error = FloomClient::new(&url, "")
        .run(&PipelineInvocation::new("missing"))
        .error
        .unwrap();

    assert_eq!(error.status, Some(404));
    assert_eq!(error.detail.as_deref(), Some("Pipeline 'missing' was not found."));
}

#[test]
fn plain_text_server_error_uses_generic_title() {
    let (url, _state) = spawn_server(None);
    let error = FloomClient::new(&url, "")
        .run(&PipelineInvocation::new("crash"))
        .error
        .unwrap();

    assert_eq!(
        error,
        FloomError::new(500, "HTTP Error", "HTTP 500: pipeline worker crashed")
    );
}

#[test]
fn refused_run_is_decoded_generically() {
    let (url, _state) = spawn_server(None);
    let response = FloomClient::new(&url, "").run(&PipelineInvocation::new("refuse"));

    assert!(!response.success);
    assert_eq!(
        response.error,
        Some(FloomError::new(422, "Unprocessable Entity", "The pipeline refused the prompt."))
    );
}

#[test]
fn unreachable_server_returns_503() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let response = FloomClient::new(&format!("http://{addr}"), "").run(&PipelineInvocation::new("echo"));

    assert!(!response.success);
    let error = response.error.unwrap();
    assert_eq!(error.status, Some(503));
    assert_eq!(error.title.as_deref(), Some("Service Unavailable"));
}

#[test]
fn client_is_shareable_across_threads() {
    let (url, state) = spawn_server(None);
    let client = std::sync::Arc::new(FloomClient::new(&url, ""));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let client = client.clone();
            std::thread::spawn(move || {
                client
                    .run(&PipelineInvocation::new("echo").prompt(format!("call {i}")))
                    .first_value()
                    .and_then(|value| value.as_text().map(str::to_string))
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), Some(format!("call {i}")));
    }
    assert_eq!(state.runs_blocking().len(), 4);
}
