//! Outbound request model for `POST /v1/Pipelines/Run`.
//!
//! `PipelineInvocation` is what callers build; `RunRequest` is the JSON body
//! derived from it, with the response-shape example already rendered.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::shape::{example_for, ShapeDescriptor};

/// JSON body of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub pipeline_id: String,
    pub prompt: String,
    pub variables: BTreeMap<String, String>,
    /// Example of the expected output. Omitted from the body when absent so
    /// the server falls back to plain-string output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<Value>,
}

impl RunRequest {
    pub fn build(
        pipeline_id: impl Into<String>,
        prompt: impl Into<String>,
        variables: Option<BTreeMap<String, String>>,
        response_type_example: Option<Value>,
    ) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            prompt: prompt.into(),
            variables: variables.unwrap_or_default(),
            response_type: response_type_example,
        }
    }
}

/// A single pipeline run as described by the caller.
///
/// Built by value and read through accessors; the client never mutates it.
/// An empty pipeline id is forwarded as-is and left for the server to reject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineInvocation {
    pipeline_id: String,
    prompt: String,
    variables: BTreeMap<String, String>,
    response_shape: Option<ShapeDescriptor>,
}

impl PipelineInvocation {
    pub fn new(pipeline_id: impl Into<String>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            ..Self::default()
        }
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set one variable. A repeated key overwrites the earlier value.
    pub fn variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn variables<K, V>(mut self, variables: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.variables
            .extend(variables.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn response_shape(mut self, shape: ShapeDescriptor) -> Self {
        self.response_shape = Some(shape);
        self
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt
    }

    pub fn variable_map(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn shape(&self) -> Option<&ShapeDescriptor> {
        self.response_shape.as_ref()
    }

    /// Render the wire body, embedding the shape example when a shape is set.
    pub fn to_request(&self) -> RunRequest {
        RunRequest::build(
            self.pipeline_id.clone(),
            self.prompt.clone(),
            Some(self.variables.clone()),
            self.response_shape.as_ref().map(example_for),
        )
    }
}
