//! Response-shape descriptors for JsonObject pipelines.
//!
//! # Design
//! A caller describes the record it expects back with a `RecordSchema`: the
//! record's name plus its fields in declaration order, each tagged with a
//! `FieldKind`. The schema drives two operations that must stay symmetric:
//!
//! - `example_for` renders a placeholder JSON value that is sent to the server
//!   as a hint for the output shape.
//! - `instantiate` turns the JSON the server sends back into instances of the
//!   caller's type through serde.
//!
//! "List of T" versus "T" is a `ShapeDescriptor` variant, and only one level
//! of list nesting is modelled.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Declared kind of a single record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
    String,
    /// Any other declared type, carried by name so the example can say what
    /// it could not render.
    Other(String),
}

impl FieldKind {
    /// Placeholder value used for this field in a shape example.
    fn placeholder(&self, field: &str) -> Value {
        match self {
            FieldKind::Integer | FieldKind::Float => Value::from(0),
            FieldKind::String => Value::String(format!("{field}.example")),
            FieldKind::Other(type_name) => Value::String(format!("Unsupported type ({type_name})")),
        }
    }
}

/// Ordered field list describing one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    name: String,
    fields: Vec<(String, FieldKind)>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declare a field. Redeclaring a name replaces its kind but keeps the
    /// original position.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = kind,
            None => self.fields.push((name, kind)),
        }
        self
    }

    pub fn integer(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Integer)
    }

    pub fn float(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Float)
    }

    pub fn string(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::String)
    }

    pub fn other(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Other(type_name.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), kind))
    }
}

/// A type that can be requested as the output of a JsonObject pipeline.
///
/// `schema` must list the same fields the type's `Deserialize` impl accepts;
/// the example sent to the server is built from it.
pub trait Record: DeserializeOwned {
    fn schema() -> RecordSchema;
}

/// Expected output shape: one record, or a list of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeDescriptor {
    Single(RecordSchema),
    ListOf(RecordSchema),
}

impl ShapeDescriptor {
    pub fn of<T: Record>() -> Self {
        ShapeDescriptor::Single(T::schema())
    }

    pub fn list_of<T: Record>() -> Self {
        ShapeDescriptor::ListOf(T::schema())
    }

    pub fn schema(&self) -> &RecordSchema {
        match self {
            ShapeDescriptor::Single(schema) | ShapeDescriptor::ListOf(schema) => schema,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ShapeDescriptor::ListOf(_))
    }
}

/// Render the placeholder example for `shape`.
///
/// Records become objects keyed by field name in declaration order; a list
/// shape becomes a one-element array around its record's example.
pub fn example_for(shape: &ShapeDescriptor) -> Value {
    match shape {
        ShapeDescriptor::Single(schema) => example_for_record(schema),
        ShapeDescriptor::ListOf(schema) => Value::Array(vec![example_for_record(schema)]),
    }
}

fn example_for_record(schema: &RecordSchema) -> Value {
    let object: Map<String, Value> = schema
        .fields()
        .map(|(name, kind)| (name.to_string(), kind.placeholder(name)))
        .collect();
    Value::Object(object)
}

/// One element produced by instantiation.
///
/// JSON objects become `Record`. Anything else the server put where a record
/// was expected is handed back untouched as `Raw`.
#[derive(Debug, Clone, PartialEq)]
pub enum Instance<T> {
    Record(T),
    Raw(Value),
}

impl<T> Instance<T> {
    pub fn as_record(&self) -> Option<&T> {
        match self {
            Instance::Record(record) => Some(record),
            Instance::Raw(_) => None,
        }
    }

    pub fn into_record(self) -> Option<T> {
        match self {
            Instance::Record(record) => Some(record),
            Instance::Raw(_) => None,
        }
    }
}

/// Result of `instantiate`, mirroring the shape it was asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Instantiated<T> {
    One(Instance<T>),
    Many(Vec<Instance<T>>),
}

impl<T> Instantiated<T> {
    /// Flatten into a sequence; `One` yields a single element.
    pub fn into_vec(self) -> Vec<Instance<T>> {
        match self {
            Instantiated::One(instance) => vec![instance],
            Instantiated::Many(instances) => instances,
        }
    }
}

/// Errors raised while turning raw JSON into caller records.
#[derive(Debug, Error)]
pub enum ReflectError {
    /// The raw value's structure does not fit the requested shape.
    #[error("shape mismatch for `{record}`: expected {expected}, found {found}")]
    ShapeMismatch {
        record: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The record type rejected the object (unknown or missing fields, wrong
    /// field types).
    #[error("could not construct `{record}`: {source}")]
    Construct {
        record: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convert `raw` into instances of `T` according to `shape`.
pub fn instantiate<T: DeserializeOwned>(
    shape: &ShapeDescriptor,
    raw: Value,
) -> Result<Instantiated<T>, ReflectError> {
    match shape {
        ShapeDescriptor::Single(schema) => {
            instantiate_record(schema.name(), raw).map(Instantiated::One)
        }
        ShapeDescriptor::ListOf(schema) => {
            instantiate_list(schema.name(), raw).map(Instantiated::Many)
        }
    }
}

/// Map `raw` element-wise into records named `record`. `raw` must be an array.
pub(crate) fn instantiate_list<T: DeserializeOwned>(
    record: &str,
    raw: Value,
) -> Result<Vec<Instance<T>>, ReflectError> {
    match raw {
        Value::Array(items) => items
            .into_iter()
            .map(|item| instantiate_record(record, item))
            .collect(),
        other => Err(ReflectError::ShapeMismatch {
            record: record.to_string(),
            expected: "array",
            found: json_kind(&other),
        }),
    }
}

fn instantiate_record<T: DeserializeOwned>(
    record: &str,
    raw: Value,
) -> Result<Instance<T>, ReflectError> {
    if !raw.is_object() {
        return Ok(Instance::Raw(raw));
    }
    serde_json::from_value(raw)
        .map(Instance::Record)
        .map_err(|source| ReflectError::Construct {
            record: record.to_string(),
            source,
        })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
