//! Mapping between statically described types and JSON Schema documents,
//! used to drive structured output.

pub mod codec;
pub mod descriptor;

pub use codec::{
    JsonSchema, SchemaError, build_schema, build_schema_for, parse, parse_from_value, parse_value,
    render,
};
pub use descriptor::{Described, FieldDescriptor, RecordDescriptor, TemporalKind, TypeDescriptor};
