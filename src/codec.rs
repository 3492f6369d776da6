//! Structural encoding of envelope bodies.
//!
//! The envelope doesn't care how a body is laid out, only that a schema text can be parsed into
//! something the codec understands, and that values round-trip through it. [`MsgPack`] is the
//! codec used unless another one is handed to a [`Marshaller`][crate::Marshaller].

use std::collections::HashSet;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{Error, Result};

/// A schema-driven structural encoder.
pub trait StructuralCodec {
    /// Parsed form of a schema text.
    type Schema: Send + Sync + 'static;

    /// Parse schema text. Failures are [`Error::SchemaInvalid`].
    fn parse(&self, text: &str) -> Result<Self::Schema>;

    /// Encode a value. Failures are [`Error::Marshalling`].
    fn encode<T: Serialize + ?Sized>(&self, schema: &Self::Schema, value: &T) -> Result<Vec<u8>>;

    /// Decode a value. Failures are [`Error::Unmarshalling`].
    fn decode<T: DeserializeOwned>(&self, schema: &Self::Schema, data: &[u8]) -> Result<T>;
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct DescriptorError(String);

fn invalid(msg: impl Into<String>) -> Error {
    Error::SchemaInvalid(Box::new(DescriptorError(msg.into())))
}

/// One field of a record descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// The field's type, kept as-is. It is not interpreted by [`MsgPack`].
    #[serde(rename = "type")]
    pub kind: serde_json::Value,
}

/// A parsed record descriptor.
///
/// The text form is a JSON object:
///
/// ```json
/// { "type": "record", "name": "Person", "namespace": "people",
///   "fields": [ { "name": "name", "type": "string" } ] }
/// ```
///
/// Records must have a non-empty name and at least one field, and field names must be unique.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub fields: Vec<FieldDescriptor>,
}

impl SchemaDescriptor {
    /// Parse and validate a descriptor from its JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        let desc: SchemaDescriptor =
            serde_json::from_str(text).map_err(|e| Error::SchemaInvalid(Box::new(e)))?;
        if desc.kind != "record" {
            return Err(invalid(format!(
                "schema type should be \"record\", got \"{}\"",
                desc.kind
            )));
        }
        if desc.name.is_empty() {
            return Err(invalid("record name is empty"));
        }
        if desc.fields.is_empty() {
            return Err(invalid(format!("record {} has no fields", desc.name)));
        }
        let mut seen = HashSet::new();
        for field in desc.fields.iter() {
            if field.name.is_empty() {
                return Err(invalid(format!("record {} has an unnamed field", desc.name)));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!(
                    "record {} repeats field \"{}\"",
                    desc.name, field.name
                )));
            }
        }
        Ok(desc)
    }

    /// The fully qualified name, `namespace.name` when a namespace is present.
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{}.{}", ns, self.name),
            _ => self.name.clone(),
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

/// MessagePack bodies, with struct fields written by name.
#[derive(Clone, Copy, Debug, Default)]
pub struct MsgPack;

impl StructuralCodec for MsgPack {
    type Schema = SchemaDescriptor;

    fn parse(&self, text: &str) -> Result<SchemaDescriptor> {
        SchemaDescriptor::parse(text)
    }

    fn encode<T: Serialize + ?Sized>(&self, schema: &SchemaDescriptor, value: &T) -> Result<Vec<u8>> {
        let body = rmp_serde::to_vec_named(value).map_err(|e| Error::Marshalling(Box::new(e)))?;
        tracing::trace!(record = %schema.full_name(), len = body.len(), "encoded body");
        Ok(body)
    }

    fn decode<T: DeserializeOwned>(&self, schema: &SchemaDescriptor, data: &[u8]) -> Result<T> {
        tracing::trace!(record = %schema.full_name(), len = data.len(), "decoding body");
        rmp_serde::from_slice(data).map_err(|e| Error::Unmarshalling(Box::new(e)))
    }
}
