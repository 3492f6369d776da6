//! Built-in containers for bare values.
//!
//! Each primitive kind has a fixed identity in the built-in namespace, so a bare string or integer
//! can be sent as an envelope without defining a record type for it.

use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::codec::StructuralCodec;
use crate::described::Described;
use crate::error::{Error, Result};
use crate::header::{Header, HEADER_LEN};
use crate::ids::{CompressionId, NamespaceId, SchemaId};
use crate::protocol::Marshaller;
use crate::value::Value;

pub const BASIC_STRING_ID: SchemaId = SchemaId::versioned(1, 1);
pub const BASIC_INT_ID: SchemaId = SchemaId::versioned(2, 1);
pub const BASIC_BYTES_ID: SchemaId = SchemaId::versioned(3, 1);
pub const BASIC_MAP_ID: SchemaId = SchemaId::versioned(4, 1);
pub const BASIC_TIMESTAMP_ID: SchemaId = SchemaId::versioned(5, 1);
pub const BASIC_DECIMAL_ID: SchemaId = SchemaId::versioned(6, 1);

/// The kinds of value with a built-in container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Int,
    Bytes,
    Map,
    Timestamp,
    Decimal,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 6] = [
        PrimitiveKind::String,
        PrimitiveKind::Int,
        PrimitiveKind::Bytes,
        PrimitiveKind::Map,
        PrimitiveKind::Timestamp,
        PrimitiveKind::Decimal,
    ];

    /// Schema id of the kind's container.
    pub fn schema(self) -> SchemaId {
        match self {
            PrimitiveKind::String => BASIC_STRING_ID,
            PrimitiveKind::Int => BASIC_INT_ID,
            PrimitiveKind::Bytes => BASIC_BYTES_ID,
            PrimitiveKind::Map => BASIC_MAP_ID,
            PrimitiveKind::Timestamp => BASIC_TIMESTAMP_ID,
            PrimitiveKind::Decimal => BASIC_DECIMAL_ID,
        }
    }

    pub fn from_schema(schema: SchemaId) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.schema() == schema)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Bytes => "bytes",
            PrimitiveKind::Map => "map",
            PrimitiveKind::Timestamp => "timestamp",
            PrimitiveKind::Decimal => "decimal",
        })
    }
}

/// Truncate a timestamp to the millisecond precision it has on the wire.
pub fn to_wire_precision(time: DateTime<Utc>) -> DateTime<Utc> {
    time.trunc_subsecs(3)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicString {
    #[serde(skip)]
    pub header: Header,
    pub value: String,
}

crate::described!(BasicString {
    namespace: NamespaceId::BUILTIN,
    schema: BASIC_STRING_ID,
    text: r#"{"type":"record","name":"BasicString","namespace":"magpack.basic","fields":[{"name":"value","type":"string"}]}"#,
});

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicInt {
    #[serde(skip)]
    pub header: Header,
    pub value: i64,
}

crate::described!(BasicInt {
    namespace: NamespaceId::BUILTIN,
    schema: BASIC_INT_ID,
    text: r#"{"type":"record","name":"BasicInt","namespace":"magpack.basic","fields":[{"name":"value","type":"long"}]}"#,
});

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicBytes {
    #[serde(skip)]
    pub header: Header,
    #[serde(with = "serde_bytes")]
    pub value: Vec<u8>,
}

crate::described!(BasicBytes {
    namespace: NamespaceId::BUILTIN,
    schema: BASIC_BYTES_ID,
    text: r#"{"type":"record","name":"BasicBytes","namespace":"magpack.basic","fields":[{"name":"value","type":"bytes"}]}"#,
});

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicMap {
    #[serde(skip)]
    pub header: Header,
    pub value: BTreeMap<String, Value>,
}

crate::described!(BasicMap {
    namespace: NamespaceId::BUILTIN,
    schema: BASIC_MAP_ID,
    text: r#"{"type":"record","name":"BasicMap","namespace":"magpack.basic","fields":[{"name":"value","type":{"type":"map","values":"any"}}]}"#,
});

/// A timestamp, carried as milliseconds since the Unix epoch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicTimestamp {
    #[serde(skip)]
    pub header: Header,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub value: DateTime<Utc>,
}

crate::described!(BasicTimestamp {
    namespace: NamespaceId::BUILTIN,
    schema: BASIC_TIMESTAMP_ID,
    text: r#"{"type":"record","name":"BasicTimestamp","namespace":"magpack.basic","fields":[{"name":"value","type":{"type":"long","logicalType":"timestamp-millis"}}]}"#,
});

/// An arbitrary-precision decimal, carried as its string form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicDecimal {
    #[serde(skip)]
    pub header: Header,
    pub value: Decimal,
}

crate::described!(BasicDecimal {
    namespace: NamespaceId::BUILTIN,
    schema: BASIC_DECIMAL_ID,
    text: r#"{"type":"record","name":"BasicDecimal","namespace":"magpack.basic","fields":[{"name":"value","type":"string"}]}"#,
});

/// A bare value with a built-in container.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    String(String),
    Int(i64),
    Bytes(Vec<u8>),
    Map(BTreeMap<String, Value>),
    Timestamp(DateTime<Utc>),
    Decimal(Decimal),
}

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::String(_) => PrimitiveKind::String,
            Primitive::Int(_) => PrimitiveKind::Int,
            Primitive::Bytes(_) => PrimitiveKind::Bytes,
            Primitive::Map(_) => PrimitiveKind::Map,
            Primitive::Timestamp(_) => PrimitiveKind::Timestamp,
            Primitive::Decimal(_) => PrimitiveKind::Decimal,
        }
    }
}

macro_rules! impl_primitive_from {
    ($t: ty, $p: ident) => {
        impl From<$t> for Primitive {
            fn from(v: $t) -> Self {
                Primitive::$p(v)
            }
        }

        impl<'a> From<&'a $t> for Primitive {
            fn from(v: &$t) -> Self {
                Primitive::$p(v.clone())
            }
        }
    };
}

impl_primitive_from!(String, String);
impl_primitive_from!(i64, Int);
impl_primitive_from!(Vec<u8>, Bytes);
impl_primitive_from!(BTreeMap<String, Value>, Map);
impl_primitive_from!(DateTime<Utc>, Timestamp);
impl_primitive_from!(Decimal, Decimal);

impl<'a> From<&'a str> for Primitive {
    fn from(v: &str) -> Self {
        Primitive::String(v.to_string())
    }
}

impl<'a> From<&'a [u8]> for Primitive {
    fn from(v: &[u8]) -> Self {
        Primitive::Bytes(v.to_vec())
    }
}

impl From<i32> for Primitive {
    fn from(v: i32) -> Self {
        Primitive::Int(v.into())
    }
}

impl TryFrom<Value> for Primitive {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self> {
        match v {
            Value::Str(v) => Ok(Primitive::String(v)),
            Value::Int(v) => Ok(Primitive::Int(v)),
            Value::Bin(v) => Ok(Primitive::Bytes(v)),
            Value::Map(v) => Ok(Primitive::Map(v)),
            other => Err(Error::UnsupportedType(other.kind_name())),
        }
    }
}

impl<'a> From<&'a Primitive> for Primitive {
    fn from(v: &Primitive) -> Self {
        v.clone()
    }
}

impl<C: StructuralCodec> Marshaller<C> {
    /// Wrap a bare value in its built-in container and marshal it.
    pub fn marshal_primitive(
        &self,
        value: impl Into<Primitive>,
        compression: CompressionId,
    ) -> Result<Vec<u8>> {
        match value.into() {
            Primitive::String(value) => {
                self.marshal(&mut BasicString { value, ..Default::default() }, compression, None)
            }
            Primitive::Int(value) => {
                self.marshal(&mut BasicInt { value, ..Default::default() }, compression, None)
            }
            Primitive::Bytes(value) => {
                self.marshal(&mut BasicBytes { value, ..Default::default() }, compression, None)
            }
            Primitive::Map(value) => {
                self.marshal(&mut BasicMap { value, ..Default::default() }, compression, None)
            }
            Primitive::Timestamp(value) => {
                self.marshal(&mut BasicTimestamp { value, ..Default::default() }, compression, None)
            }
            Primitive::Decimal(value) => {
                self.marshal(&mut BasicDecimal { value, ..Default::default() }, compression, None)
            }
        }
    }

    /// Unmarshal a built-in container and unwrap its value.
    ///
    /// Returns `None` for empty input.
    pub fn unmarshal_primitive(&self, data: &[u8]) -> Result<Option<Primitive>> {
        if data.is_empty() {
            return Ok(None);
        }
        if data.len() < HEADER_LEN {
            return Err(Error::NotAnEnvelope(data.len()));
        }
        let header = Header::parse(&data[..HEADER_LEN])?;
        if header.namespace() != NamespaceId::BUILTIN {
            return Err(Error::NotBuiltinNamespace(header.namespace()));
        }
        let kind =
            PrimitiveKind::from_schema(header.schema()).ok_or(Error::NoBasicSchema(header.schema()))?;
        tracing::debug!(%kind, "unmarshalling primitive");

        let value = match kind {
            PrimitiveKind::String => Primitive::String(self.unwrap_basic::<BasicString>(data, kind)?.value),
            PrimitiveKind::Int => Primitive::Int(self.unwrap_basic::<BasicInt>(data, kind)?.value),
            PrimitiveKind::Bytes => Primitive::Bytes(self.unwrap_basic::<BasicBytes>(data, kind)?.value),
            PrimitiveKind::Map => Primitive::Map(self.unwrap_basic::<BasicMap>(data, kind)?.value),
            PrimitiveKind::Timestamp => {
                Primitive::Timestamp(self.unwrap_basic::<BasicTimestamp>(data, kind)?.value)
            }
            PrimitiveKind::Decimal => {
                Primitive::Decimal(self.unwrap_basic::<BasicDecimal>(data, kind)?.value)
            }
        };
        Ok(Some(value))
    }

    fn unwrap_basic<T: Described + Default>(&self, data: &[u8], kind: PrimitiveKind) -> Result<T> {
        let mut dst = T::default();
        self.unmarshal(data, &mut dst, None).map_err(|e| match e {
            Error::WrongNamespace { .. } | Error::WrongSchema { .. } => Error::NotBasic(kind),
            e => e,
        })?;
        Ok(dst)
    }
}

/// Wrap a bare value in its built-in container and marshal it with the default codec.
pub fn marshal_primitive(value: impl Into<Primitive>, compression: CompressionId) -> Result<Vec<u8>> {
    Marshaller::new().marshal_primitive(value, compression)
}

/// Unmarshal a built-in container with the default codec and unwrap its value.
pub fn unmarshal_primitive(data: &[u8]) -> Result<Option<Primitive>> {
    Marshaller::new().unmarshal_primitive(data)
}

macro_rules! typed_unmarshal {
    ($(#[$doc:meta])* $name: ident, $t: ty, $p: ident) => {
        $(#[$doc])*
        pub fn $name(data: &[u8]) -> Result<$t> {
            match unmarshal_primitive(data)? {
                Some(Primitive::$p(v)) => Ok(v),
                _ => Err(Error::NotBasic(PrimitiveKind::$p)),
            }
        }
    };
}

typed_unmarshal!(
    /// Unmarshal a built-in string. Any other kind, or empty input, fails.
    unmarshal_string, String, String
);
typed_unmarshal!(
    /// Unmarshal a built-in integer. Any other kind, or empty input, fails.
    unmarshal_int, i64, Int
);
typed_unmarshal!(unmarshal_bytes, Vec<u8>, Bytes);
typed_unmarshal!(unmarshal_map, BTreeMap<String, Value>, Map);
typed_unmarshal!(unmarshal_timestamp, DateTime<Utc>, Timestamp);
typed_unmarshal!(unmarshal_decimal, Decimal, Decimal);
