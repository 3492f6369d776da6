//! Identifiers carried by the envelope header.
//!
//! All three identifiers are plain newtypes over `u32` so that out-of-range values can be
//! represented and rejected by [`encode_header`][crate::encode_header], rather than silently
//! truncated. Each one can also be built from a signed integer through `TryFrom<i64>`, which
//! fails for negative values and for values past the field's maximum.

use std::{convert::TryFrom, fmt, str::FromStr};

use serde::{
    de::{Deserializer, Error as DeError, Unexpected, Visitor},
    Deserialize, Serialize, Serializer,
};

use crate::error::{Error, Result};

/// Which header field a range failure refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Namespace,
    Schema,
    Compression,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Field::Namespace => "namespace",
            Field::Schema => "schema",
            Field::Compression => "compression",
        })
    }
}

/// An isolated id-space for schema identifiers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceId(pub u32);

impl NamespaceId {
    /// Not registered anywhere; the schema is private to the producer.
    pub const PRIVATE: NamespaceId = NamespaceId(0);
    /// The built-in primitive containers.
    pub const BUILTIN: NamespaceId = NamespaceId(1);
    pub const RESERVED_1: NamespaceId = NamespaceId(2);
    pub const RESERVED_2: NamespaceId = NamespaceId(3);
    pub const RESERVED_3: NamespaceId = NamespaceId(4);
    /// Largest namespace that fits the header's 16-bit field.
    pub const MAX: NamespaceId = NamespaceId(0xFFFF);

    /// True for namespaces 2 through 4, which are held back for later use.
    pub fn is_reserved(self) -> bool {
        (Self::RESERVED_1.0..=Self::RESERVED_3.0).contains(&self.0)
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A structural schema within a namespace, with its version packed into the low 8 bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(pub u32);

impl SchemaId {
    /// Schema 0 is "undefined", though it may still belong to a namespace.
    pub const UNDEFINED: SchemaId = SchemaId(0);
    /// Largest schema id that fits the header's 24-bit field.
    pub const MAX: SchemaId = SchemaId(0xFF_FFFF);

    /// Pack a schema number and its version into one id.
    pub const fn versioned(number: u16, version: u8) -> SchemaId {
        SchemaId(((number as u32) << 8) | version as u32)
    }

    /// The schema number, without the version.
    pub fn number(self) -> u32 {
        self.0 >> 8
    }

    /// The version packed into the low byte.
    pub fn version(self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}v{}", self.number(), self.version())
    }
}

/// The compression algorithm applied to the body following the header.
///
/// Any value up to [`CompressionId::MAX`] can be carried by a header, but only the named
/// constants can actually be compressed or decompressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompressionId(pub u32);

impl CompressionId {
    pub const NONE: CompressionId = CompressionId(0);
    /// Snappy, raw block format.
    pub const SNAPPY: CompressionId = CompressionId(1);
    /// Raw DEFLATE stream, default level.
    pub const DEFLATE: CompressionId = CompressionId(2);
    /// Gzip, default level.
    pub const GZIP: CompressionId = CompressionId(3);
    /// Zstandard, magicless single frame.
    pub const ZSTD: CompressionId = CompressionId(4);
    /// Largest id that fits the header's 8-bit field.
    pub const MAX: CompressionId = CompressionId(0xFF);

    const NAMES: [(&'static str, CompressionId); 5] = [
        ("none", Self::NONE),
        ("snappy", Self::SNAPPY),
        ("deflate", Self::DEFLATE),
        ("gzip", Self::GZIP),
        ("zstd", Self::ZSTD),
    ];

    /// The algorithm's name, if this crate knows it.
    pub fn name(self) -> Option<&'static str> {
        Self::NAMES.iter().find(|(_, id)| *id == self).map(|(n, _)| *n)
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl fmt::Display for CompressionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "#{}", self.0),
        }
    }
}

impl FromStr for CompressionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        if let Some((_, id)) = Self::NAMES.iter().find(|(n, _)| *n == lower) {
            return Ok(*id);
        }
        let raw: i64 = lower
            .parse()
            .map_err(|_| Error::Config(format!("unknown compression \"{}\"", s)))?;
        CompressionId::try_from(raw)
    }
}

impl Serialize for CompressionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.name() {
            Some(name) if serializer.is_human_readable() => serializer.serialize_str(name),
            _ => serializer.serialize_u32(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for CompressionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CompressionVisitor;

        impl<'de> Visitor<'de> for CompressionVisitor {
            type Value = CompressionId;

            fn expecting(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                fmt.write_str("a compression name or an id between 0 and 255")
            }

            fn visit_i64<E: DeError>(self, v: i64) -> std::result::Result<Self::Value, E> {
                CompressionId::try_from(v)
                    .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
            }

            fn visit_u64<E: DeError>(self, v: u64) -> std::result::Result<Self::Value, E> {
                match u32::try_from(v) {
                    Ok(v) if v <= CompressionId::MAX.0 => Ok(CompressionId(v)),
                    _ => Err(E::invalid_value(Unexpected::Unsigned(v), &self)),
                }
            }

            fn visit_str<E: DeError>(self, v: &str) -> std::result::Result<Self::Value, E> {
                v.parse()
                    .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(CompressionVisitor)
    }
}

macro_rules! impl_id_try_from_signed {
    ($t: ident, $field: expr) => {
        impl TryFrom<i64> for $t {
            type Error = Error;
            fn try_from(v: i64) -> Result<Self> {
                if v < 0 || v > $t::MAX.0 as i64 {
                    Err(Error::OutOfRange {
                        field: $field,
                        value: v,
                        max: $t::MAX.0,
                    })
                } else {
                    Ok($t(v as u32))
                }
            }
        }
    };
}

impl_id_try_from_signed!(NamespaceId, Field::Namespace);
impl_id_try_from_signed!(SchemaId, Field::Schema);
impl_id_try_from_signed!(CompressionId, Field::Compression);

/// The (namespace, schema) pair that identifies a payload type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub namespace: NamespaceId,
    pub schema: SchemaId,
}

impl Identity {
    pub const fn new(namespace: NamespaceId, schema: SchemaId) -> Self {
        Self { namespace, schema }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "namespace {} / schema {}", self.namespace, self.schema)
    }
}
