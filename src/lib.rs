//! magpack wraps structurally-encoded values in a small self-describing envelope, so a reader can
//! tell what a message is before decoding it.
//!
//! Every envelope starts with an 8-byte header:
//!
//! - A magic marker byte, so envelopes can be told apart from other data
//! - The compression applied to the body
//! - A namespace and schema id, which together identify the value's type
//! - A check byte, catching corrupted headers
//!
//! On top of that, the crate provides:
//!
//! - Body compression with snappy, deflate, gzip, or zstd, with the header left readable
//! - Marshalling of [`Described`] values, whose identity and schema are fixed per type, and
//!   unmarshalling that refuses envelopes carrying a different identity
//! - Resolution of a message whose type is one of several candidates ([`resolve`],
//!   [`Registry`])
//! - Built-in containers for bare strings, integers, bytes, maps, timestamps, and decimals
//! - A JSON fallback: input starting with `{` is decoded as JSON, without a header
//!
//! Bodies are encoded by a [`StructuralCodec`]. The default one, [`MsgPack`], writes MessagePack
//! with named fields and reads its schemas as JSON record descriptors.
//!
//! ```
//! use magpack::{described, marshal, unmarshal, CompressionId, Header, NamespaceId, SchemaId};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Reading {
//!     #[serde(skip)]
//!     header: Header,
//!     sensor: String,
//!     celsius: f64,
//! }
//!
//! described!(Reading {
//!     namespace: NamespaceId(100),
//!     schema: SchemaId::versioned(1, 1),
//!     text: r#"{"type":"record","name":"Reading","fields":[
//!         {"name":"sensor","type":"string"},{"name":"celsius","type":"double"}]}"#,
//! });
//!
//! let mut reading = Reading { sensor: "attic".into(), celsius: 21.5, ..Default::default() };
//! let data = marshal(&mut reading, CompressionId::SNAPPY, None)?;
//!
//! let mut back = Reading::default();
//! unmarshal(&data, &mut back, None)?;
//! assert_eq!(back.sensor, "attic");
//! assert_eq!(back.header.compression(), CompressionId::NONE);
//! # Ok::<(), magpack::Error>(())
//! ```

mod cache;
mod codec;
mod compress;
mod described;
mod encoder;
mod error;
mod header;
mod ids;
mod primitive;
mod protocol;
mod resolve;
mod scan;
mod value;

pub mod format;

pub use cache::SchemaCache;
pub use codec::{FieldDescriptor, MsgPack, SchemaDescriptor, StructuralCodec};
pub use compress::{compress, decompress, decompress_limited, ZSTD_LEVEL};
pub use described::{Described, HeaderSlot};
pub use encoder::{EncoderConfig, MessageEncoder};
pub use error::{BoxError, Error, Result, Stage};
pub use header::{decode_header, encode_header, is_header, Header, HEADER_LEN};
pub use ids::{CompressionId, Field, Identity, NamespaceId, SchemaId};
pub use primitive::{
    marshal_primitive, to_wire_precision, unmarshal_bytes, unmarshal_decimal, unmarshal_int,
    unmarshal_map, unmarshal_primitive, unmarshal_string, unmarshal_timestamp, BasicBytes,
    BasicDecimal, BasicInt, BasicMap, BasicString, BasicTimestamp, Primitive, PrimitiveKind,
    BASIC_BYTES_ID, BASIC_DECIMAL_ID, BASIC_INT_ID, BASIC_MAP_ID, BASIC_STRING_ID,
    BASIC_TIMESTAMP_ID,
};
pub use protocol::{marshal, marshal_with, unmarshal, unmarshal_any, Marshaller};
pub use resolve::{resolve, Candidate, Registry, Schemer};
pub use scan::{scan, HeaderScanner};
pub use value::Value;

/// The first byte of every envelope header.
pub const MARKER: u8 = 0x93;

/// The default limit on a decompressed body, 64 MiB.
pub const MAX_BODY_SIZE: usize = 1usize << 26;
