use std::{fmt, io};

use crate::ids::{CompressionId, Field, Identity, NamespaceId, SchemaId};
use crate::primitive::PrimitiveKind;
use crate::MARKER;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed cause from the structural codec.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stage of a streaming compressor at which an I/O failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Write,
    Close,
    Read,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Stage::Write => "write",
            Stage::Close => "close",
            Stage::Read => "read",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Header slice was not exactly the header length.
    #[error("header should be exactly {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    /// First byte of the header was not the marker.
    #[error("header should start with magic marker 0x{marker:02x}, got 0x{0:02x}", marker = MARKER)]
    Marker(u8),
    /// The check byte didn't match the one computed over the header fields.
    #[error("header integrity check failed: stored 0x{stored:02x}, computed 0x{computed:02x}")]
    Integrity { stored: u8, computed: u8 },
    /// Data was neither an envelope nor the textual fallback format.
    #[error("message format was not detected")]
    FormatNotDetected,
    /// Data too short to even hold a header.
    #[error("data of {0} bytes is too short to be an envelope")]
    NotAnEnvelope(usize),
    /// A header field was outside what the wire format can carry.
    #[error("{field} must be between 0 and {max}, got {value}")]
    OutOfRange { field: Field, value: i64, max: u32 },
    /// The compression id is valid on the wire, but no algorithm is known for it.
    #[error("compression type {0} is unsupported")]
    UnsupportedCompression(CompressionId),
    /// The compression asked for is not the one the header names.
    #[error("header says compression {header}, but {requested} was requested")]
    CompressionMismatch {
        header: CompressionId,
        requested: CompressionId,
    },
    /// The algorithm rejected the compressed body.
    #[error("can not decompress {algorithm} body: {detail}")]
    Decompress {
        algorithm: &'static str,
        detail: String,
    },
    /// A streaming compressor failed while writing, closing, or reading.
    #[error("{stage} {algorithm} error")]
    CompressionIo {
        algorithm: &'static str,
        stage: Stage,
        #[source]
        source: io::Error,
    },
    /// Decompressed body would exceed the allowed maximum.
    #[error("data too long: was {actual} bytes, maximum allowed is {max}")]
    LengthTooLong { max: usize, actual: usize },
    /// The schema descriptor text failed to parse.
    #[error("schema is invalid")]
    SchemaInvalid(#[source] BoxError),
    /// The structural encoder failed.
    #[error("marshalling failed")]
    Marshalling(#[source] BoxError),
    /// The structural decoder failed.
    #[error("unmarshalling failed")]
    Unmarshalling(#[source] BoxError),
    /// The textual fallback format failed to decode.
    #[error("textual fallback decoding failed")]
    Text(#[from] serde_json::Error),
    #[error("namespace {actual} in header does not fit the destination's namespace {expected}")]
    WrongNamespace {
        expected: NamespaceId,
        actual: NamespaceId,
    },
    #[error("schema {actual} in header does not fit the destination's schema {expected}")]
    WrongSchema { expected: SchemaId, actual: SchemaId },
    /// The matching candidate has nowhere to decode into.
    #[error("candidate for {0} has no destination to decode into")]
    NoReferenceDestination(Identity),
    /// No candidate matched the decoded identity.
    #[error("no candidate found for {0}")]
    SchemerNotFound(Identity),
    #[error("namespace {0} is not the built-in namespace")]
    NotBuiltinNamespace(NamespaceId),
    #[error("schema {0} is not a built-in schema")]
    NoBasicSchema(SchemaId),
    /// The payload wasn't the expected built-in kind.
    #[error("no basic {0}")]
    NotBasic(PrimitiveKind),
    /// The dynamic value has no built-in container.
    #[error("unsupported type: {0}")]
    UnsupportedType(&'static str),
    /// Encoder configuration couldn't be read.
    #[error("bad configuration: {0}")]
    Config(String),
}

impl Error {
    /// True for failures caused by malformed input, as opposed to caller mistakes.
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Error::Length { .. }
                | Error::Marker(_)
                | Error::Integrity { .. }
                | Error::FormatNotDetected
                | Error::NotAnEnvelope(_)
        )
    }
}
