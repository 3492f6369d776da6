use serde::{de::DeserializeOwned, Serialize};

use crate::codec::{MsgPack, SchemaDescriptor, StructuralCodec};
use crate::compress::{compress, decompress_limited};
use crate::described::{Described, HeaderSlot};
use crate::error::{Error, Result};
use crate::header::{is_header, Header, HEADER_LEN};
use crate::ids::{CompressionId, Identity, NamespaceId, SchemaId};
use crate::MAX_BODY_SIZE;

/// Marshals values into envelopes and back, through a structural codec.
///
/// The default codec is [`MsgPack`]. A `Marshaller` holds no per-message state, so one can be
/// shared freely.
#[derive(Clone, Debug)]
pub struct Marshaller<C = MsgPack> {
    codec: C,
    max_body_size: usize,
}

impl Default for Marshaller<MsgPack> {
    fn default() -> Self {
        Self::new()
    }
}

impl Marshaller<MsgPack> {
    pub fn new() -> Self {
        Self::with_codec(MsgPack)
    }
}

impl<C: StructuralCodec> Marshaller<C> {
    pub fn with_codec(codec: C) -> Self {
        Self {
            codec,
            max_body_size: MAX_BODY_SIZE,
        }
    }

    /// Set the largest decompressed body this will accept. Defaults to [`MAX_BODY_SIZE`].
    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn body_limit(&self) -> usize {
        self.max_body_size
    }

    /// Parse a value type's own schema text.
    pub fn parse_schema<T: Described>(&self) -> Result<C::Schema> {
        self.codec.parse(T::SCHEMA_TEXT)
    }

    /// Marshal a described value, stamping the new header into its slot.
    ///
    /// When no schema is given, the value's own schema text is parsed for this call.
    pub fn marshal<T: Described>(
        &self,
        value: &mut T,
        compression: CompressionId,
        schema: Option<&C::Schema>,
    ) -> Result<Vec<u8>> {
        let parsed;
        let schema = match schema {
            Some(schema) => schema,
            None => {
                parsed = self.parse_schema::<T>()?;
                &parsed
            }
        };
        self.marshal_with(value, schema, T::NAMESPACE, T::SCHEMA, compression)
    }

    /// Marshal any value with a header slot under an explicit identity.
    pub fn marshal_with<T: HeaderSlot + Serialize>(
        &self,
        value: &mut T,
        schema: &C::Schema,
        namespace: NamespaceId,
        schema_id: SchemaId,
        compression: CompressionId,
    ) -> Result<Vec<u8>> {
        let header = Header::encode(namespace, schema_id, compression)?;
        value.set_header(header);
        let body = self.codec.encode(schema, &*value)?;
        tracing::debug!(%namespace, schema = %schema_id, %compression, body = body.len(), "marshalling");

        let mut envelope = Vec::with_capacity(HEADER_LEN + body.len());
        envelope.extend_from_slice(header.as_ref());
        envelope.extend_from_slice(&body);
        if compression.is_none() {
            return Ok(envelope);
        }
        compress(&envelope, compression)
    }

    /// Unmarshal into a described value, enforcing that the envelope carries its identity.
    ///
    /// Empty input leaves `dst` untouched. Input starting with `{` is decoded as JSON, without a
    /// header. On success the destination's slot holds the header with compression set to
    /// [`CompressionId::NONE`].
    pub fn unmarshal<T: Described>(
        &self,
        data: &[u8],
        dst: &mut T,
        schema: Option<&C::Schema>,
    ) -> Result<()> {
        let Some((header, plain)) = self.open(data, dst)? else {
            return Ok(());
        };

        let parsed;
        let schema = match schema {
            Some(schema) => schema,
            None => {
                parsed = self.parse_schema::<T>()?;
                &parsed
            }
        };

        if header.namespace() != T::NAMESPACE {
            return Err(Error::WrongNamespace {
                expected: T::NAMESPACE,
                actual: header.namespace(),
            });
        }
        if header.schema() != T::SCHEMA {
            return Err(Error::WrongSchema {
                expected: T::SCHEMA,
                actual: header.schema(),
            });
        }

        self.finish(header, &plain, schema, dst)
    }

    /// Unmarshal into any value with a header slot, returning the identity it was sent under.
    ///
    /// The identity is not checked against anything. `None` is returned for empty input and for
    /// JSON input, neither of which carry a header.
    pub fn unmarshal_any<T: HeaderSlot + DeserializeOwned>(
        &self,
        data: &[u8],
        schema: &C::Schema,
        dst: &mut T,
    ) -> Result<Option<Identity>> {
        let Some((header, plain)) = self.open(data, dst)? else {
            return Ok(None);
        };
        self.finish(header, &plain, schema, dst)?;
        Ok(Some(header.identity()))
    }

    /// Detect the input's format and decompress it.
    ///
    /// Returns `None` once the input has been fully handled without an envelope: either it was
    /// empty, or it was JSON and has been decoded into `dst`.
    fn open<T: DeserializeOwned>(
        &self,
        data: &[u8],
        dst: &mut T,
    ) -> Result<Option<(Header, Vec<u8>)>> {
        if data.is_empty() {
            tracing::debug!("nothing to unmarshal");
            return Ok(None);
        }
        if data.len() > 1 && data[0] == b'{' {
            tracing::debug!(len = data.len(), "unmarshalling textual fallback");
            *dst = serde_json::from_slice(data)?;
            return Ok(None);
        }
        if data.len() <= HEADER_LEN || !is_header(&data[..HEADER_LEN]) {
            return Err(Error::FormatNotDetected);
        }
        let header = Header::parse(&data[..HEADER_LEN])?;
        let plain = decompress_limited(data, header.compression(), self.max_body_size)?;
        let header = header.with_compression(CompressionId::NONE)?;
        tracing::debug!(identity = %header.identity(), len = data.len(), "unmarshalling envelope");
        Ok(Some((header, plain)))
    }

    fn finish<T: HeaderSlot + DeserializeOwned>(
        &self,
        header: Header,
        plain: &[u8],
        schema: &C::Schema,
        dst: &mut T,
    ) -> Result<()> {
        let mut value: T = self.codec.decode(schema, &plain[HEADER_LEN..])?;
        value.set_header(header);
        *dst = value;
        Ok(())
    }
}

/// Marshal a described value with the default codec.
pub fn marshal<T: Described>(
    value: &mut T,
    compression: CompressionId,
    schema: Option<&SchemaDescriptor>,
) -> Result<Vec<u8>> {
    Marshaller::new().marshal(value, compression, schema)
}

/// Marshal any value with a header slot under an explicit identity, with the default codec.
pub fn marshal_with<T: HeaderSlot + Serialize>(
    value: &mut T,
    schema: &SchemaDescriptor,
    namespace: NamespaceId,
    schema_id: SchemaId,
    compression: CompressionId,
) -> Result<Vec<u8>> {
    Marshaller::new().marshal_with(value, schema, namespace, schema_id, compression)
}

/// Unmarshal into a described value with the default codec.
pub fn unmarshal<T: Described>(
    data: &[u8],
    dst: &mut T,
    schema: Option<&SchemaDescriptor>,
) -> Result<()> {
    Marshaller::new().unmarshal(data, dst, schema)
}

/// Unmarshal into any value with a header slot with the default codec.
pub fn unmarshal_any<T: HeaderSlot + DeserializeOwned>(
    data: &[u8],
    schema: &SchemaDescriptor,
    dst: &mut T,
) -> Result<Option<Identity>> {
    Marshaller::new().unmarshal_any(data, schema, dst)
}
