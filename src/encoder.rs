use serde::Deserialize;

use crate::cache::SchemaCache;
use crate::codec::{MsgPack, StructuralCodec};
use crate::described::Described;
use crate::error::{Error, Result};
use crate::ids::CompressionId;
use crate::protocol::Marshaller;
use crate::MAX_BODY_SIZE;

/// Settings for a [`MessageEncoder`].
///
/// Can be loaded from JSON; missing fields take their defaults:
///
/// ```
/// # use magpack::{CompressionId, EncoderConfig};
/// let config = EncoderConfig::from_json(r#"{ "compression": "snappy" }"#).unwrap();
/// assert_eq!(config.compression, CompressionId::SNAPPY);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    /// Compression for outgoing messages. A name or a numeric id.
    pub compression: CompressionId,
    /// Largest decompressed body accepted when decoding.
    pub max_body_size: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            compression: CompressionId::NONE,
            max_body_size: MAX_BODY_SIZE,
        }
    }
}

impl EncoderConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: EncoderConfig =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the outgoing compression.
    pub fn compression(mut self, compression: CompressionId) -> Self {
        self.compression = compression;
        self
    }

    /// Set the decoding body limit.
    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.compression.name().is_none() {
            return Err(Error::Config(format!(
                "compression {} is not supported",
                self.compression
            )));
        }
        if self.max_body_size == 0 {
            return Err(Error::Config("max_body_size must be positive".into()));
        }
        Ok(())
    }
}

/// Encodes and decodes described values with cached schemas and a fixed compression.
pub struct MessageEncoder<C: StructuralCodec = MsgPack> {
    marshaller: Marshaller<C>,
    cache: SchemaCache<C>,
    compression: CompressionId,
}

impl MessageEncoder<MsgPack> {
    pub fn new(config: EncoderConfig) -> Result<Self> {
        Self::with_codec(MsgPack, config)
    }
}

impl<C: StructuralCodec> MessageEncoder<C> {
    pub fn with_codec(codec: C, config: EncoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            marshaller: Marshaller::with_codec(codec).max_body_size(config.max_body_size),
            cache: SchemaCache::new(),
            compression: config.compression,
        })
    }

    pub fn compression(&self) -> CompressionId {
        self.compression
    }

    pub fn cache(&self) -> &SchemaCache<C> {
        &self.cache
    }

    pub fn encode<T: Described>(&self, value: &mut T) -> Result<Vec<u8>> {
        let schema = self.cache.get_or_parse::<T>(self.marshaller.codec())?;
        self.marshaller.marshal(value, self.compression, Some(&*schema))
    }

    pub fn decode<T: Described>(&self, data: &[u8], dst: &mut T) -> Result<()> {
        let schema = self.cache.get_or_parse::<T>(self.marshaller.codec())?;
        self.marshaller.unmarshal(data, dst, Some(&*schema))
    }
}
