//! The fixed-size magic header.
//!
//! Layout, 8 bytes, multi-byte fields big-endian:
//!
//! ```text
//! byte 0     : MARKER (0x93)
//! byte 1     : compression id
//! bytes 2-3  : namespace id
//! bytes 4-6  : schema id (number << 8 | version)
//! byte 7     : check byte over bytes 1-6
//! ```
//!
//! This is the only header layout understood by this crate. The older 4-byte layout is not
//! detected; its marker and parity space overlap this one and sniffing both would produce false
//! positives.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};
use crate::ids::{CompressionId, Field, Identity, NamespaceId, SchemaId};
use crate::MARKER;

/// Length of an encoded header, in bytes.
pub const HEADER_LEN: usize = 8;

const CHECK_POS: usize = HEADER_LEN - 1;

/// Compute the check byte over the header fields.
///
/// Each step rotates the accumulator before folding in the next byte, so the result depends on
/// byte order, and any single flipped bit in the fields flips exactly one bit of the result.
fn check_byte(data: &[u8; HEADER_LEN]) -> u8 {
    data[1..CHECK_POS]
        .iter()
        .fold(MARKER, |acc, &b| acc.rotate_left(1) ^ b)
}

/// An encoded envelope header.
///
/// A `Header` built through [`Header::encode`] or [`Header::parse`] is always valid. The
/// `Default` header is all zeroes and only serves as the unset content of a value's header slot
/// before it is first marshalled or unmarshalled.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Header([u8; HEADER_LEN]);

impl Header {
    /// Encode a new header. Fails if any field is out of range for the wire format.
    pub fn encode(
        namespace: NamespaceId,
        schema: SchemaId,
        compression: CompressionId,
    ) -> Result<Header> {
        if namespace > NamespaceId::MAX {
            return Err(Error::OutOfRange {
                field: Field::Namespace,
                value: namespace.0 as i64,
                max: NamespaceId::MAX.0,
            });
        }
        if compression > CompressionId::MAX {
            return Err(Error::OutOfRange {
                field: Field::Compression,
                value: compression.0 as i64,
                max: CompressionId::MAX.0,
            });
        }
        if schema > SchemaId::MAX {
            return Err(Error::OutOfRange {
                field: Field::Schema,
                value: schema.0 as i64,
                max: SchemaId::MAX.0,
            });
        }

        let mut data = [0u8; HEADER_LEN];
        data[0] = MARKER;
        data[1] = compression.0 as u8;
        BigEndian::write_u16(&mut data[2..4], namespace.0 as u16);
        BigEndian::write_u24(&mut data[4..7], schema.0);
        data[CHECK_POS] = check_byte(&data);
        tracing::trace!(%namespace, %schema, %compression, "encoded header");
        Ok(Header(data))
    }

    /// Header for a private, unregistered payload.
    pub fn private(compression: CompressionId) -> Result<Header> {
        Self::encode(NamespaceId::PRIVATE, SchemaId::UNDEFINED, compression)
    }

    /// Header for one of the built-in primitive containers.
    pub fn builtin(schema: SchemaId, compression: CompressionId) -> Result<Header> {
        Self::encode(NamespaceId::BUILTIN, schema, compression)
    }

    /// Parse and verify a header. The slice must be exactly [`HEADER_LEN`] bytes long.
    pub fn parse(data: &[u8]) -> Result<Header> {
        let data: [u8; HEADER_LEN] = data.try_into().map_err(|_| Error::Length {
            expected: HEADER_LEN,
            actual: data.len(),
        })?;
        if data[0] != MARKER {
            return Err(Error::Marker(data[0]));
        }
        let computed = check_byte(&data);
        let stored = data[CHECK_POS];
        if stored != computed {
            return Err(Error::Integrity { stored, computed });
        }
        Ok(Header(data))
    }

    /// Check whether a slice holds a valid header. Never fails; any mismatch is `false`.
    pub fn is_header(data: &[u8]) -> bool {
        match <&[u8; HEADER_LEN]>::try_from(data) {
            Ok(data) => data[0] == MARKER && data[CHECK_POS] == check_byte(data),
            Err(_) => false,
        }
    }

    pub fn compression(&self) -> CompressionId {
        CompressionId(self.0[1] as u32)
    }

    pub fn namespace(&self) -> NamespaceId {
        NamespaceId(BigEndian::read_u16(&self.0[2..4]) as u32)
    }

    pub fn schema(&self) -> SchemaId {
        SchemaId(BigEndian::read_u24(&self.0[4..7]))
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.namespace(), self.schema())
    }

    /// The same header with a different compression id.
    pub fn with_compression(&self, compression: CompressionId) -> Result<Header> {
        Self::encode(self.namespace(), self.schema(), compression)
    }

    /// True for the all-zero placeholder header.
    pub fn is_unset(&self) -> bool {
        self.0 == [0u8; HEADER_LEN]
    }

    pub fn as_bytes(&self) -> &[u8; HEADER_LEN] {
        &self.0
    }
}

impl AsRef<[u8]> for Header {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_unset() {
            return f.write_str("Header(unset)");
        }
        f.debug_struct("Header")
            .field("namespace", &self.namespace())
            .field("schema", &self.schema())
            .field("compression", &self.compression())
            .finish()
    }
}

/// Encode a header from its three fields.
pub fn encode_header(
    namespace: NamespaceId,
    schema: SchemaId,
    compression: CompressionId,
) -> Result<Header> {
    Header::encode(namespace, schema, compression)
}

/// Decode and verify a header, returning its fields.
pub fn decode_header(data: &[u8]) -> Result<(NamespaceId, SchemaId, CompressionId)> {
    let header = Header::parse(data)?;
    Ok((header.namespace(), header.schema(), header.compression()))
}

/// Check whether a slice is exactly one valid header.
pub fn is_header(data: &[u8]) -> bool {
    Header::is_header(data)
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn cases() -> Vec<(NamespaceId, SchemaId, CompressionId, bool)> {
        vec![
            (NamespaceId(0), SchemaId(0), CompressionId(0), true),
            (NamespaceId(1), SchemaId(1023), CompressionId(3), true),
            (NamespaceId::MAX, SchemaId::MAX, CompressionId::MAX, true),
            (NamespaceId(17), SchemaId(4567), CompressionId(2), true),
            (NamespaceId(NamespaceId::MAX.0 + 1), SchemaId(0), CompressionId(0), false),
            (NamespaceId(0), SchemaId(SchemaId::MAX.0 + 1), CompressionId(0), false),
            (NamespaceId(0), SchemaId(0), CompressionId(CompressionId::MAX.0 + 1), false),
        ]
    }

    #[test]
    fn encode_decode() {
        for (index, (ns, schema, comp, ok)) in cases().into_iter().enumerate() {
            println!("Test #{}: ns={} schema={} comp={}", index, ns, schema, comp);
            let res = encode_header(ns, schema, comp);
            if !ok {
                assert!(res.is_err());
                continue;
            }
            let header = res.unwrap();
            assert_eq!(decode_header(header.as_ref()).unwrap(), (ns, schema, comp));
            assert!(is_header(header.as_ref()));
        }
    }

    #[test]
    fn range_errors_name_the_field() {
        let err = encode_header(NamespaceId(70_000), SchemaId(0), CompressionId(0)).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { field: Field::Namespace, .. }));
        let err = encode_header(NamespaceId(0), SchemaId(0), CompressionId(256)).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { field: Field::Compression, .. }));
        let err = encode_header(NamespaceId(0), SchemaId(1 << 24), CompressionId(0)).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { field: Field::Schema, .. }));
    }

    #[test]
    fn known_bytes() {
        let header =
            encode_header(NamespaceId(1), SchemaId::versioned(1, 1), CompressionId::NONE).unwrap();
        let bytes = header.as_bytes();
        assert_eq!(&bytes[..7], &[0x93, 0x00, 0x00, 0x01, 0x00, 0x01, 0x01]);
        assert_eq!(bytes[7], check_byte(bytes));
    }

    #[test]
    fn bad_length() {
        assert!(matches!(
            decode_header(&[]),
            Err(Error::Length { expected: 8, actual: 0 })
        ));
        assert!(matches!(
            decode_header(&[MARKER]),
            Err(Error::Length { actual: 1, .. })
        ));
        let header = Header::private(CompressionId::NONE).unwrap();
        let mut long = header.as_ref().to_vec();
        long.push(0);
        assert!(decode_header(&long).is_err());
        assert!(!is_header(&long));
        assert!(!is_header(&[]));
        assert!(!is_header(&[MARKER, 0, 0]));
    }

    #[test]
    fn bad_marker() {
        let header = encode_header(NamespaceId(9), SchemaId(99), CompressionId(1)).unwrap();
        let mut bytes = *header.as_bytes();
        bytes[0] = 0xAD;
        assert!(matches!(decode_header(&bytes), Err(Error::Marker(0xAD))));
        assert!(!is_header(&bytes));
    }

    #[test]
    fn marker_with_bad_check() {
        let header = encode_header(NamespaceId(9), SchemaId(99), CompressionId(1)).unwrap();
        let mut bytes = *header.as_bytes();
        bytes[7] ^= 0x01;
        assert!(matches!(decode_header(&bytes), Err(Error::Integrity { .. })));
        assert!(!is_header(&bytes));
    }

    #[test]
    fn check_is_order_sensitive() {
        let a = encode_header(NamespaceId(0x0102), SchemaId(0), CompressionId(0)).unwrap();
        let b = encode_header(NamespaceId(0x0201), SchemaId(0), CompressionId(0)).unwrap();
        assert_ne!(a.as_bytes()[7], b.as_bytes()[7]);
    }

    #[test]
    fn restamp_compression() {
        let header = encode_header(NamespaceId(5), SchemaId(6), CompressionId::GZIP).unwrap();
        let plain = header.with_compression(CompressionId::NONE).unwrap();
        assert_eq!(plain.namespace(), NamespaceId(5));
        assert_eq!(plain.schema(), SchemaId(6));
        assert_eq!(plain.compression(), CompressionId::NONE);
        assert!(is_header(plain.as_ref()));
    }

    #[test]
    fn unset_header_is_not_valid() {
        let header = Header::default();
        assert!(header.is_unset());
        assert!(!is_header(header.as_ref()));
    }

    proptest! {
        #[test]
        fn roundtrip(ns in 0u32..=0xFFFF, schema in 0u32..=0xFF_FFFF, comp in 0u32..=0xFF) {
            let header = encode_header(NamespaceId(ns), SchemaId(schema), CompressionId(comp)).unwrap();
            prop_assert_eq!(
                decode_header(header.as_ref()).unwrap(),
                (NamespaceId(ns), SchemaId(schema), CompressionId(comp))
            );
        }

        #[test]
        fn single_bit_flip_is_caught(
            ns in 0u32..=0xFFFF,
            schema in 0u32..=0xFF_FFFF,
            comp in 0u32..=0xFF,
            bit in 8usize..64,
        ) {
            let header = encode_header(NamespaceId(ns), SchemaId(schema), CompressionId(comp)).unwrap();
            let mut bytes = *header.as_bytes();
            bytes[bit / 8] ^= 1 << (bit % 8);
            prop_assert!(
                matches!(decode_header(&bytes), Err(Error::Integrity { .. })),
                "flipped bit {} was not caught",
                bit
            );
            prop_assert!(!is_header(&bytes));
        }

        #[test]
        fn never_panics(data in proptest::collection::vec(any::<u8>(), 0..16)) {
            let valid = is_header(&data);
            prop_assert_eq!(valid, decode_header(&data).is_ok());
        }
    }
}
