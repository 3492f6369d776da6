use serde::{de::DeserializeOwned, Serialize};

use crate::header::Header;
use crate::ids::{Identity, NamespaceId, SchemaId};

/// A value that carries a slot for its envelope header.
///
/// The slot is filled when the value is marshalled, and again when it is the destination of an
/// unmarshal, so a decoded value always knows the header it arrived under. The slot is not part
/// of the structural encoding; fields holding it should be `#[serde(skip)]`.
pub trait HeaderSlot {
    fn header(&self) -> &Header;
    fn set_header(&mut self, header: Header);
}

/// A value type with a fixed identity and schema.
///
/// Usually implemented through the [`described!`][crate::described] macro.
pub trait Described: HeaderSlot + Serialize + DeserializeOwned {
    const NAMESPACE: NamespaceId;
    const SCHEMA: SchemaId;
    /// Schema text, parsed by the structural codec when no schema is supplied.
    const SCHEMA_TEXT: &'static str;

    fn identity() -> Identity {
        Identity::new(Self::NAMESPACE, Self::SCHEMA)
    }
}

/// Implement [`HeaderSlot`] and [`Described`] for a struct with a `#[serde(skip)]` header field.
///
/// The field defaults to `header`; another one can be named with `header = field`.
///
/// ```
/// use magpack::{described, Header, NamespaceId, SchemaId};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct Ping {
///     #[serde(skip)]
///     header: Header,
///     seq: u64,
/// }
///
/// described!(Ping {
///     namespace: NamespaceId(12),
///     schema: SchemaId::versioned(1, 1),
///     text: r#"{"type":"record","name":"Ping","fields":[{"name":"seq","type":"long"}]}"#,
/// });
/// ```
#[macro_export]
macro_rules! described {
    ($t:ident { namespace: $ns:expr, schema: $schema:expr, text: $text:expr, header = $field:ident $(,)? }) => {
        impl $crate::HeaderSlot for $t {
            fn header(&self) -> &$crate::Header {
                &self.$field
            }
            fn set_header(&mut self, header: $crate::Header) {
                self.$field = header;
            }
        }

        impl $crate::Described for $t {
            const NAMESPACE: $crate::NamespaceId = $ns;
            const SCHEMA: $crate::SchemaId = $schema;
            const SCHEMA_TEXT: &'static str = $text;
        }
    };
    ($t:ident { namespace: $ns:expr, schema: $schema:expr, text: $text:expr $(,)? }) => {
        $crate::described!($t {
            namespace: $ns,
            schema: $schema,
            text: $text,
            header = header,
        });
    };
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Default, Serialize, Deserialize)]
    struct Tagged {
        #[serde(skip)]
        magic: Header,
        value: u8,
    }

    described!(Tagged {
        namespace: NamespaceId(40),
        schema: SchemaId::versioned(2, 3),
        text: r#"{"type":"record","name":"Tagged","fields":[{"name":"value","type":"int"}]}"#,
        header = magic,
    });

    #[test]
    fn macro_wires_identity_and_slot() {
        assert_eq!(
            Tagged::identity(),
            Identity::new(NamespaceId(40), SchemaId::versioned(2, 3))
        );
        let mut tagged = Tagged::default();
        assert!(tagged.header().is_unset());
        let header = Header::encode(
            NamespaceId(40),
            SchemaId::versioned(2, 3),
            crate::CompressionId::NONE,
        )
        .unwrap();
        tagged.set_header(header);
        assert_eq!(tagged.magic, header);
    }

    #[test]
    fn header_is_not_serialized() {
        let mut tagged = Tagged {
            value: 5,
            ..Default::default()
        };
        tagged.set_header(Header::private(crate::CompressionId::NONE).unwrap());
        assert_eq!(serde_json::to_string(&tagged).unwrap(), r#"{"value":5}"#);
    }
}
