use crate::header::{Header, HEADER_LEN};
use crate::MARKER;

/// Iterator over every offset in a buffer where a valid header starts.
///
/// Matches may overlap, and a match says nothing about whether a body follows. Produced by
/// [`scan`].
#[derive(Clone, Debug)]
pub struct HeaderScanner<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Find every valid header in a buffer, such as a capture holding several envelopes.
pub fn scan(data: &[u8]) -> HeaderScanner<'_> {
    HeaderScanner { data, pos: 0 }
}

impl<'a> Iterator for HeaderScanner<'a> {
    type Item = (usize, Header);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos + HEADER_LEN <= self.data.len() {
            let start = self.pos;
            let rest = &self.data[start..];
            let Some(skip) = rest.iter().position(|&b| b == MARKER) else {
                self.pos = self.data.len();
                return None;
            };
            let at = start + skip;
            self.pos = at + 1;
            let Some(window) = self.data.get(at..at + HEADER_LEN) else {
                return None;
            };
            if let Ok(header) = Header::parse(window) {
                return Some((at, header));
            }
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::is_header;
    use crate::ids::{CompressionId, NamespaceId, SchemaId};
    use proptest::prelude::*;

    #[test]
    fn finds_headers_between_noise() {
        let a = Header::encode(NamespaceId(1), SchemaId(2), CompressionId::NONE).unwrap();
        let b = Header::encode(NamespaceId(300), SchemaId(4000), CompressionId::ZSTD).unwrap();
        let mut data = vec![0u8, MARKER, 7];
        data.extend_from_slice(a.as_ref());
        data.extend_from_slice(b"body bytes");
        data.extend_from_slice(b.as_ref());
        data.push(MARKER);

        let found: Vec<_> = scan(&data).collect();
        assert_eq!(found, vec![(3, a), (3 + 8 + 10, b)]);
    }

    #[test]
    fn short_or_empty() {
        assert_eq!(scan(&[]).count(), 0);
        assert_eq!(scan(&[MARKER; 7]).count(), 0);
        let a = Header::private(CompressionId::NONE).unwrap();
        assert_eq!(scan(a.as_ref()).collect::<Vec<_>>(), vec![(0, a)]);
    }

    proptest! {
        #[test]
        fn every_hit_is_a_header(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            for (offset, header) in scan(&data) {
                prop_assert!(is_header(&data[offset..offset + HEADER_LEN]));
                prop_assert_eq!(header.as_ref(), &data[offset..offset + HEADER_LEN]);
            }
        }
    }
}
