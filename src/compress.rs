//! Body compression for envelopes.
//!
//! The header always stays readable: only the bytes after it are run through the algorithm named
//! by the [`CompressionId`]. Decompressing re-stamps the header with [`CompressionId::NONE`] so
//! the result is a plain envelope again.

use std::cell::RefCell;
use std::io::{self, Read, Write};

use byteorder::{ByteOrder, LittleEndian};
use flate2::Compression as FlateLevel;

use crate::error::{Error, Result, Stage};
use crate::header::{Header, HEADER_LEN};
use crate::ids::CompressionId;
use crate::MAX_BODY_SIZE;

/// Compression level used for zstd bodies.
pub const ZSTD_LEVEL: i32 = 3;

const ZSTD_WINDOW_LOG: u32 = 21;

thread_local! {
    static ZSTD_CCTX: RefCell<zstd_safe::CCtx<'static>> = RefCell::new(zstd_safe::CCtx::create());
    static ZSTD_DCTX: RefCell<zstd_safe::DCtx<'static>> = RefCell::new(zstd_safe::DCtx::create());
}

fn split(envelope: &[u8]) -> Result<(&[u8], &[u8])> {
    if envelope.len() < HEADER_LEN {
        return Err(Error::NotAnEnvelope(envelope.len()));
    }
    Ok(envelope.split_at(HEADER_LEN))
}

/// Compress the body of an envelope. The header bytes are copied through unchanged.
pub fn compress(envelope: &[u8], compression: CompressionId) -> Result<Vec<u8>> {
    let (header, body) = split(envelope)?;
    let mut out = Vec::with_capacity(envelope.len());
    out.extend_from_slice(header);
    match compression {
        CompressionId::NONE => out.extend_from_slice(body),
        CompressionId::SNAPPY => {
            let packed = snap::raw::Encoder::new()
                .compress_vec(body)
                .map_err(|e| io_err("snappy", Stage::Write, e.into()))?;
            out.extend_from_slice(&packed);
        }
        CompressionId::DEFLATE => {
            let mut enc = flate2::write::DeflateEncoder::new(out, FlateLevel::default());
            enc.write_all(body)
                .map_err(|e| io_err("deflate", Stage::Write, e))?;
            out = enc
                .finish()
                .map_err(|e| io_err("deflate", Stage::Close, e))?;
        }
        CompressionId::GZIP => {
            let mut enc = flate2::write::GzEncoder::new(out, FlateLevel::default());
            enc.write_all(body)
                .map_err(|e| io_err("gzip", Stage::Write, e))?;
            out = enc.finish().map_err(|e| io_err("gzip", Stage::Close, e))?;
        }
        CompressionId::ZSTD => {
            zstd_compress(body, &mut out, ZSTD_LEVEL)?;
        }
        other => return Err(Error::UnsupportedCompression(other)),
    }
    tracing::trace!(
        %compression,
        body = body.len(),
        compressed = out.len() - HEADER_LEN,
        "compressed envelope"
    );
    Ok(out)
}

/// Decompress the body of an envelope, bounding the body to [`MAX_BODY_SIZE`].
///
/// The returned envelope's header is re-encoded with compression [`CompressionId::NONE`].
pub fn decompress(envelope: &[u8], compression: CompressionId) -> Result<Vec<u8>> {
    decompress_limited(envelope, compression, MAX_BODY_SIZE)
}

/// Decompress the body of an envelope. Fails with [`Error::LengthTooLong`] if the decompressed
/// body would be larger than `max_body`, and with [`Error::CompressionMismatch`] if `compression`
/// is not the one named in the header.
pub fn decompress_limited(
    envelope: &[u8],
    compression: CompressionId,
    max_body: usize,
) -> Result<Vec<u8>> {
    let (header, body) = split(envelope)?;
    let header = Header::parse(header)?;
    if header.compression() != compression {
        return Err(Error::CompressionMismatch {
            header: header.compression(),
            requested: compression,
        });
    }
    let header = header.with_compression(CompressionId::NONE)?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(header.as_ref());

    match compression {
        CompressionId::NONE => {
            if body.len() > max_body {
                return Err(Error::LengthTooLong {
                    max: max_body,
                    actual: body.len(),
                });
            }
            out.extend_from_slice(body);
        }
        CompressionId::SNAPPY => {
            let len = snap::raw::decompress_len(body).map_err(|e| Error::Decompress {
                algorithm: "snappy",
                detail: e.to_string(),
            })?;
            if len > max_body {
                return Err(Error::LengthTooLong {
                    max: max_body,
                    actual: len,
                });
            }
            let plain = snap::raw::Decoder::new()
                .decompress_vec(body)
                .map_err(|e| Error::Decompress {
                    algorithm: "snappy",
                    detail: e.to_string(),
                })?;
            out.extend_from_slice(&plain);
        }
        CompressionId::DEFLATE => {
            read_limited("deflate", flate2::read::DeflateDecoder::new(body), &mut out, max_body)?
        }
        CompressionId::GZIP => {
            read_limited("gzip", flate2::read::GzDecoder::new(body), &mut out, max_body)?
        }
        CompressionId::ZSTD => {
            zstd_decompress(body, &mut out, max_body)?;
        }
        other => return Err(Error::UnsupportedCompression(other)),
    }
    tracing::trace!(
        %compression,
        compressed = body.len(),
        body = out.len() - HEADER_LEN,
        "decompressed envelope"
    );
    Ok(out)
}

fn io_err(algorithm: &'static str, stage: Stage, source: io::Error) -> Error {
    Error::CompressionIo {
        algorithm,
        stage,
        source,
    }
}

/// Read a streaming decoder to its end, failing once more than `max_body` bytes come out.
fn read_limited<R: Read>(
    algorithm: &'static str,
    reader: R,
    out: &mut Vec<u8>,
    max_body: usize,
) -> Result<()> {
    let start = out.len();
    reader
        .take(max_body as u64 + 1)
        .read_to_end(out)
        .map_err(|e| io_err(algorithm, Stage::Read, e))?;
    let actual = out.len() - start;
    if actual > max_body {
        return Err(Error::LengthTooLong {
            max: max_body,
            actual,
        });
    }
    Ok(())
}

fn zstd_error(code: zstd_safe::ErrorCode) -> Error {
    Error::Decompress {
        algorithm: "zstd",
        detail: format!("code {} ({})", code, zstd_safe::get_error_name(code)),
    }
}

fn zstd_parse_error(detail: &str) -> Error {
    Error::Decompress {
        algorithm: "zstd",
        detail: detail.to_owned(),
    }
}

/// Read the content size out of a magicless zstd frame header.
///
/// Only the frame shape produced by [`zstd_compress`] is accepted: no dictionary id, no
/// checksum, and the content size always present.
fn zstd_decompressed_size(frame: &[u8]) -> Result<usize> {
    let Some(descriptor) = frame.first() else {
        return Err(zstd_parse_error("not enough bytes in frame header"));
    };
    if descriptor & 0x1F != 0 {
        return Err(zstd_parse_error("unexpected frame header descriptor"));
    }
    if descriptor & 0xE0 == 0xE0 {
        return Err(zstd_parse_error("missing frame content size"));
    }
    let len = descriptor >> 6;
    // Single-segment frames have no window descriptor byte.
    let offset = 1 + ((descriptor & 0x20 == 0) as usize);
    if frame.len() < (1usize << len) + offset {
        return Err(zstd_parse_error("frame header isn't large enough"));
    }
    let field = &frame[offset..];
    match len {
        0 => Ok(field[0] as usize),
        1 => Ok(LittleEndian::read_u16(field) as usize + 256),
        2 => {
            let size = LittleEndian::read_u32(field) as usize;
            if size < 65792 {
                Err(zstd_parse_error("content size not minimally encoded"))
            } else {
                Ok(size)
            }
        }
        _ => Err(zstd_parse_error("content size too long")),
    }
}

fn zstd_compress(input: &[u8], output: &mut Vec<u8>, level: i32) -> Result<usize> {
    use zstd_safe::{CParameter, FrameFormat, ResetDirective};

    let fail = |code: zstd_safe::ErrorCode| {
        io_err(
            "zstd",
            Stage::Write,
            io::Error::new(io::ErrorKind::Other, zstd_safe::get_error_name(code)),
        )
    };

    ZSTD_CCTX.with_borrow_mut(|ctx| {
        // Single frame, minimal header, content size always written.
        ctx.reset(ResetDirective::SessionAndParameters).map_err(fail)?;
        ctx.set_parameter(CParameter::CompressionLevel(level)).map_err(fail)?;
        ctx.set_parameter(CParameter::DictIdFlag(false)).map_err(fail)?;
        ctx.set_parameter(CParameter::ChecksumFlag(false)).map_err(fail)?;
        ctx.set_parameter(CParameter::Format(FrameFormat::Magicless)).map_err(fail)?;
        ctx.set_parameter(CParameter::ContentSizeFlag(true)).map_err(fail)?;
        ctx.set_parameter(CParameter::WindowLog(ZSTD_WINDOW_LOG)).map_err(fail)?;
        ctx.set_pledged_src_size(Some(input.len() as u64)).map_err(fail)?;

        output.reserve(zstd_safe::compress_bound(input.len()));
        let spare = output.spare_capacity_mut();
        // SAFETY:
        // zstd only writes into the spare capacity it is handed, and reports how much of it
        // was filled. The vec's length is bumped by exactly that much.
        let used = unsafe {
            let spare =
                core::slice::from_raw_parts_mut(spare.as_mut_ptr() as *mut u8, spare.len());
            let used = ctx.compress2(spare, input).map_err(fail)?;
            output.set_len(output.len() + used);
            used
        };
        Ok(used)
    })
}

fn zstd_decompress(input: &[u8], output: &mut Vec<u8>, max_body: usize) -> Result<usize> {
    use zstd_safe::{DParameter, FrameFormat, ResetDirective};

    let expected = zstd_decompressed_size(input)?;
    if expected > max_body {
        return Err(Error::LengthTooLong {
            max: max_body,
            actual: expected,
        });
    }
    output.reserve(expected);

    ZSTD_DCTX.with_borrow_mut(|dctx| {
        dctx.reset(ResetDirective::SessionAndParameters)
            .map_err(zstd_error)?;
        dctx.set_parameter(DParameter::Format(FrameFormat::Magicless))
            .map_err(zstd_error)?;
        dctx.set_parameter(DParameter::WindowLogMax(ZSTD_WINDOW_LOG))
            .map_err(zstd_error)?;

        let spare = output.spare_capacity_mut();
        // SAFETY:
        // The spare capacity is handed straight to zstd to fill, then the vec's length is
        // adjusted by how much zstd filled in.
        let used = unsafe {
            let spare =
                core::slice::from_raw_parts_mut(spare.as_mut_ptr() as *mut u8, spare.len());
            let used = dctx.decompress(spare, input).map_err(zstd_error)?;
            output.set_len(output.len() + used);
            used
        };
        if used != expected {
            return Err(zstd_parse_error("decompressed size doesn't match promised size"));
        }
        Ok(used)
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ids::{NamespaceId, SchemaId};

    const ALGORITHMS: [CompressionId; 5] = [
        CompressionId::NONE,
        CompressionId::SNAPPY,
        CompressionId::DEFLATE,
        CompressionId::GZIP,
        CompressionId::ZSTD,
    ];

    fn envelope(compression: CompressionId, body: &[u8]) -> Vec<u8> {
        let header = Header::encode(NamespaceId(12), SchemaId::versioned(3, 1), compression)
            .unwrap();
        let mut out = header.as_ref().to_vec();
        out.extend_from_slice(body);
        out
    }

    fn repetitive_body() -> Vec<u8> {
        b"the quick brown fox jumps over the lazy dog. "
            .iter()
            .cycle()
            .take(4096)
            .copied()
            .collect()
    }

    #[test]
    fn roundtrip_every_algorithm() {
        for body in [Vec::new(), b"x".to_vec(), repetitive_body()] {
            for comp in ALGORITHMS {
                println!("Algorithm {} with {} body bytes", comp, body.len());
                let env = envelope(comp, &body);
                let packed = compress(&env, comp).unwrap();
                assert_eq!(&packed[..HEADER_LEN], &env[..HEADER_LEN]);
                let plain = decompress(&packed, comp).unwrap();
                assert_eq!(&plain[HEADER_LEN..], &body[..]);
                let header = Header::parse(&plain[..HEADER_LEN]).unwrap();
                assert_eq!(header.compression(), CompressionId::NONE);
                assert_eq!(header.namespace(), NamespaceId(12));
                assert_eq!(header.schema(), SchemaId::versioned(3, 1));
            }
        }
    }

    #[test]
    fn compression_shrinks_repetitive_data() {
        let body = repetitive_body();
        for comp in &ALGORITHMS[1..] {
            let packed = compress(&envelope(*comp, &body), *comp).unwrap();
            assert!(packed.len() < body.len(), "{} didn't shrink the body", comp);
        }
    }

    #[test]
    fn unsupported_ids() {
        let env = envelope(CompressionId(9), b"body");
        assert!(matches!(
            compress(&env, CompressionId(9)),
            Err(Error::UnsupportedCompression(CompressionId(9)))
        ));
        let env = envelope(CompressionId(200), b"body");
        assert!(matches!(
            decompress(&env, CompressionId(200)),
            Err(Error::UnsupportedCompression(CompressionId(200)))
        ));
    }

    #[test]
    fn algorithm_must_match_header() {
        let packed = compress(&envelope(CompressionId::GZIP, &repetitive_body()), CompressionId::GZIP)
            .unwrap();
        for comp in [CompressionId::NONE, CompressionId::DEFLATE, CompressionId::ZSTD] {
            match decompress(&packed, comp) {
                Err(Error::CompressionMismatch { header, requested }) => {
                    assert_eq!(header, CompressionId::GZIP);
                    assert_eq!(requested, comp);
                }
                other => panic!("{}: expected a mismatch, got {:?}", comp, other),
            }
        }
        let plain = decompress(&packed, CompressionId::GZIP).unwrap();
        assert_eq!(&plain[HEADER_LEN..], &repetitive_body()[..]);
    }

    #[test]
    fn short_input() {
        assert!(matches!(
            compress(&[0x93, 0, 0], CompressionId::NONE),
            Err(Error::NotAnEnvelope(3))
        ));
        assert!(matches!(
            decompress(&[], CompressionId::GZIP),
            Err(Error::NotAnEnvelope(0))
        ));
    }

    #[test]
    fn corrupt_bodies() {
        let garbage = [0xFFu8; 16];
        let err = decompress(&envelope(CompressionId::SNAPPY, &garbage[..4]), CompressionId::SNAPPY)
            .unwrap_err();
        assert!(matches!(err, Error::Decompress { algorithm: "snappy", .. }));

        let err = decompress(&envelope(CompressionId::ZSTD, &garbage), CompressionId::ZSTD)
            .unwrap_err();
        assert!(matches!(err, Error::Decompress { algorithm: "zstd", .. }));

        let err = decompress(&envelope(CompressionId::GZIP, b"not gzip at all"), CompressionId::GZIP)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::CompressionIo { algorithm: "gzip", stage: Stage::Read, .. }
        ));

        let err = decompress(&envelope(CompressionId::DEFLATE, &garbage), CompressionId::DEFLATE)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::CompressionIo { algorithm: "deflate", stage: Stage::Read, .. }
        ));
    }

    #[test]
    fn size_limit() {
        let body = repetitive_body();
        for comp in ALGORITHMS {
            let packed = compress(&envelope(comp, &body), comp).unwrap();
            match decompress_limited(&packed, comp, 1024) {
                Err(Error::LengthTooLong { max, .. }) => assert_eq!(max, 1024),
                other => panic!("{}: expected a length failure, got {:?}", comp, other),
            }
            assert!(decompress_limited(&packed, comp, body.len()).is_ok());
        }
    }

    #[test]
    fn zstd_frame_is_magicless() {
        let body = repetitive_body();
        let packed = compress(&envelope(CompressionId::ZSTD, &body), CompressionId::ZSTD).unwrap();
        assert_ne!(&packed[HEADER_LEN..HEADER_LEN + 4], &[0x28, 0xB5, 0x2F, 0xFD]);
        assert_eq!(zstd_decompressed_size(&packed[HEADER_LEN..]).unwrap(), body.len());
    }
}
