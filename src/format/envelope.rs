/*!

Layout of an envelope.

An envelope is a fixed 8-byte header followed by a body. The header is never compressed, so the
type of a message can always be learned without touching the body.

# Header

```text
+----------+----------+----------+----------+----------+----------+----------+----------+
| 10010011 | CCCCCCCC | NNNNNNNN | NNNNNNNN | SSSSSSSS | SSSSSSSS | VVVVVVVV | KKKKKKKK |
+----------+----------+----------+----------+----------+----------+----------+----------+

- 10010011 is the marker byte, 0x93
- CCCCCCCC is the compression id
- NNNNNNNN_NNNNNNNN is the 16-bit big-endian namespace id
- SSSSSSSS_SSSSSSSS_VVVVVVVV is the 24-bit big-endian schema id, where the
    low byte V is the schema's version
- KKKKKKKK is the check byte
```

The check byte is computed by starting from the marker and, for each of bytes 1 through 6 in
order, rotating the accumulator left by one bit and XOR-ing in the byte. It catches any single
flipped bit in bytes 1 through 7, and most reorderings of the field bytes. It is not a
cryptographic check and says nothing about the body. This check byte is specific to magpack:
8-byte headers written by other encoders of similar envelopes use a different check and will not
be accepted.

A header is only valid if it is exactly 8 bytes, starts with the marker, and has a matching check
byte. An envelope must have at least one body byte after its header.

# Namespaces

| Namespace | Meaning                                                   |
| --        | --                                                        |
| 0         | Private. The schema is known only to producer and reader. |
| 1         | Built-in primitive containers, see [`builtins`](super::builtins). |
| 2 to 4    | Reserved.                                                 |
| 5 and up  | Free for applications.                                    |

Schema 0 means "undefined" within any namespace.

# Compression

| Id | Name    | Body format                                          |
| -- | --      | --                                                   |
| 0  | none    | The structural encoding, as-is                       |
| 1  | snappy  | Snappy raw block, without the framing format         |
| 2  | deflate | Raw DEFLATE stream, no zlib wrapper                  |
| 3  | gzip    | Gzip member                                          |
| 4  | zstd    | A single zstd frame without its magic number. The frame always records its content size, and carries no dictionary id or checksum. |

Other ids fit in the header but can't be decoded. A reader that has decompressed an envelope
rewrites the header's compression id to 0, recomputing the check byte, so the result is again a
valid envelope.

Decompressed bodies are limited to 64 MiB by default.

# Textual fallback

Input whose first byte is `{` is not an envelope at all: it is read as JSON, straight into the
destination type. Since the marker is 0x93, the two can't be confused.

*/
