//! RefPack decompression for individually compressed entries.
//!
//! A RefPack stream starts with a small header followed by a sequence of tokens. Each token
//! begins with a control byte whose range selects its class:
//!
//! | Control     | Bytes | Literal bytes       | Copy length            | Copy distance                          |
//! |-------------|-------|---------------------|------------------------|----------------------------------------|
//! | `0x00-0x7F` | 2     | `c & 3`             | `((c >> 2) & 7) + 3`   | `((c & 0x60) << 3) + b1 + 1`           |
//! | `0x80-0xBF` | 3     | `b1 >> 6`           | `(c & 0x3F) + 4`       | `((b1 & 0x3F) << 8) + b2 + 1`          |
//! | `0xC0-0xDF` | 4     | `c & 3`             | `((c & 0x0C) << 6) + b3 + 5` | `((c & 0x10) << 12) + (b1 << 8) + b2 + 1` |
//! | `0xE0-0xFB` | 1     | `((c & 0x1F) << 2) + 4` | none               | none                                   |
//! | `0xFC-0xFF` | 1     | `c & 3`             | none, ends the stream  | none                                   |
//!
//! Literal bytes follow the token and are copied first; the copy then repeats bytes already
//! written, `distance` bytes behind the write position. The copy may overlap the bytes it
//! produces, which is how runs are encoded.

use miette::Diagnostic;
use thiserror::Error;
use tracing::instrument;

/// Compression applied to an entry's stored bytes
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// Stores the data as it is
    #[default]
    None,

    /// RefPack compressed
    RefPack,
}

impl CompressionMethod {
    /// Whether the stored bytes must be decompressed
    pub fn is_compressed(self) -> bool {
        self != CompressionMethod::None
    }
}

/// Failures while decoding a RefPack stream
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("not a refpack stream (header {0:02X?})")]
    InvalidHeader([u8; 2]),

    #[error("compressed stream ends early at byte {position}")]
    UnexpectedEof { position: usize },

    #[error("back-reference {distance} bytes behind output position {position}")]
    InvalidBackReference { distance: usize, position: usize },

    #[error("token writes {needed} bytes into a {size} byte output")]
    OutputOverflow { needed: usize, size: usize },

    #[error("decompressed size {actual} does not match expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Fields of a RefPack stream header
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RefPackHeader {
    /// The first header byte
    pub flags: u8,
    /// Compressed size, only present when bit `0x01` of the flags is set
    pub compressed_size: Option<u32>,
    /// Size of the decompressed output
    pub uncompressed_size: u32,
    /// Bytes taken by the header
    pub len: usize,
}

impl RefPackHeader {
    const MAGIC: u8 = 0xFB;
    const LARGE_SIZES: u8 = 0x80;
    const HAS_COMPRESSED_SIZE: u8 = 0x01;

    /// Parse the header at the start of `data`
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let mut input = Input::new(data);
        let flags = input.byte()? as u8;
        let magic = input.byte()? as u8;
        if flags & 0x3E != 0x10 || magic != Self::MAGIC {
            return Err(DecodeError::InvalidHeader([flags, magic]));
        }

        let width = if flags & Self::LARGE_SIZES != 0 { 4 } else { 3 };
        let compressed_size = if flags & Self::HAS_COMPRESSED_SIZE != 0 {
            Some(input.uint_be(width)?)
        } else {
            None
        };
        let uncompressed_size = input.uint_be(width)?;

        Ok(Self {
            flags,
            compressed_size,
            uncompressed_size,
            len: input.position,
        })
    }
}

/// Whether `data` starts with a RefPack header
pub fn is_refpack(data: &[u8]) -> bool {
    RefPackHeader::parse(data).is_ok()
}

struct Input<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Input<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn byte(&mut self) -> Result<usize, DecodeError> {
        Ok(self.take(1)?[0] as usize)
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.position + count;
        let bytes = self
            .data
            .get(self.position..end)
            .ok_or(DecodeError::UnexpectedEof {
                position: self.data.len(),
            })?;
        self.position = end;
        Ok(bytes)
    }

    fn uint_be(&mut self, width: usize) -> Result<u32, DecodeError> {
        Ok(self
            .take(width)?
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
    }
}

/// A back-reference: repeat `len` bytes starting `distance` bytes behind the write position
#[derive(Debug, Copy, Clone)]
struct BackReference {
    len: usize,
    distance: usize,
}

enum Token {
    Block { literal: usize, copy: Option<BackReference> },
    End { literal: usize },
}

fn next_token(input: &mut Input<'_>) -> Result<Token, DecodeError> {
    let c = input.byte()?;
    Ok(match c {
        0x00..=0x7F => {
            let b1 = input.byte()?;
            Token::Block {
                literal: c & 0x03,
                copy: Some(BackReference {
                    len: ((c & 0x1C) >> 2) + 3,
                    distance: ((c & 0x60) << 3) + b1 + 1,
                }),
            }
        }
        0x80..=0xBF => {
            let b1 = input.byte()?;
            let b2 = input.byte()?;
            Token::Block {
                literal: (b1 & 0xC0) >> 6,
                copy: Some(BackReference {
                    len: (c & 0x3F) + 4,
                    distance: ((b1 & 0x3F) << 8) + b2 + 1,
                }),
            }
        }
        0xC0..=0xDF => {
            let b1 = input.byte()?;
            let b2 = input.byte()?;
            let b3 = input.byte()?;
            Token::Block {
                literal: c & 0x03,
                copy: Some(BackReference {
                    len: ((c & 0x0C) << 6) + b3 + 5,
                    distance: ((c & 0x10) << 12) + (b1 << 8) + b2 + 1,
                }),
            }
        }
        0xE0..=0xFB => Token::Block {
            literal: ((c & 0x1F) << 2) + 4,
            copy: None,
        },
        _ => Token::End { literal: c & 0x03 },
    })
}

/// Most bytes one token can write: 3 literals and a 1028 byte copy, or a 112 byte literal run
const MAX_TOKEN_OUTPUT: usize = 1031;

fn reserve(out: &[u8], count: usize, size: usize) -> Result<(), DecodeError> {
    let needed = out.len() + count;
    if needed > size {
        return Err(DecodeError::OutputOverflow { needed, size });
    }
    Ok(())
}

/// Decompress a RefPack stream.
///
/// The size in the stream header is authoritative: `expected_size`, when given, must agree with
/// it. Decoding stops at the terminal token or once the output reaches that size, and the output
/// is always exactly that size.
#[instrument(skip(data), fields(len = data.len()), err)]
pub fn decompress(data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>, DecodeError> {
    let header = RefPackHeader::parse(data)?;
    let size = header.uncompressed_size as usize;
    if let Some(expected) = expected_size.filter(|&e| e != size) {
        return Err(DecodeError::SizeMismatch {
            expected,
            actual: size,
        });
    }

    let mut input = Input::new(data);
    input.position = header.len;
    let mut out = Vec::with_capacity(size.min(data.len().saturating_mul(MAX_TOKEN_OUTPUT)));

    while out.len() < size {
        let (literal, copy, last) = match next_token(&mut input)? {
            Token::Block { literal, copy } => (literal, copy, false),
            Token::End { literal } => (literal, None, true),
        };

        reserve(&out, literal, size)?;
        out.extend_from_slice(input.take(literal)?);

        if let Some(BackReference { len, distance }) = copy {
            if distance > out.len() {
                return Err(DecodeError::InvalidBackReference {
                    distance,
                    position: out.len(),
                });
            }
            reserve(&out, len, size)?;

            let start = out.len() - distance;
            if len <= distance {
                out.extend_from_within(start..start + len);
            } else {
                for i in start..start + len {
                    let b = out[i];
                    out.push(b);
                }
            }
        }

        if last {
            break;
        }
    }

    if out.len() != size {
        return Err(DecodeError::SizeMismatch {
            expected: size,
            actual: out.len(),
        });
    }

    Ok(out)
}
