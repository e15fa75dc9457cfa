use crate::boxes::{BoxHeader, FourCC};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{ErrorKind, Read, Seek};

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("truncated box header")]
    Truncated,
    #[error("invalid box size {size} (header is {header_size} bytes)")]
    InvalidSize { size: u64, header_size: u64 },
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Minimum bytes needed to decode any header, including the 64-bit size.
pub const MAX_HEADER_SIZE: u64 = 16;

fn truncated(e: std::io::Error) -> ParseError {
    if e.kind() == ErrorKind::UnexpectedEof { ParseError::Truncated } else { ParseError::Io(e) }
}

/// Decode one box header at the reader's current position.
///
/// The returned `start` is the reader position before decoding, so callers
/// that parse a fetched slice add the slice's absolute offset themselves.
/// A size of 0 is returned as-is; resolving it needs the container length.
pub fn read_box_header<R: Read + Seek>(r: &mut R) -> Result<BoxHeader> {
    let start = r.stream_position()?;
    let size32 = r.read_u32::<BigEndian>().map_err(truncated)?;
    let mut typ = [0u8; 4];
    r.read_exact(&mut typ).map_err(truncated)?;
    let mut size = size32 as u64;

    let header_size = if size32 == 1 {
        size = r.read_u64::<BigEndian>().map_err(truncated)?;
        16
    } else {
        8
    };

    if size != 0 && size < header_size {
        return Err(ParseError::InvalidSize { size, header_size });
    }

    Ok(BoxHeader { start, size, typ: FourCC(typ), header_size })
}
