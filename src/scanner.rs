//! Top-level box walk that locates `moov` through range reads.
//!
//! Each step fetches at most [`MAX_HEADER_SIZE`] bytes, so locating `moov`
//! at the tail of a multi-gigabyte file costs a handful of tiny requests.

use crate::boxes::{BoxHeader, FourCC, MoovLocation};
use crate::parser::{MAX_HEADER_SIZE, ParseError, read_box_header};
use crate::source::RangeSource;
use std::io::Cursor;
use tracing::{debug, info, warn};

/// Top-level boxes are few; this bounds pathological inputs.
pub const DEFAULT_MAX_BOXES_TO_SCAN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub max_boxes: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions { max_boxes: DEFAULT_MAX_BOXES_TO_SCAN }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("total size must be positive")]
    InvalidTotalSize,
    #[error("range read at offset {offset} failed: {source}")]
    Io {
        offset: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed box header at offset {offset} (box #{index}): {source}")]
    MalformedHeader {
        offset: u64,
        index: usize,
        #[source]
        source: ParseError,
    },
}

/// Walk top-level boxes until `moov` is found, keeping the taxonomy explicit.
///
/// `Ok` with `found == false` means the walk ended cleanly (end of source or
/// the scan limit) without meeting `moov`.
pub async fn try_find_moov_box<S: RangeSource + ?Sized>(
    source: &S,
    total_size: u64,
    opts: &ScanOptions,
) -> Result<MoovLocation, ScanError> {
    if total_size == 0 {
        return Err(ScanError::InvalidTotalSize);
    }

    let mut offset = 0u64;
    let mut index = 0usize;
    let mut found_mdat = false;

    while offset < total_size && index < opts.max_boxes {
        let h = read_header_at(source, offset, total_size, index).await?;
        let size = h.resolved_size(total_size);
        if h.extends_to_eof() {
            // only meaningful for the last box; anything after it is swallowed
            debug!(offset, typ = %h.typ, size, "box extends to end of source");
        }
        debug!(index, offset, typ = %h.typ, size, header_size = h.header_size, "box");

        if h.typ == FourCC::MOOV {
            info!(offset, size, found_mdat_first = found_mdat, "found moov");
            return Ok(MoovLocation::found(offset, size, found_mdat, index + 1));
        }
        if h.typ == FourCC::MDAT {
            found_mdat = true;
        }

        offset = offset.checked_add(size).ok_or_else(|| ScanError::MalformedHeader {
            offset,
            index,
            source: ParseError::InvalidSize { size, header_size: h.header_size },
        })?;
        index += 1;
    }

    if index >= opts.max_boxes && offset < total_size {
        info!(limit = opts.max_boxes, "scan limit reached without moov");
    } else {
        info!(boxes = index, "reached end of source without moov");
    }
    Ok(MoovLocation::not_found(found_mdat, index))
}

/// Locate `moov`, folding every failure into a not-found result.
///
/// I/O failures keep their message in `error`; malformed headers do not,
/// since they are routine for truncated or non-MP4 inputs.
pub async fn find_moov_box<S: RangeSource + ?Sized>(
    source: &S,
    total_size: u64,
    opts: &ScanOptions,
) -> MoovLocation {
    match try_find_moov_box(source, total_size, opts).await {
        Ok(loc) => loc,
        Err(ScanError::MalformedHeader { offset, index, source }) => {
            warn!(offset, index, error = %source, "stopping scan at malformed header");
            MoovLocation::not_found(false, index)
        }
        Err(e) => {
            warn!(error = %e, "moov scan failed");
            MoovLocation::failed(e.to_string())
        }
    }
}

async fn read_header_at<S: RangeSource + ?Sized>(
    source: &S,
    offset: u64,
    total_size: u64,
    index: usize,
) -> Result<BoxHeader, ScanError> {
    let end = offset.saturating_add(MAX_HEADER_SIZE - 1).min(total_size - 1);
    let bytes = source
        .read_range(offset, end)
        .await
        .map_err(|source| ScanError::Io { offset, source })?;

    let mut cur = Cursor::new(bytes.as_slice());
    match read_box_header(&mut cur) {
        Ok(mut h) => {
            h.start = offset;
            Ok(h)
        }
        Err(source) => {
            debug!(offset, bytes = %hex::encode(&bytes), "undecodable header");
            Err(ScanError::MalformedHeader { offset, index, source })
        }
    }
}
