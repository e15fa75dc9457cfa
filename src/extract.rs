//! Assembles a standalone `ftyp + moov + mdat` file from partial ranges.

use crate::boxes::FourCC;
use crate::parser::{MAX_HEADER_SIZE, read_box_header};
use crate::source::RangeSource;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// A zero-payload `mdat`, enough for probers that insist on sample data.
pub const EMPTY_MDAT: [u8; 8] = [0x00, 0x00, 0x00, 0x08, b'm', b'd', b'a', b't'];

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("moov size {0} is smaller than a box header")]
    InvalidMoovSize(u64),
    #[error("reading {what} at offset {offset} failed: {source}")]
    Read {
        what: &'static str,
        offset: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("{what} range at offset {offset} with length {len} overflows")]
    RangeOverflow { what: &'static str, offset: u64, len: u64 },
    #[error("short read for {what}: wanted {wanted} bytes, got {got}")]
    ShortRead { what: &'static str, wanted: u64, got: u64 },
    #[error("writing fragment failed: {0}")]
    Write(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Directory for the fragment; the system temp dir when `None`.
    pub temp_dir: Option<PathBuf>,
}

/// A synthesized fragment on disk. The file goes away with this value.
#[derive(Debug)]
pub struct Fragment {
    file: NamedTempFile,
    len: u64,
    ftyp_len: u64,
}

impl Fragment {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes contributed by the source's leading `ftyp` (0 when absent).
    pub fn ftyp_len(&self) -> u64 {
        self.ftyp_len
    }

    /// Delete the file now. Failures are logged, never returned.
    pub fn cleanup(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!(path = %path.display(), "removed fragment"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove fragment"),
        }
    }
}

/// Concatenate `ftyp` (if any), the `moov` bytes and an empty `mdat`.
pub fn build_fragment(ftyp: Option<&[u8]>, moov: &[u8]) -> Vec<u8> {
    let ftyp = ftyp.unwrap_or_default();
    let mut out = Vec::with_capacity(ftyp.len() + moov.len() + EMPTY_MDAT.len());
    out.extend_from_slice(ftyp);
    out.extend_from_slice(moov);
    out.extend_from_slice(&EMPTY_MDAT);
    out
}

async fn fetch<S: RangeSource + ?Sized>(
    source: &S,
    what: &'static str,
    offset: u64,
    len: u64,
) -> Result<Vec<u8>, ExtractError> {
    let end = offset
        .checked_add(len - 1)
        .ok_or(ExtractError::RangeOverflow { what, offset, len })?;
    let bytes = source
        .read_range(offset, end)
        .await
        .map_err(|source| ExtractError::Read { what, offset, source })?;
    if bytes.len() as u64 != len {
        return Err(ExtractError::ShortRead { what, wanted: len, got: bytes.len() as u64 });
    }
    Ok(bytes)
}

/// The leading `ftyp` box, if the source starts with one.
///
/// An `ftyp` that extends to EOF or past the object is ignored rather than
/// fetched: only the header bytes are ever read for it.
pub async fn read_leading_ftyp<S: RangeSource + ?Sized>(
    source: &S,
) -> Result<Option<Vec<u8>>, ExtractError> {
    let total = source
        .total_size()
        .await
        .map_err(|source| ExtractError::Read { what: "source size", offset: 0, source })?;
    if total < 8 {
        return Ok(None);
    }
    let head = source
        .read_range(0, MAX_HEADER_SIZE.min(total) - 1)
        .await
        .map_err(|source| ExtractError::Read { what: "ftyp header", offset: 0, source })?;

    let h = match read_box_header(&mut Cursor::new(head.as_slice())) {
        Ok(h) if h.typ == FourCC::FTYP => h,
        _ => return Ok(None),
    };
    if h.extends_to_eof() || h.size > total {
        warn!(size = h.size, total, "ignoring unusable ftyp");
        return Ok(None);
    }
    Ok(Some(fetch(source, "ftyp", 0, h.size).await?))
}

/// Build the minimal analyzable MP4 for the moov at `[moov_offset, moov_offset + moov_size)`.
///
/// Read failures are returned: without the moov bytes there is nothing to analyze.
pub async fn extract_moov_fragment<S: RangeSource + ?Sized>(
    source: &S,
    moov_offset: u64,
    moov_size: u64,
    opts: &ExtractOptions,
) -> Result<Fragment, ExtractError> {
    if moov_size < 8 {
        return Err(ExtractError::InvalidMoovSize(moov_size));
    }
    let total = source
        .total_size()
        .await
        .map_err(|source| ExtractError::Read { what: "source size", offset: 0, source })?;
    let available = total.saturating_sub(moov_offset);
    if moov_size > available {
        return Err(ExtractError::ShortRead { what: "moov", wanted: moov_size, got: available });
    }

    let ftyp = read_leading_ftyp(source).await?;
    let moov = fetch(source, "moov", moov_offset, moov_size).await?;
    let data = build_fragment(ftyp.as_deref(), &moov);

    let mut builder = tempfile::Builder::new();
    builder.prefix("moov-fragment-").suffix(".mp4");
    let mut file = match &opts.temp_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    file.write_all(&data)?;
    file.flush()?;

    let ftyp_len = ftyp.as_ref().map_or(0, |f| f.len() as u64);
    debug!(
        path = %file.path().display(),
        ftyp_len,
        moov_size,
        len = data.len(),
        "wrote moov fragment"
    );
    Ok(Fragment { file, len: data.len() as u64, ftyp_len })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_ends_with_empty_mdat() {
        let out = build_fragment(Some(&[1, 2, 3]), &[9; 20]);
        assert_eq!(out.len(), 3 + 20 + 8);
        assert_eq!(&out[out.len() - 8..], &[0, 0, 0, 8, 0x6d, 0x64, 0x61, 0x74]);
    }

    #[tokio::test]
    async fn fetch_rejects_overflowing_range() {
        let src = crate::source::MemorySource::new(vec![0u8; 32]);
        let err = fetch(&src, "moov", u64::MAX - 4, 16).await.unwrap_err();
        assert!(matches!(err, ExtractError::RangeOverflow { what: "moov", len: 16, .. }));
    }

    #[test]
    fn fragment_without_ftyp_starts_with_moov() {
        let out = build_fragment(None, &[7; 12]);
        assert_eq!(out.len(), 12 + 8);
        assert_eq!(out[0], 7);
    }
}
