//! Byte-range readable sources.
//!
//! The scanner and extractor only ever ask for small, inclusive byte ranges
//! plus the total object length, so anything that can serve partial content
//! (a local file, an object store with HTTP range requests, a buffer already
//! in memory) can sit behind [`RangeSource`].

use async_trait::async_trait;
use std::io::{self, ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Bytes for `[start, end]` inclusive, 0-indexed.
    async fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>>;

    /// Total object length in bytes.
    async fn total_size(&self) -> io::Result<u64>;
}

#[async_trait]
impl<T: RangeSource + ?Sized> RangeSource for &T {
    async fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        (**self).read_range(start, end).await
    }

    async fn total_size(&self) -> io::Result<u64> {
        (**self).total_size().await
    }
}

#[async_trait]
impl<T: RangeSource + ?Sized> RangeSource for Box<T> {
    async fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        (**self).read_range(start, end).await
    }

    async fn total_size(&self) -> io::Result<u64> {
        (**self).total_size().await
    }
}

fn check_range(start: u64, end: u64, len: u64) -> io::Result<u64> {
    if end < start {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("invalid range {start}-{end}"),
        ));
    }
    if start >= len {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            format!("range start {start} is past end of source ({len} bytes)"),
        ));
    }
    // clamp like an HTTP range request would
    Ok(end.min(len - 1))
}

/// A source backed by bytes already in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        MemorySource { data: data.into() }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl RangeSource for MemorySource {
    async fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let end = check_range(start, end, self.len())?;
        Ok(self.data[start as usize..=end as usize].to_vec())
    }

    async fn total_size(&self) -> io::Result<u64> {
        Ok(self.len())
    }
}

/// A local file read through fresh handles, one per range.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    len: u64,
}

impl FileSource {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = tokio::fs::metadata(&path).await?.len();
        Ok(FileSource { path, len })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RangeSource for FileSource {
    async fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let end = check_range(start, end, self.len)?;
        let mut f = tokio::fs::File::open(&self.path).await?;
        f.seek(SeekFrom::Start(start)).await?;
        let mut v = vec![0u8; (end - start + 1) as usize];
        f.read_exact(&mut v).await?;
        Ok(v)
    }

    async fn total_size(&self) -> io::Result<u64> {
        Ok(self.len)
    }
}
