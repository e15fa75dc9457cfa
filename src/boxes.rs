use serde::Serialize;
use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const FTYP: FourCC = FourCC(*b"ftyp");
    pub const MOOV: FourCC = FourCC(*b"moov");
    pub const MDAT: FourCC = FourCC(*b"mdat");

    pub fn from_str(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Some(FourCC([b[0], b[1], b[2], b[3]]))
        } else { None }
    }
    pub fn as_str_lossy(&self) -> String {
        self.0.iter().map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
}
impl fmt::Debug for FourCC { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str_lossy()) } }
impl fmt::Display for FourCC { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str_lossy()) } }

impl Serialize for FourCC {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.as_str_lossy())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoxHeader {
    pub start: u64,         // absolute offset of header start
    pub size: u64,          // total size including header, or 0=to end of file
    pub typ: FourCC,
    pub header_size: u64,   // 8, or 16 with a 64-bit size
}

impl BoxHeader {
    /// True when the header declared `size == 0` ("extends to end of file").
    pub fn extends_to_eof(&self) -> bool {
        self.size == 0
    }

    /// Resolve a to-EOF size against the container length.
    pub fn resolved_size(&self, total_size: u64) -> u64 {
        if self.size == 0 { total_size.saturating_sub(self.start) } else { self.size }
    }
}

/// Where the `moov` box sits in a source, and what the scan saw before it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoovLocation {
    pub found: bool,
    /// Absolute offset of the moov header; 0 when not found.
    pub offset: u64,
    /// Total moov size including header; 0 when not found.
    pub size: u64,
    /// moov precedes every mdat, so playback can start from the head.
    pub is_mobile_compatible: bool,
    pub found_mdat_first: bool,
    /// Top-level headers parsed during the scan.
    pub boxes_scanned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MoovLocation {
    pub fn found(offset: u64, size: u64, found_mdat_first: bool, boxes_scanned: usize) -> Self {
        MoovLocation {
            found: true,
            offset,
            size,
            is_mobile_compatible: !found_mdat_first,
            found_mdat_first,
            boxes_scanned,
            error: None,
        }
    }

    pub fn not_found(found_mdat_first: bool, boxes_scanned: usize) -> Self {
        MoovLocation {
            found_mdat_first,
            boxes_scanned,
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        MoovLocation {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}
