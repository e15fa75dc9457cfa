use crate::boxes::MoovLocation;
use crate::probe::StreamProfile;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStrategy {
    /// Compatibility unknown; let the player try the original.
    TryOriginalFirst,
    /// moov precedes mdat, the original streams from its head.
    OriginalPreferred,
    /// moov trails mdat and a pre-transcoded variant exists.
    MobilePreferred,
    /// moov trails mdat and nothing better exists; queue a transcode.
    NeedsConversion,
}

impl PlaybackStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStrategy::TryOriginalFirst => "try_original_first",
            PlaybackStrategy::OriginalPreferred => "original_preferred",
            PlaybackStrategy::MobilePreferred => "mobile_preferred",
            PlaybackStrategy::NeedsConversion => "needs_conversion",
        }
    }
}

impl fmt::Display for PlaybackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackRecommendation {
    pub strategy: PlaybackStrategy,
    pub reason: &'static str,
}

/// Pick a playback strategy from box ordering and stream analysis.
///
/// Compatibility counts as known only when `moov` was located and the stream
/// profile was decoded; everything else falls back to `try_original_first`.
pub fn classify(
    location: &MoovLocation,
    profile: Option<&StreamProfile>,
    has_mobile_variant: bool,
) -> PlaybackRecommendation {
    let known = location.found && profile.is_some_and(|p| p.detected);

    let (strategy, reason) = if !known {
        (PlaybackStrategy::TryOriginalFirst, "compatibility unknown")
    } else if location.is_mobile_compatible {
        (PlaybackStrategy::OriginalPreferred, "moov precedes mdat")
    } else if has_mobile_variant {
        (PlaybackStrategy::MobilePreferred, "moov trails mdat; mobile variant available")
    } else {
        (PlaybackStrategy::NeedsConversion, "moov trails mdat; no mobile variant")
    };

    PlaybackRecommendation { strategy, reason }
}
