//! scan -> extract -> probe -> classify, for one source at a time.

use crate::boxes::MoovLocation;
use crate::classify::{PlaybackRecommendation, classify};
use crate::config::AnalyzerConfig;
use crate::extract::{ExtractError, ExtractOptions, extract_moov_fragment};
use crate::probe::{Prober, StreamProfile};
use crate::scanner::{ScanOptions, find_moov_box};
use crate::source::RangeSource;
use serde::Serialize;
use tracing::{info, warn};

#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("extracting moov fragment: {0}")]
    Extract(#[from] ExtractError),
}

/// Everything one run found, ready to serialize for a caller.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub location: MoovLocation,
    pub analysis: StreamProfile,
    pub recommendation: PlaybackRecommendation,
}

#[derive(Debug, Clone)]
pub struct VideoAnalyzer {
    scan: ScanOptions,
    extract: ExtractOptions,
    prober: Prober,
}

impl VideoAnalyzer {
    pub fn new(scan: ScanOptions, extract: ExtractOptions, prober: Prober) -> Self {
        VideoAnalyzer { scan, extract, prober }
    }

    pub fn from_config(cfg: &AnalyzerConfig) -> Self {
        VideoAnalyzer::new(cfg.scan_options(), cfg.extract_options(), cfg.prober())
    }

    pub fn prober(&self) -> &Prober {
        &self.prober
    }

    /// Locate moov only.
    pub async fn locate<S: RangeSource + ?Sized>(&self, source: &S, total_size: u64) -> MoovLocation {
        find_moov_box(source, total_size, &self.scan).await
    }

    /// Analyze with a location the caller already has.
    ///
    /// Only extraction failures are returned as errors; a missing moov or an
    /// unprobeable fragment is an ordinary `detected: false` profile.
    pub async fn analyze_located<S: RangeSource + ?Sized>(
        &self,
        source: &S,
        location: &MoovLocation,
    ) -> Result<StreamProfile, AnalysisError> {
        if !location.found {
            let msg = location.error.clone().unwrap_or_else(|| "moov box not found".to_string());
            return Ok(StreamProfile::undetected(msg));
        }

        let fragment =
            extract_moov_fragment(source, location.offset, location.size, &self.extract).await?;
        let profile = self.prober.analyze_fragment(fragment.path()).await;
        fragment.cleanup();

        Ok(profile.with_moov(location.is_mobile_compatible, location.offset))
    }

    pub async fn analyze<S: RangeSource + ?Sized>(
        &self,
        source: &S,
        total_size: u64,
    ) -> Result<StreamProfile, AnalysisError> {
        let location = self.locate(source, total_size).await;
        self.analyze_located(source, &location).await
    }

    /// Full run. Extraction failures degrade to "analysis unavailable".
    pub async fn report<S: RangeSource + ?Sized>(
        &self,
        source: &S,
        total_size: u64,
        has_mobile_variant: bool,
    ) -> Report {
        let location = self.locate(source, total_size).await;
        let analysis = match self.analyze_located(source, &location).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "analysis unavailable");
                StreamProfile::undetected(e.to_string())
            }
        };
        let recommendation = classify(&location, Some(&analysis), has_mobile_variant);
        info!(strategy = %recommendation.strategy, reason = recommendation.reason, "playback recommendation");
        Report { location, analysis, recommendation }
    }
}

impl Default for VideoAnalyzer {
    fn default() -> Self {
        VideoAnalyzer::from_config(&AnalyzerConfig::default())
    }
}
