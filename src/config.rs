//! Analyzer settings, loadable from TOML.
//!
//! ```toml
//! max_boxes_to_scan = 20
//! probe_timeout_secs = 10
//! ffprobe_path = "/usr/bin/ffprobe"
//! temp_dir = "/tmp/moovscan"
//! ```

use crate::extract::ExtractOptions;
use crate::probe::{DEFAULT_PROBE_TIMEOUT, Prober};
use crate::scanner::{DEFAULT_MAX_BOXES_TO_SCAN, ScanOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    pub max_boxes_to_scan: usize,
    pub probe_timeout_secs: u64,
    /// Prober binary; looked up on `PATH` when unset.
    pub ffprobe_path: Option<PathBuf>,
    /// Where fragments are written; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            max_boxes_to_scan: DEFAULT_MAX_BOXES_TO_SCAN,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT.as_secs(),
            ffprobe_path: None,
            temp_dir: None,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: AnalyzerConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_boxes_to_scan == 0 {
            return Err(ConfigError::Invalid("max_boxes_to_scan must be at least 1"));
        }
        if self.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid("probe_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions { max_boxes: self.max_boxes_to_scan }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions { temp_dir: self.temp_dir.clone() }
    }

    pub fn prober(&self) -> Prober {
        match &self.ffprobe_path {
            Some(p) => Prober::new(p.clone(), self.probe_timeout()),
            None => Prober::from_path(self.probe_timeout()),
        }
    }
}
