//! Stream metadata through an external prober (`ffprobe`).
//!
//! Only the first video stream is requested. Probing a synthetic fragment can
//! hang on malformed input, so every run is bounded by a timeout that kills
//! the child process.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("probe exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },
    #[error("probe terminated by signal: {stderr}")]
    Killed { stderr: String },
    #[error("waiting for probe failed: {0}")]
    Wait(#[source] std::io::Error),
    #[error("invalid probe output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("No video stream found")]
    NoVideoStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoovPosition {
    BeforeMdat,
    AfterMdat,
}

/// Decoded video stream metadata, or the reason it could not be decoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamProfile {
    pub detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_mobile_compatible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moov_position: Option<MoovPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moov_offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamProfile {
    pub fn undetected(error: impl Into<String>) -> Self {
        StreamProfile { error: Some(error.into()), ..Default::default() }
    }

    /// Copy the box-ordering verdict onto a detected profile.
    pub fn with_moov(mut self, is_mobile_compatible: bool, moov_offset: u64) -> Self {
        if self.detected {
            self.is_mobile_compatible = Some(is_mobile_compatible);
            self.moov_position = Some(if is_mobile_compatible {
                MoovPosition::BeforeMdat
            } else {
                MoovPosition::AfterMdat
            });
            self.moov_offset = Some(moov_offset);
        }
        self
    }
}

// ---- prober JSON ----------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    profile: Option<Loose>,
    level: Option<Loose>,
    width: Option<Loose>,
    height: Option<Loose>,
    duration: Option<Loose>,
    bit_rate: Option<Loose>,
}

/// ffprobe prints some numbers as JSON strings ("duration": "12.5").
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Loose {
    Num(serde_json::Number),
    Text(String),
}

impl Loose {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Loose::Num(n) => n.as_f64(),
            Loose::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Loose::Num(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Loose::Text(s) => {
                let s = s.trim();
                s.parse().ok().or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
        }
    }

    fn as_text(&self) -> String {
        match self {
            Loose::Num(n) => n.to_string(),
            Loose::Text(s) => s.clone(),
        }
    }
}

/// Turn prober JSON into a profile of its first video stream.
pub fn parse_probe_output(json: &str) -> Result<StreamProfile, ProbeError> {
    let out: ProbeOutput = serde_json::from_str(json)?;
    let stream = out
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref().is_none_or(|t| t == "video"))
        .ok_or(ProbeError::NoVideoStream)?;

    Ok(StreamProfile {
        detected: true,
        profile: stream.profile.as_ref().map(Loose::as_text),
        level: stream.level.as_ref().and_then(Loose::as_i64),
        width: stream.width.as_ref().and_then(Loose::as_i64).and_then(|v| u32::try_from(v).ok()),
        height: stream.height.as_ref().and_then(Loose::as_i64).and_then(|v| u32::try_from(v).ok()),
        codec: stream.codec_name,
        duration: Some(stream.duration.as_ref().and_then(Loose::as_f64).unwrap_or(0.0)),
        bit_rate: Some(
            stream
                .bit_rate
                .as_ref()
                .and_then(Loose::as_i64)
                .and_then(|v| u64::try_from(v).ok())
                .unwrap_or(0),
        ),
        ..Default::default()
    })
}

// ---- process ----------------------------------------------------------

/// Runs the prober binary against local files.
#[derive(Debug, Clone)]
pub struct Prober {
    program: PathBuf,
    timeout: Duration,
}

impl Prober {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Prober { program: program.into(), timeout }
    }

    /// Use `ffprobe` from `PATH`, or the bare name if `which` cannot find it.
    pub fn from_path(timeout: Duration) -> Self {
        let program = which::which("ffprobe").unwrap_or_else(|_| PathBuf::from("ffprobe"));
        Prober { program, timeout }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe `path`, keeping every failure mode distinct.
    pub async fn probe(&self, path: &Path) -> Result<StreamProfile, ProbeError> {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_streams",
            "-select_streams", "v:0",
        ]);
        cmd.arg(path);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // dropping the wait future on timeout must take the process with it
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| ProbeError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(res) => res.map_err(ProbeError::Wait)?,
            Err(_elapsed) => return Err(ProbeError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(match output.status.code() {
                Some(code) => ProbeError::Failed { code, stderr },
                None => ProbeError::Killed { stderr },
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(path = %path.display(), bytes = stdout.len(), "probe output");
        parse_probe_output(&stdout)
    }

    /// Probe `path`; any failure becomes `detected: false` with its message.
    pub async fn analyze_fragment(&self, path: &Path) -> StreamProfile {
        match self.probe(path).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "stream analysis failed");
                StreamProfile::undetected(e.to_string())
            }
        }
    }
}

impl Default for Prober {
    fn default() -> Self {
        Prober::from_path(DEFAULT_PROBE_TIMEOUT)
    }
}
