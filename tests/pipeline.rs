#![cfg(unix)]

use moovscan::{
    AnalyzerConfig, FileSource, MemorySource, MoovPosition, PlaybackStrategy, RangeSource,
    VideoAnalyzer,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const PROBE_JSON: &str = r#"{"streams":[{"codec_type":"video","codec_name":"h264",
"profile":"High","level":40,"width":1920,"height":1080,"duration":"10.0","bit_rate":"800000"}]}"#;

fn boxed(typ: &[u8; 4], size: u32) -> Vec<u8> {
    let mut v = Vec::with_capacity(size as usize);
    v.extend_from_slice(&size.to_be_bytes());
    v.extend_from_slice(typ);
    v.resize(size as usize, 0);
    v
}

fn layout(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.iter().flatten().copied().collect()
}

fn fake_prober(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-ffprobe");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Analyzer whose fragments land in `frag_dir` and whose prober runs `body`.
fn analyzer(tools: &Path, frag_dir: &Path, body: &str) -> VideoAnalyzer {
    let cfg = AnalyzerConfig {
        ffprobe_path: Some(fake_prober(tools, body)),
        temp_dir: Some(frag_dir.to_path_buf()),
        probe_timeout_secs: 2,
        ..Default::default()
    };
    VideoAnalyzer::from_config(&cfg)
}

fn leftover_fragments(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn fast_start_file_is_detected_and_cleaned_up() {
    let tools = tempfile::tempdir().unwrap();
    let frags = tempfile::tempdir().unwrap();
    let json = tools.path().join("probe.json");
    std::fs::write(&json, PROBE_JSON).unwrap();
    let a = analyzer(tools.path(), frags.path(), &format!("cat '{}'", json.display()));

    let src = MemorySource::new(layout(&[boxed(b"ftyp", 32), boxed(b"moov", 1024), boxed(b"mdat", 8192)]));
    let profile = a.analyze(&src, src.len()).await.unwrap();

    assert!(profile.detected);
    assert_eq!(profile.codec.as_deref(), Some("h264"));
    assert_eq!(profile.is_mobile_compatible, Some(true));
    assert_eq!(profile.moov_position, Some(MoovPosition::BeforeMdat));
    assert_eq!(profile.moov_offset, Some(32));
    assert_eq!(leftover_fragments(frags.path()), 0);

    let v = serde_json::to_value(&profile).unwrap();
    assert_eq!(v["bitRate"], 800000);
    assert_eq!(v["moovPosition"], "before_mdat");
}

#[tokio::test]
async fn trailing_moov_report_without_variant() {
    let tools = tempfile::tempdir().unwrap();
    let frags = tempfile::tempdir().unwrap();
    let json = tools.path().join("probe.json");
    std::fs::write(&json, PROBE_JSON).unwrap();
    let a = analyzer(tools.path(), frags.path(), &format!("cat '{}'", json.display()));

    let video = tools.path().join("video.mp4");
    std::fs::write(&video, layout(&[boxed(b"ftyp", 32), boxed(b"mdat", 8192), boxed(b"moov", 1024)]))
        .unwrap();
    let src = FileSource::open(&video).await.unwrap();
    let total = src.total_size().await.unwrap();

    let report = a.report(&src, total, false).await;

    assert_eq!(report.location.offset, 32 + 8192);
    assert_eq!(report.analysis.moov_position, Some(MoovPosition::AfterMdat));
    assert_eq!(report.recommendation.strategy, PlaybackStrategy::NeedsConversion);

    let with_variant = a.report(&src, total, true).await;
    assert_eq!(with_variant.recommendation.strategy, PlaybackStrategy::MobilePreferred);
    assert_eq!(leftover_fragments(frags.path()), 0);
}

#[tokio::test]
async fn failing_prober_still_cleans_up() {
    let tools = tempfile::tempdir().unwrap();
    let frags = tempfile::tempdir().unwrap();
    let a = analyzer(tools.path(), frags.path(), "exit 1");

    let src = MemorySource::new(layout(&[boxed(b"ftyp", 32), boxed(b"moov", 256)]));
    let profile = a.analyze(&src, src.len()).await.unwrap();

    assert!(!profile.detected);
    assert!(profile.error.unwrap().contains("code 1"));
    assert_eq!(profile.moov_offset, None);
    assert_eq!(leftover_fragments(frags.path()), 0);
}

#[tokio::test]
async fn timed_out_prober_still_cleans_up() {
    let tools = tempfile::tempdir().unwrap();
    let frags = tempfile::tempdir().unwrap();
    let a = analyzer(tools.path(), frags.path(), "exec sleep 30");

    let src = MemorySource::new(layout(&[boxed(b"ftyp", 32), boxed(b"moov", 256)]));
    let report = a.report(&src, src.len(), true).await;

    assert!(!report.analysis.detected);
    assert_eq!(report.recommendation.strategy, PlaybackStrategy::TryOriginalFirst);
    assert_eq!(leftover_fragments(frags.path()), 0);
}

#[tokio::test]
async fn no_moov_skips_extraction() {
    let tools = tempfile::tempdir().unwrap();
    let frags = tempfile::tempdir().unwrap();
    let a = analyzer(tools.path(), frags.path(), "exit 1");

    let src = MemorySource::new(layout(&[boxed(b"ftyp", 32), boxed(b"mdat", 512)]));
    let report = a.report(&src, src.len(), false).await;

    assert!(!report.location.found);
    assert_eq!(report.analysis.error.as_deref(), Some("moov box not found"));
    assert_eq!(report.recommendation.strategy, PlaybackStrategy::TryOriginalFirst);
}

#[tokio::test]
async fn moov_past_eof_is_an_extraction_error() {
    let tools = tempfile::tempdir().unwrap();
    let frags = tempfile::tempdir().unwrap();
    let a = analyzer(tools.path(), frags.path(), "exit 1");

    // declares 4096 bytes of moov but the object ends early
    let mut data = layout(&[boxed(b"ftyp", 32), boxed(b"moov", 64)]);
    data[32..36].copy_from_slice(&4096u32.to_be_bytes());
    let src = MemorySource::new(data);

    let err = a.analyze(&src, src.len()).await.unwrap_err();
    assert!(err.to_string().contains("extracting moov fragment"));

    let report = a.report(&src, src.len(), true).await;
    assert_eq!(report.recommendation.strategy, PlaybackStrategy::TryOriginalFirst);
}
