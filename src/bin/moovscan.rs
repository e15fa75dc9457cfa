use anyhow::Context;
use clap::{ArgAction, Parser};
use moovscan::{AnalyzerConfig, FileSource, MoovLocation, RangeSource, Report, VideoAnalyzer};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Locate the moov box and check mobile playback readiness")]
struct Args {
    /// MP4/ISOBMFF file path
    path: PathBuf,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Top-level boxes to walk before giving up
    #[arg(long)]
    max_boxes: Option<usize>,

    /// Prober timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Prober binary (default: ffprobe on PATH)
    #[arg(long)]
    ffprobe: Option<PathBuf>,

    /// Directory for temporary fragments
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// A pre-transcoded mobile variant exists for this video
    #[arg(long, action = ArgAction::SetTrue)]
    mobile_variant: bool,

    /// Only locate moov; skip extraction and probing
    #[arg(long, action = ArgAction::SetTrue)]
    scan_only: bool,

    /// Output as JSON instead of human-readable text
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

fn load_config(args: &Args) -> anyhow::Result<AnalyzerConfig> {
    let mut cfg = match &args.config {
        Some(path) => AnalyzerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };
    if let Some(n) = args.max_boxes {
        cfg.max_boxes_to_scan = n;
    }
    if let Some(t) = args.timeout {
        cfg.probe_timeout_secs = t;
    }
    if let Some(p) = &args.ffprobe {
        cfg.ffprobe_path = Some(p.clone());
    }
    if let Some(d) = &args.temp_dir {
        cfg.temp_dir = Some(d.clone());
    }
    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the result; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cfg = load_config(&args)?;
    let analyzer = VideoAnalyzer::from_config(&cfg);

    let source = FileSource::open(&args.path)
        .await
        .with_context(|| format!("opening {}", args.path.display()))?;
    let total_size = source.total_size().await?;

    if args.scan_only {
        let location = analyzer.locate(&source, total_size).await;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&location)?);
        } else {
            print_location(&args.path, &location);
        }
        return Ok(());
    }

    let report = analyzer.report(&source, total_size, args.mobile_variant).await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_location(&args.path, &report.location);
        print_report(&report);
    }
    Ok(())
}

// ---- human-readable output -----------------------------------------

fn print_location(path: &std::path::Path, loc: &MoovLocation) {
    println!("File: {}", path.display());
    if let Some(e) = &loc.error {
        println!("Scan error: {}", e);
    }
    if !loc.found {
        println!("moov: not found ({} boxes scanned)", loc.boxes_scanned);
        return;
    }
    println!("moov: offset {} size {}", loc.offset, loc.size);
    println!(
        "Layout: {}",
        if loc.found_mdat_first { "mdat before moov" } else { "moov before mdat (fast start)" }
    );
}

fn print_report(report: &Report) {
    let a = &report.analysis;
    if a.detected {
        println!("Video:");
        if let Some(codec) = &a.codec {
            println!("  codec: {}", codec);
        }
        if let Some(profile) = &a.profile {
            match a.level {
                Some(level) => println!("  profile: {} (level {})", profile, level),
                None => println!("  profile: {}", profile),
            }
        }
        if let (Some(w), Some(h)) = (a.width, a.height) {
            println!("  size: {}x{}", w, h);
        }
        if let Some(d) = a.duration {
            println!("  duration: {:.3} s", d);
        }
        if let Some(br) = a.bit_rate {
            println!("  bit rate: {} b/s", br);
        }
    } else if let Some(e) = &a.error {
        println!("Analysis: unavailable ({})", e);
    }
    println!(
        "Strategy: {} ({})",
        report.recommendation.strategy, report.recommendation.reason
    );
}
