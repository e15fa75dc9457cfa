pub mod analysis;
pub mod boxes;
pub mod classify;
pub mod config;
pub mod extract;
pub mod parser;
pub mod probe;
pub mod scanner;
pub mod source;

pub use analysis::{AnalysisError, Report, VideoAnalyzer};
pub use boxes::{BoxHeader, FourCC, MoovLocation};
pub use classify::{PlaybackRecommendation, PlaybackStrategy, classify};
pub use config::{AnalyzerConfig, ConfigError};
pub use extract::{ExtractError, ExtractOptions, Fragment, build_fragment, extract_moov_fragment};
pub use parser::{ParseError, read_box_header};
pub use probe::{MoovPosition, ProbeError, Prober, StreamProfile};
pub use scanner::{ScanError, ScanOptions, find_moov_box, try_find_moov_box};
pub use source::{FileSource, MemorySource, RangeSource};
