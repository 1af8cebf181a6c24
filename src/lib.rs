pub mod cli;
pub mod config;
pub mod context;
pub mod duplicates;
pub mod error;
pub mod filter;
pub mod hasher;
pub mod logging;
pub mod pipeline;
pub mod recycle;
pub mod scanner;
pub mod utils;

pub use cli::Cli;
pub use config::{Config, RawConfig};
pub use context::{ProgressSink, ScanContext, SpinnerProgress};
pub use duplicates::{DuplicateReport, DuplicateSet, Fingerprint};
pub use error::DedupeError;
pub use filter::{Decision, IgnoreConfig, PathFilter};
pub use hasher::{full_hash, sample_hash};
pub use pipeline::{PipelineOptions, ScanPipeline, ScanSummary, find_duplicates};
pub use scanner::{SizeGroups, group_by_size};
pub use utils::{FileRecord, format_human_elapsed};
