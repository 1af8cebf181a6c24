use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "find-file-dups")]
#[command(about = "Find duplicate files by content and move the extra copies to the trash")]
pub struct Cli {
    /// Configuration file (JSON, or TOML when it ends in .toml)
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Root directory to scan (overrides the config file)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Directory name to ignore (repeatable)
    #[arg(long = "ignore-dir", value_name = "NAME")]
    pub ignore_dirs: Vec<String>,

    /// File extension to ignore (repeatable)
    #[arg(long = "ignore-ext", value_name = "EXT")]
    pub ignore_exts: Vec<String>,

    /// Path to ignore, absolute or relative to the root (repeatable)
    #[arg(long = "ignore-path", value_name = "PATH")]
    pub ignore_paths: Vec<String>,

    /// Automatically answer yes to all prompts
    #[arg(short, long)]
    pub yes: bool,

    /// Number of files hashed in parallel (default: number of CPU cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Skip files smaller than this many bytes
    #[arg(short, long, default_value = "0")]
    pub min_size: u64,

    /// Also compare files byte for byte when they are smaller than this many bytes (0 disables)
    #[arg(long, default_value = "0", value_name = "BYTES")]
    pub verify_below: u64,

    /// Where to write the list of duplicate files
    #[arg(long, default_value = "duplicates.log")]
    pub log_file: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
