use std::path::PathBuf;
use std::time::Duration;

/// A regular file recorded by the walk. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

/// Formats a run duration for the closing `Elapsed:` line.
pub fn format_human_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    match secs {
        0 => format!("{}ms", elapsed.as_millis()),
        1..60 => format!("{secs}.{millis:03}s"),
        60..3600 => format!("{}m {:02}.{millis:03}s", secs / 60, secs % 60),
        _ => format!(
            "{}h {:02}m {:02}s",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        ),
    }
}
