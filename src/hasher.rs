//! 64-bit xxHash fingerprints of file contents.
//!
//! [`sample_hash`] is the cheap screen: it reads at most three windows of
//! [`SAMPLE_WINDOW`] bytes. [`full_hash`] streams the whole file and is only
//! run on files that already collided on size and sample.

use std::cell::RefCell;
use std::fs::File;
use std::hash::Hasher;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;
use twox_hash::XxHash64;

use crate::error::{DedupeError, Result};

pub const SAMPLE_WINDOW: usize = 16 << 10;

const FULL_BUFFER: usize = 64 << 10;
const SEED: u64 = 0;

thread_local! {
    static SCRATCH: RefCell<Vec<u8>> = RefCell::new(vec![0; SAMPLE_WINDOW]);
}

/// Fills `buf` from `reader` until it is full or the reader is exhausted.
/// Returns the number of bytes read.
fn read_window(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Fingerprint of the start, middle and end windows of a file.
///
/// Files no larger than one window are covered entirely by the first read.
/// Short reads are hashed as read, without padding.
pub fn sample_hash(path: &Path) -> Result<u64> {
    let read_err = |e: io::Error| DedupeError::read(path, e);

    let mut file = File::open(path).map_err(read_err)?;
    let size = file.metadata().map_err(read_err)?.len();
    let window = SAMPLE_WINDOW as u64;

    SCRATCH.with_borrow_mut(|buffer| {
        let mut hasher = XxHash64::with_seed(SEED);

        let n = read_window(&mut file, buffer).map_err(read_err)?;
        hasher.write(&buffer[..n]);

        if size > window {
            for offset in [size / 2 - window / 2, size - window] {
                file.seek(SeekFrom::Start(offset)).map_err(read_err)?;
                let n = read_window(&mut file, buffer).map_err(read_err)?;
                hasher.write(&buffer[..n]);
            }
        }

        let hash = hasher.finish();
        debug!("Sample hash for '{}': {:016x}", path.display(), hash);
        Ok(hash)
    })
}

/// Fingerprint of the entire file contents.
pub fn full_hash(path: &Path) -> Result<u64> {
    let read_err = |e: io::Error| DedupeError::read(path, e);

    let mut file = File::open(path).map_err(read_err)?;
    let mut hasher = XxHash64::with_seed(SEED);
    let mut buffer = vec![0; FULL_BUFFER];
    let mut total_bytes = 0u64;

    loop {
        let n = read_window(&mut file, &mut buffer).map_err(read_err)?;
        if n == 0 {
            break;
        }
        hasher.write(&buffer[..n]);
        total_bytes += n as u64;
    }

    let hash = hasher.finish();
    debug!(
        "Full hash for '{}': {:016x} ({} bytes)",
        path.display(),
        hash,
        total_bytes
    );
    Ok(hash)
}

/// Byte-for-byte comparison of two files.
pub fn files_equal(a: &Path, b: &Path) -> Result<bool> {
    let mut file_a = File::open(a).map_err(|e| DedupeError::read(a, e))?;
    let mut file_b = File::open(b).map_err(|e| DedupeError::read(b, e))?;
    let mut buf_a = vec![0; FULL_BUFFER];
    let mut buf_b = vec![0; FULL_BUFFER];

    loop {
        let n_a = read_window(&mut file_a, &mut buf_a).map_err(|e| DedupeError::read(a, e))?;
        let n_b = read_window(&mut file_b, &mut buf_b).map_err(|e| DedupeError::read(b, e))?;
        if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
        if n_a == 0 {
            return Ok(true);
        }
    }
}
