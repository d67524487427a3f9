//! File transfer primitive: buffered copy, durable flush, content
//! fingerprinting, and retry on transient OS errors.
//!
//! Opens are retried only on a fixed allow-list of transient conditions
//! (interrupted call, resource temporarily unavailable, low-level I/O
//! error, device busy). Anything else surfaces immediately so real errors
//! are never masked.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use xxhash_rust::xxh64::Xxh64;

/// Maximum attempts for opening or creating a file.
pub const OPEN_MAX_ATTEMPTS: u32 = 5;
/// Delay between open/create attempts.
pub const OPEN_RETRY_DELAY: Duration = Duration::from_millis(200);
/// Maximum attempts for flushing the destination to durable storage.
pub const FLUSH_MAX_ATTEMPTS: u32 = 3;
/// Delay between flush attempts.
pub const FLUSH_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Read chunk size used while fingerprinting.
const FINGERPRINT_BUF_SIZE: usize = 64 * 1024;

/// Whether an I/O error is a transient OS-level condition worth retrying.
#[cfg(unix)]
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EINTR | libc::EAGAIN | libc::EIO | libc::EBUSY)
    )
}

#[cfg(not(unix))]
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

/// Run `op` up to `max_attempts` times, sleeping `delay` between attempts,
/// retrying only when `retryable` accepts the error.
pub fn retry<T, F, R>(max_attempts: u32, delay: Duration, retryable: R, mut op: F) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
    R: Fn(&io::Error) -> bool,
{
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && retryable(&e) => {
                log::debug!("Transient I/O error (attempt {attempt}/{max_attempts}): {e}");
                attempt += 1;
                thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Open `path` for reading, retrying transient failures.
pub fn open_with_retry(path: &Path) -> io::Result<File> {
    retry(OPEN_MAX_ATTEMPTS, OPEN_RETRY_DELAY, is_transient, || {
        File::open(path)
    })
}

/// Create (truncate) `path` for writing, retrying transient failures.
pub fn create_with_retry(path: &Path) -> io::Result<File> {
    retry(OPEN_MAX_ATTEMPTS, OPEN_RETRY_DELAY, is_transient, || {
        File::create(path)
    })
}

/// Stream a file's full contents through a 64-bit xxh64 hash.
///
/// Returns the digest and the byte count observed while reading. The hash
/// is a fingerprint only, not a collision-resistant identity.
pub fn compute_fingerprint(path: &Path) -> io::Result<(u64, u64)> {
    let mut file = File::open(path)?;
    let mut hasher = Xxh64::new(0);
    let mut buf = vec![0u8; FINGERPRINT_BUF_SIZE];
    let mut size: u64 = 0;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((size, hasher.digest()))
}

/// Copy `src` to `dst` through the caller-supplied buffer.
///
/// Ensures the destination's parent directory exists, truncates any
/// existing destination content, and flushes the result to durable
/// storage (with retry) before closing. Returns the bytes copied.
pub fn transfer(src: &Path, dst: &Path, buf: &mut [u8]) -> io::Result<u64> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut reader = open_with_retry(src)?;
    let mut writer = create_with_retry(dst)?;

    let mut copied: u64 = 0;
    loop {
        let n = reader.read(buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        copied += n as u64;
    }

    // Flush failures are retried unconditionally; exhaustion is fatal for
    // this file.
    retry(FLUSH_MAX_ATTEMPTS, FLUSH_RETRY_DELAY, |_| true, || {
        writer.sync_all()
    })?;

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;

    #[test]
    fn fingerprint_matches_size_and_is_content_sensitive() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, b"hello").unwrap();
        fs::write(&b, b"world").unwrap();

        let (size_a, hash_a) = compute_fingerprint(&a).unwrap();
        let (size_b, hash_b) = compute_fingerprint(&b).unwrap();
        assert_eq!(size_a, 5);
        assert_eq!(size_b, 5);
        assert_ne!(hash_a, hash_b);

        // Same content, same fingerprint.
        let c = dir.path().join("c.txt");
        fs::write(&c, b"hello").unwrap();
        assert_eq!(compute_fingerprint(&c).unwrap(), (size_a, hash_a));
    }

    #[test]
    fn fingerprint_streaming_matches_one_shot() {
        let dir = tempdir().unwrap();
        let big = dir.path().join("big.bin");
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&big, &content).unwrap();

        let (size, hash) = compute_fingerprint(&big).unwrap();
        assert_eq!(size, content.len() as u64);
        assert_eq!(hash, xxhash_rust::xxh64::xxh64(&content, 0));
    }

    #[test]
    fn fingerprint_of_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(compute_fingerprint(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn transfer_creates_parents_and_truncates() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("nested/deep/dst.txt");
        fs::write(&src, b"fresh").unwrap();

        let mut buf = vec![0u8; 8];
        let copied = transfer(&src, &dst, &mut buf).unwrap();
        assert_eq!(copied, 5);
        assert_eq!(fs::read(&dst).unwrap(), b"fresh");

        // Overwrite with shorter content; the old bytes must not survive.
        fs::write(&src, b"hi").unwrap();
        let copied = transfer(&src, &dst, &mut buf).unwrap();
        assert_eq!(copied, 2);
        assert_eq!(fs::read(&dst).unwrap(), b"hi");
    }

    #[test]
    fn retry_stops_on_non_retryable_error() {
        let attempts = AtomicU32::new(0);
        let result: io::Result<()> = retry(
            5,
            Duration::from_millis(0),
            |_| false,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            },
        );
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retry_exhausts_then_surfaces_the_error() {
        let attempts = AtomicU32::new(0);
        let result: io::Result<()> = retry(
            3,
            Duration::from_millis(0),
            |_| true,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(io::Error::new(io::ErrorKind::Other, "still broken"))
            },
        );
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn retry_recovers_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result = retry(
            5,
            Duration::from_millis(0),
            |_| true,
            || {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(io::Error::new(io::ErrorKind::Interrupted, "try again"))
                } else {
                    Ok(7u32)
                }
            },
        );
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
