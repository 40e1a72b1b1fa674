//! Rotating log-file writer.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

/// Size the live log file may reach before it is rotated away.
const MAX_LOG_SIZE: u64 = 2 * 1024 * 1024;

struct Inner {
    path: PathBuf,
    file: File,
    written: u64,
}

impl Inner {
    /// Rotates when the live file is over the cap: the previous `.bak` is
    /// removed, the live file becomes the new `.bak`, a fresh file starts.
    fn rotate_if_needed(&mut self) -> io::Result<()> {
        if self.written <= MAX_LOG_SIZE {
            return Ok(());
        }
        let backup = backup_path(&self.path);
        let _ = fs::remove_file(&backup);
        fs::rename(&self.path, &backup)?;
        self.file = open_append(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Log sink appending every record to a file and to standard error.
///
/// One mutex serialises producers at whole-record granularity, and rotation
/// happens inside that critical section.
#[derive(Clone)]
pub struct RotatingWriter {
    inner: Arc<Mutex<Inner>>,
}

impl RotatingWriter {
    /// Opens (or creates) the log file at `path`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the file cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                path,
                file,
                written,
            })),
        })
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        io::stderr().write_all(buf)?;
        inner.rotate_if_needed()?;
        inner.file.write_all(buf)?;
        inner.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        io::stderr().flush()?;
        inner.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new)]
mod tests {
    use super::*;

    #[test]
    fn appends_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.log");

        let mut writer = RotatingWriter::open(&path).unwrap();
        writer.write_all(b"first record\n").unwrap();
        writer.write_all(b"second record\n").unwrap();
        writer.flush().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first record\nsecond record\n");
    }

    #[test]
    fn rotates_past_the_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.log");

        let mut writer = RotatingWriter::open(&path).unwrap();
        let record = vec![b'x'; 64 * 1024];
        // push the live file past 2 MiB, then one more record forces rotation
        for _ in 0..33 {
            writer.write_all(&record).unwrap();
        }
        writer.write_all(b"fresh file\n").unwrap();
        writer.flush().unwrap();

        let backup = backup_path(&path);
        assert!(backup.exists());
        assert!(fs::metadata(&backup).unwrap().len() > MAX_LOG_SIZE);
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "fresh file\n");
    }

    #[test]
    fn rotation_replaces_the_previous_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.log");
        let backup = backup_path(&path);
        fs::write(&backup, b"stale backup").unwrap();

        let mut writer = RotatingWriter::open(&path).unwrap();
        let record = vec![b'y'; 64 * 1024];
        for _ in 0..33 {
            writer.write_all(&record).unwrap();
        }
        writer.write_all(b"after rotation\n").unwrap();

        let rotated = fs::read(&backup).unwrap();
        assert_ne!(rotated, b"stale backup");
    }

    #[test]
    fn reopening_accounts_for_existing_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.log");
        fs::write(&path, b"already here\n").unwrap();

        let mut writer = RotatingWriter::open(&path).unwrap();
        writer.write_all(b"appended\n").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "already here\nappended\n");
    }
}
