use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::record::StudentRecord;
use crate::slot::{self, SLOT_SIZE};

/// The backing file: a flat run of fixed-size slots, always read and
/// written as a whole.
#[derive(Debug, Clone)]
pub struct RecordFile {
    path: PathBuf,
}

impl RecordFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RecordFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut s: OsString = self.path.as_os_str().to_owned();
        s.push(suffix);
        PathBuf::from(s)
    }

    pub fn temp_path(&self) -> PathBuf {
        self.with_suffix(".tmp")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.with_suffix(".lock")
    }

    /// Missing or empty file loads as an empty dataset. A trailing partial
    /// slot is dropped.
    pub fn load_all(&self) -> StoreResult<Vec<StudentRecord>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "records file not found; empty dataset");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(StoreError::StorageRead {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let trailing = bytes.len() % SLOT_SIZE;
        if trailing != 0 {
            warn!(
                path = %self.path.display(),
                trailing_bytes = trailing,
                "records file is not a whole number of slots; ignoring the tail"
            );
        }

        let records: Vec<StudentRecord> = bytes.chunks_exact(SLOT_SIZE).map(slot::decode).collect();
        debug!(path = %self.path.display(), count = records.len(), "loaded records");
        Ok(records)
    }

    /// Replaces the file with exactly `records`, in order. The slots go to a
    /// temp file first which is renamed over the original once complete.
    pub fn save_all(&self, records: &[StudentRecord]) -> StoreResult<()> {
        for r in records.iter().filter(|r| !r.is_derived_consistent()) {
            warn!(roll = r.roll, "saving record whose derived fields do not match its marks");
        }

        let tmp = self.temp_path();
        if let Err((written, source)) = write_slots(&tmp, records) {
            let _ = std::fs::remove_file(&tmp);
            return Err(StoreError::StorageWrite {
                path: self.path.clone(),
                written,
                expected: records.len(),
                source: Some(source),
            });
        }

        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(StoreError::StorageWrite {
                path: self.path.clone(),
                written: records.len(),
                expected: records.len(),
                source: Some(e),
            });
        }

        debug!(path = %self.path.display(), count = records.len(), "saved records");
        Ok(())
    }

    /// Exclusive advisory lock guarding one load-mutate-save cycle.
    pub fn lock(&self) -> StoreResult<FileLock> {
        let lock_path = self.lock_path();
        FileLock::acquire(&lock_path).map_err(|e| StoreError::StorageRead {
            path: lock_path,
            source: e,
        })
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn write_slots(path: &Path, records: &[StudentRecord]) -> Result<(), (usize, std::io::Error)> {
    ensure_parent(path).map_err(|e| (0, e))?;
    let mut file = File::create(path).map_err(|e| (0, e))?;

    let mut written = 0usize;
    for r in records {
        file.write_all(&slot::encode(r)).map_err(|e| (written, e))?;
        written += 1;
    }
    file.flush().map_err(|e| (written, e))?;
    file.sync_all().map_err(|e| (written, e))?;
    Ok(())
}

/// Held for the lifetime of one operation; unlocked on drop.
pub struct FileLock {
    file: File,
}

impl FileLock {
    pub fn acquire(lock_path: &Path) -> std::io::Result<Self> {
        ensure_parent(lock_path)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let fd = file.as_raw_fd();
            loop {
                // Blocks until any other holder releases the lock.
                let rc = unsafe { libc::flock(fd, libc::LOCK_EX) };
                if rc == 0 {
                    break;
                }
                let e = std::io::Error::last_os_error();
                if e.kind() != ErrorKind::Interrupted {
                    return Err(e);
                }
            }
        }

        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let fd = self.file.as_raw_fd();
            unsafe {
                libc::flock(fd, libc::LOCK_UN);
            }
        }
    }
}
