//! Sample sink: one per target core. A file pre-sized to `max_samples`
//! records, memory-mapped writable, sequential-access advised, and
//! page-populated so the hot loop never faults, grows, or syscalls for
//! I/O. Reaching capacity is a termination condition, not an error.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};

use crate::error::SamplerError;
use crate::record::{Record, RECORD_SIZE};

/// A pre-sized, memory-mapped output file receiving one core's records in
/// production order.
pub struct SampleSink {
    path: PathBuf,
    file: std::fs::File,
    map: MmapMut,
    capacity: u64,
    cursor: u64,
}

impl SampleSink {
    /// Create (or truncate) `path`, extend it to `max_samples * RECORD_SIZE`
    /// bytes, map it writable with shared visibility, and advise the
    /// kernel of sequential access.
    pub fn create(path: impl AsRef<Path>, max_samples: u64) -> Result<Self, SamplerError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| SamplerError::SinkCreate {
                path: path.clone(),
                source,
            })?;

        let byte_len = max_samples * RECORD_SIZE as u64;
        file.set_len(byte_len)
            .map_err(|source| SamplerError::SinkCreate {
                path: path.clone(),
                source,
            })?;

        // SAFETY: the file is exclusively owned by this sink for the run's
        // lifetime; no other process is expected to mutate it concurrently.
        let map = unsafe {
            MmapOptions::new()
                .len(byte_len as usize)
                .populate()
                .map_mut(&file)
                .map_err(|source| SamplerError::SinkMap {
                    path: path.clone(),
                    source,
                })?
        };
        map.advise(memmap2::Advice::Sequential)
            .map_err(|source| SamplerError::SinkMap {
                path: path.clone(),
                source,
            })?;

        Ok(SampleSink {
            path,
            file,
            map,
            capacity: max_samples,
            cursor: 0,
        })
    }

    /// Number of records written so far.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Total records this sink can hold.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Whether the sink has no remaining capacity.
    pub fn is_full(&self) -> bool {
        self.cursor >= self.capacity
    }

    /// Write `record` at the current cursor and advance it.
    ///
    /// # Panics
    /// Panics if the sink is already full; callers must check
    /// [`SampleSink::is_full`] first, per the hot loop's per-core skip.
    pub fn append(&mut self, record: Record) {
        assert!(!self.is_full(), "sink for {:?} is full", self.path);
        let offset = self.cursor as usize * RECORD_SIZE;
        self.map[offset..offset + RECORD_SIZE].copy_from_slice(&record.to_bytes());
        self.cursor += 1;
    }

    /// Truncate the file to the actual record count, unmap, and close.
    pub fn close(self) -> Result<(), SamplerError> {
        // Dropping `map` before truncating matches the teacher's
        // unmap-then-truncate order and avoids the platform-dependent
        // question of truncating a file underneath a live mapping.
        drop(self.map);
        let actual_len = self.cursor * RECORD_SIZE as u64;
        self.file
            .set_len(actual_len)
            .map_err(|source| SamplerError::SinkCreate {
                path: self.path.clone(),
                source,
            })
    }
}
