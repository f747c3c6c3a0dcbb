//! Binary → CSV decoder: streams each `profile_data_<core>.bin` file in a
//! directory in fixed-size chunks and writes a sibling CSV.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::error::DecoderError;
use crate::record::{Record, RECORD_SIZE};

pub const DEFAULT_CHUNK_SIZE: u64 = 1000;
pub const MAX_CHUNK_SIZE: u64 = 1_000_000;
const CSV_HEADER: &str = "Time,LLC-loads,LLC-misses,Instructions\n";

/// Outcome of decoding one directory: per-file results, in the order
/// encountered.
#[derive(Debug)]
pub struct DecodeReport {
    pub results: Vec<(PathBuf, Result<u64, DecoderError>)>,
}

impl DecodeReport {
    /// Whether any file failed to decode.
    pub fn any_failed(&self) -> bool {
        self.results.iter().any(|(_, r)| r.is_err())
    }
}

/// Parse the core id out of a `profile_data_<id>.bin` file name.
fn core_id_from_name(name: &str) -> Option<&str> {
    let rest = name.strip_prefix("profile_data_")?;
    let id = rest.strip_suffix(".bin")?;
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Some(id)
    } else {
        None
    }
}

/// Decode every matching binary file in `directory`. `chunk_size` defaults
/// to [`DEFAULT_CHUNK_SIZE`] and must be in `[1, MAX_CHUNK_SIZE]`.
pub fn decode_directory(
    directory: &Path,
    chunk_size: Option<u64>,
) -> Result<DecodeReport, DecoderError> {
    let chunk_size = chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(DecoderError::InvalidChunkSize {
            got: chunk_size,
            max: MAX_CHUNK_SIZE,
        });
    }

    let entries = std::fs::read_dir(directory).map_err(|source| DecoderError::ReadDir {
        path: directory.to_path_buf(),
        source,
    })?;

    let mut results = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(source) => {
                return Err(DecoderError::ReadDir {
                    path: directory.to_path_buf(),
                    source,
                })
            }
        };
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(core_id) = core_id_from_name(name) else {
            continue;
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let csv_path = directory.join(format!("profiling_results_{core_id}.csv"));
        let result = decode_one_file(&path, &csv_path, chunk_size);
        match &result {
            Ok(count) => info!("decoded {count} samples from {path:?} to {csv_path:?}"),
            Err(e) => error!("failed to decode {path:?}: {e}"),
        }
        results.push((path, result));
    }

    Ok(DecodeReport { results })
}

fn decode_one_file(
    bin_path: &Path,
    csv_path: &Path,
    chunk_size: u64,
) -> Result<u64, DecoderError> {
    let mut input = File::open(bin_path).map_err(|source| DecoderError::OpenInput {
        path: bin_path.to_path_buf(),
        source,
    })?;
    let mut output = File::create(csv_path).map_err(|source| DecoderError::CreateOutput {
        path: csv_path.to_path_buf(),
        source,
    })?;

    output
        .write_all(CSV_HEADER.as_bytes())
        .map_err(|source| DecoderError::Io {
            path: csv_path.to_path_buf(),
            source,
        })?;

    let mut chunk = vec![0u8; chunk_size as usize * RECORD_SIZE];
    let mut line = String::new();
    let mut total: u64 = 0;

    loop {
        let bytes_read = read_chunk(&mut input, &mut chunk, bin_path)?;
        if bytes_read == 0 {
            break;
        }
        if bytes_read % RECORD_SIZE != 0 {
            return Err(DecoderError::TruncatedRecord {
                path: bin_path.to_path_buf(),
                bytes: bytes_read % RECORD_SIZE,
            });
        }

        for record_bytes in chunk[..bytes_read].chunks_exact(RECORD_SIZE) {
            let record = Record::from_bytes(record_bytes);
            let time_us = record.real_time_ns / 1000;
            line.clear();
            use std::fmt::Write as _;
            let _ = writeln!(
                line,
                "{},{},{},{}",
                time_us, record.llc_loads, record.llc_misses, record.instr_retired
            );
            output
                .write_all(line.as_bytes())
                .map_err(|source| DecoderError::Io {
                    path: csv_path.to_path_buf(),
                    source,
                })?;
            total += 1;
        }
    }

    Ok(total)
}

/// Fill `buf` as full as possible from `input`, short only at EOF (handles
/// short reads from the underlying file system).
fn read_chunk(input: &mut File, buf: &mut [u8], path: &Path) -> Result<usize, DecoderError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = input
            .read(&mut buf[filled..])
            .map_err(|source| DecoderError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_chunk_size() {
        let dir = tempfile::tempdir().unwrap();
        let err = decode_directory(dir.path(), Some(0)).unwrap_err();
        assert!(matches!(err, DecoderError::InvalidChunkSize { .. }));
    }

    #[test]
    fn rejects_oversized_chunk_size() {
        let dir = tempfile::tempdir().unwrap();
        let err = decode_directory(dir.path(), Some(MAX_CHUNK_SIZE + 1)).unwrap_err();
        assert!(matches!(err, DecoderError::InvalidChunkSize { .. }));
    }

    #[test]
    fn core_id_parsing() {
        assert_eq!(core_id_from_name("profile_data_3.bin"), Some("3"));
        assert_eq!(core_id_from_name("profile_data_.bin"), None);
        assert_eq!(core_id_from_name("other.bin"), None);
    }
}
