//! End-to-end decoder tests against hand-built binary fixtures, covering
//! the testable properties of spec.md §8 that don't require MSR hardware.

use std::fs;
use std::path::Path;

use msr_sampler::decode::{decode_directory, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use msr_sampler::record::Record;
use tempfile::tempdir;

fn write_bin(dir: &Path, core_id: u32, records: &[Record]) {
    let path = dir.join(format!("profile_data_{core_id}.bin"));
    let mut bytes = Vec::new();
    for r in records {
        bytes.extend_from_slice(&r.to_bytes());
    }
    fs::write(path, bytes).unwrap();
}

fn rec(mono: u64, real: u64, loads: u64, misses: u64, instr: u64) -> Record {
    Record {
        monotonic_time_ns: mono,
        real_time_ns: real,
        llc_loads: loads,
        llc_misses: misses,
        instr_retired: instr,
    }
}

#[test]
fn csv_header_is_exact() {
    let dir = tempdir().unwrap();
    write_bin(dir.path(), 0, &[rec(1, 2_000, 3, 4, 5)]);

    decode_directory(dir.path(), None).unwrap();

    let csv = fs::read_to_string(dir.path().join("profiling_results_0.csv")).unwrap();
    let header = csv.lines().next().unwrap();
    assert_eq!(header, "Time,LLC-loads,LLC-misses,Instructions");
}

#[test]
fn csv_rows_match_records_verbatim() {
    let dir = tempdir().unwrap();
    write_bin(
        dir.path(),
        5,
        &[rec(0, 1_000_000, 10, 20, 30), rec(1, 2_000_000, 11, 21, 31)],
    );

    decode_directory(dir.path(), None).unwrap();

    let csv = fs::read_to_string(dir.path().join("profiling_results_5.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3); // header + 2 rows
    assert_eq!(lines[1], "1000,10,20,30");
    assert_eq!(lines[2], "2000,11,21,31");
}

#[test]
fn output_line_count_equals_record_count() {
    let dir = tempdir().unwrap();
    let records: Vec<Record> = (0..250).map(|i| rec(i, i * 1000, i, i, i)).collect();
    write_bin(dir.path(), 7, &records);

    decode_directory(dir.path(), Some(32)).unwrap();

    let csv = fs::read_to_string(dir.path().join("profiling_results_7.csv")).unwrap();
    assert_eq!(csv.lines().count(), 1 + records.len());
}

#[test]
fn idempotent_decode_produces_identical_output() {
    let dir = tempdir().unwrap();
    let records: Vec<Record> = (0..17).map(|i| rec(i, i * 37, i * 2, i * 3, i * 4)).collect();
    write_bin(dir.path(), 1, &records);

    decode_directory(dir.path(), None).unwrap();
    let first = fs::read(dir.path().join("profiling_results_1.csv")).unwrap();

    decode_directory(dir.path(), None).unwrap();
    let second = fs::read(dir.path().join("profiling_results_1.csv")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn cross_core_time_alignment_survives_decode() {
    let dir = tempdir().unwrap();
    let timestamps: Vec<(u64, u64)> = (0..10).map(|i| (i * 100, i * 100_000)).collect();

    for core_id in [2, 3, 4] {
        let records: Vec<Record> = timestamps
            .iter()
            .map(|&(mono, real)| rec(mono, real, core_id as u64, core_id as u64, core_id as u64))
            .collect();
        write_bin(dir.path(), core_id, &records);
    }

    decode_directory(dir.path(), None).unwrap();

    let times_for = |core_id: u32| -> Vec<String> {
        fs::read_to_string(dir.path().join(format!("profiling_results_{core_id}.csv")))
            .unwrap()
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap().to_string())
            .collect()
    };

    let t2 = times_for(2);
    let t3 = times_for(3);
    let t4 = times_for(4);
    assert_eq!(t2, t3);
    assert_eq!(t3, t4);
}

#[test]
fn rejects_zero_chunk_size_without_writing_output() {
    let dir = tempdir().unwrap();
    write_bin(dir.path(), 0, &[rec(0, 0, 0, 0, 0)]);

    let result = decode_directory(dir.path(), Some(0));
    assert!(result.is_err());
    assert!(!dir.path().join("profiling_results_0.csv").exists());
}

#[test]
fn rejects_oversized_chunk_size() {
    let dir = tempdir().unwrap();
    let result = decode_directory(dir.path(), Some(MAX_CHUNK_SIZE + 1));
    assert!(result.is_err());
}

#[test]
fn default_chunk_size_is_one_thousand() {
    assert_eq!(DEFAULT_CHUNK_SIZE, 1000);
}

#[test]
fn nonexistent_directory_is_an_error_with_no_output() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");
    let result = decode_directory(&missing, None);
    assert!(result.is_err());
}

#[test]
fn ignores_non_matching_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
    write_bin(dir.path(), 9, &[rec(0, 0, 1, 1, 1)]);

    let report = decode_directory(dir.path(), None).unwrap();
    assert_eq!(report.results.len(), 1);
    assert!(!report.any_failed());
}
