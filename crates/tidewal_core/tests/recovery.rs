//! Integration tests for WAL recovery on the local file system.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;
use tidewal_core::{
    CoreError, Durability, FilterConfig, ReplaySummary, SequenceNumber, WalConfig, WalManager,
};

fn seq(n: u64) -> SequenceNumber {
    SequenceNumber::new(n)
}

fn files_with_extension(dir: &Path, ext: &str) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(ext))
        .collect();
    names.sort();
    names
}

#[test]
fn reopen_resumes_after_last_entry() {
    let dir = tempdir().unwrap();
    let config = WalConfig::new(dir.path()).durability(Durability::SkipFsync);

    {
        let wal = WalManager::open(config.clone()).unwrap();
        for n in 1..=10 {
            wal.append(seq(n), format!("row-{n}").as_bytes()).unwrap();
        }
    }

    let wal = WalManager::open(config).unwrap();
    assert_eq!(wal.first_seq(), Some(seq(1)));
    assert_eq!(wal.last_seq(), Some(seq(10)));
    assert!(matches!(
        wal.append(seq(10), b"again"),
        Err(CoreError::SequenceOutOfOrder { .. })
    ));

    wal.append(seq(11), b"row-11").unwrap();
    assert_eq!(wal.read(seq(11)).unwrap().unwrap(), b"row-11");
    assert_eq!(wal.read(seq(4)).unwrap().unwrap(), b"row-4");
}

#[test]
fn segments_roll_over_into_new_file_pairs() {
    let dir = tempdir().unwrap();
    let config = WalConfig::new(dir.path())
        .durability(Durability::SkipFsync)
        .max_segment_size(100);
    let wal = WalManager::open(config).unwrap();

    // 72-byte records: two fit under the limit before it is reached.
    for n in 1..=6 {
        wal.append(seq(n), &[b'x'; 50]).unwrap();
    }
    assert_eq!(wal.segment_count(), 3);
    wal.close().unwrap();

    assert_eq!(
        files_with_extension(dir.path(), ".idx"),
        vec![
            "00000000000000000001.idx",
            "00000000000000000003.idx",
            "00000000000000000005.idx",
        ]
    );
    assert_eq!(files_with_extension(dir.path(), ".log").len(), 3);

    let seqs: Vec<u64> = wal
        .iter_from(seq(2))
        .map(|e| e.unwrap().seq.as_u64())
        .collect();
    assert_eq!(seqs, vec![2, 3, 4, 5, 6]);
}

#[test]
fn torn_tail_is_repaired_on_open() {
    let dir = tempdir().unwrap();
    let config = WalConfig::new(dir.path()).durability(Durability::SkipFsync);

    {
        let wal = WalManager::open(config.clone()).unwrap();
        for n in 1..=3 {
            wal.append(seq(n), b"payload").unwrap();
        }
    }

    let index_path = dir.path().join("00000000000000000001.idx");
    let log_path = dir.path().join("00000000000000000001.log");
    OpenOptions::new()
        .append(true)
        .open(&index_path)
        .unwrap()
        .write_all(&[0xEE; 9])
        .unwrap();
    OpenOptions::new()
        .append(true)
        .open(&log_path)
        .unwrap()
        .write_all(b"TWAL half a record")
        .unwrap();

    let wal = WalManager::open(config).unwrap();
    assert_eq!(wal.last_seq(), Some(seq(3)));
    assert_eq!(wal.stats().tail_repairs, 1);
    assert_eq!(fs::metadata(&index_path).unwrap().len(), 60);

    wal.append(seq(4), b"after repair").unwrap();
    assert_eq!(wal.replay(seq(0), |_, _| Ok(())).unwrap(), 4);
}

#[test]
fn corrupt_entry_stops_replay() {
    let dir = tempdir().unwrap();
    let config = WalConfig::new(dir.path()).durability(Durability::SkipFsync);

    {
        let wal = WalManager::open(config.clone()).unwrap();
        for n in 1..=3 {
            wal.append(seq(n), b"payload").unwrap();
        }
    }

    // Flip a payload byte of the first record; the tail stays intact.
    let log_path = dir.path().join("00000000000000000001.log");
    let mut bytes = fs::read(&log_path).unwrap();
    bytes[20] ^= 0x01;
    fs::write(&log_path, bytes).unwrap();

    let wal = WalManager::open(config).unwrap();
    let mut applied = Vec::new();
    let result = wal.replay(seq(0), |s, _| {
        applied.push(s);
        Ok(())
    });
    assert!(matches!(result, Err(CoreError::ChecksumMismatch { .. })));
    assert!(applied.is_empty());
}

#[test]
fn filter_checkpoint_survives_reopen() {
    let dir = tempdir().unwrap();
    let config = WalConfig::new(dir.path())
        .durability(Durability::SkipFsync)
        .dedup(FilterConfig::new(1000, 0.001));

    {
        let wal = WalManager::open(config.clone()).unwrap();
        for n in 1..=5 {
            wal.append(seq(n), format!("row-{n}").as_bytes()).unwrap();
        }
        let summary = wal.replay_dedup(seq(0), |_, _| Ok(())).unwrap();
        assert_eq!(
            summary,
            ReplaySummary {
                applied: 5,
                skipped: 0
            }
        );
        wal.checkpoint_filter().unwrap();
        assert_eq!(wal.stats().filter_checkpoints, 1);
    }
    assert!(dir.path().join("FILTER").exists());

    let wal = WalManager::open(config).unwrap();
    wal.with_filter(|f| assert_eq!(f.unwrap().element_count(), 5));
    wal.append(seq(6), b"row-6").unwrap();

    let mut applied = Vec::new();
    let summary = wal
        .replay_dedup(seq(0), |s, _| {
            applied.push(s.as_u64());
            Ok(())
        })
        .unwrap();
    assert_eq!(summary.skipped, 5);
    assert_eq!(applied, vec![6]);
}

#[test]
fn malformed_checkpoint_fails_open() {
    let dir = tempdir().unwrap();
    let config = WalConfig::new(dir.path()).dedup(FilterConfig::default());
    fs::write(dir.path().join("FILTER"), [0u8; 4]).unwrap();

    assert!(WalManager::open(config).is_err());
}

#[test]
fn second_open_is_locked_out() {
    let dir = tempdir().unwrap();
    let config = WalConfig::new(dir.path());

    let wal = WalManager::open(config.clone()).unwrap();
    assert!(matches!(
        WalManager::open(config.clone()),
        Err(CoreError::WalLocked)
    ));

    drop(wal);
    WalManager::open(config).unwrap();
}

#[test]
fn missing_directory_without_create_is_rejected() {
    let dir = tempdir().unwrap();
    let config = WalConfig::new(dir.path().join("absent")).create_if_missing(false);
    assert!(matches!(
        WalManager::open(config),
        Err(CoreError::InvalidArgument { .. })
    ));
}
