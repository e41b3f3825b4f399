//! Segment identity, file naming and the ordered segment set.

use crate::error::{CoreError, CoreResult};
use crate::types::SequenceNumber;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tidewal_storage::StorageProvider;

/// Extension of index files.
pub const INDEX_EXTENSION: &str = "idx";

/// Extension of log files.
pub const LOG_EXTENSION: &str = "log";

/// Digits in a segment file stem.
const NAME_WIDTH: usize = 20;

/// Returns the index file name for a segment, e.g. `00000000000000000100.idx`.
#[must_use]
pub fn index_file_name(first_seq: SequenceNumber) -> String {
    format!("{:020}.{INDEX_EXTENSION}", first_seq.as_u64())
}

/// Returns the log file name for a segment, e.g. `00000000000000000100.log`.
#[must_use]
pub fn log_file_name(first_seq: SequenceNumber) -> String {
    format!("{:020}.{LOG_EXTENSION}", first_seq.as_u64())
}

/// Parses a segment file name back into its first sequence number.
///
/// Only names produced by [`index_file_name`] or [`log_file_name`] parse.
#[must_use]
pub fn parse_file_name(name: &str) -> Option<SequenceNumber> {
    let (stem, ext) = name.split_once('.')?;
    if ext != INDEX_EXTENSION && ext != LOG_EXTENSION {
        return None;
    }
    if stem.len() != NAME_WIDTH || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok().map(SequenceNumber::new)
}

/// A segment: its first sequence number and the paths of its file pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    first_seq: SequenceNumber,
    index_path: PathBuf,
    log_path: PathBuf,
}

impl SegmentInfo {
    /// Describes the segment starting at `first_seq` under `root`.
    #[must_use]
    pub fn new(root: &Path, first_seq: SequenceNumber) -> Self {
        Self {
            first_seq,
            index_path: root.join(index_file_name(first_seq)),
            log_path: root.join(log_file_name(first_seq)),
        }
    }

    /// Smallest sequence number the segment may hold.
    #[must_use]
    pub fn first_seq(&self) -> SequenceNumber {
        self.first_seq
    }

    /// Path of the index file.
    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Path of the log file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

/// Segments ordered ascending by first sequence number.
///
/// Segments are only ever added at the end.
#[derive(Debug, Clone, Default)]
pub struct SegmentSet {
    segments: Vec<SegmentInfo>,
}

impl SegmentSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the set from the segment files found under `root`.
    ///
    /// A segment is present if either of its files is; the missing half is
    /// created when the segment is opened. Unrelated files are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn discover(provider: &dyn StorageProvider, root: &Path) -> CoreResult<Self> {
        let mut first_seqs = BTreeSet::new();
        for path in provider.list(root)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(seq) = parse_file_name(name) {
                first_seqs.insert(seq);
            }
        }

        Ok(Self {
            segments: first_seqs
                .into_iter()
                .map(|seq| SegmentInfo::new(root, seq))
                .collect(),
        })
    }

    /// Adds a segment after every existing one.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] unless `info` starts after the
    /// current last segment.
    pub fn push(&mut self, info: SegmentInfo) -> CoreResult<usize> {
        if let Some(last) = self.segments.last() {
            if info.first_seq() <= last.first_seq() {
                return Err(CoreError::invalid_argument(format!(
                    "segment {} does not follow last segment {}",
                    info.first_seq(),
                    last.first_seq()
                )));
            }
        }
        self.segments.push(info);
        Ok(self.segments.len() - 1)
    }

    /// Position of the last segment whose first sequence number is at or
    /// before `seq`.
    #[must_use]
    pub fn locate(&self, seq: SequenceNumber) -> Option<usize> {
        let after = self.segments.partition_point(|s| s.first_seq() <= seq);
        after.checked_sub(1)
    }

    /// Segment at `position`.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&SegmentInfo> {
        self.segments.get(position)
    }

    /// First sequence number of the segment after `position`, if any.
    ///
    /// Together with the segment's own first sequence number this bounds the
    /// half-open range `[first_seq, next_first_seq)` it covers.
    #[must_use]
    pub fn next_first_seq(&self, position: usize) -> Option<SequenceNumber> {
        self.segments.get(position + 1).map(SegmentInfo::first_seq)
    }

    /// Most recent segment.
    #[must_use]
    pub fn last(&self) -> Option<&SegmentInfo> {
        self.segments.last()
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether there are no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &SegmentInfo> {
        self.segments.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewal_storage::InMemoryProvider;

    fn set_of(seqs: &[u64]) -> SegmentSet {
        let mut set = SegmentSet::new();
        for &seq in seqs {
            set.push(SegmentInfo::new(Path::new("/wal"), SequenceNumber::new(seq)))
                .unwrap();
        }
        set
    }

    #[test]
    fn file_names_are_zero_padded() {
        let seq = SequenceNumber::new(100);
        assert_eq!(index_file_name(seq), "00000000000000000100.idx");
        assert_eq!(log_file_name(seq), "00000000000000000100.log");
        assert_eq!(parse_file_name("00000000000000000100.log"), Some(seq));
        assert_eq!(
            parse_file_name(&index_file_name(SequenceNumber::new(u64::MAX))),
            Some(SequenceNumber::new(u64::MAX))
        );
    }

    #[test]
    fn foreign_names_do_not_parse() {
        for name in [
            "LOCK",
            "FILTER",
            "FILTER.tmp",
            "100.log",
            "0000000000000000010x.log",
            "00000000000000000100.dat",
            "00000000000000000100.log.bak",
            "99999999999999999999.log",
        ] {
            assert_eq!(parse_file_name(name), None, "{name} parsed");
        }
    }

    #[test]
    fn locate_finds_last_segment_at_or_before() {
        let set = set_of(&[0, 100, 250]);
        assert_eq!(set.locate(SequenceNumber::new(180)), Some(1));
        assert_eq!(set.locate(SequenceNumber::new(250)), Some(2));
        assert_eq!(set.locate(SequenceNumber::new(0)), Some(0));
        assert_eq!(set.locate(SequenceNumber::new(99)), Some(0));
        assert_eq!(set.locate(SequenceNumber::new(10_000)), Some(2));

        let later = set_of(&[10, 100]);
        assert_eq!(later.locate(SequenceNumber::new(5)), None);
        assert_eq!(SegmentSet::new().locate(SequenceNumber::new(5)), None);
    }

    #[test]
    fn push_requires_ascending_order() {
        let mut set = set_of(&[0, 100]);
        assert!(set
            .push(SegmentInfo::new(Path::new("/wal"), SequenceNumber::new(100)))
            .is_err());
        assert!(set
            .push(SegmentInfo::new(Path::new("/wal"), SequenceNumber::new(50)))
            .is_err());
        assert_eq!(
            set.push(SegmentInfo::new(Path::new("/wal"), SequenceNumber::new(101)))
                .unwrap(),
            2
        );
        assert_eq!(set.next_first_seq(0), Some(SequenceNumber::new(100)));
        assert_eq!(set.next_first_seq(2), None);
    }

    #[test]
    fn discover_pairs_files_and_skips_others() {
        let provider = InMemoryProvider::new();
        let root = Path::new("/wal");
        for name in [
            "00000000000000000250.log",
            "00000000000000000000.idx",
            "00000000000000000000.log",
            "00000000000000000100.idx",
            "LOCK",
        ] {
            provider.open(&root.join(name)).unwrap();
        }

        let set = SegmentSet::discover(&provider, root).unwrap();
        let firsts: Vec<u64> = set.iter().map(|s| s.first_seq().as_u64()).collect();
        assert_eq!(firsts, vec![0, 100, 250]);
        assert_eq!(
            set.get(1).unwrap().log_path(),
            Path::new("/wal/00000000000000000100.log")
        );
    }
}
