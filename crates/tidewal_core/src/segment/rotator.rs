//! Switching the write target between segments.

use crate::error::{CoreError, CoreResult};
use crate::segment::set::SegmentInfo;
use crate::segment::store::{SegmentStore, StoreState};
use crate::types::SequenceNumber;
use tidewal_storage::{StorageBackend, StorageProvider};

/// The index and log handles of one segment, opened together.
pub(super) struct SegmentHandles {
    pub(super) index: Box<dyn StorageBackend>,
    pub(super) log: Box<dyn StorageBackend>,
}

impl SegmentHandles {
    /// Opens the index, then the log, both create-or-append.
    ///
    /// If the log cannot be opened the index handle is released before the
    /// error is returned, so a failed open leaves nothing behind.
    pub(super) fn open(provider: &dyn StorageProvider, info: &SegmentInfo) -> CoreResult<Self> {
        let index = provider.open(info.index_path())?;
        match provider.open(info.log_path()) {
            Ok(log) => Ok(Self { index, log }),
            Err(e) => {
                if let Err(release) = index.close() {
                    tracing::warn!(
                        path = %info.index_path().display(),
                        error = %release,
                        "releasing index after failed log open"
                    );
                }
                Err(e.into())
            }
        }
    }
}

impl SegmentStore {
    /// Opens the last segment for writing and points the write cursor at it.
    ///
    /// Returns the segment's first sequence number, or `None` when there are
    /// no segments yet.
    ///
    /// # Errors
    ///
    /// Returns a storage error if either file cannot be opened (nothing is
    /// left open), and [`CoreError::InvalidOperation`] if a segment is
    /// already active.
    pub fn open_initial_segment(&mut self) -> CoreResult<Option<SequenceNumber>> {
        self.ensure_writable()?;
        if self.state == StoreState::Active {
            return Err(CoreError::invalid_operation("a segment is already active"));
        }

        let Some(position) = self.segments.len().checked_sub(1) else {
            return Ok(None);
        };
        let Some(info) = self.segments.get(position).cloned() else {
            return Ok(None);
        };

        let handles = SegmentHandles::open(self.provider.as_ref(), &info)?;
        self.install(position, handles);
        tracing::debug!(first_seq = %info.first_seq(), "opened initial segment");
        Ok(Some(info.first_seq()))
    }

    /// Makes the segment covering `target` the write segment.
    ///
    /// The covering segment is the last one whose first sequence number is at
    /// or before `target`. The current pair is released log first (synced
    /// unless durability is `SkipFsync`), then the covering pair is opened.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NoCoveringSegment`] if every segment starts after
    ///   `target`; the current pair stays open and the cursor is unchanged.
    /// - A storage error if syncing the log fails; likewise nothing changes.
    /// - [`CoreError::SegmentsTorn`] if anything fails after a handle was
    ///   released. The store then refuses writes until reopened.
    pub fn rotate_to(&mut self, target: SequenceNumber) -> CoreResult<SequenceNumber> {
        self.ensure_writable()?;

        let position = self
            .segments
            .locate(target)
            .ok_or(CoreError::NoCoveringSegment { seq: target })?;
        let info = self
            .segments
            .get(position)
            .cloned()
            .ok_or(CoreError::NoCoveringSegment { seq: target })?;

        let had_active = self.index.is_some() || self.log.is_some();
        let previous = self.active_segment().map(SegmentInfo::first_seq);

        self.close_active()?;

        let handles = match SegmentHandles::open(self.provider.as_ref(), &info) {
            Ok(handles) => handles,
            Err(e) if had_active => {
                return Err(self.tear(format!(
                    "opening segment {} failed after closing the previous one: {e}",
                    info.first_seq()
                )))
            }
            Err(e) => return Err(e),
        };

        self.install(position, handles);
        tracing::info!(
            from = ?previous.map(SequenceNumber::as_u64),
            to = %info.first_seq(),
            %target,
            "rotated write segment"
        );
        Ok(info.first_seq())
    }

    fn install(&mut self, position: usize, handles: SegmentHandles) {
        self.index = Some(handles.index);
        self.log = Some(handles.log);
        self.write_cursor = Some(position);
        self.state = StoreState::Active;
    }
}
