//! Full key-space traversal.
//!
//! [`AllKeys`] walks every physical key in encoded order from one read
//! snapshot. Keys are pulled from redb in small pages so the whole key space
//! never has to be materialised, and each page resumes just after the last
//! key of the previous one.

use std::collections::VecDeque;
use std::ops::{Bound, ControlFlow};

use crate::engine::Snapshot;
use crate::Result;

/// Number of keys fetched from the engine per page.
const PREFETCH_SIZE: usize = 100;

/// A physical key and whether the engine considers it deleted or expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStatus {
    /// Encoded key, bucket included.
    pub key: Vec<u8>,
    pub deleted_or_expired: bool,
}

/// Lazy, single-pass iterator over the whole key space.
///
/// Holds its read snapshot until dropped. After an error the iterator is
/// exhausted.
pub struct AllKeys {
    snapshot: Snapshot,
    resume: Bound<Vec<u8>>,
    buffer: VecDeque<KeyStatus>,
    finished: bool,
}

impl AllKeys {
    pub(crate) fn new(snapshot: Snapshot, start: Option<Vec<u8>>) -> Self {
        Self {
            snapshot,
            resume: start.map_or(Bound::Unbounded, Bound::Included),
            buffer: VecDeque::with_capacity(PREFETCH_SIZE),
            finished: false,
        }
    }

    fn fill_buffer(&mut self) -> Result<()> {
        let start = match &self.resume {
            Bound::Included(key) => Bound::Included(key.as_slice()),
            Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };

        let buffer = &mut self.buffer;
        let mut fetched = 0;
        self.snapshot.scan(start, false, |item| {
            buffer.push_back(KeyStatus {
                key: item.key().to_vec(),
                deleted_or_expired: item.is_deleted_or_expired(),
            });
            fetched += 1;

            if fetched == PREFETCH_SIZE {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        if fetched < PREFETCH_SIZE {
            self.finished = true;
        }
        if let Some(last) = self.buffer.back() {
            self.resume = Bound::Excluded(last.key.clone());
        }

        Ok(())
    }
}

impl Iterator for AllKeys {
    type Item = Result<KeyStatus>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(status) = self.buffer.pop_front() {
            return Some(Ok(status));
        }

        if self.finished {
            return None;
        }

        if let Err(err) = self.fill_buffer() {
            self.finished = true;
            return Some(Err(err));
        }

        self.buffer.pop_front().map(Ok)
    }
}
