//! Copy-on-write overlay ("deposit") di atas `StateStore` lain.
//!
//! Semua write masuk ke buffer lokal; parent tidak disentuh sampai caller
//! mengambil batch lewat [`Deposit::into_batch`] dan menerapkannya ke parent
//! dengan `write_batch`. `discard()` (atau drop) membuang semuanya.
//!
//! ```text
//! base store ◄── block deposit ◄── tx deposit ◄── vm call deposit
//! ```
//!
//! Parent dipinjam secara shared, jadi deposit juga bisa dibangun di atas
//! snapshot read-only (constant call, dry-run validation).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter::Peekable;

use super::{KvIter, StateStore, Table, WriteOp};
use crate::error::StoreResult;

/// `None` value = tombstone.
type Overlay = BTreeMap<(Table, Vec<u8>), Option<Vec<u8>>>;

pub struct Deposit<'p> {
    parent: &'p dyn StateStore,
    writes: Overlay,
}

impl<'p> Deposit<'p> {
    pub fn new(parent: &'p dyn StateStore) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    /// True if anything was written since creation.
    pub fn is_dirty(&self) -> bool {
        !self.writes.is_empty()
    }

    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Consume the overlay and return its writes in key order, ready for
    /// `parent.write_batch(..)`.
    pub fn into_batch(self) -> Vec<WriteOp> {
        self.writes
            .into_iter()
            .map(|((table, key), value)| match value {
                Some(value) => WriteOp::Put { table, key, value },
                None => WriteOp::Delete { table, key },
            })
            .collect()
    }

    /// Drop every buffered write.
    pub fn discard(self) {}
}

impl StateStore for Deposit<'_> {
    fn get(&self, table: Table, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        match self.writes.get(&(table, key.to_vec())) {
            Some(Some(v)) => Ok(Some(v.clone())),
            Some(None) => Ok(None),
            None => self.parent.get(table, key),
        }
    }

    fn put(&mut self, table: Table, key: &[u8], value: Vec<u8>) -> StoreResult<()> {
        self.writes.insert((table, key.to_vec()), Some(value));
        Ok(())
    }

    fn delete(&mut self, table: Table, key: &[u8]) -> StoreResult<()> {
        self.writes.insert((table, key.to_vec()), None);
        Ok(())
    }

    fn iter(&self, table: Table) -> StoreResult<KvIter<'_>> {
        let base = self.parent.iter(table)?;
        let overlay: Vec<(Vec<u8>, Option<Vec<u8>>)> = self
            .writes
            .range((table, Vec::new())..)
            .take_while(|((t, _), _)| *t == table)
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect();
        Ok(Box::new(MergeIter {
            base: base.peekable(),
            overlay: overlay.into_iter().peekable(),
        }))
    }

    fn write_batch(&mut self, ops: Vec<WriteOp>) -> StoreResult<()> {
        for op in ops {
            match op {
                WriteOp::Put { table, key, value } => {
                    self.writes.insert((table, key), Some(value));
                }
                WriteOp::Delete { table, key } => {
                    self.writes.insert((table, key), None);
                }
            }
        }
        Ok(())
    }
}

enum Step {
    Base,
    Overlay,
    Both,
}

/// Merge parent iteration with the overlay; overlay wins on equal keys and
/// tombstones hide parent records.
struct MergeIter<'a> {
    base: Peekable<KvIter<'a>>,
    overlay: Peekable<std::vec::IntoIter<(Vec<u8>, Option<Vec<u8>>)>>,
}

impl Iterator for MergeIter<'_> {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = match (self.base.peek(), self.overlay.peek()) {
                (None, None) => return None,
                (Some(_), None) => Step::Base,
                (None, Some(_)) => Step::Overlay,
                (Some((bk, _)), Some((ok, _))) => match bk.cmp(ok) {
                    Ordering::Less => Step::Base,
                    Ordering::Greater => Step::Overlay,
                    Ordering::Equal => Step::Both,
                },
            };
            match step {
                Step::Base => return self.base.next(),
                Step::Both => {
                    self.base.next();
                }
                Step::Overlay => {}
            }
            if let Some((k, Some(v))) = self.overlay.next() {
                return Some((k, v));
            }
        }
    }
}
