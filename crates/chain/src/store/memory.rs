use std::collections::BTreeMap;

use super::{KvIter, StateStore, Table};
use crate::error::StoreResult;

/// In-memory ordered store. Satu `BTreeMap` per tabel.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: BTreeMap<Table, BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in one table.
    pub fn len(&self, table: Table) -> usize {
        self.tables.get(&table).map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, table: Table) -> bool {
        self.len(table) == 0
    }
}

impl StateStore for MemoryStore {
    fn get(&self, table: Table, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.tables.get(&table).and_then(|t| t.get(key)).cloned())
    }

    fn put(&mut self, table: Table, key: &[u8], value: Vec<u8>) -> StoreResult<()> {
        self.tables.entry(table).or_default().insert(key.to_vec(), value);
        Ok(())
    }

    fn delete(&mut self, table: Table, key: &[u8]) -> StoreResult<()> {
        if let Some(t) = self.tables.get_mut(&table) {
            t.remove(key);
        }
        Ok(())
    }

    fn iter(&self, table: Table) -> StoreResult<KvIter<'_>> {
        match self.tables.get(&table) {
            Some(t) => Ok(Box::new(t.iter().map(|(k, v)| (k.clone(), v.clone())))),
            None => Ok(Box::new(std::iter::empty())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let mut s = MemoryStore::new();
        s.put(Table::Accounts, b"a", vec![1]).unwrap();
        assert_eq!(s.get(Table::Accounts, b"a").unwrap(), Some(vec![1]));
        assert!(s.has(Table::Accounts, b"a").unwrap());
        // tables are independent
        assert!(!s.has(Table::Witnesses, b"a").unwrap());
        s.delete(Table::Accounts, b"a").unwrap();
        assert_eq!(s.get(Table::Accounts, b"a").unwrap(), None);
    }

    #[test]
    fn test_iter_is_ordered_and_restartable() {
        let mut s = MemoryStore::new();
        s.put(Table::Proposals, &3u64.to_be_bytes(), vec![3]).unwrap();
        s.put(Table::Proposals, &1u64.to_be_bytes(), vec![1]).unwrap();
        s.put(Table::Proposals, &2u64.to_be_bytes(), vec![2]).unwrap();
        let first: Vec<u8> = s.iter(Table::Proposals).unwrap().map(|(_, v)| v[0]).collect();
        let second: Vec<u8> = s.iter(Table::Proposals).unwrap().map(|(_, v)| v[0]).collect();
        assert_eq!(first, vec![1, 2, 3]);
        assert_eq!(first, second);
    }
}
