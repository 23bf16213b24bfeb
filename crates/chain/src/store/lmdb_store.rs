use lmdb::{
    Cursor,
    Database,
    DatabaseFlags,
    Environment,
    Transaction as LmdbTxn,
    WriteFlags,
};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::{KvIter, StateStore, Table, WriteOp};
use crate::error::{StoreError, StoreResult};

const MAP_SIZE: usize = 1_000_000_000;

/// LMDB-backed store. Setiap `Table` adalah satu named database; batch ditulis
/// dalam satu RW transaction sehingga commit block bersifat atomik.
#[derive(Clone)]
pub struct LmdbStore {
    env: Arc<Environment>,
    env_path: PathBuf,
    dbs: HashMap<Table, Database>,
}

impl std::fmt::Debug for LmdbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbStore").field("path", &self.env_path).finish()
    }
}

impl LmdbStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let p = path.as_ref();
        std::fs::create_dir_all(p)?;

        let env = Environment::new()
            .set_max_dbs(Table::ALL.len() as u32 + 2)
            .set_map_size(MAP_SIZE)
            .open(p)?;

        let mut dbs = HashMap::with_capacity(Table::ALL.len());
        for table in Table::ALL {
            let db = env.create_db(Some(table.name()), DatabaseFlags::empty())?;
            dbs.insert(table, db);
        }

        debug!(path = %p.display(), tables = dbs.len(), "lmdb store opened");
        Ok(Self {
            env: Arc::new(env),
            env_path: p.to_path_buf(),
            dbs,
        })
    }

    pub fn path(&self) -> &Path {
        &self.env_path
    }

    fn db(&self, table: Table) -> StoreResult<Database> {
        self.dbs
            .get(&table)
            .copied()
            .ok_or_else(|| StoreError::Lmdb(format!("table {} not opened", table.name())))
    }
}

impl StateStore for LmdbStore {
    fn get(&self, table: Table, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let db = self.db(table)?;
        let rtxn = self.env.begin_ro_txn()?;
        match rtxn.get(db, &key) {
            Ok(v) => Ok(Some(v.to_vec())),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&mut self, table: Table, key: &[u8], value: Vec<u8>) -> StoreResult<()> {
        let db = self.db(table)?;
        let mut wtxn = self.env.begin_rw_txn()?;
        wtxn.put(db, &key, &value, WriteFlags::empty())?;
        wtxn.commit()?;
        Ok(())
    }

    fn delete(&mut self, table: Table, key: &[u8]) -> StoreResult<()> {
        let db = self.db(table)?;
        let mut wtxn = self.env.begin_rw_txn()?;
        match wtxn.del(db, &key, None) {
            Ok(()) | Err(lmdb::Error::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        wtxn.commit()?;
        Ok(())
    }

    fn iter(&self, table: Table) -> StoreResult<KvIter<'_>> {
        let db = self.db(table)?;
        let rtxn = self.env.begin_ro_txn()?;
        let mut out = Vec::new();
        {
            let mut cursor = rtxn.open_ro_cursor(db)?;
            for (key, val) in cursor.iter() {
                out.push((key.to_vec(), val.to_vec()));
            }
        }
        Ok(Box::new(out.into_iter()))
    }

    fn write_batch(&mut self, ops: Vec<WriteOp>) -> StoreResult<()> {
        let count = ops.len();
        let mut wtxn = self.env.begin_rw_txn()?;
        for op in ops {
            match op {
                WriteOp::Put { table, key, value } => {
                    wtxn.put(self.db(table)?, &key, &value, WriteFlags::empty())?;
                }
                WriteOp::Delete { table, key } => match wtxn.del(self.db(table)?, &key, None) {
                    Ok(()) | Err(lmdb::Error::NotFound) => {}
                    Err(e) => return Err(e.into()),
                },
            }
        }
        wtxn.commit()?;
        debug!(ops = count, "lmdb batch committed");
        Ok(())
    }
}
