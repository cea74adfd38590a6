//! redb-backed engine.
//!
//! Every bucket record lives in one `&[u8] -> &[u8]` table, so bucket ranges
//! map directly onto redb range scans. Each [`WriteBatch`] becomes one write
//! transaction; dropping a transaction on an error path aborts it.

use crate::engine::{BatchOp, Engine, WriteBatch};
use crate::error::{Error, Result};
use redb::{Database, Durability, ReadableDatabase, TableDefinition};

/// [`Engine`] implementation over a redb database.
pub struct RedbEngine {
    db: Database,
    table_name: String,
}

impl RedbEngine {
    /// Wraps a database, creating the bucket table if it does not exist yet.
    pub fn new(db: Database, table_name: impl Into<String>) -> Result<Self> {
        let engine = Self {
            db,
            table_name: table_name.into(),
        };

        let write_txn = engine
            .db
            .begin_write()
            .map_err(|err| Error::storage("begin write", err))?;
        {
            write_txn
                .open_table(engine.definition())
                .map_err(|err| Error::storage("create table", err))?;
        }
        write_txn
            .commit()
            .map_err(|err| Error::storage("commit", err))?;

        Ok(engine)
    }

    /// Name of the table holding bucket records.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn definition(&self) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
        TableDefinition::new(self.table_name.as_str())
    }
}

impl Engine for RedbEngine {
    fn scan(
        &self,
        lower: &[u8],
        upper: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>,
    ) -> Result<()> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|err| Error::storage("begin read", err))?;
        let table = read_txn
            .open_table(self.definition())
            .map_err(|err| Error::storage("open table", err))?;
        let range = table
            .range(lower..upper)
            .map_err(|err| Error::storage("create range iterator", err))?;

        for entry in range {
            let (key_guard, value_guard) =
                entry.map_err(|err| Error::storage("iterate range", err))?;
            visit(key_guard.value(), value_guard.value())?;
        }

        Ok(())
    }

    fn last_key(&self, lower: &[u8], upper: &[u8]) -> Result<Option<Vec<u8>>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|err| Error::storage("begin read", err))?;
        let table = read_txn
            .open_table(self.definition())
            .map_err(|err| Error::storage("open table", err))?;
        let mut range = table
            .range(lower..upper)
            .map_err(|err| Error::storage("create range iterator", err))?;

        let last = match range.next_back() {
            Some(entry) => {
                let (key_guard, _) = entry.map_err(|err| Error::storage("reverse scan", err))?;
                Some(key_guard.value().to_vec())
            }
            None => None,
        };

        Ok(last)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|err| Error::storage("begin read", err))?;
        let table = read_txn
            .open_table(self.definition())
            .map_err(|err| Error::storage("open table", err))?;
        let value = table
            .get(key)
            .map_err(|err| Error::storage("point read", err))?;

        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        let sync = batch.sync();
        let mut write_txn = self
            .db
            .begin_write()
            .map_err(|err| Error::storage("begin write", err))?;
        if !sync {
            write_txn
                .set_durability(Durability::None)
                .map_err(|err| Error::storage("set durability", err))?;
        }

        {
            let mut table = write_txn
                .open_table(self.definition())
                .map_err(|err| Error::storage("open table", err))?;

            for op in batch.into_ops() {
                match op {
                    BatchOp::Set(key, value) => {
                        table
                            .insert(key.as_slice(), value.as_slice())
                            .map_err(|err| Error::storage("insert", err))?;
                    }
                    BatchOp::Delete(key) => {
                        table
                            .remove(key.as_slice())
                            .map_err(|err| Error::storage("remove", err))?;
                    }
                    BatchOp::DeleteRange(lower, upper) => {
                        table
                            .retain_in(lower.as_slice()..upper.as_slice(), |_, _| false)
                            .map_err(|err| Error::storage("delete range", err))?;
                    }
                }
            }
        }

        write_txn
            .commit()
            .map_err(|err| Error::storage("commit", err))
    }
}
