//! Purpose: Access facade between presentation code and the table store.
//! Exports: `DataClient`, `ApiResult`.
//! Role: Accept user-entered strings, parse them, and forward to `TableStore`.
//! Invariants: Every id and sort direction arrives as text and is validated here.
//! Invariants: Missing ids are `Ok(None)`/`Ok(false)`, never errors.
use std::path::{Path, PathBuf};

use crate::core::date::DateParseWarning;
use crate::core::error::{Error, ErrorKind};
use crate::core::query::{SortKey, parse_direction};
use crate::core::record::{Fields, Record};
use crate::core::table::TableStore;

pub type ApiResult<T> = Result<T, Error>;

#[derive(Debug)]
pub struct DataClient {
    store: TableStore,
}

impl DataClient {
    /// Binds to `path` without reading it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: TableStore::new(path),
        }
    }

    /// Binds to `path` and loads it.
    pub fn open(path: impl Into<PathBuf>) -> ApiResult<Self> {
        let mut client = Self::new(path);
        client.load()?;
        Ok(client)
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn load(&mut self) -> ApiResult<&[Record]> {
        self.store.load()
    }

    pub fn reload(&mut self) -> ApiResult<&[Record]> {
        self.store.reload()
    }

    pub fn records(&self) -> &[Record] {
        self.store.records()
    }

    pub fn get_by_id(&self, id: &str) -> ApiResult<Option<&Record>> {
        let id = parse_id_arg(id)?;
        Ok(self.store.get_by_id(id))
    }

    pub fn next_id(&self) -> ApiResult<i64> {
        self.store.next_id()
    }

    pub fn insert(&mut self, fields: &Fields) -> ApiResult<&Record> {
        self.store.insert(fields)
    }

    pub fn update(&mut self, id: &str, updates: &Fields) -> ApiResult<bool> {
        let id = parse_id_arg(id)?;
        self.store.update(id, updates)
    }

    pub fn delete(&mut self, id: &str) -> ApiResult<bool> {
        let id = parse_id_arg(id)?;
        self.store.delete(id)
    }

    /// Sorted view. `orders` holds one `asc`/`desc` word per column.
    pub fn sort<C, O>(&self, columns: &[C], orders: &[O]) -> ApiResult<Vec<&Record>>
    where
        C: AsRef<str>,
        O: AsRef<str>,
    {
        let directions = orders
            .iter()
            .map(|order| parse_direction(order.as_ref()))
            .collect::<ApiResult<Vec<bool>>>()?;
        let keys = SortKey::from_parts(columns, &directions)?;
        Ok(self.store.sort(&keys))
    }

    pub fn sort_by_keys(&self, keys: &[SortKey]) -> Vec<&Record> {
        self.store.sort(keys)
    }

    /// Writes the current table to `path`, leaving the backing file alone.
    pub fn export(&self, path: impl AsRef<Path>) -> ApiResult<()> {
        self.store.save_as(path)
    }

    pub fn take_warnings(&mut self) -> Vec<DateParseWarning> {
        self.store.take_warnings()
    }
}

fn parse_id_arg(raw: &str) -> ApiResult<i64> {
    raw.trim().parse::<i64>().map_err(|err| {
        Error::new(ErrorKind::Validation)
            .with_message(format!("id must be an integer, got {:?}", raw.trim()))
            .with_source(err)
    })
}
