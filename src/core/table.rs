//! Purpose: In-memory, file-backed table of records with write-through persistence.
//! Exports: `TableStore`, `read_records`, `write_records`, `Loaded`.
//! Role: Sole owner and writer of the backing CSV; every mutation persists before returning.
//! Invariants: Loads are all-or-nothing; a failed load leaves the previous table untouched.
//! Invariants: Record ids are unique across the live table.
//! Invariants: A mutation whose save fails is rolled back in memory.
//! Invariants: Saves replace the target by renaming a locked sibling temp file over it.
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::core::date::DateParseWarning;
use crate::core::error::{Error, ErrorKind};
use crate::core::query::{self, SortKey};
use crate::core::record::{Fields, Record};
use crate::core::schema::{Column, HEADER};

/// Result of reading a CSV file in full.
#[derive(Clone, Debug, Default)]
pub struct Loaded {
    pub records: Vec<Record>,
    pub warnings: Vec<DateParseWarning>,
}

#[derive(Debug)]
pub struct TableStore {
    path: PathBuf,
    records: Vec<Record>,
    loaded: bool,
    warnings: Vec<DateParseWarning>,
}

impl TableStore {
    /// Creates an empty store bound to `path`. Nothing is read until `load`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
            loaded: false,
            warnings: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn load(&mut self) -> Result<&[Record], Error> {
        let loaded = read_records(&self.path)?;
        info!(
            path = %self.path.display(),
            records = loaded.records.len(),
            warnings = loaded.warnings.len(),
            "loaded dataset"
        );
        self.records = loaded.records;
        self.loaded = true;
        for warning in loaded.warnings {
            self.note_warning(warning);
        }
        Ok(&self.records)
    }

    /// Discards the in-memory table and reads the backing file again.
    pub fn reload(&mut self) -> Result<&[Record], Error> {
        debug!(path = %self.path.display(), "reloading dataset");
        self.load()
    }

    /// Rewrites the backing file from the live table. Refused before `load`,
    /// so an unloaded store never replaces a dataset with a bare header.
    pub fn save(&self) -> Result<(), Error> {
        self.ensure_loaded()?;
        write_records(&self.path, &self.records)
    }

    /// Writes the current table to another file. The backing path is unchanged.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        self.ensure_loaded()?;
        write_records(path.as_ref(), &self.records)
    }

    /// First record with `id` in insertion order.
    pub fn get_by_id(&self, id: i64) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn max_id(&self) -> i64 {
        self.records
            .iter()
            .map(|record| record.id)
            .max()
            .unwrap_or(0)
    }

    /// `max_id() + 1`, or Validation when the largest id is already `i64::MAX`.
    pub fn next_id(&self) -> Result<i64, Error> {
        let max = self.max_id();
        max.checked_add(1).ok_or_else(|| {
            Error::new(ErrorKind::Validation)
                .with_message("no id above the current maximum")
                .with_id(max)
                .with_hint("Give an explicit unused _id.")
        })
    }

    /// Appends a record and persists. A missing, empty, or `auto` `_id` is
    /// assigned `max_id() + 1`; an explicit id must be unused.
    pub fn insert(&mut self, fields: &Fields) -> Result<&Record, Error> {
        self.ensure_loaded()?;
        if fields.is_empty() {
            return Err(Error::new(ErrorKind::Validation)
                .with_message("no fields supplied for new record"));
        }
        for name in fields.keys() {
            Column::parse(name)?;
        }

        let requested = fields
            .iter()
            .find(|(name, _)| Column::from_name(name) == Some(Column::Id))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("auto"));

        let mut resolved: Fields = fields
            .iter()
            .filter(|(name, _)| Column::from_name(name) != Some(Column::Id))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let id_text = match requested {
            Some(value) => value.to_string(),
            None => self.next_id()?.to_string(),
        };
        resolved.insert(Column::Id.name().to_string(), id_text);

        let built = Record::from_fields(&resolved)?;
        let id = built.record.id;
        if self.get_by_id(id).is_some() {
            return Err(Error::new(ErrorKind::Validation)
                .with_message("a record with this _id already exists")
                .with_id(id)
                .with_hint("Omit _id to have the next free id assigned."));
        }

        self.records.push(built.record);
        if let Err(err) = self.persist() {
            self.records.pop();
            return Err(err);
        }
        if let Some(warning) = built.warning {
            self.note_warning(warning);
        }
        info!(id, "inserted record");
        Ok(&self.records[self.records.len() - 1])
    }

    /// Applies recognized columns from `updates` to the record with `id` and persists.
    /// Returns `Ok(false)` when no such record exists. Unrecognized names are ignored.
    pub fn update(&mut self, id: i64, updates: &Fields) -> Result<bool, Error> {
        self.ensure_loaded()?;
        let Some(index) = self.position(id) else {
            debug!(id, "update skipped: no such record");
            return Ok(false);
        };

        let mut updated = self.records[index].clone();
        let mut warnings = Vec::new();
        for (name, value) in updates {
            let Some(column) = Column::from_name(name) else {
                debug!(id, column = %name, "ignoring unknown column in update");
                continue;
            };
            if let Some(warning) = updated.set(column, value)? {
                warnings.push(warning);
            }
        }

        if updated.id != id && self.get_by_id(updated.id).is_some() {
            return Err(Error::new(ErrorKind::Validation)
                .with_message("a record with this _id already exists")
                .with_id(updated.id)
                .with_column(Column::Id.name()));
        }

        let new_id = updated.id;
        let previous = std::mem::replace(&mut self.records[index], updated);
        if let Err(err) = self.persist() {
            self.records[index] = previous;
            return Err(err);
        }
        for mut warning in warnings {
            warning.id = new_id;
            self.note_warning(warning);
        }
        info!(id, new_id, "updated record");
        Ok(true)
    }

    /// Removes the first record with `id` and persists. Returns `Ok(false)` when absent.
    pub fn delete(&mut self, id: i64) -> Result<bool, Error> {
        self.ensure_loaded()?;
        let Some(index) = self.position(id) else {
            debug!(id, "delete skipped: no such record");
            return Ok(false);
        };

        let removed = self.records.remove(index);
        if let Err(err) = self.persist() {
            self.records.insert(index, removed);
            return Err(err);
        }
        info!(id, "deleted record");
        Ok(true)
    }

    /// Sorted view over the live table; the table itself keeps its order.
    pub fn sort(&self, keys: &[SortKey]) -> Vec<&Record> {
        query::sort_records(&self.records, keys)
    }

    /// Date warnings raised since the last call, oldest first.
    pub fn take_warnings(&mut self) -> Vec<DateParseWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }

    fn ensure_loaded(&self) -> Result<(), Error> {
        if self.loaded {
            return Ok(());
        }
        Err(Error::new(ErrorKind::Validation)
            .with_message("dataset is not loaded")
            .with_path(&self.path)
            .with_hint("Load the dataset before saving or modifying it."))
    }

    fn persist(&self) -> Result<(), Error> {
        self.save()
    }

    fn note_warning(&mut self, warning: DateParseWarning) {
        warn!(id = warning.id, input = %warning.input, "unparseable Information Date");
        self.warnings.push(warning);
    }
}

/// Reads and parses an entire CSV file. Any bad row fails the whole read.
pub fn read_records(path: &Path) -> Result<Loaded, Error> {
    let file = File::open(path).map_err(|err| {
        Error::new(ErrorKind::FileAccess)
            .with_message("failed to open dataset")
            .with_path(path)
            .with_source(err)
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file));

    let headers = reader
        .headers()
        .map_err(|err| csv_error(err, path))?
        .clone();
    let layout = header_layout(&headers, path)?;

    let mut loaded = Loaded::default();
    let mut seen = HashSet::new();
    for row in reader.records() {
        let row = row.map_err(|err| csv_error(err, path))?;
        let line = row.position().map(|position| position.line());
        let values: [&str; 11] = layout.map(|idx| row.get(idx).unwrap_or(""));

        let built = Record::from_row(&values).map_err(|err| at_line(err.with_path(path), line))?;
        let id = built.record.id;
        if !seen.insert(id) {
            return Err(at_line(
                Error::new(ErrorKind::Malformed)
                    .with_message("duplicate _id")
                    .with_path(path)
                    .with_id(id),
                line,
            ));
        }
        if let Some(mut warning) = built.warning {
            warning.line = line;
            loaded.warnings.push(warning);
        }
        loaded.records.push(built.record);
    }
    Ok(loaded)
}

/// Writes a header plus every record to `path`, replacing any previous content.
pub fn write_records(path: &Path, records: &[Record]) -> Result<(), Error> {
    let tmp_path = temp_path(path)?;
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&tmp_path)
        .map_err(|err| file_access(err, "failed to create temporary file", &tmp_path))?;

    let result = write_locked(&file, &tmp_path, records).and_then(|()| {
        fs::rename(&tmp_path, path)
            .map_err(|err| file_access(err, "failed to replace dataset", path))
    });
    match &result {
        Ok(()) => debug!(path = %path.display(), records = records.len(), "saved dataset"),
        Err(err) if err.kind() == ErrorKind::Busy => {}
        Err(_) => {
            let _ = fs::remove_file(&tmp_path);
        }
    }
    result
}

fn write_locked(file: &File, tmp_path: &Path, records: &[Record]) -> Result<(), Error> {
    let _lock = WriteLock::acquire(file, tmp_path)?;
    file.set_len(0)
        .map_err(|err| file_access(err, "failed to truncate temporary file", tmp_path))?;

    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    writer
        .write_record(HEADER)
        .map_err(|err| csv_error(err, tmp_path))?;
    for record in records {
        writer
            .write_record(record.to_row())
            .map_err(|err| csv_error(err, tmp_path))?;
    }
    writer
        .flush()
        .map_err(|err| file_access(err, "failed to flush dataset", tmp_path))?;
    drop(writer);
    file.sync_all()
        .map_err(|err| file_access(err, "failed to sync dataset", tmp_path))
}

struct WriteLock<'a> {
    file: &'a File,
}

impl<'a> WriteLock<'a> {
    fn acquire(file: &'a File, path: &Path) -> Result<Self, Error> {
        FileExt::try_lock_exclusive(file).map_err(|err| {
            let kind = lock_error_kind(&err);
            let err = Error::new(kind).with_path(path).with_source(err);
            if kind == ErrorKind::Busy {
                err.with_message("dataset is being written by another process")
            } else {
                err.with_message("failed to lock temporary file")
            }
        })?;
        Ok(Self { file })
    }
}

impl Drop for WriteLock<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(self.file);
    }
}

fn lock_error_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        _ => ErrorKind::FileAccess,
    }
}

fn temp_path(path: &Path) -> Result<PathBuf, Error> {
    let name = path.file_name().ok_or_else(|| {
        Error::new(ErrorKind::Validation)
            .with_message("dataset path has no file name")
            .with_path(path)
    })?;
    let mut tmp_name = name.to_os_string();
    tmp_name.push(".tmp");
    Ok(path.with_file_name(tmp_name))
}

fn header_layout(headers: &csv::StringRecord, path: &Path) -> Result<[usize; 11], Error> {
    let mut positions: [Option<usize>; 11] = [None; 11];
    for (idx, name) in headers.iter().enumerate() {
        let column = Column::from_name(name).ok_or_else(|| {
            Error::new(ErrorKind::Malformed)
                .with_message("unexpected column in header")
                .with_column(name)
                .with_path(path)
                .with_line(1)
        })?;
        if positions[column as usize].replace(idx).is_some() {
            return Err(Error::new(ErrorKind::Malformed)
                .with_message("duplicate column in header")
                .with_column(column.name())
                .with_path(path)
                .with_line(1));
        }
    }

    let mut layout = [0usize; 11];
    for column in Column::ALL {
        layout[column as usize] = positions[column as usize].ok_or_else(|| {
            Error::new(ErrorKind::Malformed)
                .with_message("missing column in header")
                .with_column(column.name())
                .with_path(path)
                .with_line(1)
        })?;
    }
    Ok(layout)
}

fn csv_error(err: csv::Error, path: &Path) -> Error {
    let line = err.position().map(|position| position.line());
    let base = match err.kind() {
        csv::ErrorKind::Io(_) => Error::new(ErrorKind::FileAccess).with_message("dataset i/o failed"),
        csv::ErrorKind::Utf8 { .. } => {
            Error::new(ErrorKind::Malformed).with_message("row is not valid UTF-8")
        }
        csv::ErrorKind::UnequalLengths { .. } => Error::new(ErrorKind::Malformed)
            .with_message("row has a different number of fields than the header"),
        _ => Error::new(ErrorKind::Malformed).with_message("invalid CSV"),
    };
    at_line(base.with_path(path), line).with_source(err)
}

fn at_line(err: Error, line: Option<u64>) -> Error {
    match line {
        Some(line) => err.with_line(line),
        None => err,
    }
}

fn file_access(err: io::Error, message: &str, path: &Path) -> Error {
    Error::new(ErrorKind::FileAccess)
        .with_message(message)
        .with_path(path)
        .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::{Fields, TableStore, lock_error_kind, read_records, temp_path};
    use crate::core::error::ErrorKind;
    use crate::core::query::SortKey;
    use crate::core::schema::Column;
    use std::fs;
    use std::path::Path;

    const HEADER_LINE: &str = "_id,Fiscal Year,Fiscal Period,Month,Information Date,Branch,Service,SSC Client,Metric Name,Value,Metric Type\n";

    fn write_dataset(path: &Path, rows: &[&str]) {
        let mut text = String::from(HEADER_LINE);
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        fs::write(path, text).expect("write dataset");
    }

    fn two_rows(path: &Path) {
        write_dataset(
            path,
            &[
                "1,2017-2018,1,April,4/30/2017,Data Centre Services,Facilities,EDC Barrie,Availability,100,Non Cumulative",
                "2,2017-2018,1,April,4/30/2017,Data Centre Services,Facilities,EDC Barrie,Power,1000,Non Cumulative",
            ],
        );
    }

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn loaded_store(dir: &tempfile::TempDir) -> TableStore {
        let path = dir.path().join("data.csv");
        two_rows(&path);
        let mut store = TableStore::new(&path);
        store.load().expect("load");
        store
    }

    #[test]
    fn load_parses_rows_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = loaded_store(&dir);
        let ids: Vec<i64> = store.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.records()[1].value, "1000");
    }

    #[test]
    fn load_tolerates_bom_and_reordered_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bom.csv");
        let text = "\u{feff}Value,_id,Fiscal Year,Fiscal Period,Month,Information Date,Branch,Service,SSC Client,Metric Name,Metric Type\n\
                    5,9,2019-2020,2,May,,B,S,C,M,T\n";
        fs::write(&path, text).expect("write");
        let loaded = read_records(&path).expect("load");
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].id, 9);
        assert_eq!(loaded.records[0].value, "5");
        assert_eq!(loaded.records[0].information_date, None);
    }

    #[test]
    fn missing_file_is_file_access_and_keeps_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = TableStore::new(dir.path().join("missing.csv"));
        let err = store.load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileAccess);
        assert!(store.is_empty());
        assert!(!store.is_loaded());
    }

    #[test]
    fn malformed_row_aborts_load_and_keeps_previous_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = loaded_store(&dir);
        write_dataset(
            store.path(),
            &["1,2017-2018,1,April,,B,S,C,M,1,T", "two,2017-2018,1,April,,B,S,C,M,1,T"],
        );
        let err = store.reload().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(err.line(), Some(3));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn short_row_is_malformed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("short.csv");
        write_dataset(&path, &["1,2017-2018,1"]);
        let err = read_records(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn duplicate_ids_and_unknown_headers_are_malformed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dup.csv");
        write_dataset(&path, &["1,a,1,April,,B,S,C,M,1,T", "1,b,1,April,,B,S,C,M,1,T"]);
        let err = read_records(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(err.id(), Some(1));

        fs::write(&path, "_id,Colour\n1,blue\n").expect("write");
        let err = read_records(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(err.column(), Some("Colour"));
    }

    #[test]
    fn unparseable_dates_surface_as_warnings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dates.csv");
        write_dataset(&path, &["4,a,1,April,someday,B,S,C,M,1,T"]);
        let mut store = TableStore::new(&path);
        store.load().expect("load");
        assert_eq!(store.records()[0].information_date, None);
        let warnings = store.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].id, 4);
        assert_eq!(warnings[0].line, Some(2));
        assert!(store.take_warnings().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = loaded_store(&dir);
        let copy = dir.path().join("copy.csv");
        store.save_as(&copy).expect("save");
        let reloaded = read_records(&copy).expect("reload");
        assert_eq!(reloaded.records, store.records());
        assert!(!dir.path().join("copy.csv.tmp").exists());
    }

    #[test]
    fn round_trip_keeps_escaped_spaced_and_rewritten_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tricky.csv");
        write_dataset(
            &path,
            &[
                "1,\"2017, 2018\",1,April,30 April 2017,\"Data \"\"Centre\"\" Services\",Facilities,EDC Barrie,\"Power\nCapacity\",100,Non Cumulative",
                "2,2017-2018, 2 ,April ,20170430,B,S,C,M,\" 1,000 \",T",
                "3,2017-2018,1,May,Q1 FY2017,B,S,C,M,7,T",
            ],
        );
        let mut store = TableStore::new(&path);
        store.load().expect("load");
        let first = &store.records()[0];
        assert_eq!(first.fiscal_year, "2017, 2018");
        assert_eq!(first.branch, "Data \"Centre\" Services");
        assert_eq!(first.metric_name, "Power\nCapacity");
        assert_eq!(first.get(Column::InformationDate), "2017-04-30");
        let second = &store.records()[1];
        assert_eq!(second.fiscal_period, " 2 ");
        assert_eq!(second.month, "April ");
        assert_eq!(second.value, " 1,000 ");

        let copy = dir.path().join("copy.csv");
        store.save_as(&copy).expect("save");
        let reloaded = read_records(&copy).expect("reload");
        assert_eq!(reloaded.records, store.records());

        let text = fs::read_to_string(&copy).expect("read copy");
        assert!(text.contains("2017-04-30"));
        assert!(!text.contains("30 April 2017"));
        assert!(text.contains("Q1 FY2017"));
    }

    #[test]
    fn unparsed_date_text_survives_other_mutations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.csv");
        write_dataset(
            &path,
            &[
                "1,a,1,April,Q1 FY2017,B,S,C,M,1,T",
                "2,a,1,April,4/30/2017,B,S,C,M,1,T",
            ],
        );
        let mut store = TableStore::new(&path);
        store.load().expect("load");
        assert_eq!(store.records()[0].information_date, None);

        assert!(store.delete(2).expect("delete"));
        let text = fs::read_to_string(&path).expect("read");
        assert!(text.contains("1,a,1,April,Q1 FY2017,B,S,C,M,1,T"));

        assert!(store.update(1, &fields(&[("Value", "9")])).expect("update"));
        let text = fs::read_to_string(&path).expect("read");
        assert!(text.contains("1,a,1,April,Q1 FY2017,B,S,C,M,9,T"));

        assert!(
            store
                .update(1, &fields(&[("Information Date", "5/1/2017")]))
                .expect("fix date")
        );
        let text = fs::read_to_string(&path).expect("read");
        assert!(text.contains("1,a,1,April,2017-05-01,B,S,C,M,9,T"));
    }

    #[test]
    fn save_before_load_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.csv");
        two_rows(&path);
        let before = fs::read_to_string(&path).expect("read");
        let store = TableStore::new(&path);

        let err = store.save().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = store.save_as(dir.path().join("copy.csv")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(fs::read_to_string(&path).expect("read"), before);
        assert!(!dir.path().join("copy.csv").exists());
    }

    #[test]
    fn insert_assigns_next_id_and_writes_through() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = loaded_store(&dir);
        let record = store
            .insert(&fields(&[("Fiscal Year", "2020-2021"), ("Value", "100")]))
            .expect("insert");
        assert_eq!(record.id, 3);
        assert_eq!(record.fiscal_year, "2020-2021");
        assert_eq!(record.branch, "");

        let on_disk = read_records(store.path()).expect("reload");
        assert_eq!(on_disk.records.len(), 3);
        assert_eq!(on_disk.records[2].id, 3);
    }

    #[test]
    fn insert_into_empty_table_starts_at_one() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("empty.csv");
        write_dataset(&path, &[]);
        let mut store = TableStore::new(&path);
        store.load().expect("load");
        let record = store
            .insert(&fields(&[("_id", "auto"), ("Month", "May")]))
            .expect("insert");
        assert_eq!(record.id, 1);
    }

    #[test]
    fn insert_after_largest_possible_id_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("max.csv");
        write_dataset(&path, &["9223372036854775807,a,1,April,,B,S,C,M,1,T"]);
        let mut store = TableStore::new(&path);
        store.load().expect("load");

        let err = store.next_id().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.id(), Some(i64::MAX));

        let err = store.insert(&fields(&[("Month", "May")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.len(), 1);

        let record = store
            .insert(&fields(&[("_id", "5"), ("Month", "May")]))
            .expect("explicit id");
        assert_eq!(record.id, 5);
    }

    #[test]
    fn insert_validates_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = loaded_store(&dir);

        let err = store.insert(&Fields::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = store.insert(&fields(&[("Colour", "blue")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = store.insert(&fields(&[("_id", "2")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.len(), 2);

        let record = store.insert(&fields(&[("_id", "40")])).expect("explicit id");
        assert_eq!(record.id, 40);
        assert_eq!(store.next_id().expect("next id"), 41);
    }

    #[test]
    fn mutations_require_a_loaded_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.csv");
        two_rows(&path);
        let mut store = TableStore::new(&path);
        let err = store.insert(&fields(&[("Month", "May")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(read_records(&path).expect("untouched").records.len(), 2);
    }

    #[test]
    fn update_applies_known_columns_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = loaded_store(&dir);
        let updated = store
            .update(2, &fields(&[("Value", "250"), ("Colour", "blue")]))
            .expect("update");
        assert!(updated);
        assert_eq!(store.get_by_id(2).expect("record").value, "250");

        let on_disk = read_records(store.path()).expect("reload");
        assert_eq!(on_disk.records[1].value, "250");
    }

    #[test]
    fn update_with_no_changes_still_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = loaded_store(&dir);
        let before = store.get_by_id(1).cloned();
        assert!(store.update(1, &Fields::new()).expect("update"));
        assert_eq!(store.get_by_id(1).cloned(), before);
    }

    #[test]
    fn update_missing_id_returns_false() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = loaded_store(&dir);
        assert!(!store.update(999, &fields(&[("Value", "1")])).expect("update"));
    }

    #[test]
    fn update_id_rejects_collisions_and_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = loaded_store(&dir);

        let err = store.update(1, &fields(&[("_id", "2")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = store.update(1, &fields(&[("_id", "abc")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);

        assert!(store.update(1, &fields(&[("_id", "10")])).expect("renumber"));
        assert!(store.get_by_id(1).is_none());
        assert_eq!(store.get_by_id(10).expect("renumbered").value, "100");
    }

    #[test]
    fn update_date_warning_uses_final_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = loaded_store(&dir);
        store.take_warnings();
        store
            .update(1, &fields(&[("Information Date", "soon"), ("_id", "5")]))
            .expect("update");
        let warnings = store.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].id, 5);
        assert_eq!(store.get_by_id(5).expect("record").information_date, None);
    }

    #[test]
    fn delete_removes_and_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = loaded_store(&dir);
        assert!(store.delete(1).expect("delete"));
        assert!(store.get_by_id(1).is_none());
        assert!(!store.delete(1).expect("second delete"));

        let on_disk = read_records(store.path()).expect("reload");
        assert_eq!(on_disk.records.len(), 1);
        assert_eq!(on_disk.records[0].id, 2);
    }

    #[test]
    fn failed_save_rolls_back_insert() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = loaded_store(&dir);
        let blocker = dir.path().join("gone");
        fs::create_dir(&blocker).expect("mkdir");
        let path = blocker.join("data.csv");
        fs::copy(store.path(), &path).expect("copy");
        let mut moved = TableStore::new(&path);
        moved.load().expect("load");
        fs::remove_dir_all(&blocker).expect("remove dir");

        let err = moved.insert(&fields(&[("Month", "May")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileAccess);
        assert_eq!(moved.len(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn sort_does_not_reorder_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = loaded_store(&dir);
        let keys = [SortKey::new(Column::Value, false)];
        let sorted: Vec<i64> = store.sort(&keys).iter().map(|r| r.id).collect();
        assert_eq!(sorted, vec![2, 1]);
        let original: Vec<i64> = store.records().iter().map(|r| r.id).collect();
        assert_eq!(original, vec![1, 2]);
    }

    #[test]
    fn temp_path_is_a_sibling() {
        let tmp = temp_path(Path::new("/data/set.csv")).expect("tmp");
        assert_eq!(tmp, Path::new("/data/set.csv.tmp"));
        assert!(temp_path(Path::new("/")).is_err());
    }

    #[test]
    fn lock_errors_map_to_expected_kinds() {
        let err = std::io::Error::from(std::io::ErrorKind::WouldBlock);
        assert_eq!(lock_error_kind(&err), ErrorKind::Busy);

        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(lock_error_kind(&err), ErrorKind::FileAccess);
    }
}
