// Read-only ordered views over a record slice.
// Sorting is stable: rows tied on every key keep their table order.
use std::cmp::Ordering;

use crate::core::error::{Error, ErrorKind};
use crate::core::record::Record;
use crate::core::schema::Column;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SortKey {
    pub column: Column,
    pub ascending: bool,
}

impl SortKey {
    pub fn new(column: Column, ascending: bool) -> Self {
        Self { column, ascending }
    }

    /// Parses `Column`, `Column:asc`, or `Column:desc`.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        if let Some((name, direction)) = raw.rsplit_once(':') {
            let ascending = parse_direction(direction)?;
            return Ok(Self::new(Column::parse(name)?, ascending));
        }
        Ok(Self::new(Column::parse(raw)?, true))
    }

    /// Pairs column names with directions; both lists must have the same length.
    pub fn from_parts<S: AsRef<str>>(columns: &[S], directions: &[bool]) -> Result<Vec<Self>, Error> {
        if columns.len() != directions.len() {
            return Err(Error::new(ErrorKind::Validation)
                .with_message(format!(
                    "got {} sort columns but {} directions",
                    columns.len(),
                    directions.len()
                ))
                .with_hint("Give one direction per sort column."));
        }
        columns
            .iter()
            .zip(directions)
            .map(|(name, ascending)| -> Result<Self, Error> {
                Ok(Self::new(Column::parse(name.as_ref())?, *ascending))
            })
            .collect()
    }
}

/// `asc`/`ascending` or `desc`/`descending`, any case.
pub fn parse_direction(raw: &str) -> Result<bool, Error> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "asc" | "ascending" => Ok(true),
        "desc" | "descending" => Ok(false),
        other => Err(Error::new(ErrorKind::Validation)
            .with_message(format!("invalid sort direction {other:?}"))
            .with_hint("Use asc or desc.")),
    }
}

pub fn sort_records<'a>(records: &'a [Record], keys: &[SortKey]) -> Vec<&'a Record> {
    let mut view: Vec<&Record> = records.iter().collect();
    view.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let ordering = compare_column(a, b, key.column);
                if key.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    view
}

fn compare_column(a: &Record, b: &Record, column: Column) -> Ordering {
    match column {
        Column::Id => a.id.cmp(&b.id),
        // Missing dates order before any real date.
        Column::InformationDate => a.information_date.cmp(&b.information_date),
        _ if column.is_numeric() => compare_mixed(&a.get(column), &b.get(column)),
        _ => a.get(column).cmp(&b.get(column)),
    }
}

// Numbers compare numerically and sort before text; text compares lexicographically.
fn compare_mixed(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
