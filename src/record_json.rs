//! Purpose: Shared record JSON serializers for CLI output paths.
//! Exports: `record_json`, `records_json`.
//! Role: Keep the record envelope shape consistent across commands and the shell.
//! Invariants: Keys are the CSV header names, emitted in header order.
//! Invariants: `_id` is a JSON number; a missing date is JSON null.

use fiscaldata::api::{Column, Record};
use serde_json::{Map, Value, json};

pub(crate) fn record_json(record: &Record) -> Value {
    let mut map = Map::new();
    for column in Column::ALL {
        let value = match column {
            Column::Id => json!(record.id),
            Column::InformationDate if record.information_date.is_none() => Value::Null,
            _ => json!(record.get(column)),
        };
        map.insert(column.name().to_string(), value);
    }
    Value::Object(map)
}

pub(crate) fn records_json<'a, I>(records: I, total: usize) -> Value
where
    I: IntoIterator<Item = &'a Record>,
{
    let items = records.into_iter().map(record_json).collect::<Vec<_>>();
    json!({
        "total": total,
        "count": items.len(),
        "records": items,
    })
}
