//! Purpose: Typed representation of one dataset row.
//! Exports: `Record`, `Fields`, `Built`.
//! Role: Parse raw column strings into a record and render it back for display and CSV.
//! Invariants: `id` is always an integer; a non-integer `_id` is a malformed record.
//! Invariants: `information_date` is a valid date or `None`, never a parse failure value.
//! Invariants: Unparseable date text is kept privately and written back verbatim on save.
//! Invariants: Every other column is kept verbatim so saves reproduce what was loaded.
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use time::Date;

use crate::core::date::{DateParseWarning, format_date, parse_date};
use crate::core::error::{Error, ErrorKind};
use crate::core::schema::Column;

/// Column name to raw value, as supplied by a caller.
pub type Fields = BTreeMap<String, String>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub id: i64,
    pub fiscal_year: String,
    pub fiscal_period: String,
    pub month: String,
    pub information_date: Option<Date>,
    pub branch: String,
    pub service: String,
    pub ssc_client: String,
    pub metric_name: String,
    pub value: String,
    pub metric_type: String,
    // Original `Information Date` text when it did not parse; only `to_row` reads it.
    unparsed_date: Option<String>,
}

/// A freshly constructed record plus the date warning raised while building it, if any.
#[derive(Clone, Debug)]
pub struct Built {
    pub record: Record,
    pub warning: Option<DateParseWarning>,
}

impl Record {
    /// Builds a record from a column-name mapping. Unknown names are rejected;
    /// absent columns other than `_id` are stored as empty strings.
    pub fn from_fields(fields: &Fields) -> Result<Built, Error> {
        let mut values: [&str; 11] = [""; 11];
        for (name, value) in fields {
            let column = Column::parse(name)?;
            values[column as usize] = value.as_str();
        }
        Record::from_row(&values)
    }

    /// Builds a record from values laid out in `Column::ALL` order.
    pub fn from_row<S: AsRef<str>>(values: &[S; 11]) -> Result<Built, Error> {
        let value = |column: Column| values[column as usize].as_ref();
        let id = parse_id(value(Column::Id))?;
        let raw_date = value(Column::InformationDate);
        let information_date = parse_date(raw_date);
        let warning = date_warning(id, raw_date, information_date);
        let unparsed_date = warning.as_ref().map(|_| raw_date.to_string());

        let record = Record {
            id,
            fiscal_year: value(Column::FiscalYear).to_string(),
            fiscal_period: value(Column::FiscalPeriod).to_string(),
            month: value(Column::Month).to_string(),
            information_date,
            branch: value(Column::Branch).to_string(),
            service: value(Column::Service).to_string(),
            ssc_client: value(Column::SscClient).to_string(),
            metric_name: value(Column::MetricName).to_string(),
            value: value(Column::Value).to_string(),
            metric_type: value(Column::MetricType).to_string(),
            unparsed_date,
        };
        Ok(Built { record, warning })
    }

    pub fn get(&self, column: Column) -> Cow<'_, str> {
        match column {
            Column::Id => Cow::Owned(self.id.to_string()),
            Column::InformationDate => match self.information_date {
                Some(date) => Cow::Owned(format_date(date)),
                None => Cow::Borrowed(""),
            },
            Column::FiscalYear => Cow::Borrowed(&self.fiscal_year),
            Column::FiscalPeriod => Cow::Borrowed(&self.fiscal_period),
            Column::Month => Cow::Borrowed(&self.month),
            Column::Branch => Cow::Borrowed(&self.branch),
            Column::Service => Cow::Borrowed(&self.service),
            Column::SscClient => Cow::Borrowed(&self.ssc_client),
            Column::MetricName => Cow::Borrowed(&self.metric_name),
            Column::Value => Cow::Borrowed(&self.value),
            Column::MetricType => Cow::Borrowed(&self.metric_type),
        }
    }

    /// Replaces one column from raw text. On error the record is unchanged.
    pub fn set(&mut self, column: Column, raw: &str) -> Result<Option<DateParseWarning>, Error> {
        let slot = match column {
            Column::Id => {
                self.id = parse_id(raw)?;
                return Ok(None);
            }
            Column::InformationDate => {
                self.information_date = parse_date(raw);
                let warning = date_warning(self.id, raw, self.information_date);
                self.unparsed_date = warning.as_ref().map(|_| raw.to_string());
                return Ok(warning);
            }
            Column::FiscalYear => &mut self.fiscal_year,
            Column::FiscalPeriod => &mut self.fiscal_period,
            Column::Month => &mut self.month,
            Column::Branch => &mut self.branch,
            Column::Service => &mut self.service,
            Column::SscClient => &mut self.ssc_client,
            Column::MetricName => &mut self.metric_name,
            Column::Value => &mut self.value,
            Column::MetricType => &mut self.metric_type,
        };
        *slot = raw.to_string();
        Ok(None)
    }

    /// Values in header order, ready for a CSV writer. A date that never
    /// parsed is written back as the text it was read from.
    pub fn to_row(&self) -> [String; 11] {
        Column::ALL.map(|column| match (column, &self.unparsed_date) {
            (Column::InformationDate, Some(raw)) => raw.clone(),
            _ => self.get(column).into_owned(),
        })
    }

    pub fn fiscal_period_number(&self) -> Option<i64> {
        self.fiscal_period.trim().parse().ok()
    }

    pub fn value_number(&self) -> Option<f64> {
        self.value.trim().parse().ok()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, column) in Column::ALL.into_iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", column.name(), self.get(column))?;
        }
        Ok(())
    }
}

pub(crate) fn parse_id(raw: &str) -> Result<i64, Error> {
    raw.trim().parse::<i64>().map_err(|err| {
        Error::new(ErrorKind::Malformed)
            .with_message(format!("_id must be an integer, got {:?}", raw.trim()))
            .with_column(Column::Id.name())
            .with_source(err)
    })
}

fn date_warning(id: i64, raw: &str, parsed: Option<Date>) -> Option<DateParseWarning> {
    if parsed.is_some() || raw.trim().is_empty() {
        return None;
    }
    Some(DateParseWarning {
        id,
        input: raw.to_string(),
        line: None,
    })
}
