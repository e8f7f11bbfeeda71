//! Purpose: Fixed column set of the data centre availability dataset.
//! Exports: `Column`, `HEADER`.
//! Role: Single source of truth for column names, order, and comparison typing.
//! Invariants: Every record carries exactly these columns; the set never changes at runtime.
//! Invariants: `Column::ALL` order is the on-disk header order.
use std::fmt;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Column {
    Id,
    FiscalYear,
    FiscalPeriod,
    Month,
    InformationDate,
    Branch,
    Service,
    SscClient,
    MetricName,
    Value,
    MetricType,
}

pub const HEADER: [&str; 11] = [
    "_id",
    "Fiscal Year",
    "Fiscal Period",
    "Month",
    "Information Date",
    "Branch",
    "Service",
    "SSC Client",
    "Metric Name",
    "Value",
    "Metric Type",
];

impl Column {
    pub const ALL: [Column; 11] = [
        Column::Id,
        Column::FiscalYear,
        Column::FiscalPeriod,
        Column::Month,
        Column::InformationDate,
        Column::Branch,
        Column::Service,
        Column::SscClient,
        Column::MetricName,
        Column::Value,
        Column::MetricType,
    ];

    pub fn name(self) -> &'static str {
        HEADER[self as usize]
    }

    /// Exact header-name lookup. Surrounding whitespace and a leading BOM are ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim_start_matches('\u{feff}').trim();
        Column::ALL
            .into_iter()
            .find(|column| column.name() == name)
    }

    pub fn parse(name: &str) -> Result<Self, Error> {
        Column::from_name(name).ok_or_else(|| unknown_column_error(name))
    }

    /// Columns compared numerically when both sides parse as numbers.
    pub fn is_numeric(self) -> bool {
        matches!(self, Column::Id | Column::FiscalPeriod | Column::Value)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) fn unknown_column_error(name: &str) -> Error {
    Error::new(ErrorKind::Validation)
        .with_message("column name not found")
        .with_column(name.trim())
        .with_hint(format!("Known columns: {}.", HEADER.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::{Column, HEADER};
    use crate::core::error::ErrorKind;

    #[test]
    fn names_follow_header_order() {
        let names: Vec<&str> = Column::ALL.iter().map(|column| column.name()).collect();
        assert_eq!(names, HEADER);
    }

    #[test]
    fn from_name_tolerates_bom_and_padding() {
        assert_eq!(Column::from_name("\u{feff}_id"), Some(Column::Id));
        assert_eq!(Column::from_name(" SSC Client "), Some(Column::SscClient));
        assert_eq!(Column::from_name("ssc client"), None);
    }

    #[test]
    fn unknown_column_is_validation_error() {
        let err = Column::parse("Colour").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.column(), Some("Colour"));
    }
}
