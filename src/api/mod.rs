//! Purpose: Define the stable public Rust API boundary for fiscaldata.
//! Exports: Record and table types plus the `DataClient` facade used by the CLI.
//! Role: Public, additive-only surface; hides internal storage helpers.
//! Invariants: Presentation code reaches the table only through `DataClient`.
//! Invariants: No file handles are exposed; callers see records and errors.

mod client;

pub use crate::core::date::DateParseWarning;
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::query::SortKey;
pub use crate::core::record::{Fields, Record};
pub use crate::core::schema::{Column, HEADER};
pub use client::{ApiResult, DataClient};
