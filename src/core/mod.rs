// Core modules implementing record parsing, table storage, sorting, and error modeling.
pub mod date;
pub mod error;
pub mod query;
pub mod record;
pub mod schema;
pub mod table;
