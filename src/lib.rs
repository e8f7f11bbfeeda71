//! Purpose: Shared library crate used by the `fiscaldata` CLI and tests.
//! Exports: `core` (records, table store, sorting, errors), `api` (access facade), `notice`.
//! Role: Record-model layer for the data centre availability dataset.
//! Invariants: The dataset is only read by an explicit load; nothing loads at startup.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
pub mod notice;
