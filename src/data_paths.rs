//! Purpose: Resolve the backing CSV path used by every CLI command.
//! Exports: `default_data_file`, `display_path`.
//! Role: Keep flag, environment, and default path semantics in one place.
//! Invariants: `--file` wins over `FISCALDATA_FILE`, which wins over the default name.

use std::path::{Path, PathBuf};

pub(crate) const DATA_FILE_ENV: &str = "FISCALDATA_FILE";
pub(crate) const DEFAULT_DATA_FILE: &str = "DataCentreAvailability.csv";

pub(crate) fn default_data_file() -> PathBuf {
    match std::env::var_os(DATA_FILE_ENV) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(DEFAULT_DATA_FILE),
    }
}

pub(crate) fn display_path(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::display_path;
    use std::path::Path;

    #[test]
    fn display_path_prefers_file_name() {
        assert_eq!(
            display_path(Path::new("/srv/data/DataCentreAvailability.csv")),
            "DataCentreAvailability.csv"
        );
        assert_eq!(display_path(Path::new("/")), "/");
    }
}
