use std::path::{Path, PathBuf};

pub const DEFAULT_RECORDS_FILE: &str = "records.dat";
pub const RECORDS_FILE_ENV: &str = "RECORDBOOKD_FILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub records_path: PathBuf,
}

impl StoreConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            records_path: path.into(),
        }
    }

    /// `RECORDBOOKD_FILE` if set and non-blank, else `records.dat` in the
    /// working directory.
    pub fn from_env() -> Self {
        Self::resolve(std::env::var(RECORDS_FILE_ENV).ok().as_deref())
    }

    fn resolve(env_value: Option<&str>) -> Self {
        match env_value.map(str::trim) {
            Some(v) if !v.is_empty() => Self::at(v),
            _ => Self::at(DEFAULT_RECORDS_FILE),
        }
    }

    pub fn records_path(&self) -> &Path {
        &self.records_path
    }
}
