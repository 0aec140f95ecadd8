use std::ffi::OsString;
use std::path::PathBuf;

pub const DEFAULT_DB_FILE: &str = "ceo_dashboard.db";
pub const DB_PATH_ENV: &str = "DASHBOARD_DB";
pub const LOG_FILTER_ENV: &str = "DASHBOARD_LOG";
pub const DEFAULT_LOG_FILTER: &str = "ceo_dashboard=info,sqlx=warn";

/// `--db` wins over `DASHBOARD_DB`, which wins over the default file name.
pub fn resolve_db_path(flag: Option<PathBuf>) -> PathBuf {
    db_path_from(flag, std::env::var_os(DB_PATH_ENV))
}

fn db_path_from(flag: Option<PathBuf>, env_value: Option<OsString>) -> PathBuf {
    flag.or_else(|| {
        env_value
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
    .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE))
}
