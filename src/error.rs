use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv failure: {0}")]
    Csv(#[from] csv::Error),
    #[error("table `{table}` has no field named `{field}`")]
    UnknownField { table: &'static str, field: String },
    #[error("unknown task status `{0}` (expected Not Started, In Progress, Complete or Overdue)")]
    InvalidStatus(String),
    #[error("no row with id {id} in `{table}`")]
    NotFound { table: &'static str, id: i64 },
}

pub type DashboardResult<T> = Result<T, DashboardError>;
