use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error::{DashboardError, DashboardResult};

/// Storage and presentation type of a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Id,
    Integer,
    Real,
    Text,
    Date,
}

impl FieldKind {
    pub fn column_type(self) -> &'static str {
        match self {
            FieldKind::Id => "INTEGER PRIMARY KEY AUTOINCREMENT",
            FieldKind::Integer => "INTEGER NOT NULL",
            FieldKind::Real => "REAL NOT NULL",
            // dates are kept as YYYY-MM-DD text
            FieldKind::Text | FieldKind::Date => "TEXT NOT NULL",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, label: &'static str, kind: FieldKind) -> Field {
    Field { name, label, kind }
}

const fn real(name: &'static str, label: &'static str) -> Field {
    field(name, label, FieldKind::Real)
}

const fn integer(name: &'static str, label: &'static str) -> Field {
    field(name, label, FieldKind::Integer)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Date(NaiveDate),
}

impl FieldValue {
    /// Numeric view used by charts. Text and dates have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(value) => Some(*value as f64),
            FieldValue::Real(value) => Some(*value),
            FieldValue::Text(_) | FieldValue::Date(_) => None,
        }
    }

    /// Exact grouping key. Reals keep full precision, unlike `Display`.
    pub fn category_key(&self) -> String {
        match self {
            FieldValue::Real(value) => value.to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(value) => write!(f, "{value}"),
            FieldValue::Real(value) => write!(f, "{value:.2}"),
            FieldValue::Text(value) => f.write_str(value),
            FieldValue::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
        }
    }
}

/// A flat row whose ordered field list drives table creation, statement
/// generation, row decoding and melting.
///
/// `FIELDS` starts with the id column; `values` yields the remaining fields
/// in the same declared order.
pub trait Record: Sized + Send + Unpin {
    const TABLE: &'static str;
    const FIELDS: &'static [Field];

    fn id(&self) -> Option<i64>;
    fn values(&self) -> Vec<FieldValue>;
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error>;

    fn id_field() -> &'static str {
        Self::FIELDS
            .iter()
            .find(|field| field.kind == FieldKind::Id)
            .map(|field| field.name)
            .unwrap_or("id")
    }

    fn data_fields() -> impl Iterator<Item = &'static Field> {
        Self::FIELDS
            .iter()
            .filter(|field| field.kind != FieldKind::Id)
    }

    /// Looks a value up by column name. Unsaved records report id 0.
    fn value_of(&self, name: &str) -> DashboardResult<FieldValue> {
        if name == Self::id_field() {
            return Ok(FieldValue::Integer(self.id().unwrap_or_default()));
        }

        Self::data_fields()
            .position(|field| field.name == name)
            .and_then(|index| self.values().into_iter().nth(index))
            .ok_or_else(|| DashboardError::UnknownField {
                table: Self::TABLE,
                field: name.to_string(),
            })
    }
}

fn decode_error(err: DashboardError) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Complete")]
    Complete,
    #[serde(rename = "Overdue")]
    Overdue,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Complete,
        TaskStatus::InProgress,
        TaskStatus::NotStarted,
        TaskStatus::Overdue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "Not Started",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Complete => "Complete",
            TaskStatus::Overdue => "Overdue",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = DashboardError;

    /// Accepts the display text in any case, with `-` or `_` in place of spaces.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().replace(['-', '_'], " ");
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| DashboardError::InvalidStatus(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: Option<i64>,
    pub name: String,
    pub client: String,
    pub status: TaskStatus,
    pub length_days: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Record for Task {
    const TABLE: &'static str = "tasks";
    const FIELDS: &'static [Field] = &[
        field("id", "ID", FieldKind::Id),
        field("task_name", "Task Name", FieldKind::Text),
        field("client_name", "Client Name", FieldKind::Text),
        field("status", "Status", FieldKind::Text),
        integer("task_length", "Task Length"),
        field("start_date", "Start Date", FieldKind::Date),
        field("end_date", "End Date", FieldKind::Date),
    ];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Text(self.name.clone()),
            FieldValue::Text(self.client.clone()),
            FieldValue::Text(self.status.as_str().to_string()),
            FieldValue::Integer(self.length_days),
            FieldValue::Date(self.start_date),
            FieldValue::Date(self.end_date),
        ]
    }

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: Some(row.try_get("id")?),
            name: row.try_get("task_name")?,
            client: row.try_get("client_name")?,
            status: status.parse().map_err(decode_error)?,
            length_days: row.try_get("task_length")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialSnapshot {
    pub id: Option<i64>,
    pub current_balance: f64,
    pub invoices_issued_30: f64,
    pub invoices_issued_quarter: f64,
    pub invoices_issued_ytd: f64,
    pub quotes_generated_30: f64,
    pub quotes_generated_quarter: f64,
    pub quotes_generated_ytd: f64,
}

impl Record for FinancialSnapshot {
    const TABLE: &'static str = "finances";
    const FIELDS: &'static [Field] = &[
        field("id", "ID", FieldKind::Id),
        real("current_balance", "Current Balance"),
        real("invoices_issued_30", "Invoices Issued (30 Days)"),
        real("invoices_issued_quarter", "Invoices Issued (Quarter)"),
        real("invoices_issued_ytd", "Invoices Issued (YTD)"),
        real("quotes_generated_30", "Quotes Generated (30 Days)"),
        real("quotes_generated_quarter", "Quotes Generated (Quarter)"),
        real("quotes_generated_ytd", "Quotes Generated (YTD)"),
    ];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Real(self.current_balance),
            FieldValue::Real(self.invoices_issued_30),
            FieldValue::Real(self.invoices_issued_quarter),
            FieldValue::Real(self.invoices_issued_ytd),
            FieldValue::Real(self.quotes_generated_30),
            FieldValue::Real(self.quotes_generated_quarter),
            FieldValue::Real(self.quotes_generated_ytd),
        ]
    }

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: Some(row.try_get("id")?),
            current_balance: row.try_get("current_balance")?,
            invoices_issued_30: row.try_get("invoices_issued_30")?,
            invoices_issued_quarter: row.try_get("invoices_issued_quarter")?,
            invoices_issued_ytd: row.try_get("invoices_issued_ytd")?,
            quotes_generated_30: row.try_get("quotes_generated_30")?,
            quotes_generated_quarter: row.try_get("quotes_generated_quarter")?,
            quotes_generated_ytd: row.try_get("quotes_generated_ytd")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadSnapshot {
    pub id: Option<i64>,
    pub linkedin_leads: i64,
    pub web_leads: i64,
    pub briefs_not_started: i64,
    pub quotes_issued: i64,
    pub briefs_completed: i64,
    pub invoices_issued_leads: f64,
}

impl Record for LeadSnapshot {
    const TABLE: &'static str = "leads";
    const FIELDS: &'static [Field] = &[
        field("id", "ID", FieldKind::Id),
        integer("linkedin_leads", "LinkedIn Leads"),
        integer("web_leads", "Website Leads"),
        integer("briefs_not_started", "Briefs Not Started"),
        integer("quotes_issued", "Quotes Issued"),
        integer("briefs_completed", "Briefs Completed"),
        real("invoices_issued_leads", "Invoices Issued (Leads)"),
    ];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Integer(self.linkedin_leads),
            FieldValue::Integer(self.web_leads),
            FieldValue::Integer(self.briefs_not_started),
            FieldValue::Integer(self.quotes_issued),
            FieldValue::Integer(self.briefs_completed),
            FieldValue::Real(self.invoices_issued_leads),
        ]
    }

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: Some(row.try_get("id")?),
            linkedin_leads: row.try_get("linkedin_leads")?,
            web_leads: row.try_get("web_leads")?,
            briefs_not_started: row.try_get("briefs_not_started")?,
            quotes_issued: row.try_get("quotes_issued")?,
            briefs_completed: row.try_get("briefs_completed")?,
            invoices_issued_leads: row.try_get("invoices_issued_leads")?,
        })
    }
}
