use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Sqlite};
use tracing::{debug, info};

use crate::aggregate::recompute_length;
use crate::error::{DashboardError, DashboardResult};
use crate::models::{FieldValue, FinancialSnapshot, LeadSnapshot, Record, Task, TaskStatus};

/// Handle to the local dashboard store.
///
/// Holds connection settings only. Each operation opens its own connection
/// and closes it before returning.
#[derive(Debug, Clone)]
pub struct Gateway {
    path: PathBuf,
    options: SqliteConnectOptions,
}

impl Gateway {
    pub fn new(path: &Path) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self {
            path: path.to_path_buf(),
            options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn connect(&self) -> DashboardResult<SqliteConnection> {
        let conn = self.options.connect().await?;
        debug!(path = %self.path.display(), "opened store connection");
        Ok(conn)
    }

    /// Creates the three tables when missing. Safe on every start.
    pub async fn ensure_schema(&self) -> DashboardResult<()> {
        let mut conn = self.connect().await?;
        for sql in [
            create_table_sql::<Task>(),
            create_table_sql::<FinancialSnapshot>(),
            create_table_sql::<LeadSnapshot>(),
        ] {
            sqlx::query(&sql).execute(&mut conn).await?;
        }
        conn.close().await?;

        info!(path = %self.path.display(), "schema ready");
        Ok(())
    }

    /// All rows in insertion order.
    pub async fn list_rows<R: Record>(&self) -> DashboardResult<Vec<R>> {
        let sql = format!("{} ORDER BY {} ASC", select_sql::<R>(), R::id_field());

        let mut conn = self.connect().await?;
        let rows = sqlx::query(&sql).fetch_all(&mut conn).await?;
        conn.close().await?;

        let records = rows
            .iter()
            .map(R::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// The most recently inserted row (highest id), if any.
    pub async fn latest<R: Record>(&self) -> DashboardResult<Option<R>> {
        let sql = format!(
            "{} ORDER BY {} DESC LIMIT 1",
            select_sql::<R>(),
            R::id_field()
        );

        let mut conn = self.connect().await?;
        let row = sqlx::query(&sql).fetch_optional(&mut conn).await?;
        conn.close().await?;

        Ok(row.as_ref().map(R::from_row).transpose()?)
    }

    pub async fn find<R: Record>(&self, id: i64) -> DashboardResult<Option<R>> {
        let sql = format!("{} WHERE {} = ?1", select_sql::<R>(), R::id_field());

        let mut conn = self.connect().await?;
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut conn).await?;
        conn.close().await?;

        Ok(row.as_ref().map(R::from_row).transpose()?)
    }

    /// Inserts the record's data fields and returns the assigned id. Any id
    /// already set on the record is ignored.
    pub async fn insert<R: Record>(&self, record: &R) -> DashboardResult<i64> {
        let sql = insert_sql::<R>();

        let mut conn = self.connect().await?;
        let result = bind_values(sqlx::query(&sql), record.values())
            .execute(&mut conn)
            .await?;
        conn.close().await?;

        let id = result.last_insert_rowid();
        info!(table = R::TABLE, id, "row inserted");
        Ok(id)
    }

    /// Inserts all records on one connection inside a single transaction.
    pub async fn insert_many<R: Record>(&self, records: &[R]) -> DashboardResult<usize> {
        let sql = insert_sql::<R>();

        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;
        for record in records {
            bind_values(sqlx::query(&sql), record.values())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        conn.close().await?;

        info!(table = R::TABLE, count = records.len(), "rows inserted");
        Ok(records.len())
    }

    /// Overwrites every data field of row `id`.
    pub async fn update<R: Record>(&self, id: i64, record: &R) -> DashboardResult<()> {
        let sql = update_sql::<R>();

        let mut conn = self.connect().await?;
        let result = bind_values(sqlx::query(&sql), record.values())
            .bind(id)
            .execute(&mut conn)
            .await?;
        conn.close().await?;

        if result.rows_affected() == 0 {
            return Err(DashboardError::NotFound {
                table: R::TABLE,
                id,
            });
        }
        info!(table = R::TABLE, id, "row updated");
        Ok(())
    }

    pub async fn delete<R: Record>(&self, id: i64) -> DashboardResult<()> {
        let sql = format!("DELETE FROM {} WHERE {} = ?1", R::TABLE, R::id_field());

        let mut conn = self.connect().await?;
        let result = sqlx::query(&sql).bind(id).execute(&mut conn).await?;
        conn.close().await?;

        if result.rows_affected() == 0 {
            return Err(DashboardError::NotFound {
                table: R::TABLE,
                id,
            });
        }
        info!(table = R::TABLE, id, "row deleted");
        Ok(())
    }
}

fn bind_values<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: Vec<FieldValue>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            FieldValue::Integer(value) => query.bind(value),
            FieldValue::Real(value) => query.bind(value),
            FieldValue::Text(value) => query.bind(value),
            FieldValue::Date(value) => query.bind(value),
        };
    }
    query
}

pub fn create_table_sql<R: Record>() -> String {
    let columns: Vec<String> = R::FIELDS
        .iter()
        .map(|field| format!("{} {}", field.name, field.kind.column_type()))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        R::TABLE,
        columns.join(", ")
    )
}

pub fn select_sql<R: Record>() -> String {
    let columns: Vec<&str> = R::FIELDS.iter().map(|field| field.name).collect();
    format!("SELECT {} FROM {}", columns.join(", "), R::TABLE)
}

pub fn insert_sql<R: Record>() -> String {
    let columns: Vec<&str> = R::data_fields().map(|field| field.name).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|n| format!("?{n}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        R::TABLE,
        columns.join(", "),
        placeholders.join(", ")
    )
}

pub fn update_sql<R: Record>() -> String {
    let assignments: Vec<String> = R::data_fields()
        .enumerate()
        .map(|(index, field)| format!("{} = ?{}", field.name, index + 1))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        R::TABLE,
        assignments.join(", "),
        R::id_field(),
        assignments.len() + 1
    )
}

pub async fn seed(gateway: &Gateway) -> DashboardResult<()> {
    let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
    let tasks = vec![
        (
            "Quarterly brand audit",
            "Harbor Coffee",
            TaskStatus::InProgress,
            day(2026, 10, 1),
            day(2026, 10, 21),
        ),
        (
            "Pitch deck refresh",
            "Northwind Legal",
            TaskStatus::NotStarted,
            day(2026, 10, 20),
            day(2026, 11, 3),
        ),
        (
            "Website copy edit",
            "Harbor Coffee",
            TaskStatus::Complete,
            day(2026, 9, 14),
            day(2026, 9, 30),
        ),
    ];

    for (name, client, status, start_date, end_date) in tasks {
        gateway
            .insert(&Task {
                id: None,
                name: name.to_string(),
                client: client.to_string(),
                status,
                length_days: recompute_length(start_date, end_date),
                start_date,
                end_date,
            })
            .await?;
    }

    gateway
        .insert(&FinancialSnapshot {
            id: None,
            current_balance: 48_250.0,
            invoices_issued_30: 12_400.0,
            invoices_issued_quarter: 36_900.0,
            invoices_issued_ytd: 118_300.0,
            quotes_generated_30: 18_000.0,
            quotes_generated_quarter: 52_750.0,
            quotes_generated_ytd: 161_200.0,
        })
        .await?;

    gateway
        .insert(&LeadSnapshot {
            id: None,
            linkedin_leads: 14,
            web_leads: 9,
            briefs_not_started: 3,
            quotes_issued: 6,
            briefs_completed: 4,
            invoices_issued_leads: 9_850.0,
        })
        .await?;

    Ok(())
}

pub async fn import_csv(gateway: &Gateway, csv_path: &Path) -> DashboardResult<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        task_name: String,
        client_name: String,
        status: String,
        task_length: Option<i64>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut tasks = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        tasks.push(Task {
            id: None,
            name: row.task_name,
            client: row.client_name,
            status: row.status.parse()?,
            length_days: row
                .task_length
                .unwrap_or_else(|| recompute_length(row.start_date, row.end_date)),
            start_date: row.start_date,
            end_date: row.end_date,
        });
    }

    gateway.insert_many(&tasks).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_gateway() -> (Gateway, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Gateway::new(&dir.path().join("ceo_dashboard.db"));
        gateway.ensure_schema().await.unwrap();
        (gateway, dir)
    }

    fn sample_task() -> Task {
        Task {
            id: None,
            name: "Logo concepts".to_string(),
            client: "Harbor Coffee".to_string(),
            status: TaskStatus::NotStarted,
            length_days: 3,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 13).unwrap(),
        }
    }

    fn finances(balance: f64) -> FinancialSnapshot {
        FinancialSnapshot {
            id: None,
            current_balance: balance,
            invoices_issued_30: 100.0,
            invoices_issued_quarter: 300.0,
            invoices_issued_ytd: 900.0,
            quotes_generated_30: 50.0,
            quotes_generated_quarter: 150.0,
            quotes_generated_ytd: 450.0,
        }
    }

    #[test]
    fn statements_follow_field_order() {
        assert_eq!(
            insert_sql::<LeadSnapshot>(),
            "INSERT INTO leads (linkedin_leads, web_leads, briefs_not_started, quotes_issued, \
             briefs_completed, invoices_issued_leads) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        );
        let update = update_sql::<Task>();
        assert!(update.ends_with("end_date = ?6 WHERE id = ?7"));
        let create = create_table_sql::<Task>();
        assert!(create.starts_with("CREATE TABLE IF NOT EXISTS tasks (id INTEGER PRIMARY KEY"));
        assert_eq!(
            select_sql::<Task>(),
            "SELECT id, task_name, client_name, status, task_length, start_date, \
             end_date FROM tasks"
        );
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let (gateway, _dir) = open_gateway().await;
        gateway.insert(&sample_task()).await.unwrap();
        gateway.ensure_schema().await.unwrap();
        assert_eq!(gateway.list_rows::<Task>().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_tables_list_nothing() {
        let (gateway, _dir) = open_gateway().await;
        assert!(gateway.list_rows::<Task>().await.unwrap().is_empty());
        assert!(gateway.latest::<LeadSnapshot>().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inserted_task_lists_back_with_assigned_id() {
        let (gateway, _dir) = open_gateway().await;
        let task = sample_task();
        let id = gateway.insert(&task).await.unwrap();

        let tasks = gateway.list_rows::<Task>().await.unwrap();
        assert_eq!(tasks.len(), 1);
        let expected = Task {
            id: Some(id),
            ..task
        };
        assert_eq!(tasks[0], expected);
    }

    #[tokio::test]
    async fn latest_snapshot_is_highest_id() {
        let (gateway, _dir) = open_gateway().await;
        gateway.insert(&finances(10.0)).await.unwrap();
        let newest = gateway.insert(&finances(20.0)).await.unwrap();

        let latest = gateway.latest::<FinancialSnapshot>().await.unwrap().unwrap();
        assert_eq!(latest.id, Some(newest));
        assert_eq!(latest.current_balance, 20.0);
    }

    #[tokio::test]
    async fn update_touches_only_the_given_id() {
        let (gateway, _dir) = open_gateway().await;
        let first = gateway.insert(&finances(10.0)).await.unwrap();
        let second = gateway.insert(&finances(20.0)).await.unwrap();

        gateway.update(first, &finances(99.5)).await.unwrap();

        let rows = gateway.list_rows::<FinancialSnapshot>().await.unwrap();
        assert_eq!(rows[0].id, Some(first));
        assert_eq!(rows[0].current_balance, 99.5);
        assert_eq!(rows[1].id, Some(second));
        assert_eq!(rows[1].current_balance, 20.0);
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let (gateway, _dir) = open_gateway().await;
        assert!(matches!(
            gateway.update(42, &sample_task()).await,
            Err(DashboardError::NotFound {
                table: "tasks",
                id: 42,
            })
        ));
        assert!(matches!(
            gateway.delete::<Task>(42).await,
            Err(DashboardError::NotFound {
                table: "tasks",
                id: 42,
            })
        ));
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let (gateway, _dir) = open_gateway().await;
        let keep = gateway.insert(&sample_task()).await.unwrap();
        let removed = gateway.insert(&sample_task()).await.unwrap();

        gateway.delete::<Task>(removed).await.unwrap();

        let ids: Vec<Option<i64>> = gateway
            .list_rows::<Task>()
            .await
            .unwrap()
            .into_iter()
            .map(|task| task.id)
            .collect();
        assert_eq!(ids, vec![Some(keep)]);
        assert!(gateway.find::<Task>(removed).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn negative_lengths_are_stored_as_given() {
        let (gateway, _dir) = open_gateway().await;
        let mut task = sample_task();
        task.start_date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        task.end_date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        task.length_days = recompute_length(task.start_date, task.end_date);

        let id = gateway.insert(&task).await.unwrap();
        let stored = gateway.find::<Task>(id).await.unwrap().unwrap();
        assert_eq!(stored.length_days, -5);
    }

    #[tokio::test]
    async fn unopenable_store_is_a_storage_failure() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Gateway::new(&dir.path().join("missing").join("dash.db"));
        assert!(matches!(
            gateway.ensure_schema().await,
            Err(DashboardError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn seed_fills_every_table() {
        let (gateway, _dir) = open_gateway().await;
        seed(&gateway).await.unwrap();
        assert_eq!(gateway.list_rows::<Task>().await.unwrap().len(), 3);
        let finances = gateway.latest::<FinancialSnapshot>().await.unwrap();
        let leads = gateway.latest::<LeadSnapshot>().await.unwrap();
        assert!(finances.is_some());
        assert!(leads.is_some());
    }

    #[tokio::test]
    async fn csv_import_inserts_tasks() {
        let (gateway, dir) = open_gateway().await;
        let csv_path = dir.path().join("tasks.csv");
        std::fs::write(
            &csv_path,
            "task_name,client_name,status,task_length,start_date,end_date\n\
             Menu redesign,Harbor Coffee,In Progress,,2024-01-10,2024-01-15\n\
             Annual report,Northwind Legal,Complete,12,2024-02-01,2024-02-10\n",
        )
        .unwrap();

        let inserted = import_csv(&gateway, &csv_path).await.unwrap();
        assert_eq!(inserted, 2);

        let tasks = gateway.list_rows::<Task>().await.unwrap();
        assert_eq!(tasks[0].length_days, 5);
        assert_eq!(tasks[0].status, TaskStatus::InProgress);
        assert_eq!(tasks[1].length_days, 12);
    }

    #[tokio::test]
    async fn csv_import_rejects_unknown_status() {
        let (gateway, dir) = open_gateway().await;
        let csv_path = dir.path().join("tasks.csv");
        std::fs::write(
            &csv_path,
            "task_name,client_name,status,task_length,start_date,end_date\n\
             Menu redesign,Harbor Coffee,Blocked,1,2024-01-10,2024-01-11\n",
        )
        .unwrap();

        assert!(matches!(
            import_csv(&gateway, &csv_path).await,
            Err(DashboardError::InvalidStatus(_))
        ));
        assert!(gateway.list_rows::<Task>().await.unwrap().is_empty());
    }
}
