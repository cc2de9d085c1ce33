// Database adapter trait shared by the three backends
use crate::error::AppError;
use crate::services::database::DatabaseType;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// What a statement produced
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Result set, column order preserved
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    /// Statement without a result set
    Affected {
        rows_affected: u64,
        last_insert_id: Option<u64>,
    },
}

/// Query execution result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub outcome: QueryOutcome,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Number of rows returned, or rows affected
    pub fn row_count(&self) -> u64 {
        match &self.outcome {
            QueryOutcome::Rows { rows, .. } => rows.len() as u64,
            QueryOutcome::Affected { rows_affected, .. } => *rows_affected,
        }
    }

    /// One-word summary for the turn log
    pub fn summary(&self) -> String {
        match &self.outcome {
            QueryOutcome::Rows { rows, .. } => format!("rows={}", rows.len()),
            QueryOutcome::Affected { rows_affected, .. } => format!("affected={}", rows_affected),
        }
    }
}

/// One column of a user table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
}

/// A user table and its columns, in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Database adapter trait - one implementation per backend.
/// The SQL handed to `execute` is passed to the driver unchanged.
#[async_trait::async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Execute a single SQL statement as-is
    async fn execute(&self, sql: &str) -> Result<QueryResult, AppError>;

    /// Get database type
    fn database_type(&self) -> DatabaseType;

    /// Test connection
    async fn test_connection(&self) -> Result<(), AppError>;

    /// Tables of the connected database with their columns, ordered by table name
    async fn describe_schema(&self) -> Result<Vec<TableSchema>, AppError>;

    /// On-disk size of the database, when the backend can tell
    async fn size_bytes(&self) -> Option<u64> {
        None
    }

    /// Write a consistent copy of the database into `dir`
    async fn backup(&self, _dir: &Path) -> Result<PathBuf, AppError> {
        Err(AppError::NotImplemented(format!(
            "backup is not supported for {} backends",
            self.database_type()
        )))
    }

    /// Close the connection; later calls fail with a connection error
    async fn close(&self) -> Result<(), AppError>;
}

pub(crate) fn closed_error(db_type: DatabaseType) -> AppError {
    AppError::Connection(format!("{} connection is closed", db_type))
}

/// Group `information_schema` rows of
/// (table, column, type, is_nullable, is_primary_key) into tables.
/// Rows must arrive ordered by table.
pub(crate) fn schema_from_rows(rows: &[Vec<Value>]) -> Vec<TableSchema> {
    let text = |row: &[Value], idx: usize| -> String {
        match row.get(idx) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    };
    let yes = |row: &[Value], idx: usize| text(row, idx).eq_ignore_ascii_case("YES");

    let mut tables: Vec<TableSchema> = Vec::new();
    for row in rows {
        let table_name = text(row, 0);
        let column = ColumnInfo {
            name: text(row, 1),
            data_type: text(row, 2),
            nullable: yes(row, 3),
            primary_key: yes(row, 4),
        };

        match tables.last_mut() {
            Some(table) if table.name == table_name => table.columns.push(column),
            _ => tables.push(TableSchema {
                name: table_name,
                columns: vec![column],
            }),
        }
    }
    tables
}
