// PostgreSQL adapter: one client connection for the process lifetime
use crate::error::AppError;
use crate::services::database::adapter::{
    closed_error, schema_from_rows, DatabaseAdapter, QueryOutcome, QueryResult, TableSchema,
};
use crate::services::database::{mask_credentials, DatabaseType};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use url::Url;

const SCHEMA_QUERY: &str = r#"
SELECT c.table_name, c.column_name, c.data_type, c.is_nullable,
       CASE WHEN k.column_name IS NULL THEN 'NO' ELSE 'YES' END
FROM information_schema.columns c
LEFT JOIN information_schema.table_constraints t
       ON t.table_schema = c.table_schema
      AND t.table_name = c.table_name
      AND t.constraint_type = 'PRIMARY KEY'
LEFT JOIN information_schema.key_column_usage k
       ON k.constraint_name = t.constraint_name
      AND k.table_schema = t.table_schema
      AND k.table_name = c.table_name
      AND k.column_name = c.column_name
WHERE c.table_schema = current_schema()
ORDER BY c.table_name, c.ordinal_position
"#;

pub struct PostgreSQLAdapter {
    client: Mutex<Option<Client>>,
    connection_task: Mutex<Option<JoinHandle<()>>>,
    timeout_secs: u64,
}

impl PostgreSQLAdapter {
    /// Validate PostgreSQL URL format
    pub fn validate_url(connection_url: &str) -> Result<(), AppError> {
        let url = Url::parse(connection_url)
            .map_err(|e| AppError::Validation(format!("Invalid PostgreSQL URL: {}", e)))?;

        if url.scheme() != "postgresql" && url.scheme() != "postgres" {
            return Err(AppError::Validation(
                "URL must use postgresql:// or postgres:// scheme".to_string(),
            ));
        }

        Ok(())
    }

    pub async fn connect(connection_url: &str, timeout_secs: u64) -> Result<Self, AppError> {
        Self::validate_url(connection_url)?;

        let (client, connection) = tokio_postgres::connect(connection_url, NoTls)
            .await
            .map_err(|e| {
                AppError::Connection(format!(
                    "Failed to connect to {}: {}",
                    mask_credentials(connection_url),
                    e
                ))
            })?;

        // The connection object performs the actual communication with the server
        let connection_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self {
            client: Mutex::new(Some(client)),
            connection_task: Mutex::new(Some(connection_task)),
            timeout_secs,
        })
    }

    /// Reduce driver messages to the parts the outcome is built from
    fn to_events(messages: Vec<SimpleQueryMessage>) -> Vec<StatementEvent> {
        messages
            .into_iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::RowDescription(description) => Some(StatementEvent::Columns(
                    description.iter().map(|c| c.name().to_string()).collect(),
                )),
                SimpleQueryMessage::Row(row) => Some(StatementEvent::Row {
                    columns: row.columns().iter().map(|c| c.name().to_string()).collect(),
                    values: (0..row.len()).map(|idx| row.get(idx).map(str::to_string)).collect(),
                }),
                SimpleQueryMessage::CommandComplete(count) => Some(StatementEvent::Complete(count)),
                _ => None,
            })
            .collect()
    }

    /// Fold statement events into the outcome of the last statement
    fn collect_outcome(events: Vec<StatementEvent>) -> QueryOutcome {
        let mut columns: Option<Vec<String>> = None;
        let mut rows: Vec<Vec<Value>> = Vec::new();
        let mut outcome = QueryOutcome::Affected {
            rows_affected: 0,
            last_insert_id: None,
        };

        for event in events {
            match event {
                StatementEvent::Columns(names) => {
                    columns = Some(names);
                    rows.clear();
                }
                StatementEvent::Row {
                    columns: row_columns,
                    values,
                } => {
                    if columns.is_none() {
                        columns = Some(row_columns);
                    }
                    rows.push(
                        values
                            .into_iter()
                            .map(|value| value.map(Value::String).unwrap_or(Value::Null))
                            .collect(),
                    );
                }
                StatementEvent::Complete(count) => {
                    outcome = match columns.take() {
                        Some(columns) => QueryOutcome::Rows {
                            columns,
                            rows: std::mem::take(&mut rows),
                        },
                        None => QueryOutcome::Affected {
                            rows_affected: count,
                            last_insert_id: None,
                        },
                    };
                }
            }
        }

        outcome
    }
}

/// Simple-query protocol messages, values in text form
#[derive(Debug)]
enum StatementEvent {
    Columns(Vec<String>),
    Row {
        columns: Vec<String>,
        values: Vec<Option<String>>,
    },
    Complete(u64),
}

#[async_trait::async_trait]
impl DatabaseAdapter for PostgreSQLAdapter {
    async fn execute(&self, sql: &str) -> Result<QueryResult, AppError> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(|| closed_error(DatabaseType::PostgreSQL))?;

        let start_time = Instant::now();

        // The simple-query protocol accepts any statement and reports row counts
        let messages = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            client.simple_query(sql),
        )
        .await
        .map_err(|_| AppError::Database(format!("Query timeout after {} seconds", self.timeout_secs)))?
        .map_err(|e| {
            let error_details = if let Some(db_error) = e.as_db_error() {
                format!(
                    "Code: {}, Message: {}",
                    db_error.code().code(),
                    db_error.message()
                )
            } else {
                format!("{}", e)
            };
            AppError::Database(format!("Query execution failed: {}", error_details))
        })?;

        Ok(QueryResult {
            outcome: Self::collect_outcome(Self::to_events(messages)),
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    async fn test_connection(&self) -> Result<(), AppError> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(|| closed_error(DatabaseType::PostgreSQL))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| AppError::Connection(format!("PostgreSQL connection test failed: {}", e)))?;
        Ok(())
    }

    async fn describe_schema(&self) -> Result<Vec<TableSchema>, AppError> {
        let result = self.execute(SCHEMA_QUERY).await?;
        match result.outcome {
            QueryOutcome::Rows { rows, .. } => Ok(schema_from_rows(&rows)),
            QueryOutcome::Affected { .. } => Ok(Vec::new()),
        }
    }

    async fn close(&self) -> Result<(), AppError> {
        // Dropping the client ends the connection task once pending requests finish
        drop(self.client.lock().await.take());

        if let Some(task) = self.connection_task.lock().await.take() {
            if let Err(e) = task.await {
                tracing::warn!("PostgreSQL connection task ended abnormally: {}", e);
            }
        }

        tracing::debug!("Closed PostgreSQL connection");
        Ok(())
    }
}
