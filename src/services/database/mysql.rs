// MySQL adapter: one client connection for the process lifetime
use crate::error::AppError;
use crate::services::database::adapter::{
    closed_error, schema_from_rows, DatabaseAdapter, QueryOutcome, QueryResult, TableSchema,
};
use crate::services::database::{mask_credentials, DatabaseType};
use mysql_async::{prelude::*, Conn, Opts, Row, Value as MySqlValue};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

pub struct MySQLAdapter {
    conn: Mutex<Option<Conn>>,
    timeout_secs: u64,
}

impl MySQLAdapter {
    /// Validate MySQL URL format and turn it into driver options
    pub fn parse_opts(connection_url: &str) -> Result<Opts, AppError> {
        let url = Url::parse(connection_url)
            .map_err(|e| AppError::Validation(format!("Invalid MySQL URL: {}", e)))?;

        if url.scheme() != "mysql" && url.scheme() != "mariadb" {
            return Err(AppError::Validation(
                "URL must use mysql:// or mariadb:// scheme".to_string(),
            ));
        }

        // The driver only understands the mysql scheme
        let normalized = if url.scheme() == "mariadb" {
            connection_url.replacen("mariadb://", "mysql://", 1)
        } else {
            connection_url.to_string()
        };

        Opts::from_url(&normalized)
            .map_err(|e| AppError::Validation(format!("Invalid MySQL URL: {}", e)))
    }

    pub async fn connect(connection_url: &str, timeout_secs: u64) -> Result<Self, AppError> {
        let opts = Self::parse_opts(connection_url)?;

        let conn = Conn::new(opts).await.map_err(|e| {
            AppError::Connection(format!(
                "Failed to connect to {}: {}",
                mask_credentials(connection_url),
                e
            ))
        })?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            timeout_secs,
        })
    }

    async fn run_statement(conn: &mut Conn, sql: &str) -> Result<QueryOutcome, mysql_async::Error> {
        let mut result = conn.query_iter(sql).await?;

        let columns: Vec<String> = result
            .columns()
            .map(|cols| cols.iter().map(|c| c.name_str().into_owned()).collect())
            .unwrap_or_default();

        let rows: Vec<Row> = result.collect().await?;
        let rows_affected = result.affected_rows();
        let last_insert_id = result.last_insert_id();
        result.drop_result().await?;

        if columns.is_empty() {
            return Ok(QueryOutcome::Affected {
                rows_affected,
                last_insert_id,
            });
        }

        // Convert rows to JSON, keeping column order
        let data = rows
            .into_iter()
            .map(|row| {
                (0..columns.len())
                    .map(|idx| match row.as_ref(idx) {
                        Some(mysql_val) => Self::mysql_value_to_json(mysql_val.clone()),
                        None => Value::Null,
                    })
                    .collect()
            })
            .collect();

        Ok(QueryOutcome::Rows { columns, rows: data })
    }

    /// Helper function to convert MySQL Value to JSON Value
    fn mysql_value_to_json(mysql_val: MySqlValue) -> Value {
        match mysql_val {
            MySqlValue::NULL => Value::Null,
            MySqlValue::Bytes(bytes) => {
                // Try to convert to UTF-8 string
                match String::from_utf8(bytes) {
                    Ok(s) => json!(s),
                    Err(e) => json!(format!("<binary {} bytes>", e.as_bytes().len())),
                }
            }
            MySqlValue::Int(i) => json!(i),
            MySqlValue::UInt(u) => json!(u),
            MySqlValue::Float(f) => json!(f),
            MySqlValue::Double(d) => json!(d),
            MySqlValue::Date(y, m, d, h, min, s, _) => {
                json!(format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, m, d, h, min, s))
            }
            MySqlValue::Time(is_neg, d, h, m, s, _) => {
                let sign = if is_neg { "-" } else { "" };
                let total_hours = d * 24 + h as u32;
                json!(format!("{}{}:{:02}:{:02}", sign, total_hours, m, s))
            }
        }
    }
}

#[async_trait::async_trait]
impl DatabaseAdapter for MySQLAdapter {
    async fn execute(&self, sql: &str) -> Result<QueryResult, AppError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| closed_error(DatabaseType::MySQL))?;

        let start_time = Instant::now();

        let outcome = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            Self::run_statement(conn, sql),
        )
        .await
        .map_err(|_| AppError::Database(format!("Query timeout after {} seconds", self.timeout_secs)))?
        .map_err(|e| AppError::Database(format!("Query execution failed: {}", e)))?;

        Ok(QueryResult {
            outcome,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    async fn test_connection(&self) -> Result<(), AppError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| closed_error(DatabaseType::MySQL))?;
        conn.ping()
            .await
            .map_err(|e| AppError::Connection(format!("MySQL connection test failed: {}", e)))
    }

    async fn describe_schema(&self) -> Result<Vec<TableSchema>, AppError> {
        let result = self
            .execute(
                "SELECT table_name, column_name, column_type, is_nullable, \
                 IF(column_key = 'PRI', 'YES', 'NO') \
                 FROM information_schema.columns \
                 WHERE table_schema = DATABASE() \
                 ORDER BY table_name, ordinal_position",
            )
            .await?;
        match result.outcome {
            QueryOutcome::Rows { rows, .. } => Ok(schema_from_rows(&rows)),
            QueryOutcome::Affected { .. } => Ok(Vec::new()),
        }
    }

    async fn close(&self) -> Result<(), AppError> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.disconnect()
                .await
                .map_err(|e| AppError::Connection(format!("Failed to close MySQL connection: {}", e)))?;
            tracing::debug!("Closed MySQL connection");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_opts() {
        let opts = MySQLAdapter::parse_opts("mysql://root:pw@db.internal:3307/shop").unwrap();
        assert_eq!(opts.ip_or_hostname(), "db.internal");
        assert_eq!(opts.tcp_port(), 3307);
        assert_eq!(opts.db_name(), Some("shop"));
        assert_eq!(opts.user(), Some("root"));

        let opts = MySQLAdapter::parse_opts("mariadb://localhost/app").unwrap();
        assert_eq!(opts.db_name(), Some("app"));
    }

    #[test]
    fn test_parse_opts_rejects_other_schemes() {
        let err = MySQLAdapter::parse_opts("postgres://localhost/app").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_value_conversion() {
        assert_eq!(MySQLAdapter::mysql_value_to_json(MySqlValue::NULL), Value::Null);
        assert_eq!(MySQLAdapter::mysql_value_to_json(MySqlValue::Int(-4)), json!(-4));
        assert_eq!(
            MySQLAdapter::mysql_value_to_json(MySqlValue::Bytes(b"Alice".to_vec())),
            json!("Alice")
        );
        assert_eq!(
            MySQLAdapter::mysql_value_to_json(MySqlValue::Date(2024, 3, 9, 14, 5, 0, 0)),
            json!("2024-03-09 14:05:00")
        );
        assert_eq!(
            MySQLAdapter::mysql_value_to_json(MySqlValue::Time(true, 1, 2, 3, 4, 0)),
            json!("-26:03:04")
        );
    }
}
