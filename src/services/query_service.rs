use crate::error::AppError;
use crate::models::QueryTurn;
use crate::services::database::{DatabaseAdapter, DatabaseType, QueryOutcome, TableSchema};
use serde_json::Value;
use crate::services::llm_service::LlmService;
use crate::services::query_log::QueryLog;
use crate::validation::SqlValidator;

/// Row count per table plus the on-disk size when the backend has one
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseStats {
    pub tables: Vec<(String, u64)>,
    pub size_bytes: Option<u64>,
}

/// Runs the stages of one turn: model call, SQL extraction, execution, logging.
///
/// Every turn that reaches the model call ends up in the turn log exactly once,
/// whatever its outcome.
pub struct QueryService {
    llm: LlmService,
    adapter: Box<dyn DatabaseAdapter>,
    log: QueryLog,
    backend_name: String,
}

impl QueryService {
    pub fn new(
        llm: LlmService,
        adapter: Box<dyn DatabaseAdapter>,
        log: QueryLog,
        backend_name: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            adapter,
            log,
            backend_name: backend_name.into(),
        }
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub fn database_type(&self) -> DatabaseType {
        self.adapter.database_type()
    }

    pub fn adapter(&self) -> &dyn DatabaseAdapter {
        self.adapter.as_ref()
    }

    pub fn llm(&self) -> &LlmService {
        &self.llm
    }

    pub fn llm_mut(&mut self) -> &mut LlmService {
        &mut self.llm
    }

    /// Ask the model for SQL. The turn comes back `translated`, or `failed`
    /// (already logged) when the model call or extraction did not succeed.
    pub async fn translate(&mut self, question: &str) -> QueryTurn {
        let mut turn = QueryTurn::new(self.backend_name.as_str(), question);
        tracing::info!("Generating SQL from natural language question: {}", question);

        match self.llm.generate_sql_from_natural_language(question).await {
            Ok(generated) => {
                tracing::info!("Generated SQL from natural language: {}", generated.sql);
                turn.model_response = Some(generated.response);
                turn.mark_translated(generated.sql);
            }
            Err(e) => {
                tracing::warn!("Translation failed for turn {}: {}", turn.id, e);
                turn.mark_failed(&e);
                self.record(&turn);
            }
        }

        turn
    }

    /// Warning for a translated turn whose SQL destroys data or structure
    pub fn dangerous_warning(&self, turn: &QueryTurn) -> Option<&'static str> {
        turn.generated_sql
            .as_deref()
            .and_then(|sql| SqlValidator::dangerous_warning(sql, self.database_type()))
    }

    /// Run the generated SQL as-is and log the outcome
    pub async fn execute(&self, turn: &mut QueryTurn) {
        let Some(sql) = turn.generated_sql.clone() else {
            turn.mark_failed(&AppError::Internal("turn has no generated SQL".to_string()));
            self.record(turn);
            return;
        };

        match self.adapter.execute(&sql).await {
            Ok(result) => {
                tracing::info!(
                    "Turn {} completed: {} in {} ms",
                    turn.id,
                    result.summary(),
                    result.execution_time_ms
                );
                turn.mark_completed(result);
            }
            Err(e) => {
                tracing::error!("Query execution error: {}", e);
                turn.mark_failed(&e);
            }
        }

        self.record(turn);
    }

    pub async fn describe_schema(&self) -> Result<Vec<TableSchema>, AppError> {
        self.adapter.describe_schema().await
    }

    pub async fn statistics(&self) -> Result<DatabaseStats, AppError> {
        let database_type = self.database_type();
        let mut tables = Vec::new();

        for table in self.adapter.describe_schema().await? {
            let sql = format!(
                "SELECT COUNT(*) FROM {}",
                database_type.quote_identifier(&table.name)
            );
            let result = self.adapter.execute(&sql).await?;
            let count = match &result.outcome {
                QueryOutcome::Rows { rows, .. } => rows
                    .first()
                    .and_then(|row| row.first())
                    .and_then(count_value),
                QueryOutcome::Affected { .. } => None,
            }
            .ok_or_else(|| {
                AppError::Database(format!("Could not count rows of {}", table.name))
            })?;
            tables.push((table.name, count));
        }

        Ok(DatabaseStats {
            tables,
            size_bytes: self.adapter.size_bytes().await,
        })
    }

    /// The user declined to run the statement
    pub fn cancel(&self, turn: &mut QueryTurn) {
        turn.mark_cancelled();
        self.record(turn);
    }

    fn record(&self, turn: &QueryTurn) {
        if let Err(e) = self.log.append(turn) {
            tracing::error!("Failed to write turn log {}: {}", self.log.path().display(), e);
        }
    }

    pub async fn close(&self) -> Result<(), AppError> {
        self.adapter.close().await
    }
}

// PostgreSQL hands counts back as text
fn count_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
