use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::database::QueryResult;

/// One interaction: question in, SQL and result (or error) out.
/// Lives for a single turn of the session and is written to the turn log.
#[derive(Debug, Clone)]
pub struct QueryTurn {
    pub id: String,
    pub backend: String,
    pub question: String,
    pub generated_sql: Option<String>,
    /// Full model reply the SQL was extracted from
    pub model_response: Option<String>,
    pub status: TurnStatus,
    pub result: Option<QueryResult>,
    pub error_code: Option<&'static str>,
    pub error_message: Option<String>,
    pub error_hint: Option<&'static str>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Pending,
    Translated,
    Completed,
    Failed,
    Cancelled,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::Pending => "pending",
            TurnStatus::Translated => "translated",
            TurnStatus::Completed => "completed",
            TurnStatus::Failed => "failed",
            TurnStatus::Cancelled => "cancelled",
        }
    }
}

impl QueryTurn {
    pub fn new(backend: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            backend: backend.into(),
            question: question.into(),
            generated_sql: None,
            model_response: None,
            status: TurnStatus::Pending,
            result: None,
            error_code: None,
            error_message: None,
            error_hint: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn mark_translated(&mut self, sql: String) {
        self.status = TurnStatus::Translated;
        self.generated_sql = Some(sql);
    }

    pub fn mark_completed(&mut self, result: QueryResult) {
        self.status = TurnStatus::Completed;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: &AppError) {
        self.status = TurnStatus::Failed;
        self.error_code = Some(error.code());
        self.error_message = Some(error.to_string());
        self.error_hint = error.hint();
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self) {
        self.status = TurnStatus::Cancelled;
        self.finished_at = Some(Utc::now());
    }

    /// The model reply, when it says noticeably more than the SQL alone
    pub fn explanation(&self) -> Option<&str> {
        let sql = self.generated_sql.as_deref()?;
        let response = self.model_response.as_deref()?;
        (response != sql && response.len() > sql.len() + 20).then_some(response)
    }

    /// Single-line rendering for the turn log. Strings are quoted and escaped,
    /// so embedded newlines never split an entry.
    pub fn log_line(&self) -> String {
        let mut line = format!(
            "{} turn={} backend={} question={:?} sql={} outcome={}",
            self.started_at.to_rfc3339(),
            self.id,
            self.backend,
            self.question,
            self.generated_sql
                .as_deref()
                .map(|sql| format!("{:?}", sql))
                .unwrap_or_else(|| "-".to_string()),
            self.status.as_str(),
        );

        if let Some(result) = &self.result {
            line.push_str(&format!(" {} time_ms={}", result.summary(), result.execution_time_ms));
        }

        if let Some(finished_at) = self.finished_at {
            let total = finished_at.signed_duration_since(self.started_at);
            line.push_str(&format!(" total_ms={}", total.num_milliseconds()));
        }

        if let Some(message) = &self.error_message {
            line.push_str(&format!(" error={:?}", message));
        }

        line
    }
}
