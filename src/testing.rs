// Test doubles for the model client and the database adapter
use crate::error::AppError;
use crate::services::database::{DatabaseAdapter, DatabaseType, QueryResult, TableSchema};
use crate::services::llm_service::CompletionClient;
use crate::services::prompt::ChatMessage;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Replays canned completions in order and records every request
#[derive(Clone, Default)]
pub struct StubCompletionClient {
    responses: Arc<Mutex<VecDeque<String>>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl StubCompletionClient {
    pub fn new<'a>(responses: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(String::from).collect())),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CompletionClient for StubCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AppError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::Translation("Failed to call model server: no canned response".to_string()))
    }

    fn describe(&self) -> String {
        "stub".to_string()
    }
}

/// Forwards to a real adapter and keeps the SQL it was given
#[derive(Clone)]
pub struct RecordingAdapter {
    inner: Arc<dyn DatabaseAdapter>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl RecordingAdapter {
    pub fn new(inner: Box<dyn DatabaseAdapter>) -> Self {
        Self {
            inner: Arc::from(inner),
            executed: Arc::default(),
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DatabaseAdapter for RecordingAdapter {
    async fn execute(&self, sql: &str) -> Result<QueryResult, AppError> {
        self.executed.lock().unwrap().push(sql.to_string());
        self.inner.execute(sql).await
    }

    fn database_type(&self) -> DatabaseType {
        self.inner.database_type()
    }

    async fn test_connection(&self) -> Result<(), AppError> {
        self.inner.test_connection().await
    }

    async fn describe_schema(&self) -> Result<Vec<TableSchema>, AppError> {
        self.inner.describe_schema().await
    }

    async fn size_bytes(&self) -> Option<u64> {
        self.inner.size_bytes().await
    }

    async fn backup(&self, dir: &Path) -> Result<PathBuf, AppError> {
        self.inner.backup(dir).await
    }

    async fn close(&self) -> Result<(), AppError> {
        self.inner.close().await
    }
}
