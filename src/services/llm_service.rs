use crate::config::LlmConfig;
use crate::error::AppError;
use crate::services::database::DatabaseType;
use crate::services::prompt::{ChatMessage, PromptBuilder};
use crate::services::sql_extractor::SqlExtractor;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use std::time::Duration;

/// Prior messages replayed to the model (three question/answer exchanges)
pub const MAX_HISTORY_MESSAGES: usize = 6;

/// Text-in/text-out access to a model-serving endpoint
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the conversation and return the raw completion text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AppError>;

    /// Check that the endpoint is reachable
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    /// Model and endpoint, for display
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmEndpoint {
    Chat,
    Generate,
}

impl LlmEndpoint {
    pub fn from_config(value: &str) -> Result<Self, AppError> {
        match value {
            "chat" => Ok(LlmEndpoint::Chat),
            "generate" => Ok(LlmEndpoint::Generate),
            other => Err(AppError::Config(format!("Unknown llm.endpoint '{}'", other))),
        }
    }

    fn path(&self) -> &'static str {
        match self {
            LlmEndpoint::Chat => "/api/chat",
            LlmEndpoint::Generate => "/api/generate",
        }
    }
}

/// Client for a locally hosted Ollama-compatible server
pub struct OllamaClient {
    base_url: String,
    model: String,
    endpoint: LlmEndpoint,
    api_key: Option<String>,
    http_client: HttpClient,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self, AppError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            endpoint: LlmEndpoint::from_config(&config.endpoint)?,
            api_key: config.api_key.clone(),
            http_client,
        })
    }

    fn request_body(&self, messages: &[ChatMessage]) -> Value {
        match self.endpoint {
            LlmEndpoint::Chat => json!({
                "model": self.model,
                "messages": messages,
                "stream": false,
            }),
            LlmEndpoint::Generate => json!({
                "model": self.model,
                "prompt": PromptBuilder::flatten(messages),
                "stream": false,
            }),
        }
    }

    /// Extract the completion text from the endpoint's JSON response
    fn parse_response(endpoint: LlmEndpoint, result: &Value) -> Result<String, AppError> {
        let text = match endpoint {
            LlmEndpoint::Chat => result["message"]["content"].as_str(),
            LlmEndpoint::Generate => result["response"].as_str(),
        };

        text.map(str::to_string).ok_or_else(|| {
            let reason = result["error"].as_str().unwrap_or("missing completion text");
            AppError::Translation(format!("Malformed model response: {}", reason))
        })
    }
}

#[async_trait::async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AppError> {
        let url = format!("{}{}", self.base_url, self.endpoint.path());

        // Prepare request
        let mut request = self.http_client.post(&url).json(&self.request_body(messages));

        // Add API key if available
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        // Send request
        let response = request
            .send()
            .await
            .map_err(|e| AppError::Translation(format!("Failed to call model server at {}: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Translation(format!(
                "Model server returned error {}: {}",
                status, error_text
            )));
        }

        // Parse response
        let result: Value = response
            .json()
            .await
            .map_err(|e| AppError::Translation(format!("Failed to parse model response: {}", e)))?;

        Self::parse_response(self.endpoint, &result)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let response = self
            .http_client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .map_err(|e| {
                AppError::Translation(format!("Failed to call model server at {}: {}", self.base_url, e))
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::Translation(format!(
                "Model server at {} answered {}",
                self.base_url,
                response.status()
            )))
        }
    }

    fn describe(&self) -> String {
        format!("{} @ {}", self.model, self.base_url)
    }
}

/// Extracted SQL together with the reply it came from
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSql {
    pub sql: String,
    pub response: String,
}

/// Natural language to SQL: prompt construction, model call, SQL extraction.
/// Keeps a short rolling conversation so follow-up questions have context.
pub struct LlmService {
    client: Box<dyn CompletionClient>,
    prompt_builder: PromptBuilder,
    history: Vec<ChatMessage>,
}

impl LlmService {
    pub fn new(client: Box<dyn CompletionClient>, database_type: DatabaseType) -> Self {
        Self {
            client,
            prompt_builder: PromptBuilder::new(database_type),
            history: Vec::new(),
        }
    }

    pub fn client(&self) -> &dyn CompletionClient {
        self.client.as_ref()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        tracing::debug!("Conversation history cleared");
    }

    /// Generate SQL query from natural language
    pub async fn generate_sql_from_natural_language(
        &mut self,
        question: &str,
    ) -> Result<GeneratedSql, AppError> {
        let messages = self.prompt_builder.build(&self.history, question);
        tracing::debug!(
            "Sending {} messages to {}",
            messages.len(),
            self.client.describe()
        );

        let response = self.client.complete(&messages).await?;
        tracing::debug!("Raw model output: {}", response);

        let sql = SqlExtractor::extract(&response)
            .ok_or_else(|| AppError::Translation("model returned no SQL".to_string()))?;

        self.remember(question, response.clone());
        Ok(GeneratedSql { sql, response })
    }

    fn remember(&mut self, question: &str, response: String) {
        self.history.push(ChatMessage::user(question.trim()));
        self.history.push(ChatMessage::assistant(response));

        if self.history.len() > MAX_HISTORY_MESSAGES {
            let excess = self.history.len() - MAX_HISTORY_MESSAGES;
            self.history.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::prompt::Role;
    use crate::testing::StubCompletionClient;

    fn llm_config(endpoint: &str) -> LlmConfig {
        LlmConfig {
            base_url: "http://localhost:11434/".to_string(),
            model: "qwen2.5-coder:7b".to_string(),
            endpoint: endpoint.to_string(),
            api_key: None,
            timeout_secs: 5,
            check_on_startup: false,
        }
    }

    #[test]
    fn test_chat_request_body() {
        let client = OllamaClient::new(&llm_config("chat")).unwrap();
        let body = client.request_body(&[ChatMessage::user("list users")]);
        assert_eq!(
            body,
            json!({
                "model": "qwen2.5-coder:7b",
                "messages": [{ "role": "user", "content": "list users" }],
                "stream": false,
            })
        );
        assert_eq!(client.describe(), "qwen2.5-coder:7b @ http://localhost:11434");
    }

    #[test]
    fn test_generate_request_body() {
        let client = OllamaClient::new(&llm_config("generate")).unwrap();
        let body = client.request_body(&[ChatMessage::user("list users")]);
        assert_eq!(body["prompt"], json!("Human: list users\n\nAssistant:"));
        assert!(body.get("messages").is_none());
    }

    #[test]
    fn test_parse_response() {
        let chat = json!({ "message": { "role": "assistant", "content": "SELECT 1" }, "done": true });
        assert_eq!(OllamaClient::parse_response(LlmEndpoint::Chat, &chat).unwrap(), "SELECT 1");

        let generate = json!({ "response": "SELECT 2", "done": true });
        assert_eq!(
            OllamaClient::parse_response(LlmEndpoint::Generate, &generate).unwrap(),
            "SELECT 2"
        );

        let err = OllamaClient::parse_response(LlmEndpoint::Chat, &json!({ "error": "model not found" }))
            .unwrap_err();
        assert!(matches!(err, AppError::Translation(_)));
        assert!(err.to_string().contains("model not found"));
    }

    #[test]
    fn test_unknown_endpoint() {
        assert!(OllamaClient::new(&llm_config("completions")).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_translation_error() {
        let mut config = llm_config("chat");
        // port 9 (discard) is not an HTTP server
        config.base_url = "http://127.0.0.1:9".to_string();
        let client = OllamaClient::new(&config).unwrap();

        let err = client.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, AppError::Translation(_)));
        assert!(err.hint().is_some());
        assert!(client.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_generates_extracted_sql() {
        let stub = StubCompletionClient::new(["```sql\nSELECT * FROM users;\n```"]);
        let mut service = LlmService::new(Box::new(stub.clone()), DatabaseType::Sqlite);

        let generated = service
            .generate_sql_from_natural_language("List all users")
            .await
            .unwrap();
        assert_eq!(generated.sql, "SELECT * FROM users;");
        assert_eq!(generated.response, "```sql\nSELECT * FROM users;\n```");

        let sent = stub.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][0].role, Role::System);
        assert!(sent[0].last().unwrap().content.starts_with("List all users"));
    }

    #[tokio::test]
    async fn test_history_is_bounded_and_replayed() {
        let stub = StubCompletionClient::new(["SELECT 1", "SELECT 2", "SELECT 3", "SELECT 4"]);
        let mut service = LlmService::new(Box::new(stub.clone()), DatabaseType::Sqlite);

        for question in ["one", "two", "three", "four"] {
            service.generate_sql_from_natural_language(question).await.unwrap();
        }

        assert_eq!(service.history().len(), MAX_HISTORY_MESSAGES);
        assert_eq!(service.history()[0], ChatMessage::user("two"));

        // The fourth request carried the three previous exchanges
        let sent = stub.requests();
        assert_eq!(sent[3].len(), 1 + MAX_HISTORY_MESSAGES + 1);

        service.clear_history();
        assert!(service.history().is_empty());
    }

    #[tokio::test]
    async fn test_empty_completion_is_translation_error() {
        let stub = StubCompletionClient::new(["   "]);
        let mut service = LlmService::new(Box::new(stub), DatabaseType::Sqlite);

        let err = service
            .generate_sql_from_natural_language("List all users")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Translation(_)));
        // failed translations are not remembered
        assert!(service.history().is_empty());
    }
}
