use crate::services::database::DatabaseType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Unit exchanged with the model endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Wraps questions in the fixed SQL-generation instructions for one dialect.
///
/// The question is inserted verbatim; nothing is escaped.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    database_type: DatabaseType,
}

impl PromptBuilder {
    pub fn new(database_type: DatabaseType) -> Self {
        Self { database_type }
    }

    pub fn system_prompt(&self) -> String {
        let dialect = self.database_type.dialect_name();

        // Determine SQL dialect hints based on database type
        let dialect_hints = match self.database_type {
            DatabaseType::Sqlite => r#"
- Use SQLite syntax and functions
- Use LIMIT syntax (not TOP or FETCH FIRST)
- For dates, use date('now'), datetime() and strftime()
- String concatenation uses the || operator"#,
            DatabaseType::MySQL => r#"
- Use MySQL syntax and functions
- Use LIMIT syntax (not TOP or FETCH FIRST)
- For dates, use functions like NOW(), CURDATE(), DATE_SUB(), etc.
- String concatenation uses CONCAT() function
- Use backticks for identifier quoting if needed: `table_name`"#,
            DatabaseType::PostgreSQL => r#"
- Use PostgreSQL syntax and functions
- Use LIMIT syntax (or FETCH FIRST)
- For dates, use functions like NOW(), CURRENT_DATE, interval arithmetic
- String concatenation uses || operator or CONCAT()
- Use double quotes for identifier quoting if needed: "table_name""#,
        };

        format!(
            r#"You are a SQL expert. Your job is to convert natural language into {dialect} queries.

IMPORTANT RULES:
1. ALWAYS respond with valid {dialect} syntax
2. Return ONLY the SQL statement, without explanations or markdown formatting
3. Use literal values taken from the request, never placeholders
4. Remember previous context in our conversation

COMMON PATTERNS:
- "show/list/display/get" -> SELECT
- "add/insert/create record" -> INSERT
- "update/change/modify" -> UPDATE
- "delete/remove" -> DELETE
- "create table" -> CREATE TABLE
- "drop/delete table" -> DROP TABLE

DIALECT NOTES:{dialect_hints}"#,
            dialect = dialect,
            dialect_hints = dialect_hints,
        )
    }

    /// The question wrapped with extraction instructions and worked examples
    pub fn user_prompt(&self, question: &str) -> String {
        format!(
            r#"{question}

Please provide:
1. The SQL query with actual values (no placeholders like ?)
2. Use single quotes for text values
3. Extract all values from the natural language input

For example:
- "add user named John with email john@test.com age 25" -> INSERT INTO users (name, email, age) VALUES ('John', 'john@test.com', 25);
- "show users older than 30" -> SELECT * FROM users WHERE age > 30;"#,
            question = question.trim(),
        )
    }

    /// System instructions, prior exchanges, then the new question
    pub fn build(&self, history: &[ChatMessage], question: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt()));
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(self.user_prompt(question)));
        messages
    }

    /// Flatten messages into one prompt for completion-style endpoints
    pub fn flatten(messages: &[ChatMessage]) -> String {
        let mut prompt = String::new();
        for message in messages {
            let label = match message.role {
                Role::System => "System",
                Role::User => "Human",
                Role::Assistant => "Assistant",
            };
            prompt.push_str(label);
            prompt.push_str(": ");
            prompt.push_str(&message.content);
            prompt.push_str("\n\n");
        }
        prompt.push_str("Assistant:");
        prompt
    }
}
