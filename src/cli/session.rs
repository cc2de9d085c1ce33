use crate::cli::commands::{Command, Input, HELP_TEXT};
use crate::cli::presenter::Presenter;
use crate::config::Config;
use crate::error::AppError;
use crate::models::TurnStatus;
use crate::services::database::{create_adapter, DatabaseType};
use crate::services::llm_service::{CompletionClient, LlmService};
use crate::services::query_log::QueryLog;
use crate::services::query_service::QueryService;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

const PROMPT: &str = "db-query-mate> ";
const CONFIRM_PROMPT: &str = "Execute this query? (yes/no) ";
const HISTORY_SHOWN: usize = 10;

/// Interactive loop: one line in, one turn out.
pub struct Session {
    service: QueryService,
    confirm_dangerous: bool,
    backup_dir: PathBuf,
    questions: Vec<String>,
}

impl Session {
    pub fn new(service: QueryService, confirm_dangerous: bool, backup_dir: PathBuf) -> Self {
        Self {
            service,
            confirm_dangerous,
            backup_dir,
            questions: Vec::new(),
        }
    }

    /// Resolve the configured backend, check the model server and connect.
    /// Nothing is sent to the model before the configuration checks out.
    pub async fn bootstrap(config: &Config, client: Box<dyn CompletionClient>) -> Result<Self, AppError> {
        let backend = config.active_backend()?;
        let target = backend.config.connection_target(backend.db_type)?;

        if config.llm.check_on_startup {
            tracing::info!("Checking model server {}", client.describe());
            client.health_check().await?;
        }

        let adapter = create_adapter(&backend).await?;
        adapter.test_connection().await?;

        let log = QueryLog::open(&config.logging.dir)?;
        tracing::info!("Recording turns in {}", log.path().display());

        let backup_dir = match backend.db_type {
            DatabaseType::Sqlite => database_dir(&target),
            DatabaseType::PostgreSQL | DatabaseType::MySQL => PathBuf::from("."),
        };

        let llm = LlmService::new(client, backend.db_type);
        let service = QueryService::new(llm, adapter, log, backend.name);

        Ok(Self::new(service, config.safety.confirm_dangerous, backup_dir))
    }

    /// Read lines until `quit` or end of input
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> Result<(), AppError>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        self.print_welcome(out)?;
        let mut lines = input.lines();

        loop {
            write!(out, "\n{}", PROMPT)?;
            out.flush()?;

            let Some(line) = lines.next_line().await? else {
                writeln!(out)?;
                break;
            };

            match Input::parse(&line) {
                Input::Blank => continue,
                Input::Command(Command::Quit) => break,
                Input::Command(command) => self.handle_command(command, out).await?,
                Input::Question(question) => self.handle_question(&question, &mut lines, out).await?,
            }
        }

        writeln!(out, "Goodbye!")?;
        Ok(())
    }

    async fn handle_question<R, W>(
        &mut self,
        question: &str,
        lines: &mut Lines<R>,
        out: &mut W,
    ) -> Result<(), AppError>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        writeln!(out, "Converting to SQL...")?;
        let mut turn = self.service.translate(question).await;

        if turn.status == TurnStatus::Translated {
            self.questions.push(question.to_string());

            if let Some(sql) = &turn.generated_sql {
                Presenter::print_sql(out, sql)?;
            }

            let warning = if self.confirm_dangerous {
                self.service.dangerous_warning(&turn)
            } else {
                None
            };

            let approved = match warning {
                Some(warning) => {
                    writeln!(out, "Warning: {}", warning)?;
                    write!(out, "{}", CONFIRM_PROMPT)?;
                    out.flush()?;
                    // end of input counts as "no"
                    let answer = lines.next_line().await?.unwrap_or_default();
                    matches!(answer.trim().to_lowercase().as_str(), "yes" | "y")
                }
                None => true,
            };

            if approved {
                self.service.execute(&mut turn).await;
            } else {
                self.service.cancel(&mut turn);
            }
        }

        Presenter::print_turn(out, &turn)?;
        if turn.status == TurnStatus::Completed {
            if let Some(explanation) = turn.explanation() {
                Presenter::print_explanation(out, explanation)?;
            }
        }
        Ok(())
    }

    async fn handle_command<W: Write>(&mut self, command: Command, out: &mut W) -> Result<(), AppError> {
        match command {
            Command::Help => writeln!(out, "{}", HELP_TEXT)?,
            Command::History => self.print_history(out)?,
            Command::Clear => {
                self.questions.clear();
                self.service.llm_mut().clear_history();
                writeln!(out, "Session cleared")?;
            }
            Command::Backup => match self.service.adapter().backup(&self.backup_dir).await {
                Ok(path) => writeln!(out, "Backup created: {}", path.display())?,
                Err(e) => {
                    tracing::warn!("Backup failed: {}", e);
                    writeln!(out, "Backup failed: {}", e)?;
                }
            },
            Command::Schema => match self.service.describe_schema().await {
                Ok(tables) => Presenter::print_schema(out, &tables)?,
                Err(e) => {
                    tracing::warn!("Schema lookup failed: {}", e);
                    writeln!(out, "Error getting schema: {}", e)?;
                }
            },
            Command::Stats => match self.service.statistics().await {
                Ok(stats) => Presenter::print_stats(out, &stats)?,
                Err(e) => {
                    tracing::warn!("Statistics failed: {}", e);
                    writeln!(out, "Error getting statistics: {}", e)?;
                }
            },
            Command::Unknown(word) => writeln!(
                out,
                "Unknown command: {}. Type 'help' for available commands.",
                word
            )?,
            // handled by the loop
            Command::Quit => {}
        }
        Ok(())
    }

    fn print_history<W: Write>(&self, out: &mut W) -> Result<(), AppError> {
        if self.questions.is_empty() {
            writeln!(out, "No queries in current session")?;
            return Ok(());
        }

        let skip = self.questions.len().saturating_sub(HISTORY_SHOWN);
        writeln!(out, "Recent queries (last {}):", HISTORY_SHOWN)?;
        for (i, question) in self.questions.iter().enumerate().skip(skip) {
            writeln!(out, "{}. {}", i + 1, question)?;
        }
        Ok(())
    }

    fn print_welcome<W: Write>(&self, out: &mut W) -> Result<(), AppError> {
        writeln!(out, "db-query-mate: ask your database questions in plain English")?;
        writeln!(
            out,
            "Backend: {} ({}), model: {}",
            self.service.backend_name(),
            self.service.database_type(),
            self.service.llm().client().describe()
        )?;
        writeln!(out)?;
        writeln!(out, "Examples:")?;
        writeln!(out, "  Show me all users older than 25")?;
        writeln!(out, "  How many orders were placed this week?")?;
        writeln!(out, "  Add a new user named John with email john@example.com")?;
        writeln!(out)?;
        writeln!(out, "Type 'help' for commands, 'quit' to exit.")?;
        Ok(())
    }

    pub async fn close(&self) -> Result<(), AppError> {
        self.service.close().await
    }
}

/// Directory holding a sqlite database file
fn database_dir(target: &str) -> PathBuf {
    let path = target.trim_start_matches("sqlite:").trim_start_matches("//");
    Path::new(path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::testing::StubCompletionClient;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    /// Two-user sqlite file plus a config pointing at it
    fn fixture(confirm_dangerous: bool) -> (TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("data").join("app.db");
        fs::create_dir_all(db_path.parent().unwrap()).unwrap();

        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT);
             INSERT INTO users (name, email) VALUES ('Alice', 'alice@example.com');
             INSERT INTO users (name, email) VALUES ('Bob', 'bob@example.com');",
        )
        .unwrap();
        drop(conn);

        let config = Config::from_json_str(
            &json!({
                "default_db": "sqlite",
                "databases": { "sqlite": { "path": db_path.to_str().unwrap() } },
                "llm": { "check_on_startup": false },
                "logging": { "dir": dir.path().join("logs").to_str().unwrap() },
                "safety": { "confirm_dangerous": confirm_dangerous }
            })
            .to_string(),
        )
        .unwrap();

        (dir, config)
    }

    async fn run_session(config: &Config, stub: &StubCompletionClient, input: &str) -> String {
        let mut session = Session::bootstrap(config, Box::new(stub.clone())).await.unwrap();
        let mut out = Vec::new();
        session.run(input.as_bytes(), &mut out).await.unwrap();
        assert_ok!(session.close().await);
        String::from_utf8(out).unwrap()
    }

    fn log_lines(dir: &TempDir) -> Vec<String> {
        fs::read_to_string(dir.path().join("logs").join("queries.log"))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    fn user_count(dir: &TempDir) -> Option<i64> {
        let conn = rusqlite::Connection::open(dir.path().join("data").join("app.db")).unwrap();
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0)).ok()
    }

    #[tokio::test]
    async fn test_list_all_users_end_to_end() {
        let (dir, config) = fixture(true);
        let stub = StubCompletionClient::new(["SELECT * FROM users;"]);

        let output = run_session(&config, &stub, "List all users\nquit\n").await;

        assert!(output.contains("Generated SQL:\n  SELECT * FROM users;"));
        assert!(output.contains("Query Results (2 rows)"));
        assert!(output.contains("│ 1  │ Alice │ alice@example.com │"));
        assert!(output.contains("│ 2  │ Bob   │ bob@example.com   │"));
        assert!(output.ends_with("Goodbye!\n"));

        let lines = log_lines(&dir);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(r#"question="List all users""#));
        assert!(lines[0].contains("outcome=completed rows=2"));
        assert_eq!(stub.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_database_error_does_not_end_session() {
        let (dir, config) = fixture(true);
        let stub = StubCompletionClient::new(["SELECT * FROM customers", "SELECT name FROM users"]);

        let output = run_session(&config, &stub, "list customers\nlist user names\n").await;

        assert!(output.contains("Error: Database error: "));
        assert!(output.contains("no such table: customers"));
        assert!(output.contains("SQL: SELECT * FROM customers"));
        assert!(output.contains("Hint: "));
        assert!(output.contains("Query Results (2 rows)"));

        let lines = log_lines(&dir);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("outcome=failed"));
        assert!(lines[1].contains("outcome=completed"));
    }

    #[tokio::test]
    async fn test_translation_error_is_reported_and_logged() {
        let (dir, config) = fixture(true);
        // no canned responses: the model call fails
        let stub = StubCompletionClient::new([]);

        let output = run_session(&config, &stub, "List all users\n").await;

        assert!(output.contains("Error: Translation failed"));
        assert!(!output.contains("Generated SQL"));
        assert_eq!(log_lines(&dir).len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_backend_fails_before_model_call() {
        let (_dir, mut config) = fixture(true);
        let mut legacy: BackendConfig = config.databases["sqlite"].clone();
        legacy.db_type = Some("oracle".to_string());
        config.databases.insert("legacy".to_string(), legacy);
        config.default_db = "legacy".to_string();

        let stub = StubCompletionClient::new(["SELECT 1"]);
        let err = Session::bootstrap(&config, Box::new(stub.clone()))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("Unsupported database type: oracle"));
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn test_declined_dangerous_statement_is_cancelled() {
        let (dir, config) = fixture(true);
        let stub = StubCompletionClient::new(["DROP TABLE users;"]);

        let output = run_session(&config, &stub, "drop the users table\nno\n").await;

        assert!(output.contains("Warning: This will permanently delete a table"));
        assert!(output.contains("Execute this query? (yes/no)"));
        assert!(output.contains("Query cancelled"));
        assert_eq!(user_count(&dir), Some(2));
        assert!(log_lines(&dir)[0].contains("outcome=cancelled"));
    }

    #[tokio::test]
    async fn test_confirmed_dangerous_statement_runs() {
        let (dir, config) = fixture(true);
        let stub = StubCompletionClient::new(["DELETE FROM users"]);

        let output = run_session(&config, &stub, "remove every user\ny\n").await;

        assert!(output.contains("Affected rows: 2"));
        assert_eq!(user_count(&dir), Some(0));
    }

    #[tokio::test]
    async fn test_confirmation_can_be_disabled() {
        let (dir, config) = fixture(false);
        let stub = StubCompletionClient::new(["DELETE FROM users"]);

        let output = run_session(&config, &stub, "remove every user\n").await;

        assert!(!output.contains("Execute this query?"));
        assert_eq!(user_count(&dir), Some(0));
    }

    #[tokio::test]
    async fn test_commands() {
        let (dir, config) = fixture(true);
        let stub = StubCompletionClient::new(["SELECT COUNT(*) AS total FROM users"]);

        let output = run_session(
            &config,
            &stub,
            "\n   \nhow many users?\n/history\nhelp\n/backup\n/tables\nclear\nhistory\nexit\n",
        )
        .await;

        assert!(output.contains("1. how many users?"));
        assert!(output.contains("Available commands:"));
        assert!(output.contains("Backup created: "));
        assert!(output.contains("Unknown command: tables."));
        assert!(output.contains("Session cleared"));
        assert!(output.contains("No queries in current session"));

        // blank lines and commands never reach the model or the log
        assert_eq!(stub.requests().len(), 1);
        assert_eq!(log_lines(&dir).len(), 1);

        let backups: Vec<_> = fs::read_dir(dir.path().join("data"))
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("backup_"))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[tokio::test]
    async fn test_schema_and_stats_commands() {
        let (dir, config) = fixture(true);
        let stub = StubCompletionClient::new([]);

        let output = run_session(&config, &stub, "schema\n/stats\nquit\n").await;

        assert!(output.contains("Table: users\n"));
        assert!(output.contains("  - id: INTEGER (PRIMARY KEY)\n"));
        assert!(output.contains("  - name: TEXT (NOT NULL)\n"));
        assert!(output.contains("  - email: TEXT\n"));
        assert!(output.contains("Database Statistics:"));
        assert!(output.contains("  users: 2 records"));
        assert!(output.contains("Database size: "));

        assert!(stub.requests().is_empty());
        assert!(log_lines(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_explanation_is_shown_after_results() {
        let (_dir, config) = fixture(true);
        let stub = StubCompletionClient::new([
            "```sql\nSELECT name FROM users\n```\nThis query lists the name of every user in the table.",
            "SELECT email FROM users",
        ]);

        let output = run_session(&config, &stub, "user names\nuser emails\n").await;

        assert!(output.contains("Generated SQL:\n  SELECT name FROM users\n"));
        let results = output.find("│ Alice │").unwrap();
        let explanation = output.find("Explanation:").unwrap();
        assert!(explanation > results);
        assert!(output.contains("  This query lists the name of every user in the table."));
        // bare SQL replies carry nothing extra
        assert_eq!(output.matches("Explanation:").count(), 1);
    }

    #[tokio::test]
    async fn test_history_skips_failed_translations() {
        let (_dir, config) = fixture(true);
        // second question gets no reply
        let stub = StubCompletionClient::new(["SELECT name FROM users"]);

        let output = run_session(&config, &stub, "user names\nwho is new?\nhistory\n").await;

        assert!(output.contains("Error: Translation failed"));
        assert!(output.contains("1. user names"));
        assert!(!output.contains("2. who is new?"));
    }

    #[test]
    fn test_database_dir() {
        assert_eq!(database_dir("data/database.db"), PathBuf::from("data"));
        assert_eq!(database_dir("sqlite:./app.db"), PathBuf::from("."));
        assert_eq!(database_dir("app.db"), PathBuf::from("."));
        assert_eq!(database_dir(":memory:"), PathBuf::from("."));
    }
}
