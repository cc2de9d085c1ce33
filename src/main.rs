use anyhow::Context;
use clap::Parser;
use db_query_mate::cli::Session;
use db_query_mate::config::Config;
use db_query_mate::services::llm_service::OllamaClient;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "db-query-mate")]
#[command(version, about = "Ask a SQL database questions in plain English", long_about = None)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, short = 'c', default_value = "config.json", env = "DBMATE_CONFIG")]
    config: PathBuf,

    /// Backend entry to use instead of `default_db`
    #[arg(long)]
    db: Option<String>,
}

/// `.env` is read before the arguments so it can supply `DBMATE_CONFIG`
fn parse_cli<I, T>(env_file: Option<&Path>, args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    if let Some(path) = env_file {
        dotenv::from_path(path).ok();
    } else {
        dotenv::dotenv().ok();
    }
    Cli::try_parse_from(args)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = parse_cli(None, std::env::args_os()).unwrap_or_else(|e| e.exit());

    // Load configuration
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    if let Some(name) = &cli.db {
        config.select_backend(name)?;
    }

    // Initialize logging; stdout is reserved for the session
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Using backend '{}'", config.default_db);

    let client = OllamaClient::new(&config.llm)?;
    let mut session = Session::bootstrap(&config, Box::new(client)).await.map_err(|e| {
        error!("Startup failed: {}", e);
        if let Some(hint) = e.hint() {
            eprintln!("{}", hint);
        }
        e
    })?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let result = session.run(stdin, &mut stdout).await;

    if let Err(e) = session.close().await {
        error!("Failed to close database connection: {}", e);
    }

    result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_env_file_supplies_config_path() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        fs::write(&env_file, "DBMATE_CONFIG=from-env-file.json\n").unwrap();

        let cli = parse_cli(Some(&env_file), ["db-query-mate"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("from-env-file.json"));
        assert_eq!(cli.db, None);

        // explicit flags still win
        let args = ["db-query-mate", "-c", "other.json", "--db", "mysql"];
        let cli = parse_cli(Some(&env_file), args).unwrap();
        assert_eq!(cli.config, PathBuf::from("other.json"));
        assert_eq!(cli.db.as_deref(), Some("mysql"));
    }
}
