/// Session commands handled locally instead of being sent to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    History,
    Clear,
    Backup,
    Schema,
    Stats,
    Quit,
    Unknown(String),
}

/// One line of user input, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Blank,
    Command(Command),
    Question(String),
}

/// Bare words that are commands rather than questions
const BARE_COMMANDS: &[&str] = &[
    "help", "history", "clear", "backup", "schema", "stats", "quit", "exit", "q",
];

impl Input {
    /// A leading `/` always marks a command; without it only the bare
    /// command words are recognised, anything else is a question.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Input::Blank;
        }

        if let Some(rest) = trimmed.strip_prefix('/') {
            return Input::Command(Command::from_word(rest));
        }

        let lower = trimmed.to_lowercase();
        if BARE_COMMANDS.contains(&lower.as_str()) {
            Input::Command(Command::from_word(&lower))
        } else {
            Input::Question(trimmed.to_string())
        }
    }
}

impl Command {
    fn from_word(word: &str) -> Self {
        let word = word.trim().to_lowercase();
        match word.as_str() {
            "help" | "h" => Command::Help,
            "history" | "hist" => Command::History,
            "clear" | "cls" => Command::Clear,
            "backup" | "b" => Command::Backup,
            "schema" | "s" => Command::Schema,
            "stats" | "statistics" => Command::Stats,
            "quit" | "exit" | "q" => Command::Quit,
            _ => Command::Unknown(word),
        }
    }
}

pub const HELP_TEXT: &str = "\
Available commands:

  Ask a question in plain English and it is translated to SQL and run.

  help       Show this help message
  history    Show the last 10 questions of this session
  clear      Clear session and conversation history
  schema     Show tables and columns of the database
  stats      Show row counts per table and the database size
  backup     Create a database backup (sqlite only)
  quit/exit  Exit the program

Commands may also be typed with a leading '/', e.g. /help.

Statements that drop, truncate or alter tables, or delete without a WHERE
clause, ask for confirmation before running.";
