use crate::services::database::DatabaseType;
use sqlparser::ast::Statement;
use sqlparser::dialect::{dialect_from_str, GenericDialect};
use sqlparser::parser::Parser;

/// Coarse statement classification of model-generated SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Query,
    Insert,
    Update,
    Delete,
    Drop,
    Truncate,
    AlterTable,
    Create,
    Other,
}

const DROP_TABLE_WARNING: &str = "This will permanently delete a table and all its data";
const DROP_DATABASE_WARNING: &str = "This will permanently delete the entire database";
const DELETE_WARNING: &str = "This will delete records (potentially all records if no WHERE clause)";
const TRUNCATE_WARNING: &str = "This will delete all records from a table";
const ALTER_WARNING: &str = "This will modify table structure";

/// Naive safety check for generated SQL.
///
/// Nothing is rejected here: a warning only means the session asks the user
/// before executing. SQL the parser cannot read falls back to keyword matching.
pub struct SqlValidator;

impl SqlValidator {
    /// Classify every statement in `sql`, or `None` if it does not parse
    pub fn classify(sql: &str, db_type: DatabaseType) -> Option<Vec<StatementKind>> {
        let dialect = dialect_from_str(db_type.as_str()).unwrap_or_else(|| Box::new(GenericDialect {}));
        let statements = Parser::parse_sql(&*dialect, sql).ok()?;

        if statements.is_empty() {
            return None;
        }

        Some(statements.iter().map(Self::statement_kind).collect())
    }

    fn statement_kind(stmt: &Statement) -> StatementKind {
        match stmt {
            Statement::Query(_) => StatementKind::Query,
            Statement::Insert { .. } => StatementKind::Insert,
            Statement::Update { .. } => StatementKind::Update,
            Statement::Delete { .. } => StatementKind::Delete,
            Statement::Drop { .. } => StatementKind::Drop,
            Statement::Truncate { .. } => StatementKind::Truncate,
            Statement::AlterTable { .. } => StatementKind::AlterTable,
            Statement::CreateTable { .. } | Statement::CreateView { .. } | Statement::CreateIndex { .. } => {
                StatementKind::Create
            }
            _ => StatementKind::Other,
        }
    }

    /// Warning for statements that destroy data or structure, if any
    pub fn dangerous_warning(sql: &str, db_type: DatabaseType) -> Option<&'static str> {
        let normalized = Self::normalize(sql);

        match Self::classify(sql, db_type) {
            Some(kinds) => kinds.into_iter().find_map(|kind| match kind {
                StatementKind::Drop if normalized.contains("DROP DATABASE") || normalized.contains("DROP SCHEMA") => {
                    Some(DROP_DATABASE_WARNING)
                }
                StatementKind::Drop if normalized.contains("DROP TABLE") => Some(DROP_TABLE_WARNING),
                StatementKind::Delete if !normalized.contains("WHERE") => Some(DELETE_WARNING),
                StatementKind::Truncate => Some(TRUNCATE_WARNING),
                StatementKind::AlterTable => Some(ALTER_WARNING),
                _ => None,
            }),
            None => Self::keyword_warning(&normalized),
        }
    }

    /// Keyword scan used when the SQL does not parse
    fn keyword_warning(normalized: &str) -> Option<&'static str> {
        let dangerous_operations = [
            ("DROP TABLE", DROP_TABLE_WARNING),
            ("DROP DATABASE", DROP_DATABASE_WARNING),
            ("DELETE FROM", DELETE_WARNING),
            ("TRUNCATE", TRUNCATE_WARNING),
            ("ALTER TABLE", ALTER_WARNING),
        ];

        for (operation, warning) in dangerous_operations {
            if normalized.contains(operation) {
                // DELETE with WHERE is left alone
                if operation == "DELETE FROM" && normalized.contains("WHERE") {
                    continue;
                }
                return Some(warning);
            }
        }

        None
    }

    /// Uppercase and collapse whitespace so keyword pairs match across line breaks
    fn normalize(sql: &str) -> String {
        sql.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase()
    }
}
