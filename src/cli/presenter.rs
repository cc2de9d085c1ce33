// Terminal rendering of results, errors and generated SQL
use crate::models::{QueryTurn, TurnStatus};
use crate::services::database::{QueryOutcome, QueryResult, TableSchema};
use crate::services::query_service::DatabaseStats;
use serde_json::Value;
use std::io::{self, Write};

/// Cells longer than this are cut with an ellipsis
const MAX_CELL_WIDTH: usize = 60;

pub struct Presenter;

impl Presenter {
    pub fn print_sql<W: Write>(out: &mut W, sql: &str) -> io::Result<()> {
        writeln!(out, "Generated SQL:")?;
        for line in sql.lines() {
            writeln!(out, "  {}", line)?;
        }
        Ok(())
    }

    pub fn print_explanation<W: Write>(out: &mut W, explanation: &str) -> io::Result<()> {
        writeln!(out, "Explanation:")?;
        for line in explanation.lines() {
            writeln!(out, "  {}", line)?;
        }
        Ok(())
    }

    pub fn print_schema<W: Write>(out: &mut W, tables: &[TableSchema]) -> io::Result<()> {
        if tables.is_empty() {
            return writeln!(out, "No tables found");
        }

        writeln!(out, "Database Schema:")?;
        for table in tables {
            writeln!(out)?;
            writeln!(out, "Table: {}", table.name)?;
            for column in &table.columns {
                let mut constraints = Vec::new();
                if column.primary_key {
                    constraints.push("PRIMARY KEY");
                }
                if !column.nullable {
                    constraints.push("NOT NULL");
                }
                if constraints.is_empty() {
                    writeln!(out, "  - {}: {}", column.name, column.data_type)?;
                } else {
                    writeln!(
                        out,
                        "  - {}: {} ({})",
                        column.name,
                        column.data_type,
                        constraints.join(", ")
                    )?;
                }
            }
        }
        Ok(())
    }

    pub fn print_stats<W: Write>(out: &mut W, stats: &DatabaseStats) -> io::Result<()> {
        writeln!(out, "Database Statistics:")?;
        for (table, count) in &stats.tables {
            writeln!(out, "  {}: {} records", table, count)?;
        }
        if let Some(bytes) = stats.size_bytes {
            writeln!(out, "  Database size: {:.1} KB", bytes as f64 / 1024.0)?;
        }
        Ok(())
    }

    /// Final rendering of a finished turn
    pub fn print_turn<W: Write>(out: &mut W, turn: &QueryTurn) -> io::Result<()> {
        match turn.status {
            TurnStatus::Completed => match &turn.result {
                Some(result) => Self::print_result(out, result),
                None => Ok(()),
            },
            TurnStatus::Failed => Self::print_error(out, turn),
            TurnStatus::Cancelled => writeln!(out, "Query cancelled"),
            TurnStatus::Pending | TurnStatus::Translated => Ok(()),
        }
    }

    pub fn print_result<W: Write>(out: &mut W, result: &QueryResult) -> io::Result<()> {
        match &result.outcome {
            QueryOutcome::Rows { columns, rows } => {
                if rows.is_empty() {
                    writeln!(out, "No results found")?;
                } else {
                    writeln!(out, "Query Results ({} rows)", rows.len())?;
                    out.write_all(render_table(columns, rows).as_bytes())?;
                }
            }
            QueryOutcome::Affected {
                rows_affected,
                last_insert_id,
            } => {
                writeln!(out, "Query executed successfully")?;
                writeln!(out, "Affected rows: {}", rows_affected)?;
                if let Some(id) = last_insert_id {
                    writeln!(out, "Last inserted ID: {}", id)?;
                }
            }
        }
        writeln!(out, "({} ms)", result.execution_time_ms)
    }

    fn print_error<W: Write>(out: &mut W, turn: &QueryTurn) -> io::Result<()> {
        writeln!(
            out,
            "Error: {}",
            turn.error_message.as_deref().unwrap_or("unknown error")
        )?;
        if let Some(sql) = &turn.generated_sql {
            writeln!(out, "SQL: {}", sql)?;
        }
        if let Some(hint) = turn.error_hint {
            writeln!(out, "Hint: {}", hint)?;
        }
        Ok(())
    }
}

fn cell_text(value: &Value) -> String {
    let text = match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    // one cell, one line
    let text: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    if text.chars().count() > MAX_CELL_WIDTH {
        let cut: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
        format!("{}…", cut)
    } else {
        text
    }
}

/// Box-drawn table with every column padded to its widest cell
pub fn render_table(columns: &[String], rows: &[Vec<Value>]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let format_line = |values: &[String]| -> String {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, &width)| {
                let value = values.get(i).map(String::as_str).unwrap_or("");
                format!("{:<width$}", value, width = width)
            })
            .collect();
        format!("│ {} │\n", padded.join(" │ "))
    };
    let rule = |left: &str, mid: &str, right: &str| -> String {
        let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}\n", left, segments.join(mid), right)
    };

    let mut table = rule("┌", "┬", "┐");
    table.push_str(&format_line(columns));
    table.push_str(&rule("├", "┼", "┤"));
    for row in &cells {
        table.push_str(&format_line(row.as_slice()));
    }
    table.push_str(&rule("└", "┴", "┘"));
    table
}
