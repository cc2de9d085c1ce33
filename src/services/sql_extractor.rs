/// Pulls the candidate SQL statement out of a model completion.
/// No parsing and no correctness check happen here.
pub struct SqlExtractor;

const STATEMENT_KEYWORDS: &[&str] = &["SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER", "WITH"];

impl SqlExtractor {
    /// Returns `None` when nothing usable is left after cleaning
    pub fn extract(response: &str) -> Option<String> {
        let candidate = Self::fenced_block(response, "```sql")
            .or_else(|| Self::fenced_block(response, "```"))
            .or_else(|| Self::statement_lines(response))
            .unwrap_or_else(|| response.to_string());

        // Clean up SQL (remove stray markdown fences if present)
        let cleaned = candidate
            .trim()
            .trim_start_matches("```sql")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
            .to_string();

        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    fn fenced_block(response: &str, opening: &str) -> Option<String> {
        let start = response.find(opening)? + opening.len();
        let rest = &response[start..];
        // skip the rest of the opening line when it is only an info string (```sqlite)
        let body_start = match rest.find('\n') {
            Some(newline) if rest[..newline].trim().chars().all(char::is_alphanumeric) => newline + 1,
            _ => 0,
        };
        let end = rest[body_start..].find("```")?;
        Some(rest[body_start..body_start + end].to_string())
    }

    /// First line opening a SQL statement, plus the contiguous non-blank lines after it
    fn statement_lines(response: &str) -> Option<String> {
        let mut lines = response.lines().map(str::trim);
        let first = lines.by_ref().find(|line| Self::starts_statement(line))?;

        let mut statement = vec![first];
        statement.extend(lines.take_while(|line| !line.is_empty()));
        Some(statement.join("\n"))
    }

    fn starts_statement(line: &str) -> bool {
        let upper = line.to_uppercase();
        STATEMENT_KEYWORDS.iter().any(|keyword| {
            upper.starts_with(keyword)
                && upper[keyword.len()..]
                    .chars()
                    .next()
                    .map_or(true, |c| !c.is_alphanumeric() && c != '_')
        })
    }
}
