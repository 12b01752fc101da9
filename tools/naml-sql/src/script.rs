///
/// Splits a script into single statements.
///
/// The driver executes one statement per call. Text is accumulated up to
/// each `;` until SQLite reports it as a complete statement, so semicolons
/// inside literals, comments and trigger bodies stay with their statement.
///

use naml_std_sql::sqlite3::is_complete;

pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for c in script.chars() {
        current.push(c);
        if c == ';' && is_complete(&current) {
            push_statement(&mut statements, &current);
            current.clear();
        }
    }
    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();
    if !trimmed.is_empty() && !is_comment_only(trimmed) {
        statements.push(trimmed.to_string());
    }
}

fn is_comment_only(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}
