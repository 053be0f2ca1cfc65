use sqlx::SqlitePool;

pub const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Splits a SQL script on top-level semicolons, ignoring those inside quotes.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            ';' if !in_single_quote && !in_double_quote => {
                let stmt = strip_comment_lines(&current);
                if !stmt.is_empty() {
                    statements.push(stmt);
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }

    let tail = strip_comment_lines(&current);
    if !tail.is_empty() {
        statements.push(tail);
    }

    statements
}

fn strip_comment_lines(chunk: &str) -> String {
    chunk
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for stmt in split_sql_statements(SCHEMA_SQL) {
        sqlx::query(&stmt).execute(pool).await?;
    }

    sqlx::query(
        r#"INSERT OR REPLACE INTO "_db_metadata" ("key", "value") VALUES ('schema_version', ?1)"#,
    )
    .bind(SCHEMA_VERSION)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_ignores_quoted_semicolons() {
        let sql = "INSERT INTO t VALUES ('a;b');\n-- comment only\nSELECT 1;";
        let statements = split_sql_statements(sql);
        assert_eq!(statements, vec!["INSERT INTO t VALUES ('a;b')", "SELECT 1"]);
    }

    #[test]
    fn test_schema_has_every_table() {
        let statements = split_sql_statements(SCHEMA_SQL);
        for table in ["learners", "items", "modules", "module_items", "responses", "interaction_log", "model_versions"] {
            let needle = format!("CREATE TABLE IF NOT EXISTS \"{table}\"");
            assert!(statements.iter().any(|s| s.starts_with(&needle)), "missing {table}");
        }
        assert!(statements.iter().all(|s| !s.starts_with("--")));
    }
}
