//! SQL migration definitions for the preference database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: per-article meta flags",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Per-article key/value preferences
CREATE TABLE IF NOT EXISTS article_meta (
    article_id INTEGER NOT NULL,
    meta_key   TEXT NOT NULL,
    meta_value TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (article_id, meta_key)
);

CREATE INDEX IF NOT EXISTS idx_article_meta_article ON article_meta(article_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_ascending() {
        let versions: Vec<u32> = all_migrations().iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }
}
