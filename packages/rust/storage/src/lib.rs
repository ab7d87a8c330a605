//! libSQL storage layer for per-article outline preferences.
//!
//! The [`Storage`] struct wraps a local libSQL database holding key/value
//! meta flags per article (see [`contentlist_shared::PrefKey`]).
//!
//! **Access rules:**
//! - Admin/CLI writes: read-write via [`Storage::open`]
//! - Render path: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::Utc;
use contentlist_shared::{ContentListError, Result};
use libsql::{Connection, Database, params};

const UPSERT_META_SQL: &str = "INSERT INTO article_meta (article_id, meta_key, meta_value, updated_at)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT(article_id, meta_key) DO UPDATE SET
       meta_value = excluded.meta_value,
       updated_at = excluded.updated_at";

const DELETE_META_SQL: &str = "DELETE FROM article_meta WHERE article_id = ?1 AND meta_key = ?2";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ContentListError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ContentListError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ContentListError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ContentListError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ContentListError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ContentListError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ContentListError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Article meta operations
    // -----------------------------------------------------------------------

    /// Get a single meta value for an article.
    pub async fn get_meta(&self, article_id: i64, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT meta_value FROM article_meta WHERE article_id = ?1 AND meta_key = ?2",
                params![article_id, key],
            )
            .await
            .map_err(|e| ContentListError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value: String = row
                    .get(0)
                    .map_err(|e| ContentListError::Storage(e.to_string()))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(ContentListError::Storage(e.to_string())),
        }
    }

    /// Store a meta value (upserts on `article_id + meta_key`).
    pub async fn set_meta(&self, article_id: i64, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(UPSERT_META_SQL, params![article_id, key, value, now.as_str()])
            .await
            .map_err(|e| ContentListError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Remove a meta value. Removing a missing key is not an error.
    pub async fn delete_meta(&self, article_id: i64, key: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(DELETE_META_SQL, params![article_id, key])
            .await
            .map_err(|e| ContentListError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Apply several meta changes in one transaction. `Some(value)` upserts the
    /// key, `None` deletes it. On any failure nothing is written.
    pub async fn write_meta_batch(
        &self,
        article_id: i64,
        changes: &[(&str, Option<&str>)],
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| ContentListError::Storage(e.to_string()))?;

        for (key, value) in changes {
            let result = match value {
                Some(value) => {
                    tx.execute(
                        UPSERT_META_SQL,
                        params![article_id, *key, *value, now.as_str()],
                    )
                    .await
                }
                None => tx.execute(DELETE_META_SQL, params![article_id, *key]).await,
            };

            if let Err(e) = result {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                return Err(ContentListError::Storage(format!(
                    "meta write for {key} failed: {e}"
                )));
            }
        }

        tx.commit()
            .await
            .map_err(|e| ContentListError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List all meta values for an article. Returns `Vec<(key, value)>` ordered by key.
    pub async fn list_meta(&self, article_id: i64) -> Result<Vec<(String, String)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT meta_key, meta_value FROM article_meta
                 WHERE article_id = ?1 ORDER BY meta_key",
                params![article_id],
            )
            .await
            .map_err(|e| ContentListError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push((
                row.get::<String>(0)
                    .map_err(|e| ContentListError::Storage(e.to_string()))?,
                row.get::<String>(1)
                    .map_err(|e| ContentListError::Storage(e.to_string()))?,
            ));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("cl_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("cl_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn meta_set_get_overwrite() {
        let storage = test_storage().await;

        assert!(storage.get_meta(7, "contentlist_need").await.unwrap().is_none());

        storage
            .set_meta(7, "contentlist_need", "1")
            .await
            .expect("set meta");
        assert_eq!(
            storage.get_meta(7, "contentlist_need").await.unwrap().as_deref(),
            Some("1")
        );

        storage
            .set_meta(7, "contentlist_need", "0")
            .await
            .expect("overwrite meta");
        assert_eq!(
            storage.get_meta(7, "contentlist_need").await.unwrap().as_deref(),
            Some("0")
        );

        // Other articles are untouched
        assert!(storage.get_meta(8, "contentlist_need").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn meta_delete_and_list() {
        let storage = test_storage().await;
        storage.set_meta(1, "contentlist_one_level", "1").await.unwrap();
        storage.set_meta(1, "contentlist_need", "1").await.unwrap();

        let listed = storage.list_meta(1).await.expect("list meta");
        assert_eq!(
            listed,
            vec![
                ("contentlist_need".to_string(), "1".to_string()),
                ("contentlist_one_level".to_string(), "1".to_string()),
            ]
        );

        storage
            .delete_meta(1, "contentlist_need")
            .await
            .expect("delete meta");
        storage
            .delete_meta(1, "contentlist_missing")
            .await
            .expect("delete missing meta");

        let listed = storage.list_meta(1).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, "contentlist_one_level");
    }

    #[tokio::test]
    async fn batch_writes_and_deletes() {
        let storage = test_storage().await;
        storage.set_meta(2, "contentlist_one_level", "1").await.unwrap();

        storage
            .write_meta_batch(
                2,
                &[("contentlist_need", Some("1")), ("contentlist_one_level", None)],
            )
            .await
            .expect("batch write");

        assert_eq!(
            storage.list_meta(2).await.unwrap(),
            vec![("contentlist_need".to_string(), "1".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_batch_leaves_prior_values() {
        let storage = test_storage().await;
        storage.set_meta(3, "contentlist_need", "0").await.unwrap();

        storage
            .conn
            .execute_batch(
                "CREATE TRIGGER refuse_one_level BEFORE INSERT ON article_meta
                 WHEN NEW.meta_key = 'contentlist_one_level'
                 BEGIN SELECT RAISE(ABORT, 'refused'); END;",
            )
            .await
            .expect("create trigger");

        let result = storage
            .write_meta_batch(
                3,
                &[
                    ("contentlist_need", Some("1")),
                    ("contentlist_one_level", Some("1")),
                ],
            )
            .await;
        assert!(result.is_err());

        assert_eq!(
            storage.list_meta(3).await.unwrap(),
            vec![("contentlist_need".to_string(), "0".to_string())]
        );
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("cl_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.set_meta(1, "contentlist_need", "1").await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(
            ro.get_meta(1, "contentlist_need").await.unwrap().as_deref(),
            Some("1")
        );

        let result = ro.set_meta(2, "contentlist_need", "1").await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));

        let batch = ro.write_meta_batch(2, &[("contentlist_need", None)]).await;
        assert!(batch.is_err());
    }
}
