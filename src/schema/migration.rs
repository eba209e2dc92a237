//! Migration runner for the TagFlow schema.
//!
//! Applies revisions in chain order against a live store, each revision
//! inside one transaction, or emits the equivalent DDL script without a
//! connection. Applied revisions are recorded in `_tagflow_revisions`
//! together with a normalized checksum of their DDL so drift between the
//! shipped history and what a database actually ran is detected.

use crate::error::{Result, StoreError};
use crate::schema::registry::SchemaRegistry;
use crate::schema::revision::{revision_history, validate_history, Revision};
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

const REVISIONS_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS _tagflow_revisions (
        id SERIAL PRIMARY KEY,
        revision VARCHAR(32) NOT NULL UNIQUE,
        title TEXT NOT NULL,
        checksum TEXT NOT NULL,
        applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

/// A row from the bookkeeping table.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedRevision {
    pub revision: String,
    pub title: String,
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
}

pub struct MigrationRunner<'a> {
    registry: &'a SchemaRegistry,
    history: Vec<Revision>,
}

impl<'a> MigrationRunner<'a> {
    /// Build a runner over the shipped revision history. Fails if the
    /// history is not a valid linear chain over the registry.
    pub fn new(registry: &'a SchemaRegistry) -> Result<Self> {
        let history = revision_history();
        validate_history(&history, registry)?;

        Ok(Self { registry, history })
    }

    pub fn history(&self) -> &[Revision] {
        &self.history
    }

    pub async fn ensure_revisions_table(&self, pool: &Pool) -> Result<()> {
        let client = pool.get().await?;

        client
            .execute(REVISIONS_TABLE_SQL, &[])
            .await
            .map_err(|e| StoreError::MigrationFailed {
                revision: "_tagflow_revisions table creation".to_string(),
                cause: e.to_string(),
            })?;

        Ok(())
    }

    pub async fn applied_revisions(&self, pool: &Pool) -> Result<Vec<AppliedRevision>> {
        self.ensure_revisions_table(pool).await?;

        let client = pool.get().await?;
        let rows = client
            .query(
                "SELECT revision, title, checksum, applied_at FROM _tagflow_revisions ORDER BY id",
                &[],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                table: "_tagflow_revisions".to_string(),
                cause: e.to_string(),
            })?;

        Ok(rows
            .iter()
            .map(|row| AppliedRevision {
                revision: row.get(0),
                title: row.get(1),
                checksum: row.get(2),
                applied_at: row.get(3),
            })
            .collect())
    }

    pub async fn current_revision(&self, pool: &Pool) -> Result<Option<String>> {
        let applied = self.applied_revisions(pool).await?;
        Ok(applied.last().map(|r| r.revision.clone()))
    }

    /// Apply pending revisions in chain order up to `target` (head when
    /// None). Returns the number of revisions applied.
    pub async fn upgrade(&self, pool: &Pool, target: Option<&str>) -> Result<usize> {
        let target_idx = self.resolve_target(target)?;

        let applied = self.applied_revisions(pool).await?;
        self.verify_applied(&applied)?;

        let start = applied.len();
        if start > target_idx {
            debug!("Nothing to upgrade: target already applied");
            return Ok(0);
        }

        let mut count = 0;
        for revision in &self.history[start..=target_idx] {
            self.apply_revision(pool, revision).await?;
            count += 1;
        }

        Ok(count)
    }

    /// Roll back applied revisions in reverse order down to, but not
    /// including, `target` (all the way to an empty schema when None).
    /// Returns the number of revisions reverted.
    pub async fn downgrade(&self, pool: &Pool, target: Option<&str>) -> Result<usize> {
        let applied = self.applied_revisions(pool).await?;
        self.verify_applied(&applied)?;

        let keep = match target {
            Some(id) => {
                let pos = applied.iter().position(|r| r.revision == id).ok_or_else(|| {
                    // Distinguish an unknown token from a known-but-unapplied one.
                    if self.history.iter().any(|r| r.id == id) {
                        StoreError::RevisionNotApplied {
                            revision: id.to_string(),
                        }
                    } else {
                        StoreError::RevisionNotFound {
                            revision: id.to_string(),
                        }
                    }
                })?;
                pos + 1
            }
            None => 0,
        };

        let mut count = 0;
        for record in applied[keep..].iter().rev() {
            let revision = self
                .history
                .iter()
                .find(|r| r.id == record.revision)
                .ok_or_else(|| StoreError::RevisionNotFound {
                    revision: record.revision.clone(),
                })?;

            self.revert_revision(pool, revision).await?;
            count += 1;
        }

        Ok(count)
    }

    /// Emit the DDL script that upgrades an empty store to `target` (head
    /// when None), bookkeeping statements included. No connection is made.
    pub fn upgrade_script(&self, target: Option<&str>) -> Result<String> {
        let target_idx = self.resolve_target(target)?;

        let mut script = String::new();
        script.push_str("-- tagflow-store upgrade script\n");
        script.push_str(&format!("-- target revision: {}\n\n", self.history[target_idx].id));
        script.push_str(&format!("{};\n", REVISIONS_TABLE_SQL.trim()));

        for revision in &self.history[..=target_idx] {
            script.push_str(&format!("\n-- revision {}: {}\n", revision.id, revision.title));

            for step in revision.up_steps(self.registry)? {
                script.push_str(&format!("{};\n", step.sql()));
            }

            let checksum = self.revision_checksum(revision)?;
            script.push_str(&format!(
                "INSERT INTO _tagflow_revisions (revision, title, checksum) VALUES ('{}', '{}', '{}');\n",
                revision.id, revision.title, checksum
            ));
        }

        Ok(script)
    }

    /// Emit the DDL script that rolls a fully upgraded store back down to,
    /// but not including, `target` (to empty when None).
    pub fn downgrade_script(&self, target: Option<&str>) -> Result<String> {
        let keep = match target {
            Some(id) => {
                let pos = self
                    .history
                    .iter()
                    .position(|r| r.id == id)
                    .ok_or_else(|| StoreError::RevisionNotFound {
                        revision: id.to_string(),
                    })?;
                pos + 1
            }
            None => 0,
        };

        let mut script = String::new();
        script.push_str("-- tagflow-store downgrade script\n");
        script.push_str(&format!(
            "-- target revision: {}\n",
            target.unwrap_or("base")
        ));

        for revision in self.history[keep..].iter().rev() {
            script.push_str(&format!("\n-- revision {}: {}\n", revision.id, revision.title));

            for step in revision.down_steps(self.registry)? {
                script.push_str(&format!("{};\n", step.sql()));
            }

            script.push_str(&format!(
                "DELETE FROM _tagflow_revisions WHERE revision = '{}';\n",
                revision.id
            ));
        }

        Ok(script)
    }

    /// Check that the applied revisions form a prefix of the shipped history
    /// and that each stored checksum matches the computed one.
    fn verify_applied(&self, applied: &[AppliedRevision]) -> Result<()> {
        for (i, record) in applied.iter().enumerate() {
            let expected = self.history.get(i).ok_or_else(|| StoreError::InvalidHistory {
                cause: format!(
                    "database has {} applied revisions but the history has only {}",
                    applied.len(),
                    self.history.len()
                ),
            })?;

            if expected.id != record.revision {
                return Err(StoreError::InvalidHistory {
                    cause: format!(
                        "applied revision {} diverges from history (expected {})",
                        record.revision, expected.id
                    ),
                });
            }

            let computed = self.revision_checksum(expected)?;
            if computed != record.checksum {
                return Err(StoreError::ChecksumMismatch {
                    revision: record.revision.clone(),
                    stored: record.checksum.clone(),
                    computed,
                });
            }
        }

        Ok(())
    }

    fn resolve_target(&self, target: Option<&str>) -> Result<usize> {
        match target {
            Some(id) => self
                .history
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| StoreError::RevisionNotFound {
                    revision: id.to_string(),
                }),
            None => Ok(self.history.len() - 1),
        }
    }

    fn revision_checksum(&self, revision: &Revision) -> Result<String> {
        let ddl: Vec<String> = revision
            .up_steps(self.registry)?
            .iter()
            .map(|step| step.sql())
            .collect();

        Ok(compute_checksum(&ddl.join(";\n")))
    }

    async fn apply_revision(&self, pool: &Pool, revision: &Revision) -> Result<()> {
        info!("Applying revision {} ({})", revision.id, revision.title);

        let steps = revision.up_steps(self.registry)?;
        let checksum = self.revision_checksum(revision)?;

        let mut client = pool.get().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| StoreError::MigrationFailed {
                revision: revision.id.to_string(),
                cause: e.to_string(),
            })?;

        for step in &steps {
            tx.batch_execute(&step.sql())
                .await
                .map_err(|e| StoreError::MigrationFailed {
                    revision: revision.id.to_string(),
                    cause: format!("{}: {}", step.table(), e),
                })?;
        }

        tx.execute(
            "INSERT INTO _tagflow_revisions (revision, title, checksum) VALUES ($1, $2, $3)",
            &[&revision.id, &revision.title, &checksum],
        )
        .await
        .map_err(|e| StoreError::MigrationFailed {
            revision: revision.id.to_string(),
            cause: format!("Failed to record revision: {}", e),
        })?;

        tx.commit().await.map_err(|e| StoreError::MigrationFailed {
            revision: revision.id.to_string(),
            cause: format!("Commit failed: {}", e),
        })?;

        info!(
            "Applied revision {} (checksum: {})",
            revision.id, checksum
        );
        Ok(())
    }

    async fn revert_revision(&self, pool: &Pool, revision: &Revision) -> Result<()> {
        info!("Reverting revision {} ({})", revision.id, revision.title);

        let steps = revision.down_steps(self.registry)?;

        let mut client = pool.get().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| StoreError::MigrationFailed {
                revision: revision.id.to_string(),
                cause: e.to_string(),
            })?;

        for step in &steps {
            tx.batch_execute(&step.sql())
                .await
                .map_err(|e| StoreError::MigrationFailed {
                    revision: revision.id.to_string(),
                    cause: format!("{}: {}", step.table(), e),
                })?;
        }

        tx.execute(
            "DELETE FROM _tagflow_revisions WHERE revision = $1",
            &[&revision.id],
        )
        .await
        .map_err(|e| StoreError::MigrationFailed {
            revision: revision.id.to_string(),
            cause: format!("Failed to remove revision record: {}", e),
        })?;

        tx.commit().await.map_err(|e| StoreError::MigrationFailed {
            revision: revision.id.to_string(),
            cause: format!("Commit failed: {}", e),
        })?;

        info!("Reverted revision {}", revision.id);
        Ok(())
    }
}

fn compute_checksum(content: &str) -> String {
    // Normalize: remove comments, collapse whitespace, lowercase
    let single_line_re = regex::Regex::new(r"--[^\n]*").unwrap();
    let content = single_line_re.replace_all(content, "");

    let multi_line_re = regex::Regex::new(r"/\*[\s\S]*?\*/").unwrap();
    let content = multi_line_re.replace_all(&content, "");

    let whitespace_re = regex::Regex::new(r"\s+").unwrap();
    let normalized = whitespace_re.replace_all(&content, " ").trim().to_lowercase();

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner_fixture(registry: &SchemaRegistry) -> MigrationRunner<'_> {
        MigrationRunner::new(registry).unwrap()
    }

    #[test]
    fn test_compute_checksum() {
        let content = "CREATE TABLE test (id INT);";
        let checksum = compute_checksum(content);
        assert_eq!(checksum.len(), 64); // SHA256 produces 64 hex characters

        let checksum2 = compute_checksum(content);
        assert_eq!(checksum, checksum2);

        let checksum3 = compute_checksum("CREATE TABLE other (id INT);");
        assert_ne!(checksum, checksum3);
    }

    #[test]
    fn test_checksum_normalization() {
        let sql1 = "CREATE TABLE users (id INT);";
        let sql2 = "CREATE   TABLE   users   (id   INT);";
        let sql3 = "create table users (id int);";
        let sql4 = "-- a comment\nCREATE TABLE users (id INT);";

        assert_eq!(compute_checksum(sql1), compute_checksum(sql2));
        assert_eq!(compute_checksum(sql1), compute_checksum(sql3));
        assert_eq!(compute_checksum(sql1), compute_checksum(sql4));
    }

    #[test]
    fn test_resolve_target() {
        let registry = SchemaRegistry::new();
        let runner = runner_fixture(&registry);

        assert_eq!(runner.resolve_target(None).unwrap(), 2);
        assert_eq!(runner.resolve_target(Some("9f2c41d6a8b3")).unwrap(), 0);
        assert!(runner.resolve_target(Some("ffffffffffff")).is_err());
    }

    #[test]
    fn test_upgrade_script_full_chain() {
        let registry = SchemaRegistry::new();
        let runner = runner_fixture(&registry);

        let script = runner.upgrade_script(None).unwrap();

        for table in [
            "admins",
            "roles",
            "users",
            "tags",
            "tag_values",
            "user_tag_permissions",
            "files",
            "file_rows",
        ] {
            let needle = format!("CREATE TABLE {} (", table);
            assert_eq!(
                script.matches(&needle).count(),
                1,
                "expected exactly one CREATE for {}",
                table
            );
        }

        // FK-safe order across revisions
        let pos = |needle: &str| script.find(needle).unwrap();
        assert!(pos("CREATE TABLE admins") < pos("CREATE TABLE roles"));
        assert!(pos("CREATE TABLE roles") < pos("CREATE TABLE users"));
        assert!(pos("CREATE TABLE users") < pos("CREATE TABLE files"));
        assert!(pos("CREATE TABLE files") < pos("CREATE TABLE file_rows"));

        // bookkeeping travels with the script
        assert!(script.contains("CREATE TABLE IF NOT EXISTS _tagflow_revisions"));
        assert_eq!(script.matches("INSERT INTO _tagflow_revisions").count(), 3);
        assert!(script.contains("-- revision 9f2c41d6a8b3"));
    }

    #[test]
    fn test_upgrade_script_partial() {
        let registry = SchemaRegistry::new();
        let runner = runner_fixture(&registry);

        let script = runner.upgrade_script(Some("d174e5c09b82")).unwrap();
        assert!(script.contains("CREATE TABLE users ("));
        assert!(!script.contains("CREATE TABLE files ("));
    }

    #[test]
    fn test_downgrade_script_to_base() {
        let registry = SchemaRegistry::new();
        let runner = runner_fixture(&registry);

        let script = runner.downgrade_script(None).unwrap();

        for table in [
            "admins",
            "roles",
            "users",
            "tags",
            "tag_values",
            "user_tag_permissions",
            "files",
            "file_rows",
        ] {
            let needle = format!("DROP TABLE {};", table);
            assert_eq!(
                script.matches(&needle).count(),
                1,
                "expected exactly one DROP for {}",
                table
            );
        }

        // Reverse of creation order
        let pos = |needle: &str| script.find(needle).unwrap();
        assert!(pos("DROP TABLE file_rows") < pos("DROP TABLE files"));
        assert!(pos("DROP TABLE files") < pos("DROP TABLE users"));
        assert!(pos("DROP TABLE users") < pos("DROP TABLE roles"));
        assert!(pos("DROP TABLE roles") < pos("DROP TABLE admins"));

        assert_eq!(script.matches("DELETE FROM _tagflow_revisions").count(), 3);
    }

    #[test]
    fn test_downgrade_script_keeps_target() {
        let registry = SchemaRegistry::new();
        let runner = runner_fixture(&registry);

        let script = runner.downgrade_script(Some("d174e5c09b82")).unwrap();
        assert!(script.contains("DROP TABLE file_rows;"));
        assert!(script.contains("DROP TABLE files;"));
        assert!(!script.contains("DROP TABLE users;"));
        assert!(!script.contains("DROP TABLE admins;"));
    }

    #[test]
    fn test_verify_applied_detects_divergence() {
        let registry = SchemaRegistry::new();
        let runner = runner_fixture(&registry);

        let applied = vec![AppliedRevision {
            revision: "d174e5c09b82".to_string(), // not the base revision
            title: "out of order".to_string(),
            checksum: "irrelevant".to_string(),
            applied_at: Utc::now(),
        }];

        assert!(matches!(
            runner.verify_applied(&applied),
            Err(StoreError::InvalidHistory { .. })
        ));
    }

    #[test]
    fn test_verify_applied_detects_checksum_drift() {
        let registry = SchemaRegistry::new();
        let runner = runner_fixture(&registry);

        let applied = vec![AppliedRevision {
            revision: "9f2c41d6a8b3".to_string(),
            title: "create admins table".to_string(),
            checksum: "0".repeat(64),
            applied_at: Utc::now(),
        }];

        assert!(matches!(
            runner.verify_applied(&applied),
            Err(StoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_applied_accepts_valid_prefix() {
        let registry = SchemaRegistry::new();
        let runner = runner_fixture(&registry);

        let base = &runner.history()[0];
        let applied = vec![AppliedRevision {
            revision: base.id.to_string(),
            title: base.title.to_string(),
            checksum: runner.revision_checksum(base).unwrap(),
            applied_at: Utc::now(),
        }];

        runner.verify_applied(&applied).unwrap();
    }

    #[test]
    fn test_scripts_terminate_statements() {
        let registry = SchemaRegistry::new();
        let runner = runner_fixture(&registry);

        for script in [
            runner.upgrade_script(None).unwrap(),
            runner.downgrade_script(None).unwrap(),
        ] {
            for chunk in script.split("\n\n") {
                for line in chunk.lines() {
                    if line.starts_with("DROP TABLE") || line.starts_with("DELETE FROM") {
                        assert!(line.ends_with(';'), "unterminated statement: {}", line);
                    }
                }
            }
        }
    }
}
