//! Versioned revision history for the TagFlow schema.
//!
//! Each revision carries a unique token and a pointer to its predecessor,
//! forming a single linear chain. A revision declares the set of tables it
//! introduces; its upgrade steps are those tables' CREATE statements in
//! foreign-key-safe order, and its downgrade steps are the matching DROPs in
//! reverse. A downgrade therefore removes exactly the tables its own upgrade
//! created, never more.

use crate::error::{Result, StoreError};
use crate::schema::registry::SchemaRegistry;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct Revision {
    pub id: &'static str,
    pub down_revision: Option<&'static str>,
    pub title: &'static str,
    /// Tables introduced by this revision.
    pub creates: &'static [&'static str],
}

/// One executable DDL step of a migration.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationStep {
    CreateTable { table: String, sql: String },
    DropTable { table: String },
}

impl MigrationStep {
    pub fn sql(&self) -> String {
        match self {
            MigrationStep::CreateTable { sql, .. } => sql.trim().to_string(),
            MigrationStep::DropTable { table } => format!("DROP TABLE {}", table),
        }
    }

    pub fn table(&self) -> &str {
        match self {
            MigrationStep::CreateTable { table, .. } => table,
            MigrationStep::DropTable { table } => table,
        }
    }
}

impl Revision {
    pub fn up_steps(&self, registry: &SchemaRegistry) -> Result<Vec<MigrationStep>> {
        let ordered = registry.creation_order_for(self.creates)?;

        Ok(ordered
            .into_iter()
            .map(|spec| MigrationStep::CreateTable {
                table: spec.name.to_string(),
                sql: spec.create_sql.to_string(),
            })
            .collect())
    }

    pub fn down_steps(&self, registry: &SchemaRegistry) -> Result<Vec<MigrationStep>> {
        let ordered = registry.creation_order_for(self.creates)?;

        Ok(ordered
            .into_iter()
            .rev()
            .map(|spec| MigrationStep::DropTable {
                table: spec.name.to_string(),
            })
            .collect())
    }
}

/// The full revision history, base first.
pub fn revision_history() -> Vec<Revision> {
    vec![
        Revision {
            id: "9f2c41d6a8b3",
            down_revision: None,
            title: "create admins table",
            creates: &["admins"],
        },
        Revision {
            id: "d174e5c09b82",
            down_revision: Some("9f2c41d6a8b3"),
            title: "create roles, tags, users, tag values and permissions tables",
            creates: &["roles", "tags", "users", "tag_values", "user_tag_permissions"],
        },
        Revision {
            id: "6ab0f3e8d915",
            down_revision: Some("d174e5c09b82"),
            title: "add files and file rows tables",
            creates: &["files", "file_rows"],
        },
    ]
}

/// Validate that a history is a single linear chain consistent with the
/// registry: unique ids, one base, each down_revision pointing at the
/// previous entry, every table created exactly once with its dependencies
/// available, and no registry table left without a creating revision.
pub fn validate_history(history: &[Revision], registry: &SchemaRegistry) -> Result<()> {
    if history.is_empty() {
        return Err(StoreError::InvalidHistory {
            cause: "history is empty".to_string(),
        });
    }

    let mut seen_ids = HashSet::new();
    for revision in history {
        if !seen_ids.insert(revision.id) {
            return Err(StoreError::InvalidHistory {
                cause: format!("duplicate revision id: {}", revision.id),
            });
        }
    }

    if history[0].down_revision.is_some() {
        return Err(StoreError::InvalidHistory {
            cause: format!(
                "base revision {} has a down_revision",
                history[0].id
            ),
        });
    }

    for pair in history.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.down_revision != Some(prev.id) {
            return Err(StoreError::InvalidHistory {
                cause: format!(
                    "revision {} does not follow {}: down_revision is {:?}",
                    next.id, prev.id, next.down_revision
                ),
            });
        }
    }

    let mut created = HashSet::new();
    for revision in history {
        for table in revision.creates {
            let spec = registry.get(table).ok_or_else(|| StoreError::InvalidHistory {
                cause: format!("revision {} creates unknown table {}", revision.id, table),
            })?;

            if !created.insert(*table) {
                return Err(StoreError::InvalidHistory {
                    cause: format!("table {} is created more than once", table),
                });
            }

            // A dependency must be created by an earlier revision or within
            // this one (ordering inside a revision is handled by the
            // registry's topological sort).
            for dep in spec.depends_on {
                let in_this_revision = revision.creates.contains(dep);
                if !created.contains(dep) && !in_this_revision {
                    return Err(StoreError::InvalidHistory {
                        cause: format!(
                            "revision {} creates {} before its dependency {}",
                            revision.id, table, dep
                        ),
                    });
                }
            }
        }
    }

    for spec in registry.tables() {
        if !created.contains(spec.name) {
            return Err(StoreError::InvalidHistory {
                cause: format!("table {} has no creating revision", spec.name),
            });
        }
    }

    Ok(())
}

pub fn find_revision<'a>(history: &'a [Revision], id: &str) -> Result<&'a Revision> {
    history
        .iter()
        .find(|r| r.id == id)
        .ok_or_else(|| StoreError::RevisionNotFound {
            revision: id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipped_history_is_valid() {
        let registry = SchemaRegistry::new();
        let history = revision_history();
        validate_history(&history, &registry).unwrap();
    }

    #[test]
    fn test_downgrade_mirrors_upgrade_per_revision() {
        let registry = SchemaRegistry::new();

        for revision in revision_history() {
            let up = revision.up_steps(&registry).unwrap();
            let down = revision.down_steps(&registry).unwrap();

            let created: Vec<&str> = up.iter().map(|s| s.table()).collect();
            let dropped: Vec<&str> = down.iter().rev().map(|s| s.table()).collect();

            assert_eq!(
                created, dropped,
                "revision {} does not drop exactly what it creates",
                revision.id
            );
        }
    }

    #[test]
    fn test_full_cycle_covers_registry() {
        let registry = SchemaRegistry::new();
        let history = revision_history();

        let mut created = HashSet::new();
        for revision in &history {
            for step in revision.up_steps(&registry).unwrap() {
                created.insert(step.table().to_string());
            }
        }

        let mut dropped = HashSet::new();
        for revision in history.iter().rev() {
            for step in revision.down_steps(&registry).unwrap() {
                dropped.insert(step.table().to_string());
            }
        }

        let all: HashSet<String> = registry
            .tables()
            .iter()
            .map(|t| t.name.to_string())
            .collect();

        assert_eq!(created, all);
        assert_eq!(dropped, all);
    }

    #[test]
    fn test_up_steps_are_fk_safe() {
        let registry = SchemaRegistry::new();
        let second = &revision_history()[1];
        let steps = second.up_steps(&registry).unwrap();
        let order: Vec<&str> = steps.iter().map(|s| s.table()).collect();

        let pos = |name: &str| order.iter().position(|t| *t == name).unwrap();
        assert!(pos("roles") < pos("users"));
        assert!(pos("users") < pos("user_tag_permissions"));
        assert!(pos("tags") < pos("user_tag_permissions"));
        assert!(pos("tags") < pos("tag_values"));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let registry = SchemaRegistry::new();
        let mut history = revision_history();
        let base_id = history[0].id;
        history[2].id = base_id;

        assert!(validate_history(&history, &registry).is_err());
    }

    #[test]
    fn test_validate_rejects_broken_chain() {
        let registry = SchemaRegistry::new();
        let mut history = revision_history();
        history[1].down_revision = Some("000000000000");

        assert!(validate_history(&history, &registry).is_err());
    }

    #[test]
    fn test_validate_rejects_second_base() {
        let registry = SchemaRegistry::new();
        let mut history = revision_history();
        history[1].down_revision = None;

        assert!(validate_history(&history, &registry).is_err());
    }

    #[test]
    fn test_validate_rejects_dependency_before_creation() {
        let registry = SchemaRegistry::new();

        // files (depends on users) introduced in the base revision.
        let history = vec![Revision {
            id: "9f2c41d6a8b3",
            down_revision: None,
            title: "broken",
            creates: &["files"],
        }];

        assert!(validate_history(&history, &registry).is_err());
    }

    #[test]
    fn test_find_revision() {
        let history = revision_history();
        assert_eq!(find_revision(&history, "d174e5c09b82").unwrap().id, "d174e5c09b82");
        assert!(find_revision(&history, "ffffffffffff").is_err());
    }

    #[test]
    fn test_drop_step_sql() {
        let step = MigrationStep::DropTable {
            table: "file_rows".to_string(),
        };
        assert_eq!(step.sql(), "DROP TABLE file_rows");
    }
}
