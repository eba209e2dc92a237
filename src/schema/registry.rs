//! Schema registry for the TagFlow tables.
//!
//! The registry is the single source of truth for table DDL. It is built once
//! at process start and passed by reference to the migration runner and the
//! store layer; there is no global mutable table registry.

use crate::error::{Result, StoreError};
use deadpool_postgres::Pool;
use std::collections::HashMap;

/// A table definition: name, CREATE TABLE statement, and the tables its
/// foreign keys reference.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: &'static str,
    pub create_sql: &'static str,
    pub depends_on: &'static [&'static str],
}

pub struct SchemaRegistry {
    tables: Vec<TableSpec>,
    by_name: HashMap<&'static str, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        let tables = vec![
            TableSpec {
                name: "admins",
                create_sql: r#"
                    CREATE TABLE admins (
                        admin_id SERIAL PRIMARY KEY,
                        username VARCHAR(50) NOT NULL UNIQUE,
                        email VARCHAR(255) NOT NULL UNIQUE,
                        password_hash VARCHAR(255) NOT NULL,
                        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    )
                "#,
                depends_on: &[],
            },
            TableSpec {
                name: "roles",
                create_sql: r#"
                    CREATE TABLE roles (
                        role_id SERIAL PRIMARY KEY,
                        role_name VARCHAR(100) NOT NULL UNIQUE,
                        created_by INT NOT NULL REFERENCES admins(admin_id),
                        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    )
                "#,
                depends_on: &["admins"],
            },
            TableSpec {
                name: "tags",
                create_sql: r#"
                    CREATE TABLE tags (
                        tag_id SERIAL PRIMARY KEY,
                        tag_name VARCHAR(100) NOT NULL UNIQUE,
                        description VARCHAR(255),
                        created_by INT NOT NULL REFERENCES admins(admin_id),
                        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    )
                "#,
                depends_on: &["admins"],
            },
            TableSpec {
                name: "users",
                create_sql: r#"
                    CREATE TABLE users (
                        user_id SERIAL PRIMARY KEY,
                        username VARCHAR(100) NOT NULL UNIQUE,
                        email VARCHAR(255) NOT NULL UNIQUE,
                        password_hash VARCHAR(255) NOT NULL,
                        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                        role_id INT NOT NULL REFERENCES roles(role_id)
                    )
                "#,
                depends_on: &["roles"],
            },
            TableSpec {
                name: "tag_values",
                create_sql: r#"
                    CREATE TABLE tag_values (
                        tag_value_id SERIAL PRIMARY KEY,
                        tag_id INT NOT NULL REFERENCES tags(tag_id),
                        value VARCHAR(255) NOT NULL,
                        created_by INT NOT NULL REFERENCES admins(admin_id),
                        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    )
                "#,
                depends_on: &["tags", "admins"],
            },
            TableSpec {
                name: "user_tag_permissions",
                create_sql: r#"
                    CREATE TABLE user_tag_permissions (
                        id SERIAL PRIMARY KEY,
                        user_id INT NOT NULL REFERENCES users(user_id),
                        tag_id INT NOT NULL REFERENCES tags(tag_id)
                    )
                "#,
                depends_on: &["users", "tags"],
            },
            TableSpec {
                name: "files",
                create_sql: r#"
                    CREATE TABLE files (
                        file_id SERIAL PRIMARY KEY,
                        file_name VARCHAR(255) NOT NULL,
                        uploaded_by INT NOT NULL REFERENCES users(user_id),
                        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    )
                "#,
                depends_on: &["users"],
            },
            TableSpec {
                name: "file_rows",
                create_sql: r#"
                    CREATE TABLE file_rows (
                        row_id SERIAL PRIMARY KEY,
                        file_id INT NOT NULL REFERENCES files(file_id),
                        data JSONB NOT NULL,
                        tag_id INT NOT NULL REFERENCES tags(tag_id),
                        tag_value_id INT NOT NULL REFERENCES tag_values(tag_value_id),
                        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    )
                "#,
                depends_on: &["files", "tags", "tag_values"],
            },
        ];

        let by_name = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name, i))
            .collect();

        Self { tables, by_name }
    }

    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    pub fn get(&self, name: &str) -> Option<&TableSpec> {
        self.by_name.get(name).map(|&i| &self.tables[i])
    }

    /// Order the whole registry by foreign-key dependencies.
    pub fn creation_order(&self) -> Result<Vec<&TableSpec>> {
        let names: Vec<&str> = self.tables.iter().map(|t| t.name).collect();
        self.creation_order_for(&names)
    }

    /// Order a subset of tables by foreign-key dependencies (topological
    /// sort). Dependencies outside the subset are ignored: they are assumed
    /// to exist already.
    pub fn creation_order_for(&self, names: &[&str]) -> Result<Vec<&TableSpec>> {
        let mut subset = Vec::with_capacity(names.len());
        for name in names {
            let spec = self.get(name).ok_or_else(|| StoreError::InvalidSchema {
                cause: format!("Unknown table: {}", name),
            })?;
            subset.push(spec);
        }

        if subset.is_empty() {
            return Ok(subset);
        }

        let name_to_idx: HashMap<&str, usize> = subset
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name, i))
            .collect();

        let mut in_degree: Vec<usize> = vec![0; subset.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); subset.len()];

        for (idx, table) in subset.iter().enumerate() {
            for dep_name in table.depends_on {
                if let Some(&dep_idx) = name_to_idx.get(dep_name) {
                    if dep_idx != idx {
                        dependents[dep_idx].push(idx);
                        in_degree[idx] += 1;
                    }
                }
            }
        }

        // Kahn's algorithm; the queue is kept sorted by table name so the
        // order is deterministic.
        let mut queue: Vec<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(i, _)| i)
            .collect();
        queue.sort_by(|a, b| subset[*b].name.cmp(subset[*a].name));

        let mut ordered_indices = Vec::new();

        while let Some(idx) = queue.pop() {
            ordered_indices.push(idx);

            for &dependent_idx in &dependents[idx] {
                in_degree[dependent_idx] -= 1;
                if in_degree[dependent_idx] == 0 {
                    queue.push(dependent_idx);
                    queue.sort_by(|a, b| subset[*b].name.cmp(subset[*a].name));
                }
            }
        }

        if ordered_indices.len() != subset.len() {
            let remaining: Vec<&str> = subset
                .iter()
                .enumerate()
                .filter(|(i, _)| !ordered_indices.contains(i))
                .map(|(_, t)| t.name)
                .collect();

            return Err(StoreError::InvalidSchema {
                cause: format!(
                    "Circular dependency detected in table definitions: {}",
                    remaining.join(", ")
                ),
            });
        }

        Ok(ordered_indices.into_iter().map(|i| subset[i]).collect())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// List deployed user tables in the public schema, bookkeeping excluded.
pub async fn list_tables(pool: &Pool) -> Result<Vec<String>> {
    let client = pool.get().await?;

    let rows = client
        .query(
            r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_type = 'BASE TABLE'
            AND table_name NOT LIKE '\_tagflow\_%'
            ORDER BY table_name
            "#,
            &[],
        )
        .await
        .map_err(|e| StoreError::QueryFailed {
            table: "information_schema.tables".to_string(),
            cause: e.to_string(),
        })?;

    Ok(rows.iter().map(|r| r.get(0)).collect())
}
