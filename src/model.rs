//! Record types for the TagFlow schema.
//!
//! One struct per table, with unidirectional foreign-key fields only.
//! Related rows are fetched with explicit joins in the store layer, never
//! held as in-memory object graphs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio_postgres::Row;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub admin_id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Admin {
    pub fn from_row(row: &Row) -> Self {
        Self {
            admin_id: row.get("admin_id"),
            username: row.get("username"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            created_at: row.get("created_at"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub role_id: i32,
    pub role_name: String,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn from_row(row: &Row) -> Self {
        Self {
            role_id: row.get("role_id"),
            role_name: row.get("role_name"),
            created_by: row.get("created_by"),
            created_at: row.get("created_at"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub role_id: i32,
}

impl User {
    pub fn from_row(row: &Row) -> Self {
        Self {
            user_id: row.get("user_id"),
            username: row.get("username"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            created_at: row.get("created_at"),
            role_id: row.get("role_id"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub tag_id: i32,
    pub tag_name: String,
    pub description: Option<String>,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    pub fn from_row(row: &Row) -> Self {
        Self {
            tag_id: row.get("tag_id"),
            tag_name: row.get("tag_name"),
            description: row.get("description"),
            created_by: row.get("created_by"),
            created_at: row.get("created_at"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagValue {
    pub tag_value_id: i32,
    pub tag_id: i32,
    pub value: String,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
}

impl TagValue {
    pub fn from_row(row: &Row) -> Self {
        Self {
            tag_value_id: row.get("tag_value_id"),
            tag_id: row.get("tag_id"),
            value: row.get("value"),
            created_by: row.get("created_by"),
            created_at: row.get("created_at"),
        }
    }
}

/// Grant of one tag to one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTagPermission {
    pub id: i32,
    pub user_id: i32,
    pub tag_id: i32,
}

impl UserTagPermission {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            user_id: row.get("user_id"),
            tag_id: row.get("tag_id"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub file_id: i32,
    pub file_name: String,
    pub uploaded_by: i32,
    pub created_at: DateTime<Utc>,
}

impl File {
    pub fn from_row(row: &Row) -> Self {
        Self {
            file_id: row.get("file_id"),
            file_name: row.get("file_name"),
            uploaded_by: row.get("uploaded_by"),
            created_at: row.get("created_at"),
        }
    }
}

/// One row of an uploaded file. `data` is an uninterpreted JSON payload;
/// the schema places no constraints on its shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRow {
    pub row_id: i32,
    pub file_id: i32,
    pub data: JsonValue,
    pub tag_id: i32,
    pub tag_value_id: i32,
    pub created_at: DateTime<Utc>,
}

impl FileRow {
    pub fn from_row(row: &Row) -> Self {
        Self {
            row_id: row.get("row_id"),
            file_id: row.get("file_id"),
            data: row.get("data"),
            tag_id: row.get("tag_id"),
            tag_value_id: row.get("tag_value_id"),
            created_at: row.get("created_at"),
        }
    }
}

// Insert payloads. Identity and created_at columns are assigned by the store.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAdmin {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
    pub role_name: String,
    pub created_by: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTag {
    pub tag_name: String,
    pub description: Option<String>,
    pub created_by: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTagValue {
    pub tag_id: i32,
    pub value: String,
    pub created_by: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFile {
    pub file_name: String,
    pub uploaded_by: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFileRow {
    pub file_id: i32,
    pub data: JsonValue,
    pub tag_id: i32,
    pub tag_value_id: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_file_row_serialization() {
        let row = NewFileRow {
            file_id: 1,
            data: serde_json::json!({"col": "val"}),
            tag_id: 1,
            tag_value_id: 1,
        };

        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("\"col\":\"val\""));

        let back: NewFileRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back.data, row.data);
    }

    #[test]
    fn test_tag_description_optional() {
        let json = r#"{"tag_name":"color","description":null,"created_by":1}"#;
        let tag: NewTag = serde_json::from_str(json).unwrap();
        assert!(tag.description.is_none());
    }
}
