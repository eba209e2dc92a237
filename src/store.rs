//! Typed access to the TagFlow tables.
//!
//! Thin parameterized inserts and lookups. Identity and created_at columns
//! are assigned by the store and returned to the caller; related rows come
//! back through explicit joins. Referential integrity and uniqueness are
//! enforced by the database constraints, so a dangling foreign key or a
//! duplicate name surfaces here as a failed query.

use crate::error::{Result, StoreError};
use crate::model::{
    Admin, File, FileRow, NewAdmin, NewFile, NewFileRow, NewRole, NewTag, NewTagValue, NewUser,
    Role, Tag, TagValue, User, UserTagPermission,
};
use deadpool_postgres::Pool;

pub async fn insert_admin(pool: &Pool, new: &NewAdmin) -> Result<Admin> {
    let client = pool.get().await?;

    let row = client
        .query_one(
            r#"
            INSERT INTO admins (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING admin_id, username, email, password_hash, created_at
            "#,
            &[&new.username, &new.email, &new.password_hash],
        )
        .await
        .map_err(|e| StoreError::QueryFailed {
            table: "admins".to_string(),
            cause: e.to_string(),
        })?;

    Ok(Admin::from_row(&row))
}

pub async fn insert_role(pool: &Pool, new: &NewRole) -> Result<Role> {
    let client = pool.get().await?;

    let row = client
        .query_one(
            r#"
            INSERT INTO roles (role_name, created_by)
            VALUES ($1, $2)
            RETURNING role_id, role_name, created_by, created_at
            "#,
            &[&new.role_name, &new.created_by],
        )
        .await
        .map_err(|e| StoreError::QueryFailed {
            table: "roles".to_string(),
            cause: e.to_string(),
        })?;

    Ok(Role::from_row(&row))
}

pub async fn insert_user(pool: &Pool, new: &NewUser) -> Result<User> {
    let client = pool.get().await?;

    let row = client
        .query_one(
            r#"
            INSERT INTO users (username, email, password_hash, role_id)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, username, email, password_hash, created_at, role_id
            "#,
            &[&new.username, &new.email, &new.password_hash, &new.role_id],
        )
        .await
        .map_err(|e| StoreError::QueryFailed {
            table: "users".to_string(),
            cause: e.to_string(),
        })?;

    Ok(User::from_row(&row))
}

pub async fn insert_tag(pool: &Pool, new: &NewTag) -> Result<Tag> {
    let client = pool.get().await?;

    let row = client
        .query_one(
            r#"
            INSERT INTO tags (tag_name, description, created_by)
            VALUES ($1, $2, $3)
            RETURNING tag_id, tag_name, description, created_by, created_at
            "#,
            &[&new.tag_name, &new.description, &new.created_by],
        )
        .await
        .map_err(|e| StoreError::QueryFailed {
            table: "tags".to_string(),
            cause: e.to_string(),
        })?;

    Ok(Tag::from_row(&row))
}

pub async fn insert_tag_value(pool: &Pool, new: &NewTagValue) -> Result<TagValue> {
    let client = pool.get().await?;

    let row = client
        .query_one(
            r#"
            INSERT INTO tag_values (tag_id, value, created_by)
            VALUES ($1, $2, $3)
            RETURNING tag_value_id, tag_id, value, created_by, created_at
            "#,
            &[&new.tag_id, &new.value, &new.created_by],
        )
        .await
        .map_err(|e| StoreError::QueryFailed {
            table: "tag_values".to_string(),
            cause: e.to_string(),
        })?;

    Ok(TagValue::from_row(&row))
}

pub async fn grant_tag_permission(
    pool: &Pool,
    user_id: i32,
    tag_id: i32,
) -> Result<UserTagPermission> {
    let client = pool.get().await?;

    let row = client
        .query_one(
            r#"
            INSERT INTO user_tag_permissions (user_id, tag_id)
            VALUES ($1, $2)
            RETURNING id, user_id, tag_id
            "#,
            &[&user_id, &tag_id],
        )
        .await
        .map_err(|e| StoreError::QueryFailed {
            table: "user_tag_permissions".to_string(),
            cause: e.to_string(),
        })?;

    Ok(UserTagPermission::from_row(&row))
}

pub async fn insert_file(pool: &Pool, new: &NewFile) -> Result<File> {
    let client = pool.get().await?;

    let row = client
        .query_one(
            r#"
            INSERT INTO files (file_name, uploaded_by)
            VALUES ($1, $2)
            RETURNING file_id, file_name, uploaded_by, created_at
            "#,
            &[&new.file_name, &new.uploaded_by],
        )
        .await
        .map_err(|e| StoreError::QueryFailed {
            table: "files".to_string(),
            cause: e.to_string(),
        })?;

    Ok(File::from_row(&row))
}

pub async fn insert_file_row(pool: &Pool, new: &NewFileRow) -> Result<FileRow> {
    let client = pool.get().await?;

    let row = client
        .query_one(
            r#"
            INSERT INTO file_rows (file_id, data, tag_id, tag_value_id)
            VALUES ($1, $2, $3, $4)
            RETURNING row_id, file_id, data, tag_id, tag_value_id, created_at
            "#,
            &[&new.file_id, &new.data, &new.tag_id, &new.tag_value_id],
        )
        .await
        .map_err(|e| StoreError::QueryFailed {
            table: "file_rows".to_string(),
            cause: e.to_string(),
        })?;

    Ok(FileRow::from_row(&row))
}

pub async fn user_by_username(pool: &Pool, username: &str) -> Result<Option<User>> {
    let client = pool.get().await?;

    let row = client
        .query_opt(
            r#"
            SELECT user_id, username, email, password_hash, created_at, role_id
            FROM users
            WHERE username = $1
            "#,
            &[&username],
        )
        .await
        .map_err(|e| StoreError::QueryFailed {
            table: "users".to_string(),
            cause: e.to_string(),
        })?;

    Ok(row.map(|r| User::from_row(&r)))
}

/// Tags a user has been granted, through the permissions join table.
pub async fn tags_permitted_for_user(pool: &Pool, user_id: i32) -> Result<Vec<Tag>> {
    let client = pool.get().await?;

    let rows = client
        .query(
            r#"
            SELECT t.tag_id, t.tag_name, t.description, t.created_by, t.created_at
            FROM tags t
            JOIN user_tag_permissions p ON p.tag_id = t.tag_id
            WHERE p.user_id = $1
            ORDER BY t.tag_name
            "#,
            &[&user_id],
        )
        .await
        .map_err(|e| StoreError::QueryFailed {
            table: "user_tag_permissions".to_string(),
            cause: e.to_string(),
        })?;

    Ok(rows.iter().map(Tag::from_row).collect())
}

pub async fn values_for_tag(pool: &Pool, tag_id: i32) -> Result<Vec<TagValue>> {
    let client = pool.get().await?;

    let rows = client
        .query(
            r#"
            SELECT tag_value_id, tag_id, value, created_by, created_at
            FROM tag_values
            WHERE tag_id = $1
            ORDER BY tag_value_id
            "#,
            &[&tag_id],
        )
        .await
        .map_err(|e| StoreError::QueryFailed {
            table: "tag_values".to_string(),
            cause: e.to_string(),
        })?;

    Ok(rows.iter().map(TagValue::from_row).collect())
}

pub async fn rows_for_file(pool: &Pool, file_id: i32) -> Result<Vec<FileRow>> {
    let client = pool.get().await?;

    let rows = client
        .query(
            r#"
            SELECT row_id, file_id, data, tag_id, tag_value_id, created_at
            FROM file_rows
            WHERE file_id = $1
            ORDER BY row_id
            "#,
            &[&file_id],
        )
        .await
        .map_err(|e| StoreError::QueryFailed {
            table: "file_rows".to_string(),
            cause: e.to_string(),
        })?;

    Ok(rows.iter().map(FileRow::from_row).collect())
}
