use std::collections::HashMap;

use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    db::{
        models::{Content, ItemKind, Structure, STRUCTURE_COLUMNS},
        ordering::{assign_order, OrderScope, MAX_ORDER},
        Database,
    },
    error::{AppError, Result},
    forms::module::RowChange,
    services::{items, storage::MediaStorage},
};

/// The structure, if `owner_id` owns it. Anything else is a 404.
pub async fn owned_structure(pool: &SqlitePool, id: &str, owner_id: &str) -> Result<Structure> {
    let sql = format!("SELECT {STRUCTURE_COLUMNS} FROM structures WHERE id = ? AND owner_id = ?");
    sqlx::query_as::<_, Structure>(&sql)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Structure not found".to_string()))
}

/// The content slot, if its structure belongs to `owner_id`.
pub async fn owned_content(pool: &SqlitePool, id: &str, owner_id: &str) -> Result<Content> {
    sqlx::query_as::<_, Content>(
        r#"
        SELECT c.id, c.structure_id, c.title, c.description, c.position
        FROM contents c
        JOIN structures s ON c.structure_id = s.id
        WHERE c.id = ? AND s.owner_id = ?
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Content not found".to_string()))
}

pub async fn list_for_structure(pool: &SqlitePool, structure_id: &str) -> Result<Vec<Content>> {
    let contents = sqlx::query_as::<_, Content>(
        "SELECT id, structure_id, title, description, position FROM contents WHERE structure_id = ? ORDER BY position",
    )
    .bind(structure_id)
    .fetch_all(pool)
    .await?;
    Ok(contents)
}

pub async fn insert(
    conn: &mut SqliteConnection,
    structure_id: &str,
    title: &str,
    description: &str,
    order: Option<i64>,
) -> Result<Content> {
    let order = assign_order(conn, OrderScope::Structure(structure_id), order).await?;
    let content = Content {
        id: Uuid::new_v4().to_string(),
        structure_id: structure_id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        order,
    };

    sqlx::query(
        "INSERT INTO contents (id, structure_id, title, description, position) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&content.id)
    .bind(&content.structure_id)
    .bind(&content.title)
    .bind(&content.description)
    .bind(content.order)
    .execute(&mut *conn)
    .await?;

    Ok(content)
}

async fn attached_items(
    conn: &mut SqliteConnection,
    filter: &str,
    key: &str,
) -> Result<Vec<(ItemKind, String)>> {
    let sql = format!(
        "SELECT dc.item_kind, dc.item_id FROM diverse_contents dc JOIN contents c ON dc.content_id = c.id WHERE {filter} = ?"
    );
    let rows = sqlx::query_as::<_, (ItemKind, String)>(&sql)
        .bind(key)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

/// Removes a content slot, its association and the attached item.
/// Returns stored files to discard after commit.
async fn remove(conn: &mut SqliteConnection, content_id: &str) -> Result<Vec<String>> {
    let attached = attached_items(conn, "c.id", content_id).await?;
    let files = items::purge(conn, &attached).await?;

    sqlx::query("DELETE FROM contents WHERE id = ?")
        .bind(content_id)
        .execute(&mut *conn)
        .await?;

    Ok(files)
}

pub async fn delete(db: &Database, storage: &MediaStorage, content_id: &str) -> Result<()> {
    let mut tx = db.pool.begin().await?;
    let files = remove(&mut tx, content_id).await?;
    tx.commit().await?;

    for file in files {
        storage.discard(&file).await;
    }
    Ok(())
}

/// Deletes a structure, cascading to its contents, and cleans up their items.
pub async fn delete_structure(db: &Database, storage: &MediaStorage, structure_id: &str) -> Result<()> {
    let mut tx = db.pool.begin().await?;
    let attached = attached_items(&mut tx, "c.structure_id", structure_id).await?;
    let files = items::purge(&mut tx, &attached).await?;

    sqlx::query("DELETE FROM structures WHERE id = ?")
        .bind(structure_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    for file in files {
        storage.discard(&file).await;
    }
    Ok(())
}

/// Applies a validated formset in one transaction.
pub async fn apply_changes(
    db: &Database,
    storage: &MediaStorage,
    structure_id: &str,
    changes: Vec<RowChange>,
) -> Result<()> {
    let mut tx = db.pool.begin().await?;
    let mut files = Vec::new();

    for change in changes {
        match change {
            RowChange::Create { title, description } => {
                insert(&mut tx, structure_id, &title, &description, None).await?;
            }
            RowChange::Update {
                id,
                title,
                description,
            } => {
                sqlx::query(
                    "UPDATE contents SET title = ?, description = ? WHERE id = ? AND structure_id = ?",
                )
                .bind(&title)
                .bind(&description)
                .bind(&id)
                .bind(structure_id)
                .execute(&mut *tx)
                .await?;
            }
            RowChange::Delete { id } => {
                files.extend(remove(&mut tx, &id).await?);
            }
        }
    }

    tx.commit().await?;

    for file in files {
        storage.discard(&file).await;
    }
    Ok(())
}

/// Sets orders on contents owned by `owner_id`; other ids are skipped.
/// Returns how many rows changed.
pub async fn reorder(pool: &SqlitePool, owner_id: &str, orders: &HashMap<String, i64>) -> Result<u64> {
    let mut updated = 0;
    for (id, order) in orders {
        if !(0..=MAX_ORDER).contains(order) {
            tracing::debug!(content_id = %id, order, "skipping out-of-range order");
            continue;
        }
        let result = sqlx::query(
            r#"
            UPDATE contents SET position = ?
            WHERE id = ? AND structure_id IN (SELECT id FROM structures WHERE owner_id = ?)
            "#,
        )
        .bind(order)
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;
        updated += result.rows_affected();
    }
    Ok(updated)
}
