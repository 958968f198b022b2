// Persistence for polymorphic items and the association rows that attach them
// to content slots.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    db::{
        models::{DiverseContent, Item, ItemBase, ItemKind, ItemPayload},
        ordering::{assign_order, OrderScope},
        Database,
    },
    error::{AppError, Result},
    forms::item::{CleanedItem, CleanedPayload},
    services::storage::MediaStorage,
};

type ItemRow = (String, String, String, DateTime<Utc>, DateTime<Utc>, String);

fn select_sql(kind: ItemKind) -> String {
    format!(
        "SELECT id, owner_id, title, created_at, updated_at, {} FROM {} WHERE id = ?",
        kind.payload_field(),
        kind.table()
    )
}

fn item_from_row(kind: ItemKind, row: ItemRow) -> Item {
    let (id, owner_id, title, created_at, updated_at, payload) = row;
    Item {
        base: ItemBase {
            id,
            owner_id,
            title,
            created_at,
            updated_at,
        },
        payload: ItemPayload::from_column(kind, payload),
    }
}

pub async fn fetch(pool: &SqlitePool, kind: ItemKind, id: &str) -> Result<Option<Item>> {
    let row = sqlx::query_as::<_, ItemRow>(&select_sql(kind))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| item_from_row(kind, row)))
}

/// The item, if it exists and belongs to `owner_id`.
pub async fn fetch_owned(
    pool: &SqlitePool,
    kind: ItemKind,
    id: &str,
    owner_id: &str,
) -> Result<Option<Item>> {
    Ok(fetch(pool, kind, id)
        .await?
        .filter(|item| item.base.owner_id == owner_id))
}

pub async fn associations(pool: &SqlitePool, content_id: &str) -> Result<Vec<DiverseContent>> {
    let rows = sqlx::query_as::<_, DiverseContent>(
        "SELECT id, content_id, item_kind, item_id, position FROM diverse_contents WHERE content_id = ? ORDER BY position",
    )
    .bind(content_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[derive(Debug)]
pub struct SavedItem {
    pub item: Item,
    /// Set when this save created the association for a new item.
    pub association: Option<DiverseContent>,
}

/// Creates a new item attached to `content_id`, or updates `existing`.
///
/// Uploads are written before the transaction and removed again if it fails.
pub async fn save(
    db: &Database,
    storage: &MediaStorage,
    owner_id: &str,
    content_id: &str,
    kind: ItemKind,
    existing: Option<&Item>,
    cleaned: CleanedItem,
) -> Result<SavedItem> {
    let stored = match (&cleaned.payload, kind.upload_dir()) {
        (CleanedPayload::Upload(upload), Some(dir)) => {
            Some(storage.save(dir, &upload.file_name, &upload.data).await?)
        }
        _ => None,
    };

    let payload = cleaned
        .payload
        .into_payload(kind, stored.clone(), existing.map(|item| &item.payload))
        .ok_or_else(|| AppError::Internal(format!("No payload for {kind} item")))?;

    let result = write(db, owner_id, content_id, existing, cleaned.title, payload).await;

    match (&result, &stored) {
        (Err(_), Some(path)) => storage.discard(path).await,
        (Ok(saved), Some(_)) => {
            // A new upload replaced the previous file.
            if let Some(previous) = existing.and_then(|item| item.payload.stored_file()) {
                if saved.item.payload.stored_file() != Some(previous) {
                    storage.discard(previous).await;
                }
            }
        }
        _ => {}
    }

    result
}

async fn write(
    db: &Database,
    owner_id: &str,
    content_id: &str,
    existing: Option<&Item>,
    title: String,
    payload: ItemPayload,
) -> Result<SavedItem> {
    let kind = payload.kind();
    let now = Utc::now();
    let mut tx = db.pool.begin().await?;

    let saved = match existing {
        Some(item) => {
            let sql = format!(
                "UPDATE {} SET title = ?, {} = ?, updated_at = ? WHERE id = ? AND owner_id = ?",
                kind.table(),
                kind.payload_field()
            );
            sqlx::query(&sql)
                .bind(&title)
                .bind(payload.column_value())
                .bind(now.to_rfc3339())
                .bind(&item.base.id)
                .bind(owner_id)
                .execute(&mut *tx)
                .await?;

            SavedItem {
                item: Item {
                    base: ItemBase {
                        title,
                        updated_at: now,
                        ..item.base.clone()
                    },
                    payload,
                },
                association: None,
            }
        }
        None => {
            let attached = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM diverse_contents WHERE content_id = ?",
            )
            .bind(content_id)
            .fetch_one(&mut *tx)
            .await?;
            if attached > 0 {
                return Err(AppError::Validation(
                    "This content already has an item".to_string(),
                ));
            }

            let item_id = Uuid::new_v4().to_string();
            let sql = format!(
                "INSERT INTO {} (id, owner_id, title, created_at, updated_at, {}) VALUES (?, ?, ?, ?, ?, ?)",
                kind.table(),
                kind.payload_field()
            );
            sqlx::query(&sql)
                .bind(&item_id)
                .bind(owner_id)
                .bind(&title)
                .bind(now.to_rfc3339())
                .bind(now.to_rfc3339())
                .bind(payload.column_value())
                .execute(&mut *tx)
                .await?;

            let association = attach(&mut tx, content_id, kind, &item_id).await?;

            SavedItem {
                item: Item {
                    base: ItemBase {
                        id: item_id,
                        owner_id: owner_id.to_string(),
                        title,
                        created_at: now,
                        updated_at: now,
                    },
                    payload,
                },
                association: Some(association),
            }
        }
    };

    tx.commit().await?;
    Ok(saved)
}

async fn attach(
    conn: &mut SqliteConnection,
    content_id: &str,
    kind: ItemKind,
    item_id: &str,
) -> Result<DiverseContent> {
    let order = assign_order(conn, OrderScope::Content(content_id), None).await?;
    let association = DiverseContent {
        id: Uuid::new_v4().to_string(),
        content_id: content_id.to_string(),
        item_kind: kind,
        item_id: item_id.to_string(),
        order,
    };

    sqlx::query(
        "INSERT INTO diverse_contents (id, content_id, item_kind, item_id, position) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&association.id)
    .bind(&association.content_id)
    .bind(association.item_kind)
    .bind(&association.item_id)
    .bind(association.order)
    .execute(&mut *conn)
    .await?;

    Ok(association)
}

/// Deletes the items referenced by `associations` and returns their stored
/// files, to be removed once the surrounding transaction commits.
pub async fn purge(
    conn: &mut SqliteConnection,
    associations: &[(ItemKind, String)],
) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for (kind, item_id) in associations {
        let sql = format!("DELETE FROM {} WHERE id = ? RETURNING {}", kind.table(), kind.payload_field());
        let removed = sqlx::query_scalar::<_, String>(&sql)
            .bind(item_id)
            .fetch_optional(&mut *conn)
            .await?;

        if let Some(value) = removed {
            if kind.upload_dir().is_some() {
                files.push(value);
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{seed_content, seed_structure, seed_user, test_database};
    use crate::forms::item::Upload;

    fn text(title: &str, content: &str) -> CleanedItem {
        CleanedItem {
            title: title.into(),
            payload: CleanedPayload::Text(content.into()),
        }
    }

    async fn association_count(db: &Database, content_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM diverse_contents WHERE content_id = ?")
            .bind(content_id)
            .fetch_one(&db.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn first_save_attaches_and_update_does_not() {
        let (db, dir) = test_database().await;
        let storage = MediaStorage::new(dir.path().join("media"));
        let owner = seed_user(&db, "alice").await;
        let structure = seed_structure(&db, &owner, "site").await;
        let content = seed_content(&db, &structure, "Intro").await;

        let saved = save(&db, &storage, &owner, &content, ItemKind::Text, None, text("Hello", "World"))
            .await
            .unwrap();
        let association = saved.association.expect("association");
        assert_eq!(association.order, 0);
        assert_eq!(association.item_kind, ItemKind::Text);
        assert_eq!(association_count(&db, &content).await, 1);

        let item = fetch_owned(&db.pool, ItemKind::Text, &saved.item.base.id, &owner)
            .await
            .unwrap()
            .unwrap();
        let updated = save(
            &db,
            &storage,
            &owner,
            &content,
            ItemKind::Text,
            Some(&item),
            text("Hello again", "World!"),
        )
        .await
        .unwrap();
        assert!(updated.association.is_none());
        assert_eq!(association_count(&db, &content).await, 1);

        let reloaded = fetch(&db.pool, ItemKind::Text, &item.base.id).await.unwrap().unwrap();
        assert_eq!(reloaded.base.title, "Hello again");
        assert_eq!(reloaded.payload, ItemPayload::Text { content: "World!".into() });
        assert_eq!(reloaded.base.created_at, item.base.created_at);
    }

    #[tokio::test]
    async fn second_item_for_a_content_is_rejected() {
        let (db, dir) = test_database().await;
        let storage = MediaStorage::new(dir.path().join("media"));
        let owner = seed_user(&db, "alice").await;
        let structure = seed_structure(&db, &owner, "site").await;
        let content = seed_content(&db, &structure, "Intro").await;

        save(&db, &storage, &owner, &content, ItemKind::Text, None, text("a", "b"))
            .await
            .unwrap();
        let err = save(&db, &storage, &owner, &content, ItemKind::Text, None, text("c", "d"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(association_count(&db, &content).await, 1);
    }

    #[tokio::test]
    async fn other_owners_items_are_hidden() {
        let (db, dir) = test_database().await;
        let storage = MediaStorage::new(dir.path().join("media"));
        let owner = seed_user(&db, "alice").await;
        let intruder = seed_user(&db, "mallory").await;
        let structure = seed_structure(&db, &owner, "site").await;
        let content = seed_content(&db, &structure, "Intro").await;

        let saved = save(&db, &storage, &owner, &content, ItemKind::Text, None, text("a", "b"))
            .await
            .unwrap();
        assert!(fetch_owned(&db.pool, ItemKind::Text, &saved.item.base.id, &intruder)
            .await
            .unwrap()
            .is_none());
        // Same id, wrong kind.
        assert!(fetch(&db.pool, ItemKind::Video, &saved.item.base.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replacing_an_upload_removes_the_old_file() {
        let (db, dir) = test_database().await;
        let storage = MediaStorage::new(dir.path().join("media"));
        let owner = seed_user(&db, "alice").await;
        let structure = seed_structure(&db, &owner, "site").await;
        let content = seed_content(&db, &structure, "Gallery").await;

        let upload = |name: &str| CleanedItem {
            title: "Logo".into(),
            payload: CleanedPayload::Upload(Upload {
                file_name: name.into(),
                data: b"bytes".to_vec(),
            }),
        };

        let first = save(&db, &storage, &owner, &content, ItemKind::Image, None, upload("a.png"))
            .await
            .unwrap();
        let first_path = first.item.payload.stored_file().unwrap().to_string();
        assert!(storage.base_path().join(&first_path).exists());

        let second = save(
            &db,
            &storage,
            &owner,
            &content,
            ItemKind::Image,
            Some(&first.item),
            upload("b.png"),
        )
        .await
        .unwrap();
        let second_path = second.item.payload.stored_file().unwrap();

        assert!(!storage.base_path().join(&first_path).exists());
        assert!(storage.base_path().join(second_path).exists());
    }

    #[tokio::test]
    async fn purge_deletes_items_and_reports_files() {
        let (db, dir) = test_database().await;
        let storage = MediaStorage::new(dir.path().join("media"));
        let owner = seed_user(&db, "alice").await;
        let structure = seed_structure(&db, &owner, "site").await;
        let content = seed_content(&db, &structure, "Docs").await;

        let saved = save(
            &db,
            &storage,
            &owner,
            &content,
            ItemKind::File,
            None,
            CleanedItem {
                title: "Spec".into(),
                payload: CleanedPayload::Upload(Upload {
                    file_name: "spec.pdf".into(),
                    data: b"%PDF".to_vec(),
                }),
            },
        )
        .await
        .unwrap();

        let mut conn = db.pool.acquire().await.unwrap();
        let files = purge(&mut conn, &[(ItemKind::File, saved.item.base.id.clone())])
            .await
            .unwrap();
        assert_eq!(files, vec![saved.item.payload.stored_file().unwrap().to_string()]);
        assert!(fetch(&db.pool, ItemKind::File, &saved.item.base.id).await.unwrap().is_none());
    }
}
