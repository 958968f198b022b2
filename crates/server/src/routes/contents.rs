use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{
    db::models::{Content, DiverseContent, Item, ItemKind},
    error::{AppError, Result},
    forms::{
        self,
        item::{ItemForm, ItemFormData, Upload},
    },
    middleware::auth::AuthUser,
    services::{
        contents::{self, owned_content},
        items,
    },
    AppState,
};

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/content/order/", post(reorder))
        .route("/content/:content_id/", get(content_detail))
        .route("/content/:content_id/delete/", post(delete_content))
        .route(
            "/content/:content_id/project/:kind/create/",
            get(new_item_form).post(create_item),
        )
        .route(
            "/content/:content_id/project/:kind/:item_id/",
            get(edit_item_form).post(update_item),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[derive(Debug, Serialize)]
pub struct AttachedItem {
    pub association: DiverseContent,
    pub item: Item,
}

#[derive(Debug, Serialize)]
pub struct ContentDetail {
    pub content: Content,
    pub items: Vec<AttachedItem>,
}

#[derive(Debug, Serialize)]
pub struct ItemFormResponse {
    pub form: ItemForm,
    pub object: Option<Item>,
}

#[derive(Debug, Serialize)]
pub struct SavedItemResponse {
    pub item: Item,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub association: Option<DiverseContent>,
}

#[derive(Debug, Serialize)]
pub struct ContentDeletedResponse {
    pub deleted: String,
    pub structure_id: String,
}

/// Path segment naming a model, checked against the known item kinds.
fn item_kind(tag: &str) -> Result<ItemKind> {
    ItemKind::from_tag(tag).ok_or_else(|| AppError::NotFound(format!("Unknown item type '{tag}'")))
}

/// Resolves the target of an item form: owned content, a known kind and,
/// when editing, an item the caller owns.
async fn resolve_target(
    state: &AppState,
    user: &AuthUser,
    content_id: &str,
    tag: &str,
    item_id: Option<&str>,
) -> Result<(Content, ItemKind, Option<Item>)> {
    let content = owned_content(&state.db.pool, content_id, &user.id).await?;
    let kind = item_kind(tag)?;

    let item = match item_id {
        Some(id) => Some(
            items::fetch_owned(&state.db.pool, kind, id, &user.id)
                .await?
                .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?,
        ),
        None => None,
    };

    Ok((content, kind, item))
}

async fn read_form(mut multipart: Multipart) -> Result<ItemFormData> {
    let mut data = ItemFormData::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {e}")))?;
                // Browsers send a part with an empty file name when no file was chosen.
                if name == "file" && !file_name.is_empty() {
                    data.upload = Some(Upload {
                        file_name,
                        data: bytes.to_vec(),
                    });
                }
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read field: {e}")))?;
                data.fields.insert(name, text);
            }
        }
    }

    Ok(data)
}

async fn content_detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(content_id): Path<String>,
) -> Result<Json<ContentDetail>> {
    let content = owned_content(&state.db.pool, &content_id, &user.id).await?;

    let mut attached = Vec::new();
    for association in items::associations(&state.db.pool, &content.id).await? {
        match items::fetch(&state.db.pool, association.item_kind, &association.item_id).await? {
            Some(item) => attached.push(AttachedItem { association, item }),
            None => tracing::warn!(
                association_id = %association.id,
                "association points at a missing item"
            ),
        }
    }

    Ok(Json(ContentDetail {
        content,
        items: attached,
    }))
}

async fn new_item_form(
    State(state): State<AppState>,
    user: AuthUser,
    Path((content_id, tag)): Path<(String, String)>,
) -> Result<Json<ItemFormResponse>> {
    let (_, kind, _) = resolve_target(&state, &user, &content_id, &tag, None).await?;

    Ok(Json(ItemFormResponse {
        form: ItemForm::unbound(kind, None),
        object: None,
    }))
}

async fn edit_item_form(
    State(state): State<AppState>,
    user: AuthUser,
    Path((content_id, tag, item_id)): Path<(String, String, String)>,
) -> Result<Json<ItemFormResponse>> {
    let (_, kind, item) = resolve_target(&state, &user, &content_id, &tag, Some(&item_id)).await?;

    Ok(Json(ItemFormResponse {
        form: ItemForm::unbound(kind, item.as_ref()),
        object: item,
    }))
}

async fn create_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((content_id, tag)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<Response> {
    let (content, kind, _) = resolve_target(&state, &user, &content_id, &tag, None).await?;
    save_item(&state, &user, &content, kind, None, multipart).await
}

async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((content_id, tag, item_id)): Path<(String, String, String)>,
    multipart: Multipart,
) -> Result<Response> {
    let (content, kind, item) =
        resolve_target(&state, &user, &content_id, &tag, Some(&item_id)).await?;
    save_item(&state, &user, &content, kind, item, multipart).await
}

async fn save_item(
    state: &AppState,
    user: &AuthUser,
    content: &Content,
    kind: ItemKind,
    existing: Option<Item>,
    multipart: Multipart,
) -> Result<Response> {
    let data = read_form(multipart).await?;

    let cleaned = match ItemForm::bind(kind, existing.as_ref(), data) {
        Ok(cleaned) => cleaned,
        Err(form) => {
            return Ok(forms::rejected(ItemFormResponse {
                form,
                object: existing,
            }))
        }
    };

    let saved = items::save(
        &state.db,
        &state.storage,
        &user.id,
        &content.id,
        kind,
        existing.as_ref(),
        cleaned,
    )
    .await?;

    let status = if existing.is_some() {
        StatusCode::OK
    } else {
        tracing::info!(
            content_id = %content.id,
            kind = %kind,
            item_id = %saved.item.base.id,
            "attached new item"
        );
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(SavedItemResponse {
            item: saved.item,
            association: saved.association,
        }),
    )
        .into_response())
}

async fn delete_content(
    State(state): State<AppState>,
    user: AuthUser,
    Path(content_id): Path<String>,
) -> Result<Json<ContentDeletedResponse>> {
    let content = owned_content(&state.db.pool, &content_id, &user.id).await?;
    contents::delete(&state.db, &state.storage, &content.id).await?;

    Ok(Json(ContentDeletedResponse {
        deleted: content.id,
        structure_id: content.structure_id,
    }))
}

/// Accepts `{ content_id: order }`. Ids the caller does not own are ignored
/// and the acknowledgment is the same either way.
async fn reorder(
    State(state): State<AppState>,
    user: AuthUser,
    payload: std::result::Result<Json<HashMap<String, i64>>, JsonRejection>,
) -> Result<Json<serde_json::Value>> {
    let Json(orders) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let updated = contents::reorder(&state.db.pool, &user.id, &orders).await?;
    tracing::debug!(requested = orders.len(), updated, "reordered contents");

    Ok(Json(serde_json::json!({ "saved": "OK" })))
}
