// Owner-side management of structures and their content rows.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::models::{Structure, STRUCTURE_COLUMNS},
    error::Result,
    forms::{
        self, add_error,
        module::{ModuleFormSet, ModuleFormSetData},
        structure::{StructureForm, StructureFormData},
        FieldErrors, INVALID_CHOICE,
    },
    middleware::auth::AuthUser,
    services::{
        contents::{self, owned_structure},
        permissions::{self, Permission},
    },
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mine/", get(list_mine))
        .route("/create/", post(create_structure))
        .route("/:id/edit/", get(edit_form).post(update_structure))
        .route("/:id/delete/", post(delete_structure))
        .route("/:id/module/", get(module_formset).post(update_module))
}

#[derive(Debug, Serialize)]
pub struct StructureListResponse {
    pub structures: Vec<Structure>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: String,
}

async fn list_mine(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<StructureListResponse>> {
    permissions::require(&state.db.pool, &user.id, Permission::ViewStructure).await?;

    let sql = format!(
        "SELECT {STRUCTURE_COLUMNS} FROM structures WHERE owner_id = ? ORDER BY created_at DESC"
    );
    let structures = sqlx::query_as::<_, Structure>(&sql)
        .bind(&user.id)
        .fetch_all(&state.db.pool)
        .await?;

    Ok(Json(StructureListResponse { structures }))
}

/// Form checks plus the ones that need the database: the project must exist
/// and the slug must be free (ignoring the structure being edited).
async fn validate_structure(
    state: &AppState,
    data: &StructureFormData,
    editing: Option<&str>,
) -> Result<FieldErrors> {
    let mut errors = data.validate();

    if !data.project.is_empty() {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM projects WHERE id = ?")
            .bind(&data.project)
            .fetch_one(&state.db.pool)
            .await?;
        if exists == 0 {
            add_error(&mut errors, "project", INVALID_CHOICE);
        }
    }

    if !errors.contains_key("slug") {
        let taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM structures WHERE slug = ? AND id != ?",
        )
        .bind(&data.slug)
        .bind(editing.unwrap_or(""))
        .fetch_one(&state.db.pool)
        .await?;
        if taken > 0 {
            add_error(&mut errors, "slug", "Structure with this slug already exists.");
        }
    }

    Ok(errors)
}

async fn create_structure(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<StructureFormData>,
) -> Result<Response> {
    permissions::require(&state.db.pool, &user.id, Permission::AddStructure).await?;

    let data = body.normalized();
    let errors = validate_structure(&state, &data, None).await?;
    if !errors.is_empty() {
        return Ok(forms::rejected(StructureForm { data, errors }));
    }

    let id = Uuid::new_v4().to_string();
    let sql = format!(
        "INSERT INTO structures ({STRUCTURE_COLUMNS}) VALUES ({})",
        vec!["?"; 23].join(", ")
    );

    let mut query = sqlx::query(&sql)
        .bind(&id)
        .bind(&user.id)
        .bind(&data.project)
        .bind(&data.title);
    for (_, value) in data.attributes.fields() {
        query = query.bind(value);
    }
    query
        .bind(&data.slug)
        .bind(&data.overview)
        .bind(Utc::now().to_rfc3339())
        .execute(&state.db.pool)
        .await?;

    tracing::info!(structure_id = %id, owner = %user.username, "created structure");

    let structure = owned_structure(&state.db.pool, &id, &user.id).await?;
    Ok((StatusCode::CREATED, Json(structure)).into_response())
}

async fn edit_form(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<StructureForm>> {
    permissions::require(&state.db.pool, &user.id, Permission::ChangeStructure).await?;
    let structure = owned_structure(&state.db.pool, &id, &user.id).await?;

    Ok(Json(StructureForm {
        data: StructureFormData::from_structure(&structure),
        errors: FieldErrors::new(),
    }))
}

async fn update_structure(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<StructureFormData>,
) -> Result<Response> {
    permissions::require(&state.db.pool, &user.id, Permission::ChangeStructure).await?;
    let structure = owned_structure(&state.db.pool, &id, &user.id).await?;

    let data = body.normalized();
    let errors = validate_structure(&state, &data, Some(&structure.id)).await?;
    if !errors.is_empty() {
        return Ok(forms::rejected(StructureForm { data, errors }));
    }

    let assignments: Vec<String> = data
        .attributes
        .fields()
        .iter()
        .map(|(column, _)| format!("{column} = ?"))
        .collect();
    let sql = format!(
        "UPDATE structures SET project_id = ?, title = ?, {}, slug = ?, overview = ? WHERE id = ? AND owner_id = ?",
        assignments.join(", ")
    );

    let mut query = sqlx::query(&sql).bind(&data.project).bind(&data.title);
    for (_, value) in data.attributes.fields() {
        query = query.bind(value);
    }
    query
        .bind(&data.slug)
        .bind(&data.overview)
        .bind(&structure.id)
        .bind(&user.id)
        .execute(&state.db.pool)
        .await?;

    let structure = owned_structure(&state.db.pool, &structure.id, &user.id).await?;
    Ok(Json(structure).into_response())
}

async fn delete_structure(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>> {
    permissions::require(&state.db.pool, &user.id, Permission::DeleteStructure).await?;
    let structure = owned_structure(&state.db.pool, &id, &user.id).await?;

    contents::delete_structure(&state.db, &state.storage, &structure.id).await?;
    tracing::info!(structure_id = %structure.id, owner = %user.username, "deleted structure");

    Ok(Json(DeletedResponse {
        deleted: structure.id,
    }))
}

async fn module_formset(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ModuleFormSet>> {
    let structure = owned_structure(&state.db.pool, &id, &user.id).await?;
    let existing = contents::list_for_structure(&state.db.pool, &structure.id).await?;

    Ok(Json(ModuleFormSet::unbound(
        &structure.id,
        &existing,
        state.config.module_extra_forms,
    )))
}

async fn update_module(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<ModuleFormSetData>,
) -> Result<Response> {
    let structure = owned_structure(&state.db.pool, &id, &user.id).await?;
    let existing = contents::list_for_structure(&state.db.pool, &structure.id).await?;
    let extra = state.config.module_extra_forms;

    let changes = match ModuleFormSet::bind(&structure.id, &existing, extra, body) {
        Ok(changes) => changes,
        Err(formset) => return Ok(forms::rejected(formset)),
    };

    tracing::debug!(structure_id = %structure.id, changes = changes.len(), "saving content formset");
    contents::apply_changes(&state.db, &state.storage, &structure.id, changes).await?;

    let saved = contents::list_for_structure(&state.db.pool, &structure.id).await?;
    Ok(Json(ModuleFormSet::unbound(&structure.id, &saved, extra)).into_response())
}
