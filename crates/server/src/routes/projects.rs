use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::models::Project,
    error::Result,
    forms::{
        self, add_error,
        project::{ProjectForm, ProjectFormData},
    },
    middleware::auth::AuthUser,
    services::permissions::{self, Permission},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_projects))
}

/// Write side, mounted behind the auth middleware at the same path.
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/", post(create_project))
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<Project>,
}

async fn list_projects(State(state): State<AppState>) -> Result<Json<ProjectListResponse>> {
    let projects = sqlx::query_as::<_, Project>(
        "SELECT id, title, dev_roles, lang_pref, slug FROM projects ORDER BY title",
    )
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(ProjectListResponse { projects }))
}

async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<ProjectFormData>,
) -> Result<Response> {
    permissions::require(&state.db.pool, &user.id, Permission::AddProject).await?;

    let data = body.normalized();
    let mut errors = data.validate();
    if !errors.contains_key("slug") {
        let taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM projects WHERE slug = ?")
            .bind(&data.slug)
            .fetch_one(&state.db.pool)
            .await?;
        if taken > 0 {
            add_error(&mut errors, "slug", "Project with this slug already exists.");
        }
    }
    if !errors.is_empty() {
        return Ok(forms::rejected(ProjectForm { data, errors }));
    }

    let project = Project {
        id: Uuid::new_v4().to_string(),
        title: data.title,
        dev_roles: data.dev_roles,
        lang_pref: data.lang_pref,
        slug: data.slug,
    };

    sqlx::query("INSERT INTO projects (id, title, dev_roles, lang_pref, slug) VALUES (?, ?, ?, ?, ?)")
        .bind(&project.id)
        .bind(&project.title)
        .bind(&project.dev_roles)
        .bind(&project.lang_pref)
        .bind(&project.slug)
        .execute(&state.db.pool)
        .await?;

    tracing::info!(project_id = %project.id, slug = %project.slug, "created project");

    Ok((StatusCode::CREATED, Json(project)).into_response())
}
