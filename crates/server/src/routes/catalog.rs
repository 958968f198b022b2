// Public, read-only browsing of projects and their structures.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    db::models::{Content, Project, Structure, STRUCTURE_COLUMNS},
    error::{AppError, Result},
    services::contents,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all))
        .route("/project/:project_slug/", get(list_for_project))
        .route("/:id/", get(structure_detail))
}

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ProjectSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub project: Project,
    pub total_structures: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct StructureSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub structure: Structure,
    pub total_contents: i64,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub projects: Vec<ProjectSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
    pub structures: Vec<StructureSummary>,
}

#[derive(Debug, Serialize)]
pub struct StructureDetail {
    pub structure: Structure,
    pub project: Project,
    pub contents: Vec<Content>,
}

/// Escapes LIKE wildcards so the search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

async fn project_summaries(pool: &SqlitePool) -> Result<Vec<ProjectSummary>> {
    let projects = sqlx::query_as::<_, ProjectSummary>(
        r#"
        SELECT p.id, p.title, p.dev_roles, p.lang_pref, p.slug, COUNT(s.id) AS total_structures
        FROM projects p
        LEFT JOIN structures s ON s.project_id = p.id
        GROUP BY p.id
        ORDER BY p.title
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(projects)
}

async fn structure_summaries(
    pool: &SqlitePool,
    project_id: Option<&str>,
    search: Option<&str>,
) -> Result<Vec<StructureSummary>> {
    let sql = format!(
        r#"
        SELECT {STRUCTURE_COLUMNS},
            (SELECT COUNT(*) FROM contents WHERE contents.structure_id = structures.id) AS total_contents
        FROM structures
        WHERE (?1 IS NULL OR project_id = ?1)
          AND (?2 IS NULL OR title LIKE ?2 ESCAPE '\' OR overview LIKE ?2 ESCAPE '\')
        ORDER BY created_at DESC
        "#
    );
    let pattern = search.map(like_pattern);

    let structures = sqlx::query_as::<_, StructureSummary>(&sql)
        .bind(project_id)
        .bind(pattern)
        .fetch_all(pool)
        .await?;
    Ok(structures)
}

fn search_term(query: &CatalogQuery) -> Option<&str> {
    query.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
}

async fn list_all(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<CatalogResponse>> {
    let projects = project_summaries(&state.db.pool).await?;
    let structures = structure_summaries(&state.db.pool, None, search_term(&query)).await?;

    Ok(Json(CatalogResponse {
        projects,
        project: None,
        structures,
    }))
}

async fn find_project(pool: &SqlitePool, slug: &str) -> Result<Project> {
    sqlx::query_as::<_, Project>(
        "SELECT id, title, dev_roles, lang_pref, slug FROM projects WHERE slug = ?",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
}

async fn list_for_project(
    State(state): State<AppState>,
    Path(project_slug): Path<String>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<CatalogResponse>> {
    let project = find_project(&state.db.pool, &project_slug).await?;
    let projects = project_summaries(&state.db.pool).await?;
    let structures =
        structure_summaries(&state.db.pool, Some(&project.id), search_term(&query)).await?;

    Ok(Json(CatalogResponse {
        projects,
        project: Some(project),
        structures,
    }))
}

async fn structure_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<StructureDetail>> {
    let sql = format!("SELECT {STRUCTURE_COLUMNS} FROM structures WHERE slug = ?");
    let structure = sqlx::query_as::<_, Structure>(&sql)
        .bind(&slug)
        .fetch_optional(&state.db.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Structure not found".to_string()))?;

    let project = sqlx::query_as::<_, Project>(
        "SELECT id, title, dev_roles, lang_pref, slug FROM projects WHERE id = ?",
    )
    .bind(&structure.project_id)
    .fetch_one(&state.db.pool)
    .await?;
    let contents = contents::list_for_structure(&state.db.pool, &structure.id).await?;

    Ok(Json(StructureDetail {
        structure,
        project,
        contents,
    }))
}
