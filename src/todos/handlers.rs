use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::{
    auth::extractors::AuthUser,
    db::DbConn,
    error::ApiError,
    extract::{TodoId, ValidJson},
    state::AppState,
};

use super::{
    dto::{NewTodo, TodoPatch},
    repo,
    repo_types::Todo,
};

pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/todos/", get(list_todos).post(create_todo))
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/:id", put(update_todo).delete(delete_todo))
}

// AuthUser runs first and the connection is taken last, so bad tokens and
// bad payloads never wait on the pool.

#[instrument(skip_all, fields(user = %user))]
pub async fn list_todos(
    AuthUser(user): AuthUser,
    State(db): State<SqlitePool>,
) -> Result<Json<Vec<Todo>>, ApiError> {
    let mut conn = DbConn::acquire(&db).await?;
    let todos = repo::list(&mut conn).await?;
    Ok(Json(todos))
}

#[instrument(skip_all, fields(user = %user))]
pub async fn create_todo(
    AuthUser(user): AuthUser,
    State(db): State<SqlitePool>,
    ValidJson(body): ValidJson<NewTodo>,
) -> Result<Json<Todo>, ApiError> {
    let mut conn = DbConn::acquire(&db).await?;
    let todo = repo::insert(&mut conn, body).await?;
    info!(id = todo.id, "todo created");
    Ok(Json(todo))
}

#[instrument(skip_all, fields(user = %user, id = id))]
pub async fn update_todo(
    AuthUser(user): AuthUser,
    State(db): State<SqlitePool>,
    TodoId(id): TodoId,
    ValidJson(patch): ValidJson<TodoPatch>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let mut conn = DbConn::acquire(&db).await?;
    let todo = repo::update(&mut conn, id, patch)
        .await?
        .ok_or(ApiError::NotFound(id))?;
    info!(id, "todo updated");
    Ok((StatusCode::CREATED, Json(todo)))
}

#[instrument(skip_all, fields(user = %user, id = id))]
pub async fn delete_todo(
    AuthUser(user): AuthUser,
    State(db): State<SqlitePool>,
    TodoId(id): TodoId,
) -> Result<StatusCode, ApiError> {
    let mut conn = DbConn::acquire(&db).await?;
    if !repo::delete(&mut conn, id).await? {
        return Err(ApiError::NotFound(id));
    }
    info!(id, "todo deleted");
    Ok(StatusCode::NO_CONTENT)
}
