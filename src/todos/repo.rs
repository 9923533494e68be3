use sqlx::sqlite::SqliteConnection;

use crate::todos::{
    dto::{NewTodo, TodoPatch},
    repo_types::Todo,
};

pub async fn list(conn: &mut SqliteConnection) -> sqlx::Result<Vec<Todo>> {
    sqlx::query_as::<_, Todo>(
        r#"
        SELECT id, title, description, completed
          FROM todos
         ORDER BY id
        "#,
    )
    .fetch_all(conn)
    .await
}

pub async fn find(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Todo>> {
    sqlx::query_as::<_, Todo>(
        r#"
        SELECT id, title, description, completed
          FROM todos
         WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}

pub async fn insert(conn: &mut SqliteConnection, new: NewTodo) -> sqlx::Result<Todo> {
    sqlx::query_as::<_, Todo>(
        r#"
        INSERT INTO todos (title, description, completed)
        VALUES (?, ?, ?)
        RETURNING id, title, description, completed
        "#,
    )
    .bind(new.title)
    .bind(new.description)
    .bind(new.completed)
    .fetch_one(conn)
    .await
}

/// Merges the patch in a single statement so the write lock is taken up
/// front. `None` when no row has `id`.
pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    patch: TodoPatch,
) -> sqlx::Result<Option<Todo>> {
    let changes = patch.into_changes();

    sqlx::query_as::<_, Todo>(
        r#"
        UPDATE todos
           SET title       = CASE WHEN ? THEN ? ELSE title END,
               description = CASE WHEN ? THEN ? ELSE description END,
               completed   = CASE WHEN ? THEN ? ELSE completed END
         WHERE id = ?
        RETURNING id, title, description, completed
        "#,
    )
    .bind(changes.title.is_some())
    .bind(changes.title)
    .bind(changes.description.is_some())
    .bind(changes.description.flatten())
    .bind(changes.completed.is_some())
    .bind(changes.completed)
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Returns `false` when no row has `id`.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM todos WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
