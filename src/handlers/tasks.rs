use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::task::{CreateTaskRequest, Task, TaskResponse, UpdateTaskRequest};
use crate::AppState;

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<TaskResponse>>> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<TaskResponse>)> {
    body.validate()?;

    let task = sqlx::query_as::<_, Task>(
        r#"
        INSERT INTO tasks (id, user_id, title, notes, due_date, completed)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(body.title.trim())
    .bind(&body.notes)
    .bind(body.due_date)
    .bind(body.completed.unwrap_or(false))
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(task.into())))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<UpdateTaskRequest>,
) -> AppResult<Json<TaskResponse>> {
    body.validate()?;

    let task = sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks SET
            title = COALESCE($3, title),
            notes = COALESCE($4, notes),
            due_date = COALESCE($5, due_date),
            completed = COALESCE($6, completed)
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(task_id)
    .bind(auth_user.id)
    .bind(body.title.as_deref().map(str::trim))
    .bind(&body.notes)
    .bind(body.due_date)
    .bind(body.completed)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Task not found".into()))?;

    Ok(Json(task.into()))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
        .bind(task_id)
        .bind(auth_user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Task not found".into()));
    }

    Ok(Json(serde_json::json!({ "deleted": true, "id": task_id })))
}
