use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::handlers::access::{server_today, visible_goal};
use crate::handlers::goals::streak_for;
use crate::handlers::ws::{publish, RealtimeEvent};
use crate::models::completion::{Completion, CompletionRequest, CompletionResponse};
use crate::AppState;

/// Marks a goal done for a day. Idempotent: a second call for the same day
/// leaves the row alone and answers 200 instead of 201.
pub async fn complete_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(goal_id): Path<Uuid>,
    body: Option<Json<CompletionRequest>>,
) -> AppResult<(StatusCode, Json<CompletionResponse>)> {
    let (goal, _) = visible_goal(&state.db, goal_id, auth_user.id).await?;

    let request = body.map(|Json(b)| b).unwrap_or_default();
    let date = request
        .validate_date(server_today())
        .map_err(AppError::Validation)?;

    let inserted = sqlx::query_as::<_, Completion>(
        r#"
        INSERT INTO goal_completions (id, goal_id, user_id, date)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (goal_id, user_id, date) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(goal.id)
    .bind(auth_user.id)
    .bind(date)
    .fetch_optional(&state.db)
    .await?;

    let streak = streak_for(&state, &goal, auth_user.id).await?;

    if let Some(completion) = &inserted {
        tracing::debug!(
            user_id = %auth_user.id,
            goal_id = %goal.id,
            completion_id = %completion.id,
            %date,
            "Completion recorded"
        );
        publish(&state, &RealtimeEvent::completed(auth_user.id, &goal, date));
    }

    let status = if inserted.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(CompletionResponse {
            goal_id: goal.id,
            date,
            changed: inserted.is_some(),
            streak,
        }),
    ))
}

/// Removes the completion for a day. Answers 200 even when nothing was there.
pub async fn uncomplete_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(goal_id): Path<Uuid>,
    body: Option<Json<CompletionRequest>>,
) -> AppResult<Json<CompletionResponse>> {
    let (goal, _) = visible_goal(&state.db, goal_id, auth_user.id).await?;

    let request = body.map(|Json(b)| b).unwrap_or_default();
    let date = request
        .validate_date(server_today())
        .map_err(AppError::Validation)?;

    let deleted = sqlx::query(
        "DELETE FROM goal_completions WHERE goal_id = $1 AND user_id = $2 AND date = $3",
    )
    .bind(goal.id)
    .bind(auth_user.id)
    .bind(date)
    .execute(&state.db)
    .await?
    .rows_affected()
        > 0;

    let streak = streak_for(&state, &goal, auth_user.id).await?;

    if deleted {
        publish(&state, &RealtimeEvent::uncompleted(auth_user.id, &goal, date));
    }

    Ok(Json(CompletionResponse {
        goal_id: goal.id,
        date,
        changed: deleted,
        streak,
    }))
}
