use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{Duration, NaiveDate};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::handlers::access::{completion_dates, require_owner, server_today, visible_goal};
use crate::models::goal::{
    CompletionDate, CreateGoalRequest, Goal, GoalResponse, GoalWithProgress, GoalWorkspace,
    ScheduleQuery, ScheduleResponse, StreakQuery,
};
use crate::models::workspace::WorkspaceSummary;
use crate::services::schedule::{is_scheduled_day, next_occurrence, scheduled_dates_between};
use crate::services::streaks::{calculate_streak_with_horizon, StreakResult};
use crate::AppState;

/// Longest window GET /api/goals/:id/schedule will enumerate.
const MAX_SCHEDULE_WINDOW_DAYS: i64 = 366;

pub async fn list_goals(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<GoalWithProgress>>> {
    let memberships = sqlx::query_as::<_, WorkspaceSummary>(
        r#"
        SELECT w.id, w.name, m.role
        FROM workspace_members m
        JOIN workspaces w ON w.id = m.workspace_id
        WHERE m.user_id = $1
        "#,
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    let workspace_ids: Vec<Uuid> = memberships.iter().map(|m| m.id).collect();

    let goals = sqlx::query_as::<_, Goal>(
        r#"
        SELECT * FROM goals
        WHERE owner_id = $1 OR workspace_id = ANY($2)
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth_user.id)
    .bind(&workspace_ids)
    .fetch_all(&state.db)
    .await?;

    let goal_ids: Vec<Uuid> = goals.iter().map(|g| g.id).collect();

    let completions = sqlx::query_as::<_, (Uuid, NaiveDate)>(
        r#"
        SELECT goal_id, date FROM goal_completions
        WHERE user_id = $1 AND goal_id = ANY($2)
        ORDER BY date DESC
        "#,
    )
    .bind(auth_user.id)
    .bind(&goal_ids)
    .fetch_all(&state.db)
    .await?;

    let mut by_goal: HashMap<Uuid, Vec<NaiveDate>> = HashMap::new();
    for (goal_id, date) in completions {
        by_goal.entry(goal_id).or_default().push(date);
    }

    let workspaces: HashMap<Uuid, WorkspaceSummary> =
        memberships.into_iter().map(|m| (m.id, m)).collect();

    let today = server_today();
    let horizon = state.config.streak_horizon_days;

    let payload = goals
        .into_iter()
        .map(|goal| {
            let schedule = goal.schedule();
            let dates = by_goal.remove(&goal.id).unwrap_or_default();
            let streak = calculate_streak_with_horizon(&schedule, &dates, today, horizon);
            let workspace = goal.workspace_id.map(|id| {
                let summary = workspaces.get(&id);
                GoalWorkspace {
                    id,
                    name: summary.map(|w| w.name.clone()),
                    role: summary.map(|w| w.role.clone()),
                }
            });

            GoalWithProgress {
                is_due_today: is_scheduled_day(&schedule, today),
                next_due: next_occurrence(&schedule, today),
                streak,
                workspace,
                completions: dates.into_iter().map(|date| CompletionDate { date }).collect(),
                goal: goal.into(),
            }
        })
        .collect();

    Ok(Json(payload))
}

pub async fn create_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateGoalRequest>,
) -> AppResult<(StatusCode, Json<GoalResponse>)> {
    body.validate()?;
    let schedule = body.validate_schedule().map_err(AppError::Validation)?;

    // Only workspace owners add shared goals
    if let Some(workspace_id) = body.workspace_id {
        require_owner(&state.db, workspace_id, auth_user.id).await?;
    }

    let goal = sqlx::query_as::<_, Goal>(
        r#"
        INSERT INTO goals (id, title, description, schedule_type, schedule_days, workspace_id, owner_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(body.title.trim())
    .bind(&body.description)
    .bind(schedule.schedule_type.as_str())
    .bind(&schedule.schedule_days)
    .bind(body.workspace_id)
    .bind(auth_user.id)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        user_id = %auth_user.id,
        goal_id = %goal.id,
        schedule_type = schedule.schedule_type.as_str(),
        "Goal created"
    );

    Ok((StatusCode::CREATED, Json(goal.into())))
}

pub async fn delete_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(goal_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM goals WHERE id = $1 AND owner_id = $2")
        .bind(goal_id)
        .bind(auth_user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Goal not found".into()));
    }

    Ok(Json(serde_json::json!({ "deleted": true, "id": goal_id })))
}

/// Streak for the caller, or for `userId` when the caller owns the goal.
pub async fn get_streak(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(goal_id): Path<Uuid>,
    Query(query): Query<StreakQuery>,
) -> AppResult<Json<StreakResult>> {
    let (goal, is_owner) = visible_goal(&state.db, goal_id, auth_user.id).await?;

    let target_user = query.user_id.unwrap_or(auth_user.id);
    if !is_owner && target_user != auth_user.id {
        return Err(AppError::Forbidden);
    }

    let streak = streak_for(&state, &goal, target_user).await?;
    Ok(Json(streak))
}

pub async fn get_schedule(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(goal_id): Path<Uuid>,
    Query(query): Query<ScheduleQuery>,
) -> AppResult<Json<ScheduleResponse>> {
    let (goal, _) = visible_goal(&state.db, goal_id, auth_user.id).await?;

    let (start, end) = schedule_window(&query, server_today())?;

    let schedule = goal.schedule();
    let dates = scheduled_dates_between(&schedule, start, end).collect();

    Ok(Json(ScheduleResponse {
        goal_id: goal.id,
        schedule,
        start,
        end,
        dates,
    }))
}

/// Resolves the requested window; a missing `end` means a week from `start`.
fn schedule_window(query: &ScheduleQuery, today: NaiveDate) -> AppResult<(NaiveDate, NaiveDate)> {
    let start = query.start.unwrap_or(today);
    let end = match query.end {
        Some(end) => end,
        None => start
            .checked_add_signed(Duration::days(6))
            .ok_or_else(|| AppError::Validation("start is out of range".into()))?,
    };

    if (end - start).num_days() > MAX_SCHEDULE_WINDOW_DAYS {
        return Err(AppError::Validation(format!(
            "Schedule window must be at most {} days",
            MAX_SCHEDULE_WINDOW_DAYS
        )));
    }

    Ok((start, end))
}

pub(crate) async fn streak_for(state: &AppState, goal: &Goal, user_id: Uuid) -> AppResult<StreakResult> {
    let today = server_today();
    let horizon = state.config.streak_horizon_days;
    let dates = completion_dates(&state.db, goal.id, user_id, today, horizon).await?;
    Ok(calculate_streak_with_horizon(&goal.schedule(), &dates, today, horizon))
}
