use std::collections::HashMap;

use axum::{extract::State, Extension, Json};
use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::handlers::access::server_today;
use crate::models::goal::Goal;
use crate::models::user::DashboardStats;
use crate::services::streaks::calculate_streak_with_horizon;
use crate::AppState;

pub async fn get_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<DashboardStats>> {
    let (active_goals, total_tasks, workspaces) = sqlx::query_as::<_, (i64, i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM goals WHERE owner_id = $1),
            (SELECT COUNT(*) FROM tasks WHERE user_id = $1),
            (SELECT COUNT(*) FROM workspace_members WHERE user_id = $1)
        "#,
    )
    .bind(auth_user.id)
    .fetch_one(&state.db)
    .await?;

    let today = server_today();
    let horizon = state.config.streak_horizon_days;

    let goals = sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE owner_id = $1")
        .bind(auth_user.id)
        .fetch_all(&state.db)
        .await?;

    let completions = sqlx::query_as::<_, (Uuid, NaiveDate)>(
        r#"
        SELECT c.goal_id, c.date FROM goal_completions c
        JOIN goals g ON g.id = c.goal_id
        WHERE g.owner_id = $1 AND c.user_id = $1 AND c.date BETWEEN $2 AND $3
        "#,
    )
    .bind(auth_user.id)
    .bind(today - Duration::days(i64::from(horizon)))
    .bind(today)
    .fetch_all(&state.db)
    .await?;

    let mut by_goal: HashMap<Uuid, Vec<NaiveDate>> = HashMap::new();
    for (goal_id, date) in completions {
        by_goal.entry(goal_id).or_default().push(date);
    }

    let current_streak = goals
        .iter()
        .map(|goal| {
            let dates = by_goal.get(&goal.id).map(Vec::as_slice).unwrap_or_default();
            calculate_streak_with_horizon(&goal.schedule(), dates, today, horizon).current
        })
        .max()
        .unwrap_or(0);

    Ok(Json(DashboardStats {
        active_goals,
        total_tasks,
        workspaces,
        current_streak,
    }))
}
