use chrono::{Duration, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::goal::Goal;
use crate::models::workspace::WorkspaceRole;

/// Calendar day the service treats as "today". Completions are stored as
/// plain dates, so streaks are evaluated against the UTC date.
pub fn server_today() -> NaiveDate {
    Utc::now().date_naive()
}

pub async fn workspace_role(
    db: &PgPool,
    workspace_id: Uuid,
    user_id: Uuid,
) -> AppResult<Option<WorkspaceRole>> {
    let role = sqlx::query_scalar::<_, String>(
        "SELECT role FROM workspace_members WHERE workspace_id = $1 AND user_id = $2",
    )
    .bind(workspace_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    Ok(role.as_deref().and_then(WorkspaceRole::parse))
}

pub async fn require_member(db: &PgPool, workspace_id: Uuid, user_id: Uuid) -> AppResult<WorkspaceRole> {
    workspace_role(db, workspace_id, user_id)
        .await?
        .ok_or(AppError::Forbidden)
}

pub async fn require_owner(db: &PgPool, workspace_id: Uuid, user_id: Uuid) -> AppResult<()> {
    match workspace_role(db, workspace_id, user_id).await? {
        Some(WorkspaceRole::Owner) => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

/// Loads a goal the caller may see: their own, or one shared in a workspace
/// they belong to.
pub async fn visible_goal(db: &PgPool, goal_id: Uuid, user_id: Uuid) -> AppResult<(Goal, bool)> {
    let goal = sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE id = $1")
        .bind(goal_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("Goal not found".into()))?;

    let is_owner = goal.owner_id == user_id;
    if !is_owner {
        match goal.workspace_id {
            Some(workspace_id) => {
                require_member(db, workspace_id, user_id).await?;
            }
            None => return Err(AppError::Forbidden),
        }
    }

    Ok((goal, is_owner))
}

/// Completion dates for one user and goal, limited to what the streak walk
/// can see.
pub async fn completion_dates(
    db: &PgPool,
    goal_id: Uuid,
    user_id: Uuid,
    today: NaiveDate,
    horizon_days: u32,
) -> AppResult<Vec<NaiveDate>> {
    let oldest = today - Duration::days(i64::from(horizon_days));
    let dates = sqlx::query_scalar::<_, NaiveDate>(
        r#"
        SELECT date FROM goal_completions
        WHERE goal_id = $1 AND user_id = $2 AND date BETWEEN $3 AND $4
        ORDER BY date DESC
        "#,
    )
    .bind(goal_id)
    .bind(user_id)
    .bind(oldest)
    .bind(today)
    .fetch_all(db)
    .await?;

    Ok(dates)
}
