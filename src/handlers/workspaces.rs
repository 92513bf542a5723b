use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{Duration, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::handlers::access::require_member;
use crate::handlers::invites::insert_invite_code;
use crate::handlers::ws::{publish, RealtimeEvent};
use crate::models::goal::{Goal, GoalResponse};
use crate::models::workspace::{
    CreateWorkspaceRequest, FeedEntry, MemberResponse, MemberRow, Workspace,
    WorkspaceCreatedResponse, WorkspaceRole, WorkspaceSummary,
};
use crate::AppState;

const FEED_LIMIT: i64 = 50;

pub async fn list_workspaces(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<WorkspaceSummary>>> {
    let workspaces = sqlx::query_as::<_, WorkspaceSummary>(
        r#"
        SELECT w.id, w.name, m.role
        FROM workspace_members m
        JOIN workspaces w ON w.id = m.workspace_id
        WHERE m.user_id = $1
        ORDER BY m.joined_at ASC
        "#,
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(workspaces))
}

/// Creates the workspace, the owner's membership and a first invite code in
/// one transaction.
pub async fn create_workspace(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateWorkspaceRequest>,
) -> AppResult<(StatusCode, Json<WorkspaceCreatedResponse>)> {
    body.validate()?;

    let mut tx = state.db.begin().await?;

    let workspace = sqlx::query_as::<_, Workspace>(
        r#"
        INSERT INTO workspaces (id, name, owner_id)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(body.name.trim())
    .bind(auth_user.id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO workspace_members (id, workspace_id, user_id, role) VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(workspace.id)
    .bind(auth_user.id)
    .bind(WorkspaceRole::Owner.as_str())
    .execute(&mut *tx)
    .await?;

    let expires_at = Utc::now() + Duration::days(state.config.invite_ttl_days);
    let invite = insert_invite_code(&mut *tx, workspace.id, Some(expires_at)).await?;

    tx.commit().await?;

    tracing::info!(user_id = %auth_user.id, workspace_id = %workspace.id, "Workspace created");
    publish(&state, &RealtimeEvent::joined(auth_user.id, workspace.id));

    Ok((
        StatusCode::CREATED,
        Json(WorkspaceCreatedResponse {
            workspace,
            invite_codes: vec![invite],
        }),
    ))
}

pub async fn list_workspace_goals(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<GoalResponse>>> {
    require_member(&state.db, workspace_id, auth_user.id).await?;

    let goals = sqlx::query_as::<_, Goal>(
        "SELECT * FROM goals WHERE workspace_id = $1 ORDER BY created_at DESC",
    )
    .bind(workspace_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(goals.into_iter().map(GoalResponse::from).collect()))
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<MemberResponse>>> {
    require_member(&state.db, workspace_id, auth_user.id).await?;

    let members = sqlx::query_as::<_, MemberRow>(
        r#"
        SELECT m.id, m.role, u.id AS user_id, u.name AS user_name, u.email AS user_email
        FROM workspace_members m
        JOIN users u ON u.id = m.user_id
        WHERE m.workspace_id = $1
        ORDER BY m.joined_at ASC
        "#,
    )
    .bind(workspace_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(members.into_iter().map(MemberResponse::from).collect()))
}

pub async fn get_feed(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<FeedEntry>>> {
    require_member(&state.db, workspace_id, auth_user.id).await?;

    let feed = sqlx::query_as::<_, FeedEntry>(
        r#"
        SELECT g.id AS goal_id, g.title AS goal_title, u.id AS user_id, u.name AS user_name,
               c.date, c.created_at
        FROM goal_completions c
        JOIN goals g ON g.id = c.goal_id
        JOIN users u ON u.id = c.user_id
        WHERE g.workspace_id = $1
        ORDER BY c.created_at DESC
        LIMIT $2
        "#,
    )
    .bind(workspace_id)
    .bind(FEED_LIMIT)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(feed))
}
