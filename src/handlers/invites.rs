use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::handlers::access::require_owner;
use crate::handlers::ws::{publish, RealtimeEvent};
use crate::models::workspace::{
    CreateInviteRequest, InviteCode, JoinWorkspaceRequest, JoinWorkspaceResponse, WorkspaceRole,
};
use crate::AppState;

const INVITE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const INVITE_CODE_LEN: usize = 8;
const MAX_CODE_ATTEMPTS: usize = 5;

pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_ALPHABET[rng.gen_range(0..INVITE_ALPHABET.len())] as char)
        .collect()
}

/// Inserts a fresh code, drawing again on the rare collision.
pub async fn insert_invite_code(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    expires_at: Option<DateTime<Utc>>,
) -> AppResult<InviteCode> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let invite = sqlx::query_as::<_, InviteCode>(
            r#"
            INSERT INTO invite_codes (id, workspace_id, code, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(workspace_id)
        .bind(generate_invite_code())
        .bind(expires_at)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(invite) = invite {
            return Ok(invite);
        }
    }

    Err(AppError::Internal(anyhow::anyhow!(
        "Could not allocate a unique invite code after {} attempts",
        MAX_CODE_ATTEMPTS
    )))
}

pub async fn create_invite(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateInviteRequest>,
) -> AppResult<(StatusCode, Json<InviteCode>)> {
    require_owner(&state.db, body.workspace_id, auth_user.id).await?;

    if body.expires_at.is_some_and(|exp| exp <= Utc::now()) {
        return Err(AppError::Validation("expiresAt must be in the future".into()));
    }

    let mut conn = state.db.acquire().await?;
    let invite = insert_invite_code(&mut conn, body.workspace_id, body.expires_at).await?;

    tracing::info!(
        user_id = %auth_user.id,
        workspace_id = %body.workspace_id,
        "Invite code issued"
    );

    Ok((StatusCode::CREATED, Json(invite)))
}

pub async fn join_workspace(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<JoinWorkspaceRequest>,
) -> AppResult<Json<JoinWorkspaceResponse>> {
    body.validate()?;
    let code = body.code.trim().to_uppercase();

    let invite = sqlx::query_as::<_, InviteCode>("SELECT * FROM invite_codes WHERE code = $1")
        .bind(&code)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound("Invalid invite".into()))?;

    if invite.is_expired(Utc::now()) {
        return Err(AppError::BadRequest("Invite expired".into()));
    }

    // Existing members, owners included, keep their role
    let role = sqlx::query_scalar::<_, String>(
        r#"
        INSERT INTO workspace_members (id, workspace_id, user_id, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (workspace_id, user_id) DO UPDATE SET role = workspace_members.role
        RETURNING role
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(invite.workspace_id)
    .bind(auth_user.id)
    .bind(WorkspaceRole::Member.as_str())
    .fetch_one(&state.db)
    .await?;

    tracing::info!(user_id = %auth_user.id, workspace_id = %invite.workspace_id, "Joined workspace");
    publish(&state, &RealtimeEvent::joined(auth_user.id, invite.workspace_id));

    Ok(Json(JoinWorkspaceResponse {
        success: true,
        workspace_id: invite.workspace_id,
        role: WorkspaceRole::parse(&role).unwrap_or(WorkspaceRole::Member),
    }))
}

/// Hourly purge of invite codes that expired more than a day ago.
pub fn spawn_invite_cleanup_worker(db: sqlx::PgPool) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match purge_expired_invites(&db).await {
                Ok(count) if count > 0 => {
                    tracing::info!(purged = count, "Invite cleanup: purged expired codes");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Invite cleanup worker error");
                }
            }
        }
    });
}

async fn purge_expired_invites(db: &sqlx::PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM invite_codes WHERE expires_at IS NOT NULL AND expires_at < NOW() - INTERVAL '1 day'",
    )
    .execute(db)
    .await?;

    Ok(result.rows_affected())
}
