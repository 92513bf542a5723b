use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::jwt::verify_token;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
}

pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AppError::Unauthorized)?;

    let claims = verify_token(token, &state.config)?.claims;

    let auth_user = AuthUser {
        id: claims.sub,
        email: claims.email.filter(|e| !e.is_empty()),
        name: claims.name.filter(|n| !n.is_empty()),
    };

    ensure_user_row(&state.db, &auth_user).await?;

    req.extensions_mut().insert(auth_user);
    Ok(next.run(req).await)
}

/// Creates the row on first sight; later requests only write when the claims
/// carry a changed email or name.
const PROVISION_USER_SQL: &str = r#"
    INSERT INTO users (id, email, name)
    VALUES ($1, $2, COALESCE($3, ''))
    ON CONFLICT (id) DO UPDATE SET
        email = COALESCE(EXCLUDED.email, users.email),
        name = CASE WHEN $3 IS NULL THEN users.name ELSE EXCLUDED.name END
    WHERE (EXCLUDED.email IS NOT NULL AND users.email IS DISTINCT FROM EXCLUDED.email)
       OR ($3 IS NOT NULL AND users.name IS DISTINCT FROM EXCLUDED.name)
"#;

/// The identity provider owns accounts; a local row exists so that foreign
/// keys and profile fields have a home.
async fn ensure_user_row(db: &sqlx::PgPool, user: &AuthUser) -> Result<(), AppError> {
    let result = sqlx::query(PROVISION_USER_SQL)
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .execute(db)
        .await?;

    if result.rows_affected() > 0 {
        tracing::debug!(user_id = %user.id, "User row provisioned or refreshed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[test]
    fn test_provisioning_skips_unchanged_rows() {
        let guard = PROVISION_USER_SQL
            .split("WHERE")
            .nth(1)
            .expect("conflict update is guarded");
        assert!(guard.contains("users.email IS DISTINCT FROM EXCLUDED.email"));
        assert!(guard.contains("users.name IS DISTINCT FROM EXCLUDED.name"));
    }
}
