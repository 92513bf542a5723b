use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::user::ThemeRequest;
use crate::AppState;

pub async fn update_theme(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<ThemeRequest>,
) -> AppResult<Json<Value>> {
    let result = sqlx::query("UPDATE users SET theme = $2 WHERE id = $1")
        .bind(auth_user.id)
        .bind(body.theme.as_str())
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".into()));
    }

    tracing::debug!(user_id = %auth_user.id, theme = body.theme.as_str(), "Theme updated");

    Ok(Json(json!({ "success": true, "theme": body.theme })))
}
