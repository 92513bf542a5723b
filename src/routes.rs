use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::config::Config;
use crate::handlers;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    // Invite redemption is rate limited per IP before auth runs
    let invite_join_routes = Router::new()
        .route("/api/invite-codes/join", post(handlers::invites::join_workspace))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_invites,
        ));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .route("/ws", get(handlers::ws::ws_handler));

    let protected_routes = Router::new()
        // Goals
        .route(
            "/api/goals",
            get(handlers::goals::list_goals).post(handlers::goals::create_goal),
        )
        .route("/api/goals/:id", delete(handlers::goals::delete_goal))
        .route("/api/goals/:id/streak", get(handlers::goals::get_streak))
        .route("/api/goals/:id/schedule", get(handlers::goals::get_schedule))
        // Completions
        .route(
            "/api/goals/:id/complete",
            post(handlers::completions::complete_goal)
                .delete(handlers::completions::uncomplete_goal),
        )
        // Tasks
        .route(
            "/api/tasks",
            get(handlers::tasks::list_tasks).post(handlers::tasks::create_task),
        )
        .route(
            "/api/tasks/:id",
            patch(handlers::tasks::update_task).delete(handlers::tasks::delete_task),
        )
        // Workspaces
        .route(
            "/api/workspaces",
            get(handlers::workspaces::list_workspaces).post(handlers::workspaces::create_workspace),
        )
        .route(
            "/api/workspaces/:id/goals",
            get(handlers::workspaces::list_workspace_goals),
        )
        .route(
            "/api/workspaces/:id/members",
            get(handlers::workspaces::list_members),
        )
        .route("/api/workspaces/:id/feed", get(handlers::workspaces::get_feed))
        .route("/api/invite-codes", post(handlers::invites::create_invite))
        // Dashboard & preferences
        .route("/api/dashboard/stats", get(handlers::dashboard::get_stats))
        .route("/api/theme", post(handlers::theme::update_theme))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let cors = cors_layer(&state.config);

    Router::new()
        .merge(public_routes)
        .merge(invite_join_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = std::iter::once(&config.frontend_url)
        .chain(config.cors_extra_origins.iter())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(hv) => Some(hv),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::rate_limit::RateLimitState;

    fn test_state() -> AppState {
        let config = Config::for_tests();
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("lazy pool");
        AppState {
            db,
            config: Arc::new(config),
            ws_tx: None,
            rate_limiter: RateLimitState::default(),
        }
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = build_router(test_state());
        let res = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "streakify-api");
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        for uri in ["/api/goals", "/api/tasks", "/api/workspaces", "/api/dashboard/stats"] {
            let app = build_router(test_state());
            let res = app
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected() {
        let app = build_router(test_state());
        let res = app
            .oneshot(
                Request::get("/api/goals")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], 401);
    }
}
