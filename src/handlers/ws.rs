use std::collections::HashSet;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::jwt::verify_token;
use crate::models::goal::Goal;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

const WORKSPACE_JOINED: &str = "workspace_joined";

/// Broadcast payload. Delivered to the acting user and to members of the
/// event's workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl RealtimeEvent {
    pub fn completed(user_id: Uuid, goal: &Goal, date: NaiveDate) -> Self {
        Self::new("goal_completed", user_id, goal, date)
    }

    pub fn uncompleted(user_id: Uuid, goal: &Goal, date: NaiveDate) -> Self {
        Self::new("goal_uncompleted", user_id, goal, date)
    }

    /// A user became a member (or the owner) of a workspace.
    pub fn joined(user_id: Uuid, workspace_id: Uuid) -> Self {
        Self {
            kind: WORKSPACE_JOINED.to_string(),
            user_id,
            goal_id: None,
            workspace_id: Some(workspace_id),
            date: None,
        }
    }

    fn new(kind: &str, user_id: Uuid, goal: &Goal, date: NaiveDate) -> Self {
        Self {
            kind: kind.to_string(),
            user_id,
            goal_id: Some(goal.id),
            workspace_id: goal.workspace_id,
            date: Some(date),
        }
    }

    /// Folds the connection's own joins into its membership set so events of
    /// a newly joined workspace arrive without reconnecting.
    fn track_membership(&self, user_id: Uuid, workspaces: &mut HashSet<Uuid>) {
        if self.kind == WORKSPACE_JOINED && self.user_id == user_id {
            if let Some(id) = self.workspace_id {
                workspaces.insert(id);
            }
        }
    }

    fn is_visible_to(&self, user_id: Uuid, workspaces: &HashSet<Uuid>) -> bool {
        self.user_id == user_id
            || self
                .workspace_id
                .is_some_and(|id| workspaces.contains(&id))
    }
}

pub fn publish(state: &AppState, event: &RealtimeEvent) {
    let Some(tx) = state.ws_tx.as_ref() else {
        return;
    };
    match serde_json::to_string(event) {
        // No receivers is not an error worth surfacing
        Ok(msg) => {
            let _ = tx.send(msg);
        }
        Err(e) => tracing::warn!(error = %e, "Failed to encode realtime event"),
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    let user_id = match authenticate_ws(&state, query.token.as_deref()) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("WebSocket auth failed: {}", e);
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    let workspaces = match sqlx::query_scalar::<_, Uuid>(
        "SELECT workspace_id FROM workspace_members WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(&state.db)
    .await
    {
        Ok(ids) => ids.into_iter().collect::<HashSet<_>>(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load workspaces for WebSocket");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id, workspaces))
}

fn authenticate_ws(state: &AppState, token: Option<&str>) -> Result<Uuid, &'static str> {
    let token = token.ok_or("Missing token query parameter")?;
    let token_data = verify_token(token, &state.config).map_err(|_| "Invalid or expired token")?;
    Ok(token_data.claims.sub)
}

/// Next broadcast message. A lagging receiver skips what it missed instead of
/// closing the socket; `None` once the channel is gone.
async fn next_message(rx: &mut broadcast::Receiver<String>, user_id: Uuid) -> Option<String> {
    loop {
        match rx.recv().await {
            Ok(msg) => return Some(msg),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(user_id = %user_id, skipped, "WebSocket receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid, mut workspaces: HashSet<Uuid>) {
    let (mut sender, mut receiver) = socket.split();

    let Some(mut rx) = state.ws_tx.as_ref().map(|tx| tx.subscribe()) else {
        tracing::warn!(user_id = %user_id, "WebSocket opened without a broadcast channel");
        return;
    };

    tracing::debug!(user_id = %user_id, workspaces = workspaces.len(), "WebSocket connection established");

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = next_message(&mut rx, user_id).await {
            let Ok(event) = serde_json::from_str::<RealtimeEvent>(&msg) else {
                continue;
            };
            event.track_membership(user_id, &mut workspaces);
            if !event.is_visible_to(user_id, &workspaces) {
                continue;
            }
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames are only read to notice the close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::debug!(user_id = %user_id, "WebSocket connection closed");
}
