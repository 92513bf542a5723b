use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::not_blank;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    Owner,
    Member,
}

impl WorkspaceRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "owner" => Some(Self::Owner),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Member => "member",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// One row of GET /api/workspaces
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WorkspaceSummary {
    pub id: Uuid,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkspaceRequest {
    #[validate(
        length(min = 1, max = 100, message = "Workspace name required"),
        custom = "not_blank"
    )]
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceCreatedResponse {
    #[serde(flatten)]
    pub workspace: Workspace,
    pub invite_codes: Vec<InviteCode>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MemberRow {
    pub id: Uuid,
    pub role: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MemberUser {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub id: Uuid,
    pub role: String,
    pub user: MemberUser,
}

impl From<MemberRow> for MemberResponse {
    fn from(row: MemberRow) -> Self {
        Self {
            id: row.id,
            role: row.role,
            user: MemberUser {
                id: row.user_id,
                name: row.user_name,
                email: row.user_email,
            },
        }
    }
}

/// Recent completion inside a workspace, newest first.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub goal_id: Uuid,
    pub goal_title: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InviteCode {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub code: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl InviteCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// POST /api/invite-codes
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteRequest {
    pub workspace_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

/// POST /api/invite-codes/join
#[derive(Debug, Deserialize, Validate)]
pub struct JoinWorkspaceRequest {
    #[validate(length(min = 6, max = 32, message = "Invite code must be at least 6 characters"))]
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinWorkspaceResponse {
    pub success: bool,
    pub workspace_id: Uuid,
    pub role: WorkspaceRole,
}
