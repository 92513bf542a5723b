use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::not_blank;

#[derive(Debug, Clone, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub notes: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub notes: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(t: Task) -> Self {
        Self {
            id: t.id,
            title: t.title,
            notes: t.notes,
            due_date: t.due_date,
            completed: t.completed,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1-200 characters"),
        custom = "not_blank"
    )]
    pub title: String,

    #[validate(length(max = 1000, message = "Notes must be under 1000 characters"))]
    pub notes: Option<String>,

    pub due_date: Option<NaiveDate>,

    pub completed: Option<bool>,
}

/// PATCH /api/tasks/:id, partial update
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200), custom = "not_blank")]
    pub title: Option<String>,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,

    pub due_date: Option<NaiveDate>,

    pub completed: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_camel_case() {
        let req: CreateTaskRequest =
            serde_json::from_str(r#"{"title":"Groceries","dueDate":"2026-10-20"}"#).unwrap();
        assert_eq!(req.due_date, NaiveDate::from_ymd_opt(2026, 10, 20));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_notes_too_long() {
        let req = CreateTaskRequest {
            title: "x".into(),
            notes: Some("n".repeat(1001)),
            due_date: None,
            completed: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_patch_with_only_completed() {
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"completed":true}"#).unwrap();
        assert_eq!(req.completed, Some(true));
        assert!(req.title.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_whitespace_titles_are_rejected() {
        let req: CreateTaskRequest = serde_json::from_str(r#"{"title":"   "}"#).unwrap();
        assert!(req.validate().is_err());
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"title":"\t "}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
