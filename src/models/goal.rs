use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::not_blank;
use crate::services::schedule::{Schedule, ScheduleType};
use crate::services::streaks::StreakResult;

#[derive(Debug, Clone, FromRow)]
pub struct Goal {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub schedule_type: String,
    pub schedule_days: Vec<i16>,
    pub workspace_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    pub fn schedule(&self) -> Schedule {
        Schedule::new(
            ScheduleType::parse(&self.schedule_type),
            self.schedule_days.clone(),
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub schedule_type: ScheduleType,
    pub schedule_days: Vec<i16>,
    pub workspace_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<Goal> for GoalResponse {
    fn from(g: Goal) -> Self {
        Self {
            id: g.id,
            schedule_type: ScheduleType::parse(&g.schedule_type),
            title: g.title,
            description: g.description,
            schedule_days: g.schedule_days,
            workspace_id: g.workspace_id,
            owner_id: g.owner_id,
            created_at: g.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GoalWorkspace {
    pub id: Uuid,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompletionDate {
    pub date: NaiveDate,
}

/// GET /api/goals entry
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalWithProgress {
    #[serde(flatten)]
    pub goal: GoalResponse,
    pub workspace: Option<GoalWorkspace>,
    pub completions: Vec<CompletionDate>,
    pub streak: StreakResult,
    pub is_due_today: bool,
    pub next_due: Option<NaiveDate>,
}

/// POST /api/goals
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1-200 characters"),
        custom = "not_blank"
    )]
    pub title: String,

    #[validate(length(max = 1000, message = "Description must be under 1000 characters"))]
    pub description: Option<String>,

    pub schedule_type: ScheduleType,

    #[serde(default)]
    pub schedule_days: Vec<i16>,

    pub workspace_id: Option<Uuid>,
}

impl CreateGoalRequest {
    /// Normalizes the schedule: custom days are sorted and de-duplicated, other
    /// types drop any days sent along.
    pub fn validate_schedule(&self) -> Result<Schedule, String> {
        match self.schedule_type {
            ScheduleType::Daily => Ok(Schedule::daily()),
            ScheduleType::Weekdays => Ok(Schedule::weekdays()),
            ScheduleType::Custom => {
                if self.schedule_days.is_empty() {
                    return Err("Custom goals must include schedule days".into());
                }
                if let Some(day) = self.schedule_days.iter().find(|d| !(0..=6).contains(*d)) {
                    return Err(format!("Day {} is invalid; must be 0-6 (Sun-Sat)", day));
                }
                let mut days = self.schedule_days.clone();
                days.sort_unstable();
                days.dedup();
                Ok(Schedule::custom(days))
            }
            ScheduleType::Unrecognized => {
                Err("scheduleType must be one of daily, weekdays, custom".into())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakQuery {
    pub user_id: Option<Uuid>,
}

/// GET /api/goals/:id/schedule query params. Default window: the next 7 days.
#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub goal_id: Uuid,
    pub schedule: Schedule,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub dates: Vec<NaiveDate>,
}
