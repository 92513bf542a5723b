use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::streaks::StreakResult;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Completion {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Body of POST/DELETE /api/goals/:id/complete. The body is optional.
#[derive(Debug, Default, Deserialize)]
pub struct CompletionRequest {
    pub date: Option<NaiveDate>,
}

impl CompletionRequest {
    /// Defaults to `server_today`; anything beyond ±1 day is rejected.
    pub fn validate_date(&self, server_today: NaiveDate) -> Result<NaiveDate, String> {
        let date = self.date.unwrap_or(server_today);
        let diff = (date - server_today).num_days().abs();
        if diff > 1 {
            return Err("date must be within ±1 day of today".into());
        }
        Ok(date)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub goal_id: Uuid,
    pub date: NaiveDate,
    /// false when the day was already recorded (POST) or already absent (DELETE)
    pub changed: bool,
    pub streak: StreakResult,
}
