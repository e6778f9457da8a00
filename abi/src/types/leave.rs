use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorId, OfficeError};

pub type LeaveRequestId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

text_enum!(LeaveStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: LeaveRequestId,
    pub requester_id: ActorId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: LeaveStatus,
    pub decided_by: Option<ActorId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLeaveRequest {
    pub requester_id: ActorId,
    /// inclusive
    pub start_date: NaiveDate,
    /// inclusive
    pub end_date: NaiveDate,
    pub reason: String,
}

impl NewLeaveRequest {
    pub fn validate(&self) -> Result<(), OfficeError> {
        if self.end_date < self.start_date {
            return Err(OfficeError::InvalidInterval(format!(
                "leave ends {} before it starts {}",
                self.end_date, self.start_date
            )));
        }
        Ok(())
    }
}
