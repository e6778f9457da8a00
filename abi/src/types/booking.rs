use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorId, OfficeError, Timespan};

pub type RoomId = i64;
pub type BookingId = i64;

/// A bookable room. Its schedule lives in its bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRoom {
    pub id: RoomId,
    pub name: String,
    pub capacity: i32,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoom {
    pub name: String,
    pub capacity: i32,
    pub location: String,
}

impl NewRoom {
    pub fn new(name: impl Into<String>, capacity: i32, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity,
            location: location.into(),
        }
    }

    pub fn validate(&self) -> Result<(), OfficeError> {
        if self.name.trim().is_empty() {
            return Err(OfficeError::InvalidInput(
                "room name cannot be empty".to_string(),
            ));
        }
        if self.capacity <= 0 {
            return Err(OfficeError::InvalidInput(format!(
                "room capacity must be positive, got {}",
                self.capacity
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Completed,
    Cancelled,
}

text_enum!(BookingStatus {
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub room_id: RoomId,
    pub requester_id: ActorId,
    pub span: Timespan,
    pub status: BookingStatus,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub room_id: RoomId,
    pub requester_id: ActorId,
    pub span: Timespan,
    pub note: String,
}

/// Free/busy view of one room for one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSchedule {
    pub room_id: RoomId,
    pub date: NaiveDate,
    /// confirmed bookings intersecting the day, by start time
    pub bookings: Vec<Booking>,
    pub free: Vec<Timespan>,
}
