use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorId, OfficeError};

pub type DeviceId = i64;
pub type DeviceRequestId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Available,
    UnderRequest,
    Borrowed,
}

text_enum!(DeviceStatus {
    Available => "available",
    UnderRequest => "under_request",
    Borrowed => "borrowed",
});

impl DeviceStatus {
    /// Availability is never stored: it follows from the device's single
    /// active request, if any.
    pub fn derive(active: Option<DeviceRequestStatus>) -> Self {
        match active {
            Some(DeviceRequestStatus::Pending) | Some(DeviceRequestStatus::Approved) => {
                DeviceStatus::UnderRequest
            }
            Some(DeviceRequestStatus::Collected) | Some(DeviceRequestStatus::ReturnPending) => {
                DeviceStatus::Borrowed
            }
            _ => DeviceStatus::Available,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub description: String,
    pub status: DeviceStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevice {
    pub name: String,
    pub description: String,
}

impl NewDevice {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn validate(&self) -> Result<(), OfficeError> {
        if self.name.trim().is_empty() {
            return Err(OfficeError::InvalidInput(
                "device name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRequestStatus {
    Pending,
    Approved,
    Rejected,
    Collected,
    ReturnPending,
    Returned,
    Cancelled,
}

text_enum!(DeviceRequestStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Collected => "collected",
    ReturnPending => "return_pending",
    Returned => "returned",
    Cancelled => "cancelled",
});

impl DeviceRequestStatus {
    /// States holding the device; at most one request per device may be in one.
    pub const ACTIVE: [DeviceRequestStatus; 4] = [
        DeviceRequestStatus::Pending,
        DeviceRequestStatus::Approved,
        DeviceRequestStatus::Collected,
        DeviceRequestStatus::ReturnPending,
    ];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRequest {
    pub id: DeviceRequestId,
    pub device_id: DeviceId,
    pub requester_id: ActorId,
    pub status: DeviceRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub decided_by: Option<ActorId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub collected_at: Option<DateTime<Utc>>,
    pub return_requested_at: Option<DateTime<Utc>>,
    pub return_confirmed_by: Option<ActorId>,
    pub returned_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl DeviceRequest {
    pub fn new_pending(device_id: DeviceId, requester_id: ActorId, at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            device_id,
            requester_id,
            status: DeviceRequestStatus::Pending,
            requested_at: at,
            decided_by: None,
            decided_at: None,
            collected_at: None,
            return_requested_at: None,
            return_confirmed_by: None,
            returned_at: None,
            cancelled_at: None,
        }
    }
}
