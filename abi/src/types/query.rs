use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    ActorId, BookingStatus, DeviceId, DeviceRequestStatus, LeaveStatus, OfficeError, RoomId,
    Timespan,
};

/// Filter over device requests. Unset fields match everything.
#[derive(Builder, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRequestQuery {
    #[builder(setter(into, strip_option), default)]
    pub requester_id: Option<ActorId>,
    #[builder(setter(into, strip_option), default)]
    pub device_id: Option<DeviceId>,
    #[builder(setter(into, strip_option), default)]
    pub status: Option<DeviceRequestStatus>,
    /// newest first when set
    #[builder(setter(into), default)]
    pub desc: bool,
}

/// Filter over bookings. `window` keeps bookings intersecting it.
#[derive(Builder, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingQuery {
    #[builder(setter(into, strip_option), default)]
    pub room_id: Option<RoomId>,
    #[builder(setter(into, strip_option), default)]
    pub requester_id: Option<ActorId>,
    #[builder(setter(into, strip_option), default)]
    pub status: Option<BookingStatus>,
    #[builder(setter(into, strip_option), default)]
    pub window: Option<Timespan>,
    #[builder(setter(into), default)]
    pub desc: bool,
}

#[derive(Builder, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveQuery {
    #[builder(setter(into, strip_option), default)]
    pub requester_id: Option<ActorId>,
    #[builder(setter(into, strip_option), default)]
    pub status: Option<LeaveStatus>,
    #[builder(setter(into), default)]
    pub desc: bool,
}

impl From<DeviceRequestQueryBuilderError> for OfficeError {
    fn from(e: DeviceRequestQueryBuilderError) -> Self {
        OfficeError::InvalidInput(e.to_string())
    }
}

impl From<BookingQueryBuilderError> for OfficeError {
    fn from(e: BookingQueryBuilderError) -> Self {
        OfficeError::InvalidInput(e.to_string())
    }
}

impl From<LeaveQueryBuilderError> for OfficeError {
    fn from(e: LeaveQueryBuilderError) -> Self {
        OfficeError::InvalidInput(e.to_string())
    }
}
