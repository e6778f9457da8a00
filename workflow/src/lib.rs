mod booking;
mod catalog;
mod device;
mod directory;
mod gate;
mod leave;
mod manager;
mod store;

use std::sync::Arc;

use abi::{
    ActorId, Booking, BookingId, Device, DeviceId, DeviceRequest, DeviceRequestId, LeaveRequest,
    LeaveRequestId, MeetingRoom, NewDevice, NewRoom, OfficeError, RoomId, RoomSchedule, Timespan,
};
use async_trait::async_trait;
use chrono::NaiveDate;

pub use booking::free_slots;
pub use device::{next_status, DeviceAction};
pub use directory::{ActorDirectory, MemoryDirectory, PgDirectory};
pub use gate::{ApprovalGate, Operation};
pub use store::{MemoryStore, Mutation, OfficeStore, PgStore};

/// Entry point of the office core. Holds no state of its own: every call
/// resolves the actor, passes the approval gate and runs one unit of work
/// against the store.
#[derive(Clone)]
pub struct OfficeManager {
    store: Arc<dyn OfficeStore>,
    directory: Arc<dyn ActorDirectory>,
}

#[async_trait]
pub trait Catalog {
    async fn register_device(&self, actor: ActorId, device: NewDevice) -> Result<Device, OfficeError>;
    async fn register_room(&self, actor: ActorId, room: NewRoom) -> Result<MeetingRoom, OfficeError>;
    async fn get_device(&self, actor: ActorId, id: DeviceId) -> Result<Device, OfficeError>;
    async fn list_devices(&self, actor: ActorId) -> Result<Vec<Device>, OfficeError>;
    async fn get_room(&self, actor: ActorId, id: RoomId) -> Result<MeetingRoom, OfficeError>;
    async fn list_rooms(&self, actor: ActorId) -> Result<Vec<MeetingRoom>, OfficeError>;
}

#[async_trait]
pub trait DeviceLending {
    /// open a borrow request; the device must have no active request
    async fn request_device(
        &self,
        actor: ActorId,
        device: DeviceId,
    ) -> Result<DeviceRequest, OfficeError>;
    /// device admin: pending -> approved
    async fn approve_device_request(
        &self,
        actor: ActorId,
        id: DeviceRequestId,
    ) -> Result<DeviceRequest, OfficeError>;
    /// device admin: pending -> rejected
    async fn reject_device_request(
        &self,
        actor: ActorId,
        id: DeviceRequestId,
    ) -> Result<DeviceRequest, OfficeError>;
    /// requester: approved -> collected
    async fn collect_device(
        &self,
        actor: ActorId,
        id: DeviceRequestId,
    ) -> Result<DeviceRequest, OfficeError>;
    /// requester: collected -> return pending
    async fn initiate_return(
        &self,
        actor: ActorId,
        id: DeviceRequestId,
    ) -> Result<DeviceRequest, OfficeError>;
    /// device admin: return pending -> returned
    async fn confirm_return(
        &self,
        actor: ActorId,
        id: DeviceRequestId,
    ) -> Result<DeviceRequest, OfficeError>;
    /// requester: pending or approved -> cancelled
    async fn cancel_device_request(
        &self,
        actor: ActorId,
        id: DeviceRequestId,
    ) -> Result<DeviceRequest, OfficeError>;
    async fn my_device_requests(&self, actor: ActorId) -> Result<Vec<DeviceRequest>, OfficeError>;
    async fn pending_device_requests(
        &self,
        actor: ActorId,
    ) -> Result<Vec<DeviceRequest>, OfficeError>;
    async fn return_pending_device_requests(
        &self,
        actor: ActorId,
    ) -> Result<Vec<DeviceRequest>, OfficeError>;
}

#[async_trait]
pub trait RoomBooking {
    /// book `span` of a room; fails on overlap with a confirmed booking
    async fn book_room(
        &self,
        actor: ActorId,
        room: RoomId,
        span: Timespan,
        note: String,
    ) -> Result<Booking, OfficeError>;
    async fn complete_booking(&self, actor: ActorId, id: BookingId) -> Result<Booking, OfficeError>;
    async fn cancel_booking(&self, actor: ActorId, id: BookingId) -> Result<Booking, OfficeError>;
    /// confirmed bookings of one UTC day plus the gaps between them
    async fn room_schedule(
        &self,
        actor: ActorId,
        room: RoomId,
        date: NaiveDate,
    ) -> Result<RoomSchedule, OfficeError>;
    async fn my_bookings(&self, actor: ActorId) -> Result<Vec<Booking>, OfficeError>;
}

#[async_trait]
pub trait LeaveApproval {
    async fn file_leave(
        &self,
        actor: ActorId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: String,
    ) -> Result<LeaveRequest, OfficeError>;
    async fn approve_leave(
        &self,
        actor: ActorId,
        id: LeaveRequestId,
    ) -> Result<LeaveRequest, OfficeError>;
    async fn reject_leave(
        &self,
        actor: ActorId,
        id: LeaveRequestId,
    ) -> Result<LeaveRequest, OfficeError>;
    async fn cancel_leave(
        &self,
        actor: ActorId,
        id: LeaveRequestId,
    ) -> Result<LeaveRequest, OfficeError>;
    async fn my_leave_requests(&self, actor: ActorId) -> Result<Vec<LeaveRequest>, OfficeError>;
    /// pending requests the actor is allowed to decide
    async fn leave_awaiting_decision(
        &self,
        actor: ActorId,
    ) -> Result<Vec<LeaveRequest>, OfficeError>;
}

#[cfg(test)]
mod test_utils;
