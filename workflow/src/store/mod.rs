mod memory;
mod postgres;

use abi::{
    Booking, BookingId, BookingQuery, Device, DeviceId, DeviceRequest, DeviceRequestId,
    DeviceRequestQuery, LeaveQuery, LeaveRequest, LeaveRequestId, MeetingRoom, NewBooking,
    NewDevice, NewLeaveRequest, NewRoom, OfficeError, RoomId,
};
use async_trait::async_trait;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A state change applied to a locked row. Returning an error aborts the
/// unit of work without writing anything.
pub type Mutation<T> = Box<dyn FnOnce(T) -> Result<T, OfficeError> + Send>;

/// Backing store for the office core. Every method is one all-or-nothing
/// unit of work; check-then-write sequences happen inside it, never across
/// two calls.
#[async_trait]
pub trait OfficeStore: Send + Sync {
    async fn insert_device(&self, device: NewDevice) -> Result<Device, OfficeError>;

    /// Device with its status derived from the active request, if any.
    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>, OfficeError>;

    async fn list_devices(&self) -> Result<Vec<Device>, OfficeError>;

    async fn insert_room(&self, room: NewRoom) -> Result<MeetingRoom, OfficeError>;

    async fn get_room(&self, id: RoomId) -> Result<Option<MeetingRoom>, OfficeError>;

    async fn list_rooms(&self) -> Result<Vec<MeetingRoom>, OfficeError>;

    /// Inserts `request` unless its device is unknown (`NotFound`) or already
    /// has an active request (`Conflict`).
    async fn create_device_request(
        &self,
        request: DeviceRequest,
    ) -> Result<DeviceRequest, OfficeError>;

    async fn get_device_request(
        &self,
        id: DeviceRequestId,
    ) -> Result<Option<DeviceRequest>, OfficeError>;

    /// Locks the request, applies `mutation` and writes the result back.
    async fn update_device_request(
        &self,
        id: DeviceRequestId,
        mutation: Mutation<DeviceRequest>,
    ) -> Result<DeviceRequest, OfficeError>;

    async fn query_device_requests(
        &self,
        query: DeviceRequestQuery,
    ) -> Result<Vec<DeviceRequest>, OfficeError>;

    /// Inserts a confirmed booking unless its room is unknown (`NotFound`)
    /// or a confirmed booking of that room overlaps it (`Conflict`).
    async fn create_booking(&self, booking: NewBooking) -> Result<Booking, OfficeError>;

    async fn update_booking(
        &self,
        id: BookingId,
        mutation: Mutation<Booking>,
    ) -> Result<Booking, OfficeError>;

    /// Ordered by start time.
    async fn query_bookings(&self, query: BookingQuery) -> Result<Vec<Booking>, OfficeError>;

    async fn insert_leave_request(
        &self,
        leave: NewLeaveRequest,
    ) -> Result<LeaveRequest, OfficeError>;

    async fn get_leave_request(
        &self,
        id: LeaveRequestId,
    ) -> Result<Option<LeaveRequest>, OfficeError>;

    async fn update_leave_request(
        &self,
        id: LeaveRequestId,
        mutation: Mutation<LeaveRequest>,
    ) -> Result<LeaveRequest, OfficeError>;

    async fn query_leave_requests(
        &self,
        query: LeaveQuery,
    ) -> Result<Vec<LeaveRequest>, OfficeError>;
}
