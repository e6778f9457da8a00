mod service;
pub mod telemetry;

use abi::{
    BookRoomRequest, BookingAction, BookingList, BookingResponse, BorrowDeviceRequest,
    DeviceList, DeviceRequestAction, DeviceRequestList, DeviceRequestResponse, DeviceResponse,
    FileLeaveRequest, GetDeviceRequest, GetRoomRequest, LeaveAction, LeaveList, LeaveResponse,
    RegisterDeviceRequest, RegisterRoomRequest, RoomList, RoomResponse, RoomSchedule,
    RoomScheduleRequest,
};
use tonic::{Request, Response, Status};
use workflow::OfficeManager;

/// Metadata key carrying the authenticated caller's actor id.
pub const ACTOR_HEADER: &str = "x-actor-id";

pub struct OfficeService {
    manager: OfficeManager,
}

pub type ApiResult<T> = Result<Response<T>, Status>;

/// Thin request-handling surface over the office core: one method per
/// operation, the acting actor read from request metadata.
#[tonic::async_trait]
pub trait OfficeApi {
    async fn register_device(
        &self,
        request: Request<RegisterDeviceRequest>,
    ) -> ApiResult<DeviceResponse>;
    async fn register_room(&self, request: Request<RegisterRoomRequest>) -> ApiResult<RoomResponse>;
    async fn get_device(&self, request: Request<GetDeviceRequest>) -> ApiResult<DeviceResponse>;
    async fn list_devices(&self, request: Request<()>) -> ApiResult<DeviceList>;
    async fn get_room(&self, request: Request<GetRoomRequest>) -> ApiResult<RoomResponse>;
    async fn list_rooms(&self, request: Request<()>) -> ApiResult<RoomList>;

    /// open a borrow request for a device
    async fn request_device(
        &self,
        request: Request<BorrowDeviceRequest>,
    ) -> ApiResult<DeviceRequestResponse>;
    async fn approve_device_request(
        &self,
        request: Request<DeviceRequestAction>,
    ) -> ApiResult<DeviceRequestResponse>;
    async fn reject_device_request(
        &self,
        request: Request<DeviceRequestAction>,
    ) -> ApiResult<DeviceRequestResponse>;
    async fn collect_device(
        &self,
        request: Request<DeviceRequestAction>,
    ) -> ApiResult<DeviceRequestResponse>;
    async fn initiate_return(
        &self,
        request: Request<DeviceRequestAction>,
    ) -> ApiResult<DeviceRequestResponse>;
    async fn confirm_return(
        &self,
        request: Request<DeviceRequestAction>,
    ) -> ApiResult<DeviceRequestResponse>;
    async fn cancel_device_request(
        &self,
        request: Request<DeviceRequestAction>,
    ) -> ApiResult<DeviceRequestResponse>;
    async fn my_device_requests(&self, request: Request<()>) -> ApiResult<DeviceRequestList>;
    async fn pending_device_requests(&self, request: Request<()>) -> ApiResult<DeviceRequestList>;
    async fn return_pending_device_requests(
        &self,
        request: Request<()>,
    ) -> ApiResult<DeviceRequestList>;

    /// book a room for a half-open interval
    async fn book_room(&self, request: Request<BookRoomRequest>) -> ApiResult<BookingResponse>;
    async fn complete_booking(&self, request: Request<BookingAction>) -> ApiResult<BookingResponse>;
    async fn cancel_booking(&self, request: Request<BookingAction>) -> ApiResult<BookingResponse>;
    /// confirmed bookings and free gaps of one day
    async fn room_schedule(&self, request: Request<RoomScheduleRequest>) -> ApiResult<RoomSchedule>;
    async fn my_bookings(&self, request: Request<()>) -> ApiResult<BookingList>;

    async fn file_leave(&self, request: Request<FileLeaveRequest>) -> ApiResult<LeaveResponse>;
    async fn approve_leave(&self, request: Request<LeaveAction>) -> ApiResult<LeaveResponse>;
    async fn reject_leave(&self, request: Request<LeaveAction>) -> ApiResult<LeaveResponse>;
    async fn cancel_leave(&self, request: Request<LeaveAction>) -> ApiResult<LeaveResponse>;
    async fn my_leave_requests(&self, request: Request<()>) -> ApiResult<LeaveList>;
    async fn leave_awaiting_decision(&self, request: Request<()>) -> ApiResult<LeaveList>;
}
