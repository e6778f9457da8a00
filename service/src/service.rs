use abi::{
    ActorId, BookRoomRequest, BookingAction, BookingList, BookingResponse, BorrowDeviceRequest,
    Config, DeviceList, DeviceRequestAction, DeviceRequestList, DeviceRequestResponse,
    DeviceResponse, FileLeaveRequest, GetDeviceRequest, GetRoomRequest, LeaveAction, LeaveList,
    LeaveResponse, RegisterDeviceRequest, RegisterRoomRequest, RoomList, RoomResponse,
    RoomSchedule, RoomScheduleRequest, Timespan,
};
use anyhow::Context;
use tonic::{Request, Response, Status};
use tracing::warn;
use workflow::{Catalog, DeviceLending, LeaveApproval, OfficeManager, RoomBooking};

use crate::{ApiResult, OfficeApi, OfficeService, ACTOR_HEADER};

impl OfficeService {
    pub fn new(manager: OfficeManager) -> Self {
        Self { manager }
    }

    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let manager = OfficeManager::from_config(&config.db)
            .await
            .context("failed to connect to postgres")?;
        Ok(Self::new(manager))
    }
}

/// Actor id the upstream authentication layer attached to the request.
fn actor_of<T>(request: &Request<T>) -> Result<ActorId, Status> {
    request
        .metadata()
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| {
            warn!("request without a valid {} entry", ACTOR_HEADER);
            Status::unauthenticated(format!("missing or malformed {}", ACTOR_HEADER))
        })
}

/// Splits a request into its actor and payload.
fn unpack<T>(request: Request<T>) -> Result<(ActorId, T), Status> {
    let actor = actor_of(&request)?;
    Ok((actor, request.into_inner()))
}

#[tonic::async_trait]
impl OfficeApi for OfficeService {
    async fn register_device(
        &self,
        request: Request<RegisterDeviceRequest>,
    ) -> ApiResult<DeviceResponse> {
        let (actor, req) = unpack(request)?;
        let device = self.manager.register_device(actor, req.device).await?;
        Ok(Response::new(DeviceResponse { device }))
    }

    async fn register_room(
        &self,
        request: Request<RegisterRoomRequest>,
    ) -> ApiResult<RoomResponse> {
        let (actor, req) = unpack(request)?;
        let room = self.manager.register_room(actor, req.room).await?;
        Ok(Response::new(RoomResponse { room }))
    }

    async fn get_device(&self, request: Request<GetDeviceRequest>) -> ApiResult<DeviceResponse> {
        let (actor, req) = unpack(request)?;
        let device = self.manager.get_device(actor, req.device_id).await?;
        Ok(Response::new(DeviceResponse { device }))
    }

    async fn list_devices(&self, request: Request<()>) -> ApiResult<DeviceList> {
        let actor = actor_of(&request)?;
        let devices = self.manager.list_devices(actor).await?;
        Ok(Response::new(DeviceList { devices }))
    }

    async fn get_room(&self, request: Request<GetRoomRequest>) -> ApiResult<RoomResponse> {
        let (actor, req) = unpack(request)?;
        let room = self.manager.get_room(actor, req.room_id).await?;
        Ok(Response::new(RoomResponse { room }))
    }

    async fn list_rooms(&self, request: Request<()>) -> ApiResult<RoomList> {
        let actor = actor_of(&request)?;
        let rooms = self.manager.list_rooms(actor).await?;
        Ok(Response::new(RoomList { rooms }))
    }

    async fn request_device(
        &self,
        request: Request<BorrowDeviceRequest>,
    ) -> ApiResult<DeviceRequestResponse> {
        let (actor, req) = unpack(request)?;
        let request = self.manager.request_device(actor, req.device_id).await?;
        Ok(Response::new(DeviceRequestResponse { request }))
    }

    async fn approve_device_request(
        &self,
        request: Request<DeviceRequestAction>,
    ) -> ApiResult<DeviceRequestResponse> {
        let (actor, req) = unpack(request)?;
        let request = self
            .manager
            .approve_device_request(actor, req.request_id)
            .await?;
        Ok(Response::new(DeviceRequestResponse { request }))
    }

    async fn reject_device_request(
        &self,
        request: Request<DeviceRequestAction>,
    ) -> ApiResult<DeviceRequestResponse> {
        let (actor, req) = unpack(request)?;
        let request = self
            .manager
            .reject_device_request(actor, req.request_id)
            .await?;
        Ok(Response::new(DeviceRequestResponse { request }))
    }

    async fn collect_device(
        &self,
        request: Request<DeviceRequestAction>,
    ) -> ApiResult<DeviceRequestResponse> {
        let (actor, req) = unpack(request)?;
        let request = self.manager.collect_device(actor, req.request_id).await?;
        Ok(Response::new(DeviceRequestResponse { request }))
    }

    async fn initiate_return(
        &self,
        request: Request<DeviceRequestAction>,
    ) -> ApiResult<DeviceRequestResponse> {
        let (actor, req) = unpack(request)?;
        let request = self.manager.initiate_return(actor, req.request_id).await?;
        Ok(Response::new(DeviceRequestResponse { request }))
    }

    async fn confirm_return(
        &self,
        request: Request<DeviceRequestAction>,
    ) -> ApiResult<DeviceRequestResponse> {
        let (actor, req) = unpack(request)?;
        let request = self.manager.confirm_return(actor, req.request_id).await?;
        Ok(Response::new(DeviceRequestResponse { request }))
    }

    async fn cancel_device_request(
        &self,
        request: Request<DeviceRequestAction>,
    ) -> ApiResult<DeviceRequestResponse> {
        let (actor, req) = unpack(request)?;
        let request = self
            .manager
            .cancel_device_request(actor, req.request_id)
            .await?;
        Ok(Response::new(DeviceRequestResponse { request }))
    }

    async fn my_device_requests(&self, request: Request<()>) -> ApiResult<DeviceRequestList> {
        let actor = actor_of(&request)?;
        let requests = self.manager.my_device_requests(actor).await?;
        Ok(Response::new(DeviceRequestList { requests }))
    }

    async fn pending_device_requests(&self, request: Request<()>) -> ApiResult<DeviceRequestList> {
        let actor = actor_of(&request)?;
        let requests = self.manager.pending_device_requests(actor).await?;
        Ok(Response::new(DeviceRequestList { requests }))
    }

    async fn return_pending_device_requests(
        &self,
        request: Request<()>,
    ) -> ApiResult<DeviceRequestList> {
        let actor = actor_of(&request)?;
        let requests = self.manager.return_pending_device_requests(actor).await?;
        Ok(Response::new(DeviceRequestList { requests }))
    }

    async fn book_room(&self, request: Request<BookRoomRequest>) -> ApiResult<BookingResponse> {
        let (actor, req) = unpack(request)?;
        // validated by the core after the approval gate
        let span = Timespan {
            start: req.start,
            end: req.end,
        };
        let booking = self
            .manager
            .book_room(actor, req.room_id, span, req.note)
            .await?;
        Ok(Response::new(BookingResponse { booking }))
    }

    async fn complete_booking(
        &self,
        request: Request<BookingAction>,
    ) -> ApiResult<BookingResponse> {
        let (actor, req) = unpack(request)?;
        let booking = self.manager.complete_booking(actor, req.booking_id).await?;
        Ok(Response::new(BookingResponse { booking }))
    }

    async fn cancel_booking(&self, request: Request<BookingAction>) -> ApiResult<BookingResponse> {
        let (actor, req) = unpack(request)?;
        let booking = self.manager.cancel_booking(actor, req.booking_id).await?;
        Ok(Response::new(BookingResponse { booking }))
    }

    async fn room_schedule(
        &self,
        request: Request<RoomScheduleRequest>,
    ) -> ApiResult<RoomSchedule> {
        let (actor, req) = unpack(request)?;
        let schedule = self
            .manager
            .room_schedule(actor, req.room_id, req.date)
            .await?;
        Ok(Response::new(schedule))
    }

    async fn my_bookings(&self, request: Request<()>) -> ApiResult<BookingList> {
        let actor = actor_of(&request)?;
        let bookings = self.manager.my_bookings(actor).await?;
        Ok(Response::new(BookingList { bookings }))
    }

    async fn file_leave(&self, request: Request<FileLeaveRequest>) -> ApiResult<LeaveResponse> {
        let (actor, req) = unpack(request)?;
        let leave = self
            .manager
            .file_leave(actor, req.start_date, req.end_date, req.reason)
            .await?;
        Ok(Response::new(LeaveResponse { leave }))
    }

    async fn approve_leave(&self, request: Request<LeaveAction>) -> ApiResult<LeaveResponse> {
        let (actor, req) = unpack(request)?;
        let leave = self.manager.approve_leave(actor, req.leave_id).await?;
        Ok(Response::new(LeaveResponse { leave }))
    }

    async fn reject_leave(&self, request: Request<LeaveAction>) -> ApiResult<LeaveResponse> {
        let (actor, req) = unpack(request)?;
        let leave = self.manager.reject_leave(actor, req.leave_id).await?;
        Ok(Response::new(LeaveResponse { leave }))
    }

    async fn cancel_leave(&self, request: Request<LeaveAction>) -> ApiResult<LeaveResponse> {
        let (actor, req) = unpack(request)?;
        let leave = self.manager.cancel_leave(actor, req.leave_id).await?;
        Ok(Response::new(LeaveResponse { leave }))
    }

    async fn my_leave_requests(&self, request: Request<()>) -> ApiResult<LeaveList> {
        let actor = actor_of(&request)?;
        let leaves = self.manager.my_leave_requests(actor).await?;
        Ok(Response::new(LeaveList { leaves }))
    }

    async fn leave_awaiting_decision(&self, request: Request<()>) -> ApiResult<LeaveList> {
        let actor = actor_of(&request)?;
        let leaves = self.manager.leave_awaiting_decision(actor).await?;
        Ok(Response::new(LeaveList { leaves }))
    }
}
