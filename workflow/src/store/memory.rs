use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use abi::{
    Booking, BookingId, BookingQuery, BookingStatus, Device, DeviceId, DeviceRequest,
    DeviceRequestId, DeviceRequestQuery, DeviceStatus, EntityKind, LeaveQuery, LeaveRequest,
    LeaveRequestId, LeaveStatus, MeetingRoom, NewBooking, NewDevice, NewLeaveRequest, NewRoom,
    OfficeError, RoomId,
};
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::{Mutation, OfficeStore};
use crate::booking::{first_overlap, overlap_conflict};

/// Process-local store for development and tests. All tables sit behind one
/// mutex that is never held across an await, so each call is atomic.
/// Operations on different devices or rooms serialize on that mutex too;
/// only [`super::PgStore`] lets unrelated ids proceed independently.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    ids: Ids,
    devices: BTreeMap<DeviceId, Device>,
    rooms: BTreeMap<RoomId, MeetingRoom>,
    device_requests: BTreeMap<DeviceRequestId, DeviceRequest>,
    bookings: BTreeMap<BookingId, Booking>,
    leaves: BTreeMap<LeaveRequestId, LeaveRequest>,
}

#[derive(Debug, Default)]
struct Ids {
    device: i64,
    room: i64,
    device_request: i64,
    booking: i64,
    leave: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl Tables {
    fn with_status(&self, mut device: Device) -> Device {
        let active = self
            .device_requests
            .values()
            .find(|r| r.device_id == device.id && r.status.is_active())
            .map(|r| r.status);
        device.status = DeviceStatus::derive(active);
        device
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, OfficeError> {
        self.tables.lock().map_err(|_| OfficeError::Unknown)
    }
}

#[async_trait]
impl OfficeStore for MemoryStore {
    async fn insert_device(&self, device: NewDevice) -> Result<Device, OfficeError> {
        let mut tables = self.tables()?;
        let id = next(&mut tables.ids.device);
        let device = Device {
            id,
            name: device.name,
            description: device.description,
            status: DeviceStatus::Available,
            created_at: Utc::now(),
        };
        tables.devices.insert(id, device.clone());
        Ok(device)
    }

    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>, OfficeError> {
        let tables = self.tables()?;
        Ok(tables
            .devices
            .get(&id)
            .cloned()
            .map(|d| tables.with_status(d)))
    }

    async fn list_devices(&self) -> Result<Vec<Device>, OfficeError> {
        let tables = self.tables()?;
        Ok(tables
            .devices
            .values()
            .cloned()
            .map(|d| tables.with_status(d))
            .collect())
    }

    async fn insert_room(&self, room: NewRoom) -> Result<MeetingRoom, OfficeError> {
        let mut tables = self.tables()?;
        let id = next(&mut tables.ids.room);
        let room = MeetingRoom {
            id,
            name: room.name,
            capacity: room.capacity,
            location: room.location,
        };
        tables.rooms.insert(id, room.clone());
        Ok(room)
    }

    async fn get_room(&self, id: RoomId) -> Result<Option<MeetingRoom>, OfficeError> {
        Ok(self.tables()?.rooms.get(&id).cloned())
    }

    async fn list_rooms(&self) -> Result<Vec<MeetingRoom>, OfficeError> {
        Ok(self.tables()?.rooms.values().cloned().collect())
    }

    async fn create_device_request(
        &self,
        mut request: DeviceRequest,
    ) -> Result<DeviceRequest, OfficeError> {
        let mut tables = self.tables()?;
        if !tables.devices.contains_key(&request.device_id) {
            return Err(OfficeError::not_found(
                EntityKind::Device,
                request.device_id,
            ));
        }
        if let Some(active) = tables
            .device_requests
            .values()
            .find(|r| r.device_id == request.device_id && r.status.is_active())
        {
            debug!(device_id = active.device_id, request_id = active.id, "device already requested");
            return Err(OfficeError::Conflict(
                abi::ConflictInfo::ActiveDeviceRequest {
                    device_id: request.device_id,
                },
            ));
        }

        request.id = next(&mut tables.ids.device_request);
        tables.device_requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_device_request(
        &self,
        id: DeviceRequestId,
    ) -> Result<Option<DeviceRequest>, OfficeError> {
        Ok(self.tables()?.device_requests.get(&id).cloned())
    }

    async fn update_device_request(
        &self,
        id: DeviceRequestId,
        mutation: Mutation<DeviceRequest>,
    ) -> Result<DeviceRequest, OfficeError> {
        let mut tables = self.tables()?;
        let current = tables
            .device_requests
            .get(&id)
            .cloned()
            .ok_or_else(|| OfficeError::not_found(EntityKind::DeviceRequest, id))?;

        let mut updated = mutation(current)?;
        updated.id = id;
        tables.device_requests.insert(id, updated.clone());
        Ok(updated)
    }

    async fn query_device_requests(
        &self,
        query: DeviceRequestQuery,
    ) -> Result<Vec<DeviceRequest>, OfficeError> {
        let tables = self.tables()?;
        let mut requests: Vec<_> = tables
            .device_requests
            .values()
            .filter(|r| query.requester_id.map_or(true, |id| r.requester_id == id))
            .filter(|r| query.device_id.map_or(true, |id| r.device_id == id))
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();

        requests.sort_by_key(|r| (r.requested_at, r.id));
        if query.desc {
            requests.reverse();
        }
        Ok(requests)
    }

    async fn create_booking(&self, booking: NewBooking) -> Result<Booking, OfficeError> {
        let mut tables = self.tables()?;
        if !tables.rooms.contains_key(&booking.room_id) {
            return Err(OfficeError::not_found(EntityKind::Room, booking.room_id));
        }
        if let Some(existing) = first_overlap(tables.bookings.values(), booking.room_id, &booking.span)
        {
            return Err(overlap_conflict(&booking, existing));
        }

        let id = next(&mut tables.ids.booking);
        let booking = Booking {
            id,
            room_id: booking.room_id,
            requester_id: booking.requester_id,
            span: booking.span,
            status: BookingStatus::Confirmed,
            note: booking.note,
            created_at: Utc::now(),
        };
        tables.bookings.insert(id, booking.clone());
        Ok(booking)
    }

    async fn update_booking(
        &self,
        id: BookingId,
        mutation: Mutation<Booking>,
    ) -> Result<Booking, OfficeError> {
        let mut tables = self.tables()?;
        let current = tables
            .bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| OfficeError::not_found(EntityKind::Booking, id))?;

        let mut updated = mutation(current)?;
        updated.id = id;
        tables.bookings.insert(id, updated.clone());
        Ok(updated)
    }

    async fn query_bookings(&self, query: BookingQuery) -> Result<Vec<Booking>, OfficeError> {
        let tables = self.tables()?;
        let mut bookings: Vec<_> = tables
            .bookings
            .values()
            .filter(|b| query.room_id.map_or(true, |id| b.room_id == id))
            .filter(|b| query.requester_id.map_or(true, |id| b.requester_id == id))
            .filter(|b| query.status.map_or(true, |s| b.status == s))
            .filter(|b| query.window.map_or(true, |w| b.span.overlaps(&w)))
            .cloned()
            .collect();

        bookings.sort_by_key(|b| (b.span.start, b.id));
        if query.desc {
            bookings.reverse();
        }
        Ok(bookings)
    }

    async fn insert_leave_request(
        &self,
        leave: NewLeaveRequest,
    ) -> Result<LeaveRequest, OfficeError> {
        let mut tables = self.tables()?;
        let id = next(&mut tables.ids.leave);
        let leave = LeaveRequest {
            id,
            requester_id: leave.requester_id,
            start_date: leave.start_date,
            end_date: leave.end_date,
            reason: leave.reason,
            status: LeaveStatus::Pending,
            decided_by: None,
            decided_at: None,
            created_at: Utc::now(),
        };
        tables.leaves.insert(id, leave.clone());
        Ok(leave)
    }

    async fn get_leave_request(
        &self,
        id: LeaveRequestId,
    ) -> Result<Option<LeaveRequest>, OfficeError> {
        Ok(self.tables()?.leaves.get(&id).cloned())
    }

    async fn update_leave_request(
        &self,
        id: LeaveRequestId,
        mutation: Mutation<LeaveRequest>,
    ) -> Result<LeaveRequest, OfficeError> {
        let mut tables = self.tables()?;
        let current = tables
            .leaves
            .get(&id)
            .cloned()
            .ok_or_else(|| OfficeError::not_found(EntityKind::LeaveRequest, id))?;

        let mut updated = mutation(current)?;
        updated.id = id;
        tables.leaves.insert(id, updated.clone());
        Ok(updated)
    }

    async fn query_leave_requests(
        &self,
        query: LeaveQuery,
    ) -> Result<Vec<LeaveRequest>, OfficeError> {
        let tables = self.tables()?;
        let mut leaves: Vec<_> = tables
            .leaves
            .values()
            .filter(|l| query.requester_id.map_or(true, |id| l.requester_id == id))
            .filter(|l| query.status.map_or(true, |s| l.status == s))
            .cloned()
            .collect();

        leaves.sort_by_key(|l| (l.created_at, l.id));
        if query.desc {
            leaves.reverse();
        }
        Ok(leaves)
    }
}
