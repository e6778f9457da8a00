use abi::{
    Booking, BookingId, BookingQuery, BookingStatus, ConflictInfo, Device, DeviceId,
    DeviceRequest, DeviceRequestId, DeviceRequestQuery, DeviceRequestStatus, DeviceStatus,
    EntityKind, LeaveQuery, LeaveRequest, LeaveRequestId, LeaveStatus, MeetingRoom, NewBooking,
    NewDevice, NewLeaveRequest, NewRoom, OfficeError, RoomId, Timespan,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::types::PgRange, FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, instrument};

use super::{Mutation, OfficeStore};
use crate::booking::overlap_conflict;

macro_rules! device_columns {
    () => {
        "SELECT d.id, d.name, d.description, d.created_at, r.status AS active_status \
         FROM office.devices d \
         LEFT JOIN office.device_requests r ON r.device_id = d.id \
         AND r.status IN ('pending', 'approved', 'collected', 'return_pending')"
    };
}

macro_rules! device_request_columns {
    () => {
        "id, device_id, requester_id, status, requested_at, decided_by, decided_at, \
         collected_at, return_requested_at, return_confirmed_by, returned_at, cancelled_at"
    };
}

macro_rules! booking_columns {
    () => {
        "id, room_id, requester_id, timespan, status, note, created_at"
    };
}

macro_rules! leave_columns {
    () => {
        "id, requester_id, start_date, end_date, reason, status, decided_by, decided_at, created_at"
    };
}

/// Postgres-backed store. Contended units of work lock the parent row
/// (`FOR UPDATE`) before checking, so two writers on the same device or
/// room serialize while different ids proceed independently. The partial
/// unique index and the exclusion constraint in `migrations/` back the same
/// invariants at the database level.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgStore {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self {
            pool,
            lock_timeout_ms,
        }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, OfficeError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms))
            .execute(&mut tx)
            .await?;
        Ok(tx)
    }
}

#[derive(Debug, FromRow)]
struct DeviceRow {
    id: i64,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    active_status: Option<String>,
}

impl TryFrom<DeviceRow> for Device {
    type Error = OfficeError;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        let active = row
            .active_status
            .as_deref()
            .map(|s| s.parse::<DeviceRequestStatus>())
            .transpose()?;

        Ok(Device {
            id: row.id,
            name: row.name,
            description: row.description,
            status: DeviceStatus::derive(active),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RoomRow {
    id: i64,
    name: String,
    capacity: i32,
    location: String,
}

impl From<RoomRow> for MeetingRoom {
    fn from(row: RoomRow) -> Self {
        MeetingRoom {
            id: row.id,
            name: row.name,
            capacity: row.capacity,
            location: row.location,
        }
    }
}

#[derive(Debug, FromRow)]
struct DeviceRequestRow {
    id: i64,
    device_id: i64,
    requester_id: i64,
    status: String,
    requested_at: DateTime<Utc>,
    decided_by: Option<i64>,
    decided_at: Option<DateTime<Utc>>,
    collected_at: Option<DateTime<Utc>>,
    return_requested_at: Option<DateTime<Utc>>,
    return_confirmed_by: Option<i64>,
    returned_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<DeviceRequestRow> for DeviceRequest {
    type Error = OfficeError;

    fn try_from(row: DeviceRequestRow) -> Result<Self, Self::Error> {
        Ok(DeviceRequest {
            id: row.id,
            device_id: row.device_id,
            requester_id: row.requester_id,
            status: row.status.parse()?,
            requested_at: row.requested_at,
            decided_by: row.decided_by,
            decided_at: row.decided_at,
            collected_at: row.collected_at,
            return_requested_at: row.return_requested_at,
            return_confirmed_by: row.return_confirmed_by,
            returned_at: row.returned_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct BookingRow {
    id: i64,
    room_id: i64,
    requester_id: i64,
    timespan: PgRange<DateTime<Utc>>,
    status: String,
    note: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = OfficeError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            room_id: row.room_id,
            requester_id: row.requester_id,
            span: Timespan::try_from(row.timespan)?,
            status: row.status.parse()?,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LeaveRow {
    id: i64,
    requester_id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: String,
    status: String,
    decided_by: Option<i64>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = OfficeError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        Ok(LeaveRequest {
            id: row.id,
            requester_id: row.requester_id,
            start_date: row.start_date,
            end_date: row.end_date,
            reason: row.reason,
            status: row.status.parse()?,
            decided_by: row.decided_by,
            decided_at: row.decided_at,
            created_at: row.created_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, OfficeError>
where
    T: TryFrom<R, Error = OfficeError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl OfficeStore for PgStore {
    #[instrument(skip(self))]
    async fn insert_device(&self, device: NewDevice) -> Result<Device, OfficeError> {
        let row: DeviceRow = sqlx::query_as(
            "INSERT INTO office.devices (name, description) VALUES ($1, $2) \
             RETURNING id, name, description, created_at, NULL::text AS active_status",
        )
        .bind(device.name)
        .bind(device.description)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>, OfficeError> {
        let row: Option<DeviceRow> = sqlx::query_as(concat!(device_columns!(), " WHERE d.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Device::try_from).transpose()
    }

    async fn list_devices(&self) -> Result<Vec<Device>, OfficeError> {
        let rows: Vec<DeviceRow> = sqlx::query_as(concat!(device_columns!(), " ORDER BY d.id"))
            .fetch_all(&self.pool)
            .await?;

        convert_all(rows)
    }

    #[instrument(skip(self))]
    async fn insert_room(&self, room: NewRoom) -> Result<MeetingRoom, OfficeError> {
        let row: RoomRow = sqlx::query_as(
            "INSERT INTO office.meeting_rooms (name, capacity, location) VALUES ($1, $2, $3) \
             RETURNING id, name, capacity, location",
        )
        .bind(room.name)
        .bind(room.capacity)
        .bind(room.location)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get_room(&self, id: RoomId) -> Result<Option<MeetingRoom>, OfficeError> {
        let row: Option<RoomRow> = sqlx::query_as(
            "SELECT id, name, capacity, location FROM office.meeting_rooms WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_rooms(&self) -> Result<Vec<MeetingRoom>, OfficeError> {
        let rows: Vec<RoomRow> = sqlx::query_as(
            "SELECT id, name, capacity, location FROM office.meeting_rooms ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, request), fields(device_id = request.device_id, requester_id = request.requester_id))]
    async fn create_device_request(
        &self,
        request: DeviceRequest,
    ) -> Result<DeviceRequest, OfficeError> {
        let mut tx = self.begin().await?;

        let device: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM office.devices WHERE id = $1 FOR UPDATE")
                .bind(request.device_id)
                .fetch_optional(&mut tx)
                .await?;
        if device.is_none() {
            return Err(OfficeError::not_found(EntityKind::Device, request.device_id));
        }

        let active: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM office.device_requests WHERE device_id = $1 \
             AND status IN ('pending', 'approved', 'collected', 'return_pending') LIMIT 1",
        )
        .bind(request.device_id)
        .fetch_optional(&mut tx)
        .await?;
        if let Some((active_id,)) = active {
            debug!(active_id, "device already requested");
            return Err(OfficeError::Conflict(ConflictInfo::ActiveDeviceRequest {
                device_id: request.device_id,
            }));
        }

        let row: DeviceRequestRow = sqlx::query_as(concat!(
            "INSERT INTO office.device_requests (device_id, requester_id, status, requested_at) \
             VALUES ($1, $2, $3, $4) RETURNING ",
            device_request_columns!()
        ))
        .bind(request.device_id)
        .bind(request.requester_id)
        .bind(request.status.as_str())
        .bind(request.requested_at)
        .fetch_one(&mut tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn get_device_request(
        &self,
        id: DeviceRequestId,
    ) -> Result<Option<DeviceRequest>, OfficeError> {
        let row: Option<DeviceRequestRow> = sqlx::query_as(concat!(
            "SELECT ",
            device_request_columns!(),
            " FROM office.device_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DeviceRequest::try_from).transpose()
    }

    #[instrument(skip(self, mutation))]
    async fn update_device_request(
        &self,
        id: DeviceRequestId,
        mutation: Mutation<DeviceRequest>,
    ) -> Result<DeviceRequest, OfficeError> {
        let mut tx = self.begin().await?;

        let row: Option<DeviceRequestRow> = sqlx::query_as(concat!(
            "SELECT ",
            device_request_columns!(),
            " FROM office.device_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut tx)
        .await?;
        let current: DeviceRequest = row
            .ok_or_else(|| OfficeError::not_found(EntityKind::DeviceRequest, id))?
            .try_into()?;

        let updated = mutation(current)?;

        let row: DeviceRequestRow = sqlx::query_as(concat!(
            "UPDATE office.device_requests SET status = $2, decided_by = $3, decided_at = $4, \
             collected_at = $5, return_requested_at = $6, return_confirmed_by = $7, \
             returned_at = $8, cancelled_at = $9 WHERE id = $1 RETURNING ",
            device_request_columns!()
        ))
        .bind(id)
        .bind(updated.status.as_str())
        .bind(updated.decided_by)
        .bind(updated.decided_at)
        .bind(updated.collected_at)
        .bind(updated.return_requested_at)
        .bind(updated.return_confirmed_by)
        .bind(updated.returned_at)
        .bind(updated.cancelled_at)
        .fetch_one(&mut tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn query_device_requests(
        &self,
        query: DeviceRequestQuery,
    ) -> Result<Vec<DeviceRequest>, OfficeError> {
        let mut builder = QueryBuilder::<Postgres>::new(concat!(
            "SELECT ",
            device_request_columns!(),
            " FROM office.device_requests WHERE TRUE"
        ));
        if let Some(requester_id) = query.requester_id {
            builder.push(" AND requester_id = ").push_bind(requester_id);
        }
        if let Some(device_id) = query.device_id {
            builder.push(" AND device_id = ").push_bind(device_id);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder.push(if query.desc {
            " ORDER BY requested_at DESC, id DESC"
        } else {
            " ORDER BY requested_at, id"
        });

        let rows: Vec<DeviceRequestRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        convert_all(rows)
    }

    #[instrument(skip(self, booking), fields(room_id = booking.room_id, requester_id = booking.requester_id))]
    async fn create_booking(&self, booking: NewBooking) -> Result<Booking, OfficeError> {
        let mut tx = self.begin().await?;

        let room: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM office.meeting_rooms WHERE id = $1 FOR UPDATE")
                .bind(booking.room_id)
                .fetch_optional(&mut tx)
                .await?;
        if room.is_none() {
            return Err(OfficeError::not_found(EntityKind::Room, booking.room_id));
        }

        let timespan: PgRange<DateTime<Utc>> = booking.span.into();
        let existing: Option<BookingRow> = sqlx::query_as(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM office.bookings WHERE room_id = $1 AND status = 'confirmed' \
             AND timespan && $2 ORDER BY lower(timespan) LIMIT 1"
        ))
        .bind(booking.room_id)
        .bind(timespan.clone())
        .fetch_optional(&mut tx)
        .await?;
        if let Some(existing) = existing {
            return Err(overlap_conflict(&booking, &existing.try_into()?));
        }

        // the exclusion constraint still rejects a concurrent writer that
        // slipped past the room lock
        let row: BookingRow = sqlx::query_as(concat!(
            "INSERT INTO office.bookings (room_id, requester_id, timespan, status, note) \
             VALUES ($1, $2, $3, $4, $5) RETURNING ",
            booking_columns!()
        ))
        .bind(booking.room_id)
        .bind(booking.requester_id)
        .bind(timespan)
        .bind(BookingStatus::Confirmed.as_str())
        .bind(booking.note)
        .fetch_one(&mut tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    #[instrument(skip(self, mutation))]
    async fn update_booking(
        &self,
        id: BookingId,
        mutation: Mutation<Booking>,
    ) -> Result<Booking, OfficeError> {
        let mut tx = self.begin().await?;

        let row: Option<BookingRow> = sqlx::query_as(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM office.bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut tx)
        .await?;
        let current: Booking = row
            .ok_or_else(|| OfficeError::not_found(EntityKind::Booking, id))?
            .try_into()?;

        let updated = mutation(current)?;

        let row: BookingRow = sqlx::query_as(concat!(
            "UPDATE office.bookings SET status = $2, note = $3 WHERE id = $1 RETURNING ",
            booking_columns!()
        ))
        .bind(id)
        .bind(updated.status.as_str())
        .bind(updated.note)
        .fetch_one(&mut tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn query_bookings(&self, query: BookingQuery) -> Result<Vec<Booking>, OfficeError> {
        let mut builder = QueryBuilder::<Postgres>::new(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM office.bookings WHERE TRUE"
        ));
        if let Some(room_id) = query.room_id {
            builder.push(" AND room_id = ").push_bind(room_id);
        }
        if let Some(requester_id) = query.requester_id {
            builder.push(" AND requester_id = ").push_bind(requester_id);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(window) = query.window {
            builder
                .push(" AND timespan && ")
                .push_bind(PgRange::<DateTime<Utc>>::from(window));
        }
        builder.push(if query.desc {
            " ORDER BY lower(timespan) DESC, id DESC"
        } else {
            " ORDER BY lower(timespan), id"
        });

        let rows: Vec<BookingRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        convert_all(rows)
    }

    #[instrument(skip(self, leave), fields(requester_id = leave.requester_id))]
    async fn insert_leave_request(
        &self,
        leave: NewLeaveRequest,
    ) -> Result<LeaveRequest, OfficeError> {
        let row: LeaveRow = sqlx::query_as(concat!(
            "INSERT INTO office.leave_requests (requester_id, start_date, end_date, reason, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING ",
            leave_columns!()
        ))
        .bind(leave.requester_id)
        .bind(leave.start_date)
        .bind(leave.end_date)
        .bind(leave.reason)
        .bind(LeaveStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_leave_request(
        &self,
        id: LeaveRequestId,
    ) -> Result<Option<LeaveRequest>, OfficeError> {
        let row: Option<LeaveRow> = sqlx::query_as(concat!(
            "SELECT ",
            leave_columns!(),
            " FROM office.leave_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LeaveRequest::try_from).transpose()
    }

    #[instrument(skip(self, mutation))]
    async fn update_leave_request(
        &self,
        id: LeaveRequestId,
        mutation: Mutation<LeaveRequest>,
    ) -> Result<LeaveRequest, OfficeError> {
        let mut tx = self.begin().await?;

        let row: Option<LeaveRow> = sqlx::query_as(concat!(
            "SELECT ",
            leave_columns!(),
            " FROM office.leave_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut tx)
        .await?;
        let current: LeaveRequest = row
            .ok_or_else(|| OfficeError::not_found(EntityKind::LeaveRequest, id))?
            .try_into()?;

        let updated = mutation(current)?;

        let row: LeaveRow = sqlx::query_as(concat!(
            "UPDATE office.leave_requests SET status = $2, decided_by = $3, decided_at = $4 \
             WHERE id = $1 RETURNING ",
            leave_columns!()
        ))
        .bind(id)
        .bind(updated.status.as_str())
        .bind(updated.decided_by)
        .bind(updated.decided_at)
        .fetch_one(&mut tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn query_leave_requests(
        &self,
        query: LeaveQuery,
    ) -> Result<Vec<LeaveRequest>, OfficeError> {
        let mut builder = QueryBuilder::<Postgres>::new(concat!(
            "SELECT ",
            leave_columns!(),
            " FROM office.leave_requests WHERE TRUE"
        ));
        if let Some(requester_id) = query.requester_id {
            builder.push(" AND requester_id = ").push_bind(requester_id);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder.push(if query.desc {
            " ORDER BY created_at DESC, id DESC"
        } else {
            " ORDER BY created_at, id"
        });

        let rows: Vec<LeaveRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        convert_all(rows)
    }
}

#[cfg(all(test, feature = "integration-tests"))]
mod tests {
    use abi::{BookingQueryBuilder, DeviceRequestQueryBuilder, ErrorKind, LeaveQueryBuilder};

    use super::*;

    fn span(start: &str, end: &str) -> Timespan {
        Timespan::new(start.parse().unwrap(), end.parse().unwrap()).unwrap()
    }

    #[sqlx_database_tester::test(pool(variable = "migrated_pool", migrations = "../migrations"))]
    async fn overlapping_booking_should_conflict() {
        let store = PgStore::new(migrated_pool.clone(), 3000);
        let room = store
            .insert_room(NewRoom::new("Fjord", 6, "2F"))
            .await
            .unwrap();

        let first = NewBooking {
            room_id: room.id,
            requester_id: 1,
            span: span("2024-01-10T09:00:00Z", "2024-01-10T10:00:00Z"),
            note: "standup".to_string(),
        };
        let booking = store.create_booking(first).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);

        let err = store
            .create_booking(NewBooking {
                room_id: room.id,
                requester_id: 2,
                span: span("2024-01-10T09:30:00Z", "2024-01-10T09:45:00Z"),
                note: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let adjacent = store
            .create_booking(NewBooking {
                room_id: room.id,
                requester_id: 2,
                span: span("2024-01-10T10:00:00Z", "2024-01-10T11:00:00Z"),
                note: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(adjacent.span.start, booking.span.end);
    }

    #[sqlx_database_tester::test(pool(variable = "migrated_pool", migrations = "../migrations"))]
    async fn second_active_request_should_conflict() {
        let store = PgStore::new(migrated_pool.clone(), 3000);
        let device = store
            .insert_device(NewDevice::new("ThinkPad X1", "14 inch"))
            .await
            .unwrap();

        let request = store
            .create_device_request(DeviceRequest::new_pending(device.id, 1, Utc::now()))
            .await
            .unwrap();
        assert_eq!(request.status, DeviceRequestStatus::Pending);

        let device = store.get_device(device.id).await.unwrap().unwrap();
        assert_eq!(device.status, DeviceStatus::UnderRequest);

        let err = store
            .create_device_request(DeviceRequest::new_pending(device.id, 2, Utc::now()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            OfficeError::Conflict(ConflictInfo::ActiveDeviceRequest {
                device_id: device.id
            })
        );
    }

    #[sqlx_database_tester::test(pool(variable = "migrated_pool", migrations = "../migrations"))]
    async fn exclusion_constraint_should_map_to_parsed_conflict() {
        let store = PgStore::new(migrated_pool.clone(), 3000);
        let room = store
            .insert_room(NewRoom::new("Harbor", 4, "1F"))
            .await
            .unwrap();

        // bypass the room lock to hit the constraint directly
        let insert = "INSERT INTO office.bookings (room_id, requester_id, timespan, status) \
                      VALUES ($1, $2, $3, 'confirmed')";
        sqlx::query(insert)
            .bind(room.id)
            .bind(1_i64)
            .bind(PgRange::<DateTime<Utc>>::from(span("2024-01-10T09:00:00Z", "2024-01-10T10:00:00Z")))
            .execute(&migrated_pool)
            .await
            .unwrap();
        let err: OfficeError = sqlx::query(insert)
            .bind(room.id)
            .bind(2_i64)
            .bind(PgRange::<DateTime<Utc>>::from(span("2024-01-10T09:30:00Z", "2024-01-10T09:45:00Z")))
            .execute(&migrated_pool)
            .await
            .unwrap_err()
            .into();

        let info = match err {
            OfficeError::Conflict(ConflictInfo::Booking(abi::BookingConflictInfo::Parsed(info))) => {
                info
            }
            other => panic!("expected parsed booking conflict, got {:?}", other),
        };
        assert_eq!(info.new.room_id, room.id);
        assert_eq!(info.old.start.to_rfc3339(), "2024-01-10T09:00:00+00:00");
    }

    #[sqlx_database_tester::test(pool(variable = "migrated_pool", migrations = "../migrations"))]
    async fn device_request_updates_should_persist_or_roll_back() {
        let store = PgStore::new(migrated_pool.clone(), 3000);
        let device = store
            .insert_device(NewDevice::new("Pixel 8", ""))
            .await
            .unwrap();
        let request = store
            .create_device_request(DeviceRequest::new_pending(device.id, 1, Utc::now()))
            .await
            .unwrap();

        let approved = store
            .update_device_request(
                request.id,
                Box::new(|mut r| {
                    r.status = DeviceRequestStatus::Approved;
                    r.decided_by = Some(20);
                    r.decided_at = Some(Utc::now());
                    Ok(r)
                }),
            )
            .await
            .unwrap();
        assert_eq!(approved.status, DeviceRequestStatus::Approved);
        assert_eq!(approved.decided_by, Some(20));

        let err = store
            .update_device_request(
                request.id,
                Box::new(|mut r| {
                    r.status = DeviceRequestStatus::Collected;
                    Err(OfficeError::Forbidden("denied".to_string()))
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let stored = store.get_device_request(request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DeviceRequestStatus::Approved);

        let query = DeviceRequestQueryBuilder::default()
            .device_id(device.id)
            .status(DeviceRequestStatus::Approved)
            .build()
            .unwrap();
        let found = store.query_device_requests(query).await.unwrap();
        assert_eq!(found, vec![stored]);

        let err = store
            .update_device_request(404, Box::new(|r| Ok(r)))
            .await
            .unwrap_err();
        assert_eq!(err, OfficeError::not_found(EntityKind::DeviceRequest, 404));
    }

    #[sqlx_database_tester::test(pool(variable = "migrated_pool", migrations = "../migrations"))]
    async fn cancelled_booking_should_leave_the_window_query() {
        let store = PgStore::new(migrated_pool.clone(), 3000);
        let room = store
            .insert_room(NewRoom::new("Tundra", 8, "5F"))
            .await
            .unwrap();

        let mut ids = Vec::new();
        for (start, end) in [
            ("2024-01-10T14:00:00Z", "2024-01-10T15:00:00Z"),
            ("2024-01-10T09:00:00Z", "2024-01-10T10:00:00Z"),
            ("2024-01-11T09:00:00Z", "2024-01-11T10:00:00Z"),
        ] {
            let booking = store
                .create_booking(NewBooking {
                    room_id: room.id,
                    requester_id: 1,
                    span: span(start, end),
                    note: String::new(),
                })
                .await
                .unwrap();
            ids.push(booking.id);
        }

        let cancelled = store
            .update_booking(
                ids[0],
                Box::new(|mut b| {
                    b.status = BookingStatus::Cancelled;
                    Ok(b)
                }),
            )
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let day = Timespan::whole_day(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()).unwrap();
        let query = BookingQueryBuilder::default()
            .room_id(room.id)
            .status(BookingStatus::Confirmed)
            .window(day)
            .build()
            .unwrap();
        let bookings = store.query_bookings(query).await.unwrap();
        assert_eq!(bookings.iter().map(|b| b.id).collect::<Vec<_>>(), vec![ids[1]]);

        let query = BookingQueryBuilder::default()
            .requester_id(1)
            .desc(true)
            .build()
            .unwrap();
        let mine = store.query_bookings(query).await.unwrap();
        assert_eq!(
            mine.iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![ids[2], ids[0], ids[1]]
        );
    }

    #[sqlx_database_tester::test(pool(variable = "migrated_pool", migrations = "../migrations"))]
    async fn leave_requests_should_round_trip_through_updates() {
        let store = PgStore::new(migrated_pool.clone(), 3000);
        let leave = store
            .insert_leave_request(NewLeaveRequest {
                requester_id: 1,
                start_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
                reason: "family trip".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(leave.status, LeaveStatus::Pending);

        let approved = store
            .update_leave_request(
                leave.id,
                Box::new(|mut l| {
                    l.status = LeaveStatus::Approved;
                    l.decided_by = Some(10);
                    l.decided_at = Some(Utc::now());
                    Ok(l)
                }),
            )
            .await
            .unwrap();
        assert_eq!(approved.decided_by, Some(10));

        let pending = LeaveQueryBuilder::default()
            .status(LeaveStatus::Pending)
            .build()
            .unwrap();
        assert!(store.query_leave_requests(pending).await.unwrap().is_empty());

        let mine = LeaveQueryBuilder::default().requester_id(1).build().unwrap();
        assert_eq!(store.query_leave_requests(mine).await.unwrap(), vec![approved]);
    }

    #[sqlx_database_tester::test(pool(variable = "migrated_pool", migrations = "../migrations"))]
    async fn racing_writers_should_leave_one_winner() {
        let store = PgStore::new(migrated_pool.clone(), 3000);
        let device = store
            .insert_device(NewDevice::new("Steam Deck", ""))
            .await
            .unwrap();
        let room = store
            .insert_room(NewRoom::new("Glacier", 4, "5F"))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            store.create_device_request(DeviceRequest::new_pending(device.id, 1, Utc::now())),
            store.create_device_request(DeviceRequest::new_pending(device.id, 2, Utc::now())),
        );
        assert_eq!([&a, &b].iter().filter(|r| r.is_ok()).count(), 1);
        for err in [a, b].into_iter().filter_map(Result::err) {
            assert_eq!(err.kind(), ErrorKind::Conflict);
        }

        let booking = |requester_id| NewBooking {
            room_id: room.id,
            requester_id,
            span: span("2024-01-10T13:00:00Z", "2024-01-10T14:00:00Z"),
            note: String::new(),
        };
        let (a, b) = tokio::join!(
            store.create_booking(booking(1)),
            store.create_booking(booking(2)),
        );
        assert_eq!([&a, &b].iter().filter(|r| r.is_ok()).count(), 1);
        for err in [a, b].into_iter().filter_map(Result::err) {
            assert_eq!(err.kind(), ErrorKind::Conflict);
        }
    }
}
