use abi::{
    ActorId, Booking, BookingConflict, BookingConflictInfo, BookingId, BookingQueryBuilder,
    BookingStatus, BookingWindow, ConflictInfo, EntityKind, NewBooking, OfficeError, RoomId,
    RoomSchedule, Timespan,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::{ApprovalGate, OfficeManager, Operation, RoomBooking};

/// First confirmed booking of `room_id` overlapping `span`.
pub(crate) fn first_overlap<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    room_id: RoomId,
    span: &Timespan,
) -> Option<&'a Booking> {
    bookings.into_iter().find(|b| {
        b.room_id == room_id && b.status == BookingStatus::Confirmed && b.span.overlaps(span)
    })
}

pub(crate) fn overlap_conflict(new: &NewBooking, existing: &Booking) -> OfficeError {
    OfficeError::Conflict(ConflictInfo::Booking(BookingConflictInfo::Parsed(
        BookingConflict {
            new: BookingWindow {
                room_id: new.room_id,
                start: new.span.start,
                end: new.span.end,
            },
            old: BookingWindow {
                room_id: existing.room_id,
                start: existing.span.start,
                end: existing.span.end,
            },
        },
    )))
}

/// Gaps of `window` not covered by any of `bookings`, in order. Bookings
/// may extend past the window on either side.
pub fn free_slots(window: &Timespan, bookings: &[Booking]) -> Vec<Timespan> {
    let mut busy: Vec<_> = bookings
        .iter()
        .filter(|b| b.span.overlaps(window))
        .map(|b| b.span)
        .collect();
    busy.sort_by_key(|s| s.start);

    let mut free = Vec::new();
    let mut cursor = window.start;
    for span in busy {
        if span.start > cursor {
            free.push(Timespan {
                start: cursor,
                end: span.start,
            });
        }
        cursor = cursor.max(span.end);
    }
    if cursor < window.end {
        free.push(Timespan {
            start: cursor,
            end: window.end,
        });
    }
    free
}

#[derive(Debug, Clone, Copy)]
enum BookingAction {
    Complete,
    Cancel,
}

impl BookingAction {
    fn target(&self) -> BookingStatus {
        match self {
            BookingAction::Complete => BookingStatus::Completed,
            BookingAction::Cancel => BookingStatus::Cancelled,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            BookingAction::Complete => "complete",
            BookingAction::Cancel => "cancel",
        }
    }

    fn operation(&self) -> Operation {
        match self {
            BookingAction::Complete => Operation::CompleteBooking,
            BookingAction::Cancel => Operation::CancelBooking,
        }
    }
}

impl OfficeManager {
    async fn finish_booking(
        &self,
        actor_id: ActorId,
        id: BookingId,
        action: BookingAction,
    ) -> Result<Booking, OfficeError> {
        let actor = self.authorize(actor_id, action.operation()).await?;

        let booking = self
            .store
            .update_booking(
                id,
                Box::new(move |mut booking| {
                    ApprovalGate::check_owner(&actor, booking.requester_id, EntityKind::Booking)?;
                    if booking.status != BookingStatus::Confirmed {
                        return Err(OfficeError::invalid_transition(
                            EntityKind::Booking,
                            booking.status,
                            action.verb(),
                        ));
                    }
                    booking.status = action.target();
                    Ok(booking)
                }),
            )
            .await?;

        info!(
            booking_id = booking.id,
            room_id = booking.room_id,
            actor_id,
            status = %booking.status,
            "booking transitioned"
        );
        Ok(booking)
    }
}

#[async_trait]
impl RoomBooking for OfficeManager {
    async fn book_room(
        &self,
        actor_id: ActorId,
        room: RoomId,
        span: Timespan,
        note: String,
    ) -> Result<Booking, OfficeError> {
        let actor = self.authorize(actor_id, Operation::BookRoom).await?;
        span.validate()?;

        let booking = self
            .store
            .create_booking(NewBooking {
                room_id: room,
                requester_id: actor.id,
                span,
                note,
            })
            .await?;

        info!(
            booking_id = booking.id,
            room_id = room,
            actor_id,
            start = %span.start,
            end = %span.end,
            "room booked"
        );
        Ok(booking)
    }

    async fn complete_booking(&self, actor: ActorId, id: BookingId) -> Result<Booking, OfficeError> {
        self.finish_booking(actor, id, BookingAction::Complete).await
    }

    async fn cancel_booking(&self, actor: ActorId, id: BookingId) -> Result<Booking, OfficeError> {
        self.finish_booking(actor, id, BookingAction::Cancel).await
    }

    async fn room_schedule(
        &self,
        actor_id: ActorId,
        room: RoomId,
        date: NaiveDate,
    ) -> Result<RoomSchedule, OfficeError> {
        self.authorize(actor_id, Operation::ViewSchedule).await?;
        if self.store.get_room(room).await?.is_none() {
            return Err(OfficeError::not_found(EntityKind::Room, room));
        }

        let day = Timespan::whole_day(date)?;
        let query = BookingQueryBuilder::default()
            .room_id(room)
            .status(BookingStatus::Confirmed)
            .window(day)
            .build()?;
        let bookings = self.store.query_bookings(query).await?;
        let free = free_slots(&day, &bookings);

        debug!(room_id = room, %date, busy = bookings.len(), free = free.len(), "room schedule");
        Ok(RoomSchedule {
            room_id: room,
            date,
            bookings,
            free,
        })
    }

    async fn my_bookings(&self, actor_id: ActorId) -> Result<Vec<Booking>, OfficeError> {
        let actor = self.authorize(actor_id, Operation::ListOwnRequests).await?;
        let query = BookingQueryBuilder::default()
            .requester_id(actor.id)
            .desc(true)
            .build()?;
        self.store.query_bookings(query).await
    }
}
