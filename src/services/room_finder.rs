//! Best-fit room selection.

use crate::models::{Booking, Room};
use crate::timeslot::{Day, TimeWindow};

#[derive(Debug, Clone)]
pub struct RoomRequest<'a> {
    /// Seats needed; 0 or less accepts any room.
    pub capacity: i64,
    pub room_type: Option<&'a str>,
    /// `None` searches every campus.
    pub campuses: Option<&'a [i64]>,
    pub day: Day,
    pub window: TimeWindow,
}

/// The smallest free room that fits, lowest id on ties. `None` tells the
/// caller to defer, it is not a failure.
pub fn find_room<'r>(rooms: &'r [Room], bookings: &[Booking], req: &RoomRequest<'_>) -> Option<&'r Room> {
    rooms
        .iter()
        .filter(|r| r.is_available)
        .filter(|r| req.capacity <= 0 || r.capacity >= req.capacity)
        .filter(|r| match req.room_type {
            Some(wanted) => r.room_type.as_deref() == Some(wanted),
            None => true,
        })
        .filter(|r| match req.campuses {
            Some(campuses) => r.campus_id.is_some_and(|c| campuses.contains(&c)),
            None => true,
        })
        .filter(|r| !is_room_busy(r.id, req.day, req.window, bookings))
        .min_by_key(|r| (r.capacity, r.id))
}

/// Any session, whatever its status, holds the room.
pub fn is_room_busy(room_id: i64, day: Day, window: TimeWindow, bookings: &[Booking]) -> bool {
    bookings
        .iter()
        .any(|b| b.room_id == Some(room_id) && b.day == day && b.window.overlaps(&window))
}
