//! Cyclic search over the weekly grid of fixed teaching slots.
//!
//! The grid is `days × slots`. A search starts at the position of the
//! session being moved and walks forward slot by slot, wrapping to the next
//! day and finally back to the first day, visiting every cell at most once.

use crate::error::AppError;
use crate::models::{Booking, SessionStatus};
use crate::timeslot::{Day, TimeWindow};

#[derive(Debug, Clone, PartialEq)]
pub struct SlotCatalogue {
    days: Vec<Day>,
    slots: Vec<TimeWindow>,
}

impl SlotCatalogue {
    pub fn new(days: Vec<Day>, mut slots: Vec<TimeWindow>) -> Result<Self, AppError> {
        if days.is_empty() || slots.is_empty() {
            return Err(AppError::BadRequest(
                "slot catalogue needs at least one day and one slot".to_string(),
            ));
        }
        if let Some(bad) = slots.iter().find(|s| s.start >= s.end) {
            return Err(AppError::BadRequest(format!("empty catalogue slot {}", bad)));
        }
        slots.sort_by_key(|s| s.start);
        Ok(Self { days, slots })
    }

    /// Monday to Saturday, four two-hour slots a day.
    pub fn standard() -> Self {
        Self {
            days: vec![
                Day::Monday,
                Day::Tuesday,
                Day::Wednesday,
                Day::Thursday,
                Day::Friday,
                Day::Saturday,
            ],
            slots: vec![
                TimeWindow::new(8 * 60, 10 * 60),
                TimeWindow::new(10 * 60, 12 * 60),
                TimeWindow::new(13 * 60, 15 * 60),
                TimeWindow::new(15 * 60, 17 * 60),
            ],
        }
    }

    pub fn days(&self) -> &[Day] {
        &self.days
    }

    pub fn slots(&self) -> &[TimeWindow] {
        &self.slots
    }

    fn len(&self) -> usize {
        self.days.len() * self.slots.len()
    }

    /// Index of the slot holding `window`: the one overlapping its start,
    /// else the first starting after it, else the first slot.
    fn slot_index(&self, window: TimeWindow) -> usize {
        self.slots
            .iter()
            .position(|s| s.start <= window.start && window.start < s.end)
            .or_else(|| self.slots.iter().position(|s| s.start >= window.start))
            .unwrap_or(0)
    }

    /// Every other cell of the grid, in search order, starting right after
    /// the cell of `(day, window)`. A day outside the catalogue starts the
    /// walk on the first catalogue day and skips nothing.
    pub fn walk(&self, day: Day, window: TimeWindow) -> Vec<(Day, TimeWindow)> {
        let slot_count = self.slots.len();
        let (day_index, first_step) = match self.days.iter().position(|d| *d == day) {
            Some(i) => (i, 1),
            None => (0, 0),
        };
        let origin = day_index * slot_count + self.slot_index(window);
        let total = self.len();

        (first_step..total)
            .map(|step| {
                let cell = (origin + step) % total;
                (self.days[cell / slot_count], self.slots[cell % slot_count])
            })
            .collect()
    }
}

/// First cell after `(day, window)` where neither the room nor the teacher
/// is held by a published session. `None` once the whole week is exhausted.
pub fn find_free_slot(
    catalogue: &SlotCatalogue,
    day: Day,
    window: TimeWindow,
    room_id: Option<i64>,
    teacher_id: Option<i64>,
    bookings: &[Booking],
) -> Option<(Day, TimeWindow)> {
    catalogue
        .walk(day, window)
        .into_iter()
        .find(|(d, w)| is_free(*d, *w, room_id, teacher_id, bookings))
}

fn is_free(
    day: Day,
    window: TimeWindow,
    room_id: Option<i64>,
    teacher_id: Option<i64>,
    bookings: &[Booking],
) -> bool {
    !bookings
        .iter()
        .filter(|b| b.status == SessionStatus::Published)
        .filter(|b| b.day == day && b.window.overlaps(&window))
        .any(|b| {
            let same_room = room_id.is_some() && b.room_id == room_id;
            let same_teacher = teacher_id.is_some() && b.teacher_id == teacher_id;
            same_room || same_teacher
        })
}
