//! Pure helpers behind the secondary cinema operations: input validation,
//! room conflicts, searches, rental pricing and the simple collection
//! filters.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::RecordId;

use super::types::{Rental, Room, Seat, SeatStatus, Showtime, ShowtimeStatus, User};

/// Rejected input, reported before anything reaches the store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("end time must be after start time")]
    InvalidInterval,
}

pub fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

/// Rejects zero, negatives, NaN and infinities.
pub fn require_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::NotPositive { field });
    }
    Ok(())
}

pub fn require_interval(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if ends_at <= starts_at {
        return Err(ValidationError::InvalidInterval);
    }
    Ok(())
}

/// Half-open interval overlap: back-to-back bookings do not conflict.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Rentals of `room_id` that hold the room somewhere inside the window.
pub fn rental_conflicts<'a>(
    rentals: &'a [Rental],
    room_id: RecordId,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Vec<&'a Rental> {
    rentals
        .iter()
        .filter(|r| r.room_id == room_id && r.status.blocks_room())
        .filter(|r| overlaps(r.starts_at, r.ends_at, starts_at, ends_at))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RentalConflict {
    pub rental_id: RecordId,
    pub event_name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl From<&Rental> for RentalConflict {
    fn from(rental: &Rental) -> Self {
        Self {
            rental_id: rental.id,
            event_name: rental.event_name.clone(),
            starts_at: rental.starts_at,
            ends_at: rental.ends_at,
        }
    }
}

/// Availability of one operative room for a requested window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomAvailability {
    pub room_id: RecordId,
    pub name: String,
    pub capacity: i32,
    pub available: bool,
    pub conflicts: Vec<RentalConflict>,
}

pub fn room_availability(
    rooms: &[Room],
    rentals: &[Rental],
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Vec<RoomAvailability> {
    rooms
        .iter()
        .filter(|room| room.state.is_operational())
        .map(|room| {
            let conflicts: Vec<RentalConflict> =
                rental_conflicts(rentals, room.id, starts_at, ends_at)
                    .into_iter()
                    .map(RentalConflict::from)
                    .collect();
            RoomAvailability {
                room_id: room.id,
                name: room.name.clone(),
                capacity: room.capacity,
                available: conflicts.is_empty(),
                conflicts,
            }
        })
        .collect()
}

pub fn active_rooms(rooms: &[Room]) -> Vec<Room> {
    rooms
        .iter()
        .filter(|room| room.state.is_operational())
        .cloned()
        .collect()
}

pub fn available_seats(seats: &[Seat], room_id: RecordId) -> Vec<Seat> {
    seats
        .iter()
        .filter(|seat| seat.room_id == room_id && seat.status == SeatStatus::Disponible)
        .cloned()
        .collect()
}

pub fn showtimes_for_movie(showtimes: &[Showtime], movie_id: RecordId) -> Vec<Showtime> {
    showtimes
        .iter()
        .filter(|s| s.movie_id == movie_id)
        .cloned()
        .collect()
}

/// Showtimes that have not started yet, soonest first.
pub fn upcoming_showtimes(showtimes: &[Showtime], now: DateTime<Utc>) -> Vec<Showtime> {
    let mut upcoming: Vec<Showtime> = showtimes
        .iter()
        .filter(|s| s.starts_at >= now)
        .cloned()
        .collect();
    upcoming.sort_by_key(|s| s.starts_at);
    upcoming
}

/// Scheduled showtimes of `room_id` that overlap the window. `exclude`
/// skips the showtime being moved.
pub fn showtime_conflicts<'a>(
    showtimes: &'a [Showtime],
    room_id: RecordId,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    exclude: Option<RecordId>,
) -> Vec<&'a Showtime> {
    showtimes
        .iter()
        .filter(|s| s.room_id == room_id && s.status == ShowtimeStatus::Programada)
        .filter(|s| Some(s.id) != exclude)
        .filter(|s| overlaps(s.starts_at, s.ends_at, starts_at, ends_at))
        .collect()
}

pub fn showtimes_for_room(showtimes: &[Showtime], room_id: RecordId) -> Vec<Showtime> {
    let mut found: Vec<Showtime> = showtimes
        .iter()
        .filter(|s| s.room_id == room_id)
        .cloned()
        .collect();
    found.sort_by_key(|s| s.starts_at);
    found
}

/// Showtimes starting inside `[from, to]`, both ends included, soonest first.
pub fn showtimes_between(
    showtimes: &[Showtime],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<Showtime> {
    let mut found: Vec<Showtime> = showtimes
        .iter()
        .filter(|s| s.starts_at >= from && s.starts_at <= to)
        .cloned()
        .collect();
    found.sort_by_key(|s| s.starts_at);
    found
}

fn folded_term(term: &str) -> String {
    term.trim().to_lowercase()
}

fn any_contains<'a>(fields: impl IntoIterator<Item = &'a str>, folded: &str) -> bool {
    folded.is_empty()
        || fields
            .into_iter()
            .any(|field| field.to_lowercase().contains(folded))
}

/// Rentals whose event name, room name or renter name contains `term`,
/// ignoring case, latest first. A blank term matches every rental.
pub fn search_rentals(rentals: &[Rental], term: &str) -> Vec<Rental> {
    let folded = folded_term(term);
    let mut found: Vec<Rental> = rentals
        .iter()
        .filter(|rental| {
            let room = rental.room.as_ref().map(|room| room.name.as_str());
            let user = rental.user.as_ref();
            let fields = [
                Some(rental.event_name.as_str()),
                room,
                user.map(|u| u.first_names.as_str()),
                user.map(|u| u.last_names.as_str()),
            ];
            any_contains(fields.into_iter().flatten(), &folded)
        })
        .cloned()
        .collect();
    found.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));
    found
}

/// Users whose names, email or national id contain `term`, ignoring case,
/// ordered by first names.
pub fn search_users(users: &[User], term: &str) -> Vec<User> {
    let folded = folded_term(term);
    let mut found: Vec<User> = users
        .iter()
        .filter(|user| {
            let fields = [
                user.first_names.as_str(),
                user.last_names.as_str(),
                user.email.as_str(),
                user.national_id.as_str(),
            ];
            any_contains(fields, &folded)
        })
        .cloned()
        .collect();
    found.sort_by(|a, b| a.first_names.cmp(&b.first_names));
    found
}

/// Hourly rate of a room kind. Unknown or missing kinds are billed as
/// standard rooms.
pub fn hourly_rate(room_kind: Option<&str>) -> f64 {
    match room_kind.map(folded_term).as_deref() {
        Some("vip") => 100.0,
        Some("3d") => 75.0,
        Some("imax") => 150.0,
        _ => 50.0,
    }
}

/// Surcharge for the kind of event. Conferences, meetings and unknown kinds
/// pay the plain rate.
pub fn event_multiplier(event_kind: &str) -> f64 {
    match folded_term(event_kind).as_str() {
        "fiesta" => 1.5,
        "evento_especial" => 2.0,
        "otros" => 1.2,
        _ => 1.0,
    }
}

/// Suggested total price of a rental.
pub fn rental_price(
    room_kind: Option<&str>,
    hours: f64,
    event_kind: &str,
) -> Result<f64, ValidationError> {
    require_positive("hours", hours)?;
    Ok(hourly_rate(room_kind) * hours * event_multiplier(event_kind))
}
