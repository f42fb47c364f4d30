mod metrics;
mod operations;
mod requests;
mod types;

pub use metrics::{
    rental_metrics, rental_stats, room_seat_stats, ticket_metrics, ticket_stats, user_metrics,
    user_stats, RentalMetrics, RentalStats, RoomSeatStats, TicketMetrics, TicketStats,
    UserMetrics, UserStats,
};
pub use operations::{
    active_rooms, available_seats, event_multiplier, hourly_rate, overlaps, rental_conflicts,
    rental_price, require_interval, require_positive, require_text, room_availability,
    search_rentals, search_users, showtime_conflicts, showtimes_between, showtimes_for_movie,
    showtimes_for_room, upcoming_showtimes, RentalConflict, RoomAvailability, ValidationError,
};
pub use requests::{
    CreateMovie, CreateRental, CreateRole, CreateRoom, CreateSeat, CreateShowtime, CreateTicket,
    CreateTicketSale, CreateUser, UpdateMovie, UpdateRental, UpdateRole, UpdateRoom, UpdateSeat,
    UpdateShowtime, UpdateTicket, UpdateTicketSale, UpdateUser,
};
pub use types::{
    Movie, MovieSummary, Rental, RentalStatus, Role, RoleSummary, Room, RoomState, RoomSummary,
    Seat, SeatKind, SeatStatus, Showtime, ShowtimeStatus, Ticket, TicketSale, TicketShowtime,
    User, UserKind, UserSummary, ADMIN_ROLE, DEFAULT_ROLE_ID,
};
