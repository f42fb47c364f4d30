//! Per-record metrics and dashboard statistics.
//!
//! Every aggregation here works on rows fetched once for the whole
//! collection; callers never issue a query per record.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::serde::optional_timestamp;
use crate::store::RecordId;

use super::types::{Rental, RentalStatus, Room, Seat, SeatStatus, Ticket, TicketSale, User, UserKind};

/// Sales of one ticket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketMetrics {
    #[serde(rename = "total_vendidos")]
    pub total_sold: u64,
    #[serde(rename = "ingresos_totales")]
    pub total_revenue: f64,
    #[serde(rename = "asistencias_confirmadas")]
    pub confirmed_attendance: u64,
}

/// Purchases of one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetrics {
    #[serde(rename = "total_boletos_comprados")]
    pub tickets_purchased: u64,
    #[serde(rename = "total_gastado")]
    pub total_spent: f64,
    #[serde(rename = "asistencias_totales")]
    pub attendances: u64,
    #[serde(
        rename = "ultima_compra",
        default,
        with = "optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_purchase: Option<DateTime<Utc>>,
}

/// Derived figures of one rental.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RentalMetrics {
    #[serde(rename = "duracion_horas")]
    pub duration_hours: f64,
    #[serde(rename = "costo_por_hora")]
    pub cost_per_hour: f64,
    #[serde(rename = "dias_restantes")]
    pub days_remaining: i64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Groups sales by ticket.
pub fn ticket_metrics(sales: &[TicketSale]) -> HashMap<RecordId, TicketMetrics> {
    let mut metrics: HashMap<RecordId, TicketMetrics> = HashMap::new();
    for sale in sales {
        let entry = metrics.entry(sale.ticket_id).or_default();
        entry.total_sold += 1;
        entry.total_revenue += sale.final_price;
        if sale.attendance_confirmed() {
            entry.confirmed_attendance += 1;
        }
    }
    metrics
}

/// Groups sales by purchasing user.
pub fn user_metrics(sales: &[TicketSale]) -> HashMap<RecordId, UserMetrics> {
    let mut metrics: HashMap<RecordId, UserMetrics> = HashMap::new();
    for sale in sales {
        let entry = metrics.entry(sale.user_id).or_default();
        entry.tickets_purchased += 1;
        entry.total_spent += sale.final_price;
        if sale.attendance_confirmed() {
            entry.attendances += 1;
        }
        if entry.last_purchase.is_none_or(|last| sale.purchased_at > last) {
            entry.last_purchase = Some(sale.purchased_at);
        }
    }
    metrics
}

/// Duration, hourly cost and days until the rental starts (never negative).
pub fn rental_metrics(rental: &Rental, now: DateTime<Utc>) -> RentalMetrics {
    let duration_hours = (rental.ends_at - rental.starts_at).num_seconds() as f64 / 3600.0;
    let cost_per_hour = if duration_hours > 0.0 {
        rental.total_price / duration_hours
    } else {
        0.0
    };
    let seconds_until = (rental.starts_at - now).num_seconds();
    let days_remaining = if seconds_until > 0 {
        (seconds_until + 86_399) / 86_400
    } else {
        0
    };

    RentalMetrics {
        duration_hours: round2(duration_hours),
        cost_per_hour: round2(cost_per_hour),
        days_remaining,
    }
}

/// Key with the highest count; ties go to the smallest key so the result
/// is stable.
fn most_frequent(counts: &HashMap<RecordId, u64>) -> Option<RecordId> {
    counts
        .iter()
        .max_by(|(id_a, a), (id_b, b)| a.cmp(b).then(id_b.cmp(id_a)))
        .map(|(id, _)| *id)
}

fn count_by<I: IntoIterator<Item = RecordId>>(ids: I) -> HashMap<RecordId, u64> {
    let mut counts = HashMap::new();
    for id in ids {
        *counts.entry(id).or_insert(0) += 1;
    }
    counts
}

/// Ticket dashboard figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketStats {
    pub total_tickets: u64,
    pub sold_today: u64,
    pub total_revenue: f64,
    pub revenue_today: f64,
    pub average_price: f64,
    pub most_popular: Option<String>,
    pub tickets_with_sales: u64,
}

pub fn ticket_stats(tickets: &[Ticket], sales: &[TicketSale], now: DateTime<Utc>) -> TicketStats {
    let today = now.date_naive();
    let sold_today: Vec<&TicketSale> = sales
        .iter()
        .filter(|sale| sale.purchased_at.date_naive() == today)
        .collect();
    let total_revenue: f64 = sales.iter().map(|sale| sale.final_price).sum();
    let total_tickets = tickets.len() as u64;
    let counts = count_by(sales.iter().map(|sale| sale.ticket_id));

    TicketStats {
        total_tickets,
        sold_today: sold_today.len() as u64,
        total_revenue,
        revenue_today: sold_today.iter().map(|sale| sale.final_price).sum(),
        average_price: if total_tickets > 0 {
            total_revenue / total_tickets as f64
        } else {
            0.0
        },
        most_popular: most_frequent(&counts).map(|id| format!("Ticket #{id}")),
        tickets_with_sales: counts.len() as u64,
    }
}

/// Rental dashboard figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RentalStats {
    pub total_rentals: u64,
    pub active_rentals: u64,
    pub pending_rentals: u64,
    pub total_revenue: f64,
    pub revenue_this_month: f64,
    pub most_popular_room: Option<String>,
    pub average_price: f64,
}

pub fn rental_stats(rentals: &[Rental], now: DateTime<Utc>) -> RentalStats {
    let total_rentals = rentals.len() as u64;
    let total_revenue: f64 = rentals.iter().map(|r| r.total_price).sum();
    let this_month = |r: &&Rental| {
        r.starts_at.year() == now.year() && r.starts_at.month() == now.month()
    };
    let counts = count_by(rentals.iter().map(|r| r.room_id));

    RentalStats {
        total_rentals,
        active_rentals: rentals
            .iter()
            .filter(|r| r.ends_at >= now && r.status.blocks_room())
            .count() as u64,
        pending_rentals: rentals
            .iter()
            .filter(|r| r.status == RentalStatus::Pendiente)
            .count() as u64,
        total_revenue,
        revenue_this_month: rentals.iter().filter(this_month).map(|r| r.total_price).sum(),
        most_popular_room: most_frequent(&counts).map(|id| format!("Room #{id}")),
        average_price: if total_rentals > 0 {
            round2(total_revenue / total_rentals as f64)
        } else {
            0.0
        },
    }
}

/// User dashboard figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_users: u64,
    pub workers: u64,
    pub students: u64,
    pub active_today: u64,
    pub average_purchases: f64,
    pub most_active_user: Option<String>,
}

pub fn user_stats(users: &[User], sales: &[TicketSale], now: DateTime<Utc>) -> UserStats {
    let today = now.date_naive();
    let total_users = users.len() as u64;
    let active_today: HashSet<RecordId> = sales
        .iter()
        .filter(|sale| sale.purchased_at.date_naive() == today)
        .map(|sale| sale.user_id)
        .collect();
    let counts = count_by(sales.iter().map(|sale| sale.user_id));
    let purchases: u64 = counts.values().sum();

    UserStats {
        total_users,
        workers: users.iter().filter(|u| u.kind == UserKind::Trabajador).count() as u64,
        students: users.iter().filter(|u| u.kind == UserKind::Estudiante).count() as u64,
        active_today: active_today.len() as u64,
        average_purchases: if total_users > 0 {
            round2(purchases as f64 / total_users as f64)
        } else {
            0.0
        },
        most_active_user: most_frequent(&counts).map(|id| format!("User #{id}")),
    }
}

/// Seat occupancy of one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSeatStats {
    pub room_id: RecordId,
    pub name: String,
    pub capacity: i32,
    pub total_seats: u64,
    pub available: u64,
    pub occupied: u64,
    pub maintenance: u64,
}

/// Seat counts per room, in room order. Rooms without seats report zeros.
pub fn room_seat_stats(rooms: &[Room], seats: &[Seat]) -> Vec<RoomSeatStats> {
    rooms
        .iter()
        .map(|room| {
            let mut stats = RoomSeatStats {
                room_id: room.id,
                name: room.name.clone(),
                capacity: room.capacity,
                total_seats: 0,
                available: 0,
                occupied: 0,
                maintenance: 0,
            };
            for seat in seats.iter().filter(|seat| seat.room_id == room.id) {
                stats.total_seats += 1;
                match seat.status {
                    SeatStatus::Disponible => stats.available += 1,
                    SeatStatus::Ocupado => stats.occupied += 1,
                    SeatStatus::Mantenimiento => stats.maintenance += 1,
                }
            }
            stats
        })
        .collect()
}
