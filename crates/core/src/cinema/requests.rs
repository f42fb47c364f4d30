//! Insert and patch payloads, serialized with the database column names.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::serde::{comma_list, timestamp};
use crate::store::RecordId;

use super::types::{RentalStatus, SeatKind, SeatStatus, ShowtimeStatus, UserKind};

#[derive(Debug, Clone, Serialize)]
pub struct CreateMovie {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "sinopsis")]
    pub synopsis: String,
    #[serde(rename = "duracion")]
    pub duration: i32,
    #[serde(rename = "clasificacion")]
    pub rating: String,
    #[serde(rename = "genero", with = "comma_list")]
    pub genres: Vec<String>,
    #[serde(rename = "url_poster", skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(rename = "estado")]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateMovie {
    #[serde(rename = "titulo", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "sinopsis", skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(rename = "duracion", skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(rename = "clasificacion", skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(rename = "genero", skip_serializing_if = "Option::is_none")]
    pub genres: Option<String>,
    #[serde(rename = "url_poster", skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(rename = "estado", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl UpdateMovie {
    /// Sets the genre list, stored as comma-separated text.
    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = genres
            .into_iter()
            .map(|g| g.as_ref().trim().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        self.genres = Some(joined);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRoom {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "capacidad_total")]
    pub capacity: i32,
    #[serde(rename = "tipo_sala", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "estado")]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateRoom {
    #[serde(rename = "nombre", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "capacidad_total", skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(rename = "tipo_sala", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "estado", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSeat {
    #[serde(rename = "sala_id")]
    pub room_id: RecordId,
    #[serde(rename = "fila")]
    pub row: String,
    #[serde(rename = "numero")]
    pub number: i32,
    #[serde(rename = "tipo_asiento")]
    pub kind: SeatKind,
    #[serde(rename = "estado_asiento")]
    pub status: SeatStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateSeat {
    #[serde(rename = "sala_id", skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RecordId>,
    #[serde(rename = "fila", skip_serializing_if = "Option::is_none")]
    pub row: Option<String>,
    #[serde(rename = "numero", skip_serializing_if = "Option::is_none")]
    pub number: Option<i32>,
    #[serde(rename = "tipo_asiento", skip_serializing_if = "Option::is_none")]
    pub kind: Option<SeatKind>,
    #[serde(rename = "estado_asiento", skip_serializing_if = "Option::is_none")]
    pub status: Option<SeatStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateShowtime {
    #[serde(rename = "pelicula_id")]
    pub movie_id: RecordId,
    #[serde(rename = "sala_id")]
    pub room_id: RecordId,
    #[serde(rename = "fecha_hora_inicio", with = "timestamp")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "fecha_hora_fin", with = "timestamp")]
    pub ends_at: DateTime<Utc>,
    #[serde(rename = "precio_base")]
    pub base_price: f64,
    #[serde(rename = "estado")]
    pub status: ShowtimeStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateShowtime {
    #[serde(rename = "pelicula_id", skip_serializing_if = "Option::is_none")]
    pub movie_id: Option<RecordId>,
    #[serde(rename = "sala_id", skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RecordId>,
    #[serde(rename = "fecha_hora_inicio", skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "fecha_hora_fin", skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "precio_base", skip_serializing_if = "Option::is_none")]
    pub base_price: Option<f64>,
    #[serde(rename = "estado", skip_serializing_if = "Option::is_none")]
    pub status: Option<ShowtimeStatus>,
}

/// New ticket. Reservation time and QR code are filled in when missing.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTicket {
    #[serde(rename = "funcion_id")]
    pub showtime_id: RecordId,
    #[serde(rename = "precio_pagado")]
    pub price_paid: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    #[serde(rename = "fecha_reserva", skip_serializing_if = "Option::is_none")]
    pub reserved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateTicket {
    #[serde(rename = "funcion_id", skip_serializing_if = "Option::is_none")]
    pub showtime_id: Option<RecordId>,
    #[serde(rename = "precio_pagado", skip_serializing_if = "Option::is_none")]
    pub price_paid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTicketSale {
    #[serde(rename = "usuario_id")]
    pub user_id: RecordId,
    #[serde(rename = "boleto_id")]
    pub ticket_id: RecordId,
    #[serde(rename = "precio_final")]
    pub final_price: f64,
    #[serde(rename = "estado_asistencia")]
    pub attendance: String,
    #[serde(rename = "fecha_compra", skip_serializing_if = "Option::is_none")]
    pub purchased_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateTicketSale {
    #[serde(rename = "precio_final", skip_serializing_if = "Option::is_none")]
    pub final_price: Option<f64>,
    #[serde(rename = "estado_asistencia", skip_serializing_if = "Option::is_none")]
    pub attendance: Option<String>,
}

/// New rental. Status defaults to pending when missing.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRental {
    #[serde(rename = "sala_id")]
    pub room_id: RecordId,
    #[serde(rename = "usuario_id", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<RecordId>,
    #[serde(rename = "nombre_evento")]
    pub event_name: String,
    #[serde(rename = "fecha_hora_inicio", with = "timestamp")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "fecha_hora_fin", with = "timestamp")]
    pub ends_at: DateTime<Utc>,
    #[serde(rename = "precio_total")]
    pub total_price: f64,
    #[serde(rename = "estado_renta", skip_serializing_if = "Option::is_none")]
    pub status: Option<RentalStatus>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateRental {
    #[serde(rename = "sala_id", skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RecordId>,
    #[serde(rename = "usuario_id", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<RecordId>,
    #[serde(rename = "nombre_evento", skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(rename = "fecha_hora_inicio", skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "fecha_hora_fin", skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "precio_total", skip_serializing_if = "Option::is_none")]
    pub total_price: Option<f64>,
    #[serde(rename = "estado_renta", skip_serializing_if = "Option::is_none")]
    pub status: Option<RentalStatus>,
}

/// New account. The role defaults to the worker role.
#[derive(Debug, Clone, Serialize)]
pub struct CreateUser {
    #[serde(rename = "cedula")]
    pub national_id: String,
    #[serde(rename = "nombres")]
    pub first_names: String,
    #[serde(rename = "apellidos")]
    pub last_names: String,
    pub email: String,
    #[serde(rename = "tipo_usuario")]
    pub kind: UserKind,
    #[serde(rename = "password_hash")]
    pub password: String,
    #[serde(rename = "rol_id", skip_serializing_if = "Option::is_none")]
    pub role_id: Option<RecordId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateUser {
    #[serde(rename = "cedula", skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(rename = "nombres", skip_serializing_if = "Option::is_none")]
    pub first_names: Option<String>,
    #[serde(rename = "apellidos", skip_serializing_if = "Option::is_none")]
    pub last_names: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "tipo_usuario", skip_serializing_if = "Option::is_none")]
    pub kind: Option<UserKind>,
    #[serde(rename = "rol_id", skip_serializing_if = "Option::is_none")]
    pub role_id: Option<RecordId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRole {
    #[serde(rename = "nombre")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateRole {
    #[serde(rename = "nombre", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
