//! Row types of the cinema schema.
//!
//! Field names are English; the serde names are the database columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serde::{comma_list, deserialize_optional_string, optional_timestamp, timestamp};
use crate::store::{Record, RecordId};

use super::metrics::{RentalMetrics, TicketMetrics, UserMetrics};

/// A film in the catalogue (`pelicula`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(rename = "pelicula_id")]
    pub id: RecordId,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "sinopsis", default)]
    pub synopsis: String,
    /// Running time in minutes.
    #[serde(rename = "duracion")]
    pub duration: i32,
    #[serde(rename = "clasificacion")]
    pub rating: String,
    #[serde(rename = "genero", default, with = "comma_list")]
    pub genres: Vec<String>,
    #[serde(
        rename = "url_poster",
        default,
        deserialize_with = "deserialize_optional_string"
    )]
    pub poster_url: Option<String>,
    #[serde(rename = "estado")]
    pub active: bool,
}

impl Record for Movie {
    fn id(&self) -> RecordId {
        self.id
    }
}

/// Operational state of a room. Older rows store a flag, newer ones a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomState {
    Flag(bool),
    Label(String),
}

impl RoomState {
    pub fn is_operational(&self) -> bool {
        match self {
            RoomState::Flag(flag) => *flag,
            RoomState::Label(label) => {
                let label = label.trim().to_lowercase();
                label == "operativa" || label == "activa" || label == "true"
            }
        }
    }
}

impl Default for RoomState {
    fn default() -> Self {
        RoomState::Flag(true)
    }
}

/// A screening room (`sala`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    #[serde(rename = "sala_id")]
    pub id: RecordId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "capacidad_total")]
    pub capacity: i32,
    #[serde(
        rename = "tipo_sala",
        default,
        deserialize_with = "deserialize_optional_string"
    )]
    pub kind: Option<String>,
    #[serde(rename = "estado", default)]
    pub state: RoomState,
}

impl Record for Room {
    fn id(&self) -> RecordId {
        self.id
    }
}

/// Room columns embedded into other rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "tipo_sala", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(
        rename = "capacidad_total",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub capacity: Option<i32>,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RoomState>,
}

/// Movie columns embedded into other rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "duracion", default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(rename = "genero", default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(
        rename = "clasificacion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rating: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatKind {
    Normal,
    Premium,
    Vip,
    Discapacitado,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Disponible,
    Ocupado,
    Mantenimiento,
}

impl SeatStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SeatStatus::Disponible => "disponible",
            SeatStatus::Ocupado => "ocupado",
            SeatStatus::Mantenimiento => "mantenimiento",
        }
    }
}

/// A seat of a room (`asiento`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    #[serde(rename = "asiento_id")]
    pub id: RecordId,
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
    #[serde(rename = "sala", default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomSummary>,
}

impl Seat {
    /// Display label such as `B7`.
    pub fn label(&self) -> String {
        format!("{}{}", self.row, self.number)
    }
}

impl Record for Seat {
    fn id(&self) -> RecordId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowtimeStatus {
    Programada,
    EnCurso,
    Cancelada,
    Finalizada,
}

impl ShowtimeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ShowtimeStatus::Programada => "programada",
            ShowtimeStatus::EnCurso => "en_curso",
            ShowtimeStatus::Cancelada => "cancelada",
            ShowtimeStatus::Finalizada => "finalizada",
        }
    }
}

/// A screening of a movie in a room (`funcion`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Showtime {
    #[serde(rename = "funcion_id")]
    pub id: RecordId,
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
    #[serde(rename = "pelicula", default, skip_serializing_if = "Option::is_none")]
    pub movie: Option<MovieSummary>,
    #[serde(rename = "sala", default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomSummary>,
}

impl Record for Showtime {
    fn id(&self) -> RecordId {
        self.id
    }
}

/// Showtime columns embedded into a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketShowtime {
    #[serde(rename = "fecha_hora_inicio", with = "timestamp")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "fecha_hora_fin", with = "timestamp")]
    pub ends_at: DateTime<Utc>,
    #[serde(rename = "precio_base")]
    pub base_price: f64,
    #[serde(rename = "pelicula", default, skip_serializing_if = "Option::is_none")]
    pub movie: Option<MovieSummary>,
    #[serde(rename = "sala", default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomSummary>,
}

/// A sellable ticket for a showtime (`boleto`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(rename = "boleto_id")]
    pub id: RecordId,
    #[serde(rename = "funcion_id")]
    pub showtime_id: RecordId,
    #[serde(rename = "fecha_reserva", with = "timestamp")]
    pub reserved_at: DateTime<Utc>,
    #[serde(rename = "precio_pagado")]
    pub price_paid: f64,
    pub qr: String,
    #[serde(rename = "funcion", default, skip_serializing_if = "Option::is_none")]
    pub showtime: Option<TicketShowtime>,
    #[serde(rename = "metricas", default)]
    pub metrics: TicketMetrics,
}

impl Ticket {
    pub fn movie_title(&self) -> Option<&str> {
        self.showtime
            .as_ref()
            .and_then(|s| s.movie.as_ref())
            .map(|m| m.title.as_str())
    }

    pub fn room_name(&self) -> Option<&str> {
        self.showtime
            .as_ref()
            .and_then(|s| s.room.as_ref())
            .map(|r| r.name.as_str())
    }
}

impl Record for Ticket {
    fn id(&self) -> RecordId {
        self.id
    }
}

/// A ticket purchased by a user (`usuario_boleto`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketSale {
    #[serde(rename = "usuario_boleto_id")]
    pub id: RecordId,
    #[serde(rename = "usuario_id")]
    pub user_id: RecordId,
    #[serde(rename = "boleto_id")]
    pub ticket_id: RecordId,
    #[serde(rename = "precio_final")]
    pub final_price: f64,
    #[serde(rename = "estado_asistencia")]
    pub attendance: String,
    #[serde(rename = "fecha_compra", with = "timestamp")]
    pub purchased_at: DateTime<Utc>,
}

impl TicketSale {
    pub fn attendance_confirmed(&self) -> bool {
        self.attendance.eq_ignore_ascii_case("confirmada")
    }
}

impl Record for TicketSale {
    fn id(&self) -> RecordId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RentalStatus {
    Pendiente,
    Confirmada,
    Cancelada,
    Completada,
}

impl RentalStatus {
    /// Pending and confirmed rentals hold the room.
    pub fn blocks_room(self) -> bool {
        matches!(self, RentalStatus::Pendiente | RentalStatus::Confirmada)
    }
}

/// User columns embedded into a rental.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "nombres")]
    pub first_names: String,
    #[serde(rename = "apellidos")]
    pub last_names: String,
    pub email: String,
    #[serde(rename = "cedula")]
    pub national_id: String,
}

/// A private booking of a room (`renta_sala`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rental {
    #[serde(rename = "renta_id")]
    pub id: RecordId,
    #[serde(rename = "sala_id")]
    pub room_id: RecordId,
    #[serde(rename = "usuario_id", default)]
    pub user_id: Option<RecordId>,
    #[serde(rename = "nombre_evento")]
    pub event_name: String,
    #[serde(rename = "fecha_hora_inicio", with = "timestamp")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "fecha_hora_fin", with = "timestamp")]
    pub ends_at: DateTime<Utc>,
    #[serde(rename = "precio_total")]
    pub total_price: f64,
    #[serde(rename = "estado_renta")]
    pub status: RentalStatus,
    #[serde(rename = "sala", default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomSummary>,
    #[serde(rename = "usuario", default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(rename = "metricas", default)]
    pub metrics: RentalMetrics,
}

impl Record for Rental {
    fn id(&self) -> RecordId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserKind {
    Trabajador,
    Estudiante,
}

/// Role columns embedded into a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSummary {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(
        rename = "fecha_creacion",
        default,
        with = "optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// A dashboard or customer account (`usuario`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "usuario_id")]
    pub id: RecordId,
    #[serde(rename = "cedula")]
    pub national_id: String,
    #[serde(rename = "rol_id")]
    pub role_id: RecordId,
    #[serde(rename = "nombres")]
    pub first_names: String,
    #[serde(rename = "apellidos")]
    pub last_names: String,
    pub email: String,
    #[serde(rename = "tipo_usuario")]
    pub kind: UserKind,
    #[serde(default)]
    pub password_hash: String,
    #[serde(rename = "rol", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleSummary>,
    #[serde(rename = "metricas", default)]
    pub metrics: UserMetrics,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_names, self.last_names)
    }

    /// True when the embedded role is the administrator role.
    pub fn is_admin(&self) -> bool {
        self.role
            .as_ref()
            .is_some_and(|role| role.name.trim().eq_ignore_ascii_case(ADMIN_ROLE))
    }
}

impl Record for User {
    fn id(&self) -> RecordId {
        self.id
    }
}

/// Name of the role allowed into the dashboard.
pub const ADMIN_ROLE: &str = "administrador";

/// Role assigned to accounts created from the dashboard.
pub const DEFAULT_ROLE_ID: RecordId = 2;

/// A user role (`rol`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    #[serde(rename = "rol_id")]
    pub id: RecordId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(
        rename = "fecha_creacion",
        default,
        with = "optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Role {
    fn id(&self) -> RecordId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_movie_from_row() {
        let movie: Movie = serde_json::from_value(json!({
            "pelicula_id": 4,
            "titulo": "Dune",
            "sinopsis": "Arrakis",
            "duracion": 155,
            "clasificacion": "PG-13",
            "genero": "Ciencia ficción, Aventura",
            "url_poster": "",
            "estado": true
        }))
        .unwrap();

        assert_eq!(movie.id(), 4);
        assert_eq!(movie.genres, vec!["Ciencia ficción", "Aventura"]);
        assert_eq!(movie.poster_url, None);
    }

    #[test]
    fn test_room_state_accepts_flag_and_label() {
        let flag: Room = serde_json::from_value(
            json!({"sala_id": 1, "nombre": "A", "capacidad_total": 50, "estado": false}),
        )
        .unwrap();
        assert!(!flag.state.is_operational());

        let label: Room = serde_json::from_value(
            json!({"sala_id": 2, "nombre": "B", "capacidad_total": 80, "estado": "Operativa"}),
        )
        .unwrap();
        assert!(label.state.is_operational());
    }

    #[test]
    fn test_ticket_with_embedded_showtime() {
        let ticket: Ticket = serde_json::from_value(json!({
            "boleto_id": 9,
            "funcion_id": 3,
            "fecha_reserva": "2024-05-01T18:00:00+00:00",
            "precio_pagado": 7.5,
            "qr": "abc",
            "funcion": {
                "fecha_hora_inicio": "2024-05-02T20:00:00",
                "fecha_hora_fin": "2024-05-02T22:00:00",
                "precio_base": 7.5,
                "pelicula": {"titulo": "Alien", "duracion": 117, "clasificacion": "R"},
                "sala": {"nombre": "Sala 2", "capacidad_total": 90}
            }
        }))
        .unwrap();

        assert_eq!(ticket.movie_title(), Some("Alien"));
        assert_eq!(ticket.room_name(), Some("Sala 2"));
        assert_eq!(ticket.metrics, TicketMetrics::default());
    }

    #[test]
    fn test_user_is_admin_case_insensitive() {
        let user: User = serde_json::from_value(json!({
            "usuario_id": 1,
            "cedula": "0102",
            "rol_id": 1,
            "nombres": "Ana",
            "apellidos": "Paz",
            "email": "ana@example.com",
            "tipo_usuario": "trabajador",
            "password_hash": "x",
            "rol": {"nombre": "Administrador"}
        }))
        .unwrap();

        assert!(user.is_admin());
        assert_eq!(user.full_name(), "Ana Paz");
    }

    #[test]
    fn test_showtime_status_snake_case() {
        assert_eq!(
            serde_json::to_value(ShowtimeStatus::EnCurso).unwrap(),
            json!("en_curso")
        );
    }

    #[test]
    fn test_rental_status_blocks_room() {
        assert!(RentalStatus::Pendiente.blocks_room());
        assert!(RentalStatus::Confirmada.blocks_room());
        assert!(!RentalStatus::Cancelada.blocks_room());
        assert!(!RentalStatus::Completada.blocks_room());
    }
}
