use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use cinesync_core::store::Result;

use crate::collection::Resource;
use crate::memory::MemoryStore;
use crate::resources::{
    Movies, Rentals, Roles, Rooms, Seats, Showtimes, TicketSales, Tickets, Users,
};

/// Email and password of the seeded administrator.
pub const DEMO_ADMIN: (&str, &str) = ("admin@cinesync.local", "admin123");

fn ts(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339())
}

/// Registers every table and fills it with a small cinema, with showtimes
/// and rentals spread around the current time.
pub async fn seed_demo(store: &MemoryStore) -> Result<()> {
    let tables = [
        (Movies::TABLE, Movies::PRIMARY_KEY),
        (Rooms::TABLE, Rooms::PRIMARY_KEY),
        (Seats::TABLE, Seats::PRIMARY_KEY),
        (Showtimes::TABLE, Showtimes::PRIMARY_KEY),
        (Tickets::TABLE, Tickets::PRIMARY_KEY),
        (TicketSales::TABLE, TicketSales::PRIMARY_KEY),
        (Rentals::TABLE, Rentals::PRIMARY_KEY),
        (Users::TABLE, Users::PRIMARY_KEY),
        (Roles::TABLE, Roles::PRIMARY_KEY),
    ];
    for (table, key) in tables {
        store.register_table(table, key).await;
    }

    let now = Utc::now();
    let (admin_email, admin_password) = DEMO_ADMIN;

    store
        .seed(
            Roles::TABLE,
            vec![
                json!({"rol_id": 1, "nombre": "administrador", "fecha_creacion": ts(now - Duration::days(90))}),
                json!({"rol_id": 2, "nombre": "trabajador", "fecha_creacion": ts(now - Duration::days(90))}),
            ],
        )
        .await?;

    store
        .seed(
            Users::TABLE,
            vec![
                json!({
                    "usuario_id": 1, "cedula": "0100000001", "rol_id": 1,
                    "nombres": "Marta", "apellidos": "Salinas",
                    "email": admin_email, "tipo_usuario": "trabajador",
                    "password_hash": admin_password,
                }),
                json!({
                    "usuario_id": 2, "cedula": "0100000002", "rol_id": 2,
                    "nombres": "Diego", "apellidos": "Paredes",
                    "email": "diego@cinesync.local", "tipo_usuario": "trabajador",
                    "password_hash": "taquilla",
                }),
                json!({
                    "usuario_id": 3, "cedula": "0100000003", "rol_id": 2,
                    "nombres": "Lucía", "apellidos": "Andrade",
                    "email": "lucia@cinesync.local", "tipo_usuario": "estudiante",
                    "password_hash": "lucia2024",
                }),
            ],
        )
        .await?;

    store
        .seed(
            Movies::TABLE,
            vec![
                json!({
                    "pelicula_id": 1, "titulo": "Coco", "duracion": 105, "clasificacion": "A",
                    "genero": "Animación, Familia", "sinopsis": "Un niño viaja a la Tierra de los Muertos.",
                    "url_poster": "", "estado": true,
                }),
                json!({
                    "pelicula_id": 2, "titulo": "Dune", "duracion": 155, "clasificacion": "B",
                    "genero": "Ciencia ficción", "sinopsis": "Arrakis, la especia y una familia noble.",
                    "url_poster": null, "estado": true,
                }),
                json!({
                    "pelicula_id": 3, "titulo": "Roma", "duracion": 135, "clasificacion": "B",
                    "genero": "Drama", "sinopsis": "Un año en la vida de una familia en la Ciudad de México.",
                    "estado": false,
                }),
            ],
        )
        .await?;

    store
        .seed(
            Rooms::TABLE,
            vec![
                json!({"sala_id": 1, "nombre": "Sala 1", "capacidad_total": 8, "tipo_sala": "2D", "estado": true}),
                json!({"sala_id": 2, "nombre": "Sala VIP", "capacidad_total": 4, "tipo_sala": "VIP", "estado": "operativa"}),
                json!({"sala_id": 3, "nombre": "Sala 3D", "capacidad_total": 8, "tipo_sala": "3D", "estado": "mantenimiento"}),
            ],
        )
        .await?;

    let mut seats = Vec::new();
    let mut seat_id = 1;
    for (room_id, rows, kind) in [(1, ["A", "B"], "normal"), (2, ["A", "A"], "vip")] {
        for (row_index, row) in rows.iter().enumerate() {
            let numbers: i64 = if room_id == 2 { 2 } else { 4 };
            for number in 1..=numbers {
                let number = if room_id == 2 { number + row_index as i64 * 2 } else { number };
                let status = match seat_id % 5 {
                    0 => "ocupado",
                    4 if room_id == 1 => "mantenimiento",
                    _ => "disponible",
                };
                seats.push(json!({
                    "asiento_id": seat_id, "sala_id": room_id, "fila": row, "numero": number,
                    "tipo_asiento": kind, "estado_asiento": status,
                }));
                seat_id += 1;
            }
        }
    }
    store.seed(Seats::TABLE, seats).await?;

    let showtime = |id: i64, movie_id: i64, room_id: i64, starts_at: DateTime<Utc>, minutes: i64, price: f64| {
        json!({
            "funcion_id": id, "pelicula_id": movie_id, "sala_id": room_id,
            "fecha_hora_inicio": ts(starts_at),
            "fecha_hora_fin": ts(starts_at + Duration::minutes(minutes)),
            "precio_base": price, "estado": "programada",
        })
    };
    store
        .seed(
            Showtimes::TABLE,
            vec![
                showtime(1, 1, 1, now - Duration::hours(3), 105, 4.5),
                showtime(2, 1, 1, now + Duration::hours(2), 105, 4.5),
                showtime(3, 2, 2, now + Duration::hours(4), 155, 9.0),
                showtime(4, 2, 1, now + Duration::days(1), 155, 5.5),
            ],
        )
        .await?;

    let ticket = |id: i64, showtime_id: i64, price: f64, reserved_at: DateTime<Utc>| {
        json!({
            "boleto_id": id, "funcion_id": showtime_id, "precio_pagado": price,
            "fecha_reserva": ts(reserved_at), "qr": format!("DEMO-{id:04}"),
        })
    };
    store
        .seed(
            Tickets::TABLE,
            vec![
                ticket(1, 1, 4.5, now - Duration::days(1)),
                ticket(2, 2, 4.5, now - Duration::hours(5)),
                ticket(3, 3, 9.0, now - Duration::hours(1)),
            ],
        )
        .await?;

    let sale = |id: i64, user_id: i64, ticket_id: i64, price: f64, attendance: &str, purchased_at: DateTime<Utc>| {
        json!({
            "usuario_boleto_id": id, "usuario_id": user_id, "boleto_id": ticket_id,
            "precio_final": price, "estado_asistencia": attendance,
            "fecha_compra": ts(purchased_at),
        })
    };
    store
        .seed(
            TicketSales::TABLE,
            vec![
                sale(1, 3, 1, 3.5, "confirmada", now - Duration::days(1)),
                sale(2, 2, 2, 4.5, "pendiente", now - Duration::hours(5)),
                sale(3, 3, 3, 9.0, "pendiente", now - Duration::hours(1)),
            ],
        )
        .await?;

    let rental = |id: i64, room_id: i64, user_id: i64, name: &str, starts_at: DateTime<Utc>, hours: i64, price: f64, status: &str| {
        json!({
            "renta_id": id, "sala_id": room_id, "usuario_id": user_id,
            "nombre_evento": name,
            "fecha_hora_inicio": ts(starts_at),
            "fecha_hora_fin": ts(starts_at + Duration::hours(hours)),
            "precio_total": price, "estado_renta": status,
        })
    };
    store
        .seed(
            Rentals::TABLE,
            vec![
                rental(1, 2, 2, "Estreno privado", now + Duration::days(3), 3, 450.0, "Confirmada"),
                rental(2, 1, 3, "Cumpleaños", now + Duration::days(10), 2, 180.0, "Pendiente"),
                rental(3, 1, 2, "Capacitación", now - Duration::days(20), 4, 300.0, "Completada"),
            ],
        )
        .await?;

    tracing::debug!("Demo data seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinesync_core::store::{Query, RemoteStore};

    #[tokio::test]
    async fn test_seed_demo_fills_every_table() {
        let store = MemoryStore::new();
        seed_demo(&store).await.unwrap();

        for table in ["pelicula", "sala", "asiento", "funcion", "boleto", "usuario_boleto", "renta_sala", "usuario", "rol"] {
            let rows = store.select(&Query::new(table)).await.unwrap();
            assert!(!rows.is_empty(), "{table} should be seeded");
        }
    }

    #[tokio::test]
    async fn test_seeded_seats_are_unique_per_room() {
        let store = MemoryStore::new();
        seed_demo(&store).await.unwrap();

        let rows = store.select(&Query::new("asiento")).await.unwrap();
        let mut labels: Vec<String> = rows
            .iter()
            .map(|r| format!("{}-{}{}", r["sala_id"], r["fila"].as_str().unwrap(), r["numero"]))
            .collect();
        let total = labels.len();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), total);
    }
}
