use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use cinesync_core::cinema::{
    require_positive, ticket_metrics, ticket_stats, CreateTicket, Ticket, TicketSale, TicketStats,
    UpdateTicket, ValidationError,
};
use cinesync_core::store::{self, FetchError, Order, RemoteStore, Select};

use super::{fetch, movie_summary, room_summary, Movies, Rooms, Showtimes, TicketSales};
use crate::collection::{decode_rows, CollectionCache, Resource};

/// Issued tickets (`boleto`) with their showtime embedded and per-ticket
/// sales metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tickets;

#[async_trait]
impl Resource for Tickets {
    type Record = Ticket;
    type Create = CreateTicket;
    type Patch = UpdateTicket;

    const TABLE: &'static str = "boleto";
    const PRIMARY_KEY: &'static str = "boleto_id";

    fn select(&self) -> Select {
        let showtime = Select::columns(["fecha_hora_inicio", "fecha_hora_fin", "precio_base"])
            .to_one("pelicula", Movies::TABLE, "pelicula_id", movie_summary())
            .to_one("sala", Rooms::TABLE, "sala_id", room_summary());
        Select::all().to_one("funcion", Showtimes::TABLE, "funcion_id", showtime)
    }

    fn order(&self) -> Vec<Order> {
        vec![Order::desc("fecha_reserva")]
    }

    /// Embedded tables and the sales behind the metrics invalidate the
    /// collection too.
    fn watched_tables(&self) -> Vec<&'static str> {
        vec![
            Self::TABLE,
            Showtimes::TABLE,
            Movies::TABLE,
            Rooms::TABLE,
            TicketSales::TABLE,
        ]
    }

    async fn load(&self, store: &dyn RemoteStore) -> store::Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = decode_rows(store.select(&self.query()).await?)?;
        let sales: Vec<TicketSale> = decode_rows(store.select(&TicketSales.query()).await?)?;

        let metrics = ticket_metrics(&sales);
        for ticket in &mut tickets {
            ticket.metrics = metrics.get(&ticket.id).cloned().unwrap_or_default();
        }
        Ok(tickets)
    }

    fn prepare_create(&self, mut input: CreateTicket) -> Result<CreateTicket, ValidationError> {
        require_positive("price paid", input.price_paid)?;
        input.reserved_at.get_or_insert_with(Utc::now);
        if input.qr.as_deref().is_none_or(|qr| qr.trim().is_empty()) {
            input.qr = Some(Uuid::new_v4().to_string());
        }
        Ok(input)
    }
}

impl CollectionCache<Tickets> {
    /// Dashboard figures over the current tickets and every sale.
    pub async fn ticket_stats(&self, now: DateTime<Utc>) -> Result<TicketStats, FetchError> {
        let sales: Vec<TicketSale> = fetch(self.store().as_ref(), &TicketSales.query()).await?;
        Ok(ticket_stats(&self.snapshot(), &sales, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::testing::{empty_store, room, shared};
    use crate::memory::MemoryStore;
    use chrono::TimeZone;
    use serde_json::json;

    async fn store() -> MemoryStore {
        let store = empty_store().await;
        store
            .seed("sala", vec![room(1, "Sala 1", 50, json!(true))])
            .await
            .unwrap();
        store
            .seed(
                "pelicula",
                vec![json!({"pelicula_id": 1, "titulo": "Coco", "duracion": 105, "clasificacion": "A", "estado": true})],
            )
            .await
            .unwrap();
        store
            .seed(
                "funcion",
                vec![json!({
                    "funcion_id": 3,
                    "pelicula_id": 1,
                    "sala_id": 1,
                    "fecha_hora_inicio": "2024-06-01T18:00:00",
                    "fecha_hora_fin": "2024-06-01T20:00:00",
                    "precio_base": 5.0,
                    "estado": "programada",
                })],
            )
            .await
            .unwrap();
        store
            .seed(
                "boleto",
                vec![
                    json!({"boleto_id": 1, "funcion_id": 3, "fecha_reserva": "2024-06-01T10:00:00", "precio_pagado": 5.0, "qr": "a"}),
                    json!({"boleto_id": 2, "funcion_id": 3, "fecha_reserva": "2024-06-01T11:00:00", "precio_pagado": 5.0, "qr": "b"}),
                ],
            )
            .await
            .unwrap();
        store
            .seed(
                "usuario_boleto",
                vec![
                    json!({"usuario_boleto_id": 1, "usuario_id": 1, "boleto_id": 1, "precio_final": 5.0, "estado_asistencia": "confirmada", "fecha_compra": "2024-06-01T10:00:00"}),
                    json!({"usuario_boleto_id": 2, "usuario_id": 2, "boleto_id": 1, "precio_final": 4.0, "estado_asistencia": "pendiente", "fecha_compra": "2024-06-01T10:30:00"}),
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_load_attaches_metrics_with_one_sales_query() {
        let store = store().await;
        let cache = CollectionCache::new(Tickets, shared(&store), 16);
        cache.refresh().await.unwrap();

        let tickets = cache.snapshot();
        // Newest reservation first.
        assert_eq!(tickets[0].id, 2);
        assert_eq!(tickets[0].metrics.total_sold, 0);
        assert_eq!(tickets[1].metrics.total_sold, 2);
        assert_eq!(tickets[1].metrics.total_revenue, 9.0);
        assert_eq!(tickets[1].metrics.confirmed_attendance, 1);
        assert_eq!(tickets[1].movie_title(), Some("Coco"));
        assert_eq!(store.select_count("usuario_boleto"), 1);
    }

    #[tokio::test]
    async fn test_create_fills_reservation_time_and_qr() {
        let store = store().await;
        let cache = CollectionCache::new(Tickets, shared(&store), 16);

        let first = cache
            .create(CreateTicket {
                showtime_id: 3,
                price_paid: 5.0,
                qr: None,
                reserved_at: None,
            })
            .await
            .unwrap();
        let second = cache
            .create(CreateTicket {
                showtime_id: 3,
                price_paid: 5.0,
                qr: None,
                reserved_at: None,
            })
            .await
            .unwrap();

        assert!(!first.qr.is_empty());
        assert_ne!(first.qr, second.qr);
        assert!(Utc::now() - first.reserved_at < chrono::Duration::minutes(1));
        assert_eq!(first.room_name(), Some("Sala 1"));
    }

    #[tokio::test]
    async fn test_ticket_stats() {
        let store = store().await;
        let cache = CollectionCache::new(Tickets, shared(&store), 16);
        cache.refresh().await.unwrap();

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let stats = cache.ticket_stats(now).await.unwrap();

        assert_eq!(stats.total_tickets, 2);
        assert_eq!(stats.sold_today, 2);
        assert_eq!(stats.total_revenue, 9.0);
        assert_eq!(stats.tickets_with_sales, 1);
    }
}
