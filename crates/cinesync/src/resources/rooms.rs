use serde_json::Value;

use cinesync_core::cinema::{
    active_rooms, available_seats, rental_price, require_positive, require_text, room_seat_stats,
    CreateRoom, Room, RoomSeatStats, Seat, SeatStatus, UpdateRoom, ValidationError,
};
use cinesync_core::store::{FetchError, Filter, Order, Query, RecordId, Select};

use super::{fetch, Seats};
use crate::collection::{CollectionCache, Resource};

/// Screening rooms (`sala`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Rooms;

const SEATS_ALIAS: &str = "asientos";

impl Resource for Rooms {
    type Record = Room;
    type Create = CreateRoom;
    type Patch = UpdateRoom;

    const TABLE: &'static str = "sala";
    const PRIMARY_KEY: &'static str = "sala_id";

    fn order(&self) -> Vec<Order> {
        vec![Order::asc("sala_id")]
    }

    fn prepare_create(&self, input: CreateRoom) -> Result<CreateRoom, ValidationError> {
        require_text("name", &input.name)?;
        require_positive("capacity", f64::from(input.capacity))?;
        Ok(input)
    }

    fn prepare_patch(&self, patch: UpdateRoom) -> Result<UpdateRoom, ValidationError> {
        if let Some(name) = &patch.name {
            require_text("name", name)?;
        }
        if let Some(capacity) = patch.capacity {
            require_positive("capacity", f64::from(capacity))?;
        }
        Ok(patch)
    }
}

impl CollectionCache<Rooms> {
    /// Rooms currently in operation.
    pub fn active_rooms(&self) -> Vec<Room> {
        active_rooms(&self.snapshot())
    }

    /// Seat occupancy per room, read with a single query that embeds each
    /// room's seats.
    pub async fn room_seat_stats(&self) -> Result<Vec<RoomSeatStats>, FetchError> {
        let query = Query::new(Rooms::TABLE)
            .select(Select::all().to_many(SEATS_ALIAS, Seats::TABLE, "sala_id", Select::all()))
            .order_by(Order::asc("sala_id"));
        let rows = self
            .store()
            .select(&query)
            .await
            .map_err(|e| FetchError::from_store(Rooms::TABLE, &e))?;

        let decode = |e: serde_json::Error| FetchError::new(Rooms::TABLE, e.to_string());
        let mut rooms = Vec::with_capacity(rows.len());
        let mut seats = Vec::new();
        for mut row in rows {
            let embedded = row
                .as_object_mut()
                .and_then(|fields| fields.remove(SEATS_ALIAS))
                .unwrap_or_else(|| Value::Array(Vec::new()));
            rooms.push(serde_json::from_value::<Room>(row).map_err(decode)?);
            seats.extend(serde_json::from_value::<Vec<Seat>>(embedded).map_err(decode)?);
        }
        Ok(room_seat_stats(&rooms, &seats))
    }

    /// Free seats of one room, fetched directly from the store.
    pub async fn available_seats(&self, room_id: RecordId) -> Result<Vec<Seat>, FetchError> {
        let query = Query::new(Seats::TABLE)
            .filter(Filter::eq("sala_id", room_id))
            .filter(Filter::eq("estado_asiento", SeatStatus::Disponible.as_str()))
            .order_by(Order::asc("fila"))
            .order_by(Order::asc("numero"));
        let seats: Vec<Seat> = fetch(self.store().as_ref(), &query).await?;
        Ok(available_seats(&seats, room_id))
    }

    /// Suggested price for renting a room, billed by its kind. Rooms missing
    /// from the snapshot are billed as standard rooms.
    pub fn rental_quote(
        &self,
        room_id: RecordId,
        hours: f64,
        event_kind: &str,
    ) -> Result<f64, ValidationError> {
        let kind = self.get(room_id).and_then(|room| room.kind);
        rental_price(kind.as_deref(), hours, event_kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::testing::{empty_store, room, shared};
    use serde_json::json;

    fn seat(id: i64, room_id: i64, row: &str, number: i64, status: &str) -> Value {
        json!({
            "asiento_id": id,
            "sala_id": room_id,
            "fila": row,
            "numero": number,
            "tipo_asiento": "normal",
            "estado_asiento": status,
        })
    }

    async fn rooms_cache() -> CollectionCache<Rooms> {
        let store = empty_store().await;
        store
            .seed(
                "sala",
                vec![
                    room(1, "Sala 1", 3, json!(true)),
                    room(2, "Sala 2", 2, json!("mantenimiento")),
                ],
            )
            .await
            .unwrap();
        store
            .seed(
                "asiento",
                vec![
                    seat(1, 1, "A", 2, "disponible"),
                    seat(2, 1, "A", 1, "disponible"),
                    seat(3, 1, "B", 1, "ocupado"),
                    seat(4, 2, "A", 1, "mantenimiento"),
                ],
            )
            .await
            .unwrap();
        let cache = CollectionCache::new(Rooms, shared(&store), 16);
        cache.refresh().await.unwrap();
        cache
    }

    #[tokio::test]
    async fn test_active_rooms_skips_rooms_out_of_service() {
        let cache = rooms_cache().await;
        let active = cache.active_rooms();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Sala 1");
    }

    #[tokio::test]
    async fn test_room_seat_stats() {
        let cache = rooms_cache().await;
        let stats = cache.room_seat_stats().await.unwrap();

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].total_seats, 3);
        assert_eq!(stats[0].available, 2);
        assert_eq!(stats[0].occupied, 1);
        assert_eq!(stats[1].maintenance, 1);
    }

    #[tokio::test]
    async fn test_available_seats_in_row_order() {
        let cache = rooms_cache().await;
        let seats = cache.available_seats(1).await.unwrap();
        let labels: Vec<String> = seats.iter().map(Seat::label).collect();
        assert_eq!(labels, vec!["A1", "A2"]);
    }

    #[tokio::test]
    async fn test_create_rejects_zero_capacity() {
        let cache = rooms_cache().await;
        let err = cache
            .create(CreateRoom {
                name: "Sala 3".to_string(),
                capacity: 0,
                kind: None,
                active: true,
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "capacity must be greater than zero");
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_rental_quote_uses_room_kind() {
        let cache = rooms_cache().await;
        assert_eq!(cache.rental_quote(1, 2.0, "fiesta"), Ok(150.0));

        cache
            .update(
                1,
                UpdateRoom {
                    kind: Some("VIP".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cache.rental_quote(1, 2.0, "fiesta"), Ok(300.0));
        assert_eq!(cache.rental_quote(99, 2.0, "conferencia"), Ok(100.0));
        assert!(cache.rental_quote(1, -1.0, "fiesta").is_err());
    }
}
