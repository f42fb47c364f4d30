use cinesync_core::cinema::{require_positive, require_text, CreateSeat, Seat, SeatStatus, UpdateSeat, ValidationError};
use cinesync_core::store::{Order, RecordId, Select, WriteError};

use super::{room_summary, Rooms};
use crate::collection::{CollectionCache, Resource};

/// Seats of every room (`asiento`), with their room embedded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Seats;

impl Resource for Seats {
    type Record = Seat;
    type Create = CreateSeat;
    type Patch = UpdateSeat;

    const TABLE: &'static str = "asiento";
    const PRIMARY_KEY: &'static str = "asiento_id";

    fn select(&self) -> Select {
        Select::all().to_one("sala", Rooms::TABLE, "sala_id", room_summary())
    }

    fn order(&self) -> Vec<Order> {
        vec![Order::asc("sala_id"), Order::asc("fila"), Order::asc("numero")]
    }

    fn watched_tables(&self) -> Vec<&'static str> {
        vec![Self::TABLE, Rooms::TABLE]
    }

    fn prepare_create(&self, input: CreateSeat) -> Result<CreateSeat, ValidationError> {
        require_text("row", &input.row)?;
        require_positive("number", f64::from(input.number))?;
        Ok(input)
    }
}

impl CollectionCache<Seats> {
    /// Marks a seat as free, taken or under maintenance.
    pub async fn set_status(&self, seat_id: RecordId, status: SeatStatus) -> Result<Seat, WriteError> {
        let patch = UpdateSeat {
            status: Some(status),
            ..Default::default()
        };
        self.update(seat_id, patch).await
    }

    pub fn for_room(&self, room_id: RecordId) -> Vec<Seat> {
        self.snapshot()
            .iter()
            .filter(|seat| seat.room_id == room_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures_util::StreamExt;
    use serde_json::json;

    use cinesync_core::cinema::SeatKind;
    use cinesync_core::store::{Filter, RemoteStore};

    use crate::collection::CacheOptions;
    use crate::resources::testing::{empty_store, room, shared};

    #[tokio::test]
    async fn test_snapshot_embeds_room_and_sorts_by_row() {
        let store = empty_store().await;
        store
            .seed("sala", vec![room(1, "Sala 1", 10, json!(true))])
            .await
            .unwrap();
        let cache = CollectionCache::new(Seats, shared(&store), 16);

        cache
            .create(CreateSeat {
                room_id: 1,
                row: "B".to_string(),
                number: 1,
                kind: SeatKind::Vip,
                status: SeatStatus::Disponible,
            })
            .await
            .unwrap();
        cache
            .create(CreateSeat {
                room_id: 1,
                row: "A".to_string(),
                number: 4,
                kind: SeatKind::Normal,
                status: SeatStatus::Disponible,
            })
            .await
            .unwrap();
        cache.refresh().await.unwrap();

        let seats = cache.snapshot();
        assert_eq!(seats[0].label(), "A4");
        assert_eq!(seats[1].label(), "B1");
        assert_eq!(seats[0].room.as_ref().unwrap().name, "Sala 1");
        assert_eq!(cache.for_room(1).len(), 2);
    }

    #[tokio::test]
    async fn test_set_status_patches_snapshot() {
        let store = empty_store().await;
        store
            .seed("sala", vec![room(1, "Sala 1", 10, json!(true))])
            .await
            .unwrap();
        store
            .seed(
                "asiento",
                vec![json!({
                    "asiento_id": 7,
                    "sala_id": 1,
                    "fila": "C",
                    "numero": 3,
                    "tipo_asiento": "premium",
                    "estado_asiento": "disponible",
                })],
            )
            .await
            .unwrap();
        let cache = CollectionCache::new(Seats, shared(&store), 16);
        cache.refresh().await.unwrap();

        let seat = cache.set_status(7, SeatStatus::Mantenimiento).await.unwrap();

        assert_eq!(seat.status, SeatStatus::Mantenimiento);
        assert_eq!(seat.kind, SeatKind::Premium);
        assert_eq!(cache.get(7).unwrap().status, SeatStatus::Mantenimiento);
    }

    #[tokio::test]
    async fn test_room_rename_refreshes_embedded_room() {
        let store = empty_store().await;
        store
            .seed("sala", vec![room(1, "Sala 1", 10, json!(true))])
            .await
            .unwrap();
        store
            .seed(
                "asiento",
                vec![json!({
                    "asiento_id": 1,
                    "sala_id": 1,
                    "fila": "A",
                    "numero": 1,
                    "tipo_asiento": "normal",
                    "estado_asiento": "disponible",
                })],
            )
            .await
            .unwrap();
        let cache = CollectionCache::start(Seats, shared(&store), store.feed(), CacheOptions::default()).await;
        let mut stream = Box::pin(cache.stream());
        stream.next().await.unwrap();

        store
            .update(
                Rooms::TABLE,
                &[Filter::eq("sala_id", 1)],
                json!({"nombre": "Sala Norte"}),
                &Select::all(),
            )
            .await
            .unwrap();

        let seats = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("refresh after room change")
            .unwrap();
        assert_eq!(seats[0].room.as_ref().unwrap().name, "Sala Norte");
    }
}
