use chrono::{DateTime, Utc};

use cinesync_core::cinema::{
    require_interval, require_positive, showtime_conflicts, showtimes_between,
    showtimes_for_movie, showtimes_for_room, upcoming_showtimes, CreateShowtime, Showtime,
    ShowtimeStatus, UpdateShowtime, ValidationError,
};
use cinesync_core::store::{FetchError, Order, RecordId, Select, WriteError, WriteOp};

use super::{fetch, movie_summary, room_summary, Movies, Rooms};
use crate::collection::{CollectionCache, Resource};

/// Screenings (`funcion`) with their movie and room embedded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Showtimes;

impl Resource for Showtimes {
    type Record = Showtime;
    type Create = CreateShowtime;
    type Patch = UpdateShowtime;

    const TABLE: &'static str = "funcion";
    const PRIMARY_KEY: &'static str = "funcion_id";

    fn select(&self) -> Select {
        Select::all()
            .to_one("pelicula", Movies::TABLE, "pelicula_id", movie_summary())
            .to_one("sala", Rooms::TABLE, "sala_id", room_summary())
    }

    fn order(&self) -> Vec<Order> {
        vec![Order::asc("fecha_hora_inicio")]
    }

    fn watched_tables(&self) -> Vec<&'static str> {
        vec![Self::TABLE, Movies::TABLE, Rooms::TABLE]
    }

    fn prepare_create(&self, input: CreateShowtime) -> Result<CreateShowtime, ValidationError> {
        require_interval(input.starts_at, input.ends_at)?;
        require_positive("base price", input.base_price)?;
        Ok(input)
    }

    fn prepare_patch(&self, patch: UpdateShowtime) -> Result<UpdateShowtime, ValidationError> {
        if let (Some(starts_at), Some(ends_at)) = (patch.starts_at, patch.ends_at) {
            require_interval(starts_at, ends_at)?;
        }
        if let Some(price) = patch.base_price {
            require_positive("base price", price)?;
        }
        Ok(patch)
    }
}

impl CollectionCache<Showtimes> {
    pub fn for_movie(&self, movie_id: RecordId) -> Vec<Showtime> {
        showtimes_for_movie(&self.snapshot(), movie_id)
    }

    /// Showtimes starting at or after `now`, soonest first.
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<Showtime> {
        upcoming_showtimes(&self.snapshot(), now)
    }

    pub fn for_room(&self, room_id: RecordId) -> Vec<Showtime> {
        showtimes_for_room(&self.snapshot(), room_id)
    }

    /// Showtimes starting inside `[from, to]`, soonest first.
    pub fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Showtime> {
        showtimes_between(&self.snapshot(), from, to)
    }

    /// Whether no scheduled showtime of `room_id` overlaps the window.
    /// Asks the store, not the snapshot.
    pub async fn room_available(
        &self,
        room_id: RecordId,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        exclude: Option<RecordId>,
    ) -> Result<bool, FetchError> {
        let conflicts = self
            .room_conflicts(room_id, starts_at, ends_at, exclude)
            .await?;
        Ok(conflicts.is_empty())
    }

    /// Creates a showtime, refusing rooms already booked for the window.
    pub async fn schedule(&self, input: CreateShowtime) -> Result<Showtime, WriteError> {
        if input.status == ShowtimeStatus::Programada {
            self.ensure_room_free(
                WriteOp::Create,
                input.room_id,
                input.starts_at,
                input.ends_at,
                None,
            )
            .await?;
        }
        self.create(input).await
    }

    /// Moves a showtime to another room or time. Missing fields keep their
    /// cached value when checking the room.
    pub async fn reschedule(
        &self,
        id: RecordId,
        patch: UpdateShowtime,
    ) -> Result<Showtime, WriteError> {
        let fail = |message: String| WriteError::new(Showtimes::TABLE, WriteOp::Update, message);
        let current = self
            .get(id)
            .ok_or_else(|| fail(format!("no row with {} = {id}", Showtimes::PRIMARY_KEY)))?;

        let room_id = patch.room_id.unwrap_or(current.room_id);
        let starts_at = patch.starts_at.unwrap_or(current.starts_at);
        let ends_at = patch.ends_at.unwrap_or(current.ends_at);
        require_interval(starts_at, ends_at).map_err(|e| fail(e.to_string()))?;

        if patch.status.unwrap_or(current.status) == ShowtimeStatus::Programada {
            self.ensure_room_free(WriteOp::Update, room_id, starts_at, ends_at, Some(id))
                .await?;
        }
        self.update(id, patch).await
    }

    pub async fn set_status(
        &self,
        id: RecordId,
        status: ShowtimeStatus,
    ) -> Result<Showtime, WriteError> {
        let patch = UpdateShowtime {
            status: Some(status),
            ..Default::default()
        };
        self.update(id, patch).await
    }

    async fn room_conflicts(
        &self,
        room_id: RecordId,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        exclude: Option<RecordId>,
    ) -> Result<Vec<Showtime>, FetchError> {
        let query = Showtimes
            .query()
            .eq("sala_id", room_id)
            .eq("estado", ShowtimeStatus::Programada.as_str());
        let scheduled: Vec<Showtime> = fetch(self.store().as_ref(), &query).await?;
        Ok(showtime_conflicts(&scheduled, room_id, starts_at, ends_at, exclude)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn ensure_room_free(
        &self,
        op: WriteOp,
        room_id: RecordId,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        exclude: Option<RecordId>,
    ) -> Result<(), WriteError> {
        let conflicts = self
            .room_conflicts(room_id, starts_at, ends_at, exclude)
            .await
            .map_err(|e| WriteError::new(Showtimes::TABLE, op, e.to_string()))?;

        match conflicts.first() {
            None => Ok(()),
            Some(clash) => {
                tracing::debug!(room_id, showtime_id = clash.id, "Room already booked");
                Err(WriteError::new(
                    Showtimes::TABLE,
                    op,
                    format!(
                        "room {room_id} is booked by showtime {} from {} to {}",
                        clash.id, clash.starts_at, clash.ends_at
                    ),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::testing::{empty_store, room, shared};
    use chrono::{Duration, TimeZone};
    use cinesync_core::cinema::ShowtimeStatus;
    use serde_json::json;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    fn screening(movie_id: RecordId, hour: u32) -> CreateShowtime {
        CreateShowtime {
            movie_id,
            room_id: 1,
            starts_at: at(hour),
            ends_at: at(hour) + Duration::hours(2),
            base_price: 4.5,
            status: ShowtimeStatus::Programada,
        }
    }

    async fn showtimes_cache() -> CollectionCache<Showtimes> {
        let store = empty_store().await;
        store
            .seed("sala", vec![room(1, "Sala 1", 50, json!(true))])
            .await
            .unwrap();
        store
            .seed(
                "pelicula",
                vec![
                    json!({"pelicula_id": 1, "titulo": "Coco", "duracion": 105, "clasificacion": "A", "estado": true}),
                    json!({"pelicula_id": 2, "titulo": "Up", "duracion": 96, "clasificacion": "A", "estado": true}),
                ],
            )
            .await
            .unwrap();
        CollectionCache::new(Showtimes, shared(&store), 16)
    }

    #[tokio::test]
    async fn test_create_embeds_movie_and_room() {
        let cache = showtimes_cache().await;
        let showtime = cache.create(screening(1, 18)).await.unwrap();

        assert_eq!(showtime.movie.as_ref().unwrap().title, "Coco");
        assert_eq!(showtime.room.as_ref().unwrap().name, "Sala 1");
    }

    #[tokio::test]
    async fn test_create_rejects_inverted_interval() {
        let cache = showtimes_cache().await;
        let mut input = screening(1, 18);
        input.ends_at = input.starts_at - Duration::minutes(1);

        let err = cache.create(input).await.unwrap_err();
        assert_eq!(err.to_string(), "end time must be after start time");
    }

    #[tokio::test]
    async fn test_for_movie_and_upcoming() {
        let cache = showtimes_cache().await;
        cache.create(screening(1, 20)).await.unwrap();
        cache.create(screening(2, 16)).await.unwrap();
        cache.create(screening(1, 12)).await.unwrap();

        assert_eq!(cache.for_movie(1).len(), 2);

        let upcoming = cache.upcoming(at(14));
        let hours: Vec<DateTime<Utc>> = upcoming.iter().map(|s| s.starts_at).collect();
        assert_eq!(hours, vec![at(16), at(20)]);
    }

    #[tokio::test]
    async fn test_for_room_and_between() {
        let cache = showtimes_cache().await;
        let mut elsewhere = screening(2, 15);
        elsewhere.room_id = 2;
        cache.create(screening(1, 20)).await.unwrap();
        cache.create(elsewhere).await.unwrap();
        cache.create(screening(1, 12)).await.unwrap();

        let hours: Vec<DateTime<Utc>> = cache.for_room(1).iter().map(|s| s.starts_at).collect();
        assert_eq!(hours, vec![at(12), at(20)]);

        let hours: Vec<DateTime<Utc>> = cache
            .between(at(12), at(15))
            .iter()
            .map(|s| s.starts_at)
            .collect();
        assert_eq!(hours, vec![at(12), at(15)]);
    }

    #[tokio::test]
    async fn test_schedule_rejects_booked_room() {
        let cache = showtimes_cache().await;
        let first = cache.schedule(screening(1, 18)).await.unwrap();

        let err = cache.schedule(screening(2, 19)).await.unwrap_err();
        assert_eq!(err.op, WriteOp::Create);
        assert!(err.to_string().contains(&format!("showtime {}", first.id)));
        assert_eq!(cache.len(), 1);

        // Back-to-back is allowed.
        cache.schedule(screening(2, 20)).await.unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_showtime_frees_the_room() {
        let cache = showtimes_cache().await;
        let first = cache.schedule(screening(1, 18)).await.unwrap();
        assert!(!cache.room_available(1, at(19), at(21), None).await.unwrap());

        let cancelled = cache
            .set_status(first.id, ShowtimeStatus::Cancelada)
            .await
            .unwrap();
        assert_eq!(cancelled.status, ShowtimeStatus::Cancelada);
        assert_eq!(cache.get(first.id).unwrap().status, ShowtimeStatus::Cancelada);

        assert!(cache.room_available(1, at(19), at(21), None).await.unwrap());
        cache.schedule(screening(2, 19)).await.unwrap();
    }

    #[tokio::test]
    async fn test_reschedule_ignores_its_own_slot() {
        let cache = showtimes_cache().await;
        let early = cache.schedule(screening(1, 12)).await.unwrap();
        cache.schedule(screening(2, 18)).await.unwrap();

        // Shifting by an hour overlaps only the showtime being moved.
        assert!(cache.room_available(1, at(13), at(15), Some(early.id)).await.unwrap());
        let moved = cache
            .reschedule(
                early.id,
                UpdateShowtime {
                    starts_at: Some(at(13)),
                    ends_at: Some(at(15)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.starts_at, at(13));

        let err = cache
            .reschedule(
                early.id,
                UpdateShowtime {
                    starts_at: Some(at(17)),
                    ends_at: Some(at(19)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.op, WriteOp::Update);
        assert_eq!(cache.get(early.id).unwrap().starts_at, at(13));
    }
}
