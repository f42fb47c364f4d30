use chrono::{DateTime, Utc};

use cinesync_core::cinema::{
    rental_metrics, rental_stats, require_interval, require_positive, require_text,
    room_availability, search_rentals, CreateRental, Rental, RentalStats, RentalStatus, Room,
    RoomAvailability, UpdateRental, ValidationError,
};
use cinesync_core::store::{FetchError, Order, RecordId, Select, WriteError};

use super::{fetch, room_summary, Rooms, Users};
use crate::collection::{CollectionCache, Resource};

/// Private room rentals (`renta_sala`) with room and renter embedded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rentals;

impl Resource for Rentals {
    type Record = Rental;
    type Create = CreateRental;
    type Patch = UpdateRental;

    const TABLE: &'static str = "renta_sala";
    const PRIMARY_KEY: &'static str = "renta_id";

    fn select(&self) -> Select {
        Select::all()
            .to_one("sala", Rooms::TABLE, "sala_id", room_summary())
            .to_one(
                "usuario",
                Users::TABLE,
                "usuario_id",
                Select::columns(["nombres", "apellidos", "email", "cedula"]),
            )
    }

    fn order(&self) -> Vec<Order> {
        vec![Order::desc("fecha_hora_inicio")]
    }

    fn watched_tables(&self) -> Vec<&'static str> {
        vec![Self::TABLE, Rooms::TABLE, Users::TABLE]
    }

    fn prepare_create(&self, mut input: CreateRental) -> Result<CreateRental, ValidationError> {
        require_text("event name", &input.event_name)?;
        require_interval(input.starts_at, input.ends_at)?;
        require_positive("total price", input.total_price)?;
        input.status.get_or_insert(RentalStatus::Pendiente);
        Ok(input)
    }

    fn prepare_patch(&self, patch: UpdateRental) -> Result<UpdateRental, ValidationError> {
        if let Some(name) = &patch.event_name {
            require_text("event name", name)?;
        }
        if let (Some(starts_at), Some(ends_at)) = (patch.starts_at, patch.ends_at) {
            require_interval(starts_at, ends_at)?;
        }
        Ok(patch)
    }

    fn annotate(&self, rental: &mut Rental) {
        rental.metrics = rental_metrics(rental, Utc::now());
    }
}

impl CollectionCache<Rentals> {
    pub fn rental_stats(&self, now: DateTime<Utc>) -> RentalStats {
        rental_stats(&self.snapshot(), now)
    }

    /// Every operative room, marked available or listing the pending and
    /// confirmed rentals that overlap the window.
    pub async fn room_availability(
        &self,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<Vec<RoomAvailability>, FetchError> {
        let rooms: Vec<Room> = fetch(self.store().as_ref(), &Rooms.query()).await?;
        Ok(room_availability(&rooms, &self.snapshot(), starts_at, ends_at))
    }

    pub async fn set_status(
        &self,
        id: RecordId,
        status: RentalStatus,
    ) -> Result<Rental, WriteError> {
        let patch = UpdateRental {
            status: Some(status),
            ..Default::default()
        };
        self.update(id, patch).await
    }

    /// Rentals matching `term` in the event, room or renter name, latest
    /// first.
    pub fn search(&self, term: &str) -> Vec<Rental> {
        search_rentals(&self.snapshot(), term)
    }
}
