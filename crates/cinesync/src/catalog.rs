//! Composition root owning one collection cache per table.

use std::sync::Arc;

use cinesync_core::store::{ChangeFeed, RemoteStore};

use crate::collection::{CacheOptions, CollectionCache};
use crate::resources::{
    Movies, Rentals, Roles, Rooms, Seats, Showtimes, TicketSales, Tickets, Users,
};

/// Every mirrored collection of the dashboard.
#[derive(Clone)]
pub struct Catalog {
    pub movies: CollectionCache<Movies>,
    pub rooms: CollectionCache<Rooms>,
    pub seats: CollectionCache<Seats>,
    pub showtimes: CollectionCache<Showtimes>,
    pub tickets: CollectionCache<Tickets>,
    pub ticket_sales: CollectionCache<TicketSales>,
    pub rentals: CollectionCache<Rentals>,
    pub users: CollectionCache<Users>,
    pub roles: CollectionCache<Roles>,
}

impl Catalog {
    /// Starts every cache concurrently: subscribe, initial fetch, listen.
    pub async fn open(
        store: Arc<dyn RemoteStore>,
        feed: &dyn ChangeFeed,
        options: CacheOptions,
    ) -> Self {
        let (movies, rooms, seats, showtimes, tickets, ticket_sales, rentals, users, roles) = tokio::join!(
            CollectionCache::start(Movies, store.clone(), feed, options.clone()),
            CollectionCache::start(Rooms, store.clone(), feed, options.clone()),
            CollectionCache::start(Seats, store.clone(), feed, options.clone()),
            CollectionCache::start(Showtimes, store.clone(), feed, options.clone()),
            CollectionCache::start(Tickets, store.clone(), feed, options.clone()),
            CollectionCache::start(TicketSales, store.clone(), feed, options.clone()),
            CollectionCache::start(Rentals, store.clone(), feed, options.clone()),
            CollectionCache::start(Users, store.clone(), feed, options.clone()),
            CollectionCache::start(Roles, store, feed, options),
        );

        let catalog = Self {
            movies,
            rooms,
            seats,
            showtimes,
            tickets,
            ticket_sales,
            rentals,
            users,
            roles,
        };
        tracing::info!(
            movies = catalog.movies.len(),
            rooms = catalog.rooms.len(),
            seats = catalog.seats.len(),
            showtimes = catalog.showtimes.len(),
            tickets = catalog.tickets.len(),
            rentals = catalog.rentals.len(),
            users = catalog.users.len(),
            "Catalog opened"
        );
        catalog
    }

    /// Tables mirrored by the catalog, in display order.
    pub fn tables(&self) -> [&'static str; 9] {
        [
            self.movies.table(),
            self.rooms.table(),
            self.seats.table(),
            self.showtimes.table(),
            self.tickets.table(),
            self.ticket_sales.table(),
            self.rentals.table(),
            self.users.table(),
            self.roles.table(),
        ]
    }

    pub fn dispose(&self) {
        self.movies.dispose();
        self.rooms.dispose();
        self.seats.dispose();
        self.showtimes.dispose();
        self.tickets.dispose();
        self.ticket_sales.dispose();
        self.rentals.dispose();
        self.users.dispose();
        self.roles.dispose();
        tracing::info!("Catalog disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures_util::StreamExt;

    use cinesync_core::cinema::{CreateTicketSale, SeatStatus};

    use crate::mock_data::seed_demo;
    use crate::memory::MemoryStore;

    async fn demo_catalog() -> (MemoryStore, Catalog) {
        let store = MemoryStore::new();
        seed_demo(&store).await.unwrap();
        let catalog = Catalog::open(Arc::new(store.clone()), store.feed(), CacheOptions::default()).await;
        (store, catalog)
    }

    #[tokio::test]
    async fn test_open_loads_every_table() {
        let (_store, catalog) = demo_catalog().await;

        assert!(!catalog.movies.is_empty());
        assert!(!catalog.rooms.is_empty());
        assert!(!catalog.seats.is_empty());
        assert!(!catalog.showtimes.is_empty());
        assert!(!catalog.tickets.is_empty());
        assert!(!catalog.users.is_empty());
        assert!(!catalog.roles.is_empty());
        assert_eq!(catalog.tables()[0], "pelicula");
    }

    #[tokio::test]
    async fn test_sale_refreshes_ticket_metrics() {
        let (_store, catalog) = demo_catalog().await;
        let ticket = catalog.tickets.snapshot()[0].clone();
        let user_id = catalog.users.snapshot()[0].id;
        let mut tickets = Box::pin(catalog.tickets.stream());
        tickets.next().await.unwrap();

        catalog
            .ticket_sales
            .create(CreateTicketSale {
                user_id,
                ticket_id: ticket.id,
                final_price: 2.5,
                attendance: "pendiente".to_string(),
                purchased_at: None,
            })
            .await
            .unwrap();

        let refreshed = tokio::time::timeout(Duration::from_secs(1), tickets.next())
            .await
            .unwrap()
            .unwrap();
        let updated = refreshed.iter().find(|t| t.id == ticket.id).unwrap();
        assert_eq!(updated.metrics.total_sold, ticket.metrics.total_sold + 1);
    }

    #[tokio::test]
    async fn test_dispose_ends_streams() {
        let (_store, catalog) = demo_catalog().await;
        let mut seats = Box::pin(catalog.seats.stream());
        seats.next().await.unwrap();

        catalog.dispose();

        assert!(seats.next().await.is_none());
        assert!(catalog.seats.is_disposed());
        let seat_id = catalog
            .seats
            .snapshot()
            .iter()
            .find(|seat| seat.status == SeatStatus::Disponible)
            .unwrap()
            .id;
        // Writes still reach the store but nothing is published any more.
        catalog
            .seats
            .set_status(seat_id, SeatStatus::Ocupado)
            .await
            .unwrap();
        assert_ne!(catalog.seats.get(seat_id).unwrap().status, SeatStatus::Ocupado);
    }
}
