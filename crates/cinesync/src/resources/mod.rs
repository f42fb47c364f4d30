//! The cinema tables mirrored by the dashboard.
//!
//! Each resource names its table, the embeds fetched with every row and
//! the validation applied before writes. Secondary read operations live on
//! the matching `CollectionCache<_>`.

mod movies;
mod rentals;
mod roles;
mod rooms;
mod seats;
mod showtimes;
mod ticket_sales;
mod tickets;
mod users;

pub use movies::Movies;
pub use rentals::Rentals;
pub use roles::Roles;
pub use rooms::Rooms;
pub use seats::Seats;
pub use showtimes::Showtimes;
pub use ticket_sales::TicketSales;
pub use tickets::Tickets;
pub use users::Users;

use cinesync_core::store::{FetchError, Query, Record, RemoteStore, Select};

use crate::collection::decode_rows;

/// Room columns embedded into seats, showtimes and rentals.
fn room_summary() -> Select {
    Select::columns(["nombre", "tipo_sala", "capacidad_total", "estado"])
}

fn movie_summary() -> Select {
    Select::columns(["titulo", "duracion", "genero", "clasificacion"])
}

/// Runs a one-off query and decodes its rows.
async fn fetch<T: Record>(store: &dyn RemoteStore, query: &Query) -> Result<Vec<T>, FetchError> {
    let rows = store
        .select(query)
        .await
        .map_err(|e| FetchError::from_store(&query.table, &e))?;
    decode_rows(rows).map_err(|e| FetchError::from_store(&query.table, &e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Resource;

    fn unwatched_embeds<R: Resource>(resource: R) -> Vec<String> {
        let watched = resource.watched_tables();
        resource
            .select()
            .embedded_tables()
            .into_iter()
            .filter(|table| !watched.iter().any(|w| w == table))
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_every_embedded_table_is_watched() {
        assert!(unwatched_embeds(Movies).is_empty());
        assert!(unwatched_embeds(Rooms).is_empty());
        assert!(unwatched_embeds(Seats).is_empty());
        assert!(unwatched_embeds(Showtimes).is_empty());
        assert!(unwatched_embeds(Tickets).is_empty());
        assert!(unwatched_embeds(TicketSales).is_empty());
        assert!(unwatched_embeds(Rentals).is_empty());
        assert!(unwatched_embeds(Users).is_empty());
        assert!(unwatched_embeds(Roles).is_empty());
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use cinesync_core::store::RemoteStore;

    use crate::memory::MemoryStore;

    /// Every table of the schema, registered with its key.
    pub const TABLES: [(&str, &str); 9] = [
        ("pelicula", "pelicula_id"),
        ("sala", "sala_id"),
        ("asiento", "asiento_id"),
        ("funcion", "funcion_id"),
        ("boleto", "boleto_id"),
        ("usuario_boleto", "usuario_boleto_id"),
        ("renta_sala", "renta_id"),
        ("usuario", "usuario_id"),
        ("rol", "rol_id"),
    ];

    pub async fn empty_store() -> MemoryStore {
        let store = MemoryStore::new();
        for (table, key) in TABLES {
            store.register_table(table, key).await;
        }
        store
    }

    pub fn room(id: i64, name: &str, capacity: i64, state: Value) -> Value {
        json!({
            "sala_id": id,
            "nombre": name,
            "capacidad_total": capacity,
            "tipo_sala": "2D",
            "estado": state,
        })
    }

    pub fn shared(store: &MemoryStore) -> Arc<dyn RemoteStore> {
        Arc::new(store.clone())
    }
}
