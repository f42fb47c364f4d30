use cinesync_core::cinema::{require_text, CreateTicketSale, TicketSale, UpdateTicketSale, ValidationError};
use cinesync_core::store::{Order, RecordId};

use crate::collection::{CollectionCache, Resource};

/// Ticket purchases (`usuario_boleto`), linking users to tickets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TicketSales;

impl Resource for TicketSales {
    type Record = TicketSale;
    type Create = CreateTicketSale;
    type Patch = UpdateTicketSale;

    const TABLE: &'static str = "usuario_boleto";
    const PRIMARY_KEY: &'static str = "usuario_boleto_id";

    fn order(&self) -> Vec<Order> {
        vec![Order::desc("fecha_compra")]
    }

    fn prepare_create(&self, mut input: CreateTicketSale) -> Result<CreateTicketSale, ValidationError> {
        require_text("attendance", &input.attendance)?;
        input.purchased_at.get_or_insert_with(chrono::Utc::now);
        Ok(input)
    }
}

impl CollectionCache<TicketSales> {
    pub fn for_user(&self, user_id: RecordId) -> Vec<TicketSale> {
        self.snapshot()
            .iter()
            .filter(|sale| sale.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::testing::{empty_store, shared};

    #[tokio::test]
    async fn test_create_stamps_purchase_time() {
        let store = empty_store().await;
        let cache = CollectionCache::new(TicketSales, shared(&store), 16);

        let sale = cache
            .create(CreateTicketSale {
                user_id: 4,
                ticket_id: 9,
                final_price: 3.5,
                attendance: "pendiente".to_string(),
                purchased_at: None,
            })
            .await
            .unwrap();

        assert!(!sale.attendance_confirmed());
        assert!(chrono::Utc::now() - sale.purchased_at < chrono::Duration::minutes(1));
        assert_eq!(cache.for_user(4).len(), 1);
        assert!(cache.for_user(5).is_empty());
    }
}
