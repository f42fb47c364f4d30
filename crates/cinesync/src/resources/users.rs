use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cinesync_core::cinema::{
    require_text, search_users, user_metrics, user_stats, CreateUser, TicketSale, UpdateUser,
    User, UserStats, ValidationError, DEFAULT_ROLE_ID,
};
use cinesync_core::store::{
    self, FetchError, Order, Query, RecordId, RemoteStore, Select, WriteError,
};

use super::{fetch, Roles, TicketSales};
use crate::collection::{decode_rows, CollectionCache, Resource};

/// Accounts (`usuario`) with their role embedded and purchase metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct Users;

#[async_trait]
impl Resource for Users {
    type Record = User;
    type Create = CreateUser;
    type Patch = UpdateUser;

    const TABLE: &'static str = "usuario";
    const PRIMARY_KEY: &'static str = "usuario_id";

    fn select(&self) -> Select {
        Select::all().to_one(
            "rol",
            Roles::TABLE,
            "rol_id",
            Select::columns(["nombre", "fecha_creacion"]),
        )
    }

    fn order(&self) -> Vec<Order> {
        vec![Order::asc("usuario_id")]
    }

    fn watched_tables(&self) -> Vec<&'static str> {
        vec![Self::TABLE, Roles::TABLE, TicketSales::TABLE]
    }

    async fn load(&self, store: &dyn RemoteStore) -> store::Result<Vec<User>> {
        let mut users: Vec<User> = decode_rows(store.select(&self.query()).await?)?;
        let sales: Vec<TicketSale> = decode_rows(store.select(&TicketSales.query()).await?)?;

        let metrics = user_metrics(&sales);
        for user in &mut users {
            user.metrics = metrics.get(&user.id).cloned().unwrap_or_default();
        }
        Ok(users)
    }

    fn prepare_create(&self, mut input: CreateUser) -> Result<CreateUser, ValidationError> {
        require_text("national id", &input.national_id)?;
        require_text("email", &input.email)?;
        require_text("password", &input.password)?;
        input.role_id.get_or_insert(DEFAULT_ROLE_ID);
        Ok(input)
    }

    fn prepare_patch(&self, patch: UpdateUser) -> Result<UpdateUser, ValidationError> {
        if let Some(email) = &patch.email {
            require_text("email", email)?;
        }
        Ok(patch)
    }
}

impl CollectionCache<Users> {
    pub async fn user_stats(&self, now: DateTime<Utc>) -> Result<UserStats, FetchError> {
        let sales: Vec<TicketSale> = fetch(self.store().as_ref(), &TicketSales.query()).await?;
        Ok(user_stats(&self.snapshot(), &sales, now))
    }

    /// Looks a user up by email, ignoring case.
    pub fn find_by_email(&self, email: &str) -> Option<User> {
        let email = email.trim();
        self.snapshot()
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    /// Users matching `term` in their names, email or national id, ordered
    /// by first names.
    pub fn search(&self, term: &str) -> Vec<User> {
        search_users(&self.snapshot(), term)
    }

    /// Whether another account already uses `email`. `exclude` skips the
    /// account being edited.
    pub async fn email_exists(
        &self,
        email: &str,
        exclude: Option<RecordId>,
    ) -> Result<bool, FetchError> {
        self.column_taken("email", email.trim(), exclude).await
    }

    pub async fn national_id_exists(
        &self,
        national_id: &str,
        exclude: Option<RecordId>,
    ) -> Result<bool, FetchError> {
        self.column_taken("cedula", national_id.trim(), exclude).await
    }

    pub async fn set_role(&self, id: RecordId, role_id: RecordId) -> Result<User, WriteError> {
        let patch = UpdateUser {
            role_id: Some(role_id),
            ..Default::default()
        };
        self.update(id, patch).await
    }

    async fn column_taken(
        &self,
        column: &str,
        value: &str,
        exclude: Option<RecordId>,
    ) -> Result<bool, FetchError> {
        let query = Query::new(Users::TABLE)
            .select(Select::columns([Users::PRIMARY_KEY]))
            .eq(column, value);
        let rows = self
            .store()
            .select(&query)
            .await
            .map_err(|e| FetchError::from_store(Users::TABLE, &e))?;

        Ok(rows.iter().any(|row| {
            let id = row.get(Users::PRIMARY_KEY).and_then(|id| id.as_i64());
            exclude.is_none() || id != exclude
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::resources::testing::{empty_store, shared};
    use chrono::TimeZone;
    use cinesync_core::cinema::UserKind;
    use serde_json::json;

    async fn store() -> MemoryStore {
        let store = empty_store().await;
        store
            .seed(
                "rol",
                vec![
                    json!({"rol_id": 1, "nombre": "administrador"}),
                    json!({"rol_id": 2, "nombre": "trabajador"}),
                ],
            )
            .await
            .unwrap();
        store
            .seed(
                "usuario_boleto",
                vec![
                    json!({"usuario_boleto_id": 1, "usuario_id": 1, "boleto_id": 1, "precio_final": 5.0, "estado_asistencia": "confirmada", "fecha_compra": "2024-06-01T10:00:00"}),
                    json!({"usuario_boleto_id": 2, "usuario_id": 1, "boleto_id": 2, "precio_final": 4.0, "estado_asistencia": "pendiente", "fecha_compra": "2024-06-02T09:00:00"}),
                ],
            )
            .await
            .unwrap();
        store
    }

    fn new_user(email: &str) -> CreateUser {
        CreateUser {
            national_id: "0912345678".to_string(),
            first_names: "Luis".to_string(),
            last_names: "Mora".to_string(),
            email: email.to_string(),
            kind: UserKind::Estudiante,
            password: "secret".to_string(),
            role_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_default_role() {
        let store = store().await;
        let cache = CollectionCache::new(Users, shared(&store), 16);

        let user = cache.create(new_user("luis@example.com")).await.unwrap();

        assert_eq!(user.role_id, DEFAULT_ROLE_ID);
        assert_eq!(user.role.as_ref().unwrap().name, "trabajador");
        assert!(!user.is_admin());
    }

    #[tokio::test]
    async fn test_load_attaches_purchase_metrics() {
        let store = store().await;
        let cache = CollectionCache::new(Users, shared(&store), 16);
        cache.create(new_user("luis@example.com")).await.unwrap();
        cache.refresh().await.unwrap();

        let user = cache.find_by_email("LUIS@example.com").unwrap();
        assert_eq!(user.metrics.tickets_purchased, 2);
        assert_eq!(user.metrics.total_spent, 9.0);
        assert_eq!(user.metrics.attendances, 1);
        assert_eq!(
            user.metrics.last_purchase,
            Some(Utc.with_ymd_and_hms(2024, 6, 2, 9, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_user_stats() {
        let store = store().await;
        let cache = CollectionCache::new(Users, shared(&store), 16);
        cache.create(new_user("luis@example.com")).await.unwrap();

        let now = Utc.with_ymd_and_hms(2024, 6, 2, 18, 0, 0).unwrap();
        let stats = cache.user_stats(now).await.unwrap();

        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.students, 1);
        assert_eq!(stats.active_today, 1);
        assert_eq!(stats.average_purchases, 2.0);
        assert_eq!(stats.most_active_user.as_deref(), Some("User #1"));
    }

    #[tokio::test]
    async fn test_search_by_name_email_and_national_id() {
        let store = store().await;
        let cache = CollectionCache::new(Users, shared(&store), 16);
        cache.create(new_user("luis@example.com")).await.unwrap();
        let mut ana = new_user("ana.paz@cine.ec");
        ana.first_names = "Ana".to_string();
        ana.national_id = "0102030405".to_string();
        cache.create(ana).await.unwrap();

        let names = |term: &str| -> Vec<String> {
            cache.search(term).into_iter().map(|u| u.first_names).collect()
        };
        assert_eq!(names("MORA"), vec!["Ana", "Luis"]);
        assert_eq!(names("cine.ec"), vec!["Ana"]);
        assert_eq!(names("0912"), vec!["Luis"]);
        assert!(names("zzz").is_empty());
    }

    #[tokio::test]
    async fn test_email_and_national_id_exist() {
        let store = store().await;
        let cache = CollectionCache::new(Users, shared(&store), 16);
        let luis = cache.create(new_user("luis@example.com")).await.unwrap();

        assert!(cache.email_exists("luis@example.com", None).await.unwrap());
        assert!(cache.email_exists(" luis@example.com ", None).await.unwrap());
        assert!(!cache.email_exists("otro@example.com", None).await.unwrap());
        // Editing an account does not clash with its own email.
        assert!(!cache.email_exists("luis@example.com", Some(luis.id)).await.unwrap());

        assert!(cache.national_id_exists("0912345678", None).await.unwrap());
        assert!(!cache.national_id_exists("0912345678", Some(luis.id)).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_role_reembeds_role() {
        let store = store().await;
        let cache = CollectionCache::new(Users, shared(&store), 16);
        let luis = cache.create(new_user("luis@example.com")).await.unwrap();

        let promoted = cache.set_role(luis.id, 1).await.unwrap();
        assert_eq!(promoted.role.as_ref().unwrap().name, "administrador");
        assert!(promoted.is_admin());
        assert_eq!(cache.get(luis.id).unwrap().role_id, 1);
    }
}
