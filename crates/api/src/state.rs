use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::{config::Config, repos::Repos, services::EmailSender, stores::{StoreClient, Stores}};

#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Raw database pool, used by the readiness check only; all data access
    /// goes through `repos`.
    pub database: Pool<Postgres>,
    /// Shared expiring-store client; the stores are built on it and the
    /// readiness check pings through it.
    pub store: StoreClient,
    /// Database repositories.
    pub repos: Repos,
    /// Ephemeral stores (Redis).
    pub stores: Stores,
    /// Email sender.
    pub email: Arc<dyn EmailSender>,
}
