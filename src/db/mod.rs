mod from_row;
pub mod queries;
mod schema;

pub use schema::{configure_connection, init_db};

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;

use crate::email::EmailService;
use crate::feed::ChangeFeed;
use crate::icons::IconSuggester;
use crate::jwt::SessionKeys;
use crate::payments::StripeClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Public site URL, used for invite links and checkout redirects
    pub base_url: String,
    pub sessions: Arc<SessionKeys>,
    pub email_service: Arc<EmailService>,
    /// None when Stripe is not configured
    pub stripe: Option<Arc<StripeClient>>,
    pub icons: Arc<IconSuggester>,
    pub feed: ChangeFeed,
    pub invite_expiry_days: i64,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| {
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
            configure_connection(conn)
        });
    Pool::builder().max_size(10).build(manager)
}

/// Pool over a named shared-cache in-memory database.
///
/// Every pooled connection sees the same data, which plain `:memory:` does not
/// provide. The database lives as long as the pool holds a connection.
pub fn create_memory_pool() -> Result<DbPool, r2d2::Error> {
    let uri = format!("file:brokerdesk-{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
    let manager = SqliteConnectionManager::file(uri)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )
        .with_init(|conn| configure_connection(conn));
    Pool::builder().max_size(4).min_idle(Some(1)).build(manager)
}
