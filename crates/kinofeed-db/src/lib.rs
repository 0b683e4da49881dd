//! Persistence layer for kinofeed: sea-orm entities for the job queue and
//! the watch library, shared by the server and the migration runner.

// Downstream crates borrow our sea-orm so entity types line up across the
// workspace.
pub use sea_orm;

use sea_orm::{Database, DatabaseConnection};

pub mod entities;

/// Opens the store from a connection string; both `sqlite://` and
/// `postgres://` URLs work.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, sea_orm::DbErr> {
    Database::connect(database_url).await
}
