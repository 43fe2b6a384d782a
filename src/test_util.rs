use serde_json::Value;

use crate::Document;

/// A migrated store over a private in-memory SQLite database.
#[cfg(feature = "migration")]
pub(crate) async fn memory_store(
    clock: std::sync::Arc<dyn crate::clock::Clock>,
) -> crate::store::SeaOrmStore {
    use sea_orm::{ConnectOptions, Database};

    use crate::migration::{Migrator, MigratorTrait};

    let mut opt = ConnectOptions::new("sqlite::memory:");
    // one connection, or every pooled connection gets its own database
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let conn = Database::connect(opt).await.unwrap();
    Migrator::up(&conn, None).await.unwrap();
    crate::store::SeaOrmStore::new(conn).with_clock(clock)
}

pub(crate) fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
