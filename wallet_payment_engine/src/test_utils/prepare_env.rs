use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

/// Sets up logging and a fresh, fully migrated database at `url`. Any existing file at that path is discarded, so
/// every test starts from the empty schema plus the seeded platform account.
pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("🪛️ No old test database to drop at {url}: {e}");
    }
    Sqlite::create_database(url).await.expect("Could not create test database");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Could not connect to test database");
    migrate!("./src/sqlite/migrations").run(db.pool()).await.expect("Test database migrations failed");
    debug!("🪛️ Test database ready at {url}");
}

/// A unique database path per test run, so parallel tests never share state.
pub fn random_db_path() -> String {
    format!("sqlite://../data/test_wallet_{}.db", rand::random::<u64>())
}
