//! Example consumer: serves the entities declared in `entities.json` over a SQLite file.
//!
//! Run from this directory with `cargo run` so `entities.json` and `schema.sql` resolve.
//! Settings come from `APIFRAME_*` variables (see `.env.example`).

use apiframe::{app_router, load_from_file, resolve, AppState, Connection, Settings, SqliteConnection};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("apiframe=info,example_consumer=info")),
        )
        .init();

    let conn = SqliteConnection::open_setting(settings.get("database.file").unwrap_or(":memory:"))?;
    if let Some(init) = settings.get("database.init").filter(|p| !p.trim().is_empty()) {
        conn.execute_batch(&std::fs::read_to_string(init)?)?;
        tracing::info!(file = %init, "database initialised");
    }

    let config = load_from_file(settings.get("entities.file").unwrap_or("entities.json"))?;
    let model = resolve(&config)?;
    tracing::info!(entities = model.entities.len(), "entity model resolved");

    let addr = settings
        .get("server.addr")
        .unwrap_or("127.0.0.1:3000")
        .to_string();
    let state = AppState::new(Arc::new(conn), model, settings);
    let app = app_router(state, "/api");

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
