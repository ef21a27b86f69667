use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use stitch_server::config::Config;
use stitch_server::payments::StripeClient;
use stitch_server::routes::create_routes;
use stitch_server::state::AppState;
use stitch_server::store::PgStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env().expect("Failed to load configuration");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let store = Arc::new(PgStore::new(pool));
    let gateway = Arc::new(StripeClient::new(config.payment.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(
        config,
        store.clone(),
        store.clone(),
        store.clone(),
        store,
        gateway,
    );

    let app = create_routes(state);

    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
