use mimalloc::MiMalloc;
use pinsync::db::RealtimeDb;
use pinsync::server::{PinsyncState, pinsync_router};
use pinsync::storage::Storage;
use pinsync::store::LocalStorage;
use pinsync::{AccountService, PinterestService};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &pinsync::config::CONFIG;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        proxy = %cfg.basic.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.basic.loglevel,
        state_path = %cfg.basic.state_path.display(),
    );
    if cfg.pinterest().client_id.is_none() || cfg.pinterest().client_secret.is_none() {
        warn!("Pinterest client credentials are not configured; token exchange will fail");
    }

    let db = RealtimeDb::connect(&cfg.basic.database_url).await?;
    let storage = Storage::new(db);
    let local = LocalStorage::open(cfg.basic.state_path.clone()).await;
    let store = pinsync::store::spawn(storage.clone(), local).await?;
    let pinterest = PinterestService::new(&cfg.basic, cfg.pinterest().clone())?;

    let accounts = AccountService::new(pinterest, storage, store);
    let state = PinsyncState::new(accounts, &cfg.basic);
    let app = pinsync_router(state);

    let listener = TcpListener::bind(&cfg.basic.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
