use axum::routing::get;
use log::info;
use metronome_core::{Config, MemoryCatalog, Metronome};
use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod context;
mod directory;
mod docs;
mod errors;
mod rooms;
mod schemas;
mod sse;
mod tracks;

pub mod logging;

pub use context::ServerContext;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9070;

pub type Router = axum::Router<ServerContext>;

/// Starts the metronome server
pub async fn run_server(config: Config) {
    let port = env::var("METRONOME_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let sweep_period = config
        .sweep_interval
        .to_std()
        .expect("sweep interval is positive");

    let catalog = Arc::new(MemoryCatalog::new());
    let sse = sse::SseBroadcaster::new();
    let metronome = Arc::new(Metronome::new(config, catalog.clone(), sse.clone()));

    let context = ServerContext {
        metronome: metronome.clone(),
        catalog,
        directory: Arc::new(directory::Directory::new()),
        sse,
    };

    tokio::spawn(run_liveness_sweep(metronome, sweep_period));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/users", directory::router())
        .nest("/tracks", tracks::router())
        .nest("/rooms", rooms::router())
        .nest("/events", sse::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on {}", addr);

    axum::serve(listener, root_router.into_make_service())
        .await
        .expect("server runs");
}

/// Walks every room on an interval, evicting members whose heartbeats
/// stopped coming in
async fn run_liveness_sweep(metronome: Arc<Metronome>, period: Duration) {
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;
        metronome.rooms.check_rooms();
    }
}
