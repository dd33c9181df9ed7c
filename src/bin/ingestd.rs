//! Thin binary wiring config, stores, and the event bus into the live
//! ingest HTTP server.

use std::sync::Arc;
use stake_replay::config::Config;
use stake_replay::events::EventBus;
use stake_replay::ingest::Server;
use stake_replay::store::LiveStore;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    stake_replay::init();

    let config = Config::load().expect("load configuration");
    let live_store = Arc::new(
        LiveStore::connect(&config.live_db_path)
            .await
            .expect("connect live store"),
    );
    let bus = Arc::new(EventBus::default());

    Server::run(config, live_store, bus).await
}
