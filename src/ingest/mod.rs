//! The live ingest server: a loopback-only HTTP listener that accepts bet
//! rows from the Stake API client (out of scope here) and serves them back
//! to the desktop shell's live view. Never binds a public interface.

mod handlers;

use crate::config::Config;
use crate::events::EventBus;
use crate::store::LiveStore;
use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use std::sync::Arc;

pub struct AppState {
    pub live_store: Arc<LiveStore>,
    pub bus: Arc<EventBus>,
    pub token: Option<String>,
}

pub struct Server;

impl Server {
    pub async fn run(config: Config, live_store: Arc<LiveStore>, bus: Arc<EventBus>) -> std::io::Result<()> {
        let state = web::Data::new(AppState {
            live_store,
            bus,
            token: config.ingest_token,
        });
        log::info!("starting live ingest server on 127.0.0.1:{}", config.ingest_port);
        HttpServer::new(move || {
            App::new()
                .wrap(Logger::new("%r %s %Ts"))
                .wrap(
                    Cors::default()
                        .allow_any_origin()
                        .allow_any_method()
                        .allow_any_header(),
                )
                .app_data(state.clone())
                .route("/live/ingest", web::post().to(handlers::ingest))
                .route("/live/streams", web::get().to(handlers::list_streams))
                .route("/live/streams/{id}", web::get().to(handlers::get_stream))
                .route("/live/streams/{id}", web::put().to(handlers::update_notes))
                .route("/live/streams/{id}", web::delete().to(handlers::delete_stream))
                .route("/live/streams/{id}/bets", web::get().to(handlers::list_bets))
                .route("/live/streams/{id}/tail", web::get().to(handlers::tail))
                .route(
                    "/live/streams/{id}/export.csv",
                    web::get().to(handlers::export_csv),
                )
        })
        // Loopback only, regardless of what LIVE_INGEST_PORT is set to.
        .bind(("127.0.0.1", config.ingest_port))?
        .run()
        .await
    }
}
