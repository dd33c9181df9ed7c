//! The language-neutral command/query surface the desktop shell (out of
//! scope here) calls into. Every method takes owned inputs and returns
//! structured [`crate::error::ReplayError`]s — no panics, no raw seeds
//! retained past the scan that needed them.

use crate::config::Config;
use crate::error::{ReplayError, Result};
use crate::games::{GameId, GameSpec, Registry, Seeds};
use crate::predicate::Predicate;
use crate::scan::{self, ScanRequest, ScanResult};
use crate::store::{
    HitsPage, LiveBet, LiveStore, LiveStream, NewRun, Order, Page, RunFilter, RunRecord, RunStore,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub struct StartScanRequest {
    pub game: GameId,
    pub server_seed: Vec<u8>,
    pub client_seed: String,
    pub nonce_start: u64,
    pub nonce_end: u64,
    pub params: Value,
    pub predicate: Predicate,
    pub limit: u64,
    pub timeout_ms: u64,
}

pub struct StartedScan {
    pub run_token: String,
    pub result: ScanResult,
    pub run: RunRecord,
}

pub struct IngestInfo {
    pub url: String,
    pub token_enabled: bool,
}

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct Binding {
    registry: Registry,
    run_store: Arc<RunStore>,
    live_store: Arc<LiveStore>,
    config: Config,
    in_flight: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl Binding {
    pub fn new(run_store: Arc<RunStore>, live_store: Arc<LiveStore>, config: Config) -> Self {
        Self {
            registry: Registry::default(),
            run_store,
            live_store,
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_games(&self) -> Vec<GameSpec> {
        self.registry.list()
    }

    pub fn hash_server_seed(&self, server_seed: &[u8]) -> String {
        crate::hash_server_seed(server_seed)
    }

    /// Registers a cancellation flag for this scan before running it, so a
    /// concurrent `cancel_run` call (from another thread) can reach it while
    /// this synchronous call is still in flight.
    pub fn start_scan(&self, request: StartScanRequest) -> Result<StartedScan> {
        let run_token = uuid::Uuid::new_v4().to_string();
        let cancel = Arc::new(AtomicBool::new(false));
        self.in_flight
            .lock()
            .expect("in-flight mutex poisoned")
            .insert(run_token.clone(), cancel.clone());

        let game = request.game;
        let predicate = request.predicate;
        let server_seed_hash = crate::hash_server_seed(&request.server_seed);

        let scan_request = ScanRequest {
            game,
            seeds: Seeds {
                server: &request.server_seed,
                client: &request.client_seed,
            },
            nonce_start: request.nonce_start,
            nonce_end: request.nonce_end,
            params: request.params.clone(),
            predicate,
            limit: request.limit,
            timeout_ms: request.timeout_ms,
        };

        let outcome = scan::scan(&scan_request, &self.registry, cancel);
        self.in_flight
            .lock()
            .expect("in-flight mutex poisoned")
            .remove(&run_token);
        let result = outcome?;

        let new_run = NewRun {
            game,
            engine_version: ENGINE_VERSION,
            server_seed_hash,
            client_seed: request.client_seed,
            nonce_start: request.nonce_start,
            nonce_end: request.nonce_end,
            params_json: request.params,
            predicate,
            hit_limit: request.limit,
        };

        let run = futures::executor::block_on(async {
            let run = self.run_store.save_run(&new_run, &result).await?;
            self.run_store.save_hits(run.id, &result.hits).await?;
            Ok::<_, ReplayError>(run)
        })?;

        Ok(StartedScan {
            run_token,
            result,
            run,
        })
    }

    pub fn cancel_run(&self, run_token: &str) -> Result<()> {
        let flags = self.in_flight.lock().expect("in-flight mutex poisoned");
        match flags.get(run_token) {
            Some(flag) => {
                flag.store(true, Ordering::Relaxed);
                Ok(())
            }
            None => Err(ReplayError::not_found(format!("no in-flight run '{run_token}'"))),
        }
    }

    pub async fn get_run(&self, id: i64) -> Result<RunRecord> {
        self.run_store.get_run(id).await
    }

    pub async fn list_runs(&self, filter: RunFilter, page: u32, per_page: u32) -> Result<Page<RunRecord>> {
        self.run_store.list_runs(&filter, page, per_page).await
    }

    pub async fn get_run_hits(&self, run_id: i64, page: u32, per_page: u32) -> Result<HitsPage> {
        self.run_store.get_run_hits(run_id, page, per_page).await
    }

    pub async fn list_streams(&self, limit: u32, offset: u32) -> Result<(Vec<LiveStream>, u64)> {
        self.live_store.list_streams(limit, offset).await
    }

    pub async fn get_stream(&self, stream_id: &str) -> Result<LiveStream> {
        self.live_store.get_stream(stream_id).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn get_bets(
        &self,
        stream_id: &str,
        min_multiplier: Option<f64>,
        order: Order,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<LiveBet>, u64)> {
        self.live_store
            .list_bets(stream_id, min_multiplier, order, limit, offset)
            .await
    }

    pub async fn tail(&self, stream_id: &str, since_id: i64, limit: u32) -> Result<Vec<LiveBet>> {
        self.live_store.tail_bets(stream_id, since_id, limit).await
    }

    pub async fn export_csv(&self, stream_id: &str, writer: &mut impl std::io::Write) -> Result<()> {
        self.live_store.export_csv(stream_id, writer).await
    }

    pub async fn delete_stream(&self, stream_id: &str) -> Result<()> {
        self.live_store.delete_stream(stream_id).await
    }

    pub async fn update_notes(&self, stream_id: &str, notes: &str) -> Result<()> {
        self.live_store.update_notes(stream_id, notes).await
    }

    pub fn ingest_info(&self) -> IngestInfo {
        IngestInfo {
            url: format!("http://127.0.0.1:{}", self.config.ingest_port),
            token_enabled: self.config.ingest_token.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Op;
    use std::path::PathBuf;

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("stake-replay-binding-test-{label}-{}.db", uuid::Uuid::new_v4()))
    }

    async fn test_binding() -> Binding {
        let run_store = Arc::new(RunStore::connect(&temp_path("runs")).await.unwrap());
        let live_store = Arc::new(LiveStore::connect(&temp_path("live")).await.unwrap());
        let config = Config {
            ingest_port: 17888,
            ingest_token: None,
            runs_db_path: temp_path("cfg-runs"),
            live_db_path: temp_path("cfg-live"),
        };
        Binding::new(run_store, live_store, config)
    }

    #[tokio::test]
    async fn start_scan_persists_a_run_whose_hits_satisfy_the_predicate() {
        let binding = test_binding().await;
        let request = StartScanRequest {
            game: GameId::Dice,
            server_seed: b"server-seed".to_vec(),
            client_seed: "client-seed".into(),
            nonce_start: 1,
            nonce_end: 5000,
            params: serde_json::json!({}),
            predicate: crate::predicate::Predicate {
                op: Op::Lt,
                val: 2.0,
                val2: None,
                tolerance: None,
            },
            limit: 0,
            timeout_ms: 0,
        };
        let started = binding.start_scan(request).unwrap();
        assert_eq!(started.run.hit_count as u64, started.result.hits.len() as u64);

        let fetched = binding.get_run(started.run.id).await.unwrap();
        assert_eq!(fetched.id, started.run.id);
    }

    #[tokio::test]
    async fn cancel_run_fails_for_an_unknown_token() {
        let binding = test_binding().await;
        let err = binding.cancel_run("does-not-exist").unwrap_err();
        assert_eq!(err.kind, crate::error::Kind::Resource);
    }

    #[tokio::test]
    async fn get_games_lists_every_registered_game() {
        let binding = test_binding().await;
        assert_eq!(binding.get_games().len(), GameId::ALL.len());
    }
}
