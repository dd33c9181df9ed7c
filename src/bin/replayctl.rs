//! Command-line front end for the binding surface: hash a seed, run a scan,
//! or list previously saved runs without going through the HTTP server.

use clap::{Parser, Subcommand};
use stake_replay::binding::{Binding, StartScanRequest};
use stake_replay::config::Config;
use stake_replay::games::GameId;
use stake_replay::predicate::{Op, Predicate};
use stake_replay::store::{LiveStore, RunFilter, RunStore};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about = "Inspect and drive provably-fair replay scans")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// SHA-256 hex digest of a server seed.
    HashSeed { server_seed: String },
    /// Run a scan and persist the resulting run.
    Scan {
        game: String,
        server_seed: String,
        client_seed: String,
        nonce_start: u64,
        nonce_end: u64,
        #[arg(long, default_value = "GE")]
        op: String,
        #[arg(long)]
        val: f64,
        #[arg(long)]
        val2: Option<f64>,
        #[arg(long, default_value_t = 0)]
        limit: u64,
    },
    /// List the most recent saved runs, optionally filtered by game.
    ListRuns {
        #[arg(long)]
        game: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

#[tokio::main]
async fn main() {
    stake_replay::init();
    let cli = Cli::parse();
    let config = Config::load().expect("load configuration");

    match cli.command {
        Command::HashSeed { server_seed } => {
            println!("{}", stake_replay::hash_server_seed(server_seed.as_bytes()));
        }
        Command::Scan {
            game,
            server_seed,
            client_seed,
            nonce_start,
            nonce_end,
            op,
            val,
            val2,
            limit,
        } => {
            let run_store = Arc::new(RunStore::connect(&config.runs_db_path).await.expect("run store"));
            let live_store = Arc::new(LiveStore::connect(&config.live_db_path).await.expect("live store"));
            let binding = Binding::new(run_store, live_store, config);

            let request = StartScanRequest {
                game: GameId::from_str(&game).expect("unknown game"),
                server_seed: server_seed.into_bytes(),
                client_seed,
                nonce_start,
                nonce_end,
                params: serde_json::json!({}),
                predicate: Predicate {
                    op: parse_op(&op),
                    val,
                    val2,
                    tolerance: None,
                },
                limit,
                timeout_ms: 0,
            };
            let started = binding.start_scan(request).expect("scan failed");
            println!(
                "run {}: {} hits over {} nonces (timedOut={})",
                started.run.id,
                started.result.summary.hit_count,
                started.result.summary.evaluated,
                started.result.timed_out
            );
        }
        Command::ListRuns { game, page } => {
            let run_store = Arc::new(RunStore::connect(&config.runs_db_path).await.expect("run store"));
            let live_store = Arc::new(LiveStore::connect(&config.live_db_path).await.expect("live store"));
            let binding = Binding::new(run_store, live_store, config);
            let filter = RunFilter {
                game: game.map(|g| GameId::from_str(&g).expect("unknown game")),
            };
            let runs = binding.list_runs(filter, page, 50).await.expect("list runs");
            for run in runs.rows {
                println!(
                    "{} {} {} hits ({}..{})",
                    run.id,
                    run.game.label(),
                    run.hit_count,
                    run.nonce_start,
                    run.nonce_end
                );
            }
        }
    }
}

fn parse_op(s: &str) -> Op {
    match s.to_uppercase().as_str() {
        "EQ" => Op::Eq,
        "NE" => Op::Ne,
        "GT" => Op::Gt,
        "GE" => Op::Ge,
        "LT" => Op::Lt,
        "LE" => Op::Le,
        "BETWEEN" => Op::Between,
        "OUTSIDE" => Op::Outside,
        other => panic!("unknown operator '{other}'"),
    }
}
