//! Deterministic replay of Stake-style provably-fair game outcomes: given a
//! server seed, client seed, and nonce range, reproduce exactly what the
//! live game would have produced, scan the range for nonces matching a
//! predicate, and persist / re-serve the results.

pub mod error;
pub mod floatstream;
pub mod games;
pub mod predicate;
pub mod scan;

#[cfg(feature = "server")]
pub mod binding;
#[cfg(feature = "server")]
pub mod config;
#[cfg(feature = "server")]
pub mod events;
#[cfg(feature = "server")]
pub mod ingest;
#[cfg(feature = "server")]
pub mod store;

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a server seed, the only form of the seed that ever
/// leaves this process (logs, HTTP responses, persisted rows).
pub fn hash_server_seed(server_seed: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(server_seed);
    hex::encode(hasher.finalize())
}

/// Initialize logging and install a ctrl-c handler that exits cleanly. Only
/// meaningful for the `ingestd` binary; library consumers (bindings) set up
/// their own host logging instead.
#[cfg(feature = "server")]
pub fn init() {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        log::warn!("shutting down");
        std::process::exit(0);
    });
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term]).expect("initialize logger");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_sha256_hex() {
        let got = hash_server_seed(b"abc");
        assert_eq!(
            got,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(got.len(), 64);
    }
}
