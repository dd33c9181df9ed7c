//! The game registry: a string-keyed map of polymorphic evaluators. Each
//! entry declares how many floats it needs and turns a float window into a
//! `(metric, details)` pair. This is the capability-set re-architecture of
//! the original polymorphic-evaluator pattern described in the design notes.

mod baccarat;
mod blackjack;
mod cards;
mod crash;
mod dice;
mod hilo;
mod keno;
mod limbo;
mod mines;
mod plinko;
mod pump;
mod roulette;
mod wheel;

use crate::error::{ReplayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameId {
    Limbo,
    Dice,
    Roulette,
    Pump,
    Plinko,
    Keno,
    Wheel,
    Mines,
    Baccarat,
    Hilo,
    Blackjack,
    Crash,
}

impl GameId {
    pub const ALL: [GameId; 12] = [
        GameId::Limbo,
        GameId::Dice,
        GameId::Roulette,
        GameId::Pump,
        GameId::Plinko,
        GameId::Keno,
        GameId::Wheel,
        GameId::Mines,
        GameId::Baccarat,
        GameId::Hilo,
        GameId::Blackjack,
        GameId::Crash,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            GameId::Limbo => "limbo",
            GameId::Dice => "dice",
            GameId::Roulette => "roulette",
            GameId::Pump => "pump",
            GameId::Plinko => "plinko",
            GameId::Keno => "keno",
            GameId::Wheel => "wheel",
            GameId::Mines => "mines",
            GameId::Baccarat => "baccarat",
            GameId::Hilo => "hilo",
            GameId::Blackjack => "blackjack",
            GameId::Crash => "crash",
        }
    }
}

impl std::str::FromStr for GameId {
    type Err = ReplayError;
    fn from_str(s: &str) -> Result<Self> {
        GameId::ALL
            .into_iter()
            .find(|g| g.label() == s)
            .ok_or_else(|| ReplayError::domain("UNKNOWN_GAME", format!("unknown game '{s}'")))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSpec {
    pub id: GameId,
    pub metric_label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameResult {
    pub metric: f64,
    pub metric_label: &'static str,
    /// Free-form per-game detail. Only ever populated on single-nonce
    /// verification; bulk scans never materialize it.
    pub details: Option<Value>,
}

pub struct Seeds<'a> {
    pub server: &'a [u8],
    pub client: &'a str,
}

/// Draw-without-replacement selection shared by every game that deals from
/// a shrinking pool (keno, mines, card games). At each step the pool shrinks
/// by one; the boundary case where `float == 1.0` (measure zero, but floats
/// are f64 approximations) is clamped to the last remaining index.
pub fn pull_from_pool<T>(pool: &mut Vec<T>, float: f64) -> T {
    let idx = ((float * pool.len() as f64) as usize).min(pool.len() - 1);
    pool.remove(idx)
}

/// One entry in the game registry. `floats_needed` may depend on `params`
/// (e.g. mines scales with the mine count), so it takes the same params the
/// evaluation will receive.
pub trait Game: Send + Sync {
    fn id(&self) -> GameId;
    fn metric_label(&self) -> &'static str;
    fn floats_needed(&self, params: &Value) -> Result<usize>;
    /// `floats` is produced by the caller (scan engine or single-nonce
    /// verification) via the float stream; evaluators never touch the
    /// keystream directly, and never allocate a float buffer themselves.
    fn evaluate(
        &self,
        floats: &[f64],
        params: &Value,
        with_details: bool,
    ) -> Result<GameResult>;
}

/// Convenience for callers outside the scan hot path (single-nonce
/// verification, tests): derives the floats and evaluates in one step.
pub fn evaluate_nonce(
    registry: &Registry,
    id: GameId,
    seeds: &Seeds,
    nonce: u64,
    params: &Value,
    with_details: bool,
) -> Result<GameResult> {
    let game = registry.get(id)?;
    let n = game.floats_needed(params)?;
    let mut floats = vec![0.0; n];
    crate::floatstream::fill_buf(seeds.server, seeds.client, nonce, 0, &mut floats)?;
    game.evaluate(&floats, params, with_details)
}

pub struct Registry {
    games: HashMap<GameId, Box<dyn Game>>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut games: HashMap<GameId, Box<dyn Game>> = HashMap::new();
        games.insert(GameId::Limbo, Box::new(limbo::Limbo));
        games.insert(GameId::Dice, Box::new(dice::Dice));
        games.insert(GameId::Roulette, Box::new(roulette::Roulette));
        games.insert(GameId::Pump, Box::new(pump::Pump));
        games.insert(GameId::Plinko, Box::new(plinko::Plinko));
        games.insert(GameId::Keno, Box::new(keno::Keno));
        games.insert(GameId::Wheel, Box::new(wheel::Wheel));
        games.insert(GameId::Mines, Box::new(mines::Mines));
        games.insert(GameId::Baccarat, Box::new(baccarat::Baccarat));
        games.insert(GameId::Hilo, Box::new(hilo::Hilo));
        games.insert(GameId::Blackjack, Box::new(blackjack::Blackjack));
        games.insert(GameId::Crash, Box::new(crash::Crash));
        Self { games }
    }
}

impl Registry {
    pub fn get(&self, id: GameId) -> Result<&dyn Game> {
        self.games
            .get(&id)
            .map(|g| g.as_ref())
            .ok_or_else(|| ReplayError::domain("UNKNOWN_GAME", format!("unknown game '{id:?}'")))
    }

    pub fn list(&self) -> Vec<GameSpec> {
        GameId::ALL
            .into_iter()
            .map(|id| GameSpec {
                id,
                metric_label: self.games[&id].metric_label(),
            })
            .collect()
    }
}

/// Shared helper: pull a required f64/u64 field out of a params object.
pub(crate) fn param_u64(params: &Value, key: &str, default: Option<u64>) -> Result<u64> {
    match params.get(key).and_then(Value::as_u64) {
        Some(v) => Ok(v),
        None => default.ok_or_else(|| {
            ReplayError::domain("INVALID_PARAMS", format!("missing required param '{key}'"))
                .with_field("params")
        }),
    }
}

pub(crate) fn param_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ReplayError::domain("INVALID_PARAMS", format!("missing param '{key}'")))
}
