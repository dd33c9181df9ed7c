use super::{param_u64, pull_from_pool, Game, GameId, GameResult};
use crate::error::{ReplayError, Result};
use serde_json::{json, Value};

pub struct Mines;

const BOARD: usize = 25;
const HOUSE_EDGE: f64 = 0.99;

fn mines_count(params: &Value) -> Result<usize> {
    let n = param_u64(params, "minesCount", None)?;
    if n == 0 || n as usize >= BOARD {
        return Err(ReplayError::domain(
            "INVALID_PARAMS",
            "minesCount must be in 1..24",
        )
        .with_field("minesCount"));
    }
    Ok(n as usize)
}

fn picks_count(params: &Value) -> Result<usize> {
    let n = param_u64(params, "picks", Some(1))?;
    if n as usize >= BOARD {
        return Err(ReplayError::domain("INVALID_PARAMS", "picks out of range")
            .with_field("picks"));
    }
    Ok(n as usize)
}

/// Classic safe-pick payout: the probability of avoiding every mine through
/// `picks` consecutive reveals, house-edge scaled.
fn safe_multiplier(mines: usize, picks: usize) -> f64 {
    let mut multiplier = 1.0f64;
    for i in 0..picks {
        multiplier *= (BOARD - i) as f64 / (BOARD - mines - i) as f64;
    }
    multiplier * HOUSE_EDGE
}

impl Game for Mines {
    fn id(&self) -> GameId {
        GameId::Mines
    }

    fn metric_label(&self) -> &'static str {
        "multiplier"
    }

    fn floats_needed(&self, params: &Value) -> Result<usize> {
        mines_count(params)
    }

    fn evaluate(&self, floats: &[f64], params: &Value, with_details: bool) -> Result<GameResult> {
        let mines = mines_count(params)?;
        let picks = picks_count(params)?;

        let mut pool: Vec<usize> = (0..BOARD).collect();
        let mine_positions: Vec<usize> = floats
            .iter()
            .map(|f| pull_from_pool(&mut pool, *f))
            .collect();

        let busted = (0..picks).any(|tile| mine_positions.contains(&tile));
        let metric = if busted {
            0.0
        } else {
            safe_multiplier(mines, picks)
        };
        Ok(GameResult {
            metric,
            metric_label: self.metric_label(),
            details: with_details
                .then(|| json!({ "minePositions": mine_positions, "busted": busted })),
        })
    }
}
