use super::{param_str, pull_from_pool, Game, GameId, GameResult};
use crate::error::{ReplayError, Result};
use serde_json::{json, Value};

pub struct Pump;

const BOARD: usize = 25;
const HOUSE_EDGE: f64 = 0.99;

fn pop_count(difficulty: &str) -> Result<usize> {
    match difficulty {
        "easy" => Ok(1),
        "medium" => Ok(3),
        "hard" => Ok(5),
        "expert" => Ok(10),
        other => Err(ReplayError::domain(
            "INVALID_PARAMS",
            format!("unknown difficulty '{other}'"),
        )
        .with_field("difficulty")),
    }
}

fn difficulty(params: &Value) -> Result<&str> {
    param_str(params, "difficulty")
}

impl Game for Pump {
    fn id(&self) -> GameId {
        GameId::Pump
    }

    fn metric_label(&self) -> &'static str {
        "multiplier"
    }

    fn floats_needed(&self, _params: &Value) -> Result<usize> {
        Ok(BOARD)
    }

    fn evaluate(&self, floats: &[f64], params: &Value, with_details: bool) -> Result<GameResult> {
        let difficulty = difficulty(params)?;
        let pops = pop_count(difficulty)?;

        let mut pool: Vec<usize> = (0..BOARD).collect();
        let pop_positions: Vec<usize> = floats
            .iter()
            .map(|f| pull_from_pool(&mut pool, *f))
            .collect();

        // The top `pops` drawn indices are the board's designated pop tiles;
        // safe pumps are every tile drawn before the first one of those, in
        // draw order.
        let safe_pumps = pop_positions
            .iter()
            .position(|&p| p >= BOARD - pops)
            .unwrap_or(pop_positions.len());

        let multiplier = (0..safe_pumps)
            .fold(1.0f64, |acc, i| acc * (BOARD - i) as f64 / (BOARD - pops - i) as f64)
            .max(1.0)
            * HOUSE_EDGE;

        Ok(GameResult {
            metric: multiplier.max(1.0),
            metric_label: self.metric_label(),
            details: with_details
                .then(|| json!({ "popPositions": pop_positions, "safePumps": safe_pumps })),
        })
    }
}
