use super::{Game, GameId, GameResult};
use crate::error::Result;
use serde_json::Value;

pub struct Dice;

impl Game for Dice {
    fn id(&self) -> GameId {
        GameId::Dice
    }

    fn metric_label(&self) -> &'static str {
        "roll"
    }

    fn floats_needed(&self, _params: &Value) -> Result<usize> {
        Ok(1)
    }

    fn evaluate(&self, floats: &[f64], _params: &Value, _with_details: bool) -> Result<GameResult> {
        // [0.00, 100.00], two-decimal precision.
        let roll = ((floats[0] * 10_001.0) as u64).min(10_000) as f64 / 100.0;
        Ok(GameResult {
            metric: roll,
            metric_label: self.metric_label(),
            details: None,
        })
    }
}
