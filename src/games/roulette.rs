use super::{Game, GameId, GameResult};
use crate::error::Result;
use serde_json::Value;

pub struct Roulette;

impl Game for Roulette {
    fn id(&self) -> GameId {
        GameId::Roulette
    }

    fn metric_label(&self) -> &'static str {
        "pocket"
    }

    fn floats_needed(&self, _params: &Value) -> Result<usize> {
        Ok(1)
    }

    fn evaluate(&self, floats: &[f64], _params: &Value, _with_details: bool) -> Result<GameResult> {
        let pocket = ((floats[0] * 37.0) as u64).min(36);
        Ok(GameResult {
            metric: pocket as f64,
            metric_label: self.metric_label(),
            details: None,
        })
    }
}
