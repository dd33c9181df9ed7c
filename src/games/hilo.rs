use super::cards::{new_deck, rank};
use super::{param_u64, pull_from_pool, Game, GameId, GameResult};
use crate::error::Result;
use serde_json::{json, Value};

pub struct Hilo;

fn sequence_len(params: &Value) -> Result<usize> {
    Ok(param_u64(params, "rounds", Some(5))? as usize)
}

impl Game for Hilo {
    fn id(&self) -> GameId {
        GameId::Hilo
    }

    fn metric_label(&self) -> &'static str {
        "ascending streak"
    }

    fn floats_needed(&self, params: &Value) -> Result<usize> {
        sequence_len(params)
    }

    fn evaluate(&self, floats: &[f64], params: &Value, with_details: bool) -> Result<GameResult> {
        let _ = sequence_len(params)?;
        let mut deck = new_deck();
        let draws: Vec<u8> = floats
            .iter()
            .map(|f| pull_from_pool(&mut deck, *f))
            .collect();
        let ranks: Vec<u8> = draws.iter().map(|&c| rank(c)).collect();

        let streak = ranks
            .windows(2)
            .take_while(|w| w[1] > w[0])
            .count();

        Ok(GameResult {
            metric: streak as f64,
            metric_label: self.metric_label(),
            details: with_details.then(|| json!({ "draws": draws, "ranks": ranks })),
        })
    }
}
