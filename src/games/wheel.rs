use super::{param_str, param_u64, Game, GameId, GameResult};
use crate::error::{ReplayError, Result};
use serde_json::{json, Value};

pub struct Wheel;

const PAYOUT_TABLE_VERSION: &str = "wheel-v1";

fn table(risk: &str, segments: u64) -> Result<&'static [f64]> {
    const LOW_10: [f64; 10] = [1.2, 1.2, 1.5, 1.2, 1.2, 1.2, 1.2, 1.2, 1.5, 0.0];
    const MEDIUM_10: [f64; 10] = [1.5, 1.5, 1.7, 2.0, 1.5, 1.5, 1.5, 3.0, 1.5, 0.0];
    const HIGH_10: [f64; 10] = [2.0, 1.5, 3.0, 1.5, 2.0, 1.5, 9.9, 1.5, 2.0, 0.0];
    match (risk, segments) {
        ("low", 10) => Ok(&LOW_10),
        ("medium", 10) => Ok(&MEDIUM_10),
        ("high", 10) => Ok(&HIGH_10),
        _ => Err(ReplayError::domain(
            "INVALID_PARAMS",
            format!("no payout table for risk '{risk}' segments {segments}"),
        )),
    }
}

impl Game for Wheel {
    fn id(&self) -> GameId {
        GameId::Wheel
    }

    fn metric_label(&self) -> &'static str {
        "multiplier"
    }

    fn floats_needed(&self, _params: &Value) -> Result<usize> {
        Ok(1)
    }

    fn evaluate(&self, floats: &[f64], params: &Value, with_details: bool) -> Result<GameResult> {
        let risk = param_str(params, "risk")?;
        let segments = param_u64(params, "segments", Some(10))?;
        let table = table(risk, segments)?;

        let idx = ((floats[0] * segments as f64) as usize).min(table.len() - 1);

        Ok(GameResult {
            metric: table[idx],
            metric_label: self.metric_label(),
            details: with_details
                .then(|| json!({ "segment": idx, "payoutTable": PAYOUT_TABLE_VERSION })),
        })
    }
}
