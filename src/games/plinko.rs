use super::{param_str, param_u64, Game, GameId, GameResult};
use crate::error::{ReplayError, Result};
use serde_json::{json, Value};

pub struct Plinko;

/// Payout tables are opaque lookup artifacts in the real engine; here they
/// are a versioned static fixture indexed by `(risk, rows, rightCount)`.
/// The engine never inspects their contents beyond indexing into them.
const PAYOUT_TABLE_VERSION: &str = "plinko-v1";

fn table(risk: &str, rows: usize) -> Result<&'static [f64]> {
    const LOW_16: [f64; 17] = [
        16.0, 9.0, 2.0, 1.4, 1.4, 1.2, 1.1, 1.0, 0.5, 1.0, 1.1, 1.2, 1.4, 1.4, 2.0, 9.0, 16.0,
    ];
    const MEDIUM_16: [f64; 17] = [
        110.0, 41.0, 10.0, 5.0, 3.0, 1.5, 1.0, 0.5, 0.3, 0.5, 1.0, 1.5, 3.0, 5.0, 10.0, 41.0,
        110.0,
    ];
    const HIGH_16: [f64; 17] = [
        1000.0, 130.0, 26.0, 9.0, 4.0, 2.0, 0.2, 0.2, 0.0, 0.2, 0.2, 2.0, 4.0, 9.0, 26.0, 130.0,
        1000.0,
    ];
    match (risk, rows) {
        ("low", 16) => Ok(&LOW_16),
        ("medium", 16) => Ok(&MEDIUM_16),
        ("high", 16) => Ok(&HIGH_16),
        _ => Err(ReplayError::domain(
            "INVALID_PARAMS",
            format!("no payout table for risk '{risk}' rows {rows}"),
        )),
    }
}

fn rows(params: &Value) -> Result<usize> {
    Ok(param_u64(params, "rows", Some(16))? as usize)
}

impl Game for Plinko {
    fn id(&self) -> GameId {
        GameId::Plinko
    }

    fn metric_label(&self) -> &'static str {
        "multiplier"
    }

    fn floats_needed(&self, params: &Value) -> Result<usize> {
        rows(params)
    }

    fn evaluate(&self, floats: &[f64], params: &Value, with_details: bool) -> Result<GameResult> {
        let risk = param_str(params, "risk")?;
        let rows = rows(params)?;
        let table = table(risk, rows)?;

        let rights = floats.iter().filter(|&&f| f >= 0.5).count();
        let multiplier = table[rights];

        Ok(GameResult {
            metric: multiplier,
            metric_label: self.metric_label(),
            details: with_details.then(|| {
                json!({ "bucket": rights, "payoutTable": PAYOUT_TABLE_VERSION })
            }),
        })
    }
}
