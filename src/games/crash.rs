use super::limbo::crash_multiplier;
use super::{Game, GameId, GameResult};
use crate::error::Result;
use serde_json::{json, Value};

/// Same crash-point mechanic as limbo, exposed as its own registry id since
/// the two are scanned independently and carry distinct metric labels.
pub struct Crash;

impl Game for Crash {
    fn id(&self) -> GameId {
        GameId::Crash
    }

    fn metric_label(&self) -> &'static str {
        "crash point"
    }

    fn floats_needed(&self, _params: &Value) -> Result<usize> {
        Ok(1)
    }

    fn evaluate(&self, floats: &[f64], _params: &Value, with_details: bool) -> Result<GameResult> {
        let (multiplier, instant) = crash_multiplier(floats[0]);
        Ok(GameResult {
            metric: multiplier,
            metric_label: self.metric_label(),
            details: with_details.then(|| json!({ "instantCrash": instant })),
        })
    }
}
