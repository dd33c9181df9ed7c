use super::{Game, GameId, GameResult};
use crate::error::Result;
use serde_json::{json, Value};

/// Shared by limbo and crash: both derive a crash-point multiplier from a
/// single float using the standard house-edge-adjusted reciprocal formula,
/// with an instant-crash rule on the `mod 33` boundary (~3% of outcomes).
pub(super) fn crash_multiplier(float: f64) -> (f64, bool) {
    const PRECISION: f64 = 4_294_967_296.0; // 2^32, matching our 4-byte float resolution
    let h = (float * PRECISION) as u64;
    if h % 33 == 0 {
        return (1.00, true);
    }
    let h = h as f64;
    let raw = (100.0 * PRECISION - h) / (PRECISION - h);
    (f64::max(1.00, raw.floor() / 100.0), false)
}

pub struct Limbo;

impl Game for Limbo {
    fn id(&self) -> GameId {
        GameId::Limbo
    }

    fn metric_label(&self) -> &'static str {
        "crash multiplier"
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
