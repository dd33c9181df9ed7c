use super::cards::{baccarat_point, new_deck};
use super::{pull_from_pool, Game, GameId, GameResult};
use crate::error::Result;
use serde_json::{json, Value};

pub struct Baccarat;

impl Game for Baccarat {
    fn id(&self) -> GameId {
        GameId::Baccarat
    }

    fn metric_label(&self) -> &'static str {
        "banker minus player"
    }

    fn floats_needed(&self, _params: &Value) -> Result<usize> {
        Ok(4)
    }

    fn evaluate(&self, floats: &[f64], _params: &Value, with_details: bool) -> Result<GameResult> {
        let mut deck = new_deck();
        let player: Vec<u8> = floats[0..2]
            .iter()
            .map(|f| pull_from_pool(&mut deck, *f))
            .collect();
        let banker: Vec<u8> = floats[2..4]
            .iter()
            .map(|f| pull_from_pool(&mut deck, *f))
            .collect();

        let player_total = player.iter().map(|&c| baccarat_point(c)).sum::<u8>() % 10;
        let banker_total = banker.iter().map(|&c| baccarat_point(c)).sum::<u8>() % 10;

        Ok(GameResult {
            metric: banker_total as f64 - player_total as f64,
            metric_label: self.metric_label(),
            details: with_details.then(|| {
                json!({
                    "player": player, "banker": banker,
                    "playerTotal": player_total, "bankerTotal": banker_total,
                })
            }),
        })
    }
}
