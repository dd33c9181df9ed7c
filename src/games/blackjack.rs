use super::cards::{blackjack_value, new_deck};
use super::{pull_from_pool, Game, GameId, GameResult};
use crate::error::Result;
use serde_json::{json, Value};

pub struct Blackjack;

impl Game for Blackjack {
    fn id(&self) -> GameId {
        GameId::Blackjack
    }

    fn metric_label(&self) -> &'static str {
        "player total"
    }

    fn floats_needed(&self, _params: &Value) -> Result<usize> {
        Ok(4)
    }

    fn evaluate(&self, floats: &[f64], _params: &Value, with_details: bool) -> Result<GameResult> {
        let mut deck = new_deck();
        let player: Vec<u8> = [floats[0], floats[2]]
            .iter()
            .map(|f| pull_from_pool(&mut deck, *f))
            .collect();
        let dealer: Vec<u8> = [floats[1], floats[3]]
            .iter()
            .map(|f| pull_from_pool(&mut deck, *f))
            .collect();

        let player_total = blackjack_value(&player);
        let dealer_total = blackjack_value(&dealer);

        Ok(GameResult {
            metric: player_total as f64,
            metric_label: self.metric_label(),
            details: with_details.then(|| {
                json!({ "player": player, "dealer": dealer, "dealerTotal": dealer_total })
            }),
        })
    }
}
