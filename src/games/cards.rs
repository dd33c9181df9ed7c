//! Shared 52-card deck helpers for the card games (baccarat, hilo,
//! blackjack). Cards are represented as `0..52`; rank is `card % 13`
//! (0 = ace .. 12 = king).

pub fn new_deck() -> Vec<u8> {
    (0..52).collect()
}

pub fn rank(card: u8) -> u8 {
    card % 13
}

/// Baccarat point value: face cards and tens count zero, ace counts one.
pub fn baccarat_point(card: u8) -> u8 {
    match rank(card) {
        0 => 1,
        r if r >= 9 => 0,
        r => r + 1,
    }
}

/// Blackjack value with ace treated as 11 unless that would bust the hand;
/// `soft_aces` tracks how many aces are still counted as 11 so the caller
/// can downgrade them one at a time.
pub fn blackjack_value(cards: &[u8]) -> u8 {
    let mut total: i32 = 0;
    let mut aces = 0;
    for &c in cards {
        let r = rank(c);
        total += match r {
            0 => {
                aces += 1;
                11
            }
            r if r >= 9 => 10,
            r => r as i32 + 1,
        };
    }
    while total > 21 && aces > 0 {
        total -= 10;
        aces -= 1;
    }
    total.clamp(0, 30) as u8
}
