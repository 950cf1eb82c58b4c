//! Expected-value calculations for hit, double and split.
//!
//! Draws follow a fresh 8-deck composition: ranks 2–9 at 32/416 each,
//! the ten group at 128/416, aces at 32/416. Aces enter as 11 and are
//! softened to 1 when the hand would bust.

use super::dealer::stand_ev;

/// Lookahead depth at which `hit_ev` stops expanding and stands.
pub const MAX_HIT_DEPTH: u32 = 5;

const SHOE_CARDS: f64 = 416.0;

/// A possible next card: its value (ace = 11) and probability.
#[derive(Debug, Clone, Copy)]
pub struct Draw {
    pub value: u8,
    pub probability: f64,
}

/// Next-card distribution, low to high.
pub const DRAWS: [Draw; 10] = [
    Draw { value: 2, probability: 32.0 / SHOE_CARDS },
    Draw { value: 3, probability: 32.0 / SHOE_CARDS },
    Draw { value: 4, probability: 32.0 / SHOE_CARDS },
    Draw { value: 5, probability: 32.0 / SHOE_CARDS },
    Draw { value: 6, probability: 32.0 / SHOE_CARDS },
    Draw { value: 7, probability: 32.0 / SHOE_CARDS },
    Draw { value: 8, probability: 32.0 / SHOE_CARDS },
    Draw { value: 9, probability: 32.0 / SHOE_CARDS },
    Draw { value: 10, probability: 128.0 / SHOE_CARDS },
    Draw { value: 11, probability: 32.0 / SHOE_CARDS },
];

/// Add a card value to a (total, soft) hand.
pub fn add_card(total: u8, soft: bool, value: u8) -> (u8, bool) {
    let mut total = total + value;
    let mut soft_aces = u8::from(soft) + u8::from(value == 11);
    while total > 21 && soft_aces > 0 {
        total -= 10;
        soft_aces -= 1;
    }
    (total, soft_aces > 0)
}

/// EV of hitting once and then playing on optimally (stand or hit again)
/// up to `MAX_HIT_DEPTH`. At the depth limit this is the stand EV and no
/// further branching happens.
pub fn hit_ev(total: u8, soft: bool, upcard_value: u8, depth: u32) -> f64 {
    if depth >= MAX_HIT_DEPTH {
        return stand_ev(total, upcard_value);
    }

    DRAWS
        .iter()
        .map(|draw| {
            let (next, next_soft) = add_card(total, soft, draw.value);
            let ev = if next > 21 {
                -1.0
            } else if next == 21 {
                stand_ev(21, upcard_value)
            } else {
                stand_ev(next, upcard_value).max(hit_ev(next, next_soft, upcard_value, depth + 1))
            };
            draw.probability * ev
        })
        .sum()
}

/// EV of doubling: exactly one more card, then stand, at twice the stake.
pub fn double_ev(total: u8, soft: bool, upcard_value: u8) -> f64 {
    let one_card: f64 = DRAWS
        .iter()
        .map(|draw| {
            let (next, _) = add_card(total, soft, draw.value);
            draw.probability * stand_ev(next, upcard_value)
        })
        .sum();
    2.0 * one_card
}

/// EV of splitting a pair whose cards are worth `pair_value` (ace = 11).
///
/// Aces receive one card each and must stand, so each hand is the average
/// stand EV of 11 plus the next card. Other pairs use one `hit_ev` from a
/// single card as the per-hand estimate. Both are doubled for the two hands.
pub fn split_ev(pair_value: u8, upcard_value: u8) -> f64 {
    let per_hand = if pair_value == 11 {
        DRAWS
            .iter()
            .map(|draw| {
                let (next, _) = add_card(11, true, draw.value);
                draw.probability * stand_ev(next, upcard_value)
            })
            .sum()
    } else {
        hit_ev(pair_value, false, upcard_value, 0)
    };
    2.0 * per_hand
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_probabilities_sum_to_one() {
        let sum: f64 = DRAWS.iter().map(|d| d.probability).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_add_card_soft_handling() {
        assert_eq!(add_card(10, false, 11), (21, true));
        assert_eq!(add_card(16, false, 11), (17, false));
        assert_eq!(add_card(17, true, 10), (17, false));
        assert_eq!(add_card(15, true, 11), (16, true));
        assert_eq!(add_card(16, false, 10), (26, false));
    }

    #[test]
    fn test_hit_ev_at_depth_limit_is_stand_ev() {
        for total in 4..=21 {
            for up in 2..=11 {
                assert_eq!(hit_ev(total, false, up, MAX_HIT_DEPTH), stand_ev(total, up));
                assert_eq!(hit_ev(total, false, up, MAX_HIT_DEPTH + 3), stand_ev(total, up));
            }
        }
    }

    #[test]
    fn test_hit_beats_stand_on_16_vs_7() {
        assert!(hit_ev(16, false, 7, 0) > stand_ev(16, 7));
    }

    #[test]
    fn test_stand_beats_hit_on_20() {
        for up in 2..=11 {
            assert!(stand_ev(20, up) > hit_ev(20, false, up, 0));
        }
    }

    #[test]
    fn test_hit_ev_bounded() {
        for total in 4..=21 {
            let ev = hit_ev(total, false, 10, 0);
            assert!((-1.0..=1.0).contains(&ev), "total {total}: {ev}");
        }
    }

    #[test]
    fn test_double_on_11_vs_6_beats_hit() {
        assert!(double_ev(11, false, 6) > hit_ev(11, false, 6, 0));
    }

    #[test]
    fn test_double_hard_16_poor() {
        assert!(double_ev(16, false, 10) < -0.9);
    }

    #[test]
    fn test_split_aces_positive_vs_six() {
        assert!(split_ev(11, 6) > 0.0);
    }

    #[test]
    fn test_split_tens_worse_than_standing_twenty() {
        assert!(split_ev(10, 6) < stand_ev(20, 6));
    }
}
