//! Dealer final-hand distributions and the stand EV built on them.
//!
//! Probabilities are for an 8-deck shoe, dealer stands on all 17s,
//! indexed by the dealer's upcard value (2–10, ace as 11). Each row is
//! `[P(17), P(18), P(19), P(20), P(21), P(bust)]` and sums to 1.

/// Dealer outcome distribution for one upcard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DealerOutcomes {
    /// P(dealer finishes on 17..=21), index 0 = 17.
    pub totals: [f64; 5],
    pub bust: f64,
}

const fn row(p17: f64, p18: f64, p19: f64, p20: f64, p21: f64, bust: f64) -> DealerOutcomes {
    DealerOutcomes {
        totals: [p17, p18, p19, p20, p21],
        bust,
    }
}

const DEALER_TABLE: [DealerOutcomes; 10] = [
    // 2
    row(0.1398, 0.1349, 0.1297, 0.1240, 0.1180, 0.3536),
    // 3
    row(0.1350, 0.1305, 0.1256, 0.1203, 0.1147, 0.3739),
    // 4
    row(0.1305, 0.1256, 0.1203, 0.1147, 0.1087, 0.4002),
    // 5
    row(0.1223, 0.1223, 0.1177, 0.1128, 0.1079, 0.4170),
    // 6
    row(0.1654, 0.1063, 0.1063, 0.1016, 0.0972, 0.4232),
    // 7
    row(0.3686, 0.1378, 0.0786, 0.0786, 0.0740, 0.2624),
    // 8
    row(0.1286, 0.3593, 0.1286, 0.0694, 0.0693, 0.2448),
    // 9
    row(0.1200, 0.1200, 0.3507, 0.1208, 0.0615, 0.2270),
    // 10
    row(0.1114, 0.1114, 0.1114, 0.3422, 0.1115, 0.2121),
    // A
    row(0.1308, 0.1308, 0.1308, 0.1308, 0.3614, 0.1154),
];

/// Outcome distribution for an upcard value (2–11). Out-of-range values are
/// clamped; callers always pass `Rank::value()`.
pub fn outcomes_for(upcard_value: u8) -> &'static DealerOutcomes {
    let idx = upcard_value.clamp(2, 11) as usize - 2;
    &DEALER_TABLE[idx]
}

/// EV of standing on `player_total` against the upcard, per unit wagered.
///
/// Busted hands lose outright. Below 17 the player only wins when the
/// dealer busts. From 17 up the dealer's final total decides win/push/loss.
pub fn stand_ev(player_total: u8, upcard_value: u8) -> f64 {
    if player_total > 21 {
        return -1.0;
    }
    let dealer = outcomes_for(upcard_value);
    if player_total < 17 {
        return dealer.bust - (1.0 - dealer.bust);
    }

    let mut win = dealer.bust;
    let mut lose = 0.0;
    for (i, p) in dealer.totals.iter().enumerate() {
        let dealer_total = 17 + i as u8;
        if player_total > dealer_total {
            win += p;
        } else if player_total < dealer_total {
            lose += p;
        }
    }
    win - lose
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_sum_to_one() {
        for (i, r) in DEALER_TABLE.iter().enumerate() {
            let sum: f64 = r.totals.iter().sum::<f64>() + r.bust;
            assert!((sum - 1.0).abs() < 1e-3, "row {i} sums to {sum}");
        }
    }

    #[test]
    fn test_bust_peaks_at_six() {
        let six = outcomes_for(6).bust;
        for v in 2..=11 {
            assert!(outcomes_for(v).bust <= six);
        }
    }

    #[test]
    fn test_stand_ev_bust_loses() {
        assert_eq!(stand_ev(22, 7), -1.0);
        assert_eq!(stand_ev(30, 2), -1.0);
    }

    #[test]
    fn test_stand_ev_low_total_depends_on_dealer_bust() {
        let seven = outcomes_for(7);
        assert!((stand_ev(16, 7) - (2.0 * seven.bust - 1.0)).abs() < 1e-12);
        assert_eq!(stand_ev(12, 7), stand_ev(16, 7));
    }

    #[test]
    fn test_stand_ev_increases_with_total() {
        for up in 2..=11 {
            let mut last = stand_ev(16, up);
            for total in 17..=21 {
                let ev = stand_ev(total, up);
                assert!(ev >= last, "total {total} vs {up}");
                last = ev;
            }
        }
    }

    #[test]
    fn test_stand_ev_twenty_vs_six_strong() {
        assert!(stand_ev(20, 6) > 0.6);
        assert!(stand_ev(21, 10) > 0.8);
    }
}
