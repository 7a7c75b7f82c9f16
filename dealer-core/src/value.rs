use crate::cards::eval::{rank_hand, HandValue};
use crate::game::GameDef;
use crate::state::State;
use crate::{Chips, Player};

/// Net chip delta for every player at a terminal state.
///
/// Everyone starts down what they spent; the pot is then handed back out.
/// When contenders are in for different amounts (someone was all-in), the
/// pot splits into sub-pots at each distinct contribution level, and only
/// players in for at least that much can win the corresponding slice. Ties
/// split a slice evenly, which is where half-chips come from. The results
/// always sum to zero across players.
pub fn values(game: &GameDef, state: &State) -> Vec<f64> {
    debug_assert!(state.is_finished());
    let n = game.num_players;
    // 0.0 - x rather than -x so a zero spend stays positive zero in the log
    let mut value: Vec<f64> = state.spent.iter().map(|&s| 0.0 - s as f64).collect();

    let contenders: Vec<Player> = (0..n).filter(|&p| !state.folded[p]).collect();
    if contenders.len() == 1 {
        // no showdown needed
        value[contenders[0]] += state.pot_total() as f64;
        return value;
    }

    let board = state.visible_board(game);
    let strength: Vec<(Player, HandValue)> = contenders
        .iter()
        .map(|&p| {
            let mut cards = state.hole_cards[p].clone();
            cards.extend_from_slice(board);
            (p, rank_hand(game, &cards))
        })
        .collect();

    let mut thresholds: Vec<Chips> = contenders.iter().map(|&p| state.spent[p]).collect();
    thresholds.sort_unstable();
    thresholds.dedup();

    let mut allocated: Chips = 0;
    for &t in &thresholds {
        let pot: Chips = (0..n).map(|p| state.spent[p].min(t)).sum::<Chips>() - allocated;
        allocated += pot;
        let eligible: Vec<(Player, HandValue)> = strength
            .iter()
            .copied()
            .filter(|&(p, _)| state.spent[p] >= t)
            .collect();
        // the largest contributor is always eligible, so this can't be empty
        let best = eligible.iter().map(|&(_, v)| v).max().unwrap();
        let winners: Vec<Player> =
            eligible.iter().filter(|&&(_, v)| v == best).map(|&(p, _)| p).collect();
        let share = pot as f64 / winners.len() as f64;
        for w in winners {
            value[w] += share;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::cards::Card;
    use crate::game::fixtures;
    use crate::state::State;

    fn cards(game: &GameDef, s: &str) -> Vec<Card> {
        let mut v = vec![];
        let mut chars = s.chars();
        while let Some(r) = chars.next() {
            let su = chars.next().unwrap();
            v.push(Card::from_chars(game, [r, su]).unwrap());
        }
        v
    }

    fn assert_zero_sum(v: &[f64]) {
        assert_eq!(v.iter().sum::<f64>(), 0.0, "payouts must sum to zero: {:?}", v);
    }

    #[test]
    fn fold_hands_the_pot_over() {
        let g = GameDef::parse(fixtures::HOLDEM_LIMIT_2P).unwrap();
        let mut s = State::new(&g, 0);
        s.apply(&g, Action::Fold).unwrap();
        let v = values(&g, &s);
        assert_eq!(v, vec![5.0, -5.0]);
        assert_zero_sum(&v);
    }

    #[test]
    fn showdown_pays_the_better_hand() {
        let g = GameDef::parse(fixtures::HOLDEM_LIMIT_2P).unwrap();
        let mut s = State::new(&g, 0);
        s.hole_cards[0] = cards(&g, "AcAd");
        s.hole_cards[1] = cards(&g, "KcKd");
        s.board_cards = cards(&g, "2h7d9sTs3c");
        s.spent = vec![20, 20];
        s.round = g.num_rounds - 1;
        s.finished = true;
        let v = values(&g, &s);
        assert_eq!(v, vec![20.0, -20.0]);
        assert_zero_sum(&v);
    }

    #[test]
    fn board_plays_and_the_pot_splits() {
        let g = GameDef::parse(fixtures::HOLDEM_LIMIT_2P).unwrap();
        let mut s = State::new(&g, 0);
        s.hole_cards[0] = cards(&g, "2c3c");
        s.hole_cards[1] = cards(&g, "2d3d");
        s.board_cards = cards(&g, "TdJhQsKsAh");
        s.spent = vec![30, 30];
        s.round = g.num_rounds - 1;
        s.finished = true;
        let v = values(&g, &s);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn odd_pot_split_gives_half_chips() {
        let g = GameDef::parse(fixtures::HOLDEM_LIMIT_3P).unwrap();
        let mut s = State::new(&g, 0);
        s.hole_cards[0] = cards(&g, "2c3c");
        s.hole_cards[1] = cards(&g, "2d3d");
        s.hole_cards[2] = cards(&g, "8c8d");
        s.board_cards = cards(&g, "TdJhQsKsAh");
        // the folded player's chips make the pot odd for the two who tie
        s.spent = vec![5, 5, 5];
        s.folded = vec![false, false, true];
        s.round = g.num_rounds - 1;
        s.finished = true;
        let v = values(&g, &s);
        assert_eq!(v, vec![2.5, 2.5, -5.0]);
        assert_zero_sum(&v);
    }

    #[test]
    fn side_pots_cap_the_short_stack() {
        let g = GameDef::parse(fixtures::HOLDEM_LIMIT_3P).unwrap();
        let mut s = State::new(&g, 0);
        s.hole_cards[0] = cards(&g, "AcAd"); // best hand, short stack
        s.hole_cards[1] = cards(&g, "KcKs");
        s.hole_cards[2] = cards(&g, "6c4c");
        s.board_cards = cards(&g, "2h5d9sJsQc");
        s.spent = vec![50, 200, 200];
        s.round = g.num_rounds - 1;
        s.finished = true;
        let v = values(&g, &s);
        // player 0 takes the 150 main pot, player 1 the 300 side pot
        assert_eq!(v, vec![100.0, 100.0, -200.0]);
        assert_zero_sum(&v);
    }

    #[test]
    fn uncalled_overbet_comes_back() {
        let g = GameDef::parse(fixtures::HOLDEM_NOLIMIT_2P).unwrap();
        let mut s = State::new(&g, 0);
        s.hole_cards[0] = cards(&g, "2c7d"); // loser, but in for more
        s.hole_cards[1] = cards(&g, "AcAd");
        s.board_cards = cards(&g, "3h5d9sJsQc");
        s.spent = vec![300, 200];
        s.round = g.num_rounds - 1;
        s.finished = true;
        let v = values(&g, &s);
        assert_eq!(v, vec![-200.0, 200.0]);
        assert_zero_sum(&v);
    }

    #[test]
    fn leduc_pair_wins() {
        let g = GameDef::parse(fixtures::LEDUC_LIMIT_2P).unwrap();
        let mut s = State::new(&g, 0);
        s.hole_cards[0] = cards(&g, "Qh");
        s.hole_cards[1] = cards(&g, "As");
        s.board_cards = cards(&g, "Qs");
        s.spent = vec![3, 3];
        s.round = 1;
        s.finished = true;
        let v = values(&g, &s);
        assert_eq!(v, vec![3.0, -3.0]);
    }
}
