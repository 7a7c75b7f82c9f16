use crate::cards::card::Card;
use crate::game::GameDef;
use itertools::Itertools;

/// It's important that this order is maintained from worst hand to best;
/// the comparisons below lean on the derived Ord.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandClass {
    HighCard,
    Pair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
}

/// Comparable strength of one set of cards: the class, then the tiebreak
/// ranks in order of significance (quad rank before kicker, high pair
/// before low pair, and so on), zero-padded.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct HandValue {
    class: HandClass,
    ranks: [u8; 5],
}

impl HandValue {
    pub fn class(&self) -> HandClass {
        self.class
    }
}

/// Rank the best hand makeable from the given cards: best 5-card set when
/// five or more are available, otherwise the whole set with the
/// multiplicity part of the ladder (a two-card Leduc hand is a pair or a
/// high card, nothing else).
pub fn rank_hand(game: &GameDef, cards: &[Card]) -> HandValue {
    if cards.len() <= 5 {
        return rank_set(game, cards);
    }
    cards
        .iter()
        .copied()
        .combinations(5)
        .map(|five| rank_set(game, &five))
        .max()
        .unwrap()
}

fn rank_set(game: &GameDef, cards: &[Card]) -> HandValue {
    let mut ranks: Vec<u8> = cards.iter().map(|c| c.rank(game)).collect();
    ranks.sort_unstable_by(|a, b| b.cmp(a));

    // group ranks by multiplicity: (count, rank), biggest group first
    let mut groups: Vec<(u8, u8)> = Vec::with_capacity(ranks.len());
    for &r in &ranks {
        match groups.last_mut() {
            Some(g) if g.1 == r => g.0 += 1,
            _ => groups.push((1, r)),
        }
    }
    groups.sort_unstable_by(|a, b| b.cmp(a));

    let class = match (groups[0].0, groups.get(1).map_or(0, |g| g.0)) {
        (4, _) => HandClass::FourOfAKind,
        (3, 2) => HandClass::FullHouse,
        (3, _) => HandClass::ThreeOfAKind,
        (2, 2) => HandClass::TwoPair,
        (2, _) => HandClass::Pair,
        _ => HandClass::HighCard,
    };
    let mut value = HandValue { class, ranks: tiebreak(&groups) };

    // straights and flushes only exist as 5-card shapes
    if cards.len() == 5 {
        let flush = cards.iter().all(|c| c.suit(game) == cards[0].suit(game));
        value = match (straight_high(&ranks, game.num_ranks), flush) {
            (Some(hi), true) => HandValue { class: HandClass::StraightFlush, ranks: pad(hi) },
            (Some(hi), false) => HandValue { class: HandClass::Straight, ranks: pad(hi) },
            (None, true) => HandValue { class: HandClass::Flush, ranks: value.ranks },
            (None, false) => value,
        };
    }
    value
}

fn tiebreak(groups: &[(u8, u8)]) -> [u8; 5] {
    let mut out = [0u8; 5];
    for (i, g) in groups.iter().take(5).enumerate() {
        out[i] = g.1;
    }
    out
}

fn pad(hi: u8) -> [u8; 5] {
    [hi, 0, 0, 0, 0]
}

/// High card of the straight, if these five sorted-descending ranks form
/// one. The ace plays low in the wheel, which sorts as A5432.
fn straight_high(sorted_desc: &[u8], num_ranks: u8) -> Option<u8> {
    if sorted_desc[0] == num_ranks - 1 && sorted_desc[1..] == [3, 2, 1, 0] {
        return Some(3);
    }
    for w in sorted_desc.windows(2) {
        if w[0] != w[1] + 1 {
            return None;
        }
    }
    Some(sorted_desc[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{fixtures, GameDef};

    fn holdem() -> GameDef {
        GameDef::parse(fixtures::HOLDEM_LIMIT_2P).unwrap()
    }

    fn cards(game: &GameDef, s: &str) -> Vec<Card> {
        let mut v = vec![];
        let mut chars = s.chars();
        while let Some(r) = chars.next() {
            let su = chars.next().expect("need even number of chars");
            v.push(Card::from_chars(game, [r, su]).unwrap());
        }
        v
    }

    fn rank(game: &GameDef, s: &str) -> HandValue {
        rank_hand(game, &cards(game, s))
    }

    #[test]
    fn ladder_order() {
        let g = holdem();
        let hands = [
            "2c5d8h9sKd", // high card
            "2c2d8h9sKd", // pair
            "2c2d8h8sKd", // two pair
            "2c2d2h9sKd", // trips
            "5c6d7h8s9d", // straight
            "2c6c7c8cKc", // flush
            "2c2d2hKsKd", // full house
            "2c2d2h2sKd", // quads
            "5c6c7c8c9c", // straight flush
        ];
        for pair in hands.windows(2) {
            assert!(
                rank(&g, pair[0]) < rank(&g, pair[1]),
                "{} should lose to {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn wheel_is_the_lowest_straight() {
        let g = holdem();
        let wheel = rank(&g, "Ac2d3h4s5d");
        let six_high = rank(&g, "2d3h4s5d6c");
        assert_eq!(wheel.class(), HandClass::Straight);
        assert!(wheel < six_high);
        // but the wheel still beats anything below a straight
        assert!(wheel > rank(&g, "AcAdAhKsQd"));
    }

    #[test]
    fn kickers_break_ties() {
        let g = holdem();
        assert!(rank(&g, "2c2d2h2sKd") > rank(&g, "2c2d2h2sQd"));
        // low pair is less significant than high pair, kicker least
        assert!(rank(&g, "KcKd9h9s2d") > rank(&g, "KcKd8h8sAd"));
        assert!(rank(&g, "KcKd8h8sAd") > rank(&g, "KcKd8h8s2d"));
        assert!(rank(&g, "AcKd8h5s3d") > rank(&g, "AcKd8h5s2d"));
        assert_eq!(rank(&g, "AcKd8h5s3d"), rank(&g, "AhKs8c5d3c"));
    }

    #[test]
    fn best_five_of_seven() {
        let g = holdem();
        // the pair of aces should be ignored in favor of the flush
        let v = rank(&g, "AcAd2d5d9dJdKs");
        assert_eq!(v.class(), HandClass::Flush);
        // board plays: everyone has the broadway straight
        let a = rank(&g, "2c3dTdJhQsKdAc");
        let b = rank(&g, "9h8hTdJhQsKdAc");
        assert_eq!(a, b);
        assert_eq!(a.class(), HandClass::Straight);
    }

    #[test]
    fn short_sets_rank_by_multiplicity() {
        let g = GameDef::parse(fixtures::LEDUC_LIMIT_2P).unwrap();
        let pair = rank_hand(&g, &cards(&g, "QhQs"));
        let ace_high = rank_hand(&g, &cards(&g, "AhQs"));
        let king_high = rank_hand(&g, &cards(&g, "KhQs"));
        assert_eq!(pair.class(), HandClass::Pair);
        assert!(pair > ace_high);
        assert!(ace_high > king_high);
    }
}
