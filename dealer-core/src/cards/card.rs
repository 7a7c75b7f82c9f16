use crate::game::GameDef;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

pub const RANK_CHARS: [char; 13] =
    ['2', '3', '4', '5', '6', '7', '8', '9', 'T', 'J', 'Q', 'K', 'A'];
pub const SUIT_CHARS: [char; 4] = ['c', 'd', 'h', 's'];

/// One card, packed as `rank * numSuits + suit` for the deck described by
/// the game definition. Reduced decks use the top ranks and suits, so the
/// text form of a card is stable across variants (`As` is always the ace of
/// spades, whether the deck has 52 cards or 6).
#[derive(Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Card(u8);

#[derive(Debug, PartialEq)]
pub enum CardError {
    BadRank(char),
    BadSuit(char),
}

impl Error for CardError {}

impl fmt::Display for CardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardError::BadRank(c) => write!(f, "no rank {} in this deck", c),
            CardError::BadSuit(c) => write!(f, "no suit {} in this deck", c),
        }
    }
}

impl Card {
    pub fn from_index(i: u8) -> Self {
        Card(i)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn from_rank_suit(game: &GameDef, rank: u8, suit: u8) -> Self {
        Card(rank * game.num_suits + suit)
    }

    pub fn rank(self, game: &GameDef) -> u8 {
        self.0 / game.num_suits
    }

    pub fn suit(self, game: &GameDef) -> u8 {
        self.0 % game.num_suits
    }

    pub fn to_chars(self, game: &GameDef) -> [char; 2] {
        let r = self.rank(game) + RANK_CHARS.len() as u8 - game.num_ranks;
        let s = self.suit(game) + SUIT_CHARS.len() as u8 - game.num_suits;
        [RANK_CHARS[r as usize], SUIT_CHARS[s as usize]]
    }

    pub fn from_chars(game: &GameDef, cs: [char; 2]) -> Result<Self, CardError> {
        let r = RANK_CHARS
            .iter()
            .position(|&c| c == cs[0])
            .ok_or(CardError::BadRank(cs[0]))?;
        let s = SUIT_CHARS
            .iter()
            .position(|&c| c == cs[1])
            .ok_or(CardError::BadSuit(cs[1]))?;
        let rank = r
            .checked_sub(RANK_CHARS.len() - game.num_ranks as usize)
            .ok_or(CardError::BadRank(cs[0]))?;
        let suit = s
            .checked_sub(SUIT_CHARS.len() - game.num_suits as usize)
            .ok_or(CardError::BadSuit(cs[1]))?;
        Ok(Card::from_rank_suit(game, rank as u8, suit as u8))
    }
}

/// Used-card bitset over one deck; the largest deck is 52 cards, so a u64
/// covers it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CardSet(u64);

impl CardSet {
    pub fn insert(&mut self, c: Card) {
        self.0 |= 1 << c.0;
    }

    pub fn contains(self, c: Card) -> bool {
        self.0 & (1 << c.0) != 0
    }

    pub fn len(self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{fixtures, GameDef};

    #[test]
    fn full_deck_chars() {
        let g = GameDef::parse(fixtures::HOLDEM_LIMIT_2P).unwrap();
        assert_eq!(Card::from_index(0).to_chars(&g), ['2', 'c']);
        assert_eq!(Card::from_index(51).to_chars(&g), ['A', 's']);
        let ace = Card::from_chars(&g, ['A', 's']).unwrap();
        assert_eq!(ace.index(), 51);
        assert_eq!(ace.rank(&g), 12);
        assert_eq!(ace.suit(&g), 3);
    }

    #[test]
    fn every_card_round_trips() {
        let g = GameDef::parse(fixtures::HOLDEM_LIMIT_2P).unwrap();
        for i in 0..g.deck_size() as u8 {
            let c = Card::from_index(i);
            assert_eq!(Card::from_chars(&g, c.to_chars(&g)), Ok(c));
        }
    }

    #[test]
    fn reduced_deck_uses_top_ranks_and_suits() {
        let g = GameDef::parse(fixtures::LEDUC_LIMIT_2P).unwrap();
        // 3 ranks x 2 suits: queens and up, hearts and spades
        assert_eq!(Card::from_index(0).to_chars(&g), ['Q', 'h']);
        assert_eq!(Card::from_index(5).to_chars(&g), ['A', 's']);
        assert_eq!(Card::from_chars(&g, ['2', 'h']), Err(CardError::BadRank('2')));
        assert_eq!(Card::from_chars(&g, ['A', 'c']), Err(CardError::BadSuit('c')));
    }

    #[test]
    fn card_set() {
        let mut s = CardSet::default();
        assert!(s.is_empty());
        s.insert(Card::from_index(0));
        s.insert(Card::from_index(51));
        s.insert(Card::from_index(51));
        assert_eq!(s.len(), 2);
        assert!(s.contains(Card::from_index(51)));
        assert!(!s.contains(Card::from_index(1)));
    }
}
