use crate::cards::card::Card;
use crate::game::GameDef;
use crate::rng::Rng;
use std::error::Error;
use std::fmt;

#[derive(Debug, PartialEq)]
pub enum DeckError {
    OutOfCards,
}

impl Error for DeckError {}

impl fmt::Display for DeckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeckError::OutOfCards => write!(f, "No more cards in deck"),
        }
    }
}

/// One shuffled deck for one hand.
#[derive(Debug, PartialEq)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Fisher-Yates over the whole deck, drawing `next_u32() % remaining`
    /// for each swap. The draw pattern is part of the seeded-replay
    /// contract, which is why this doesn't go through `SliceRandom`.
    pub fn shuffled(game: &GameDef, rng: &mut Rng) -> Self {
        let mut cards: Vec<Card> = (0..game.deck_size() as u8).map(Card::from_index).collect();
        for i in (1..cards.len()).rev() {
            let j = rng.below(i as u32 + 1) as usize;
            cards.swap(i, j);
        }
        Deck { cards }
    }

    /// Draw the topmost card, or an error if the deck ran dry.
    pub fn draw(&mut self) -> Result<Card, DeckError> {
        self.cards.pop().ok_or(DeckError::OutOfCards)
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }
}
