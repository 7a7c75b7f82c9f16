use crate::action::Action;
use crate::cards::deck::DeckError;
use crate::cards::{Card, Deck};
use crate::game::{BettingType, GameDef};
use crate::rng::Rng;
use crate::{Chips, Player};
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, derive_more::Display, derive_more::Error)]
pub enum StateError {
    HandFinished,
}

/// One action as it happened, with the player who took it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taken {
    pub player: Player,
    pub action: Action,
}

/// One hand of the game, from deal to terminal state. All dealer-internal
/// state is indexed by logical player; the seat mapping lives in the match
/// loop.
///
/// Cards are all dealt up front; `visible_board` exposes the prefix the
/// current round has revealed. An empty `hole_cards[p]` means player p's
/// cards are not visible in this view of the hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub hand_id: u32,
    pub round: usize,
    pub finished: bool,
    pub hole_cards: Vec<Vec<Card>>,
    pub board_cards: Vec<Card>,
    pub actions: Vec<Vec<Taken>>,
    pub spent: Vec<Chips>,
    pub folded: Vec<bool>,
    pub max_spent: Chips,
    pub min_no_limit_raise_to: Chips,
}

impl State {
    /// Fresh hand with blinds posted and no cards dealt. Parsing starts
    /// from here; the dealer uses `deal`.
    pub fn new(game: &GameDef, hand_id: u32) -> State {
        let max_spent = game.max_blind();
        let min_no_limit_raise_to = match game.betting_type {
            BettingType::NoLimit if max_spent > 0 => max_spent * 2,
            BettingType::NoLimit => 1,
            BettingType::Limit => 0,
        };
        State {
            hand_id,
            round: 0,
            finished: false,
            hole_cards: vec![Vec::new(); game.num_players],
            board_cards: Vec::new(),
            actions: vec![Vec::new(); game.num_rounds],
            spent: game.blind.clone(),
            folded: vec![false; game.num_players],
            max_spent,
            min_no_limit_raise_to,
        }
    }

    /// Deal a full hand: shuffle, then player 0's hole cards, player 1's,
    /// and so on, then every round's board cards in round order. Dealing by
    /// player keeps a seed replay independent of seat rotation.
    pub fn deal(game: &GameDef, rng: &mut Rng, hand_id: u32) -> Result<State, DeckError> {
        let mut state = State::new(game, hand_id);
        let mut deck = Deck::shuffled(game, rng);
        for p in 0..game.num_players {
            for _ in 0..game.num_hole_cards {
                state.hole_cards[p].push(deck.draw()?);
            }
        }
        for _ in 0..game.total_board_cards() {
            state.board_cards.push(deck.draw()?);
        }
        Ok(state)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Board cards revealed so far.
    pub fn visible_board(&self, game: &GameDef) -> &[Card] {
        let n = game.sum_board_cards(self.round).min(self.board_cards.len());
        &self.board_cards[..n]
    }

    pub fn pot_total(&self) -> Chips {
        self.spent.iter().sum()
    }

    pub fn num_folded(&self) -> usize {
        self.folded.iter().filter(|&&f| f).count()
    }

    /// Players who can still put chips in: not folded, not all-in.
    pub fn num_acting_players(&self, game: &GameDef) -> usize {
        (0..game.num_players)
            .filter(|&p| !self.folded[p] && self.spent[p] < game.stack[p])
            .count()
    }

    pub fn num_all_in(&self, game: &GameDef) -> usize {
        (0..game.num_players)
            .filter(|&p| self.spent[p] >= game.stack[p])
            .count()
    }

    pub fn num_raises(&self) -> usize {
        self.actions[self.round]
            .iter()
            .filter(|t| t.action.is_raise())
            .count()
    }

    /// The player whose turn it is, or None once the hand is over.
    pub fn current_player(&self, game: &GameDef) -> Option<Player> {
        if self.finished {
            return None;
        }
        let from = match self.actions[self.round].last() {
            Some(t) => t.player,
            // round opens at firstPlayer; starting one short of it makes
            // the advance below land there
            None => (game.first_player[self.round] + game.num_players - 1) % game.num_players,
        };
        self.next_acting_after(game, from)
    }

    fn next_acting_after(&self, game: &GameDef, mut p: Player) -> Option<Player> {
        for _ in 0..game.num_players {
            p = (p + 1) % game.num_players;
            if !self.folded[p] && self.spent[p] < game.stack[p] {
                return Some(p);
            }
        }
        None
    }

    /// Actions since the last raise (or round open) by players who have
    /// matched the bet and could still act. Betting closes when this
    /// reaches the acting player count.
    fn num_called(&self, game: &GameDef) -> usize {
        let mut called = 0;
        for t in self.actions[self.round].iter().rev() {
            if t.action.is_raise() {
                // the raiser has called their own bet, unless it put them all-in
                if self.spent[t.player] < game.stack[t.player] {
                    called += 1;
                }
                return called;
            }
            if !self.folded[t.player] && self.spent[t.player] < game.stack[t.player] {
                called += 1;
            }
        }
        called
    }

    /// Apply an already-validated action for the current player, advancing
    /// the round or finishing the hand as needed.
    pub fn apply(&mut self, game: &GameDef, action: Action) -> Result<(), StateError> {
        let p = self.current_player(game).ok_or(StateError::HandFinished)?;
        self.actions[self.round].push(Taken { player: p, action });
        match action {
            Action::Fold => self.folded[p] = true,
            Action::Call => self.spent[p] = self.max_spent.min(game.stack[p]),
            Action::Raise(size) => {
                match game.betting_type {
                    BettingType::NoLimit => {
                        // the next raise must call this one and raise by at
                        // least as much again
                        let next_min = size + (size - self.max_spent);
                        if next_min > self.min_no_limit_raise_to {
                            self.min_no_limit_raise_to = next_min;
                        }
                        self.max_spent = size;
                    }
                    BettingType::Limit => {
                        self.max_spent =
                            (self.max_spent + game.raise_size[self.round]).min(game.stack[p]);
                    }
                }
                self.spent[p] = self.max_spent.min(game.stack[p]);
            }
        }

        if self.num_folded() + 1 >= game.num_players {
            // last player standing wins immediately, whatever the round
            self.finished = true;
        } else if self.num_called(game) >= self.num_acting_players(game) {
            if self.round + 1 < game.num_rounds {
                if self.num_acting_players(game) > 1 {
                    self.round += 1;
                    if game.betting_type == BettingType::NoLimit {
                        self.min_no_limit_raise_to = self.max_spent + game.max_blind().max(1);
                    }
                } else {
                    // everyone left is all-in; run the board out and settle
                    self.round = game.num_rounds - 1;
                    self.finished = true;
                }
            } else {
                self.finished = true;
            }
        }
        Ok(())
    }

    /// Legal raise-to bounds for the current actor, or None when raising is
    /// not allowed at all.
    pub fn raise_bounds(&self, game: &GameDef) -> Option<(Chips, Chips)> {
        let p = self.current_player(game)?;
        if self.num_raises() as u32 >= game.max_raises[self.round] {
            return None;
        }
        if self.num_acting_players(game) <= 1 {
            // no one left who could call
            return None;
        }
        if game.stack[p] <= self.max_spent {
            return None;
        }
        match game.betting_type {
            BettingType::Limit => {
                let to = (self.max_spent + game.raise_size[self.round]).min(game.stack[p]);
                Some((to, to))
            }
            BettingType::NoLimit => {
                let max = game.stack[p];
                // a short stack may raise all-in below the full minimum
                let min = self.min_no_limit_raise_to.min(max);
                Some((min, max))
            }
        }
    }

    /// Validate an action for the current actor. `fix_size` (dealer mode)
    /// silently clamps a no-limit raise into its legal bounds; without it
    /// (log and journal replay) an out-of-bounds raise is rejected.
    pub fn is_valid_action(&self, game: &GameDef, fix_size: bool, action: &mut Action) -> bool {
        let p = match self.current_player(game) {
            Some(p) => p,
            None => return false,
        };
        match *action {
            // folding is only legal when there is a bet to fold to
            Action::Fold => self.spent[p] < self.max_spent,
            Action::Call => true,
            Action::Raise(size) => {
                let (min, max) = match self.raise_bounds(game) {
                    Some(bounds) => bounds,
                    None => return false,
                };
                if game.betting_type == BettingType::Limit {
                    return true;
                }
                if size < min {
                    if !fix_size {
                        return false;
                    }
                    *action = Action::Raise(min);
                } else if size > max {
                    if !fix_size {
                        return false;
                    }
                    *action = Action::Raise(max);
                }
                true
            }
        }
    }
}

/// The view of a hand one player gets over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    pub state: State,
    pub viewing_player: Player,
}

impl MatchState {
    /// Filter a hand down to what `viewing_player` may see: their own hole
    /// cards, the revealed board, and at a showdown finish the cards of
    /// everyone still standing.
    pub fn view(game: &GameDef, state: &State, viewing_player: Player) -> MatchState {
        let mut s = state.clone();
        let showdown = s.finished && s.num_folded() + 1 < game.num_players;
        for p in 0..game.num_players {
            if p != viewing_player && !(showdown && !s.folded[p]) {
                s.hole_cards[p].clear();
            }
        }
        s.board_cards.truncate(game.sum_board_cards(s.round));
        MatchState { state: s, viewing_player }
    }

    /// Structural equality ignoring who is looking.
    pub fn equal_ignoring_viewer(&self, other: &MatchState) -> bool {
        self.state == other.state
    }
}
