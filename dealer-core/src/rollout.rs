use crate::cards::{Card, CardSet};
use crate::codec::read_state;
use crate::game::GameDef;
use crate::value::values;

/// Descending-index counter over the k-card subsets of a deck of size d.
/// Starts at the highest indices and decrements; every subset comes up
/// exactly once, in an order that lets the caller patch board slots in
/// place.
struct BoardCounter {
    idx: Vec<usize>,
}

impl BoardCounter {
    fn new(d: usize, k: usize) -> Self {
        BoardCounter { idx: (0..k).map(|i| d - k + i).collect() }
    }

    /// Step to the next combination; false once every one has been seen.
    fn advance(&mut self) -> bool {
        let k = self.idx.len();
        let mut i = 0;
        while i < k && self.idx[i] == i {
            i += 1;
        }
        if i == k {
            return false;
        }
        self.idx[i] -= 1;
        while i > 0 {
            i -= 1;
            self.idx[i] = self.idx[i + 1] - 1;
        }
        true
    }
}

/// Post-process one log line: for a hand that ended with players all-in
/// before the last board cards came down, replace the values with the
/// average over every possible completion of the board. Lines that aren't
/// states are dropped (None); states the rollout doesn't apply to pass
/// through unchanged.
pub fn rollout_line(game: &GameDef, line: &str) -> Option<String> {
    let (mut state, state_end) = match read_state(line, game) {
        Ok(parsed) => parsed,
        Err(_) => return None,
    };
    if state.num_all_in(game) == 0 || state.num_folded() + 1 >= game.num_players {
        // no one all-in, or no showdown
        return Some(line.to_string());
    }

    // last round in which anyone acted
    let mut last_round = state.round;
    while last_round > 0 && state.actions[last_round].is_empty() {
        last_round -= 1;
    }
    if last_round + 1 == game.num_rounds {
        // nothing left to roll out
        return Some(line.to_string());
    }

    let total = game.total_board_cards();
    if state.board_cards.len() != total {
        return Some(line.to_string());
    }

    let mut used = CardSet::default();
    for hole in &state.hole_cards {
        for &c in hole {
            used.insert(c);
        }
    }
    let bc_start = game.sum_board_cards(last_round);
    for &c in &state.board_cards[..bc_start] {
        used.insert(c);
    }
    let deck: Vec<Card> = (0..game.deck_size() as u8)
        .map(Card::from_index)
        .filter(|&c| !used.contains(c))
        .collect();
    let k = total - bc_start;

    let mut counter = BoardCounter::new(deck.len(), k);
    let mut total_value = vec![0.0f64; game.num_players];
    let mut num_boards: u64 = 0;
    loop {
        for (slot, &i) in counter.idx.iter().enumerate() {
            state.board_cards[bc_start + slot] = deck[i];
        }
        for (p, v) in values(game, &state).into_iter().enumerate() {
            total_value[p] += v;
        }
        num_boards += 1;
        if !counter.advance() {
            break;
        }
    }

    // splice the averaged values in; state text and names stay as they were
    let mut out = String::with_capacity(line.len());
    out.push_str(&line[..state_end]);
    out.push(':');
    for (p, v) in total_value.iter().enumerate() {
        if p != 0 {
            out.push('|');
        }
        out.push_str(&format!("{:.6}", v / num_boards as f64));
    }
    if let Some(rest) = line[state_end..].strip_prefix(':') {
        if let Some(names_at) = rest.find(':') {
            out.push_str(&rest[names_at..]);
        }
    }
    Some(out)
}
