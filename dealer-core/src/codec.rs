use crate::action::Action;
use crate::cards::Card;
use crate::game::{BettingType, GameDef};
use crate::state::{MatchState, State};
use crate::{Chips, Player};
use std::error::Error;
use std::fmt;

pub const VERSION_MAJOR: u32 = 2;
pub const VERSION_MINOR: u32 = 0;
pub const VERSION_REVISION: u32 = 0;

#[derive(Debug, PartialEq)]
pub enum ParseError {
    Expected(&'static str),
    BadNumber,
    BadAction,
    BadBetting,
    BadCards,
}

impl Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Expected(what) => write!(f, "expected {}", what),
            ParseError::BadNumber => write!(f, "bad number"),
            ParseError::BadAction => write!(f, "bad action"),
            ParseError::BadBetting => write!(f, "betting string does not replay"),
            ParseError::BadCards => write!(f, "bad card section"),
        }
    }
}

pub fn print_version() -> String {
    format!("VERSION:{}.{}.{}", VERSION_MAJOR, VERSION_MINOR, VERSION_REVISION)
}

pub fn read_version(s: &str) -> Result<(u32, u32, u32), ParseError> {
    let rest = s.strip_prefix("VERSION:").ok_or(ParseError::Expected("VERSION:"))?;
    let mut pos = 0;
    let (major, used) = read_int::<u32>(rest)?;
    pos += used;
    expect(rest, &mut pos, b'.')?;
    let (minor, used) = read_int::<u32>(&rest[pos..])?;
    pos += used;
    expect(rest, &mut pos, b'.')?;
    let (revision, _) = read_int::<u32>(&rest[pos..])?;
    Ok((major, minor, revision))
}

pub fn print_action(game: &GameDef, action: Action) -> String {
    match action {
        Action::Fold => "f".to_string(),
        Action::Call => "c".to_string(),
        Action::Raise(size) => match game.betting_type {
            // no-limit raises carry their raise-to target on the wire
            BettingType::NoLimit => format!("r{}", size),
            BettingType::Limit => "r".to_string(),
        },
    }
}

pub fn read_action(s: &str, game: &GameDef) -> Result<(Action, usize), ParseError> {
    match s.as_bytes().first() {
        Some(b'f') => Ok((Action::Fold, 1)),
        Some(b'c') => Ok((Action::Call, 1)),
        Some(b'r') => match game.betting_type {
            BettingType::NoLimit => {
                let (size, used) = read_int::<Chips>(&s[1..])?;
                Ok((Action::Raise(size), 1 + used))
            }
            BettingType::Limit => Ok((Action::Raise(0), 1)),
        },
        _ => Err(ParseError::BadAction),
    }
}

/// Per-round action tokens, rounds joined by `/`. Every round the hand has
/// reached appears, so a freshly advanced round shows as a trailing slash.
pub fn print_betting(game: &GameDef, state: &State) -> String {
    let mut out = String::new();
    for r in 0..=state.round {
        if r != 0 {
            out.push('/');
        }
        for t in &state.actions[r] {
            out.push_str(&print_action(game, t.action));
        }
    }
    out
}

pub fn print_state(game: &GameDef, state: &State) -> String {
    format!(
        "STATE:{}:{}:{}",
        state.hand_id,
        print_betting(game, state),
        print_cards_section(game, state)
    )
}

pub fn print_match_state(game: &GameDef, ms: &MatchState) -> String {
    format!(
        "MATCHSTATE:{}:{}:{}:{}",
        ms.viewing_player,
        ms.state.hand_id,
        print_betting(game, &ms.state),
        print_cards_section(game, &ms.state)
    )
}

/// Inverse of `print_state`; returns the parsed state and how many bytes of
/// the line it covered (log lines continue with values and names).
pub fn read_state(s: &str, game: &GameDef) -> Result<(State, usize), ParseError> {
    let prefix = "STATE:";
    let rest = s.strip_prefix(prefix).ok_or(ParseError::Expected("STATE:"))?;
    let (state, used) = read_state_body(rest, game)?;
    Ok((state, prefix.len() + used))
}

/// Inverse of `print_match_state`.
pub fn read_match_state(s: &str, game: &GameDef) -> Result<(MatchState, usize), ParseError> {
    let prefix = "MATCHSTATE:";
    let rest = s.strip_prefix(prefix).ok_or(ParseError::Expected("MATCHSTATE:"))?;
    let mut pos = 0;
    let (viewing_player, used) = read_int::<Player>(rest)?;
    if viewing_player >= game.num_players {
        return Err(ParseError::BadNumber);
    }
    pos += used;
    expect(rest, &mut pos, b':')?;
    let (state, used) = read_state_body(&rest[pos..], game)?;
    Ok((MatchState { state, viewing_player }, prefix.len() + pos + used))
}

/// `<handId>:<betting>:<cards>`, shared by STATE and MATCHSTATE lines.
fn read_state_body(s: &str, game: &GameDef) -> Result<(State, usize), ParseError> {
    let (hand_id, mut pos) = read_int::<u32>(s)?;
    expect(s, &mut pos, b':')?;
    let mut state = State::new(game, hand_id);
    let betting_len = s[pos..].find(':').ok_or(ParseError::Expected(":"))?;
    read_betting(&s[pos..pos + betting_len], game, &mut state)?;
    pos += betting_len;
    expect(s, &mut pos, b':')?;
    let used = read_cards_section(&s[pos..], game, &mut state)?;
    Ok((state, pos + used))
}

/// Rebuild betting state by replaying the tokens through the state
/// machine, checking that the `/` separators line up with where the rounds
/// actually closed.
fn read_betting(s: &str, game: &GameDef, state: &mut State) -> Result<(), ParseError> {
    let mut pos = 0;
    let mut slashes = 0;
    while pos < s.len() {
        if s.as_bytes()[pos] == b'/' {
            slashes += 1;
            if slashes > state.round {
                return Err(ParseError::BadBetting);
            }
            pos += 1;
        } else {
            if state.is_finished() || slashes != state.round {
                return Err(ParseError::BadBetting);
            }
            let (action, used) = read_action(&s[pos..], game)?;
            state.apply(game, action).map_err(|_| ParseError::BadBetting)?;
            pos += used;
        }
    }
    if slashes != state.round {
        return Err(ParseError::BadBetting);
    }
    Ok(())
}

fn print_cards_section(game: &GameDef, state: &State) -> String {
    let mut out = String::new();
    for p in 0..game.num_players {
        if p != 0 {
            out.push('|');
        }
        for &c in &state.hole_cards[p] {
            push_card(game, c, &mut out);
        }
    }
    let mut start = 0;
    for r in 0..=state.round {
        let n = game.num_board_cards[r];
        if n == 0 {
            continue;
        }
        let end = (start + n).min(state.board_cards.len());
        out.push('/');
        for &c in &state.board_cards[start..end] {
            push_card(game, c, &mut out);
        }
        start += n;
    }
    out
}

fn push_card(game: &GameDef, c: Card, out: &mut String) {
    let [r, s] = c.to_chars(game);
    out.push(r);
    out.push(s);
}

fn read_cards_section(s: &str, game: &GameDef, state: &mut State) -> Result<usize, ParseError> {
    let mut pos = 0;
    for p in 0..game.num_players {
        if p != 0 {
            expect(s, &mut pos, b'|')?;
        }
        let cards = read_card_run(s, &mut pos, game);
        if !cards.is_empty() && cards.len() != game.num_hole_cards {
            return Err(ParseError::BadCards);
        }
        state.hole_cards[p] = cards;
    }
    for r in 0..=state.round {
        let n = game.num_board_cards[r];
        if n == 0 {
            continue;
        }
        expect(s, &mut pos, b'/')?;
        let cards = read_card_run(s, &mut pos, game);
        if cards.len() != n {
            return Err(ParseError::BadCards);
        }
        state.board_cards.extend(cards);
    }
    Ok(pos)
}

/// Consume consecutive two-character cards; stops cleanly at separators or
/// end of input.
fn read_card_run(s: &str, pos: &mut usize, game: &GameDef) -> Vec<Card> {
    let b = s.as_bytes();
    let mut cards = Vec::new();
    while *pos + 2 <= b.len() {
        let pair = [b[*pos] as char, b[*pos + 1] as char];
        match Card::from_chars(game, pair) {
            Ok(c) => {
                cards.push(c);
                *pos += 2;
            }
            Err(_) => break,
        }
    }
    cards
}

fn read_int<T: std::str::FromStr>(s: &str) -> Result<(T, usize), ParseError> {
    let digits = s.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Err(ParseError::BadNumber);
    }
    s[..digits]
        .parse()
        .map(|v| (v, digits))
        .map_err(|_| ParseError::BadNumber)
}

fn expect(s: &str, pos: &mut usize, byte: u8) -> Result<(), ParseError> {
    if s.as_bytes().get(*pos) == Some(&byte) {
        *pos += 1;
        Ok(())
    } else {
        Err(match byte {
            b':' => ParseError::Expected(":"),
            b'|' => ParseError::Expected("|"),
            b'/' => ParseError::Expected("/"),
            _ => ParseError::Expected("separator"),
        })
    }
}

/// `%.6f` with trailing zeros trimmed and a lone trailing dot removed, the
/// way values appear in log lines.
pub fn print_value(v: f64) -> String {
    let mut s = format!("{:.6}", v);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}
