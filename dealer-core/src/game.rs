use crate::{Chips, Player, MAX_PLAYERS};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BettingType {
    Limit,
    NoLimit,
}

#[derive(Debug, PartialEq)]
pub enum GameDefError {
    MissingGamedef,
    UnknownKeyword(String),
    BadInteger(String),
    OutOfRange(&'static str),
    WrongLength { keyword: &'static str, expected: usize, got: usize },
    CountNotSet { keyword: &'static str, needs: &'static str },
    Missing(&'static str),
    MissingRaiseSize,
    ZeroStack,
    DeckTooSmall,
}

impl Error for GameDefError {}

impl fmt::Display for GameDefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingGamedef => write!(f, "file does not start with GAMEDEF"),
            Self::UnknownKeyword(kw) => write!(f, "unknown keyword {}", kw),
            Self::BadInteger(tok) => write!(f, "could not read integer from {}", tok),
            Self::OutOfRange(what) => write!(f, "{} is out of range", what),
            Self::WrongLength { keyword, expected, got } => {
                write!(f, "{} needs {} values, found {}", keyword, expected, got)
            }
            Self::CountNotSet { keyword, needs } => {
                write!(f, "{} must come after {}", keyword, needs)
            }
            Self::Missing(what) => write!(f, "{} was never given", what),
            Self::MissingRaiseSize => write!(f, "limit games need raiseSize for every round"),
            Self::ZeroStack => write!(f, "stack of 0 is not a game; omit stack for no limit"),
            Self::DeckTooSmall => write!(f, "deck is too small to deal every card"),
        }
    }
}

/// Immutable description of a variant's structure, read once at startup.
///
/// `firstPlayer` entries are 1-indexed in the file and stored 0-indexed
/// here. A missing `stack` line means no stack limit; missing `maxRaises`
/// means unlimited raising.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDef {
    pub betting_type: BettingType,
    pub num_players: usize,
    pub num_rounds: usize,
    pub stack: Vec<Chips>,
    pub blind: Vec<Chips>,
    pub raise_size: Vec<Chips>,
    pub first_player: Vec<Player>,
    pub max_raises: Vec<u32>,
    pub num_suits: u8,
    pub num_ranks: u8,
    pub num_hole_cards: usize,
    pub num_board_cards: Vec<usize>,
}

impl GameDef {
    pub fn deck_size(&self) -> usize {
        self.num_suits as usize * self.num_ranks as usize
    }

    /// Board cards revealed once betting has reached `round`, i.e. the sum
    /// over all rounds up to and including it.
    pub fn sum_board_cards(&self, round: usize) -> usize {
        self.num_board_cards[..=round].iter().sum()
    }

    pub fn total_board_cards(&self) -> usize {
        self.sum_board_cards(self.num_rounds - 1)
    }

    pub fn max_blind(&self) -> Chips {
        self.blind.iter().copied().max().unwrap_or(0)
    }

    pub fn unlimited_stack(p: Chips) -> bool {
        p == Chips::MAX
    }

    /// Parse the keyword-driven text format. Keywords are case-insensitive,
    /// `=` between keyword and values is optional, `#` starts a comment
    /// line, and every list must match the declared player or round count.
    pub fn parse(src: &str) -> Result<GameDef, GameDefError> {
        let mut in_def = false;
        let mut betting_type = None;
        let mut num_players = None;
        let mut num_rounds = None;
        let mut num_suits = None;
        let mut num_ranks = None;
        let mut num_hole_cards = None;
        let mut stack: Option<Vec<Chips>> = None;
        let mut blind: Option<Vec<Chips>> = None;
        let mut raise_size: Option<Vec<Chips>> = None;
        let mut first_player: Option<Vec<usize>> = None;
        let mut max_raises: Option<Vec<u32>> = None;
        let mut num_board_cards: Option<Vec<usize>> = None;

        for raw in src.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let lower = line.to_ascii_lowercase().replace('=', " ");
            let mut tok = lower.split_whitespace();
            let kw = match tok.next() {
                Some(kw) => kw,
                None => continue,
            };
            if !in_def {
                if kw == "gamedef" {
                    in_def = true;
                    continue;
                }
                return Err(GameDefError::MissingGamedef);
            }
            match kw {
                "end" => match tok.next() {
                    Some("gamedef") => break,
                    _ => return Err(GameDefError::UnknownKeyword(line.to_string())),
                },
                "limit" => betting_type = Some(BettingType::Limit),
                "nolimit" => betting_type = Some(BettingType::NoLimit),
                "numplayers" => {
                    let n: usize = one_int(&mut tok)?;
                    if !(2..=MAX_PLAYERS).contains(&n) {
                        return Err(GameDefError::OutOfRange("numPlayers"));
                    }
                    num_players = Some(n);
                }
                "numrounds" => {
                    let n: usize = one_int(&mut tok)?;
                    if n == 0 {
                        return Err(GameDefError::OutOfRange("numRounds"));
                    }
                    num_rounds = Some(n);
                }
                "numsuits" => {
                    let n: u8 = one_int(&mut tok)?;
                    if !(1..=4).contains(&n) {
                        return Err(GameDefError::OutOfRange("numSuits"));
                    }
                    num_suits = Some(n);
                }
                "numranks" => {
                    let n: u8 = one_int(&mut tok)?;
                    if !(1..=13).contains(&n) {
                        return Err(GameDefError::OutOfRange("numRanks"));
                    }
                    num_ranks = Some(n);
                }
                "numholecards" => {
                    let n: usize = one_int(&mut tok)?;
                    if n == 0 {
                        return Err(GameDefError::OutOfRange("numHoleCards"));
                    }
                    num_hole_cards = Some(n);
                }
                "stack" => stack = Some(per_player_list("stack", &mut tok, num_players)?),
                "blind" => blind = Some(per_player_list("blind", &mut tok, num_players)?),
                "raisesize" => {
                    raise_size = Some(per_round_list("raiseSize", &mut tok, num_rounds)?)
                }
                "firstplayer" => {
                    let list: Vec<usize> = per_round_list("firstPlayer", &mut tok, num_rounds)?;
                    first_player = Some(list);
                }
                "maxraises" => max_raises = Some(per_round_list("maxRaises", &mut tok, num_rounds)?),
                "numboardcards" => {
                    num_board_cards = Some(per_round_list("numBoardCards", &mut tok, num_rounds)?)
                }
                other => return Err(GameDefError::UnknownKeyword(other.to_string())),
            }
        }

        if !in_def {
            return Err(GameDefError::MissingGamedef);
        }
        let num_players = num_players.ok_or(GameDefError::Missing("numPlayers"))?;
        let num_rounds = num_rounds.ok_or(GameDefError::Missing("numRounds"))?;
        let num_suits = num_suits.ok_or(GameDefError::Missing("numSuits"))?;
        let num_ranks = num_ranks.ok_or(GameDefError::Missing("numRanks"))?;
        let num_hole_cards = num_hole_cards.ok_or(GameDefError::Missing("numHoleCards"))?;
        let betting_type = betting_type.unwrap_or(BettingType::Limit);

        let stack = match stack {
            Some(s) => {
                if s.iter().any(|&v| v <= 0) {
                    return Err(GameDefError::ZeroStack);
                }
                s
            }
            None => vec![Chips::MAX; num_players],
        };
        let blind = match blind {
            Some(b) => {
                if b.iter().any(|&v| v < 0) {
                    return Err(GameDefError::OutOfRange("blind"));
                }
                b
            }
            None => vec![0; num_players],
        };
        let raise_size = match raise_size {
            Some(r) => r,
            None if betting_type == BettingType::Limit => {
                return Err(GameDefError::MissingRaiseSize)
            }
            None => vec![0; num_rounds],
        };
        let first_player = match first_player {
            Some(fp) => {
                if fp.iter().any(|&p| p == 0 || p > num_players) {
                    return Err(GameDefError::OutOfRange("firstPlayer"));
                }
                fp.into_iter().map(|p| p - 1).collect()
            }
            None => vec![0; num_rounds],
        };
        let max_raises = max_raises.unwrap_or_else(|| vec![u32::MAX; num_rounds]);
        let num_board_cards = num_board_cards.unwrap_or_else(|| vec![0; num_rounds]);

        let def = GameDef {
            betting_type,
            num_players,
            num_rounds,
            stack,
            blind,
            raise_size,
            first_player,
            max_raises,
            num_suits,
            num_ranks,
            num_hole_cards,
            num_board_cards,
        };
        if def.total_board_cards() + def.num_players * def.num_hole_cards > def.deck_size() {
            return Err(GameDefError::DeckTooSmall);
        }
        Ok(def)
    }
}

fn one_int<'a, T: std::str::FromStr>(
    tok: &mut impl Iterator<Item = &'a str>,
) -> Result<T, GameDefError> {
    let t = tok.next().ok_or_else(|| GameDefError::BadInteger(String::new()))?;
    t.parse().map_err(|_| GameDefError::BadInteger(t.to_string()))
}

fn int_list<'a, T: std::str::FromStr>(
    keyword: &'static str,
    tok: &mut impl Iterator<Item = &'a str>,
    expected: usize,
) -> Result<Vec<T>, GameDefError> {
    let mut out = Vec::with_capacity(expected);
    for t in tok {
        out.push(t.parse().map_err(|_| GameDefError::BadInteger(t.to_string()))?);
    }
    if out.len() != expected {
        return Err(GameDefError::WrongLength { keyword, expected, got: out.len() });
    }
    Ok(out)
}

fn per_player_list<'a, T: std::str::FromStr>(
    keyword: &'static str,
    tok: &mut impl Iterator<Item = &'a str>,
    num_players: Option<usize>,
) -> Result<Vec<T>, GameDefError> {
    let n = num_players.ok_or(GameDefError::CountNotSet { keyword, needs: "numPlayers" })?;
    int_list(keyword, tok, n)
}

fn per_round_list<'a, T: std::str::FromStr>(
    keyword: &'static str,
    tok: &mut impl Iterator<Item = &'a str>,
    num_rounds: Option<usize>,
) -> Result<Vec<T>, GameDefError> {
    let n = num_rounds.ok_or(GameDefError::CountNotSet { keyword, needs: "numRounds" })?;
    int_list(keyword, tok, n)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holdem_limit() {
        let g = GameDef::parse(fixtures::HOLDEM_LIMIT_2P).unwrap();
        assert_eq!(g.betting_type, BettingType::Limit);
        assert_eq!(g.num_players, 2);
        assert_eq!(g.num_rounds, 4);
        assert_eq!(g.blind, vec![10, 5]);
        assert_eq!(g.raise_size, vec![10, 10, 20, 20]);
        // firstPlayer is 1-indexed in the file
        assert_eq!(g.first_player, vec![1, 0, 0, 0]);
        assert_eq!(g.max_raises, vec![3, 4, 4, 4]);
        assert_eq!(g.num_board_cards, vec![0, 3, 1, 1]);
        assert_eq!(g.deck_size(), 52);
        assert_eq!(g.total_board_cards(), 5);
        // no stack line means no stack limit
        assert!(GameDef::unlimited_stack(g.stack[0]));
    }

    #[test]
    fn holdem_nolimit() {
        let g = GameDef::parse(fixtures::HOLDEM_NOLIMIT_2P).unwrap();
        assert_eq!(g.betting_type, BettingType::NoLimit);
        assert_eq!(g.stack, vec![20000, 20000]);
        assert_eq!(g.max_blind(), 100);
        // maxRaises defaults to unlimited
        assert_eq!(g.max_raises, vec![u32::MAX; 4]);
    }

    #[test]
    fn leduc() {
        let g = GameDef::parse(fixtures::LEDUC_LIMIT_2P).unwrap();
        assert_eq!(g.deck_size(), 6);
        assert_eq!(g.num_hole_cards, 1);
        assert_eq!(g.sum_board_cards(0), 0);
        assert_eq!(g.sum_board_cards(1), 1);
    }

    #[test]
    fn unknown_keyword_is_fatal() {
        let src = "GAMEDEF\nnumPlayers = 2\nwibble = 3\nEND GAMEDEF\n";
        assert!(matches!(
            GameDef::parse(src),
            Err(GameDefError::UnknownKeyword(_))
        ));
    }

    #[test]
    fn wrong_list_length_is_fatal() {
        let src = "GAMEDEF\nlimit\nnumPlayers = 2\nnumRounds = 4\nblind = 10 5 0\nEND GAMEDEF\n";
        assert!(matches!(
            GameDef::parse(src),
            Err(GameDefError::WrongLength { keyword: "blind", expected: 2, got: 3 })
        ));
    }

    #[test]
    fn list_before_count_is_fatal() {
        let src = "GAMEDEF\nblind = 10 5\nnumPlayers = 2\nEND GAMEDEF\n";
        assert!(matches!(
            GameDef::parse(src),
            Err(GameDefError::CountNotSet { .. })
        ));
    }

    #[test]
    fn explicit_zero_stack_is_fatal() {
        let src = "GAMEDEF\nnolimit\nnumPlayers = 2\nnumRounds = 1\nstack = 0 100\n\
                   numSuits = 4\nnumRanks = 13\nnumHoleCards = 2\nEND GAMEDEF\n";
        assert_eq!(GameDef::parse(src), Err(GameDefError::ZeroStack));
    }

    #[test]
    fn limit_without_raise_size_is_fatal() {
        let src = "GAMEDEF\nlimit\nnumPlayers = 2\nnumRounds = 1\n\
                   numSuits = 4\nnumRanks = 13\nnumHoleCards = 2\nEND GAMEDEF\n";
        assert_eq!(GameDef::parse(src), Err(GameDefError::MissingRaiseSize));
    }

    #[test]
    fn deck_must_cover_the_deal() {
        let src = "GAMEDEF\nlimit\nnumPlayers = 2\nnumRounds = 1\nraiseSize = 2\n\
                   numSuits = 2\nnumRanks = 3\nnumHoleCards = 3\nnumBoardCards = 1\nEND GAMEDEF\n";
        assert_eq!(GameDef::parse(src), Err(GameDefError::DeckTooSmall));
    }

    #[test]
    fn survives_serde() {
        let g = GameDef::parse(fixtures::HOLDEM_NOLIMIT_2P).unwrap();
        let json = serde_json::to_string(&g).unwrap();
        let back: GameDef = serde_json::from_str(&json).unwrap();
        assert_eq!(g, back);
    }
}
