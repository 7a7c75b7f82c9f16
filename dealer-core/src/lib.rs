pub mod action;
pub mod cards;
pub mod codec;
pub mod dealer;
pub mod game;
pub mod net;
pub mod rng;
pub mod rollout;
pub mod state;
pub mod value;

pub use cards::{card, deck, eval};

pub const MAX_PLAYERS: usize = 10;
pub const MAX_LINE_LEN: usize = 4096;

pub type Chips = i32;
/// Physical chair index, tied to one socket for the whole match.
pub type Seat = usize;
/// Logical player index; rotates between hands unless seats are fixed.
pub type Player = usize;
pub type Micros = u64;

/// Everything that can end a match early, with enough context to tell the
/// operator which seat (1-indexed in messages) is at fault. The bare
/// wrapper variants forward straight to the inner error's message.
#[derive(Debug, derive_more::Display)]
pub enum MatchError {
    #[display(fmt = "seat {} sent an incompatible version: {}", "seat + 1", line)]
    VersionMismatch { seat: Seat, line: String },
    #[display(
        fmt = "seat {} ran out of time ({:.1} seconds for one response)",
        "seat + 1",
        "*elapsed_micros as f64 / 1_000_000.0"
    )]
    ReadTimeout { seat: Seat, elapsed_micros: Micros },
    #[display(
        fmt = "seat {} ran out of time ({:.1} seconds used this hand)",
        "seat + 1",
        "*used_micros as f64 / 1_000_000.0"
    )]
    HandTimeout { seat: Seat, used_micros: Micros },
    #[display(
        fmt = "seat {} ran out of time ({:.1} seconds used this match)",
        "seat + 1",
        "*used_micros as f64 / 1_000_000.0"
    )]
    MatchTimeout { seat: Seat, used_micros: Micros },
    #[display(fmt = "seat {} sent too many invalid actions, last: {}", "seat + 1", line)]
    InvalidAction { seat: Seat, line: String },
    #[display(fmt = "bad transaction entry: {}", line)]
    JournalParse { line: String },
    GameParse(game::GameDefError),
    #[display(fmt = "socket failure on seat {}: {}", "seat + 1", source)]
    Socket { seat: Seat, source: std::io::Error },
    #[display(fmt = "protocol failure on seat {}: {}", "seat + 1", detail)]
    Protocol { seat: Seat, detail: String },
    Io(std::io::Error),
}

impl std::error::Error for MatchError {}

impl From<game::GameDefError> for MatchError {
    fn from(e: game::GameDefError) -> Self {
        Self::GameParse(e)
    }
}

/// Log and journal writes; socket errors are wrapped per-seat instead.
impl From<std::io::Error> for MatchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
