use crate::action::Action;
use crate::codec;
use crate::game::GameDef;
use crate::net::{self, LineReader, ReadError};
use crate::rng::Rng;
use crate::state::{MatchState, State};
use crate::value::values;
use crate::{MatchError, Micros, Player, Seat, MAX_LINE_LEN};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const DEFAULT_MAX_INVALID_ACTIONS: u32 = u32::MAX;
pub const DEFAULT_MAX_RESPONSE_MICROS: Micros = 600_000_000;
pub const DEFAULT_MAX_USED_HAND_MICROS: Micros = 600_000_000;
pub const DEFAULT_MAX_USED_PER_HAND_MICROS: Micros = 7_000_000;

/// Wall-clock stamp with microsecond resolution; the `sec.usec` unit the
/// transaction journal is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub sec: u64,
    pub usec: u32,
}

impl Stamp {
    pub fn now() -> Stamp {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Stamp { sec: since_epoch.as_secs(), usec: since_epoch.subsec_micros() }
    }

    /// Micros from `earlier` to self. The wall clock can step backwards
    /// between reads; such an interval charges as zero.
    pub fn micros_since(self, earlier: Stamp) -> Micros {
        let a = self.sec as i64 * 1_000_000 + self.usec as i64;
        let b = earlier.sec as i64 * 1_000_000 + earlier.usec as i64;
        (a - b).max(0) as Micros
    }

    pub fn parse(s: &str) -> Option<Stamp> {
        let (sec, usec) = s.split_once('.')?;
        let sec = sec.parse().ok()?;
        let usec: u32 = usec.parse().ok()?;
        if usec >= 1_000_000 {
            return None;
        }
        Some(Stamp { sec, usec })
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.sec, self.usec)
    }
}

/// The per-response, per-hand, and per-match time limits, plus the invalid
/// action tolerance. The match budget is the per-hand average scaled by the
/// hand count; the CLI does that arithmetic.
#[derive(Debug, Clone, Copy)]
pub struct Budgets {
    pub max_invalid_actions: u32,
    pub max_response_micros: Micros,
    pub max_used_hand_micros: Micros,
    pub max_used_match_micros: Micros,
}

impl Default for Budgets {
    fn default() -> Self {
        Budgets {
            max_invalid_actions: DEFAULT_MAX_INVALID_ACTIONS,
            max_response_micros: DEFAULT_MAX_RESPONSE_MICROS,
            max_used_hand_micros: DEFAULT_MAX_USED_HAND_MICROS,
            max_used_match_micros: DEFAULT_MAX_USED_PER_HAND_MICROS,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Usage {
    invalid_actions: u32,
    used_hand_micros: Micros,
    used_match_micros: Micros,
}

#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub name: String,
    pub game_file: String,
    pub num_hands: u32,
    pub seed: u32,
    pub seat_names: Vec<String>,
    pub fixed_seats: bool,
    pub budgets: Budgets,
}

/// One connected seat: a buffered reader plus a writer clone of the same
/// socket.
pub struct SeatConn {
    reader: LineReader,
    writer: TcpStream,
}

impl SeatConn {
    pub fn new(stream: TcpStream) -> io::Result<SeatConn> {
        let writer = stream.try_clone()?;
        Ok(SeatConn { reader: LineReader::new(stream), writer })
    }
}

/// Bind one listener per seat, in seat order. A requested port of 0 picks
/// a random one; those draws come from their own generator seeded with the
/// match seed, so they never disturb the deal sequence.
pub fn listen_all(
    game: &GameDef,
    ports: &[u16],
    seed: u32,
) -> io::Result<(Vec<TcpListener>, Vec<u16>)> {
    let mut port_rng = Rng::seeded(seed);
    let mut listeners = Vec::with_capacity(game.num_players);
    let mut bound = Vec::with_capacity(game.num_players);
    for seat in 0..game.num_players {
        let want = ports.get(seat).copied().unwrap_or(0);
        let (listener, port) = net::listen(want, &mut port_rng)?;
        listeners.push(listener);
        bound.push(port);
    }
    Ok((listeners, bound))
}

/// The `#` comment block identifying the match, written to stderr and to
/// the head of the log file before anyone has connected.
pub fn write_header(cfg: &MatchConfig, log_file: &mut Option<File>) -> Result<(), MatchError> {
    let b = &cfg.budgets;
    let header = format!(
        "# name/game/hands/seed {} {} {} {}\n#--t_response {}\n#--t_hand {}\n#--t_per_hand {}\n",
        cfg.name,
        cfg.game_file,
        cfg.num_hands,
        cfg.seed,
        b.max_response_micros / 1000,
        b.max_used_hand_micros / 1000,
        b.max_used_match_micros / cfg.num_hands as u64 / 1000,
    );
    eprint!("{}", header);
    if let Some(f) = log_file {
        f.write_all(header.as_bytes())?;
        f.flush()?;
    }
    Ok(())
}

/// Wait for every seat to connect, all bounded by one shared deadline when
/// a start timeout is configured.
pub fn accept_all(
    listeners: Vec<TcpListener>,
    start_timeout: Option<Duration>,
) -> Result<Vec<SeatConn>, MatchError> {
    let deadline = start_timeout.map(|t| Instant::now() + t);
    let mut seats = Vec::with_capacity(listeners.len());
    for (seat, listener) in listeners.into_iter().enumerate() {
        let stream = net::accept_within(&listener, deadline).map_err(|e| {
            log::error!("seat {} could not connect", seat + 1);
            MatchError::Socket { seat, source: e }
        })?;
        seats.push(SeatConn::new(stream).map_err(|e| MatchError::Socket { seat, source: e })?);
    }
    Ok(seats)
}

/// The whole match, owned in one place: game description, deal generator,
/// per-seat clocks and counters, connected seats, and the two output files.
pub struct Dealer {
    game: GameDef,
    cfg: MatchConfig,
    rng: Rng,
    usage: Vec<Usage>,
    seats: Vec<SeatConn>,
    log_file: Option<File>,
    journal: Option<File>,
    /// seat currently occupied by player 0; advances every hand unless
    /// seats are fixed
    seat0: Seat,
}

impl Dealer {
    pub fn new(
        game: GameDef,
        cfg: MatchConfig,
        seats: Vec<SeatConn>,
        log_file: Option<File>,
        journal: Option<File>,
    ) -> Dealer {
        let rng = Rng::seeded(cfg.seed);
        let usage = vec![Usage::default(); game.num_players];
        Dealer { game, cfg, rng, usage, seats, log_file, journal, seat0: 0 }
    }

    fn player_of_seat(&self, seat: Seat) -> Player {
        (seat + self.game.num_players - self.seat0) % self.game.num_players
    }

    fn seat_of_player(&self, player: Player) -> Seat {
        (player + self.seat0) % self.game.num_players
    }

    /// Play (or resume) the whole match and return the per-seat totals.
    pub fn run(&mut self) -> Result<Vec<f64>, MatchError> {
        self.check_versions()?;
        log::info!("STARTED at {}", Stamp::now());

        let mut totals = vec![0.0f64; self.game.num_players];
        let mut state = self.deal_hand(0)?;

        // resume from whatever a previous attempt already journaled
        let journal_text = match &mut self.journal {
            Some(f) => {
                let mut text = String::new();
                f.read_to_string(&mut text)?;
                text
            }
            None => String::new(),
        };
        if !journal_text.is_empty() {
            self.replay_journal(&journal_text, &mut state, &mut totals)?;
        }

        while state.hand_id < self.cfg.num_hands {
            self.play_hand(&mut state, &mut totals)?;
        }

        log::info!("FINISHED at {}", Stamp::now());
        self.write_score(&totals)?;
        Ok(totals)
    }

    fn check_versions(&mut self) -> Result<(), MatchError> {
        for seat in 0..self.game.num_players {
            let line = match self.seats[seat].reader.read_line(MAX_LINE_LEN, None) {
                Ok(line) => line,
                Err(ReadError::Io(e)) => return Err(MatchError::Socket { seat, source: e }),
                Err(e) => {
                    return Err(MatchError::Protocol {
                        seat,
                        detail: format!("could not read version: {}", e),
                    })
                }
            };
            let line = line.trim_end();
            let (major, minor, _revision) = codec::read_version(line)
                .map_err(|_| MatchError::VersionMismatch { seat, line: line.to_string() })?;
            if major != codec::VERSION_MAJOR || minor > codec::VERSION_MINOR {
                log::error!(
                    "seat {} speaks version {}.{}, this server is {}",
                    seat + 1,
                    major,
                    minor,
                    codec::print_version()
                );
                return Err(MatchError::VersionMismatch { seat, line: line.to_string() });
            }
        }
        Ok(())
    }

    fn deal_hand(&mut self, hand_id: u32) -> Result<State, MatchError> {
        State::deal(&self.game, &mut self.rng, hand_id)
            .map_err(|e| MatchError::Protocol { seat: 0, detail: e.to_string() })
    }

    /// Rotate the table (unless seats are fixed), reset the per-hand
    /// clocks, and deal the next hand.
    fn next_hand(&mut self, state: &mut State) -> Result<(), MatchError> {
        if !self.cfg.fixed_seats {
            self.seat0 = (self.seat0 + 1) % self.game.num_players;
        }
        for usage in &mut self.usage {
            usage.used_hand_micros = 0;
        }
        *state = self.deal_hand(state.hand_id + 1)?;
        Ok(())
    }

    fn play_hand(&mut self, state: &mut State, totals: &mut [f64]) -> Result<(), MatchError> {
        while !state.is_finished() {
            let current = match state.current_player(&self.game) {
                Some(p) => p,
                None => {
                    return Err(MatchError::Protocol {
                        seat: 0,
                        detail: "no player to act in an unfinished hand".to_string(),
                    })
                }
            };
            let send_time = self.broadcast(state, Some(current))?;
            let current_seat = self.seat_of_player(current);
            let sent = MatchState::view(&self.game, state, current);
            let (action, recv_time) = self.read_response(current_seat, state, &sent, send_time)?;
            self.journal_action(state.hand_id, action, send_time, recv_time)?;
            state.apply(&self.game, action).map_err(|e| MatchError::Protocol {
                seat: current_seat,
                detail: e.to_string(),
            })?;
        }

        let value = values(&self.game, state);
        for (p, v) in value.iter().enumerate() {
            totals[self.seat_of_player(p)] += v;
        }
        self.log_hand(state, &value)?;
        self.broadcast(state, None)?;

        if state.hand_id % 100 == 0 {
            for seat in 0..self.game.num_players {
                log::info!(
                    "Seconds cumulatively spent in match for seat {}: {}",
                    seat,
                    self.usage[seat].used_match_micros / 1_000_000
                );
            }
        }
        self.next_hand(state)
    }

    /// Send every seat its view of the state. Returns the send time of the
    /// acting player's copy, since that's when their clock starts.
    fn broadcast(&mut self, state: &State, acting: Option<Player>) -> Result<Stamp, MatchError> {
        let mut send_time = Stamp::now();
        for seat in 0..self.game.num_players {
            let viewer = self.player_of_seat(seat);
            let ms = MatchState::view(&self.game, state, viewer);
            let line = codec::print_match_state(&self.game, &ms);
            self.seats[seat]
                .writer
                .write_all(format!("{}\r\n", line).as_bytes())
                .map_err(|e| {
                    log::error!("could not send state to seat {}", seat + 1);
                    MatchError::Socket { seat, source: e }
                })?;
            let sent_at = Stamp::now();
            log::info!("TO {} at {} {}", seat + 1, sent_at, line);
            if acting == Some(viewer) {
                send_time = sent_at;
            }
        }
        Ok(send_time)
    }

    /// One exchange with the acting seat. Comment lines and stale or
    /// malformed states are skipped and the read continues against the same
    /// deadline; a bad or illegal action becomes a call until the seat's
    /// tolerance runs out. Every counted response is charged against all
    /// three clocks.
    fn read_response(
        &mut self,
        seat: Seat,
        state: &State,
        sent: &MatchState,
        send_time: Stamp,
    ) -> Result<(Action, Stamp), MatchError> {
        let timeout = Duration::from_micros(self.cfg.budgets.max_response_micros);
        loop {
            let waiting_since = Instant::now();
            let line = match self.seats[seat].reader.read_line(MAX_LINE_LEN, Some(timeout)) {
                Ok(line) => line,
                Err(ReadError::TimedOut) => {
                    let elapsed_micros = waiting_since.elapsed().as_micros() as Micros;
                    log::error!(
                        "could not get action from seat {}: {:.1} seconds spent waiting, timeout {:.1}",
                        seat + 1,
                        elapsed_micros as f64 / 1_000_000.0,
                        self.cfg.budgets.max_response_micros as f64 / 1_000_000.0
                    );
                    return Err(MatchError::ReadTimeout { seat, elapsed_micros });
                }
                Err(ReadError::Eof) => {
                    log::error!("could not get action from seat {}: connection closed", seat + 1);
                    return Err(MatchError::Socket {
                        seat,
                        source: io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"),
                    });
                }
                Err(ReadError::Io(e)) => return Err(MatchError::Socket { seat, source: e }),
            };
            let recv_time = Stamp::now();
            let line = line.trim_end();
            log::info!("FROM {} at {} {}", seat + 1, recv_time, line);

            if line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            self.charge(seat, send_time, recv_time)?;

            let (ms, used) = match codec::read_match_state(line, &self.game) {
                Ok(parsed) => parsed,
                Err(_) => {
                    log::warn!("bad state format in response: {}", line);
                    continue;
                }
            };
            if !ms.equal_ignoring_viewer(sent) {
                log::warn!("ignoring un-requested response: {}", line);
                continue;
            }

            // the action rides behind the echoed state
            let parsed_action = line[used..]
                .strip_prefix(':')
                .and_then(|rest| codec::read_action(rest, &self.game).ok());
            let mut action = match parsed_action {
                Some((action, _)) => action,
                None => {
                    if self.note_invalid(seat) {
                        log::error!("bad action format in response: {}", line);
                        return Err(MatchError::InvalidAction { seat, line: line.to_string() });
                    }
                    log::warn!("bad action format in response, changed to call: {}", line);
                    return Ok((Action::Call, recv_time));
                }
            };

            if !state.is_valid_action(&self.game, true, &mut action) {
                if self.note_invalid(seat) {
                    log::error!("invalid action: {}", line);
                    return Err(MatchError::InvalidAction { seat, line: line.to_string() });
                }
                log::warn!("invalid action, changed to call: {}", line);
                action = Action::Call;
            }
            return Ok((action, recv_time));
        }
    }

    fn charge(&mut self, seat: Seat, send: Stamp, recv: Stamp) -> Result<(), MatchError> {
        let budgets = self.cfg.budgets;
        let response = recv.micros_since(send);
        let usage = &mut self.usage[seat];
        usage.used_hand_micros += response;
        usage.used_match_micros += response;
        if response > budgets.max_response_micros {
            log::error!("seat {} ran out of time", seat + 1);
            return Err(MatchError::ReadTimeout { seat, elapsed_micros: response });
        }
        if usage.used_hand_micros > budgets.max_used_hand_micros {
            log::error!("seat {} ran out of time", seat + 1);
            return Err(MatchError::HandTimeout { seat, used_micros: usage.used_hand_micros });
        }
        if usage.used_match_micros > budgets.max_used_match_micros {
            log::error!("seat {} ran out of time", seat + 1);
            return Err(MatchError::MatchTimeout { seat, used_micros: usage.used_match_micros });
        }
        Ok(())
    }

    /// Count one invalid action; true once the seat is over its budget.
    fn note_invalid(&mut self, seat: Seat) -> bool {
        self.usage[seat].invalid_actions += 1;
        self.usage[seat].invalid_actions > self.cfg.budgets.max_invalid_actions
    }

    /// `<action> <handId> <send.sec.usec> <recv.sec.usec>`, flushed per
    /// action so a crash leaves a usable prefix of the match.
    fn journal_action(
        &mut self,
        hand_id: u32,
        action: Action,
        send: Stamp,
        recv: Stamp,
    ) -> Result<(), MatchError> {
        if let Some(f) = &mut self.journal {
            let entry = format!(
                "{} {} {} {}\n",
                codec::print_action(&self.game, action),
                hand_id,
                send,
                recv
            );
            f.write_all(entry.as_bytes())?;
            f.flush()?;
        }
        Ok(())
    }

    /// One log line per finished hand: full state, then values and names in
    /// player order.
    fn log_hand(&mut self, state: &State, value: &[f64]) -> Result<(), MatchError> {
        if self.log_file.is_none() {
            return Ok(());
        }
        let mut line = codec::print_state(&self.game, state);
        for (p, v) in value.iter().enumerate() {
            line.push(if p == 0 { ':' } else { '|' });
            line.push_str(&codec::print_value(*v));
        }
        for p in 0..self.game.num_players {
            line.push(if p == 0 { ':' } else { '|' });
            line.push_str(&self.cfg.seat_names[self.seat_of_player(p)]);
        }
        if let Some(f) = &mut self.log_file {
            writeln!(f, "{}", line)?;
            f.flush()?;
        }
        Ok(())
    }

    /// `SCORE:<totals>:<names>` in seat order, to stdout, stderr, and log.
    fn write_score(&mut self, totals: &[f64]) -> Result<(), MatchError> {
        let mut line = String::from("SCORE");
        for (seat, v) in totals.iter().enumerate() {
            line.push(if seat == 0 { ':' } else { '|' });
            line.push_str(&codec::print_value(*v));
        }
        for (seat, name) in self.cfg.seat_names.iter().enumerate() {
            line.push(if seat == 0 { ':' } else { '|' });
            line.push_str(name);
        }
        println!("{}", line);
        eprintln!("{}", line);
        if let Some(f) = &mut self.log_file {
            writeln!(f, "{}", line)?;
            f.flush()?;
        }
        Ok(())
    }

    /// Re-drive the state machine from a previous attempt's journal in
    /// strict mode, charging time as if the actions had just happened, so
    /// the resumed match continues exactly where the old one stopped.
    fn replay_journal(
        &mut self,
        text: &str,
        state: &mut State,
        totals: &mut [f64],
    ) -> Result<(), MatchError> {
        fn bad(line: &str) -> MatchError {
            MatchError::JournalParse { line: line.to_string() }
        }
        for raw in text.lines() {
            let (mut action, used) =
                codec::read_action(raw, &self.game).map_err(|_| bad(raw))?;
            let mut fields = raw[used..].split_whitespace();
            let hand_id: u32 =
                fields.next().and_then(|t| t.parse().ok()).ok_or_else(|| bad(raw))?;
            let send = fields.next().and_then(Stamp::parse).ok_or_else(|| bad(raw))?;
            let recv = fields.next().and_then(Stamp::parse).ok_or_else(|| bad(raw))?;
            if hand_id != state.hand_id {
                log::error!("handId mismatch in transaction log: {}", raw);
                return Err(bad(raw));
            }
            if !state.is_valid_action(&self.game, false, &mut action) {
                log::error!("invalid action in transaction log: {}", raw);
                return Err(bad(raw));
            }
            let current = state.current_player(&self.game).ok_or_else(|| bad(raw))?;
            let seat = self.seat_of_player(current);
            self.charge(seat, send, recv)?;
            state.apply(&self.game, action).map_err(|_| bad(raw))?;

            if state.is_finished() {
                let value = values(&self.game, state);
                for (p, v) in value.iter().enumerate() {
                    totals[self.seat_of_player(p)] += v;
                }
                self.next_hand(state)?;
            }
        }
        Ok(())
    }
}
