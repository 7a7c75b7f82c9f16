//! Networked end-to-end matches: a real dealer on real sockets against
//! scripted agents.

use dealer_core::codec;
use dealer_core::dealer::{accept_all, listen_all, Budgets, Dealer, MatchConfig};
use dealer_core::game::GameDef;
use dealer_core::rng::Rng;
use dealer_core::state::State;
use dealer_core::MatchError;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

const HOLDEM_LIMIT_2P: &str = include_str!("../../games/holdem.limit.2p.game");
const HOLDEM_LIMIT_3P: &str = include_str!("../../games/holdem.limit.3p.game");

static FILE_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn temp_path(tag: &str) -> PathBuf {
    let n = FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("dealer-test-{}-{}-{}", std::process::id(), tag, n))
}

/// What a scripted agent does each time it is asked to act.
#[derive(Clone, Copy)]
enum Script {
    /// always respond with a call
    Caller,
    /// respond with an unparseable action once, then call forever
    OneBadAction,
    /// connect and read, but never answer
    Silent,
}

fn spawn_agent(game: GameDef, port: u16, script: Script) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
        let mut writer = stream.try_clone().expect("clone");
        writer.write_all(b"VERSION:2.0.0\n").expect("version");
        writer.flush().expect("flush");
        let mut sent_bad = false;
        for line in BufReader::new(stream).lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            let line = line.trim_end();
            if line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let (ms, used) = match codec::read_match_state(line, &game) {
                Ok(parsed) => parsed,
                Err(_) => continue,
            };
            if ms.state.is_finished() || ms.state.current_player(&game) != Some(ms.viewing_player)
            {
                continue;
            }
            let reply = match script {
                Script::Silent => continue,
                Script::OneBadAction if !sent_bad => {
                    sent_bad = true;
                    format!("{}:x\r\n", &line[..used])
                }
                _ => format!("{}:c\r\n", &line[..used]),
            };
            writer.write_all(reply.as_bytes()).expect("reply");
            writer.flush().expect("flush");
        }
    })
}

struct MatchResult {
    outcome: Result<Vec<f64>, MatchError>,
    log: String,
    journal_path: PathBuf,
}

fn run_match(
    game_src: &str,
    num_hands: u32,
    seed: u32,
    port_seed: u32,
    names: &[&str],
    scripts: &[Script],
    budgets: Budgets,
    journal: Option<&PathBuf>,
) -> MatchResult {
    let game = GameDef::parse(game_src).expect("game");
    let (listeners, ports) =
        listen_all(&game, &vec![0; game.num_players], port_seed).expect("listen");
    let agents: Vec<_> = scripts
        .iter()
        .enumerate()
        .map(|(seat, &script)| spawn_agent(game.clone(), ports[seat], script))
        .collect();
    let seats = accept_all(listeners, Some(Duration::from_secs(5))).expect("accept");

    let log_path = temp_path("log");
    let journal_path = journal.cloned().unwrap_or_else(|| temp_path("tlog"));
    let journal_file = OpenOptions::new()
        .read(true)
        .create(true)
        .append(true)
        .open(&journal_path)
        .expect("journal");

    let cfg = MatchConfig {
        name: "it".to_string(),
        game_file: "game".to_string(),
        num_hands,
        seed,
        seat_names: names.iter().map(|s| s.to_string()).collect(),
        fixed_seats: false,
        budgets,
    };
    let mut dealer = Dealer::new(
        game,
        cfg,
        seats,
        Some(File::create(&log_path).expect("log")),
        Some(journal_file),
    );
    let outcome = dealer.run();
    drop(dealer);
    for agent in agents {
        let _ = agent.join();
    }
    let log = fs::read_to_string(&log_path).unwrap_or_default();
    let _ = fs::remove_file(&log_path);
    MatchResult { outcome, log, journal_path }
}

fn quick_budgets() -> Budgets {
    Budgets { max_response_micros: 5_000_000, ..Budgets::default() }
}

#[test]
fn two_hands_of_callers_reach_showdown() {
    let result = run_match(
        HOLDEM_LIMIT_2P,
        2,
        0,
        101,
        &["P1", "P2"],
        &[Script::Caller, Script::Caller],
        quick_budgets(),
        None,
    );
    let totals = result.outcome.expect("match should finish");
    assert_eq!(totals.iter().sum::<f64>(), 0.0);

    let lines: Vec<&str> = result.log.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("STATE:0:cc/cc/cc/cc:"));
    assert!(lines[1].starts_with("STATE:1:cc/cc/cc/cc:"));
    assert!(lines[2].starts_with("SCORE:"));
    assert!(lines[2].ends_with(":P1|P2"));
    // names rotate with the seats between hands
    assert!(lines[0].ends_with(":P1|P2"));
    assert!(lines[1].ends_with(":P2|P1"));
    let _ = fs::remove_file(&result.journal_path);
}

#[test]
fn identical_runs_write_identical_logs() {
    let run = |port_seed| {
        run_match(
            HOLDEM_LIMIT_2P,
            3,
            7,
            port_seed,
            &["alice", "bob"],
            &[Script::Caller, Script::Caller],
            quick_budgets(),
            None,
        )
    };
    let a = run(111);
    let b = run(112);
    a.outcome.expect("first run");
    b.outcome.expect("second run");
    assert_eq!(a.log, b.log);
    let _ = fs::remove_file(&a.journal_path);
    let _ = fs::remove_file(&b.journal_path);
}

#[test]
fn silent_seat_times_out_quickly() {
    let budgets = Budgets { max_response_micros: 200_000, ..Budgets::default() };
    let result = run_match(
        HOLDEM_LIMIT_2P,
        1,
        0,
        121,
        &["P1", "Slow"],
        &[Script::Caller, Script::Silent],
        budgets,
        None,
    );
    // the small blind acts first: that's player 1, in seat 1 on hand 0
    match result.outcome {
        Err(MatchError::ReadTimeout { seat, .. }) => assert_eq!(seat, 1),
        other => panic!("expected a response timeout, got {:?}", other.map(|_| ())),
    }
    // the unfinished hand must not reach the log
    assert!(!result.log.contains("STATE:"));
    let _ = fs::remove_file(&result.journal_path);
}

#[test]
fn one_bad_action_becomes_a_call() {
    let result = run_match(
        HOLDEM_LIMIT_2P,
        1,
        3,
        131,
        &["P1", "P2"],
        &[Script::Caller, Script::OneBadAction],
        quick_budgets(),
        None,
    );
    let totals = result.outcome.expect("substitution should keep the match alive");
    assert_eq!(totals.iter().sum::<f64>(), 0.0);
    assert!(result.log.contains("STATE:0:cc/cc/cc/cc:"));
    let _ = fs::remove_file(&result.journal_path);
}

#[test]
fn journal_resume_matches_an_uninterrupted_run() {
    // full run first, for the reference log and journal
    let full = run_match(
        HOLDEM_LIMIT_2P,
        2,
        5,
        141,
        &["P1", "P2"],
        &[Script::Caller, Script::Caller],
        quick_budgets(),
        None,
    );
    full.outcome.as_ref().expect("full run");
    let journal = fs::read_to_string(&full.journal_path).expect("journal");
    assert!(!journal.is_empty());

    // pretend the dealer died after hand 0: resume from that prefix
    let prefix: String = journal
        .lines()
        .filter(|line| line.split_whitespace().nth(1) == Some("0"))
        .map(|line| format!("{}\n", line))
        .collect();
    let resume_path = temp_path("resume");
    fs::write(&resume_path, prefix).expect("write prefix");

    let resumed = run_match(
        HOLDEM_LIMIT_2P,
        2,
        5,
        142,
        &["P1", "P2"],
        &[Script::Caller, Script::Caller],
        quick_budgets(),
        Some(&resume_path),
    );
    let resumed_totals = resumed.outcome.expect("resumed run");
    assert_eq!(resumed_totals, full.outcome.unwrap());

    // the resumed log holds exactly the hands played live: hand 1 and the
    // score, byte-identical to the uninterrupted run's lines
    let full_lines: Vec<&str> = full.log.lines().collect();
    let resumed_lines: Vec<&str> = resumed.log.lines().collect();
    assert_eq!(resumed_lines.len(), 2);
    assert_eq!(resumed_lines[0], full_lines[1]);
    assert_eq!(resumed_lines[1], full_lines[2]);

    let _ = fs::remove_file(&full.journal_path);
    let _ = fs::remove_file(&resume_path);
}

#[test]
fn deals_are_independent_of_rotation() {
    let seed = 9;
    let result = run_match(
        HOLDEM_LIMIT_3P,
        3,
        seed,
        151,
        &["P1", "P2", "P3"],
        &[Script::Caller, Script::Caller, Script::Caller],
        quick_budgets(),
        None,
    );
    result.outcome.expect("match");
    let game = GameDef::parse(HOLDEM_LIMIT_3P).unwrap();
    let mut rng = Rng::seeded(seed);
    let mut hands = 0;
    for line in result.log.lines() {
        if !line.starts_with("STATE:") {
            continue;
        }
        let (state, _) = codec::read_state(line, &game).expect("log state");
        let expected = State::deal(&game, &mut rng, hands).expect("deal");
        // everyone called to showdown, so the log shows every hole card;
        // they must match a replay of the bare generator, rotation or not
        assert_eq!(state.hole_cards, expected.hole_cards);
        assert_eq!(state.board_cards, expected.board_cards);
        hands += 1;
    }
    assert_eq!(hands, 3);
    // seat rotation shows up in the name order instead
    let lines: Vec<&str> = result.log.lines().collect();
    assert!(lines[0].ends_with(":P1|P2|P3"));
    assert!(lines[1].ends_with(":P2|P3|P1"));
    assert!(lines[2].ends_with(":P3|P1|P2"));
    let _ = fs::remove_file(&result.journal_path);
}
