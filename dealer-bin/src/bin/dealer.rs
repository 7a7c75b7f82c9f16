//! Match server. Listens for one agent per seat, prints the port
//! assignment on stdout, deals the requested number of hands, and writes
//! the authoritative log (and, if asked, a resumable transaction journal).

use clap::Parser;
use dealer_core::dealer::{self, Budgets, Dealer, MatchConfig};
use dealer_core::game::GameDef;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "dealer", about = "Match coordinator for seated card-game agents")]
struct Args {
    /// name used for the log and transaction files
    match_name: String,
    /// game definition file
    game_def_file: PathBuf,
    /// number of hands to play
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    num_hands: u32,
    /// seed for the card generator
    seed: u32,
    /// one name per seat
    #[arg(required = true)]
    seat_names: Vec<String>,

    /// use a fixed dealer button at the table
    #[arg(short = 'f')]
    fixed_seats: bool,
    /// disable the log file (enabled by default)
    #[arg(short = 'l', overrides_with = "log_on")]
    log_off: bool,
    /// enable the log file
    #[arg(short = 'L', overrides_with = "log_off")]
    log_on: bool,
    /// disable the transaction file (disabled by default)
    #[arg(short = 't', overrides_with = "transaction_on")]
    transaction_off: bool,
    /// enable the transaction file
    #[arg(short = 'T', overrides_with = "transaction_off")]
    transaction_on: bool,
    /// only print errors, warnings, and the final value to stderr
    #[arg(short = 'q')]
    quiet: bool,
    /// append to existing log/transaction files instead of truncating
    #[arg(short = 'a')]
    append: bool,
    /// listen ports in seat order, comma separated; 0 picks a random port
    #[arg(short = 'p', value_delimiter = ',')]
    ports: Vec<u16>,
    /// maximum milliseconds per response
    #[arg(long = "t_response")]
    t_response: Option<u64>,
    /// maximum player milliseconds per hand
    #[arg(long = "t_hand")]
    t_hand: Option<u64>,
    /// maximum average player milliseconds per hand over the match
    #[arg(long = "t_per_hand")]
    t_per_hand: Option<u64>,
    /// maximum milliseconds to wait for agents to connect (default: forever)
    #[arg(long = "start_timeout")]
    start_timeout: Option<u64>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_default_env()
        .filter_level(if args.quiet { log::LevelFilter::Warn } else { log::LevelFilter::Info })
        .init();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(&args.game_def_file)?;
    let game = GameDef::parse(&source)?;
    if args.seat_names.len() != game.num_players {
        return Err(format!(
            "game wants {} seat names, {} given",
            game.num_players,
            args.seat_names.len()
        )
        .into());
    }

    let defaults = Budgets::default();
    let per_hand_micros = args
        .t_per_hand
        .map(|ms| ms * 1000)
        .unwrap_or(dealer::DEFAULT_MAX_USED_PER_HAND_MICROS);
    let budgets = Budgets {
        max_invalid_actions: defaults.max_invalid_actions,
        max_response_micros: args.t_response.map(|ms| ms * 1000).unwrap_or(defaults.max_response_micros),
        max_used_hand_micros: args.t_hand.map(|ms| ms * 1000).unwrap_or(defaults.max_used_hand_micros),
        max_used_match_micros: per_hand_micros * args.num_hands as u64,
    };

    let log_enabled = args.log_on || !args.log_off;
    let journal_enabled = args.transaction_on && !args.transaction_off;
    let mut log_file = if log_enabled {
        Some(open_log(&format!("{}.log", args.match_name), args.append)?)
    } else {
        None
    };
    let journal = if journal_enabled {
        Some(open_journal(&format!("{}.tlog", args.match_name), args.append)?)
    } else {
        None
    };

    let (listeners, ports) = dealer::listen_all(&game, &args.ports, args.seed)?;
    // agents read their ports off stdout, in seat order
    let ports: Vec<String> = ports.iter().map(u16::to_string).collect();
    println!("{}", ports.join(" "));
    io::stdout().flush()?;

    let cfg = MatchConfig {
        name: args.match_name,
        game_file: args.game_def_file.display().to_string(),
        num_hands: args.num_hands,
        seed: args.seed,
        seat_names: args.seat_names,
        fixed_seats: args.fixed_seats,
        budgets,
    };
    dealer::write_header(&cfg, &mut log_file)?;

    let seats = dealer::accept_all(listeners, args.start_timeout.map(Duration::from_millis))?;
    let mut table = Dealer::new(game, cfg, seats, log_file, journal);
    table.run()?;
    Ok(())
}

fn open_log(name: &str, append: bool) -> io::Result<File> {
    if append {
        OpenOptions::new().create(true).append(true).open(name)
    } else {
        File::create(name)
    }
}

/// The journal is opened readable so an appended run can replay whatever
/// the previous attempt got through before continuing.
fn open_journal(name: &str, append: bool) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.read(true).create(true);
    if append {
        opts.append(true);
    } else {
        opts.write(true).truncate(true);
    }
    opts.open(name)
}
