//! Offline post-processor: rewrites the values on logged hands that ended
//! all-in before the last board cards, replacing the sampled outcome with
//! the exact expectation over every board completion.

use clap::Parser;
use dealer_core::game::GameDef;
use dealer_core::rollout::rollout_line;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "allin-ev", about = "Expected-value rollout over a match log")]
struct Args {
    game_def_file: PathBuf,
    log_file: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let game = GameDef::parse(&std::fs::read_to_string(&args.game_def_file)?)?;
    let log = std::fs::File::open(&args.log_file)?;
    for line in BufReader::new(log).lines() {
        let line = line?;
        if let Some(out) = rollout_line(&game, &line) {
            println!("{}", out);
        }
    }
    Ok(())
}
