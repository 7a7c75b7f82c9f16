//! Sample agent. Connects to a dealer, then plays a mildly random mixture:
//! fold 6% of the time it legally can, and split the rest evenly between
//! calling and raising a uniform amount inside the legal bounds.

use clap::Parser;
use dealer_core::action::Action;
use dealer_core::codec;
use dealer_core::game::GameDef;
use dealer_core::net::{self, ReadError};
use dealer_core::rng::Rng;
use dealer_core::MAX_LINE_LEN;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

const FOLD_PROB: f64 = 0.06;

#[derive(Parser)]
#[command(name = "player", about = "Sample random agent for the dealer")]
struct Args {
    game_def_file: PathBuf,
    host: String,
    port: u16,
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
    let clock = SystemTime::now().duration_since(UNIX_EPOCH)?;
    let mut rng = Rng::seeded(clock.subsec_micros());

    let stream = net::connect_to(&args.host, args.port)?;
    let mut writer = stream.try_clone()?;
    let mut reader = net::LineReader::new(stream);

    writer.write_all(format!("{}\n", codec::print_version()).as_bytes())?;
    writer.flush()?;

    loop {
        let line = match reader.read_line(MAX_LINE_LEN, None) {
            Ok(line) => line,
            Err(ReadError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        let (ms, used) = codec::read_match_state(line, &game)?;
        if ms.state.is_finished() {
            // game-over broadcast, nothing to answer
            continue;
        }
        if ms.state.current_player(&game) != Some(ms.viewing_player) {
            continue;
        }

        let state = &ms.state;
        let mut weighted: Vec<(Action, f64)> = Vec::with_capacity(3);
        let mut fold = Action::Fold;
        if state.is_valid_action(&game, false, &mut fold) {
            weighted.push((Action::Fold, FOLD_PROB));
        }
        weighted.push((Action::Call, (1.0 - FOLD_PROB) * 0.5));
        let bounds = state.raise_bounds(&game);
        if let Some((min, max)) = bounds {
            let size = min + (rng.next_u32() % (max - min + 1) as u32) as i32;
            weighted.push((Action::Raise(size), (1.0 - FOLD_PROB) * 0.5));
        }

        let total: f64 = weighted.iter().map(|(_, w)| w).sum();
        let mut draw = rng.next_real() * total;
        let mut choice = Action::Call;
        for (action, weight) in &weighted {
            choice = *action;
            if draw <= *weight {
                break;
            }
            draw -= *weight;
        }

        let response = format!("{}:{}\r\n", &line[..used], codec::print_action(&game, choice));
        writer.write_all(response.as_bytes())?;
        writer.flush()?;
    }
    Ok(())
}
