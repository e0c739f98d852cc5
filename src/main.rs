use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::time::{Duration, Instant};
use tracing::{info, warn, Level};

use sigilpet::behavior::BehaviorEvent;
use sigilpet::config::{load_settings, project_paths, save_settings_atomic};
use sigilpet::storage::{load_snapshot, save_atomic};
use sigilpet::{BreedOutcome, CareAction, Companion};

#[derive(Parser, Debug)]
#[command(about = "A seeded companion that lives in your data directory")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show how the companion is doing
    Status,
    Feed,
    Play,
    Clean,
    Rest,
    Pet,
    /// Dream up an offspring with another named companion
    Breed { partner: String },
    /// Rebind the companion to a new name
    Rename { name: String },
    /// Let time pass and print what happens
    Watch {
        #[arg(default_value_t = 30)]
        seconds: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();
    let paths = project_paths()?;
    let mut settings = load_settings(&paths.settings_path);
    let now = Utc::now();

    let resumed = load_snapshot(&paths.save_path).and_then(|snapshot| {
        match Companion::resume(snapshot, now) {
            Ok(v) => Some(v),
            Err(err) => {
                warn!(%err, "saved companion rejected, starting fresh");
                None
            }
        }
    });
    let mut companion = match resumed {
        Some((mut c, summary)) => {
            if summary.has_anything() {
                println!(
                    "While you were away: {} dreams, hunger peaked at {:.0}, mood dipped to {:.0}.",
                    summary.dreams, summary.hunger_max, summary.mood_min
                );
            }
            settings.name = c.name().to_string();
            c.update_settings(settings.clone(), now)?;
            c
        }
        None => Companion::new(settings.clone(), now)?,
    };

    match cli.command.unwrap_or(Command::Status) {
        Command::Status => {}
        Command::Feed => println!("{}", companion.care(CareAction::Feed, now)),
        Command::Play => println!("{}", companion.care(CareAction::Play, now)),
        Command::Clean => println!("{}", companion.care(CareAction::Clean, now)),
        Command::Rest => println!("{}", companion.care(CareAction::Rest, now)),
        Command::Pet => println!("{}", companion.pet(now).message),
        Command::Breed { partner } => match companion.breed(&partner, now) {
            BreedOutcome::Born(child) => {
                let evo = child.evolution();
                println!(
                    "{} was born ({:?}, power {}).",
                    child.name, evo.primary_aspect, evo.power
                );
            }
            BreedOutcome::Declined(line) => println!("{line}"),
        },
        Command::Rename { name } => {
            companion.reseed(&name, now)?;
            settings.name = companion.name().to_string();
            save_settings_atomic(&paths.settings_path, &settings)?;
        }
        Command::Watch { seconds } => watch(&mut companion, Duration::from_secs(seconds)),
    }

    print_status(&companion);
    save_atomic(&paths.save_path, &companion.to_snapshot(Utc::now()))?;
    info!(path = %paths.save_path.display(), "saved");
    Ok(())
}

fn watch(companion: &mut Companion, length: Duration) {
    let step = Duration::from_millis(companion.settings().rules.tick_step_ms);
    let end = Instant::now() + length;
    while Instant::now() < end {
        std::thread::sleep(step);
        for ev in companion.advance_to(Utc::now()) {
            if let BehaviorEvent::ModeChanged { to, .. } = ev {
                println!("[{}]", to.as_str());
            }
        }
        for line in companion.drain_whispers() {
            println!("  \"{line}\"");
        }
    }
}

fn print_status(companion: &Companion) {
    let view = companion.view();
    let v = view.vitals;
    println!(
        "{} is {} and {} ({:?}).",
        view.name,
        view.ai.mode.as_str(),
        view.emotion.as_str(),
        view.evolution.primary_aspect
    );
    println!(
        "energy {:.0}  curiosity {:.0}  bond {:.0}  health {:.0}  mood {:.0}  hunger {:.0}  hygiene {:.0}",
        v.energy, v.curiosity, v.bond, v.health, v.mood, v.hunger, v.hygiene
    );
    println!(
        "genome {:.1}/{:.1}/{:.1}  comfort {:.0}  sigils {}/{}",
        view.genome.red60,
        view.genome.blue60,
        view.genome.black60,
        view.comfort.overall,
        view.activated.len(),
        view.sigils.len()
    );
    if !view.comfort.unmet_needs.is_empty() {
        println!("needs: {}", view.comfort.unmet_needs.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["sigilpet", "breed", "Orin"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Breed { partner }) if partner == "Orin"));

        let cli = Cli::try_parse_from(["sigilpet", "watch"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Watch { seconds: 30 })));

        let cli = Cli::try_parse_from(["sigilpet"]).unwrap();
        assert!(cli.command.is_none());

        assert!(Cli::try_parse_from(["sigilpet", "dance"]).is_err());
        assert!(Cli::try_parse_from(["sigilpet", "rename"]).is_err());
    }
}
