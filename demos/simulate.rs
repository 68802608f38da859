//! Headless rock/paper/scissors match.
//!
//! Plays a scripted match against the CPU with a simulated camera that
//! classifies 30 frames per second, mislabelling a share of them, and prints
//! every event the session produces plus a tally of reported violations.
//!
//! Run with: `cargo run --example simulate -- --seed 7 --moves rock,paper,none --noise 0.3`

// Allow example-specific patterns
#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::disallowed_macros,
    clippy::unwrap_used,
    clippy::expect_used
)]

use clap::{Parser, ValueEnum};
use rps_referee::prelude::*;
use rps_referee::rng::{Pcg32, Rng, SeedableRng};
use rps_referee::telemetry::TallyObserver;
use std::sync::Arc;
use web_time::Duration;

/// Time between simulated camera frames.
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Pace {
    Standard,
    Quick,
    Relaxed,
}

impl Pace {
    fn timing(self) -> TimingConfig {
        match self {
            Self::Standard => TimingConfig::standard(),
            Self::Quick => TimingConfig::quick(),
            Self::Relaxed => TimingConfig::relaxed(),
        }
    }
}

#[derive(Parser)]
struct Opt {
    /// Seed for the CPU and the simulated camera noise.
    #[arg(short, long, default_value_t = 1)]
    seed: u64,
    /// Gestures shown each round; `none` keeps the hand out of frame.
    #[arg(short, long, value_delimiter = ',', default_value = "rock,paper,scissors")]
    moves: Vec<String>,
    /// Share of frames the simulated classifier gets wrong.
    #[arg(short, long, default_value_t = 0.2)]
    noise: f32,
    /// Countdown pace.
    #[arg(short, long, value_enum, default_value_t = Pace::Standard)]
    pace: Pace,
    /// Log level for the crate's tracing output.
    #[arg(long, default_value_t = tracing::Level::INFO)]
    log_level: tracing::Level,
}

/// Classifier that sees the scripted gesture, except when noise strikes.
struct NoisyClassifier {
    rng: Pcg32,
    noise_per_mille: u32,
}

impl GestureClassifier for NoisyClassifier {
    /// The gesture actually held up, if any.
    type Frame = Option<Gesture>;

    fn classify(&mut self, frame: &Option<Gesture>) -> Result<Option<Classification>, ClassifierError> {
        let Some(gesture) = frame else {
            return Ok(None);
        };
        let confidence = 0.4 + self.rng.gen_range(0..60) as f32 / 100.0;
        if self.rng.gen_range(0..1000) < self.noise_per_mille {
            if self.rng.gen_range(0..10) == 0 {
                // Sensor glitch: the model returns garbage.
                return Ok(Some(Classification::new(gesture.as_str(), f32::NAN)));
            }
            let wrong = self.rng.choose(&Gesture::PLAYABLE).copied().unwrap_or(Gesture::Rock);
            return Ok(Some(Classification::new(wrong.as_str(), confidence)));
        }
        Ok(Some(Classification::new(gesture.as_str(), confidence)))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opt.log_level)
            .finish(),
    )
    .expect("setting up tracing subscriber failed");

    let tally = Arc::new(TallyObserver::new());
    let mut session = SessionBuilder::new()
        .with_violation_observer(tally.clone())
        .with_timing_config(opt.pace.timing())
        .with_seed(opt.seed)
        .start_session(DetachedCamera)?;
    let mut classifier = NoisyClassifier {
        rng: Pcg32::seed_from_u64(opt.seed ^ 0x5eed),
        noise_per_mille: (opt.noise.clamp(0.0, 1.0) * 1000.0) as u32,
    };

    for shown in &opt.moves {
        let hand = match Gesture::from_label(shown) {
            Gesture::Unknown => None,
            gesture => Some(gesture),
        };

        if let Err(err) = session.start_round() {
            println!("cannot start another round: {err}");
            break;
        }
        while session.phase().is_counting() {
            session.process_frame(&mut classifier, &hand);
            session.advance(FRAME_INTERVAL)?;
            for event in session.events() {
                print_event(&event);
            }
        }
    }

    println!("final score: {}", session.match_state());
    for (kind, count) in tally.snapshot() {
        println!("{count} {kind} violation(s)");
    }
    Ok(())
}

fn print_event(event: &GameEvent) {
    match event {
        GameEvent::RoundStarted { round } => println!("== round {round} =="),
        GameEvent::CountdownTick { value } => println!("  {value}"),
        GameEvent::CpuChoiceChanged { gesture } => println!("  cpu shows {}", gesture.glyph()),
        GameEvent::PredictionChanged { gesture } => match gesture {
            Some(gesture) => println!("  you show {}", gesture.glyph()),
            None => println!("  hand lost"),
        },
        GameEvent::RoundResolved {
            outcome,
            player,
            cpu,
            ..
        } => {
            let player = player.map_or("-", |g| g.glyph());
            println!("  {player} vs {}: {outcome}", cpu.glyph());
        },
        GameEvent::MatchEnded { player_won } => {
            println!("match over, {}", if *player_won { "you won" } else { "CPU won" });
        },
        other => println!("  {other:?}"),
    }
}
