//! Theatre - terminal host
//!
//! Runs a session with simulated video surfaces. Lines typed on stdin are
//! heard as utterances while the recogniser is listening.
//!
//! Commands: `/exit` says goodbye, `/interact` unblocks playback,
//! `/state` prints the session state as JSON, `/quit` stops immediately.

use anyhow::{bail, Context, Result};
use crossbeam_channel::{select, unbounded};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use theatre::host::{AutoplayGate, ConsoleSpeech, SimulatedSlot, SyntheticSource};
use theatre::media::MediaSource;
use theatre::{FileMediaSource, Session, SessionEvent, SessionParts, TheatreConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Options {
    config: Option<PathBuf>,
    synthetic_media: bool,
    clip_length: Duration,
    autoplay_blocked: bool,
    json: bool,
}

impl Options {
    fn parse() -> Result<Self> {
        let mut options = Options {
            config: None,
            synthetic_media: false,
            clip_length: Duration::from_secs(3),
            autoplay_blocked: false,
            json: false,
        };

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().context("--config needs a path")?;
                    options.config = Some(PathBuf::from(path));
                }
                "--synthetic-media" => options.synthetic_media = true,
                "--clip-ms" => {
                    let ms = args.next().context("--clip-ms needs a value")?;
                    let ms: u64 = ms.parse().with_context(|| format!("invalid --clip-ms {}", ms))?;
                    options.clip_length = Duration::from_millis(ms);
                }
                "--autoplay-blocked" => options.autoplay_blocked = true,
                "--json" => options.json = true,
                other => bail!("unknown argument {}", other),
            }
        }
        Ok(options)
    }
}

fn print_state(handle: &theatre::SessionHandle) -> Result<()> {
    let snapshot = handle.state().snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "theatre=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let options = Options::parse()?;
    let config = match &options.config {
        Some(path) => TheatreConfig::load(path)?,
        None => TheatreConfig::load_or_default()?,
    };

    info!("Starting Theatre");

    let media: Arc<dyn MediaSource> = if options.synthetic_media {
        Arc::new(SyntheticSource::new())
    } else {
        Arc::new(FileMediaSource::new(config.assets.root.clone()))
    };
    let (speech, mic) = ConsoleSpeech::new();
    let gate = if options.autoplay_blocked {
        AutoplayGate::locked()
    } else {
        AutoplayGate::unlocked()
    };
    let slots = [
        SimulatedSlot::new(options.clip_length).with_gate(gate.clone()),
        SimulatedSlot::new(options.clip_length).with_gate(gate.clone()),
    ];

    let mut handle = Session::spawn(
        &config,
        SessionParts {
            media,
            speech: Box::new(speech),
            slots: slots.map(|slot| Box::new(slot) as Box<dyn theatre::VideoSlot>),
        },
    )?;

    let (line_tx, line_rx) = unbounded();
    thread::Builder::new()
        .name("theatre-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to start stdin reader")?;

    let events = handle.events();
    loop {
        select! {
            recv(line_rx) -> line => match line {
                Ok(line) => match line.trim() {
                    "" => {}
                    "/exit" => handle.exit()?,
                    "/interact" => {
                        gate.unlock();
                        handle.interact()?;
                    }
                    "/state" => print_state(&handle)?,
                    "/quit" => break,
                    text => {
                        if !mic.say(text) {
                            println!("(not listening yet)");
                        }
                    }
                },
                // stdin closed
                Err(_) => break,
            },

            recv(events) -> event => match event {
                Ok(SessionEvent::StateChanged(state)) => println!("[{}]", state),
                Ok(SessionEvent::Transcript(text)) => println!("you: {}", text),
                Ok(SessionEvent::Presented(state)) => {
                    if state.is_listening() {
                        println!("(listening...)");
                    }
                    if options.json {
                        print_state(&handle)?;
                    }
                }
                Ok(SessionEvent::InteractionRequired) => {
                    println!("Playback is blocked. Type /interact to continue.");
                }
                Ok(SessionEvent::SessionEnded) => {
                    println!("Goodbye!");
                    break;
                }
                Ok(SessionEvent::Shutdown) | Err(_) => break,
            },
        }
    }

    handle.shutdown()?;
    info!("Theatre stopped");
    Ok(())
}
