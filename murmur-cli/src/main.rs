//! Murmur CLI — real-time player for procedural ambient textures.
//!
//! # Usage
//!
//! ```bash
//! murmur --list-devices
//! murmur -t rain -t fireplace --volume rain=0.7 --duration 60
//! murmur -t ocean --master 0.4 --interactive
//! ```
//!
//! # Interactive commands
//!
//! `toggle <texture>`, `volume <texture> <0..1>`, `master <0..1>`, `mute`,
//! `unmute`, `state`, `quit`

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use murmur_engine::output;
use murmur_engine::{EngineConfig, SoundController, TextureId};

#[derive(Parser, Debug)]
#[command(name = "murmur")]
#[command(author, version, about = "Murmur - procedural ambient soundscapes")]
struct Args {
    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Output device name (default: host default)
    #[arg(long)]
    device: Option<String>,

    /// Texture to start with; repeat for more (rain, forest, ocean, cafe, wind, fireplace, birds, night)
    #[arg(long = "texture", short = 't')]
    textures: Vec<TextureId>,

    /// Per-texture volume as `name=value`; repeatable
    #[arg(long = "volume", value_parser = parse_volume)]
    volumes: Vec<(TextureId, f32)>,

    /// Master volume (0-1)
    #[arg(long, default_value = "1.0")]
    master: f32,

    /// Start muted
    #[arg(long)]
    muted: bool,

    /// Stop after this many seconds (default: run until interrupted)
    #[arg(long)]
    duration: Option<u64>,

    /// Fixed RNG seed for reproducible textures
    #[arg(long)]
    seed: Option<u64>,

    /// Read control commands from stdin
    #[arg(long, short = 'i')]
    interactive: bool,
}

fn parse_volume(s: &str) -> Result<(TextureId, f32), String> {
    let (name, value) = s.split_once('=').ok_or_else(|| format!("expected name=value, got {s:?}"))?;
    let id = name.parse::<TextureId>().map_err(|e| e.to_string())?;
    let v = value.trim().parse::<f32>().map_err(|e| format!("bad volume {value:?}: {e}"))?;
    Ok((id, v))
}

/// One line typed at the interactive prompt.
#[derive(Debug, PartialEq)]
enum Input {
    Toggle(TextureId),
    Volume(TextureId, f32),
    Master(f32),
    Mute(bool),
    State,
    Quit,
}

fn parse_input(line: &str) -> Result<Input, String> {
    fn texture(word: Option<&str>) -> Result<TextureId, String> {
        word.ok_or("missing texture")?.parse::<TextureId>().map_err(|e| e.to_string())
    }
    fn level(word: Option<&str>) -> Result<f32, String> {
        let w = word.ok_or("missing volume")?;
        w.parse().map_err(|_| format!("bad volume {w:?}"))
    }

    let mut words = line.split_whitespace();
    let cmd = words.next().ok_or("empty command")?;
    let input = match cmd.to_ascii_lowercase().as_str() {
        "toggle" | "t" => Input::Toggle(texture(words.next())?),
        "volume" | "v" => {
            let id = texture(words.next())?;
            Input::Volume(id, level(words.next())?)
        }
        "master" | "m" => Input::Master(level(words.next())?),
        "mute" => Input::Mute(true),
        "unmute" => Input::Mute(false),
        "state" | "s" => Input::State,
        "quit" | "q" | "exit" => Input::Quit,
        other => return Err(format!("unknown command {other:?}")),
    };
    Ok(input)
}

fn print_state(ctl: &mut SoundController) {
    let st = ctl.state();
    println!(
        "master {:.2}{}",
        st.master,
        if st.muted { " (muted)" } else { "" }
    );
    for id in TextureId::ALL {
        let l = st.layer(id);
        println!(
            "  {:<10} {:<3} vol {:.2}  gain {:.2}  {:?}",
            id.name(),
            if l.active { "on" } else { "off" },
            l.volume,
            l.effective_gain,
            l.playback
        );
    }
}

fn interactive(ctl: &mut SoundController) -> Result<()> {
    println!("commands: toggle <t> | volume <t> <v> | master <v> | mute | unmute | state | quit");
    let stdin = io::stdin();
    print!("> ");
    io::stdout().flush()?;
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        if !line.trim().is_empty() {
            let status = match parse_input(&line) {
                Ok(Input::Quit) => break,
                Ok(Input::State) => {
                    print_state(ctl);
                    None
                }
                Ok(Input::Toggle(id)) => Some(ctl.toggle(id)),
                Ok(Input::Volume(id, v)) => Some(ctl.set_volume(id, v)),
                Ok(Input::Master(v)) => Some(ctl.set_master_volume(v)),
                Ok(Input::Mute(m)) => Some(ctl.set_muted(m)),
                Err(e) => {
                    println!("error: {e}");
                    None
                }
            };
            if let Some(s) = status {
                if !s.is_applied() {
                    warn!(?s, "command not applied");
                }
            }
        }
        print!("> ");
        io::stdout().flush()?;
    }
    Ok(())
}

/// Fade every active layer out and wait for the ramps to land.
fn fade_out_all(ctl: &mut SoundController) {
    let active: Vec<_> = ctl.state().active().collect();
    if active.is_empty() {
        return;
    }
    for id in active {
        let _ = ctl.toggle(id);
    }
    thread::sleep(Duration::from_millis(600));
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.list_devices {
        println!("Available output devices:");
        for name in output::list_devices().context("listing output devices")? {
            println!("- {name}");
        }
        return Ok(());
    }

    let mut config = EngineConfig::default()
        .with_master_volume(args.master)
        .with_muted(args.muted);
    if let Some(name) = &args.device {
        config = config.with_device(name.clone());
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let mut ctl = SoundController::try_init(&config).context("opening audio output")?;
    info!(device = ctl.output_name().unwrap_or("?"), "murmur ready");

    for &(id, v) in &args.volumes {
        let _ = ctl.set_volume(id, v);
    }
    for &id in &args.textures {
        let _ = ctl.toggle(id);
    }

    if args.interactive {
        interactive(&mut ctl)?;
    } else {
        if args.textures.is_empty() {
            warn!("no textures selected; pass --texture or --interactive");
        }
        match args.duration {
            Some(secs) => thread::sleep(Duration::from_secs(secs)),
            None => loop {
                thread::sleep(Duration::from_millis(500));
            },
        }
    }

    fade_out_all(&mut ctl);
    ctl.teardown();
    Ok(())
}
