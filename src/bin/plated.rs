//! plated - capture a source, read plates, log new ones
//!
//! Opens the configured ledger, starts one capture session on the given
//! source and records every new plate reading until the source ends or the
//! session is stopped (Ctrl-C, or `s` in interactive mode).

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::Duration;

use plate_ledger::{
    DetectionRecorder, EngineRegistry, FrameLoop, Locator, LoopEvent, LoopState, Mode,
    PlateConfig, StubEngine,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Display,
    Detect,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Display => Mode::Display,
            ModeArg::Detect => Mode::Detect,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "plated", about = "Read license plates from an image, video or stream")]
struct Args {
    /// Image/video path, stream URL, or stub://name?frames=N
    #[arg(value_name = "SOURCE", required_unless_present = "ip_camera")]
    source: Option<String>,

    /// IP webcam address (host:port); captures https://ADDR/video
    #[arg(long, value_name = "ADDR", conflicts_with = "source")]
    ip_camera: Option<String>,

    #[arg(long, value_enum, default_value = "detect")]
    mode: ModeArg,

    /// Detection engine (overrides PLATE_ENGINE)
    #[arg(long)]
    engine: Option<String>,

    /// Do not store plate crops
    #[arg(long)]
    no_crops: bool,

    /// Write the last displayed frame here when the session ends
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,

    /// Read p(ause) / r(esume) / t(oggle) / s(top) commands from stdin
    #[arg(long)]
    interactive: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

#[derive(Debug)]
enum Command {
    Pause,
    Resume,
    Toggle,
    Stop,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, args.interactive);

    let cfg = PlateConfig::load()?;
    let mode = Mode::from(args.mode);
    let locator = match (&args.source, &args.ip_camera) {
        (_, Some(addr)) => Locator::ip_camera(addr)?,
        (Some(raw), None) => Locator::parse(raw)?,
        (None, None) => return Err(anyhow!("a source or --ip-camera is required")),
    };

    let engine = if mode == Mode::Detect {
        let _stage = ui.stage("Prepare detection engine");
        let mut registry = EngineRegistry::new();
        registry.register(StubEngine::new().with_threshold(cfg.detection.threshold));
        let name = args.engine.as_deref().unwrap_or(&cfg.detection.engine);
        Some(registry.prepare(name)?)
    } else {
        None
    };

    let ledger = {
        let _stage = ui.stage("Open ledger");
        cfg.open_ledger(!args.no_crops)?
    };
    log::info!(
        "ledger holds {} plates (dedup policy {})",
        ledger.len(),
        ledger.policy_name()
    );
    let mut recorder = DetectionRecorder::new(ledger);

    let (commands, command_rx) = mpsc::channel();
    let on_signal = commands.clone();
    ctrlc::set_handler(move || {
        let _ = on_signal.send(Command::Stop);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    if args.interactive {
        spawn_stdin_reader(commands);
    }

    let (mut frame_loop, events) = FrameLoop::new(engine, cfg.loop_options());
    let session = frame_loop
        .start(&locator, mode)
        .map_err(|e| anyhow!(e.status_message()))?;
    log::info!("session {} started on {}", session, locator);

    let mut progress = None;
    let mut last_frame = None;
    let mut logged = 0usize;
    loop {
        while let Ok(command) = command_rx.try_recv() {
            match command {
                Command::Pause => frame_loop.pause(),
                Command::Resume => frame_loop.resume(),
                Command::Toggle => {
                    if let LoopState::Running { paused, .. } = frame_loop.toggle_play() {
                        log::info!("{}", if paused { "paused" } else { "playing" });
                    }
                }
                Command::Stop => {
                    log::info!("stop requested");
                    frame_loop.stop();
                }
            }
        }

        let event = match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        match event {
            LoopEvent::SessionStarted { frame_count, .. } => {
                progress = Some(ui.frames(frame_count));
            }
            LoopEvent::FrameReady { frame, .. } => {
                if let Some(progress) = &progress {
                    progress.frame();
                }
                last_frame = Some(frame);
            }
            event @ LoopEvent::DetectionsReady { .. } => {
                if let Some(summary) = recorder.handle(&event) {
                    logged += summary.appended.len();
                    if let (Some(progress), Some(plate)) = (&progress, summary.appended.last()) {
                        progress.note(plate);
                    }
                    for warning in &summary.warnings {
                        eprintln!("warning: {}", warning);
                    }
                }
            }
            LoopEvent::SessionEnded { reason, frames, .. } => {
                let message = format!(
                    "session ended ({:?}): {} frames, {} new plates",
                    reason, frames, logged
                );
                match &progress {
                    Some(progress) => progress.finish(&message),
                    None => eprintln!("{message}"),
                }
                break;
            }
        }
    }

    if let (Some(path), Some(frame)) = (&args.snapshot, last_frame) {
        frame
            .into_image()
            .save(path)
            .map_err(|e| anyhow!("failed to write snapshot {}: {}", path.display(), e))?;
        log::info!("last frame written to {}", path.display());
    }
    log::info!("ledger now holds {} plates", recorder.ledger().len());
    Ok(())
}

fn spawn_stdin_reader(commands: Sender<Command>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let command = match line.trim() {
                "p" | "pause" => Command::Pause,
                "r" | "resume" => Command::Resume,
                "t" | "toggle" | "" => Command::Toggle,
                "s" | "stop" | "q" => Command::Stop,
                other => {
                    eprintln!("unknown command '{}' (p, r, t, s)", other);
                    continue;
                }
            };
            if commands.send(command).is_err() {
                break;
            }
        }
    });
}
