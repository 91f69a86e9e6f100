/// Entry point: load a level and a block program, run it.
///
/// ```text
/// blockrunner [--headless] [--verbose] [--level N | --level-file PATH] PROGRAM.json
/// blockrunner --list
/// ```
///
/// Terminal mode draws the board and animates the actor; headless mode
/// prints events to stdout as they happen.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use blockrunner::config::GameConfig;
use blockrunner::domain::program::Program;
use blockrunner::sim::actor::{ChannelActor, InstantActor};
use blockrunner::sim::event::{drain, GameEvent};
use blockrunner::sim::interpreter::{RunOutcome, RunSummary};
use blockrunner::sim::level::{levels_for, load_level_file, pick, LevelDef};
use blockrunner::sim::session::Session;
use blockrunner::sim::world::Phase;
use blockrunner::ui::animator::Animator;
use blockrunner::ui::input::{Command, InputState};
use blockrunner::ui::renderer::{Renderer, Scene};
use blockrunner::ui::sound::SoundEngine;

const FRAME: Duration = Duration::from_millis(16);
const LOG_FILE: &str = "blockrunner.log";

const USAGE: &str = "\
usage: blockrunner [--headless] [--verbose] [--level N | --level-file PATH] PROGRAM.json
       blockrunner --list";

// ── Arguments ──

#[derive(Debug, PartialEq)]
enum LevelChoice {
    /// 1-based position in the level list.
    Index(usize),
    File(PathBuf),
}

#[derive(Debug, PartialEq)]
struct Args {
    headless: bool,
    verbose: bool,
    list: bool,
    level: LevelChoice,
    program: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Args> {
        let mut parsed = Args {
            headless: false,
            verbose: false,
            list: false,
            level: LevelChoice::Index(1),
            program: None,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--headless" => parsed.headless = true,
                "--verbose" | "-v" => parsed.verbose = true,
                "--list" => parsed.list = true,
                "--level" => {
                    let n = args.next().context("--level needs a number")?;
                    let n: usize = n.parse().with_context(|| format!("bad level number {n:?}"))?;
                    if n == 0 {
                        bail!("levels are numbered from 1");
                    }
                    parsed.level = LevelChoice::Index(n);
                }
                "--level-file" => {
                    let path = args.next().context("--level-file needs a path")?;
                    parsed.level = LevelChoice::File(path.into());
                }
                "--help" | "-h" => bail!("{USAGE}"),
                other if other.starts_with('-') => bail!("unknown option {other}\n{USAGE}"),
                other => {
                    if parsed.program.replace(other.into()).is_some() {
                        bail!("only one program file may be given\n{USAGE}");
                    }
                }
            }
        }
        if !parsed.list && parsed.program.is_none() {
            bail!("missing program file\n{USAGE}");
        }
        Ok(parsed)
    }
}

// ── Logging ──

/// Headless logs to stderr; the terminal view logs to a file so the
/// screen stays clean. `RUST_LOG` overrides the default `info` filter.
///
/// File logging goes through a background writer; keep the returned guard
/// alive until exit so buffered lines are flushed.
fn init_logging(headless: bool) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if headless {
        builder.with_writer(std::io::stderr).init();
        return Ok(None);
    }
    let (writer, guard) = log_file_writer(Path::new("."))?;
    builder.with_writer(writer).with_ansi(false).init();
    Ok(Some(guard))
}

/// Non-blocking writer appending to `LOG_FILE` in `dir`.
fn log_file_writer(dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(dir)
        .with_context(|| format!("could not open {LOG_FILE} in {}", dir.display()))?;
    Ok(tracing_appender::non_blocking(appender))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;
    let _log_guard = init_logging(args.headless || args.list)?;
    let config = GameConfig::load();

    if args.list {
        for (i, level) in levels_for(&config).iter().enumerate() {
            println!("{:>3}  {}  ({}x{})", i + 1, level.name, level.width(), level.height());
        }
        return Ok(());
    }

    let level = match &args.level {
        LevelChoice::Index(n) => pick(&levels_for(&config), n - 1)?,
        LevelChoice::File(path) => load_level_file(path)?,
    };
    let program_path = args.program.as_deref().context("missing program file")?;
    let program = Program::from_json_file(program_path)?;
    tracing::info!(level = %level.name, program = %program_path.display(), "starting");

    let name = level.name.clone();
    let (summary, phase) = if args.headless {
        run_headless(level, program, &config, args.verbose).await?
    } else {
        run_terminal(level, program, &config).await?
    };

    println!();
    println!("Level: {name}");
    match summary {
        Some(summary) => print_summary(&summary, phase),
        None => println!("Program was not run."),
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, phase: Phase) {
    let outcome = match &summary.outcome {
        RunOutcome::Finished => "finished".to_string(),
        RunOutcome::Stopped => "stopped".to_string(),
        RunOutcome::Aborted(e) => format!("aborted: {e}"),
    };
    let result = match phase {
        Phase::Solved => "solved",
        Phase::Lost => "caught",
        Phase::Playing => "unsolved",
    };
    println!("Run {outcome}, {} instructions, level {result}", summary.executed);
    for (name, value) in &summary.variables {
        println!("  {name} = {value}");
    }
}

// ══════════════════════════════════════════════════════════════
// Headless
// ══════════════════════════════════════════════════════════════

async fn run_headless(
    level: LevelDef,
    program: Program,
    config: &GameConfig,
    verbose: bool,
) -> Result<(Option<RunSummary>, Phase)> {
    let mut session = Session::new(level, config, Arc::new(InstantActor))?;
    let mut rx = session.subscribe();
    session.start_ticking();

    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let chatty = matches!(
                        event,
                        GameEvent::InstructionStarted { .. } | GameEvent::InstructionFinished { .. }
                    );
                    if verbose || !chatty {
                        println!("{event}");
                    }
                    if matches!(event, GameEvent::ProgramFinished { .. } | GameEvent::ProgramError { .. }) {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event printer lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let summary = session.run(&program).await;
    if summary.is_some() {
        printer.await?;
    } else {
        printer.abort();
    }
    let phase = session.world().with(|w| w.phase)?;
    Ok((summary, phase))
}

// ══════════════════════════════════════════════════════════════
// Terminal
// ══════════════════════════════════════════════════════════════

async fn run_terminal(
    level: LevelDef,
    program: Program,
    config: &GameConfig,
) -> Result<(Option<RunSummary>, Phase)> {
    let (actor, requests) = ChannelActor::new();
    let mut session = Session::new(level, config, Arc::new(actor))?;
    session.start_ticking();
    let animator = Animator::new(session.world().clone(), config.speed.clone()).spawn(requests);

    let mut renderer = Renderer::new();
    renderer.init().context("terminal init failed")?;
    let sound = SoundEngine::new();

    let result = game_loop(&session, &program, &mut renderer, sound.as_ref()).await;

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    session.stop();
    animator.abort();

    let summary = result?;
    let phase = session.world().with(|w| w.phase)?;
    Ok((summary, phase))
}

/// Frame loop: keys → session commands, events → sound and status line,
/// world → screen. Returns the last completed run's summary.
async fn game_loop(
    session: &Session,
    program: &Program,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
) -> Result<Option<RunSummary>> {
    let mut input = InputState::new();
    let mut events = session.subscribe();
    let mut status = String::from("Space to run");
    let mut run: Option<JoinHandle<Option<RunSummary>>> = None;
    let mut last: Option<RunSummary> = None;
    let mut frame = tokio::time::interval(FRAME);

    'frames: loop {
        frame.tick().await;

        for &cmd in input.drain_events() {
            match cmd {
                Command::Run if run.is_none() => {
                    run = Some(session.spawn_run(program.clone()));
                }
                Command::Run => {}
                Command::Stop => session.stop(),
                Command::Reset => {
                    session.reset()?;
                    status = String::from("reset");
                }
                Command::Quit => break 'frames,
            }
        }

        for event in drain(&mut events) {
            if let Some(sfx) = sound {
                sfx.play_event(&event);
            }
            if !matches!(event, GameEvent::InstructionFinished { .. }) {
                status = event.to_string();
            }
        }

        if run.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = run.take() {
                if let Some(summary) = handle.await? {
                    last = Some(summary);
                }
            }
        }

        let scene = session.world().with(|w| Scene::capture(w))?;
        renderer.render(&scene, &status)?;
    }

    Ok(last)
}
