//! `jslab`: interactive console and script runner.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jslab_engine::{
    Command, Controller, EngineConfig, EngineError, Event, EventSink, LineRange, OutputLevel,
    Session, Submission, Value,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jslab")]
#[command(about = "Incremental JavaScript console with a persistent workspace")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extra directory searched for scripts (repeatable)
    #[arg(long = "include", global = true)]
    includes: Vec<PathBuf>,

    /// Append raw stacks to error messages
    #[arg(long, global = true)]
    show_stack: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive console (the default)
    Repl,

    /// Run a script file, then keep running its timers until idle
    Run {
        path: PathBuf,

        /// Line or half-open range: `3` or `2:5`
        #[arg(long, value_parser = parse_lines)]
        lines: Option<LineRange>,

        /// Do not echo the result
        #[arg(long)]
        silent: bool,
    },

    /// Evaluate one submission
    Eval { code: String },
}

fn parse_lines(text: &str) -> Result<LineRange, String> {
    let number = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|_| format!("invalid line number `{s}`"))
    };
    match text.split_once(':') {
        Some((start, end)) => Ok(LineRange::Span(number(start)?, number(end)?)),
        None => Ok(LineRange::Line(number(text)?)),
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("JSLAB_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.paths.includes.extend(cli.includes);
    config.debug.show_stack |= cli.show_stack;

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => repl(config),
        Commands::Run {
            path,
            lines,
            silent,
        } => run_once(config, |c| c.run_script(&path, lines, silent)),
        Commands::Eval { code } => run_once(config, |c| c.evaluate(&Submission::console(code))),
    }
}

// ── Output ──────────────────────────────────────────────────────────────

struct Printer;

impl EventSink for Printer {
    fn emit(&self, event: Event) {
        print_event(&event);
    }
}

fn print_event(event: &Event) {
    match event {
        Event::ResultReady { value, .. } => println!("{value}"),
        Event::Output { level, text } => match level {
            OutputLevel::Warn | OutputLevel::Error => eprintln!("{text}"),
            _ => println!("{text}"),
        },
        Event::ErrorReported { message } | Event::Stopped { message } => eprintln!("{message}"),
        Event::Busy => eprintln!("busy"),
        other => debug!(?other, "event"),
    }
}

// ── One-shot commands ───────────────────────────────────────────────────

fn run_once(
    config: EngineConfig,
    job: impl FnOnce(&mut Controller) -> Result<Value, EngineError>,
) -> Result<ExitCode> {
    let mut controller = Controller::new(config, Rc::new(Printer))?;
    let ok = job(&mut controller).is_ok();
    if ok {
        let poll = Duration::from_millis(controller.config().engine.idle_poll_ms.max(1));
        while !controller.interp().stats().is_idle() {
            controller.pump();
            std::thread::sleep(poll);
        }
    }
    controller.shutdown();
    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// ── Interactive console ─────────────────────────────────────────────────

fn repl(config: EngineConfig) -> Result<ExitCode> {
    let session = Session::spawn(config)?;
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        for event in session.pending_events() {
            print_event(&event);
        }
        print!(">> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim_end();
        let command = match input.trim() {
            "" => continue,
            ":quit" | ":q" => break,
            ":stop" => Command::StopLoop { flag: true },
            ":clear" => Command::ClearWorkspace,
            ":last" => Command::RunLast,
            other => match other.split_once(' ') {
                Some((":run", path)) => Command::RunScript {
                    path: PathBuf::from(path.trim()),
                    line_range: None,
                    silent: false,
                },
                Some((":cd", dir)) => Command::SetPath {
                    dir: PathBuf::from(dir.trim()),
                },
                _ => Command::EvalCommand {
                    text: input.to_string(),
                    show_output: true,
                    session_name: None,
                },
            },
        };
        let evaluates = command.evaluates();
        if let Err(e) = session.send(command) {
            eprintln!("{e}");
            continue;
        }
        if evaluates {
            wait_for_completion(&session);
        }
    }
    session.shutdown();
    Ok(ExitCode::SUCCESS)
}

/// Print events until the submission finishes or fails before starting.
fn wait_for_completion(session: &Session) {
    let mut started = false;
    loop {
        let event = match session.events().recv_timeout(Duration::from_millis(50)) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        };
        print_event(&event);
        match event {
            Event::Started { .. } => started = true,
            Event::Finished | Event::Busy => return,
            Event::ErrorReported { .. } if !started => return,
            _ => {}
        }
    }
}
