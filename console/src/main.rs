//! Line-oriented operator console for a robot controller.
//!
//! Stdin is read on its own thread and forwarded over a channel; the main
//! thread owns the session, runs commands, pumps API completions and prints
//! new log lines as they appear.

mod commands;

use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use robot_api_core::{ClientConfig, ConnectionStatus, RobotApiClient, Session};
use tracing_subscriber::EnvFilter;

use crate::commands::{Command, HELP};

const TICK: Duration = Duration::from_millis(50);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Operator console for the controller REST API.
#[derive(Parser, Debug)]
#[command(name = "robot-console", about = "Robot controller operator console")]
struct Cli {
    /// Controller host to connect to at startup.
    #[arg(long)]
    host: Option<String>,

    /// Log full request/response details.
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: u64,

    /// Redirects followed per request.
    #[arg(long, default_value_t = 3)]
    max_redirects: u32,
}

/// What the console has already shown.
struct Printed {
    log: usize,
    status: ConnectionStatus,
    program_state: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig {
        timeout: Duration::from_secs(cli.timeout_secs),
        max_redirects: cli.max_redirects,
    };
    tracing::debug!(?config, "starting console");

    let session = Session::new(RobotApiClient::with_config(config));
    session.set_debug(cli.debug);

    let lines = spawn_stdin_reader()?;
    let mut printed = Printed {
        log: 0,
        status: ConnectionStatus::NotConnected,
        program_state: None,
    };

    println!("{HELP}");
    if let Some(host) = cli.host.as_deref() {
        session.connect(host);
    }

    loop {
        match lines.recv_timeout(TICK) {
            Ok(line) => match commands::parse(&line) {
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => run(&session, command, &mut printed),
                Ok(None) => {}
                Err(e) => println!("{e}"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        session.pump();
        print_updates(&session, &mut printed);
    }

    if !session.wait_idle(DRAIN_TIMEOUT) {
        tracing::warn!("exiting with requests still in flight");
    }
    print_updates(&session, &mut printed);
    Ok(())
}

fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

fn run(session: &Session, command: Command, printed: &mut Printed) {
    match command {
        Command::Connect(host) => session.connect(&host),
        Command::RobotState(action) => session.robot_state_action(action.as_str()),
        Command::Load(name) => session.load_program(&name),
        Command::Program(action) => session.program_action(action.as_str()),
        Command::RefreshState => session.refresh_program_state(),
        Command::SafetyMode => session.query_safety_mode(),
        Command::RobotMode => session.query_robot_mode(),
        Command::ControlMode => session.query_control_mode(),
        Command::OperationalMode => session.query_operational_mode(),
        Command::ListPrograms => session.list_programs(),
        Command::ShowProgram(name) => session.show_program(&name),
        Command::Debug(enabled) => {
            session.set_debug(enabled);
            println!("debug {}", if enabled { "on" } else { "off" });
        }
        Command::Clear => {
            session.clear_log();
            printed.log = 0;
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

fn print_updates(session: &Session, printed: &mut Printed) {
    for entry in session.log_since(printed.log) {
        println!("{entry}");
        printed.log += 1;
    }

    let state = session.snapshot();
    if state.status != printed.status {
        println!("status: {} ({})", state.status.label(), state.status.indicator());
        printed.status = state.status;
    }
    if state.program_state != printed.program_state {
        if let Some(label) = &state.program_state {
            println!("{label}");
        }
        printed.program_state = state.program_state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["robot-console"]).unwrap();
        assert_eq!(cli.timeout_secs, 10);
        assert_eq!(cli.max_redirects, 3);
        assert!(!cli.debug);
        assert!(cli.host.is_none());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["robot-console", "--timeout-secs", "0"]).is_err());
        let cli = Cli::try_parse_from(["robot-console", "--timeout-secs", "1"]).unwrap();
        assert_eq!(cli.timeout_secs, 1);
    }
}
