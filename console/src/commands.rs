//! Operator command line parsing.

use anyhow::{bail, Result};
use robot_api_core::{ProgramAction, RobotStateAction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect(String),
    RobotState(RobotStateAction),
    Load(String),
    Program(ProgramAction),
    RefreshState,
    SafetyMode,
    RobotMode,
    ControlMode,
    OperationalMode,
    ListPrograms,
    ShowProgram(String),
    Debug(bool),
    Clear,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  connect <host>        point at a controller and probe it
  unlock                unlock protective stop
  restart-safety        restart the safety system
  power-on | power-off  robot power
  brake-release         release the brakes
  load <name>           load a program
  play | pause | stop | resume
  state                 refresh the program state
  safety | robot-mode | control-mode | operational-mode
  programs              list programs
  program <name>        show one program
  debug on|off          full exchange details in the log
  clear                 clear the log
  help | quit";

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "" => return Ok(None),
        "connect" => Command::Connect(required(word, rest, "host")?),
        "unlock" => Command::RobotState(RobotStateAction::UnlockProtectiveStop),
        "restart-safety" => Command::RobotState(RobotStateAction::RestartSafety),
        "power-on" => Command::RobotState(RobotStateAction::PowerOn),
        "power-off" => Command::RobotState(RobotStateAction::PowerOff),
        "brake-release" => Command::RobotState(RobotStateAction::BrakeRelease),
        // The session reports an empty name itself.
        "load" => Command::Load(rest.to_string()),
        "play" => Command::Program(ProgramAction::Play),
        "pause" => Command::Program(ProgramAction::Pause),
        "stop" => Command::Program(ProgramAction::Stop),
        "resume" => Command::Program(ProgramAction::Resume),
        "state" => Command::RefreshState,
        "safety" => Command::SafetyMode,
        "robot-mode" => Command::RobotMode,
        "control-mode" => Command::ControlMode,
        "operational-mode" => Command::OperationalMode,
        "programs" => Command::ListPrograms,
        "program" => Command::ShowProgram(required(word, rest, "name")?),
        "debug" => match rest {
            "on" => Command::Debug(true),
            "off" => Command::Debug(false),
            _ => bail!("usage: debug on|off"),
        },
        "clear" => Command::Clear,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command '{other}' (try 'help')"),
    };
    Ok(Some(command))
}

fn required(word: &str, rest: &str, what: &str) -> Result<String> {
    if rest.is_empty() {
        bail!("usage: {word} <{what}>");
    }
    Ok(rest.to_string())
}
