//! Command vocabularies and helpers for reading controller answers.
//!
//! The client sends actions as opaque strings; these enums only exist so
//! callers do not have to spell the wire values by hand.

use std::fmt;

use serde_json::Value;

use crate::body::ResponseBody;

/// Verbs accepted by `PUT /robotstate/v1/state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotStateAction {
    UnlockProtectiveStop,
    RestartSafety,
    PowerOff,
    PowerOn,
    BrakeRelease,
}

impl RobotStateAction {
    pub const ALL: [RobotStateAction; 5] = [
        RobotStateAction::UnlockProtectiveStop,
        RobotStateAction::RestartSafety,
        RobotStateAction::PowerOff,
        RobotStateAction::PowerOn,
        RobotStateAction::BrakeRelease,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RobotStateAction::UnlockProtectiveStop => "UNLOCK_PROTECTIVE_STOP",
            RobotStateAction::RestartSafety => "RESTART_SAFETY",
            RobotStateAction::PowerOff => "POWER_OFF",
            RobotStateAction::PowerOn => "POWER_ON",
            RobotStateAction::BrakeRelease => "BRAKE_RELEASE",
        }
    }
}

impl fmt::Display for RobotStateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verbs accepted by `PUT /program/v1/state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramAction {
    Play,
    Pause,
    Stop,
    Resume,
}

impl ProgramAction {
    pub const ALL: [ProgramAction; 4] = [
        ProgramAction::Play,
        ProgramAction::Pause,
        ProgramAction::Stop,
        ProgramAction::Resume,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProgramAction::Play => "play",
            ProgramAction::Pause => "pause",
            ProgramAction::Stop => "stop",
            ProgramAction::Resume => "resume",
        }
    }
}

impl fmt::Display for ProgramAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short text for a program-state answer: the `state` field, else
/// `programState`, else the raw body, else the whole JSON.
pub fn program_state_text(body: &ResponseBody) -> String {
    let field = ["state", "programState"]
        .iter()
        .find_map(|key| body.get(key))
        .map(value_text)
        .filter(|text| !text.is_empty());
    if let Some(text) = field {
        return text;
    }
    match body {
        ResponseBody::Raw(text) if !text.is_empty() => text.clone(),
        _ => body.to_json().to_string(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
