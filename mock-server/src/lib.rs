use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;

pub const API_PREFIX: &str = "/universal-robots/robot-api";

pub const SEEDED_PROGRAMS: [&str; 3] = ["demo", "palletizing", "pick and place"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Stopped,
    Playing,
    Paused,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RobotMode {
    PowerOff,
    Idle,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyMode {
    Normal,
    ProtectiveStop,
}

/// In-memory state of the simulated controller.
#[derive(Clone, Debug)]
pub struct Controller {
    pub run_state: RunState,
    pub loaded_program: Option<String>,
    pub robot_mode: RobotMode,
    pub safety_mode: SafetyMode,
    pub control_mode: String,
    pub operational_mode: String,
    pub programs: Vec<String>,
}

impl Default for Controller {
    fn default() -> Self {
        Self {
            run_state: RunState::Stopped,
            loaded_program: None,
            robot_mode: RobotMode::PowerOff,
            safety_mode: SafetyMode::Normal,
            control_mode: "REMOTE".to_string(),
            operational_mode: "AUTOMATIC".to_string(),
            programs: SEEDED_PROGRAMS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgramStateBody {
    pub state: RunState,
    pub program_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RobotStateBody {
    pub robot_mode: RobotMode,
    pub safety_mode: SafetyMode,
}

/// Error body shape used by every rejection.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub message: String,
    pub details: String,
}

#[derive(Deserialize)]
pub struct ActionRequest {
    pub action: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRequest {
    pub program_name: String,
}

pub struct Rejection {
    status: StatusCode,
    body: ErrorBody,
}

impl Rejection {
    fn new(status: StatusCode, message: &str, details: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                message: message.to_string(),
                details: details.into(),
            },
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type Db = Arc<RwLock<Controller>>;

pub fn app() -> Router {
    app_with_state(Db::default())
}

/// Controller API over caller-provided state, so tests can stage conditions
/// such as a protective stop.
pub fn app_with_state(db: Db) -> Router {
    let api = Router::new()
        .route("/program/v1/state", get(get_program_state).put(put_program_state))
        .route("/program/v1/load", put(load_program))
        .route("/robotstate/v1/state", put(put_robot_state))
        .route("/robotstate/v1/safetymode", get(get_safety_mode))
        .route("/robotstate/v1/robotmode", get(get_robot_mode))
        .route("/system/v1/controlmode", get(get_control_mode))
        .route("/system/v1/operationalmode", get(get_operational_mode))
        .route("/programs/v1", get(list_programs))
        .route("/programs/v1/{name}", get(get_program));
    Router::new().nest(API_PREFIX, api).with_state(db)
}

/// Answers every request with `307 Temporary Redirect` to `target` followed
/// by the original path and query. An empty target yields a relative
/// location pointing back at the same path, which never settles.
pub fn redirect_app(target: &str) -> Router {
    Router::new()
        .fallback(redirect_to)
        .with_state(Arc::<str>::from(target.trim_end_matches('/')))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, app()).await
}

pub async fn serve(listener: TcpListener, router: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, router).await
}

async fn redirect_to(State(target): State<Arc<str>>, uri: Uri) -> Redirect {
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    Redirect::temporary(&format!("{target}{path}"))
}

fn program_state(c: &Controller) -> ProgramStateBody {
    ProgramStateBody {
        state: c.run_state,
        program_name: c.loaded_program.clone(),
    }
}

fn robot_state(c: &Controller) -> RobotStateBody {
    RobotStateBody {
        robot_mode: c.robot_mode,
        safety_mode: c.safety_mode,
    }
}

async fn get_program_state(State(db): State<Db>) -> Json<ProgramStateBody> {
    Json(program_state(&*db.read().await))
}

async fn put_program_state(
    State(db): State<Db>,
    Json(input): Json<ActionRequest>,
) -> Result<Json<ProgramStateBody>, Rejection> {
    let mut c = db.write().await;
    info!(action = %input.action, "program action");
    let next = match (input.action.as_str(), c.run_state) {
        ("play", RunState::Stopped) => {
            if c.loaded_program.is_none() {
                return Err(Rejection::new(StatusCode::CONFLICT, "Cannot play", "No program loaded"));
            }
            if c.robot_mode != RobotMode::Running {
                return Err(Rejection::new(
                    StatusCode::CONFLICT,
                    "Cannot play",
                    "Robot is not running",
                ));
            }
            RunState::Playing
        }
        ("pause", RunState::Playing) => RunState::Paused,
        ("resume", RunState::Paused) => RunState::Playing,
        ("stop", _) => RunState::Stopped,
        ("play" | "pause" | "resume", current) => {
            return Err(Rejection::new(
                StatusCode::CONFLICT,
                "Illegal program state transition",
                format!("Cannot {} while {:?}", input.action, current),
            ))
        }
        (other, _) => {
            return Err(Rejection::new(
                StatusCode::BAD_REQUEST,
                "Invalid action",
                format!("Unknown program action '{other}'"),
            ))
        }
    };
    c.run_state = next;
    Ok(Json(program_state(&c)))
}

async fn load_program(
    State(db): State<Db>,
    Json(input): Json<LoadRequest>,
) -> Result<Json<ProgramStateBody>, Rejection> {
    let mut c = db.write().await;
    if !c.programs.contains(&input.program_name) {
        return Err(Rejection::new(
            StatusCode::NOT_FOUND,
            "Program not found",
            format!("No program named '{}'", input.program_name),
        ));
    }
    if c.run_state != RunState::Stopped {
        return Err(Rejection::new(
            StatusCode::CONFLICT,
            "Cannot load program",
            "Stop the running program first",
        ));
    }
    info!(program = %input.program_name, "program loaded");
    c.loaded_program = Some(input.program_name);
    Ok(Json(program_state(&c)))
}

async fn put_robot_state(
    State(db): State<Db>,
    Json(input): Json<ActionRequest>,
) -> Result<Json<RobotStateBody>, Rejection> {
    let mut c = db.write().await;
    info!(action = %input.action, "robot state action");
    match input.action.as_str() {
        "POWER_ON" => {
            if c.robot_mode == RobotMode::PowerOff {
                c.robot_mode = RobotMode::Idle;
            }
        }
        "POWER_OFF" => {
            c.robot_mode = RobotMode::PowerOff;
            c.run_state = RunState::Stopped;
        }
        "BRAKE_RELEASE" => {
            if c.robot_mode == RobotMode::PowerOff {
                return Err(Rejection::new(
                    StatusCode::CONFLICT,
                    "Cannot release brakes",
                    "Robot is powered off",
                ));
            }
            c.robot_mode = RobotMode::Running;
        }
        "UNLOCK_PROTECTIVE_STOP" => {
            if c.safety_mode != SafetyMode::ProtectiveStop {
                return Err(Rejection::new(
                    StatusCode::CONFLICT,
                    "Cannot unlock protective stop",
                    "Robot is not in protective stop",
                ));
            }
            c.safety_mode = SafetyMode::Normal;
        }
        "RESTART_SAFETY" => {
            c.safety_mode = SafetyMode::Normal;
            c.robot_mode = RobotMode::PowerOff;
            c.run_state = RunState::Stopped;
        }
        other => {
            return Err(Rejection::new(
                StatusCode::BAD_REQUEST,
                "Invalid action",
                format!("Unknown robot state action '{other}'"),
            ))
        }
    }
    Ok(Json(robot_state(&c)))
}

async fn get_safety_mode(State(db): State<Db>) -> Json<serde_json::Value> {
    let c = db.read().await;
    Json(serde_json::json!({ "safetyMode": c.safety_mode }))
}

async fn get_robot_mode(State(db): State<Db>) -> Json<serde_json::Value> {
    let c = db.read().await;
    Json(serde_json::json!({ "robotMode": c.robot_mode }))
}

async fn get_control_mode(State(db): State<Db>) -> Json<serde_json::Value> {
    let c = db.read().await;
    Json(serde_json::json!({ "controlMode": c.control_mode }))
}

async fn get_operational_mode(State(db): State<Db>) -> Json<serde_json::Value> {
    let c = db.read().await;
    Json(serde_json::json!({ "operationalMode": c.operational_mode }))
}

async fn list_programs(State(db): State<Db>) -> Json<serde_json::Value> {
    let c = db.read().await;
    let programs: Vec<_> = c
        .programs
        .iter()
        .map(|name| serde_json::json!({ "name": name }))
        .collect();
    Json(serde_json::json!({ "programs": programs }))
}

async fn get_program(
    State(db): State<Db>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, Rejection> {
    let c = db.read().await;
    if !c.programs.contains(&name) {
        return Err(Rejection::new(
            StatusCode::NOT_FOUND,
            "Program not found",
            format!("No program named '{name}'"),
        ));
    }
    let loaded = c.loaded_program.as_deref() == Some(name.as_str());
    Ok(Json(serde_json::json!({ "name": name, "loaded": loaded })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_state_serializes_camel_case() {
        let body = ProgramStateBody {
            state: RunState::Playing,
            program_name: Some("demo".to_string()),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["state"], "PLAYING");
        assert_eq!(json["programName"], "demo");
    }

    #[test]
    fn robot_state_uses_wire_names() {
        let json = serde_json::to_value(RobotStateBody {
            robot_mode: RobotMode::PowerOff,
            safety_mode: SafetyMode::ProtectiveStop,
        })
        .unwrap();
        assert_eq!(json["robotMode"], "POWER_OFF");
        assert_eq!(json["safetyMode"], "PROTECTIVE_STOP");
    }

    #[test]
    fn load_request_reads_program_name() {
        let input: LoadRequest = serde_json::from_str(r#"{"programName":"demo"}"#).unwrap();
        assert_eq!(input.program_name, "demo");
    }

    #[test]
    fn load_request_rejects_snake_case() {
        let result: Result<LoadRequest, _> = serde_json::from_str(r#"{"program_name":"demo"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn default_controller_is_powered_off_with_seeded_programs() {
        let c = Controller::default();
        assert_eq!(c.robot_mode, RobotMode::PowerOff);
        assert_eq!(c.run_state, RunState::Stopped);
        assert!(c.loaded_program.is_none());
        assert_eq!(c.programs.len(), SEEDED_PROGRAMS.len());
    }
}
