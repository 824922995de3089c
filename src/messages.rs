// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::gantry::{AxisId, MoveResult, SessionState};

// Command from a control surface or script -> runtime
// Serialized as {"op": "move_to", "axis": "X", "position_cm": 12.5}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GantryCommand {
    Initialize,
    Shutdown,
    Stop,
    MoveTo { axis: AxisId, position_cm: f64 },
    // Unchecked jog, no travel limits applied
    MoveBy { axis: AxisId, delta_cm: f64 },
    SetEndVelocity { axis: AxisId, velocity: u32 },
    SetBeginVelocity { axis: AxisId, velocity: u32 },
}

// Polled state published by the runtime, arrays indexed X, Y, Z
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GantryState {
    pub position_cm: [f64; 3],
    pub end_velocity: [f64; 3],
}

/// Outcome of the last move, as reported to the control surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MoveReport {
    Moved { axis: AxisId, steps: i64 },
    LimitViolation { axis: AxisId, min: f64, max: f64 },
}

impl From<MoveResult> for MoveReport {
    fn from(result: MoveResult) -> Self {
        match result {
            MoveResult::Moved { axis, steps } => Self::Moved { axis, steps },
            MoveResult::LimitViolation { axis, min, max } => {
                Self::LimitViolation { axis, min, max }
            }
        }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    Uninitialized,
    Fault,
    Closed,
}

impl From<SessionState> for RuntimeHealth {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Initialized => Self::Ok,
            SessionState::ShuttingDown | SessionState::Closed => Self::Closed,
            SessionState::Disconnected | SessionState::Connecting | SessionState::Connected => {
                Self::Uninitialized
            }
        }
    }
}
