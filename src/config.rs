// Timing, topics, serial link and gantry geometry
use std::time::Duration;

use crate::gantry::{AxisId, GantryError};

// Runtime loop frequency (each state poll costs six serial round trips)
pub const LOOP_HZ: u64 = 1;

// Zenoh topics
pub const TOPIC_CMD: &str = "gantry/cmd"; // commands
pub const TOPIC_STATE: &str = "gantry/state"; // positions and velocities
pub const TOPIC_MOVE: &str = "gantry/state/move"; // outcome of each move
pub const TOPIC_HEALTH: &str = "gantry/state/health"; // health status

// Serial link to the motion controller
pub const BAUDRATE: u32 = 115_200;
pub const CONTROLLER_USB_PID: u16 = 21;
pub const SERIAL_TIMEOUT_MS: u64 = 100;

// Wait between writing a command and draining its response
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

// Conversion between motor steps and centimeters
pub const STEPS_PER_CM: f64 = 3200.0;
pub const CM_PER_STEP: f64 = 0.0003125;

// 2^63, first magnitude a step count can no longer hold
const STEP_RANGE: f64 = 9_223_372_036_854_775_808.0;

// Velocities [full step: 1 (slowest) to 20,000 (fastest)]
pub const DEFAULT_END_VELOCITY: u32 = 6000;
pub const DEFAULT_BEGIN_VELOCITY: u32 = 100;
pub const MAX_VELOCITY: u32 = 10_000;

// Software travel limits in centimeters, indexed by axis
pub const DEFAULT_LIMITS_CM: [(f64, f64); 3] = [(0.0, 80.0), (-30.0, 30.0), (0.0, 80.0)];

/// Travel range and velocity pair of a single axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisConfig {
    pub min_position_cm: f64,
    pub max_position_cm: f64,
    pub begin_velocity: u32,
    pub end_velocity: u32,
}

impl AxisConfig {
    pub fn contains(&self, position_cm: f64) -> bool {
        self.min_position_cm <= position_cm && position_cm <= self.max_position_cm
    }
}

/// Session-wide configuration of the gantry
#[derive(Debug, Clone, PartialEq)]
pub struct GantryConfig {
    pub steps_per_cm: f64,
    pub cm_per_step: f64,
    pub max_velocity: u32,
    pub settle_delay: Duration,
    pub axes: [AxisConfig; 3],
}

impl Default for GantryConfig {
    fn default() -> Self {
        Self::with_velocity(DEFAULT_END_VELOCITY)
    }
}

impl GantryConfig {
    /// Default geometry with the same end velocity applied to every axis
    pub fn with_velocity(end_velocity: u32) -> Self {
        let axes = DEFAULT_LIMITS_CM.map(|(min, max)| AxisConfig {
            min_position_cm: min,
            max_position_cm: max,
            begin_velocity: DEFAULT_BEGIN_VELOCITY,
            end_velocity,
        });

        Self {
            steps_per_cm: STEPS_PER_CM,
            cm_per_step: CM_PER_STEP,
            max_velocity: MAX_VELOCITY,
            settle_delay: SETTLE_DELAY,
            axes,
        }
    }

    pub fn axis(&self, axis: AxisId) -> &AxisConfig {
        &self.axes[axis.index()]
    }

    /// Convert a displacement to whole steps, truncating toward zero
    ///
    /// NaN, infinities and step counts outside `i64` are rejected rather
    /// than saturated.
    pub fn cm_to_steps(&self, cm: f64) -> Result<i64, GantryError> {
        let steps = (cm * self.steps_per_cm).trunc();
        if !(-STEP_RANGE..STEP_RANGE).contains(&steps) {
            return Err(GantryError::StepRange { cm });
        }
        Ok(steps as i64)
    }

    /// Checked once when a session is built, never again
    pub fn validate(&self) -> Result<(), GantryError> {
        if (self.steps_per_cm * self.cm_per_step - 1.0).abs() > 1e-9 {
            return Err(GantryError::Configuration(format!(
                "steps_per_cm ({}) and cm_per_step ({}) are not reciprocal",
                self.steps_per_cm, self.cm_per_step
            )));
        }

        for axis in AxisId::ALL {
            let cfg = self.axis(axis);
            if cfg.min_position_cm > cfg.max_position_cm {
                return Err(GantryError::Configuration(format!(
                    "{} axis limits are inverted: {} > {}",
                    axis, cfg.min_position_cm, cfg.max_position_cm
                )));
            }
            if cfg.end_velocity == 0 || cfg.end_velocity > self.max_velocity {
                return Err(GantryError::Configuration(format!(
                    "{} axis velocity {} beyond max-velocity {}",
                    axis, cfg.end_velocity, self.max_velocity
                )));
            }
        }

        Ok(())
    }
}
