// Axis controller: owns the channel, enforces travel limits and drives
// the write -> settle -> drain exchange for every command.

use std::thread;
use tracing::{debug, info, warn};

use super::axis::AxisId;
use super::channel::{ByteChannel, SerialChannel};
use super::codec::{self, DecodeError, Operation};
use crate::config::GantryConfig;

/// Error types for the gantry core
#[derive(Debug, thiserror::Error)]
pub enum GantryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No motion controller found (USB product id {pid})")]
    DeviceNotFound { pid: u16 },

    #[error("Could not open {port}: {source}")]
    ChannelOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Protocol decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Controller is {state:?}, initialize it before moving")]
    NotInitialized { state: SessionState },

    #[error("{cm} cm is not a representable step count")]
    StepRange { cm: f64 },

    #[error("Channel already closed")]
    Disconnected,

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GantryError>;

/// Lifecycle of a controller session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Initialized,
    ShuttingDown,
    Closed,
}

/// Outcome of a move request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveResult {
    /// Relative move acknowledged by the controller
    Moved { axis: AxisId, steps: i64 },
    /// Target outside the axis travel range, nothing was sent
    LimitViolation { axis: AxisId, min: f64, max: f64 },
}

impl MoveResult {
    pub fn is_moved(&self) -> bool {
        matches!(self, MoveResult::Moved { .. })
    }
}

/// Operations a control surface may invoke on the gantry
pub trait GantryControl {
    fn initialize(&mut self) -> Result<()>;
    fn shutdown(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn move_to(&mut self, axis: AxisId, position_cm: f64) -> Result<MoveResult>;
    fn move_by(&mut self, axis: AxisId, delta_cm: f64) -> Result<MoveResult>;
    fn get_position(&mut self, axis: AxisId) -> Result<f64>;
    fn get_end_velocity(&mut self, axis: AxisId) -> Result<f64>;
    fn set_end_velocity(&mut self, axis: AxisId, velocity: u32) -> Result<()>;
    fn set_begin_velocity(&mut self, axis: AxisId, velocity: u32) -> Result<()>;
    fn state(&self) -> SessionState;
}

/// Three-axis controller session over a byte channel
pub struct AxisController<C: ByteChannel> {
    channel: Option<C>,
    config: GantryConfig,
    state: SessionState,
}

impl AxisController<SerialChannel> {
    /// Validate the configuration, then locate and open the controller
    pub fn connect(config: GantryConfig) -> Result<Self> {
        config.validate()?;
        debug!("Session {:?}", SessionState::Connecting);
        let channel = SerialChannel::discover()?;
        Self::new(config, channel)
    }

    /// Like `connect` but with an explicit port instead of discovery
    pub fn connect_port(config: GantryConfig, port_name: &str) -> Result<Self> {
        config.validate()?;
        debug!("Session {:?} on {}", SessionState::Connecting, port_name);
        let channel = SerialChannel::open(port_name)?;
        Self::new(config, channel)
    }
}

impl<C: ByteChannel> AxisController<C> {
    /// Build a session over an already open channel
    pub fn new(config: GantryConfig, channel: C) -> Result<Self> {
        config.validate()?;
        info!("Linear actuator session connected");
        Ok(Self {
            channel: Some(channel),
            config,
            state: SessionState::Connected,
        })
    }

    pub fn config(&self) -> &GantryConfig {
        &self.config
    }

    /// Underlying channel, `None` once closed
    pub fn channel(&self) -> Option<&C> {
        self.channel.as_ref()
    }

    pub fn channel_mut(&mut self) -> Option<&mut C> {
        self.channel.as_mut()
    }

    /// Write a command, wait for the controller, read back what it sent
    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        let channel = self.channel.as_mut().ok_or(GantryError::Disconnected)?;
        channel.send(command)?;
        thread::sleep(self.config.settle_delay);
        let response = channel.drain()?;
        debug!("Received: {:?}", String::from_utf8_lossy(&response));
        Ok(response)
    }

    fn require_initialized(&self) -> Result<()> {
        if self.state != SessionState::Initialized {
            warn!("Move rejected, controller is {:?}", self.state);
            return Err(GantryError::NotInitialized { state: self.state });
        }
        Ok(())
    }

    /// Set power mode, take the current location as origin, apply velocities
    pub fn initialize(&mut self) -> Result<()> {
        info!("Initializing...");
        if self.channel.is_none() {
            return Err(GantryError::Disconnected);
        }
        // Only a complete pass may leave the session Initialized
        self.state = SessionState::Connected;

        debug!("Setting power mode");
        self.exchange(&codec::encode_all_axes(|_| Operation::PowerMode))?;

        debug!("Initialize origin at current position");
        self.exchange(&codec::encode_all_axes(|_| Operation::Home))?;

        let axes = self.config.axes;
        debug!("Setting beginning velocity");
        self.exchange(&codec::encode_all_axes(|axis| {
            Operation::SetBeginVelocity(axes[axis.index()].begin_velocity)
        }))?;

        debug!("Setting end velocity");
        self.exchange(&codec::encode_all_axes(|axis| {
            Operation::SetEndVelocity(axes[axis.index()].end_velocity)
        }))?;

        debug!("Set 1/8-step mode");
        self.exchange(&codec::encode_all_axes(|_| Operation::EighthStepMode))?;

        self.state = SessionState::Initialized;
        info!("Linear actuator initialized");
        Ok(())
    }

    /// Return every axis to zero and close the channel
    ///
    /// Homing is skipped when the session never got initialized. A failed
    /// return-home does not keep the channel open; the first error is
    /// reported after closing.
    pub fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down");
        if self.channel.is_none() {
            return Err(GantryError::Disconnected);
        }
        let was_initialized = self.state == SessionState::Initialized;
        self.state = SessionState::ShuttingDown;

        let mut first_error = None;

        // Clear bytes left over from aborted commands
        if let Some(channel) = self.channel.as_mut() {
            match channel.drain() {
                Ok(stale) if !stale.is_empty() => {
                    debug!("Discarded: {:?}", String::from_utf8_lossy(&stale))
                }
                Ok(_) => {}
                Err(e) => first_error = Some(GantryError::Io(e)),
            }
        }

        if was_initialized && first_error.is_none() {
            for axis in AxisId::ALL {
                if let Err(e) = self.checked_move(axis, 0.0) {
                    warn!("Failed to return {} axis home: {}", axis, e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        self.channel = None;
        self.state = SessionState::Closed;
        info!("Channel closed");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stop all three axes in one write
    pub fn stop(&mut self) -> Result<()> {
        info!("Stop signal received. Stopping the motors");
        self.exchange(&codec::encode_all_axes(|_| Operation::Stop))?;
        Ok(())
    }

    /// Move to an absolute position after checking the axis travel range
    pub fn move_to(&mut self, axis: AxisId, position_cm: f64) -> Result<MoveResult> {
        self.require_initialized()?;
        self.checked_move(axis, position_cm)
    }

    /// Displace an axis without any limit check (manual jog)
    pub fn move_by(&mut self, axis: AxisId, delta_cm: f64) -> Result<MoveResult> {
        self.require_initialized()?;
        debug!("Moving {} axis by {}cm", axis, delta_cm);
        self.relative_move(axis, delta_cm)
    }

    fn checked_move(&mut self, axis: AxisId, position_cm: f64) -> Result<MoveResult> {
        let limits = *self.config.axis(axis);
        if !limits.contains(position_cm) {
            warn!("You are asking the gantry to go off limit!");
            info!(
                "The possible range of movement is: {} <= {} <= {} cm",
                limits.min_position_cm, axis, limits.max_position_cm
            );
            return Ok(MoveResult::LimitViolation {
                axis,
                min: limits.min_position_cm,
                max: limits.max_position_cm,
            });
        }

        // Queried live so hand-moved axes are accounted for
        let current = self.get_position(axis)?;
        debug!("Moving {} axis from {}cm to {}cm", axis, current, position_cm);
        self.relative_move(axis, position_cm - current)
    }

    fn relative_move(&mut self, axis: AxisId, delta_cm: f64) -> Result<MoveResult> {
        let steps = self.config.cm_to_steps(delta_cm)?;
        self.exchange(&codec::encode_relative_move(axis, steps))?;
        Ok(MoveResult::Moved { axis, steps })
    }

    /// Absolute position in centimeters
    pub fn get_position(&mut self, axis: AxisId) -> Result<f64> {
        let raw = self.exchange(&codec::encode_query_position(axis))?;
        Ok(codec::decode_position(&raw, axis, self.config.cm_per_step)?)
    }

    /// Current velocity in controller units
    pub fn get_velocity(&mut self, axis: AxisId) -> Result<f64> {
        let raw = self.exchange(&codec::encode_query_velocity(axis))?;
        Ok(codec::decode_velocity(&raw)?)
    }

    pub fn get_begin_velocity(&mut self, axis: AxisId) -> Result<f64> {
        let raw = self.exchange(&codec::encode_get_begin_velocity(axis))?;
        Ok(codec::decode_velocity(&raw)?)
    }

    pub fn get_end_velocity(&mut self, axis: AxisId) -> Result<f64> {
        let raw = self.exchange(&codec::encode_get_end_velocity(axis))?;
        Ok(codec::decode_velocity(&raw)?)
    }

    pub fn set_begin_velocity(&mut self, axis: AxisId, velocity: u32) -> Result<()> {
        debug!("Setting {} axis begin velocity to {}", axis, velocity);
        self.exchange(&codec::encode_set_begin_velocity(axis, velocity))?;
        self.config.axes[axis.index()].begin_velocity = velocity;
        Ok(())
    }

    pub fn set_end_velocity(&mut self, axis: AxisId, velocity: u32) -> Result<()> {
        debug!("Setting {} axis end velocity to {}", axis, velocity);
        self.exchange(&codec::encode_set_end_velocity(axis, velocity))?;
        self.config.axes[axis.index()].end_velocity = velocity;
        Ok(())
    }

    /// Set both velocities of one axis in a single write
    pub fn set_velocity(&mut self, axis: AxisId, begin: u32, end: u32) -> Result<()> {
        debug!("Setting {} axis velocities to {}..{}", axis, begin, end);
        self.exchange(&codec::encode_set_velocity(axis, begin, end))?;
        let cfg = &mut self.config.axes[axis.index()];
        cfg.begin_velocity = begin;
        cfg.end_velocity = end;
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}

impl<C: ByteChannel> GantryControl for AxisController<C> {
    fn initialize(&mut self) -> Result<()> {
        AxisController::initialize(self)
    }

    fn shutdown(&mut self) -> Result<()> {
        AxisController::shutdown(self)
    }

    fn stop(&mut self) -> Result<()> {
        AxisController::stop(self)
    }

    fn move_to(&mut self, axis: AxisId, position_cm: f64) -> Result<MoveResult> {
        AxisController::move_to(self, axis, position_cm)
    }

    fn move_by(&mut self, axis: AxisId, delta_cm: f64) -> Result<MoveResult> {
        AxisController::move_by(self, axis, delta_cm)
    }

    fn get_position(&mut self, axis: AxisId) -> Result<f64> {
        AxisController::get_position(self, axis)
    }

    fn get_end_velocity(&mut self, axis: AxisId) -> Result<f64> {
        AxisController::get_end_velocity(self, axis)
    }

    fn set_end_velocity(&mut self, axis: AxisId, velocity: u32) -> Result<()> {
        AxisController::set_end_velocity(self, axis, velocity)
    }

    fn set_begin_velocity(&mut self, axis: AxisId, velocity: u32) -> Result<()> {
        AxisController::set_begin_velocity(self, axis, velocity)
    }

    fn state(&self) -> SessionState {
        self.state
    }
}

impl<C: ByteChannel> Drop for AxisController<C> {
    fn drop(&mut self) {
        // Halt anything still moving if the session was never shut down
        if self.state == SessionState::Initialized {
            if let Err(e) = self.stop() {
                warn!("Failed to stop motors on drop: {}", e);
            }
        }
    }
}
