// Motion-control core for the three-axis linear-actuator gantry
//
// Provides:
// - Axis identifiers and the per-axis wiring table
// - ASCII command codec for the stepper motion controller
// - Byte channel abstraction (serial port, simulator)
// - Axis controller with software travel limits

mod axis;
pub mod channel;
pub mod codec;
mod controller;
pub mod sim;

pub use axis::{AxisId, Wiring};
pub use channel::{ByteChannel, SerialChannel};
pub use codec::DecodeError;
pub use controller::{AxisController, GantryControl, GantryError, MoveResult, Result, SessionState};
pub use sim::SimulatedController;
