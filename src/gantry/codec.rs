// ASCII command codec for the stepper motion controller
//
// Command format: <TAG>0<op>[value], several commands may be comma-joined,
// every write ends with a single '\r'.
// Response format: 3-byte header, ASCII numeric payload, 1-byte trailer.

use super::axis::{AxisId, Wiring};

/// Command terminator
pub const TERMINATOR: u8 = b'\r';

/// Bytes stripped from the front and back of every response
const RESPONSE_HEADER_LEN: usize = 3;
const RESPONSE_TRAILER_LEN: usize = 1;

/// Operations understood by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    PowerMode,
    Home,
    EighthStepMode,
    RelativeMove(i64),
    QueryPosition,
    QueryVelocity,
    SetBeginVelocity(u32),
    GetBeginVelocity,
    SetEndVelocity(u32),
    GetEndVelocity,
    Stop,
}

/// A single outbound request addressed to one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub axis: AxisId,
    pub op: Operation,
}

impl Command {
    pub fn new(axis: AxisId, op: Operation) -> Self {
        Self { axis, op }
    }

    /// Render without the terminator
    pub fn fragment(&self) -> String {
        let tag = self.axis.tag() as char;
        match self.op {
            Operation::PowerMode => format!("{}0P3,128,17,0", tag),
            Operation::Home => format!("{}0N+0S", tag),
            Operation::EighthStepMode => format!("{}0H3", tag),
            Operation::RelativeMove(steps) => {
                format!("{}0RNY{}{}", tag, move_sign(self.axis, steps), steps.unsigned_abs())
            }
            Operation::QueryPosition => format!("{}0m", tag),
            Operation::QueryVelocity => format!("{}0v", tag),
            Operation::SetBeginVelocity(v) => format!("{}0B{}", tag, v),
            Operation::GetBeginVelocity => format!("{}0b", tag),
            Operation::SetEndVelocity(v) => format!("{}0E{}", tag, v),
            Operation::GetEndVelocity => format!("{}0e", tag),
            Operation::Stop => format!("{}0*", tag),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_batch(std::slice::from_ref(self))
    }
}

/// Comma-join several commands into a single terminated write
pub fn encode_batch(commands: &[Command]) -> Vec<u8> {
    let joined = commands
        .iter()
        .map(Command::fragment)
        .collect::<Vec<_>>()
        .join(",");
    let mut bytes = joined.into_bytes();
    bytes.push(TERMINATOR);
    bytes
}

/// Same operation on all three axes in one write
pub fn encode_all_axes(op: impl Fn(AxisId) -> Operation) -> Vec<u8> {
    let commands = AxisId::ALL.map(|axis| Command::new(axis, op(axis)));
    encode_batch(&commands)
}

/// Sign character for a relative move, following each axis's motor wiring
fn move_sign(axis: AxisId, steps: i64) -> char {
    match (axis.wiring(), steps >= 0) {
        (Wiring::Inverted, true) | (Wiring::Direct, false) => '-',
        (Wiring::Inverted, false) | (Wiring::Direct, true) => '+',
    }
}

pub fn encode_relative_move(axis: AxisId, delta_steps: i64) -> Vec<u8> {
    Command::new(axis, Operation::RelativeMove(delta_steps)).encode()
}

pub fn encode_home(axis: AxisId) -> Vec<u8> {
    Command::new(axis, Operation::Home).encode()
}

pub fn encode_query_position(axis: AxisId) -> Vec<u8> {
    Command::new(axis, Operation::QueryPosition).encode()
}

pub fn encode_query_velocity(axis: AxisId) -> Vec<u8> {
    Command::new(axis, Operation::QueryVelocity).encode()
}

pub fn encode_set_velocity(axis: AxisId, begin: u32, end: u32) -> Vec<u8> {
    encode_batch(&[
        Command::new(axis, Operation::SetBeginVelocity(begin)),
        Command::new(axis, Operation::SetEndVelocity(end)),
    ])
}

pub fn encode_set_begin_velocity(axis: AxisId, velocity: u32) -> Vec<u8> {
    Command::new(axis, Operation::SetBeginVelocity(velocity)).encode()
}

pub fn encode_set_end_velocity(axis: AxisId, velocity: u32) -> Vec<u8> {
    Command::new(axis, Operation::SetEndVelocity(velocity)).encode()
}

pub fn encode_get_begin_velocity(axis: AxisId) -> Vec<u8> {
    Command::new(axis, Operation::GetBeginVelocity).encode()
}

pub fn encode_get_end_velocity(axis: AxisId) -> Vec<u8> {
    Command::new(axis, Operation::GetEndVelocity).encode()
}

/// Malformed controller response
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DecodeError {
    #[error("Response too short to decode ({len} bytes): {raw:?}")]
    Truncated { len: usize, raw: String },

    #[error("Non-numeric response payload: {payload:?}")]
    NonNumeric { payload: String },
}

/// Numeric payload between the fixed header and trailer
fn payload_value(raw: &[u8]) -> Result<f64, DecodeError> {
    if raw.len() < RESPONSE_HEADER_LEN + RESPONSE_TRAILER_LEN {
        return Err(DecodeError::Truncated {
            len: raw.len(),
            raw: String::from_utf8_lossy(raw).into_owned(),
        });
    }

    let payload = &raw[RESPONSE_HEADER_LEN..raw.len() - RESPONSE_TRAILER_LEN];
    let text = String::from_utf8_lossy(payload);
    let parsed = text.trim().parse::<f64>();
    match parsed {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(DecodeError::NonNumeric {
            payload: text.into_owned(),
        }),
    }
}

/// Decode a position response into logical centimeters
pub fn decode_position(raw: &[u8], axis: AxisId, cm_per_step: f64) -> Result<f64, DecodeError> {
    let cm = payload_value(raw)? * cm_per_step;
    Ok(match axis.wiring() {
        Wiring::Inverted => -cm,
        Wiring::Direct => cm,
    })
}

/// Decode a velocity response (raw controller units)
pub fn decode_velocity(raw: &[u8]) -> Result<f64, DecodeError> {
    payload_value(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CM_PER_STEP, STEPS_PER_CM};

    #[test]
    fn test_relative_move_sign_per_axis() {
        assert_eq!(encode_relative_move(AxisId::X, 32000), b"X0RNY-32000\r");
        assert_eq!(encode_relative_move(AxisId::X, -5), b"X0RNY+5\r");
        assert_eq!(encode_relative_move(AxisId::Y, 0), b"Y0RNY-0\r");
        assert_eq!(encode_relative_move(AxisId::Y, -1200), b"Y0RNY+1200\r");
        assert_eq!(encode_relative_move(AxisId::Z, 0), b"Z0RNY+0\r");
        assert_eq!(encode_relative_move(AxisId::Z, 42), b"Z0RNY+42\r");
        assert_eq!(encode_relative_move(AxisId::Z, -9600), b"Z0RNY-9600\r");
    }

    #[test]
    fn test_relative_move_extreme_magnitude() {
        // No limit is enforced at this layer
        let bytes = encode_relative_move(AxisId::Z, i64::MIN);
        assert_eq!(bytes, format!("Z0RNY-{}\r", i64::MIN.unsigned_abs()).into_bytes());
    }

    #[test]
    fn test_fixed_commands() {
        assert_eq!(encode_home(AxisId::Y), b"Y0N+0S\r");
        assert_eq!(encode_query_position(AxisId::X), b"X0m\r");
        assert_eq!(encode_query_velocity(AxisId::Z), b"Z0v\r");
        assert_eq!(encode_get_begin_velocity(AxisId::X), b"X0b\r");
        assert_eq!(encode_get_end_velocity(AxisId::Y), b"Y0e\r");
        assert_eq!(encode_set_begin_velocity(AxisId::Z, 100), b"Z0B100\r");
        assert_eq!(encode_set_end_velocity(AxisId::X, 6000), b"X0E6000\r");
        assert_eq!(encode_set_velocity(AxisId::Y, 100, 6000), b"Y0B100,Y0E6000\r");
    }

    #[test]
    fn test_all_axes_batch() {
        assert_eq!(
            encode_all_axes(|_| Operation::PowerMode),
            b"X0P3,128,17,0,Y0P3,128,17,0,Z0P3,128,17,0\r"
        );
        assert_eq!(encode_all_axes(|_| Operation::Stop), b"X0*,Y0*,Z0*\r");
        assert_eq!(encode_all_axes(|_| Operation::Home), b"X0N+0S,Y0N+0S,Z0N+0S\r");
        assert_eq!(encode_all_axes(|_| Operation::EighthStepMode), b"X0H3,Y0H3,Z0H3\r");
    }

    #[test]
    fn test_decode_position_sign() {
        assert_eq!(decode_position(b"X0m-32000\r", AxisId::X, CM_PER_STEP), Ok(10.0));
        assert_eq!(decode_position(b"Y0m3200\r", AxisId::Y, CM_PER_STEP), Ok(-1.0));
        assert_eq!(decode_position(b"Z0m16000\r", AxisId::Z, CM_PER_STEP), Ok(5.0));
    }

    #[test]
    fn test_decode_velocity() {
        assert_eq!(decode_velocity(b"X0e6000\r"), Ok(6000.0));
        assert_eq!(decode_velocity(b"Z0v-250\r"), Ok(-250.0));
    }

    #[test]
    fn test_decode_errors_are_not_zero() {
        assert!(matches!(
            decode_velocity(b""),
            Err(DecodeError::Truncated { len: 0, .. })
        ));
        assert!(matches!(
            decode_velocity(b"X0m"),
            Err(DecodeError::Truncated { len: 3, .. })
        ));
        // Header and trailer present but nothing between
        assert!(matches!(
            decode_velocity(b"X0m\r"),
            Err(DecodeError::NonNumeric { .. })
        ));
        assert!(matches!(
            decode_position(b"X0m?\r", AxisId::X, CM_PER_STEP),
            Err(DecodeError::NonNumeric { .. })
        ));
        assert!(matches!(
            decode_velocity(b"X0vNaN\r"),
            Err(DecodeError::NonNumeric { .. })
        ));
    }

    #[test]
    fn test_move_then_position_within_one_step() {
        // Feed the encoded move back as the controller would accumulate it
        for axis in AxisId::ALL {
            for tenth in -300..=800 {
                let target_cm = tenth as f64 * 0.1 + 0.000123;
                let steps = (target_cm * STEPS_PER_CM).trunc() as i64;
                let bytes = encode_relative_move(axis, steps);

                let text = std::str::from_utf8(&bytes).unwrap();
                let signed: i64 = text[5..text.len() - 1].parse().unwrap();
                let echo = format!("{}0m{}\r", axis, signed);

                let decoded = decode_position(echo.as_bytes(), axis, CM_PER_STEP).unwrap();
                assert!(
                    (decoded - target_cm).abs() <= CM_PER_STEP,
                    "{} axis: target {} decoded {}",
                    axis,
                    target_cm,
                    decoded
                );
            }
        }
    }
}
