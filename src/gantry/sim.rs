// In-memory stand-in for the motion controller
//
// Understands the same command subset the controller is driven with and
// answers queries using the `<TAG>0<op><value>\r` framing. Relative moves
// complete instantly.

use tracing::warn;

use super::axis::AxisId;
use super::channel::ByteChannel;
use super::codec::TERMINATOR;

#[derive(Debug, Clone, Copy, Default)]
struct SimAxis {
    raw_steps: i64,
    begin_velocity: u32,
    end_velocity: u32,
    eighth_step: bool,
}

/// Simulated controller behind a byte channel
#[derive(Debug, Default)]
pub struct SimulatedController {
    axes: [SimAxis; 3],
    output: Vec<u8>,
    writes: Vec<Vec<u8>>,
}

impl SimulatedController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position counter as the firmware reports it (wiring sign included)
    pub fn raw_position(&self, axis: AxisId) -> i64 {
        self.axes[axis.index()].raw_steps
    }

    /// Displace an axis behind the controller's back, e.g. by hand
    pub fn set_raw_position(&mut self, axis: AxisId, steps: i64) {
        self.axes[axis.index()].raw_steps = steps;
    }

    pub fn end_velocity(&self, axis: AxisId) -> u32 {
        self.axes[axis.index()].end_velocity
    }

    pub fn begin_velocity(&self, axis: AxisId) -> u32 {
        self.axes[axis.index()].begin_velocity
    }

    pub fn eighth_step(&self, axis: AxisId) -> bool {
        self.axes[axis.index()].eighth_step
    }

    /// Every write received so far, in order
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Queue bytes as if left over from an earlier exchange
    pub fn inject_response(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn execute(&mut self, fragment: &str) {
        let bytes = fragment.as_bytes();
        let axis = match (bytes.first().copied().and_then(AxisId::from_tag), bytes.get(1)) {
            (Some(axis), Some(b'0')) => axis,
            _ => {
                warn!("Simulator: unknown command {:?}", fragment);
                self.reply("?");
                return;
            }
        };

        let body = &fragment[2..];
        let state = &mut self.axes[axis.index()];

        let answer = match body.chars().next() {
            Some('m') => Some(state.raw_steps.to_string()),
            Some('v') => Some("0".to_string()),
            Some('b') => Some(state.begin_velocity.to_string()),
            Some('e') => Some(state.end_velocity.to_string()),
            Some('R') if body.starts_with("RNY") => {
                if let Ok(steps) = body[3..].parse::<i64>() {
                    state.raw_steps = state.raw_steps.saturating_add(steps);
                }
                None
            }
            Some('N') => {
                state.raw_steps = 0;
                None
            }
            Some('B') => {
                if let Ok(v) = body[1..].parse() {
                    state.begin_velocity = v;
                }
                None
            }
            Some('E') => {
                if let Ok(v) = body[1..].parse() {
                    state.end_velocity = v;
                }
                None
            }
            Some('H') => {
                state.eighth_step = body == "H3";
                None
            }
            _ => None,
        };

        match answer {
            Some(value) => {
                let reply = format!("{}{}", &fragment[..3], value);
                self.reply(&reply);
            }
            None => self.reply(fragment),
        }
    }

    fn reply(&mut self, text: &str) {
        self.output.extend_from_slice(text.as_bytes());
        self.output.push(TERMINATOR);
    }
}

impl ByteChannel for SimulatedController {
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.writes.push(bytes.to_vec());

        let text = String::from_utf8_lossy(bytes).into_owned();
        let line = text.trim_end_matches(TERMINATOR as char);

        // Power mode carries commas inside its own argument list
        let mut fragments: Vec<String> = Vec::new();
        for part in line.split(',') {
            let starts_command = part.len() >= 2
                && AxisId::from_tag(part.as_bytes()[0]).is_some()
                && part.as_bytes()[1] == b'0';
            if !starts_command {
                if let Some(last) = fragments.last_mut() {
                    last.push(',');
                    last.push_str(part);
                    continue;
                }
            }
            fragments.push(part.to_string());
        }

        for fragment in fragments {
            self.execute(&fragment);
        }
        Ok(())
    }

    fn drain(&mut self) -> std::io::Result<Vec<u8>> {
        Ok(std::mem::take(&mut self.output))
    }
}
