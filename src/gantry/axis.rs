// Axis identifiers and the per-axis wiring table

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction the controller must be told to turn for a non-negative logical move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wiring {
    /// Positive logical motion is sent as `-` and positions read back negated
    Inverted,
    /// Positive logical motion is sent as `+`
    Direct,
}

/// Fixed per-axis protocol constants
#[derive(Debug, Clone, Copy)]
pub struct AxisEntry {
    pub tag: u8,
    pub wiring: Wiring,
}

// X and Y motors are mounted mirrored relative to Z
const AXIS_TABLE: [AxisEntry; 3] = [
    AxisEntry {
        tag: b'X',
        wiring: Wiring::Inverted,
    },
    AxisEntry {
        tag: b'Y',
        wiring: Wiring::Inverted,
    },
    AxisEntry {
        tag: b'Z',
        wiring: Wiring::Direct,
    },
];

/// One of the three linear degrees of freedom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisId {
    X,
    Y,
    Z,
}

impl AxisId {
    pub const ALL: [AxisId; 3] = [AxisId::X, AxisId::Y, AxisId::Z];

    pub fn index(self) -> usize {
        match self {
            AxisId::X => 0,
            AxisId::Y => 1,
            AxisId::Z => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|axis| axis.tag() == tag)
    }

    fn entry(self) -> &'static AxisEntry {
        &AXIS_TABLE[self.index()]
    }

    /// Single-letter protocol tag
    pub fn tag(self) -> u8 {
        self.entry().tag
    }

    pub fn wiring(self) -> Wiring {
        self.entry().wiring
    }
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag() as char)
    }
}
