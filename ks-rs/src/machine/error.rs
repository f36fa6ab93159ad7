use thiserror::Error;

use super::carrier::CarrierSet;
use super::needle::Needle;
use crate::diag::{Diagnostic, ErrorKind};

/// A physical-feasibility violation raised by a machine primitive.
///
/// A primitive that fails leaves the machine state and the instruction
/// stream untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("needle {needle} is outside the bed (valid indices are 0 to {})", .bed_width - 1)]
    NeedleOutOfBounds { needle: Needle, bed_width: usize },

    #[error("needle index {0} is negative")]
    NegativeNeedle(i64),

    #[error("carrier {carrier} does not exist (this run uses carriers 1 to {carrier_count})")]
    NoSuchCarrier { carrier: u32, carrier_count: u32 },

    #[error("`{operation}` uses carrier {carrier}, which is not in")]
    CarrierNotIn { carrier: u32, operation: &'static str },

    #[error("carrier {0} is already in")]
    CarrierAlreadyIn(u32),

    #[error("carrier {0} is still held by the yarn-inserting hook; release it first")]
    CarrierHooked(u32),

    #[error("`{operation}` needs a working carrier; set one with `with Carrier as …`")]
    NoWorkingCarrier { operation: &'static str },

    #[error("the yarn-inserting hook does not hold carriers {0}")]
    HookNotHeld(String),

    #[error("racking {racking} exceeds the machine maximum of ±{max}")]
    RackOutOfRange { racking: i64, max: i64 },

    #[error("cannot {operation} from {from} to {to}: needles must be on opposite beds")]
    SameBed { operation: &'static str, from: Needle, to: Needle },

    #[error("cannot {operation} from {from} to {to} at racking {racking}: {from} is aligned with {aligned}")]
    Misaligned {
        operation: &'static str,
        from: Needle,
        to: Needle,
        racking: i64,
        aligned: String,
    },

    #[error("the yarn-inserting hook already holds carriers {held}; cannot hook {requested}")]
    HookOccupied { held: String, requested: String },

    #[error("carrier {carrier} cannot reach {needle}: carrier {other} is parked at needle {parked} in its path")]
    CarrierCrossing { carrier: u32, other: u32, parked: usize, needle: Needle },
}

impl MachineError {
    pub fn kind(&self) -> ErrorKind {
        use MachineError::*;
        match self {
            NeedleOutOfBounds { .. } | NegativeNeedle(_) => ErrorKind::NeedleBounds,
            NoSuchCarrier { .. }
            | CarrierNotIn { .. }
            | CarrierAlreadyIn(_)
            | CarrierHooked(_)
            | NoWorkingCarrier { .. }
            | HookNotHeld(_) => ErrorKind::CarrierState,
            RackOutOfRange { .. } | SameBed { .. } | Misaligned { .. } => ErrorKind::Rack,
            HookOccupied { .. } | CarrierCrossing { .. } => ErrorKind::YarnCollision,
        }
    }

    pub(crate) fn hook_occupied(held: &CarrierSet, requested: &CarrierSet) -> Self {
        MachineError::HookOccupied {
            held: held.literal(),
            requested: requested.literal(),
        }
    }
}

impl From<MachineError> for Diagnostic {
    fn from(e: MachineError) -> Self {
        Diagnostic::new(e.kind(), e.to_string())
    }
}
