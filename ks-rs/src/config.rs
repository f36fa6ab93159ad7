//! Machine configuration.
//!
//! The interpreter targets one machine type per run.  Supported types live
//! in a fixed registry:
//!
//! | Type | Needles per bed | Carriers | Max racking | Gauge |
//! |------|-----------------|----------|-------------|-------|
//! | `SWG091N2` | 540 | 10 | 4 | 15 |
//! | `SWG061N2` | 360 | 10 | 4 | 15 |
//! | `Kniterate` | 252 | 6 | 4 | 7 |
//!
//! A run may use fewer carriers than the machine has, never more.

use thiserror::Error;

use crate::diag::{Diagnostic, ErrorKind};

pub const DEFAULT_MACHINE_TYPE: &str = "SWG091N2";
pub const DEFAULT_CARRIER_COUNT: u32 = 10;

// ── Registry ──────────────────────────────────────────────────────────────────

/// Physical parameters of a supported machine type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSpec {
    pub name: &'static str,
    pub bed_width: usize,
    pub max_carriers: u32,
    pub max_rack: i64,
    pub gauge: u32,
}

pub static MACHINE_TYPES: &[MachineSpec] = &[
    MachineSpec { name: "SWG091N2",  bed_width: 540, max_carriers: 10, max_rack: 4, gauge: 15 },
    MachineSpec { name: "SWG061N2",  bed_width: 360, max_carriers: 10, max_rack: 4, gauge: 15 },
    MachineSpec { name: "Kniterate", bed_width: 252, max_carriers: 6,  max_rack: 4, gauge: 7 },
];

/// Look up a machine type by its identifier (case-sensitive).
pub fn lookup_machine(name: &str) -> Option<&'static MachineSpec> {
    MACHINE_TYPES.iter().find(|m| m.name == name)
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown machine type `{0}`")]
    UnknownMachine(String),

    #[error("machine `{machine}` supports 1 to {max} carriers, got {got}")]
    InvalidCarrierCount {
        machine: &'static str,
        max: u32,
        got: u32,
    },
}

impl From<ConfigError> for Diagnostic {
    fn from(e: ConfigError) -> Self {
        Diagnostic::new(ErrorKind::Config, e.to_string())
    }
}

// ── MachineConfig ─────────────────────────────────────────────────────────────

/// A validated machine type plus the number of carriers in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    pub spec: &'static MachineSpec,
    pub carrier_count: u32,
}

impl MachineConfig {
    pub fn new(machine_type: &str, carrier_count: u32) -> Result<Self, ConfigError> {
        let spec = lookup_machine(machine_type)
            .ok_or_else(|| ConfigError::UnknownMachine(machine_type.to_owned()))?;
        if carrier_count == 0 || carrier_count > spec.max_carriers {
            return Err(ConfigError::InvalidCarrierCount {
                machine: spec.name,
                max: spec.max_carriers,
                got: carrier_count,
            });
        }
        Ok(MachineConfig { spec, carrier_count })
    }

    pub fn bed_width(&self) -> usize {
        self.spec.bed_width
    }

    pub fn max_rack(&self) -> i64 {
        self.spec.max_rack
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            spec: &MACHINE_TYPES[0],
            carrier_count: DEFAULT_CARRIER_COUNT,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
