//! Knitout instructions and the emitter.
//!
//! Output follows knitout version 2: header lines start with `;!` or `;;`,
//! then one instruction per line with space-separated fields.  Carrier sets
//! are rendered as space-separated ids; an empty carrier set omits the field
//! entirely.

use std::fmt;

use crate::config::MachineConfig;
use crate::machine::{CarrierSet, Direction, Needle};

/// Initial carrier parking position written to the header.
pub const HEADER_POSITION: &str = "Center";

/// One knitout instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    In(CarrierSet),
    InHook(CarrierSet),
    ReleaseHook(CarrierSet),
    Out(CarrierSet),
    OutHook(CarrierSet),
    Knit { direction: Direction, needle: Needle, carriers: CarrierSet },
    Tuck { direction: Direction, needle: Needle, carriers: CarrierSet },
    Miss { direction: Direction, needle: Needle, carriers: CarrierSet },
    Split {
        direction: Direction,
        from: Needle,
        to: Needle,
        carriers: Option<CarrierSet>,
    },
    Xfer { from: Needle, to: Needle },
    Drop(Needle),
    Rack(i64),
    Pause,
}

impl Instruction {
    /// The opcode, as written in the first field.
    pub fn opcode(&self) -> &'static str {
        match self {
            Instruction::In(_) => "in",
            Instruction::InHook(_) => "inhook",
            Instruction::ReleaseHook(_) => "releasehook",
            Instruction::Out(_) => "out",
            Instruction::OutHook(_) => "outhook",
            Instruction::Knit { .. } => "knit",
            Instruction::Tuck { .. } => "tuck",
            Instruction::Miss { .. } => "miss",
            Instruction::Split { .. } => "split",
            Instruction::Xfer { .. } => "xfer",
            Instruction::Drop(_) => "drop",
            Instruction::Rack(_) => "rack",
            Instruction::Pause => "pause",
        }
    }

    /// Carriers the instruction uses, if any.
    pub fn carriers(&self) -> Option<&CarrierSet> {
        match self {
            Instruction::In(cs)
            | Instruction::InHook(cs)
            | Instruction::ReleaseHook(cs)
            | Instruction::Out(cs)
            | Instruction::OutHook(cs) => Some(cs),
            Instruction::Knit { carriers, .. }
            | Instruction::Tuck { carriers, .. }
            | Instruction::Miss { carriers, .. } => Some(carriers),
            Instruction::Split { carriers, .. } => carriers.as_ref(),
            Instruction::Xfer { .. }
            | Instruction::Drop(_)
            | Instruction::Rack(_)
            | Instruction::Pause => None,
        }
    }

    /// Needles the instruction addresses.
    pub fn needles(&self) -> Vec<Needle> {
        match self {
            Instruction::Knit { needle, .. }
            | Instruction::Tuck { needle, .. }
            | Instruction::Miss { needle, .. }
            | Instruction::Drop(needle) => vec![*needle],
            Instruction::Split { from, to, .. } | Instruction::Xfer { from, to } => {
                vec![*from, *to]
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.opcode();
        match self {
            Instruction::In(cs)
            | Instruction::InHook(cs)
            | Instruction::ReleaseHook(cs)
            | Instruction::Out(cs)
            | Instruction::OutHook(cs) => write!(f, "{op} {cs}"),
            Instruction::Knit { direction, needle, carriers }
            | Instruction::Tuck { direction, needle, carriers }
            | Instruction::Miss { direction, needle, carriers } => {
                write!(f, "{op} {} {needle} {carriers}", direction.sign())
            }
            Instruction::Split { direction, from, to, carriers } => {
                write!(f, "{op} {} {from} {to}", direction.sign())?;
                if let Some(cs) = carriers {
                    write!(f, " {cs}")?;
                }
                Ok(())
            }
            Instruction::Xfer { from, to } => write!(f, "{op} {from} {to}"),
            Instruction::Drop(needle) => write!(f, "{op} {needle}"),
            Instruction::Rack(r) => write!(f, "{op} {r}"),
            Instruction::Pause => f.write_str(op),
        }
    }
}

// ── Emitter ───────────────────────────────────────────────────────────────────

/// Header lines for a run on `config`.
pub fn header(config: &MachineConfig) -> Vec<String> {
    let carriers: Vec<String> = (1..=config.carrier_count).map(|c| c.to_string()).collect();
    vec![
        ";!knitout-2".to_owned(),
        format!(";;Machine: {}", config.spec.name),
        format!(";;Gauge: {}", config.spec.gauge),
        format!(";;Carriers: {}", carriers.join(" ")),
        format!(";;Position: {HEADER_POSITION}"),
    ]
}

/// Serialize a full knitout program: header, then instructions in order.
/// Every line, including the last, ends with `\n`.
pub fn emit(config: &MachineConfig, instructions: &[Instruction]) -> String {
    let mut out = String::new();
    for line in header(config) {
        out.push_str(&line);
        out.push('\n');
    }
    for inst in instructions {
        out.push_str(&inst.to_string());
        out.push('\n');
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn c(ids: &[u32]) -> CarrierSet {
        CarrierSet::new(ids.to_vec()).unwrap()
    }

    #[test]
    fn instruction_formatting() {
        let knit = Instruction::Knit {
            direction: Direction::Leftward,
            needle: Needle::front(0),
            carriers: c(&[1]),
        };
        assert_eq!(knit.to_string(), "knit - f0 1");
        let tuck = Instruction::Tuck {
            direction: Direction::Rightward,
            needle: Needle::back(7),
            carriers: c(&[2, 3]),
        };
        assert_eq!(tuck.to_string(), "tuck + b7 2 3");
        assert_eq!(Instruction::In(c(&[1, 2])).to_string(), "in 1 2");
        assert_eq!(
            Instruction::Xfer { from: Needle::front(0), to: Needle::back(2) }.to_string(),
            "xfer f0 b2"
        );
        assert_eq!(Instruction::Rack(-3).to_string(), "rack -3");
        assert_eq!(Instruction::Drop(Needle::back(1)).to_string(), "drop b1");
        assert_eq!(Instruction::Pause.to_string(), "pause");
    }

    #[test]
    fn split_without_carriers_omits_field() {
        let s = Instruction::Split {
            direction: Direction::Rightward,
            from: Needle::front(4),
            to: Needle::back(4),
            carriers: None,
        };
        assert_eq!(s.to_string(), "split + f4 b4");
        let s = Instruction::Split {
            direction: Direction::Leftward,
            from: Needle::front(4),
            to: Needle::back(4),
            carriers: Some(c(&[5])),
        };
        assert_eq!(s.to_string(), "split - f4 b4 5");
    }

    #[test]
    fn header_only_for_empty_program() {
        let text = emit(&MachineConfig::default(), &[]);
        assert_eq!(
            text,
            ";!knitout-2\n;;Machine: SWG091N2\n;;Gauge: 15\n;;Carriers: 1 2 3 4 5 6 7 8 9 10\n;;Position: Center\n"
        );
    }

    #[test]
    fn carriers_accessor() {
        assert!(Instruction::Rack(1).carriers().is_none());
        assert_eq!(Instruction::Out(c(&[4])).carriers(), Some(&c(&[4])));
    }
}
