//! Yarn carriers, carrier sets, and travel directions.

use std::fmt;

use thiserror::Error;

use super::needle::Needle;
use crate::diag::{Diagnostic, ErrorKind};

// ── Direction ─────────────────────────────────────────────────────────────────

/// Carriage travel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Leftward,
    Rightward,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Leftward => Direction::Rightward,
            Direction::Rightward => Direction::Leftward,
        }
    }

    /// Knitout direction field: `-` for leftward, `+` for rightward.
    pub fn sign(self) -> char {
        match self {
            Direction::Leftward => '-',
            Direction::Rightward => '+',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Leftward => "Leftward",
            Direction::Rightward => "Rightward",
        }
    }

    /// Order needles in the sequence a pass in this direction meets them at
    /// `racking`.  Needles at the same position keep their relative order.
    pub fn sort(self, needles: &mut [Needle], racking: i64) {
        self.sort_by_needle(needles, racking, |n| *n);
    }

    /// [`Direction::sort`] for items that carry a needle.
    pub fn sort_by_needle<T>(self, items: &mut [T], racking: i64, needle: impl Fn(&T) -> Needle) {
        match self {
            Direction::Rightward => items.sort_by_key(|t| needle(t).slot(racking)),
            Direction::Leftward => items.sort_by_key(|t| std::cmp::Reverse(needle(t).slot(racking))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── CarrierSet ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CarrierSetError {
    #[error("a carrier set needs at least one carrier")]
    Empty,
    #[error("carrier ids start at 1, got {0}")]
    InvalidId(i64),
    #[error("carrier {0} appears more than once in the set")]
    Duplicate(u32),
}

impl From<CarrierSetError> for Diagnostic {
    fn from(e: CarrierSetError) -> Self {
        let kind = match e {
            CarrierSetError::Duplicate(_) => ErrorKind::YarnCollision,
            CarrierSetError::Empty | CarrierSetError::InvalidId(_) => ErrorKind::CarrierState,
        };
        Diagnostic::new(kind, e.to_string())
    }
}

/// A non-empty ordered sequence of distinct carrier ids operated as one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CarrierSet(Vec<u32>);

impl CarrierSet {
    pub fn new(ids: Vec<u32>) -> Result<Self, CarrierSetError> {
        if ids.is_empty() {
            return Err(CarrierSetError::Empty);
        }
        for (i, &id) in ids.iter().enumerate() {
            if id == 0 {
                return Err(CarrierSetError::InvalidId(0));
            }
            if ids[..i].contains(&id) {
                return Err(CarrierSetError::Duplicate(id));
            }
        }
        Ok(CarrierSet(ids))
    }

    /// Build from signed integers (as produced by the interpreter).
    pub fn from_ints(ids: &[i64]) -> Result<Self, CarrierSetError> {
        let ids = ids
            .iter()
            .map(|&i| u32::try_from(i).map_err(|_| CarrierSetError::InvalidId(i)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(ids)
    }

    pub fn single(id: u32) -> Result<Self, CarrierSetError> {
        Self::new(vec![id])
    }

    pub fn ids(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.0.contains(&id)
    }

    /// The carriers for which `keep` holds, in order; `None` if none do.
    pub fn filter(&self, mut keep: impl FnMut(u32) -> bool) -> Option<CarrierSet> {
        let ids: Vec<u32> = self.0.iter().copied().filter(|&id| keep(id)).collect();
        (!ids.is_empty()).then_some(CarrierSet(ids))
    }

    /// Same carriers, ignoring order.
    pub fn same_carriers(&self, other: &CarrierSet) -> bool {
        self.len() == other.len() && self.0.iter().all(|&id| other.contains(id))
    }

    /// Knit Script literal form: `c3` or `c{1,3,5}`.
    pub fn literal(&self) -> String {
        match self.0.as_slice() {
            [one] => format!("c{one}"),
            ids => {
                let inner: Vec<String> = ids.iter().map(u32::to_string).collect();
                format!("c{{{}}}", inner.join(","))
            }
        }
    }
}

/// Knitout form: space-separated ids.
impl fmt::Display for CarrierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

// ── Carrier ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CarrierState {
    #[default]
    Out,
    In,
}

/// Physical state of one yarn carrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Carrier {
    pub id: u32,
    pub state: CarrierState,
    /// Needle index the carrier last worked at; `None` while parked.
    pub position: Option<usize>,
    /// Direction of the last pass that used this carrier.
    pub direction: Option<Direction>,
    /// Held by the yarn-inserting hook.
    pub hooked: bool,
}

impl Carrier {
    pub fn new(id: u32) -> Self {
        Carrier {
            id,
            state: CarrierState::Out,
            position: None,
            direction: None,
            hooked: false,
        }
    }

    pub fn is_in(&self) -> bool {
        self.state == CarrierState::In
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
