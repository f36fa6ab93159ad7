//! Needle beds and needle addresses.

use std::fmt;

/// One of the two needle beds of a V-bed machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bed {
    Front,
    Back,
}

impl Bed {
    pub fn opposite(self) -> Bed {
        match self {
            Bed::Front => Bed::Back,
            Bed::Back => Bed::Front,
        }
    }

    /// The knitout / Knit Script prefix: `f` or `b`.
    pub fn prefix(self) -> char {
        match self {
            Bed::Front => 'f',
            Bed::Back => 'b',
        }
    }
}

/// An addressable needle.  Opaque value: two needles are equal iff bed and
/// index match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Needle {
    pub bed: Bed,
    pub index: usize,
}

impl Needle {
    pub fn new(bed: Bed, index: usize) -> Self {
        Needle { bed, index }
    }

    pub fn front(index: usize) -> Self {
        Needle::new(Bed::Front, index)
    }

    pub fn back(index: usize) -> Self {
        Needle::new(Bed::Back, index)
    }

    pub fn is_front(&self) -> bool {
        self.bed == Bed::Front
    }

    pub fn is_back(&self) -> bool {
        self.bed == Bed::Back
    }

    /// Position along the machine at `racking`, in front-bed needle units:
    /// back needle `j` sits opposite front needle `j - racking`.
    pub fn slot(&self, racking: i64) -> i128 {
        let index = self.index as i128;
        match self.bed {
            Bed::Front => index,
            Bed::Back => index - i128::from(racking),
        }
    }

    /// The needle at the same index on the other bed.
    pub fn opposite(&self) -> Needle {
        Needle::new(self.bed.opposite(), self.index)
    }

    /// Shift along the bed; `None` if the result would be negative.
    pub fn offset(&self, delta: i64) -> Option<Needle> {
        let index = i64::try_from(self.index).ok()?.checked_add(delta)?;
        let index = usize::try_from(index).ok()?;
        Some(Needle::new(self.bed, index))
    }
}

impl fmt::Display for Needle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.bed.prefix(), self.index)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
