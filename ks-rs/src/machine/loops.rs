//! The loop graph: every stitch ever formed, with its parent loops.

use super::needle::Needle;

pub type LoopId = u64;

/// A uniquely-identified yarn loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loop {
    pub id: LoopId,
    /// Loops this one was pulled through.
    pub parents: Vec<LoopId>,
    /// The needle currently holding the loop; `None` once released.
    pub needle: Option<Needle>,
}

/// Arena of loops indexed by id.  Ids are allocated sequentially from 0 and
/// never reused.
#[derive(Debug, Default)]
pub struct LoopGraph {
    loops: Vec<Loop>,
}

impl LoopGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, parents: Vec<LoopId>, needle: Needle) -> LoopId {
        let id = self.loops.len() as LoopId;
        self.loops.push(Loop {
            id,
            parents,
            needle: Some(needle),
        });
        id
    }

    pub fn get(&self, id: LoopId) -> Option<&Loop> {
        self.loops.get(id as usize)
    }

    pub(crate) fn set_needle(&mut self, id: LoopId, needle: Option<Needle>) {
        if let Some(l) = self.loops.get_mut(id as usize) {
            l.needle = needle;
        }
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Loop> {
        self.loops.iter()
    }

    /// Loops no longer held by any needle.
    pub fn released(&self) -> impl Iterator<Item = &Loop> {
        self.loops.iter().filter(|l| l.needle.is_none())
    }
}
