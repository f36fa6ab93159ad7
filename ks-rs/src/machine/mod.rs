//! The knitting machine model.
//!
//! [`Machine`] is the authoritative state of the target machine: loops held
//! on each needle, racking, carrier state and the yarn-inserting hook.
//! Every primitive follows the same three steps:
//!
//! 1. validate preconditions, returning a [`MachineError`] on violation;
//! 2. mutate the state;
//! 3. append exactly one knitout [`Instruction`] (or none, for coalesced
//!    no-ops such as re-racking to the current racking).
//!
//! Validation completes before any mutation, so a failed primitive leaves
//! the machine exactly as it was.
//!
//! # Racking
//!
//! At racking `R`, front needle `i` is aligned with back needle `i + R`.

pub mod carrier;
pub mod error;
pub mod loops;
pub mod needle;

use std::collections::HashSet;

use tracing::trace;

pub use carrier::{Carrier, CarrierSet, CarrierSetError, CarrierState, Direction};
pub use error::MachineError;
pub use loops::{Loop, LoopGraph, LoopId};
pub use needle::{Bed, Needle};

use crate::config::MachineConfig;
use crate::knitout::{self, Instruction};

type Result<T> = std::result::Result<T, MachineError>;

/// Simulated machine state for one interpretation.
#[derive(Debug)]
pub struct Machine {
    config: MachineConfig,
    front: Vec<Vec<LoopId>>,
    back: Vec<Vec<LoopId>>,
    racking: i64,
    carriers: Vec<Carrier>,
    hook: Option<CarrierSet>,
    loops: LoopGraph,
    instructions: Vec<Instruction>,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        let width = config.bed_width();
        let carriers = (1..=config.carrier_count).map(Carrier::new).collect();
        Machine {
            config,
            front: vec![Vec::new(); width],
            back: vec![Vec::new(); width],
            racking: 0,
            carriers,
            hook: None,
            loops: LoopGraph::new(),
            instructions: Vec::new(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn racking(&self) -> i64 {
        self.racking
    }

    pub fn carrier(&self, id: u32) -> Option<&Carrier> {
        self.carriers.get((id as usize).checked_sub(1)?)
    }

    pub fn carriers(&self) -> &[Carrier] {
        &self.carriers
    }

    /// The carrier set currently held by the yarn-inserting hook.
    pub fn hook(&self) -> Option<&CarrierSet> {
        self.hook.as_ref()
    }

    /// Loops on `needle`, bottom of the stack first.  Empty for needles
    /// outside the bed.
    pub fn loops_on(&self, needle: Needle) -> &[LoopId] {
        let bed = match needle.bed {
            Bed::Front => &self.front,
            Bed::Back => &self.back,
        };
        bed.get(needle.index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn loop_graph(&self) -> &LoopGraph {
        &self.loops
    }

    /// Needles currently holding at least one loop, front bed first, each
    /// bed in ascending index order.  `bed` restricts to one bed.
    pub fn needles_with_loops(&self, bed: Option<Bed>) -> Vec<Needle> {
        let mut out = Vec::new();
        for (b, stacks) in [(Bed::Front, &self.front), (Bed::Back, &self.back)] {
            if bed.is_some_and(|want| want != b) {
                continue;
            }
            out.extend(
                stacks
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| !s.is_empty())
                    .map(|(i, _)| Needle::new(b, i)),
            );
        }
        out
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The needle aligned with `needle` on the opposite bed at the current
    /// racking, if it exists.
    pub fn aligned_needle(&self, needle: Needle) -> Option<Needle> {
        let delta = match needle.bed {
            Bed::Front => self.racking,
            Bed::Back => -self.racking,
        };
        needle.opposite().offset(delta)
    }

    /// Full knitout text: header followed by every emitted instruction.
    pub fn knitout(&self) -> String {
        knitout::emit(&self.config, &self.instructions)
    }

    // ── Validation helpers ────────────────────────────────────────────────────

    fn check_needle(&self, needle: Needle) -> Result<()> {
        if needle.index >= self.config.bed_width() {
            return Err(MachineError::NeedleOutOfBounds {
                needle,
                bed_width: self.config.bed_width(),
            });
        }
        Ok(())
    }

    fn check_exists(&self, cs: &CarrierSet) -> Result<()> {
        for &id in cs.ids() {
            if self.carrier(id).is_none() {
                return Err(MachineError::NoSuchCarrier {
                    carrier: id,
                    carrier_count: self.config.carrier_count,
                });
            }
        }
        Ok(())
    }

    fn check_in(&self, cs: &CarrierSet, operation: &'static str) -> Result<()> {
        self.check_exists(cs)?;
        for &id in cs.ids() {
            if !self.carriers[id as usize - 1].is_in() {
                return Err(MachineError::CarrierNotIn { carrier: id, operation });
            }
        }
        Ok(())
    }

    /// A carrier of `cs` travelling from its last needle to `needle` must not
    /// pass another carrier that is in and parked strictly between the two.
    /// Carriers sharing a column are unordered and may leave it either way.
    fn check_path(&self, cs: &CarrierSet, needle: Needle) -> Result<()> {
        let target = needle.index;
        for &id in cs.ids() {
            let Some(start) = self.carriers[id as usize - 1].position else { continue };
            let (lo, hi) = (start.min(target), start.max(target));
            let blocker = self
                .carriers
                .iter()
                .filter(|other| other.is_in() && !cs.contains(other.id))
                .find_map(|other| other.position.filter(|&p| lo < p && p < hi).map(|p| (other.id, p)));
            if let Some((other, parked)) = blocker {
                return Err(MachineError::CarrierCrossing { carrier: id, other, parked, needle });
            }
        }
        Ok(())
    }

    fn check_transfer(&self, operation: &'static str, from: Needle, to: Needle) -> Result<()> {
        self.check_needle(from)?;
        self.check_needle(to)?;
        if from.bed == to.bed {
            return Err(MachineError::SameBed { operation, from, to });
        }
        if self.aligned_needle(from) != Some(to) {
            let aligned = self
                .aligned_needle(from)
                .map(|n| n.to_string())
                .unwrap_or_else(|| "no needle".to_owned());
            return Err(MachineError::Misaligned {
                operation,
                from,
                to,
                racking: self.racking,
                aligned,
            });
        }
        Ok(())
    }

    // ── State helpers ─────────────────────────────────────────────────────────

    fn stack_mut(&mut self, needle: Needle) -> &mut Vec<LoopId> {
        match needle.bed {
            Bed::Front => &mut self.front[needle.index],
            Bed::Back => &mut self.back[needle.index],
        }
    }

    fn move_carriers(&mut self, cs: &CarrierSet, direction: Direction, needle: Needle) {
        for &id in cs.ids() {
            let c = &mut self.carriers[id as usize - 1];
            c.position = Some(needle.index);
            c.direction = Some(direction);
        }
    }

    fn emit(&mut self, inst: Instruction) {
        trace!(instruction = %inst, "emit");
        self.instructions.push(inst);
    }

    // ── Needle primitives ─────────────────────────────────────────────────────

    /// Pull a new loop through the loops on `needle`, which are knitted off.
    pub fn knit(&mut self, direction: Direction, needle: Needle, cs: &CarrierSet) -> Result<()> {
        self.check_needle(needle)?;
        self.check_in(cs, "knit")?;
        self.check_path(cs, needle)?;
        let parents = std::mem::take(self.stack_mut(needle));
        for &id in &parents {
            self.loops.set_needle(id, None);
        }
        let new = self.loops.create(parents, needle);
        self.stack_mut(needle).push(new);
        self.move_carriers(cs, direction, needle);
        self.emit(Instruction::Knit { direction, needle, carriers: cs.clone() });
        Ok(())
    }

    /// Add a new loop on top of whatever `needle` holds.
    pub fn tuck(&mut self, direction: Direction, needle: Needle, cs: &CarrierSet) -> Result<()> {
        self.check_needle(needle)?;
        self.check_in(cs, "tuck")?;
        self.check_path(cs, needle)?;
        let new = self.loops.create(Vec::new(), needle);
        self.stack_mut(needle).push(new);
        self.move_carriers(cs, direction, needle);
        self.emit(Instruction::Tuck { direction, needle, carriers: cs.clone() });
        Ok(())
    }

    /// Move carriers to `needle`'s column without forming a loop.
    pub fn miss(&mut self, direction: Direction, needle: Needle, cs: &CarrierSet) -> Result<()> {
        self.check_needle(needle)?;
        self.check_in(cs, "miss")?;
        self.check_path(cs, needle)?;
        self.move_carriers(cs, direction, needle);
        self.emit(Instruction::Miss { direction, needle, carriers: cs.clone() });
        Ok(())
    }

    /// Transfer the loops on `from` to `to` and, when carriers are given,
    /// knit a new loop on `from` through them.
    pub fn split(
        &mut self,
        direction: Direction,
        from: Needle,
        to: Needle,
        cs: Option<&CarrierSet>,
    ) -> Result<()> {
        self.check_transfer("split", from, to)?;
        if let Some(cs) = cs {
            self.check_in(cs, "split")?;
            self.check_path(cs, from)?;
        }
        let moved = std::mem::take(self.stack_mut(from));
        for &id in &moved {
            self.loops.set_needle(id, Some(to));
        }
        self.stack_mut(to).extend(moved.iter().copied());
        if let Some(cs) = cs {
            let new = self.loops.create(moved, from);
            self.stack_mut(from).push(new);
            self.move_carriers(cs, direction, from);
        }
        self.emit(Instruction::Split {
            direction,
            from,
            to,
            carriers: cs.cloned(),
        });
        Ok(())
    }

    /// Move every loop on `from` to the aligned needle `to` on the other bed.
    pub fn xfer(&mut self, from: Needle, to: Needle) -> Result<()> {
        self.check_transfer("xfer", from, to)?;
        let moved = std::mem::take(self.stack_mut(from));
        for &id in &moved {
            self.loops.set_needle(id, Some(to));
        }
        self.stack_mut(to).extend(moved);
        self.emit(Instruction::Xfer { from, to });
        Ok(())
    }

    /// Release every loop on `needle`.
    pub fn drop(&mut self, needle: Needle) -> Result<()> {
        self.check_needle(needle)?;
        for id in std::mem::take(self.stack_mut(needle)) {
            self.loops.set_needle(id, None);
        }
        self.emit(Instruction::Drop(needle));
        Ok(())
    }

    /// Set the racking.  Racking to the current value emits nothing.
    pub fn rack(&mut self, racking: i64) -> Result<()> {
        let max = self.config.max_rack();
        if racking.abs() > max {
            return Err(MachineError::RackOutOfRange { racking, max });
        }
        if racking == self.racking {
            return Ok(());
        }
        self.racking = racking;
        self.emit(Instruction::Rack(racking));
        Ok(())
    }

    pub fn pause(&mut self) {
        self.emit(Instruction::Pause);
    }

    // ── Carrier primitives ────────────────────────────────────────────────────

    /// Bring carriers in.  Carriers already in are left alone; only the ones
    /// that change state are emitted, and nothing is emitted if none do.
    pub fn carrier_in(&mut self, cs: &CarrierSet) -> Result<()> {
        self.check_exists(cs)?;
        let Some(changed) = cs.filter(|id| !self.carriers[id as usize - 1].is_in()) else {
            return Ok(());
        };
        for &id in changed.ids() {
            self.carriers[id as usize - 1].state = CarrierState::In;
        }
        self.emit(Instruction::In(changed));
        Ok(())
    }

    /// Bring carriers in on the yarn-inserting hook.
    pub fn inhook(&mut self, cs: &CarrierSet) -> Result<()> {
        self.check_exists(cs)?;
        if let Some(held) = &self.hook {
            return Err(MachineError::hook_occupied(held, cs));
        }
        if let Some(&id) = cs.ids().iter().find(|&&id| self.carriers[id as usize - 1].is_in()) {
            return Err(MachineError::CarrierAlreadyIn(id));
        }
        for &id in cs.ids() {
            let c = &mut self.carriers[id as usize - 1];
            c.state = CarrierState::In;
            c.hooked = true;
        }
        self.hook = Some(cs.clone());
        self.emit(Instruction::InHook(cs.clone()));
        Ok(())
    }

    /// Release the yarn-inserting hook, which must hold exactly `cs`.
    pub fn releasehook(&mut self, cs: &CarrierSet) -> Result<()> {
        self.check_exists(cs)?;
        match &self.hook {
            Some(held) if held.same_carriers(cs) => {}
            _ => return Err(MachineError::HookNotHeld(cs.literal())),
        }
        for &id in cs.ids() {
            self.carriers[id as usize - 1].hooked = false;
        }
        self.hook = None;
        self.emit(Instruction::ReleaseHook(cs.clone()));
        Ok(())
    }

    /// Take carriers out.  Every carrier must be in and off the hook.
    pub fn carrier_out(&mut self, cs: &CarrierSet) -> Result<()> {
        self.check_in(cs, "out")?;
        if let Some(&id) = cs.ids().iter().find(|&&id| self.carriers[id as usize - 1].hooked) {
            return Err(MachineError::CarrierHooked(id));
        }
        self.park(cs);
        self.emit(Instruction::Out(cs.clone()));
        Ok(())
    }

    /// Take carriers out with the yarn-inserting hook, which must be free.
    pub fn outhook(&mut self, cs: &CarrierSet) -> Result<()> {
        self.check_in(cs, "outhook")?;
        if let Some(held) = &self.hook {
            return Err(MachineError::hook_occupied(held, cs));
        }
        self.park(cs);
        self.emit(Instruction::OutHook(cs.clone()));
        Ok(())
    }

    fn park(&mut self, cs: &CarrierSet) {
        for &id in cs.ids() {
            let c = &mut self.carriers[id as usize - 1];
            c.state = CarrierState::Out;
            c.position = None;
            c.direction = None;
        }
    }

    // ── Invariants ────────────────────────────────────────────────────────────

    /// Verify the state invariants that must hold between instructions.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if self.racking.abs() > self.config.max_rack() {
            return Err(format!("racking {} out of range", self.racking));
        }
        let mut seen: HashSet<LoopId> = HashSet::new();
        for (bed, stacks) in [(Bed::Front, &self.front), (Bed::Back, &self.back)] {
            for (i, stack) in stacks.iter().enumerate() {
                let needle = Needle::new(bed, i);
                for &id in stack {
                    if !seen.insert(id) {
                        return Err(format!("loop {id} is held by more than one needle"));
                    }
                    match self.loops.get(id) {
                        Some(l) if l.needle == Some(needle) => {}
                        _ => return Err(format!("loop {id} on {needle} disagrees with the loop graph")),
                    }
                }
            }
        }
        if let Some(l) = self.loops.iter().find(|l| l.needle.is_some() && !seen.contains(&l.id)) {
            return Err(format!("loop {} claims a needle that does not hold it", l.id));
        }
        for c in &self.carriers {
            if c.hooked && !c.is_in() {
                return Err(format!("carrier {} is hooked while out", c.id));
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::ErrorKind;

    fn machine() -> Machine {
        Machine::new(MachineConfig::default())
    }

    fn c(ids: &[u32]) -> CarrierSet {
        CarrierSet::new(ids.to_vec()).unwrap()
    }

    fn lines(m: &Machine) -> Vec<String> {
        m.instructions().iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn knit_replaces_loops_and_records_parents() {
        let mut m = machine();
        m.carrier_in(&c(&[1])).unwrap();
        m.tuck(Direction::Rightward, Needle::front(0), &c(&[1])).unwrap();
        m.tuck(Direction::Rightward, Needle::front(0), &c(&[1])).unwrap();
        m.knit(Direction::Leftward, Needle::front(0), &c(&[1])).unwrap();
        let on = m.loops_on(Needle::front(0));
        assert_eq!(on, &[2]);
        assert_eq!(m.loop_graph().get(2).unwrap().parents, vec![0, 1]);
        assert_eq!(m.loop_graph().released().count(), 2);
        assert_eq!(m.carrier(1).unwrap().position, Some(0));
        assert_eq!(m.carrier(1).unwrap().direction, Some(Direction::Leftward));
        m.check_invariants().unwrap();
    }

    #[test]
    fn knit_requires_carrier_in() {
        let mut m = machine();
        let e = m.knit(Direction::Leftward, Needle::front(0), &c(&[1])).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::CarrierState);
        assert!(m.instructions().is_empty());
        assert!(m.loop_graph().is_empty());
    }

    #[test]
    fn needle_bounds() {
        let mut m = machine();
        m.carrier_in(&c(&[1])).unwrap();
        let e = m.knit(Direction::Leftward, Needle::front(540), &c(&[1])).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::NeedleBounds);
        assert!(m.knit(Direction::Leftward, Needle::front(539), &c(&[1])).is_ok());
    }

    #[test]
    fn unknown_carrier_is_carrier_state_error() {
        let mut m = machine();
        let e = m.carrier_in(&c(&[11])).unwrap_err();
        assert_eq!(e, MachineError::NoSuchCarrier { carrier: 11, carrier_count: 10 });
        assert_eq!(e.kind(), ErrorKind::CarrierState);
    }

    #[test]
    fn xfer_follows_racking() {
        let mut m = machine();
        m.carrier_in(&c(&[1])).unwrap();
        m.tuck(Direction::Leftward, Needle::front(0), &c(&[1])).unwrap();
        m.rack(2).unwrap();
        m.xfer(Needle::front(0), Needle::back(2)).unwrap();
        assert!(m.loops_on(Needle::front(0)).is_empty());
        assert_eq!(m.loops_on(Needle::back(2)), &[0]);
        // Back to front uses the negated offset.
        m.xfer(Needle::back(2), Needle::front(0)).unwrap();
        assert_eq!(m.loops_on(Needle::front(0)), &[0]);
        m.check_invariants().unwrap();
    }

    #[test]
    fn misaligned_xfer_is_rack_error_without_emission() {
        let mut m = machine();
        m.rack(1).unwrap();
        let before = m.instructions().len();
        let e = m.xfer(Needle::front(0), Needle::back(0)).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Rack);
        assert_eq!(m.instructions().len(), before);
        let e = m.xfer(Needle::front(0), Needle::front(1)).unwrap_err();
        assert!(matches!(e, MachineError::SameBed { .. }));
    }

    #[test]
    fn rack_limits_and_coalescing() {
        let mut m = machine();
        assert_eq!(m.rack(5).unwrap_err().kind(), ErrorKind::Rack);
        m.rack(-4).unwrap();
        m.rack(-4).unwrap();
        m.rack(0).unwrap();
        assert_eq!(lines(&m), vec!["rack -4", "rack 0"]);
    }

    #[test]
    fn carrier_in_emits_only_changes() {
        let mut m = machine();
        m.carrier_in(&c(&[1])).unwrap();
        m.carrier_in(&c(&[1])).unwrap();
        m.carrier_in(&c(&[1, 2])).unwrap();
        assert_eq!(lines(&m), vec!["in 1", "in 2"]);
    }

    #[test]
    fn out_requires_in() {
        let mut m = machine();
        assert_eq!(m.carrier_out(&c(&[3])).unwrap_err().kind(), ErrorKind::CarrierState);
        m.carrier_in(&c(&[3])).unwrap();
        m.carrier_out(&c(&[3])).unwrap();
        assert!(!m.carrier(3).unwrap().is_in());
        assert_eq!(m.carrier(3).unwrap().position, None);
    }

    #[test]
    fn hook_lifecycle() {
        let mut m = machine();
        m.inhook(&c(&[1])).unwrap();
        assert_eq!(m.hook(), Some(&c(&[1])));
        let e = m.inhook(&c(&[2])).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::YarnCollision);
        assert_eq!(m.carrier_out(&c(&[1])).unwrap_err(), MachineError::CarrierHooked(1));
        assert_eq!(m.releasehook(&c(&[2])).unwrap_err().kind(), ErrorKind::CarrierState);
        m.releasehook(&c(&[1])).unwrap();
        m.outhook(&c(&[1])).unwrap();
        assert_eq!(lines(&m), vec!["inhook 1", "releasehook 1", "outhook 1"]);
        m.check_invariants().unwrap();
    }

    #[test]
    fn carrier_cannot_pass_a_parked_carrier() {
        let mut m = machine();
        m.carrier_in(&c(&[1, 2])).unwrap();
        m.knit(Direction::Rightward, Needle::front(5), &c(&[2])).unwrap();
        m.knit(Direction::Rightward, Needle::front(0), &c(&[1])).unwrap();
        let before = m.instructions().len();
        let e = m.knit(Direction::Rightward, Needle::front(9), &c(&[1])).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::YarnCollision);
        assert_eq!(
            e,
            MachineError::CarrierCrossing { carrier: 1, other: 2, parked: 5, needle: Needle::front(9) }
        );
        assert_eq!(m.instructions().len(), before);
        assert_eq!(m.carrier(1).unwrap().position, Some(0));

        m.miss(Direction::Rightward, Needle::front(12), &c(&[2])).unwrap();
        let e = m.knit(Direction::Leftward, Needle::back(14), &c(&[1])).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::YarnCollision);
        m.tuck(Direction::Leftward, Needle::back(1), &c(&[2])).unwrap();
    }

    #[test]
    fn carriers_may_share_a_column_and_turn_back() {
        let mut m = machine();
        m.carrier_in(&c(&[1, 2])).unwrap();
        for i in 0..4 {
            m.knit(Direction::Rightward, Needle::front(i), &c(&[1])).unwrap();
        }
        for i in 0..4 {
            m.knit(Direction::Rightward, Needle::front(i), &c(&[2])).unwrap();
        }
        for i in (0..4).rev() {
            m.knit(Direction::Leftward, Needle::front(i), &c(&[1])).unwrap();
        }
        // Moving together never counts as crossing.
        m.tuck(Direction::Rightward, Needle::front(8), &c(&[1, 2])).unwrap();
        m.check_invariants().unwrap();
    }

    #[test]
    fn split_moves_loops_and_knits() {
        let mut m = machine();
        m.carrier_in(&c(&[2])).unwrap();
        m.tuck(Direction::Rightward, Needle::front(3), &c(&[2])).unwrap();
        m.split(Direction::Rightward, Needle::front(3), Needle::back(3), Some(&c(&[2])))
            .unwrap();
        assert_eq!(m.loops_on(Needle::back(3)), &[0]);
        assert_eq!(m.loops_on(Needle::front(3)), &[1]);
        assert_eq!(m.loop_graph().get(1).unwrap().parents, vec![0]);
        m.split(Direction::Leftward, Needle::front(3), Needle::back(3), None).unwrap();
        assert_eq!(m.loops_on(Needle::back(3)), &[0, 1]);
        assert_eq!(lines(&m).last().unwrap(), "split - f3 b3");
        m.check_invariants().unwrap();
    }

    #[test]
    fn drop_releases_loops() {
        let mut m = machine();
        m.carrier_in(&c(&[1])).unwrap();
        m.tuck(Direction::Rightward, Needle::back(9), &c(&[1])).unwrap();
        m.drop(Needle::back(9)).unwrap();
        assert!(m.loops_on(Needle::back(9)).is_empty());
        assert!(m.needles_with_loops(None).is_empty());
        assert_eq!(lines(&m).last().unwrap(), "drop b9");
    }

    #[test]
    fn needles_with_loops_orders_front_first() {
        let mut m = machine();
        m.carrier_in(&c(&[1])).unwrap();
        for n in [Needle::back(1), Needle::front(4), Needle::front(2)] {
            m.tuck(Direction::Leftward, n, &c(&[1])).unwrap();
        }
        assert_eq!(
            m.needles_with_loops(None),
            vec![Needle::front(2), Needle::front(4), Needle::back(1)]
        );
        assert_eq!(m.needles_with_loops(Some(Bed::Back)), vec![Needle::back(1)]);
    }
}
