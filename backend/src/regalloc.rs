//! Per-block register allocation state.
//!
//! Allocation is driven by the code generator: operations are invoked
//! instruction by instruction in stream order, each one emitting the
//! spill and reload code it needs through the [`HostCodeGen`] hooks.

use std::collections::HashMap;

use jitil_core::{Block, InstIdx, ValueClass};

use crate::code_buffer::CodeBuffer;
use crate::config::BackendConfig;
use crate::liveness::Liveness;
use crate::{HostCodeGen, RegClass};

/// Width of one spill slot; holds a full vector register.
pub const SPILL_SLOT_SIZE: u32 = 16;

/// Index of a spill slot in the block's frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpillSlot(pub u32);

impl SpillSlot {
    /// Byte offset of the slot from the frame base.
    #[inline]
    pub const fn disp(self) -> i32 {
        (self.0 * SPILL_SLOT_SIZE) as i32
    }
}

/// Where a value currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loc {
    Reg(u8),
    Slot(SpillSlot),
}

/// Counters describing the allocator's work on one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Calls to `find_free`.
    pub allocations: u32,
    pub evictions: u32,
    pub spill_stores: u32,
    pub reloads: u32,
}

/// One register pool: the preference order and the current occupant
/// of every host register.
#[derive(Debug, Clone)]
struct RegFile {
    order: Vec<u8>,
    regs: [Option<InstIdx>; 16],
}

impl RegFile {
    fn new(order: &[u8]) -> Self {
        Self {
            order: order.to_vec(),
            regs: [None; 16],
        }
    }

    fn reg_of(&self, idx: InstIdx) -> Option<u8> {
        self.order
            .iter()
            .copied()
            .find(|&r| self.regs[r as usize] == Some(idx))
    }

    fn first_free(&self) -> Option<u8> {
        self.order
            .iter()
            .copied()
            .find(|&r| self.regs[r as usize].is_none())
    }

    fn bound(&self) -> impl Iterator<Item = (u8, InstIdx)> + '_ {
        self.order
            .iter()
            .filter_map(|&r| self.regs[r as usize].map(|i| (r, i)))
    }
}

/// Allocation state for one block. Created fresh per compilation and
/// dropped afterwards; nothing carries over between blocks.
pub struct AllocState<'a> {
    block: &'a Block,
    live: &'a Liveness,
    int: RegFile,
    float: RegFile,
    slots: HashMap<InstIdx, SpillSlot>,
    nb_slots: u32,
    exits: u32,
    stats: AllocStats,
}

impl<'a> AllocState<'a> {
    pub fn new(block: &'a Block, live: &'a Liveness, config: &BackendConfig) -> Self {
        Self {
            block,
            live,
            int: RegFile::new(&config.int_alloc_order),
            float: RegFile::new(&config.float_alloc_order),
            slots: HashMap::new(),
            nb_slots: 0,
            exits: 0,
            stats: AllocStats::default(),
        }
    }

    /// Pool holding the value of `idx`.
    pub fn class_of(&self, idx: InstIdx) -> RegClass {
        match self.block.opc(idx).result_class() {
            ValueClass::Float => RegClass::Float,
            ValueClass::Int | ValueClass::None => RegClass::Int,
        }
    }

    fn file(&self, class: RegClass) -> &RegFile {
        match class {
            RegClass::Int => &self.int,
            RegClass::Float => &self.float,
        }
    }

    fn file_mut(&mut self, class: RegClass) -> &mut RegFile {
        match class {
            RegClass::Int => &mut self.int,
            RegClass::Float => &mut self.float,
        }
    }

    /// Return an unbound register of `class`, evicting one if needed.
    pub fn find_free(
        &mut self,
        backend: &impl HostCodeGen,
        buf: &mut CodeBuffer,
        class: RegClass,
    ) -> u8 {
        self.stats.allocations += 1;
        match self.file(class).first_free() {
            Some(r) => r,
            None => self.evict(backend, buf, class),
        }
    }

    /// Spill the resident needed furthest in the future and return its
    /// register. Ties go to the earliest register in the pool order.
    pub fn evict(&mut self, backend: &impl HostCodeGen, buf: &mut CodeBuffer, class: RegClass) -> u8 {
        let mut victim: Option<(u8, InstIdx, u32)> = None;
        for (reg, idx) in self.file(class).bound() {
            let last = self.live.last_use(idx).map_or(0, |l| l.0);
            if victim.map_or(true, |(_, _, best)| last > best) {
                victim = Some((reg, idx, last));
            }
        }
        let Some((reg, idx, last)) = victim else {
            log::error!("evict from an empty {class:?} pool");
            panic!("no register to evict");
        };
        log::trace!("evict {idx} from {class:?} reg {reg} (last use {last})");
        self.stats.evictions += 1;
        self.spill(backend, buf, idx);
        reg
    }

    /// Store `idx` to its slot (allocating one on first spill) and
    /// unbind its register. A value that already owns a slot is not
    /// stored again.
    pub fn spill(&mut self, backend: &impl HostCodeGen, buf: &mut CodeBuffer, idx: InstIdx) {
        let class = self.class_of(idx);
        let Some(reg) = self.file(class).reg_of(idx) else {
            return;
        };
        if !self.slots.contains_key(&idx) {
            let slot = SpillSlot(self.nb_slots);
            self.nb_slots += 1;
            self.slots.insert(idx, slot);
            log::trace!("spill {idx} from {class:?} reg {reg} to slot {}", slot.0);
            backend.out_spill(buf, class, reg, slot);
            self.stats.spill_stores += 1;
        }
        self.unbind(class, reg);
    }

    /// Spill every bound register of `class`.
    pub fn spill_all(&mut self, backend: &impl HostCodeGen, buf: &mut CodeBuffer, class: RegClass) {
        let bound: Vec<InstIdx> = self.file(class).bound().map(|(_, i)| i).collect();
        for idx in bound {
            self.spill(backend, buf, idx);
        }
    }

    /// Record that `reg` now holds `idx`. Any previous occupant is
    /// dropped; its value must already be dead or saved.
    pub fn bind(&mut self, class: RegClass, reg: u8, idx: InstIdx) {
        if let Some(cur) = self.file(class).reg_of(idx) {
            if cur != reg {
                log::error!("{idx} bound to {class:?} reg {reg} while resident in {cur}");
                panic!("value resident in two registers");
            }
        }
        self.file_mut(class).regs[reg as usize] = Some(idx);
    }

    pub fn unbind(&mut self, class: RegClass, reg: u8) {
        self.file_mut(class).regs[reg as usize] = None;
    }

    /// Register currently holding `idx`, if any.
    pub fn reg_of(&self, idx: InstIdx) -> Option<u8> {
        self.file(self.class_of(idx)).reg_of(idx)
    }

    pub fn occupant(&self, class: RegClass, reg: u8) -> Option<InstIdx> {
        self.file(class).regs[reg as usize]
    }

    /// Bound registers of `class`, in pool order.
    pub fn bound(&self, class: RegClass) -> Vec<(u8, InstIdx)> {
        self.file(class).bound().collect()
    }

    /// Spill slot of `idx`. Asking for the slot of a value that was
    /// never spilled is a generator bug.
    pub fn slot_of(&self, idx: InstIdx) -> SpillSlot {
        match self.slots.get(&idx) {
            Some(&slot) => slot,
            None => {
                log::error!("{idx} has no register and was never spilled");
                panic!("spill slot requested for unspilled value");
            }
        }
    }

    /// Register if resident, else spill slot.
    pub fn location_of(&self, idx: InstIdx) -> Loc {
        match self.reg_of(idx) {
            Some(r) => Loc::Reg(r),
            None => Loc::Slot(self.slot_of(idx)),
        }
    }

    /// Make `idx` register-resident, reloading it from its slot if needed.
    pub fn ensure_in_register(
        &mut self,
        backend: &impl HostCodeGen,
        buf: &mut CodeBuffer,
        idx: InstIdx,
    ) -> u8 {
        if let Some(r) = self.reg_of(idx) {
            return r;
        }
        let slot = self.slot_of(idx);
        let class = self.class_of(idx);
        let reg = self.find_free(backend, buf, class);
        backend.out_reload(buf, class, reg, slot);
        self.stats.reloads += 1;
        self.bind(class, reg, idx);
        reg
    }

    #[inline]
    pub fn is_last_use(&self, user: InstIdx, operand: InstIdx) -> bool {
        self.live.is_last_use_of(user, operand)
    }

    /// Free `operand`'s register if `user` is its last reader.
    pub fn release_if_last_use(&mut self, user: InstIdx, operand: InstIdx) {
        if self.is_last_use(user, operand) {
            let class = self.class_of(operand);
            if let Some(reg) = self.file(class).reg_of(operand) {
                self.unbind(class, reg);
            }
        }
    }

    /// Free every operand `user` reads for the last time.
    pub fn release(&mut self, user: InstIdx) {
        let done: Vec<InstIdx> = self
            .live
            .operand_uses(user)
            .filter(|u| u.is_last_use)
            .map(|u| u.operand)
            .collect();
        for operand in done {
            self.release_if_last_use(user, operand);
        }
    }

    /// Number the next exit path.
    pub fn next_exit(&mut self) -> u32 {
        let n = self.exits;
        self.exits += 1;
        n
    }

    pub fn nb_slots(&self) -> u32 {
        self.nb_slots
    }

    /// Bytes of spill area the block's frame needs.
    pub fn frame_size(&self) -> u32 {
        self.nb_slots * SPILL_SLOT_SIZE
    }

    pub fn stats(&self) -> AllocStats {
        self.stats
    }

    pub fn is_clean(&self) -> bool {
        self.int.bound().next().is_none() && self.float.bound().next().is_none()
    }

    /// Check that generation left no register bound.
    pub fn finish(&self) {
        if !self.is_clean() {
            let int: Vec<_> = self.int.bound().collect();
            let float: Vec<_> = self.float.bound().collect();
            log::error!("registers still bound after block: int {int:?}, float {float:?}");
            panic!("incomplete cleanup");
        }
    }
}
