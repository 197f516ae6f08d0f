//! Per-instruction analysis records.

use crate::errors::{invalid, AnalysisResult};
use crate::register_type::{Category, RegisterType};
use dz_dex::instrs::{Instr, Instruction, Reference};
use dz_dex::registers::Reg;
use dz_dex::{Addr, Dex, DexIndex};
use std::collections::BTreeSet;

/// Resolution state of an instruction.
///
/// Odexed instructions go back to `Pending` (with their original form restored) each time
/// they are re-analyzed, then end up either deodexed or unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionState {
    Pending,
    Original,
    Deodexed,
}

/// An instruction of the analyzed method, with the register types before and after its
/// execution and its edges in the instruction flow graph.
#[derive(Debug, Clone)]
pub struct AnalyzedInstruction {
    node: usize,
    addr: Addr,
    original: Instr,
    current: Instr,
    state: InstructionState,
    pub(crate) pre: Vec<RegisterType>,
    pub(crate) post: Vec<RegisterType>,
    pub(crate) predecessors: BTreeSet<usize>,
    pub(crate) successors: Vec<usize>,
    pub(crate) dead: bool,
}

impl AnalyzedInstruction {
    pub(crate) fn new(node: usize, addr: Addr, instr: Instr, registers: usize) -> Self {
        Self {
            node,
            addr,
            original: instr.clone(),
            current: instr,
            state: InstructionState::Pending,
            pre: vec![RegisterType::UNKNOWN; registers],
            post: vec![RegisterType::UNKNOWN; registers],
            predecessors: BTreeSet::new(),
            successors: Vec::new(),
            dead: false,
        }
    }

    /// The start pseudo-instruction, node 0 of the graph. Its post registers hold the
    /// method entry state.
    pub(crate) fn start(registers: usize) -> Self {
        Self::new(0, Addr::entry(), Instr::Nop, registers)
    }

    /// Index of the instruction in the method, `None` for the start pseudo-instruction.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        match self.node {
            0 => None,
            node => Some(node - 1),
        }
    }

    /// Node index in the instruction flow graph.
    #[inline]
    #[must_use]
    pub const fn node(&self) -> usize {
        self.node
    }

    #[inline]
    #[must_use]
    pub const fn is_start(&self) -> bool {
        self.node == 0
    }

    #[inline]
    #[must_use]
    pub const fn addr(&self) -> Addr {
        self.addr
    }

    /// The instruction as found in the container.
    #[inline]
    #[must_use]
    pub const fn original_instruction(&self) -> &Instr {
        &self.original
    }

    /// The instruction after deodexing, or the original one.
    #[inline]
    #[must_use]
    pub const fn instruction(&self) -> &Instr {
        &self.current
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> InstructionState {
        self.state
    }

    #[inline]
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.dead
    }

    #[inline]
    #[must_use]
    pub fn registers_count(&self) -> usize {
        self.post.len()
    }

    #[inline]
    #[must_use]
    pub fn pre_registers(&self) -> &[RegisterType] {
        &self.pre
    }

    #[inline]
    #[must_use]
    pub fn post_registers(&self) -> &[RegisterType] {
        &self.post
    }

    pub fn pre_register(&self, reg: Reg) -> AnalysisResult<RegisterType> {
        match self.pre.get(reg.index()) {
            Some(typ) => Ok(*typ),
            None => invalid(format!("Invalid register: {reg}")),
        }
    }

    pub fn post_register(&self, reg: Reg) -> AnalysisResult<RegisterType> {
        match self.post.get(reg.index()) {
            Some(typ) => Ok(*typ),
            None => invalid(format!("Invalid register: {reg}")),
        }
    }

    /// Nodes flowing into this instruction, the start node first.
    pub fn predecessors(&self) -> impl Iterator<Item = usize> + '_ {
        self.predecessors.iter().copied()
    }

    /// Nodes this instruction flows to, in discovery order.
    #[inline]
    #[must_use]
    pub fn successors(&self) -> &[usize] {
        &self.successors
    }

    pub(crate) fn set_deodexed(&mut self, instr: Instr) {
        self.current = instr;
        self.state = InstructionState::Deodexed;
    }

    pub(crate) fn set_resolved(&mut self) {
        if self.state == InstructionState::Pending {
            self.state = InstructionState::Original;
        }
    }

    pub(crate) fn restore_original(&mut self) {
        self.current = self.original.clone();
        self.state = InstructionState::Pending;
    }

    /// Checks if the instruction calls a constructor, which initializes its object register.
    pub fn is_invoke_init(&self, dex: &Dex) -> AnalysisResult<bool> {
        if self.is_start() || !self.current.can_initialize_reference() {
            return Ok(false);
        }
        match self.current.reference() {
            Some(Reference::Method(idx)) => Ok(idx.get(dex)?.name() == "<init>"),
            _ => Ok(false),
        }
    }

    /// Checks if executing the instruction writes the given register.
    ///
    /// A constructor call writes its object register and every register holding the same
    /// uninitialized reference.
    pub fn sets_register(&self, reg: Reg, dex: &Dex) -> AnalysisResult<bool> {
        if self.is_start() {
            return Ok(false);
        }
        if self.is_invoke_init(dex)? {
            let Some(dest) = self.current.invoke_args().and_then(|args| args.first()) else {
                return Ok(false);
            };
            if reg == dest {
                return Ok(true);
            }
            let typ = self.pre_register(reg)?;
            if !matches!(typ.category(), Category::UninitRef | Category::UninitThis) {
                return Ok(false);
            }
            return Ok(typ == self.pre_register(dest)?);
        }

        if !self.current.sets_register() {
            return Ok(false);
        }
        let Some(dest) = self.current.registers()[0] else {
            return Ok(false);
        };
        Ok(reg == dest || (self.current.sets_wide_register() && reg == dest.next()))
    }
}
