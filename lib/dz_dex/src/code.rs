//! Dalvik bytecode-related structures.

use crate::errors::{DexError, DexResult};
use crate::instrs::{Instr, Instruction, LabeledInstr};
use crate::types::TypeIdItem;
use crate::{Addr, Dex, DexIndex, Index};
use serde::{Deserialize, Serialize};

/// A method body: register frame description, instructions and exception handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeItem {
    pub(crate) registers_size: usize,
    pub(crate) ins_size: usize,
    pub(crate) insns: Vec<Instr>,
    #[serde(default)]
    pub(crate) tries: Vec<TryItem>,
}

impl CodeItem {
    #[must_use]
    pub const fn new(registers_size: usize, ins_size: usize, insns: Vec<Instr>) -> Self {
        Self {
            registers_size,
            ins_size,
            insns,
            tries: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_try(mut self, try_item: TryItem) -> Self {
        self.tries.push(try_item);
        self
    }

    #[inline]
    #[must_use]
    pub const fn registers_size(&self) -> usize {
        self.registers_size
    }

    #[inline]
    #[must_use]
    pub const fn ins_size(&self) -> usize {
        self.ins_size
    }

    #[inline]
    #[must_use]
    pub fn instructions_count(&self) -> usize {
        self.insns.len()
    }

    #[inline]
    pub fn iter_instructions(&self) -> impl Iterator<Item = &Instr> {
        self.insns.iter()
    }

    /// Returns the instructions together with their code addresses.
    #[must_use]
    pub fn labeled_instructions(&self) -> Vec<LabeledInstr> {
        let mut addr = Addr::entry();
        self.insns
            .iter()
            .map(|instr| {
                let linstr = LabeledInstr {
                    addr,
                    instr: instr.clone(),
                };
                addr = addr.forward(instr.size());
                linstr
            })
            .collect()
    }

    pub fn instruction_at(&self, addr: Addr) -> DexResult<&Instr> {
        let mut current = Addr::entry();
        for instr in &self.insns {
            if current == addr {
                return Ok(instr);
            }
            if current > addr {
                break;
            }
            current = current.forward(instr.size());
        }
        Err(DexError::InstructionNotFound(addr))
    }

    /// Replaces the whole instruction stream, keeping registers and handlers.
    pub fn replace_instructions(&mut self, insns: Vec<Instr>) -> DexResult<()> {
        let old_size: usize = self.insns.iter().map(Instruction::size).sum();
        let new_size: usize = insns.iter().map(Instruction::size).sum();
        if old_size != new_size {
            return Err(DexError::Structure(format!(
                "code size changed from {old_size} to {new_size} code units"
            )));
        }
        self.insns = insns;
        Ok(())
    }

    #[inline]
    pub fn iter_tries(&self) -> impl Iterator<Item = &TryItem> {
        self.tries.iter()
    }
}

/// A try block: the covered code range and its exception handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryItem {
    pub(crate) start_addr: Addr,
    pub(crate) insn_count: usize,
    #[serde(default)]
    pub(crate) handlers: Vec<CatchHandler>,
    #[serde(default)]
    pub(crate) catch_all_addr: Option<Addr>,
}

impl TryItem {
    #[must_use]
    pub const fn new(start_addr: Addr, insn_count: usize) -> Self {
        Self {
            start_addr,
            insn_count,
            handlers: Vec::new(),
            catch_all_addr: None,
        }
    }

    #[must_use]
    pub fn with_handler(mut self, type_idx: Index<TypeIdItem>, addr: Addr) -> Self {
        self.handlers.push(CatchHandler { type_idx, addr });
        self
    }

    #[must_use]
    pub const fn with_catch_all(mut self, addr: Addr) -> Self {
        self.catch_all_addr = Some(addr);
        self
    }

    #[inline]
    #[must_use]
    pub const fn start_addr(&self) -> Addr {
        self.start_addr
    }

    #[inline]
    #[must_use]
    pub const fn insn_count(&self) -> usize {
        self.insn_count
    }

    #[inline]
    #[must_use]
    pub const fn end_addr(&self) -> Addr {
        Addr(self.start_addr.0 + self.insn_count)
    }

    #[inline]
    #[must_use]
    pub fn covers(&self, addr: Addr) -> bool {
        self.start_addr <= addr && addr < self.end_addr()
    }

    #[inline]
    pub fn iter_handlers(&self) -> impl Iterator<Item = &CatchHandler> {
        self.handlers.iter()
    }

    #[inline]
    #[must_use]
    pub const fn catch_all_addr(&self) -> Option<Addr> {
        self.catch_all_addr
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchHandler {
    pub(crate) type_idx: Index<TypeIdItem>,
    pub(crate) addr: Addr,
}

impl CatchHandler {
    #[inline]
    #[must_use]
    pub const fn type_idx(&self) -> Index<TypeIdItem> {
        self.type_idx
    }

    #[inline]
    pub fn catch_type<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        Ok(self.type_idx.get(dex)?.descriptor())
    }

    #[inline]
    #[must_use]
    pub const fn catch_addr(&self) -> Addr {
        self.addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::Reg;

    #[test]
    fn addresses() {
        let code = CodeItem::new(
            2,
            0,
            vec![
                Instr::Const16(Reg::from(0u8), 3),
                Instr::Const4(Reg::from(1u8), 1),
                Instr::ReturnVoid,
            ],
        );
        let labeled = code.labeled_instructions();
        let addrs: Vec<usize> = labeled.iter().map(|i| i.addr().0).collect();
        assert_eq!(addrs, vec![0, 2, 3]);
        assert!(matches!(code.instruction_at(Addr(3)), Ok(Instr::ReturnVoid)));
        assert!(code.instruction_at(Addr(1)).is_err());
    }

    #[test]
    fn try_ranges() {
        let t = TryItem::new(Addr(2), 4).with_catch_all(Addr(10));
        assert!(t.covers(Addr(2)));
        assert!(t.covers(Addr(5)));
        assert!(!t.covers(Addr(6)));
        assert_eq!(t.catch_all_addr(), Some(Addr(10)));
    }
}
