//! Instruction flow graph construction.

use crate::analyzer::{Branch, MethodAnalyzer};
use crate::errors::{invalid, AnalysisError, AnalysisResult};
use dz_dex::instrs::{Instr, Instruction};
use dz_dex::{Addr, Dex};
use fixedbitset::FixedBitSet;
use log::trace;
use petgraph::graph::NodeIndex;

impl<'a> MethodAnalyzer<'a> {
    fn node_at(&self, addr: Addr) -> Option<usize> {
        self.addresses.get(&addr).copied()
    }

    fn target_node(&self, node: usize, offset: i32) -> AnalysisResult<usize> {
        let addr = self.nodes[node].addr();
        match addr.checked_offset(offset).and_then(|target| self.node_at(target)) {
            Some(target) => Ok(target),
            None => invalid(format!(
                "Invalid branch target at code address {addr} with offset {offset}"
            )),
        }
    }

    /// Computes the handlers an exception raised by each instruction can reach: the ones of
    /// the first try block covering it, then its catch-all handler.
    fn build_handlers(&mut self, dex: &Dex) -> AnalysisResult<()> {
        for node in 1..self.nodes.len() {
            let instr = &self.nodes[node];
            if !instr.instruction().can_throw() {
                continue;
            }
            let addr = instr.addr();
            let Some(try_item) = self.tries.iter().find(|t| t.covers(addr)) else {
                continue;
            };

            let mut handlers = Vec::new();
            for handler in try_item.iter_handlers() {
                let target = self.node_at(handler.catch_addr()).ok_or_else(|| {
                    AnalysisError::validation(format!(
                        "Invalid exception handler address {}",
                        handler.catch_addr()
                    ))
                })?;
                handlers.push((target, Branch::Catch(handler.catch_type(dex)?.to_string())));
            }
            if let Some(catch_all) = try_item.catch_all_addr() {
                let target = self.node_at(catch_all).ok_or_else(|| {
                    AnalysisError::validation(format!(
                        "Invalid exception handler address {catch_all}"
                    ))
                })?;
                handlers.push((target, Branch::CatchAll));
            }
            self.handlers[node] = handlers;
        }
        Ok(())
    }

    pub(super) fn build_graph(&mut self, dex: &Dex) -> AnalysisResult<()> {
        self.build_handlers(dex)?;

        let last = self.nodes.len() - 1;
        let mut pending = FixedBitSet::with_capacity(self.nodes.len());
        if let Err(err) = self.add_edge(0, 1, Branch::Sequence, false, &mut pending) {
            return Err(self.record(err, 0));
        }

        while let Some(node) = pending.ones().next() {
            pending.set(node, false);
            if let Err(err) = self.add_successors(node, last, &mut pending) {
                return Err(self.record(err, node));
            }
        }
        trace!(
            "{}: {} nodes, {} edges",
            self.method_string,
            self.graph.node_count(),
            self.graph.edge_count()
        );
        Ok(())
    }

    fn add_successors(&mut self, node: usize, last: usize, pending: &mut FixedBitSet) -> AnalysisResult<()> {
        let instr = self.nodes[node].original_instruction().clone();
        if instr.can_continue() {
            if node == last {
                return invalid("Execution can continue past the last instruction");
            }
            self.add_edge(node, node + 1, Branch::Sequence, false, pending)?;
        }

        match &instr {
            Instr::PackedSwitch(_, offset) | Instr::SparseSwitch(_, offset) => {
                let payload = self.target_node(node, *offset)?;
                let targets = match (&instr, self.nodes[payload].original_instruction()) {
                    (Instr::PackedSwitch(..), Instr::PackedSwitchPayload(_, targets))
                    | (Instr::SparseSwitch(..), Instr::SparseSwitchPayload(_, targets)) => {
                        targets.clone()
                    }
                    (Instr::PackedSwitch(..), _) => {
                        return invalid(format!(
                            "There is no PackedSwitchData structure at code address {}",
                            self.nodes[payload].addr()
                        ))
                    }
                    _ => {
                        return invalid(format!(
                            "There is no SparseSwitchData structure at code address {}",
                            self.nodes[payload].addr()
                        ))
                    }
                };
                for target in targets {
                    let target = self.target_node(node, target)?;
                    self.add_edge(node, target, Branch::Switch, false, pending)?;
                }
            }
            Instr::FillArrayData(..) => (),
            _ => {
                if let Some(offset) = instr.branch_offset() {
                    let target = self.target_node(node, offset)?;
                    self.add_edge(node, target, Branch::Jump, false, pending)?;
                }
            }
        }
        Ok(())
    }

    /// Links two nodes, then links the predecessor to the exception handlers of the
    /// successor, since the registers seen by a handler are the ones before the throwing
    /// instruction.
    fn add_edge(
        &mut self,
        pred: usize,
        succ: usize,
        branch: Branch,
        allow_move_exception: bool,
        pending: &mut FixedBitSet,
    ) -> AnalysisResult<()> {
        if !allow_move_exception
            && matches!(self.nodes[succ].original_instruction(), Instr::MoveException(_))
        {
            let from = if self.nodes[pred].is_start() {
                String::from("start of the method")
            } else {
                format!(
                    "{} instruction at code address {}",
                    self.nodes[pred].original_instruction().mnemonic(),
                    self.nodes[pred].addr()
                )
            };
            return invalid(format!(
                "Execution can pass from the {from} to the move-exception instruction at address {}",
                self.nodes[succ].addr()
            ));
        }

        if !self.nodes[succ].predecessors.insert(pred) {
            return Ok(());
        }
        self.nodes[pred].successors.push(succ);
        self.graph
            .add_edge(NodeIndex::new(pred), NodeIndex::new(succ), branch);
        pending.insert(succ);

        for (handler, branch) in self.handlers[succ].clone() {
            self.add_edge(pred, handler, branch, true, pending)?;
        }
        Ok(())
    }
}
