//! Method analysis: instruction flow graph, register type inference, deodexing and
//! verification of a single method.
//!
//! A [`MethodAnalyzer`] goes through three states. Building it computes the flow graph;
//! [`MethodAnalyzer::analyze`] runs the type propagation to a fixed point, deodexing the
//! instructions that need it along the way; [`MethodAnalyzer::verify`] then checks every
//! reachable instruction against the computed types.

mod analysis;
mod flow;
mod instruction;
mod verify;

pub use crate::analyzer::instruction::{AnalyzedInstruction, InstructionState};

use crate::classpath::{ClassDef, ClassPath};
use crate::deodex::DeodexUtil;
use crate::errors::{invalid, AnalysisError, AnalysisResult, ValidationError};
use crate::register_type::{Category, RegisterType};
use dz_dex::code::TryItem;
use dz_dex::instrs::{Instr, Instruction};
use dz_dex::methods::{EncodedMethod, MethodFlags, MethodIdItem};
use dz_dex::registers::Reg;
use dz_dex::types::register_count;
use dz_dex::{Addr, Dex, Index, PrettyPrinter};
use fixedbitset::FixedBitSet;
use log::debug;
use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

const PRIMITIVE_32: &[Category] = &[
    Category::Null,
    Category::One,
    Category::Boolean,
    Category::Byte,
    Category::PosByte,
    Category::Short,
    Category::PosShort,
    Category::Char,
    Category::Integer,
    Category::Float,
];
const WIDE_LOW: &[Category] = &[Category::LongLo, Category::DoubleLo];
const WIDE_HIGH: &[Category] = &[Category::LongHi, Category::DoubleHi];
const REFERENCE: &[Category] = &[Category::Null, Category::Reference];
const REFERENCE_OR_UNINIT_THIS: &[Category] =
    &[Category::Null, Category::UninitThis, Category::Reference];
const REFERENCE_OR_UNINIT: &[Category] = &[
    Category::Null,
    Category::UninitRef,
    Category::UninitThis,
    Category::Reference,
];
const REFERENCE_AND_PRIMITIVE_32: &[Category] = &[
    Category::Null,
    Category::One,
    Category::Boolean,
    Category::Byte,
    Category::PosByte,
    Category::Short,
    Category::PosShort,
    Category::Char,
    Category::Integer,
    Category::Float,
    Category::Reference,
];
const BOOLEAN: &[Category] = &[Category::Null, Category::One, Category::Boolean];

/// Progress of a method analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AnalysisState {
    NotAnalyzed,
    Analyzed,
    Verified,
}

/// Kind of an edge of the instruction flow graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Branch {
    Sequence,
    Jump,
    Switch,
    Catch(String),
    CatchAll,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "<seq>"),
            Self::Jump => write!(f, "<jmp>"),
            Self::Switch => write!(f, "<switch>"),
            Self::Catch(typ) => write!(f, "<catch {typ}>"),
            Self::CatchAll => write!(f, "<catch *>"),
        }
    }
}

/// Analyzer of a single method.
///
/// Node 0 of the flow graph is the start pseudo-instruction, instruction `i` of the method is
/// node `i + 1`.
pub struct MethodAnalyzer<'a> {
    class_path: &'a ClassPath,
    deodex: Option<&'a DeodexUtil>,
    method: Index<MethodIdItem>,
    method_string: String,
    method_name: String,
    class: Rc<ClassDef>,
    is_static: bool,
    is_constructor: bool,
    return_type: String,
    parameters: Vec<String>,
    registers_size: usize,
    tries: Vec<TryItem>,
    nodes: Vec<AnalyzedInstruction>,
    graph: DiGraph<usize, Branch>,
    addresses: BTreeMap<Addr, usize>,
    handlers: Vec<Vec<(usize, Branch)>>,
    state: AnalysisState,
    validation_error: Option<ValidationError>,
    analyzed: FixedBitSet,
    next_instance: u32,
}

impl<'a> fmt::Debug for MethodAnalyzer<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MethodAnalyzer")
            .field("method", &self.method_string)
            .field("state", &self.state)
            .field("instructions", &(self.nodes.len() - 1))
            .finish()
    }
}

impl<'a> MethodAnalyzer<'a> {
    /// Prepares the analysis of a method, building its instruction flow graph.
    pub fn new(
        class_path: &'a ClassPath,
        dex: &Dex,
        method: &EncodedMethod,
        deodex: Option<&'a DeodexUtil>,
    ) -> AnalysisResult<Self> {
        let code = match method.code() {
            Some(code) if code.instructions_count() > 0 => code,
            _ => return invalid("The method has no code"),
        };
        let descriptor = method.descriptor(dex)?;
        let method_string = descriptor.full_string(dex)?;
        let class = class_path.class_def(descriptor.class_descriptor(dex)?, true)?;
        let proto = descriptor.proto(dex)?;
        let registers_size = code.registers_size();

        let mut nodes = Vec::with_capacity(code.instructions_count() + 1);
        let mut graph = DiGraph::new();
        let mut addresses = BTreeMap::new();
        nodes.push(AnalyzedInstruction::start(registers_size));
        graph.add_node(0);
        for (i, linstr) in code.labeled_instructions().into_iter().enumerate() {
            let node = i + 1;
            addresses.insert(linstr.addr(), node);
            nodes.push(AnalyzedInstruction::new(
                node,
                linstr.addr(),
                linstr.into_instr(),
                registers_size,
            ));
            graph.add_node(node);
        }

        let mut analyzer = Self {
            class_path,
            deodex,
            method: method.index(),
            method_name: descriptor.name().to_string(),
            class,
            is_static: method.is_static(),
            is_constructor: method.flags().contains(MethodFlags::ACC_CONSTRUCTOR),
            return_type: proto.return_descriptor(dex)?.to_string(),
            parameters: proto
                .parameter_descriptors(dex)?
                .into_iter()
                .map(str::to_string)
                .collect(),
            registers_size,
            tries: code.iter_tries().cloned().collect(),
            handlers: vec![Vec::new(); nodes.len()],
            analyzed: FixedBitSet::with_capacity(nodes.len()),
            nodes,
            graph,
            addresses,
            state: AnalysisState::NotAnalyzed,
            validation_error: None,
            next_instance: 0,
            method_string,
        };
        debug!("building flow graph of {}", analyzer.method_string);
        analyzer.build_graph(dex)?;
        Ok(analyzer)
    }

    #[inline]
    #[must_use]
    pub const fn analysis_state(&self) -> AnalysisState {
        self.state
    }

    /// Full string of the analyzed method.
    #[inline]
    #[must_use]
    pub fn method_string(&self) -> &str {
        &self.method_string
    }

    #[inline]
    #[must_use]
    pub const fn method(&self) -> Index<MethodIdItem> {
        self.method
    }

    /// The verification failure met by the last pass, if any.
    #[inline]
    #[must_use]
    pub const fn validation_error(&self) -> Option<&ValidationError> {
        self.validation_error.as_ref()
    }

    /// Instructions of the method, in code order.
    #[inline]
    #[must_use]
    pub fn instructions(&self) -> &[AnalyzedInstruction] {
        &self.nodes[1..]
    }

    /// The start pseudo-instruction, holding the register types at method entry.
    #[inline]
    #[must_use]
    pub fn start(&self) -> &AnalyzedInstruction {
        &self.nodes[0]
    }

    /// Record of the given flow graph node.
    #[must_use]
    pub fn node(&self, node: usize) -> Option<&AnalyzedInstruction> {
        self.nodes.get(node)
    }

    #[must_use]
    pub fn instruction_at_address(&self, addr: Addr) -> Option<&AnalyzedInstruction> {
        self.addresses.get(&addr).map(|node| &self.nodes[*node])
    }

    /// Instruction flow graph, whose node weights are node indexes.
    #[inline]
    #[must_use]
    pub const fn graph(&self) -> &DiGraph<usize, Branch> {
        &self.graph
    }

    /// The instruction stream with deodexed instructions in place of odexed ones.
    #[must_use]
    pub fn deodexed_instructions(&self) -> Vec<Instr> {
        self.instructions()
            .iter()
            .map(|instr| instr.instruction().clone())
            .collect()
    }

    /// Number of instructions that were replaced during the analysis.
    #[must_use]
    pub fn deodexed_count(&self) -> usize {
        self.instructions()
            .iter()
            .filter(|instr| instr.state() == InstructionState::Deodexed)
            .count()
    }

    /// Replaces the code of the analyzed method in the container by the deodexed
    /// instruction stream.
    pub fn write_back(&self, dex: &mut Dex) -> AnalysisResult<()> {
        let code = dex.method_code_mut(self.method).ok_or_else(|| {
            AnalysisError::Internal(format!("no code found for {}", self.method_string))
        })?;
        code.replace_instructions(self.deodexed_instructions())?;
        Ok(())
    }

    #[must_use]
    pub fn to_dot(&self, dex: &Dex) -> String {
        let labeled = self.graph.map(
            |_, node| {
                let instr = &self.nodes[*node];
                if instr.is_start() {
                    String::from("start")
                } else {
                    format!(
                        "{}: {}",
                        instr.addr(),
                        PrettyPrinter(instr.instruction(), dex)
                    )
                }
            },
            |_, branch| branch.clone(),
        );

        let mut res = String::new();
        res.push_str("digraph {\n");
        res.push_str("  splines=ortho;\n");
        res.push_str("  nodesep=2;\n");
        let edge_attrs = |_, edge: petgraph::graph::EdgeReference<'_, Branch>| {
            let color = match edge.weight() {
                Branch::Jump => "blue",
                Branch::Switch => "purple",
                Branch::Catch(_) | Branch::CatchAll => "orchid",
                Branch::Sequence => "black",
            };
            format!("color={},xlabel=\"{}\"", color, edge.weight())
        };
        let node_attrs = |_, (idx, _): (petgraph::graph::NodeIndex, &String)| {
            let instr = &self.nodes[idx.index()];
            if instr.is_dead() {
                String::from("shape=box,color=gray")
            } else if instr.instruction().can_throw() {
                String::from("shape=box,color=blue")
            } else {
                String::from("shape=box,color=black")
            }
        };
        let dot = Dot::with_attr_getters(
            &labeled,
            &[Config::GraphContentOnly, Config::EdgeNoLabel],
            &edge_attrs,
            &node_attrs,
        );
        res.push_str(&dot.to_string());
        res.push('}');
        res
    }

    /// Attaches the location of a validation failure and keeps a copy of it.
    fn record(&mut self, err: AnalysisError, node: usize) -> AnalysisError {
        match err {
            AnalysisError::Validation(mut err) => {
                let instr = &self.nodes[node];
                if !instr.is_start() {
                    err.code_address = Some(instr.addr());
                    err.opcode = Some(instr.instruction().mnemonic().to_string());
                }
                err.method = Some(self.method_string.clone());
                self.validation_error = Some(err.clone());
                AnalysisError::Validation(err)
            }
            other => other,
        }
    }

    fn check_register_index(&self, reg: Reg) -> AnalysisResult<()> {
        if reg.index() >= self.registers_size {
            return invalid(format!(
                "Invalid register: {reg}. Must be between v0 and v{}, inclusive.",
                self.registers_size.saturating_sub(1)
            ));
        }
        Ok(())
    }

    fn check_wide_pair(&self, reg: Reg) -> AnalysisResult<()> {
        if reg.index() + 1 >= self.registers_size {
            return invalid(format!(
                "{reg} cannot be used as the first register in a wide register pair because it is the last register."
            ));
        }
        Ok(())
    }

    fn check_register(&self, typ: RegisterType, reg: Reg, valid: &[Category]) -> AnalysisResult<()> {
        if !valid.contains(&typ.category()) {
            return invalid(format!(
                "Invalid register type {} for register {reg}.",
                typ.display(self.class_path)
            ));
        }
        Ok(())
    }

    /// Type of a register before the given instruction, which must belong to one of the
    /// given categories. The high half of wide values is checked too.
    fn get_and_check_source(
        &self,
        node: usize,
        reg: Reg,
        valid: &[Category],
    ) -> AnalysisResult<RegisterType> {
        let typ = self.nodes[node].pre_register(reg)?;
        self.check_register(typ, reg, valid)?;
        if valid == WIDE_LOW {
            self.check_wide_pair(reg)?;
            let high = self.nodes[node].pre_register(reg.next())?;
            self.check_register(high, reg.next(), WIDE_HIGH)?;
        }
        Ok(typ)
    }

    fn class_of(&self, typ: RegisterType) -> AnalysisResult<Rc<ClassDef>> {
        match typ.class() {
            Some(uid) => self.class_path.get(uid),
            None => Err(AnalysisError::Internal(format!(
                "register type {} has no class",
                typ.display(self.class_path)
            ))),
        }
    }

    /// Sets the type of a register after an instruction, then propagates the change to the
    /// successors that do not overwrite the register.
    fn set_post(&mut self, node: usize, reg: Reg, typ: RegisterType, dex: &Dex) -> AnalysisResult<()> {
        self.check_register_index(reg)?;
        if self.nodes[node].post[reg.index()] == typ {
            return Ok(());
        }
        self.nodes[node].post[reg.index()] = typ;

        let mut changed = FixedBitSet::with_capacity(self.nodes.len());
        self.propagate(node, reg, &mut changed, dex)?;
        while let Some(next) = changed.ones().next() {
            changed.set(next, false);
            self.propagate(next, reg, &mut changed, dex)?;
        }

        match typ.category() {
            Category::LongLo => {
                self.check_wide_pair(reg)?;
                self.set_post(node, reg.next(), Category::LongHi.into(), dex)
            }
            Category::DoubleLo => {
                self.check_wide_pair(reg)?;
                self.set_post(node, reg.next(), Category::DoubleHi.into(), dex)
            }
            _ => Ok(()),
        }
    }

    fn propagate(
        &mut self,
        node: usize,
        reg: Reg,
        changed: &mut FixedBitSet,
        dex: &Dex,
    ) -> AnalysisResult<()> {
        let typ = self.nodes[node].post[reg.index()];
        let successors = self.nodes[node].successors.clone();
        for succ in successors {
            if self.merge_register(succ, reg, typ, dex)? {
                changed.insert(succ);
            }
        }
        Ok(())
    }

    /// Merges a predecessor register type into the pre-state of `node`. Returns `true` when
    /// the post-state of `node` changed too.
    fn merge_register(
        &mut self,
        node: usize,
        reg: Reg,
        typ: RegisterType,
        dex: &Dex,
    ) -> AnalysisResult<bool> {
        let old = self.nodes[node].pre[reg.index()];
        let merged = old.merge(typ, self.class_path)?;
        if merged == old {
            return Ok(false);
        }
        self.nodes[node].pre[reg.index()] = merged;
        self.analyzed.set(node, false);

        if self.nodes[node].sets_register(reg, dex)? {
            return Ok(false);
        }
        self.nodes[node].post[reg.index()] = merged;
        Ok(true)
    }

    /// Seeds the start node with the register types at method entry.
    fn set_entry_state(&mut self, dex: &Dex) -> AnalysisResult<()> {
        let parameter_registers: usize = self.parameters.iter().map(|p| register_count(p)).sum();
        let first_parameter = self
            .registers_size
            .checked_sub(parameter_registers)
            .ok_or_else(|| {
                AnalysisError::validation(format!(
                    "The method has {} registers but its parameters need {parameter_registers}",
                    self.registers_size
                ))
            })?;

        if !self.is_static {
            let Some(this) = first_parameter.checked_sub(1) else {
                return invalid("A non-static method must have at least 1 register");
            };
            let typ = if self.is_constructor {
                RegisterType::uninit_this(self.class.uid())
            } else {
                RegisterType::reference(self.class.uid())
            };
            self.set_post(0, Reg::from(this as u16), typ, dex)?;
        }

        let mut reg = first_parameter;
        for parameter in self.parameters.clone() {
            let typ = RegisterType::for_type(&parameter, self.class_path)?;
            self.set_post(0, Reg::from(reg as u16), typ, dex)?;
            reg += register_count(&parameter);
        }

        let locals = self.registers_size - parameter_registers - usize::from(!self.is_static);
        for reg in 0..locals {
            self.set_post(0, Reg::from(reg as u16), RegisterType::UNINIT, dex)?;
        }
        Ok(())
    }

    /// Infers the register types of every reachable instruction, deodexing odexed
    /// instructions whose target can be resolved.
    pub fn analyze(&mut self, dex: &mut Dex) -> AnalysisResult<()> {
        if self.state >= AnalysisState::Analyzed {
            return Ok(());
        }
        debug!("analyzing {}", self.method_string);
        for instr in &mut self.nodes[1..] {
            instr.dead = true;
        }
        if let Err(err) = self.set_entry_state(dex) {
            return Err(self.record(err, 0));
        }

        let len = self.nodes.len();
        let mut pending = FixedBitSet::with_capacity(len);
        let mut undeodexed = FixedBitSet::with_capacity(len);
        for succ in &self.nodes[0].successors {
            pending.insert(*succ);
        }

        loop {
            let mut did_something = false;
            while let Some(node) = pending.ones().next() {
                pending.set(node, false);
                if self.analyzed[node] {
                    continue;
                }
                self.nodes[node].dead = false;
                if self.nodes[node].original_instruction().odex_only() {
                    self.nodes[node].restore_original();
                }

                match self.analyze_instruction(node, dex) {
                    Ok(false) => {
                        undeodexed.insert(node);
                        continue;
                    }
                    Ok(true) => {
                        did_something = true;
                        undeodexed.set(node, false);
                    }
                    Err(err) => return Err(self.record(err, node)),
                }
                self.nodes[node].set_resolved();
                self.analyzed.insert(node);
                for succ in &self.nodes[node].successors {
                    pending.insert(*succ);
                }
            }
            if !did_something {
                break;
            }
            pending.union_with(&undeodexed);
        }

        for node in 1..len {
            if let Err(err) = self.finish_odexed(node, dex) {
                return Err(self.record(err, node));
            }
        }
        self.state = AnalysisState::Analyzed;
        Ok(())
    }

    /// Rewrites an odexed instruction left unresolved by the analysis: the ones that need no
    /// type information are deodexed, the others are marked as unresolvable.
    fn finish_odexed(&mut self, node: usize, dex: &Dex) -> AnalysisResult<()> {
        let instr = self.nodes[node].instruction().clone();
        if !instr.odex_only() {
            return Ok(());
        }
        let object = match &instr {
            Instr::ReturnVoidBarrier => {
                self.nodes[node].set_deodexed(Instr::ReturnVoid);
                return Ok(());
            }
            Instr::InvokeDirectEmpty(args, method) => {
                self.nodes[node].set_deodexed(Instr::InvokeDirect(args.clone(), *method));
                return Ok(());
            }
            Instr::InvokeObjectInitRange(args, method) => {
                self.nodes[node].set_deodexed(Instr::InvokeDirectRange(*args, *method));
                return Ok(());
            }
            _ if instr.odexed_instance_volatile() || instr.odexed_static_volatile() => {
                return self.deodex_volatile(node, dex);
            }
            Instr::IgetQuick(_, obj, _)
            | Instr::IgetWideQuick(_, obj, _)
            | Instr::IgetObjectQuick(_, obj, _)
            | Instr::IputQuick(_, obj, _)
            | Instr::IputWideQuick(_, obj, _)
            | Instr::IputObjectQuick(_, obj, _) => Some(*obj),
            Instr::ExecuteInline(..)
            | Instr::ExecuteInlineRange(..)
            | Instr::InvokeVirtualQuick(..)
            | Instr::InvokeVirtualQuickRange(..)
            | Instr::InvokeSuperQuick(..)
            | Instr::InvokeSuperQuickRange(..) => instr.invoke_args().and_then(|args| args.first()),
            _ => None,
        };
        if let Some(object) = object {
            debug!(
                "unresolved {} at {} in {}",
                instr.mnemonic(),
                self.nodes[node].addr(),
                self.method_string
            );
            self.nodes[node].set_deodexed(Instr::UnresolvedOdex(Box::new(instr), object));
        }
        Ok(())
    }

    /// Checks every reachable instruction against the inferred register types.
    pub fn verify(&mut self, dex: &Dex) -> AnalysisResult<()> {
        match self.state {
            AnalysisState::NotAnalyzed => {
                return Err(AnalysisError::Internal(
                    "You must call analyze() before calling verify().".to_string(),
                ))
            }
            AnalysisState::Verified => return Ok(()),
            AnalysisState::Analyzed => (),
        }
        debug!("verifying {}", self.method_string);

        let len = self.nodes.len();
        let mut verified = FixedBitSet::with_capacity(len);
        let mut pending = FixedBitSet::with_capacity(len);
        for succ in &self.nodes[0].successors {
            pending.insert(*succ);
        }
        while let Some(node) = pending.ones().next() {
            pending.set(node, false);
            if verified[node] || self.nodes[node].is_dead() {
                continue;
            }
            if let Err(err) = self.verify_instruction(node, dex) {
                return Err(self.record(err, node));
            }
            verified.insert(node);
            for succ in &self.nodes[node].successors {
                pending.insert(*succ);
            }
        }
        self.state = AnalysisState::Verified;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
