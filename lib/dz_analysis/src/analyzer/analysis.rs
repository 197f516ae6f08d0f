//! Register type transfer rules, and deodexing of odexed instructions.

use crate::analyzer::{MethodAnalyzer, BOOLEAN, PRIMITIVE_32, REFERENCE_OR_UNINIT};
use crate::classpath::THROWABLE;
use crate::deodex::{InvokeKind, OdexedFieldInstructionMapper};
use crate::errors::{invalid, AnalysisError, AnalysisResult};
use crate::register_type::{Category, RegisterType};
use dz_dex::instrs::{Instr, Instruction, Reference};
use dz_dex::registers::Reg;
use dz_dex::{Addr, Dex, DexIndex};
use log::trace;

const NOT_DEODEXING: &str = "Cannot analyze an odexed instruction unless we are deodexing";

impl<'a> MethodAnalyzer<'a> {
    fn set_dest(&mut self, node: usize, typ: RegisterType, dex: &Dex) -> AnalysisResult<()> {
        match self.nodes[node].instruction().registers()[0] {
            Some(dest) => self.set_post(node, dest, typ, dex),
            None => Err(AnalysisError::Internal(format!(
                "{} has no destination register",
                self.nodes[node].instruction().mnemonic()
            ))),
        }
    }

    fn set_dest_category(&mut self, node: usize, category: Category, dex: &Dex) -> AnalysisResult<()> {
        self.set_dest(node, category.into(), dex)
    }

    /// Type of the exception received by the handler starting at `addr`.
    pub(super) fn exception_type(&self, addr: Addr, dex: &Dex) -> AnalysisResult<RegisterType> {
        let mut typ = RegisterType::UNKNOWN;
        for try_item in &self.tries {
            if try_item.catch_all_addr() == Some(addr) {
                typ = RegisterType::reference(self.class_path.class_def(THROWABLE, true)?.uid());
                break;
            }
            for handler in try_item.iter_handlers() {
                if handler.catch_addr() == addr {
                    let caught = RegisterType::for_type(handler.catch_type(dex)?, self.class_path)?;
                    typ = caught.merge(typ, self.class_path)?;
                }
            }
        }
        if typ.category() == Category::Unknown {
            return invalid("move-exception must be the first instruction in an exception handler block");
        }
        Ok(typ)
    }

    /// Type of the value returned by the instruction preceding a `move-result*`, `None` if
    /// that instruction is still odexed.
    pub(super) fn result_type(&self, node: usize, dex: &Dex) -> AnalysisResult<Option<RegisterType>> {
        let mnemonic = self.nodes[node].instruction().mnemonic();
        if node == 1 {
            return invalid(format!(
                "{mnemonic} cannot be the first instruction in a method. It must occur after an invoke-*/fill-new-array instruction"
            ));
        }
        let previous = self.nodes[node - 1].instruction();
        if !previous.sets_result() {
            return invalid(format!(
                "{mnemonic} must occur after an invoke-*/fill-new-array instruction"
            ));
        }
        match previous.reference() {
            Some(Reference::Method(idx)) => {
                let ret = idx.get(dex)?.proto(dex)?.return_descriptor(dex)?;
                Ok(Some(RegisterType::for_type(ret, self.class_path)?))
            }
            Some(Reference::Type(idx)) => Ok(Some(RegisterType::for_type(
                idx.get(dex)?.descriptor(),
                self.class_path,
            )?)),
            _ => Ok(None),
        }
    }

    /// Runs the transfer rule of an instruction. Returns `false` when the instruction is an
    /// odexed one that cannot be resolved yet.
    pub(super) fn analyze_instruction(&mut self, node: usize, dex: &mut Dex) -> AnalysisResult<bool> {
        use Instr::*;

        let instr = self.nodes[node].instruction().clone();
        trace!("{}: {}", self.nodes[node].addr(), instr.mnemonic());

        match &instr {
            Nop
            | ReturnVoid
            | Return(_)
            | ReturnWide(_)
            | ReturnObject(_)
            | MonitorEnter(_)
            | MonitorExit(_)
            | Throw(_)
            | Goto(_)
            | Goto16(_)
            | Goto32(_)
            | IfEq(..)
            | IfNe(..)
            | IfLt(..)
            | IfGe(..)
            | IfGt(..)
            | IfLe(..)
            | IfEqz(..)
            | IfNez(..)
            | IfLtz(..)
            | IfGez(..)
            | IfGtz(..)
            | IfLez(..)
            | Aput(..)
            | AputWide(..)
            | AputObject(..)
            | AputBoolean(..)
            | AputByte(..)
            | AputChar(..)
            | AputShort(..)
            | Iput(..)
            | IputWide(..)
            | IputObject(..)
            | IputBoolean(..)
            | IputByte(..)
            | IputChar(..)
            | IputShort(..)
            | Sput(..)
            | SputWide(..)
            | SputObject(..)
            | SputBoolean(..)
            | SputByte(..)
            | SputChar(..)
            | SputShort(..)
            | InvokeVirtual(..)
            | InvokeSuper(..)
            | InvokeStatic(..)
            | InvokeInterface(..)
            | InvokeVirtualRange(..)
            | InvokeSuperRange(..)
            | InvokeStaticRange(..)
            | InvokeInterfaceRange(..)
            | FilledNewArray(..)
            | FilledNewArrayRange(..)
            | PackedSwitchPayload(..)
            | SparseSwitchPayload(..)
            | FillArrayDataPayload(..)
            | ThrowVerificationError(..)
            | UnresolvedOdex(..) => (),

            Move(_, src)
            | MoveFrom16(_, src)
            | Move16(_, src)
            | MoveWide(_, src)
            | MoveWideFrom16(_, src)
            | MoveWide16(_, src)
            | MoveObject(_, src)
            | MoveObjectFrom16(_, src)
            | MoveObject16(_, src) => {
                let typ = self.nodes[node].pre_register(*src)?;
                self.set_dest(node, typ, dex)?;
            }

            MoveResult(_) | MoveResultWide(_) | MoveResultObject(_) => {
                match self.result_type(node, dex)? {
                    Some(typ) => self.set_dest(node, typ, dex)?,
                    None => return Ok(false),
                }
            }

            MoveException(_) => {
                let typ = self.exception_type(self.nodes[node].addr(), dex)?;
                self.set_dest(node, typ, dex)?;
            }

            ReturnVoidBarrier => {
                self.nodes[node].set_deodexed(ReturnVoid);
                return self.analyze_instruction(node, dex);
            }

            Const4(..) | Const16(..) | Const(..) => {
                let typ = RegisterType::for_literal(instr.literal().unwrap_or_default());
                self.set_dest(node, typ, dex)?;
            }
            ConstHigh16(..) => self.set_dest_category(node, Category::Integer, dex)?,
            ConstWide16(..) | ConstWide32(..) | ConstWide(..) | ConstWideHigh16(..) => {
                self.set_dest_category(node, Category::LongLo, dex)?;
            }
            ConstString(..) | ConstStringJumbo(..) => {
                let typ = RegisterType::for_type("Ljava/lang/String;", self.class_path)?;
                self.set_dest(node, typ, dex)?;
            }
            ConstClass(..) => {
                let typ = RegisterType::for_type("Ljava/lang/Class;", self.class_path)?;
                self.set_dest(node, typ, dex)?;
            }

            CheckCast(_, type_idx) | NewArray(_, _, type_idx) => {
                let typ = RegisterType::for_type(type_idx.get(dex)?.descriptor(), self.class_path)?;
                self.set_dest(node, typ, dex)?;
            }
            InstanceOf(..) => self.set_dest_category(node, Category::Boolean, dex)?,
            ArrayLength(..) => self.set_dest_category(node, Category::Integer, dex)?,
            NewInstance(dest, type_idx) => {
                // the instance token is allocated on the first pass only
                if self.nodes[node].post_register(*dest)?.category() == Category::Unknown {
                    let typ = RegisterType::for_type(type_idx.get(dex)?.descriptor(), self.class_path)?;
                    self.next_instance += 1;
                    let uninit = RegisterType::uninit_ref(typ.class(), self.next_instance);
                    self.set_dest(node, uninit, dex)?;
                }
            }

            FillArrayData(_, offset) | PackedSwitch(_, offset) | SparseSwitch(_, offset) => {
                self.mark_payload_alive(node, *offset);
            }

            CmplFloat(..) | CmpgFloat(..) | CmplDouble(..) | CmpgDouble(..) | CmpLong(..) => {
                self.set_dest_category(node, Category::Byte, dex)?;
            }

            Aget(..) => self.set_dest_category(node, Category::Integer, dex)?,
            AgetBoolean(..) => self.set_dest_category(node, Category::Boolean, dex)?,
            AgetByte(..) => self.set_dest_category(node, Category::Byte, dex)?,
            AgetChar(..) => self.set_dest_category(node, Category::Char, dex)?,
            AgetShort(..) => self.set_dest_category(node, Category::Short, dex)?,
            AgetWide(_, array, _) => self.analyze_aget_wide(node, *array, dex)?,
            AgetObject(_, array, _) => self.analyze_aget_object(node, *array, dex)?,

            Iget(..) | Sget(..) => self.set_dest_category(node, Category::Integer, dex)?,
            IgetBoolean(..) | SgetBoolean(..) => self.set_dest_category(node, Category::Boolean, dex)?,
            IgetByte(..) | SgetByte(..) => self.set_dest_category(node, Category::Byte, dex)?,
            IgetChar(..) | SgetChar(..) => self.set_dest_category(node, Category::Char, dex)?,
            IgetShort(..) | SgetShort(..) => self.set_dest_category(node, Category::Short, dex)?,
            IgetWide(_, _, field) | IgetObject(_, _, field) | SgetWide(_, field) | SgetObject(_, field) => {
                let typ = RegisterType::for_type(field.get(dex)?.type_descriptor(dex)?, self.class_path)?;
                self.set_dest(node, typ, dex)?;
            }

            InvokeDirect(..) | InvokeDirectRange(..) => self.analyze_invoke_init(node, dex)?,

            NegInt(..) | NotInt(..) | LongToInt(..) | FloatToInt(..) | DoubleToInt(..) => {
                self.set_dest_category(node, Category::Integer, dex)?;
            }
            NegLong(..) | NotLong(..) | IntToLong(..) | FloatToLong(..) | DoubleToLong(..) => {
                self.set_dest_category(node, Category::LongLo, dex)?;
            }
            NegFloat(..) | IntToFloat(..) | LongToFloat(..) | DoubleToFloat(..) => {
                self.set_dest_category(node, Category::Float, dex)?;
            }
            NegDouble(..) | IntToDouble(..) | LongToDouble(..) | FloatToDouble(..) => {
                self.set_dest_category(node, Category::DoubleLo, dex)?;
            }
            IntToByte(..) => self.set_dest_category(node, Category::Byte, dex)?,
            IntToChar(..) => self.set_dest_category(node, Category::Char, dex)?,
            IntToShort(..) => self.set_dest_category(node, Category::Short, dex)?,

            AddInt(..) | SubInt(..) | MulInt(..) | DivInt(..) | RemInt(..) | ShlInt(..)
            | ShrInt(..) | UshrInt(..) | AddInt2addr(..) | SubInt2addr(..) | MulInt2addr(..)
            | DivInt2addr(..) | RemInt2addr(..) | ShlInt2addr(..) | ShrInt2addr(..)
            | UshrInt2addr(..) => self.set_dest_category(node, Category::Integer, dex)?,
            AndInt(_, first, second) | OrInt(_, first, second) | XorInt(_, first, second)
            | AndInt2addr(first, second) | OrInt2addr(first, second) | XorInt2addr(first, second) => {
                let category = if self.is_boolean(node, *first)? && self.is_boolean(node, *second)? {
                    Category::Boolean
                } else {
                    Category::Integer
                };
                self.set_dest_category(node, category, dex)?;
            }
            AddLong(..) | SubLong(..) | MulLong(..) | DivLong(..) | RemLong(..) | AndLong(..)
            | OrLong(..) | XorLong(..) | ShlLong(..) | ShrLong(..) | UshrLong(..)
            | AddLong2addr(..) | SubLong2addr(..) | MulLong2addr(..) | DivLong2addr(..)
            | RemLong2addr(..) | AndLong2addr(..) | OrLong2addr(..) | XorLong2addr(..)
            | ShlLong2addr(..) | ShrLong2addr(..) | UshrLong2addr(..) => {
                self.set_dest_category(node, Category::LongLo, dex)?;
            }
            AddFloat(..) | SubFloat(..) | MulFloat(..) | DivFloat(..) | RemFloat(..)
            | AddFloat2addr(..) | SubFloat2addr(..) | MulFloat2addr(..) | DivFloat2addr(..)
            | RemFloat2addr(..) => self.set_dest_category(node, Category::Float, dex)?,
            AddDouble(..) | SubDouble(..) | MulDouble(..) | DivDouble(..) | RemDouble(..)
            | AddDouble2addr(..) | SubDouble2addr(..) | MulDouble2addr(..)
            | DivDouble2addr(..) | RemDouble2addr(..) => {
                self.set_dest_category(node, Category::DoubleLo, dex)?;
            }

            AddIntLit16(..) | RsubInt(..) | MulIntLit16(..) | DivIntLit16(..) | RemIntLit16(..)
            | AddIntLit8(..) | RsubIntLit8(..) | MulIntLit8(..) | DivIntLit8(..)
            | RemIntLit8(..) | ShlIntLit8(..) => self.set_dest_category(node, Category::Integer, dex)?,
            AndIntLit16(_, src, _) | OrIntLit16(_, src, _) | XorIntLit16(_, src, _)
            | AndIntLit8(_, src, _) | OrIntLit8(_, src, _) | XorIntLit8(_, src, _) => {
                let literal = instr.literal().unwrap_or_default();
                let category = if self.is_boolean(node, *src)? && (literal == 0 || literal == 1) {
                    Category::Boolean
                } else {
                    Category::Integer
                };
                self.set_dest_category(node, category, dex)?;
            }
            ShrIntLit8(_, src, shift) => {
                let typ = self.literal_shift_right(node, *src, i64::from(*shift), true)?;
                self.set_dest(node, typ, dex)?;
            }
            UshrIntLit8(_, src, shift) => {
                let typ = self.literal_shift_right(node, *src, i64::from(*shift), false)?;
                self.set_dest(node, typ, dex)?;
            }

            IgetVolatile(..) | IgetWideVolatile(..) | IgetObjectVolatile(..) | IputVolatile(..)
            | IputWideVolatile(..) | IputObjectVolatile(..) | SgetVolatile(..)
            | SgetWideVolatile(..) | SgetObjectVolatile(..) | SputVolatile(..)
            | SputWideVolatile(..) | SputObjectVolatile(..) => {
                self.deodex_volatile(node, dex)?;
                return self.analyze_instruction(node, dex);
            }
            ExecuteInline(..) | ExecuteInlineRange(..) => {
                self.deodex_execute_inline(node, dex)?;
                return self.analyze_instruction(node, dex);
            }
            InvokeDirectEmpty(args, method) => {
                self.nodes[node].set_deodexed(InvokeDirect(args.clone(), *method));
                return self.analyze_instruction(node, dex);
            }
            InvokeObjectInitRange(args, method) => {
                self.nodes[node].set_deodexed(InvokeDirectRange(*args, *method));
                return self.analyze_instruction(node, dex);
            }
            IgetQuick(_, obj, offset)
            | IgetWideQuick(_, obj, offset)
            | IgetObjectQuick(_, obj, offset)
            | IputQuick(_, obj, offset)
            | IputWideQuick(_, obj, offset)
            | IputObjectQuick(_, obj, offset) => {
                return self.deodex_quick_field(node, *obj, *offset, dex);
            }
            InvokeVirtualQuick(..)
            | InvokeVirtualQuickRange(..)
            | InvokeSuperQuick(..)
            | InvokeSuperQuickRange(..) => return self.deodex_quick_invoke(node, dex),
        }
        Ok(true)
    }

    fn is_boolean(&self, node: usize, reg: Reg) -> AnalysisResult<bool> {
        Ok(BOOLEAN.contains(&self.nodes[node].pre_register(reg)?.category()))
    }

    /// Payloads are reached through their instruction only, as is the `nop` aligning them.
    fn mark_payload_alive(&mut self, node: usize, offset: i32) {
        let Some(payload) = self.nodes[node]
            .addr()
            .checked_offset(offset)
            .and_then(|addr| self.addresses.get(&addr).copied())
        else {
            return;
        };
        self.nodes[payload].dead = false;
        if payload > 1 && matches!(self.nodes[payload - 1].original_instruction(), Instr::Nop) {
            self.nodes[payload - 1].dead = false;
        }
    }

    fn analyze_aget_wide(&mut self, node: usize, array: Reg, dex: &Dex) -> AnalysisResult<()> {
        let array_type = self.nodes[node].pre_register(array)?;
        let category = match array_type.category() {
            Category::Null => Category::LongLo,
            Category::Reference => {
                let class = self.class_of(array_type)?;
                let base = self.class_path.base_element_class(&class)?.ok_or_else(|| {
                    AnalysisError::validation(format!(
                        "Cannot use aget-wide with non-array type {}",
                        class.name()
                    ))
                })?;
                match base.name() {
                    "J" => Category::LongLo,
                    "D" => Category::DoubleLo,
                    _ => {
                        return invalid(format!(
                            "Cannot use aget-wide with array type {}. Incorrect array type for the instruction.",
                            class.name()
                        ))
                    }
                }
            }
            other => return invalid(format!("Cannot use aget-wide with non-array type {other}")),
        };
        self.set_dest_category(node, category, dex)
    }

    fn analyze_aget_object(&mut self, node: usize, array: Reg, dex: &Dex) -> AnalysisResult<()> {
        let array_type = self.nodes[node].pre_register(array)?;
        let typ = match array_type.category() {
            Category::Null => Category::Null.into(),
            Category::Reference => {
                let class = self.class_of(array_type)?;
                let element = self.class_path.immediate_element_class(&class)?.ok_or_else(|| {
                    AnalysisError::validation(format!(
                        "Cannot use aget-object with non-array type {}",
                        class.name()
                    ))
                })?;
                if !element.name().starts_with(['L', '[']) {
                    return invalid(format!(
                        "Cannot use aget-object with array type {}. Incorrect array type for the instruction.",
                        class.name()
                    ));
                }
                RegisterType::reference(element.uid())
            }
            other => return invalid(format!("Cannot use aget-object with non-array type {other}")),
        };
        self.set_dest(node, typ, dex)
    }

    /// A constructor call initializes its object register and every other register holding
    /// the same uninitialized reference.
    fn analyze_invoke_init(&mut self, node: usize, dex: &Dex) -> AnalysisResult<()> {
        let instr = self.nodes[node].instruction().clone();
        let Some(Reference::Method(method)) = instr.reference() else {
            return Ok(());
        };
        if method.get(dex)?.name() != "<init>" {
            return Ok(());
        }
        let Some(obj) = instr.invoke_args().and_then(|args| args.first()) else {
            return Ok(());
        };

        let obj_type = self.nodes[node].pre_register(obj)?;
        if !matches!(obj_type.category(), Category::UninitRef | Category::UninitThis) {
            return self.set_post(node, obj, obj_type, dex);
        }
        let initialized = RegisterType::new(Category::Reference, obj_type.class());
        for reg in 0..self.registers_size {
            let reg = Reg::from(reg as u16);
            if self.nodes[node].pre_register(reg)? == obj_type {
                self.set_post(node, reg, initialized, dex)?;
            }
        }
        Ok(())
    }

    /// Narrowest type of the result of a right shift by a literal.
    fn literal_shift_right(
        &self,
        node: usize,
        src: Reg,
        shift: i64,
        signed: bool,
    ) -> AnalysisResult<RegisterType> {
        let src_type = self.get_and_check_source(node, src, PRIMITIVE_32)?;
        if shift == 0 {
            return Ok(src_type);
        }
        let dest: RegisterType = if signed {
            src_type
        } else {
            Category::Integer.into()
        };
        let shift = shift & 0x1f;

        let category = match src_type.category() {
            Category::Integer | Category::Float if !signed && shift > 24 => Category::PosByte,
            Category::Integer | Category::Float if !signed && shift >= 16 => Category::Char,
            Category::Integer | Category::Float if signed && shift >= 24 => Category::Byte,
            Category::Integer | Category::Float if signed && shift >= 16 => Category::Short,
            Category::Short if signed && shift >= 8 => Category::Byte,
            Category::PosShort if shift >= 8 => Category::PosByte,
            Category::Char if shift > 8 => Category::PosByte,
            Category::PosByte => Category::PosByte,
            Category::Null | Category::One | Category::Boolean => Category::Null,
            _ => return Ok(dest),
        };
        Ok(category.into())
    }

    pub(super) fn deodex_volatile(&mut self, node: usize, dex: &Dex) -> AnalysisResult<()> {
        let instr = self.nodes[node].instruction().clone();
        let Some(Reference::Field(field)) = instr.reference() else {
            return Err(AnalysisError::Internal(format!(
                "{} has no field reference",
                instr.mnemonic()
            )));
        };
        let field_type = field.get(dex)?.type_descriptor(dex)?;
        let deodexed = OdexedFieldInstructionMapper::deodexed_field_instruction(field_type, &instr, field)?;
        self.nodes[node].set_deodexed(deodexed);
        Ok(())
    }

    fn deodex_execute_inline(&mut self, node: usize, dex: &mut Dex) -> AnalysisResult<()> {
        let Some(deodex) = self.deodex else {
            return invalid(NOT_DEODEXING);
        };
        let instr = self.nodes[node].instruction().clone();
        let inline = deodex.lookup_inline_method(&instr)?;
        let Some(method) = deodex.inline_method_ref(inline, self.class_path, dex)? else {
            return invalid(format!(
                "Cannot load inline method with index {}",
                instr.odex_index().unwrap_or_default()
            ));
        };

        let deodexed = match (&instr, inline.kind()) {
            (Instr::ExecuteInline(args, _), InvokeKind::Direct) => Instr::InvokeDirect(args.clone(), method),
            (Instr::ExecuteInline(args, _), InvokeKind::Static) => Instr::InvokeStatic(args.clone(), method),
            (Instr::ExecuteInline(args, _), InvokeKind::Virtual) => Instr::InvokeVirtual(args.clone(), method),
            (Instr::ExecuteInlineRange(args, _), InvokeKind::Direct) => Instr::InvokeDirectRange(*args, method),
            (Instr::ExecuteInlineRange(args, _), InvokeKind::Static) => Instr::InvokeStaticRange(*args, method),
            (Instr::ExecuteInlineRange(args, _), InvokeKind::Virtual) => {
                Instr::InvokeVirtualRange(*args, method)
            }
            _ => {
                return Err(AnalysisError::Internal(format!(
                    "cannot deodex {} as an inline call",
                    instr.mnemonic()
                )))
            }
        };
        trace!("{} -> {}", instr.mnemonic(), deodexed.mnemonic());
        self.nodes[node].set_deodexed(deodexed);
        Ok(())
    }

    fn deodex_quick_field(&mut self, node: usize, obj: Reg, offset: u16, dex: &mut Dex) -> AnalysisResult<bool> {
        let Some(deodex) = self.deodex else {
            return invalid(NOT_DEODEXING);
        };
        let obj_type = self.get_and_check_source(node, obj, REFERENCE_OR_UNINIT)?;
        if obj_type.category() == Category::Null {
            return Ok(false);
        }

        let instance = self.class_of(obj_type)?;
        let field = deodex
            .lookup_field(self.class_path, dex, &self.class, &instance, usize::from(offset))?
            .ok_or_else(|| {
                AnalysisError::validation(format!(
                    "Could not resolve the field in class {} at offset {offset}",
                    instance.name()
                ))
            })?;
        let instr = self.nodes[node].instruction().clone();
        let deodexed = {
            let field_type = field.get(dex)?.type_descriptor(dex)?;
            OdexedFieldInstructionMapper::deodexed_field_instruction(field_type, &instr, field)?
        };
        self.nodes[node].set_deodexed(deodexed);
        self.analyze_instruction(node, dex)?;
        Ok(true)
    }

    fn deodex_quick_invoke(&mut self, node: usize, dex: &mut Dex) -> AnalysisResult<bool> {
        let Some(deodex) = self.deodex else {
            return invalid(NOT_DEODEXING);
        };
        let instr = self.nodes[node].instruction().clone();
        let index = usize::from(instr.odex_index().unwrap_or_default());
        let Some(obj) = instr.invoke_args().and_then(|args| args.first()) else {
            return invalid(format!("{} has no object register", instr.mnemonic()));
        };
        let obj_type = self.get_and_check_source(node, obj, REFERENCE_OR_UNINIT)?;
        if obj_type.category() == Category::Null {
            return Ok(false);
        }
        let instance = self.class_of(obj_type)?;

        let is_super = matches!(instr, Instr::InvokeSuperQuick(..) | Instr::InvokeSuperQuickRange(..));
        let method = if is_super {
            let mut method = None;
            if let Some(superclass) = self.class.superclass() {
                let superclass = self.class_path.get(superclass)?;
                method = deodex.lookup_virtual_method(self.class_path, dex, &self.class, &superclass, index)?;
            }
            match method {
                Some(method) => Some(method),
                None => deodex.lookup_virtual_method(self.class_path, dex, &self.class, &self.class, index)?,
            }
        } else {
            deodex.lookup_virtual_method(self.class_path, dex, &self.class, &instance, index)?
        };
        let Some(method) = method else {
            return invalid(format!(
                "Could not resolve the method in class {} at index {index}",
                instance.name()
            ));
        };

        let deodexed = match &instr {
            Instr::InvokeVirtualQuick(args, _) => Instr::InvokeVirtual(args.clone(), method),
            Instr::InvokeSuperQuick(args, _) => Instr::InvokeSuper(args.clone(), method),
            Instr::InvokeVirtualQuickRange(args, _) => Instr::InvokeVirtualRange(*args, method),
            Instr::InvokeSuperQuickRange(args, _) => Instr::InvokeSuperRange(*args, method),
            _ => {
                return Err(AnalysisError::Internal(format!(
                    "cannot deodex {} as a virtual call",
                    instr.mnemonic()
                )))
            }
        };
        self.nodes[node].set_deodexed(deodexed);
        self.analyze_instruction(node, dex)?;
        Ok(true)
    }
}
