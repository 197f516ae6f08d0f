//! Verification rules, checked against the register types computed by the analysis.

use crate::analyzer::{
    MethodAnalyzer, PRIMITIVE_32, REFERENCE, REFERENCE_AND_PRIMITIVE_32, REFERENCE_OR_UNINIT,
    REFERENCE_OR_UNINIT_THIS, WIDE_LOW,
};
use crate::classpath::{ClassDef, THROWABLE};
use crate::errors::{invalid, AnalysisResult};
use crate::register_type::{Category, RegisterType};
use dz_dex::fields::FieldIdItem;
use dz_dex::instrs::{Instr, Instruction};
use dz_dex::methods::MethodIdItem;
use dz_dex::registers::{Reg, RegRange};
use dz_dex::types::TypeIdItem;
use dz_dex::{Dex, DexIndex, Index};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Invoke {
    Virtual,
    Super,
    Direct,
    Static,
    Interface,
}

/// Array and field slots accept their own category, and integers and floats in place of
/// each other.
fn check_array_field_assignment(slot: Category, instruction: Category) -> bool {
    slot == instruction
        || matches!(
            (slot, instruction),
            (Category::Integer, Category::Float) | (Category::Float, Category::Integer)
        )
}

fn field_string(field: Index<FieldIdItem>, dex: &Dex) -> AnalysisResult<String> {
    let field = field.get(dex)?;
    Ok(format!(
        "{}->{}:{}",
        field.class_descriptor(dex)?,
        field.name(),
        field.type_descriptor(dex)?
    ))
}

fn invoke_kind(instr: &Instr) -> Invoke {
    match instr {
        Instr::InvokeSuper(..) | Instr::InvokeSuperRange(..) => Invoke::Super,
        Instr::InvokeDirect(..) | Instr::InvokeDirectRange(..) => Invoke::Direct,
        Instr::InvokeStatic(..) | Instr::InvokeStaticRange(..) => Invoke::Static,
        Instr::InvokeInterface(..) | Instr::InvokeInterfaceRange(..) => Invoke::Interface,
        _ => Invoke::Virtual,
    }
}

fn range_registers(range: &RegRange) -> AnalysisResult<Vec<Reg>> {
    let first = usize::from(range.first().value());
    if first + range.len() > 1 << 16 {
        return invalid(format!(
            "Invalid register range {{v{first} .. v{}}}. The ending register is larger than the largest allowed register of v65535.",
            first + range.len() - 1
        ));
    }
    Ok(range.iter().collect())
}

fn fill_element_width(base: &str) -> Option<usize> {
    match base.chars().next() {
        Some('Z' | 'B') => Some(1),
        Some('C' | 'S') => Some(2),
        Some('I' | 'F') => Some(4),
        Some('J' | 'D') => Some(8),
        _ => None,
    }
}

impl<'a> MethodAnalyzer<'a> {
    /// Class name of a reference-like register type, or its category.
    fn type_name(&self, typ: RegisterType) -> String {
        match typ.class().map(|uid| self.class_path.get(uid)) {
            Some(Ok(class)) => class.name().to_string(),
            _ => typ.display(self.class_path).to_string(),
        }
    }

    fn type_of(&self, type_idx: Index<TypeIdItem>, dex: &Dex) -> AnalysisResult<RegisterType> {
        RegisterType::for_type(type_idx.get(dex)?.descriptor(), self.class_path)
    }

    pub(super) fn verify_instruction(&self, node: usize, dex: &Dex) -> AnalysisResult<()> {
        use Instr::*;

        let instr = self.nodes[node].instruction();
        let mnemonic = instr.mnemonic();

        match instr {
            Nop
            | ConstString(..)
            | ConstStringJumbo(..)
            | Const4(..)
            | Const16(..)
            | Const(..)
            | ConstHigh16(..)
            | ConstWide16(..)
            | ConstWide32(..)
            | ConstWide(..)
            | ConstWideHigh16(..)
            | Goto(_)
            | Goto16(_)
            | Goto32(_)
            | PackedSwitchPayload(..)
            | SparseSwitchPayload(..)
            | FillArrayDataPayload(..)
            | ThrowVerificationError(..)
            | UnresolvedOdex(..) => (),

            // odexed instructions left after the analysis cannot be checked
            ExecuteInline(..)
            | ExecuteInlineRange(..)
            | InvokeDirectEmpty(..)
            | InvokeObjectInitRange(..)
            | IgetVolatile(..)
            | IgetWideVolatile(..)
            | IgetObjectVolatile(..)
            | IputVolatile(..)
            | IputWideVolatile(..)
            | IputObjectVolatile(..)
            | SgetVolatile(..)
            | SgetWideVolatile(..)
            | SgetObjectVolatile(..)
            | SputVolatile(..)
            | SputWideVolatile(..)
            | SputObjectVolatile(..)
            | IgetQuick(..)
            | IgetWideQuick(..)
            | IgetObjectQuick(..)
            | IputQuick(..)
            | IputWideQuick(..)
            | IputObjectQuick(..)
            | InvokeVirtualQuick(..)
            | InvokeVirtualQuickRange(..)
            | InvokeSuperQuick(..)
            | InvokeSuperQuickRange(..) => (),

            Move(_, src) | MoveFrom16(_, src) | Move16(_, src) => {
                self.get_and_check_source(node, *src, PRIMITIVE_32)?;
            }
            MoveWide(_, src) | MoveWideFrom16(_, src) | MoveWide16(_, src) => {
                self.get_and_check_source(node, *src, WIDE_LOW)?;
            }
            MoveObject(_, src) | MoveObjectFrom16(_, src) | MoveObject16(_, src) => {
                self.get_and_check_source(node, *src, REFERENCE_OR_UNINIT)?;
            }

            MoveResult(_) => self.verify_move_result(node, PRIMITIVE_32, dex)?,
            MoveResultWide(_) => self.verify_move_result(node, WIDE_LOW, dex)?,
            MoveResultObject(_) => self.verify_move_result(node, REFERENCE, dex)?,

            MoveException(_) => {
                let typ = self.exception_type(self.nodes[node].addr(), dex)?;
                if typ.category() != Category::Reference {
                    return invalid(format!(
                        "Exception type {} is not a reference type",
                        typ.display(self.class_path)
                    ));
                }
            }

            ReturnVoid | ReturnVoidBarrier => {
                if !self.return_type.starts_with('V') {
                    return invalid(format!(
                        "Cannot use return-void with a non-void return type ({})",
                        self.return_type
                    ));
                }
            }
            Return(reg) => self.verify_return(node, *reg, mnemonic, PRIMITIVE_32)?,
            ReturnWide(reg) => self.verify_return(node, *reg, mnemonic, WIDE_LOW)?,
            ReturnObject(reg) => self.verify_return(node, *reg, mnemonic, REFERENCE)?,

            ConstClass(_, type_idx) => {
                self.class_path.class_def(type_idx.get(dex)?.descriptor(), true)?;
            }

            MonitorEnter(reg) | MonitorExit(reg) => {
                self.get_and_check_source(node, *reg, REFERENCE)?;
            }

            CheckCast(reg, type_idx) => {
                self.get_and_check_source(node, *reg, REFERENCE)?;
                let typ = self.type_of(*type_idx, dex)?;
                if typ.category() != Category::Reference {
                    return invalid(format!(
                        "Cannot use check-cast with a non-reference type {}",
                        typ.display(self.class_path)
                    ));
                }
            }
            InstanceOf(_, reg, type_idx) => {
                self.get_and_check_source(node, *reg, REFERENCE)?;
                let typ = self.type_of(*type_idx, dex)?;
                if typ.category() != Category::Reference {
                    return invalid(format!(
                        "Cannot use instance-of with a non-reference type {}",
                        typ.display(self.class_path)
                    ));
                }
            }
            ArrayLength(_, reg) => {
                let typ = self.get_and_check_source(node, *reg, REFERENCE)?;
                if typ.class().is_some() {
                    let class = self.class_of(typ)?;
                    if !class.is_array() {
                        return invalid(format!(
                            "Cannot use array-length with non-array type {}",
                            class.name()
                        ));
                    }
                }
            }
            NewInstance(dest, type_idx) => self.verify_new_instance(node, *dest, *type_idx, dex)?,
            NewArray(_, size, type_idx) => {
                self.get_and_check_source(node, *size, PRIMITIVE_32)?;
                let typ = self.type_of(*type_idx, dex)?;
                if typ.category() != Category::Reference {
                    return invalid(format!(
                        "Cannot use new-array with a non-reference type {}",
                        typ.display(self.class_path)
                    ));
                }
                let descriptor = type_idx.get(dex)?.descriptor();
                if !descriptor.starts_with('[') {
                    return invalid(format!(
                        "Cannot use non-array type \"{descriptor}\" with new-array. Use new-instance instead."
                    ));
                }
            }
            FilledNewArray(args, type_idx) => {
                let args: Vec<Reg> = args.iter().collect();
                self.verify_filled_new_array(node, &args, *type_idx, dex)?;
            }
            FilledNewArrayRange(args, type_idx) => {
                let args = range_registers(args)?;
                self.verify_filled_new_array(node, &args, *type_idx, dex)?;
            }
            FillArrayData(reg, offset) => self.verify_fill_array_data(node, *reg, *offset)?,
            Throw(reg) => self.verify_throw(node, *reg)?,
            PackedSwitch(reg, offset) | SparseSwitch(reg, offset) => {
                self.get_and_check_source(node, *reg, PRIMITIVE_32)?;
                let packed = matches!(instr, PackedSwitch(..));
                let addr = self.nodes[node].addr().checked_offset(*offset);
                let payload = addr.and_then(|addr| self.addresses.get(&addr)).map(|n| self.nodes[*n].instruction());
                let found = matches!(
                    (packed, payload),
                    (true, Some(PackedSwitchPayload(..))) | (false, Some(SparseSwitchPayload(..)))
                );
                if !found {
                    let kind = if packed { "PackedSwitchData" } else { "SparseSwitchData" };
                    let addr = addr.map_or_else(|| format!("{offset:+}"), |addr| addr.to_string());
                    return invalid(format!("There is no {kind} structure at code address {addr}"));
                }
            }

            CmplFloat(_, first, second) | CmpgFloat(_, first, second) => {
                self.get_and_check_source(node, *first, PRIMITIVE_32)?;
                self.get_and_check_source(node, *second, PRIMITIVE_32)?;
            }
            CmplDouble(_, first, second) | CmpgDouble(_, first, second) | CmpLong(_, first, second) => {
                self.get_and_check_source(node, *first, WIDE_LOW)?;
                self.get_and_check_source(node, *second, WIDE_LOW)?;
            }

            IfEq(first, second, _) | IfNe(first, second, _) => {
                let first = self.nodes[node].pre_register(*first)?;
                let second = self.nodes[node].pre_register(*second)?;
                let both = |valid: &[Category]| {
                    valid.contains(&first.category()) && valid.contains(&second.category())
                };
                if !both(REFERENCE) && !both(PRIMITIVE_32) {
                    return invalid(format!(
                        "{mnemonic} cannot be used on registers of dissimilar types {} and {}. They must both be a reference type or a primitive 32 bit type.",
                        first.display(self.class_path),
                        second.display(self.class_path)
                    ));
                }
            }
            IfLt(first, second, _) | IfGe(first, second, _) | IfGt(first, second, _) | IfLe(first, second, _) => {
                self.get_and_check_source(node, *first, PRIMITIVE_32)?;
                self.get_and_check_source(node, *second, PRIMITIVE_32)?;
            }
            IfEqz(reg, _) | IfNez(reg, _) => {
                self.get_and_check_source(node, *reg, REFERENCE_AND_PRIMITIVE_32)?;
            }
            IfLtz(reg, _) | IfGez(reg, _) | IfGtz(reg, _) | IfLez(reg, _) => {
                self.get_and_check_source(node, *reg, PRIMITIVE_32)?;
            }

            Aget(_, array, index) => self.verify_primitive_array(node, None, *array, *index, Category::Integer)?,
            AgetBoolean(_, array, index) => {
                self.verify_primitive_array(node, None, *array, *index, Category::Boolean)?;
            }
            AgetByte(_, array, index) => self.verify_primitive_array(node, None, *array, *index, Category::Byte)?,
            AgetChar(_, array, index) => self.verify_primitive_array(node, None, *array, *index, Category::Char)?,
            AgetShort(_, array, index) => self.verify_primitive_array(node, None, *array, *index, Category::Short)?,
            Aput(src, array, index) => {
                self.verify_primitive_array(node, Some(*src), *array, *index, Category::Integer)?;
            }
            AputBoolean(src, array, index) => {
                self.verify_primitive_array(node, Some(*src), *array, *index, Category::Boolean)?;
            }
            AputByte(src, array, index) => {
                self.verify_primitive_array(node, Some(*src), *array, *index, Category::Byte)?;
            }
            AputChar(src, array, index) => {
                self.verify_primitive_array(node, Some(*src), *array, *index, Category::Char)?;
            }
            AputShort(src, array, index) => {
                self.verify_primitive_array(node, Some(*src), *array, *index, Category::Short)?;
            }
            AgetWide(_, array, index) => self.verify_wide_array(node, None, *array, *index)?,
            AputWide(src, array, index) => self.verify_wide_array(node, Some(*src), *array, *index)?,
            AgetObject(_, array, index) | AputObject(_, array, index) => {
                self.get_and_check_source(node, *index, PRIMITIVE_32)?;
                if let Some(class) = self.array_class(node, *array, mnemonic)? {
                    let is_object = self
                        .class_path
                        .immediate_element_class(&class)?
                        .map_or(false, |element| element.name().starts_with(['L', '[']));
                    if !is_object {
                        return invalid(format!(
                            "Cannot use {mnemonic} with array type {}. Incorrect array type for the instruction.",
                            class.name()
                        ));
                    }
                }
            }

            Iget(_, obj, field) => self.verify_instance_field(node, None, *obj, *field, Some(Category::Integer), dex)?,
            IgetBoolean(_, obj, field) => {
                self.verify_instance_field(node, None, *obj, *field, Some(Category::Boolean), dex)?;
            }
            IgetByte(_, obj, field) => {
                self.verify_instance_field(node, None, *obj, *field, Some(Category::Byte), dex)?;
            }
            IgetChar(_, obj, field) => {
                self.verify_instance_field(node, None, *obj, *field, Some(Category::Char), dex)?;
            }
            IgetShort(_, obj, field) => {
                self.verify_instance_field(node, None, *obj, *field, Some(Category::Short), dex)?;
            }
            IgetWide(_, obj, field) => self.verify_instance_field(node, None, *obj, *field, None, dex)?,
            Iput(src, obj, field) => {
                self.verify_instance_field(node, Some(*src), *obj, *field, Some(Category::Integer), dex)?;
            }
            IputBoolean(src, obj, field) => {
                self.verify_instance_field(node, Some(*src), *obj, *field, Some(Category::Boolean), dex)?;
            }
            IputByte(src, obj, field) => {
                self.verify_instance_field(node, Some(*src), *obj, *field, Some(Category::Byte), dex)?;
            }
            IputChar(src, obj, field) => {
                self.verify_instance_field(node, Some(*src), *obj, *field, Some(Category::Char), dex)?;
            }
            IputShort(src, obj, field) => {
                self.verify_instance_field(node, Some(*src), *obj, *field, Some(Category::Short), dex)?;
            }
            IputWide(src, obj, field) => self.verify_instance_field(node, Some(*src), *obj, *field, None, dex)?,
            IgetObject(_, obj, field) => {
                self.check_field_object(node, *obj, *field, dex)?;
                self.verify_object_field(node, None, *field, dex)?;
            }
            IputObject(src, obj, field) => {
                self.check_field_object(node, *obj, *field, dex)?;
                self.verify_object_field(node, Some(*src), *field, dex)?;
            }

            Sget(_, field) => self.verify_static_field(node, None, *field, Some(Category::Integer), dex)?,
            SgetBoolean(_, field) => self.verify_static_field(node, None, *field, Some(Category::Boolean), dex)?,
            SgetByte(_, field) => self.verify_static_field(node, None, *field, Some(Category::Byte), dex)?,
            SgetChar(_, field) => self.verify_static_field(node, None, *field, Some(Category::Char), dex)?,
            SgetShort(_, field) => self.verify_static_field(node, None, *field, Some(Category::Short), dex)?,
            SgetWide(_, field) => self.verify_static_field(node, None, *field, None, dex)?,
            Sput(src, field) => self.verify_static_field(node, Some(*src), *field, Some(Category::Integer), dex)?,
            SputBoolean(src, field) => {
                self.verify_static_field(node, Some(*src), *field, Some(Category::Boolean), dex)?;
            }
            SputByte(src, field) => self.verify_static_field(node, Some(*src), *field, Some(Category::Byte), dex)?,
            SputChar(src, field) => self.verify_static_field(node, Some(*src), *field, Some(Category::Char), dex)?,
            SputShort(src, field) => {
                self.verify_static_field(node, Some(*src), *field, Some(Category::Short), dex)?;
            }
            SputWide(src, field) => self.verify_static_field(node, Some(*src), *field, None, dex)?,
            SgetObject(_, field) => self.verify_object_field(node, None, *field, dex)?,
            SputObject(src, field) => self.verify_object_field(node, Some(*src), *field, dex)?,

            InvokeVirtual(args, method)
            | InvokeSuper(args, method)
            | InvokeDirect(args, method)
            | InvokeStatic(args, method)
            | InvokeInterface(args, method) => {
                let args: Vec<Reg> = args.iter().collect();
                self.verify_invoke(node, &args, *method, invoke_kind(instr), dex)?;
            }
            InvokeVirtualRange(args, method)
            | InvokeSuperRange(args, method)
            | InvokeDirectRange(args, method)
            | InvokeStaticRange(args, method)
            | InvokeInterfaceRange(args, method) => {
                let args = range_registers(args)?;
                self.verify_invoke(node, &args, *method, invoke_kind(instr), dex)?;
            }

            NegInt(_, src) | NotInt(_, src) | NegFloat(_, src) | IntToLong(_, src) | IntToFloat(_, src)
            | IntToDouble(_, src) | FloatToInt(_, src) | FloatToLong(_, src) | FloatToDouble(_, src)
            | IntToByte(_, src) | IntToChar(_, src) | IntToShort(_, src) => {
                self.get_and_check_source(node, *src, PRIMITIVE_32)?;
            }
            NegLong(_, src) | NotLong(_, src) | NegDouble(_, src) | LongToInt(_, src) | DoubleToInt(_, src)
            | LongToFloat(_, src) | DoubleToFloat(_, src) | LongToDouble(_, src) | DoubleToLong(_, src) => {
                self.get_and_check_source(node, *src, WIDE_LOW)?;
            }

            AddInt(_, first, second) | SubInt(_, first, second) | MulInt(_, first, second)
            | DivInt(_, first, second) | RemInt(_, first, second) | ShlInt(_, first, second)
            | ShrInt(_, first, second) | UshrInt(_, first, second) | AndInt(_, first, second)
            | OrInt(_, first, second) | XorInt(_, first, second) | AddFloat(_, first, second)
            | SubFloat(_, first, second) | MulFloat(_, first, second) | DivFloat(_, first, second)
            | RemFloat(_, first, second) | AddInt2addr(first, second) | SubInt2addr(first, second)
            | MulInt2addr(first, second) | DivInt2addr(first, second) | RemInt2addr(first, second)
            | ShlInt2addr(first, second) | ShrInt2addr(first, second) | UshrInt2addr(first, second)
            | AndInt2addr(first, second) | OrInt2addr(first, second) | XorInt2addr(first, second)
            | AddFloat2addr(first, second) | SubFloat2addr(first, second) | MulFloat2addr(first, second)
            | DivFloat2addr(first, second) | RemFloat2addr(first, second) => {
                self.get_and_check_source(node, *first, PRIMITIVE_32)?;
                self.get_and_check_source(node, *second, PRIMITIVE_32)?;
            }
            AddLong(_, first, second) | SubLong(_, first, second) | MulLong(_, first, second)
            | DivLong(_, first, second) | RemLong(_, first, second) | AndLong(_, first, second)
            | OrLong(_, first, second) | XorLong(_, first, second) | AddDouble(_, first, second)
            | SubDouble(_, first, second) | MulDouble(_, first, second) | DivDouble(_, first, second)
            | RemDouble(_, first, second) | AddLong2addr(first, second) | SubLong2addr(first, second)
            | MulLong2addr(first, second) | DivLong2addr(first, second) | RemLong2addr(first, second)
            | AndLong2addr(first, second) | OrLong2addr(first, second) | XorLong2addr(first, second)
            | AddDouble2addr(first, second) | SubDouble2addr(first, second)
            | MulDouble2addr(first, second) | DivDouble2addr(first, second)
            | RemDouble2addr(first, second) => {
                self.get_and_check_source(node, *first, WIDE_LOW)?;
                self.get_and_check_source(node, *second, WIDE_LOW)?;
            }
            ShlLong(_, first, second) | ShrLong(_, first, second) | UshrLong(_, first, second)
            | ShlLong2addr(first, second) | ShrLong2addr(first, second) | UshrLong2addr(first, second) => {
                self.get_and_check_source(node, *first, WIDE_LOW)?;
                self.get_and_check_source(node, *second, PRIMITIVE_32)?;
            }

            AddIntLit16(_, src, _) | RsubInt(_, src, _) | MulIntLit16(_, src, _) | DivIntLit16(_, src, _)
            | RemIntLit16(_, src, _) | AndIntLit16(_, src, _) | OrIntLit16(_, src, _)
            | XorIntLit16(_, src, _) => {
                self.get_and_check_source(node, *src, PRIMITIVE_32)?;
            }
            AddIntLit8(_, src, _) | RsubIntLit8(_, src, _) | MulIntLit8(_, src, _) | DivIntLit8(_, src, _)
            | RemIntLit8(_, src, _) | AndIntLit8(_, src, _) | OrIntLit8(_, src, _) | XorIntLit8(_, src, _)
            | ShlIntLit8(_, src, _) | ShrIntLit8(_, src, _) | UshrIntLit8(_, src, _) => {
                self.get_and_check_source(node, *src, PRIMITIVE_32)?;
            }
        }
        Ok(())
    }

    fn verify_move_result(&self, node: usize, allowed: &[Category], dex: &Dex) -> AnalysisResult<()> {
        if node > 1 && matches!(self.nodes[node - 1].instruction(), Instr::UnresolvedOdex(..)) {
            return Ok(());
        }
        if let Some(typ) = self.result_type(node, dex)? {
            if !allowed.contains(&typ.category()) {
                return invalid(format!(
                    "Wrong move-result* instruction for return value {}",
                    typ.display(self.class_path)
                ));
            }
        }
        Ok(())
    }

    fn verify_return(&self, node: usize, reg: Reg, mnemonic: &str, valid: &[Category]) -> AnalysisResult<()> {
        let value = self.get_and_check_source(node, reg, valid)?;
        if self.return_type.starts_with('V') {
            return invalid("Cannot use return with a void return type. Use return-void instead");
        }
        let expected = RegisterType::for_type(&self.return_type, self.class_path)?;
        if !valid.contains(&expected.category()) {
            return invalid(format!(
                "Cannot use {mnemonic} with return type {}",
                self.return_type
            ));
        }

        // values returned through an interface type are not checked
        if valid == REFERENCE && value.category() == Category::Reference {
            let return_class = self.class_of(expected)?;
            if !return_class.is_interface()? {
                let value_class = self.class_of(value)?;
                if !self.class_path.extends_class(&value_class, &return_class)? {
                    return invalid(format!(
                        "The return value in register {reg} ({}) is not compatible with the method's return type {}",
                        value_class.name(),
                        return_class.name()
                    ));
                }
            }
        }
        Ok(())
    }

    fn verify_new_instance(
        &self,
        node: usize,
        dest: Reg,
        type_idx: Index<TypeIdItem>,
        dex: &Dex,
    ) -> AnalysisResult<()> {
        let instr = &self.nodes[node];
        let created = instr.post_register(dest)?;
        if created.category() != Category::Unknown {
            for (i, typ) in instr.pre_registers().iter().enumerate() {
                if i != dest.index() && *typ == created {
                    return invalid(format!(
                        "Register v{i} contains an uninitialized reference that was created by this new-instance instruction."
                    ));
                }
            }
        }

        let typ = self.type_of(type_idx, dex)?;
        if typ.category() != Category::Reference {
            return invalid(format!(
                "Cannot use new-instance with a non-reference type {}",
                typ.display(self.class_path)
            ));
        }
        let descriptor = type_idx.get(dex)?.descriptor();
        if descriptor.starts_with('[') {
            return invalid(format!(
                "Cannot use array type \"{descriptor}\" with new-instance. Use new-array instead."
            ));
        }
        Ok(())
    }

    fn verify_filled_new_array(
        &self,
        node: usize,
        args: &[Reg],
        type_idx: Index<TypeIdItem>,
        dex: &Dex,
    ) -> AnalysisResult<()> {
        let class = self.class_path.class_def(type_idx.get(dex)?.descriptor(), true)?;
        let (Some(element), Some(base)) = (
            self.class_path.immediate_element_class(&class)?,
            self.class_path.base_element_class(&class)?,
        ) else {
            return invalid(format!(
                "Cannot use non-array type \"{}\" with new-array. Use new-instance instead.",
                class.name()
            ));
        };
        if base.name().starts_with(['J', 'D']) {
            return invalid("Cannot use filled-new-array to create an array of wide values (long or double)");
        }

        let element_type = RegisterType::for_type(element.name(), self.class_path)?;
        for reg in args {
            let typ = self.nodes[node].pre_register(*reg)?;
            if !typ.can_be_assigned_to(element_type, self.class_path)? {
                return invalid(format!(
                    "Register {reg} is of type {} and is incompatible with the array type {}",
                    typ.display(self.class_path),
                    class.name()
                ));
            }
        }
        Ok(())
    }

    fn verify_fill_array_data(&self, node: usize, reg: Reg, offset: i32) -> AnalysisResult<()> {
        let typ = self.nodes[node].pre_register(reg)?;
        match typ.category() {
            Category::Null => return Ok(()),
            Category::Reference => (),
            _ => {
                return invalid(format!(
                    "Cannot use fill-array-data with non-array register {reg} of type {}",
                    typ.display(self.class_path)
                ))
            }
        }
        let class = self.class_of(typ)?;
        let not_primitive_array = || {
            invalid(format!(
                "Cannot use fill-array-data with array type {}. It can only be used with a one-dimensional array of primitives.",
                class.name()
            ))
        };
        if class.array_dimensions() != Some(1) {
            return not_primitive_array();
        }
        let Some(width) = self
            .class_path
            .base_element_class(&class)?
            .and_then(|base| fill_element_width(base.name()))
        else {
            return not_primitive_array();
        };

        let addr = self.nodes[node].addr().checked_offset(offset);
        let payload = addr
            .and_then(|addr| self.addresses.get(&addr))
            .map(|n| self.nodes[*n].instruction());
        let Some(Instr::FillArrayDataPayload(elements)) = payload else {
            let addr = addr.map_or_else(|| format!("{offset:+}"), |addr| addr.to_string());
            return invalid(format!(
                "Could not find an array data structure at code address {addr}"
            ));
        };
        if let Some(found) = elements.first().map(Vec::len) {
            if found != width {
                return invalid(format!(
                    "The array data at code address {} does not have the correct element width for array type {}. Expecting element width {width}, got element width {found}.",
                    addr.map(|addr| addr.to_string()).unwrap_or_default(),
                    class.name()
                ));
            }
        }
        Ok(())
    }

    fn verify_throw(&self, node: usize, reg: Reg) -> AnalysisResult<()> {
        let typ = self.nodes[node].pre_register(reg)?;
        match typ.category() {
            Category::Null => Ok(()),
            Category::Reference => {
                let class = self.class_of(typ)?;
                let throwable = self.class_path.class_def(THROWABLE, true)?;
                if !self.class_path.extends_class(&class, &throwable)? {
                    return invalid(format!(
                        "Cannot use throw with non-throwable type {} in register {reg}",
                        class.name()
                    ));
                }
                Ok(())
            }
            _ => invalid(format!(
                "Cannot use throw with non-reference type {} in register {reg}",
                typ.display(self.class_path)
            )),
        }
    }

    /// The array class held by a register, `None` when it holds `null`.
    fn array_class(&self, node: usize, array: Reg, mnemonic: &str) -> AnalysisResult<Option<Rc<ClassDef>>> {
        let typ = self.nodes[node].pre_register(array)?;
        match typ.category() {
            Category::Null => Ok(None),
            Category::Reference => {
                let class = self.class_of(typ)?;
                if !class.is_array() {
                    return invalid(format!(
                        "Cannot use {mnemonic} with non-array type {}",
                        class.name()
                    ));
                }
                Ok(Some(class))
            }
            other => invalid(format!("Cannot use {mnemonic} with non-array type {other}")),
        }
    }

    /// One-dimensional array class held by a register, `None` when it holds `null`.
    fn flat_array_class(&self, node: usize, array: Reg, mnemonic: &str) -> AnalysisResult<Option<Rc<ClassDef>>> {
        let class = self.array_class(node, array, mnemonic)?;
        if let Some(class) = &class {
            if class.array_dimensions() != Some(1) {
                return invalid(format!(
                    "Cannot use {mnemonic} with multi-dimensional array type {}",
                    class.name()
                ));
            }
        }
        Ok(class)
    }

    fn verify_primitive_array(
        &self,
        node: usize,
        src: Option<Reg>,
        array: Reg,
        index: Reg,
        category: Category,
    ) -> AnalysisResult<()> {
        let mnemonic = self.nodes[node].instruction().mnemonic();
        self.get_and_check_source(node, index, PRIMITIVE_32)?;
        if let Some(src) = src {
            let value = self.nodes[node].pre_register(src)?;
            if !value.can_be_assigned_to(category.into(), self.class_path)? {
                return invalid(format!(
                    "Cannot use {mnemonic} with source register type {}.",
                    value.display(self.class_path)
                ));
            }
        }

        if let Some(class) = self.flat_array_class(node, array, mnemonic)? {
            let base = match self.class_path.base_element_class(&class)? {
                Some(base) => RegisterType::for_type(base.name(), self.class_path)?.category(),
                None => Category::Conflicted,
            };
            if !check_array_field_assignment(base, category) {
                return invalid(format!(
                    "Cannot use {mnemonic} with array type {}. Incorrect array type for the instruction.",
                    class.name()
                ));
            }
        }
        Ok(())
    }

    fn verify_wide_array(&self, node: usize, src: Option<Reg>, array: Reg, index: Reg) -> AnalysisResult<()> {
        let mnemonic = self.nodes[node].instruction().mnemonic();
        self.get_and_check_source(node, index, PRIMITIVE_32)?;
        if let Some(src) = src {
            self.get_and_check_source(node, src, WIDE_LOW)?;
        }
        if let Some(class) = self.flat_array_class(node, array, mnemonic)? {
            let is_wide = self
                .class_path
                .base_element_class(&class)?
                .map_or(false, |base| base.name().starts_with(['J', 'D']));
            if !is_wide {
                return invalid(format!(
                    "Cannot use {mnemonic} with array type {}. Incorrect array type for the instruction.",
                    class.name()
                ));
            }
        }
        Ok(())
    }

    /// Checks that the object register of an instance field access holds an instance of the
    /// class defining the field.
    fn check_field_object(&self, node: usize, obj: Reg, field: Index<FieldIdItem>, dex: &Dex) -> AnalysisResult<()> {
        let obj_type = self.get_and_check_source(node, obj, REFERENCE_OR_UNINIT_THIS)?;
        if obj_type.category() == Category::Null {
            return Ok(());
        }
        let class = self.class_of(obj_type)?;
        let field_class = self
            .class_path
            .class_def(field.get(dex)?.class_descriptor(dex)?, true)?;
        if !self.class_path.extends_class(&class, &field_class)? {
            return invalid(format!(
                "Cannot access field {} through type {}",
                field_string(field, dex)?,
                class.name()
            ));
        }
        Ok(())
    }

    /// Checks a source register against the category of a 32-bit primitive store.
    fn check_primitive_store(&self, node: usize, src: Reg, category: Category) -> AnalysisResult<()> {
        let mut value = self.nodes[node].pre_register(src)?;
        // compilers store bytes into boolean fields
        if value.category() == Category::Byte && category == Category::Boolean {
            value = Category::Boolean.into();
        }
        if !value.can_be_assigned_to(category.into(), self.class_path)? {
            return invalid(format!(
                "Cannot use {} with source register type {}.",
                self.nodes[node].instruction().mnemonic(),
                value.display(self.class_path)
            ));
        }
        Ok(())
    }

    /// Checks the declared type of a field against the instruction accessing it: `category`
    /// for 32-bit primitives, `None` for wide values.
    fn check_field_type(
        &self,
        node: usize,
        field: Index<FieldIdItem>,
        category: Option<Category>,
        dex: &Dex,
    ) -> AnalysisResult<()> {
        let typ = RegisterType::for_type(field.get(dex)?.type_descriptor(dex)?, self.class_path)?;
        let valid = match category {
            Some(category) => check_array_field_assignment(typ.category(), category),
            None => WIDE_LOW.contains(&typ.category()),
        };
        if !valid {
            return invalid(format!(
                "Cannot use {} with field {}. Incorrect field type for the instruction.",
                self.nodes[node].instruction().mnemonic(),
                field_string(field, dex)?
            ));
        }
        Ok(())
    }

    fn verify_instance_field(
        &self,
        node: usize,
        src: Option<Reg>,
        obj: Reg,
        field: Index<FieldIdItem>,
        category: Option<Category>,
        dex: &Dex,
    ) -> AnalysisResult<()> {
        self.check_field_object(node, obj, field, dex)?;
        self.verify_static_field(node, src, field, category, dex)
    }

    fn verify_static_field(
        &self,
        node: usize,
        src: Option<Reg>,
        field: Index<FieldIdItem>,
        category: Option<Category>,
        dex: &Dex,
    ) -> AnalysisResult<()> {
        match (src, category) {
            (Some(src), Some(category)) => self.check_primitive_store(node, src, category)?,
            (Some(src), None) => {
                self.get_and_check_source(node, src, WIDE_LOW)?;
            }
            (None, _) => (),
        }
        self.check_field_type(node, field, category, dex)
    }

    fn verify_object_field(
        &self,
        node: usize,
        src: Option<Reg>,
        field: Index<FieldIdItem>,
        dex: &Dex,
    ) -> AnalysisResult<()> {
        let value = match src {
            Some(src) => Some(self.get_and_check_source(node, src, REFERENCE)?),
            None => None,
        };
        let field_type = RegisterType::for_type(field.get(dex)?.type_descriptor(dex)?, self.class_path)?;
        if field_type.category() != Category::Reference {
            return invalid(format!(
                "Cannot use {} with field {}. Incorrect field type for the instruction.",
                self.nodes[node].instruction().mnemonic(),
                field_string(field, dex)?
            ));
        }

        let Some(value) = value.filter(|value| value.category() != Category::Null) else {
            return Ok(());
        };
        let field_class = self.class_of(field_type)?;
        if field_class.is_interface()? {
            return Ok(());
        }
        let value_class = self.class_of(value)?;
        if !self.class_path.extends_class(&value_class, &field_class)? {
            return invalid(format!(
                "Cannot store a value of type {} into a field of type {}",
                value_class.name(),
                field_class.name()
            ));
        }
        Ok(())
    }

    fn verify_invoke(
        &self,
        node: usize,
        args: &[Reg],
        method: Index<MethodIdItem>,
        kind: Invoke,
        dex: &Dex,
    ) -> AnalysisResult<()> {
        let mnemonic = self.nodes[node].instruction().mnemonic();
        let item = method.get(dex)?;
        let method_string = item.full_string(dex)?;

        let is_init = item.name().starts_with('<');
        if is_init && kind != Invoke::Direct {
            return invalid(format!(
                "Cannot call constructor {method_string} with {mnemonic}"
            ));
        }

        let method_class = self.class_path.class_def(item.class_descriptor(dex)?, true)?;
        if kind == Invoke::Interface {
            if !method_class.is_interface()? {
                return invalid(format!(
                    "Cannot call method {method_string} with {mnemonic}. {} is not an interface class.",
                    method_class.name()
                ));
            }
        } else if method_class.is_interface()? {
            return invalid(format!(
                "Cannot call method {method_string} with {mnemonic}. {} is an interface class. Use invoke-interface or invoke-interface/range instead.",
                method_class.name()
            ));
        }

        if kind == Invoke::Super {
            let Some(superclass) = self.class.superclass() else {
                return invalid(format!(
                    "Cannot call method {method_string} with {mnemonic}. {} has no superclass",
                    self.class.name()
                ));
            };
            let superclass = self.class_path.get(superclass)?;
            if !self.class_path.extends_class(&superclass, &method_class)? {
                return invalid(format!(
                    "Cannot call method {method_string} with {mnemonic}. {} is not an ancestor of the current class {}",
                    method_class.name(),
                    self.class.name()
                ));
            }
            if !superclass.has_virtual_method(&item.short_string(dex)?)? {
                return invalid(format!(
                    "Cannot call method {method_string} with {mnemonic}. The superclass {} has no such method",
                    superclass.name()
                ));
            }
        }

        let proto = item.proto(dex)?;
        let expected = proto.parameter_registers(dex)? + usize::from(kind != Invoke::Static);
        if expected != args.len() {
            return invalid(format!(
                "The number of registers does not match the number of parameters for method {method_string}. Expecting {expected} registers, got {}.",
                args.len()
            ));
        }

        let mut args = args.iter().copied();
        if kind != Invoke::Static {
            if let Some(obj) = args.next() {
                self.check_invoke_object(node, obj, &method_class, &method_string, is_init, kind)?;
            }
        }

        for (i, parameter) in proto.parameter_descriptors(dex)?.into_iter().enumerate() {
            let Some(reg) = args.next() else {
                break;
            };
            let expected = RegisterType::for_type(parameter, self.class_path)?;
            let actual = if WIDE_LOW.contains(&expected.category()) {
                let actual = self.get_and_check_source(node, reg, WIDE_LOW)?;
                match args.next() {
                    None => {
                        return invalid(format!(
                            "No 2nd register specified for wide register pair v{}",
                            i + 1
                        ))
                    }
                    Some(next) if next != reg.next() => {
                        return invalid(format!(
                            "Invalid wide register pair ({reg}, {next}). Registers must be consecutive."
                        ))
                    }
                    Some(_) => (),
                }
                actual
            } else {
                self.nodes[node].pre_register(reg)?
            };
            if !actual.can_be_assigned_to(expected, self.class_path)? {
                return invalid(format!(
                    "Invalid register type {} for parameter {} {}.",
                    actual.display(self.class_path),
                    i + 1,
                    expected.display(self.class_path)
                ));
            }
        }
        Ok(())
    }

    fn check_invoke_object(
        &self,
        node: usize,
        obj: Reg,
        method_class: &ClassDef,
        method_string: &str,
        is_init: bool,
        kind: Invoke,
    ) -> AnalysisResult<()> {
        let obj_type = self.nodes[node].pre_register(obj)?;
        match obj_type.category() {
            Category::UninitRef | Category::UninitThis if !is_init => {
                return invalid(format!(
                    "Cannot invoke non-<init> method {method_string} on uninitialized reference type {}",
                    self.type_name(obj_type)
                ));
            }
            Category::UninitRef | Category::UninitThis => (),
            Category::Reference if is_init => {
                return invalid(format!(
                    "Cannot invoke {method_string} on initialized reference type {}",
                    self.type_name(obj_type)
                ));
            }
            Category::Reference => (),
            Category::Null if is_init => {
                return invalid(format!("Cannot invoke {method_string} on a null reference"));
            }
            Category::Null => return Ok(()),
            _ => {
                return invalid(format!(
                    "Cannot invoke {method_string} on non-reference type {}",
                    obj_type.display(self.class_path)
                ));
            }
        }

        let Some(uid) = obj_type.class() else {
            return Ok(());
        };
        let obj_class = self.class_path.get(uid)?;
        if is_init && obj_class.superclass() == Some(method_class.uid()) && self.method_name != "<init>" {
            return invalid(format!(
                "Cannot call {method_string} on type {}. The object type must match the method type exactly",
                obj_class.name()
            ));
        }
        if kind != Invoke::Interface && !self.class_path.extends_class(&obj_class, method_class)? {
            return invalid(format!(
                "Cannot call method {method_string} on an object of type {}, which does not extend {}.",
                obj_class.name(),
                method_class.name()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_field_assignment() {
        assert!(check_array_field_assignment(Category::Integer, Category::Integer));
        assert!(check_array_field_assignment(Category::Integer, Category::Float));
        assert!(check_array_field_assignment(Category::Float, Category::Integer));
        assert!(!check_array_field_assignment(Category::Byte, Category::Boolean));
        assert!(!check_array_field_assignment(Category::LongLo, Category::Integer));
    }

    #[test]
    fn element_widths() {
        assert_eq!(fill_element_width("Z"), Some(1));
        assert_eq!(fill_element_width("S"), Some(2));
        assert_eq!(fill_element_width("F"), Some(4));
        assert_eq!(fill_element_width("J"), Some(8));
        assert_eq!(fill_element_width("Ljava/lang/Object;"), None);
    }
}
