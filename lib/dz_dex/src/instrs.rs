//! Dalvik bytecode instructions definitions.

use crate::errors::DexResult;
use crate::fields::FieldIdItem;
use crate::methods::MethodIdItem;
use crate::registers::{Reg, RegList, RegRange};
use crate::strings::StringIdItem;
use crate::types::TypeIdItem;
use crate::{Addr, Dex, DexIndex, Index, PrettyPrint};
use instruction_derive::Instruction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opcode metadata shared by every instruction.
pub trait Instruction {
    fn mnemonic(&self) -> &str;
    fn format(&self) -> &'static str;
    /// Size in 16-bit code units.
    fn size(&self) -> usize;
    fn can_throw(&self) -> bool;
    fn can_continue(&self) -> bool;
    /// Whether the instruction leaves a value for a following `move-result*`.
    fn sets_result(&self) -> bool;
    fn sets_register(&self) -> bool;
    fn sets_wide_register(&self) -> bool;
    fn odex_only(&self) -> bool;
    fn odexed_instance_quick(&self) -> bool;
    fn odexed_instance_volatile(&self) -> bool;
    fn odexed_static_volatile(&self) -> bool;
    fn can_initialize_reference(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct LabeledInstr {
    pub(crate) addr: Addr,
    pub(crate) instr: Instr,
}

impl LabeledInstr {
    #[inline]
    #[must_use]
    pub const fn addr(&self) -> Addr {
        self.addr
    }

    #[inline]
    #[must_use]
    pub const fn instr(&self) -> &Instr {
        &self.instr
    }

    #[inline]
    #[must_use]
    pub fn into_instr(self) -> Instr {
        self.instr
    }
}

/// A reference carried by an instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    String(Index<StringIdItem>),
    Type(Index<TypeIdItem>),
    Field(Index<FieldIdItem>),
    Method(Index<MethodIdItem>),
}

/// Registers passed to an invoke-kind instruction.
#[derive(Debug, Clone, Copy)]
pub enum InvokeArgs<'a> {
    List(&'a RegList),
    Range(&'a RegRange),
}

impl<'a> InvokeArgs<'a> {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::List(list) => list.len(),
            Self::Range(range) => range.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn first(&self) -> Option<Reg> {
        match self {
            Self::List(list) => list.get(0),
            Self::Range(range) => range.iter().next(),
        }
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<Reg> {
        match self {
            Self::List(list) => list.iter().collect(),
            Self::Range(range) => range.iter().collect(),
        }
    }
}

impl<'a> fmt::Display for InvokeArgs<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::List(list) => write!(f, "{list}"),
            Self::Range(range) => write!(f, "{range}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Instruction)]
pub enum Instr {
    /// Waste cycles.
    #[instruction(mnemonic = "nop", format = "10x", can_continue)]
    Nop,

    /// Move the contents of one non-object register to another.
    #[instruction(mnemonic = "move", format = "12x", can_continue, sets_register)]
    Move(Reg, Reg),
    #[instruction(mnemonic = "move/from16", format = "22x", can_continue, sets_register)]
    MoveFrom16(Reg, Reg),
    #[instruction(mnemonic = "move/16", format = "32x", can_continue, sets_register)]
    Move16(Reg, Reg),

    /// Move the contents of one register-pair to another.
    #[instruction(
        mnemonic = "move-wide",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MoveWide(Reg, Reg),
    #[instruction(
        mnemonic = "move-wide/from16",
        format = "22x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MoveWideFrom16(Reg, Reg),
    #[instruction(
        mnemonic = "move-wide/16",
        format = "32x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MoveWide16(Reg, Reg),

    /// Move the contents of one object-bearing register to another.
    #[instruction(mnemonic = "move-object", format = "12x", can_continue, sets_register)]
    MoveObject(Reg, Reg),
    #[instruction(mnemonic = "move-object/from16", format = "22x", can_continue, sets_register)]
    MoveObjectFrom16(Reg, Reg),
    #[instruction(mnemonic = "move-object/16", format = "32x", can_continue, sets_register)]
    MoveObject16(Reg, Reg),

    /// Move the single-word non-object result of the most recent invoke-kind into
    /// the indicated register.
    #[instruction(mnemonic = "move-result", format = "11x", can_continue, sets_register)]
    MoveResult(Reg),
    /// Move the double-word result of the most recent invoke-kind into the indicated register.
    #[instruction(
        mnemonic = "move-result-wide",
        format = "11x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MoveResultWide(Reg),
    /// Move the object result of the most recent invoke-kind or filled-new-array into the
    /// indicated register.
    #[instruction(mnemonic = "move-result-object", format = "11x", can_continue, sets_register)]
    MoveResultObject(Reg),
    /// Save a just-caught exception into the given register.
    ///
    /// This must be the first instruction of any exception handler whose caught exception is
    /// not to be ignored, and this instruction must only ever occur as the first instruction of
    /// an exception handler; anywhere else is invalid.
    #[instruction(mnemonic = "move-exception", format = "11x", can_continue, sets_register)]
    MoveException(Reg),

    /// Return from a void method.
    #[instruction(mnemonic = "return-void", format = "10x")]
    ReturnVoid,
    /// Return from a single-width (32-bit) non-object value-returning method.
    #[instruction(mnemonic = "return", format = "11x")]
    Return(Reg),
    /// Return from a double-width (64-bit) value-returning method.
    #[instruction(mnemonic = "return-wide", format = "11x")]
    ReturnWide(Reg),
    /// Return from an object-returning method.
    #[instruction(mnemonic = "return-object", format = "11x")]
    ReturnObject(Reg),

    /// Move the given literal value (sign-extended to 32 bits) into the specified register.
    #[instruction(mnemonic = "const/4", format = "11n", can_continue, sets_register)]
    Const4(Reg, i8),
    #[instruction(mnemonic = "const/16", format = "21s", can_continue, sets_register)]
    Const16(Reg, i16),
    #[instruction(mnemonic = "const", format = "31i", can_continue, sets_register)]
    Const(Reg, i32),
    /// Move the given literal value (right-zero-extended to 32 bits) into the specified register.
    #[instruction(mnemonic = "const/high16", format = "21h", can_continue, sets_register)]
    ConstHigh16(Reg, i16),

    /// Move the given literal value (sign-extended to 64 bits) into the specified register-pair.
    #[instruction(
        mnemonic = "const-wide/16",
        format = "21s",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ConstWide16(Reg, i16),
    #[instruction(
        mnemonic = "const-wide/32",
        format = "31i",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ConstWide32(Reg, i32),
    #[instruction(
        mnemonic = "const-wide",
        format = "51l",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ConstWide(Reg, i64),
    /// Move the given literal value (right-zero-extended to 64 bits) into the specified register-pair.
    #[instruction(
        mnemonic = "const-wide/high16",
        format = "21h",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ConstWideHigh16(Reg, i16),

    /// Move a reference to the string specified by the given index into the specified register.
    #[instruction(
        mnemonic = "const-string",
        format = "21c",
        can_throw,
        can_continue,
        sets_register
    )]
    ConstString(Reg, Index<StringIdItem>),
    #[instruction(
        mnemonic = "const-string/jumbo",
        format = "31c",
        can_throw,
        can_continue,
        sets_register
    )]
    ConstStringJumbo(Reg, Index<StringIdItem>),
    /// Move a reference to the class specified by the given index into the specified register.
    #[instruction(
        mnemonic = "const-class",
        format = "21c",
        can_throw,
        can_continue,
        sets_register
    )]
    ConstClass(Reg, Index<TypeIdItem>),

    /// Acquire the monitor for the indicated object.
    #[instruction(mnemonic = "monitor-enter", format = "11x", can_throw, can_continue)]
    MonitorEnter(Reg),
    /// Release the monitor for the indicated object.
    #[instruction(mnemonic = "monitor-exit", format = "11x", can_throw, can_continue)]
    MonitorExit(Reg),

    /// Throw a `ClassCastException` if the reference in the given register cannot be cast to the
    /// indicated type.
    #[instruction(
        mnemonic = "check-cast",
        format = "21c",
        can_throw,
        can_continue,
        sets_register
    )]
    CheckCast(Reg, Index<TypeIdItem>),
    /// Store in the given destination register 1 if the indicated reference is an instance of
    /// the given type, or 0 if not.
    #[instruction(
        mnemonic = "instance-of",
        format = "22c",
        can_throw,
        can_continue,
        sets_register
    )]
    InstanceOf(Reg, Reg, Index<TypeIdItem>),
    /// Store in the given destination register the length of the indicated array, in entries.
    #[instruction(
        mnemonic = "array-length",
        format = "12x",
        can_throw,
        can_continue,
        sets_register
    )]
    ArrayLength(Reg, Reg),
    /// Construct a new instance of the indicated type, storing a reference to it in the destination.
    #[instruction(
        mnemonic = "new-instance",
        format = "21c",
        can_throw,
        can_continue,
        sets_register
    )]
    NewInstance(Reg, Index<TypeIdItem>),
    /// Construct a new array of the indicated type and size.
    #[instruction(
        mnemonic = "new-array",
        format = "22c",
        can_throw,
        can_continue,
        sets_register
    )]
    NewArray(Reg, Reg, Index<TypeIdItem>),

    /// Construct an array of the given type and size, filling it with the supplied contents.
    ///
    /// The constructed instance is stored as a "result", to be moved with `move-result-object`.
    #[instruction(
        mnemonic = "filled-new-array",
        format = "35c",
        can_throw,
        can_continue,
        sets_result
    )]
    FilledNewArray(RegList, Index<TypeIdItem>),
    #[instruction(
        mnemonic = "filled-new-array/range",
        format = "3rc",
        can_throw,
        can_continue,
        sets_result
    )]
    FilledNewArrayRange(RegRange, Index<TypeIdItem>),

    /// Fill the given array with the indicated data payload.
    #[instruction(mnemonic = "fill-array-data", format = "31t", can_continue)]
    FillArrayData(Reg, i32),

    /// Throw the indicated exception.
    #[instruction(mnemonic = "throw", format = "11x", can_throw)]
    Throw(Reg),

    /// Unconditionally jump to the indicated instruction.
    #[instruction(mnemonic = "goto", format = "10t")]
    Goto(i8),
    #[instruction(mnemonic = "goto/16", format = "20t")]
    Goto16(i16),
    #[instruction(mnemonic = "goto/32", format = "30t")]
    Goto32(i32),

    /// Jump to a new instruction based on the value in the given register, using a table of
    /// offsets corresponding to each value in a particular integral range.
    #[instruction(mnemonic = "packed-switch", format = "31t", can_continue)]
    PackedSwitch(Reg, i32),
    /// Jump to a new instruction based on the value in the given register, using an ordered
    /// table of value-offset pairs.
    #[instruction(mnemonic = "sparse-switch", format = "31t", can_continue)]
    SparseSwitch(Reg, i32),

    /// Perform the indicated floating point or long comparison.
    #[instruction(mnemonic = "cmpl-float", format = "23x", can_continue, sets_register)]
    CmplFloat(Reg, Reg, Reg),
    #[instruction(mnemonic = "cmpg-float", format = "23x", can_continue, sets_register)]
    CmpgFloat(Reg, Reg, Reg),
    #[instruction(mnemonic = "cmpl-double", format = "23x", can_continue, sets_register)]
    CmplDouble(Reg, Reg, Reg),
    #[instruction(mnemonic = "cmpg-double", format = "23x", can_continue, sets_register)]
    CmpgDouble(Reg, Reg, Reg),
    #[instruction(mnemonic = "cmp-long", format = "23x", can_continue, sets_register)]
    CmpLong(Reg, Reg, Reg),

    /// Branch to the given destination if the given two registers' values compare as specified.
    #[instruction(mnemonic = "if-eq", format = "22t", can_continue)]
    IfEq(Reg, Reg, i16),
    #[instruction(mnemonic = "if-ne", format = "22t", can_continue)]
    IfNe(Reg, Reg, i16),
    #[instruction(mnemonic = "if-lt", format = "22t", can_continue)]
    IfLt(Reg, Reg, i16),
    #[instruction(mnemonic = "if-ge", format = "22t", can_continue)]
    IfGe(Reg, Reg, i16),
    #[instruction(mnemonic = "if-gt", format = "22t", can_continue)]
    IfGt(Reg, Reg, i16),
    #[instruction(mnemonic = "if-le", format = "22t", can_continue)]
    IfLe(Reg, Reg, i16),

    /// Branch to the given destination if the given register's value compares with 0 as specified.
    #[instruction(mnemonic = "if-eqz", format = "21t", can_continue)]
    IfEqz(Reg, i16),
    #[instruction(mnemonic = "if-nez", format = "21t", can_continue)]
    IfNez(Reg, i16),
    #[instruction(mnemonic = "if-ltz", format = "21t", can_continue)]
    IfLtz(Reg, i16),
    #[instruction(mnemonic = "if-gez", format = "21t", can_continue)]
    IfGez(Reg, i16),
    #[instruction(mnemonic = "if-gtz", format = "21t", can_continue)]
    IfGtz(Reg, i16),
    #[instruction(mnemonic = "if-lez", format = "21t", can_continue)]
    IfLez(Reg, i16),

    /// Perform the identified array operation at the identified index of the given array,
    /// loading or storing into the value register.
    #[instruction(mnemonic = "aget", format = "23x", can_throw, can_continue, sets_register)]
    Aget(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "aget-wide",
        format = "23x",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register
    )]
    AgetWide(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "aget-object",
        format = "23x",
        can_throw,
        can_continue,
        sets_register
    )]
    AgetObject(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "aget-boolean",
        format = "23x",
        can_throw,
        can_continue,
        sets_register
    )]
    AgetBoolean(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "aget-byte",
        format = "23x",
        can_throw,
        can_continue,
        sets_register
    )]
    AgetByte(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "aget-char",
        format = "23x",
        can_throw,
        can_continue,
        sets_register
    )]
    AgetChar(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "aget-short",
        format = "23x",
        can_throw,
        can_continue,
        sets_register
    )]
    AgetShort(Reg, Reg, Reg),
    #[instruction(mnemonic = "aput", format = "23x", can_throw, can_continue)]
    Aput(Reg, Reg, Reg),
    #[instruction(mnemonic = "aput-wide", format = "23x", can_throw, can_continue)]
    AputWide(Reg, Reg, Reg),
    #[instruction(mnemonic = "aput-object", format = "23x", can_throw, can_continue)]
    AputObject(Reg, Reg, Reg),
    #[instruction(mnemonic = "aput-boolean", format = "23x", can_throw, can_continue)]
    AputBoolean(Reg, Reg, Reg),
    #[instruction(mnemonic = "aput-byte", format = "23x", can_throw, can_continue)]
    AputByte(Reg, Reg, Reg),
    #[instruction(mnemonic = "aput-char", format = "23x", can_throw, can_continue)]
    AputChar(Reg, Reg, Reg),
    #[instruction(mnemonic = "aput-short", format = "23x", can_throw, can_continue)]
    AputShort(Reg, Reg, Reg),

    /// Perform the identified object instance field operation with the identified field,
    /// loading or storing into the value register.
    #[instruction(mnemonic = "iget", format = "22c", can_throw, can_continue, sets_register)]
    Iget(Reg, Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "iget-wide",
        format = "22c",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register
    )]
    IgetWide(Reg, Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "iget-object",
        format = "22c",
        can_throw,
        can_continue,
        sets_register
    )]
    IgetObject(Reg, Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "iget-boolean",
        format = "22c",
        can_throw,
        can_continue,
        sets_register
    )]
    IgetBoolean(Reg, Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "iget-byte",
        format = "22c",
        can_throw,
        can_continue,
        sets_register
    )]
    IgetByte(Reg, Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "iget-char",
        format = "22c",
        can_throw,
        can_continue,
        sets_register
    )]
    IgetChar(Reg, Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "iget-short",
        format = "22c",
        can_throw,
        can_continue,
        sets_register
    )]
    IgetShort(Reg, Reg, Index<FieldIdItem>),
    #[instruction(mnemonic = "iput", format = "22c", can_throw, can_continue)]
    Iput(Reg, Reg, Index<FieldIdItem>),
    #[instruction(mnemonic = "iput-wide", format = "22c", can_throw, can_continue)]
    IputWide(Reg, Reg, Index<FieldIdItem>),
    #[instruction(mnemonic = "iput-object", format = "22c", can_throw, can_continue)]
    IputObject(Reg, Reg, Index<FieldIdItem>),
    #[instruction(mnemonic = "iput-boolean", format = "22c", can_throw, can_continue)]
    IputBoolean(Reg, Reg, Index<FieldIdItem>),
    #[instruction(mnemonic = "iput-byte", format = "22c", can_throw, can_continue)]
    IputByte(Reg, Reg, Index<FieldIdItem>),
    #[instruction(mnemonic = "iput-char", format = "22c", can_throw, can_continue)]
    IputChar(Reg, Reg, Index<FieldIdItem>),
    #[instruction(mnemonic = "iput-short", format = "22c", can_throw, can_continue)]
    IputShort(Reg, Reg, Index<FieldIdItem>),

    /// Perform the identified object static field operation with the identified static field,
    /// loading or storing into the value register.
    #[instruction(mnemonic = "sget", format = "21c", can_throw, can_continue, sets_register)]
    Sget(Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "sget-wide",
        format = "21c",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register
    )]
    SgetWide(Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "sget-object",
        format = "21c",
        can_throw,
        can_continue,
        sets_register
    )]
    SgetObject(Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "sget-boolean",
        format = "21c",
        can_throw,
        can_continue,
        sets_register
    )]
    SgetBoolean(Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "sget-byte",
        format = "21c",
        can_throw,
        can_continue,
        sets_register
    )]
    SgetByte(Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "sget-char",
        format = "21c",
        can_throw,
        can_continue,
        sets_register
    )]
    SgetChar(Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "sget-short",
        format = "21c",
        can_throw,
        can_continue,
        sets_register
    )]
    SgetShort(Reg, Index<FieldIdItem>),
    #[instruction(mnemonic = "sput", format = "21c", can_throw, can_continue)]
    Sput(Reg, Index<FieldIdItem>),
    #[instruction(mnemonic = "sput-wide", format = "21c", can_throw, can_continue)]
    SputWide(Reg, Index<FieldIdItem>),
    #[instruction(mnemonic = "sput-object", format = "21c", can_throw, can_continue)]
    SputObject(Reg, Index<FieldIdItem>),
    #[instruction(mnemonic = "sput-boolean", format = "21c", can_throw, can_continue)]
    SputBoolean(Reg, Index<FieldIdItem>),
    #[instruction(mnemonic = "sput-byte", format = "21c", can_throw, can_continue)]
    SputByte(Reg, Index<FieldIdItem>),
    #[instruction(mnemonic = "sput-char", format = "21c", can_throw, can_continue)]
    SputChar(Reg, Index<FieldIdItem>),
    #[instruction(mnemonic = "sput-short", format = "21c", can_throw, can_continue)]
    SputShort(Reg, Index<FieldIdItem>),

    /// Call the indicated method. The result (if any) may be stored with an appropriate
    /// `move-result*` variant as the immediately subsequent instruction.
    #[instruction(
        mnemonic = "invoke-virtual",
        format = "35c",
        can_throw,
        can_continue,
        sets_result
    )]
    InvokeVirtual(RegList, Index<MethodIdItem>),
    #[instruction(
        mnemonic = "invoke-super",
        format = "35c",
        can_throw,
        can_continue,
        sets_result
    )]
    InvokeSuper(RegList, Index<MethodIdItem>),
    #[instruction(
        mnemonic = "invoke-direct",
        format = "35c",
        can_throw,
        can_continue,
        sets_result,
        can_initialize_reference
    )]
    InvokeDirect(RegList, Index<MethodIdItem>),
    #[instruction(
        mnemonic = "invoke-static",
        format = "35c",
        can_throw,
        can_continue,
        sets_result
    )]
    InvokeStatic(RegList, Index<MethodIdItem>),
    #[instruction(
        mnemonic = "invoke-interface",
        format = "35c",
        can_throw,
        can_continue,
        sets_result
    )]
    InvokeInterface(RegList, Index<MethodIdItem>),
    #[instruction(
        mnemonic = "invoke-virtual/range",
        format = "3rc",
        can_throw,
        can_continue,
        sets_result
    )]
    InvokeVirtualRange(RegRange, Index<MethodIdItem>),
    #[instruction(
        mnemonic = "invoke-super/range",
        format = "3rc",
        can_throw,
        can_continue,
        sets_result
    )]
    InvokeSuperRange(RegRange, Index<MethodIdItem>),
    #[instruction(
        mnemonic = "invoke-direct/range",
        format = "3rc",
        can_throw,
        can_continue,
        sets_result,
        can_initialize_reference
    )]
    InvokeDirectRange(RegRange, Index<MethodIdItem>),
    #[instruction(
        mnemonic = "invoke-static/range",
        format = "3rc",
        can_throw,
        can_continue,
        sets_result
    )]
    InvokeStaticRange(RegRange, Index<MethodIdItem>),
    #[instruction(
        mnemonic = "invoke-interface/range",
        format = "3rc",
        can_throw,
        can_continue,
        sets_result
    )]
    InvokeInterfaceRange(RegRange, Index<MethodIdItem>),

    /// Perform the identified unary operation on the source register, storing the result in
    /// the destination register.
    #[instruction(mnemonic = "neg-int", format = "12x", can_continue, sets_register)]
    NegInt(Reg, Reg),
    #[instruction(mnemonic = "not-int", format = "12x", can_continue, sets_register)]
    NotInt(Reg, Reg),
    #[instruction(
        mnemonic = "neg-long",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    NegLong(Reg, Reg),
    #[instruction(
        mnemonic = "not-long",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    NotLong(Reg, Reg),
    #[instruction(mnemonic = "neg-float", format = "12x", can_continue, sets_register)]
    NegFloat(Reg, Reg),
    #[instruction(
        mnemonic = "neg-double",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    NegDouble(Reg, Reg),
    #[instruction(
        mnemonic = "int-to-long",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    IntToLong(Reg, Reg),
    #[instruction(mnemonic = "int-to-float", format = "12x", can_continue, sets_register)]
    IntToFloat(Reg, Reg),
    #[instruction(
        mnemonic = "int-to-double",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    IntToDouble(Reg, Reg),
    #[instruction(mnemonic = "long-to-int", format = "12x", can_continue, sets_register)]
    LongToInt(Reg, Reg),
    #[instruction(mnemonic = "long-to-float", format = "12x", can_continue, sets_register)]
    LongToFloat(Reg, Reg),
    #[instruction(
        mnemonic = "long-to-double",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    LongToDouble(Reg, Reg),
    #[instruction(mnemonic = "float-to-int", format = "12x", can_continue, sets_register)]
    FloatToInt(Reg, Reg),
    #[instruction(
        mnemonic = "float-to-long",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    FloatToLong(Reg, Reg),
    #[instruction(
        mnemonic = "float-to-double",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    FloatToDouble(Reg, Reg),
    #[instruction(mnemonic = "double-to-int", format = "12x", can_continue, sets_register)]
    DoubleToInt(Reg, Reg),
    #[instruction(
        mnemonic = "double-to-long",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    DoubleToLong(Reg, Reg),
    #[instruction(mnemonic = "double-to-float", format = "12x", can_continue, sets_register)]
    DoubleToFloat(Reg, Reg),
    #[instruction(mnemonic = "int-to-byte", format = "12x", can_continue, sets_register)]
    IntToByte(Reg, Reg),
    #[instruction(mnemonic = "int-to-char", format = "12x", can_continue, sets_register)]
    IntToChar(Reg, Reg),
    #[instruction(mnemonic = "int-to-short", format = "12x", can_continue, sets_register)]
    IntToShort(Reg, Reg),

    /// Perform the identified binary operation on the two source registers, storing the
    /// result in the destination register.
    #[instruction(mnemonic = "add-int", format = "23x", can_continue, sets_register)]
    AddInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "sub-int", format = "23x", can_continue, sets_register)]
    SubInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "mul-int", format = "23x", can_continue, sets_register)]
    MulInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "div-int", format = "23x", can_throw, can_continue, sets_register)]
    DivInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "rem-int", format = "23x", can_throw, can_continue, sets_register)]
    RemInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "and-int", format = "23x", can_continue, sets_register)]
    AndInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "or-int", format = "23x", can_continue, sets_register)]
    OrInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "xor-int", format = "23x", can_continue, sets_register)]
    XorInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "shl-int", format = "23x", can_continue, sets_register)]
    ShlInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "shr-int", format = "23x", can_continue, sets_register)]
    ShrInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "ushr-int", format = "23x", can_continue, sets_register)]
    UshrInt(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "add-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    AddLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "sub-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    SubLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "mul-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MulLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "div-long",
        format = "23x",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register
    )]
    DivLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "rem-long",
        format = "23x",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register
    )]
    RemLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "and-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    AndLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "or-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    OrLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "xor-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    XorLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "shl-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ShlLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "shr-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ShrLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "ushr-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    UshrLong(Reg, Reg, Reg),
    #[instruction(mnemonic = "add-float", format = "23x", can_continue, sets_register)]
    AddFloat(Reg, Reg, Reg),
    #[instruction(mnemonic = "sub-float", format = "23x", can_continue, sets_register)]
    SubFloat(Reg, Reg, Reg),
    #[instruction(mnemonic = "mul-float", format = "23x", can_continue, sets_register)]
    MulFloat(Reg, Reg, Reg),
    #[instruction(mnemonic = "div-float", format = "23x", can_continue, sets_register)]
    DivFloat(Reg, Reg, Reg),
    #[instruction(mnemonic = "rem-float", format = "23x", can_continue, sets_register)]
    RemFloat(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "add-double",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    AddDouble(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "sub-double",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    SubDouble(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "mul-double",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MulDouble(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "div-double",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    DivDouble(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "rem-double",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    RemDouble(Reg, Reg, Reg),

    /// Perform the identified binary operation on the two source registers, storing the
    /// result in the first source register.
    #[instruction(mnemonic = "add-int/2addr", format = "12x", can_continue, sets_register)]
    AddInt2addr(Reg, Reg),
    #[instruction(mnemonic = "sub-int/2addr", format = "12x", can_continue, sets_register)]
    SubInt2addr(Reg, Reg),
    #[instruction(mnemonic = "mul-int/2addr", format = "12x", can_continue, sets_register)]
    MulInt2addr(Reg, Reg),
    #[instruction(
        mnemonic = "div-int/2addr",
        format = "12x",
        can_throw,
        can_continue,
        sets_register
    )]
    DivInt2addr(Reg, Reg),
    #[instruction(
        mnemonic = "rem-int/2addr",
        format = "12x",
        can_throw,
        can_continue,
        sets_register
    )]
    RemInt2addr(Reg, Reg),
    #[instruction(mnemonic = "and-int/2addr", format = "12x", can_continue, sets_register)]
    AndInt2addr(Reg, Reg),
    #[instruction(mnemonic = "or-int/2addr", format = "12x", can_continue, sets_register)]
    OrInt2addr(Reg, Reg),
    #[instruction(mnemonic = "xor-int/2addr", format = "12x", can_continue, sets_register)]
    XorInt2addr(Reg, Reg),
    #[instruction(mnemonic = "shl-int/2addr", format = "12x", can_continue, sets_register)]
    ShlInt2addr(Reg, Reg),
    #[instruction(mnemonic = "shr-int/2addr", format = "12x", can_continue, sets_register)]
    ShrInt2addr(Reg, Reg),
    #[instruction(mnemonic = "ushr-int/2addr", format = "12x", can_continue, sets_register)]
    UshrInt2addr(Reg, Reg),
    #[instruction(
        mnemonic = "add-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    AddLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "sub-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    SubLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "mul-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MulLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "div-long/2addr",
        format = "12x",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register
    )]
    DivLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "rem-long/2addr",
        format = "12x",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register
    )]
    RemLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "and-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    AndLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "or-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    OrLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "xor-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    XorLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "shl-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ShlLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "shr-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ShrLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "ushr-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    UshrLong2addr(Reg, Reg),
    #[instruction(mnemonic = "add-float/2addr", format = "12x", can_continue, sets_register)]
    AddFloat2addr(Reg, Reg),
    #[instruction(mnemonic = "sub-float/2addr", format = "12x", can_continue, sets_register)]
    SubFloat2addr(Reg, Reg),
    #[instruction(mnemonic = "mul-float/2addr", format = "12x", can_continue, sets_register)]
    MulFloat2addr(Reg, Reg),
    #[instruction(mnemonic = "div-float/2addr", format = "12x", can_continue, sets_register)]
    DivFloat2addr(Reg, Reg),
    #[instruction(mnemonic = "rem-float/2addr", format = "12x", can_continue, sets_register)]
    RemFloat2addr(Reg, Reg),
    #[instruction(
        mnemonic = "add-double/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    AddDouble2addr(Reg, Reg),
    #[instruction(
        mnemonic = "sub-double/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    SubDouble2addr(Reg, Reg),
    #[instruction(
        mnemonic = "mul-double/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MulDouble2addr(Reg, Reg),
    #[instruction(
        mnemonic = "div-double/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    DivDouble2addr(Reg, Reg),
    #[instruction(
        mnemonic = "rem-double/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    RemDouble2addr(Reg, Reg),

    /// Perform the indicated binary op on the indicated register (first argument) and literal
    /// value (second argument), storing the result in the destination register.
    #[instruction(mnemonic = "add-int/lit16", format = "22s", can_continue, sets_register)]
    AddIntLit16(Reg, Reg, i16),
    #[instruction(mnemonic = "rsub-int", format = "22s", can_continue, sets_register)]
    RsubInt(Reg, Reg, i16),
    #[instruction(mnemonic = "mul-int/lit16", format = "22s", can_continue, sets_register)]
    MulIntLit16(Reg, Reg, i16),
    #[instruction(
        mnemonic = "div-int/lit16",
        format = "22s",
        can_throw,
        can_continue,
        sets_register
    )]
    DivIntLit16(Reg, Reg, i16),
    #[instruction(
        mnemonic = "rem-int/lit16",
        format = "22s",
        can_throw,
        can_continue,
        sets_register
    )]
    RemIntLit16(Reg, Reg, i16),
    #[instruction(mnemonic = "and-int/lit16", format = "22s", can_continue, sets_register)]
    AndIntLit16(Reg, Reg, i16),
    #[instruction(mnemonic = "or-int/lit16", format = "22s", can_continue, sets_register)]
    OrIntLit16(Reg, Reg, i16),
    #[instruction(mnemonic = "xor-int/lit16", format = "22s", can_continue, sets_register)]
    XorIntLit16(Reg, Reg, i16),
    #[instruction(mnemonic = "add-int/lit8", format = "22b", can_continue, sets_register)]
    AddIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "rsub-int/lit8", format = "22b", can_continue, sets_register)]
    RsubIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "mul-int/lit8", format = "22b", can_continue, sets_register)]
    MulIntLit8(Reg, Reg, i8),
    #[instruction(
        mnemonic = "div-int/lit8",
        format = "22b",
        can_throw,
        can_continue,
        sets_register
    )]
    DivIntLit8(Reg, Reg, i8),
    #[instruction(
        mnemonic = "rem-int/lit8",
        format = "22b",
        can_throw,
        can_continue,
        sets_register
    )]
    RemIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "and-int/lit8", format = "22b", can_continue, sets_register)]
    AndIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "or-int/lit8", format = "22b", can_continue, sets_register)]
    OrIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "xor-int/lit8", format = "22b", can_continue, sets_register)]
    XorIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "shl-int/lit8", format = "22b", can_continue, sets_register)]
    ShlIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "shr-int/lit8", format = "22b", can_continue, sets_register)]
    ShrIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "ushr-int/lit8", format = "22b", can_continue, sets_register)]
    UshrIntLit8(Reg, Reg, i8),

    #[instruction(
        mnemonic = "packed-switch-payload",
        format = "custom",
        size = "(_1.len() * 2) + 4"
    )]
    PackedSwitchPayload(i32, Vec<i32>),

    #[instruction(
        mnemonic = "sparse-switch-payload",
        format = "custom",
        size = "(_1.len() * 4) + 2"
    )]
    SparseSwitchPayload(Vec<i32>, Vec<i32>),

    #[instruction(
        mnemonic = "fill-array-data-payload",
        format = "custom",
        size = "(_0.len() * _0.first().map_or(0, Vec::len) + 1) / 2 + 4"
    )]
    FillArrayDataPayload(Vec<Vec<u8>>),

    // Odex-only instructions, emitted by dexopt against a specific boot class path.

    /// Throw the verification error found by dexopt for this instruction.
    #[instruction(mnemonic = "throw-verification-error", format = "20bc", can_throw, odex_only)]
    ThrowVerificationError(u8, u16),
    /// Call the inline method at the given index of the runtime inline table.
    #[instruction(
        mnemonic = "execute-inline",
        format = "35mi",
        can_throw,
        can_continue,
        sets_result,
        odex_only
    )]
    ExecuteInline(RegList, u16),
    #[instruction(
        mnemonic = "execute-inline/range",
        format = "3rmi",
        can_throw,
        can_continue,
        sets_result,
        odex_only
    )]
    ExecuteInlineRange(RegRange, u16),
    /// Replacement of an `invoke-direct` calling an empty constructor.
    #[instruction(
        mnemonic = "invoke-direct-empty",
        format = "35c",
        can_throw,
        can_continue,
        sets_result,
        odex_only,
        can_initialize_reference
    )]
    InvokeDirectEmpty(RegList, Index<MethodIdItem>),
    /// Replacement of an `invoke-direct/range` calling `Object.<init>`.
    #[instruction(
        mnemonic = "invoke-object-init/range",
        format = "3rc",
        can_throw,
        can_continue,
        sets_result,
        odex_only,
        can_initialize_reference
    )]
    InvokeObjectInitRange(RegRange, Index<MethodIdItem>),
    /// Return from a constructor that needs a store barrier.
    #[instruction(mnemonic = "return-void-barrier", format = "10x", odex_only)]
    ReturnVoidBarrier,

    /// Field accesses with a volatile field, by field reference.
    #[instruction(
        mnemonic = "iget-volatile",
        format = "22c",
        can_throw,
        can_continue,
        sets_register,
        odex_only,
        odexed_instance_volatile
    )]
    IgetVolatile(Reg, Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "iget-wide-volatile",
        format = "22c",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register,
        odex_only,
        odexed_instance_volatile
    )]
    IgetWideVolatile(Reg, Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "iget-object-volatile",
        format = "22c",
        can_throw,
        can_continue,
        sets_register,
        odex_only,
        odexed_instance_volatile
    )]
    IgetObjectVolatile(Reg, Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "iput-volatile",
        format = "22c",
        can_throw,
        can_continue,
        odex_only,
        odexed_instance_volatile
    )]
    IputVolatile(Reg, Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "iput-wide-volatile",
        format = "22c",
        can_throw,
        can_continue,
        odex_only,
        odexed_instance_volatile
    )]
    IputWideVolatile(Reg, Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "iput-object-volatile",
        format = "22c",
        can_throw,
        can_continue,
        odex_only,
        odexed_instance_volatile
    )]
    IputObjectVolatile(Reg, Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "sget-volatile",
        format = "21c",
        can_throw,
        can_continue,
        sets_register,
        odex_only,
        odexed_static_volatile
    )]
    SgetVolatile(Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "sget-wide-volatile",
        format = "21c",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register,
        odex_only,
        odexed_static_volatile
    )]
    SgetWideVolatile(Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "sget-object-volatile",
        format = "21c",
        can_throw,
        can_continue,
        sets_register,
        odex_only,
        odexed_static_volatile
    )]
    SgetObjectVolatile(Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "sput-volatile",
        format = "21c",
        can_throw,
        can_continue,
        odex_only,
        odexed_static_volatile
    )]
    SputVolatile(Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "sput-wide-volatile",
        format = "21c",
        can_throw,
        can_continue,
        odex_only,
        odexed_static_volatile
    )]
    SputWideVolatile(Reg, Index<FieldIdItem>),
    #[instruction(
        mnemonic = "sput-object-volatile",
        format = "21c",
        can_throw,
        can_continue,
        odex_only,
        odexed_static_volatile
    )]
    SputObjectVolatile(Reg, Index<FieldIdItem>),

    /// Instance field accesses by field byte offset.
    #[instruction(
        mnemonic = "iget-quick",
        format = "22cs",
        can_throw,
        can_continue,
        sets_register,
        odex_only,
        odexed_instance_quick
    )]
    IgetQuick(Reg, Reg, u16),
    #[instruction(
        mnemonic = "iget-wide-quick",
        format = "22cs",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register,
        odex_only,
        odexed_instance_quick
    )]
    IgetWideQuick(Reg, Reg, u16),
    #[instruction(
        mnemonic = "iget-object-quick",
        format = "22cs",
        can_throw,
        can_continue,
        sets_register,
        odex_only,
        odexed_instance_quick
    )]
    IgetObjectQuick(Reg, Reg, u16),
    #[instruction(
        mnemonic = "iput-quick",
        format = "22cs",
        can_throw,
        can_continue,
        odex_only,
        odexed_instance_quick
    )]
    IputQuick(Reg, Reg, u16),
    #[instruction(
        mnemonic = "iput-wide-quick",
        format = "22cs",
        can_throw,
        can_continue,
        odex_only,
        odexed_instance_quick
    )]
    IputWideQuick(Reg, Reg, u16),
    #[instruction(
        mnemonic = "iput-object-quick",
        format = "22cs",
        can_throw,
        can_continue,
        odex_only,
        odexed_instance_quick
    )]
    IputObjectQuick(Reg, Reg, u16),

    /// Virtual calls by vtable index.
    #[instruction(
        mnemonic = "invoke-virtual-quick",
        format = "35ms",
        can_throw,
        can_continue,
        sets_result,
        odex_only
    )]
    InvokeVirtualQuick(RegList, u16),
    #[instruction(
        mnemonic = "invoke-virtual-quick/range",
        format = "3rms",
        can_throw,
        can_continue,
        sets_result,
        odex_only
    )]
    InvokeVirtualQuickRange(RegRange, u16),
    #[instruction(
        mnemonic = "invoke-super-quick",
        format = "35ms",
        can_throw,
        can_continue,
        sets_result,
        odex_only
    )]
    InvokeSuperQuick(RegList, u16),
    #[instruction(
        mnemonic = "invoke-super-quick/range",
        format = "3rms",
        can_throw,
        can_continue,
        sets_result,
        odex_only
    )]
    InvokeSuperQuickRange(RegRange, u16),

    /// Odexed field access or virtual call whose object register can only hold `null`, so that
    /// the instruction cannot be deodexed. It always throws at runtime. The wrapped instruction
    /// is the original odexed one, the register is its object register.
    #[instruction(
        mnemonic = "unresolved-odex",
        format = "custom",
        size = "_0.size()",
        can_throw
    )]
    UnresolvedOdex(Box<Instr>, Reg),
}

#[allow(clippy::enum_glob_use)]
impl Instr {
    /// Returns the A, B and C register operands (in this order), when present.
    #[must_use]
    pub fn registers(&self) -> [Option<Reg>; 3] {
        use Instr::*;
        match self {
            MoveResult(a)
            | MoveResultWide(a)
            | MoveResultObject(a)
            | MoveException(a)
            | Return(a)
            | ReturnWide(a)
            | ReturnObject(a)
            | Const4(a, _)
            | Const16(a, _)
            | Const(a, _)
            | ConstHigh16(a, _)
            | ConstWide16(a, _)
            | ConstWide32(a, _)
            | ConstWide(a, _)
            | ConstWideHigh16(a, _)
            | ConstString(a, _)
            | ConstStringJumbo(a, _)
            | ConstClass(a, _)
            | MonitorEnter(a)
            | MonitorExit(a)
            | CheckCast(a, _)
            | NewInstance(a, _)
            | FillArrayData(a, _)
            | Throw(a)
            | PackedSwitch(a, _)
            | SparseSwitch(a, _)
            | IfEqz(a, _)
            | IfNez(a, _)
            | IfLtz(a, _)
            | IfGez(a, _)
            | IfGtz(a, _)
            | IfLez(a, _)
            | Sget(a, _)
            | SgetWide(a, _)
            | SgetObject(a, _)
            | SgetBoolean(a, _)
            | SgetByte(a, _)
            | SgetChar(a, _)
            | SgetShort(a, _)
            | Sput(a, _)
            | SputWide(a, _)
            | SputObject(a, _)
            | SputBoolean(a, _)
            | SputByte(a, _)
            | SputChar(a, _)
            | SputShort(a, _)
            | SgetVolatile(a, _)
            | SgetWideVolatile(a, _)
            | SgetObjectVolatile(a, _)
            | SputVolatile(a, _)
            | SputWideVolatile(a, _)
            | SputObjectVolatile(a, _) => [Some(*a), None, None],
            Move(a, b)
            | MoveFrom16(a, b)
            | Move16(a, b)
            | MoveWide(a, b)
            | MoveWideFrom16(a, b)
            | MoveWide16(a, b)
            | MoveObject(a, b)
            | MoveObjectFrom16(a, b)
            | MoveObject16(a, b)
            | InstanceOf(a, b, _)
            | ArrayLength(a, b)
            | NewArray(a, b, _)
            | IfEq(a, b, _)
            | IfNe(a, b, _)
            | IfLt(a, b, _)
            | IfGe(a, b, _)
            | IfGt(a, b, _)
            | IfLe(a, b, _)
            | Iget(a, b, _)
            | IgetWide(a, b, _)
            | IgetObject(a, b, _)
            | IgetBoolean(a, b, _)
            | IgetByte(a, b, _)
            | IgetChar(a, b, _)
            | IgetShort(a, b, _)
            | Iput(a, b, _)
            | IputWide(a, b, _)
            | IputObject(a, b, _)
            | IputBoolean(a, b, _)
            | IputByte(a, b, _)
            | IputChar(a, b, _)
            | IputShort(a, b, _)
            | NegInt(a, b)
            | NotInt(a, b)
            | NegLong(a, b)
            | NotLong(a, b)
            | NegFloat(a, b)
            | NegDouble(a, b)
            | IntToLong(a, b)
            | IntToFloat(a, b)
            | IntToDouble(a, b)
            | LongToInt(a, b)
            | LongToFloat(a, b)
            | LongToDouble(a, b)
            | FloatToInt(a, b)
            | FloatToLong(a, b)
            | FloatToDouble(a, b)
            | DoubleToInt(a, b)
            | DoubleToLong(a, b)
            | DoubleToFloat(a, b)
            | IntToByte(a, b)
            | IntToChar(a, b)
            | IntToShort(a, b)
            | AddInt2addr(a, b)
            | SubInt2addr(a, b)
            | MulInt2addr(a, b)
            | DivInt2addr(a, b)
            | RemInt2addr(a, b)
            | AndInt2addr(a, b)
            | OrInt2addr(a, b)
            | XorInt2addr(a, b)
            | ShlInt2addr(a, b)
            | ShrInt2addr(a, b)
            | UshrInt2addr(a, b)
            | AddLong2addr(a, b)
            | SubLong2addr(a, b)
            | MulLong2addr(a, b)
            | DivLong2addr(a, b)
            | RemLong2addr(a, b)
            | AndLong2addr(a, b)
            | OrLong2addr(a, b)
            | XorLong2addr(a, b)
            | ShlLong2addr(a, b)
            | ShrLong2addr(a, b)
            | UshrLong2addr(a, b)
            | AddFloat2addr(a, b)
            | SubFloat2addr(a, b)
            | MulFloat2addr(a, b)
            | DivFloat2addr(a, b)
            | RemFloat2addr(a, b)
            | AddDouble2addr(a, b)
            | SubDouble2addr(a, b)
            | MulDouble2addr(a, b)
            | DivDouble2addr(a, b)
            | RemDouble2addr(a, b)
            | AddIntLit16(a, b, _)
            | RsubInt(a, b, _)
            | MulIntLit16(a, b, _)
            | DivIntLit16(a, b, _)
            | RemIntLit16(a, b, _)
            | AndIntLit16(a, b, _)
            | OrIntLit16(a, b, _)
            | XorIntLit16(a, b, _)
            | AddIntLit8(a, b, _)
            | RsubIntLit8(a, b, _)
            | MulIntLit8(a, b, _)
            | DivIntLit8(a, b, _)
            | RemIntLit8(a, b, _)
            | AndIntLit8(a, b, _)
            | OrIntLit8(a, b, _)
            | XorIntLit8(a, b, _)
            | ShlIntLit8(a, b, _)
            | ShrIntLit8(a, b, _)
            | UshrIntLit8(a, b, _)
            | IgetVolatile(a, b, _)
            | IgetWideVolatile(a, b, _)
            | IgetObjectVolatile(a, b, _)
            | IputVolatile(a, b, _)
            | IputWideVolatile(a, b, _)
            | IputObjectVolatile(a, b, _)
            | IgetQuick(a, b, _)
            | IgetWideQuick(a, b, _)
            | IgetObjectQuick(a, b, _)
            | IputQuick(a, b, _)
            | IputWideQuick(a, b, _)
            | IputObjectQuick(a, b, _) => [Some(*a), Some(*b), None],
            CmplFloat(a, b, c)
            | CmpgFloat(a, b, c)
            | CmplDouble(a, b, c)
            | CmpgDouble(a, b, c)
            | CmpLong(a, b, c)
            | Aget(a, b, c)
            | AgetWide(a, b, c)
            | AgetObject(a, b, c)
            | AgetBoolean(a, b, c)
            | AgetByte(a, b, c)
            | AgetChar(a, b, c)
            | AgetShort(a, b, c)
            | Aput(a, b, c)
            | AputWide(a, b, c)
            | AputObject(a, b, c)
            | AputBoolean(a, b, c)
            | AputByte(a, b, c)
            | AputChar(a, b, c)
            | AputShort(a, b, c)
            | AddInt(a, b, c)
            | SubInt(a, b, c)
            | MulInt(a, b, c)
            | DivInt(a, b, c)
            | RemInt(a, b, c)
            | AndInt(a, b, c)
            | OrInt(a, b, c)
            | XorInt(a, b, c)
            | ShlInt(a, b, c)
            | ShrInt(a, b, c)
            | UshrInt(a, b, c)
            | AddLong(a, b, c)
            | SubLong(a, b, c)
            | MulLong(a, b, c)
            | DivLong(a, b, c)
            | RemLong(a, b, c)
            | AndLong(a, b, c)
            | OrLong(a, b, c)
            | XorLong(a, b, c)
            | ShlLong(a, b, c)
            | ShrLong(a, b, c)
            | UshrLong(a, b, c)
            | AddFloat(a, b, c)
            | SubFloat(a, b, c)
            | MulFloat(a, b, c)
            | DivFloat(a, b, c)
            | RemFloat(a, b, c)
            | AddDouble(a, b, c)
            | SubDouble(a, b, c)
            | MulDouble(a, b, c)
            | DivDouble(a, b, c)
            | RemDouble(a, b, c) => [Some(*a), Some(*b), Some(*c)],
            UnresolvedOdex(instr, _) => instr.registers(),
            _ => [None, None, None],
        }
    }

    /// Returns the pool reference carried by the instruction, if any.
    #[must_use]
    pub fn reference(&self) -> Option<Reference> {
        use Instr::*;
        match self {
            ConstString(_, idx)
            | ConstStringJumbo(_, idx) => Some(Reference::String(*idx)),
            ConstClass(_, idx)
            | CheckCast(_, idx)
            | InstanceOf(_, _, idx)
            | NewInstance(_, idx)
            | NewArray(_, _, idx)
            | FilledNewArray(_, idx)
            | FilledNewArrayRange(_, idx) => Some(Reference::Type(*idx)),
            Iget(_, _, idx)
            | IgetWide(_, _, idx)
            | IgetObject(_, _, idx)
            | IgetBoolean(_, _, idx)
            | IgetByte(_, _, idx)
            | IgetChar(_, _, idx)
            | IgetShort(_, _, idx)
            | Iput(_, _, idx)
            | IputWide(_, _, idx)
            | IputObject(_, _, idx)
            | IputBoolean(_, _, idx)
            | IputByte(_, _, idx)
            | IputChar(_, _, idx)
            | IputShort(_, _, idx)
            | Sget(_, idx)
            | SgetWide(_, idx)
            | SgetObject(_, idx)
            | SgetBoolean(_, idx)
            | SgetByte(_, idx)
            | SgetChar(_, idx)
            | SgetShort(_, idx)
            | Sput(_, idx)
            | SputWide(_, idx)
            | SputObject(_, idx)
            | SputBoolean(_, idx)
            | SputByte(_, idx)
            | SputChar(_, idx)
            | SputShort(_, idx)
            | IgetVolatile(_, _, idx)
            | IgetWideVolatile(_, _, idx)
            | IgetObjectVolatile(_, _, idx)
            | IputVolatile(_, _, idx)
            | IputWideVolatile(_, _, idx)
            | IputObjectVolatile(_, _, idx)
            | SgetVolatile(_, idx)
            | SgetWideVolatile(_, idx)
            | SgetObjectVolatile(_, idx)
            | SputVolatile(_, idx)
            | SputWideVolatile(_, idx)
            | SputObjectVolatile(_, idx) => Some(Reference::Field(*idx)),
            InvokeVirtual(_, idx)
            | InvokeSuper(_, idx)
            | InvokeDirect(_, idx)
            | InvokeStatic(_, idx)
            | InvokeInterface(_, idx)
            | InvokeVirtualRange(_, idx)
            | InvokeSuperRange(_, idx)
            | InvokeDirectRange(_, idx)
            | InvokeStaticRange(_, idx)
            | InvokeInterfaceRange(_, idx)
            | InvokeDirectEmpty(_, idx)
            | InvokeObjectInitRange(_, idx) => Some(Reference::Method(*idx)),
            _ => None,
        }
    }

    /// Returns the literal operand of `const*` and `*/lit*` instructions, already shifted for
    /// the `high16` variants.
    #[must_use]
    pub fn literal(&self) -> Option<i64> {
        use Instr::*;
        match self {
            Const4(_, lit)
            | AddIntLit8(_, _, lit)
            | RsubIntLit8(_, _, lit)
            | MulIntLit8(_, _, lit)
            | DivIntLit8(_, _, lit)
            | RemIntLit8(_, _, lit)
            | AndIntLit8(_, _, lit)
            | OrIntLit8(_, _, lit)
            | XorIntLit8(_, _, lit)
            | ShlIntLit8(_, _, lit)
            | ShrIntLit8(_, _, lit)
            | UshrIntLit8(_, _, lit) => Some(i64::from(*lit)),
            Const16(_, lit)
            | ConstWide16(_, lit)
            | AddIntLit16(_, _, lit)
            | RsubInt(_, _, lit)
            | MulIntLit16(_, _, lit)
            | DivIntLit16(_, _, lit)
            | RemIntLit16(_, _, lit)
            | AndIntLit16(_, _, lit)
            | OrIntLit16(_, _, lit)
            | XorIntLit16(_, _, lit) => Some(i64::from(*lit)),
            Const(_, lit) | ConstWide32(_, lit) => Some(i64::from(*lit)),
            ConstHigh16(_, lit) => Some(i64::from(*lit) << 16),
            ConstWide(_, lit) => Some(*lit),
            ConstWideHigh16(_, lit) => Some(i64::from(*lit) << 48),
            _ => None,
        }
    }

    /// Returns the signed code offset of branches, switches and `fill-array-data`.
    #[must_use]
    pub fn branch_offset(&self) -> Option<i32> {
        use Instr::*;
        match self {
            Goto(off) => Some(i32::from(*off)),
            Goto16(off)
            | IfEq(_, _, off)
            | IfNe(_, _, off)
            | IfLt(_, _, off)
            | IfGe(_, _, off)
            | IfGt(_, _, off)
            | IfLe(_, _, off)
            | IfEqz(_, off)
            | IfNez(_, off)
            | IfLtz(_, off)
            | IfGez(_, off)
            | IfGtz(_, off)
            | IfLez(_, off) => Some(i32::from(*off)),
            FillArrayData(_, off)
            | Goto32(off)
            | PackedSwitch(_, off)
            | SparseSwitch(_, off) => Some(*off),
            _ => None,
        }
    }

    /// Returns the argument registers of invoke-kind and `filled-new-array*` instructions.
    #[must_use]
    pub fn invoke_args(&self) -> Option<InvokeArgs<'_>> {
        use Instr::*;
        match self {
            FilledNewArray(args, _)
            | InvokeVirtual(args, _)
            | InvokeSuper(args, _)
            | InvokeDirect(args, _)
            | InvokeStatic(args, _)
            | InvokeInterface(args, _)
            | ExecuteInline(args, _)
            | InvokeDirectEmpty(args, _)
            | InvokeVirtualQuick(args, _)
            | InvokeSuperQuick(args, _) => Some(InvokeArgs::List(args)),
            FilledNewArrayRange(args, _)
            | InvokeVirtualRange(args, _)
            | InvokeSuperRange(args, _)
            | InvokeDirectRange(args, _)
            | InvokeStaticRange(args, _)
            | InvokeInterfaceRange(args, _)
            | ExecuteInlineRange(args, _)
            | InvokeObjectInitRange(args, _)
            | InvokeVirtualQuickRange(args, _)
            | InvokeSuperQuickRange(args, _) => Some(InvokeArgs::Range(args)),
            UnresolvedOdex(instr, _) => instr.invoke_args(),
            _ => None,
        }
    }

    /// Returns the inline table index, vtable index or field offset of odexed instructions.
    #[must_use]
    pub fn odex_index(&self) -> Option<u16> {
        use Instr::*;
        match self {
            ExecuteInline(_, idx)
            | ExecuteInlineRange(_, idx)
            | IgetQuick(_, _, idx)
            | IgetWideQuick(_, _, idx)
            | IgetObjectQuick(_, _, idx)
            | IputQuick(_, _, idx)
            | IputWideQuick(_, _, idx)
            | IputObjectQuick(_, _, idx)
            | InvokeVirtualQuick(_, idx)
            | InvokeVirtualQuickRange(_, idx)
            | InvokeSuperQuick(_, idx)
            | InvokeSuperQuickRange(_, idx) => Some(*idx),
            _ => None,
        }
    }

    fn reference_string(reference: Reference, dex: &Dex) -> DexResult<String> {
        Ok(match reference {
            Reference::String(idx) => format!("\"{}\"", idx.get(dex)?.as_str().replace('\n', "\\n")),
            Reference::Type(idx) => idx.get(dex)?.descriptor().to_string(),
            Reference::Field(idx) => {
                let field = idx.get(dex)?;
                format!(
                    "{}->{}:{}",
                    field.class_descriptor(dex)?,
                    field.name(),
                    field.type_descriptor(dex)?
                )
            }
            Reference::Method(idx) => idx.get(dex)?.full_string(dex)?,
        })
    }
}

impl PrettyPrint for Instr {
    fn pp(&self, f: &mut fmt::Formatter, dex: &Dex) -> DexResult<()> {
        write!(f, "{}", self.mnemonic())?;
        match self {
            Self::UnresolvedOdex(instr, reg) => {
                write!(f, " {reg} (")?;
                instr.pp(f, dex)?;
                write!(f, ")")?;
                return Ok(());
            }
            Self::PackedSwitchPayload(first_key, targets) => {
                write!(f, " {first_key}: {targets:?}")?;
                return Ok(());
            }
            Self::SparseSwitchPayload(keys, targets) => {
                write!(f, " {keys:?} -> {targets:?}")?;
                return Ok(());
            }
            Self::FillArrayDataPayload(elements) => {
                write!(f, " [{} elements]", elements.len())?;
                return Ok(());
            }
            Self::ThrowVerificationError(kind, idx) => {
                write!(f, " {kind}, @{idx}")?;
                return Ok(());
            }
            _ => (),
        }

        let mut operands = Vec::new();
        if let Some(args) = self.invoke_args() {
            operands.push(args.to_string());
        }
        operands.extend(self.registers().into_iter().flatten().map(|r| r.to_string()));
        if let Some(lit) = self.literal() {
            operands.push(format!("#{lit}"));
        }
        if let Some(offset) = self.branch_offset() {
            operands.push(format!("{offset:+}"));
        }
        if let Some(idx) = self.odex_index() {
            operands.push(format!("@{idx}"));
        }
        if let Some(reference) = self.reference() {
            operands.push(Self::reference_string(reference, dex)?);
        }
        if !operands.is_empty() {
            write!(f, " {}", operands.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: u8) -> Reg {
        Reg::from(n)
    }

    #[test]
    fn sizes() {
        assert_eq!(Instr::Nop.size(), 1);
        assert_eq!(Instr::ConstWide(r(0), 1).size(), 5);
        assert_eq!(Instr::InvokeVirtualQuick(RegList::from(vec![0u8]), 3).size(), 3);
        assert_eq!(Instr::PackedSwitchPayload(0, vec![1, 2, 3]).size(), 10);
        assert_eq!(Instr::SparseSwitchPayload(vec![1, 2], vec![3, 4]).size(), 10);
        assert_eq!(
            Instr::FillArrayDataPayload(vec![vec![0, 0, 0, 0]; 3]).size(),
            10
        );
        let odexed = Instr::IgetQuick(r(0), r(1), 8);
        assert_eq!(Instr::UnresolvedOdex(Box::new(odexed), r(1)).size(), 2);
    }

    #[test]
    fn flags() {
        let const_string = Instr::ConstString(r(0), Index::new(0));
        assert!(const_string.can_throw());
        assert!(const_string.can_continue());
        assert!(const_string.sets_register());

        let fill = Instr::FillArrayData(r(0), 4);
        assert!(!fill.can_throw());
        assert!(fill.can_continue());

        assert!(!Instr::Throw(r(0)).can_continue());
        assert!(!Instr::ReturnVoid.can_continue());
        assert!(!Instr::Goto(-2).can_continue());
        assert!(Instr::DivInt2addr(r(0), r(1)).can_throw());
        assert!(!Instr::DivFloat(r(0), r(1), r(2)).can_throw());
        assert!(Instr::AddLong(r(0), r(2), r(4)).sets_wide_register());
        assert!(!Instr::CmpLong(r(0), r(2), r(4)).sets_wide_register());

        let invoke = Instr::InvokeDirect(RegList::from(vec![0u8]), Index::new(0));
        assert!(invoke.can_initialize_reference());
        assert!(invoke.sets_result());
        assert!(!invoke.odex_only());

        assert!(Instr::IputWideQuick(r(0), r(2), 16).odexed_instance_quick());
        assert!(Instr::SgetVolatile(r(0), Index::new(0)).odexed_static_volatile());
        assert!(Instr::ReturnVoidBarrier.odex_only());

        let unresolved = Instr::UnresolvedOdex(Box::new(Instr::IgetQuick(r(0), r(1), 8)), r(1));
        assert!(unresolved.can_throw());
        assert!(!unresolved.can_continue());
    }

    #[test]
    fn operands() {
        let iget = Instr::IgetObject(r(3), r(4), Index::new(7));
        assert_eq!(iget.registers(), [Some(r(3)), Some(r(4)), None]);
        assert_eq!(iget.reference(), Some(Reference::Field(Index::new(7))));

        assert_eq!(Instr::ConstHigh16(r(0), 0x4120).literal(), Some(0x4120_0000));
        assert_eq!(Instr::RsubIntLit8(r(0), r(1), -3).literal(), Some(-3));
        assert_eq!(Instr::IfLez(r(0), -6).branch_offset(), Some(-6));
        assert_eq!(Instr::Goto32(70000).branch_offset(), Some(70000));

        let range = Instr::InvokeStaticRange(RegRange::new(4u16, 3), Index::new(1));
        let args = range.invoke_args().unwrap();
        assert_eq!(args.len(), 3);
        assert_eq!(args.first(), Some(Reg::from(4u16)));
        assert_eq!(Instr::ExecuteInline(RegList::from(vec![1u8]), 2).odex_index(), Some(2));
    }

    #[test]
    fn pretty_print() {
        let mut dex = Dex::new();
        let method = dex.intern_method_ref("La/B;", "f", &["I"], "V");
        let invoke = Instr::InvokeVirtual(RegList::from(vec![0u8, 1]), method);
        assert_eq!(
            format!("{}", crate::PrettyPrinter(&invoke, &dex)),
            "invoke-virtual {v0, v1}, La/B;->f(I)V"
        );
        let goto = Instr::Goto(-2);
        assert_eq!(format!("{}", crate::PrettyPrinter(&goto, &dex)), "goto -2");
    }
}
