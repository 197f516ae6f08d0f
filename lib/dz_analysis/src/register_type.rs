//! Abstract values held by Dalvik registers during the analysis.
//!
//! A [`RegisterType`] is a lattice element: a [`Category`] plus, for reference-like
//! categories, the class it refers to. Merging two types goes up the lattice (with a
//! common superclass computation for references), and an assignment table tells which
//! value categories fit into which slot categories.

use crate::classpath::ClassPath;
use crate::errors::{invalid, AnalysisError, AnalysisResult};
use crate::uids::ClassUid;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Unknown,
    Uninit,
    Null,
    One,
    Boolean,
    Byte,
    PosByte,
    Short,
    PosShort,
    Char,
    Integer,
    Float,
    LongLo,
    LongHi,
    DoubleLo,
    DoubleHi,
    /// Freshly allocated object whose constructor has not been called yet.
    UninitRef,
    /// The `this` register of a constructor, before the superclass constructor call.
    UninitThis,
    Reference,
    Conflicted,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

const CATEGORIES_COUNT: usize = 20;

#[rustfmt::skip]
const MERGE_TABLE: [[Category; CATEGORIES_COUNT]; CATEGORIES_COUNT] = {
    use Category::*;
    const X: Category = Conflicted;
    [
        /*              Unknown     Uninit  Null       One      Boolean  Byte     PosByte  Short    PosShort Char     Integer  Float    LongLo    LongHi  DoubleLo  DoubleHi  UninitRef  UninitThis  Reference  Conflicted */
        /*Unknown*/    [Unknown,    Uninit, Null,      One,     Boolean, Byte,    PosByte, Short,   PosShort, Char,   Integer, Float,   LongLo,   LongHi, DoubleLo, DoubleHi, UninitRef, UninitThis, Reference, X],
        /*Uninit*/     [Uninit,     Uninit, X,         X,       X,       X,       X,       X,       X,       X,       X,       X,       X,        X,      X,        X,        X,         X,          X,         X],
        /*Null*/       [Null,       X,      Null,      Boolean, Boolean, Byte,    PosByte, Short,   PosShort, Char,   Integer, Float,   X,        X,      X,        X,        X,         X,          Reference, X],
        /*One*/        [One,        X,      Boolean,   One,     Boolean, Byte,    PosByte, Short,   PosShort, Char,   Integer, Float,   X,        X,      X,        X,        X,         X,          X,         X],
        /*Boolean*/    [Boolean,    X,      Boolean,   Boolean, Boolean, Byte,    PosByte, Short,   PosShort, Char,   Integer, Float,   X,        X,      X,        X,        X,         X,          X,         X],
        /*Byte*/       [Byte,       X,      Byte,      Byte,    Byte,    Byte,    Byte,    Short,   Short,   Integer, Integer, Float,   X,        X,      X,        X,        X,         X,          X,         X],
        /*PosByte*/    [PosByte,    X,      PosByte,   PosByte, PosByte, Byte,    PosByte, Short,   PosShort, Char,   Integer, Float,   X,        X,      X,        X,        X,         X,          X,         X],
        /*Short*/      [Short,      X,      Short,     Short,   Short,   Short,   Short,   Short,   Short,   Integer, Integer, Float,   X,        X,      X,        X,        X,         X,          X,         X],
        /*PosShort*/   [PosShort,   X,      PosShort,  PosShort, PosShort, Short, PosShort, Short,  PosShort, Char,   Integer, Float,   X,        X,      X,        X,        X,         X,          X,         X],
        /*Char*/       [Char,       X,      Char,      Char,    Char,    Integer, Char,    Integer, Char,    Char,    Integer, Float,   X,        X,      X,        X,        X,         X,          X,         X],
        /*Integer*/    [Integer,    X,      Integer,   Integer, Integer, Integer, Integer, Integer, Integer, Integer, Integer, Integer, X,        X,      X,        X,        X,         X,          X,         X],
        /*Float*/      [Float,      X,      Float,     Float,   Float,   Float,   Float,   Float,   Float,   Float,   Integer, Float,   X,        X,      X,        X,        X,         X,          X,         X],
        /*LongLo*/     [LongLo,     X,      X,         X,       X,       X,       X,       X,       X,       X,       X,       X,       LongLo,   X,      LongLo,   X,        X,         X,          X,         X],
        /*LongHi*/     [LongHi,     X,      X,         X,       X,       X,       X,       X,       X,       X,       X,       X,       X,        LongHi, X,        LongHi,   X,         X,          X,         X],
        /*DoubleLo*/   [DoubleLo,   X,      X,         X,       X,       X,       X,       X,       X,       X,       X,       X,       LongLo,   X,      DoubleLo, X,        X,         X,          X,         X],
        /*DoubleHi*/   [DoubleHi,   X,      X,         X,       X,       X,       X,       X,       X,       X,       X,       X,       X,        LongHi, X,        DoubleHi, X,         X,          X,         X],
        /*UninitRef*/  [UninitRef,  X,      X,         X,       X,       X,       X,       X,       X,       X,       X,       X,       X,        X,      X,        X,        X,         X,          X,         X],
        /*UninitThis*/ [UninitThis, X,      X,         X,       X,       X,       X,       X,       X,       X,       X,       X,       X,        X,      X,        X,        X,         UninitThis, X,         X],
        /*Reference*/  [Reference,  X,      Reference, X,       X,       X,       X,       X,       X,       X,       X,       X,       X,        X,      X,        X,        X,         X,          Reference, X],
        /*Conflicted*/ [X,          X,      X,         X,       X,       X,       X,       X,       X,       X,       X,       X,       X,        X,      X,        X,        X,         X,          X,         X],
    ]
};

/// `ASSIGNMENT_TABLE[value][slot]`.
#[rustfmt::skip]
const ASSIGNMENT_TABLE: [[bool; CATEGORIES_COUNT]; CATEGORIES_COUNT] = {
    const T: bool = true;
    const F: bool = false;
    [
        /*             Unk Uni Nul One Boo Byt PBy Sho PSh Cha Int Flo LLo LHi DLo DHi URf UTh Ref Con  |slot */
        /*Unknown*/    [F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F],
        /*Uninit*/     [F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F],
        /*Null*/       [F,  F,  T,  F,  T,  T,  T,  T,  T,  T,  T,  T,  F,  F,  F,  F,  F,  F,  T,  F],
        /*One*/        [F,  F,  F,  T,  T,  T,  T,  T,  T,  T,  T,  T,  F,  F,  F,  F,  F,  F,  F,  F],
        /*Boolean*/    [F,  F,  F,  F,  T,  T,  T,  T,  T,  T,  T,  T,  F,  F,  F,  F,  F,  F,  F,  F],
        /*Byte*/       [F,  F,  F,  F,  F,  T,  F,  T,  T,  F,  T,  T,  F,  F,  F,  F,  F,  F,  F,  F],
        /*PosByte*/    [F,  F,  F,  F,  F,  T,  T,  T,  T,  T,  T,  T,  F,  F,  F,  F,  F,  F,  F,  F],
        /*Short*/      [F,  F,  F,  F,  F,  F,  F,  T,  F,  F,  T,  T,  F,  F,  F,  F,  F,  F,  F,  F],
        /*PosShort*/   [F,  F,  F,  F,  F,  F,  F,  T,  T,  T,  T,  T,  F,  F,  F,  F,  F,  F,  F,  F],
        /*Char*/       [F,  F,  F,  F,  F,  F,  F,  F,  F,  T,  T,  T,  F,  F,  F,  F,  F,  F,  F,  F],
        /*Integer*/    [F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  T,  T,  F,  F,  F,  F,  F,  F,  F,  F],
        /*Float*/      [F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  T,  T,  F,  F,  F,  F,  F,  F,  F,  F],
        /*LongLo*/     [F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  T,  F,  T,  F,  F,  F,  F,  F],
        /*LongHi*/     [F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  T,  F,  T,  F,  F,  F,  F],
        /*DoubleLo*/   [F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  T,  F,  T,  F,  F,  F,  F,  F],
        /*DoubleHi*/   [F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  T,  F,  T,  F,  F,  F,  F],
        /*UninitRef*/  [F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F],
        /*UninitThis*/ [F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F],
        /*Reference*/  [F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  T,  F],
        /*Conflicted*/ [F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F,  F],
    ]
};

impl Category {
    /// Least upper bound of two categories.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        MERGE_TABLE[self as usize][other as usize]
    }

    /// Checks if a value of this category can be stored into a slot of the given category.
    #[must_use]
    pub const fn assignable_to(self, slot: Self) -> bool {
        ASSIGNMENT_TABLE[self as usize][slot as usize]
    }
}

/// A register type: category, referenced class and uninitialized instance token.
///
/// Two `new-instance` results never compare equal, even for the same class, because each
/// carries its own instance token. Every other value uses token 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterType {
    category: Category,
    class: Option<ClassUid>,
    instance: u32,
}

impl From<Category> for RegisterType {
    fn from(category: Category) -> Self {
        Self::new(category, None)
    }
}

impl RegisterType {
    pub const UNKNOWN: Self = Self::new(Category::Unknown, None);
    pub const UNINIT: Self = Self::new(Category::Uninit, None);
    pub const CONFLICTED: Self = Self::new(Category::Conflicted, None);

    #[must_use]
    pub const fn new(category: Category, class: Option<ClassUid>) -> Self {
        Self {
            category,
            class,
            instance: 0,
        }
    }

    #[must_use]
    pub const fn reference(class: ClassUid) -> Self {
        Self::new(Category::Reference, Some(class))
    }

    #[must_use]
    pub const fn uninit_this(class: ClassUid) -> Self {
        Self::new(Category::UninitThis, Some(class))
    }

    /// A new uninitialized reference. `instance` must be unique within an analysis and
    /// non-zero.
    #[must_use]
    pub const fn uninit_ref(class: Option<ClassUid>, instance: u32) -> Self {
        Self {
            category: Category::UninitRef,
            class,
            instance,
        }
    }

    #[inline]
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    #[inline]
    #[must_use]
    pub const fn class(&self) -> Option<ClassUid> {
        self.class
    }

    #[inline]
    #[must_use]
    pub const fn instance(&self) -> u32 {
        self.instance
    }

    /// Register type of a value of the given type descriptor.
    pub fn for_type(descriptor: &str, class_path: &ClassPath) -> AnalysisResult<Self> {
        match descriptor.chars().next() {
            Some('V') => invalid("The V type can only be used as a method return type"),
            Some('Z') => Ok(Category::Boolean.into()),
            Some('B') => Ok(Category::Byte.into()),
            Some('S') => Ok(Category::Short.into()),
            Some('C') => Ok(Category::Char.into()),
            Some('I') => Ok(Category::Integer.into()),
            Some('F') => Ok(Category::Float.into()),
            Some('J') => Ok(Category::LongLo.into()),
            Some('D') => Ok(Category::DoubleLo.into()),
            Some('L' | '[') => {
                let class = class_path.class_def(descriptor, true)?;
                Ok(Self::reference(class.uid()))
            }
            _ => invalid(format!("Invalid type: {descriptor}")),
        }
    }

    /// Register type of one half of a wide value of the given type descriptor.
    pub fn wide_for_type(descriptor: &str, first_register: bool) -> AnalysisResult<Self> {
        match (descriptor.chars().next(), first_register) {
            (Some('J'), true) => Ok(Category::LongLo.into()),
            (Some('J'), false) => Ok(Category::LongHi.into()),
            (Some('D'), true) => Ok(Category::DoubleLo.into()),
            (Some('D'), false) => Ok(Category::DoubleHi.into()),
            _ => Err(AnalysisError::Internal(format!(
                "Cannot use this method for non-wide register type: {descriptor}"
            ))),
        }
    }

    /// Narrowest register type able to hold the given 32-bit literal.
    #[must_use]
    pub fn for_literal(value: i64) -> Self {
        let category = match value {
            i64::MIN..=-32769 => Category::Integer,
            -32768..=-129 => Category::Short,
            -128..=-1 => Category::Byte,
            0 => Category::Null,
            1 => Category::One,
            2..=127 => Category::PosByte,
            128..=32767 => Category::PosShort,
            32768..=65535 => Category::Char,
            _ => Category::Integer,
        };
        category.into()
    }

    /// Least upper bound of two register types.
    pub fn merge(self, other: Self, class_path: &ClassPath) -> AnalysisResult<Self> {
        if self == other {
            return Ok(self);
        }
        let category = self.category.merge(other.category);
        match category {
            Category::Reference => {
                let unresolved = |class: Option<ClassUid>| -> AnalysisResult<bool> {
                    match class {
                        Some(uid) => Ok(class_path.get(uid)?.is_unresolved()),
                        None => Ok(false),
                    }
                };
                let class = if unresolved(self.class)? || unresolved(other.class)? {
                    Some(class_path.unresolved_object()?.uid())
                } else {
                    class_path.common_superclass(self.class, other.class)?
                };
                Ok(Self::new(Category::Reference, class))
            }
            Category::UninitRef | Category::UninitThis => {
                if self.category == Category::Unknown {
                    Ok(other)
                } else {
                    Ok(self)
                }
            }
            _ => Ok(category.into()),
        }
    }

    /// Checks if a value of this type can be stored into a slot of the given type.
    ///
    /// References are checked against the slot class unless the slot is an interface:
    /// every object is assumed to implement every interface.
    pub fn can_be_assigned_to(self, slot: Self, class_path: &ClassPath) -> AnalysisResult<bool> {
        if !self.category.assignable_to(slot.category) {
            return Ok(false);
        }
        if self.category == Category::Reference && slot.category == Category::Reference {
            if let (Some(value_class), Some(slot_class)) = (self.class, slot.class) {
                let slot_class = class_path.get(slot_class)?;
                if !slot_class.is_interface()? {
                    let value_class = class_path.get(value_class)?;
                    return class_path.extends_class(&value_class, &slot_class);
                }
            }
        }
        Ok(true)
    }

    /// Renders as `(Category,Lclass;)` or `(Category)`.
    #[must_use]
    pub fn display<'a>(&self, class_path: &'a ClassPath) -> RegisterTypeDisplay<'a> {
        RegisterTypeDisplay {
            typ: *self,
            class_path,
        }
    }
}

pub struct RegisterTypeDisplay<'a> {
    typ: RegisterType,
    class_path: &'a ClassPath,
}

impl<'a> fmt::Display for RegisterTypeDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.typ.class.map(|uid| self.class_path.get(uid)) {
            Some(Ok(class)) => write!(f, "({},{})", self.typ.category, class.name()),
            Some(Err(_)) => write!(f, "({},?)", self.typ.category),
            None => write!(f, "({})", self.typ.category),
        }
    }
}
